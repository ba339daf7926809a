//! Persistable training outputs: model weights (+ JSON sidecar) and the
//! results graph.

use crate::net::RoommateNet;
use crate::plot;
use crate::train::EpochMetrics;
use crate::InferBackend;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use roomdet_core::conflict::ArtifactWriteError;
use roomdet_core::{Artifact, ArtifactKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything needed to rebuild and use a trained model, stored next to the
/// weights file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Index `i` is the label predicted for class id `i`.
    pub class_names: Vec<String>,
    pub img_width: u32,
    pub img_height: u32,
    pub epochs: usize,
    #[serde(default)]
    pub history: Vec<EpochMetrics>,
}

/// `x_model.bin` → `x_model.json`.
pub fn sidecar_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("json")
}

pub fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
}

pub struct ModelArtifact<'a> {
    pub model: &'a RoommateNet<InferBackend>,
    pub metadata: &'a ModelMetadata,
}

impl Artifact for ModelArtifact<'_> {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Model
    }

    fn write_to(&self, path: &Path) -> Result<(), ArtifactWriteError> {
        self.model
            .clone()
            .save_file(path.to_path_buf(), &recorder())?;

        let sidecar = sidecar_path(path);
        let json = serde_json::to_string_pretty(self.metadata)?;
        std::fs::write(&sidecar, json)?;

        tracing::info!(
            path = %path.display(),
            sidecar = %sidecar.display(),
            classes = self.metadata.class_names.len(),
            "saved model"
        );
        Ok(())
    }

    fn companion_paths(&self, path: &Path) -> Vec<PathBuf> {
        vec![sidecar_path(path)]
    }
}

pub struct GraphArtifact<'a> {
    pub history: &'a [EpochMetrics],
}

impl Artifact for GraphArtifact<'_> {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Graph
    }

    fn write_to(&self, path: &Path) -> Result<(), ArtifactWriteError> {
        plot::render_history(self.history, path)?;
        tracing::info!(path = %path.display(), "saved results graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/m/cats_model.bin")),
            PathBuf::from("/m/cats_model.json")
        );
    }

    #[test]
    fn test_metadata_json_without_history() {
        let json = r#"{"class_names":["a","b"],"img_width":32,"img_height":24,"epochs":3}"#;
        let meta: ModelMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.class_names, vec!["a", "b"]);
        assert_eq!((meta.img_width, meta.img_height), (32, 24));
        assert!(meta.history.is_empty());
    }

    #[test]
    fn test_model_companion_is_sidecar() {
        let device = Default::default();
        let model = RoommateNet::<InferBackend>::new(
            crate::net::RoommateNetConfig::new(8, 8, 2),
            &device,
        );
        let metadata = ModelMetadata {
            class_names: vec!["a".into(), "b".into()],
            img_width: 8,
            img_height: 8,
            epochs: 1,
            history: Vec::new(),
        };
        let artifact = ModelArtifact {
            model: &model,
            metadata: &metadata,
        };
        assert_eq!(artifact.kind(), ArtifactKind::Model);
        assert_eq!(
            artifact.companion_paths(Path::new("x_model.bin")),
            vec![PathBuf::from("x_model.json")]
        );
    }
}
