//! Interactive resolution of filename conflicts before saving an artifact.
//!
//! ```text
//! CHECK ──no conflict──▶ WRITE
//!   │
//! conflict
//!   ▼
//! PROMPT ──"1"──▶ remove existing ──▶ CHECK
//!        ──"2"──▶ timestamped name ──▶ CHECK
//!        ──else─▶ PROMPT
//! ```

use crate::prompt::Prompt;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFLICT_OPTIONS: &str = " already exists, enter the number of the option you would like to use:\n\
     \t1. Overwrite the existing file.\n\
     \t2. Save the new file with a temporary generated name.\n";
const UNRECOGNIZED_MESSAGE: &str =
    "Option not recognized, please type in the number of the option you want.\n\n";

pub type ArtifactWriteError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ConflictError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: ArtifactWriteError,
    },
    #[error("prompt failed: {0}")]
    Prompt(#[from] std::io::Error),
    #[error("input closed while resolving conflict at {0}; nothing saved")]
    Aborted(PathBuf),
}

/// What is being saved; decides the file suffix and the prompt wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Model,
    Graph,
}

impl ArtifactKind {
    /// File name for an artifact of this kind with the given stem.
    pub fn file_name(self, stem: &str) -> String {
        match self {
            ArtifactKind::Model => format!("{stem}_model.bin"),
            ArtifactKind::Graph => format!("{stem}_graph.png"),
        }
    }

    fn description(self) -> &'static str {
        match self {
            ArtifactKind::Model => "A trained model",
            ArtifactKind::Graph => "A result graph",
        }
    }
}

/// Something that can be persisted at a path chosen by the resolver.
pub trait Artifact {
    fn kind(&self) -> ArtifactKind;

    fn write_to(&self, path: &Path) -> Result<(), ArtifactWriteError>;

    /// Files that belong to the artifact at `path` and are removed together
    /// with it on overwrite (e.g. a metadata sidecar).
    fn companion_paths(&self, _path: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

enum Choice {
    Overwrite,
    Rename,
    Unrecognized,
}

fn parse_choice(answer: &str) -> Choice {
    match answer.trim() {
        "1" => Choice::Overwrite,
        "2" => Choice::Rename,
        _ => Choice::Unrecognized,
    }
}

/// A destination is taken when the artifact file or any of its companions
/// already exists.
fn is_taken<A: Artifact + ?Sized>(artifact: &A, path: &Path) -> bool {
    path.exists() || artifact.companion_paths(path).iter().any(|p| p.exists())
}

fn conflict_message(kind: ArtifactKind, name: &str) -> String {
    format!("{} with the name \"{name}\"{CONFLICT_OPTIONS}", kind.description())
}

/// Save `artifact` at `destination`, asking the user what to do while the
/// destination (or one of its companion files) is taken.
///
/// Overwrite deletes the existing file (and its companions) and re-checks
/// the same path; a failed deletion leaves the conflict in place so the user
/// is asked again. Rename replaces the stem with `rename()` (a timestamp
/// token in production) in the same directory and re-checks. Returns the
/// path actually written.
pub fn resolve_and_save<A, R, W, F>(
    artifact: &A,
    destination: &Path,
    display_name: &str,
    prompt: &mut Prompt<R, W>,
    mut rename: F,
) -> Result<PathBuf, ConflictError>
where
    A: Artifact + ?Sized,
    R: BufRead,
    W: Write,
    F: FnMut() -> String,
{
    let kind = artifact.kind();
    let dir = destination
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut path = destination.to_path_buf();
    let mut name = display_name.to_string();

    while is_taken(artifact, &path) {
        tracing::debug!(path = %path.display(), ?kind, "save destination taken");
        prompt.say(&conflict_message(kind, &name))?;

        let Some(answer) = prompt.read_line()? else {
            return Err(ConflictError::Aborted(path));
        };

        match parse_choice(&answer) {
            Choice::Overwrite => {
                for victim in std::iter::once(path.clone()).chain(artifact.companion_paths(&path)) {
                    match std::fs::remove_file(&victim) {
                        Ok(()) => tracing::info!(path = %victim.display(), "removed existing file"),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => {
                            tracing::warn!(path = %victim.display(), error = %e, "failed to remove existing file")
                        }
                    }
                }
            }
            Choice::Rename => {
                name = rename();
                path = dir.join(kind.file_name(&name));
            }
            Choice::Unrecognized => prompt.say(UNRECOGNIZED_MESSAGE)?,
        }
    }

    artifact
        .write_to(&path)
        .map_err(|source| ConflictError::Write {
            path: path.clone(),
            source,
        })?;

    tracing::info!(path = %path.display(), ?kind, "saved artifact");
    Ok(path)
}
