use roomdet_core::Prompt;
use roomdet_hw::Frame;
use roomdet_model::{train, Classifier, TrainConfig, TrainError, TrainRequest};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Two classes of tiny solid-color images, dark and bright.
fn two_class_dataset(root: &Path) {
    for (class, value) in [("alice", 20u8), ("bob", 230u8)] {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..5u8 {
            let v = value.saturating_add(i);
            image::RgbImage::from_pixel(12, 10, image::Rgb([v, v, v]))
                .save(dir.join(format!("{i}_{class}.png")))
                .unwrap();
        }
    }
}

fn quick_config() -> TrainConfig {
    TrainConfig {
        epochs: 2,
        batch_size: 4,
        ..TrainConfig::default()
    }
}

fn request(dataset_dir: PathBuf, output_dir: PathBuf, name: &str) -> TrainRequest {
    TrainRequest {
        dataset_dir,
        output_dir,
        model_name: name.into(),
        img_width: 8,
        img_height: 8,
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn trains_two_classes_and_saves_matching_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("datasets");
    let out = tmp.path().join("models");
    two_class_dataset(&data);
    std::fs::create_dir_all(&out).unwrap();

    let mut prompt = Prompt::new(Cursor::new(""), Vec::new());
    let outcome = train(
        &request(data, out.clone(), "Room Mates"),
        &quick_config(),
        &mut prompt,
        || "unused".into(),
    )
    .unwrap();

    assert_eq!(outcome.class_names, vec!["alice", "bob"]);
    assert_eq!(outcome.history.len(), 2);
    // 10 samples: 8 train, 2 validation
    assert!(outcome.history.iter().all(|m| m.val_accuracy.is_some()));

    assert_eq!(
        file_names(&out),
        vec!["room_mates_graph.png", "room_mates_model.bin", "room_mates_model.json"]
    );
    assert_eq!(outcome.model_path, out.join("room_mates_model.bin"));
    assert_eq!(outcome.graph_path, out.join("room_mates_graph.png"));

    let classifier = Classifier::load(&outcome.model_path).unwrap();
    let frame = Frame {
        data: vec![25; 8 * 8 * 3],
        width: 8,
        height: 8,
        timestamp: std::time::Instant::now(),
        sequence: 1,
    };
    let prediction = classifier.predict(&frame).unwrap();
    assert!(["alice", "bob"].contains(&prediction.label.as_str()));
}

#[test]
fn missing_dataset_dir_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("models");
    std::fs::create_dir_all(&out).unwrap();

    let mut prompt = Prompt::new(Cursor::new(""), Vec::new());
    let result = train(
        &request(tmp.path().join("nope"), out.clone(), "x"),
        &quick_config(),
        &mut prompt,
        || "unused".into(),
    );

    assert!(matches!(result, Err(TrainError::PathNotFound(_))));
    assert!(file_names(&out).is_empty());
    assert!(prompt.into_output().is_empty());
}

#[test]
fn second_run_with_same_name_can_rename_both_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("datasets");
    let out = tmp.path().join("models");
    two_class_dataset(&data);
    std::fs::create_dir_all(&out).unwrap();

    let config = TrainConfig {
        epochs: 1,
        ..quick_config()
    };
    let mut first = Prompt::new(Cursor::new(""), Vec::new());
    train(&request(data.clone(), out.clone(), "pair"), &config, &mut first, || {
        "unused".into()
    })
    .unwrap();

    let mut second = Prompt::new(Cursor::new("2\n2\n"), Vec::new());
    let outcome = train(&request(data, out.clone(), "pair"), &config, &mut second, || {
        "2024_6_1_9_30_5_".into()
    })
    .unwrap();

    assert_eq!(outcome.model_path, out.join("2024_6_1_9_30_5__model.bin"));
    assert_eq!(outcome.graph_path, out.join("2024_6_1_9_30_5__graph.png"));
    assert_eq!(file_names(&out).len(), 6);

    let transcript = String::from_utf8(second.into_output()).unwrap();
    assert!(transcript.contains("A trained model with the name \"pair\""));
    assert!(transcript.contains("A result graph with the name \"pair\""));
}
