//! Capture, train and detect workflows wired to the camera, the preview
//! window and the console prompt.

use crate::config::Config;
use crate::menu::MenuActions;
use crate::window::PreviewWindow;
use anyhow::{bail, Context, Result};
use roomdet_core::dataset::confirm_extend;
use roomdet_core::{
    ensure_dir, normalize, time_token, ArtifactKind, FramePersister, IntervalTicker, PreviewError,
    PreviewHooks, PreviewLoop, PreviewSummary, PreviewSurface, Prompt, Ticker,
};
use roomdet_hw::{Camera, Frame, FrameSource};
use roomdet_model::{Classifier, ClassifyError, TrainRequest};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const DATASET_PROMPT: &str = "Name to use for new dataset: ";
const MODEL_NAME_PROMPT: &str = "Name to save the trained model under: ";
const DETECT_MODEL_PROMPT: &str = "Model to run (name or path to a _model.bin file): ";

pub struct Workflows {
    config: Config,
}

impl Workflows {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Collect samples for `label` (asked for when `None`).
    pub fn capture<R: BufRead, W: Write>(
        &self,
        prompt: &mut Prompt<R, W>,
        label: Option<String>,
    ) -> Result<()> {
        let raw = match label {
            Some(label) => label,
            None => required_answer(prompt, DATASET_PROMPT)?,
        };
        let label = normalize(&raw);

        let (existed, dataset_dir) = ensure_dir(&label, &self.config.datasets_dir)?;
        if existed && !confirm_extend(prompt)? {
            tracing::info!(label = %label, "not extending existing dataset");
            return Ok(());
        }

        prompt.say(&format!(
            "Saving samples to {}. Press SPACE to save a frame, ESC to finish.",
            dataset_dir.display()
        ))?;

        let mut persister = FramePersister::new(label.clone(), dataset_dir);
        let saved = self.run_preview(&format!("Dataset: {label}"), &mut persister)?;
        prompt.say(&format!("Saved {saved} new sample(s) for \"{label}\"."))?;
        Ok(())
    }

    /// Train on the configured datasets directory.
    pub fn train<R: BufRead, W: Write>(
        &self,
        prompt: &mut Prompt<R, W>,
        model_name: Option<String>,
    ) -> Result<()> {
        let model_name = match model_name {
            Some(name) => name,
            None => required_answer(prompt, MODEL_NAME_PROMPT)?,
        };

        let request = TrainRequest {
            dataset_dir: self.config.datasets_dir.clone(),
            output_dir: self.config.models_dir.clone(),
            model_name,
            img_width: self.config.width,
            img_height: self.config.height,
        };
        prompt.say(&format!(
            "Training on {} ({}x{}, {} epochs)...",
            request.dataset_dir.display(),
            request.img_width,
            request.img_height,
            self.config.epochs
        ))?;

        let outcome = roomdet_model::train(&request, &self.config.train_config(), prompt, time_token)?;

        prompt.say(&format!(
            "Trained on classes {:?}.\nModel saved to {}\nResults graph saved to {}",
            outcome.class_names,
            outcome.model_path.display(),
            outcome.graph_path.display()
        ))?;
        if let Some(last) = outcome.history.last() {
            prompt.say(&format!(
                "Final training accuracy {:.2}%, validation accuracy {}",
                last.train_accuracy * 100.0,
                last.val_accuracy
                    .map(|a| format!("{:.2}%", a * 100.0))
                    .unwrap_or_else(|| "n/a".to_string())
            ))?;
        }
        Ok(())
    }

    /// Classify live frames with a trained model.
    pub fn detect<R: BufRead, W: Write>(
        &self,
        prompt: &mut Prompt<R, W>,
        model: Option<String>,
    ) -> Result<()> {
        let model = match model {
            Some(model) => model,
            None => required_answer(prompt, DETECT_MODEL_PROMPT)?,
        };
        let model_path = resolve_model_path(&model, &self.config.models_dir);
        let classifier = Classifier::load(&model_path)
            .with_context(|| format!("cannot run detector with {}", model_path.display()))?;

        let mut camera = self.open_camera()?;
        let result = DetectSession::start(classifier, &camera, std::io::stdout())
            .map_err(anyhow::Error::from)
            .and_then(|mut session| {
                let mut window = open_window("Roommate Detector", &camera)?;
                let mut ticker = IntervalTicker::new(self.config.frame_interval());
                session.run(&mut camera, &mut window, &mut ticker)?;
                Ok(())
            });
        camera.close();
        result
    }

    fn open_camera(&self) -> Result<Camera> {
        let device = &self.config.camera_device;
        let camera = Camera::open(device, self.config.width, self.config.height).map_err(|e| {
            let context = if e.is_unavailable() {
                format!("could not open camera: source = {device} (check --device or run `roomdet devices`)")
            } else {
                format!("could not open camera: source = {device}")
            };
            anyhow::Error::new(e).context(context)
        })?;
        let (width, height) = camera.resolution();
        tracing::info!(device = %device, width, height, format = ?camera.pixel_format(), "camera opened");
        Ok(camera)
    }

    fn run_preview<H: PreviewHooks>(&self, title: &str, hooks: &mut H) -> Result<usize> {
        let mut camera = self.open_camera()?;
        let result = open_window(title, &camera).and_then(|mut window| {
            let mut ticker = IntervalTicker::new(self.config.frame_interval());
            let summary = PreviewLoop::new().run(&mut camera, &mut window, &mut ticker, hooks)?;
            Ok(summary.saved)
        });
        camera.close();
        result
    }
}

fn open_window<S: FrameSource>(title: &str, source: &S) -> Result<PreviewWindow> {
    let (width, height) = source.resolution();
    PreviewWindow::open(title, width, height)
        .map_err(|e| anyhow::anyhow!("could not open preview window: {e}"))
}

impl<R: BufRead, W: Write> MenuActions<R, W> for Workflows {
    fn add_dataset(&mut self, prompt: &mut Prompt<R, W>) -> Result<()> {
        self.capture(prompt, None)
    }

    fn train_model(&mut self, prompt: &mut Prompt<R, W>) -> Result<()> {
        self.train(prompt, None)
    }

    fn run_detector(&mut self, prompt: &mut Prompt<R, W>) -> Result<()> {
        self.detect(prompt, None)
    }
}

/// Live classification over any frame source and surface.
struct DetectSession<W> {
    preview: PreviewLoop,
    hooks: DetectHooks<W>,
}

impl<W: Write> DetectSession<W> {
    /// Fails with `InputShapeMismatch` before any frame is read when the
    /// source resolution differs from the model input.
    fn start<S: FrameSource + ?Sized>(
        classifier: Classifier,
        source: &S,
        out: W,
    ) -> Result<Self, ClassifyError> {
        let (width, height) = source.resolution();
        classifier.check_input(width, height)?;
        Ok(Self {
            preview: PreviewLoop::new(),
            hooks: DetectHooks { classifier, out },
        })
    }

    fn run<S, D, T>(
        &mut self,
        source: &mut S,
        surface: &mut D,
        ticker: &mut T,
    ) -> Result<PreviewSummary, PreviewError>
    where
        S: FrameSource + ?Sized,
        D: PreviewSurface + ?Sized,
        T: Ticker + ?Sized,
    {
        self.preview.run(source, surface, ticker, &mut self.hooks)
    }
}

/// Prints one prediction per displayed frame.
struct DetectHooks<W> {
    classifier: Classifier,
    out: W,
}

impl<W: Write> PreviewHooks for DetectHooks<W> {
    fn on_frame(&mut self, frame: &Frame) -> Result<(), PreviewError> {
        let prediction = self
            .classifier
            .predict(frame)
            .map_err(|e| PreviewError::Hook(e.to_string()))?;
        writeln!(self.out, "{}", prediction.message()).map_err(|e| PreviewError::Hook(e.to_string()))
    }
}

/// A bare name maps to `{models_dir}/{normalize(name)}_model.bin`; anything
/// that looks like a path is used as given.
fn resolve_model_path(input: &str, models_dir: &Path) -> PathBuf {
    let input = input.trim();
    if input.ends_with(".bin") || input.contains(std::path::MAIN_SEPARATOR) {
        return PathBuf::from(input);
    }
    models_dir.join(ArtifactKind::Model.file_name(&normalize(input)))
}

fn required_answer<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>, question: &str) -> Result<String> {
    match prompt.ask(question)? {
        Some(answer) => Ok(answer),
        None => bail!("input closed"),
    }
}
