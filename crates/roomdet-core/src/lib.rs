//! roomdet-core: dataset capture workflow glue.
//!
//! Filesystem-safe naming, timestamp tokens, dataset directories, frame
//! persistence, interactive save-conflict resolution and the tick-driven
//! live preview loop.

pub mod conflict;
pub mod dataset;
pub mod naming;
pub mod preview;
pub mod prompt;
pub mod timestamp;

pub use conflict::{resolve_and_save, Artifact, ArtifactKind, ConflictError};
pub use dataset::{ensure_dir, DatasetError, FramePersister};
pub use naming::normalize;
pub use preview::{
    IntervalTicker, PreviewError, PreviewHooks, PreviewLoop, PreviewSummary, PreviewSurface,
    Ticker, Trigger, TriggerQueue, DEFAULT_FRAME_INTERVAL,
};
pub use prompt::Prompt;
pub use timestamp::time_token;
