//! Tick-driven live preview loop.
//!
//! Each tick reads one frame from a [`FrameSource`], renders a mirrored copy
//! on a [`PreviewSurface`], and keeps the unmirrored frame as the "last
//! captured frame". Save/stop triggers are drained after rendering, so a save
//! always refers to the frame the user is currently looking at. Between ticks
//! the loop defers to a [`Ticker`]; tests drive ticks synchronously instead.

use crate::dataset::{DatasetError, FramePersister};
use roomdet_hw::{CameraError, Frame, FrameSource};
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;

/// Default delay between preview ticks.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(10);

/// Sending half used to raise triggers from outside the surface.
pub type TriggerQueue = mpsc::Sender<Trigger>;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("could not read frame from camera source: {0}")]
    Capture(#[from] CameraError),
    #[error("render failed: {0}")]
    Render(String),
    #[error("save failed: {0}")]
    Save(#[from] DatasetError),
    #[error("{0}")]
    Hook(String),
}

/// External events observed by the hosting event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Persist the most recently displayed frame.
    Save,
    /// End the session and hand control back to the caller.
    Stop,
}

/// Where preview frames are shown (a window in production).
pub trait PreviewSurface {
    fn render(&mut self, frame: &Frame) -> Result<(), PreviewError>;

    /// Triggers raised since the previous call.
    fn poll_triggers(&mut self) -> Vec<Trigger>;
}

/// Suspends the loop until the next tick is due.
pub trait Ticker {
    fn wait(&mut self);
}

/// Sleeps a fixed interval between ticks.
pub struct IntervalTicker {
    interval: Duration,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl Ticker for IntervalTicker {
    fn wait(&mut self) {
        std::thread::sleep(self.interval);
    }
}

/// Per-session behavior plugged into the loop.
pub trait PreviewHooks {
    /// Called once per tick with the unmirrored frame.
    fn on_frame(&mut self, _frame: &Frame) -> Result<(), PreviewError> {
        Ok(())
    }

    /// Called for each save trigger with the last unmirrored frame.
    fn on_save(&mut self, _frame: &Frame) -> Result<(), PreviewError> {
        Ok(())
    }
}

impl PreviewHooks for () {}

impl PreviewHooks for FramePersister {
    fn on_save(&mut self, frame: &Frame) -> Result<(), PreviewError> {
        let path = self.save(frame)?;
        tracing::info!(path = %path.display(), total = self.saved(), "frame saved to dataset");
        Ok(())
    }
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewSummary {
    pub ticks: u64,
    pub saved: usize,
}

pub struct PreviewLoop {
    last_frame: Option<Frame>,
    mirror: bool,
    ticks: u64,
    saved: usize,
    tx: mpsc::Sender<Trigger>,
    rx: mpsc::Receiver<Trigger>,
}

impl Default for PreviewLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            last_frame: None,
            mirror: true,
            ticks: 0,
            saved: 0,
            tx,
            rx,
        }
    }

    /// Render frames as captured instead of mirrored.
    pub fn without_mirror(mut self) -> Self {
        self.mirror = false;
        self
    }

    /// Handle for raising triggers from outside the surface.
    pub fn trigger_handle(&self) -> TriggerQueue {
        self.tx.clone()
    }

    /// Most recently captured (unmirrored) frame.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn summary(&self) -> PreviewSummary {
        PreviewSummary {
            ticks: self.ticks,
            saved: self.saved,
        }
    }

    /// Read, render and record one frame.
    pub fn tick<S, D, H>(
        &mut self,
        source: &mut S,
        surface: &mut D,
        hooks: &mut H,
    ) -> Result<(), PreviewError>
    where
        S: FrameSource + ?Sized,
        D: PreviewSurface + ?Sized,
        H: PreviewHooks + ?Sized,
    {
        let frame = source.read_frame()?;

        if self.mirror {
            surface.render(&frame.mirrored())?;
        } else {
            surface.render(&frame)?;
        }
        hooks.on_frame(&frame)?;

        self.last_frame = Some(frame);
        self.ticks += 1;
        Ok(())
    }

    /// Apply pending triggers in arrival order. Returns `true` on stop.
    pub fn dispatch_triggers<D, H>(
        &mut self,
        surface: &mut D,
        hooks: &mut H,
    ) -> Result<bool, PreviewError>
    where
        D: PreviewSurface + ?Sized,
        H: PreviewHooks + ?Sized,
    {
        let mut pending = surface.poll_triggers();
        pending.extend(self.rx.try_iter());

        for trigger in pending {
            match trigger {
                Trigger::Save => self.save_current(hooks)?,
                Trigger::Stop => {
                    tracing::debug!(ticks = self.ticks, "stop requested");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn save_current<H: PreviewHooks + ?Sized>(&mut self, hooks: &mut H) -> Result<(), PreviewError> {
        let Some(frame) = self.last_frame.as_ref() else {
            tracing::warn!("save requested before the first frame; ignored");
            return Ok(());
        };
        hooks.on_save(frame)?;
        self.saved += 1;
        Ok(())
    }

    /// Run until a stop trigger. A failed frame read ends the loop with an
    /// error; the caller still owns (and must close) the source.
    pub fn run<S, D, T, H>(
        &mut self,
        source: &mut S,
        surface: &mut D,
        ticker: &mut T,
        hooks: &mut H,
    ) -> Result<PreviewSummary, PreviewError>
    where
        S: FrameSource + ?Sized,
        D: PreviewSurface + ?Sized,
        T: Ticker + ?Sized,
        H: PreviewHooks + ?Sized,
    {
        tracing::info!(mirror = self.mirror, "preview loop started");
        loop {
            self.tick(source, surface, hooks)?;
            if self.dispatch_triggers(surface, hooks)? {
                break;
            }
            ticker.wait();
        }
        let summary = self.summary();
        tracing::info!(ticks = summary.ticks, saved = summary.saved, "preview loop ended");
        Ok(summary)
    }

    /// Drive at most `ticks` ticks back to back, stopping early on a stop
    /// trigger.
    pub fn run_for<S, D, H>(
        &mut self,
        ticks: u64,
        source: &mut S,
        surface: &mut D,
        hooks: &mut H,
    ) -> Result<PreviewSummary, PreviewError>
    where
        S: FrameSource + ?Sized,
        D: PreviewSurface + ?Sized,
        H: PreviewHooks + ?Sized,
    {
        for _ in 0..ticks {
            self.tick(source, surface, hooks)?;
            if self.dispatch_triggers(surface, hooks)? {
                break;
            }
        }
        Ok(self.summary())
    }
}
