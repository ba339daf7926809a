//! minifb preview window.

use minifb::{Key, KeyRepeat, Window, WindowOptions};
use roomdet_core::{PreviewError, PreviewSurface, Trigger};
use roomdet_hw::Frame;

pub struct PreviewWindow {
    window: Window,
    buffer: Vec<u32>,
}

impl PreviewWindow {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, minifb::Error> {
        let window = Window::new(title, width as usize, height as usize, WindowOptions::default())?;
        tracing::debug!(title, width, height, "opened preview window");
        Ok(Self {
            window,
            buffer: Vec::new(),
        })
    }
}

impl PreviewSurface for PreviewWindow {
    fn render(&mut self, frame: &Frame) -> Result<(), PreviewError> {
        pack_rgb(&frame.data, &mut self.buffer);
        self.window
            .update_with_buffer(&self.buffer, frame.width as usize, frame.height as usize)
            .map_err(|e| PreviewError::Render(e.to_string()))
    }

    /// Space saves; Escape or closing the window stops.
    fn poll_triggers(&mut self) -> Vec<Trigger> {
        if !self.window.is_open() {
            return vec![Trigger::Stop];
        }
        self.window
            .get_keys_pressed(KeyRepeat::No)
            .into_iter()
            .filter_map(key_trigger)
            .collect()
    }
}

fn key_trigger(key: Key) -> Option<Trigger> {
    match key {
        Key::Space => Some(Trigger::Save),
        Key::Escape => Some(Trigger::Stop),
        _ => None,
    }
}

/// Packed RGB8 → `0x00RRGGBB` pixels, reusing `out`.
fn pack_rgb(rgb: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        rgb.chunks_exact(3)
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
    );
}
