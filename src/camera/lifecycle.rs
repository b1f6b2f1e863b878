//! Per-camera frame counter and history reset tracking.

use glam::UVec2;

use crate::history::SwapOutcome;

/// Frame counter wraps back to zero when it reaches this value.
pub const FRAME_COUNT_WRAP: u32 = i32::MAX as u32;

/// Snapshot of a camera's frame state, handed to effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub frame_count: u32,
    /// History is invalid this frame (first frame, resize or explicit cut).
    pub reset_history: bool,
    /// `reset_history` of the previous frame.
    pub did_reset_history_last_frame: bool,
    pub reference_size: UVec2,
}

/// Tracks frame count, reference size and history resets for one camera.
#[derive(Debug, Clone, Default)]
pub struct FrameLifecycle {
    frame_count: u32,
    started: bool,
    last_size: UVec2,
    max_size: UVec2,
    reset_history: bool,
    did_reset_history_last_frame: bool,
    reset_requested: bool,
}

impl FrameLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn reset_history(&self) -> bool {
        self.reset_history
    }

    pub fn did_reset_history_last_frame(&self) -> bool {
        self.did_reset_history_last_frame
    }

    pub fn last_size(&self) -> UVec2 {
        self.last_size
    }

    /// Force a history reset on the next frame, e.g. after a camera cut.
    pub fn request_history_reset(&mut self) {
        self.reset_requested = true;
    }

    /// Consume a pending reset request.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    /// Advance to the next frame rendered at `size`.
    ///
    /// `history` is what the camera's ring reported for the same size.
    pub fn advance(&mut self, size: UVec2, history: SwapOutcome) -> FrameInfo {
        self.did_reset_history_last_frame = self.reset_history;

        if self.started {
            self.frame_count += 1;
            if self.frame_count >= FRAME_COUNT_WRAP {
                self.frame_count = 0;
            }
        }

        let shrunk = size.cmplt(self.max_size).any();
        let first_frame = !self.started;
        self.reset_history = first_frame || shrunk || history.invalidates_history();

        if shrunk {
            log::debug!(
                "Frame {}: reference size shrank to {}x{}, resetting history",
                self.frame_count,
                size.x,
                size.y
            );
            self.max_size = size;
        } else {
            self.max_size = self.max_size.max(size);
        }

        self.last_size = size;
        self.started = true;
        self.info()
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            frame_count: self.frame_count,
            reset_history: self.reset_history,
            did_reset_history_last_frame: self.did_reset_history_last_frame,
            reference_size: self.last_size,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_frame_count(&mut self, frame_count: u32) {
        self.frame_count = frame_count;
    }
}
