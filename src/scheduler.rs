//! Self-rescheduling frame loop
//!
//! `FrameLoop` is the explicit form of "run a tick every display refresh until
//! torn down". A frame is *requested* from the host (egui repaint, or a test
//! counter) and later *fired*; only a fired frame that is still pending runs
//! the tick, so frames delivered after `stop()` are dropped.

/// Host hook that arranges for one more frame to be delivered
pub trait FrameRequester {
    fn request_frame(&mut self);
}

impl FrameRequester for egui::Context {
    fn request_frame(&mut self) {
        self.request_repaint();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Never started
    Idle,
    /// A frame has been requested and not yet fired
    Pending,
    /// Stopped; pending frames are cancelled
    Stopped,
}

#[derive(Debug)]
pub struct FrameLoop {
    state: LoopState,
    frames: u64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Pending
    }

    /// Ticks run since creation
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Schedule the first frame. Starting a running loop is a no-op; a
    /// stopped loop can be started again.
    pub fn start(&mut self, requester: &mut impl FrameRequester) {
        if self.state == LoopState::Pending {
            return;
        }
        self.state = LoopState::Pending;
        requester.request_frame();
    }

    /// Cancel the pending frame. Safe to call any number of times; returns
    /// whether a pending frame was actually cancelled.
    pub fn stop(&mut self) -> bool {
        let was_pending = self.state == LoopState::Pending;
        if was_pending {
            self.state = LoopState::Stopped;
        }
        was_pending
    }

    /// Deliver a frame. Runs `tick` and schedules the next frame only while
    /// the loop is pending; returns whether the tick ran.
    pub fn fire(&mut self, requester: &mut impl FrameRequester, tick: impl FnOnce()) -> bool {
        if self.state != LoopState::Pending {
            return false;
        }
        tick();
        self.frames += 1;
        requester.request_frame();
        true
    }
}
