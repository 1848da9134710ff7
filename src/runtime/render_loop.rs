use std::time::Duration;

use crate::foundation::core::Fps;
use crate::foundation::ids::SubscriptionId;

/// Source of frame timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum FrameClock {
    /// dt is the gap between the timestamps the host passes to each tick. The first frame
    /// after a start has dt 0.
    #[default]
    Host,
    /// Every tick advances by exactly one frame of `fps`, whatever timestamp the host passes.
    Fixed { fps: Fps },
}

type UpdateCallback = Box<dyn FnMut(f64)>;

/// Frame timing plus the set of per-frame update callbacks.
pub struct RenderLoop {
    clock: FrameClock,
    running: bool,
    last: Option<Duration>,
    delta: f64,
    frames: u64,
    callbacks: Vec<(SubscriptionId, UpdateCallback)>,
    next_id: u64,
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("clock", &self.clock)
            .field("running", &self.running)
            .field("delta", &self.delta)
            .field("frames", &self.frames)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl RenderLoop {
    pub fn new(clock: FrameClock) -> Self {
        Self {
            clock,
            running: false,
            last: None,
            delta: 0.0,
            frames: 0,
            callbacks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.last = None;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seconds covered by the latest frame.
    pub fn delta_time(&self) -> f64 {
        self.delta
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Register `f` to run once per frame with the frame's dt.
    pub fn add_update_callback(&mut self, f: impl FnMut(f64) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.callbacks.push((id, Box::new(f)));
        id
    }

    pub fn remove_update_callback(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        self.callbacks.len() != before
    }

    /// Open a frame at host time `now`. Returns its dt, or `None` while stopped.
    pub fn advance(&mut self, now: Duration) -> Option<f64> {
        if !self.running {
            return None;
        }
        let dt = match self.clock {
            FrameClock::Fixed { fps } => fps.frame_duration_secs(),
            FrameClock::Host => self
                .last
                .map_or(0.0, |prev| now.saturating_sub(prev).as_secs_f64()),
        };
        self.last = Some(now);
        self.delta = dt;
        self.frames += 1;
        Some(dt)
    }

    /// Run every update callback with the current dt, in registration order.
    pub fn run_callbacks(&mut self) -> usize {
        let dt = self.delta;
        for (_, f) in &mut self.callbacks {
            f(dt);
        }
        self.callbacks.len()
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new(FrameClock::Host)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/render_loop.rs"]
mod tests;
