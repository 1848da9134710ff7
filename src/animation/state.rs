use std::rc::Rc;

use crate::animation::ease::Ease;
use crate::animation::values::{AnimValues, Lerp};
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::hook::Hook;

fn default_true() -> bool {
    true
}

/// Declarative tween attached to an element.
///
/// `duration` and `delay` are seconds. The callbacks are host closures and never round-trip
/// through JSON.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSpec {
    pub from: AnimValues,
    pub to: AnimValues,
    pub duration: f64,
    #[serde(default)]
    pub easing: Ease,
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub delay: f64,
    #[serde(skip)]
    pub(crate) on_complete: Option<Hook<dyn Fn()>>,
    #[serde(skip)]
    pub(crate) on_update: Option<Hook<dyn Fn(f64, &AnimValues)>>,
}

impl AnimationSpec {
    pub fn new(from: AnimValues, to: AnimValues, duration_secs: f64) -> Self {
        Self {
            from,
            to,
            duration: duration_secs,
            easing: Ease::Linear,
            auto_start: true,
            looping: false,
            reverse: false,
            delay: 0.0,
            on_complete: None,
            on_update: None,
        }
    }

    pub fn easing(mut self, easing: Ease) -> Self {
        self.easing = easing;
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn delay(mut self, delay_secs: f64) -> Self {
        self.delay = delay_secs;
        self
    }

    /// Called once each time the animation runs to completion.
    pub fn on_complete(mut self, f: impl Fn() + 'static) -> Self {
        let f: Rc<dyn Fn()> = Rc::new(f);
        self.on_complete = Some(Hook(f));
        self
    }

    /// Called every advanced frame with un-eased progress and the interpolated values.
    pub fn on_update(mut self, f: impl Fn(f64, &AnimValues) + 'static) -> Self {
        let f: Rc<dyn Fn(f64, &AnimValues)> = Rc::new(f);
        self.on_update = Some(Hook(f));
        self
    }

    pub fn validate(&self) -> StageResult<()> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(StageError::validation(format!(
                "animation duration must be > 0 seconds, got {}",
                self.duration
            )));
        }
        if !(self.delay.is_finite() && self.delay >= 0.0) {
            return Err(StageError::validation(format!(
                "animation delay must be >= 0 seconds, got {}",
                self.delay
            )));
        }
        Ok(())
    }
}

/// Observable lifecycle phase of an [`AnimationState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationPhase {
    /// Never started (`autoStart: false` and no `start()` yet).
    Idle,
    /// Playing, but the start delay has not elapsed.
    Delaying,
    /// Running from `from` towards `to`.
    Playing,
    /// Running from `to` back towards `from` (reverse mode).
    Reversing,
    Paused,
    Completed,
}

/// Result of one [`AnimationState::tick`] that advanced the tween.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationStep {
    /// Un-eased progress of the current pass, in `[0, 1]`.
    pub progress: f64,
    pub values: AnimValues,
    /// This step finished the animation (and fired `on_complete`).
    pub completed: bool,
}

/// Per-instance animation runtime.
///
/// Counters survive re-renders of the owning element; only [`AnimationState::update_spec`] is
/// applied when the declared spec changes.
#[derive(Debug)]
pub struct AnimationState {
    spec: AnimationSpec,
    elapsed: f64,
    delay_elapsed: f64,
    reversing: bool,
    started: bool,
    playing: bool,
    completed: bool,
    current: AnimValues,
    version: u64,
}

impl AnimationState {
    pub fn new(spec: AnimationSpec) -> StageResult<Self> {
        spec.validate()?;
        Ok(Self {
            playing: spec.auto_start,
            current: spec.from.clone(),
            spec,
            elapsed: 0.0,
            delay_elapsed: 0.0,
            reversing: false,
            started: false,
            completed: false,
            version: 0,
        })
    }

    pub fn spec(&self) -> &AnimationSpec {
        &self.spec
    }

    /// Swap in new parameters while keeping elapsed time and direction.
    pub fn update_spec(&mut self, spec: AnimationSpec) -> StageResult<()> {
        spec.validate()?;
        self.spec = spec;
        Ok(())
    }

    pub fn phase(&self) -> AnimationPhase {
        if self.completed {
            AnimationPhase::Completed
        } else if !self.playing {
            if self.started || self.delay_elapsed > 0.0 {
                AnimationPhase::Paused
            } else {
                AnimationPhase::Idle
            }
        } else if self.delay_elapsed < self.spec.delay {
            AnimationPhase::Delaying
        } else if self.spec.reverse && self.reversing {
            AnimationPhase::Reversing
        } else {
            AnimationPhase::Playing
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Un-eased progress of the current pass.
    pub fn progress(&self) -> f64 {
        (self.elapsed / self.spec.duration).clamp(0.0, 1.0)
    }

    pub fn current_values(&self) -> &AnimValues {
        &self.current
    }

    /// Bumped whenever [`Self::current_values`] changes.
    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    /// Advance by `dt` seconds. Returns `None` when nothing moved (paused, completed or still
    /// inside the start delay).
    pub fn tick(&mut self, dt: f64) -> Option<AnimationStep> {
        if !self.playing {
            return None;
        }
        if self.delay_elapsed < self.spec.delay {
            self.delay_elapsed += dt;
            return None;
        }

        self.started = true;
        self.elapsed += dt;
        let progress = (self.elapsed / self.spec.duration).min(1.0);
        let eased = self.spec.easing.apply(progress);
        let (source, target) = if self.spec.reverse && self.reversing {
            (&self.spec.to, &self.spec.from)
        } else {
            (&self.spec.from, &self.spec.to)
        };
        let values = AnimValues::lerp(source, target, eased);
        self.set_current(values.clone());

        if let Some(cb) = self.spec.on_update.clone() {
            cb(progress, &values);
        }

        let mut completed = false;
        if self.elapsed >= self.spec.duration {
            if self.spec.reverse {
                if self.spec.looping {
                    self.reversing = !self.reversing;
                    self.elapsed = 0.0;
                } else if !self.reversing {
                    self.reversing = true;
                    self.elapsed = 0.0;
                } else {
                    completed = self.finish();
                }
            } else if self.spec.looping {
                self.elapsed = 0.0;
            } else {
                completed = self.finish();
            }
        }

        Some(AnimationStep {
            progress,
            values,
            completed,
        })
    }

    fn finish(&mut self) -> bool {
        self.playing = false;
        if self.completed {
            return false;
        }
        self.completed = true;
        tracing::debug!("animation completed");
        if let Some(cb) = self.spec.on_complete.clone() {
            cb();
        }
        true
    }

    fn set_current(&mut self, values: AnimValues) {
        self.current = values;
        self.version += 1;
    }

    /// Start playback. Counters are reset only if the animation has not begun yet; a
    /// completed animation stays completed until [`Self::reset`].
    pub fn start(&mut self) {
        if self.playing || self.completed {
            return;
        }
        if !self.started {
            self.reset();
        }
        self.playing = true;
    }

    /// Alias of [`Self::pause`].
    pub fn stop(&mut self) {
        self.pause();
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Continue after [`Self::pause`]; a completed animation stays completed.
    pub fn resume(&mut self) {
        if !self.completed {
            self.playing = true;
        }
    }

    /// Zero all counters and restore the `from` values. Playback state is left alone.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.delay_elapsed = 0.0;
        self.reversing = false;
        self.started = false;
        self.completed = false;
        self.set_current(self.spec.from.clone());
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/state.rs"]
mod tests;
