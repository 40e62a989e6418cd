use std::time::{Duration, Instant};

use crate::types::SLOT_COUNT;

/// Smoothstep easing: monotone on [0, 1] with zero slope at both ends, so
/// back-to-back fades loop seamlessly.
pub(crate) fn smoothstep(t: f32) -> f32 {
    let clamped = t.clamp(0.0, 1.0);
    clamped * clamped * (3.0 - 2.0 * clamped)
}

/// Wall-clock fade timer with pause/resume.
///
/// Invariant: `paused_at` is `Some` iff the clock is paused; while paused,
/// [`elapsed`](Self::elapsed) is measured against the frozen pause instant
/// and therefore stable across calls.
pub(crate) struct FadeClock {
    start: Instant,
    paused_at: Option<Instant>,
}

impl FadeClock {
    pub fn new(now: Instant) -> Self {
        Self {
            start: now,
            paused_at: None,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let reference = self.paused_at.unwrap_or(now);
        reference.saturating_duration_since(self.start)
    }

    /// Idempotent: pausing an already paused clock keeps the first freeze
    /// instant.
    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Shifts the start forward by the paused span so the elapsed value
    /// observed right before the pause is preserved.
    pub fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.start += now.saturating_duration_since(paused_at);
        }
    }

    /// Rewinds elapsed time to zero. A paused clock stays paused, frozen at
    /// the new origin.
    pub fn restart(&mut self, now: Instant) {
        self.start = now;
        if self.paused_at.is_some() {
            self.paused_at = Some(now);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    #[cfg(test)]
    pub fn paused_at(&self) -> Option<Instant> {
        self.paused_at
    }
}

/// One crossfade in progress: which slot fades in and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FadeSession {
    pub duration: Duration,
    pub fading_in: usize,
}

impl FadeSession {
    /// Opacities for both slots at `elapsed`, plus whether the fade is done.
    /// The fading-out slot may be scaled below `1 - e(p)` for a stylistic
    /// fade floor.
    pub fn mixes(&self, elapsed: Duration, fade_out_scale: f32) -> ([f32; SLOT_COUNT], bool) {
        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32().max(f32::EPSILON);
        let mix = smoothstep(progress);
        let mut opacities = [0.0; SLOT_COUNT];
        opacities[self.fading_in] = mix;
        opacities[1 - self.fading_in] = (1.0 - mix) * fade_out_scale.clamp(0.0, 1.0);
        (opacities, progress >= 1.0)
    }
}
