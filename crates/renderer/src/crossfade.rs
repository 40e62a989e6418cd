//! The dual-slot crossfade state machine.
//!
//! `Crossfader` owns the active playlist, the pulse profile, the animation
//! clock, and the two slot roles. It is deliberately GPU-free: the engine
//! feeds it trigger events and load completions and reads back opacities
//! and [`LoadRequest`]s, so the whole fade lifecycle is testable on the CPU.

use std::time::Instant;

use playlist::{ImageSource, IndexPicker, Playlist, PulseProfile, SelectionMode};

use crate::timeline::{FadeClock, FadeSession};
use crate::types::SLOT_COUNT;

/// Attempts per transition before the slot is left showing its old image.
const MAX_LOAD_ATTEMPTS: u32 = 3;
/// Rewind memory; old entries beyond this are forgotten.
const HISTORY_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NavDirection {
    Forward,
    Back,
}

/// One fade-triggering event. At most one is processed per frame; the
/// precedence is playlist change over manual navigation over auto-advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Playlist(usize),
    Manual(NavDirection),
    Auto,
}

/// Applies the per-frame trigger precedence rule.
pub(crate) fn select_trigger(
    playlist_change: Option<usize>,
    manual: Option<NavDirection>,
    auto_due: bool,
) -> Option<Trigger> {
    if let Some(category) = playlist_change {
        Some(Trigger::Playlist(category))
    } else if let Some(direction) = manual {
        Some(Trigger::Manual(direction))
    } else if auto_due {
        Some(Trigger::Auto)
    } else {
        None
    }
}

/// Instruction for the texture pipeline: bind `source` (playlist entry
/// `index`) into `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadRequest {
    pub slot: usize,
    pub index: usize,
    pub source: ImageSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Both slots are being (re)loaded after start-up or a playlist change.
    Bootstrapping { remaining: usize },
    /// Settled display; opacities clamped to their last settled values.
    Steady,
    /// The next image is loading; the display holds the previous frame.
    AwaitingLoad,
    /// A blend is in progress.
    Fading,
}

pub(crate) struct Crossfader {
    playlist: Playlist,
    picker: IndexPicker,
    profile: PulseProfile,
    clock: FadeClock,
    session: Option<FadeSession>,
    phase: Phase,
    /// Slot currently (or most recently) fading in; roles ping-pong.
    fading_in: usize,
    slot_indices: [Option<usize>; SLOT_COUNT],
    /// Opacities held while no blend is advancing.
    settled: [f32; SLOT_COUNT],
    history: Vec<usize>,
    attempts: u32,
    fade_out_scale: f32,
}

impl Crossfader {
    pub fn new(
        playlist: Playlist,
        profile: PulseProfile,
        mode: SelectionMode,
        seed: Option<u64>,
        fade_out_scale: f32,
        now: Instant,
    ) -> (Self, Vec<LoadRequest>) {
        let picker = match seed {
            Some(seed) => IndexPicker::with_seed(mode, seed),
            None => IndexPicker::new(mode),
        };
        let mut fader = Self {
            playlist,
            picker,
            profile,
            clock: FadeClock::new(now),
            session: None,
            phase: Phase::Steady,
            fading_in: 1,
            slot_indices: [None; SLOT_COUNT],
            settled: [1.0, 0.0],
            history: Vec::new(),
            attempts: 0,
            fade_out_scale,
        };
        let requests = fader.bootstrap();
        (fader, requests)
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn pause(&mut self, now: Instant) {
        self.clock.pause(now);
    }

    pub fn resume(&mut self, now: Instant) {
        self.clock.resume(now);
    }

    /// The playlist index currently on screen, i.e. the one a next pick must
    /// not repeat.
    pub fn visible_index(&self) -> Option<usize> {
        self.slot_indices[self.fading_in]
    }

    /// Clamps a finished blend to its settled opacities. Call once per frame
    /// before evaluating triggers.
    pub fn settle_if_finished(&mut self, now: Instant) {
        if self.phase != Phase::Fading {
            return;
        }
        let Some(session) = self.session else {
            self.phase = Phase::Steady;
            return;
        };
        let (_, finished) = session.mixes(self.clock.elapsed(now), self.fade_out_scale);
        if finished {
            self.settle();
        }
    }

    /// An auto-advance is due once the settled session's duration has fully
    /// elapsed. A paused clock freezes this along with the blend.
    pub fn auto_due(&self, now: Instant) -> bool {
        if self.phase != Phase::Steady {
            return false;
        }
        match self.session {
            Some(session) => self.clock.elapsed(now) >= session.duration,
            None => false,
        }
    }

    pub fn advance_auto(&mut self, now: Instant) -> Option<LoadRequest> {
        if !self.auto_due(now) {
            return None;
        }
        Some(self.begin_transition(None))
    }

    /// Manual navigation. Forward picks a fresh index; Back revisits the
    /// most recently replaced one. A trigger landing mid-fade settles the
    /// fade first; one landing during `AwaitingLoad` supersedes the pending
    /// load.
    pub fn navigate(&mut self, direction: NavDirection, _now: Instant) -> Option<LoadRequest> {
        match self.phase {
            Phase::Bootstrapping { .. } => return None,
            Phase::Fading => self.settle(),
            Phase::Steady | Phase::AwaitingLoad => {}
        }
        let forced = match direction {
            NavDirection::Forward => None,
            NavDirection::Back => self.history.pop(),
        };
        Some(self.begin_transition(forced))
    }

    /// Replaces the active playlist: discards any in-flight fade, reseeds
    /// the selection order, and reloads both slots with fresh indices.
    pub fn set_playlist(&mut self, playlist: Playlist) -> Vec<LoadRequest> {
        tracing::info!(category = playlist.name(), "switching playlist");
        self.playlist = playlist;
        self.bootstrap()
    }

    /// Replaces the pacing profile; takes effect from the next fade.
    pub fn set_profile(&mut self, mut profile: PulseProfile) {
        tracing::info!(profile = profile.name(), "switching pulse profile");
        profile.reset();
        self.profile = profile;
    }

    /// Delivery of a finished texture load for `slot`.
    ///
    /// Stale completions cannot reach this point: a superseded load's
    /// channel is dropped by the loader, so whatever arrives here is the
    /// slot's latest desired image.
    pub fn on_load_complete(&mut self, slot: usize, index: usize, now: Instant) {
        match self.phase {
            Phase::Bootstrapping { remaining } => {
                self.slot_indices[slot] = Some(index);
                if remaining <= 1 {
                    self.fading_in = 1;
                    self.settled = [1.0, 0.0];
                    self.start_session(now);
                } else {
                    self.phase = Phase::Bootstrapping {
                        remaining: remaining - 1,
                    };
                }
            }
            Phase::AwaitingLoad => {
                if let Some(previous) = self.slot_indices[self.fading_in] {
                    self.push_history(previous);
                }
                self.slot_indices[slot] = Some(index);
                self.fading_in = slot;
                self.start_session(now);
            }
            Phase::Steady | Phase::Fading => {
                tracing::debug!(slot, index, "ignoring texture load outside a transition");
            }
        }
    }

    /// A failed load retries with a different index a bounded number of
    /// times, then leaves the slot showing its previous image.
    pub fn on_load_failed(&mut self, slot: usize, failed_index: usize, _now: Instant) -> Option<LoadRequest> {
        self.attempts += 1;
        if self.attempts >= MAX_LOAD_ATTEMPTS {
            tracing::warn!(
                slot,
                attempts = self.attempts,
                "giving up on texture load; keeping current image"
            );
            match self.phase {
                Phase::Bootstrapping { remaining } => {
                    // Treat the slot as done so start-up is not wedged; it
                    // keeps its placeholder texture.
                    self.attempts = 0;
                    if remaining <= 1 {
                        self.fading_in = 1;
                        self.settled = [1.0, 0.0];
                        self.phase = Phase::Steady;
                    } else {
                        self.phase = Phase::Bootstrapping {
                            remaining: remaining - 1,
                        };
                    }
                }
                Phase::AwaitingLoad => {
                    self.phase = Phase::Steady;
                }
                Phase::Steady | Phase::Fading => {}
            }
            return None;
        }
        let index = self.picker.next(self.playlist.len(), Some(failed_index));
        let source = self.playlist.image(index)?.clone();
        Some(LoadRequest {
            slot,
            index,
            source,
        })
    }

    /// Per-slot opacities for this frame. During `AwaitingLoad` the previous
    /// settled values are held so the display never flickers.
    pub fn opacities(&self, now: Instant) -> [f32; SLOT_COUNT] {
        match (self.phase, self.session) {
            (Phase::Fading, Some(session)) => {
                session
                    .mixes(self.clock.elapsed(now), self.fade_out_scale)
                    .0
            }
            _ => self.settled,
        }
    }

    fn bootstrap(&mut self) -> Vec<LoadRequest> {
        self.picker.reset(self.playlist.len());
        self.history.clear();
        self.session = None;
        self.slot_indices = [None; SLOT_COUNT];
        self.settled = [1.0, 0.0];
        self.fading_in = 1;
        self.attempts = 0;
        self.phase = Phase::Bootstrapping {
            remaining: SLOT_COUNT,
        };
        let first = self.picker.next(self.playlist.len(), None);
        let second = self.picker.next(self.playlist.len(), Some(first));
        [(0, first), (1, second)]
            .into_iter()
            .filter_map(|(slot, index)| {
                Some(LoadRequest {
                    slot,
                    index,
                    source: self.playlist.image(index)?.clone(),
                })
            })
            .collect()
    }

    fn begin_transition(&mut self, forced_index: Option<usize>) -> LoadRequest {
        let target_slot = 1 - self.fading_in;
        let exclude = self.visible_index();
        let index = match forced_index {
            Some(forced) if Some(forced) != exclude && forced < self.playlist.len() => forced,
            _ => self.picker.next(self.playlist.len(), exclude),
        };
        self.attempts = 0;
        self.phase = Phase::AwaitingLoad;
        let source = self
            .playlist
            .image(index)
            .expect("picker indices stay within the playlist")
            .clone();
        LoadRequest {
            slot: target_slot,
            index,
            source,
        }
    }

    fn start_session(&mut self, now: Instant) {
        let duration = self.profile.next_duration();
        self.session = Some(FadeSession {
            duration,
            fading_in: self.fading_in,
        });
        self.clock.restart(now);
        self.phase = Phase::Fading;
    }

    fn settle(&mut self) {
        if let Some(session) = self.session {
            self.settled = [0.0; SLOT_COUNT];
            self.settled[session.fading_in] = 1.0;
        }
        self.phase = Phase::Steady;
    }

    fn push_history(&mut self, index: usize) {
        self.history.push(index);
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn playlist(count: usize) -> Playlist {
        let sources = (0..count)
            .map(|index| ImageSource::parse(&format!("images/{index}.png")))
            .collect();
        Playlist::new("test", sources).unwrap()
    }

    fn profile() -> PulseProfile {
        PulseProfile::new(
            "pulse",
            vec![Duration::from_millis(1000), Duration::from_millis(2000)],
        )
        .unwrap()
    }

    fn booted(count: usize, now: Instant) -> Crossfader {
        let (mut fader, requests) = Crossfader::new(
            playlist(count),
            profile(),
            SelectionMode::Random,
            Some(42),
            1.0,
            now,
        );
        for request in requests {
            fader.on_load_complete(request.slot, request.index, now);
        }
        fader
    }

    #[test]
    fn bootstrap_requests_two_distinct_indices() {
        let now = Instant::now();
        let (_, requests) = Crossfader::new(
            playlist(4),
            profile(),
            SelectionMode::Random,
            Some(1),
            1.0,
            now,
        );
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].slot, 0);
        assert_eq!(requests[1].slot, 1);
        assert_ne!(requests[0].index, requests[1].index);
    }

    #[test]
    fn bootstrap_leads_into_the_first_fade() {
        let now = Instant::now();
        let fader = booted(4, now);
        assert_eq!(fader.phase(), Phase::Fading);
        let opacities = fader.opacities(now);
        assert!((opacities[0] - 1.0).abs() < 1e-6);
        assert!(opacities[1].abs() < 1e-6);
    }

    #[test]
    fn pulse_scenario_rotates_durations() {
        let start = Instant::now();
        let mut fader = booted(4, start);
        // First session consumes 1000ms; nothing is due before that.
        let early = start + Duration::from_millis(999);
        fader.settle_if_finished(early);
        assert!(!fader.auto_due(early));

        let t1 = start + Duration::from_millis(1000);
        fader.settle_if_finished(t1);
        assert_eq!(fader.phase(), Phase::Steady);
        assert!(fader.auto_due(t1));
        let request = fader.advance_auto(t1).expect("auto-advance request");
        assert_ne!(Some(request.index), fader.visible_index());
        fader.on_load_complete(request.slot, request.index, t1);
        assert_eq!(fader.phase(), Phase::Fading);

        // Second session runs on the next pulse duration, 2000ms.
        let mid = t1 + Duration::from_millis(1500);
        fader.settle_if_finished(mid);
        assert!(!fader.auto_due(mid));
        let t2 = t1 + Duration::from_millis(2000);
        fader.settle_if_finished(t2);
        assert!(fader.auto_due(t2));
    }

    #[test]
    fn auto_advance_never_repeats_the_visible_index() {
        let start = Instant::now();
        let mut fader = booted(5, start);
        let mut now = start;
        for _ in 0..50 {
            now += Duration::from_millis(2100);
            fader.settle_if_finished(now);
            if let Some(request) = fader.advance_auto(now) {
                assert_ne!(Some(request.index), fader.visible_index());
                fader.on_load_complete(request.slot, request.index, now);
            }
        }
    }

    #[test]
    fn slots_ping_pong_between_fades() {
        let start = Instant::now();
        let mut fader = booted(4, start);
        let mut now = start;
        let mut expected = 0;
        for _ in 0..4 {
            now += Duration::from_millis(2100);
            fader.settle_if_finished(now);
            let request = fader.advance_auto(now).expect("due");
            assert_eq!(request.slot, expected);
            fader.on_load_complete(request.slot, request.index, now);
            expected = 1 - expected;
        }
    }

    #[test]
    fn paused_clock_freezes_auto_advance() {
        let start = Instant::now();
        let mut fader = booted(4, start);
        fader.pause(start + Duration::from_millis(100));
        let later = start + Duration::from_millis(10_000);
        fader.settle_if_finished(later);
        assert!(!fader.auto_due(later));
        assert_eq!(fader.phase(), Phase::Fading);
    }

    #[test]
    fn manual_advance_while_paused_fades_only_after_resume() {
        let start = Instant::now();
        let mut fader = booted(4, start);
        fader.pause(start + Duration::from_millis(100));
        let request = fader
            .navigate(NavDirection::Forward, start + Duration::from_millis(200))
            .expect("manual request");
        let loaded_at = start + Duration::from_millis(300);
        fader.on_load_complete(request.slot, request.index, loaded_at);
        assert_eq!(fader.phase(), Phase::Fading);

        // Visual progress stays frozen at zero while paused.
        let held = fader.opacities(start + Duration::from_millis(5000));
        assert!(held[request.slot].abs() < 1e-6);

        fader.resume(start + Duration::from_millis(6000));
        let after = fader.opacities(start + Duration::from_millis(6500));
        assert!(after[request.slot] > 0.0);
    }

    #[test]
    fn rewind_revisits_the_previous_image() {
        let start = Instant::now();
        let mut fader = booted(5, start);
        let mut now = start;

        now += Duration::from_millis(2100);
        fader.settle_if_finished(now);
        let first = fader.advance_auto(now).expect("due");
        let replaced = fader.visible_index().unwrap();
        fader.on_load_complete(first.slot, first.index, now);

        now += Duration::from_millis(2100);
        let back = fader.navigate(NavDirection::Back, now).expect("rewind");
        assert_eq!(back.index, replaced);
    }

    #[test]
    fn manual_trigger_mid_fade_settles_first() {
        let start = Instant::now();
        let mut fader = booted(4, start);
        let mid = start + Duration::from_millis(500);
        let request = fader.navigate(NavDirection::Forward, mid).expect("manual");
        assert_eq!(fader.phase(), Phase::AwaitingLoad);
        // The display holds the settled state of the interrupted fade.
        let held = fader.opacities(mid);
        assert_eq!(held, [0.0, 1.0]);
        fader.on_load_complete(request.slot, request.index, mid);
        assert_eq!(fader.phase(), Phase::Fading);
    }

    #[test]
    fn playlist_change_mid_fade_reloads_both_slots() {
        let start = Instant::now();
        let mut fader = booted(4, start);
        let requests = fader.set_playlist(playlist(6));
        assert_eq!(fader.phase(), Phase::Bootstrapping { remaining: 2 });
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].index, requests[1].index);
        for request in requests {
            fader.on_load_complete(request.slot, request.index, start);
        }
        assert_eq!(fader.phase(), Phase::Fading);
    }

    #[test]
    fn load_failure_retries_then_gives_up() {
        let start = Instant::now();
        let mut fader = booted(4, start);
        let mut now = start + Duration::from_millis(2100);
        fader.settle_if_finished(now);
        let request = fader.advance_auto(now).expect("due");

        let retry = fader
            .on_load_failed(request.slot, request.index, now)
            .expect("first retry");
        assert_ne!(retry.index, request.index);
        now += Duration::from_millis(10);
        let second = fader
            .on_load_failed(retry.slot, retry.index, now)
            .expect("second retry");
        now += Duration::from_millis(10);
        assert!(fader
            .on_load_failed(second.slot, second.index, now)
            .is_none());
        assert_eq!(fader.phase(), Phase::Steady);
    }

    #[test]
    fn single_image_playlist_keeps_cycling() {
        let start = Instant::now();
        let mut fader = booted(1, start);
        let mut now = start;
        for _ in 0..3 {
            now += Duration::from_millis(2100);
            fader.settle_if_finished(now);
            if let Some(request) = fader.advance_auto(now) {
                assert_eq!(request.index, 0);
                fader.on_load_complete(request.slot, request.index, now);
            }
        }
    }

    #[test]
    fn trigger_precedence_prefers_playlist_then_manual() {
        assert_eq!(
            select_trigger(Some(2), Some(NavDirection::Forward), true),
            Some(Trigger::Playlist(2))
        );
        assert_eq!(
            select_trigger(None, Some(NavDirection::Back), true),
            Some(Trigger::Manual(NavDirection::Back))
        );
        assert_eq!(select_trigger(None, None, true), Some(Trigger::Auto));
        assert_eq!(select_trigger(None, None, false), None);
    }
}
