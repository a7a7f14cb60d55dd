use std::collections::HashSet;
use std::sync::Arc;

use super::EventSchedule;
use crate::audio::{VoiceParameters, pitch_shift};
use crate::engine::AudioEngine;
use crate::events::{BookingHandle, EventId, RhythmEvent};

/// Engine time at which a cue at song time `event_time` has to start, for a
/// commit made at engine time `t0` while the playhead was at `p0`.
///
/// Song time advances `speed` units per engine second, hence the division.
pub fn booked_time(t0: f64, lookahead: f64, p0: f64, event_time: f64, speed: f64) -> f64 {
    t0 + lookahead + (event_time - p0) / speed
}

#[derive(Debug, Clone)]
struct Booking {
    event_id: EventId,
    engine_time: f64,
    handle: BookingHandle,
}

/// Bookings armed on the engine for the current play run. Only the
/// scheduler ever sees these.
#[derive(Debug, Default)]
struct ScheduleCommitment {
    bookings: Vec<Booking>,
}

/// A cue still waiting on the engine, as reported to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedCue {
    pub event_id: EventId,
    pub engine_time: f64,
}

/// Bridges song time to engine time by pre-booking every remaining cue of
/// a play run with a fixed lookahead.
///
/// Without an engine every operation is a no-op, so playback can carry on
/// silently.
pub struct AudioScheduler {
    engine: Option<Arc<dyn AudioEngine>>,
    lookahead: f64,
    reschedule_guard: f64,
    commitment: Option<ScheduleCommitment>,
}

impl AudioScheduler {
    pub fn new(engine: Option<Arc<dyn AudioEngine>>, lookahead: f64, reschedule_guard: f64) -> Self {
        Self {
            engine,
            lookahead: lookahead.max(0.0),
            reschedule_guard: reschedule_guard.max(0.0),
            commitment: None,
        }
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn is_committed(&self) -> bool {
        self.commitment.is_some()
    }

    /// Books every cue from `position` onwards. Does nothing if this run is
    /// already committed. Returns how many cues were booked.
    pub fn commit(&mut self, schedule: &EventSchedule, position: f64, speed: f64) -> usize {
        if self.commitment.is_some() {
            tracing::debug!("commit skipped, play run already committed");
            return 0;
        }
        let Some(engine) = self.engine.clone() else {
            return 0;
        };

        let t0 = engine.now();
        let bookings = self.book(engine.as_ref(), schedule.events_from(position), position, speed, t0);
        let booked = bookings.len();
        tracing::debug!(position, speed, t0, booked, "committed cues");

        self.commitment = Some(ScheduleCommitment { bookings });
        booked
    }

    /// Forgets the current commitment and withdraws every booking that has
    /// not started. Sounding voices are left to decay. Returns how many
    /// bookings were withdrawn.
    pub fn cancel(&mut self) -> usize {
        let Some(commitment) = self.commitment.take() else {
            return 0;
        };
        let Some(engine) = &self.engine else {
            return 0;
        };

        let now = engine.now();
        let mut withdrawn = 0;
        for booking in commitment.bookings {
            if booking.engine_time > now {
                withdrawn += 1;
            }
            engine.cancel(booking.handle);
        }
        tracing::debug!(withdrawn, "cancelled commitment");
        withdrawn
    }

    /// Re-books the remaining cues for a new speed. Bookings due within the
    /// reschedule guard are left alone; every other unfired booking is
    /// withdrawn and booked again at the new speed, including cues the
    /// playhead has passed whose onset is still inside the lookahead.
    /// Returns how many cues were rebooked.
    pub fn retarget(&mut self, schedule: &EventSchedule, position: f64, speed: f64) -> usize {
        let Some(engine) = self.engine.clone() else {
            return 0;
        };
        let Some(previous) = self.commitment.take() else {
            return self.commit(schedule, position, speed);
        };

        let now = engine.now();
        let mut kept = Vec::new();
        let mut withdrawn = HashSet::new();
        for booking in previous.bookings {
            if booking.engine_time <= now {
                continue;
            }
            if booking.engine_time - now <= self.reschedule_guard {
                kept.push(booking);
            } else {
                engine.cancel(booking.handle);
                withdrawn.insert(booking.event_id);
            }
        }

        let shift = pitch_shift(speed);
        let mut fresh = Vec::new();
        let behind = schedule
            .events()
            .iter()
            .filter(|e| e.timestamp < position && withdrawn.contains(&e.id));
        for event in behind {
            let at = booked_time(now, self.lookahead, position, event.timestamp, speed).max(now);
            fresh.extend(self.book_one(engine.as_ref(), event, at, shift));
        }

        let imminent: HashSet<EventId> = kept.iter().map(|b| b.event_id.clone()).collect();
        let remaining: Vec<RhythmEvent> = schedule
            .events_from(position)
            .iter()
            .filter(|e| !imminent.contains(&e.id))
            .cloned()
            .collect();
        fresh.extend(self.book(engine.as_ref(), &remaining, position, speed, now));
        let rebooked = fresh.len();
        tracing::debug!(position, speed, kept = kept.len(), rebooked, "retargeted cues");

        kept.extend(fresh);
        kept.sort_by(|a, b| a.engine_time.total_cmp(&b.engine_time));
        self.commitment = Some(ScheduleCommitment { bookings: kept });
        rebooked
    }

    /// Cues of the current run that have not started yet, earliest first.
    pub fn commitment(&self) -> Vec<CommittedCue> {
        let (Some(commitment), Some(engine)) = (&self.commitment, &self.engine) else {
            return Vec::new();
        };
        let now = engine.now();
        commitment
            .bookings
            .iter()
            .filter(|b| b.engine_time > now)
            .map(|b| CommittedCue {
                event_id: b.event_id.clone(),
                engine_time: b.engine_time,
            })
            .collect()
    }

    pub fn set_master_gain(&self, gain: f32) {
        if let Some(engine) = &self.engine {
            engine.set_master_gain(gain);
        }
    }

    fn book(
        &self,
        engine: &dyn AudioEngine,
        events: &[RhythmEvent],
        p0: f64,
        speed: f64,
        t0: f64,
    ) -> Vec<Booking> {
        let shift = pitch_shift(speed);
        let mut bookings = Vec::with_capacity(events.len());

        for event in events {
            let at = booked_time(t0, self.lookahead, p0, event.timestamp, speed);
            if at <= t0 {
                // Already due: late cues are dropped, never caught up.
                continue;
            }
            bookings.extend(self.book_one(engine, event, at, shift));
        }

        bookings
    }

    fn book_one(
        &self,
        engine: &dyn AudioEngine,
        event: &RhythmEvent,
        at: f64,
        shift: f64,
    ) -> Option<Booking> {
        let voice = VoiceParameters::for_cue(event.category, event.intensity, shift);
        match engine.book_one_shot(voice, at) {
            Ok(handle) => Some(Booking {
                event_id: event.id.clone(),
                engine_time: at,
                handle,
            }),
            Err(e) => {
                tracing::warn!(id = %event.id, "failed to book cue: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OfflineEngine;
    use crate::events::RhythmCategory;
    use float_cmp::approx_eq;

    const LOOKAHEAD: f64 = 0.05;

    fn swing() -> EventSchedule {
        EventSchedule::load(
            vec![
                RhythmEvent::new("r1", 0.5, RhythmCategory::Kick, 0.8, "Leg Load"),
                RhythmEvent::new("r2", 0.9, RhythmCategory::Bass, 0.9, "Hip Fire"),
                RhythmEvent::new("r3", 1.2, RhythmCategory::Snare, 0.9, "Shoulder Turn"),
                RhythmEvent::new("r4", 1.4, RhythmCategory::Crash, 1.0, "Contact"),
            ],
            2.5,
        )
    }

    fn scheduler(engine: &Arc<OfflineEngine>) -> AudioScheduler {
        AudioScheduler::new(Some(engine.clone()), LOOKAHEAD, LOOKAHEAD)
    }

    fn ids(cues: &[CommittedCue]) -> Vec<&str> {
        cues.iter().map(|c| c.event_id.0.as_str()).collect()
    }

    #[test]
    fn commit_applies_translation_law() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        engine.advance_to(3.0);
        let mut scheduler = scheduler(&engine);

        assert_eq!(scheduler.commit(&swing(), 0.0, 1.0), 4);
        let cues = scheduler.commitment();
        assert_eq!(ids(&cues), vec!["r1", "r2", "r3", "r4"]);
        for (cue, offset) in cues.iter().zip([0.5, 0.9, 1.2, 1.4]) {
            assert!(approx_eq!(
                f64,
                cue.engine_time,
                3.0 + LOOKAHEAD + offset,
                epsilon = 1e-9
            ));
        }
        assert_eq!(engine.pending().len(), 4);
    }

    #[test]
    fn half_speed_doubles_wall_offsets_and_lowers_pitch() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = scheduler(&engine);
        scheduler.commit(&swing(), 0.0, 0.5);

        let cues = scheduler.commitment();
        assert!(approx_eq!(f64, cues[3].engine_time, LOOKAHEAD + 2.8, epsilon = 1e-9));

        let (_, _, voice) = engine.pending()[0];
        let crate::audio::VoiceParameters::Kick(tone) = voice else {
            panic!("first cue should be the kick");
        };
        let expected = 150.0 * 1.4 * 2.0_f64.powf(-0.5 * 0.167);
        assert!(approx_eq!(f32, tone.frequency, expected as f32, epsilon = 1e-3));
    }

    #[test]
    fn commit_from_mid_recording_skips_past_cues() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = scheduler(&engine);
        assert_eq!(scheduler.commit(&swing(), 1.0, 1.0), 2);
        let cues = scheduler.commitment();
        assert_eq!(ids(&cues), vec!["r3", "r4"]);
        assert!(approx_eq!(f64, cues[0].engine_time, LOOKAHEAD + 0.2, epsilon = 1e-9));
    }

    #[test]
    fn second_commit_is_a_no_op() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = scheduler(&engine);
        scheduler.commit(&swing(), 0.0, 1.0);
        assert_eq!(scheduler.commit(&swing(), 0.0, 1.0), 0);
        assert_eq!(engine.pending().len(), 4);
    }

    #[test]
    fn due_cues_are_dropped_without_lookahead() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = AudioScheduler::new(Some(engine.clone()), 0.0, 0.0);
        // r2 sits exactly on the playhead, so its booking would not be in
        // the future.
        assert_eq!(scheduler.commit(&swing(), 0.9, 1.0), 2);
        assert_eq!(ids(&scheduler.commitment()), vec!["r3", "r4"]);
    }

    #[test]
    fn cancel_withdraws_unfired_bookings_only() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = scheduler(&engine);
        scheduler.commit(&swing(), 0.0, 1.0);
        engine.advance_to(0.7);
        assert_eq!(engine.fired().len(), 1);

        assert_eq!(scheduler.cancel(), 3);
        assert!(!scheduler.is_committed());
        assert!(engine.pending().is_empty());
        assert_eq!(engine.active_voices(), 1);

        engine.advance_to(3.0);
        assert_eq!(engine.fired().len(), 1);
    }

    #[test]
    fn cancel_without_commitment_is_a_no_op() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = scheduler(&engine);
        assert_eq!(scheduler.cancel(), 0);
        assert!(scheduler.commitment().is_empty());
    }

    #[test]
    fn empty_schedule_commits_nothing() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = scheduler(&engine);
        assert_eq!(scheduler.commit(&EventSchedule::load(Vec::new(), 1.0), 0.0, 1.0), 0);
        assert!(engine.pending().is_empty());
    }

    #[test]
    fn retarget_rebooks_for_new_speed() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = scheduler(&engine);
        scheduler.commit(&swing(), 0.0, 1.0);

        // Playhead at 0.6 after 0.6 s; the kick has fired.
        engine.advance_to(0.6);
        assert_eq!(scheduler.retarget(&swing(), 0.6, 0.5), 3);

        let cues = scheduler.commitment();
        assert_eq!(ids(&cues), vec!["r2", "r3", "r4"]);
        let now = 0.6;
        for (cue, song_time) in cues.iter().zip([0.9, 1.2, 1.4]) {
            let expected = now + LOOKAHEAD + (song_time - 0.6) / 0.5;
            assert!(approx_eq!(f64, cue.engine_time, expected, epsilon = 1e-4));
        }
        assert_eq!(engine.pending().len(), 3);

        engine.advance_to(5.0);
        let fired: Vec<_> = engine.fired().iter().map(|f| f.voice.category()).collect();
        assert_eq!(
            fired,
            vec![
                RhythmCategory::Kick,
                RhythmCategory::Bass,
                RhythmCategory::Snare,
                RhythmCategory::Crash
            ]
        );
    }

    #[test]
    fn retarget_leaves_imminent_bookings_alone() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = scheduler(&engine);
        scheduler.commit(&swing(), 0.0, 1.0);

        // The kick is booked at 0.55 and now only 0.03 s away.
        engine.advance_to(0.52);
        let kick_handle = engine.pending()[0].0;
        assert_eq!(scheduler.retarget(&swing(), 0.52, 2.0), 3);

        let pending = engine.pending();
        assert_eq!(pending.len(), 4);
        assert_eq!(pending[0].0, kick_handle);

        engine.advance_to(5.0);
        assert_eq!(engine.fired().len(), 4);
    }

    #[test]
    fn retarget_rebooks_passed_cue_still_in_lookahead() {
        let engine = Arc::new(OfflineEngine::new(48000.0));
        let mut scheduler = AudioScheduler::new(Some(engine.clone()), LOOKAHEAD, 0.01);
        scheduler.commit(&swing(), 0.0, 1.0);

        // The playhead has passed the kick at 0.5, its booking at 0.55 has
        // not fired and sits outside the guard.
        engine.advance_to(0.52);
        assert_eq!(scheduler.retarget(&swing(), 0.52, 0.5), 4);

        let cues = scheduler.commitment();
        assert_eq!(ids(&cues), vec!["r1", "r2", "r3", "r4"]);
        assert!(approx_eq!(
            f64,
            cues[0].engine_time,
            0.52 + LOOKAHEAD - 0.02 / 0.5,
            epsilon = 1e-4
        ));

        engine.advance_to(5.0);
        let fired: Vec<_> = engine.fired().iter().map(|f| f.voice.category()).collect();
        assert_eq!(
            fired,
            vec![
                RhythmCategory::Kick,
                RhythmCategory::Bass,
                RhythmCategory::Snare,
                RhythmCategory::Crash
            ]
        );
    }

    #[test]
    fn no_engine_means_no_ops() {
        let mut scheduler = AudioScheduler::new(None, LOOKAHEAD, LOOKAHEAD);
        assert!(!scheduler.has_engine());
        assert_eq!(scheduler.commit(&swing(), 0.0, 1.0), 0);
        assert!(!scheduler.is_committed());
        assert_eq!(scheduler.retarget(&swing(), 0.0, 2.0), 0);
        assert_eq!(scheduler.cancel(), 0);
        scheduler.set_master_gain(0.5);
    }
}
