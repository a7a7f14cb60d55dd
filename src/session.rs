use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::audio::volume_to_gain;
use crate::config::PlayerConfig;
use crate::engine::AudioEngine;
use crate::recording::Recording;
use crate::timing::{
    AudioScheduler, ClockTick, CommittedCue, EventSchedule, PlaybackClock, TimeSource,
};

/// What presentation code gets to see of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub recording_id: String,
    pub position: f64,
    pub duration: f64,
    pub speed: f64,
    pub playing: bool,
    pub volume: u8,
}

/// Lock-free read access to the latest [PlaybackSnapshot], from any thread.
#[derive(Debug, Clone)]
pub struct PlaybackMonitor(Arc<ArcSwap<PlaybackSnapshot>>);

impl PlaybackMonitor {
    fn new(snapshot: PlaybackSnapshot) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(snapshot)))
    }

    fn store(&self, snapshot: PlaybackSnapshot) {
        self.0.store(Arc::new(snapshot));
    }

    pub fn snapshot(&self) -> Arc<PlaybackSnapshot> {
        self.0.load_full()
    }

    pub fn position(&self) -> f64 {
        self.0.load().position
    }

    pub fn is_playing(&self) -> bool {
        self.0.load().playing
    }
}

/// One recording's playback: a clock, its cue list and the scheduler that
/// books those cues, all owned here and nowhere else.
///
/// Every transport command is a clock transition; the `STOPPED -> RUNNING`
/// transitions commit cues exactly once, every transition away from a run
/// cancels them.
pub struct PlaybackSession<T: TimeSource> {
    time: T,
    min_speed: f64,
    recording_id: String,
    clock: PlaybackClock,
    schedule: EventSchedule,
    scheduler: AudioScheduler,
    volume: u8,
    monitor: PlaybackMonitor,
}

impl<T: TimeSource> PlaybackSession<T> {
    pub fn new(
        recording: &Recording,
        time: T,
        engine: Option<Arc<dyn AudioEngine>>,
        config: &PlayerConfig,
    ) -> Self {
        let clock = PlaybackClock::new(recording.duration, 1.0, config.min_speed);
        let schedule = EventSchedule::load(recording.rhythm_track.iter().cloned(), recording.duration);
        let scheduler = AudioScheduler::new(
            engine,
            config.lookahead_secs,
            config.reschedule_guard_secs,
        );
        if !scheduler.has_engine() {
            tracing::warn!("no audio engine, cues will not be heard");
        }
        let volume = config.initial_volume.min(100);
        scheduler.set_master_gain(volume_to_gain(volume));

        let monitor = PlaybackMonitor::new(PlaybackSnapshot {
            recording_id: recording.id.clone(),
            position: 0.0,
            duration: recording.duration,
            speed: clock.speed(),
            playing: false,
            volume,
        });

        Self {
            time,
            min_speed: config.min_speed,
            recording_id: recording.id.clone(),
            clock,
            schedule,
            scheduler,
            volume,
            monitor,
        }
    }

    pub fn monitor(&self) -> PlaybackMonitor {
        self.monitor.clone()
    }

    pub fn position(&self) -> f64 {
        self.clock.position()
    }

    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    pub fn speed(&self) -> f64 {
        self.clock.speed()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_running()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn recording_id(&self) -> &str {
        &self.recording_id
    }

    pub fn schedule(&self) -> &EventSchedule {
        &self.schedule
    }

    /// Cues booked for the current run that have not started yet.
    pub fn commitment(&self) -> Vec<CommittedCue> {
        self.scheduler.commitment()
    }

    /// Starts playing from the current position, or from the top if the
    /// last run reached the end. Returns false if already playing.
    pub fn play(&mut self) -> bool {
        if self.clock.is_running() {
            return false;
        }
        let from = if self.clock.at_end() {
            0.0
        } else {
            self.clock.position()
        };

        // Whatever is left of an ended run's tail goes first.
        self.scheduler.cancel();
        self.clock.start(from, self.time.now());
        self.scheduler
            .commit(&self.schedule, self.clock.position(), self.clock.speed());
        tracing::info!(position = self.clock.position(), "play");
        self.publish();
        true
    }

    /// Returns false if not playing.
    pub fn pause(&mut self) -> bool {
        if !self.clock.is_running() {
            return false;
        }
        self.clock.stop();
        self.scheduler.cancel();
        tracing::info!(position = self.clock.position(), "pause");
        self.publish();
        true
    }

    pub fn restart(&mut self) {
        self.scheduler.cancel();
        self.clock.restart(self.time.now());
        self.scheduler.commit(&self.schedule, 0.0, self.clock.speed());
        tracing::info!("restart");
        self.publish();
    }

    /// Applies a new speed, clamping non-positive values to the configured
    /// floor. Returns the speed actually applied.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        let applied = self.clock.set_speed(speed, self.time.now());
        if self.clock.is_running() {
            self.scheduler
                .retarget(&self.schedule, self.clock.position(), applied);
        }
        tracing::info!(speed = applied, "speed");
        self.publish();
        applied
    }

    pub fn seek(&mut self, position: f64) {
        let now = self.time.now();
        if self.clock.is_running() {
            self.scheduler.cancel();
            self.clock.seek(position, now);
            self.scheduler
                .commit(&self.schedule, self.clock.position(), self.clock.speed());
        } else {
            self.clock.seek(position, now);
        }
        tracing::debug!(position = self.clock.position(), "seek");
        self.publish();
    }

    /// 0 -> 100; larger values are treated as 100.
    pub fn set_volume(&mut self, volume: u8) {
        if volume > 100 {
            tracing::warn!(volume, "volume clamped to 100");
        }
        self.volume = volume.min(100);
        self.scheduler.set_master_gain(volume_to_gain(self.volume));
        self.publish();
    }

    /// Replaces the recording. Playback stops at the top of the new one;
    /// speed and volume carry over.
    pub fn load(&mut self, recording: &Recording) {
        self.scheduler.cancel();
        self.clock = PlaybackClock::new(recording.duration, self.clock.speed(), self.min_speed);
        self.schedule =
            EventSchedule::load(recording.rhythm_track.iter().cloned(), recording.duration);
        self.recording_id = recording.id.clone();
        tracing::info!(
            id = %self.recording_id,
            cues = self.schedule.len(),
            "recording loaded"
        );
        self.publish();
    }

    /// Advances the clock to the time source's current reading.
    ///
    /// At the end of the recording the bookings of the final run are left
    /// in place, so cues still inside the lookahead window are heard; the
    /// next transport command withdraws whatever remains.
    pub fn tick(&mut self) -> ClockTick {
        let tick = self.clock.tick(self.time.now());
        if let ClockTick::Ended(position) = tick {
            tracing::info!(position, "playback ended");
        }
        self.publish();
        tick
    }

    fn publish(&self) {
        self.monitor.store(PlaybackSnapshot {
            recording_id: self.recording_id.clone(),
            position: self.clock.position(),
            duration: self.clock.duration(),
            speed: self.clock.speed(),
            playing: self.clock.is_running(),
            volume: self.volume,
        });
    }
}
