#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
}

/// Outcome of a [PlaybackClock::tick].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockTick {
    Running(f64),
    /// The tick that reached the end of the recording. Reported once.
    Ended(f64),
    Stopped(f64),
}

impl ClockTick {
    pub fn position(self) -> f64 {
        match self {
            ClockTick::Running(p) | ClockTick::Ended(p) | ClockTick::Stopped(p) => p,
        }
    }
}

/// Turns irregular time readings into a song-time position.
///
/// While running, position is always `anchor_position + (now - anchor_time)
/// * speed`. Nothing is accumulated between ticks, so dropped or late frame
/// callbacks cannot make the position drift.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    duration: f64,
    speed: f64,
    min_speed: f64,
    anchor_position: f64,
    anchor_time: f64,
    position: f64,
    state: ClockState,
}

impl PlaybackClock {
    pub fn new(duration: f64, speed: f64, min_speed: f64) -> Self {
        let mut clock = Self {
            duration: duration.max(0.0),
            speed: 1.0,
            min_speed: min_speed.max(f64::MIN_POSITIVE),
            anchor_position: 0.0,
            anchor_time: 0.0,
            position: 0.0,
            state: ClockState::Stopped,
        };
        clock.speed = clock.sanitize_speed(speed);
        clock
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Last computed position.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn at_end(&self) -> bool {
        self.position >= self.duration
    }

    fn sanitize_speed(&self, speed: f64) -> f64 {
        if speed.is_finite() && speed >= self.min_speed {
            return speed;
        }
        tracing::warn!(speed, floor = self.min_speed, "speed clamped to floor");
        self.min_speed
    }

    /// Clamps into the recording. Non-finite targets leave the playhead
    /// where it is.
    fn sanitize_position(&self, position: f64) -> f64 {
        if position.is_finite() {
            return position.clamp(0.0, self.duration);
        }
        tracing::warn!(position, "ignoring non-finite position");
        self.position
    }

    fn projected(&self, now: f64) -> f64 {
        self.anchor_position + (now - self.anchor_time) * self.speed
    }

    /// `STOPPED -> RUNNING`. Returns false, changing nothing, if already
    /// running.
    pub fn start(&mut self, from_position: f64, now: f64) -> bool {
        if self.is_running() {
            return false;
        }
        self.position = self.sanitize_position(from_position);
        self.anchor_position = self.position;
        self.anchor_time = now;
        self.state = ClockState::Running;
        true
    }

    pub fn tick(&mut self, now: f64) -> ClockTick {
        if !self.is_running() {
            return ClockTick::Stopped(self.position);
        }

        let projected = self.projected(now);
        if projected >= self.duration {
            self.position = self.duration;
            self.state = ClockState::Stopped;
            return ClockTick::Ended(self.position);
        }

        // A time source stepping backwards must not move the playhead back.
        self.position = projected.max(self.position);
        ClockTick::Running(self.position)
    }

    /// Changes the rate. When running, re-anchors at the current position
    /// first so the position itself does not jump. Returns the speed
    /// actually applied.
    pub fn set_speed(&mut self, speed: f64, now: f64) -> f64 {
        let speed = self.sanitize_speed(speed);
        if self.is_running() {
            self.position = self.projected(now).clamp(self.position, self.duration);
            self.anchor_position = self.position;
            self.anchor_time = now;
        }
        self.speed = speed;
        speed
    }

    /// `RUNNING -> STOPPED`, freezing the position at its last computed
    /// value.
    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
    }

    pub fn restart(&mut self, now: f64) {
        self.stop();
        self.start(0.0, now);
    }

    /// Moves the playhead without changing state.
    pub fn seek(&mut self, position: f64, now: f64) {
        self.position = self.sanitize_position(position);
        self.anchor_position = self.position;
        self.anchor_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn clock(duration: f64, speed: f64) -> PlaybackClock {
        PlaybackClock::new(duration, speed, 0.01)
    }

    #[test]
    fn position_ignores_tick_cadence() {
        for speed in [0.25, 0.5, 1.0, 1.7] {
            let mut c = clock(100.0, speed);
            c.start(3.0, 10.0);

            let mut now = 10.0;
            // Deliberately uneven frame spacing, including a long stall.
            for dt in [0.016, 0.017, 0.5, 0.001, 0.033, 0.016, 1.25, 0.002] {
                now += dt;
                c.tick(now);
            }
            let elapsed = now - 10.0;
            assert!(approx_eq!(
                f64,
                c.position(),
                3.0 + elapsed * speed,
                epsilon = 1e-9
            ));

            let mut sparse = clock(100.0, speed);
            sparse.start(3.0, 10.0);
            assert!(approx_eq!(
                f64,
                sparse.tick(now).position(),
                c.position(),
                epsilon = 1e-9
            ));
        }
    }

    #[test]
    fn speed_change_does_not_jump() {
        let mut c = clock(10.0, 1.0);
        c.start(0.0, 0.0);
        c.tick(1.0);
        let applied = c.set_speed(0.5, 1.2);
        assert_eq!(applied, 0.5);
        assert!(approx_eq!(f64, c.position(), 1.2, epsilon = 1e-12));
        assert!(approx_eq!(f64, c.tick(1.2).position(), 1.2, epsilon = 1e-12));
        assert!(approx_eq!(f64, c.tick(2.2).position(), 1.7, epsilon = 1e-12));
    }

    #[test]
    fn end_is_clamped_and_reported_once() {
        let mut c = clock(2.5, 1.0);
        c.start(0.0, 0.0);
        assert_eq!(c.tick(1.0), ClockTick::Running(1.0));
        assert_eq!(c.tick(2.7), ClockTick::Ended(2.5));
        assert_eq!(c.state(), ClockState::Stopped);
        assert_eq!(c.tick(3.0), ClockTick::Stopped(2.5));
        assert!(c.at_end());
    }

    #[test]
    fn stop_freezes_last_computed_position() {
        let mut c = clock(10.0, 1.0);
        c.start(0.0, 0.0);
        c.tick(0.75);
        c.stop();
        assert_eq!(c.tick(5.0), ClockTick::Stopped(0.75));
    }

    #[test]
    fn start_while_running_is_ignored() {
        let mut c = clock(10.0, 1.0);
        assert!(c.start(1.0, 0.0));
        assert!(!c.start(5.0, 0.5));
        assert!(approx_eq!(f64, c.tick(1.0).position(), 2.0));
    }

    #[test]
    fn restart_returns_to_zero_and_runs() {
        let mut c = clock(10.0, 2.0);
        c.start(0.0, 0.0);
        c.tick(2.0);
        c.restart(2.0);
        assert_eq!(c.position(), 0.0);
        assert!(c.is_running());
        assert!(approx_eq!(f64, c.tick(2.5).position(), 1.0));
    }

    #[test]
    fn non_positive_speed_is_floored() {
        let mut c = clock(10.0, 1.0);
        assert_eq!(c.set_speed(0.0, 0.0), 0.01);
        assert_eq!(c.set_speed(-3.0, 0.0), 0.01);
        assert_eq!(c.set_speed(f64::NAN, 0.0), 0.01);
        assert_eq!(PlaybackClock::new(1.0, -1.0, 0.01).speed(), 0.01);
    }

    #[test]
    fn backwards_time_holds_position() {
        let mut c = clock(10.0, 1.0);
        c.start(0.0, 5.0);
        c.tick(6.0);
        assert_eq!(c.tick(5.5), ClockTick::Running(1.0));
    }

    #[test]
    fn seek_reanchors() {
        let mut c = clock(10.0, 1.0);
        c.start(0.0, 0.0);
        c.seek(4.0, 1.0);
        assert!(approx_eq!(f64, c.tick(1.5).position(), 4.5));
        c.seek(99.0, 2.0);
        assert_eq!(c.position(), 10.0);
    }

    #[test]
    fn non_finite_targets_keep_the_playhead() {
        let mut c = clock(2.5, 1.0);
        c.start(0.0, 0.0);
        c.tick(1.0);
        c.seek(f64::NAN, 1.0);
        assert_eq!(c.position(), 1.0);
        c.seek(f64::INFINITY, 1.0);
        assert_eq!(c.position(), 1.0);
        assert!(approx_eq!(f64, c.tick(1.5).position(), 1.5));
        assert_eq!(c.tick(10.0), ClockTick::Ended(2.5));

        let mut fresh = clock(2.5, 1.0);
        fresh.start(f64::NAN, 0.0);
        assert_eq!(fresh.tick(0.5), ClockTick::Running(0.5));
    }
}
