mod clock;
mod schedule;
mod scheduler;
mod time_source;

pub use clock::{ClockState, ClockTick, PlaybackClock};
pub use schedule::EventSchedule;
pub use scheduler::{AudioScheduler, CommittedCue, booked_time};
pub use time_source::{ManualTime, MonotonicTime, TimeSource};
