use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::VoiceParameters;

/// Opaque identifier of a rhythm event, unique within a recording.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Percussion voice a kinetic-chain event is sonified with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RhythmCategory {
    Kick,
    Bass,
    Snare,
    Crash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySegment {
    Legs,
    Hips,
    Shoulders,
    Arms,
}

impl RhythmCategory {
    pub fn body_segment(self) -> BodySegment {
        match self {
            RhythmCategory::Kick => BodySegment::Legs,
            RhythmCategory::Bass => BodySegment::Hips,
            RhythmCategory::Snare => BodySegment::Shoulders,
            RhythmCategory::Crash => BodySegment::Arms,
        }
    }
}

impl fmt::Display for RhythmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RhythmCategory::Kick => "KICK",
            RhythmCategory::Bass => "BASS",
            RhythmCategory::Snare => "SNARE",
            RhythmCategory::Crash => "CRASH",
        };
        f.write_str(name)
    }
}

/// A timed cue on the recording's own timeline. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmEvent {
    pub id: EventId,
    /// Seconds of song time
    pub timestamp: f64,
    #[serde(rename = "type", alias = "category")]
    pub category: RhythmCategory,
    /// 0.0 -> 1.0
    pub intensity: f32,
    #[serde(default)]
    pub label: String,
}

impl RhythmEvent {
    pub fn new(
        id: impl Into<EventId>,
        timestamp: f64,
        category: RhythmCategory,
        intensity: f32,
        label: &str,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            category,
            intensity,
            label: label.to_string(),
        }
    }
}

/// Handle returned by the engine for a booked one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookingHandle(pub u64);

/// A one-shot trigger as seen by the audio thread.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledTrigger {
    pub handle: BookingHandle,
    pub sample_timestamp: u64,
    pub voice: VoiceParameters,
}

#[derive(Debug, Clone, Copy)]
pub enum EngineCommand {
    Book(ScheduledTrigger),
    Cancel(BookingHandle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_uses_type_key() {
        let event: RhythmEvent = serde_json::from_str(
            r#"{"id":"r4","timestamp":1.5,"intensity":0.9,"type":"CRASH","label":"Contact"}"#,
        )
        .unwrap();
        assert_eq!(event.category, RhythmCategory::Crash);
        assert_eq!(event.id, EventId::from("r4"));
        assert_eq!(event.category.body_segment(), BodySegment::Arms);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let parsed: Result<RhythmEvent, _> = serde_json::from_str(
            r#"{"id":"x","timestamp":0.1,"intensity":0.5,"type":"COWBELL","label":""}"#,
        );
        assert!(parsed.is_err());
    }
}
