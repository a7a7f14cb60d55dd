use std::sync::Arc;

use crate::events::RhythmEvent;

/// The cue list of the loaded recording, sorted by timestamp. Replaced
/// wholesale on reload, never edited.
#[derive(Debug, Clone, Default)]
pub struct EventSchedule {
    events: Arc<[RhythmEvent]>,
    duration: f64,
}

impl EventSchedule {
    /// Builds a schedule, dropping (with a warning) every event that falls
    /// outside `0..=duration`. Intensities outside `0..=1` are clamped.
    pub fn load(events: impl IntoIterator<Item = RhythmEvent>, duration: f64) -> Self {
        let mut kept: Vec<RhythmEvent> = events
            .into_iter()
            .filter_map(|mut event| {
                if !(event.timestamp >= 0.0 && event.timestamp <= duration) {
                    tracing::warn!(
                        id = %event.id,
                        timestamp = event.timestamp,
                        duration,
                        "dropping rhythm event outside the recording"
                    );
                    return None;
                }
                if !(0.0..=1.0).contains(&event.intensity) {
                    tracing::warn!(
                        id = %event.id,
                        intensity = event.intensity,
                        "clamping rhythm event intensity"
                    );
                    event.intensity = if event.intensity.is_nan() {
                        0.0
                    } else {
                        event.intensity.clamp(0.0, 1.0)
                    };
                }
                Some(event)
            })
            .collect();

        // sort_by is stable, so simultaneous cues keep their input order
        kept.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        Self {
            events: kept.into(),
            duration,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn events(&self) -> &[RhythmEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every event with `timestamp >= position`, in order.
    pub fn events_from(&self, position: f64) -> &[RhythmEvent] {
        let start = self.events.partition_point(|e| e.timestamp < position);
        &self.events[start..]
    }
}
