use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::events::{RhythmCategory, RhythmEvent};

/// One analysed swing: its length and the kinetic-chain cues to sonify.
///
/// Reads the analysis service's JSON document as-is; pose data and other
/// presentation fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    /// Seconds
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_frame: Option<u32>,
    #[serde(default, rename = "rhythmTrack", alias = "rhythm_track")]
    pub rhythm_track: Vec<RhythmEvent>,
}

/// The four cue template of a swing, keyed on the moment of impact: legs
/// load, hips fire, shoulders turn, then contact.
pub fn kinetic_chain(impact_time: f64) -> Vec<RhythmEvent> {
    vec![
        RhythmEvent::new(
            "r1",
            (impact_time - 0.9).max(0.2),
            RhythmCategory::Kick,
            0.7,
            "Leg Load",
        ),
        RhythmEvent::new(
            "r2",
            (impact_time - 0.7).max(0.4),
            RhythmCategory::Bass,
            0.6,
            "Hip Fire",
        ),
        RhythmEvent::new(
            "r3",
            (impact_time - 0.1).max(0.6),
            RhythmCategory::Snare,
            0.8,
            "Shoulder Turn",
        ),
        RhythmEvent::new("r4", impact_time, RhythmCategory::Crash, 0.9, "Contact"),
    ]
}

impl Recording {
    /// Builds a recording from frame metadata alone, deriving its cues from
    /// the impact frame.
    pub fn from_motion(id: &str, frames: u32, fps: f64, impact_frame: u32) -> Result<Self> {
        if !(fps > 0.0) {
            return Err(Error::InvalidRecording(format!("fps must be positive, got {fps}")));
        }
        let recording = Self {
            id: id.to_string(),
            duration: frames as f64 / fps,
            fps: Some(fps),
            frames: Some(frames),
            impact_frame: Some(impact_frame),
            rhythm_track: kinetic_chain(impact_frame as f64 / fps),
        };
        recording.validate()?;
        Ok(recording)
    }

    /// Reference swing used when no recording is supplied.
    pub fn demo() -> Self {
        Self {
            id: "demo".to_string(),
            duration: 2.5,
            fps: None,
            frames: None,
            impact_frame: None,
            rhythm_track: vec![
                RhythmEvent::new("r1", 0.6, RhythmCategory::Kick, 0.7, "Leg Load"),
                RhythmEvent::new("r2", 0.8, RhythmCategory::Bass, 0.6, "Hip Fire"),
                RhythmEvent::new("r3", 1.4, RhythmCategory::Snare, 0.8, "Shoulder Turn"),
                RhythmEvent::new("r4", 1.5, RhythmCategory::Crash, 0.9, "Contact"),
            ],
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let recording: Recording = serde_json::from_str(json)?;
        recording.finish()
    }

    pub fn from_ron(ron_string: &str) -> Result<Self> {
        let recording: Recording = ron::from_str(ron_string)?;
        recording.finish()
    }

    /// Loads `.json` documents as JSON and everything else as RON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let recording = if is_json {
            Self::from_json(&contents)?
        } else {
            Self::from_ron(&contents)?
        };

        tracing::info!(
            id = %recording.id,
            duration = recording.duration,
            cues = recording.rhythm_track.len(),
            "loaded recording from {}",
            path.display()
        );
        Ok(recording)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn impact_time(&self) -> Option<f64> {
        match (self.impact_frame, self.fps) {
            (Some(frame), Some(fps)) if fps > 0.0 => Some(frame as f64 / fps),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.duration > 0.0) || !self.duration.is_finite() {
            return Err(Error::InvalidRecording(format!(
                "duration must be positive, got {}",
                self.duration
            )));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Self> {
        self.validate()?;
        if self.rhythm_track.is_empty() {
            if let Some(impact) = self.impact_time() {
                tracing::debug!(id = %self.id, impact, "deriving rhythm track from impact");
                self.rhythm_track = kinetic_chain(impact);
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    const ANALYSIS_JSON: &str = r#"{
        "id": "swing-42",
        "userType": "PRO",
        "videoUrl": null,
        "duration": 2.5,
        "poseData": [],
        "poseData3D": [],
        "frames": 75,
        "fps": 30.0,
        "impact_frame": 45,
        "score": 95,
        "feedback": "Excellent form!",
        "rhythmTrack": [
            {"id": "r1", "timestamp": 0.6, "intensity": 0.7, "type": "KICK", "label": "Leg Load"},
            {"id": "r4", "timestamp": 1.5, "intensity": 0.9, "type": "CRASH", "label": "Contact"}
        ],
        "velocityData": [{"time": 0.0, "velocity": 12.0, "jerk": 0.0}]
    }"#;

    #[test]
    fn reads_analysis_document() {
        let recording = Recording::from_json(ANALYSIS_JSON).unwrap();
        assert_eq!(recording.id, "swing-42");
        assert_eq!(recording.rhythm_track.len(), 2);
        assert_eq!(recording.rhythm_track[1].category, RhythmCategory::Crash);
        assert_eq!(recording.impact_time(), Some(1.5));
    }

    #[test]
    fn derives_track_when_missing() {
        let recording = Recording::from_json(
            r#"{"id": "t01", "duration": 3.0, "fps": 30.0, "impact_frame": 60}"#,
        )
        .unwrap();
        let times: Vec<f64> = recording.rhythm_track.iter().map(|e| e.timestamp).collect();
        assert_eq!(times.len(), 4);
        assert!(approx_eq!(f64, times[0], 1.1, epsilon = 1e-9));
        assert!(approx_eq!(f64, times[1], 1.3, epsilon = 1e-9));
        assert!(approx_eq!(f64, times[2], 1.9, epsilon = 1e-9));
        assert!(approx_eq!(f64, times[3], 2.0, epsilon = 1e-9));
    }

    #[test]
    fn early_impact_respects_floors() {
        let track = kinetic_chain(0.5);
        let times: Vec<f64> = track.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![0.2, 0.4, 0.6, 0.5]);
    }

    #[test]
    fn from_motion_sets_duration() {
        let recording = Recording::from_motion("t02", 90, 30.0, 60).unwrap();
        assert!(approx_eq!(f64, recording.duration, 3.0));
        assert_eq!(recording.rhythm_track[3].label, "Contact");
        assert!(Recording::from_motion("bad", 90, 0.0, 60).is_err());
    }

    #[test]
    fn rejects_non_positive_duration() {
        let err = Recording::from_json(r#"{"id": "x", "duration": 0.0}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidRecording(_)));
    }

    #[test]
    fn reads_ron() {
        let recording = Recording::from_ron(
            r#"(
                id: "ron-swing",
                duration: 2.0,
                rhythm_track: [
                    (id: "a", timestamp: 0.5, type: KICK, intensity: 0.5, label: "Leg Load"),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(recording.rhythm_track[0].category, RhythmCategory::Kick);
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("swingsymphony-{}", std::process::id()));
        let path = dir.join("demo.ron");
        Recording::demo().save(&path).unwrap();
        let loaded = Recording::load(&path).unwrap();
        assert_eq!(loaded.rhythm_track, Recording::demo().rhythm_track);
        let _ = fs::remove_dir_all(dir);
    }
}
