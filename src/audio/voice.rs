use crate::events::RhythmCategory;

/// Level every exponential ramp heads toward. Exponential curves never
/// reach zero, so voices fade to this floor and are then dropped.
pub const RAMP_FLOOR: f32 = 0.01;

/// Semitone-ish sensitivity of cue pitch to playback speed.
const PITCH_SENSITIVITY: f64 = 0.167;

const SNARE_NOISE_CUTOFF: f32 = 1000.0;

/// Frequency multiplier applied to every tonal voice so cues pitch-shift
/// the way resampled audio would at the same playback speed.
pub fn pitch_shift(speed: f64) -> f64 {
    2.0_f64.powf((speed - 1.0) * PITCH_SENSITIVITY)
}

/// A decaying oscillator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub amplitude: f32,
    /// Hz
    pub frequency: f32,
    /// Whether the frequency ramps down to [RAMP_FLOOR] alongside the
    /// amplitude, or stays put.
    pub sweep: bool,
    /// Seconds
    pub decay: f32,
}

/// A decaying burst of high-passed white noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseBurst {
    pub amplitude: f32,
    /// Hz
    pub highpass_cutoff: f32,
    /// Seconds
    pub decay: f32,
}

/// Everything needed to render one cue. Pure data, built once per booking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceParameters {
    Kick(Tone),
    Bass(Tone),
    Snare { noise: NoiseBurst, tone: Tone },
    Crash(NoiseBurst),
}

impl VoiceParameters {
    pub fn for_cue(category: RhythmCategory, intensity: f32, pitch_shift: f64) -> Self {
        let i = intensity.clamp(0.0, 1.0);
        let shift = pitch_shift as f32;
        let tonal = |base: f32| base * (1.0 + 0.5 * i) * shift;

        match category {
            RhythmCategory::Kick => VoiceParameters::Kick(Tone {
                amplitude: 0.30 + 0.70 * i,
                frequency: tonal(150.0),
                sweep: true,
                decay: 0.5,
            }),
            RhythmCategory::Bass => VoiceParameters::Bass(Tone {
                amplitude: 0.24 + 0.56 * i,
                frequency: tonal(100.0),
                sweep: true,
                decay: 0.4,
            }),
            RhythmCategory::Snare => VoiceParameters::Snare {
                noise: NoiseBurst {
                    amplitude: 0.12 + 0.28 * i,
                    highpass_cutoff: SNARE_NOISE_CUTOFF,
                    decay: 0.2,
                },
                tone: Tone {
                    amplitude: 0.09 + 0.21 * i,
                    frequency: tonal(180.0),
                    sweep: false,
                    decay: 0.1,
                },
            },
            RhythmCategory::Crash => VoiceParameters::Crash(NoiseBurst {
                amplitude: 0.15 + 0.35 * i,
                highpass_cutoff: 2000.0 * (1.0 + 0.75 * i),
                decay: 0.5,
            }),
        }
    }

    pub fn category(&self) -> RhythmCategory {
        match self {
            VoiceParameters::Kick(_) => RhythmCategory::Kick,
            VoiceParameters::Bass(_) => RhythmCategory::Bass,
            VoiceParameters::Snare { .. } => RhythmCategory::Snare,
            VoiceParameters::Crash(_) => RhythmCategory::Crash,
        }
    }

    /// Seconds until the longest layer has faded out.
    pub fn duration(&self) -> f32 {
        match self {
            VoiceParameters::Kick(tone) | VoiceParameters::Bass(tone) => tone.decay,
            VoiceParameters::Snare { noise, tone } => noise.decay.max(tone.decay),
            VoiceParameters::Crash(noise) => noise.decay,
        }
    }
}

/// Exponential ramp from `start` to `end` over `duration` seconds, held at
/// `end` afterwards.
pub fn exponential_ramp(start: f32, end: f32, elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 || elapsed >= duration {
        return end;
    }
    if elapsed <= 0.0 {
        return start;
    }
    start * (end / start).powf(elapsed / duration)
}
