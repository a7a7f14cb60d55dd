mod renderer;
mod synth;
mod voice;

pub use renderer::{MasterGain, VoiceRenderer};
pub use synth::{Highpass, OneShot};
pub use voice::{NoiseBurst, RAMP_FLOOR, Tone, VoiceParameters, exponential_ramp, pitch_shift};

/// Maps a 0..=100 volume setting onto an output gain.
pub fn volume_to_gain(volume: u8) -> f32 {
    volume.min(100) as f32 / 100.0
}
