use std::f32::consts::{FRAC_1_SQRT_2, PI};

use oorandom::Rand32;

use super::voice::{NoiseBurst, RAMP_FLOOR, Tone, VoiceParameters, exponential_ramp};

/// Second-order high-pass (RBJ cookbook), direct form I.
#[derive(Debug, Clone)]
pub struct Highpass {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Highpass {
    pub fn new(cutoff: f32, sample_rate: f32) -> Self {
        let cutoff = cutoff.clamp(1.0, sample_rate * 0.45);
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * FRAC_1_SQRT_2);
        let a0 = 1.0 + alpha;

        Self {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

#[derive(Debug, Clone)]
struct ToneLayer {
    tone: Tone,
    phase: f32,
}

impl ToneLayer {
    fn new(tone: Tone) -> Self {
        Self { tone, phase: 0.0 }
    }

    fn next_sample(&mut self, t: f32, sample_rate: f32) -> f32 {
        if t >= self.tone.decay {
            return 0.0;
        }
        let gain = exponential_ramp(self.tone.amplitude, RAMP_FLOOR, t, self.tone.decay);
        let freq = if self.tone.sweep {
            exponential_ramp(self.tone.frequency, RAMP_FLOOR, t, self.tone.decay)
        } else {
            self.tone.frequency
        };

        let sample = (self.phase * 2.0 * PI).sin() * gain;
        self.phase += freq / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

#[derive(Debug, Clone)]
struct NoiseLayer {
    burst: NoiseBurst,
    filter: Highpass,
}

impl NoiseLayer {
    fn new(burst: NoiseBurst, sample_rate: f32) -> Self {
        Self {
            burst,
            filter: Highpass::new(burst.highpass_cutoff, sample_rate),
        }
    }

    fn next_sample(&mut self, t: f32, rng: &mut Rand32) -> f32 {
        if t >= self.burst.decay {
            return 0.0;
        }
        let white = rng.rand_float() * 2.0 - 1.0;
        let gain = exponential_ramp(self.burst.amplitude, RAMP_FLOOR, t, self.burst.decay);
        self.filter.process(white) * gain
    }
}

/// A fired cue. Runs until its longest layer has decayed; nothing can stop
/// it early.
#[derive(Debug, Clone)]
pub struct OneShot {
    tone: Option<ToneLayer>,
    noise: Option<NoiseLayer>,
    elapsed: u32,
    length: u32,
    sample_rate: f32,
}

impl OneShot {
    pub fn new(voice: VoiceParameters, sample_rate: f32) -> Self {
        let (tone, noise) = match voice {
            VoiceParameters::Kick(tone) | VoiceParameters::Bass(tone) => {
                (Some(ToneLayer::new(tone)), None)
            }
            VoiceParameters::Snare { noise, tone } => (
                Some(ToneLayer::new(tone)),
                Some(NoiseLayer::new(noise, sample_rate)),
            ),
            VoiceParameters::Crash(noise) => (None, Some(NoiseLayer::new(noise, sample_rate))),
        };

        Self {
            tone,
            noise,
            elapsed: 0,
            length: (voice.duration() * sample_rate).ceil() as u32,
            sample_rate,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.length
    }

    pub fn next_sample(&mut self, rng: &mut Rand32) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let t = self.elapsed as f32 / self.sample_rate;
        let mut sample = 0.0;
        if let Some(tone) = &mut self.tone {
            sample += tone.next_sample(t, self.sample_rate);
        }
        if let Some(noise) = &mut self.noise {
            sample += noise.next_sample(t, rng);
        }
        self.elapsed += 1;
        sample
    }
}
