use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use oorandom::Rand32;

use super::synth::OneShot;
use crate::events::{EngineCommand, ScheduledTrigger};

/// Output gain shared between the control side and the audio thread.
#[derive(Debug, Clone)]
pub struct MasterGain(Arc<AtomicU32>);

impl MasterGain {
    pub fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(gain.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// Most one-shots sounding at once.
pub const MAX_VOICES: usize = 64;

/// Audio-thread state: booked triggers waiting for their sample, and the
/// one-shots currently sounding.
///
/// Both lists are allocated up front and never grow, so rendering never
/// allocates. Bookings past `max_pending`, and triggers firing while
/// [MAX_VOICES] are already sounding, are dropped and counted.
pub struct VoiceRenderer {
    sample_rate: f32,
    /// Sorted latest-first so the next trigger due is always at the back.
    pending: Vec<ScheduledTrigger>,
    active: Vec<OneShot>,
    max_pending: usize,
    dropped: u64,
    master_gain: MasterGain,
    rng: Rand32,
}

impl VoiceRenderer {
    pub fn new(sample_rate: f32, master_gain: MasterGain, max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            sample_rate,
            pending: Vec::with_capacity(max_pending),
            active: Vec::with_capacity(MAX_VOICES),
            max_pending,
            dropped: 0,
            master_gain,
            rng: Rand32::new(0x5717_9bea),
        }
    }

    /// Triggers lost to a full pending list or a full voice pool.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Book(trigger) => {
                if self.pending.len() >= self.max_pending {
                    self.dropped += 1;
                    return;
                }
                let idx = self
                    .pending
                    .partition_point(|p| p.sample_timestamp > trigger.sample_timestamp);
                self.pending.insert(idx, trigger);
            }
            EngineCommand::Cancel(handle) => {
                // Fired triggers are no longer pending, so this never touches
                // a sounding voice.
                self.pending.retain(|p| p.handle != handle);
            }
        }
    }

    /// Triggers still waiting, earliest first.
    pub fn pending(&self) -> impl Iterator<Item = &ScheduledTrigger> {
        self.pending.iter().rev()
    }

    pub fn active_voices(&self) -> usize {
        self.active.len()
    }

    /// Renders one interleaved buffer starting at absolute frame
    /// `start_sample`. Triggers start on their exact frame; triggers whose
    /// frame has already passed start on the first frame of this buffer.
    /// `on_fire` sees each trigger once, with the frame it actually started
    /// on.
    pub fn render(
        &mut self,
        data: &mut [f32],
        num_channels: usize,
        start_sample: u64,
        mut on_fire: impl FnMut(&ScheduledTrigger, u64),
    ) {
        let num_channels = num_channels.max(1);
        let num_frames = data.len() / num_channels;
        let gain = self.master_gain.get();
        data.fill(0.0);

        for frame in 0..num_frames {
            let now = start_sample + frame as u64;
            loop {
                match self.pending.last() {
                    Some(next) if next.sample_timestamp <= now => {}
                    _ => break,
                }
                if let Some(trigger) = self.pending.pop() {
                    if self.active.len() >= MAX_VOICES {
                        self.dropped += 1;
                        continue;
                    }
                    on_fire(&trigger, now);
                    self.active.push(OneShot::new(trigger.voice, self.sample_rate));
                }
            }

            let mut sample = 0.0;
            for voice in &mut self.active {
                sample += voice.next_sample(&mut self.rng);
            }
            sample *= gain;

            for channel in &mut data[frame * num_channels..(frame + 1) * num_channels] {
                *channel = sample;
            }
        }

        self.active.retain(|voice| !voice.is_finished());
    }
}
