use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::audio::{MasterGain, VoiceParameters, VoiceRenderer};
use crate::error::{Error, Result};
use crate::events::{BookingHandle, EngineCommand, ScheduledTrigger};

/// What the scheduler needs from an audio backend: a clock running at
/// wall-clock rate, and sample-accurate one-shot bookings on that clock.
pub trait AudioEngine: Send + Sync {
    /// Current engine time, in seconds.
    fn now(&self) -> f64;

    /// Books `voice` to start at engine time `at`. The engine guarantees
    /// onset on the exact sample for any `at` still in the future.
    fn book_one_shot(&self, voice: VoiceParameters, at: f64) -> Result<BookingHandle>;

    /// Forgets a booking. Has no effect once the voice has started.
    fn cancel(&self, handle: BookingHandle);

    fn set_master_gain(&self, gain: f32);
}

fn seconds_to_sample(seconds: f64, sample_rate: f32) -> u64 {
    (seconds.max(0.0) * sample_rate as f64).round() as u64
}

/// Keeps the cpal stream alive. cpal streams may not leave the thread that
/// created them, so this stays behind while [CpalEngine] is shared.
pub struct OutputStream {
    _stream: cpal::Stream,
}

/// Control side of the command queue. Half of the queue is held back for
/// cancels, so a withdrawal always has room even when bookings have filled
/// their share.
struct CommandSender {
    producer: HeapProd<EngineCommand>,
    cancel_reserve: usize,
}

impl CommandSender {
    fn new(producer: HeapProd<EngineCommand>) -> Self {
        let cancel_reserve = producer.capacity().get() / 2;
        Self {
            producer,
            cancel_reserve,
        }
    }

    fn book(&mut self, trigger: ScheduledTrigger) -> Result<()> {
        if self.producer.vacant_len() <= self.cancel_reserve {
            return Err(Error::QueueFull);
        }
        self.producer
            .try_push(EngineCommand::Book(trigger))
            .map_err(|_| Error::QueueFull)
    }

    fn cancel(&mut self, handle: BookingHandle) -> Result<()> {
        self.producer
            .try_push(EngineCommand::Cancel(handle))
            .map_err(|_| Error::QueueFull)
    }
}

/// Engine backed by the default cpal output device.
pub struct CpalEngine {
    sender: Mutex<CommandSender>,
    sample_counter: Arc<AtomicU64>,
    next_handle: AtomicU64,
    master_gain: MasterGain,
    sample_rate: f32,
}

struct AudioState {
    renderer: VoiceRenderer,
    consumer: HeapCons<EngineCommand>,
    num_channels: usize,
}

impl CpalEngine {
    pub fn open(queue_capacity: usize, initial_gain: f32) -> Result<(Self, OutputStream)> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
        let config = device.default_output_config()?;
        let stream_config: cpal::StreamConfig = config.into();

        let num_channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate as f32;
        tracing::info!(
            channels = num_channels,
            sample_rate,
            "audio output ready"
        );

        let ring_buffer = HeapRb::<EngineCommand>::new(queue_capacity.max(2));
        let (producer, consumer) = ring_buffer.split();

        let master_gain = MasterGain::new(initial_gain);
        let sample_counter = Arc::new(AtomicU64::new(0));

        let mut audio_state = AudioState {
            renderer: VoiceRenderer::new(sample_rate, master_gain.clone(), queue_capacity),
            consumer,
            num_channels,
        };
        let counter_audio = sample_counter.clone();

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                audio_callback(data, &mut audio_state, &counter_audio);
            },
            |err| tracing::error!("audio stream error: {}", err),
            None,
        )?;

        stream.play()?;

        let engine = Self {
            sender: Mutex::new(CommandSender::new(producer)),
            sample_counter,
            next_handle: AtomicU64::new(1),
            master_gain,
            sample_rate,
        };
        Ok((engine, OutputStream { _stream: stream }))
    }
}

fn audio_callback(data: &mut [f32], state: &mut AudioState, sample_counter: &AtomicU64) {
    while let Some(command) = state.consumer.try_pop() {
        state.renderer.apply(command);
    }

    let current_sample = sample_counter.load(Ordering::Relaxed);
    state
        .renderer
        .render(data, state.num_channels, current_sample, |_, _| {});

    let num_frames = data.len() / state.num_channels.max(1);
    sample_counter.fetch_add(num_frames as u64, Ordering::Relaxed);
}

impl AudioEngine for CpalEngine {
    fn now(&self) -> f64 {
        self.sample_counter.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn book_one_shot(&self, voice: VoiceParameters, at: f64) -> Result<BookingHandle> {
        let handle = BookingHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let trigger = ScheduledTrigger {
            handle,
            sample_timestamp: seconds_to_sample(at, self.sample_rate),
            voice,
        };
        self.sender.lock().book(trigger)?;
        Ok(handle)
    }

    fn cancel(&self, handle: BookingHandle) {
        if let Err(e) = self.sender.lock().cancel(handle) {
            tracing::error!(?handle, "cancel not delivered: {}", e);
        }
    }

    fn set_master_gain(&self, gain: f32) {
        self.master_gain.set(gain);
    }
}

/// A trigger as it actually started on the offline engine.
#[derive(Debug, Clone, Copy)]
pub struct FiredTrigger {
    pub handle: BookingHandle,
    pub booked_sample: u64,
    pub fired_sample: u64,
    pub voice: VoiceParameters,
}

struct OfflineState {
    renderer: VoiceRenderer,
    sample_counter: u64,
    fired: Vec<FiredTrigger>,
}

const OFFLINE_MAX_PENDING: usize = 1024;

/// Engine whose clock only moves when it is asked to render. Produces the
/// same audio as [CpalEngine] for the same bookings.
pub struct OfflineEngine {
    state: Mutex<OfflineState>,
    next_handle: AtomicU64,
    master_gain: MasterGain,
    sample_rate: f32,
}

impl OfflineEngine {
    pub fn new(sample_rate: f32) -> Self {
        let master_gain = MasterGain::new(1.0);
        Self {
            state: Mutex::new(OfflineState {
                renderer: VoiceRenderer::new(
                    sample_rate,
                    master_gain.clone(),
                    OFFLINE_MAX_PENDING,
                ),
                sample_counter: 0,
                fired: Vec::new(),
            }),
            next_handle: AtomicU64::new(1),
            master_gain,
            sample_rate,
        }
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.get()
    }

    /// Renders `frames` mono frames and advances the clock past them.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut data = vec![0.0; frames];
        let mut state = self.state.lock();
        let OfflineState {
            renderer,
            sample_counter,
            fired,
        } = &mut *state;
        renderer.render(&mut data, 1, *sample_counter, |trigger, at| {
            fired.push(FiredTrigger {
                handle: trigger.handle,
                booked_sample: trigger.sample_timestamp,
                fired_sample: at,
                voice: trigger.voice,
            });
        });
        *sample_counter += frames as u64;
        data
    }

    /// Renders until engine time reaches `seconds`.
    pub fn advance_to(&self, seconds: f64) -> Vec<f32> {
        let target = seconds_to_sample(seconds, self.sample_rate);
        let current = self.state.lock().sample_counter;
        self.render(target.saturating_sub(current) as usize)
    }

    /// Bookings that have not started yet, earliest first, as
    /// `(handle, start sample, voice)`.
    pub fn pending(&self) -> Vec<(BookingHandle, u64, VoiceParameters)> {
        self.state
            .lock()
            .renderer
            .pending()
            .map(|t| (t.handle, t.sample_timestamp, t.voice))
            .collect()
    }

    pub fn fired(&self) -> Vec<FiredTrigger> {
        self.state.lock().fired.clone()
    }

    pub fn active_voices(&self) -> usize {
        self.state.lock().renderer.active_voices()
    }

    /// Bookings the renderer had no room for.
    pub fn dropped(&self) -> u64 {
        self.state.lock().renderer.dropped()
    }

    pub fn seconds_to_sample(&self, seconds: f64) -> u64 {
        seconds_to_sample(seconds, self.sample_rate)
    }
}

impl AudioEngine for OfflineEngine {
    fn now(&self) -> f64 {
        self.state.lock().sample_counter as f64 / self.sample_rate as f64
    }

    fn book_one_shot(&self, voice: VoiceParameters, at: f64) -> Result<BookingHandle> {
        let handle = BookingHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.state
            .lock()
            .renderer
            .apply(EngineCommand::Book(ScheduledTrigger {
                handle,
                sample_timestamp: seconds_to_sample(at, self.sample_rate),
                voice,
            }));
        Ok(handle)
    }

    fn cancel(&self, handle: BookingHandle) {
        self.state
            .lock()
            .renderer
            .apply(EngineCommand::Cancel(handle));
    }

    fn set_master_gain(&self, gain: f32) {
        self.master_gain.set(gain);
    }
}
