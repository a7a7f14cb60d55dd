use crossbeam::channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::PlayerConfig;
use crate::engine::AudioEngine;
use crate::recording::Recording;
use crate::session::{PlaybackMonitor, PlaybackSession};
use crate::timing::{ClockTick, MonotonicTime};

#[derive(Debug, Clone)]
pub enum PlayerCommand {
    Load(Recording),
    LoadPath(PathBuf),
    Play,
    Pause,
    TogglePlay,
    Restart,
    SetSpeed(f64),
    Seek(f64),
    SetVolume(u8),
    Quit,
}

#[derive(Debug, Clone)]
pub enum PlayerUpdate {
    RecordingLoaded { id: String, duration: f64, cues: usize },
    PlaybackState { playing: bool, speed: f64 },
    Ended,
    Error { message: String },
}

pub struct PlayerHandle {
    pub command_tx: Sender<PlayerCommand>,
    pub update_rx: Receiver<PlayerUpdate>,
    pub monitor: PlaybackMonitor,
    thread: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    pub fn send(&self, command: PlayerCommand) {
        let _ = self.command_tx.send(command);
    }

    /// Stops the player thread and waits for it.
    pub fn shutdown(mut self) {
        let _ = self.command_tx.send(PlayerCommand::Quit);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Runs a playback session on its own thread. The thread is the only owner
/// of the session, so transport commands and frame ticks are applied one at
/// a time and can never interleave inside a commit or cancel.
pub fn spawn_player(
    config: PlayerConfig,
    recording: Recording,
    engine: Option<Arc<dyn AudioEngine>>,
) -> PlayerHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();

    let session = PlaybackSession::new(&recording, MonotonicTime::new(), engine, &config);
    let monitor = session.monitor();

    let _ = update_tx.send(PlayerUpdate::RecordingLoaded {
        id: recording.id.clone(),
        duration: recording.duration,
        cues: session.schedule().len(),
    });

    let thread = std::thread::spawn(move || {
        player_thread(session, config, command_rx, update_tx);
    });

    PlayerHandle {
        command_tx,
        update_rx,
        monitor,
        thread: Some(thread),
    }
}

fn player_thread(
    mut session: PlaybackSession<MonotonicTime>,
    config: PlayerConfig,
    command_rx: Receiver<PlayerCommand>,
    update_tx: Sender<PlayerUpdate>,
) {
    let ticker = crossbeam::channel::tick(config.frame_interval());

    loop {
        crossbeam::select! {
            recv(command_rx) -> command => match command {
                Ok(PlayerCommand::Quit) | Err(_) => {
                    session.pause();
                    break;
                }
                Ok(command) => handle_command(&mut session, command, &update_tx),
            },
            recv(ticker) -> _ => {
                if let ClockTick::Ended(_) = session.tick() {
                    let _ = update_tx.send(PlayerUpdate::Ended);
                    send_state(&session, &update_tx);
                }
            },
        }
    }

    tracing::debug!("player thread exiting");
}

fn handle_command(
    session: &mut PlaybackSession<MonotonicTime>,
    command: PlayerCommand,
    update_tx: &Sender<PlayerUpdate>,
) {
    match command {
        PlayerCommand::Load(recording) => load(session, &recording, update_tx),
        PlayerCommand::LoadPath(path) => match Recording::load(&path) {
            Ok(recording) => load(session, &recording, update_tx),
            Err(e) => {
                tracing::warn!("failed to load {}: {}", path.display(), e);
                let _ = update_tx.send(PlayerUpdate::Error {
                    message: format!("Failed to load recording: {}", e),
                });
            }
        },
        PlayerCommand::Play => {
            session.play();
        }
        PlayerCommand::Pause => {
            session.pause();
        }
        PlayerCommand::TogglePlay => {
            if session.is_playing() {
                session.pause();
            } else {
                session.play();
            }
        }
        PlayerCommand::Restart => session.restart(),
        PlayerCommand::SetSpeed(speed) => {
            session.set_speed(speed);
        }
        PlayerCommand::Seek(position) => session.seek(position),
        PlayerCommand::SetVolume(volume) => session.set_volume(volume),
        PlayerCommand::Quit => {}
    }
    send_state(session, update_tx);
}

fn load(
    session: &mut PlaybackSession<MonotonicTime>,
    recording: &Recording,
    update_tx: &Sender<PlayerUpdate>,
) {
    session.load(recording);
    let _ = update_tx.send(PlayerUpdate::RecordingLoaded {
        id: recording.id.clone(),
        duration: recording.duration,
        cues: session.schedule().len(),
    });
}

fn send_state(session: &PlaybackSession<MonotonicTime>, update_tx: &Sender<PlayerUpdate>) {
    let _ = update_tx.send(PlayerUpdate::PlaybackState {
        playing: session.is_playing(),
        speed: session.speed(),
    });
}
