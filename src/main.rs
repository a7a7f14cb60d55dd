use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    style::Print,
    terminal::{self, ClearType},
};
use crossbeam::channel::Sender;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use swingsymphony::audio::volume_to_gain;
use swingsymphony::{
    AudioEngine, CpalEngine, PlaybackSnapshot, PlayerCommand, PlayerConfig, PlayerHandle,
    PlayerUpdate, Recording, spawn_player,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: swingsymphony [RECORDING.json|RECORDING.ron] [--config PLAYER.ron]";

const SPEEDS: [(char, f64); 4] = [('1', 0.25), ('2', 0.5), ('3', 1.0), ('4', 2.0)];

struct Args {
    recording: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        recording: None,
        config: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let path = it.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(String::new()),
            _ if args.recording.is_none() => args.recording = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument: {}", arg)),
        }
    }
    Ok(args)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("swingsymphony=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("{}", message);
            }
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> swingsymphony::Result<()> {
    let config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    let recording = match &args.recording {
        Some(path) => Recording::load(path)?,
        None => Recording::demo(),
    };

    // The stream guard has to outlive playback and stay on this thread.
    let (engine, _output) = match CpalEngine::open(
        config.command_queue_capacity,
        volume_to_gain(config.initial_volume),
    ) {
        Ok((engine, output)) => (Some(Arc::new(engine) as Arc<dyn AudioEngine>), Some(output)),
        Err(e) => {
            tracing::warn!("audio unavailable, playing without sound: {}", e);
            (None, None)
        }
    };

    let player = spawn_player(config, recording, engine);
    let _watcher = args
        .recording
        .as_deref()
        .and_then(|path| watch_recording(path, player.command_tx.clone()));

    let result = transport(&player);
    player.shutdown();
    result
}

/// Reloads the recording whenever its file is modified.
fn watch_recording(path: &Path, command_tx: Sender<PlayerCommand>) -> Option<RecommendedWatcher> {
    let path_owned = path.to_path_buf();
    let watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if event.kind.is_modify() {
                    tracing::info!("{} changed, reloading", path_owned.display());
                    let _ = command_tx.send(PlayerCommand::LoadPath(path_owned.clone()));
                }
            }
            Err(e) => tracing::warn!("watch error: {}", e),
        },
        Config::default(),
    );

    let mut watcher = match watcher {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::warn!("cannot watch recording: {}", e);
            return None;
        }
    };
    if let Err(e) = watcher.watch(path, RecursiveMode::NonRecursive) {
        tracing::warn!("cannot watch {}: {}", path.display(), e);
        return None;
    }
    Some(watcher)
}

fn transport(player: &PlayerHandle) -> swingsymphony::Result<()> {
    eprintln!("space play/pause  r restart  1-4 speed  +/- volume  arrows seek  q quit");
    terminal::enable_raw_mode()?;
    let result = key_loop(player);
    terminal::disable_raw_mode()?;
    println!();
    result
}

fn key_loop(player: &PlayerHandle) -> swingsymphony::Result<()> {
    let mut stdout = io::stdout();

    loop {
        while let Ok(update) = player.update_rx.try_recv() {
            match update {
                PlayerUpdate::Error { message } => tracing::warn!("{}", message),
                PlayerUpdate::RecordingLoaded { id, cues, .. } => {
                    tracing::info!(cues, "now playing {}", id)
                }
                PlayerUpdate::Ended | PlayerUpdate::PlaybackState { .. } => {}
            }
        }

        if event::poll(Duration::from_millis(30))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let snapshot = player.monitor.snapshot();
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char(' ') => player.send(PlayerCommand::TogglePlay),
                    KeyCode::Char('r') => player.send(PlayerCommand::Restart),
                    KeyCode::Char('+') | KeyCode::Char('=') => player.send(
                        PlayerCommand::SetVolume(snapshot.volume.saturating_add(10).min(100)),
                    ),
                    KeyCode::Char('-') => {
                        player.send(PlayerCommand::SetVolume(snapshot.volume.saturating_sub(10)))
                    }
                    KeyCode::Left => player.send(PlayerCommand::Seek(snapshot.position - 0.25)),
                    KeyCode::Right => player.send(PlayerCommand::Seek(snapshot.position + 0.25)),
                    KeyCode::Char(c) => {
                        if let Some((_, speed)) = SPEEDS.iter().find(|(key, _)| *key == c) {
                            player.send(PlayerCommand::SetSpeed(*speed));
                        }
                    }
                    _ => {}
                }
            }
        }

        draw_status(&mut stdout, &player.monitor.snapshot())?;
    }

    Ok(())
}

fn draw_status(stdout: &mut Stdout, snapshot: &PlaybackSnapshot) -> io::Result<()> {
    const WIDTH: usize = 40;
    let filled = if snapshot.duration > 0.0 {
        ((snapshot.position / snapshot.duration) * WIDTH as f64).round() as usize
    } else {
        0
    };
    let bar: String = (0..WIDTH)
        .map(|i| if i < filled { '#' } else { '-' })
        .collect();

    let line = format!(
        "{} [{}] {:5.2}/{:.2}s  x{:.2}  vol {:3}  {}",
        if snapshot.playing { ">" } else { "||" },
        bar,
        snapshot.position,
        snapshot.duration,
        snapshot.speed,
        snapshot.volume,
        snapshot.recording_id,
    );
    execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(line)
    )
}
