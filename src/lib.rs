//! Plays back an analysed swing and sonifies its kinetic chain (legs, hips,
//! shoulders, arm) as percussion cues locked to a variable-speed timeline.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod player;
pub mod recording;
pub mod session;
pub mod timing;

pub use config::PlayerConfig;
pub use engine::{AudioEngine, CpalEngine, FiredTrigger, OfflineEngine, OutputStream};
pub use error::{Error, Result};
pub use events::{BodySegment, BookingHandle, EventId, RhythmCategory, RhythmEvent};
pub use player::{PlayerCommand, PlayerHandle, PlayerUpdate, spawn_player};
pub use recording::{Recording, kinetic_chain};
pub use session::{PlaybackMonitor, PlaybackSession, PlaybackSnapshot};
