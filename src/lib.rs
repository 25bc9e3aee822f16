//! Watches Escape from Tarkov's log directory and process lifetime,
//! derives the player's current activity phase, and publishes it as
//! Discord Rich Presence.

pub mod catalog;
pub mod events;
pub mod parser;
pub mod phase;
pub mod presence;
pub mod process;
pub mod raid;
pub mod settings;
pub mod watcher;

pub use events::{EngineEvent, EventBus};
pub use phase::{EscapeStage, SessionPhase};
pub use raid::{RaidDescriptor, RaidMode};
pub use watcher::{LogWatcher, WatchStartError, WatcherHandle};
