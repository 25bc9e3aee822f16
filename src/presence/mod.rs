mod discord;
mod manager;
mod traits;

pub use discord::DiscordPresence;
pub use manager::PresenceManager;
pub use traits::{PresenceError, PresenceProvider, PresenceUpdate};
