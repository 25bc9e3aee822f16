//! Discord Rich Presence provider built on the discord-sdk IPC client

use std::time::SystemTime;

use async_trait::async_trait;
use discord_sdk as ds;

use super::traits::{PresenceError, PresenceProvider, PresenceUpdate};

const APP_ID: ds::AppId = 1_145_768_497_398_415_440;

pub struct DiscordPresence {
    discord: ds::Discord,
}

impl DiscordPresence {
    /// Opens the local Discord IPC connection and waits for the handshake.
    pub async fn connect() -> Result<Self, PresenceError> {
        let (wheel, handler) = ds::wheel::Wheel::new(Box::new(|err| {
            tracing::warn!(error = ?err, "Discord connection error");
        }));

        let mut user = wheel.user();

        let discord = ds::Discord::new(
            ds::DiscordApp::PlainId(APP_ID),
            ds::Subscriptions::ACTIVITY,
            Box::new(handler),
        )
        .map_err(|e| PresenceError::Transport(e.to_string()))?;

        tracing::debug!("Waiting for Discord handshake");
        user.0
            .changed()
            .await
            .map_err(|e| PresenceError::Transport(e.to_string()))?;

        match &*user.0.borrow() {
            ds::wheel::UserState::Connected(user) => {
                tracing::info!("Connected to Discord as {}", user.username);
            }
            ds::wheel::UserState::Disconnected(err) => {
                return Err(PresenceError::Transport(format!(
                    "failed to connect to Discord: {err}"
                )));
            }
        }

        Ok(Self { discord })
    }
}

#[async_trait]
impl PresenceProvider for DiscordPresence {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn update_presence(&self, update: &PresenceUpdate) -> Result<(), PresenceError> {
        let mut activity = ds::activity::ActivityBuilder::default()
            .details(update.details.clone())
            .assets(ds::activity::Assets::default().large(
                update.large_image_key.clone(),
                Some(update.large_image_text.clone()),
            ));

        if let Some(state) = &update.state {
            activity = activity.state(state.clone());
        }
        if let Some(start) = update.start {
            activity = activity.start_timestamp(SystemTime::from(start));
        }
        if let Some(end) = update.end {
            activity = activity.end_timestamp(SystemTime::from(end));
        }

        self.discord
            .update_activity(activity)
            .await
            .map(|_| ())
            .map_err(|e| PresenceError::Transport(e.to_string()))
    }

    async fn clear_presence(&self) -> Result<(), PresenceError> {
        self.discord
            .clear_activity()
            .await
            .map(|_| ())
            .map_err(|e| PresenceError::Transport(e.to_string()))
    }
}
