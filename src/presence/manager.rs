//! Renders session phases into presence payloads and drives the providers

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::traits::{PresenceProvider, PresenceUpdate};
use crate::catalog::MapCatalog;
use crate::events::EngineEvent;
use crate::phase::{EscapeStage, SessionPhase};
use crate::raid::RaidMode;

const GAME_TITLE: &str = "Escape from Tarkov";
const COVER_IMAGE_KEY: &str = "cover-image";

/// Listens for engine events and fans rendered payloads out to providers
pub struct PresenceManager {
    providers: Vec<Box<dyn PresenceProvider>>,
    catalog: MapCatalog,
    game_started_at: Option<DateTime<Utc>>,
}

impl PresenceManager {
    #[must_use]
    pub fn new(catalog: MapCatalog) -> Self {
        Self {
            providers: Vec::new(),
            catalog,
            game_started_at: None,
        }
    }

    pub fn add_provider(&mut self, provider: Box<dyn PresenceProvider>) {
        tracing::info!("Adding presence provider: {}", provider.name());
        self.providers.push(provider);
    }

    /// Consumes engine events until the bus closes.
    pub async fn run(mut self, mut events: broadcast::Receiver<EngineEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Presence manager lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Event bus closed, stopping presence manager");
                    break;
                }
            }
        }

        self.clear_all().await;
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SessionStarted => {
                // The phase change that follows carries the actual display;
                // here we only pin the timestamp it renders with.
                self.game_started_at = Some(Utc::now());
            }
            EngineEvent::SessionEnded => {
                self.game_started_at = None;
                self.clear_all().await;
            }
            EngineEvent::PhaseChanged(phase) => {
                let update = self.render(&phase);
                self.apply(update).await;
            }
        }
    }

    async fn apply(&self, update: Option<PresenceUpdate>) {
        match update {
            Some(update) => self.update_all(&update).await,
            None => self.clear_all().await,
        }
    }

    async fn update_all(&self, update: &PresenceUpdate) {
        tracing::debug!("Updating presence: {:?}", update.details);
        for provider in &self.providers {
            if let Err(e) = provider.update_presence(update).await {
                tracing::warn!("Provider {} failed to update: {e}", provider.name());
            }
        }
    }

    async fn clear_all(&self) {
        for provider in &self.providers {
            if let Err(e) = provider.clear_presence().await {
                tracing::warn!("Provider {} failed to clear: {e}", provider.name());
            }
        }
    }

    fn render(&self, phase: &SessionPhase) -> Option<PresenceUpdate> {
        match phase {
            SessionPhase::Idle => None,
            SessionPhase::MainMenu => Some(PresenceUpdate {
                details: "Browsing the Menus".to_owned(),
                state: None,
                large_image_key: COVER_IMAGE_KEY.to_owned(),
                large_image_text: GAME_TITLE.to_owned(),
                start: self.game_started_at,
                end: None,
            }),
            SessionPhase::LookingForRaid => Some(PresenceUpdate {
                details: "Searching for a Raid".to_owned(),
                state: None,
                large_image_key: COVER_IMAGE_KEY.to_owned(),
                large_image_text: GAME_TITLE.to_owned(),
                start: Some(Utc::now()),
                end: None,
            }),
            SessionPhase::PreparingToEscape { stage } => Some(PresenceUpdate {
                details: "Preparing to Escape".to_owned(),
                state: Some(stage_label(*stage).to_owned()),
                large_image_key: COVER_IMAGE_KEY.to_owned(),
                large_image_text: GAME_TITLE.to_owned(),
                start: self.game_started_at,
                end: None,
            }),
            SessionPhase::RaidEnded => Some(PresenceUpdate {
                details: "Raid ended".to_owned(),
                state: None,
                large_image_key: COVER_IMAGE_KEY.to_owned(),
                large_image_text: GAME_TITLE.to_owned(),
                start: self.game_started_at,
                end: None,
            }),
            SessionPhase::InRaid {
                descriptor,
                started_at,
            } => {
                let details = match descriptor.mode {
                    RaidMode::Offline => "In an offline Raid".to_owned(),
                    RaidMode::Online => "In a Raid".to_owned(),
                };

                match self.catalog.find(&descriptor.location) {
                    Some(map) => Some(PresenceUpdate {
                        details,
                        state: Some("Playing Solo".to_owned()),
                        large_image_key: map_image_key(&map.name),
                        large_image_text: map.name.clone(),
                        start: Some(*started_at),
                        end: Some(*started_at + Duration::minutes(i64::from(map.raid_duration))),
                    }),
                    None => Some(PresenceUpdate {
                        details,
                        state: Some("Playing Solo".to_owned()),
                        large_image_key: COVER_IMAGE_KEY.to_owned(),
                        large_image_text: GAME_TITLE.to_owned(),
                        start: Some(*started_at),
                        end: None,
                    }),
                }
            }
        }
    }
}

fn stage_label(stage: EscapeStage) -> &'static str {
    match stage {
        EscapeStage::Insurance => "Insurance",
        EscapeStage::Confirmation => "Waiting to Confirm",
        EscapeStage::LookingForGroup => "Looking for Group",
    }
}

/// Image asset keys derive from the first word of the map's display name.
fn map_image_key(map_name: &str) -> String {
    let first_word = map_name
        .to_lowercase()
        .split_whitespace()
        .next()
        .map(str::to_owned)
        .unwrap_or_default();
    format!("{first_word}-large")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MapInfo;
    use crate::raid::RaidDescriptor;

    fn catalog() -> MapCatalog {
        MapCatalog::from_maps(vec![MapInfo {
            name: "Streets of Tarkov".to_owned(),
            name_id: "TarkovStreets".to_owned(),
            raid_duration: 50,
        }])
    }

    #[test]
    fn idle_clears_presence() {
        let manager = PresenceManager::new(catalog());
        assert!(manager.render(&SessionPhase::Idle).is_none());
    }

    #[test]
    fn main_menu_uses_session_start_time() {
        let mut manager = PresenceManager::new(catalog());
        let started = Utc::now();
        manager.game_started_at = Some(started);

        let update = manager
            .render(&SessionPhase::MainMenu)
            .unwrap();
        assert_eq!(update.details, "Browsing the Menus");
        assert_eq!(update.start, Some(started));
        assert_eq!(update.large_image_key, COVER_IMAGE_KEY);
    }

    #[test]
    fn known_map_gets_image_and_end_time() {
        let manager = PresenceManager::new(catalog());
        let started = Utc::now();
        let phase = SessionPhase::InRaid {
            descriptor: RaidDescriptor {
                mode: RaidMode::Online,
                location: "tarkovstreets".to_owned(),
                server_address: "1.2.3.4:17000".to_owned(),
                raid_id: "AB12CD".to_owned(),
            },
            started_at: started,
        };

        let update = manager.render(&phase).unwrap();
        assert_eq!(update.details, "In a Raid");
        assert_eq!(update.large_image_key, "streets-large");
        assert_eq!(update.large_image_text, "Streets of Tarkov");
        assert_eq!(update.end, Some(started + Duration::minutes(50)));
    }

    #[test]
    fn unknown_map_falls_back_to_cover() {
        let manager = PresenceManager::new(catalog());
        let phase = SessionPhase::InRaid {
            descriptor: RaidDescriptor {
                mode: RaidMode::Offline,
                location: "factory4_day".to_owned(),
                server_address: String::new(),
                raid_id: String::new(),
            },
            started_at: Utc::now(),
        };

        let update = manager.render(&phase).unwrap();
        assert_eq!(update.details, "In an offline Raid");
        assert_eq!(update.large_image_key, COVER_IMAGE_KEY);
        assert!(update.end.is_none());
    }

    #[test]
    fn escape_stages_have_distinct_labels() {
        let manager = PresenceManager::new(catalog());
        let insurance = manager
            .render(&SessionPhase::PreparingToEscape {
                stage: EscapeStage::Insurance,
            })
            .unwrap();
        let confirm = manager
            .render(&SessionPhase::PreparingToEscape {
                stage: EscapeStage::Confirmation,
            })
            .unwrap();
        assert_eq!(insurance.state.as_deref(), Some("Insurance"));
        assert_eq!(confirm.state.as_deref(), Some("Waiting to Confirm"));
    }
}
