//! Map display-name and raid-duration lookup table.
//!
//! Fetched once from the tarkov.dev API and cached in the platform data
//! directory. The engine itself never consults this; only the presence
//! publisher does, and it degrades gracefully when the table is empty.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const GRAPHQL_ENDPOINT: &str = "https://api.tarkov.dev/graphql";
const MAPS_QUERY: &str = "{ maps { name nameId raidDuration } }";
const CACHE_FILE: &str = "maps.json";
const APP_DIR: &str = "tarkov-presence";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapInfo {
    /// Display name ("Woods", "The Lab").
    pub name: String,
    /// Internal id the game logs use ("woods", "laboratory").
    pub name_id: String,
    /// Raid duration in minutes.
    pub raid_duration: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapCatalog {
    maps: Vec<MapInfo>,
}

impl MapCatalog {
    #[must_use]
    pub fn from_maps(maps: Vec<MapInfo>) -> Self {
        Self { maps }
    }

    /// Case-insensitive lookup by the internal map id.
    pub fn find(&self, name_id: &str) -> Option<&MapInfo> {
        self.maps
            .iter()
            .find(|map| map.name_id.eq_ignore_ascii_case(name_id))
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("map data request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("map data response was malformed")]
    BadResponse,

    #[error("no data directory available on this platform")]
    NoDataDir,

    #[error("failed to cache map data: {0}")]
    Cache(#[from] std::io::Error),
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
}

#[derive(Deserialize)]
struct GraphqlData {
    maps: Vec<MapInfo>,
}

/// Loads the catalog from the on-disk cache, refetching when the cache is
/// missing or unusable.
pub async fn load_catalog() -> Result<MapCatalog, CatalogError> {
    let path = cache_path()?;

    if let Ok(contents) = fs::read_to_string(&path) {
        if let Ok(catalog) = serde_json::from_str::<MapCatalog>(&contents) {
            if !catalog.is_empty() {
                tracing::debug!(maps = catalog.maps.len(), "loaded map catalog from cache");
                return Ok(catalog);
            }
        }
        tracing::warn!(path = %path.display(), "map catalog cache unusable, refetching");
    }

    let catalog = fetch_catalog().await?;
    match serde_json::to_string_pretty(&catalog) {
        Ok(contents) => {
            if let Err(error) = fs::write(&path, contents) {
                tracing::warn!(%error, "failed to write map catalog cache");
            }
        }
        Err(error) => tracing::warn!(%error, "failed to serialize map catalog cache"),
    }

    Ok(catalog)
}

/// Fetches the map table from the tarkov.dev GraphQL API.
pub async fn fetch_catalog() -> Result<MapCatalog, CatalogError> {
    tracing::debug!("fetching map catalog");
    let client = reqwest::Client::new();
    let response = client
        .post(GRAPHQL_ENDPOINT)
        .json(&serde_json::json!({ "query": MAPS_QUERY }))
        .send()
        .await?
        .error_for_status()?;

    let body: GraphqlResponse = response.json().await?;
    let maps = body
        .data
        .map(|data| data.maps)
        .filter(|maps| !maps.is_empty())
        .ok_or(CatalogError::BadResponse)?;

    tracing::info!(maps = maps.len(), "map catalog fetched");
    Ok(MapCatalog { maps })
}

fn cache_path() -> Result<PathBuf, CatalogError> {
    let dir = dirs::data_dir()
        .ok_or(CatalogError::NoDataDir)?
        .join(APP_DIR);
    fs::create_dir_all(&dir)?;
    Ok(dir.join(CACHE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> MapCatalog {
        MapCatalog {
            maps: vec![
                MapInfo {
                    name: "Woods".to_string(),
                    name_id: "Woods".to_string(),
                    raid_duration: 40,
                },
                MapInfo {
                    name: "Streets of Tarkov".to_string(),
                    name_id: "TarkovStreets".to_string(),
                    raid_duration: 50,
                },
            ],
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = sample_catalog();
        assert_eq!(catalog.find("woods").map(|m| m.raid_duration), Some(40));
        assert_eq!(
            catalog.find("tarkovstreets").map(|m| m.name.as_str()),
            Some("Streets of Tarkov")
        );
        assert!(catalog.find("nowhere").is_none());
    }

    #[test]
    fn deserializes_camel_case_payload() {
        let json = r#"{"maps":[{"name":"Woods","nameId":"woods","raidDuration":40}]}"#;
        let catalog: MapCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.find("WOODS").map(|m| m.raid_duration), Some(40));
    }
}
