// 🌐 Player Data Client
// HTTP source + explicit per-batch caches
//
// Caches are plain objects owned by one client for one batch. A failed
// fetch is cached as "no data" and never retried within the batch.

use crate::aggregation::InventorySources;
use crate::config::ApiConfig;
use crate::payloads::{HousingEntry, PlayerSearchResponse};
use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// DATA SOURCE
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("invalid JSON from {url}: {message}")]
    InvalidJson { url: String, message: String },

    #[error("no data at {0}")]
    NotFound(String),
}

/// Anything that can answer an API path with JSON
pub trait PlayerDataSource {
    /// `path` is relative to the API root, e.g. `players/123/inventories`
    fn fetch_json(&self, path: &str) -> Result<Value, FetchError>;
}

/// Blocking HTTP implementation against the live API
pub struct HttpSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
        headers.insert(REFERER, HeaderValue::from_str(&config.referer)?);

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(HttpSource {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl PlayerDataSource for HttpSource {
    fn fetch_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let response = self.client.get(&url).send().map_err(|e| FetchError::Http {
            url: url.clone(),
            message: e.to_string(),
        })?;

        // Error statuses often still carry a JSON body; let the caller decide
        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "non-success status");
        }

        let text = response.text().map_err(|e| FetchError::Http {
            url: url.clone(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&text).map_err(|e| FetchError::InvalidJson {
            url,
            message: e.to_string(),
        })
    }
}

// ============================================================================
// CACHES
// ============================================================================

/// Raw response cache keyed by API path. `None` records a failed fetch.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<String, Option<Value>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&Option<Value>> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: &str, value: Option<Value>) {
        self.entries.insert(path.to_string(), value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// username → player entity id
#[derive(Debug, Default)]
pub struct PlayerDirectory {
    ids: HashMap<String, String>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.ids.get(username).map(String::as_str)
    }

    pub fn remember(&mut self, username: &str, player_id: &str) {
        self.ids.insert(username.to_string(), player_id.to_string());
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// Cached access to the player endpoints
pub struct BitjitaClient<S: PlayerDataSource> {
    source: S,
    cache: ResponseCache,
    directory: PlayerDirectory,
}

impl BitjitaClient<HttpSource> {
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Ok(BitjitaClient::new(HttpSource::new(config)?))
    }
}

impl<S: PlayerDataSource> BitjitaClient<S> {
    pub fn new(source: S) -> Self {
        BitjitaClient {
            source,
            cache: ResponseCache::new(),
            directory: PlayerDirectory::new(),
        }
    }

    /// Forget every cached response and username (start of a new batch)
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.directory.clear();
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    fn get_cached(&mut self, path: &str) -> Option<Value> {
        if let Some(cached) = self.cache.get(path) {
            return cached.clone();
        }

        let value = match self.source.fetch_json(path) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("❌ Failed to fetch or parse: {}", e);
                None
            }
        };

        self.cache.insert(path, value.clone());
        value
    }

    /// First search hit's entity id for `username`
    pub fn resolve_player_id(&mut self, username: &str) -> Option<String> {
        let username = username.trim();
        if username.is_empty() {
            return None;
        }

        if let Some(id) = self.directory.get(username) {
            return Some(id.to_string());
        }

        info!("🔍 Looking up username: {}", username);
        let path = format!("players?q={}", urlencoding::encode(username));
        let payload = self.get_cached(&path)?;

        let search = match PlayerSearchResponse::deserialize(&payload) {
            Ok(search) => search,
            Err(e) => {
                warn!("malformed player search for {}: {}", username, e);
                return None;
            }
        };

        let Some(player_id) = search.players.into_iter().next().and_then(|hit| hit.entity_id)
        else {
            warn!("❌ No players found for username: {}", username);
            return None;
        };

        info!("✅ Username resolved: {} → {}", username, player_id);
        self.directory.remember(username, &player_id);
        Some(player_id)
    }

    /// `/players/{id}`: profile, experience, market orders
    pub fn player(&mut self, player_id: &str) -> Option<Value> {
        self.get_cached(&format!("players/{}", player_id))
    }

    pub fn inventories(&mut self, player_id: &str) -> Option<Value> {
        self.get_cached(&format!("players/{}/inventories", player_id))
    }

    /// Building ids of every house the player owns
    pub fn housing_list(&mut self, player_id: &str) -> Vec<String> {
        let Some(payload) = self.get_cached(&format!("players/{}/housing", player_id)) else {
            return Vec::new();
        };

        match Vec::<HousingEntry>::deserialize(&payload) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|entry| entry.building_entity_id)
                .collect(),
            Err(e) => {
                warn!("malformed housing list for {}: {}", player_id, e);
                Vec::new()
            }
        }
    }

    pub fn housing_detail(&mut self, player_id: &str, building_id: &str) -> Option<Value> {
        self.get_cached(&format!("players/{}/housing/{}", player_id, building_id))
    }

    /// Everything the inventory aggregation needs for one player
    pub fn collect_sources(&mut self, player_id: &str) -> InventorySources {
        let inventories = self.inventories(player_id);

        let housing = self
            .housing_list(player_id)
            .iter()
            .filter_map(|building| self.housing_detail(player_id, building))
            .collect();

        let player = self.player(player_id);

        InventorySources {
            inventories,
            housing,
            player,
        }
    }
}

// ============================================================================
// TEST SUPPORT
// ============================================================================

/// In-memory source serving canned payloads; counts fetches per path
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    pub struct FakeSource {
        responses: HashMap<String, Value>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, path: &str, value: Value) -> Self {
            self.responses.insert(path.to_string(), value);
            self
        }

        pub fn call_count(&self, path: &str) -> usize {
            self.calls.borrow().iter().filter(|p| p.as_str() == path).count()
        }
    }

    impl PlayerDataSource for FakeSource {
        fn fetch_json(&self, path: &str) -> Result<Value, FetchError> {
            self.calls.borrow_mut().push(path.to_string());
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(path.to_string()))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
