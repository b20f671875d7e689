use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::Episode;
use crate::tmdb::TmdbApi;

/// Episodes by season for the one series whose detail view is open.
#[derive(Debug, Default)]
pub struct EpisodeCache {
    series_id: Option<u64>,
    seasons: HashMap<u32, Vec<Episode>>,
}

impl EpisodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_series(&self) -> Option<u64> {
        self.series_id
    }

    /// Switches to `series_id`, dropping everything cached for another series.
    pub fn open(&mut self, series_id: u64) {
        if self.series_id != Some(series_id) {
            self.seasons.clear();
            self.series_id = Some(series_id);
        }
    }

    pub fn close(&mut self) {
        self.series_id = None;
        self.seasons.clear();
    }

    pub fn get(&self, series_id: u64, season: u32) -> Option<&Vec<Episode>> {
        if self.series_id != Some(series_id) {
            return None;
        }
        self.seasons.get(&season)
    }

    /// Stores `episodes` only while `series_id` is the open series. Returns whether it was stored.
    pub fn insert(&mut self, series_id: u64, season: u32, episodes: Vec<Episode>) -> bool {
        if self.series_id != Some(series_id) {
            return false;
        }
        self.seasons.insert(season, episodes);
        true
    }

    pub fn len(&self) -> usize {
        self.seasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
    }
}

/// Lazy, cached season lookups for the open series detail.
///
/// One session: a single series is open at a time, and opening another drops
/// the cache. The lock is never held across an upstream call, so two
/// concurrent misses for one season may both fetch it. Lookups for a series
/// that is not open are served uncached and leave the open series alone.
pub struct EpisodeLookup {
    api: Arc<dyn TmdbApi>,
    cache: Mutex<EpisodeCache>,
}

impl EpisodeLookup {
    pub fn new(api: Arc<dyn TmdbApi>) -> Self {
        Self {
            api,
            cache: Mutex::new(EpisodeCache::new()),
        }
    }

    pub async fn open_series(&self, series_id: u64) {
        let mut cache = self.cache.lock().await;
        if cache.open_series() != Some(series_id) {
            info!(series_id, "Opening series detail, episode cache reset");
        }
        cache.open(series_id);
    }

    pub async fn close(&self) {
        self.cache.lock().await.close();
    }

    pub async fn fetch_episodes(&self, series_id: u64, season: u32) -> Result<Vec<Episode>> {
        if let Some(hit) = self.cache.lock().await.get(series_id, season) {
            debug!(series_id, season, "Episode cache hit");
            return Ok(hit.clone());
        }

        let episodes = self.api.season(series_id, season).await?;
        if !self
            .cache
            .lock()
            .await
            .insert(series_id, season, episodes.clone())
        {
            debug!(series_id, season, "Series not open, episodes left uncached");
        }
        Ok(episodes)
    }
}
