use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::{CatalogError, Result};
use crate::images;
use crate::models::{Country, Episode, Genre, MediaItem, MediaKind, Provider};
use crate::query::{encode_params, CatalogQuery};

const UNTITLED: &str = "Untitled";

/// Everything the catalog pipeline asks of the upstream metadata API.
#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn genres(&self, kind: MediaKind) -> Result<Vec<Genre>>;
    async fn providers(&self, kind: MediaKind) -> Result<Vec<Provider>>;
    async fn countries(&self) -> Result<Vec<Country>>;
    async fn list(&self, query: &CatalogQuery) -> Result<ListResponse>;
    async fn popular(&self, kind: MediaKind, page: u32) -> Result<ListResponse>;
    async fn details(&self, kind: MediaKind, id: u64) -> Result<ItemDetails>;
    async fn watch_providers(&self, kind: MediaKind, id: u64) -> Result<WatchProviders>;
    async fn season(&self, series_id: u64, season: u32) -> Result<Vec<Episode>>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
    language: String,
    region: String,
}

impl TmdbClient {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let user_agent = format!("mediavault/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.request_timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            region: config.region.clone(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn url(&self, path: &str, extra: &[(&str, &str)]) -> String {
        let mut params = vec![
            ("api_key", self.api_key.as_str()),
            ("language", self.language.as_str()),
        ];
        params.extend_from_slice(extra);
        format!("{}/{}?{}", self.base_url, path, encode_params(params))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let shown = redact(url, &self.api_key);
        debug!(url = %shown, "TMDB request");
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::from_transport(&shown, e))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| CatalogError::from_transport(&shown, e))?;
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: shown,
                status: status.as_u16(),
                message: status_message(&text),
            });
        }
        serde_json::from_str(&text).map_err(|e| CatalogError::Malformed {
            url: shown,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn genres(&self, kind: MediaKind) -> Result<Vec<Genre>> {
        #[derive(Deserialize)]
        struct GenreList {
            genres: Vec<Genre>,
        }

        let url = self.url(&format!("genre/{}/list", kind.path_segment()), &[]);
        let data: GenreList = self.get_json(&url).await?;
        Ok(data.genres)
    }

    async fn providers(&self, kind: MediaKind) -> Result<Vec<Provider>> {
        #[derive(Deserialize)]
        struct ProviderList {
            #[serde(default)]
            results: Vec<Provider>,
        }

        let url = self.url(
            &format!("watch/providers/{}", kind.path_segment()),
            &[("watch_region", self.region.as_str())],
        );
        let data: ProviderList = self.get_json(&url).await?;
        Ok(data.results)
    }

    async fn countries(&self) -> Result<Vec<Country>> {
        let url = self.url("configuration/countries", &[]);
        self.get_json(&url).await
    }

    async fn list(&self, query: &CatalogQuery) -> Result<ListResponse> {
        let extra: Vec<(&str, &str)> = query
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let url = self.url(&query.path(), &extra);
        self.get_json(&url).await
    }

    async fn popular(&self, kind: MediaKind, page: u32) -> Result<ListResponse> {
        let page = page.to_string();
        let url = self.url(
            &format!("{}/popular", kind.path_segment()),
            &[("page", page.as_str())],
        );
        self.get_json(&url).await
    }

    async fn details(&self, kind: MediaKind, id: u64) -> Result<ItemDetails> {
        let url = self.url(&format!("{}/{id}", kind.path_segment()), &[]);
        self.get_json(&url).await
    }

    async fn watch_providers(&self, kind: MediaKind, id: u64) -> Result<WatchProviders> {
        let url = self.url(&format!("{}/{id}/watch/providers", kind.path_segment()), &[]);
        self.get_json(&url).await
    }

    async fn season(&self, series_id: u64, season: u32) -> Result<Vec<Episode>> {
        #[derive(Deserialize)]
        struct SeasonDetail {
            #[serde(default)]
            episodes: Vec<Episode>,
        }

        let url = self.url(&format!("tv/{series_id}/season/{season}"), &[]);
        let data: SeasonDetail = self.get_json(&url).await?;
        Ok(data.episodes)
    }
}

/// Paged response shared by discover, search and popular.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    #[serde(default = "first_page")]
    pub page: u32,
    pub results: Vec<ListEntry>,
    #[serde(default = "first_page")]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEntry {
    pub id: u64,
    #[serde(flatten)]
    pub card: CardFields,
}

impl ListEntry {
    pub fn into_item(self, kind: MediaKind) -> MediaItem {
        let card = self.card;
        let display_name = display_name(
            kind,
            [card.title, card.name, card.original_title, card.original_name],
        );
        let primary_date = match kind {
            MediaKind::Movie => card.release_date.or(card.first_air_date),
            MediaKind::Series => card.first_air_date.or(card.release_date),
        }
        .filter(|d| !d.is_empty());
        MediaItem {
            id: self.id,
            kind,
            display_name,
            synopsis: card.overview.unwrap_or_default(),
            poster_url: images::poster_url(card.poster_path.as_deref()),
            poster_path: card.poster_path.filter(|p| !p.is_empty()),
            score: card.vote_average.unwrap_or(0.0),
            primary_date,
            genre_ids: card.genre_ids,
            genres: Vec::new(),
            season_count: None,
        }
    }
}

/// `[title, name, original_title, original_name]`, reordered so the kind's own field wins.
fn display_name(kind: MediaKind, candidates: [Option<String>; 4]) -> String {
    let [title, name, original_title, original_name] = candidates;
    let ordered = match kind {
        MediaKind::Movie => [title, original_title, name, original_name],
        MediaKind::Series => [name, original_name, title, original_title],
    };
    ordered
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDetails {
    pub id: u64,
    #[serde(flatten)]
    pub card: CardFields,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub number_of_seasons: Option<u32>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub seasons: Vec<SeasonSummary>,
}

/// Card fields shared by list entries and detail responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFields {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<u64>,
}

impl ItemDetails {
    pub fn to_item(&self, kind: MediaKind) -> MediaItem {
        let mut item = ListEntry {
            id: self.id,
            card: self.card.clone(),
        }
        .into_item(kind);
        self.merge_into(&mut item);
        item
    }

    /// Copies the enrichment fields onto a card built from a list entry.
    pub fn merge_into(&self, item: &mut MediaItem) {
        item.genres = self.genres.clone();
        item.genre_ids = self.genres.iter().map(|g| g.id).collect();
        if item.kind == MediaKind::Series {
            item.season_count = Some(self.number_of_seasons.unwrap_or(0));
        }
        if let Some(score) = self.card.vote_average {
            item.score = score;
        }
        if let Some(overview) = self.card.overview.as_deref().filter(|o| !o.is_empty()) {
            item.synopsis = overview.to_string();
        }
    }

    /// Season 0 holds specials and is listed last.
    pub fn season_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.seasons.iter().map(|s| s.season_number).collect();
        if numbers.is_empty() {
            numbers = (1..=self.number_of_seasons.unwrap_or(0)).collect();
        }
        numbers.sort_by_key(|n| (*n == 0, *n));
        numbers.dedup();
        numbers
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonSummary {
    pub season_number: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchProviders {
    #[serde(default)]
    pub results: HashMap<String, RegionOffers>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionOffers {
    #[serde(default)]
    pub flatrate: Vec<Provider>,
    #[serde(default)]
    pub buy: Vec<Provider>,
    #[serde(default)]
    pub rent: Vec<Provider>,
}

impl WatchProviders {
    /// Subscription services available in `region`.
    pub fn flatrate_names(&self, region: &str) -> Vec<String> {
        self.results
            .get(region)
            .map(|r| r.flatrate.iter().map(|p| p.provider_name.clone()).collect())
            .unwrap_or_default()
    }
}

fn status_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        status_message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.status_message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn redact(url: &str, api_key: &str) -> String {
    if api_key.is_empty() {
        return url.to_string();
    }
    url.replace(&*urlencoding::encode(api_key), "***")
}
