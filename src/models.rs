use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;
use crate::providers::StreamingService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    /// Path segment TMDB uses for this kind.
    pub fn path_segment(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => f.write_str("movie"),
            MediaKind::Series => f.write_str("series"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaKind::Movie),
            "tv" | "series" => Ok(MediaKind::Series),
            other => Err(CatalogError::InvalidFilter(format!(
                "media kind must be 'movie' or 'series', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub provider_id: u64,
    pub provider_name: String,
    #[serde(default)]
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub iso_3166_1: String,
    #[serde(default)]
    pub english_name: String,
    #[serde(default)]
    pub native_name: Option<String>,
}

/// A movie or series as shown on a card.
///
/// `season_count` is only ever `Some` for series. Items are rebuilt on every
/// fetch; enrichment only fills `genres`, `season_count` and refreshes `score`
/// and `synopsis`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItem {
    pub id: u64,
    pub kind: MediaKind,
    pub display_name: String,
    pub synopsis: String,
    pub poster_path: Option<String>,
    pub poster_url: String,
    pub score: f32,
    pub primary_date: Option<String>,
    /// Genre ids as listed upstream; `genres` carries the resolved names.
    pub genre_ids: Vec<u64>,
    pub genres: Vec<Genre>,
    pub season_count: Option<u32>,
}

impl MediaItem {
    /// Fills `genres` from a genre table, keeping upstream id order. Unknown ids are skipped.
    pub fn resolve_genres(&mut self, table: &[Genre]) {
        self.genres = self
            .genre_ids
            .iter()
            .filter_map(|id| table.iter().find(|g| g.id == *id).cloned())
            .collect();
    }

    /// Applies the documented fallback for a failed enrichment call.
    pub fn degrade(&mut self) {
        self.genres.clear();
        if self.kind == MediaKind::Series {
            self.season_count = Some(0);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultPage {
    pub items: Vec<MediaItem>,
    pub total_pages: u32,
    pub current_page: u32,
    /// Set when the items were ordered locally and presented as one page.
    pub locally_sorted: bool,
}

impl ResultPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_pages: 1,
            current_page: 1,
            locally_sorted: false,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub episode_number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub still_path: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaDetail {
    pub item: MediaItem,
    pub backdrop_url: Option<String>,
    pub streaming_platforms: Vec<String>,
    /// Known services offering the title in the scanned regions.
    pub services: Vec<StreamingService>,
    /// Season numbers available for episode lookup (series only).
    pub season_numbers: Vec<u32>,
}
