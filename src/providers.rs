use serde::Serialize;
use std::str::FromStr;

use crate::error::CatalogError;
use crate::tmdb::WatchProviders;

/// Regions scanned, in order. Offers anywhere else are ignored.
const SCANNED_REGIONS: [&str; 3] = ["BR", "US", "global"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingService {
    Netflix,
    Prime,
    Disney,
    HboMax,
    Hulu,
}

impl StreamingService {
    pub const ALL: [StreamingService; 5] = [
        StreamingService::Netflix,
        StreamingService::Prime,
        StreamingService::Disney,
        StreamingService::HboMax,
        StreamingService::Hulu,
    ];

    pub fn tmdb_id(&self) -> u64 {
        match self {
            StreamingService::Netflix => 8,
            StreamingService::Prime => 9,
            StreamingService::Disney => 337,
            StreamingService::HboMax => 384,
            StreamingService::Hulu => 15,
        }
    }

    pub fn from_tmdb_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tmdb_id() == id)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StreamingService::Netflix => "Netflix",
            StreamingService::Prime => "Amazon Prime",
            StreamingService::Disney => "Disney+",
            StreamingService::HboMax => "HBO Max",
            StreamingService::Hulu => "Hulu",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamingService::Netflix => "netflix",
            StreamingService::Prime => "prime",
            StreamingService::Disney => "disney",
            StreamingService::HboMax => "hbomax",
            StreamingService::Hulu => "hulu",
        }
    }
}

impl FromStr for StreamingService {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|svc| svc.as_str() == key)
            .ok_or_else(|| CatalogError::InvalidFilter(format!("unknown streaming service '{s}'")))
    }
}

/// Known services offered by subscription or purchase, without duplicates,
/// in first-seen order across `BR`, `US` and `global`.
pub fn map_watch_providers(providers: &WatchProviders) -> Vec<StreamingService> {
    let mut found = Vec::new();
    for region in SCANNED_REGIONS {
        let Some(offers) = providers.results.get(region) else {
            continue;
        };
        for provider in offers.flatrate.iter().chain(offers.buy.iter()) {
            if let Some(service) = StreamingService::from_tmdb_id(provider.provider_id) {
                if !found.contains(&service) {
                    found.push(service);
                }
            }
        }
    }
    found
}
