use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogPage, CatalogService};
use crate::error::{EnrichmentWarning, Result};
use crate::models::{MediaItem, MediaKind, ResultPage};
use crate::query::{FilterState, ProviderFallback, QueryBuilder, NETFLIX_PROVIDER_ID};

#[derive(Debug, Clone, Default, Serialize)]
pub struct HomeRows {
    pub popular_movies: Vec<MediaItem>,
    /// Popular series on the main streaming services.
    pub streaming_series: Vec<MediaItem>,
    pub netflix_movies: Vec<MediaItem>,
    pub netflix_series: Vec<MediaItem>,
    /// Rows whose list request failed and are shown empty.
    pub row_errors: Vec<String>,
    pub warnings: Vec<EnrichmentWarning>,
}

/// Loads the four home rows concurrently. Never fails: each row degrades on its own.
pub async fn load_home(service: &CatalogService) -> HomeRows {
    let netflix = ProviderFallback::Custom(vec![NETFLIX_PROVIDER_ID]);
    let streaming_series = service.query_builder(MediaKind::Series);
    let netflix_movies = service
        .query_builder(MediaKind::Movie)
        .with_fallback(netflix.clone());
    let netflix_series = service
        .query_builder(MediaKind::Series)
        .with_fallback(netflix);

    let (popular_movies, streaming_series, netflix_movies, netflix_series) = tokio::join!(
        popular_movies(service),
        discover_row(service, &streaming_series),
        discover_row(service, &netflix_movies),
        discover_row(service, &netflix_series),
    );

    let mut rows = HomeRows::default();
    rows.popular_movies = rows.take_row("popular movies", popular_movies);
    rows.streaming_series = rows.take_row("streaming series", streaming_series);
    rows.netflix_movies = rows.take_row("netflix movies", netflix_movies);
    rows.netflix_series = rows.take_row("netflix series", netflix_series);

    info!(
        movies = rows.popular_movies.len(),
        series = rows.streaming_series.len(),
        netflix_movies = rows.netflix_movies.len(),
        netflix_series = rows.netflix_series.len(),
        "Home rows loaded"
    );
    rows
}

impl HomeRows {
    fn take_row(&mut self, label: &str, outcome: Result<CatalogPage>) -> Vec<MediaItem> {
        match outcome {
            Ok(CatalogPage { page, warnings }) => {
                self.warnings.extend(warnings);
                page.items
            }
            Err(err) => {
                warn!("Home row {} unavailable: {}", label, err);
                self.row_errors.push(format!("{label}: {err}"));
                Vec::new()
            }
        }
    }
}

async fn popular_movies(service: &CatalogService) -> Result<CatalogPage> {
    let list = service.api().popular(MediaKind::Movie, 1).await?;
    let items = list
        .results
        .into_iter()
        .map(|entry| entry.into_item(MediaKind::Movie))
        .collect();
    let (items, warnings) = service.enrich_all(items).await;
    let mut page = ResultPage::empty();
    page.items = items;
    Ok(CatalogPage { page, warnings })
}

/// First page of a discover query with default filters, enriched like a browse page.
async fn discover_row(service: &CatalogService, builder: &QueryBuilder) -> Result<CatalogPage> {
    let query = builder.build(&FilterState::default());
    service.fetch_page(&query).await
}
