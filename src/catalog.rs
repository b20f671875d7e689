use futures::future::try_join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assemble::assemble;
use crate::error::{EnrichmentWarning, Result};
use crate::images::{self, ImageSize};
use crate::models::{Country, Genre, MediaDetail, MediaItem, MediaKind, Provider, ResultPage};
use crate::providers::map_watch_providers;
use crate::query::{CatalogQuery, FilterState, QueryBuilder};
use crate::tmdb::{ListResponse, TmdbApi};

/// Upstream pages fetched before sorting locally by title.
pub const LOCAL_SORT_PAGE_CAP: u32 = 5;

/// Enrichment requests in flight at once for one page.
pub const ENRICHMENT_CONCURRENCY: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub page: ResultPage,
    pub warnings: Vec<EnrichmentWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailOutcome {
    pub detail: MediaDetail,
    pub warnings: Vec<EnrichmentWarning>,
}

/// Query builder, fetch client and assembler wired together.
#[derive(Clone)]
pub struct CatalogService {
    api: Arc<dyn TmdbApi>,
    region: String,
}

impl CatalogService {
    pub fn new(api: Arc<dyn TmdbApi>, region: impl Into<String>) -> Self {
        Self {
            api,
            region: region.into(),
        }
    }

    pub fn api(&self) -> &Arc<dyn TmdbApi> {
        &self.api
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Builder with the kind's default provider fallback.
    pub fn query_builder(&self, kind: MediaKind) -> QueryBuilder {
        QueryBuilder::new(kind, self.region.clone())
    }

    pub async fn browse(&self, kind: MediaKind, filter: &FilterState) -> Result<CatalogPage> {
        self.browse_with(&self.query_builder(kind), filter).await
    }

    pub async fn browse_with(
        &self,
        builder: &QueryBuilder,
        filter: &FilterState,
    ) -> Result<CatalogPage> {
        let query = builder.build(filter);
        info!(
            kind = %query.kind,
            endpoint = query.endpoint.as_str(),
            page = filter.page(),
            local_sort = query.local_sort.is_some(),
            "Loading catalog page"
        );
        self.fetch_page(&query).await
    }

    /// Primary request(s), assembly, then per-item enrichment.
    ///
    /// A failed primary request fails the page. Failed enrichment only degrades
    /// the affected item and is reported in `warnings`.
    pub async fn fetch_page(&self, query: &CatalogQuery) -> Result<CatalogPage> {
        let responses = self.fetch_raw(query).await?;
        let mut page = assemble(responses, query);
        let items = std::mem::take(&mut page.items);
        let (items, warnings) = self.enrich_all(items).await;
        page.items = items;
        Ok(CatalogPage { page, warnings })
    }

    async fn fetch_raw(&self, query: &CatalogQuery) -> Result<Vec<ListResponse>> {
        if query.local_sort.is_none() {
            return Ok(vec![self.api.list(query).await?]);
        }

        let first = self.api.list(&query.with_page(1)).await?;
        let last = first.total_pages.clamp(1, LOCAL_SORT_PAGE_CAP);
        debug!(
            upstream_pages = first.total_pages,
            fetched_pages = last,
            "Fetching bounded window for local sort"
        );
        let rest_queries: Vec<CatalogQuery> = (2..=last).map(|p| query.with_page(p)).collect();
        let rest = try_join_all(rest_queries.iter().map(|q| self.api.list(q))).await?;

        let mut responses = Vec::with_capacity(rest.len() + 1);
        responses.push(first);
        responses.extend(rest);
        Ok(responses)
    }

    /// Completes the cards of one page, keeping the input order.
    ///
    /// Movie genres resolve from the `genre_ids` the list already carries, with
    /// one genre-list request for the whole page. Series need a detail request
    /// each for their season count.
    pub async fn enrich_all(
        &self,
        items: Vec<MediaItem>,
    ) -> (Vec<MediaItem>, Vec<EnrichmentWarning>) {
        let movie_genres = if items.iter().any(|i| i.kind == MediaKind::Movie) {
            Some(self.api.genres(MediaKind::Movie).await)
        } else {
            None
        };
        let movie_genres = movie_genres.as_ref();

        let results: Vec<(MediaItem, Option<EnrichmentWarning>)> = stream::iter(items)
            .map(|mut item| async move {
                match (item.kind, movie_genres) {
                    (MediaKind::Movie, Some(Ok(table))) => {
                        item.resolve_genres(table);
                        (item, None)
                    }
                    (MediaKind::Movie, Some(Err(err))) => {
                        debug!(id = item.id, "Movie genres unavailable: {}", err);
                        let warning = EnrichmentWarning::new(item.id, item.kind, err);
                        item.degrade();
                        (item, Some(warning))
                    }
                    _ => self.enrich_item(item).await,
                }
            })
            .buffered(ENRICHMENT_CONCURRENCY)
            .collect()
            .await;

        if let Some(Err(err)) = movie_genres {
            warn!("Genre list failed, movie genres left empty: {}", err);
        }

        let mut warnings = Vec::new();
        let items = results
            .into_iter()
            .map(|(item, warning)| {
                warnings.extend(warning);
                item
            })
            .collect();
        (items, warnings)
    }

    /// Detail request for one card; a failure degrades the card instead of the page.
    pub async fn enrich_item(&self, mut item: MediaItem) -> (MediaItem, Option<EnrichmentWarning>) {
        match self.api.details(item.kind, item.id).await {
            Ok(details) => {
                details.merge_into(&mut item);
                (item, None)
            }
            Err(err) => {
                warn!(
                    kind = %item.kind,
                    id = item.id,
                    "Enrichment failed, showing defaults: {}",
                    err
                );
                let warning = EnrichmentWarning::new(item.id, item.kind, &err);
                item.degrade();
                (item, Some(warning))
            }
        }
    }

    /// Details and watch providers for the detail view, fetched concurrently.
    pub async fn open_detail(&self, kind: MediaKind, id: u64) -> Result<DetailOutcome> {
        let (details, providers) =
            tokio::join!(self.api.details(kind, id), self.api.watch_providers(kind, id));
        let details = details?;

        let mut warnings = Vec::new();
        let (streaming_platforms, services) = match providers {
            Ok(p) => (p.flatrate_names(&self.region), map_watch_providers(&p)),
            Err(err) => {
                warn!(%kind, id, "Watch providers unavailable: {}", err);
                warnings.push(EnrichmentWarning::new(id, kind, &err));
                (Vec::new(), Vec::new())
            }
        };

        let season_numbers = match kind {
            MediaKind::Series => details.season_numbers(),
            MediaKind::Movie => Vec::new(),
        };
        let detail = MediaDetail {
            item: details.to_item(kind),
            backdrop_url: images::image_url(details.backdrop_path.as_deref(), ImageSize::W780),
            streaming_platforms,
            services,
            season_numbers,
        };
        Ok(DetailOutcome { detail, warnings })
    }

    pub async fn genres(&self, kind: MediaKind) -> Result<Vec<Genre>> {
        self.api.genres(kind).await
    }

    pub async fn providers(&self, kind: MediaKind) -> Result<Vec<Provider>> {
        self.api.providers(kind).await
    }

    pub async fn countries(&self) -> Result<Vec<Country>> {
        self.api.countries().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::models::Episode;
    use crate::query::SortKey;
    use crate::tmdb::{CardFields, ItemDetails, ListEntry, WatchProviders};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeTmdb {
        total_pages: u32,
        failing_details: HashSet<u64>,
        list_calls: Mutex<Vec<u32>>,
        detail_calls: AtomicUsize,
        fail_list: bool,
        fail_genres: bool,
    }

    impl FakeTmdb {
        fn new(total_pages: u32) -> Self {
            Self {
                total_pages,
                failing_details: HashSet::new(),
                list_calls: Mutex::new(Vec::new()),
                detail_calls: AtomicUsize::new(0),
                fail_list: false,
                fail_genres: false,
            }
        }
    }

    fn entry(id: u64, name: &str) -> ListEntry {
        ListEntry {
            id,
            card: CardFields {
                name: Some(name.to_string()),
                title: Some(name.to_string()),
                genre_ids: vec![28, 18],
                ..CardFields::default()
            },
        }
    }

    fn upstream_error() -> CatalogError {
        CatalogError::Status {
            url: "fake".into(),
            status: 500,
            message: "boom".into(),
        }
    }

    #[async_trait]
    impl TmdbApi for FakeTmdb {
        async fn genres(&self, _kind: MediaKind) -> Result<Vec<Genre>> {
            if self.fail_genres {
                return Err(upstream_error());
            }
            Ok(vec![
                Genre {
                    id: 18,
                    name: "Drama".into(),
                },
                Genre {
                    id: 28,
                    name: "Ação".into(),
                },
            ])
        }
        async fn providers(&self, _kind: MediaKind) -> Result<Vec<Provider>> {
            Ok(Vec::new())
        }
        async fn countries(&self) -> Result<Vec<Country>> {
            Ok(Vec::new())
        }
        async fn list(&self, query: &CatalogQuery) -> Result<ListResponse> {
            if self.fail_list {
                return Err(upstream_error());
            }
            let page = query.page();
            self.list_calls.lock().unwrap().push(page);
            let base = u64::from(page) * 10;
            Ok(ListResponse {
                page,
                total_pages: self.total_pages,
                total_results: 0,
                results: vec![
                    entry(base + 1, &format!("Zulu {page}")),
                    entry(base + 2, &format!("Alpha {page}")),
                ],
            })
        }
        async fn popular(&self, _kind: MediaKind, _page: u32) -> Result<ListResponse> {
            Err(upstream_error())
        }
        async fn details(&self, _kind: MediaKind, id: u64) -> Result<ItemDetails> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_details.contains(&id) {
                return Err(upstream_error());
            }
            Ok(ItemDetails {
                id,
                genres: vec![Genre {
                    id: 18,
                    name: "Drama".into(),
                }],
                number_of_seasons: Some(4),
                ..ItemDetails::default()
            })
        }
        async fn watch_providers(&self, _kind: MediaKind, _id: u64) -> Result<WatchProviders> {
            Err(upstream_error())
        }
        async fn season(&self, _series_id: u64, _season: u32) -> Result<Vec<Episode>> {
            Ok(Vec::new())
        }
    }

    fn service(fake: FakeTmdb) -> (CatalogService, Arc<FakeTmdb>) {
        let fake = Arc::new(fake);
        (CatalogService::new(fake.clone(), "BR"), fake)
    }

    #[tokio::test]
    async fn one_failed_enrichment_keeps_item_count() {
        let mut fake = FakeTmdb::new(3);
        fake.failing_details.insert(12);
        let (svc, _) = service(fake);

        let mut filter = FilterState::default();
        filter.set_page(1).unwrap();
        let result = svc.browse(MediaKind::Series, &filter).await.unwrap();

        assert_eq!(result.page.items.len(), 2);
        let failed = result.page.items.iter().find(|i| i.id == 12).unwrap();
        assert_eq!(failed.season_count, Some(0));
        assert!(failed.genres.is_empty());
        let ok = result.page.items.iter().find(|i| i.id == 11).unwrap();
        assert_eq!(ok.season_count, Some(4));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].item_id, 12);
    }

    #[tokio::test]
    async fn movie_genres_resolve_without_detail_calls() {
        let (svc, fake) = service(FakeTmdb::new(1));
        let result = svc
            .browse(MediaKind::Movie, &FilterState::default())
            .await
            .unwrap();

        assert_eq!(fake.detail_calls.load(Ordering::SeqCst), 0);
        let names: Vec<&str> = result.page.items[0]
            .genres
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        assert_eq!(names, vec!["Ação", "Drama"]);
        assert_eq!(result.page.items[0].season_count, None);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn failed_genre_list_degrades_every_movie() {
        let mut fake = FakeTmdb::new(1);
        fake.fail_genres = true;
        let (svc, _) = service(fake);
        let result = svc
            .browse(MediaKind::Movie, &FilterState::default())
            .await
            .unwrap();

        assert_eq!(result.page.items.len(), 2);
        assert!(result.page.items.iter().all(|i| i.genres.is_empty()));
        assert_eq!(result.warnings.len(), 2);
    }

    #[tokio::test]
    async fn local_sort_fetches_bounded_window() {
        let (svc, fake) = service(FakeTmdb::new(40));
        let mut filter = FilterState::default();
        filter.set_sort(SortKey::TitleAsc);

        let result = svc.browse(MediaKind::Movie, &filter).await.unwrap();
        let mut calls = fake.list_calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec![1, 2, 3, 4, 5]);
        assert_eq!(result.page.items.len(), 10);
        assert_eq!(result.page.total_pages, 1);
        assert_eq!(result.page.current_page, 1);
        assert_eq!(result.page.items[0].display_name, "Alpha 1");
        assert_eq!(result.page.items[9].display_name, "Zulu 5");
    }

    #[tokio::test]
    async fn local_sort_stops_at_upstream_total() {
        let (svc, fake) = service(FakeTmdb::new(2));
        let mut filter = FilterState::default();
        filter.set_sort(SortKey::TitleDesc);
        svc.browse(MediaKind::Movie, &filter).await.unwrap();
        assert_eq!(fake.list_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_primary_call_is_an_error() {
        let mut fake = FakeTmdb::new(1);
        fake.fail_list = true;
        let (svc, _) = service(fake);
        let err = svc
            .browse(MediaKind::Movie, &FilterState::default())
            .await
            .unwrap_err();
        assert!(err.is_network_failure());
    }

    #[tokio::test]
    async fn detail_degrades_missing_providers() {
        let (svc, _) = service(FakeTmdb::new(1));
        let outcome = svc.open_detail(MediaKind::Series, 7).await.unwrap();
        assert!(outcome.detail.streaming_platforms.is_empty());
        assert_eq!(outcome.detail.season_numbers, vec![1, 2, 3, 4]);
        assert_eq!(outcome.detail.item.season_count, Some(4));
        assert_eq!(outcome.warnings.len(), 1);
    }
}
