//! Filter state and its translation into TMDB discover/search parameters.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CatalogError, Result};
use crate::models::MediaKind;

pub const NETFLIX_PROVIDER_ID: u64 = 8;

/// Netflix, Disney+, Max and Prime Video.
pub const MAIN_PROVIDER_IDS: [u64; 4] = [NETFLIX_PROVIDER_ID, 337, 1899, 119];

pub const MIN_SCORE: f32 = 0.0;
pub const MAX_SCORE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    PopularityDesc,
    PopularityAsc,
    ScoreDesc,
    ScoreAsc,
    ReleaseDesc,
    ReleaseAsc,
    TitleAsc,
    TitleDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleOrder {
    Ascending,
    Descending,
}

impl SortKey {
    /// Title orderings are not available upstream and are applied locally.
    pub fn client_order(&self) -> Option<TitleOrder> {
        match self {
            SortKey::TitleAsc => Some(TitleOrder::Ascending),
            SortKey::TitleDesc => Some(TitleOrder::Descending),
            _ => None,
        }
    }

    /// `sort_by` value for the discover endpoint, `None` for client-only keys.
    pub fn upstream_param(&self, kind: MediaKind) -> Option<&'static str> {
        let release_asc = match kind {
            MediaKind::Movie => "release_date.asc",
            MediaKind::Series => "first_air_date.asc",
        };
        let release_desc = match kind {
            MediaKind::Movie => "release_date.desc",
            MediaKind::Series => "first_air_date.desc",
        };
        match self {
            SortKey::PopularityDesc => Some("popularity.desc"),
            SortKey::PopularityAsc => Some("popularity.asc"),
            SortKey::ScoreDesc => Some("vote_average.desc"),
            SortKey::ScoreAsc => Some("vote_average.asc"),
            SortKey::ReleaseDesc => Some(release_desc),
            SortKey::ReleaseAsc => Some(release_asc),
            SortKey::TitleAsc | SortKey::TitleDesc => None,
        }
    }
}

impl FromStr for SortKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "popularity.desc" => Ok(SortKey::PopularityDesc),
            "popularity.asc" => Ok(SortKey::PopularityAsc),
            "vote_average.desc" => Ok(SortKey::ScoreDesc),
            "vote_average.asc" => Ok(SortKey::ScoreAsc),
            "release_date.desc" | "first_air_date.desc" => Ok(SortKey::ReleaseDesc),
            "release_date.asc" | "first_air_date.asc" => Ok(SortKey::ReleaseAsc),
            "title.asc" => Ok(SortKey::TitleAsc),
            "title.desc" => Ok(SortKey::TitleDesc),
            other => Err(CatalogError::InvalidFilter(format!(
                "unknown sort key '{other}'"
            ))),
        }
    }
}

/// ClassInd age ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Certification {
    General,
    Ten,
    Twelve,
    Fourteen,
    Sixteen,
    Eighteen,
}

impl Certification {
    pub const ALL: [Certification; 6] = [
        Certification::General,
        Certification::Ten,
        Certification::Twelve,
        Certification::Fourteen,
        Certification::Sixteen,
        Certification::Eighteen,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Certification::General => "L",
            Certification::Ten => "10",
            Certification::Twelve => "12",
            Certification::Fourteen => "14",
            Certification::Sixteen => "16",
            Certification::Eighteen => "18",
        }
    }
}

impl fmt::Display for Certification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Certification {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim();
        Certification::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| CatalogError::InvalidFilter(format!("unknown certification '{code}'")))
    }
}

/// Inclusive vote-average bounds, always within `[0, 10]` with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    min: f32,
    max: f32,
}

impl ScoreRange {
    pub fn new(min: f32, max: f32) -> Result<Self> {
        let in_bounds = |v: f32| v.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&v);
        if !in_bounds(min) || !in_bounds(max) {
            return Err(CatalogError::InvalidFilter(format!(
                "score bounds must lie within [{MIN_SCORE}, {MAX_SCORE}], got [{min}, {max}]"
            )));
        }
        if min > max {
            return Err(CatalogError::InvalidFilter(format!(
                "minimum score {min} is above maximum score {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self {
            min: MIN_SCORE,
            max: MAX_SCORE,
        }
    }
}

/// User-selected browse filters. Every setter except [`FilterState::set_page`]
/// sends the view back to page 1.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    page: u32,
    sort: SortKey,
    genre_id: Option<String>,
    provider_id: Option<String>,
    certification: Option<Certification>,
    country_code: Option<String>,
    search_term: Option<String>,
    score: ScoreRange,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            page: 1,
            sort: SortKey::default(),
            genre_id: None,
            provider_id: None,
            certification: None,
            country_code: None,
            search_term: None,
            score: ScoreRange::default(),
        }
    }
}

impl FilterState {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn genre_id(&self) -> Option<&str> {
        self.genre_id.as_deref()
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    pub fn certification(&self) -> Option<Certification> {
        self.certification
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search_term.as_deref()
    }

    pub fn score(&self) -> ScoreRange {
        self.score
    }

    pub fn is_search(&self) -> bool {
        self.search_term.is_some()
    }

    pub fn set_page(&mut self, page: u32) -> Result<()> {
        if page == 0 {
            return Err(CatalogError::InvalidFilter("page must be at least 1".into()));
        }
        self.page = page;
        Ok(())
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        self.page = 1;
    }

    pub fn set_genre(&mut self, genre_id: Option<&str>) {
        self.genre_id = selection(genre_id);
        self.page = 1;
    }

    pub fn set_provider(&mut self, provider_id: Option<&str>) {
        self.provider_id = selection(provider_id);
        self.page = 1;
    }

    pub fn set_certification(&mut self, certification: Option<Certification>) {
        self.certification = certification;
        self.page = 1;
    }

    pub fn set_country(&mut self, country_code: Option<&str>) {
        self.country_code = selection(country_code).map(|c| c.to_uppercase());
        self.page = 1;
    }

    pub fn set_search_term(&mut self, term: Option<&str>) {
        self.search_term = selection(term);
        self.page = 1;
    }

    pub fn set_score_range(&mut self, score: ScoreRange) {
        self.score = score;
        self.page = 1;
    }

    pub fn set_min_score(&mut self, min: f32) -> Result<()> {
        self.set_score_range(ScoreRange::new(min, self.score.max)?);
        Ok(())
    }

    pub fn set_max_score(&mut self, max: f32) -> Result<()> {
        self.set_score_range(ScoreRange::new(self.score.min, max)?);
        Ok(())
    }
}

fn selection(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Raw filter input as it arrives on a query string. Empty strings mean "all".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub page: Option<u32>,
    pub sort_by: Option<String>,
    pub genre: Option<String>,
    pub provider: Option<String>,
    pub certification: Option<String>,
    pub country: Option<String>,
    pub query: Option<String>,
    pub min_score: Option<f32>,
    pub max_score: Option<f32>,
}

impl TryFrom<FilterParams> for FilterState {
    type Error = CatalogError;

    fn try_from(params: FilterParams) -> Result<Self> {
        let mut filter = FilterState::default();
        if let Some(sort) = params.sort_by.as_deref() {
            filter.set_sort(sort.parse()?);
        }
        filter.set_genre(params.genre.as_deref());
        filter.set_provider(params.provider.as_deref());
        let certification = match selection(params.certification.as_deref()) {
            Some(code) => Some(code.parse()?),
            None => None,
        };
        filter.set_certification(certification);
        filter.set_country(params.country.as_deref());
        filter.set_search_term(params.query.as_deref());
        filter.set_score_range(ScoreRange::new(
            params.min_score.unwrap_or(MIN_SCORE),
            params.max_score.unwrap_or(MAX_SCORE),
        )?);
        if let Some(page) = params.page {
            filter.set_page(page)?;
        }
        Ok(filter)
    }
}

/// What to send as `with_watch_providers` when the user picked no provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFallback {
    None,
    MainProviders,
    Custom(Vec<u64>),
}

impl ProviderFallback {
    /// Series browsing defaults to the main streaming services; movies to the whole catalog.
    pub fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Movie => ProviderFallback::None,
            MediaKind::Series => ProviderFallback::MainProviders,
        }
    }

    fn param(&self) -> Option<String> {
        let ids: &[u64] = match self {
            ProviderFallback::None => return None,
            ProviderFallback::MainProviders => &MAIN_PROVIDER_IDS,
            ProviderFallback::Custom(ids) if ids.is_empty() => return None,
            ProviderFallback::Custom(ids) => ids,
        };
        Some(
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join("|"),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    Discover,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Search => "search",
            Endpoint::Discover => "discover",
        }
    }
}

/// One upstream list request, minus the credentials and language the client adds.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub kind: MediaKind,
    pub endpoint: Endpoint,
    pub params: BTreeMap<String, String>,
    /// Present when the result must be ordered locally over a bounded page window.
    pub local_sort: Option<TitleOrder>,
}

impl CatalogQuery {
    pub fn path(&self) -> String {
        format!("{}/{}", self.endpoint.as_str(), self.kind.path_segment())
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn page(&self) -> u32 {
        self.param("page").and_then(|p| p.parse().ok()).unwrap_or(1)
    }

    pub fn with_page(&self, page: u32) -> Self {
        let mut next = self.clone();
        next.params.insert("page".to_string(), page.to_string());
        next
    }

    pub fn to_query_string(&self) -> String {
        encode_params(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

pub(crate) fn encode_params<'a>(params: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    params
        .into_iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    kind: MediaKind,
    region: String,
    fallback: ProviderFallback,
}

impl QueryBuilder {
    pub fn new(kind: MediaKind, region: impl Into<String>) -> Self {
        Self {
            kind,
            region: region.into(),
            fallback: ProviderFallback::default_for(kind),
        }
    }

    pub fn with_fallback(mut self, fallback: ProviderFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Search wins over every other selection it cannot honor, including the
    /// client-only title sorts: search results keep upstream relevance order.
    pub fn build(&self, filter: &FilterState) -> CatalogQuery {
        let mut params = BTreeMap::new();
        params.insert("page".to_string(), filter.page().to_string());
        params.insert(
            "vote_average.gte".to_string(),
            filter.score().min().to_string(),
        );
        params.insert(
            "vote_average.lte".to_string(),
            filter.score().max().to_string(),
        );

        if let Some(term) = filter.search_term() {
            params.insert("query".to_string(), term.to_string());
            return CatalogQuery {
                kind: self.kind,
                endpoint: Endpoint::Search,
                params,
                local_sort: None,
            };
        }

        let local_sort = filter.sort().client_order();
        if let Some(sort_by) = filter.sort().upstream_param(self.kind) {
            params.insert("sort_by".to_string(), sort_by.to_string());
        }
        if let Some(genre) = filter.genre_id() {
            params.insert("with_genres".to_string(), genre.to_string());
        }
        let providers = filter
            .provider_id()
            .map(str::to_string)
            .or_else(|| self.fallback.param());
        if let Some(providers) = providers {
            params.insert("with_watch_providers".to_string(), providers);
            params.insert("watch_region".to_string(), self.region.clone());
        }
        if let Some(cert) = filter.certification() {
            let key = match self.kind {
                MediaKind::Movie => "certification",
                MediaKind::Series => "certification.lte",
            };
            params.insert(key.to_string(), cert.code().to_string());
            params.insert("certification_country".to_string(), self.region.clone());
        }
        if let Some(country) = filter.country_code() {
            params.insert("with_origin_country".to_string(), country.to_string());
        }

        CatalogQuery {
            kind: self.kind,
            endpoint: Endpoint::Discover,
            params,
            local_sort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movies() -> QueryBuilder {
        QueryBuilder::new(MediaKind::Movie, "BR")
    }

    fn loaded_filter() -> FilterState {
        let mut filter = FilterState::default();
        filter.set_sort(SortKey::ScoreDesc);
        filter.set_genre(Some("28"));
        filter.set_provider(Some("8"));
        filter.set_certification(Some(Certification::Fourteen));
        filter.set_country(Some("us"));
        filter
    }

    #[test]
    fn search_term_selects_search_endpoint() {
        let mut filter = FilterState::default();
        filter.set_search_term(Some("matrix"));
        let query = movies().build(&filter);
        assert_eq!(query.endpoint, Endpoint::Search);
        assert_eq!(query.path(), "search/movie");
        assert_eq!(query.param("query"), Some("matrix"));
        assert_eq!(query.param("page"), Some("1"));
        assert_eq!(query.param("sort_by"), None);
    }

    #[test]
    fn search_drops_unsupported_parameters() {
        for kind in [MediaKind::Movie, MediaKind::Series] {
            for sort in [SortKey::ScoreDesc, SortKey::TitleAsc, SortKey::TitleDesc] {
                let mut filter = loaded_filter();
                filter.set_sort(sort);
                filter.set_search_term(Some("dune"));
                let query = QueryBuilder::new(kind, "BR").build(&filter);
                for key in [
                    "sort_by",
                    "with_watch_providers",
                    "watch_region",
                    "certification",
                    "certification.lte",
                    "certification_country",
                    "with_genres",
                    "with_origin_country",
                ] {
                    assert_eq!(query.param(key), None, "{key} leaked into search");
                }
                assert_eq!(query.local_sort, None);
            }
        }
    }

    #[test]
    fn discover_with_score_and_genre() {
        let mut filter = FilterState::default();
        filter.set_score_range(ScoreRange::new(7.0, 10.0).unwrap());
        filter.set_genre(Some("28"));
        let query = movies().build(&filter);
        assert_eq!(query.endpoint, Endpoint::Discover);
        assert_eq!(query.param("vote_average.gte"), Some("7"));
        assert_eq!(query.param("vote_average.lte"), Some("10"));
        assert_eq!(query.param("with_genres"), Some("28"));
        assert_eq!(query.param("sort_by"), Some("popularity.desc"));
        assert_eq!(query.param("with_watch_providers"), None);
    }

    #[test]
    fn score_bounds_pass_through_unchanged() {
        for (min, max) in [(0.0, 10.0), (2.5, 2.5), (6.5, 9.0)] {
            let mut filter = FilterState::default();
            filter.set_score_range(ScoreRange::new(min, max).unwrap());
            let query = movies().build(&filter);
            let gte: f32 = query.param("vote_average.gte").unwrap().parse().unwrap();
            let lte: f32 = query.param("vote_average.lte").unwrap().parse().unwrap();
            assert_eq!((gte, lte), (min, max));
            assert!(gte <= lte);
        }
    }

    #[test]
    fn invalid_score_ranges_are_rejected() {
        assert!(ScoreRange::new(8.0, 7.0).is_err());
        assert!(ScoreRange::new(-1.0, 7.0).is_err());
        assert!(ScoreRange::new(0.0, 11.0).is_err());
        assert!(ScoreRange::new(f32::NAN, 5.0).is_err());

        let mut filter = FilterState::default();
        filter.set_max_score(5.0).unwrap();
        assert!(filter.set_min_score(6.0).is_err());
        assert_eq!(filter.score().min(), 0.0);
    }

    #[test]
    fn title_sort_is_client_only() {
        let mut filter = FilterState::default();
        filter.set_sort(SortKey::TitleDesc);
        let query = movies().build(&filter);
        assert_eq!(query.param("sort_by"), None);
        assert_eq!(query.local_sort, Some(TitleOrder::Descending));
    }

    #[test]
    fn release_sort_depends_on_kind() {
        let mut filter = FilterState::default();
        filter.set_sort(SortKey::ReleaseAsc);
        assert_eq!(
            movies().build(&filter).param("sort_by"),
            Some("release_date.asc")
        );
        let series = QueryBuilder::new(MediaKind::Series, "BR").build(&filter);
        assert_eq!(series.param("sort_by"), Some("first_air_date.asc"));
    }

    #[test]
    fn optional_filters_only_when_selected() {
        let query = movies().build(&loaded_filter());
        assert_eq!(query.param("with_genres"), Some("28"));
        assert_eq!(query.param("with_watch_providers"), Some("8"));
        assert_eq!(query.param("watch_region"), Some("BR"));
        assert_eq!(query.param("certification"), Some("14"));
        assert_eq!(query.param("certification_country"), Some("BR"));
        assert_eq!(query.param("with_origin_country"), Some("US"));

        let bare = movies().build(&FilterState::default());
        for key in [
            "with_genres",
            "with_watch_providers",
            "watch_region",
            "certification",
            "with_origin_country",
            "query",
        ] {
            assert_eq!(bare.param(key), None);
        }
    }

    #[test]
    fn series_certification_is_a_ceiling() {
        let mut filter = FilterState::default();
        filter.set_certification(Some(Certification::Twelve));
        let query = QueryBuilder::new(MediaKind::Series, "BR").build(&filter);
        assert_eq!(query.param("certification.lte"), Some("12"));
        assert_eq!(query.param("certification"), None);
    }

    #[test]
    fn provider_fallback_is_explicit() {
        let filter = FilterState::default();
        let series = QueryBuilder::new(MediaKind::Series, "BR").build(&filter);
        assert_eq!(series.param("with_watch_providers"), Some("8|337|1899|119"));

        let none = QueryBuilder::new(MediaKind::Series, "BR")
            .with_fallback(ProviderFallback::None)
            .build(&filter);
        assert_eq!(none.param("with_watch_providers"), None);

        let custom = movies()
            .with_fallback(ProviderFallback::Custom(vec![8, 9]))
            .build(&filter);
        assert_eq!(custom.param("with_watch_providers"), Some("8|9"));

        let mut chosen = FilterState::default();
        chosen.set_provider(Some("337"));
        let query = QueryBuilder::new(MediaKind::Series, "BR").build(&chosen);
        assert_eq!(query.param("with_watch_providers"), Some("337"));
    }

    #[test]
    fn every_filter_setter_resets_page() {
        let setters: Vec<(&str, Box<dyn Fn(&mut FilterState)>)> = vec![
            ("sort", Box::new(|f: &mut FilterState| f.set_sort(SortKey::TitleAsc))),
            ("genre", Box::new(|f: &mut FilterState| f.set_genre(Some("12")))),
            ("provider", Box::new(|f: &mut FilterState| f.set_provider(Some("8")))),
            (
                "certification",
                Box::new(|f: &mut FilterState| f.set_certification(Some(Certification::General))),
            ),
            ("country", Box::new(|f: &mut FilterState| f.set_country(Some("BR")))),
            ("search", Box::new(|f: &mut FilterState| f.set_search_term(Some("alien")))),
            (
                "score",
                Box::new(|f: &mut FilterState| f.set_score_range(ScoreRange::new(3.0, 9.0).unwrap())),
            ),
            ("min", Box::new(|f: &mut FilterState| f.set_min_score(1.0).unwrap())),
            ("max", Box::new(|f: &mut FilterState| f.set_max_score(9.5).unwrap())),
        ];
        for (name, set) in setters {
            let mut filter = FilterState::default();
            filter.set_page(4).unwrap();
            set(&mut filter);
            assert_eq!(filter.page(), 1, "{name} did not reset the page");
        }
    }

    #[test]
    fn page_zero_is_invalid() {
        let mut filter = FilterState::default();
        assert!(filter.set_page(0).unwrap_err().is_invalid_filter());
    }

    #[test]
    fn filter_params_convert_with_empty_meaning_all() {
        let params = FilterParams {
            page: Some(3),
            sort_by: Some("title.asc".into()),
            genre: Some(String::new()),
            provider: Some("  ".into()),
            certification: Some("l".into()),
            country: Some("br".into()),
            query: None,
            min_score: Some(5.0),
            max_score: None,
        };
        let filter = FilterState::try_from(params).unwrap();
        assert_eq!(filter.page(), 3);
        assert_eq!(filter.sort(), SortKey::TitleAsc);
        assert_eq!(filter.genre_id(), None);
        assert_eq!(filter.provider_id(), None);
        assert_eq!(filter.certification(), Some(Certification::General));
        assert_eq!(filter.country_code(), Some("BR"));
        assert_eq!(filter.score(), ScoreRange::new(5.0, 10.0).unwrap());
    }

    #[test]
    fn filter_params_reject_bad_input() {
        let bad_sort = FilterParams {
            sort_by: Some("budget.desc".into()),
            ..FilterParams::default()
        };
        assert!(FilterState::try_from(bad_sort).is_err());

        let bad_cert = FilterParams {
            certification: Some("PG-13".into()),
            ..FilterParams::default()
        };
        assert!(FilterState::try_from(bad_cert).is_err());
    }

    #[test]
    fn query_string_is_url_encoded() {
        let mut filter = FilterState::default();
        filter.set_search_term(Some("o poderoso chefão"));
        let qs = movies().build(&filter).to_query_string();
        assert!(qs.contains("query=o%20poderoso%20chef%C3%A3o"));
        assert!(qs.contains("vote_average.gte=0"));
    }
}
