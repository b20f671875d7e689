//! Browse-page state: filters, pagination and last-request-wins result handling.

use tracing::{debug, warn};

use crate::catalog::{CatalogPage, CatalogService};
use crate::error::{EnrichmentWarning, Result};
use crate::models::{MediaKind, ResultPage};
use crate::query::{Certification, FilterState, ScoreRange, SortKey};

#[derive(Debug, Clone, PartialEq)]
pub enum PageState {
    Idle,
    Loading,
    Ready(ResultPage),
    Failed(String),
}

/// Identifies one issued load. Only the most recent ticket may apply its result.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTicket {
    generation: u64,
    filter: FilterState,
}

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }
}

#[derive(Debug)]
pub struct CatalogView {
    kind: MediaKind,
    filter: FilterState,
    state: PageState,
    warnings: Vec<EnrichmentWarning>,
    issued: u64,
}

impl CatalogView {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            filter: FilterState::default(),
            state: PageState::Idle,
            warnings: Vec::new(),
            issued: 0,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn warnings(&self) -> &[EnrichmentWarning] {
        &self.warnings
    }

    pub fn current_page(&self) -> u32 {
        self.filter.page()
    }

    /// Pages known from the last applied result; 1 while loading or failed.
    pub fn total_pages(&self) -> u32 {
        match &self.state {
            PageState::Ready(page) => page.total_pages,
            _ => 1,
        }
    }

    pub fn can_go_next(&self) -> bool {
        self.current_page() < self.total_pages()
    }

    pub fn can_go_previous(&self) -> bool {
        self.current_page() > 1
    }

    /// Returns `false` when already on the last page.
    pub fn next_page(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        let next = self.current_page() + 1;
        self.filter.set_page(next).is_ok()
    }

    /// Returns `false` when already on the first page.
    pub fn previous_page(&mut self) -> bool {
        if !self.can_go_previous() {
            return false;
        }
        let prev = self.current_page() - 1;
        self.filter.set_page(prev).is_ok()
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.filter.set_sort(sort);
    }

    pub fn set_genre(&mut self, genre_id: Option<&str>) {
        self.filter.set_genre(genre_id);
    }

    pub fn set_provider(&mut self, provider_id: Option<&str>) {
        self.filter.set_provider(provider_id);
    }

    pub fn set_certification(&mut self, certification: Option<Certification>) {
        self.filter.set_certification(certification);
    }

    pub fn set_country(&mut self, country_code: Option<&str>) {
        self.filter.set_country(country_code);
    }

    pub fn set_search_term(&mut self, term: Option<&str>) {
        self.filter.set_search_term(term);
    }

    pub fn set_score_range(&mut self, score: ScoreRange) {
        self.filter.set_score_range(score);
    }

    pub fn begin_request(&mut self) -> RequestTicket {
        self.issued += 1;
        self.state = PageState::Loading;
        RequestTicket {
            generation: self.issued,
            filter: self.filter.clone(),
        }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        ticket.generation == self.issued
    }

    /// Installs the outcome of `ticket`'s load unless a newer load was issued
    /// since. Returns whether the outcome was applied.
    pub fn apply(&mut self, ticket: &RequestTicket, outcome: Result<CatalogPage>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                generation = ticket.generation,
                latest = self.issued,
                "Discarding superseded catalog response"
            );
            return false;
        }
        match outcome {
            Ok(CatalogPage { page, warnings }) => {
                self.state = PageState::Ready(page);
                self.warnings = warnings;
            }
            Err(err) => {
                warn!(kind = %self.kind, "Catalog page failed: {}", err);
                self.state = PageState::Failed(err.to_string());
                self.warnings.clear();
            }
        }
        true
    }

    /// Issues a load for the current filters and applies its outcome. A failed
    /// load lands in [`PageState::Failed`].
    pub async fn load(&mut self, service: &CatalogService) -> bool {
        let ticket = self.begin_request();
        let outcome = service.browse(self.kind, ticket.filter()).await;
        self.apply(&ticket, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    fn ready(current: u32, total: u32) -> Result<CatalogPage> {
        Ok(CatalogPage {
            page: ResultPage {
                items: Vec::new(),
                total_pages: total,
                current_page: current,
                locally_sorted: false,
            },
            warnings: Vec::new(),
        })
    }

    #[test]
    fn stale_responses_are_discarded() {
        let mut view = CatalogView::new(MediaKind::Movie);
        let first = view.begin_request();
        view.set_genre(Some("28"));
        let second = view.begin_request();

        assert!(view.apply(&second, ready(1, 7)));
        assert!(!view.apply(&first, ready(1, 2)));
        assert_eq!(view.total_pages(), 7);
        assert_eq!(second.filter().genre_id(), Some("28"));
        assert_eq!(first.filter().genre_id(), None);
    }

    #[test]
    fn pagination_buttons_follow_bounds() {
        let mut view = CatalogView::new(MediaKind::Series);
        assert!(!view.can_go_previous());
        assert!(!view.next_page());

        let ticket = view.begin_request();
        view.apply(&ticket, ready(1, 2));
        assert!(view.can_go_next());
        assert!(!view.can_go_previous());
        assert!(view.next_page());
        assert_eq!(view.filter().page(), 2);

        let ticket = view.begin_request();
        view.apply(&ticket, ready(2, 2));
        assert!(!view.can_go_next());
        assert!(!view.next_page());
        assert!(view.previous_page());
        assert_eq!(view.filter().page(), 1);
    }

    #[test]
    fn filter_change_returns_to_first_page() {
        let mut view = CatalogView::new(MediaKind::Movie);
        let ticket = view.begin_request();
        view.apply(&ticket, ready(1, 5));
        view.next_page();
        view.next_page();
        assert_eq!(view.filter().page(), 3);
        view.set_search_term(Some("alien"));
        assert_eq!(view.filter().page(), 1);
    }

    #[test]
    fn failures_become_failed_state() {
        let mut view = CatalogView::new(MediaKind::Movie);
        let ticket = view.begin_request();
        assert_eq!(view.state(), &PageState::Loading);
        let applied = view.apply(
            &ticket,
            Err(CatalogError::Timeout {
                url: "discover/movie".into(),
            }),
        );
        assert!(applied);
        assert!(matches!(view.state(), PageState::Failed(msg) if msg.contains("timed out")));
    }
}
