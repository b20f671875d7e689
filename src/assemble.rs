use std::cmp::Ordering;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{MediaItem, ResultPage};
use crate::query::{CatalogQuery, TitleOrder};
use crate::tmdb::ListResponse;

/// Builds the page the view shows from one or more upstream responses.
///
/// Responses are concatenated in the order given. With a local title sort the
/// whole window becomes a single page (`total_pages == current_page == 1`) and
/// repeated ids are kept once; otherwise upstream order and paging are preserved.
pub fn assemble(responses: Vec<ListResponse>, query: &CatalogQuery) -> ResultPage {
    let (upstream_page, upstream_total) = responses
        .first()
        .map(|r| (r.page, r.total_pages))
        .unwrap_or((1, 1));

    let mut items: Vec<MediaItem> = responses
        .into_iter()
        .flat_map(|r| r.results)
        .map(|entry| entry.into_item(query.kind))
        .collect();

    match query.local_sort {
        Some(order) => {
            let mut seen = HashSet::new();
            items.retain(|item| seen.insert(item.id));
            sort_by_title(&mut items, order);
            ResultPage {
                items,
                total_pages: 1,
                current_page: 1,
                locally_sorted: true,
            }
        }
        None => {
            let total_pages = upstream_total.max(1);
            ResultPage {
                items,
                total_pages,
                current_page: upstream_page.clamp(1, total_pages),
                locally_sorted: false,
            }
        }
    }
}

pub fn sort_by_title(items: &mut [MediaItem], order: TitleOrder) {
    items.sort_by(|a, b| {
        let ord = compare_titles(&a.display_name, &b.display_name);
        match order {
            TitleOrder::Ascending => ord,
            TitleOrder::Descending => ord.reverse(),
        }
    });
}

/// Accent- and case-insensitive comparison, so "Ágata" files next to "agata"
/// rather than after "Zorro". Ties fall back to the raw strings.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collation_key(title: &str) -> String {
    title
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
