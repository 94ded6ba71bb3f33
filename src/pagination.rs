//! Fixed-size pages over ordered catalog lists
//!
//! `paginate` never clamps: a page index past the end yields an empty slice
//! (with `has_prev` set and `has_next` cleared) instead of an error. Callers
//! only request pages they rendered navigation for.

use crate::button::{Button, ButtonToken, Domain, Keyboard};
use crate::db::CatalogItem;
use std::num::NonZeroUsize;

/// Button labels longer than this are cut to fit transport limits
pub const LABEL_WIDTH: usize = 29;

/// One visible entry of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageItem {
    pub id: i64,
    pub label: String,
}

/// A rendered page of a catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<PageItem>,
    pub page: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub total_pages: usize,
}

pub fn paginate(items: &[CatalogItem], page: usize, page_size: NonZeroUsize) -> Page {
    let size = page_size.get();
    let total_pages = items.len().div_ceil(size);
    let start = page.saturating_mul(size);

    let visible = items
        .iter()
        .skip(start)
        .take(size)
        .map(|item| PageItem {
            id: item.id,
            label: truncate_label(&item.name),
        })
        .collect();

    Page {
        items: visible,
        page,
        has_prev: page > 0,
        has_next: page.saturating_add(1) < total_pages,
        total_pages,
    }
}

/// Cut a label to [`LABEL_WIDTH`] characters
pub fn truncate_label(label: &str) -> String {
    label.chars().take(LABEL_WIDTH).collect()
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item buttons one per row, then navigation, then Back/Stop
    pub fn keyboard(&self, domain: Domain) -> Keyboard {
        let mut rows: Keyboard = self
            .items
            .iter()
            .map(|item| {
                vec![Button::new(
                    item.label.clone(),
                    ButtonToken::Item {
                        domain,
                        id: item.id,
                    },
                )]
            })
            .collect();

        let mut nav = Vec::new();
        if self.has_prev {
            nav.push(Button::new(
                "« Prev",
                ButtonToken::Page {
                    domain,
                    page: self.page - 1,
                },
            ));
        }
        if self.has_next {
            nav.push(Button::new(
                "Next »",
                ButtonToken::Page {
                    domain,
                    page: self.page + 1,
                },
            ));
        }
        if !nav.is_empty() {
            rows.push(nav);
        }

        rows.push(vec![
            Button::new("Back", ButtonToken::Back),
            Button::new("Stop", ButtonToken::Stop),
        ]);
        rows
    }
}
