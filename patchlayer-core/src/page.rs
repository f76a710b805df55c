//! Pagination types for the find surface.
//!
//! [`PaginationParams`] describes which slice of a result set a caller wants;
//! [`Page`] is the returned slice plus the metadata needed to navigate onward.

use serde::{Deserialize, Serialize};
use std::cmp::min;

/// A single page of paginated results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of items across all pages.
    pub count: usize,
    /// The next page number (if more pages exist).
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Parameters for paginating through large result sets.
///
/// Pages are 1-indexed (page 1 is the first page).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    /// Creates new pagination parameters.
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Calculates the offset (number of items to skip) for this page.
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.per_page
    }

    /// Slices `items` down to this page, with navigation metadata.
    ///
    /// Returns an empty page when the offset is beyond the end of the list.
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        if items.is_empty() || self.offset() >= items.len() {
            return Page::default();
        }

        let count = items.len();
        let end = min(self.offset() + self.per_page, count);
        let page_items = items
            .into_iter()
            .skip(self.offset())
            .take(end - self.offset())
            .collect();

        Page {
            items: page_items,
            count,
            next_page: (end < count).then(|| self.page + 1),
            previous_page: (self.page > 1).then(|| self.page - 1),
        }
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}
