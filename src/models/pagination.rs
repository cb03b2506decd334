//! Pagination
//!
//! Page numbers are forgiving: anything unparsable or below 1 means the
//! first page, anything past the end means the last page, and an empty
//! listing still has one (empty) page.

use serde::{Deserialize, Serialize};

/// One page of a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
    /// Number of pages, at least 1
    pub num_pages: u32,
    /// Whether a later page exists
    pub has_next: bool,
    /// Whether an earlier page exists
    pub has_prev: bool,
}

impl<T> PagedResult<T> {
    /// Wrap the items of an already resolved page
    pub fn new(items: Vec<T>, total: i64, page: u32, per_page: u32) -> Self {
        let num_pages = num_pages(total, per_page);
        Self {
            items,
            total,
            page,
            per_page,
            num_pages,
            has_next: page < num_pages,
            has_prev: page > 1,
        }
    }

    /// Check if the page holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Read a `?page=` value. Missing or non-numeric input yields 1.
///
/// A number too large for `i64` reads as `i64::MAX`, which clamps to the
/// last page.
pub fn parse_page_number(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim) else {
        return 1;
    };
    match raw.parse::<i64>() {
        Ok(number) => number,
        Err(_) if is_unsigned_integer(raw) => i64::MAX,
        Err(_) => 1,
    }
}

fn is_unsigned_integer(s: &str) -> bool {
    let digits = s.strip_prefix('+').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Number of pages needed for `total` items, never less than one.
pub fn num_pages(total: i64, per_page: u32) -> u32 {
    if per_page == 0 || total <= 0 {
        return 1;
    }
    let per_page = i64::from(per_page);
    let pages = (total + per_page - 1) / per_page;
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Clamp a requested page number into `1..=num_pages`.
pub fn resolve_page(requested: i64, total: i64, per_page: u32) -> u32 {
    let last = num_pages(total, per_page);
    if requested < 1 {
        1
    } else if requested > i64::from(last) {
        last
    } else {
        requested as u32
    }
}

/// Row offset of the first item on `page`.
pub fn offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}
