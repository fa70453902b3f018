//! Pagination envelope for listing endpoints
//!
//! Serialized in camelCase per the API contract. `page` is clamped to
//! `[1, ∞)` and `pageSize` to `[1, 100]`.

use serde::Serialize;

/// Maximum rows per page
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default rows per page
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

/// A page of data plus its pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Clamp a requested page number to the valid range.
pub fn clamp_page(page: i64) -> i64 {
    page.max(1)
}

/// Clamp a requested page size to the valid range.
pub fn clamp_page_size(page_size: i64) -> i64 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Total page count for an item count (0 pages for 0 items).
pub fn total_pages(total_items: i64, page_size: i64) -> i64 {
    if total_items <= 0 {
        0
    } else {
        (total_items + page_size - 1) / page_size
    }
}
