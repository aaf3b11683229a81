//! Page/per-page normalization and the paginated result envelope.

use serde::Serialize;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// A normalized page request: `page >= 1`, `per_page` in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Clamps raw query values. Missing or non-positive pages become 1;
    /// `per_page` is clamped into range, defaulting to 20.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, i64::from(u32::MAX)) as u32;
        let per_page = per_page
            .unwrap_or(i64::from(DEFAULT_PER_PAGE))
            .clamp(1, i64::from(MAX_PER_PAGE)) as u32;
        Self { page, per_page }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals a client needs to navigate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let per_page = u64::from(request.per_page);
        let pages = if total == 0 {
            1
        } else {
            total.div_ceil(per_page)
        };
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            pages: self.pages,
        }
    }
}

/// Trims a search term, treating blank input as absent.
pub fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, 20);
        assert_eq!(req.skip(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, per_page: 1 });
        assert_eq!(PageRequest::new(Some(-4), Some(500)).per_page, 100);
    }

    #[test]
    fn skip_follows_page() {
        let req = PageRequest::new(Some(3), Some(10));
        assert_eq!(req.skip(), 20);
        assert_eq!(req.limit(), 10);
    }

    #[test]
    fn pages_round_up_and_never_zero() {
        let req = PageRequest::new(Some(1), Some(10));
        assert_eq!(Page::<u8>::new(vec![], 0, req).pages, 1);
        assert_eq!(Page::<u8>::new(vec![], 10, req).pages, 1);
        assert_eq!(Page::<u8>::new(vec![], 11, req).pages, 2);
    }

    #[test]
    fn map_keeps_totals() {
        let page = Page::new(vec![1, 2], 12, PageRequest::new(Some(2), Some(2)));
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total, 12);
        assert_eq!(mapped.pages, 6);
        assert_eq!(mapped.page, 2);
    }

    #[test]
    fn blank_search_is_absent() {
        assert_eq!(normalize_search(Some("  ")), None);
        assert_eq!(normalize_search(Some(" rust ")).as_deref(), Some("rust"));
        assert_eq!(normalize_search(None), None);
    }
}
