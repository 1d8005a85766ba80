//! Page-number pagination shared by every post feed.
//!
//! Out-of-range requests never fail: a missing or malformed `page` value
//! falls back to the first page and anything outside `1..=num_pages` lands on
//! the last page.

use serde::Serialize;

/// Fixed number of posts shown on each feed page.
pub const PAGE_SIZE: u64 = 10;

/// LIMIT/OFFSET window handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
}

impl PageRequest {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

/// Resolved position of one page inside a result set of `count` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
}

impl PageWindow {
    /// Resolve the raw `page` query value against `count` items.
    pub fn resolve(count: u64, raw_page: Option<&str>) -> Self {
        Self::resolve_with(count, PAGE_SIZE, raw_page)
    }

    pub fn resolve_with(count: u64, per_page: u64, raw_page: Option<&str>) -> Self {
        let per_page = per_page.max(1);
        let num_pages = count.div_ceil(per_page).max(1);

        let number = match parse_page_number(raw_page) {
            None => 1,
            Some(value) if value < 1 => num_pages,
            Some(value) => {
                let value = value as u64;
                if value > num_pages { num_pages } else { value }
            }
        };

        Self {
            number,
            num_pages,
            count,
            per_page,
        }
    }

    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.per_page, (self.number - 1) * self.per_page)
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_previous() || self.has_next()
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    /// 1-based index of the first item on this page, 0 for an empty result.
    pub fn start_index(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            (self.number - 1) * self.per_page + 1
        }
    }

    /// 1-based index of the last item on this page.
    pub fn end_index(&self) -> u64 {
        if self.number == self.num_pages {
            self.count
        } else {
            self.number * self.per_page
        }
    }
}

/// One page of items together with its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self { items, window }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            window: self.window,
        }
    }
}

/// Only integer strings are page numbers; anything else (`"2.0"`, `"1e1"`)
/// is treated as absent.
fn parse_page_number(raw: Option<&str>) -> Option<i64> {
    raw?.trim().parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_page_defaults_to_first() {
        let window = PageWindow::resolve(35, None);
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 4);
        assert_eq!(window.request(), PageRequest::new(10, 0));
    }

    #[test]
    fn non_numeric_page_defaults_to_first() {
        assert_eq!(PageWindow::resolve(35, Some("abc")).number, 1);
        assert_eq!(PageWindow::resolve(35, Some("2.5")).number, 1);
        assert_eq!(PageWindow::resolve(35, Some("")).number, 1);
    }

    #[test]
    fn float_notation_defaults_to_first() {
        for raw in ["2.0", "1e1", "3.0e0"] {
            let window = PageWindow::resolve(35, Some(raw));
            assert_eq!(window.number, 1, "page {raw}");
            assert_eq!(window.request(), PageRequest::new(10, 0));
        }
    }

    #[test]
    fn out_of_range_pages_land_on_last() {
        assert_eq!(PageWindow::resolve(35, Some("0")).number, 4);
        assert_eq!(PageWindow::resolve(35, Some("-3")).number, 4);
        assert_eq!(PageWindow::resolve(35, Some("99")).number, 4);
    }

    #[test]
    fn empty_result_has_one_page() {
        let window = PageWindow::resolve(0, Some("5"));
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);
        assert_eq!(window.start_index(), 0);
        assert_eq!(window.end_index(), 0);
        assert!(!window.has_other_pages());
    }

    #[test]
    fn exact_multiple_does_not_add_page() {
        assert_eq!(PageWindow::resolve(20, None).num_pages, 2);
        assert_eq!(PageWindow::resolve(21, None).num_pages, 3);
    }

    #[test]
    fn neighbours_and_indices() {
        let middle = PageWindow::resolve(35, Some("2"));
        assert_eq!(middle.previous_page_number(), Some(1));
        assert_eq!(middle.next_page_number(), Some(3));
        assert_eq!(middle.start_index(), 11);
        assert_eq!(middle.end_index(), 20);

        let last = PageWindow::resolve(35, Some("4"));
        assert!(last.has_previous());
        assert!(!last.has_next());
        assert_eq!(last.next_page_number(), None);
        assert_eq!(last.start_index(), 31);
        assert_eq!(last.end_index(), 35);
    }
}
