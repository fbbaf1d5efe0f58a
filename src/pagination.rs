use serde::{Deserialize, Serialize};

/// `?page=<n>` query parameter shared by every feed endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Offset/limit window for a resolved page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Fixed-size paginator.
///
/// A missing or non-numeric page selects the first page; a numeric page
/// outside `1..=num_pages` selects the last page. An empty result still has
/// one (empty) page.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: u64,
}

impl Paginator {
    pub fn new(per_page: usize) -> Self {
        Paginator {
            per_page: per_page.max(1) as u64,
        }
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn num_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.per_page).max(1)
    }

    pub fn window(&self, total: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(total);
        let number = match requested.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n >= 1 && (n as u64) <= num_pages => n as u64,
            Some(Ok(_)) => num_pages,
        };

        PageWindow {
            number,
            num_pages,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }
}

/// One page of results plus the navigation metadata clients need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total: u64) -> Self {
        Page {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
            has_next: window.number < window.num_pages,
            has_previous: window.number > 1,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_defaults() {
        let paginator = Paginator::new(10);

        let window = paginator.window(11, None);
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 2);
        assert_eq!(window.offset, 0);
        assert_eq!(window.limit, 10);
    }

    #[test]
    fn test_non_numeric_page_falls_back_to_first() {
        let paginator = Paginator::new(10);

        assert_eq!(paginator.window(30, Some("abc")).number, 1);
        assert_eq!(paginator.window(30, Some("")).number, 1);
    }

    #[test]
    fn test_out_of_range_page_clamps_to_last() {
        let paginator = Paginator::new(10);

        let window = paginator.window(25, Some("99"));
        assert_eq!(window.number, 3);
        assert_eq!(window.offset, 20);

        assert_eq!(paginator.window(25, Some("0")).number, 3);
        assert_eq!(paginator.window(25, Some("-4")).number, 3);
    }

    #[test]
    fn test_empty_result_has_single_page() {
        let paginator = Paginator::new(10);

        let window = paginator.window(0, Some("5"));
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);
        assert_eq!(window.offset, 0);
    }

    #[test]
    fn test_page_metadata() {
        let paginator = Paginator::new(10);
        let window = paginator.window(11, Some("2"));
        let page = Page::new(vec![1], window, 11);

        assert_eq!(page.len(), 1);
        assert!(page.has_previous);
        assert!(!page.has_next);
    }
}
