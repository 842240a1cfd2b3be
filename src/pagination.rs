/// DynTable Pagination
///
/// Derives page boundaries from a total row count and a page size. Page
/// numbers are 1-based. An empty result still reports page 1 so there is
/// always something to display.
///
/// # Examples
///
/// ```
/// use dyntable::Paginator;
///
/// let mut pager = Paginator::new(95, 20).unwrap();
/// assert_eq!(pager.total_pages(), 5);
///
/// pager.go_to_page(99);
/// assert_eq!(pager.current_page(), 5);
/// assert_eq!((pager.start_index(), pager.end_index()), (81, 95));
/// ```

use crate::error::{GridError, Result};
use std::fmt;
use std::ops::Range;

/// Called with `(page, page_size)` after every page or page-size change
pub type PageChangeCallback = Box<dyn FnMut(usize, usize)>;

pub struct Paginator {
    total_count: usize,
    page_size: usize,
    current_page: usize,
    on_page_change: Option<PageChangeCallback>,
}

impl Paginator {
    pub fn new(total_count: usize, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(GridError::InvalidPageSize);
        }
        Ok(Paginator {
            total_count,
            page_size,
            current_page: 1,
            on_page_change: None,
        })
    }

    /// Installs the page-change callback, replacing any previous one
    pub fn on_page_change<F>(&mut self, callback: F)
    where
        F: FnMut(usize, usize) + 'static,
    {
        self.on_page_change = Some(Box::new(callback));
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// `ceil(total_count / page_size)`; zero rows means zero pages
    pub fn total_pages(&self) -> usize {
        self.total_count.div_ceil(self.page_size)
    }

    fn last_page(&self) -> usize {
        self.total_pages().max(1)
    }

    /// Clamps `page` into range, commits it and notifies. Returns the page.
    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.current_page = page.clamp(1, self.last_page());
        self.notify();
        self.current_page
    }

    pub fn next_page(&mut self) -> usize {
        self.go_to_page(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> usize {
        self.go_to_page(self.current_page.saturating_sub(1))
    }

    /// Switches page size and returns to page 1
    pub fn change_page_size(&mut self, page_size: usize) -> Result<()> {
        if page_size == 0 {
            return Err(GridError::InvalidPageSize);
        }
        self.page_size = page_size;
        self.current_page = 1;
        self.notify();
        Ok(())
    }

    /// Updates the row count, pulling the current page back into range.
    /// Does not notify.
    pub fn set_total_count(&mut self, total_count: usize) {
        self.total_count = total_count;
        self.current_page = self.current_page.clamp(1, self.last_page());
    }

    /// 1-based position of the first row on the current page
    pub fn start_index(&self) -> usize {
        (self.current_page - 1) * self.page_size + 1
    }

    /// 1-based position of the last row on the current page
    pub fn end_index(&self) -> usize {
        (self.current_page * self.page_size).min(self.total_count)
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages()
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page > 1
    }

    /// Zero-based slice range for the current page
    pub fn page_range(&self) -> Range<usize> {
        let start = ((self.current_page - 1) * self.page_size).min(self.total_count);
        start..self.end_index().max(start)
    }

    fn notify(&mut self) {
        let (page, size) = (self.current_page, self.page_size);
        if let Some(callback) = self.on_page_change.as_mut() {
            callback(page, size);
        }
    }
}

impl fmt::Debug for Paginator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("total_count", &self.total_count)
            .field("page_size", &self.page_size)
            .field("current_page", &self.current_page)
            .field("has_callback", &self.on_page_change.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_page_boundaries() {
        let mut pager = Paginator::new(95, 20).unwrap();
        assert_eq!(pager.total_pages(), 5);

        assert_eq!(pager.go_to_page(99), 5);
        assert_eq!(pager.go_to_page(0), 1);

        pager.go_to_page(3);
        assert_eq!(pager.start_index(), 41);
        assert_eq!(pager.end_index(), 60);
        assert_eq!(pager.page_range(), 40..60);
        assert!(pager.has_next_page());
        assert!(pager.has_previous_page());
    }

    #[test]
    fn test_empty_result() {
        let mut pager = Paginator::new(0, 20).unwrap();
        assert_eq!(pager.total_pages(), 0);
        assert_eq!(pager.current_page(), 1);
        assert_eq!(pager.go_to_page(4), 1);
        assert_eq!(pager.end_index(), 0);
        assert_eq!(pager.page_range(), 0..0);
        assert!(!pager.has_next_page());
        assert!(!pager.has_previous_page());
    }

    #[test]
    fn test_callback_receives_clamped_page() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut pager = Paginator::new(95, 20).unwrap();
        let sink = seen.clone();
        pager.on_page_change(move |page, size| sink.borrow_mut().push((page, size)));

        pager.go_to_page(99);
        pager.change_page_size(50).unwrap();
        pager.next_page();
        pager.next_page();

        assert_eq!(*seen.borrow(), vec![(5, 20), (1, 50), (2, 50), (2, 50)]);
    }

    #[test]
    fn test_set_total_count_reclamps() {
        let mut pager = Paginator::new(100, 10).unwrap();
        pager.go_to_page(10);
        pager.set_total_count(25);
        assert_eq!(pager.current_page(), 3);
        assert_eq!(pager.end_index(), 25);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert_eq!(Paginator::new(10, 0).unwrap_err(), GridError::InvalidPageSize);
        let mut pager = Paginator::new(10, 5).unwrap();
        assert!(pager.change_page_size(0).is_err());
        assert_eq!(pager.page_size(), 5);
    }
}
