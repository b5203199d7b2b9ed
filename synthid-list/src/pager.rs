use std::ops::Range;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// 1-based page cursor over a server-side total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pager {
    page: u32,
    page_size: u32,
    total: u64,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pager {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn max_page(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.max_page()
    }

    /// Move to `page`, clamped to the valid range. Returns whether the page changed.
    pub fn go_to(&mut self, page: u32) -> bool {
        let page = page.clamp(1, self.max_page());
        let changed = page != self.page;
        self.page = page;
        changed
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.page.saturating_add(1))
    }

    pub fn prev(&mut self) -> bool {
        self.go_to(self.page.saturating_sub(1))
    }

    pub fn reset(&mut self) -> bool {
        let changed = self.page != 1;
        self.page = 1;
        changed
    }

    /// Record a new total. Returns true when the current page fell off the
    /// end and was pulled back.
    pub fn set_total(&mut self, total: u64) -> bool {
        self.total = total;
        let max = self.max_page();
        if self.page > max {
            self.page = max;
            return true;
        }
        false
    }

    /// Index range of the current page within the full result set.
    pub fn range(&self) -> Range<usize> {
        self.range_of(self.page)
    }

    pub fn expected_len(&self, page: u32) -> usize {
        self.range_of(page).len()
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let r = self.range();
        let end = r.end.min(items.len());
        let start = r.start.min(end);
        &items[start..end]
    }

    fn range_of(&self, page: u32) -> Range<usize> {
        let total = usize::try_from(self.total).unwrap_or(usize::MAX);
        let size = self.page_size as usize;
        let start = (page.max(1) as usize - 1).saturating_mul(size).min(total);
        let end = start.saturating_add(size).min(total);
        start..end
    }
}
