use synthid_types::GenerationSummary;

use crate::pager::Pager;

/// Case-insensitive substring match used by client-side filtering.
pub trait Searchable {
    fn matches(&self, needle: &str) -> bool;
}

fn contains(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Searchable for GenerationSummary {
    fn matches(&self, needle: &str) -> bool {
        contains(&self.input_text, needle) || contains(&self.model, needle) || contains(&self.id.to_string(), needle)
    }
}

/// A list held entirely on the client, filtered and paged locally.
#[derive(Clone, Debug)]
pub struct LocalList<T> {
    items: Vec<T>,
    needle: String,
    pager: Pager,
}

impl<T: Searchable> LocalList<T> {
    pub fn new(items: Vec<T>, page_size: u32) -> Self {
        let mut pager = Pager::new(page_size);
        pager.set_total(items.len() as u64);
        Self {
            items,
            needle: String::new(),
            pager,
        }
    }

    /// Swap in a new item set. A change in length sends the view back to page 1.
    pub fn replace(&mut self, items: Vec<T>) {
        if items.len() != self.items.len() {
            self.pager.reset();
        }
        self.items = items;
        self.refilter();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn set_filter(&mut self, needle: &str) {
        self.needle = needle.trim().to_string();
        self.pager.reset();
        self.refilter();
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn next_page(&mut self) -> bool {
        self.pager.next()
    }

    pub fn prev_page(&mut self) -> bool {
        self.pager.prev()
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn filtered(&self) -> Vec<&T> {
        self.items.iter().filter(|i| i.matches(&self.needle)).collect()
    }

    /// Items on the current page after filtering.
    pub fn visible(&self) -> Vec<&T> {
        let filtered = self.filtered();
        self.pager.slice(&filtered).to_vec()
    }

    /// "Showing 3 of 12", or the plain count when nothing is filtered out.
    pub fn framing(&self) -> String {
        let shown = self.filtered().len();
        let total = self.total();
        if shown == total {
            format!("{total} items")
        } else {
            format!("Showing {shown} of {total}")
        }
    }

    fn refilter(&mut self) {
        let shown = self.filtered().len() as u64;
        self.pager.set_total(shown);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use synthid_types::GenerationId;

    use super::*;

    fn row(id: i64, text: &str) -> GenerationSummary {
        GenerationSummary {
            id: GenerationId(id),
            original_id: None,
            created_at: Utc::now(),
            input_text: text.into(),
            model: "Llama-3-8B".into(),
            watermark_enabled: true,
            attack_type: None,
            attack_intensity: None,
        }
    }

    #[test]
    fn filter_frames_against_full_count() {
        let rows = (1..=12).map(|i| row(i, if i % 4 == 0 { "Cats" } else { "dogs" })).collect();
        let mut list = LocalList::new(rows, 10);
        assert_eq!(list.framing(), "12 items");
        assert_eq!(list.visible().len(), 10);

        list.set_filter("cat");
        assert_eq!(list.visible().len(), 3);
        assert_eq!(list.framing(), "Showing 3 of 12");
        assert!(!list.next_page());
    }

    #[test]
    fn paging_walks_filtered_rows() {
        let rows = (1..=25).map(|i| row(i, "text")).collect();
        let mut list = LocalList::new(rows, 10);
        assert!(list.next_page());
        assert!(list.next_page());
        assert_eq!(list.visible().len(), 5);
        assert_eq!(list.visible()[0].id, GenerationId(21));

        list.set_filter("text");
        assert_eq!(list.pager().page(), 1);
    }

    #[test]
    fn new_rows_send_the_view_back_to_page_one() {
        let mut list = LocalList::new((1..=25).map(|i| row(i, "text")).collect(), 10);
        list.next_page();
        assert_eq!(list.pager().page(), 2);

        list.replace((1..=25).map(|i| row(i, "edited")).collect());
        assert_eq!(list.pager().page(), 2);

        list.replace((1..=26).map(|i| row(i, "text")).collect());
        assert_eq!(list.pager().page(), 1);
        assert_eq!(list.pager().total(), 26);
    }
}
