use crate::client::html::strip_html;
use crate::models::{FileRecord, Note};

/// Case-insensitive substring match used by the list filters.
pub trait Searchable {
    /// `needle` is already lowercased.
    fn matches(&self, needle: &str) -> bool;
}

impl Searchable for FileRecord {
    fn matches(&self, needle: &str) -> bool {
        self.original_name.to_lowercase().contains(needle)
    }
}

impl Searchable for Note {
    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || strip_html(&self.content).to_lowercase().contains(needle)
    }
}

/// Local copy of one resource list.
///
/// The cached items are only replaced by a refetch. Changing the sort key
/// asks for a refetch; changing the search term filters in memory on the
/// spot.
#[derive(Debug, Clone)]
pub struct ListView<T, S> {
    items: Vec<T>,
    sort: S,
    search: String,
}

impl<T: Searchable, S: Copy + PartialEq> ListView<T, S> {
    pub fn new(sort: S) -> Self {
        Self {
            items: Vec::new(),
            sort,
            search: String::new(),
        }
    }

    pub fn sort(&self) -> S {
        self.sort
    }

    /// Returns `true` when the key changed and the list must be fetched again.
    pub fn set_sort(&mut self, sort: S) -> bool {
        if self.sort == sort {
            return false;
        }
        self.sort = sort;
        true
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn visible(&self) -> Vec<&T> {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|item| item.matches(&needle))
            .collect()
    }
}
