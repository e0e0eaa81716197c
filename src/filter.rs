//! In-memory search and sort over one content list. Synchronous and O(n) per
//! call; lists are expected to stay in the tens of records.

use chrono::{DateTime, Utc};

/// Implemented by every record the filter engine runs over.
pub trait Searchable {
    /// The main searched field (title).
    fn primary_text(&self) -> &str;
    /// An optional second searched field (description/body).
    fn secondary_text(&self) -> Option<&str> {
        None
    }
    fn created_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Newest,
    Oldest,
    Title,
}

impl SortKey {
    /// Unknown or missing sort params fall back to newest-first.
    pub fn parse(raw: Option<&str>) -> SortKey {
        match raw {
            Some("oldest") => SortKey::Oldest,
            Some("title") => SortKey::Title,
            _ => SortKey::Newest,
        }
    }
}

fn matches_term<T: Searchable>(item: &T, needle: &str) -> bool {
    if item.primary_text().to_lowercase().contains(needle) {
        return true;
    }
    item.secondary_text()
        .map(|s| s.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Apply the current control values to a list: case-insensitive substring
/// search over the searchable fields, then the selected sort order.
pub fn apply<T: Searchable>(mut items: Vec<T>, search: Option<&str>, sort: SortKey) -> Vec<T> {
    if let Some(term) = search {
        let needle = term.trim().to_lowercase();
        if !needle.is_empty() {
            items.retain(|item| matches_term(item, &needle));
        }
    }

    match sort {
        SortKey::Newest => items.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortKey::Oldest => items.sort_by(|a, b| a.created_at().cmp(&b.created_at())),
        SortKey::Title => items.sort_by(|a, b| {
            a.primary_text()
                .to_lowercase()
                .cmp(&b.primary_text().to_lowercase())
        }),
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        title: String,
        body: Option<String>,
        created_at: DateTime<Utc>,
    }

    impl Searchable for Item {
        fn primary_text(&self) -> &str {
            &self.title
        }
        fn secondary_text(&self) -> Option<&str> {
            self.body.as_deref()
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    fn item(title: &str, body: Option<&str>, secs: i64) -> Item {
        Item {
            title: title.to_string(),
            body: body.map(String::from),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let items = vec![
            item("Algebra Basics", None, 1),
            item("Geometry", Some("covers ALGEBRA too"), 2),
            item("Chemistry", None, 3),
        ];
        let out = apply(items, Some("algebra"), SortKey::Oldest);
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Algebra Basics", "Geometry"]);
    }

    #[test]
    fn search_returns_exactly_the_matching_subset() {
        let items = vec![
            item("one", None, 1),
            item("two", None, 2),
            item("three", None, 3),
        ];
        let out = apply(items.clone(), Some("t"), SortKey::Oldest);
        let expected: Vec<_> = items
            .into_iter()
            .filter(|i| i.title.contains('t'))
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn blank_search_keeps_everything() {
        let items = vec![item("a", None, 1), item("b", None, 2)];
        assert_eq!(apply(items, Some("   "), SortKey::Oldest).len(), 2);
    }

    #[test]
    fn newest_puts_later_timestamp_first() {
        let items = vec![item("A", None, 1), item("B", None, 2)];
        let out = apply(items, None, SortKey::Newest);
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[test]
    fn newest_and_oldest_are_exact_reverses() {
        let items = vec![
            item("a", None, 5),
            item("b", None, 1),
            item("c", None, 9),
            item("d", None, 3),
        ];
        let newest = apply(items.clone(), None, SortKey::Newest);
        let mut oldest = apply(items, None, SortKey::Oldest);
        oldest.reverse();
        assert_eq!(newest, oldest);
    }

    #[test]
    fn title_sort_ignores_case() {
        let items = vec![
            item("banana", None, 1),
            item("Apple", None, 2),
            item("cherry", None, 3),
        ];
        let out = apply(items, None, SortKey::Title);
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn unknown_sort_param_defaults_to_newest() {
        assert_eq!(SortKey::parse(Some("bogus")), SortKey::Newest);
        assert_eq!(SortKey::parse(None), SortKey::Newest);
        assert_eq!(SortKey::parse(Some("oldest")), SortKey::Oldest);
    }
}
