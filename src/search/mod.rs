use crate::store::Snapshot;

mod worker;

pub use worker::{SearchOutcome, SearchTicket, SearchWorker};

/// Case-insensitive substring query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    raw: String,
    needle: String,
}

impl SearchQuery {
    /// Returns `None` for the empty query, which is never searched.
    /// Whitespace is significant: `"   "` looks for three spaces.
    pub fn parse(input: &str) -> Option<Self> {
        if input.is_empty() {
            return None;
        }
        Some(Self {
            raw: input.to_string(),
            needle: input.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, title: &str, body: &str) -> bool {
        title.to_lowercase().contains(&self.needle) || body.to_lowercase().contains(&self.needle)
    }
}

/// Titles whose title or body contains the query, in snapshot order.
pub fn search(snapshot: &Snapshot, query: &SearchQuery) -> Vec<String> {
    search_until(snapshot, query, || false).unwrap_or_default()
}

/// Same as [`search`], but gives up (returning `None`) as soon as
/// `abandoned` reports true between notes.
pub(crate) fn search_until<F>(
    snapshot: &Snapshot,
    query: &SearchQuery,
    abandoned: F,
) -> Option<Vec<String>>
where
    F: Fn() -> bool,
{
    let mut hits = Vec::new();
    for (title, body) in snapshot.iter() {
        if abandoned() {
            return None;
        }
        if query.matches(title, body) {
            hits.push(title.to_string());
        }
    }
    Some(hits)
}

pub fn summarize(titles: &[String]) -> String {
    if titles.is_empty() {
        return "Nothing found.".to_string();
    }
    format!("Found: {}", titles.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NoteStore;

    fn snapshot_of(entries: &[(&str, &str)]) -> Snapshot {
        entries
            .iter()
            .map(|(t, b)| (t.to_string(), b.to_string()))
            .collect::<NoteStore>()
            .snapshot()
    }

    fn query(input: &str) -> SearchQuery {
        SearchQuery::parse(input).expect("non-empty query")
    }

    #[test]
    fn body_match_ignores_case() {
        let snapshot = snapshot_of(&[("Recipe", "flour and sugar")]);
        assert_eq!(search(&snapshot, &query("SUGAR")), vec!["Recipe"]);
    }

    #[test]
    fn title_match_ignores_case() {
        let snapshot = snapshot_of(&[("Recipe", "x")]);
        assert_eq!(search(&snapshot, &query("rec")), vec!["Recipe"]);
    }

    #[test]
    fn results_follow_snapshot_order() {
        let snapshot = snapshot_of(&[
            ("zebra facts", "stripes"),
            ("Aardvark", "eats ants"),
            ("unrelated", "nothing here"),
            ("Ant farm", "colony"),
        ]);
        assert_eq!(
            search(&snapshot, &query("ant")),
            vec!["Aardvark".to_string(), "Ant farm".to_string()]
        );
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let snapshot = snapshot_of(&[("a", "b")]);
        assert!(search(&snapshot, &query("zzz")).is_empty());
        assert!(search(&Snapshot::default(), &query("a")).is_empty());
    }

    #[test]
    fn only_the_empty_query_is_rejected() {
        assert_eq!(SearchQuery::parse(""), None);
        assert_eq!(query(" a ").as_str(), " a ");
    }

    #[test]
    fn whitespace_query_matches_spaced_text() {
        let snapshot = snapshot_of(&[("Spaced", "a   b"), ("Tight", "a b"), ("Two  words", "")]);
        assert_eq!(search(&snapshot, &query("   ")), vec!["Spaced"]);
        assert_eq!(search(&snapshot, &query("  ")), vec!["Spaced", "Two  words"]);
    }

    #[test]
    fn abandoned_search_yields_nothing() {
        let snapshot = snapshot_of(&[("a", "a")]);
        assert_eq!(search_until(&snapshot, &query("a"), || true), None);
    }

    #[test]
    fn summary_formats() {
        assert_eq!(summarize(&[]), "Nothing found.");
        assert_eq!(
            summarize(&["Recipe".into(), "Shopping".into()]),
            "Found: Recipe, Shopping"
        );
    }
}
