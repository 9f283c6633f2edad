use regex::{Regex, RegexBuilder};

/// Case-insensitive literal matcher for the last searched text.
pub fn build_highlight_regex(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Byte ranges of every match of `regex` in `text`.
pub fn match_ranges(text: &str, regex: &Regex) -> Vec<(usize, usize)> {
    regex
        .find_iter(text)
        .map(|mat| (mat.start(), mat.end()))
        .collect()
}
