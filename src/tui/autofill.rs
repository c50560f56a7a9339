//! Autocomplete for the Parent and Dependencies form fields.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::issue::split_list;

/// Rows shown in the dropdown at once.
pub const MAX_ITEMS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofillTarget {
    Parent,
    Dependencies,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutofillItem {
    pub id: String,
    pub title: String,
}

impl AutofillItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }

    fn searchable(&self) -> String {
        format!("{} {}", self.id, self.title)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item: AutofillItem,
    pub score: i64,
    /// Matched character positions within the title.
    pub title_indices: Vec<usize>,
}

/// Candidate lists, loaded once per form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutofillSources {
    pub epics: Vec<AutofillItem>,
    pub open_issues: Vec<AutofillItem>,
}

impl AutofillSources {
    fn for_target(&self, target: AutofillTarget) -> &[AutofillItem] {
        match target {
            AutofillTarget::Parent => &self.epics,
            AutofillTarget::Dependencies => &self.open_issues,
        }
    }

    fn is_known_id(&self, target: AutofillTarget, id: &str) -> bool {
        self.for_target(target).iter().any(|i| i.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutofillState {
    pub target: AutofillTarget,
    pub query: String,
    pub items: Vec<ScoredItem>,
    pub selected: usize,
}

impl AutofillState {
    pub fn select_next(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + 1) % self.items.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + self.items.len() - 1) % self.items.len();
        }
    }

    pub fn selected_item(&self) -> Option<&AutofillItem> {
        self.items.get(self.selected).map(|s| &s.item)
    }
}

/// The part of the field text the dropdown filters on.
pub fn query_for(target: AutofillTarget, text: &str) -> &str {
    match target {
        AutofillTarget::Parent => text.trim(),
        AutofillTarget::Dependencies => match text.rfind(',') {
            Some(i) => text[i + 1..].trim(),
            None => text.trim(),
        },
    }
}

/// Ids already entered before the token being typed.
fn entered_ids(text: &str) -> Vec<String> {
    match text.rfind(',') {
        Some(i) => split_list(&text[..i]),
        None => Vec::new(),
    }
}

/// Fuzzy-filter `items` on `"<id> <title>"`, best score first.
pub fn filter(items: &[AutofillItem], query: &str, exclude: &[String]) -> Vec<ScoredItem> {
    let candidates = items.iter().filter(|i| !exclude.contains(&i.id));
    if query.is_empty() {
        return candidates
            .map(|item| ScoredItem {
                item: item.clone(),
                score: 0,
                title_indices: vec![],
            })
            .take(MAX_ITEMS)
            .collect();
    }

    let matcher = SkimMatcherV2::default().smart_case();
    let mut results: Vec<ScoredItem> = candidates
        .filter_map(|item| {
            let id_len = item.id.chars().count() + 1;
            matcher
                .fuzzy_indices(&item.searchable(), query)
                .map(|(score, indices)| ScoredItem {
                    item: item.clone(),
                    score,
                    title_indices: indices
                        .into_iter()
                        .filter(|&i| i >= id_len)
                        .map(|i| i - id_len)
                        .collect(),
                })
        })
        .collect();

    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(MAX_ITEMS);
    results
}

/// Recompute the dropdown after the focused field changed.
///
/// `dismissed` is the query the user closed the dropdown on with Esc.
pub fn refresh(
    previous: Option<&AutofillState>,
    target: AutofillTarget,
    text: &str,
    sources: &AutofillSources,
    dismissed: Option<&str>,
) -> Option<AutofillState> {
    let query = query_for(target, text);
    if dismissed == Some(query) {
        return None;
    }
    if sources.is_known_id(target, query) {
        return None;
    }
    if target == AutofillTarget::Dependencies && query.is_empty() && previous.is_none() {
        return None;
    }

    let exclude = match target {
        AutofillTarget::Parent => Vec::new(),
        AutofillTarget::Dependencies => entered_ids(text),
    };
    let items = filter(sources.for_target(target), query, &exclude);
    if items.is_empty() {
        return None;
    }
    let selected = match previous {
        Some(p) if p.target == target && p.query == query => p.selected.min(items.len() - 1),
        _ => 0,
    };
    Some(AutofillState {
        target,
        query: query.to_string(),
        items,
        selected,
    })
}

/// Field text after accepting `id`.
pub fn accept(target: AutofillTarget, text: &str, id: &str) -> String {
    match target {
        AutofillTarget::Parent => id.to_string(),
        AutofillTarget::Dependencies => {
            let prefix = match text.rfind(',') {
                Some(i) => &text[..=i],
                None => "",
            };
            if entered_ids(text).iter().any(|e| e == id) {
                return if prefix.is_empty() {
                    String::new()
                } else {
                    format!("{} ", prefix)
                };
            }
            if prefix.is_empty() {
                format!("{}, ", id)
            } else {
                format!("{} {}, ", prefix, id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> AutofillSources {
        AutofillSources {
            epics: vec![AutofillItem::new("td-e1", "Storage rewrite")],
            open_issues: vec![
                AutofillItem::new("td-a", "Parser"),
                AutofillItem::new("td-b", "Cache eviction"),
                AutofillItem::new("td-cache-42", "Cache warmup"),
                AutofillItem::new("td-z", "Docs"),
            ],
        }
    }

    #[test]
    fn dependencies_filter_excludes_entered_ids() {
        let s = sources();
        let state = refresh(None, AutofillTarget::Dependencies, "td-a, td-b, cach", &s, None).unwrap();
        assert_eq!(state.query, "cach");
        assert!(state.items.iter().all(|i| i.item.id != "td-a" && i.item.id != "td-b"));
        assert_eq!(state.items[0].item.id, "td-cache-42");
        let text = accept(AutofillTarget::Dependencies, "td-a, td-b, cach", "td-cache-42");
        assert_eq!(text, "td-a, td-b, td-cache-42, ");
    }

    #[test]
    fn first_dependency_has_no_leading_space() {
        assert_eq!(accept(AutofillTarget::Dependencies, "par", "td-a"), "td-a, ");
        assert_eq!(accept(AutofillTarget::Parent, "stor", "td-e1"), "td-e1");
    }

    #[test]
    fn accepting_a_duplicate_does_not_repeat_it() {
        let text = accept(AutofillTarget::Dependencies, "td-a, td-a", "td-a");
        assert_eq!(split_list(&text), vec!["td-a"]);
    }

    #[test]
    fn suppressed_after_selection() {
        let s = sources();
        // Exact id: user just picked it.
        assert!(refresh(None, AutofillTarget::Parent, "td-e1", &s, None).is_none());
        // Empty trailing token with no active dropdown stays closed.
        assert!(refresh(None, AutofillTarget::Dependencies, "td-a, ", &s, None).is_none());
    }

    #[test]
    fn empty_token_keeps_an_open_dropdown() {
        let s = sources();
        let open = refresh(None, AutofillTarget::Dependencies, "td-a, d", &s, None).unwrap();
        let still = refresh(Some(&open), AutofillTarget::Dependencies, "td-a, ", &s, None);
        assert!(still.is_some());
    }

    #[test]
    fn dismissed_query_stays_closed_until_it_changes() {
        let s = sources();
        assert!(refresh(None, AutofillTarget::Parent, "stor", &s, Some("stor")).is_none());
        assert!(refresh(None, AutofillTarget::Parent, "stora", &s, Some("stor")).is_some());
    }

    #[test]
    fn selection_wraps() {
        let s = sources();
        let mut st = refresh(None, AutofillTarget::Dependencies, "td", &s, None).unwrap();
        let n = st.items.len();
        st.select_prev();
        assert_eq!(st.selected, n - 1);
        st.select_next();
        assert_eq!(st.selected, 0);
    }
}
