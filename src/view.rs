use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use tracing::trace;

pub type ColumnKey = String;

// One row of displayable data. Key order defines column order.
pub type Record = IndexMap<ColumnKey, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: ColumnKey,
    pub direction: SortDirection,
}

// Values of the shape "Alpha, Beta, Gamma" are exploded into their tokens
// when collecting filter options.
static COMMA_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+, )+[A-Za-z]+$").unwrap());

/// Reduce `rows` to those where any field contains `term` as a
/// case-insensitive substring. The empty term is the identity.
///
/// The term is always treated as a literal, so characters that are special
/// to pattern matching cannot crash or widen the search.
pub fn search(rows: &[Record], term: &str) -> Vec<Record> {
    if term.is_empty() {
        return rows.to_vec();
    }
    let needle = term.to_lowercase();
    rows.iter()
        .filter(|row| row.values().any(|v| v.to_lowercase().contains(&needle)))
        .cloned()
        .collect()
}

/// Active per-column accepted-value constraints. An absent column imposes no
/// constraint; the set for a present column is never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    columns: BTreeMap<ColumnKey, BTreeSet<String>>,
}

impl FilterSet {
    /// Add or remove an accepted value for a column. Copy-on-write, adding is
    /// idempotent. Removing the last value removes the column entirely, since
    /// an absent column means "no filter" while an empty set would match
    /// nothing.
    pub fn toggle(&self, key: &str, value: &str, selected: bool) -> FilterSet {
        let mut columns = self.columns.clone();
        if selected {
            columns
                .entry(key.to_string())
                .or_default()
                .insert(value.to_string());
        } else if let Some(values) = columns.get_mut(key) {
            values.remove(value);
            if values.is_empty() {
                columns.remove(key);
            }
        }
        FilterSet { columns }
    }

    /// Drop all accepted values for a column.
    pub fn clear(&self, key: &str) -> FilterSet {
        let mut columns = self.columns.clone();
        columns.remove(key);
        FilterSet { columns }
    }

    /// Keep the rows that pass every active column. A row passes a column if
    /// its field contains at least one of the accepted values as a substring,
    /// so it is OR within a column and AND across columns. A missing field
    /// reads as empty and fails any non-trivial constraint.
    pub fn apply(&self, rows: &[Record]) -> Vec<Record> {
        if self.columns.is_empty() {
            return rows.to_vec();
        }
        rows.iter()
            .filter(|row| {
                self.columns.iter().all(|(key, values)| {
                    let field = row.get(key).map(String::as_str).unwrap_or("");
                    values.iter().any(|v| field.contains(v.as_str()))
                })
            })
            .cloned()
            .collect()
    }

    pub fn accepts(&self, key: &str, value: &str) -> bool {
        self.columns.get(key).is_some_and(|values| values.contains(value))
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns with an active constraint, for indicator rendering.
    pub fn active_columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// Collect the distinct values of `key` across all rows, in first-occurrence
/// order. Comma-and-space separated lists of alphabetic tokens are exploded
/// into their components, everything else is taken whole.
pub fn options_for(rows: &[Record], key: &str) -> Vec<String> {
    let mut options = IndexSet::new();
    for row in rows {
        let Some(value) = row.get(key) else { continue };
        if COMMA_LIST.is_match(value) {
            for token in value.split(", ") {
                options.insert(token.to_string());
            }
        } else {
            options.insert(value.clone());
        }
    }
    options.into_iter().collect()
}

/// Comparison function for the chosen column. If both values parse as
/// calendar dates they compare chronologically, otherwise they compare as
/// plain strings ("10" sorts before "2"). Descending flips the sign. Missing
/// fields compare as empty strings.
pub fn comparator(spec: &SortSpec) -> impl Fn(&Record, &Record) -> Ordering + '_ {
    move |a, b| {
        let av = a.get(&spec.key).map(String::as_str).unwrap_or("");
        let bv = b.get(&spec.key).map(String::as_str).unwrap_or("");
        let ord = match (parse_date(av), parse_date(bv)) {
            (Some(ad), Some(bd)) => ad.cmp(&bd),
            _ => av.cmp(bv),
        };
        match spec.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Session state tying source rows, filters, search term and the derived view
/// together. The source is immutable after construction; every transition
/// recomputes `filtered` before a render can read it.
pub struct ViewState {
    source: Vec<Record>,
    filters: FilterSet,
    term: String,
    sort: Option<SortSpec>,
    filtered: Vec<Record>,
}

impl ViewState {
    pub fn new(source: Vec<Record>) -> Self {
        let filtered = source.clone();
        ViewState {
            source,
            filters: FilterSet::default(),
            term: String::new(),
            sort: None,
            filtered,
        }
    }

    pub fn set_term(&mut self, term: &str) {
        trace!("Set search term {:?}", term);
        self.term = term.to_string();
        self.recompute();
    }

    pub fn toggle_filter(&mut self, key: &str, value: &str, selected: bool) {
        trace!("Toggle filter {}={:?} -> {}", key, value, selected);
        self.filters = self.filters.toggle(key, value, selected);
        self.recompute();
    }

    pub fn clear_filter_column(&mut self, key: &str) {
        trace!("Clear filters on {}", key);
        self.filters = self.filters.clear(key);
        self.recompute();
    }

    /// Full reset, back to the unfiltered, unsorted source order.
    pub fn clear_all(&mut self) {
        self.term.clear();
        self.filters = FilterSet::default();
        self.sort = None;
        self.filtered = self.source.clone();
    }

    /// Stable-sort the current view, so sorting composes with whatever
    /// filters and search are active.
    pub fn sort(&mut self, spec: SortSpec) {
        self.filtered.sort_by(comparator(&spec));
        self.sort = Some(spec);
    }

    // Search always narrows the filter-passed set, never the previous search
    // result, so repeated searches do not compound.
    fn recompute(&mut self) {
        let passed = self.filters.apply(&self.source);
        self.filtered = if self.term.is_empty() {
            passed
        } else {
            search(&passed, &self.term)
        };
    }

    pub fn rows(&self) -> &[Record] {
        &self.filtered
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn sort_spec(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// The column schema, taken from the first record.
    pub fn columns(&self) -> Vec<ColumnKey> {
        self.source
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Filter choices for one column, collected over the full source set.
    pub fn options_for(&self, key: &str) -> Vec<String> {
        options_for(&self.source, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, &str)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn people() -> Vec<Record> {
        vec![
            record(&[("name", "Alice, Bob"), ("city", "NY"), ("date", "2021-01-02")]),
            record(&[("name", "Carl"), ("city", "LA"), ("date", "2021-01-01")]),
            record(&[("name", "Dora"), ("city", "NY"), ("date", "2020-06-15")]),
        ]
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let rows = people();
        let hits = search(&rows, "ny");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["name"], "Alice, Bob");
        assert_eq!(hits[1]["name"], "Dora");
    }

    #[test]
    fn search_empty_term_is_identity() {
        let rows = people();
        assert_eq!(search(&rows, ""), rows);
    }

    #[test]
    fn search_narrows_or_preserves() {
        let rows = people();
        for term in ["a", "NY", "carl", "zzz"] {
            assert!(search(&rows, term).len() <= rows.len());
        }
        assert!(search(&rows, "no such value").is_empty());
    }

    #[test]
    fn search_treats_metacharacters_literally() {
        let rows = vec![record(&[("k", "a.c")]), record(&[("k", "abc")])];
        let hits = search(&rows, "a.c");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["k"], "a.c");
        assert!(search(&rows, "(unclosed").is_empty());
    }

    #[test]
    fn search_treats_missing_fields_as_absent() {
        let rows = vec![record(&[("k", "x")]), record(&[("other", "y")])];
        let hits = search(&rows, "y");
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn toggle_creates_adds_and_is_idempotent() {
        let filters = FilterSet::default();
        let once = filters.toggle("city", "NY", true);
        assert!(once.accepts("city", "NY"));
        let twice = once.toggle("city", "NY", true);
        assert_eq!(once, twice);
        // input was not mutated
        assert!(filters.is_empty());
    }

    #[test]
    fn toggle_round_trip_restores_original() {
        let filters = FilterSet::default().toggle("city", "LA", true);
        let round = filters
            .toggle("name", "Carl", true)
            .toggle("name", "Carl", false);
        assert_eq!(round, filters);
    }

    #[test]
    fn removing_last_value_removes_the_column() {
        let filters = FilterSet::default()
            .toggle("city", "NY", true)
            .toggle("city", "NY", false);
        assert!(filters.is_empty());
        // and the column imposes no constraint anymore
        assert_eq!(filters.apply(&people()).len(), 3);
    }

    #[test]
    fn apply_is_or_within_a_column() {
        let rows = people();
        let one = FilterSet::default().toggle("city", "NY", true);
        let both = one.toggle("city", "LA", true);
        assert_eq!(one.apply(&rows).len(), 2);
        assert_eq!(both.apply(&rows).len(), 3);
        assert!(both.apply(&rows).len() >= one.apply(&rows).len());
    }

    #[test]
    fn apply_is_and_across_columns() {
        let rows = people();
        let city = FilterSet::default().toggle("city", "NY", true);
        let narrowed = city.toggle("name", "Dora", true);
        assert!(narrowed.apply(&rows).len() <= city.apply(&rows).len());
        assert_eq!(narrowed.apply(&rows).len(), 1);
        assert_eq!(narrowed.apply(&rows)[0]["name"], "Dora");
    }

    #[test]
    fn apply_empty_filters_is_identity() {
        let rows = people();
        assert_eq!(FilterSet::default().apply(&rows), rows);
    }

    #[test]
    fn clear_removes_a_column() {
        let filters = FilterSet::default()
            .toggle("city", "NY", true)
            .toggle("name", "Carl", true);
        let cleared = filters.clear("city");
        assert!(!cleared.accepts("city", "NY"));
        assert!(cleared.accepts("name", "Carl"));
    }

    #[test]
    fn options_explode_comma_lists() {
        let rows = vec![
            record(&[("name", "Alice, Bob"), ("city", "NY")]),
            record(&[("name", "Carl"), ("city", "LA")]),
        ];
        assert_eq!(options_for(&rows, "name"), vec!["Alice", "Bob", "Carl"]);
        // non-alphabetic values are kept whole
        let rows = vec![record(&[("k", "1, 2")]), record(&[("k", "Alpha, Beta")])];
        assert_eq!(options_for(&rows, "k"), vec!["1, 2", "Alpha", "Beta"]);
    }

    #[test]
    fn options_deduplicate_in_first_occurrence_order() {
        let rows = vec![
            record(&[("city", "NY")]),
            record(&[("city", "LA")]),
            record(&[("city", "NY")]),
        ];
        assert_eq!(options_for(&rows, "city"), vec!["NY", "LA"]);
    }

    #[test]
    fn comparator_is_date_aware() {
        let spec = SortSpec {
            key: "date".to_string(),
            direction: SortDirection::Ascending,
        };
        let a = record(&[("date", "2021-01-01")]);
        let b = record(&[("date", "2021-01-02")]);
        assert_eq!(comparator(&spec)(&a, &b), Ordering::Less);
        let desc = SortSpec {
            key: "date".to_string(),
            direction: SortDirection::Descending,
        };
        assert_eq!(comparator(&desc)(&a, &b), Ordering::Greater);
    }

    #[test]
    fn comparator_falls_back_to_string_order() {
        // "10" and "2" are not dates, so they compare lexicographically
        let spec = SortSpec {
            key: "date".to_string(),
            direction: SortDirection::Ascending,
        };
        let a = record(&[("date", "10")]);
        let b = record(&[("date", "2")]);
        assert_eq!(comparator(&spec)(&a, &b), Ordering::Less);
    }

    #[test]
    fn sort_is_stable() {
        let mut view = ViewState::new(vec![
            record(&[("k", "b"), ("id", "1")]),
            record(&[("k", "a"), ("id", "2")]),
            record(&[("k", "b"), ("id", "3")]),
        ]);
        view.sort(SortSpec {
            key: "k".to_string(),
            direction: SortDirection::Ascending,
        });
        let ids: Vec<&str> = view.rows().iter().map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
    }

    #[test]
    fn term_narrows_the_filter_passed_set() {
        let mut view = ViewState::new(people());
        view.toggle_filter("city", "NY", true);
        view.set_term("dora");
        assert_eq!(view.rows().len(), 1);
        // a second search starts from the filtered set again, not from the
        // previous search result
        view.set_term("alice");
        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.rows()[0]["name"], "Alice, Bob");
    }

    #[test]
    fn clearing_the_term_recomputes_from_source() {
        let mut view = ViewState::new(people());
        view.toggle_filter("city", "NY", true);
        view.set_term("dora");
        view.set_term("");
        assert_eq!(view.rows().len(), 2);
    }

    #[test]
    fn clear_all_is_idempotent() {
        let mut view = ViewState::new(people());
        view.set_term("dora");
        view.toggle_filter("city", "LA", true);
        view.sort(SortSpec {
            key: "name".to_string(),
            direction: SortDirection::Descending,
        });
        view.clear_all();
        assert_eq!(view.rows(), ViewState::new(people()).rows());
        assert!(view.sort_spec().is_none());
        view.clear_all();
        assert_eq!(view.rows().len(), 3);
        assert!(view.filters().is_empty());
        assert!(view.term().is_empty());
    }

    #[test]
    fn sort_composes_with_active_filters() {
        let mut view = ViewState::new(people());
        view.toggle_filter("city", "NY", true);
        view.sort(SortSpec {
            key: "date".to_string(),
            direction: SortDirection::Ascending,
        });
        let dates: Vec<&str> = view.rows().iter().map(|r| r["date"].as_str()).collect();
        assert_eq!(dates, vec!["2020-06-15", "2021-01-02"]);
    }

    #[test]
    fn empty_source_is_valid() {
        let mut view = ViewState::new(Vec::new());
        assert!(view.rows().is_empty());
        assert!(view.columns().is_empty());
        view.set_term("x");
        view.toggle_filter("k", "v", true);
        view.clear_all();
        assert!(view.rows().is_empty());
    }
}
