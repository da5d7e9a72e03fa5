use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, trace};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::domain::{LexiconError, PAGE_SIZE};
use crate::parser::{ParsedCsv, Row};

#[derive(Debug, Clone)]
pub struct Dataset {
    pub headers: Arc<Vec<String>>,
    pub rows: Vec<Row>,
    pub version: u64,
    pub loaded_at: Instant,
}

impl Dataset {
    pub fn new(parsed: ParsedCsv, version: u64) -> Self {
        Dataset {
            headers: parsed.headers,
            rows: parsed.rows,
            version,
            loaded_at: Instant::now(),
        }
    }

    pub fn empty() -> Self {
        Dataset::new(ParsedCsv::default(), 0)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

impl FromStr for SortDirection {
    type Err = LexiconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(LexiconError::InvalidSort(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortState {
    pub column: String,
    pub direction: SortDirection,
}

// Queries are stored lower-cased.
#[derive(Debug, Clone, PartialEq)]
enum Filter {
    AllColumns(String),
    Column { column: String, query: String },
}

/// Cell value as seen by the sort comparator. Numbers order before text.
///
/// Text compares on its accent-stripped form first and falls back to the
/// lower-cased spelling, so "éxito" sorts between "exacto" and "fin".
#[derive(Debug, Clone)]
enum SortKey {
    Number(f64),
    Text { folded: String, lower: String },
}

impl SortKey {
    fn of(value: Option<&str>) -> Self {
        let value = value.unwrap_or("");
        match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => SortKey::Number(n),
            _ => {
                let lower = value.to_lowercase();
                let folded = lower.nfd().filter(|c| !is_combining_mark(*c)).collect();
                SortKey::Text { folded, lower }
            }
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Number(_), SortKey::Text { .. }) => Ordering::Less,
            (SortKey::Text { .. }, SortKey::Number(_)) => Ordering::Greater,
            (
                SortKey::Text { folded: a, lower: a_lower },
                SortKey::Text { folded: b, lower: b_lower },
            ) => a.cmp(b).then_with(|| a_lower.cmp(b_lower)),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

fn sort_rows(rows: &mut Vec<Row>, column: usize, direction: SortDirection) {
    let mut keyed: Vec<(SortKey, Row)> = rows
        .drain(..)
        .map(|row| (SortKey::of(row.cell(column)), row))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| direction.apply(a.cmp(b)));
    rows.extend(keyed.into_iter().map(|(_, row)| row));
}

fn cell_matches(cell: Option<&str>, query: &str) -> bool {
    cell.is_some_and(|v| v.to_lowercase().contains(query))
}

pub fn total_pages(nrows: usize) -> usize {
    nrows.div_ceil(PAGE_SIZE).max(1)
}

#[derive(Debug)]
pub struct PageResult<'a> {
    pub rows: Vec<&'a Row>,
    pub page_number: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

/// Holds the loaded dataset and the filtered view on it.
///
/// The view is a list of indices into the dataset and is rebuilt whenever the
/// dataset, the filter or the sort order changes.
pub struct TableStore {
    dataset: Arc<Dataset>,
    view: Arc<Vec<usize>>,
    filter: Option<Filter>,
    sort: Option<SortState>,
    current_page: usize,
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore {
    pub fn new() -> Self {
        TableStore {
            dataset: Arc::new(Dataset::empty()),
            view: Arc::new(Vec::new()),
            filter: None,
            sort: None,
            current_page: 1,
        }
    }

    /// Replaces the dataset. The active sort and filter carry over; the page
    /// cursor is kept where possible.
    pub fn load(&mut self, mut dataset: Dataset) {
        if let Some(sort) = self.sort.clone() {
            match dataset.column_index(&sort.column) {
                Some(idx) => sort_rows(&mut dataset.rows, idx, sort.direction),
                None => {
                    debug!("Dropping sort on vanished column {}", sort.column);
                    self.sort = None;
                }
            }
        }
        if let Some(Filter::Column { column, .. }) = &self.filter
            && dataset.column_index(column).is_none()
        {
            debug!("Dropping search on vanished column {column}");
            self.filter = None;
        }

        self.dataset = Arc::new(dataset);
        self.recompute_view();
        self.current_page = self.current_page.clamp(1, self.total_pages());
    }

    pub fn search(&mut self, query: &str) {
        self.filter = if query.is_empty() {
            None
        } else {
            Some(Filter::AllColumns(query.to_lowercase()))
        };
        self.recompute_view();
        self.current_page = 1;
    }

    pub fn search_column(&mut self, column: &str, query: &str) -> Result<(), LexiconError> {
        if self.dataset.rows.is_empty() {
            return Ok(());
        }
        if self.dataset.column_index(column).is_none() {
            return Err(LexiconError::UnknownColumn(column.to_string()));
        }
        self.filter = if query.is_empty() {
            None
        } else {
            Some(Filter::Column {
                column: column.to_string(),
                query: query.to_lowercase(),
            })
        };
        self.recompute_view();
        self.current_page = 1;
        Ok(())
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
        self.recompute_view();
        self.current_page = 1;
    }

    /// Reorders the dataset itself, so later unfiltered views stay sorted.
    /// Unlike a search this leaves the page cursor alone.
    pub fn sort(&mut self, column: &str, direction: SortDirection) -> Result<(), LexiconError> {
        if self.dataset.rows.is_empty() {
            return Ok(());
        }
        let idx = self
            .dataset
            .column_index(column)
            .ok_or_else(|| LexiconError::UnknownColumn(column.to_string()))?;

        let dataset = Arc::make_mut(&mut self.dataset);
        sort_rows(&mut dataset.rows, idx, direction);
        self.sort = Some(SortState {
            column: column.to_string(),
            direction,
        });
        self.recompute_view();
        self.current_page = self.current_page.clamp(1, self.total_pages());
        Ok(())
    }

    fn recompute_view(&mut self) {
        let rows = &self.dataset.rows;
        let view: Vec<usize> = match &self.filter {
            None => (0..rows.len()).collect(),
            Some(Filter::AllColumns(query)) => rows
                .par_iter()
                .enumerate()
                .filter(|(_, row)| row.cells().iter().any(|c| cell_matches(c.as_deref(), query)))
                .map(|(idx, _)| idx)
                .collect(),
            Some(Filter::Column { column, query }) => match self.dataset.column_index(column) {
                Some(cidx) => rows
                    .par_iter()
                    .enumerate()
                    .filter(|(_, row)| cell_matches(row.cell(cidx), query))
                    .map(|(idx, _)| idx)
                    .collect(),
                None => Vec::new(),
            },
        };
        trace!("View holds {} of {} rows", view.len(), rows.len());
        self.view = Arc::new(view);
    }

    /// Rows of page `page` of the view, `page` clamped into range.
    pub fn page(&self, page: usize) -> PageResult<'_> {
        let total_rows = self.view.len();
        let total_pages = total_pages(total_rows);
        let page_number = page.clamp(1, total_pages);
        let start = (page_number - 1) * PAGE_SIZE;
        let end = std::cmp::min(start + PAGE_SIZE, total_rows);
        let rows = self.view[start..end]
            .iter()
            .map(|&idx| &self.dataset.rows[idx])
            .collect();
        PageResult {
            rows,
            page_number,
            total_pages,
            total_rows,
        }
    }

    /// Moves the cursor to `page` (clamped) and returns that page.
    pub fn get_page(&mut self, page: usize) -> PageResult<'_> {
        self.current_page = page.clamp(1, self.total_pages());
        self.page(self.current_page)
    }

    pub fn current(&self) -> PageResult<'_> {
        self.page(self.current_page)
    }

    pub fn next_page(&mut self) {
        self.current_page = (self.current_page + 1).min(self.total_pages());
    }

    pub fn prev_page(&mut self) {
        self.current_page = self.current_page.saturating_sub(1).max(1);
    }

    pub fn last_page(&mut self) {
        self.current_page = self.total_pages();
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.view.len())
    }

    pub fn headers(&self) -> &[String] {
        &self.dataset.headers
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn dataset_rows(&self) -> &[Row] {
        &self.dataset.rows
    }

    pub fn view_rows(&self) -> Vec<&Row> {
        self.view.iter().map(|&idx| &self.dataset.rows[idx]).collect()
    }

    pub fn view_len(&self) -> usize {
        self.view.len()
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.dataset.rows.iter().map(move |row| row.cell(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn dataset(text: &str) -> Dataset {
        Dataset::new(parse(text), 1)
    }

    fn numbered(n: usize) -> Dataset {
        let mut text = String::from("Id,Word\n");
        for i in 0..n {
            text.push_str(&format!("{i},word{i}\n"));
        }
        dataset(&text)
    }

    fn column(store: &TableStore, name: &str) -> Vec<String> {
        store
            .view_rows()
            .iter()
            .map(|r| r.get(name).unwrap_or("").to_string())
            .collect()
    }

    const LEXICON: &str = "Word,Meaning\nalaga,care\nalaga,help\nlungkot,sadness";

    #[test]
    fn pages_hold_at_most_fifty_rows() {
        let mut store = TableStore::new();
        store.load(numbered(120));

        let sizes: Vec<usize> = (1..=3).map(|p| store.page(p).rows.len()).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        assert_eq!(store.total_pages(), 3);

        let page = store.get_page(5);
        assert_eq!(page.page_number, 3);
        assert_eq!(page.rows.len(), 20);
        assert_eq!(store.current_page(), 3);

        assert_eq!(store.get_page(0).page_number, 1);
    }

    #[test]
    fn pages_concatenate_to_the_view() {
        let mut store = TableStore::new();
        store.load(numbered(137));
        store.search("1");

        let paged: Vec<&Row> = (1..=store.total_pages())
            .flat_map(|p| store.page(p).rows)
            .collect();
        assert_eq!(paged, store.view_rows());
        assert!(store.view_len() < 137);
    }

    #[test]
    fn empty_search_shows_everything() {
        let mut store = TableStore::new();
        store.load(dataset(LEXICON));
        store.search("lungkot");
        assert_eq!(store.view_len(), 1);

        store.search("");
        assert_eq!(store.view_len(), 3);
        assert!(!store.is_filtered());
        let all: Vec<&Row> = store.dataset_rows().iter().collect();
        assert_eq!(store.view_rows(), all);
    }

    #[test]
    fn search_is_case_insensitive_and_resets_the_page() {
        let mut store = TableStore::new();
        store.load(numbered(120));
        store.get_page(3);

        store.search("WORD11");
        assert_eq!(store.current_page(), 1);
        let mut expected = vec!["word11".to_string()];
        expected.extend((110..120).map(|i| format!("word{i}")));
        assert_eq!(column(&store, "Word"), expected);
    }

    #[test]
    fn search_ignores_null_cells() {
        let mut store = TableStore::new();
        store.load(dataset("A,B\nx\ny,z\n"));
        store.search("z");
        assert_eq!(column(&store, "A"), vec!["y"]);
    }

    #[test]
    fn column_search_is_restricted_to_one_column() {
        let mut store = TableStore::new();
        store.load(dataset("Word,Meaning\ncare,alaga\nalaga,care\n"));
        store.search_column("Word", "CARE").unwrap();
        assert_eq!(column(&store, "Meaning"), vec!["alaga"]);

        let err = store.search_column("Nope", "x").unwrap_err();
        assert!(matches!(err, LexiconError::UnknownColumn(c) if c == "Nope"));
    }

    #[test]
    fn sorts_lexicon_words() {
        let mut store = TableStore::new();
        store.load(dataset("Word,Meaning\nlungkot,sadness\nalaga,care\nalaga,help"));
        store.sort("Word", SortDirection::Ascending).unwrap();
        assert_eq!(column(&store, "Word"), vec!["alaga", "alaga", "lungkot"]);
        assert_eq!(column(&store, "Meaning"), vec!["care", "help", "sadness"]);
    }

    #[test]
    fn accented_words_sort_with_their_base_letters() {
        let mut store = TableStore::new();
        store.load(dataset("Word\nzapote\néxito\nexacto\nfin\nÉxito\nexito\n"));
        store.sort("Word", SortDirection::Ascending).unwrap();
        assert_eq!(
            column(&store, "Word"),
            vec!["exacto", "exito", "éxito", "Éxito", "fin", "zapote"]
        );

        store.sort("Word", SortDirection::Descending).unwrap();
        assert_eq!(
            column(&store, "Word"),
            vec!["zapote", "fin", "éxito", "Éxito", "exito", "exacto"]
        );
    }

    #[test]
    fn numbers_sort_numerically() {
        let mut store = TableStore::new();
        store.load(dataset("N\n10\n2\n-3\n1.5\n"));
        store.sort("N", SortDirection::Ascending).unwrap();
        assert_eq!(column(&store, "N"), vec!["-3", "1.5", "2", "10"]);
    }

    #[test]
    fn descending_is_the_exact_reverse() {
        let mut store = TableStore::new();
        store.load(dataset("W\nBeta\nalpha\n3\ngamma\n20\nDelta\n"));
        store.sort("W", SortDirection::Ascending).unwrap();
        let mut ascending = column(&store, "W");
        assert_eq!(ascending, vec!["3", "20", "alpha", "Beta", "Delta", "gamma"]);

        store.sort("W", SortDirection::Descending).unwrap();
        ascending.reverse();
        assert_eq!(column(&store, "W"), ascending);
    }

    #[test]
    fn sort_reorders_the_dataset_and_keeps_the_page() {
        let mut store = TableStore::new();
        store.load(numbered(120));
        store.search("word");
        store.get_page(2);

        store.sort("Id", SortDirection::Descending).unwrap();
        assert_eq!(store.current_page(), 2);
        assert_eq!(store.dataset_rows()[0].get("Id"), Some("119"));

        store.clear_filter();
        assert_eq!(store.page(1).rows[0].get("Id"), Some("119"));
    }

    #[test]
    fn empty_dataset_operations_are_no_ops() {
        let mut store = TableStore::new();
        store.search("x");
        store.sort("Word", SortDirection::Ascending).unwrap();
        store.search_column("Word", "x").unwrap();
        let page = store.get_page(4);
        assert!(page.rows.is_empty());
        assert_eq!(page.page_number, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn reload_keeps_sort_filter_and_page() {
        let mut store = TableStore::new();
        store.load(numbered(120));
        store.sort("Id", SortDirection::Descending).unwrap();
        store.search("word");
        store.get_page(3);

        store.load(Dataset::new(parse("Id,Word\n1,word1\n7,word7\n3,other\n"), 2));
        assert_eq!(store.dataset().version, 2);
        assert_eq!(column(&store, "Id"), vec!["7", "1"]);
        assert_eq!(store.current_page(), 1);
        assert_eq!(store.sort_state().map(|s| s.direction), Some(SortDirection::Descending));
    }

    #[test]
    fn reload_drops_state_for_vanished_columns() {
        let mut store = TableStore::new();
        store.load(dataset(LEXICON));
        store.sort("Meaning", SortDirection::Ascending).unwrap();
        store.search_column("Meaning", "care").unwrap();

        store.load(dataset("Word\nb\na\n"));
        assert!(store.sort_state().is_none());
        assert!(!store.is_filtered());
        assert_eq!(column(&store, "Word"), vec!["b", "a"]);
    }

    #[test]
    fn parses_sort_directions() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Ascending);
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Descending);
        assert!("up".parse::<SortDirection>().is_err());
    }
}
