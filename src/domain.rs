use std::io::Error;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

/// Published CSV export of the lexicon spreadsheet.
pub const DEFAULT_SOURCE: &str = "https://docs.google.com/spreadsheets/d/1iaKr-e3DG8S5fNR2ht1053DzqNSyV6dgbkj43_SMhdM/export?format=csv&gid=0";
pub const DEFAULT_EXPORT_STEM: &str = "ibaloi_lexicon";

pub const PAGE_SIZE: usize = 50;
pub const NULL_PLACEHOLDER: &str = "-";
pub const NO_RESULTS: &str = "No results found";

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("io error: {0}")]
    Io(#[from] Error),
    #[error("could not load CSV: {0}")]
    Fetch(String),
    #[error("could not write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not load CSV: HTTP {0}")]
    FetchStatus(u16),
    #[error("unknown column \"{0}\"")]
    UnknownColumn(String),
    #[error("invalid sort \"{0}\", expected <column>:asc|desc")]
    InvalidSort(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

#[derive(Debug, Clone, Setters)]
pub struct LexiconConfig {
    pub source: String,
    pub refresh_interval: Duration,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub export_stem: String,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        LexiconConfig {
            source: DEFAULT_SOURCE.to_string(),
            refresh_interval: Duration::from_secs(10 * 60),
            event_poll_time: 100,
            max_column_width: 40,
            export_stem: DEFAULT_EXPORT_STEM.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    SearchTable,
    SearchInColumn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    Search,
    SearchInColumn,
    ClearFilter,
    SortAscending,
    SortDescending,
    ToggleSummary,
    CopyCell,
    CopyRow,
    Export,
    ToggleExportColumn,
    ToggleExportScope,
    Refresh,
    Help,
    Enter,
    Exit,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Navigation
  ←↓↑→ / hjkl     move selection
  n / PageDown    next page
  p / PageUp      previous page
  g / G           first / last page

Data
  /               search all columns
  f               search current column
  enter           show rows sharing the selected value
  c / Esc         clear search
  a / d           sort current column ascending / descending
  s               toggle column summary
  r               reload data now

Clipboard & export
  y               copy cell
  Y               copy row as CSV
  e               export dialog (space: column, f: filtered only, enter: write)

  F1 / ?          this help
  Esc             close dialog
  q               quit";
