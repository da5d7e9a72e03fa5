use std::time::Instant;

use arboard::Clipboard;
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::domain::{CMDMode, HELP_TEXT, LexiconConfig, LexiconError, Message, NO_RESULTS};
use crate::export::{self, ExportScope};
use crate::inputter::{InputResult, Inputter};
use crate::parser::Row;
use crate::render::{self, DisplayModel};
use crate::source::FetchOutcome;
use crate::store::{Dataset, SortDirection, TableStore};
use crate::summary::{self, ColumnSummary};

#[derive(Debug, PartialEq)]
pub enum Status {
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
    EXPORT,
}

/// Column picker and scope toggle shown before writing an export.
#[derive(Debug, Clone)]
pub struct ExportDialog {
    pub columns: Vec<(String, bool)>,
    pub scope: ExportScope,
    pub cursor: usize,
}

impl ExportDialog {
    fn new(headers: &[String]) -> Self {
        ExportDialog {
            columns: headers.iter().map(|h| (h.clone(), true)).collect(),
            scope: ExportScope::View,
            cursor: 0,
        }
    }

    fn selected(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

pub struct Model {
    config: LexiconConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    store: TableStore,
    summaries: Vec<ColumnSummary>,
    display: DisplayModel,
    show_summary: bool,
    selected_row: usize,
    selected_column: usize,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    export_dialog: ExportDialog,
    clipboard: Option<Clipboard>,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &LexiconConfig) -> Self {
        let clipboard = match Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("No clipboard available: {e}");
                None
            }
        };
        Self::with_clipboard(config, clipboard)
    }

    pub(crate) fn with_clipboard(config: &LexiconConfig, clipboard: Option<Clipboard>) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            store: TableStore::new(),
            summaries: Vec::new(),
            display: DisplayModel::default(),
            show_summary: false,
            selected_row: 0,
            selected_column: 0,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            export_dialog: ExportDialog::new(&[]),
            clipboard,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        model.update_display();
        model.set_status_message(format!("Loading {} ...", config.source));
        model
    }

    // -------------------- Data ---------------------- //

    /// Applies the result of a background fetch. A failure keeps whatever
    /// dataset was shown before.
    pub fn apply_fetch(&mut self, outcome: FetchOutcome) {
        match outcome {
            Ok(fetched) => {
                let nrows = fetched.parsed.rows.len();
                self.store.load(Dataset::new(fetched.parsed, fetched.version));
                self.update_summaries();
                self.update_display();
                self.status = Status::READY;
                self.set_status_message(format!(
                    "Loaded {} rows in {}ms (v{})",
                    nrows,
                    fetched.duration.as_millis(),
                    fetched.version
                ));
            }
            Err(e) => {
                warn!("Keeping dataset v{} after failed load: {}", self.store.dataset().version, e);
                if self.status == Status::LOADING && self.store.dataset().version == 0 {
                    self.status = Status::READY;
                }
                let message = if self.store.dataset().version == 0 {
                    format!("Error loading data: {e}")
                } else {
                    format!(
                        "Error loading data: {e} (showing data from {}s ago)",
                        self.store.dataset().loaded_at.elapsed().as_secs()
                    )
                };
                self.set_status_message(message);
            }
        }
    }

    fn update_summaries(&mut self) {
        let start_time = Instant::now();
        let store = &self.store;
        self.summaries = (0..store.headers().len())
            .into_par_iter()
            .map(|idx| summary::summarize(store.column_values(idx)))
            .collect();
        debug!(
            "Summarized {} columns in {}ms",
            self.summaries.len(),
            start_time.elapsed().as_millis()
        );
    }

    fn update_display(&mut self) {
        self.display = render::render(&self.store.current(), self.store.headers());
        self.selected_row = self
            .selected_row
            .min(self.display.rows.len().saturating_sub(1));
        self.selected_column = self
            .selected_column
            .min(self.display.headers.len().saturating_sub(1));
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        trace!("Status: {}", self.status_message);
    }

    // -------------------- Accessors for the UI ---------------------- //

    pub fn display(&self) -> &DisplayModel {
        &self.display
    }

    pub fn summaries(&self) -> Option<&[ColumnSummary]> {
        self.show_summary.then_some(self.summaries.as_slice())
    }

    pub fn selection(&self) -> (usize, usize) {
        (self.selected_row, self.selected_column)
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn status_message_age(&self) -> std::time::Duration {
        self.last_status_message_update.elapsed()
    }

    pub fn cmd_input(&self) -> Option<(CMDMode, &InputResult)> {
        self.cmd_mode.map(|mode| (mode, &self.last_input))
    }

    pub fn export_dialog(&self) -> Option<&ExportDialog> {
        (self.modus == Modus::EXPORT).then_some(&self.export_dialog)
    }

    pub fn popup(&self) -> Option<&str> {
        (self.modus == Modus::POPUP).then_some(HELP_TEXT)
    }

    pub fn max_column_width(&self) -> usize {
        self.config.max_column_width
    }

    pub fn title(&self) -> String {
        let mut title = format!(
            "{} rows",
            self.store.dataset_rows().len()
        );
        if self.store.is_filtered() {
            title = format!("{} of {}", self.store.view_len(), title);
        }
        if let Some(sort) = self.store.sort_state() {
            let arrow = match sort.direction {
                SortDirection::Ascending => "↑",
                SortDirection::Descending => "↓",
            };
            title.push_str(&format!(", sorted by {} {}", sort.column, arrow));
        }
        format!(" Ibaloi lexicon [{}] ", title)
    }

    // -------------------- Message handling ---------------------- //

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_selection_up(),
                Message::MoveDown => self.move_selection_down(),
                Message::MoveLeft => {
                    self.selected_column = self.selected_column.saturating_sub(1)
                }
                Message::MoveRight => {
                    let last = self.display.headers.len().saturating_sub(1);
                    self.selected_column = (self.selected_column + 1).min(last);
                }
                Message::NextPage => self.change_page(TableStore::next_page),
                Message::PrevPage => self.change_page(TableStore::prev_page),
                Message::FirstPage => self.change_page(|s| {
                    s.get_page(1);
                }),
                Message::LastPage => self.change_page(TableStore::last_page),
                Message::Search => self.enter_cmd_mode(CMDMode::SearchTable),
                Message::SearchInColumn => self.enter_cmd_mode(CMDMode::SearchInColumn),
                Message::ClearFilter => self.clear_filter(),
                Message::SortAscending => self.sort_current_column(SortDirection::Ascending),
                Message::SortDescending => self.sort_current_column(SortDirection::Descending),
                Message::ToggleSummary => self.show_summary = !self.show_summary,
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Export => self.open_export_dialog(),
                Message::Help => self.show_help(),
                Message::Enter => self.filter_by_selected_value(),
                Message::Exit => {
                    if self.store.is_filtered() {
                        self.clear_filter();
                    }
                }
                _ => (),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.close_modal(),
                _ => (),
            },
            Modus::EXPORT => match message {
                Message::Quit => self.quit(),
                Message::MoveUp => {
                    self.export_dialog.cursor = self.export_dialog.cursor.saturating_sub(1)
                }
                Message::MoveDown => {
                    let last = self.export_dialog.columns.len().saturating_sub(1);
                    self.export_dialog.cursor = (self.export_dialog.cursor + 1).min(last);
                }
                Message::ToggleExportColumn => {
                    let cursor = self.export_dialog.cursor;
                    if let Some((_, on)) = self.export_dialog.columns.get_mut(cursor) {
                        *on = !*on;
                    }
                }
                Message::ToggleExportScope => {
                    self.export_dialog.scope = self.export_dialog.scope.toggle()
                }
                Message::Enter => self.write_export(),
                Message::Exit => self.close_modal(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = message {
                    self.last_input = self.input.read(key);
                    if self.last_input.finished {
                        self.handle_cmd_input();
                    }
                }
            }
        }
    }

    fn close_modal(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::TABLE;
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn change_page(&mut self, step: impl FnOnce(&mut TableStore)) {
        step(&mut self.store);
        self.update_display();
    }

    fn move_selection_up(&mut self) {
        if self.selected_row > 0 {
            self.selected_row -= 1;
        } else if self.store.current_page() > 1 {
            self.store.prev_page();
            self.update_display();
            self.selected_row = self.display.rows.len().saturating_sub(1);
        }
    }

    fn move_selection_down(&mut self) {
        if self.selected_row + 1 < self.display.rows.len() {
            self.selected_row += 1;
        } else if self.store.current_page() < self.store.total_pages() {
            self.store.next_page();
            self.selected_row = 0;
            self.update_display();
        }
    }

    fn current_column(&self) -> Option<String> {
        self.store.headers().get(self.selected_column).cloned()
    }

    fn selected_record(&self) -> Option<&Row> {
        self.store.current().rows.get(self.selected_row).copied()
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?}", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        let mode = self.cmd_mode.take();
        let input = std::mem::take(&mut self.last_input);
        self.input.clear();

        if input.canceled {
            return;
        }
        match mode {
            Some(CMDMode::SearchTable) => {
                self.store.search(&input.input);
                self.after_filter(&input.input);
            }
            Some(CMDMode::SearchInColumn) => {
                let Some(column) = self.current_column() else {
                    return;
                };
                match self.store.search_column(&column, &input.input) {
                    Ok(()) => self.after_filter(&input.input),
                    Err(e) => self.set_status_message(e.to_string()),
                }
            }
            None => debug!("Command input without mode"),
        }
    }

    fn after_filter(&mut self, query: &str) {
        self.selected_row = 0;
        self.update_display();
        let nmatches = self.store.view_len();
        let message = if query.is_empty() {
            format!("Showing all {nmatches} rows")
        } else if nmatches == 0 {
            NO_RESULTS.to_string()
        } else {
            format!("Found {nmatches} matching rows")
        };
        self.set_status_message(message);
    }

    fn clear_filter(&mut self) {
        self.store.clear_filter();
        self.after_filter("");
    }

    fn filter_by_selected_value(&mut self) {
        let value = self
            .selected_record()
            .and_then(|r| r.cell(self.selected_column))
            .map(str::to_string);
        let (Some(column), Some(value)) = (self.current_column(), value) else {
            return;
        };
        if value.is_empty() {
            return;
        }
        match self.store.search_column(&column, &value) {
            Ok(()) => self.after_filter(&value),
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn sort_current_column(&mut self, direction: SortDirection) {
        let Some(column) = self.current_column() else {
            return;
        };
        let start_time = Instant::now();
        match self.store.sort(&column, direction) {
            Ok(()) => {
                self.update_summaries();
                self.update_display();
                self.set_status_message(format!(
                    "Sorted by {} in {}ms",
                    column,
                    start_time.elapsed().as_millis()
                ));
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn copy_to_clipboard(&mut self, text: String, what: &str) {
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text)
                .map_err(|e| LexiconError::Clipboard(e.to_string())),
            None => Err(LexiconError::Clipboard("not connected".to_string())),
        };
        match result {
            Ok(()) => self.set_status_message(format!("Copied {what} to clipboard")),
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn copy_cell(&mut self) {
        let Some(cell) = self
            .selected_record()
            .map(|r| r.cell(self.selected_column).unwrap_or("").to_string())
        else {
            return;
        };
        trace!("Cell content: {}", cell);
        self.copy_to_clipboard(cell, "cell");
    }

    fn copy_row(&mut self) {
        let Some(line) = self
            .selected_record()
            .map(|r| export::format_row(r, r.headers()))
        else {
            return;
        };
        match line {
            Ok(line) => self.copy_to_clipboard(line, "row"),
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn open_export_dialog(&mut self) {
        if self.store.headers().is_empty() {
            self.set_status_message("Nothing to export");
            return;
        }
        self.export_dialog = ExportDialog::new(self.store.headers());
        self.previous_modus = self.modus;
        self.modus = Modus::EXPORT;
    }

    fn write_export(&mut self) {
        let columns = self.export_dialog.selected();
        if columns.is_empty() {
            self.set_status_message("Select at least one column to export");
            return;
        }
        let rows: Vec<&Row> = match self.export_dialog.scope {
            ExportScope::View => self.store.view_rows(),
            ExportScope::Dataset => self.store.dataset_rows().iter().collect(),
        };
        let nrows = rows.len();
        let target = export::export_file_name(&self.config.export_stem);
        let written = export::export(&rows, &columns)
            .and_then(|text| export::write_export(&target, &text));

        match written {
            Ok(path) => {
                info!("Exported {} rows, {} columns", nrows, columns.len());
                self.set_status_message(format!("Exported {} rows to {}", nrows, path.display()));
                self.close_modal();
            }
            Err(e) => self.set_status_message(format!("Export failed: {e}")),
        }
    }
}
