use crate::domain::{NO_RESULTS, NULL_PLACEHOLDER};
use crate::store::PageResult;

/// Toolkit independent projection of one page of the table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplayModel {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub page_info: String,
    pub placeholder: Option<String>,
}

impl DisplayModel {
    pub fn column_width(&self, column: usize) -> usize {
        let header = self.headers.get(column).map_or(0, |h| h.chars().count());
        self.rows
            .iter()
            .filter_map(|r| r.get(column))
            .map(|c| c.chars().count())
            .fold(header, std::cmp::max)
    }
}

pub fn display_cell(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NULL_PLACEHOLDER.to_string(),
    }
}

pub fn page_info(current: usize, total: usize) -> String {
    format!("Page {current} of {total}")
}

pub fn render(page: &PageResult<'_>, headers: &[String]) -> DisplayModel {
    let rows = page
        .rows
        .iter()
        .map(|row| (0..headers.len()).map(|idx| display_cell(row.cell(idx))).collect())
        .collect::<Vec<Vec<String>>>();

    let placeholder = if rows.is_empty() {
        Some(NO_RESULTS.to_string())
    } else {
        None
    };

    DisplayModel {
        headers: headers.to_vec(),
        rows,
        page_info: page_info(page.page_number, page.total_pages),
        placeholder,
    }
}
