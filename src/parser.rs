use std::collections::HashSet;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

/// A single cell. `None` is a value the line did not provide at all,
/// `Some("")` an empty field.
pub type Cell = Option<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    headers: Arc<Vec<String>>,
    cells: Vec<Cell>,
}

impl Row {
    /// Zips `cells` positionally against `headers`. Missing trailing cells are
    /// null, surplus ones are dropped.
    pub fn new(headers: Arc<Vec<String>>, mut cells: Vec<Cell>) -> Self {
        cells.resize(headers.len(), None);
        Row { headers, cells }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).and_then(|c| c.as_deref())
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|idx| self.cell(idx))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub headers: Arc<Vec<String>>,
    pub rows: Vec<Row>,
}

/// Parses comma separated text whose first record is the header line.
///
/// Quoting follows RFC 4180. The parser never fails: ragged lines are padded
/// or cut to the header width, blank lines are skipped and an unterminated
/// quote runs to the end of the input.
pub fn parse(text: &str) -> ParsedCsv {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records().enumerate().filter_map(|(idx, r)| match r {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping unreadable CSV record {}: {}", idx + 1, e);
            None
        }
    });

    let Some(header_record) = records.next() else {
        return ParsedCsv::default();
    };
    let headers = Arc::new(unique_headers(&header_record));

    let rows: Vec<Row> = records
        .map(|record| {
            let cells = record.iter().map(|v| Some(v.to_string())).collect();
            Row::new(Arc::clone(&headers), cells)
        })
        .collect();

    debug!("Parsed {} columns, {} rows", headers.len(), rows.len());
    ParsedCsv { headers, rows }
}

fn unique_headers(record: &StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    record
        .iter()
        .map(|h| {
            let name = h.trim().to_string();
            if seen.insert(name.clone()) {
                return name;
            }
            let mut n = 2;
            loop {
                let candidate = format!("{name}_{n}");
                if seen.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(row: &Row) -> Vec<Option<&str>> {
        row.cells().iter().map(|c| c.as_deref()).collect()
    }

    #[test]
    fn parses_headers_and_rows() {
        let csv = parse("Word,Meaning\nalaga,care\nalaga,help\nlungkot,sadness");
        assert_eq!(*csv.headers, vec!["Word", "Meaning"]);
        assert_eq!(csv.rows.len(), 3);
        assert_eq!(csv.rows[2].get("Word"), Some("lungkot"));
        assert_eq!(csv.rows[2].get("Meaning"), Some("sadness"));
    }

    #[test]
    fn trims_header_names_but_not_values() {
        let csv = parse(" Word , Meaning\n alaga ,care");
        assert_eq!(*csv.headers, vec!["Word", "Meaning"]);
        assert_eq!(csv.rows[0].get("Word"), Some(" alaga "));
    }

    #[test]
    fn honours_quotes() {
        let csv = parse("Word,Meaning\n\"a,b\",\"say \"\"hi\"\"\"\n\"multi\nline\",x\n");
        assert_eq!(csv.rows.len(), 2);
        assert_eq!(values(&csv.rows[0]), vec![Some("a,b"), Some("say \"hi\"")]);
        assert_eq!(values(&csv.rows[1]), vec![Some("multi\nline"), Some("x")]);
    }

    #[test]
    fn short_lines_fill_with_null_and_empty_fields_stay_empty() {
        let csv = parse("A,B,C\n1\n2,,\n");
        assert_eq!(values(&csv.rows[0]), vec![Some("1"), None, None]);
        assert_eq!(values(&csv.rows[1]), vec![Some("2"), Some(""), Some("")]);
    }

    #[test]
    fn long_lines_are_cut_to_header_width() {
        let csv = parse("A,B\n1,2,3\n");
        assert_eq!(values(&csv.rows[0]), vec![Some("1"), Some("2")]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let csv = parse("Word,Meaning\n\nalaga,care\n\n\nlungkot,sadness\n");
        assert_eq!(csv.rows.len(), 2);
        assert_eq!(csv.rows[1].get("Word"), Some("lungkot"));
    }

    #[test]
    fn empty_input_has_no_rows() {
        let csv = parse("");
        assert!(csv.headers.is_empty());
        assert!(csv.rows.is_empty());

        let csv = parse("Word,Meaning\n");
        assert_eq!(csv.headers.len(), 2);
        assert!(csv.rows.is_empty());
    }

    #[test]
    fn crlf_and_bom_are_not_part_of_values() {
        let csv = parse("\u{feff}Word,Meaning\r\nalaga,care\r\n");
        assert_eq!(*csv.headers, vec!["Word", "Meaning"]);
        assert_eq!(values(&csv.rows[0]), vec![Some("alaga"), Some("care")]);
    }

    #[test]
    fn duplicate_headers_are_made_unique() {
        let csv = parse("Word,Word,Meaning,Word\na,b,c,d");
        assert_eq!(*csv.headers, vec!["Word", "Word_2", "Meaning", "Word_3"]);
        assert_eq!(csv.rows[0].get("Word_3"), Some("d"));
    }
}
