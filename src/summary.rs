use std::collections::HashMap;

use tracing::trace;

/// Columns with at least this many distinct values only show their top entries.
const MANY_DISTINCT: usize = 20;
const TOP_ENTRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnSummary {
    pub lines: Vec<String>,
    pub distinct: usize,
    pub nulls: usize,
}

impl ColumnSummary {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

struct Entry {
    display: String,
    count: usize,
}

fn is_null(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            let v = v.trim();
            v.is_empty() || v == "-"
        }
    }
}

/// Frequency summary of one column.
///
/// Values are grouped by their trimmed, lower-cased form; the first spelling
/// seen for a group is the one displayed. Groups are ranked by count with
/// ties kept in first-seen order.
pub fn summarize<'a, I>(values: I) -> ColumnSummary
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<Entry> = Vec::new();
    let mut nulls = 0;

    for value in values {
        if is_null(value) {
            nulls += 1;
            continue;
        }
        let Some(raw) = value else { continue };
        let display = raw.trim();
        let key = display.to_lowercase();
        match index.get(&key) {
            Some(&pos) => entries[pos].count += 1,
            None => {
                index.insert(key, entries.len());
                entries.push(Entry {
                    display: display.to_string(),
                    count: 1,
                });
            }
        }
    }

    // Vec::sort_by is stable, so equal counts stay in first-seen order.
    entries.sort_by(|a, b| b.count.cmp(&a.count));

    let distinct = entries.len();
    let non_null: usize = entries.iter().map(|e| e.count).sum();
    trace!("Summarizing column: {distinct} distinct, {nulls} nulls");

    let mut lines: Vec<String> = match distinct {
        0 => {
            return ColumnSummary {
                lines: vec![format!("Null Values: {nulls}")],
                distinct,
                nulls,
            };
        }
        2 => entries
            .iter()
            .map(|e| format!("{}: {}", e.display, e.count))
            .collect(),
        d if d < MANY_DISTINCT => entries
            .iter()
            .map(|e| {
                let pct = e.count as f64 * 100.0 / non_null as f64;
                format!("{} {:.1}%", e.display.to_uppercase(), pct)
            })
            .collect(),
        _ => {
            let mut top: Vec<String> = entries
                .iter()
                .take(TOP_ENTRIES)
                .map(|e| format!("{}: {}", e.display, e.count))
                .collect();
            top.push(format!("Unique: {distinct}"));
            top
        }
    };

    if nulls > 0 {
        lines.push(format!("Null Values: {nulls}"));
    }

    ColumnSummary {
        lines,
        distinct,
        nulls,
    }
}
