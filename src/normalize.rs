//! Row normalization for the tab-separated relations of a Form 3/4/5 extract.
//!
//! Every relation is read the same way: the header row becomes a [`Schema`],
//! footnote columns are dropped, date columns are rewritten to ISO 8601 and
//! empty cells become `None`. Relation-specific typing happens in
//! [`FromRow`] implementations (see `records.rs`).

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::InsiderError;
use crate::records::TransactionRecord;

/// Header names containing this are reference columns pointing into the
/// footnotes file, not data.
pub const FOOTNOTE_MARKER: &str = "_FN";

const MONTH_CODES: [(&str, u32); 12] = [
    ("JAN", 1),
    ("FEB", 2),
    ("MAR", 3),
    ("APR", 4),
    ("MAY", 5),
    ("JUN", 6),
    ("JUL", 7),
    ("AUG", 8),
    ("SEP", 9),
    ("OCT", 10),
    ("NOV", 11),
    ("DEC", 12),
];

/// Ordinary equity titles, optionally with a share-class qualifier in front.
pub static EQUITY_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:Class|Series) [A-Z0-9]+ )?(?:Common|Shares|Stock|Ordinary Shares)")
        .expect("equity title pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub position: usize,
    pub kind: ColumnKind,
}

/// Column layout of one relation, built once from its header row.
#[derive(Debug, Clone)]
pub struct Schema {
    width: usize,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn from_header(header: &str) -> Self {
        let fields: Vec<&str> = header.split('\t').collect();
        let mut columns = Vec::new();
        let mut index = HashMap::new();
        for (position, raw) in fields.iter().enumerate() {
            let name = raw.trim();
            if name.contains(FOOTNOTE_MARKER) {
                continue;
            }
            let kind = if is_date_column(name) {
                ColumnKind::Date
            } else {
                ColumnKind::Text
            };
            index.insert(name.to_string(), columns.len());
            columns.push(Column {
                name: name.to_string(),
                position,
                kind,
            });
        }
        Self {
            width: fields.len(),
            columns,
            index,
        }
    }

    /// Field count of the header, footnote columns included.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Splits `line` positionally against this schema. `line_no` is only used
    /// for diagnostics.
    pub fn normalize<'s>(
        &'s self,
        line_no: usize,
        line: &str,
    ) -> Result<NormalizedRow<'s>, InsiderError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < self.width {
            return Err(InsiderError::MalformedRow {
                line: line_no,
                reason: format!(
                    "expected {} fields, found {}",
                    self.width,
                    fields.len()
                ),
            });
        }

        let values = self
            .columns
            .iter()
            .map(|column| {
                let raw = fields[column.position].trim();
                if raw.is_empty() {
                    return None;
                }
                Some(match column.kind {
                    ColumnKind::Text => raw.to_string(),
                    ColumnKind::Date => normalize_date(raw).unwrap_or_else(|| {
                        warn!(
                            "line {line_no}: unrecognized date {raw:?} in {}, kept as-is",
                            column.name
                        );
                        raw.to_string()
                    }),
                })
            })
            .collect();

        Ok(NormalizedRow {
            schema: self,
            line: line_no,
            values,
        })
    }
}

/// One cleaned row, addressable by header name.
#[derive(Debug, Clone)]
pub struct NormalizedRow<'s> {
    schema: &'s Schema,
    line: usize,
    values: Vec<Option<String>>,
}

impl NormalizedRow<'_> {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.schema
            .index
            .get(name)
            .and_then(|idx| self.values[*idx].as_deref())
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    pub fn require(&self, name: &str) -> Result<&str, InsiderError> {
        self.get(name).ok_or_else(|| InsiderError::MalformedRow {
            line: self.line,
            reason: format!("missing required field {name}"),
        })
    }

    pub fn number(&self, name: &str) -> Result<Option<f64>, InsiderError> {
        self.get(name)
            .map(|value| {
                value
                    .replace(',', "")
                    .parse::<f64>()
                    .ok()
                    .filter(|number| number.is_finite())
                    .ok_or_else(|| InsiderError::MalformedRow {
                        line: self.line,
                        reason: format!("{name} is not numeric: {value:?}"),
                    })
            })
            .transpose()
    }

    pub fn require_number(&self, name: &str) -> Result<f64, InsiderError> {
        self.number(name)?.ok_or_else(|| InsiderError::MalformedRow {
            line: self.line,
            reason: format!("missing required field {name}"),
        })
    }
}

/// Typed view of one relation's row.
pub trait FromRow: Sized {
    const RELATION: &'static str;

    fn from_row(row: &NormalizedRow<'_>) -> Result<Self, InsiderError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelationStats {
    pub rows: usize,
    pub malformed: usize,
}

#[derive(Debug, Clone)]
pub struct Relation<R> {
    pub records: Vec<R>,
    pub stats: RelationStats,
}

/// Reads a whole relation: the first line is the header, every later line a
/// record. Malformed rows are logged and skipped. Blank lines are ignored.
pub fn read_relation<R, I>(lines: I) -> Relation<R>
where
    R: FromRow,
    I: IntoIterator<Item = String>,
{
    let mut lines = lines.into_iter();
    let mut stats = RelationStats::default();
    let Some(header) = lines.next() else {
        warn!("{} relation is empty", R::RELATION);
        return Relation {
            records: Vec::new(),
            stats,
        };
    };
    let schema = Schema::from_header(&header);

    let mut records = Vec::new();
    // header is line 1
    for (offset, line) in lines.enumerate() {
        let line_no = offset + 2;
        if line.trim().is_empty() {
            continue;
        }
        stats.rows += 1;
        match schema
            .normalize(line_no, &line)
            .and_then(|row| R::from_row(&row))
        {
            Ok(record) => records.push(record),
            Err(err) => {
                stats.malformed += 1;
                warn!("{}: skipping row: {err}", R::RELATION);
            }
        }
    }
    debug!(
        "{}: {} rows read, {} skipped",
        R::RELATION,
        stats.rows,
        stats.malformed
    );
    Relation { records, stats }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    pub zero_value: usize,
    pub rejected_title: usize,
    pub admitted: usize,
}

/// Drops zero-dollar trades and non-equity titles.
pub fn admit_transactions(
    transactions: Vec<TransactionRecord>,
) -> (Vec<TransactionRecord>, AdmissionStats) {
    let mut stats = AdmissionStats::default();
    let admitted: Vec<TransactionRecord> = transactions
        .into_iter()
        .filter(|record| {
            if record.trans_dollars == 0.0 {
                stats.zero_value += 1;
                return false;
            }
            if !is_equity_title(&record.security_title) {
                stats.rejected_title += 1;
                debug!(
                    "{}: title {:?} not admitted",
                    record.accession_number, record.security_title
                );
                return false;
            }
            true
        })
        .collect();
    stats.admitted = admitted.len();
    (admitted, stats)
}

/// Keeps the `limit` transactions with the largest dollar value, largest
/// first.
pub fn largest_trades(
    mut transactions: Vec<TransactionRecord>,
    limit: usize,
) -> Vec<TransactionRecord> {
    transactions.sort_by(|a, b| b.trans_dollars.total_cmp(&a.trans_dollars));
    transactions.truncate(limit);
    transactions
}

pub fn is_equity_title(title: &str) -> bool {
    EQUITY_TITLE.is_match(title)
}

pub fn is_date_column(name: &str) -> bool {
    name.contains("DATE") || name == "PERIOD_OF_REPORT"
}

/// Rewrites a date to `YYYY-MM-DD`. Accepts ISO (returned unchanged),
/// `DD-MON-YYYY`, `YYYYMMDD` and `MM/DD/YYYY`. Returns `None` for anything
/// else, including impossible calendar dates.
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    let (year, month, day) = if let Some(date) = split_iso(value) {
        date
    } else if let Some((day, month, year)) = split3(value, '-') {
        (year.parse().ok()?, month_number(month)?, day.parse().ok()?)
    } else if let Some((month, day, year)) = split3(value, '/') {
        (year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
    } else if value.len() == 8 && value.chars().all(|ch| ch.is_ascii_digit()) {
        (
            value[..4].parse().ok()?,
            value[4..6].parse().ok()?,
            value[6..].parse().ok()?,
        )
    } else {
        return None;
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn split_iso(value: &str) -> Option<(i32, u32, u32)> {
    let (year, month, day) = split3(value, '-')?;
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }
    Some((year.parse().ok()?, month.parse().ok()?, day.parse().ok()?))
}

fn split3(value: &str, sep: char) -> Option<(&str, &str, &str)> {
    let mut parts = value.split(sep);
    let first = parts.next()?;
    let second = parts.next()?;
    let third = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((first, second, third))
}

fn month_number(code: &str) -> Option<u32> {
    MONTH_CODES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(code))
        .map(|(_, number)| *number)
}

/// Doubles every `'` so the value can sit inside a single-quoted SQL literal.
pub fn escape_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footnote_columns_are_dropped() {
        let schema = Schema::from_header("ACCESSION_NUMBER\tTRANS_DATE\tTRANS_DATE_FN");
        assert_eq!(schema.width(), 3);
        assert_eq!(schema.columns().len(), 2);
        assert!(!schema.has_column("TRANS_DATE_FN"));
        assert_eq!(schema.columns()[1].kind, ColumnKind::Date);
    }

    #[test]
    fn month_table_covers_the_year() {
        assert_eq!(month_number("jan"), Some(1));
        assert_eq!(month_number("DEC"), Some(12));
        assert_eq!(month_number("XYZ"), None);
    }

    #[test]
    fn short_rows_are_malformed() {
        let schema = Schema::from_header("A\tB\tC");
        let err = schema.normalize(7, "1\t2").unwrap_err();
        assert!(matches!(err, InsiderError::MalformedRow { line: 7, .. }));
    }
}
