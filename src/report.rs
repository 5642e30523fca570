use std::fs::File;
use std::io::{self, BufWriter, Write};

use camino::Utf8Path;
use rusqlite::types::Value;

use crate::domain::ReportFormat;
use crate::error::InsiderError;
use crate::normalize::escape_quotes;
use crate::store::{Store, Table};

/// Report destination: the named file, or stdout when `path` is `None`.
pub fn open_output(path: Option<&Utf8Path>) -> Result<Box<dyn Write>, InsiderError> {
    match path {
        Some(path) => {
            let file = File::create(path.as_std_path()).map_err(|err| InsiderError::Output {
                path: path.as_std_path().to_path_buf(),
                message: err.to_string(),
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Writes every row of `table` with its live column names.
pub fn dump<W: Write>(
    store: &Store,
    table: &str,
    writer: W,
    format: ReportFormat,
) -> Result<usize, InsiderError> {
    let rows = store.dump_all(table)?;
    write_table(&rows, table, writer, format)
}

/// Writes a query result. `table_name` is only used by the `sql` format.
pub fn write_table<W: Write>(
    table: &Table,
    table_name: &str,
    writer: W,
    format: ReportFormat,
) -> Result<usize, InsiderError> {
    match format {
        ReportFormat::Csv => write_csv(table, writer),
        ReportFormat::Sql => write_sql(table, table_name, writer),
    }
}

fn write_csv<W: Write>(table: &Table, writer: W) -> Result<usize, InsiderError> {
    let report_err = |err: csv::Error| InsiderError::Report(err.to_string());
    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    csv.write_record(&table.columns).map_err(report_err)?;
    for row in &table.rows {
        csv.write_record(row.iter().map(cell_text))
            .map_err(report_err)?;
    }
    csv.flush()
        .map_err(|err| InsiderError::Report(err.to_string()))?;
    Ok(table.len())
}

fn write_sql<W: Write>(
    table: &Table,
    table_name: &str,
    mut writer: W,
) -> Result<usize, InsiderError> {
    crate::store::validate_table_name(table_name)?;
    let io_err = |err: io::Error| InsiderError::Report(err.to_string());
    writeln!(writer, "-- {}", table.columns.join(", ")).map_err(io_err)?;
    for row in &table.rows {
        let values = row.iter().map(sql_literal).collect::<Vec<_>>().join(", ");
        writeln!(writer, "INSERT OR IGNORE INTO {table_name} VALUES ({values});")
            .map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;
    Ok(table.len())
}

/// Display form of a stored value; NULL is the empty string.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) if number.is_finite() => {
            let text = number.to_string();
            if text.contains(['.', 'e', 'E']) {
                text
            } else {
                format!("{text}.0")
            }
        }
        Value::Real(_) => "NULL".to_string(),
        Value::Text(text) => format!("'{}'", escape_quotes(text)),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_escape_quotes_and_keep_reals() {
        assert_eq!(sql_literal(&Value::Text("O'Brien".to_string())), "'O''Brien'");
        assert_eq!(sql_literal(&Value::Real(1500.0)), "1500.0");
        assert_eq!(sql_literal(&Value::Null), "NULL");
    }

    #[test]
    fn csv_quotes_every_field() {
        let table = Table {
            columns: vec!["A".to_string(), "B".to_string()],
            rows: vec![vec![Value::Text("say \"hi\"".to_string()), Value::Null]],
        };
        let mut out = Vec::new();
        write_table(&table, "t", &mut out, ReportFormat::Csv).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\"A\",\"B\"\n\"say \"\"hi\"\"\",\"\"\n"
        );
    }
}
