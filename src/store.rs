//! SQLite persistence for enriched transactions.
//!
//! One table, one row per accession number. Inserts never overwrite: a
//! second row for a known accession number is ignored, so ingesting the same
//! archive twice leaves the table unchanged.

use chrono::{Datelike, Days, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{Connection, ToSql, params};
use serde::Serialize;
use tracing::debug;

use crate::config::{DEFAULT_TABLE, IN_MEMORY_DATABASE};
use crate::error::InsiderError;
use crate::records::EnrichedTransaction;

/// Column name and SQL type, in table order.
pub const COLUMNS: [(&str, &str); 29] = [
    ("ACCESSION_NUMBER", "TEXT NOT NULL"),
    ("NONDERIV_TRANS_SK", "TEXT"),
    ("SECURITY_TITLE", "TEXT"),
    ("TRANS_DATE", "TEXT"),
    ("DEEMED_EXECUTION_DATE", "TEXT"),
    ("TRANS_FORM_TYPE", "TEXT"),
    ("TRANS_CODE", "TEXT"),
    ("EQUITY_SWAP_INVOLVED", "TEXT"),
    ("TRANS_TIMELINESS", "TEXT"),
    ("TRANS_SHARES", "REAL"),
    ("TRANS_PRICEPERSHARE", "REAL"),
    ("TRANS_ACQUIRED_DISP_CD", "TEXT"),
    ("SHRS_OWND_FOLWNG_TRANS", "REAL"),
    ("VALU_OWND_FOLWNG_TRANS", "REAL"),
    ("DIRECT_INDIRECT_OWNERSHIP", "TEXT"),
    ("NATURE_OF_OWNERSHIP", "TEXT"),
    ("TRANSDOLLARS", "REAL"),
    ("FILING_DATE", "TEXT"),
    ("NO_SECURITIES_OWNED", "TEXT"),
    ("DOCUMENT_TYPE", "TEXT"),
    ("ISSUERCIK", "TEXT"),
    ("ISSUERNAME", "TEXT"),
    ("ISSUERTRADINGSYMBOL", "TEXT"),
    ("RPTOWNERCIK", "TEXT"),
    ("RPTOWNERNAME", "TEXT"),
    ("RPTOWNER_RELATIONSHIP", "TEXT"),
    ("RPTOWNER_TITLE", "TEXT"),
    ("RPTOWNER_TXT", "TEXT"),
    ("FILE_NUMBER", "TEXT"),
];

/// Rows of a query together with the column names SQLite reported for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertStats {
    pub inserted: usize,
    pub ignored: usize,
}

#[derive(Debug)]
pub struct Store {
    conn: Connection,
    table: String,
}

impl Store {
    /// Opens (or creates) the database at `path` and ensures the schema.
    /// `:memory:` gives a store that lives as long as this value.
    pub fn open(path: &str) -> Result<Self, InsiderError> {
        Self::open_with_table(path, DEFAULT_TABLE)
    }

    pub fn open_in_memory() -> Result<Self, InsiderError> {
        Self::open(IN_MEMORY_DATABASE)
    }

    pub fn open_with_table(path: &str, table: &str) -> Result<Self, InsiderError> {
        validate_table_name(table)?;
        let conn = if path == IN_MEMORY_DATABASE {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        let store = Self {
            conn,
            table: table.to_string(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Idempotent: creates the table and its unique accession index if absent.
    pub fn ensure_schema(&self) -> Result<(), InsiderError> {
        let columns = COLUMNS
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        let table = &self.table;
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} ({columns});
             CREATE UNIQUE INDEX IF NOT EXISTS {table}_accession_idx ON {table} (ACCESSION_NUMBER);"
        ))?;
        Ok(())
    }

    /// Returns `true` when the row was written, `false` when its accession
    /// number was already present.
    pub fn insert_if_absent(&self, row: &EnrichedTransaction) -> Result<bool, InsiderError> {
        let changed = insert_row(&self.conn, &self.insert_sql(), row)?;
        Ok(changed > 0)
    }

    /// Inserts every row inside one transaction; nothing is visible to other
    /// connections until all rows are written.
    pub fn insert_all(&mut self, rows: &[EnrichedTransaction]) -> Result<InsertStats, InsiderError> {
        let sql = self.insert_sql();
        let tx = self.conn.transaction()?;
        let mut stats = InsertStats::default();
        for row in rows {
            if insert_row(&tx, &sql, row)? > 0 {
                stats.inserted += 1;
            } else {
                stats.ignored += 1;
            }
        }
        tx.commit()?;
        debug!(
            "{}: {} inserted, {} already present",
            self.table, stats.inserted, stats.ignored
        );
        Ok(stats)
    }

    pub fn count(&self) -> Result<usize, InsiderError> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    /// Rows with `start <= TRANS_DATE < start + days + 1`. A window ending
    /// after year 9999 is open-ended.
    pub fn select_by_date_window(
        &self,
        table: &str,
        start: NaiveDate,
        days: u32,
    ) -> Result<Table, InsiderError> {
        validate_table_name(table)?;
        let end = start
            .checked_add_days(Days::new(u64::from(days) + 1))
            .filter(|end| end.year() <= 9999);
        match end {
            Some(end) => self.query(
                &format!(
                    "SELECT * FROM {table} WHERE TRANS_DATE >= ?1 AND TRANS_DATE < ?2 \
                     ORDER BY TRANS_DATE, ACCESSION_NUMBER"
                ),
                &[&iso(start), &iso(end)],
            ),
            None => self.query(
                &format!(
                    "SELECT * FROM {table} WHERE TRANS_DATE >= ?1 \
                     ORDER BY TRANS_DATE, ACCESSION_NUMBER"
                ),
                &[&iso(start)],
            ),
        }
    }

    /// Rows with `start <= TRANS_DATE <= end`.
    pub fn select_by_date_range(
        &self,
        table: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table, InsiderError> {
        validate_table_name(table)?;
        self.query(
            &format!(
                "SELECT * FROM {table} WHERE TRANS_DATE BETWEEN ?1 AND ?2 \
                 ORDER BY TRANS_DATE, ACCESSION_NUMBER"
            ),
            &[&iso(start), &iso(end)],
        )
    }

    pub fn dump_all(&self, table: &str) -> Result<Table, InsiderError> {
        validate_table_name(table)?;
        self.query(&format!("SELECT * FROM {table} ORDER BY rowid"), &[])
    }

    /// Executes a script of SQL statements, such as a dump written by the
    /// reporter in `sql` format.
    pub fn apply_script(&self, sql: &str) -> Result<(), InsiderError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn insert_sql(&self) -> String {
        let placeholders = (1..=COLUMNS.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT OR IGNORE INTO {} VALUES ({placeholders})",
            self.table
        )
    }

    fn query(&self, sql: &str, args: &[&dyn ToSql]) -> Result<Table, InsiderError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();
        let rows = stmt
            .query_map(args, |row| {
                (0..width)
                    .map(|idx| row.get::<_, Value>(idx))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table { columns, rows })
    }
}

fn insert_row(
    conn: &Connection,
    sql: &str,
    row: &EnrichedTransaction,
) -> Result<usize, InsiderError> {
    let t = &row.transaction;
    let mut stmt = conn.prepare_cached(sql)?;
    let changed = stmt.execute(params![
        t.accession_number,
        t.nonderiv_trans_sk,
        t.security_title,
        t.trans_date,
        t.deemed_execution_date,
        t.trans_form_type,
        t.trans_code,
        t.equity_swap_involved,
        t.trans_timeliness,
        t.trans_shares,
        t.trans_price_per_share,
        t.trans_acquired_disp_cd,
        t.shrs_ownd_folwng_trans,
        t.valu_ownd_folwng_trans,
        t.direct_indirect_ownership,
        t.nature_of_ownership,
        t.trans_dollars,
        row.filing_date,
        row.no_securities_owned,
        row.document_type,
        row.issuer_cik,
        row.issuer_name,
        row.issuer_trading_symbol,
        row.rpt_owner_cik,
        row.rpt_owner_name,
        row.rpt_owner_relationship,
        row.rpt_owner_title,
        row.rpt_owner_txt,
        row.file_number,
    ])?;
    Ok(changed)
}

/// Table names are spliced into SQL text, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> Result<(), InsiderError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .map(|first| first.is_ascii_alphabetic() || first == '_')
        .unwrap_or(false)
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(InsiderError::InvalidTable(name.to_string()));
    }
    Ok(())
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_identifiers() {
        assert!(validate_table_name("insiders").is_ok());
        assert!(validate_table_name("_t2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("x; DROP TABLE y").is_err());
        assert!(validate_table_name("2024").is_err());
    }

    #[test]
    fn schema_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        let table = store.dump_all("insiders").unwrap();
        assert_eq!(table.columns.len(), COLUMNS.len());
        assert_eq!(table.columns[0], "ACCESSION_NUMBER");
    }
}
