use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::InsiderError;

pub const TRANSACTIONS_MEMBER: &str = "NONDERIV_TRANS.tsv";
pub const SUBMISSIONS_MEMBER: &str = "SUBMISSION.tsv";
pub const OWNERS_MEMBER: &str = "REPORTINGOWNER.tsv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quarter(u8);

impl Quarter {
    pub fn new(value: u8) -> Result<Self, InsiderError> {
        if !(1..=4).contains(&value) {
            return Err(InsiderError::InvalidQuarter(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn of_date(date: NaiveDate) -> Self {
        Self(((date.month0() / 3) + 1) as u8)
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Quarter {
    type Err = InsiderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let trimmed = trimmed
            .strip_prefix('q')
            .or_else(|| trimmed.strip_prefix('Q'))
            .unwrap_or(trimmed);
        let number = trimmed
            .parse::<u8>()
            .map_err(|_| InsiderError::InvalidQuarter(value.to_string()))?;
        Self::new(number)
    }
}

/// File name of one quarterly bulk extract, e.g. `2024q1_form345.zip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatasetName {
    year: i32,
    quarter: Quarter,
}

impl DatasetName {
    pub fn new(year: i32, quarter: Quarter) -> Self {
        Self { year, quarter }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> Quarter {
        self.quarter
    }

    pub fn file_name(&self) -> String {
        format!("{}q{}_form345.zip", self.year, self.quarter)
    }

    /// The last quarter that had fully ended on `today`. SEC publishes each
    /// extract after its quarter closes, so this is the newest one that can
    /// exist without consulting the listing page.
    pub fn latest_completed(today: NaiveDate) -> Self {
        let current = Quarter::of_date(today).get();
        if current == 1 {
            Self::new(today.year() - 1, Quarter(4))
        } else {
            Self::new(today.year(), Quarter(current - 1))
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

impl FromStr for DatasetName {
    type Err = InsiderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InsiderError::InvalidDatasetName(value.to_string());
        let stem = value
            .trim()
            .strip_suffix("_form345.zip")
            .ok_or_else(invalid)?;
        let (year, quarter) = stem.split_once('q').ok_or_else(invalid)?;
        if year.len() != 4 || !year.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let quarter = quarter.parse::<Quarter>().map_err(|_| invalid())?;
        Ok(Self::new(year, quarter))
    }
}

/// How a run picks the archive it ingests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSelection {
    Named(DatasetName),
    Latest,
    LocalArchive(camino::Utf8PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Sql,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Csv => write!(f, "csv"),
            ReportFormat::Sql => write!(f, "sql"),
        }
    }
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate, InsiderError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| InsiderError::InvalidDate(value.to_string()))
}
