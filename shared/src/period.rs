// Calendar month used as the measurement and certificate period.
use anyhow::{anyhow, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const MONTH_NAMES_ES: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio",
    "julio", "agosto", "septiembre", "octubre", "noviembre", "diciembre",
];

/// A (year, month) pair, stored as the first day of that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Period)
    }

    /// Any date inside the month.
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 exists in every month, so with_day(1) cannot fail here.
        Period(date.with_day(1).unwrap_or(date))
    }

    /// Accepts "2025-07", "2025-07-15" and "2025-07-15T10:00:00Z"; only the
    /// year and month are read.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let mut parts = trimmed.splitn(3, '-');
        let year_str = parts.next().unwrap_or_default();
        let month_str = parts
            .next()
            .ok_or_else(|| anyhow!("Period '{}' has no month", s))?;
        let month_str: String = month_str.chars().take_while(|c| c.is_ascii_digit()).collect();

        let year = year_str
            .parse::<i32>()
            .map_err(|e| anyhow!("Failed to parse year in period '{}': {}", s, e))?;
        let month = month_str
            .parse::<u32>()
            .map_err(|e| anyhow!("Failed to parse month in period '{}': {}", s, e))?;

        Period::new(year, month).ok_or_else(|| anyhow!("Month out of range in period '{}'", s))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Whole months from `earlier` to `self`; negative when `earlier` is later.
    pub fn months_since(&self, earlier: Period) -> i32 {
        (self.year() - earlier.year()) * 12 + (self.month() as i32 - earlier.month() as i32)
    }

    pub fn next(&self) -> Option<Period> {
        self.0.checked_add_months(Months::new(1)).map(Period)
    }

    /// Spanish month name, as printed on certificates.
    pub fn month_name_es(&self) -> &'static str {
        MONTH_NAMES_ES[self.month0()]
    }

    fn month0(&self) -> usize {
        self.0.month0() as usize
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Period::parse(s)
    }
}

impl From<NaiveDate> for Period {
    fn from(date: NaiveDate) -> Self {
        Period::from_date(date)
    }
}

// Stored as the normalized first-of-month date.
impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.format("%Y-%m-%d").to_string())
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Period::parse(&raw).map_err(serde::de::Error::custom)
    }
}
