use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid partition date '{0}': expected YYYY-MM-DD")]
pub struct ParseDateError(pub String);

/// The logical date that identifies one partition on both the source and the
/// destination side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionDate(NaiveDate);

impl PartitionDate {
    pub fn new(date: NaiveDate) -> Self {
        PartitionDate(date)
    }

    /// The day before today in local time, the default partition of a daily run.
    pub fn yesterday() -> Self {
        let today = Local::now().date_naive();
        PartitionDate(today.pred_opt().unwrap_or(today))
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for PartitionDate {
    type Err = ParseDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // chrono accepts unpadded fields, the partition key format does not
        if s.len() != 10 {
            return Err(ParseDateError(s.to_string()));
        }
        NaiveDate::parse_from_str(s, PARTITION_DATE_FORMAT)
            .map(PartitionDate)
            .map_err(|_| ParseDateError(s.to_string()))
    }
}

impl fmt::Display for PartitionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(PARTITION_DATE_FORMAT))
    }
}

impl From<NaiveDate> for PartitionDate {
    fn from(date: NaiveDate) -> Self {
        PartitionDate(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let date: PartitionDate = "2024-03-09".parse().unwrap();
        assert_eq!(date.to_string(), "2024-03-09");
        assert_eq!(
            date.as_naive(),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_rejects_other_formats() {
        assert!("2024-3-9".parse::<PartitionDate>().is_err());
        assert!("09/03/2024".parse::<PartitionDate>().is_err());
        assert!("2024-02-30".parse::<PartitionDate>().is_err());
        assert!("".parse::<PartitionDate>().is_err());
    }

    #[test]
    fn test_yesterday_is_before_today() {
        let today = Local::now().date_naive();
        assert!(PartitionDate::yesterday().as_naive() < today);
    }
}
