//! Batch numbers assigned when PCP releases an order to production
//!
//! The number is the prefix followed by the confirmation minute, `LOTE-YYYYMMDDHHMM`.
//! Two confirmations inside the same minute get the same number.
use chrono::{DateTime, TimeZone};
use std::fmt;

pub const DEFAULT_PREFIX: &str = "LOTE";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchNumber(String);

impl BatchNumber {
    pub fn generate<Tz: TimeZone>(prefix: &str, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(format!("{prefix}-{}", at.format("%Y%m%d%H%M")))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BatchNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<BatchNumber> for String {
    fn from(value: BatchNumber) -> Self {
        value.0
    }
}
