use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quarter::Q1 => write!(f, "Q1"),
            Quarter::Q2 => write!(f, "Q2"),
            Quarter::Q3 => write!(f, "Q3"),
            Quarter::Q4 => write!(f, "Q4"),
        }
    }
}

impl Quarter {
    pub fn new(n: u8) -> Option<Self> {
        match n {
            1 => Some(Quarter::Q1),
            2 => Some(Quarter::Q2),
            3 => Some(Quarter::Q3),
            4 => Some(Quarter::Q4),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Invalid quarter: {0}")]
    InvalidQuarter(u8),
    #[error("No quarter token in '{0}'")]
    NoToken(String),
}

/// One intake period: a (year, quarter) reporting unit.
///
/// Ordering is chronological, so sorting descending yields newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: u16,
    pub quarter: Quarter,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.quarter)
    }
}

fn quarter_token() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)([1-4])T(\d{4})").expect("invalid regex"))
}

impl Period {
    pub fn new(year: u16, quarter: Quarter) -> Self {
        Period { year, quarter }
    }

    pub fn from_parts(year: u16, quarter: u8) -> Result<Self, PeriodError> {
        let quarter = Quarter::new(quarter).ok_or(PeriodError::InvalidQuarter(quarter))?;
        Ok(Period { year, quarter })
    }

    /// Finds the first `<q>T<yyyy>` token anywhere in an archive name,
    /// e.g. `"3T2024.zip"` or `"demonstracoes_1t2023_v2.zip"`.
    pub fn from_archive_name(name: &str) -> Result<Self, PeriodError> {
        let caps = quarter_token()
            .captures(name)
            .ok_or_else(|| PeriodError::NoToken(name.to_string()))?;
        let quarter: u8 = caps[1]
            .parse()
            .map_err(|_| PeriodError::NoToken(name.to_string()))?;
        let year: u16 = caps[2]
            .parse()
            .map_err(|_| PeriodError::NoToken(name.to_string()))?;
        Period::from_parts(year, quarter)
    }
}
