//! View state types: status filter and pagination cursor

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Status partition applied after search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Every position
    #[default]
    All,
    /// Not counted yet
    Todo,
    /// Counted
    Done,
}

impl StatusFilter {
    /// Whether a position with the given counted flag passes.
    pub fn admits(&self, is_counted: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Todo => !is_counted,
            StatusFilter::Done => is_counted,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => write!(f, "all"),
            StatusFilter::Todo => write!(f, "todo"),
            StatusFilter::Done => write!(f, "done"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "todo" => Ok(StatusFilter::Todo),
            "done" => Ok(StatusFilter::Done),
            other => Err(StoreError::UnknownFilter(other.to_string())),
        }
    }
}

/// Pagination position over a possibly partial load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageCursor {
    /// Offset of the last loaded page
    pub offset: usize,
    /// Page size of the last loaded page
    pub limit: usize,
    /// Total reported by the ledger
    pub total: usize,
    /// More records exist past the last page
    pub has_more: bool,
}

impl PageCursor {
    /// Cursor after loading the page at `offset` of `limit` out of `total`.
    pub fn after(offset: usize, limit: usize, total: usize) -> Self {
        Self {
            offset,
            limit,
            total,
            has_more: offset + limit < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("todo".parse::<StatusFilter>(), Ok(StatusFilter::Todo));
        assert_eq!(" DONE ".parse::<StatusFilter>(), Ok(StatusFilter::Done));
        assert!("later".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::All.to_string(), "all");
    }

    #[test]
    fn test_status_filter_admits() {
        assert!(StatusFilter::All.admits(true));
        assert!(StatusFilter::Todo.admits(false));
        assert!(!StatusFilter::Todo.admits(true));
        assert!(StatusFilter::Done.admits(true));
    }

    #[test]
    fn test_cursor_has_more() {
        assert!(PageCursor::after(0, 50, 120).has_more);
        assert!(!PageCursor::after(100, 50, 120).has_more);
        assert!(!PageCursor::after(0, 50, 50).has_more);
    }
}
