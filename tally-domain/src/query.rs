//! Query shapes shared by the store and the ledger port.

use serde::{Deserialize, Serialize};

use crate::entities::LocationId;

/// Server-side filter for listing positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFilter {
    /// Restrict to one location (and its children, as the ledger decides)
    pub location_id: Option<LocationId>,
    /// Free-text search on product name
    pub search: Option<String>,
}

impl PositionFilter {
    /// Filter scoped to a location.
    pub fn at_location(location_id: Option<LocationId>) -> Self {
        Self {
            location_id,
            search: None,
        }
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Records to skip
    pub offset: usize,
    /// Maximum records to return
    pub limit: usize,
}

impl PageRequest {
    /// First page of the given size.
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    /// Page following this one.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

/// Scope of a bulk apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyScope {
    /// Only apply counts at this location
    pub location_id: Option<LocationId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_advances_by_limit() {
        let page = PageRequest::first(50);
        assert_eq!(page.next(), PageRequest { offset: 50, limit: 50 });
        assert_eq!(page.next().next().offset, 100);
    }
}
