use super::mission::MissionStatus;
use serde::{Deserialize, Serialize};

/// Typed search filter for mission listings: explicit optional fields
/// instead of an untyped predicate map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionFilter {
    pub status: Option<MissionStatus>,
    /// Case-insensitive match against pickup city, delivery city or
    /// shipper name.
    pub query: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl MissionFilter {
    pub const DEFAULT_LIMIT: u32 = 10;

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
            .filter(|limit| *limit > 0)
            .unwrap_or(Self::DEFAULT_LIMIT)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.limit())
    }
}

/// Pagination envelope for list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub current_page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    #[must_use]
    pub fn compute(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX)
        };
        Self {
            total,
            current_page: page,
            limit,
            total_pages,
            has_next_page: u64::from(page) * u64::from(limit) < total,
            has_previous_page: page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
