use crate::model::{Order, OrderStatus};

/// Query for the admin order listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Free text, matched case-insensitively as a substring.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl OrderFilter {
    pub const DEFAULT_LIMIT: usize = 200;
    pub const MAX_LIMIT: usize = 500;

    /// Builds a filter from raw query-string values.
    ///
    /// An unknown status or a non-positive/unparsable limit is treated as absent.
    pub fn from_query(status: Option<&str>, search: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            status: status.and_then(OrderStatus::parse),
            search: search
                .map(|q| q.trim().to_lowercase())
                .filter(|q| !q.is_empty()),
            limit: limit
                .and_then(|l| l.trim().parse::<usize>().ok())
                .filter(|l| *l > 0),
        }
    }

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Filters, sorts newest-first and truncates.
    pub fn apply(&self, orders: Vec<Order>) -> Vec<Order> {
        let needle = self.search.as_ref().map(|q| q.to_lowercase());
        let mut selected: Vec<Order> = orders
            .into_iter()
            .filter(|o| self.status.as_ref().map_or(true, |s| &o.status == s))
            .filter(|o| needle.as_deref().map_or(true, |q| o.matches_text(q)))
            .collect();

        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected.truncate(self.effective_limit());
        selected
    }
}
