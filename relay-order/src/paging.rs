use relay_core::repository::PageWindow;
use relay_core::{CoreError, CoreResult};

pub const MAX_PAGE_SIZE: u64 = 100;

/// A validated page request. `page` starts at 1 and `limit` is clamped to
/// `1..=MAX_PAGE_SIZE`; pages whose offset would not fit a signed 64-bit
/// row count are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> CoreResult<Self> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        (page - 1)
            .checked_mul(limit)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| CoreError::invalid(format!("page {} is out of range", page)))?;

        Ok(Self { page, limit })
    }

    pub fn window(&self) -> PageWindow {
        PageWindow {
            offset: (self.page - 1) * self.limit,
            limit: self.limit,
        }
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}
