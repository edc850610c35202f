use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    /// A page size that cannot hold anything is a programming error in the
    /// caller.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.page_size <= 0 {
            return Err(EngineError::configuration(
                "page_size",
                format!("must be positive, got {}", self.page_size),
            ));
        }
        Ok(())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub total_pages: usize,
}

/// Slices `items` into the requested page. Pages below 1 are clamped to 1;
/// pages past the end are empty.
pub fn paginate<T>(items: Vec<T>, request: &PageRequest) -> Result<Page<T>, EngineError> {
    request.validate()?;
    let page_size = usize::try_from(request.page_size).unwrap_or(usize::MAX);
    let page = usize::try_from(request.page.max(1)).unwrap_or(usize::MAX);

    let total_count = items.len();
    let total_pages = total_count.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size);

    let items = items.into_iter().skip(start).take(page_size).collect();
    Ok(Page {
        items,
        total_count,
        total_pages,
    })
}
