pub mod movie;

use axum::extract::{FromRequestParts, Path};
use filmdb_dal::{Batch, ListingParams, SortKey};
use garde::Validate;
use http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Record identifier taken from path, must be positive integer.
///
/// Anything else is rejected as not found, without touching the storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId(pub i64);

pub fn parse_id(raw: &str) -> ApiResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::InvalidIdentifier(raw.to_string())),
    }
}

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::InvalidIdentifier(e.body_text()))?;
        parse_id(&raw).map(RecordId)
    }
}

#[derive(Debug, Clone, Default, Validate, Deserialize)]
#[garde(allow_unvalidated)]
pub struct Paging {
    #[garde(range(min = 1))]
    page: Option<u32>,
    #[garde(range(min = 1, max = 1000))]
    page_size: Option<u32>,
    #[garde(length(max = 255))]
    sort: Option<String>,
}

impl Paging {
    pub fn into_listing_params(self, default_page_size: u32) -> ApiResult<ListingParams> {
        let page_size = self.page_size(default_page_size);
        let page = self.page.unwrap_or(1).max(1);
        let sort = match self.sort.as_deref() {
            Some(keys) => SortKey::parse_list(keys)?,
            None => Vec::new(),
        };
        let offset = i64::from(page - 1) * i64::from(page_size);
        Ok(ListingParams::new(offset, page_size.into()).sorted_by(sort))
    }

    pub fn page_size(&self, default_page_size: u32) -> u32 {
        self.page_size.unwrap_or(default_page_size)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total: u64,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    pub fn try_from_batch(
        batch: Batch<T>,
        page_size: u32,
    ) -> Result<Self, std::num::TryFromIntError> {
        Ok(Self {
            page: u32::try_from(batch.offset)? / page_size + 1,
            page_size,
            total_pages: u32::try_from(batch.total.div_ceil(page_size as u64))?,
            total: batch.total,
            rows: batch.rows,
        })
    }

    pub fn from_batch(batch: Batch<T>, page_size: u32) -> ApiResult<Self> {
        Self::try_from_batch(batch, page_size)
            .map_err(|e| ApiError::InvalidQuery(format!("Page out of range: {e}")))
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            total: self.total,
            rows: self.rows.into_iter().map(f).collect(),
        }
    }
}
