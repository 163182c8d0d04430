//! Envelope and query types shared by all handlers

use serde::{Deserialize, Serialize};
use tourdesk_core::traits::Pagination;
use validator::Validate;

/// Every successful body is `{"data": ..., "message": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// `?page=&per_page=` on list endpoints
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct PaginationParams {
    /// 1-based
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: i64,

    #[validate(range(min = 1, max = 200, message = "per_page must be between 1 and 200"))]
    pub per_page: i64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

impl PaginationParams {
    pub fn to_pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

/// Format of a deletion response
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// JSON report
    #[default]
    Json,
    /// The cancelled reservations as a CSV attachment
    Csv,
}

/// `?export=csv` on deletion endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub export: ExportFormat,
}
