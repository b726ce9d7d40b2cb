//! Success envelope shared by every peer-group route.
//!
//! Errors are rendered by `ApiError`; this side only ever writes
//! `{"success": true, "data": ..}`, plus `"page"` for listings.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::groups::GroupFilter;

/// Paging details returned next to a group listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Items in this page.
    pub count: usize,
    /// Effective limit after the server cap; `None` when unbounded.
    pub limit: Option<i64>,
    pub offset: i64,
}

impl PageInfo {
    pub fn for_filter(filter: &GroupFilter, count: usize) -> Self {
        Self {
            count,
            limit: filter.limit,
            offset: filter.offset.unwrap_or(0),
        }
    }
}

#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status: StatusCode,
    pub page: Option<PageInfo>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    pub fn with_status(data: T, status: StatusCode) -> Self {
        Self {
            data,
            status,
            page: None,
        }
    }

    /// 201, used when a grouping run created groups.
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    pub fn with_page(mut self, page: PageInfo) -> Self {
        self.page = Some(page);
        self
    }

    fn envelope(&self) -> Result<Value, serde_json::Error> {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(true));
        body.insert("data".to_string(), serde_json::to_value(&self.data)?);
        if let Some(page) = &self.page {
            body.insert("page".to_string(), serde_json::to_value(page)?);
        }
        Ok(Value::Object(body))
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self.envelope() {
            Ok(body) => (self.status, Json(body)).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                ApiError::internal_server_error("Failed to serialize response data").into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
