//! Success and pagination envelopes
//!
//! Errors render through `AppError`; everything else goes out as
//! `{success: true, message?, data}`.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }

    /// 201 with a message
    pub fn created(data: T, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::with_message(data, message))
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit).max(1),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, page: u64, limit: u64, total: u64) -> Json<ApiResponse<Self>> {
        ApiResponse::ok(Self {
            items,
            pagination: Pagination::new(page, limit, total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_total_pages() {
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 21).total_pages, 2);
    }

    #[test]
    fn test_envelope_shape() {
        let Json(body) = Paginated::new(vec![1, 2], 1, 2, 5);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "data": {
                    "items": [1, 2],
                    "pagination": {"page": 1, "limit": 2, "total": 5, "totalPages": 3}
                }
            })
        );

        let Json(body) = ApiResponse::with_message((), "Tag removed from document");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["data"], serde_json::Value::Null);
        assert_eq!(value["message"], "Tag removed from document");
    }
}
