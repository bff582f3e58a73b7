//! API handlers module

pub mod chat;
pub mod dashboard;
pub mod data;
pub mod health;

use axum::extract::{rejection::QueryRejection, Query};
use scholarlens_common::errors::{AppError, Result};

/// Unwrap a query extraction so malformed strings get the JSON error body
pub(crate) fn parse_query<T>(extracted: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    extracted
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::InvalidRequest {
            message: rejection.body_text(),
            field: None,
        })
}
