// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PlantGuru.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! JSON error responses for the HTTP handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use plantguru_core::EngineError;
use plantguru_shared::ErrorBody;

pub fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_owned(),
            message: message.into(),
        }),
    )
        .into_response()
}

/// Map an engine failure onto a status code. Caller mistakes are 4xx and
/// store failures 500.
pub fn engine_error_response(err: &EngineError) -> Response {
    let (status, kind) = match err {
        EngineError::InvalidRange { .. } => (StatusCode::BAD_REQUEST, "invalid_range"),
        EngineError::RangeTooLarge { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "range_too_large"),
        EngineError::NotRollupTarget(_)
        | EngineError::EmptyWindow { .. }
        | EngineError::WindowNotSettled { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_rollup_window")
        }
        EngineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
    };

    if err.is_client_error() {
        warn!(error = %err, "Request rejected");
    } else {
        error!(error = %err, "Request failed");
    }

    error_response(status, kind, err.to_string())
}

/// Malformed query string or body, including unknown metric and horizon names
pub fn rejection_response(status: StatusCode, body_text: String) -> Response {
    warn!(status = %status, reason = %body_text, "Malformed request");
    error_response(status, "bad_request", body_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_status_mapping() {
        let now = Utc::now();
        let cases = [
            (
                EngineError::InvalidRange { start: now, end: now },
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::RangeTooLarge {
                    requested_days: 100,
                    max_days: 90,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                EngineError::EmptyWindow {
                    start: now,
                    end: now - Duration::hours(1),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                EngineError::Store(anyhow::anyhow!("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(engine_error_response(&err).status(), status);
        }
    }
}
