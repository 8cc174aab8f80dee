use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tracechain_infra::{SessionError, SubmitError};

pub fn submit_error_to_response(err: SubmitError) -> axum::response::Response {
    let key = err.key();
    let (status, code) = match &err {
        SubmitError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        SubmitError::Precondition(_) => (StatusCode::UNPROCESSABLE_ENTITY, "precondition_failed"),
        SubmitError::Submission { .. } => (StatusCode::BAD_GATEWAY, "submission_failed"),
        SubmitError::TimedOut { .. } => (StatusCode::GATEWAY_TIMEOUT, "timed_out"),
        SubmitError::InFlight { .. } => (StatusCode::CONFLICT, "in_flight"),
        SubmitError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "ledger_unavailable"),
        SubmitError::UnknownKey(_) => (StatusCode::NOT_FOUND, "not_found"),
    };

    match key {
        // Retryable failures carry the key for `POST /actions/:key/retry`.
        Some(key) => (
            status,
            axum::Json(json!({
                "error": code,
                "message": err.to_string(),
                "key": key.to_string(),
            })),
        )
            .into_response(),
        None => json_error(status, code, err.to_string()),
    }
}

pub fn session_error_to_response(err: SessionError) -> axum::response::Response {
    match err {
        SessionError::Ledger(e) => json_error(StatusCode::SERVICE_UNAVAILABLE, "ledger_unavailable", e.to_string()),
        SessionError::Aggregate(e) => {
            tracing::error!("panel state rejected: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracechain_core::DispatchId;
    use tracechain_infra::submitter::IdempotencyKey;

    #[test]
    fn submit_errors_map_to_distinct_statuses() {
        let key = IdempotencyKey::new();
        let cases = [
            (SubmitError::validation("bad"), StatusCode::BAD_REQUEST),
            (SubmitError::precondition("not owner"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                SubmitError::Submission {
                    key,
                    reason: "reverted".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                SubmitError::InFlight {
                    dispatch_id: DispatchId::new(3),
                    key: None,
                },
                StatusCode::CONFLICT,
            ),
            (SubmitError::Unavailable("down".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (SubmitError::UnknownKey(key), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(submit_error_to_response(err).status(), status);
        }
    }
}
