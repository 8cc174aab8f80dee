use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::AccountContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<AccountContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "account": ctx.account().as_str(),
    }))
}
