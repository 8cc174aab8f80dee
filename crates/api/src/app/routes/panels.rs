use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use tracechain_core::ProductId;

use crate::app::services::{AppServices, Session};
use crate::app::{dto, errors};
use crate::context::AccountContext;

pub fn router() -> Router {
    Router::new()
        .route("/:stage", get(show_panel))
        .route("/:stage/pending", get(list_pending))
        .route("/:stage/deliveries", get(list_deliveries))
        .route("/:stage/parties/:role", get(list_parties))
        .route("/:stage/recipients", get(list_recipients))
        .route("/:stage/products/:id/track", get(track_product))
}

async fn mount(
    services: &AppServices,
    ctx: &AccountContext,
    stage: &str,
) -> Result<Session, axum::response::Response> {
    let stage = dto::parse_stage(stage)?;
    services
        .mount(ctx.account().clone(), stage)
        .await
        .map_err(errors::session_error_to_response)
}

pub async fn show_panel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Path(stage): Path<String>,
) -> axum::response::Response {
    let session = match mount(&services, &ctx, &stage).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    Json(dto::PanelResponse::from(session.state())).into_response()
}

pub async fn list_pending(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Path(stage): Path<String>,
) -> axum::response::Response {
    let session = match mount(&services, &ctx, &stage).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    Json(dto::PendingResponse {
        stage: session.stage(),
        pending: session.state().pending().collect(),
    })
    .into_response()
}

pub async fn list_deliveries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Path(stage): Path<String>,
) -> axum::response::Response {
    let session = match mount(&services, &ctx, &stage).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match session.delivered_products().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

pub async fn list_parties(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Path((stage, role)): Path<(String, String)>,
) -> axum::response::Response {
    let session = match mount(&services, &ctx, &stage).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match session.list_parties(&role).await {
        Ok(parties) => Json(parties).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

pub async fn list_recipients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Path(stage): Path<String>,
) -> axum::response::Response {
    let session = match mount(&services, &ctx, &stage).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match session.recipients().await {
        Ok(parties) => Json(parties).into_response(),
        Err(e) => errors::session_error_to_response(e),
    }
}

pub async fn track_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Path((stage, id)): Path<(String, String)>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let session = match mount(&services, &ctx, &stage).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let history = session.state().track(product_id);
    Json(serde_json::json!({
        "product_id": product_id,
        "dispatches": history,
    }))
    .into_response()
}
