use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use tracechain_core::{BoxId, DispatchId, ProductId};
use tracechain_infra::SubmitError;

use crate::app::services::{AppServices, Submitter};
use crate::app::{dto, errors};
use crate::context::AccountContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_submissions))
        .route("/enter", post(enter_product))
        .route("/dispatch", post(dispatch))
        .route("/confirm", post(confirm_delivery))
        .route("/sell", post(sell))
        .route("/report", post(report_product))
        .route("/update-price", post(update_price))
        .route("/:key", get(get_submission))
        .route("/:key/retry", post(retry))
}

fn submitter(services: &AppServices, ctx: &AccountContext) -> Result<Arc<Submitter>, axum::response::Response> {
    services
        .submitter(ctx.account())
        .map_err(errors::submit_error_to_response)
}

pub async fn enter_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Json(body): Json<dto::EnterProductRequest>,
) -> axum::response::Response {
    let entry = match body.into_entry() {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter.enter_product(entry).await {
        Ok(confirmed) => (StatusCode::CREATED, Json(confirmed)).into_response(),
        Err(e) => errors::submit_error_to_response(e),
    }
}

pub async fn dispatch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Json(body): Json<dto::DispatchRequest>,
) -> axum::response::Response {
    let to = match dto::parse_address("to", &body.to) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter
        .dispatch(ProductId::new(body.start_id), ProductId::new(body.end_id), to, body.memo)
        .await
    {
        Ok(confirmed) => Json(confirmed).into_response(),
        Err(e) => errors::submit_error_to_response(e),
    }
}

pub async fn confirm_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Json(body): Json<dto::ConfirmDeliveryRequest>,
) -> axum::response::Response {
    if body.dispatch_id == 0 {
        return errors::submit_error_to_response(SubmitError::validation("dispatch id cannot be 0"));
    }
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter.confirm_delivery(DispatchId::new(body.dispatch_id)).await {
        Ok(confirmed) => Json(confirmed).into_response(),
        Err(e) => errors::submit_error_to_response(e),
    }
}

pub async fn sell(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Json(body): Json<dto::SellRequest>,
) -> axum::response::Response {
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter.sell(ProductId::new(body.product_id), body.price).await {
        Ok(confirmed) => Json(confirmed).into_response(),
        Err(e) => errors::submit_error_to_response(e),
    }
}

pub async fn report_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Json(body): Json<dto::ReportRequest>,
) -> axum::response::Response {
    let report_for = match dto::parse_address("report_for", &body.report_for) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter
        .report_product(ProductId::new(body.product_id), body.description, report_for, body.proof_hash)
        .await
    {
        Ok(confirmed) => Json(confirmed).into_response(),
        Err(e) => errors::submit_error_to_response(e),
    }
}

pub async fn update_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Json(body): Json<dto::UpdatePriceRequest>,
) -> axum::response::Response {
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter.update_price(BoxId::new(body.box_id), body.price).await {
        Ok(confirmed) => Json(confirmed).into_response(),
        Err(e) => errors::submit_error_to_response(e),
    }
}

pub async fn list_submissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
) -> axum::response::Response {
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter.journal().list() {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::submit_error_to_response(e.into()),
    }
}

pub async fn get_submission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Path(key): Path<String>,
) -> axum::response::Response {
    let key = match dto::parse_key(&key) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter.journal().get(key) {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => errors::submit_error_to_response(SubmitError::UnknownKey(key)),
        Err(e) => errors::submit_error_to_response(e.into()),
    }
}

pub async fn retry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AccountContext>,
    Path(key): Path<String>,
) -> axum::response::Response {
    let key = match dto::parse_key(&key) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let submitter = match submitter(&services, &ctx) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match submitter.retry(key).await {
        Ok(confirmed) => Json(confirmed).into_response(),
        Err(e) => errors::submit_error_to_response(e),
    }
}
