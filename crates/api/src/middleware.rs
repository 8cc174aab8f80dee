use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use tracechain_core::Address;

use crate::context::AccountContext;

/// Header carrying the connected wallet address.
pub const ACCOUNT_HEADER: &str = "x-account";

pub async fn account_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let account = extract_account(req.headers())?;
    req.extensions_mut().insert(AccountContext::new(account));
    Ok(next.run(req).await)
}

fn extract_account(headers: &HeaderMap) -> Result<Address, StatusCode> {
    let header = headers.get(ACCOUNT_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;
    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let account = Address::parse(header).map_err(|e| {
        tracing::debug!("rejecting account header: {e}");
        StatusCode::UNAUTHORIZED
    })?;
    if account.is_burn() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn account_header_is_normalized() {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCOUNT_HEADER,
            HeaderValue::from_static("0x00000000000000000000000000000000000000AB"),
        );
        let account = extract_account(&headers).unwrap();
        assert_eq!(account.as_str(), "0x00000000000000000000000000000000000000ab");
    }

    #[test]
    fn missing_malformed_or_burn_account_is_unauthorized() {
        assert_eq!(extract_account(&HeaderMap::new()), Err(StatusCode::UNAUTHORIZED));

        let mut headers = HeaderMap::new();
        headers.insert(ACCOUNT_HEADER, HeaderValue::from_static("0x12"));
        assert_eq!(extract_account(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(
            ACCOUNT_HEADER,
            HeaderValue::from_static("0x0000000000000000000000000000000000000000"),
        );
        assert_eq!(extract_account(&headers), Err(StatusCode::UNAUTHORIZED));
    }
}
