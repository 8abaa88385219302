use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use palaver_core::Identity;
use uuid::Uuid;

/// Cookie carrying the ephemeral guest identity
const GUEST_COOKIE: &str = "guest_id";

/// Trusted header the upstream auth layer sets for account users
const ACCOUNT_HEADER: &str = "x-account-id";

/// One week, matching the guest entitlement window
const GUEST_COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;

/// Middleware resolving the request identity
///
/// Account identities come from the auth collaborator's trusted
/// header; otherwise the guest cookie is reused or a fresh guest
/// identity is minted and set on the response. Every downstream
/// handler reads one `Identity` extension and never branches on raw
/// headers.
pub(crate) async fn identity_middleware(secure_cookies: bool, mut request: Request, next: Next) -> Response {
    let headers = request.headers();

    let (identity, minted) = if let Some(account) = account_id(headers) {
        (Identity::Account(account), None)
    } else if let Some(guest) = cookie_value(headers, GUEST_COOKIE) {
        (Identity::Guest(guest), None)
    } else {
        let id = Uuid::new_v4().to_string();
        tracing::debug!(guest = %id, "issuing guest identity");
        (Identity::Guest(id.clone()), Some(id))
    };

    request.extensions_mut().insert(identity);
    let mut response = next.run(request).await;

    if let Some(id) = minted
        && let Ok(value) = HeaderValue::from_str(&guest_cookie(&id, secure_cookies))
    {
        response.headers_mut().append(SET_COOKIE, value);
    }

    response
}

fn account_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCOUNT_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_owned())
        })
}

fn guest_cookie(id: &str, secure: bool) -> String {
    let mut cookie = format!("{GUEST_COOKIE}={id}; Max-Age={GUEST_COOKIE_MAX_AGE_SECS}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
