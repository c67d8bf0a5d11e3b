//! One-shot flash messages.
//!
//! A handler attaches an [`OutgoingFlash`] to its response. The
//! [`flash_middleware`] parks the message in a [`FlashStore`] under a random
//! token and sets the `__flash` cookie. On a later request the [`Flash`]
//! extractor takes the message out of the store, after which the middleware
//! clears the cookie. Messages nobody reads expire after five minutes.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponseParts, Response, ResponseParts},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use moka::future::Cache;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tower_sessions::cookie::{Cookie, SameSite};

use farmfusion_core::FlashStatus;

/// Flash cookie name.
pub const FLASH_COOKIE_NAME: &str = "__flash";

/// How long an unread message is kept.
const FLASH_TTL: Duration = Duration::from_secs(5 * 60);

/// A message shown once on the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub title: String,
    pub status: FlashStatus,
}

impl FlashMessage {
    /// A success message.
    #[must_use]
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: FlashStatus::Success,
        }
    }

    /// An error message.
    #[must_use]
    pub fn error(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: FlashStatus::Error,
        }
    }

    /// Whether this reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == FlashStatus::Error
    }
}

/// Mailbox of pending messages keyed by opaque token.
#[derive(Clone)]
pub struct FlashStore {
    messages: Cache<String, FlashMessage>,
}

impl Default for FlashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let messages = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(FLASH_TTL)
            .build();
        Self { messages }
    }

    /// Park a message and return the token that retrieves it.
    pub async fn enqueue(&self, message: FlashMessage) -> String {
        let mut bytes = [0u8; 24];
        rand::rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        self.messages.insert(token.clone(), message).await;
        token
    }

    /// Take the message for `token`; a second call returns `None`.
    pub async fn consume(&self, token: &str) -> Option<FlashMessage> {
        self.messages.remove(token).await
    }
}

/// Response part carrying a message for the next request.
///
/// ```rust,ignore
/// (OutgoingFlash(FlashMessage::success("Saved")), Redirect::to("/admin"))
/// ```
#[derive(Debug, Clone)]
pub struct OutgoingFlash(pub FlashMessage);

impl IntoResponseParts for OutgoingFlash {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

/// Per-request view of the incoming flash cookie.
#[derive(Clone)]
struct IncomingFlash {
    store: FlashStore,
    token: Option<String>,
    consumed: Arc<AtomicBool>,
}

/// Extractor yielding the pending flash message, consuming it.
pub struct Flash(pub Option<FlashMessage>);

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(incoming) = parts.extensions.get::<IncomingFlash>().cloned() else {
            return Ok(Self(None));
        };
        let Some(token) = incoming.token.as_deref() else {
            return Ok(Self(None));
        };
        if incoming.consumed.swap(true, Ordering::SeqCst) {
            return Ok(Self(None));
        }
        Ok(Self(incoming.store.consume(token).await))
    }
}

/// Middleware moving flash messages between responses and requests.
pub async fn flash_middleware(
    State(store): State<FlashStore>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = read_cookie(&request);
    let consumed = Arc::new(AtomicBool::new(false));
    request.extensions_mut().insert(IncomingFlash {
        store: store.clone(),
        token: token.clone(),
        consumed: Arc::clone(&consumed),
    });

    let mut response = next.run(request).await;

    let outgoing = response.extensions_mut().remove::<OutgoingFlash>();
    let cookie = if let Some(OutgoingFlash(message)) = outgoing {
        let token = store.enqueue(message).await;
        Some(flash_cookie(token, FLASH_TTL))
    } else if token.is_some() && consumed.load(Ordering::SeqCst) {
        Some(flash_cookie(String::new(), Duration::ZERO))
    } else {
        None
    };

    if let Some(cookie) = cookie
        && let Ok(value) = HeaderValue::from_str(&cookie.to_string())
    {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn read_cookie(request: &Request) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == FLASH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}

fn flash_cookie(value: String, max_age: Duration) -> Cookie<'static> {
    let max_age = tower_sessions::cookie::time::Duration::seconds(
        i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX),
    );
    Cookie::build((FLASH_COOKIE_NAME, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request as HttpRequest;
    use axum::{Router, body::Body, response::IntoResponse, routing::get};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_store_delivers_once() {
        let store = FlashStore::new();
        let token = store.enqueue(FlashMessage::success("Saved")).await;

        assert_eq!(
            store.consume(&token).await,
            Some(FlashMessage::success("Saved"))
        );
        assert_eq!(store.consume(&token).await, None);
        assert_eq!(store.consume("unknown").await, None);
    }

    #[tokio::test]
    async fn test_tokens_are_distinct() {
        let store = FlashStore::new();
        let a = store.enqueue(FlashMessage::error("a")).await;
        let b = store.enqueue(FlashMessage::error("b")).await;
        assert_ne!(a, b);
    }

    fn app(store: FlashStore) -> Router {
        Router::new()
            .route(
                "/set",
                get(|| async { (OutgoingFlash(FlashMessage::error("Nope")), "set") }),
            )
            .route(
                "/read",
                get(|Flash(message): Flash| async move {
                    message.map(|m| m.title).unwrap_or_default().into_response()
                }),
            )
            .layer(axum::middleware::from_fn_with_state(store, flash_middleware))
    }

    fn set_cookie(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_middleware_round_trip() {
        let store = FlashStore::new();

        let response = app(store.clone())
            .oneshot(HttpRequest::get("/set").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = set_cookie(&response);
        assert!(cookie.starts_with("__flash="));
        assert!(cookie.contains("HttpOnly"));
        let pair = cookie.split(';').next().unwrap().to_string();

        let response = app(store.clone())
            .oneshot(
                HttpRequest::get("/read")
                    .header(header::COOKIE, &pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(set_cookie(&response).contains("Max-Age=0"));
        assert_eq!(body(response).await, "Nope");

        let response = app(store)
            .oneshot(
                HttpRequest::get("/read")
                    .header(header::COOKIE, &pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body(response).await, "");
    }
}
