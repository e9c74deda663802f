/// API client with single-flight token refresh
///
/// Every outbound call to the backend goes through this client. It
/// attaches the current access token to protected requests and, on an
/// authorization failure, coordinates exactly one refresh exchange no
/// matter how many requests are in flight: the first un-retried request
/// to observe a 401 performs the exchange, every later observer parks
/// on the pending queue and is settled from that same exchange's
/// outcome. Each request is retried at most once.
///
/// The refresh token itself lives in the reqwest cookie jar and is never
/// read by this code.

use std::fmt;
use std::sync::{Arc, Mutex};

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

/// Paths that are reachable without an access token. They never receive
/// a bearer header, and a 401 from them never triggers refresh
/// coordination - the refresh endpoint refreshing itself would loop
/// forever.
const PUBLIC_ROUTES: [&str; 3] = ["/auth/login", "/auth/register", "/auth/refresh"];

fn is_public(path: &str) -> bool {
    PUBLIC_ROUTES.iter().any(|route| path.starts_with(route))
}

/// Failure modes surfaced to callers. Refresh-triggered retries are
/// invisible; a caller only ever sees the final outcome.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// The backend answered with a non-success status.
    Status { status: u16, message: String },
    /// Transport-level failure; never triggers refresh coordination.
    Network(String),
    /// The coordinated refresh exchange failed; local credentials are
    /// purged and a fresh login is required.
    SessionExpired(String),
}

impl ApiError {
    /// The HTTP status carried by a backend failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Status { status, message } => write!(f, "{} ({})", message, status),
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::SessionExpired(msg) => write!(f, "Session expired: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Public user record returned by the session endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    user: SessionUser,
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    access_token: String,
}

/// Per-client session state. The lock is only ever held for plain
/// field access, never across an await; ordering across suspension
/// points is carried by the oneshot channels in `pending`.
struct SessionState {
    access_token: Option<String>,
    /// True while the one refresh exchange is in flight.
    refreshing: bool,
    /// Requests that hit a 401 while `refreshing`; each sender is
    /// completed exactly once when the exchange settles, in order.
    pending: Vec<oneshot::Sender<Result<String, ApiError>>>,
}

type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    state: Arc<Mutex<SessionState>>,
    on_session_expired: Arc<Mutex<Option<SessionExpiredHook>>>,
}

impl ApiClient {
    /// Build a client for the given backend. The cookie store holds the
    /// HttpOnly refresh cookie across calls.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            state: Arc::new(Mutex::new(SessionState {
                access_token: None,
                refreshing: false,
                pending: Vec::new(),
            })),
            on_session_expired: Arc::new(Mutex::new(None)),
        })
    }

    /// Register a hook invoked when a refresh exchange fails and the
    /// session is irrecoverably over - the place to route the user back
    /// to the login screen.
    pub fn on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_session_expired.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.lock().unwrap().access_token.clone()
    }

    /// Store an access token, e.g. one restored from a previous session.
    pub fn set_access_token(&self, token: impl Into<String>) {
        self.state.lock().unwrap().access_token = Some(token.into());
    }

    pub fn clear_access_token(&self) {
        self.state.lock().unwrap().access_token = None;
    }

    /// Log in and store the returned access token. The refresh cookie
    /// lands in the jar as a side effect of the response.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, ApiError> {
        let body: SessionBody = self
            .post(
                "/auth/login",
                &serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        self.set_access_token(body.access_token);
        Ok(body.user)
    }

    /// Register a new account and store the returned access token.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionUser, ApiError> {
        let body: SessionBody = self
            .post(
                "/auth/register",
                &serde_json::json!({ "name": name, "email": email, "password": password }),
            )
            .await?;
        self.set_access_token(body.access_token);
        Ok(body.user)
    }

    /// Log out: ask the server to clear the refresh cookie and drop the
    /// local access token regardless of the outcome.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result: Result<Value, ApiError> = self.call(Method::POST, "/auth/logout", None).await;
        self.clear_access_token();
        result.map(|_| ())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        self.call(Method::POST, path, Some(to_value(body)?)).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        self.call(Method::PUT, path, Some(to_value(body)?)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(Method::DELETE, path, None).await
    }

    /// Dispatch a request. Protected paths carry the stored access
    /// token; a 401 from them triggers the coordinated refresh and one
    /// transparent retry. Public paths get neither.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let public = is_public(path);
        let token = if public { None } else { self.access_token() };

        let response = self.execute(method.clone(), path, body.as_ref(), token).await?;

        if response.status() == StatusCode::UNAUTHORIZED && !public {
            let fresh = self.refresh_access_token().await?;
            // At most one retry: a 401 on this second attempt surfaces
            // as-is instead of re-entering refresh.
            let retried = self.execute(method, path, body.as_ref(), Some(fresh)).await?;
            return decode(retried).await;
        }

        decode(response).await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<String>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    /// Obtain a fresh access token through the single in-flight refresh
    /// exchange, joining one if it is already underway.
    async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let waiter = {
            let mut state = self.state.lock().unwrap();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.pending.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            return rx.await.map_err(|_| {
                ApiError::SessionExpired("Refresh exchange was dropped".to_string())
            })?;
        }

        // This request flipped the refreshing flag and its exchange is
        // authoritative for everything queued behind it.
        let outcome = self.exchange_refresh_token().await;

        // The flag is cleared no matter how the exchange went; drain the
        // queue with its outcome before anything else can run.
        let pending = {
            let mut state = self.state.lock().unwrap();
            state.refreshing = false;
            match &outcome {
                Ok(token) => state.access_token = Some(token.clone()),
                Err(_) => state.access_token = None,
            }
            std::mem::take(&mut state.pending)
        };
        for tx in pending {
            let _ = tx.send(outcome.clone());
        }

        if outcome.is_err() {
            self.notify_session_expired();
        }

        outcome
    }

    /// POST /auth/refresh. The cookie jar supplies the refresh token;
    /// no bearer header is attached.
    async fn exchange_refresh_token(&self) -> Result<String, ApiError> {
        let url = format!("{}/auth/refresh", self.base_url);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| ApiError::SessionExpired(format!("Refresh exchange failed: {}", e)))?;

        if !response.status().is_success() {
            tracing::warn!(status = response.status().as_u16(), "Refresh exchange rejected");
            return Err(ApiError::SessionExpired("Invalid refresh token".to_string()));
        }

        let body: RefreshBody = response.json().await.map_err(|e| {
            ApiError::SessionExpired(format!("Malformed refresh response: {}", e))
        })?;

        tracing::debug!("Access token refreshed");
        Ok(body.access_token)
    }

    fn notify_session_expired(&self) {
        let hook = self.on_session_expired.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

fn to_value(body: &impl Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::Network(format!("Failed to serialize request body: {}", e)))
}

/// Map a settled response into the tagged result callers see: the
/// decoded body on success, `{status, message}` on failure.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Network(format!("Malformed response body: {}", e)));
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| "An error occurred".to_string());

    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_route_allow_list_is_fixed() {
        assert!(is_public("/auth/login"));
        assert!(is_public("/auth/register"));
        assert!(is_public("/auth/refresh"));

        assert!(!is_public("/auth/me"));
        assert!(!is_public("/auth/logout"));
        assert!(!is_public("/tasks"));
        assert!(!is_public("/tasks/some-id"));
    }

    #[test]
    fn access_token_storage_roundtrips() {
        let client = ApiClient::new("http://127.0.0.1:0").unwrap();
        assert!(client.access_token().is_none());

        client.set_access_token("abc");
        assert_eq!(client.access_token().as_deref(), Some("abc"));

        client.clear_access_token();
        assert!(client.access_token().is_none());
    }

    #[test]
    fn api_error_exposes_status() {
        let err = ApiError::Status {
            status: 403,
            message: "Forbidden".to_string(),
        };
        assert_eq!(err.status(), Some(403));
        assert!(ApiError::Network("refused".to_string()).status().is_none());
    }
}
