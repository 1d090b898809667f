//! HTTP client façade for the Bookshelf API.
//!
//! Every outgoing call in the application funnels through `ApiClient`.
//! Before a request is sent it resolves the effective host (persisted
//! override, else the configured default), attaches the stored bearer
//! credential when one exists, and enforces a fixed timeout. Every response
//! passes through `check_response`: a 401 discards the credential and forces
//! the session to `Unauthenticated` before the error reaches the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::credentials::CredentialStore;
use crate::auth::session::StateCell;
use crate::models::User;

use super::ApiError;

/// HTTP request timeout in seconds.
/// 5s fails fast enough that a dead server doesn't freeze the UI.
const REQUEST_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct AuthStatusResponse {
    #[serde(rename = "isAuthenticated")]
    is_authenticated: bool,
}

/// API client for the Bookshelf backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    default_base_url: String,
    store: Arc<CredentialStore>,
    session: Arc<StateCell>,
}

impl ApiClient {
    pub(crate) fn new(
        default_base_url: String,
        store: Arc<CredentialStore>,
        session: Arc<StateCell>,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(
            default_base_url,
            store,
            session,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    pub(crate) fn with_timeout(
        default_base_url: String,
        store: Arc<CredentialStore>,
        session: Arc<StateCell>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            client,
            default_base_url,
            store,
            session,
        })
    }

    // ===== Auth endpoints =====

    /// Exchange credentials for a bearer token. Persisting the token and
    /// flipping the session state is the session manager's job.
    pub(crate) async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        debug!("submitting credentials");
        let body = serde_json::json!({ "email": email, "password": password });
        let req = self.prepare(Method::POST, "/auth/login").await.json(&body);
        let response = self.execute(req).await?;
        response.json().await.map_err(ApiError::from)
    }

    /// Create a new account. Does not authenticate.
    pub(crate) async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
        let req = self.prepare(Method::POST, "/usuarios").await.json(&body);
        let response = self.execute(req).await?;
        response.json().await.map_err(ApiError::from)
    }

    /// Session probe: 200 means the server considers us logged in.
    pub(crate) async fn me(&self) -> Result<(), ApiError> {
        let req = self.prepare(Method::GET, "/me").await;
        self.execute(req).await?;
        Ok(())
    }

    /// Lightweight auth check returning the server's boolean verdict.
    pub(crate) async fn auth_status(&self) -> Result<bool, ApiError> {
        let req = self.prepare(Method::GET, "/auth/status").await;
        let response = self.execute(req).await?;
        let status: AuthStatusResponse = response.json().await.map_err(ApiError::from)?;
        Ok(status.is_authenticated)
    }

    /// Reachability check against a candidate host, used by the configuration
    /// screen before a new host override is persisted. Talks to the candidate
    /// directly: no stored override, no credential, and no 401 side effects -
    /// a misconfigured host must not sign the user out.
    pub async fn ping(&self, host: &str) -> Result<(), ApiError> {
        let url = format!("{}/auth/ping", host.trim().trim_end_matches('/'));
        let response = self.client.get(url).send().await.map_err(ApiError::from)?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    // ===== Generic JSON helpers for the CRUD screens =====

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let req = self.prepare(Method::GET, path).await;
        let response = self.execute(req).await?;
        response.json().await.map_err(ApiError::from)
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let req = self.prepare(Method::POST, path).await.json(body);
        let response = self.execute(req).await?;
        response.json().await.map_err(ApiError::from)
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let req = self.prepare(Method::PUT, path).await.json(body);
        let response = self.execute(req).await?;
        response.json().await.map_err(ApiError::from)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let req = self.prepare(Method::DELETE, path).await;
        self.execute(req).await?;
        Ok(())
    }

    // ===== Request pipeline =====

    /// Effective origin for the next request: persisted override if present,
    /// else the configured default. A failed read falls back to the default.
    async fn base_url(&self) -> String {
        match self.store.host_override().await {
            Ok(Some(host)) if !host.trim().is_empty() => {
                host.trim().trim_end_matches('/').to_string()
            }
            Ok(_) => self.default_base_url.clone(),
            Err(e) => {
                warn!(error = %e, "host override read failed, using default origin");
                self.default_base_url.clone()
            }
        }
    }

    /// Outbound interception: resolve host and attach the bearer credential.
    async fn prepare(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url().await, path);
        let mut req = self.client.request(method, url);
        match self.store.access_token().await {
            Ok(Some(token)) => req = req.bearer_auth(token),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "credential read failed, sending request unauthenticated");
            }
        }
        req
    }

    async fn execute(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let response = req.send().await.map_err(ApiError::from)?;
        self.check_response(response).await
    }

    /// Inbound interception. A 401 means the credential was invalidated
    /// server-side: drop it, force the session out, and re-raise. Callers
    /// must not assume recovery.
    async fn check_response(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("server rejected credential, signing out");
            if let Err(e) = self.store.clear_access_token().await {
                warn!(error = %e, "failed to discard rejected credential");
            }
            self.session.force_unauthenticated();
            return Err(ApiError::Unauthorized);
        }
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionState;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server_url: &str) -> (ApiClient, Arc<CredentialStore>, Arc<StateCell>) {
        let store = Arc::new(CredentialStore::in_memory());
        let session = Arc::new(StateCell::new());
        let client = ApiClient::new(server_url.to_string(), store.clone(), session.clone())
            .expect("build client");
        (client, store, session)
    }

    #[tokio::test]
    async fn test_bearer_credential_attached_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/books"))
            .and(header("authorization", "Bearer tok123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client_for(&server.uri());
        store.set_access_token("tok123").await.unwrap();

        let books: Vec<serde_json::Value> = client.get_json("/books").await.expect("get books");
        assert!(books.is_empty());
    }

    #[tokio::test]
    async fn test_host_override_redirects_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        // Default origin points nowhere; the override must win.
        let (client, store, _) = client_for("http://127.0.0.1:1");
        store
            .set_host_override(&format!("{}/", server.uri()))
            .await
            .unwrap();

        client.me().await.expect("probe via override");
    }

    #[tokio::test]
    async fn test_unauthorized_clears_credential_and_forces_sign_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/books"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (client, store, session) = client_for(&server.uri());
        store.set_access_token("stale").await.unwrap();

        let result: Result<Vec<serde_json::Value>, _> = client.get_json("/books").await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert!(store.access_token().await.unwrap().is_none());
        assert_eq!(session.snapshot(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_parses_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(serde_json::json!({
                "email": "user@example.com",
                "password": "secret1"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "tok123" })),
            )
            .mount(&server)
            .await;

        let (client, _, _) = client_for(&server.uri());
        let resp = client.login("user@example.com", "secret1").await.unwrap();
        assert_eq!(resp.access_token, "tok123");
    }

    #[tokio::test]
    async fn test_login_validation_error_surfaces_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "message": ["email invalid"] })),
            )
            .mount(&server)
            .await;

        let (client, _, _) = client_for(&server.uri());
        let err = client.login("bad", "short").await.unwrap_err();
        assert!(matches!(&err, ApiError::Validation(m) if m == "email invalid"));
    }

    #[tokio::test]
    async fn test_auth_status_parses_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "isAuthenticated": false })),
            )
            .mount(&server)
            .await;

        let (client, _, _) = client_for(&server.uri());
        assert!(!client.auth_status().await.unwrap());
    }

    #[tokio::test]
    async fn test_slow_response_surfaces_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::in_memory());
        let session = Arc::new(StateCell::new());
        let client = ApiClient::with_timeout(
            server.uri(),
            store,
            session,
            Duration::from_millis(100),
        )
        .expect("build client");

        let err = client.me().await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_ping_does_not_sign_out_on_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/ping"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (client, store, session) = client_for(&server.uri());
        store.set_access_token("tok123").await.unwrap();

        assert!(client.ping(&server.uri()).await.is_err());
        // Candidate-host probing must leave the session alone
        assert_eq!(store.access_token().await.unwrap().as_deref(), Some("tok123"));
        assert_eq!(session.snapshot(), SessionState::Loading);
    }
}
