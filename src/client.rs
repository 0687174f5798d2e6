//! Request pipeline — bearer injection, 401 classification, bounded refresh.
//!
//! PROTOCOL
//! ========
//! Outbound, every request carries the session's current access token when
//! one exists. Inbound, a 401 is classified by path: the refresh endpoint's
//! own 401 ends the session outright; the login endpoint's 401 is an
//! ordinary credential failure; anything else earns exactly one refresh
//! followed by one replay, tracked in a per-call retry context so
//! independent requests never share retry state.
//!
//! TRADE-OFFS
//! ==========
//! Concurrent 401s gate on one async mutex and adopt a sibling's freshly
//! minted token instead of racing N refreshes against a single refresh
//! token, which some servers rotate-and-revoke on first use.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::ops;
use crate::session::{SessionCell, SessionObserver};
use crate::storage::Storage;
use crate::transport::{HttpTransport, Method, Transport, TransportError, TransportRequest, TransportResponse};
use crate::types::{Envelope, decode_envelope};

const SESSION_EXPIRED: &str = "Session expired";
const NO_REFRESH_TOKEN: &str = "No refresh token available";

/// Per-call retry state. Never shared between requests.
#[derive(Debug, Default)]
struct RetryContext {
    retried: bool,
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP pipeline bound to one session. Construct once and share.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionCell>,
    observer: RwLock<Option<Arc<dyn SessionObserver>>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ApiClient {
    /// Assemble a pipeline from an explicit transport and storage. This is
    /// the seam tests use to substitute a scripted transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, storage: Box<dyn Storage>) -> Self {
        Self {
            transport,
            session: Arc::new(SessionCell::new(storage)),
            observer: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Production constructor: `reqwest` transport from config.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] when the HTTP client cannot
    /// be constructed.
    pub fn connect(config: &ClientConfig, storage: Box<dyn Storage>) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::new(transport, storage))
    }

    pub(crate) fn session_cell(&self) -> &Arc<SessionCell> {
        &self.session
    }

    /// Register the hook fired when the session is forcibly terminated.
    pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
        *self.observer.write().unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    fn notify_expired(&self) {
        let observer = self.observer.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(observer) = observer {
            observer.session_expired();
        }
    }

    // -- pipeline -------------------------------------------------------------

    /// Issue a request through the full protocol: bearer attached outbound,
    /// 401s classified and recovered inbound.
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ApiError`]; see the module docs for the 401
    /// classification rules.
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Envelope, ApiError> {
        let mut ctx = RetryContext::default();
        loop {
            let bearer = self.session.access_token();
            let response = self.execute(method, path, body.clone(), bearer.clone()).await?;

            if response.status == 401 {
                if path == ops::REFRESH_PATH {
                    tracing::warn!("refresh endpoint rejected its token; ending session");
                    self.session.force_logout();
                    self.notify_expired();
                    return Err(ApiError::Auth(SESSION_EXPIRED.into()));
                }
                if path == ops::LOGIN_PATH {
                    return Err(api_error(&response));
                }
                if !ctx.retried {
                    ctx.retried = true;
                    if self.refresh_observed(bearer).await.is_ok() {
                        continue;
                    }
                    self.notify_expired();
                    return Err(ApiError::Auth(SESSION_EXPIRED.into()));
                }
                return Err(api_error(&response));
            }

            return parse_success(response);
        }
    }

    /// Issue a request outside the retry protocol. The refresh exchange
    /// itself goes through here so its failure surfaces to the refresh
    /// driver instead of recursing.
    pub(crate) async fn send_plain(&self, method: Method, path: &str, body: Option<Value>) -> Result<Envelope, ApiError> {
        let bearer = self.session.access_token();
        let response = self.execute(method, path, body, bearer).await?;
        parse_success(response)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        bearer: Option<String>,
    ) -> Result<TransportResponse, ApiError> {
        let request = TransportRequest { method, path: path.to_owned(), bearer, body };
        self.transport.execute(request).await.map_err(|e| {
            tracing::error!(method = method.as_str(), path, error = %e, "transport failure");
            ApiError::Network(e.to_string())
        })
    }

    // -- refresh driver -------------------------------------------------------

    /// Exchange the refresh token for a new pair. Any failure (including a
    /// missing refresh token) ends the session before the error surfaces.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure; the session has been logged out.
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let observed = self.session.access_token();
        self.refresh_observed(observed).await
    }

    /// Single-flight refresh. `observed` is the access token the caller's
    /// failing request carried; if the session holds a different token by
    /// the time the gate opens, a sibling already refreshed and we adopt
    /// its result without touching the network.
    async fn refresh_observed(&self, observed: Option<String>) -> Result<String, ApiError> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.session.access_token() {
            if observed.as_deref() != Some(current.as_str()) {
                tracing::debug!("access token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        match self.drive_refresh().await {
            Ok(token) => Ok(token),
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed; ending session");
                self.session.force_logout();
                Err(e)
            }
        }
    }

    async fn drive_refresh(&self) -> Result<String, ApiError> {
        let Some(refresh_token) = self.session.refresh_token() else {
            return Err(ApiError::Auth(NO_REFRESH_TOKEN.into()));
        };
        tracing::debug!("refreshing access token");
        let pair = ops::refresh(self, &refresh_token).await?;
        self.session.install_tokens(&pair)?;
        tracing::info!("access token refreshed");
        Ok(pair.access)
    }
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Build an API error from a failing response: the envelope's `error`
/// field when present, else a generic status line.
fn api_error(response: &TransportResponse) -> ApiError {
    let message = decode_envelope(&response.body)
        .ok()
        .map(|envelope| envelope.error)
        .filter(|error| !error.is_empty())
        .unwrap_or_else(|| format!("Request failed with status {}", response.status));
    ApiError::Api { status: response.status, message }
}

/// Normalize a non-401 response: non-2xx or an error-bearing envelope is
/// an API error, an undecodable success body is a parse error.
fn parse_success(response: TransportResponse) -> Result<Envelope, ApiError> {
    if !response.is_success() {
        return Err(api_error(&response));
    }
    let envelope = decode_envelope(&response.body)?;
    if !envelope.error.is_empty() {
        return Err(ApiError::Api { status: response.status, message: envelope.error });
    }
    Ok(envelope)
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
