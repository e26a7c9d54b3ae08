use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tracing::{info, warn};

use super::dispatcher::Dispatcher;
use super::responses::{SyncResponse, TokenData};
use crate::core::{AuthFailure, MoadianError, Packet, PacketType, Token};

/// Where the client stands with the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenStatus {
    /// No token has ever been obtained.
    Unauthenticated,
    /// A handshake is running.
    Authenticating,
    Authenticated,
    /// The last token was refused; a new handshake is needed.
    Invalidated,
}

#[derive(Debug)]
enum TokenState {
    Unauthenticated,
    Authenticating,
    Authenticated(Arc<Token>),
    Invalidated,
}

/// Resets an unwinding handshake to `Unauthenticated`; the locks do not
/// poison, so nothing else would.
struct PendingHandshake<'a> {
    state: &'a RwLock<TokenState>,
    settled: bool,
}

impl Drop for PendingHandshake<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *self.state.write() = TokenState::Unauthenticated;
            warn!("token handshake aborted");
        }
    }
}

/// Owns the bearer token and its lifecycle.
///
/// Readers take a cheap shared lock and clone an `Arc`. Handshakes are
/// serialized on a separate mutex so a slow handshake never blocks readers
/// for longer than a state swap.
#[derive(Debug)]
pub struct TokenManager {
    state: RwLock<TokenState>,
    handshake: Mutex<()>,
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TokenState::Unauthenticated),
            handshake: Mutex::new(()),
        }
    }

    pub fn status(&self) -> TokenStatus {
        match &*self.state.read() {
            TokenState::Unauthenticated => TokenStatus::Unauthenticated,
            TokenState::Authenticating => TokenStatus::Authenticating,
            TokenState::Authenticated(_) => TokenStatus::Authenticated,
            TokenState::Invalidated => TokenStatus::Invalidated,
        }
    }

    /// The token to attach to a privileged call.
    pub fn current_token(&self) -> Result<Arc<Token>, MoadianError> {
        match &*self.state.read() {
            TokenState::Authenticated(token) => Ok(Arc::clone(token)),
            TokenState::Authenticating => Err(AuthFailure::InProgress.into()),
            TokenState::Unauthenticated | TokenState::Invalidated => {
                Err(AuthFailure::TokenNotSet.into())
            }
        }
    }

    /// Run the GET_TOKEN handshake through `dispatcher`.
    pub fn authenticate(&self, dispatcher: &Dispatcher) -> Result<Arc<Token>, MoadianError> {
        self.authenticate_with(|| request_token(dispatcher))
    }

    /// Run `handshake` as the one in-flight authentication.
    ///
    /// Any failure, a panic included, leaves the manager `Unauthenticated`.
    /// Errors surface as an authentication error.
    pub fn authenticate_with(
        &self,
        handshake: impl FnOnce() -> Result<Token, MoadianError>,
    ) -> Result<Arc<Token>, MoadianError> {
        let _exclusive = self.handshake.lock();
        *self.state.write() = TokenState::Authenticating;
        let mut pending = PendingHandshake {
            state: &self.state,
            settled: false,
        };

        let result = handshake();
        pending.settled = true;
        match result {
            Ok(token) => {
                let token = Arc::new(token);
                *self.state.write() = TokenState::Authenticated(Arc::clone(&token));
                info!(issued_at = %token.issued_at(), "token obtained");
                Ok(token)
            }
            Err(err) => {
                *self.state.write() = TokenState::Unauthenticated;
                warn!(error = %err, "token handshake failed");
                Err(into_handshake_failure(err))
            }
        }
    }

    /// Adopt a token obtained elsewhere, replacing any current one.
    pub fn adopt(&self, token: Token) -> Arc<Token> {
        let token = Arc::new(token);
        *self.state.write() = TokenState::Authenticated(Arc::clone(&token));
        token
    }

    /// Mark `refused` as no longer valid.
    ///
    /// A no-op if the current token is a different one, so a late failure
    /// never discards a token that was refreshed in the meantime.
    pub fn invalidate(&self, refused: &Arc<Token>) {
        let mut state = self.state.write();
        let is_current = matches!(
            &*state,
            TokenState::Authenticated(current) if Arc::ptr_eq(current, refused)
        );
        if is_current {
            *state = TokenState::Invalidated;
            warn!("token invalidated by the authority");
        }
    }
}

fn request_token(dispatcher: &Dispatcher) -> Result<Token, MoadianError> {
    let packet = Packet::control(
        PacketType::GetToken,
        &json!({ "username": dispatcher.fiscal_id() }),
    )?;
    let response: SyncResponse<TokenData> =
        dispatcher.handshake(&dispatcher.config().paths.token, &packet)?;

    let value = response.result.data.token;
    if value.trim().is_empty() {
        return Err(MoadianError::Response("authority returned an empty token".into()));
    }
    Ok(Token::new(value))
}

fn into_handshake_failure(err: MoadianError) -> MoadianError {
    match err {
        MoadianError::Authentication(_) => err,
        other => {
            let retryable = other.is_retryable();
            AuthFailure::Handshake {
                message: other.to_string(),
                retryable,
            }
            .into()
        }
    }
}
