//! Password check and session tokens

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::utils::{sha256_digest, token_prefix};

/// Bytes of entropy per session token
const TOKEN_BYTES: usize = 32;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now = add_saturating(*now, by);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

struct SessionState {
    password: SecretString,
    sessions: HashMap<String, DateTime<Utc>>,
}

/// Issues, validates and revokes bearer tokens.
///
/// The password and the session map share one lock so that a password change
/// and the invalidation of every session happen together.
pub struct SessionStore {
    state: RwLock<SessionState>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(password: SecretString, ttl: Duration) -> Self {
        Self::with_clock(password, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(password: SecretString, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(SessionState {
                password,
                sessions: HashMap::new(),
            }),
            ttl,
            clock,
        }
    }

    /// Lifetime of newly issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Exact match against the current password
    pub async fn validate_password(&self, candidate: &str) -> bool {
        let state = self.state.read().await;
        passwords_match(&state.password, candidate)
    }

    /// Create a new session token valid for the configured lifetime
    pub async fn issue_token(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AppError::Internal(format!("entropy source failed: {}", e)))?;
        let token = URL_SAFE.encode(bytes);

        let expires_at = add_saturating(self.clock.now(), self.ttl);
        self.state
            .write()
            .await
            .sessions
            .insert(token.clone(), expires_at);

        debug!("Issued session {}... (expires {})", token_prefix(&token), expires_at);
        Ok(token)
    }

    /// True while the token is known and unexpired. Does not extend it.
    pub async fn validate_token(&self, token: &str) -> bool {
        let now = self.clock.now();
        let state = self.state.read().await;
        state
            .sessions
            .get(token)
            .is_some_and(|expires_at| now < *expires_at)
    }

    pub async fn revoke_token(&self, token: &str) {
        if self.state.write().await.sessions.remove(token).is_some() {
            debug!("Revoked session {}...", token_prefix(token));
        }
    }

    /// Replace the password and end every session, if `old` is correct
    pub async fn change_password(&self, old: &str, new: &str) -> bool {
        let mut state = self.state.write().await;
        if !passwords_match(&state.password, old) {
            return false;
        }

        state.password = SecretString::from(new.to_string());
        let ended = state.sessions.len();
        state.sessions.clear();

        info!("Password changed, {} session(s) ended", ended);
        true
    }

    /// Drop expired sessions, returning how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, expires_at| *expires_at > now);
        before - state.sessions.len()
    }

    /// Number of recorded sessions, expired or not
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

fn add_saturating(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|by| at.checked_add_signed(by))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn passwords_match(password: &SecretString, candidate: &str) -> bool {
    sha256_digest(password.expose_secret().as_bytes()) == sha256_digest(candidate.as_bytes())
}
