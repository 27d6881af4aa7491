//! Login and sessions backed by a local credentials file.
//!
//! The credentials file is YAML: a cookie block (name/key/expiry) and a map
//! of users with salted PBKDF2-HMAC-SHA256 password hashes, a role, and an
//! access scope. Sessions are UUID bearer tokens held in server state and
//! expire after the cookie's configured number of days.

use crate::error::{OpsError, OpsResult};
use crate::types::{AccessScope, Role};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use uuid::Uuid;

const PBKDF2_ITERATIONS: u32 = 100_000;

//==============================================================================
// Credentials file
//==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub key: String,
    pub expiry_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    /// Display name, e.g. "Téa Phillips".
    pub name: String,
    /// `base64(salt)$base64(derived key)`.
    pub password_hash: String,
    pub role: Role,
    #[serde(default = "default_scope")]
    pub scope: AccessScope,
}

fn default_scope() -> AccessScope {
    AccessScope::Own
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsFile {
    pub cookie: CookieConfig,
    pub users: BTreeMap<String, UserEntry>,
}

impl CredentialsFile {
    pub fn load<P: AsRef<Path>>(path: P) -> OpsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Verify a username/password pair. Unknown user and wrong password are
    /// indistinguishable to the caller.
    pub fn verify(&self, username: &str, password: &str) -> OpsResult<&UserEntry> {
        let user = self
            .users
            .get(username)
            .ok_or_else(|| OpsError::Auth("username or password is incorrect".to_string()))?;
        if !verify_password(password, &user.password_hash) {
            return Err(OpsError::Auth(
                "username or password is incorrect".to_string(),
            ));
        }
        Ok(user)
    }
}

//==============================================================================
// Password hashing
//==============================================================================

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = *Uuid::new_v4().as_bytes();
    let key = derive_key(password, &salt);
    format!("{}${}", B64.encode(salt), B64.encode(key))
}

/// Check a password against a stored `salt$hash` pair. Malformed stored
/// values verify as false rather than erroring.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, key_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (B64.decode(salt_b64), B64.decode(key_b64)) else {
        return false;
    };
    let derived = derive_key(password, &salt);
    // Length first so a truncated hash can't match.
    expected.len() == derived.len() && expected == derived
}

//==============================================================================
// Sessions
//==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub scope: AccessScope,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a verified user.
    pub fn login(&mut self, username: &str, user: &UserEntry, expiry_days: i64) -> Session {
        let session = Session {
            token: Uuid::new_v4().to_string(),
            username: username.to_string(),
            name: user.name.clone(),
            role: user.role,
            scope: user.scope.clone(),
            expires_at: Utc::now() + Duration::days(expiry_days),
        };
        self.sessions
            .insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a live session. Expired tokens are dropped on access.
    pub fn get(&mut self, token: &str) -> Option<Session> {
        match self.sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Some(session.clone()),
            Some(_) => {
                self.sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn logout(&mut self, token: &str) {
        self.sessions.remove(token);
    }
}
