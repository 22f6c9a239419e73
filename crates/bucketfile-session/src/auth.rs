//! Login input validation and the credential storage interface.
//!
//! Where credentials are persisted is up to the embedding application; it
//! supplies a [`CredentialStore`]. [`MemoryCredentialStore`] keeps them for
//! the life of the process.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use bucketfile_core::{BucketError, BucketResult};

/// Region used when none is given.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Shortest plausible access key id.
pub const MIN_ACCESS_KEY_LEN: usize = 16;

/// Shortest plausible secret access key.
pub const MIN_SECRET_KEY_LEN: usize = 40;

/// Access key pair for an S3-compatible store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// What a credential store remembers between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLogin {
    pub credentials: Credentials,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Input of a login attempt.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub credentials: Credentials,
    pub bucket: String,
    pub region: String,
    /// Persist the login for the next run.
    pub remember: bool,
}

/// Persistence for a remembered login.
pub trait CredentialStore: Send + Sync {
    /// Load the remembered login. `Err` means stored state is unreadable.
    fn load(&self) -> BucketResult<Option<StoredLogin>>;

    /// Remember a login, replacing any previous one.
    fn save(&self, login: &StoredLogin) -> BucketResult<()>;

    /// Forget the remembered login.
    fn clear(&self);
}

/// Check that a key pair is plausible before any request is made.
pub fn validate_credentials(credentials: &Credentials) -> BucketResult<()> {
    let invalid = |message: &str| BucketError::InvalidCredentials {
        message: message.to_string(),
    };

    if credentials.access_key_id.trim().is_empty() {
        return Err(invalid("Access key ID cannot be empty"));
    }
    if credentials.secret_access_key.trim().is_empty() {
        return Err(invalid("Secret access key cannot be empty"));
    }
    if credentials.access_key_id.len() < MIN_ACCESS_KEY_LEN {
        return Err(invalid("Access key ID is too short"));
    }
    if credentials.secret_access_key.len() < MIN_SECRET_KEY_LEN {
        return Err(invalid("Secret access key is too short"));
    }
    Ok(())
}

/// Check a bucket name against the S3 naming rules.
pub fn validate_bucket_name(name: &str) -> BucketResult<()> {
    let reject = |reason: &str| BucketError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(reject("Please enter a bucket name"));
    }
    if !(3..=63).contains(&name.len()) {
        return Err(reject("Bucket names must be 3 to 63 characters long"));
    }

    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let edges_ok = name.starts_with(allowed) && name.ends_with(allowed);
    if !edges_ok || !name.chars().all(|c| allowed(c) || c == '-') {
        return Err(reject(
            "Use lowercase letters, digits, and hyphens, starting and ending with a letter or digit",
        ));
    }
    if name.contains("..") {
        return Err(reject("Bucket names cannot contain '..'"));
    }
    if name.starts_with("xn--") {
        return Err(reject("Bucket names cannot start with 'xn--'"));
    }
    if name.ends_with("-s3alias") {
        return Err(reject("Bucket names cannot end with '-s3alias'"));
    }
    Ok(())
}

/// Validate a login and remember it or forget any previous one.
///
/// A blank region falls back to [`DEFAULT_REGION`].
pub fn login(store: &dyn CredentialStore, request: LoginRequest) -> BucketResult<StoredLogin> {
    validate_credentials(&request.credentials)?;
    validate_bucket_name(&request.bucket)?;

    let region = match request.region.trim() {
        "" => DEFAULT_REGION.to_string(),
        region => region.to_string(),
    };
    let login = StoredLogin {
        credentials: request.credentials,
        bucket: Some(request.bucket),
        region: Some(region),
    };

    if request.remember {
        store.save(&login)?;
    } else {
        store.clear();
    }
    tracing::info!(bucket = ?login.bucket, remembered = request.remember, "logged in");
    Ok(login)
}

/// Log in again from a remembered login, if there is one.
///
/// Unreadable stored state is cleared and treated as no login.
pub fn restore(store: &dyn CredentialStore) -> Option<StoredLogin> {
    match store.load() {
        Ok(Some(mut login)) => {
            if login.region.as_deref().is_none_or(|r| r.trim().is_empty()) {
                login.region = Some(DEFAULT_REGION.to_string());
            }
            Some(login)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e.detailed(), "stored login unreadable, clearing");
            store.clear();
            None
        }
    }
}

/// Forget the remembered login.
pub fn logout(store: &dyn CredentialStore) {
    store.clear();
    tracing::info!("logged out");
}

/// Credential store held in process memory.
///
/// Logins are kept serialized so unreadable state behaves the same way it
/// would from disk.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with raw serialized state.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    /// Check if anything is remembered.
    pub fn is_empty(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> BucketResult<Option<StoredLogin>> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_deref()
            .map(|raw| {
                toml::from_str(raw).map_err(|e| BucketError::InvalidCredentials {
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    fn save(&self, login: &StoredLogin) -> BucketResult<()> {
        let raw = toml::to_string(login).map_err(|e| BucketError::InvalidCredentials {
            message: e.to_string(),
        })?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
