use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque administrator identity returned by a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPrincipal {
    pub uid: String,
    pub email: String,
}

/// Seam for the identity provider that authenticates administrators.
pub trait IdentityProvider: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<AdminPrincipal, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Administrator account known to [`StaticIdentityProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub email: String,
    /// Lowercase hex SHA-256 digest of the password.
    pub password_sha256: String,
}

/// Identity provider backed by accounts supplied through configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    accounts: Vec<AdminAccount>,
}

impl StaticIdentityProvider {
    pub fn new(accounts: Vec<AdminAccount>) -> Self {
        Self { accounts }
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn digest(value: &str) -> String {
        hex::encode(Sha256::digest(value.as_bytes()))
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn sign_in(&self, email: &str, password: &str) -> Result<AdminPrincipal, IdentityError> {
        let email = email.trim();
        let digest = Self::digest(password);

        let account = self
            .accounts
            .iter()
            .find(|account| {
                account.email.eq_ignore_ascii_case(email)
                    && account.password_sha256.eq_ignore_ascii_case(&digest)
            })
            .ok_or(IdentityError::InvalidCredentials)?;

        let normalized = account.email.to_ascii_lowercase();
        Ok(AdminPrincipal {
            uid: format!("admin-{}", &Self::digest(&normalized)[..12]),
            email: normalized,
        })
    }
}
