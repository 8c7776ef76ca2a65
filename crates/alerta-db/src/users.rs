use std::collections::HashMap;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use alerta_types::models::{CredentialKind, Role, User};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::UserRecord;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("phone already registered")]
    DuplicatePhone,
    #[error("national id already registered")]
    DuplicateNationalId,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("identity store lock poisoned")]
    LockPoisoned,
}

/// Profile fields supplied at registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub phone: String,
    pub national_id: String,
    pub display_name: String,
}

impl NewUser {
    fn trimmed(self) -> Self {
        Self {
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            national_id: self.national_id.trim().to_string(),
            display_name: self.display_name.trim().to_string(),
        }
    }

    fn check_required(&self, raw_password: &str) -> Result<(), IdentityError> {
        let fields = [
            ("email", self.email.as_str()),
            ("phone", self.phone.as_str()),
            ("national_id", self.national_id.as_str()),
            ("display_name", self.display_name.as_str()),
            ("password", raw_password),
        ];
        match fields.iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(IdentityError::MissingField(*name)),
            None => Ok(()),
        }
    }
}

/// Account registry with unique email, phone and national id.
pub struct IdentityStore {
    users: RwLock<Vec<UserRecord>>,
    /// Verified against when a login names no account, so a miss costs the
    /// same Argon2 work as a wrong password.
    decoy_hash: OnceLock<String>,
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            decoy_hash: OnceLock::new(),
        }
    }

    fn decoy_hash(&self) -> &str {
        self.decoy_hash.get_or_init(|| {
            hash_password(&Uuid::new_v4().to_string()).unwrap_or_else(|e| {
                warn!("Cannot build decoy password hash: {}", e);
                String::new()
            })
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<UserRecord>>, IdentityError> {
        self.users.read().map_err(|_| IdentityError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<UserRecord>>, IdentityError> {
        self.users.write().map_err(|_| IdentityError::LockPoisoned)
    }

    /// Register a citizen account. The role is always `citizen`.
    ///
    /// Uniqueness is checked email, then phone, then national id; the first
    /// collision is reported.
    pub fn register(&self, profile: NewUser, raw_password: &str) -> Result<User, IdentityError> {
        self.insert(profile, raw_password, Role::Citizen)
    }

    /// Create an account with an explicit role. Only used for startup
    /// seeding; never reachable from the HTTP surface.
    pub fn seed(&self, profile: NewUser, raw_password: &str, role: Role) -> Result<User, IdentityError> {
        self.insert(profile, raw_password, role)
    }

    fn insert(&self, profile: NewUser, raw_password: &str, role: Role) -> Result<User, IdentityError> {
        let profile = profile.trimmed();
        profile.check_required(raw_password)?;

        // Hash before taking the lock; Argon2 is deliberately slow.
        let password_hash = hash_password(raw_password)?;
        let email_key = profile.email.to_lowercase();

        let mut users = self.write()?;
        if users.iter().any(|r| r.email_key == email_key) {
            return Err(IdentityError::DuplicateEmail);
        }
        if users.iter().any(|r| r.user.phone == profile.phone) {
            return Err(IdentityError::DuplicatePhone);
        }
        if users.iter().any(|r| r.user.national_id == profile.national_id) {
            return Err(IdentityError::DuplicateNationalId);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: profile.email,
            phone: profile.phone,
            national_id: profile.national_id,
            role,
            display_name: profile.display_name,
            created_at: chrono::Utc::now(),
        };
        users.push(UserRecord {
            user: user.clone(),
            email_key,
            password_hash,
        });

        info!("Registered {} account {} ({})", role, user.id, user.display_name);
        Ok(user)
    }

    /// Look up by email (case-insensitive) or phone (exact).
    pub fn find_by_credential(
        &self,
        value: &str,
        kind: CredentialKind,
    ) -> Result<Option<User>, IdentityError> {
        Ok(self.find_record(value, kind)?.map(|r| r.user))
    }

    fn find_record(
        &self,
        value: &str,
        kind: CredentialKind,
    ) -> Result<Option<UserRecord>, IdentityError> {
        let value = value.trim();
        let users = self.read()?;
        let found = match kind {
            CredentialKind::Email => {
                let key = value.to_lowercase();
                users.iter().find(|r| r.email_key == key)
            }
            CredentialKind::Phone => users.iter().find(|r| r.user.phone == value),
        };
        Ok(found.cloned())
    }

    /// Resolve a login: the account behind `value` if `raw_password`
    /// matches it.
    ///
    /// An unknown credential is still run through Argon2 against a decoy
    /// hash, so a miss and a wrong password take the same time.
    pub fn authenticate(
        &self,
        value: &str,
        kind: CredentialKind,
        raw_password: &str,
    ) -> Result<Option<User>, IdentityError> {
        match self.find_record(value, kind)? {
            Some(record) => {
                let ok = check_password(&record.password_hash, raw_password).map_err(|e| {
                    warn!("Corrupt password hash for user {}: {}", record.user.id, e);
                    e
                })?;
                Ok(ok.then_some(record.user))
            }
            None => {
                let _ = check_password(self.decoy_hash(), raw_password);
                Ok(None)
            }
        }
    }

    /// Check a raw password against the stored hash for `user`.
    /// An unknown user never verifies.
    pub fn verify(&self, user: &User, raw_password: &str) -> Result<bool, IdentityError> {
        let password_hash = {
            let users = self.read()?;
            match users.iter().find(|r| r.user.id == user.id) {
                Some(record) => record.password_hash.clone(),
                None => return Ok(false),
            }
        };

        check_password(&password_hash, raw_password).map_err(|e| {
            warn!("Corrupt password hash for user {}: {}", user.id, e);
            e
        })
    }

    pub fn get(&self, id: Uuid) -> Result<Option<User>, IdentityError> {
        let users = self.read()?;
        Ok(users.iter().find(|r| r.user.id == id).map(|r| r.user.clone()))
    }

    pub fn display_name(&self, id: Uuid) -> Result<Option<String>, IdentityError> {
        let users = self.read()?;
        Ok(users
            .iter()
            .find(|r| r.user.id == id)
            .map(|r| r.user.display_name.clone()))
    }

    /// Snapshot of id -> display name, for enriching report listings in one
    /// lock acquisition.
    pub fn display_names(&self) -> Result<HashMap<Uuid, String>, IdentityError> {
        let users = self.read()?;
        Ok(users
            .iter()
            .map(|r| (r.user.id, r.user.display_name.clone()))
            .collect())
    }

    pub fn len(&self) -> Result<usize, IdentityError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, IdentityError> {
        Ok(self.read()?.is_empty())
    }
}

fn hash_password(raw_password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(raw_password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IdentityError::Hash(e.to_string()))
}

/// `Err` only when `password_hash` is not a PHC string.
fn check_password(password_hash: &str, raw_password: &str) -> Result<bool, IdentityError> {
    let parsed =
        PasswordHash::new(password_hash).map_err(|e| IdentityError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(raw_password.as_bytes(), &parsed)
        .is_ok())
}
