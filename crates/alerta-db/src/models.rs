use alerta_types::models::User;

/// Stored account row. Distinct from the `alerta-types` user model so the
/// credential hash never leaves this crate.
#[derive(Clone)]
pub struct UserRecord {
    pub user: User,
    /// Lowercased email used for uniqueness and lookup.
    pub email_key: String,
    /// Argon2id PHC string.
    pub password_hash: String,
}
