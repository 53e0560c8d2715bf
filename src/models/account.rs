use serde::{Deserialize, Serialize};

/// Login identity. The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub telegram_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub telegram_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdate {
    pub full_name: Option<String>,
    pub telegram_id: Option<String>,
    pub is_active: bool,
    /// Replaces the password when present.
    #[serde(default)]
    pub password: Option<String>,
}

/// Stored credentials for login verification.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub id: i64,
    pub password_hash: String,
    pub is_active: bool,
}
