use serde::{Deserialize, Serialize};
use crate::pii::Masked;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    /// Name shown in conversation lists; falls back to the email.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or(&self.email)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role.as_deref(), Some("ADMIN") | Some("SUPER_ADMIN"))
    }
}

/// Response of `/api/auth/signin` and `/api/auth/signup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: Masked<String>,
    pub user: User,
}

/// JWT claims as issued by the platform. `sub` carries the email.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default, alias = "userId", alias = "id", alias = "uid")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}
