use serde::{Deserialize, Serialize};

/// Profile of the signed-in user as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "rol", default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "estudiante".to_string()
}

impl UserProfile {
    /// First word of the name, for greetings
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    #[serde(rename = "nombre")]
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    usuario: Option<UserProfile>,
    #[serde(default)]
    user: Option<UserProfile>,
}

impl LoginResponse {
    /// The profile, preferring `usuario` and falling back to `user`.
    pub fn into_profile(self) -> Option<(String, UserProfile)> {
        let profile = self.usuario.or(self.user)?;
        Some((self.access_token, profile))
    }
}
