use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Access/refresh token pair issued by the SSO backend.
///
/// Created on login or refresh and always replaced as a whole. Field names
/// follow the backend's login response (`accessToken`, `tokenExpiresAt`, ...).
///
/// # Security
///
/// The `Debug` implementation redacts both tokens.
///
/// # Examples
///
/// ```
/// use core_auth::TokenPair;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let pair = TokenPair {
///     access_token: "eyJhbGciOi...".to_string(),
///     refresh_token: "rt_9f2c...".to_string(),
///     access_expires_at: now + Duration::minutes(15),
///     refresh_expires_at: now + Duration::days(7),
/// };
///
/// assert!(!pair.is_access_expired_at(now));
/// assert!(pair.access_expires_within(now, Duration::minutes(30)));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(rename = "tokenExpiresAt")]
    pub access_expires_at: DateTime<Utc>,
    #[serde(rename = "refreshTokenExpiresAt")]
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn is_access_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.access_expires_at <= now
    }

    pub fn is_refresh_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at <= now
    }

    /// True when the access token is expired or expires within `buffer`.
    pub fn access_expires_within(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> bool {
        self.access_expires_at <= now + buffer
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// Login form input.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

/// A role the user holds within one registered system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemRole {
    #[serde(alias = "systemCode", alias = "system_code")]
    pub system: String,
    #[serde(alias = "roleName", alias = "role_name")]
    pub role: String,
}

/// Signed-in user, as embedded in the verification response.
///
/// Never persisted; rebuilt from the access token on every bootstrap.
/// Both snake_case and camelCase field names are accepted.
///
/// # Examples
///
/// ```
/// use core_auth::UserProfile;
///
/// let user: UserProfile = serde_json::from_str(
///     r#"{"id":"1","name":"Kim","email":"k@x.com","employee_number":"E1"}"#,
/// )
/// .unwrap();
///
/// assert_eq!(user.id, "1");
/// assert!(user.system_roles.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(alias = "employeeNumber")]
    pub employee_number: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "phoneNumber", skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<Rank>,
    #[serde(default, alias = "systemRoles", deserialize_with = "null_as_empty")]
    pub system_roles: Vec<SystemRole>,
    #[serde(default, alias = "lastLoginAt", skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Holds `role` in any system.
    pub fn has_role(&self, role: &str) -> bool {
        self.system_roles.iter().any(|r| r.role == role)
    }

    pub fn has_system_role(&self, system: &str, role: &str) -> bool {
        self.system_roles
            .iter()
            .any(|r| r.system == system && r.role == role)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Unsigned(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Unsigned(n) => n.to_string(),
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn pair(now: DateTime<Utc>) -> TokenPair {
        TokenPair {
            access_token: "secret_access_token".to_string(),
            refresh_token: "secret_refresh_token".to_string(),
            access_expires_at: now + Duration::minutes(10),
            refresh_expires_at: now + Duration::days(1),
        }
    }

    #[test]
    fn test_token_pair_expiry_helpers() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let tokens = pair(now);

        assert!(!tokens.is_access_expired_at(now));
        assert!(tokens.is_access_expired_at(now + Duration::minutes(10)));
        assert!(!tokens.access_expires_within(now, Duration::seconds(60)));
        assert!(tokens.access_expires_within(now, Duration::minutes(10)));
        assert!(!tokens.is_refresh_expired_at(now));
        assert!(tokens.is_refresh_expired_at(now + Duration::days(2)));
    }

    #[test]
    fn test_token_pair_debug_redacts() {
        let debug_str = format!("{:?}", pair(Utc::now()));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("secret_access_token"));
        assert!(!debug_str.contains("secret_refresh_token"));
    }

    #[test]
    fn test_token_pair_from_login_response() {
        let json = r#"{
            "accessToken": "at",
            "refreshToken": "rt",
            "tokenExpiresAt": "2026-03-01T12:15:00Z",
            "refreshTokenExpiresAt": "2026-03-08T12:00:00+00:00",
            "tokenType": "Bearer"
        }"#;

        let tokens: TokenPair = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(
            tokens.access_expires_at,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("admin@corp.io", "hunter2");
        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("admin@corp.io"));
        assert!(!debug_str.contains("hunter2"));
        assert_eq!(creds.password(), "hunter2");
    }

    #[test]
    fn test_user_profile_full_payload() {
        let json = r#"{
            "id": 42,
            "name": "Kim",
            "email": "k@x.com",
            "employeeNumber": "E1",
            "status": "ACTIVE",
            "phoneNumber": "010-0000-0000",
            "department": {"id": 7, "name": "Platform", "code": "PLT"},
            "position": {"id": "p1", "name": "Engineer"},
            "rank": {"id": "r3", "name": "Senior"},
            "systemRoles": [
                {"system": "sso", "role": "ADMIN"},
                {"systemCode": "hr", "roleName": "VIEWER"}
            ],
            "lastLoginAt": "2026-02-28T08:30:00Z"
        }"#;

        let user: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.department.as_ref().map(|d| d.id.as_str()), Some("7"));
        assert!(user.has_role("ADMIN"));
        assert!(user.has_system_role("hr", "VIEWER"));
        assert!(!user.has_system_role("sso", "VIEWER"));
        assert!(user.last_login_at.is_some());
    }

    #[test]
    fn test_user_profile_minimal_payload_defaults() {
        let json = r#"{"id":"1","name":"Kim","email":"k@x.com","employee_number":"E1","system_roles":null}"#;

        let user: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(user.status, "");
        assert!(user.system_roles.is_empty());
        assert!(user.department.is_none());
        assert!(!user.has_role("ADMIN"));
    }
}
