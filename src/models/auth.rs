use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Session issued by the hosted auth backend.
///
/// Only presence and `user.email` matter to the auth state; the token is
/// kept so the API client can authorize follow-up requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: SessionUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Application-level user record, owned by the profile service.
///
/// Columns this crate does not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub role: UserRole,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    pub fn new(email: impl Into<String>, role: UserRole) -> Self {
        Self {
            email: email.into(),
            role,
            extra: serde_json::Map::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.extra
            .get("full_name")
            .and_then(|v| v.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }

    pub fn to_logged_user(&self) -> LoggedUser {
        LoggedUser {
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
    /// Any role string the portal has no flag for.
    Other(String),
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
            UserRole::Other(role) => role,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Teacher => "Teacher",
            UserRole::Student => "Student",
            UserRole::Other(role) => role,
        }
    }
}

impl From<&str> for UserRole {
    fn from(role: &str) -> Self {
        match role {
            "admin" => UserRole::Admin,
            "teacher" => UserRole::Teacher,
            "student" => UserRole::Student,
            other => UserRole::Other(other.to_string()),
        }
    }
}

impl Serialize for UserRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let role = String::deserialize(deserializer)?;
        Ok(UserRole::from(role.as_str()))
    }
}

/// Record persisted under the `loggedUser` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedUser {
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Notification pushed by the session service.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    pub fn signed_in(session: Session) -> Self {
        Self {
            event: AuthChangeEvent::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            event: AuthChangeEvent::SignedOut,
            session: None,
        }
    }
}

/// Cross-component signals announced by other parts of the portal.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// "Please re-check who is logged in."
    AuthChanged,
    UserDeleted(LoggedUser),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_known_and_unknown_values() {
        let roles: Vec<UserRole> =
            serde_json::from_str(r#"["admin","teacher","student","librarian"]"#).unwrap();
        assert_eq!(
            roles,
            vec![
                UserRole::Admin,
                UserRole::Teacher,
                UserRole::Student,
                UserRole::Other("librarian".into()),
            ]
        );
        assert_eq!(
            serde_json::to_string(&roles).unwrap(),
            r#"["admin","teacher","student","librarian"]"#
        );
    }

    #[test]
    fn test_profile_keeps_unknown_columns() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"email":"ana@school.edu","role":"teacher","full_name":"Ana Ruiz","grade":7}"#,
        )
        .unwrap();

        assert_eq!(profile.role, UserRole::Teacher);
        assert_eq!(profile.display_name(), "Ana Ruiz");
        assert_eq!(profile.extra.get("grade"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let profile = UserProfile::new("bo@school.edu", UserRole::Student);
        assert_eq!(profile.display_name(), "bo@school.edu");
    }

    #[test]
    fn test_session_parses_token_response() {
        let session: Session = serde_json::from_str(
            r#"{
                "access_token": "tok",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "ref",
                "user": {"id": "u-1", "email": "ana@school.edu", "aud": "authenticated"}
            }"#,
        )
        .unwrap();

        assert_eq!(session.user.email.as_deref(), Some("ana@school.edu"));
        assert_eq!(session.refresh_token.as_deref(), Some("ref"));
    }
}
