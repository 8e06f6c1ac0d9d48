//! Caller identity for API requests.
//!
//! Authentication happens in front of this service; the control plane only
//! reads who the caller is from `x-caller-id` and `x-caller-role`.

use std::fmt;
use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Operator => "operator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "operator" => Ok(Role::Operator),
            other => Err(AppError::Auth(format!("Unknown role '{}'", other))),
        }
    }
}

/// Who is making a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// `None` for anonymous callers and internal jobs
    pub id: Option<i64>,
    pub role: Role,
}

impl Caller {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id: Some(id), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// `Forbidden` unless the caller is an admin.
    pub fn require_admin(&self, action: &str) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' may not {}",
                self.role, action
            )))
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> AppResult<Self> {
        let id = match header_str(headers, CALLER_ID_HEADER)? {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                AppError::Auth(format!("Invalid {} header '{}'", CALLER_ID_HEADER, raw))
            })?),
            None => None,
        };
        let role = match header_str(headers, CALLER_ROLE_HEADER)? {
            Some(raw) => raw.parse()?,
            None => Role::default(),
        };
        Ok(Self { id, role })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> AppResult<Option<&'a str>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AppError::Auth(format!("{} header is not valid text", name)))
        })
        .transpose()
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Caller::from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_missing_headers_default_to_anonymous_operator() {
        let caller = Caller::from_headers(&HeaderMap::new()).unwrap();
        assert_eq!(caller.id, None);
        assert_eq!(caller.role, Role::Operator);
        assert!(!caller.is_admin());
    }

    #[test]
    fn test_headers_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_ID_HEADER, HeaderValue::from_static("17"));
        headers.insert(CALLER_ROLE_HEADER, HeaderValue::from_static("Admin"));
        let caller = Caller::from_headers(&headers).unwrap();
        assert_eq!(caller, Caller::new(17, Role::Admin));
        assert!(caller.require_admin("delete templates").is_ok());
    }

    #[test]
    fn test_bad_headers_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_ID_HEADER, HeaderValue::from_static("abc"));
        assert!(matches!(
            Caller::from_headers(&headers),
            Err(AppError::Auth(_))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(CALLER_ROLE_HEADER, HeaderValue::from_static("root"));
        assert!(matches!(
            Caller::from_headers(&headers),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn test_operator_forbidden_from_admin_actions() {
        let caller = Caller::new(3, Role::Operator);
        assert!(matches!(
            caller.require_admin("terminate instances"),
            Err(AppError::Forbidden(_))
        ));
    }
}
