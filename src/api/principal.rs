use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde_json::json;
use std::collections::HashSet;

use crate::errors::Error;

use super::response::error_response;

/// Authenticated caller, as established by the identity layer in front
/// of this service. Token introspection and permission lookup are not
/// this service's concern; the transport collaborator injects the
/// resolved subject and permission set as headers.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    permissions: HashSet<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>, permissions: impl IntoIterator<Item = String>) -> Self {
        Principal {
            subject: subject.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has_permission(&self, kind: &str) -> bool {
        self.permissions.contains(kind)
    }

    /// Guard used by handlers before any state change.
    pub fn require(&self, kind: &str) -> Result<(), Error> {
        if self.has_permission(kind) {
            return Ok(());
        }
        Err(Error::forbidden(
            format!("missing permission '{kind}'"),
            json!({ "subject": self.subject, "permission": kind }),
        ))
    }
}

#[async_trait::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = axum::response::Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let subject = parts
            .headers
            .get("x-principal")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                error_response(&Error::forbidden(
                    "request carries no principal",
                    json!({ "header": "x-principal" }),
                ))
            })?
            .to_string();

        let permissions: HashSet<String> = parts
            .headers
            .get("x-permissions")
            .and_then(|v| v.to_str().ok())
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Principal {
            subject,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_check() {
        let principal = Principal::new("maker-1", vec!["rules:write".to_string()]);
        assert!(principal.has_permission("rules:write"));
        assert!(!principal.has_permission("approvals:decide"));

        assert!(principal.require("rules:write").is_ok());
        let err = principal.require("approvals:decide").unwrap_err();
        assert_eq!(err.kind(), "ForbiddenError");
    }
}
