use serde_json::Value;

use crate::error::WarnCode;
use crate::net::client::{ApiClient, CallOptions};

/// Session lookup result. A missing token is not an error; it simply removes
/// the authenticated sources from the cascade.
#[derive(Debug, Clone, Default)]
pub struct AuthInfo {
    pub token: Option<String>,
    pub user_name: Option<String>,
}

impl AuthInfo {
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

fn token_from(data: &Value) -> Option<String> {
    let direct = data
        .get("accessToken")
        .or_else(|| data.get("access_token"))
        .and_then(Value::as_str);
    let nested = data.get("user").and_then(|user| {
        user.get("accessToken")
            .or_else(|| user.get("access_token"))
            .and_then(Value::as_str)
    });
    direct
        .or(nested)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
}

fn user_name_from(data: &Value) -> Option<String> {
    data.get("user")
        .and_then(|user| user.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
}

/// `GET /api/auth/session`. The anonymized-body case is absorbed by the
/// transport chain's promotion fallback before we ever see it.
pub fn fetch_auth(client: &ApiClient) -> AuthInfo {
    let response = client.call(CallOptions::json("/api/auth/session"));

    if !response.ok {
        if response.is_auth_failure() {
            client.trace().warn(
                WarnCode::W002AuthExpired,
                "session",
                "/api/auth/session",
                "http_error",
            );
        }
        return AuthInfo::default();
    }

    let Some(data) = &response.data else {
        return AuthInfo::default();
    };

    let auth = AuthInfo {
        token: token_from(data),
        user_name: user_name_from(data),
    };
    client.trace().debug(format!(
        "session ok token={} user={}",
        auth.token.is_some(),
        auth.user_name.as_deref().unwrap_or("-")
    ));
    auth
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_shapes_are_all_accepted() {
        assert_eq!(
            token_from(&json!({"accessToken": "t1"})).as_deref(),
            Some("t1")
        );
        assert_eq!(
            token_from(&json!({"access_token": "t2"})).as_deref(),
            Some("t2")
        );
        assert_eq!(
            token_from(&json!({"user": {"access_token": "t3"}})).as_deref(),
            Some("t3")
        );
        assert_eq!(token_from(&json!({"user": {}})), None);
    }

    #[test]
    fn user_name_is_trimmed() {
        assert_eq!(
            user_name_from(&json!({"user": {"name": "  Ada  "}})).as_deref(),
            Some("Ada")
        );
        assert_eq!(user_name_from(&json!({"user": {"name": "  "}})), None);
    }
}
