use serde::Deserialize;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for account activation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateRequest {
    pub token: String,
}

/// Request body for a password change.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_rejects_unknown_fields() {
        let err = serde_json::from_str::<RegisterRequest>(
            r#"{"name": "A", "email": "a@b.co", "password": "x", "admin": true}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn activate_request_parses() {
        let req: ActivateRequest =
            serde_json::from_str(r#"{"token": "ABCDEFGHIJKLMNOPQRSTUVWXYZ"}"#).unwrap();
        assert_eq!(req.token.len(), 26);
    }
}
