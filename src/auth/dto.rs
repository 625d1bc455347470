use serde::Deserialize;

/// Request body for minting an authentication token.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTokenRequest {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<CreateTokenRequest>(
            r#"{"email": "a@b.co", "password": "pa55word!", "extra": 1}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }
}
