use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
};
use serde::de::DeserializeOwned;

use crate::errors::ApiError;

pub const MAX_BODY_BYTES: usize = 1_048_576;

/// JSON body extractor with strict decoding: the body must be non-empty,
/// contain exactly one JSON value, and match the target type. Each failure
/// mode gets its own client-facing message.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::BadRequest(format!(
                    "body must not be larger than {MAX_BODY_BYTES} bytes"
                ))
            } else {
                ApiError::BadRequest("failed to read request body".to_string())
            }
        })?;

        if bytes.is_empty() {
            return Err(ApiError::BadRequest("body must not be empty".to_string()));
        }

        let mut stream = serde_json::Deserializer::from_slice(&bytes).into_iter::<T>();
        let value = match stream.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => return Err(decode_error(&e)),
            None => return Err(ApiError::BadRequest("body must not be empty".to_string())),
        };

        // Anything after the first value, valid JSON or not, is rejected.
        match stream.next() {
            None => Ok(JsonBody(value)),
            Some(_) => Err(ApiError::BadRequest(
                "body must only contain a single JSON value".to_string(),
            )),
        }
    }
}

fn decode_error(e: &serde_json::Error) -> ApiError {
    let message = if e.is_syntax() || e.is_eof() {
        format!("body contains badly-formed JSON (at line {})", e.line())
    } else if e.to_string().contains("unknown field") {
        format!("body contains an unknown key (at line {})", e.line())
    } else {
        format!("body contains incorrect JSON types (at line {})", e.line())
    };
    ApiError::BadRequest(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Input {
        steps: i32,
    }

    fn parse(body: &str) -> Result<Input, ApiError> {
        if body.is_empty() {
            return Err(ApiError::BadRequest("body must not be empty".to_string()));
        }
        let mut stream = serde_json::Deserializer::from_slice(body.as_bytes()).into_iter::<Input>();
        let value = match stream.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => return Err(decode_error(&e)),
            None => return Err(ApiError::BadRequest("body must not be empty".to_string())),
        };
        match stream.next() {
            None => Ok(value),
            Some(_) => Err(ApiError::BadRequest(
                "body must only contain a single JSON value".to_string(),
            )),
        }
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::BadRequest(msg) => msg,
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn valid_body_parses() {
        assert_eq!(parse(r#"{"steps": 100}"#).unwrap().steps, 100);
    }

    #[test]
    fn empty_body_is_distinct_from_malformed() {
        assert_eq!(message(parse("").unwrap_err()), "body must not be empty");
        assert!(message(parse("{").unwrap_err()).contains("badly-formed JSON"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let msg = message(parse(r#"{"steps": 1, "bogus": 2}"#).unwrap_err());
        assert!(msg.contains("unknown key"));
    }

    #[test]
    fn wrong_type_is_reported_as_type_error() {
        let msg = message(parse(r#"{"steps": "many"}"#).unwrap_err());
        assert!(msg.contains("incorrect JSON types"));
    }

    #[test]
    fn trailing_value_is_rejected() {
        let msg = message(parse(r#"{"steps": 1}{"steps": 2}"#).unwrap_err());
        assert_eq!(msg, "body must only contain a single JSON value");
    }
}
