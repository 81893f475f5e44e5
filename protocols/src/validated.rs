//! Forward-compatible request validation.
//!
//! Incoming JSON is deserialized tolerantly (unknown fields pass through via
//! `#[serde(flatten)]` on the request types), then `normalize()`d before
//! `validate()` runs so that cross-field defaults are applied exactly once,
//! consistently, regardless of call site.

use validator::Validate;

/// Types that may need defaults or clamping applied before validation runs.
///
/// Default implementation is a no-op; most request types don't need one.
pub trait Normalizable {
    fn normalize(&mut self) {}
}

#[cfg(feature = "axum")]
mod axum_extractor {
    use std::ops::{Deref, DerefMut};

    use axum::{
        extract::{FromRequest, Request},
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use serde::{de::DeserializeOwned, Serialize};
    use validator::Validate;

    use super::Normalizable;

    /// Axum extractor: deserialize JSON, normalize, then validate.
    ///
    /// Rejections are returned as a Responses-API-shaped 400 error body rather
    /// than axum's default plaintext rejection, so validation failures look
    /// the same as any other request error to callers.
    pub struct ValidatedJson<T>(pub T);

    impl<T, S> FromRequest<S> for ValidatedJson<T>
    where
        T: DeserializeOwned + Validate + Normalizable + Serialize,
        S: Send + Sync,
    {
        type Rejection = Response;

        async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
            let Json(mut value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| validation_error(e.to_string()))?;

            value.normalize();

            value
                .validate()
                .map_err(|e| validation_error(e.to_string()))?;

            Ok(ValidatedJson(value))
        }
    }

    impl<T> Deref for ValidatedJson<T> {
        type Target = T;
        fn deref(&self) -> &T {
            &self.0
        }
    }

    impl<T> DerefMut for ValidatedJson<T> {
        fn deref_mut(&mut self) -> &mut T {
            &mut self.0
        }
    }

    fn validation_error(message: String) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": {
                    "message": message,
                    "type": "invalid_request_error",
                    "code": "validation_error",
                }
            })),
        )
            .into_response()
    }
}

#[cfg(feature = "axum")]
pub use axum_extractor::ValidatedJson;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use validator::Validate;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "model must not be empty"))]
        model: String,
        #[validate(range(min = 1, message = "max_tool_calls must be positive"))]
        max_tool_calls: i64,
    }

    impl Normalizable for Sample {
        fn normalize(&mut self) {
            if self.max_tool_calls == 0 {
                self.max_tool_calls = 10;
            }
        }
    }

    #[test]
    fn normalize_runs_before_validate() {
        let mut s = Sample {
            model: "gpt-5".into(),
            max_tool_calls: 0,
        };
        s.normalize();
        assert!(s.validate().is_ok());
        assert_eq!(s.max_tool_calls, 10);
    }

    #[test]
    fn validate_rejects_empty_model() {
        let s = Sample {
            model: String::new(),
            max_tool_calls: 5,
        };
        assert!(s.validate().is_err());
    }
}
