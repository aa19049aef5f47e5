//! Request body extraction
//!
//! [`JsonBody`] treats a missing or blank body as the default value and
//! reports any other unreadable body as a validation error carrying the
//! parser's message.

use crate::error::Error;
use axum::{
    Json, async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

/// JSON request body that falls back to `T::default()` when absent
#[derive(Debug, Clone, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| Error::Validation(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        let Json(value) =
            Json::<T>::from_bytes(&bytes).map_err(|rejection| Error::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}
