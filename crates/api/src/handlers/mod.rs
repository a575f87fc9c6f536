//! API handlers module

pub mod health;
pub mod papers;
pub mod ping;
pub mod search;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use paper_curator_common::AppError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

/// Convert validator output into a 400 naming the first offending field
pub(crate) fn validation_error(errors: ValidationErrors) -> AppError {
    let field = errors.field_errors().keys().next().map(|field| field.to_string());
    AppError::Validation {
        message: errors.to_string(),
        field,
    }
}

/// Query string parameters that are deserialized and validated up front
///
/// Both failures reject with the `{error: {code, message}}` body. Place it
/// before [`SessionDep`](crate::dependencies::SessionDep) so a bad query
/// never opens a session.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation {
                message: rejection.body_text(),
                field: None,
            })?;
        value.validate().map_err(validation_error)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, Response};
    use axum::Router;
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;

    /// The full router with a recorder that is never installed globally
    pub(crate) fn app(state: AppState) -> Router {
        crate::create_router(state, PrometheusBuilder::new().build_recorder().handle())
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub(crate) fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) async fn json_body(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
