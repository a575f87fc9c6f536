//! Request-scoped accessors for the shared services
//!
//! Handlers name what they need in their signature and the router resolves
//! it per request:
//!
//! ```ignore
//! async fn handler(
//!     SettingsDep(settings): SettingsDep,
//!     State(opensearch): OpenSearchDep,
//!     SessionDep(session): SessionDep,
//! ) -> Result<Json<Value>> { ... }
//! ```
//!
//! Every accessor except [`SessionDep`] hands out a handle to a singleton
//! that already lives in [`AppState`](crate::state::AppState); nothing is
//! constructed per request. [`SessionDep`] opens a database session that is
//! owned by the handler and released when the handler returns, fails or is
//! cancelled.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use paper_curator_common::{
    get_settings, AppError, ArxivClient, Database, DbSession, OpenSearchClient, PdfParserService,
    Settings,
};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// The settings instance stored on the application state
pub type RequestSettings = State<Arc<Settings>>;

/// The shared database handle
pub type DatabaseDep = State<Database>;

/// The shared OpenSearch client
pub type OpenSearchDep = State<Arc<OpenSearchClient>>;

/// The shared arXiv client
pub type ArxivDep = State<Arc<ArxivClient>>;

/// The shared PDF parser
pub type PdfParserDep = State<Arc<PdfParserService>>;

/// The process-wide settings from [`get_settings`]
///
/// Independent of the application state, so it also works in handlers
/// mounted on routers without one.
#[derive(Debug, Clone)]
pub struct SettingsDep(pub Arc<Settings>);

impl<S> FromRequestParts<S> for SettingsDep
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SettingsDep(get_settings()?))
    }
}

impl Deref for SettingsDep {
    type Target = Settings;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A database session scoped to one request
///
/// Handlers that write call [`DbSession::commit`]; anything not committed is
/// rolled back when the session is dropped. Failure to open the session is
/// the request's rejection, unchanged.
#[derive(Debug)]
pub struct SessionDep(pub DbSession);

impl<S> FromRequestParts<S> for SessionDep
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let database = Database::from_ref(state);
        let session = database.session().await?;
        Ok(SessionDep(session))
    }
}

impl Deref for SessionDep {
    type Target = DbSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SessionDep {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::state_with;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use paper_curator_common::Result;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use tower::ServiceExt;

    fn mock_state() -> AppState {
        state_with(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn parts() -> Parts {
        Request::new(()).into_parts().0
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_state_accessors_return_shared_instances() {
        let state = mock_state();

        let State(settings) = RequestSettings::from_request_parts(&mut parts(), &state).await.unwrap();
        assert!(Arc::ptr_eq(&settings, &state.settings));

        let State(opensearch) = OpenSearchDep::from_request_parts(&mut parts(), &state).await.unwrap();
        assert!(Arc::ptr_eq(&opensearch, &state.opensearch));

        let State(arxiv) = ArxivDep::from_request_parts(&mut parts(), &state).await.unwrap();
        assert!(Arc::ptr_eq(&arxiv, &state.arxiv));

        let State(pdf_parser) = PdfParserDep::from_request_parts(&mut parts(), &state).await.unwrap();
        assert!(Arc::ptr_eq(&pdf_parser, &state.pdf_parser));
    }

    #[tokio::test]
    async fn test_accessors_agree_across_requests() {
        let state = mock_state();

        let State(first) = OpenSearchDep::from_request_parts(&mut parts(), &state).await.unwrap();
        let State(second) = OpenSearchDep::from_request_parts(&mut parts(), &state.clone()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_database_dep_shares_pool() {
        let state = mock_state();
        let State(database) = DatabaseDep::from_request_parts(&mut parts(), &state).await.unwrap();

        let _session = database.session().await.unwrap();
        // Same counter, so the same handle
        assert_eq!(state.database.active_sessions(), 1);
    }

    #[tokio::test]
    async fn test_settings_dep_is_memoized() {
        let SettingsDep(first) = SettingsDep::from_request_parts(&mut parts(), &()).await.unwrap();
        let SettingsDep(second) = SettingsDep::from_request_parts(&mut parts(), &()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &get_settings().unwrap()));
    }

    #[tokio::test]
    async fn test_session_released_after_handler_error() {
        async fn failing(SessionDep(_session): SessionDep) -> Result<()> {
            Err(AppError::Internal {
                message: "handler blew up".to_string(),
            })
        }

        let state = mock_state();
        let app = Router::new().route("/fail", get(failing)).with_state(state.clone());

        let response = app
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.database.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_session_released_after_commit() {
        async fn committing(SessionDep(session): SessionDep) -> Result<String> {
            let id = session.id().to_string();
            session.commit().await?;
            Ok(id)
        }

        let state = mock_state();
        let app = Router::new().route("/ok", get(committing)).with_state(state.clone());

        let response = app
            .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await.len(), 36);
        assert_eq!(state.database.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_get_distinct_sessions() {
        async fn session_id(SessionDep(session): SessionDep) -> String {
            session.id().to_string()
        }

        let state = mock_state();
        let app = Router::new().route("/id", get(session_id)).with_state(state.clone());
        let request = || Request::builder().uri("/id").body(Body::empty()).unwrap();

        let (a, b) = tokio::join!(app.clone().oneshot(request()), app.oneshot(request()));
        let a = body_string(a.unwrap()).await;
        let b = body_string(b.unwrap()).await;

        assert_ne!(a, b);
        assert_eq!(state.database.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_session_acquisition_error_is_propagated() {
        async fn unreachable_handler(SessionDep(_session): SessionDep) -> &'static str {
            "never"
        }

        let state = state_with(DatabaseConnection::default());
        let app = Router::new().route("/s", get(unreachable_handler)).with_state(state.clone());

        let response = app
            .oneshot(Request::builder().uri("/s").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("DATABASE_ERROR"));
        assert_eq!(state.database.active_sessions(), 0);
    }
}
