mod middleware;
mod public;

pub use public::{HttpState, build_router};

use crate::application::error::ErrorReport;
use crate::application::error::HttpError;
use crate::application::repos::RepoError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a repository error to the HTTP error shown to visitors.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Stored content is inconsistent",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_service_unavailable() {
        let err = repo_error_to_http("test", RepoError::Timeout);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn failing_health_check_reports_the_cause() {
        let response = db_health_response(Err(RepoError::from_persistence("connection refused")));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.source, "infra::http::db_health");
        assert!(report.messages[0].contains("connection refused"));
    }

    #[test]
    fn healthy_database_returns_no_content() {
        assert_eq!(db_health_response(Ok(())).status(), StatusCode::NO_CONTENT);
    }
}
