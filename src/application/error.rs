use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        authoring::AuthoringError, markdown::RenderError, repos::RepoError,
        transfer::TransferError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Why a request could not be resolved to content. The code travels to the
/// not-found page as `?err=<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    SlugNotFound,
    SlugHasNoEntry,
    EntryIdNotFound,
    EntryHasNoSlug,
    TagNotFound,
}

impl NotFoundReason {
    const ALL: [NotFoundReason; 5] = [
        NotFoundReason::SlugNotFound,
        NotFoundReason::SlugHasNoEntry,
        NotFoundReason::EntryIdNotFound,
        NotFoundReason::EntryHasNoSlug,
        NotFoundReason::TagNotFound,
    ];

    pub fn code(self) -> &'static str {
        match self {
            NotFoundReason::SlugNotFound => "SlugNotFound",
            NotFoundReason::SlugHasNoEntry => "SlugHasNoEntry",
            NotFoundReason::EntryIdNotFound => "entryIdNotFound",
            NotFoundReason::EntryHasNoSlug => "entryHasNoSlug",
            NotFoundReason::TagNotFound => "TagNotFound",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.code() == code)
    }

    pub fn message(self) -> &'static str {
        match self {
            NotFoundReason::SlugNotFound => "No entry is published under that address.",
            NotFoundReason::SlugHasNoEntry => {
                "That address points to an entry that no longer exists."
            }
            NotFoundReason::EntryIdNotFound => "No entry has that number.",
            NotFoundReason::EntryHasNoSlug => "That entry has no public address yet.",
            NotFoundReason::TagNotFound => "No such tag.",
        }
    }

    /// Location of the not-found page carrying this reason.
    pub fn redirect_path(self) -> String {
        format!("/not-found?err={}", self.code())
    }
}

/// Failures of the public site pipeline.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("not found: {}", .0.code())]
    NotFound(NotFoundReason),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to read tag description: {0}")]
    Description(#[from] std::io::Error),
}

/// Top-level error of the binary's commands.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Authoring(#[from] AuthoringError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_round_trip() {
        for reason in NotFoundReason::ALL {
            assert_eq!(NotFoundReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(NotFoundReason::from_code("nope"), None);
    }

    #[test]
    fn redirect_path_carries_code() {
        assert_eq!(
            NotFoundReason::EntryIdNotFound.redirect_path(),
            "/not-found?err=entryIdNotFound"
        );
    }

    #[test]
    fn report_collects_error_chain() {
        let err = SiteError::Repo(RepoError::Timeout);
        let report =
            ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &err);
        assert_eq!(report.messages, vec!["database timeout".to_string()]);
    }
}
