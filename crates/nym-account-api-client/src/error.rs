// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use reqwest::StatusCode;

use crate::response::{ApiErrorBody, ErrorKind};

/// Transport-level failure of a single request. A non-2xx response with a
/// parseable error payload surfaces as `EndpointFailure` so callers can
/// check the service's discriminated error kind instead of sniffing bodies.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to send request")]
    Request(#[from] reqwest::Error),

    #[error("endpoint failure ({status}): {error}")]
    EndpointFailure {
        status: StatusCode,
        error: ApiErrorBody,
    },

    #[error("endpoint failure ({status}): {body}")]
    EndpointFailureRaw { status: StatusCode, body: String },

    #[error("failed to deserialize response")]
    Deserialize(#[source] reqwest::Error),
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Request(err) => err.status(),
            HttpError::EndpointFailure { status, .. }
            | HttpError::EndpointFailureRaw { status, .. } => Some(*status),
            HttpError::Deserialize(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            HttpError::EndpointFailure { error, .. } => Some(error.kind),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccountApiError {
    #[error("failed to create account api client")]
    FailedToCreateClient(#[source] reqwest::Error),

    #[error("base url cannot serve as a request base")]
    InvalidBaseUrl,

    #[error("account api url not found in the environment")]
    MissingApiUrl,

    #[error("invalid account api url")]
    InvalidApiUrl(#[source] url::ParseError),

    #[error("failed to check account existence")]
    FailedToCheckExistence(#[source] HttpError),

    #[error("failed to create account")]
    FailedToCreateAccount(#[source] HttpError),

    #[error("failed to get account")]
    FailedToGetAccount(#[source] HttpError),

    #[error("failed to query accounts")]
    FailedToQueryAccounts(#[source] HttpError),

    #[error("failed to update account")]
    FailedToUpdateAccount(#[source] HttpError),

    #[error("failed to patch account")]
    FailedToPatchAccount(#[source] HttpError),

    #[error("failed to set account status")]
    FailedToSetStatus(#[source] HttpError),

    #[error("failed to get account roles")]
    FailedToGetRoles(#[source] HttpError),

    #[error("failed to get account caps")]
    FailedToGetCaps(#[source] HttpError),

    #[error("failed to create meters")]
    FailedToCreateMeters(#[source] HttpError),
}

impl AccountApiError {
    pub fn http_error(&self) -> Option<&HttpError> {
        match self {
            AccountApiError::FailedToCheckExistence(err)
            | AccountApiError::FailedToCreateAccount(err)
            | AccountApiError::FailedToGetAccount(err)
            | AccountApiError::FailedToQueryAccounts(err)
            | AccountApiError::FailedToUpdateAccount(err)
            | AccountApiError::FailedToPatchAccount(err)
            | AccountApiError::FailedToSetStatus(err)
            | AccountApiError::FailedToGetRoles(err)
            | AccountApiError::FailedToGetCaps(err)
            | AccountApiError::FailedToCreateMeters(err) => Some(err),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.http_error().and_then(HttpError::status)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.http_error().and_then(HttpError::error_kind)
    }

    /// An update was rejected because the supplied `sequence` was stale.
    pub fn is_conflict(&self) -> bool {
        self.error_kind() == Some(ErrorKind::InvalidState)
            || self.status() == Some(StatusCode::CONFLICT)
    }

    pub fn is_not_found(&self) -> bool {
        self.error_kind() == Some(ErrorKind::NotFound)
            || self.status() == Some(StatusCode::NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, AccountApiError>;
