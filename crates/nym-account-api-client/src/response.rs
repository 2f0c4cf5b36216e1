// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::{Deserialize, Serialize};

/// An account record as returned by the account service. The service owns
/// the record; fields it attaches beyond the core set are preserved in
/// `extra` so an overwrite-style update can send them back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub status: AccountStatus,
    pub sequence: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Disabled,
    Deleted,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Disabled => write!(f, "disabled"),
            AccountStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// Role assigned to an account. Read-only from the client's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Capability issued to an account. Read-only from the client's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Error payload shape used by the account service: `{type, message?, ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.kind, message),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Discriminated error type carried in the service's error payload. The
/// `exists` call special-cases `NotFound`; a stale update `sequence` comes
/// back as `InvalidState`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "NotFoundError")]
    NotFound,
    #[serde(rename = "DuplicateError")]
    Duplicate,
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "InvalidStateError")]
    InvalidState,
    #[serde(rename = "NotAllowedError")]
    NotAllowed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "NotFoundError"),
            ErrorKind::Duplicate => write!(f, "DuplicateError"),
            ErrorKind::Validation => write!(f, "ValidationError"),
            ErrorKind::InvalidState => write!(f, "InvalidStateError"),
            ErrorKind::NotAllowed => write!(f, "NotAllowedError"),
            ErrorKind::Unknown => write!(f, "UnknownError"),
        }
    }
}
