// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

mod client;
mod error;
mod headers;
mod request;
mod response;
mod routes;

pub use client::{AccountApiClient, Config};
pub use error::{AccountApiError, HttpError, Result};
pub use request::{AccountsQuery, CreateAccountRequest, CreateMetersRequest, DEFAULT_PAGE_SIZE};
pub use response::{Account, AccountStatus, ApiErrorBody, CapabilityEntry, ErrorKind, RoleEntry};
