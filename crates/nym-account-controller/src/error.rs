// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use nym_account_api_client::AccountApiError;

/// Failure of the debounced existence check. One result is shared by every
/// caller that joined the same debounce window, hence the `Arc` on the API
/// error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExistsError {
    #[error("no email has been set for registration")]
    NoEmail,

    #[error("failed to check account existence")]
    Api(#[source] Arc<AccountApiError>),

    #[error("existence check aborted before a result was produced")]
    Aborted,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no email has been set for registration")]
    NoEmail,

    #[error("failed to create account")]
    CreateAccount(#[source] AccountApiError),
}
