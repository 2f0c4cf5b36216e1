// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

use crate::response::{Account, AccountStatus};

/// Page size applied when an [`AccountsQuery`] does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Body of the account-create call. `authorization` is an opaque proof
/// (e.g. a CAPTCHA token) forwarded as-is; the server decides whether it is
/// valid. No client-side validation of `email` is performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
}

/// Query for one page of accounts. `after` is an account id acting as an
/// exclusive lower bound; the caller re-issues the query with the last id of
/// the previous page to continue. There is no auto-pagination.
#[derive(Debug, Clone, Default)]
pub struct AccountsQuery {
    pub email: Option<String>,
    pub after: Option<String>,
    pub limit: Option<u32>,
}

/// Body of the meter-provisioning call for a list of product ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetersRequest {
    pub action: String,
    pub product_ids: Vec<String>,
}

impl CreateMetersRequest {
    pub fn for_products(product_ids: Vec<String>) -> Self {
        Self {
            action: "create".to_string(),
            product_ids,
        }
    }
}

impl Default for CreateMetersRequest {
    fn default() -> Self {
        Self::for_products(Vec::new())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateAccountRequestBody<'a> {
    pub sequence: u64,
    pub account: &'a Account,
}

#[derive(Debug, Serialize)]
pub(crate) struct PatchAccountRequestBody {
    pub sequence: u64,
    pub patch: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetStatusRequestBody {
    pub status: AccountStatus,
}
