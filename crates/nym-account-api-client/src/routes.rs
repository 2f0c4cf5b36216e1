// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

pub(crate) const ACCOUNTS: &str = "accounts";
pub(crate) const STATUS: &str = "status";
pub(crate) const ROLES: &str = "roles";
pub(crate) const CAPS: &str = "caps";
pub(crate) const METERS: &str = "meters";
