// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

// The registration controller is responsible for
// 1. checking if an email is already taken, debounced for keystroke-driven UIs
// 2. registering the account, optionally verifying a CAPTCHA token first

pub mod shared_state;

mod controller;
mod debounce;
mod error;
mod verify;

pub use controller::{RegistrationController, DEFAULT_DEBOUNCE_WINDOW};
pub use error::{Error, ExistsError};
pub use shared_state::{RegistrationState, SharedRegistrationState};
pub use verify::{NoVerification, TokenVerifier};
