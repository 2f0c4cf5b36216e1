// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{fmt, sync::Arc};

use serde::Serialize;
use tokio::sync::MutexGuard;

/// Handle to the controller's transient UI-facing state. Clones share the
/// same record. The flags are advisory: they tell a UI what is in flight,
/// they are not a correctness gate, and the record assumes a single writer
/// per controller instance.
#[derive(Clone)]
pub struct SharedRegistrationState {
    inner: Arc<tokio::sync::Mutex<RegistrationState>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrationState {
    // The email the user typed so far, stored as given. Normalized to
    // lowercase only at the point a request is issued.
    pub email: Option<String>,

    // Opaque CAPTCHA/verification token, forwarded to the service on create.
    #[serde(skip_serializing)]
    pub token: Option<String>,

    // A register call is in flight.
    pub registering: bool,

    // A debounced existence check is in flight.
    pub checking_existence: bool,
}

impl SharedRegistrationState {
    pub(crate) fn new() -> Self {
        SharedRegistrationState {
            inner: Arc::new(tokio::sync::Mutex::new(RegistrationState::default())),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, RegistrationState> {
        self.inner.lock().await
    }

    pub async fn set_email(&self, email: impl Into<String>) {
        let mut guard = self.inner.lock().await;
        guard.email = Some(email.into());
    }

    pub async fn set_token(&self, token: Option<String>) {
        let mut guard = self.inner.lock().await;
        guard.token = token;
    }

    pub async fn registering(&self) -> bool {
        self.inner.lock().await.registering
    }

    pub async fn checking_existence(&self) -> bool {
        self.inner.lock().await.checking_existence
    }

    pub(crate) async fn set_registering(&self, registering: bool) {
        let mut guard = self.inner.lock().await;
        tracing::debug!("Setting registering to {registering}");
        guard.registering = registering;
    }

    pub(crate) async fn set_checking_existence(&self, checking: bool) {
        let mut guard = self.inner.lock().await;
        tracing::debug!("Setting checking_existence to {checking}");
        guard.checking_existence = checking;
    }

    pub(crate) async fn normalized_email(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .email
            .as_deref()
            .map(str::to_lowercase)
    }

    pub(crate) async fn token(&self) -> Option<String> {
        self.inner.lock().await.token.clone()
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegistrationState {{ email: {}, registering: {}, checking_existence: {} }}",
            self.email.as_deref().unwrap_or("unset"),
            self.registering,
            self.checking_existence,
        )
    }
}
