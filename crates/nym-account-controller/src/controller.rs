// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use nym_account_api_client::{Account, AccountApiClient, CreateAccountRequest};

use crate::{
    debounce::Coalescer,
    error::{Error, ExistsError},
    shared_state::SharedRegistrationState,
    verify::{NoVerification, TokenVerifier},
};

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

type ExistsResult = Result<bool, ExistsError>;

/// Drives account registration against the remote account service: a
/// debounced existence check for keystroke-driven UIs, and a register call
/// optionally preceded by token verification. Both flows toggle the shared
/// state flags around their network calls.
pub struct RegistrationController<V = NoVerification> {
    api_client: AccountApiClient,
    state: SharedRegistrationState,
    verifier: Option<V>,
    debounce_window: Duration,
    // Created on first use, then reused for the controller's lifetime.
    debounced_exists: OnceLock<Arc<Coalescer<ExistsResult>>>,
}

impl RegistrationController {
    pub fn new(api_client: AccountApiClient) -> Self {
        RegistrationController {
            api_client,
            state: SharedRegistrationState::new(),
            verifier: None,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            debounced_exists: OnceLock::new(),
        }
    }
}

impl<V> RegistrationController<V>
where
    V: TokenVerifier,
{
    pub fn with_verifier(api_client: AccountApiClient, verifier: V) -> Self {
        RegistrationController {
            api_client,
            state: SharedRegistrationState::new(),
            verifier: Some(verifier),
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            debounced_exists: OnceLock::new(),
        }
    }

    /// Must be set before the first `check_exists` call; the coalescer is
    /// built once with whatever window is configured at that point.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn shared_state(&self) -> SharedRegistrationState {
        self.state.clone()
    }

    /// Debounced existence check for the email in the shared state.
    ///
    /// Calls arriving within one debounce window coalesce into a single
    /// request against the account service and all receive its result. The
    /// email is read when the window fires, not when callers join, and the
    /// `checking_existence` flag drops as soon as the underlying call
    /// completes, success or error.
    pub async fn check_exists(&self) -> Result<bool, ExistsError> {
        self.state.set_checking_existence(true).await;

        let coalescer = self
            .debounced_exists
            .get_or_init(|| Arc::new(Coalescer::new(self.debounce_window)));

        let state = self.state.clone();
        let api_client = self.api_client.clone();
        let result = coalescer
            .call(move || async move {
                let outcome = match state.normalized_email().await {
                    Some(email) => api_client
                        .exists(&email)
                        .await
                        .map_err(|err| ExistsError::Api(Arc::new(err))),
                    None => Err(ExistsError::NoEmail),
                };
                state.set_checking_existence(false).await;
                outcome
            })
            .await;

        result.unwrap_or(Err(ExistsError::Aborted))
    }

    /// Registers an account for the lower-cased email in the shared state.
    ///
    /// When a token is present it is verified first; a verification failure
    /// is logged and registration proceeds regardless, with the token still
    /// forwarded for the service to judge. The `registering` flag drops on
    /// every path.
    pub async fn register(&self) -> Result<Account, Error> {
        let email = self.state.normalized_email().await.ok_or(Error::NoEmail)?;

        self.state.set_registering(true).await;
        let result = self.create_account(email).await;
        self.state.set_registering(false).await;
        result
    }

    async fn create_account(&self, email: String) -> Result<Account, Error> {
        let token = self.state.token().await;
        if let Some(token) = &token {
            self.verify_token(token).await;
        }

        let request = CreateAccountRequest {
            email,
            authorization: token,
        };
        self.api_client
            .create(&request)
            .await
            .map_err(Error::CreateAccount)
    }

    async fn verify_token(&self, token: &str) {
        let Some(verifier) = &self.verifier else {
            return;
        };
        if let Err(err) = verifier.verify(token).await {
            tracing::warn!("Token verification failed, proceeding anyway: {err}");
        }
    }
}
