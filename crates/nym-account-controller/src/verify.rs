// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

/// Seam for CAPTCHA/token verification providers. The controller calls
/// `verify` with the stored token before registering; provider internals
/// (and their transport) live behind this trait.
#[allow(async_fn_in_trait)]
pub trait TokenVerifier {
    type Error: std::error::Error;

    async fn verify(&self, token: &str) -> Result<(), Self::Error>;
}

/// Verifier used when no token verification is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVerification;

impl TokenVerifier for NoVerification {
    type Error = std::convert::Infallible;

    async fn verify(&self, _token: &str) -> Result<(), Self::Error> {
        Ok(())
    }
}
