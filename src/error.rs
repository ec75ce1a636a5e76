// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session error taxonomy.
//!
//! Session lifecycle operations never return these to the caller; they are
//! rendered into `SessionState::last_error`. Catalog flows return them so
//! the view layer can decide how to notify the user.

/// Errors raised by the session core and the contract flows built on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No wallet detected; the session runs read-only.
    #[error("Wallet not installed: {0}")]
    ProviderUnavailable(String),

    /// The user declined a connect or signature prompt.
    #[error("Authorization rejected: {0}")]
    AuthorizationRejected(String),

    /// A state-changing call needs an active account.
    #[error("Wallet not connected")]
    NotConnected,

    /// A `call`-style query failed or reverted.
    #[error("Contract read failed: {0}")]
    ContractRead(String),

    /// A `send`-style transaction failed or was reverted on-chain.
    #[error("Contract write failed: {0}")]
    ContractWrite(String),

    /// Client-side validation rejected the input before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    /// Wallet transport failure that is not a user rejection.
    #[error("Wallet error: {0}")]
    Wallet(String),
}

impl SessionError {
    /// Short machine-readable code for logs and UI banners.
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::ProviderUnavailable(_) => "provider_unavailable",
            SessionError::AuthorizationRejected(_) => "authorization_rejected",
            SessionError::NotConnected => "not_connected",
            SessionError::ContractRead(_) => "contract_read_failure",
            SessionError::ContractWrite(_) => "contract_write_failure",
            SessionError::InvalidInput(_) | SessionError::InvalidAddress(_) => "invalid_input",
            SessionError::InvalidRpcUrl(_) => "invalid_rpc_url",
            SessionError::Wallet(_) => "wallet_error",
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        SessionError::InvalidInput(message.into())
    }
}
