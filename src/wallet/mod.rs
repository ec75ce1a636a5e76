// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet provider seam.
//!
//! A wallet supplies accounts, an alloy provider that can sign for them and
//! a stream of change notifications. Two implementations are provided:
//!
//! - `RpcWallet` - a remote JSON-RPC wallet or node with managed accounts
//! - `SignerWallet` - local secp256k1 keys (hex or PEM)

use std::future::Future;
use std::sync::Arc;

use alloy::{
    primitives::Address,
    providers::DynProvider,
    transports::TransportError,
};
use tokio::sync::broadcast;

use crate::error::SessionError;

pub mod rpc;
pub mod signer;

pub use rpc::RpcWallet;
pub use signer::SignerWallet;

/// EIP-1193 "User Rejected Request" error code.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Capacity of a wallet's event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Change notifications emitted by a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// Authorized accounts changed. The first entry is the active account;
    /// an empty list means the wallet revoked access.
    AccountsChanged(Vec<Address>),
    /// The wallet switched to another chain.
    ChainChanged(u64),
}

/// Errors reported by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("User rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Wallet RPC error: {0}")]
    Rpc(String),
}

impl From<WalletError> for SessionError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected(msg) => SessionError::AuthorizationRejected(msg),
            WalletError::InvalidRpcUrl(msg) => SessionError::InvalidRpcUrl(msg),
            other => SessionError::Wallet(other.to_string()),
        }
    }
}

impl From<TransportError> for WalletError {
    fn from(err: TransportError) -> Self {
        if is_user_rejection(&err) {
            WalletError::Rejected(err.to_string())
        } else {
            WalletError::Rpc(err.to_string())
        }
    }
}

/// Whether a transport error is the wallet's "user rejected" response.
pub fn is_user_rejection(err: &TransportError) -> bool {
    err.as_error_resp()
        .is_some_and(|payload| payload.code == USER_REJECTED_CODE)
}

/// Host wallet the session connects through.
pub trait WalletProvider: Send + Sync + 'static {
    /// Accounts already authorized for this application. Never prompts.
    fn authorized_accounts(&self) -> impl Future<Output = Result<Vec<Address>, WalletError>> + Send;

    /// Ask the wallet to authorize accounts. May prompt and may be rejected.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Address>, WalletError>> + Send;

    /// Provider bound to the wallet's current chain, able to sign for its accounts.
    fn provider(&self) -> DynProvider;

    /// Subscribe to account and chain change notifications.
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Lets a background watcher and the session share one wallet.
impl<T: WalletProvider> WalletProvider for Arc<T> {
    fn authorized_accounts(&self) -> impl Future<Output = Result<Vec<Address>, WalletError>> + Send {
        (**self).authorized_accounts()
    }

    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Address>, WalletError>> + Send {
        (**self).request_accounts()
    }

    fn provider(&self) -> DynProvider {
        (**self).provider()
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        (**self).subscribe()
    }
}
