// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Session
//!
//! Single source of truth for who is connected, whether they are the
//! government (admin) account and how to reach the contracts.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> Initializing -> Connected | Disconnected | ProviderUnavailable
//! Connected <-> Disconnected   (connect / disconnect / account notifications)
//! ```
//!
//! The session is constructed explicitly and cloned into consumers.
//! Consumers read snapshots through `state()` or follow changes through
//! `subscribe()`. Every transition replaces the whole `SessionState`.
//!
//! Lifecycle operations never return errors; failures are rendered into
//! `SessionState::last_error`.
//!
//! ## Wallet events
//!
//! `initialize()` subscribes to the wallet's event channel on a background
//! task; `shutdown()` cancels it. A later `initialize()` subscribes again. Account notifications reconnect or
//! disconnect; a chain notification drops every contract handle and runs
//! initialization again against the new network.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use alloy::{
    primitives::Address,
    providers::{Provider, ProviderBuilder},
};
use serde::Serialize;
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::contracts::{FactoryHandle, PropertyHandle};
use crate::error::SessionError;
use crate::wallet::{WalletEvent, WalletProvider};

pub mod registry;

pub use registry::ContractRegistry;

/// Advisory shown when no wallet is available.
pub const WALLET_NOT_INSTALLED: &str =
    "Wallet not installed. Install a wallet to register, verify or trade properties.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Connected,
    Disconnected,
    /// No wallet; reads go through the fallback RPC.
    ProviderUnavailable,
}

/// Snapshot of the wallet connection.
///
/// `is_connected` holds exactly when `account` is set, and `is_admin` is
/// false whenever no account is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub connection: ConnectionState,
    pub account: Option<Address>,
    pub is_connected: bool,
    pub is_admin: bool,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Uninitialized,
            account: None,
            is_connected: false,
            is_admin: false,
            is_loading: false,
            last_error: None,
        }
    }
}

impl SessionState {
    /// `account` became active. Admin status is unknown until re-resolved.
    fn with_account(&self, account: Address) -> Self {
        Self {
            connection: ConnectionState::Connected,
            account: Some(account),
            is_connected: true,
            is_admin: false,
            is_loading: self.is_loading,
            last_error: self.last_error.clone(),
        }
    }

    fn without_account(&self, connection: ConnectionState) -> Self {
        Self {
            connection,
            account: None,
            is_connected: false,
            is_admin: false,
            is_loading: self.is_loading,
            last_error: self.last_error.clone(),
        }
    }

    fn with_error(&self, error: impl ToString) -> Self {
        Self {
            last_error: Some(error.to_string()),
            ..self.clone()
        }
    }

    fn with_loading(&self, is_loading: bool) -> Self {
        Self {
            is_loading,
            ..self.clone()
        }
    }
}

/// Whether `account` is the government address. Byte comparison, so the
/// hex case of either side is irrelevant.
pub fn is_admin_account(account: Address, admin: Address) -> bool {
    !admin.is_zero() && account == admin
}

/// Wallet session shared by every consumer.
pub struct WalletSession<W: WalletProvider> {
    config: Arc<SessionConfig>,
    wallet: Option<Arc<W>>,
    registry: Arc<ContractRegistry>,
    state: Arc<watch::Sender<SessionState>>,
    /// Cancels the running event listener; `None` while not subscribed.
    listener: Arc<Mutex<Option<CancellationToken>>>,
}

impl<W: WalletProvider> Clone for WalletSession<W> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            wallet: self.wallet.clone(),
            registry: Arc::clone(&self.registry),
            state: Arc::clone(&self.state),
            listener: Arc::clone(&self.listener),
        }
    }
}

impl<W: WalletProvider> WalletSession<W> {
    /// Create an uninitialized session. `wallet` is `None` when the host
    /// has no wallet.
    pub fn new(config: SessionConfig, wallet: Option<W>) -> Self {
        let registry = ContractRegistry::new(config.factory_address);
        let (state, _) = watch::channel(SessionState::default());
        Self {
            config: Arc::new(config),
            wallet: wallet.map(Arc::new),
            registry: Arc::new(registry),
            state: Arc::new(state),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn wallet(&self) -> Option<&W> {
        self.wallet.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Follow state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn account(&self) -> Option<Address> {
        self.state.borrow().account
    }

    pub fn is_admin(&self) -> bool {
        self.state.borrow().is_admin
    }

    /// The active account, required for any state-changing call.
    pub fn signer(&self) -> Result<Address, SessionError> {
        self.account().ok_or(SessionError::NotConnected)
    }

    /// Factory handle on the current provider, if any.
    pub fn factory(&self) -> Option<FactoryHandle> {
        self.registry.factory()
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    fn update(&self, transition: impl FnOnce(&SessionState) -> SessionState) {
        self.state.send_modify(|state| *state = transition(state));
    }

    /// Startup: detect the wallet, silently reconnect pre-authorized
    /// accounts, then start listening for wallet events.
    pub async fn initialize(&self) {
        self.bootstrap().await;
        self.spawn_listener();
    }

    async fn bootstrap(&self) {
        self.update(|s| SessionState {
            connection: ConnectionState::Initializing,
            is_loading: true,
            ..s.clone()
        });

        match &self.wallet {
            Some(wallet) => {
                self.registry.install_provider(wallet.provider());
                match wallet.authorized_accounts().await {
                    Ok(accounts) => match accounts.first() {
                        Some(&account) => {
                            info!(%account, "Reconnected pre-authorized account");
                            self.update(|s| s.with_account(account));
                            self.resolve_contracts(account).await;
                        }
                        None => {
                            debug!("Wallet present, no authorized accounts");
                            self.update(|s| s.without_account(ConnectionState::Disconnected));
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "Failed to query authorized accounts");
                        let err = SessionError::from(e);
                        self.update(|s| {
                            s.without_account(ConnectionState::Disconnected)
                                .with_error(&err)
                        });
                    }
                }
            }
            None => {
                let advisory = SessionError::ProviderUnavailable(WALLET_NOT_INSTALLED.to_string());
                let message = match self.fallback_provider() {
                    Ok(provider) => {
                        info!(rpc_url = %self.config.fallback_rpc_url, "No wallet, using read-only RPC");
                        self.registry.install_provider(provider);
                        advisory.to_string()
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to build read-only provider");
                        self.registry.invalidate();
                        format!("{advisory} ({e})")
                    }
                };
                self.update(|s| {
                    s.without_account(ConnectionState::ProviderUnavailable)
                        .with_error(message)
                });
            }
        }

        self.update(|s| s.with_loading(false));
    }

    fn fallback_provider(&self) -> Result<alloy::providers::DynProvider, SessionError> {
        let url = url::Url::from_str(&self.config.fallback_rpc_url)
            .map_err(|e| SessionError::InvalidRpcUrl(e.to_string()))?;
        Ok(ProviderBuilder::new().connect_http(url).erased())
    }

    /// Explicit, user-initiated connect. May prompt the user.
    pub async fn connect_wallet(&self) {
        let Some(wallet) = self.wallet.clone() else {
            let err = SessionError::ProviderUnavailable(WALLET_NOT_INSTALLED.to_string());
            self.update(|s| s.with_error(&err));
            return;
        };

        if !self.registry.has_provider() {
            self.registry.install_provider(wallet.provider());
        }

        self.update(|s| s.with_loading(true));

        match wallet.request_accounts().await {
            Ok(accounts) => match accounts.first() {
                Some(&account) => {
                    info!(%account, "Wallet connected");
                    self.update(|s| SessionState {
                        last_error: None,
                        ..s.with_account(account)
                    });
                    self.resolve_contracts(account).await;
                }
                None => {
                    warn!("Wallet authorized no accounts");
                    self.update(|s| s.with_error("Wallet returned no accounts"));
                }
            },
            Err(e) => {
                warn!(error = %e, "Wallet connection failed");
                let err = SessionError::from(e);
                self.update(|s| s.with_error(&err));
            }
        }

        self.update(|s| s.with_loading(false));
    }

    /// Local teardown. Wallets cannot be disconnected remotely.
    pub fn disconnect_wallet(&self) {
        info!("Wallet disconnected");
        self.update(|s| s.without_account(ConnectionState::Disconnected));
    }

    /// Refresh the factory handle and resolve admin status for `account`.
    ///
    /// The result is dropped if the active account changed while the read
    /// was in flight.
    pub async fn resolve_contracts(&self, account: Address) {
        let Some(factory) = self.registry.refresh_factory() else {
            warn!(%account, "No provider to resolve contracts");
            self.update(|s| s.with_error("No provider available to reach the contracts"));
            return;
        };

        match factory.government_address().await {
            Ok(admin) => {
                if let Some(expected) = self.config.expected_admin {
                    if expected != admin {
                        warn!(%expected, %admin, "Configured government address differs from on-chain value");
                    }
                }
                let is_admin = is_admin_account(account, admin);
                debug!(%account, %admin, is_admin, "Resolved admin status");
                self.update(|s| {
                    if s.account == Some(account) {
                        SessionState {
                            is_admin,
                            ..s.clone()
                        }
                    } else {
                        s.clone()
                    }
                });
            }
            Err(e) => {
                warn!(%account, error = %e, "Failed to read government address");
                self.update(|s| {
                    if s.account == Some(account) {
                        SessionState {
                            is_admin: false,
                            ..s.with_error(&e)
                        }
                    } else {
                        s.clone()
                    }
                });
            }
        }
    }

    /// Handle for the property contract at `address`.
    ///
    /// `None` when no provider is initialized or the address does not
    /// parse. Never panics.
    pub fn get_property_contract(&self, address: &str) -> Option<PropertyHandle> {
        let parsed = match Address::from_str(address.trim()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(address, error = %e, "Invalid property contract address");
                return None;
            }
        };

        let handle = self.registry.property(parsed);
        if handle.is_none() {
            debug!(%parsed, "No provider initialized for property contract");
        }
        handle
    }

    /// Apply one wallet notification.
    pub async fn handle_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(&account) => {
                    info!(%account, "Wallet switched account");
                    self.update(|s| s.with_account(account));
                    self.resolve_contracts(account).await;
                }
                None => self.disconnect_wallet(),
            },
            WalletEvent::ChainChanged(chain_id) => {
                info!(chain_id, "Wallet switched network, reinitializing session");
                self.registry.invalidate();
                self.update(|s| SessionState {
                    last_error: None,
                    ..s.without_account(ConnectionState::Uninitialized)
                });
                self.bootstrap().await;
            }
        }
    }

    /// Re-read authorized accounts after missed notifications.
    async fn resync_accounts(&self) {
        if let Some(wallet) = self.wallet.clone() {
            match wallet.authorized_accounts().await {
                Ok(accounts) => self.handle_event(WalletEvent::AccountsChanged(accounts)).await,
                Err(e) => warn!(error = %e, "Failed to resync wallet accounts"),
            }
        }
    }

    fn spawn_listener(&self) {
        let Some(wallet) = &self.wallet else {
            return;
        };
        let Ok(mut listener) = self.listener.lock() else {
            return;
        };
        if listener.is_some() {
            return;
        }
        let shutdown = CancellationToken::new();
        *listener = Some(shutdown.clone());
        drop(listener);

        let mut events = wallet.subscribe();
        let session = self.clone();

        tokio::spawn(async move {
            info!("Wallet event listener starting");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Wallet event listener shutting down");
                        return;
                    }
                    received = events.recv() => match received {
                        Ok(event) => session.handle_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Wallet events dropped, resyncing accounts");
                            session.resync_accounts().await;
                        }
                        Err(RecvError::Closed) => {
                            info!("Wallet event channel closed");
                            return;
                        }
                    }
                }
            }
        });
    }

    /// Stop listening for wallet events.
    pub fn shutdown(&self) {
        let running = self.listener.lock().ok().and_then(|mut l| l.take());
        if let Some(shutdown) = running {
            shutdown.cancel();
        }
    }
}

#[cfg(test)]
mod tests;
