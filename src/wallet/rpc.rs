// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote JSON-RPC wallet.
//!
//! Talks to a wallet or node that manages its own keys and signs
//! `eth_sendTransaction` itself. HTTP has no push channel, so account and
//! chain changes are discovered by `watch`, which polls and republishes
//! them as `WalletEvent`s.

use std::sync::Arc;
use std::time::Duration;

use alloy::{
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::{WalletError, WalletEvent, WalletProvider, EVENT_CHANNEL_CAPACITY};

/// Default interval between account/chain polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

pub struct RpcWallet {
    provider: DynProvider,
    events: broadcast::Sender<WalletEvent>,
    poll_interval: Duration,
}

impl RpcWallet {
    /// Connect to a wallet JSON-RPC endpoint.
    pub fn connect(rpc_url: &str) -> Result<Self, WalletError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| WalletError::InvalidRpcUrl(e.to_string()))?;

        Ok(Self::with_provider(ProviderBuilder::new().connect_http(url).erased()))
    }

    /// Wrap an existing provider.
    pub fn with_provider(provider: DynProvider) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            provider,
            events,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll the wallet until cancelled, publishing account and chain changes.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(wallet.clone().watch(shutdown.clone()));
    /// ```
    pub async fn watch(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(interval = ?self.poll_interval, "Wallet watcher starting");

        let mut accounts = self.authorized_accounts().await.ok();
        let mut chain_id = self.provider.get_chain_id().await.ok();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    tracing::info!("Wallet watcher shutting down");
                    return;
                }
            }

            match self.authorized_accounts().await {
                Ok(current) => {
                    if accounts.as_ref() != Some(&current) {
                        tracing::debug!(count = current.len(), "Wallet accounts changed");
                        let _ = self.events.send(WalletEvent::AccountsChanged(current.clone()));
                        accounts = Some(current);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Wallet account poll failed"),
            }

            match self.provider.get_chain_id().await {
                Ok(current) => {
                    if chain_id.is_some_and(|previous| previous != current) {
                        tracing::info!(chain_id = current, "Wallet chain changed");
                        let _ = self.events.send(WalletEvent::ChainChanged(current));
                    }
                    chain_id = Some(current);
                }
                Err(e) => tracing::warn!(error = %e, "Wallet chain poll failed"),
            }
        }
    }
}

impl WalletProvider for RpcWallet {
    async fn authorized_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let accounts: Vec<Address> = self
            .provider
            .client()
            .request_noparams::<Vec<Address>>("eth_requestAccounts")
            .await?;
        Ok(accounts)
    }

    fn provider(&self) -> DynProvider {
        self.provider.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}
