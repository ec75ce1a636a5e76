// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::{
    primitives::{Address, Bytes},
    providers::{DynProvider, Provider, ProviderBuilder},
    sol_types::SolCall,
    transports::mock::Asserter,
};
use tokio::sync::{broadcast, Notify};

use super::*;
use crate::contracts::IPropertyFactory;
use crate::wallet::WalletError;

const ADMIN_MIXED: &str = "0xABCdef00000000000000000000000000000000AA";
const ADMIN_LOWER: &str = "0xabcDEF00000000000000000000000000000000aa";
const FALLBACK_RPC: &str = "http://127.0.0.1:8545";

struct FakeWallet {
    provider: DynProvider,
    authorized: Mutex<Vec<Address>>,
    on_request: Mutex<Result<Vec<Address>, WalletError>>,
    /// When set, `request_accounts` waits for a notification first.
    request_gate: Mutex<Option<Arc<Notify>>>,
    events: broadcast::Sender<WalletEvent>,
}

impl FakeWallet {
    fn new(provider: DynProvider) -> Self {
        let (events, _) = broadcast::channel(8);
        Self {
            provider,
            authorized: Mutex::new(Vec::new()),
            on_request: Mutex::new(Ok(Vec::new())),
            request_gate: Mutex::new(None),
            events,
        }
    }

    fn authorized(self, accounts: Vec<Address>) -> Self {
        *self.authorized.lock().unwrap() = accounts;
        self
    }

    fn on_request(self, result: Result<Vec<Address>, WalletError>) -> Self {
        *self.on_request.lock().unwrap() = result;
        self
    }

    fn gated(self, gate: Arc<Notify>) -> Self {
        *self.request_gate.lock().unwrap() = Some(gate);
        self
    }
}

impl WalletProvider for FakeWallet {
    async fn authorized_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.authorized.lock().unwrap().clone())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let gate = self.request_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.on_request.lock().unwrap().clone()
    }

    fn provider(&self) -> DynProvider {
        self.provider.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

fn addr(raw: &str) -> Address {
    Address::from_str(raw).unwrap()
}

fn config() -> SessionConfig {
    SessionConfig::new(Address::repeat_byte(0xfa), FALLBACK_RPC)
}

fn mocked() -> (Asserter, DynProvider) {
    let asserter = Asserter::new();
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_mocked_client(asserter.clone())
        .erased();
    (asserter, provider)
}

fn push_admin(asserter: &Asserter, admin: Address) {
    asserter.push_success(&Bytes::from(
        IPropertyFactory::governmentAddressCall::abi_encode_returns(&admin),
    ));
}

fn assert_invariants(state: &SessionState) {
    assert_eq!(state.is_connected, state.account.is_some());
    if !state.is_connected {
        assert!(!state.is_admin);
    }
}

#[tokio::test]
async fn no_wallet_falls_back_to_read_only() {
    let session = WalletSession::<FakeWallet>::new(config(), None);
    session.initialize().await;

    let state = session.state();
    assert_eq!(state.connection, ConnectionState::ProviderUnavailable);
    assert!(!state.is_connected);
    assert!(!state.is_loading);
    assert!(state
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("Wallet not installed")));
    assert_invariants(&state);

    let handle = session
        .get_property_contract("0x1111111111111111111111111111111111111111")
        .expect("fallback provider serves read-only handles");
    assert_eq!(handle.address(), Address::repeat_byte(0x11));
    assert!(matches!(session.signer(), Err(SessionError::NotConnected)));
}

#[tokio::test]
async fn connect_without_wallet_sets_error() {
    let session = WalletSession::<FakeWallet>::new(config(), None);
    session.connect_wallet().await;

    let state = session.state();
    assert!(!state.is_connected);
    assert!(state.last_error.is_some());
}

#[tokio::test]
async fn initialize_reconnects_pre_authorized_admin() {
    let (asserter, provider) = mocked();
    push_admin(&asserter, addr(ADMIN_MIXED));
    let wallet = FakeWallet::new(provider).authorized(vec![addr(ADMIN_LOWER)]);

    let session = WalletSession::new(config(), Some(wallet));
    session.initialize().await;

    let state = session.state();
    assert_eq!(state.connection, ConnectionState::Connected);
    assert_eq!(state.account, Some(addr(ADMIN_LOWER)));
    assert!(state.is_admin);
    assert!(!state.is_loading);
    assert!(session.factory().is_some());
    session.shutdown();
}

#[tokio::test]
async fn initialize_with_no_authorized_accounts_is_disconnected() {
    let (_asserter, provider) = mocked();
    let session = WalletSession::new(config(), Some(FakeWallet::new(provider)));
    session.initialize().await;

    let state = session.state();
    assert_eq!(state.connection, ConnectionState::Disconnected);
    assert!(state.last_error.is_none());
    assert_invariants(&state);
    session.shutdown();
}

#[tokio::test]
async fn connect_adopts_first_account() {
    let (asserter, provider) = mocked();
    let first = Address::repeat_byte(0xaa);
    let second = Address::repeat_byte(0xbb);
    push_admin(&asserter, Address::repeat_byte(0x99));
    let wallet = FakeWallet::new(provider).on_request(Ok(vec![first, second]));

    let session = WalletSession::new(config(), Some(wallet));
    session.connect_wallet().await;

    let state = session.state();
    assert_eq!(state.account, Some(first));
    assert!(state.is_connected);
    assert!(!state.is_admin);
    assert_eq!(session.signer().unwrap(), first);
}

#[tokio::test]
async fn rejected_connect_keeps_prior_state() {
    let (asserter, provider) = mocked();
    let account = Address::repeat_byte(0xaa);
    push_admin(&asserter, account);
    let wallet = FakeWallet::new(provider)
        .authorized(vec![account])
        .on_request(Err(WalletError::Rejected("User rejected the request.".into())));

    let session = WalletSession::new(config(), Some(wallet));
    session.initialize().await;
    let before = session.state();

    session.connect_wallet().await;
    let after = session.state();

    assert_eq!(after.account, before.account);
    assert_eq!(after.is_admin, before.is_admin);
    assert!(after.is_admin);
    assert!(after
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("Authorization rejected")));
    session.shutdown();
}

#[tokio::test]
async fn admin_comparison_ignores_hex_case() {
    let (asserter, provider) = mocked();
    push_admin(&asserter, addr(ADMIN_MIXED));
    let wallet = FakeWallet::new(provider).on_request(Ok(vec![addr(ADMIN_LOWER)]));

    let session = WalletSession::new(config(), Some(wallet));
    session.connect_wallet().await;
    assert!(session.is_admin());
}

#[tokio::test]
async fn admin_read_failure_is_caught() {
    let (asserter, provider) = mocked();
    asserter.push_failure_msg("execution reverted");
    let wallet = FakeWallet::new(provider).on_request(Ok(vec![Address::repeat_byte(0xaa)]));

    let session = WalletSession::new(config(), Some(wallet));
    session.connect_wallet().await;

    let state = session.state();
    assert!(state.is_connected);
    assert!(!state.is_admin);
    assert!(state
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("Contract read failed")));
}

#[tokio::test]
async fn disconnect_clears_identity_and_keeps_handles() {
    let (asserter, provider) = mocked();
    let admin = Address::repeat_byte(0xaa);
    push_admin(&asserter, admin);
    let wallet = FakeWallet::new(provider).on_request(Ok(vec![admin]));

    let session = WalletSession::new(config(), Some(wallet));
    session.connect_wallet().await;
    let property = "0x2222222222222222222222222222222222222222";
    assert!(session.get_property_contract(property).is_some());

    session.disconnect_wallet();

    let state = session.state();
    assert_eq!(state.account, None);
    assert!(!state.is_connected);
    assert!(!state.is_admin);
    assert_eq!(state.connection, ConnectionState::Disconnected);
    assert_eq!(session.registry().cached_instances(), 1);
    assert!(session.get_property_contract(property).is_some());
}

#[tokio::test]
async fn account_notifications_track_latest_set() {
    let (asserter, provider) = mocked();
    let admin = Address::repeat_byte(0xaa);
    let other = Address::repeat_byte(0xbb);
    let session = WalletSession::new(config(), Some(FakeWallet::new(provider)));

    push_admin(&asserter, admin);
    session
        .handle_event(WalletEvent::AccountsChanged(vec![admin, other]))
        .await;
    assert_eq!(session.account(), Some(admin));
    assert!(session.is_admin());

    push_admin(&asserter, admin);
    session
        .handle_event(WalletEvent::AccountsChanged(vec![other]))
        .await;
    let state = session.state();
    assert_eq!(state.account, Some(other));
    assert!(!state.is_admin, "admin flag must not survive an account switch");

    session.handle_event(WalletEvent::AccountsChanged(vec![])).await;
    let state = session.state();
    assert!(!state.is_connected);
    assert_invariants(&state);

    push_admin(&asserter, admin);
    session
        .handle_event(WalletEvent::AccountsChanged(vec![admin]))
        .await;
    let state = session.state();
    assert_eq!(state.account, Some(admin));
    assert!(state.is_admin);
    assert_invariants(&state);
}

#[tokio::test]
async fn stale_admin_result_is_discarded() {
    let (asserter, provider) = mocked();
    let admin = Address::repeat_byte(0xaa);
    let current = Address::repeat_byte(0xbb);
    let session = WalletSession::new(config(), Some(FakeWallet::new(provider)));

    push_admin(&asserter, current);
    session
        .handle_event(WalletEvent::AccountsChanged(vec![current]))
        .await;
    assert!(session.is_admin());

    // A late resolution for a previous account must not touch the current one.
    push_admin(&asserter, admin);
    session.resolve_contracts(admin).await;
    assert_eq!(session.account(), Some(current));
    assert!(session.is_admin());
}

#[tokio::test]
async fn property_contract_lookup_never_panics() {
    let session = WalletSession::<FakeWallet>::new(config(), None);
    assert!(session
        .get_property_contract("0x3333333333333333333333333333333333333333")
        .is_none());
    assert!(session.get_property_contract("not an address").is_none());

    session.initialize().await;
    assert!(session.get_property_contract("0x12").is_none());
}

#[tokio::test]
async fn chain_change_reinitializes_and_drops_handles() {
    let (asserter, provider) = mocked();
    let account = Address::repeat_byte(0xaa);
    push_admin(&asserter, account);
    let wallet = FakeWallet::new(provider).authorized(vec![account]);

    let session = WalletSession::new(config(), Some(wallet));
    session.initialize().await;
    session
        .get_property_contract("0x4444444444444444444444444444444444444444")
        .unwrap();
    assert_eq!(session.registry().cached_instances(), 1);

    push_admin(&asserter, Address::repeat_byte(0x01));
    session.handle_event(WalletEvent::ChainChanged(11155111)).await;

    let state = session.state();
    assert_eq!(session.registry().cached_instances(), 0);
    assert_eq!(state.connection, ConnectionState::Connected);
    assert_eq!(state.account, Some(account));
    assert!(!state.is_admin);
    session.shutdown();
}

#[tokio::test]
async fn listener_applies_wallet_events() {
    let (asserter, provider) = mocked();
    let account = Address::repeat_byte(0xaa);
    push_admin(&asserter, account);
    let wallet = FakeWallet::new(provider).authorized(vec![account]);

    let session = WalletSession::new(config(), Some(wallet));
    session.initialize().await;
    assert!(session.state().is_connected);

    let mut changes = session.subscribe();
    session
        .wallet()
        .unwrap()
        .events
        .send(WalletEvent::AccountsChanged(Vec::new()))
        .unwrap();

    let state = tokio::time::timeout(
        Duration::from_secs(2),
        changes.wait_for(|s| !s.is_connected),
    )
    .await
    .expect("listener applied the event in time")
    .unwrap()
    .clone();
    assert_eq!(state.connection, ConnectionState::Disconnected);
    session.shutdown();
}

#[tokio::test]
async fn unusable_fallback_url_is_reported() {
    let config = SessionConfig::new(Address::repeat_byte(0xfa), "not a url");
    let session = WalletSession::<FakeWallet>::new(config, None);
    session.initialize().await;

    let state = session.state();
    assert_eq!(state.connection, ConnectionState::ProviderUnavailable);
    let error = state.last_error.unwrap_or_default();
    assert!(error.contains("Wallet not installed"), "{error}");
    assert!(error.contains("Invalid RPC URL"), "{error}");
    assert!(session
        .get_property_contract("0x1111111111111111111111111111111111111111")
        .is_none());
}

#[tokio::test]
async fn connect_with_zero_accounts_keeps_state() {
    let (asserter, provider) = mocked();
    let account = Address::repeat_byte(0xaa);
    push_admin(&asserter, account);
    let wallet = FakeWallet::new(provider)
        .authorized(vec![account])
        .on_request(Ok(Vec::new()));

    let session = WalletSession::new(config(), Some(wallet));
    session.initialize().await;
    let before = session.state();

    session.connect_wallet().await;
    let after = session.state();

    assert_eq!(after.connection, before.connection);
    assert_eq!(after.account, Some(account));
    assert!(after.is_admin);
    assert!(!after.is_loading);
    assert_eq!(after.last_error.as_deref(), Some("Wallet returned no accounts"));
    session.shutdown();
}

#[tokio::test]
async fn on_chain_admin_wins_over_configured_admin() {
    let (asserter, provider) = mocked();
    let configured = Address::repeat_byte(0xcc);
    let on_chain = Address::repeat_byte(0xdd);
    let wallet = FakeWallet::new(provider);
    let session = WalletSession::new(config().with_expected_admin(configured), Some(wallet));

    push_admin(&asserter, on_chain);
    session
        .handle_event(WalletEvent::AccountsChanged(vec![configured]))
        .await;
    assert!(!session.is_admin());

    push_admin(&asserter, on_chain);
    session
        .handle_event(WalletEvent::AccountsChanged(vec![on_chain]))
        .await;
    assert!(session.is_admin());
    assert!(session.state().last_error.is_none());
}

#[tokio::test]
async fn connect_reports_loading_while_pending() {
    let (asserter, provider) = mocked();
    let account = Address::repeat_byte(0xaa);
    push_admin(&asserter, account);
    let gate = Arc::new(Notify::new());
    let wallet = FakeWallet::new(provider)
        .on_request(Ok(vec![account]))
        .gated(Arc::clone(&gate));

    let session = WalletSession::new(config(), Some(wallet));
    let mut changes = session.subscribe();
    let connecting = tokio::spawn({
        let session = session.clone();
        async move { session.connect_wallet().await }
    });

    tokio::time::timeout(Duration::from_secs(2), changes.wait_for(|s| s.is_loading))
        .await
        .expect("connect marked the session as loading")
        .unwrap();
    assert!(!session.state().is_connected);

    gate.notify_one();
    connecting.await.unwrap();

    let state = session.state();
    assert!(!state.is_loading);
    assert_eq!(state.account, Some(account));
}

#[tokio::test]
async fn initialize_after_shutdown_resubscribes() {
    let (asserter, provider) = mocked();
    let account = Address::repeat_byte(0xaa);
    push_admin(&asserter, account);
    push_admin(&asserter, account);
    let wallet = FakeWallet::new(provider).authorized(vec![account]);

    let session = WalletSession::new(config(), Some(wallet));
    session.initialize().await;
    session.shutdown();
    session.initialize().await;
    assert!(session.state().is_connected);

    let mut changes = session.subscribe();
    session
        .wallet()
        .unwrap()
        .events
        .send(WalletEvent::AccountsChanged(Vec::new()))
        .unwrap();

    tokio::time::timeout(
        Duration::from_secs(2),
        changes.wait_for(|s| !s.is_connected),
    )
    .await
    .expect("restarted listener applied the event")
    .unwrap();
    session.shutdown();
}
