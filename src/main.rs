// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, process, sync::Arc, time::Duration};

use alloy::primitives::U256;
use estate_session::{
    config::{
        WALLET_KEY_PEM_ENV, WALLET_POLL_INTERVAL_MS_ENV, WALLET_PRIVATE_KEY_ENV,
        WALLET_RPC_URL_ENV,
    },
    property::short_address,
    telemetry, Catalog, ListingFilter, RpcWallet, SessionConfig, SignerWallet, WalletProvider,
    WalletSession,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const USAGE: &str = "usage: estate-session [status | marketplace [search] | pending | mine | owner <address> | property <id> | watch]";

#[tokio::main]
async fn main() {
    telemetry::init();

    let config = match SessionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            process::exit(2);
        }
    };
    let args: Vec<String> = env::args().skip(1).collect();
    let shutdown = CancellationToken::new();

    let code = if let Ok(key) = env::var(WALLET_PRIVATE_KEY_ENV) {
        let rpc_url = wallet_rpc_url(&config);
        match SignerWallet::from_hex_keys(&rpc_url, &[key.as_str()]) {
            Ok(wallet) => run(config, Some(wallet.pre_authorized()), &args).await,
            Err(e) => fail(e),
        }
    } else if let Ok(path) = env::var(WALLET_KEY_PEM_ENV) {
        let rpc_url = wallet_rpc_url(&config);
        let loaded = std::fs::read(&path)
            .map_err(|e| format!("{path}: {e}"))
            .and_then(|bytes| SignerWallet::from_pem(&rpc_url, &bytes).map_err(|e| e.to_string()));
        match loaded {
            Ok(wallet) => run(config, Some(wallet.pre_authorized()), &args).await,
            Err(e) => fail(e),
        }
    } else if let Ok(rpc_url) = env::var(WALLET_RPC_URL_ENV) {
        match RpcWallet::connect(&rpc_url) {
            Ok(wallet) => {
                let wallet = match poll_interval() {
                    Some(interval) => Arc::new(wallet.with_poll_interval(interval)),
                    None => Arc::new(wallet),
                };
                tokio::spawn(Arc::clone(&wallet).watch(shutdown.clone()));
                run(config, Some(wallet), &args).await
            }
            Err(e) => fail(e),
        }
    } else {
        run::<SignerWallet>(config, None, &args).await
    };

    shutdown.cancel();
    process::exit(code);
}

fn wallet_rpc_url(config: &SessionConfig) -> String {
    env::var(WALLET_RPC_URL_ENV).unwrap_or_else(|_| config.fallback_rpc_url.clone())
}

fn poll_interval() -> Option<Duration> {
    let raw = env::var(WALLET_POLL_INTERVAL_MS_ENV).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            error!(value = %raw, "Ignoring invalid {WALLET_POLL_INTERVAL_MS_ENV}");
            None
        }
    }
}

fn fail(e: impl std::fmt::Display) -> i32 {
    error!(error = %e, "Failed to load wallet");
    2
}

async fn run<W: WalletProvider>(config: SessionConfig, wallet: Option<W>, args: &[String]) -> i32 {
    let session = WalletSession::new(config, wallet);
    session.initialize().await;

    let state = session.state();
    info!(
        connection = ?state.connection,
        account = ?state.account.as_ref().map(short_address),
        is_admin = state.is_admin,
        "Session ready"
    );

    let catalog = Catalog::new(session.clone());
    let command = args.first().map(String::as_str).unwrap_or("status");

    let code = match command {
        "status" => print_json(&session.state()),
        "marketplace" => {
            let filter = ListingFilter {
                search: args.get(1).cloned().unwrap_or_default(),
                ..ListingFilter::default()
            };
            report(catalog.marketplace(&filter).await)
        }
        "pending" => report(catalog.unverified_properties().await),
        "mine" => report(catalog.my_properties().await),
        "owner" => match args.get(1) {
            Some(owner) => report(catalog.properties_by_owner(owner).await),
            None => usage(),
        },
        "property" => match args.get(1).and_then(|raw| raw.parse::<U256>().ok()) {
            Some(id) => report(catalog.property_by_id(id).await),
            None => usage(),
        },
        "watch" => {
            watch(&session).await;
            0
        }
        _ => usage(),
    };

    session.shutdown();
    code
}

/// Print every session change until Ctrl-C.
async fn watch<W: WalletProvider>(session: &WalletSession<W>) {
    let mut changes = session.subscribe();
    print_json(&*changes.borrow_and_update());
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    return;
                }
                print_json(&*changes.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return;
            }
        }
    }
}

fn report<T: Serialize>(result: Result<T, estate_session::SessionError>) -> i32 {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Request failed");
            1
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize output");
            1
        }
    }
}

fn usage() -> i32 {
    eprintln!("{USAGE}");
    2
}
