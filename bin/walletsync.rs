use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use walletsync::{
    utils::{short_id, u256_to_f64},
    AccountHandle, AccountManager, AnyStore, RpcChainClient, Settings,
};

/// Token decimals assumed when printing balances
const DISPLAY_DECIMALS: u8 = 18;

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    SimpleLogger::new()
        .with_level(LevelFilter::from_str(&settings.log_level).unwrap_or(LevelFilter::Info))
        .init()
        .context("Failed to install logger")?;

    let client = Arc::new(
        RpcChainClient::new(
            &settings.chain.rpc_url,
            Duration::from_millis(settings.chain.rpc_timeout_milliseconds),
        )
        .context("Failed to create RPC client")?,
    );

    let store = Arc::new(AnyStore::from_settings(settings.persistence.as_ref()));

    let cancellation_token = CancellationToken::new();

    let mut manager = AccountManager::new(
        client,
        store,
        &settings.chain,
        settings.sync.clone(),
        cancellation_token.child_token(),
    );

    let handles = manager.start_all(&settings.accounts).await;
    if handles.is_empty() {
        error!("No accounts configured, nothing to sync");
        return Ok(());
    }

    info!("Syncing {} account(s)", handles.len());

    let observer_token = cancellation_token.child_token();
    let observer_handles: Vec<_> = handles
        .into_iter()
        .map(|handle| tokio::spawn(observe(handle, observer_token.clone())))
        .collect();

    let manager_handle = tokio::spawn(manager.run());

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Wallet sync running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    info!("Finishing all tasks...");

    cancellation_token.cancel();

    info!("Waiting for account loops to stop...");
    let _ = manager_handle.await;

    for handle in observer_handles {
        let _ = handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Log a one-line summary whenever an account publishes new activity.
async fn observe(handle: AccountHandle, cancellation_token: CancellationToken) {
    let tag = short_id(&handle.address);
    let mut receiver = handle.subscribe();
    let mut last_notifications = receiver.borrow().notifications;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            changed = receiver.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let snapshot = receiver.borrow_and_update().clone();
        if snapshot.notifications == last_notifications {
            continue;
        }
        last_notifications = snapshot.notifications;

        info!(
            "[{}] {} transaction(s), balance {:.6}, synced to block {}",
            tag,
            snapshot.transactions.len(),
            u256_to_f64(snapshot.balance, DISPLAY_DECIMALS),
            snapshot.from_block
        );
    }
}
