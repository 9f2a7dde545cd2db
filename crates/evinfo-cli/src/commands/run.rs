//! Run command implementation.
//!
//! Runs one polling session against a Wi-Fi adapter or the simulator and
//! stores every flushed record. The session ends on Ctrl-C, when the
//! requested duration has elapsed, or when the adapter goes away.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, sleep_until};
use tracing::{info, warn};

use evinfo_core::{
    CommandCatalog, Controller, MockAdapter, MockAdapterBuilder, SessionEvent, TcpTransport,
    TelemetryRecord,
};
use evinfo_store::Store;

use super::resolve_db_path;
use crate::cli::{OutputFormat, RunArgs};
use crate::config::Config;
use crate::format::{
    format_event_json, format_event_text, format_snapshot_json, format_snapshot_text,
    format_value_text,
};

pub async fn cmd_run(args: RunArgs, config: &Config, quiet: bool) -> Result<()> {
    let mut session = config.session.clone();
    if let Some(ms) = args.poll_interval {
        session = session.poll_interval(Duration::from_millis(ms));
    }

    let db_path = resolve_db_path(&args.db, config);
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let (records, pending) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_records(store, pending));

    let (controller, mock): (Controller, Option<MockAdapter>) = if args.mock {
        let (adapter, events) = MockAdapterBuilder::new().jitter(true).build();
        let controller = Controller::spawn(
            adapter.clone(),
            events,
            records,
            session,
            CommandCatalog::default(),
        )?;
        (controller, Some(adapter))
    } else {
        let address = args.address.as_deref().unwrap_or(&config.adapter.address);
        let timeout = Duration::from_secs(config.adapter.connect_timeout_secs);
        if !quiet {
            eprintln!("Connecting to adapter at {address}...");
        }
        let (transport, events) = TcpTransport::connect(address, timeout)
            .await
            .with_context(|| format!("Failed to connect to adapter at {address}"))?;
        let controller =
            Controller::spawn(transport, events, records, session, CommandCatalog::default())?;
        (controller, None)
    };

    let mut events = controller.subscribe();
    if let Some(adapter) = &mock {
        adapter.connect().await;
    }

    let started = Instant::now();
    let stop_at = args.duration.map(|secs| started + Duration::from_secs(secs));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                if !quiet {
                    eprintln!("\nShutting down...");
                }
                break;
            }
            () = wait_until(stop_at) => {
                info!("Run duration elapsed");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    let disconnected = matches!(event, SessionEvent::Disconnected { .. });
                    print_event(&event, args.format, started.elapsed(), &controller, quiet)?;
                    if disconnected {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Output fell behind, skipped {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    controller.shutdown().await;
    let saved = writer.await.context("Record writer task failed")?;
    if !quiet {
        eprintln!("Saved {saved} records to {}", db_path.display());
    }
    Ok(())
}

fn print_event(
    event: &SessionEvent,
    format: OutputFormat,
    elapsed: Duration,
    controller: &Controller,
    quiet: bool,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            print!("{}", format_event_json(event)?);
            if matches!(event, SessionEvent::RecordFlushed { .. }) {
                print!("{}", format_snapshot_json(&controller.snapshot())?);
            }
        }
        OutputFormat::Text => match event {
            SessionEvent::Telemetry { value } => print!("{}", format_value_text(value, elapsed)),
            SessionEvent::RecordFlushed { .. } => {
                print!("{}", format_snapshot_text(&controller.snapshot()));
            }
            other => {
                if let Some(line) = format_event_text(other)
                    && !quiet
                {
                    eprint!("{line}");
                }
            }
        },
    }
    Ok(())
}

/// Drain flushed records into the store until the session drops its sender.
///
/// Inserts run inline on the runtime: there is one per flush window.
async fn write_records(
    store: Store,
    mut pending: mpsc::UnboundedReceiver<TelemetryRecord>,
) -> usize {
    let mut saved = 0;
    while let Some(record) = pending.recv().await {
        match store.insert_record(&record) {
            Ok(true) => saved += 1,
            Ok(false) => {}
            Err(e) => warn!("Failed to store record {}: {e}", record.id),
        }
    }
    saved
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
