// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic agent loops
//!
//! Three independent timers: reconciliation, heartbeat, discovery refresh.
//! Each loop selects between its interval tick and the shared shutdown
//! signal, and finishes its in-flight work before exiting. Native-scheduler
//! mutation is single-flight per process: a pass runs to completion inside
//! its loop before the next tick is serviced.

use crate::client::{CollectorClient, HeartbeatRequest};
use cor_adapters::SchedulerAdapter;
use cor_engine::{Discovery, Reconciler};
use cor_manifest::Parser;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

fn ticker(interval: Duration) -> tokio::time::Interval {
    // the caller has already run the startup iteration; first tick comes one
    // full interval later
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Re-parse manifests and converge the native scheduler, forever.
pub async fn reconcile_loop<S: SchedulerAdapter>(
    reconciler: Reconciler<S>,
    parser: Parser,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = ticker(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => reconcile_pass(&reconciler, &parser).await,
            _ = shutdown.changed() => {
                info!("reconcile loop stopping");
                return;
            }
        }
    }
}

/// One full cycle: refresh desired state, gate on drift, reconcile.
pub async fn reconcile_pass<S: SchedulerAdapter>(reconciler: &Reconciler<S>, parser: &Parser) {
    // fail static: with no readable desired state, the machine keeps its
    // last-known-good schedule
    let definitions = match parser.parse_all() {
        Ok(definitions) => definitions,
        Err(e) => {
            warn!(error = %e, "desired-state fetch failed, skipping pass");
            return;
        }
    };

    match reconciler.detect_drift(&definitions).await {
        Ok(false) => {
            debug!("no drift, scheduler matches desired state");
            return;
        }
        Ok(true) => info!("drift detected, reconciling"),
        Err(e) => {
            warn!(error = %e, "drift check failed, skipping pass");
            return;
        }
    }

    match reconciler.reconcile(&definitions).await {
        Ok(changes) => info!(changes, "reconciliation complete"),
        Err(e) => warn!(error = %e, "reconciliation failed"),
    }
}

/// Tell the collector this endpoint is alive, forever.
pub async fn heartbeat_loop(
    client: CollectorClient,
    endpoint_id: u64,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    send_heartbeat(&client, endpoint_id).await;
    let mut ticker = ticker(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => send_heartbeat(&client, endpoint_id).await,
            _ = shutdown.changed() => {
                info!("heartbeat loop stopping");
                return;
            }
        }
    }
}

async fn send_heartbeat(client: &CollectorClient, endpoint_id: u64) {
    let client = client.clone();
    let result = tokio::task::spawn_blocking(move || {
        client.heartbeat(
            endpoint_id,
            &HeartbeatRequest {
                status: "active".to_string(),
                platform: std::env::consts::OS.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )
    })
    .await;

    match result {
        Ok(Ok(())) => debug!(endpoint_id, "heartbeat sent"),
        Ok(Err(e)) => warn!(error = %e, "heartbeat failed"),
        Err(e) => warn!(error = %e, "heartbeat task failed"),
    }
}

/// Surface unmanaged entries to the authoring system, forever.
pub async fn discovery_loop<S: SchedulerAdapter>(
    discovery: Discovery<S>,
    client: CollectorClient,
    endpoint_id: u64,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    report_discovered(&discovery, &client, endpoint_id).await;
    let mut ticker = ticker(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => report_discovered(&discovery, &client, endpoint_id).await,
            _ = shutdown.changed() => {
                info!("discovery loop stopping");
                return;
            }
        }
    }
}

async fn report_discovered<S: SchedulerAdapter>(
    discovery: &Discovery<S>,
    client: &CollectorClient,
    endpoint_id: u64,
) {
    let candidates = match discovery.discover().await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, "discovery enumeration failed");
            return;
        }
    };
    if candidates.is_empty() {
        debug!("no unmanaged entries to report");
        return;
    }

    let count = candidates.len();
    let client = client.clone();
    let result =
        tokio::task::spawn_blocking(move || client.report_discovered(endpoint_id, &candidates))
            .await;

    match result {
        Ok(Ok(())) => info!(count, "reported discovered jobs"),
        Ok(Err(e)) => warn!(error = %e, "failed to report discovered jobs"),
        Err(e) => warn!(error = %e, "discovery report task failed"),
    }
}

#[cfg(test)]
#[path = "loops_tests.rs"]
mod tests;
