//! Stepping loop: admit each configured transfer and step it until done, pacing between
//! steps. The engine never waits; all timing lives here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use stornet_core::{
    scheduler, Admission, NodeSpec, ResourceNode, TransferError, TransferId, VirtualNetwork, MBPS,
    MIB,
};
use tokio::sync::{watch, Mutex};

use crate::config::{Pacing, SimConfig, TransferEntry};

pub type SharedNetwork = Arc<Mutex<VirtualNetwork>>;

/// Outcome of one configured transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub file_name: String,
    pub source: String,
    pub target: String,
    pub size_bytes: u64,
    pub file_id: Option<TransferId>,
    pub chunks: usize,
    pub steps: usize,
    pub status: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Completed,
    Denied(String),
    Cancelled,
    Failed(String),
}

/// Stop request seen by every transfer task. Once triggered, tasks cancel their own
/// transfer at the next step boundary and report it.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    /// Send `true` on the returned sender to stop.
    pub fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self(rx))
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once stop is requested. Never resolves if the sender is dropped without one.
    pub async fn triggered(&mut self) {
        if self.0.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Build nodes and links. Topology errors are configuration mistakes and abort the run.
pub fn build_network(cfg: &SimConfig) -> anyhow::Result<VirtualNetwork> {
    let mut net = VirtualNetwork::with_config(cfg.engine);
    for n in &cfg.nodes {
        let spec = NodeSpec::from_gb_mbps(n.cpu, n.memory_gb, n.storage_gb, n.bandwidth_mbps);
        let id = net
            .add_node(ResourceNode::new(n.name.clone(), spec))
            .with_context(|| format!("node {:?}", n.name))?;
        tracing::info!(node = %n.name, %id, storage_gb = n.storage_gb, bandwidth_mbps = n.bandwidth_mbps, "node created");
    }
    for l in &cfg.links {
        net.connect_nodes(&l.a, &l.b, l.bandwidth_mbps.saturating_mul(MBPS))
            .with_context(|| format!("link {:?} - {:?}", l.a, l.b))?;
        tracing::info!(a = %l.a, b = %l.b, bandwidth_mbps = l.bandwidth_mbps, "link established");
    }
    Ok(net)
}

/// Drive every configured transfer, one after another or all at once. Every task is
/// awaited, so a stopped run still reports each transfer.
pub async fn run(net: SharedNetwork, cfg: &SimConfig, shutdown: Shutdown) -> Vec<TransferReport> {
    if !cfg.concurrent {
        let mut out = Vec::with_capacity(cfg.transfers.len());
        for entry in &cfg.transfers {
            out.push(drive_transfer(net.clone(), entry.clone(), cfg.clone(), shutdown.clone()).await);
        }
        return out;
    }
    let handles: Vec<_> = cfg
        .transfers
        .iter()
        .cloned()
        .map(|entry| {
            tokio::spawn(drive_transfer(net.clone(), entry, cfg.clone(), shutdown.clone()))
        })
        .collect();
    let mut out = Vec::with_capacity(handles.len());
    for (h, entry) in handles.into_iter().zip(&cfg.transfers) {
        match h.await {
            Ok(r) => out.push(r),
            Err(e) => out.push(report(entry, None, 0, 0, Outcome::Failed(e.to_string()))),
        }
    }
    out
}

/// Admit one transfer and step it to completion, or until shutdown. The lock is held
/// only for the duration of each engine call, never across a sleep.
pub async fn drive_transfer(
    net: SharedNetwork,
    entry: TransferEntry,
    cfg: SimConfig,
    mut shutdown: Shutdown,
) -> TransferReport {
    if shutdown.is_triggered() {
        return report(&entry, None, 0, 0, Outcome::Cancelled);
    }
    let size = entry.size_mb.saturating_mul(MIB);
    let per_step = entry.chunks_per_step.unwrap_or(cfg.chunks_per_step).max(1);

    let admission = net
        .lock()
        .await
        .initiate_file_transfer(&entry.source, &entry.target, &entry.file_name, size);
    let transfer = match admission {
        Admission::Admitted(t) => t,
        Admission::Denied(reason) => {
            tracing::warn!(file = %entry.file_name, %reason, "transfer not admitted");
            return report(&entry, None, 0, 0, Outcome::Denied(reason.to_string()));
        }
    };
    let file_id = transfer.file_id();
    let chunks = transfer.chunks().len();
    let interval = step_interval(&cfg, &transfer, per_step);
    tracing::info!(file = %entry.file_name, %file_id, chunks, ?interval, "transfer initiated");

    let mut steps = 0usize;
    loop {
        if shutdown.is_triggered() {
            let status = cancel_own(&net, file_id).await;
            tracing::info!(file = %entry.file_name, %file_id, ?status, "stopped on shutdown");
            return report(&entry, Some(file_id), chunks, steps, status);
        }
        let result = net
            .lock()
            .await
            .process_file_transfer(&entry.source, &entry.target, file_id, per_step);
        steps += 1;
        match result {
            Ok(out) if out.fully_completed => {
                return report(&entry, Some(file_id), chunks, steps, Outcome::Completed);
            }
            Ok(_) => {
                let done = net
                    .lock()
                    .await
                    .transfer(file_id)
                    .map(|t| t.completed_chunks())
                    .unwrap_or(0);
                tracing::info!(file = %entry.file_name, "progress: {done}/{chunks} chunks transferred");
            }
            Err(TransferError::Cancelled(_)) => {
                return report(&entry, Some(file_id), chunks, steps, Outcome::Cancelled);
            }
            Err(e) => {
                return report(&entry, Some(file_id), chunks, steps, Outcome::Failed(e.to_string()));
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.triggered() => {}
        }
    }
}

/// Cancel `file_id`, releasing its reservation. A transfer that finished first stays completed.
async fn cancel_own(net: &SharedNetwork, file_id: TransferId) -> Outcome {
    match net.lock().await.cancel_transfer(file_id) {
        Ok(()) | Err(TransferError::Cancelled(_)) => Outcome::Cancelled,
        Err(TransferError::AlreadyCompleted(_)) => Outcome::Completed,
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

fn step_interval(cfg: &SimConfig, transfer: &stornet_core::Transfer, per_step: usize) -> Duration {
    match cfg.pacing {
        Pacing::Fixed => Duration::from_millis(cfg.step_interval_ms),
        Pacing::Link => {
            let steps = scheduler::steps_to_finish(transfer, per_step).max(1) as f64;
            let scale = if cfg.time_scale.is_finite() && cfg.time_scale > 0.0 {
                cfg.time_scale
            } else {
                0.0
            };
            let secs = transfer.estimated_duration().as_secs_f64() * scale / steps;
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        }
    }
}

fn report(
    entry: &TransferEntry,
    file_id: Option<TransferId>,
    chunks: usize,
    steps: usize,
    status: Outcome,
) -> TransferReport {
    TransferReport {
        file_name: entry.file_name.clone(),
        source: entry.source.clone(),
        target: entry.target.clone(),
        size_bytes: entry.size_mb.saturating_mul(MIB),
        file_id,
        chunks,
        steps,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(mut cfg: SimConfig) -> SimConfig {
        cfg.step_interval_ms = 0;
        cfg
    }

    /// A handle that never fires.
    fn idle() -> Shutdown {
        let (tx, shutdown) = Shutdown::new();
        drop(tx);
        shutdown
    }

    #[tokio::test]
    async fn demo_scenario_completes_sequentially() {
        let cfg = fast(SimConfig::default());
        let net: SharedNetwork = Arc::new(Mutex::new(build_network(&cfg).unwrap()));
        let reports = run(net.clone(), &cfg, idle()).await;
        assert!(reports.iter().all(|r| r.status == Outcome::Completed));
        // 50 MiB at 2 chunks per step.
        assert_eq!(reports[0].chunks, 50);
        assert_eq!(reports[0].steps, 25);

        let net = net.lock().await;
        let stats = net.network_stats();
        assert_eq!(stats.used_storage_bytes, 160 * MIB);
        assert_eq!(stats.active_transfers, 0);
        assert_eq!(net.node("Node-C").unwrap().stored_files().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_run_reconciles() {
        let mut cfg = fast(SimConfig::default());
        cfg.concurrent = true;
        let net: SharedNetwork = Arc::new(Mutex::new(build_network(&cfg).unwrap()));
        let reports = run(net.clone(), &cfg, idle()).await;
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.status == Outcome::Completed));
        let net = net.lock().await;
        let sum: u64 = net.topology().nodes().map(|n| n.used_storage_bytes()).sum();
        assert_eq!(net.network_stats().used_storage_bytes, sum);
    }

    #[tokio::test]
    async fn oversized_transfer_is_denied() {
        let mut cfg = fast(SimConfig::default());
        cfg.transfers.truncate(1);
        cfg.transfers[0].size_mb = 200 * 1024;
        let net: SharedNetwork = Arc::new(Mutex::new(build_network(&cfg).unwrap()));
        let reports = run(net, &cfg, idle()).await;
        assert!(matches!(reports[0].status, Outcome::Denied(_)));
        assert_eq!(reports[0].file_id, None);
    }

    #[tokio::test]
    async fn shutdown_mid_sequential_run_keeps_partial_reports() {
        let mut cfg = SimConfig::default();
        cfg.step_interval_ms = 5;
        let net: SharedNetwork = Arc::new(Mutex::new(build_network(&cfg).unwrap()));
        let (tx, shutdown) = Shutdown::new();

        let watcher = {
            let net = net.clone();
            tokio::spawn(async move {
                loop {
                    {
                        let n = net.lock().await;
                        let second = n.transfers().find(|t| t.file_name() == "model_weights.pkl");
                        if second.is_some_and(|t| t.is_complete()) {
                            return;
                        }
                        // Trigger while the second transfer still has several steps to go.
                        if second.is_some_and(|t| t.completed_chunks() + 9 < t.chunks().len()) {
                            drop(n);
                            tx.send(true).unwrap();
                            return;
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        };

        let reports = run(net.clone(), &cfg, shutdown).await;
        watcher.await.unwrap();
        let status: Vec<_> = reports.iter().map(|r| r.status.clone()).collect();
        assert_eq!(status, [Outcome::Completed, Outcome::Cancelled, Outcome::Cancelled]);
        assert!(reports[1].file_id.is_some());
        assert_eq!(reports[2].file_id, None);

        let net = net.lock().await;
        let stats = net.network_stats();
        assert_eq!(stats.used_storage_bytes, 50 * MIB);
        assert_eq!(stats.active_transfers, 0);
        assert_eq!(stats.transfers_in_progress, 0);
    }

    #[tokio::test]
    async fn shutdown_before_concurrent_run_cancels_everything() {
        let mut cfg = fast(SimConfig::default());
        cfg.concurrent = true;
        let net: SharedNetwork = Arc::new(Mutex::new(build_network(&cfg).unwrap()));
        let (tx, shutdown) = Shutdown::new();
        tx.send(true).unwrap();
        let reports = run(net.clone(), &cfg, shutdown).await;
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.status == Outcome::Cancelled));
        assert_eq!(net.lock().await.network_stats().used_storage_bytes, 0);
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_long_step_interval() {
        let mut cfg = SimConfig::default();
        cfg.transfers.truncate(1);
        cfg.step_interval_ms = 3_600_000;
        let net: SharedNetwork = Arc::new(Mutex::new(build_network(&cfg).unwrap()));
        let (tx, shutdown) = Shutdown::new();
        let handle = tokio::spawn({
            let net = net.clone();
            async move { run(net, &cfg, shutdown).await }
        });
        while net.lock().await.network_stats().transfers_in_progress == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tx.send(true).unwrap();
        let reports = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("run did not stop")
            .unwrap();
        assert_eq!(reports[0].status, Outcome::Cancelled);
        assert!(reports[0].steps <= 1);
        assert_eq!(net.lock().await.network_stats().used_storage_bytes, 0);
    }

    #[test]
    fn bad_topology_is_an_error() {
        let mut cfg = SimConfig::default();
        cfg.links[0].b = "Node-Z".into();
        assert!(build_network(&cfg).is_err());
    }

    #[test]
    fn link_pacing_spreads_estimated_duration() {
        let mut cfg = SimConfig::default();
        cfg.pacing = Pacing::Link;
        cfg.time_scale = 1.0;
        let mut net = build_network(&cfg).unwrap();
        // 10 MiB over 100 Mbps, 10 steps of one chunk.
        let t = match net.initiate_file_transfer("Node-A", "Node-B", "f", 10 * MIB) {
            Admission::Admitted(t) => t,
            Admission::Denied(r) => panic!("denied: {r}"),
        };
        let per_step = step_interval(&cfg, &t, 1);
        let total = t.estimated_duration();
        assert!((per_step.as_secs_f64() * 10.0 - total.as_secs_f64()).abs() < 1e-6);
    }
}
