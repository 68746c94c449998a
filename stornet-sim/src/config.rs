//! Load the simulation scenario from file and environment.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Scenario file: `--config <path>`, else ~/.config/stornet/sim.toml or /etc/stornet/sim.toml.
/// Env overrides: STORNET_CHUNKS_PER_STEP, STORNET_STEP_INTERVAL_MS, STORNET_CONCURRENT.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Chunks completed per step unless a transfer sets its own (default 2).
    #[serde(default = "default_chunks_per_step")]
    pub chunks_per_step: usize,
    /// Delay between steps of one transfer in `fixed` pacing (default 100 ms).
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    #[serde(default)]
    pub pacing: Pacing,
    /// Wall-clock fraction of the link-estimated duration used by `link` pacing.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    /// Drive all transfers at once instead of one after another.
    #[serde(default)]
    pub concurrent: bool,
    #[serde(default)]
    pub engine: stornet_core::Config,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
    #[serde(default)]
    pub transfers: Vec<TransferEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Sleep `step_interval_ms` between steps.
    #[default]
    Fixed,
    /// Spread steps over the transfer's estimated duration on its link, times `time_scale`.
    Link,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeEntry {
    pub name: String,
    pub cpu: u32,
    pub memory_gb: u64,
    pub storage_gb: u64,
    pub bandwidth_mbps: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkEntry {
    pub a: String,
    pub b: String,
    pub bandwidth_mbps: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferEntry {
    pub source: String,
    pub target: String,
    pub file_name: String,
    pub size_mb: u64,
    pub chunks_per_step: Option<usize>,
}

fn default_chunks_per_step() -> usize {
    2
}
fn default_step_interval_ms() -> u64 {
    100
}
fn default_time_scale() -> f64 {
    0.01
}

impl Default for SimConfig {
    /// The three-node demo: Node-A/B/C fully meshed, three transfers.
    fn default() -> Self {
        let node = |name: &str, cpu, memory_gb, storage_gb, bandwidth_mbps| NodeEntry {
            name: name.to_string(),
            cpu,
            memory_gb,
            storage_gb,
            bandwidth_mbps,
        };
        let link = |a: &str, b: &str, bandwidth_mbps| LinkEntry {
            a: a.to_string(),
            b: b.to_string(),
            bandwidth_mbps,
        };
        let transfer = |source: &str, target: &str, file_name: &str, size_mb, step| TransferEntry {
            source: source.to_string(),
            target: target.to_string(),
            file_name: file_name.to_string(),
            size_mb,
            chunks_per_step: Some(step),
        };
        Self {
            chunks_per_step: default_chunks_per_step(),
            step_interval_ms: default_step_interval_ms(),
            pacing: Pacing::default(),
            time_scale: default_time_scale(),
            concurrent: false,
            engine: stornet_core::Config::default(),
            nodes: vec![
                node("Node-A", 4, 8, 50, 100),
                node("Node-B", 8, 16, 100, 200),
                node("Node-C", 4, 8, 75, 150),
            ],
            links: vec![
                link("Node-A", "Node-B", 100),
                link("Node-B", "Node-C", 150),
                link("Node-A", "Node-C", 80),
            ],
            transfers: vec![
                transfer("Node-A", "Node-B", "dataset_1.csv", 50, 2),
                transfer("Node-A", "Node-C", "model_weights.pkl", 30, 3),
                transfer("Node-B", "Node-C", "training_data.zip", 80, 2),
            ],
        }
    }
}

/// Load config: explicit path (errors are fatal), else the first default path that
/// exists, else the built-in demo; then env vars.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<SimConfig> {
    let mut c = match explicit {
        Some(p) => read(p)?,
        None => load_file().unwrap_or_default(),
    };
    apply_env(&mut c, |k| std::env::var(k).ok());
    Ok(c)
}

fn read(path: &Path) -> anyhow::Result<SimConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse(&s).with_context(|| format!("invalid config: {}", path.display()))
}

fn parse(s: &str) -> anyhow::Result<SimConfig> {
    let c: SimConfig = toml::from_str(s)?;
    c.engine.validate()?;
    Ok(c)
}

fn apply_env(c: &mut SimConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("STORNET_CHUNKS_PER_STEP") {
        if let Ok(n) = s.parse::<usize>() {
            c.chunks_per_step = n;
        }
    }
    if let Some(s) = var("STORNET_STEP_INTERVAL_MS") {
        if let Ok(ms) = s.parse::<u64>() {
            c.step_interval_ms = ms;
        }
    }
    if let Some(s) = var("STORNET_CONCURRENT") {
        if let Ok(b) = s.parse::<bool>() {
            c.concurrent = b;
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/stornet/sim.toml"));
    }
    out.push(PathBuf::from("/etc/stornet/sim.toml"));
    out
}

fn load_file() -> Option<SimConfig> {
    for p in config_paths() {
        if p.exists() {
            match read(&p) {
                Ok(c) => return Some(c),
                Err(e) => tracing::warn!(error = %e, "failed to load config, using defaults"),
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_demo_scenario() {
        let c = SimConfig::default();
        assert_eq!(c.nodes.len(), 3);
        assert_eq!(c.links.len(), 3);
        assert_eq!(c.transfers.len(), 3);
        assert_eq!(c.transfers[1].chunks_per_step, Some(3));
        assert_eq!(c.engine.chunk_size_bytes, stornet_core::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn parse_scenario() {
        let s = r#"
            chunks_per_step = 4
            pacing = "link"
            concurrent = true

            [engine]
            chunk_size_bytes = 524288

            [[nodes]]
            name = "A"
            cpu = 2
            memory_gb = 4
            storage_gb = 10
            bandwidth_mbps = 50

            [[nodes]]
            name = "B"
            cpu = 2
            memory_gb = 4
            storage_gb = 10
            bandwidth_mbps = 50

            [[links]]
            a = "A"
            b = "B"
            bandwidth_mbps = 50

            [[transfers]]
            source = "A"
            target = "B"
            file_name = "x.bin"
            size_mb = 5
        "#;
        let c: SimConfig = toml::from_str(s).unwrap();
        assert_eq!(c.chunks_per_step, 4);
        assert_eq!(c.step_interval_ms, 100);
        assert_eq!(c.pacing, Pacing::Link);
        assert!(c.concurrent);
        assert_eq!(c.engine.chunk_size_bytes, 512 * 1024);
        assert_eq!(c.nodes.len(), 2);
        assert_eq!(c.transfers[0].chunks_per_step, None);
    }

    #[test]
    fn chunk_size_below_floor_rejected() {
        let err = parse("[engine]\nchunk_size_bytes = 1").unwrap_err();
        assert!(err.to_string().contains("minimum"), "{err}");
        assert!(parse("[engine]\nchunk_size_bytes = 4096").is_ok());
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(toml::from_str::<SimConfig>("chunk_per_step = 1").is_err());
    }

    #[test]
    fn env_overrides() {
        let mut c = SimConfig::default();
        apply_env(&mut c, |k| match k {
            "STORNET_CHUNKS_PER_STEP" => Some("7".into()),
            "STORNET_STEP_INTERVAL_MS" => Some("not-a-number".into()),
            "STORNET_CONCURRENT" => Some("true".into()),
            _ => None,
        });
        assert_eq!(c.chunks_per_step, 7);
        assert_eq!(c.step_interval_ms, 100);
        assert!(c.concurrent);
    }
}
