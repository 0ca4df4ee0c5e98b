//! Sample-and-transmit run.
//!
//! Every worker fills a block of samples from the shared device, then borrows
//! one link from a fixed pool, transmits its block to the receiver over that
//! link, and returns the link.

use anyhow::{Context, Result};
use clap::Args;
use cordon_sync::{
    ExclusiveResource, InputChannels, Monitor, MonitorStats, ResourcePool, RoleId, RoleRegistry,
};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;

use super::adc::collect_samples;
use super::join_workers;
use crate::pacing::Pacer;
use crate::settings::SimulationConfig;

/// Arguments for the telemetry command
#[derive(Debug, Clone, Default, Args)]
pub struct TelemetryArgs {
    /// Number of sampling workers
    #[clap(long)]
    pub workers: Option<usize>,

    /// Number of links in the pool
    #[clap(long)]
    pub links: Option<usize>,

    /// Samples per transmitted block
    #[clap(long)]
    pub block_size: Option<usize>,
}

impl TelemetryArgs {
    /// Apply command-line overrides to the loaded settings
    pub fn apply(&self, settings: &mut SimulationConfig) {
        if let Some(workers) = self.workers {
            settings.workers = workers;
            settings.input_channels = settings.input_channels.max(workers);
        }
        if let Some(links) = self.links {
            settings.coordinator.pool_capacity = links;
        }
        if let Some(block_size) = self.block_size {
            settings.block_size = block_size;
        }
    }
}

/// Collects the sample blocks transmitted over the links.
#[derive(Default)]
pub struct Receiver {
    blocks: Monitor<BTreeMap<RoleId, Vec<f64>>>,
}

impl Receiver {
    /// Create an empty receiver
    pub fn new() -> Self {
        Self {
            blocks: Monitor::with_name(BTreeMap::new(), "receiver"),
        }
    }

    /// Store `block` as the data of `role`, replacing any earlier block
    pub fn receive_block(&self, role: RoleId, block: Vec<f64>) {
        self.blocks.lock().insert(role, block);
    }

    /// Snapshot of every received block
    pub fn blocks(&self) -> BTreeMap<RoleId, Vec<f64>> {
        self.blocks.lock().clone()
    }
}

/// One data link to the receiver.
pub struct Link {
    id: usize,
    receiver: Arc<Receiver>,
    registry: Arc<RoleRegistry>,
}

impl Link {
    /// Create link `id` feeding `receiver`
    pub fn new(id: usize, receiver: Arc<Receiver>, registry: Arc<RoleRegistry>) -> Self {
        Self {
            id,
            receiver,
            registry,
        }
    }

    /// Write `block` to the receiver on behalf of the calling thread's role
    pub fn transmit(&self, block: Vec<f64>) {
        let role = self.registry.current();
        self.receiver.receive_block(role, block);
        info!("Worker {} transmitted data over link {}", role, self.id);
    }
}

/// One worker's transmission
#[derive(Debug, Clone, Serialize)]
pub struct Transmission {
    /// The worker
    pub role: RoleId,

    /// Link the block went over
    pub link: usize,

    /// Number of samples in the block
    pub samples: usize,

    /// How long the worker held the link (ms)
    pub link_held_ms: u64,
}

/// Outcome of a telemetry run
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryReport {
    /// Number of links in the pool
    pub links: usize,

    /// Highest number of links held at once, as seen by the workers
    pub peak_links_in_use: usize,

    /// Per-worker transmissions, in worker order
    pub transmissions: Vec<Transmission>,

    /// Blocks as stored by the receiver
    pub received: BTreeMap<RoleId, Vec<f64>>,

    /// Device monitor statistics
    pub device: MonitorStats,

    /// Link pool monitor statistics
    pub pool: MonitorStats,
}

impl fmt::Display for TelemetryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (role, block) in &self.received {
            let values: Vec<String> = block.iter().map(|v| v.to_string()).collect();
            writeln!(f, "Sample data from worker {}: {}", role, values.join(", "))?;
        }
        write!(
            f,
            "{} blocks over {} links (peak {} in use, {} link waits)",
            self.transmissions.len(),
            self.links,
            self.peak_links_in_use,
            self.pool.wait_count
        )
    }
}

/// Run the sample-and-transmit simulation
pub fn run(settings: &SimulationConfig) -> Result<TelemetryReport> {
    let device = Arc::new(ExclusiveResource::with_wake_policy(
        InputChannels::new(settings.input_channels),
        settings.coordinator.device_wake_policy,
    ));
    let receiver = Arc::new(Receiver::new());
    let registry = Arc::new(RoleRegistry::new());
    let links = ResourcePool::from_fn(settings.coordinator.pool_capacity, |id| {
        Link::new(id, Arc::clone(&receiver), Arc::clone(&registry))
    })?;
    let pacer = Pacer::new(settings.delay_min_ms, settings.delay_max_ms);

    info!(
        "Launching {} workers over {} links",
        settings.workers,
        links.capacity()
    );

    let workers = (0..settings.workers)
        .map(|id| {
            let device = Arc::clone(&device);
            let links = Arc::clone(&links);
            let registry = Arc::clone(&registry);
            let role = RoleId::new(id as u32);
            let block_size = settings.block_size;

            thread::Builder::new()
                .name(format!("telemetry-{}", id))
                .spawn(move || -> Result<(Transmission, usize)> {
                    registry.register(role);

                    let block = collect_samples(&device, role, block_size, &pacer)?;
                    let samples = block.len();

                    let link = links.acquire(role);
                    let in_use = links.held_count();
                    pacer.pause();
                    link.resource().transmit(block);
                    let link_id = link.id();
                    let link_held_ms = link.held_duration().as_millis() as u64;
                    link.release()?;

                    info!("Worker {} finished executing", role);
                    Ok((
                        Transmission {
                            role,
                            link: link_id,
                            samples,
                            link_held_ms,
                        },
                        in_use,
                    ))
                })
                .context("failed to spawn telemetry worker")
        })
        .collect::<Result<Vec<_>>>()?;

    let results = join_workers(workers)?;
    info!("All workers terminated");

    let peak_links_in_use = results.iter().map(|(_, in_use)| *in_use).max().unwrap_or(0);
    let transmissions = results.into_iter().map(|(t, _)| t).collect();

    Ok(TelemetryReport {
        links: links.capacity(),
        peak_links_in_use,
        transmissions,
        received: receiver.blocks(),
        device: device.stats(),
        pool: links.stats(),
    })
}
