//! Producer/consumer run over a bounded channel.
//!
//! Producers and consumers each make a fixed number of attempts. Before every
//! attempt a worker checks whether the opposite role is already gone and stops
//! early if so. On leaving its loop every worker announces its termination.

use anyhow::{Context, Result};
use clap::Args;
use cordon_sync::{BoundedChannel, ChannelConfig, MonitorStats, RoleId, RoleKind, Transfer};
use log::info;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread;

use super::join_workers;
use crate::pacing::Pacer;
use crate::settings::SimulationConfig;

/// Arguments for the buffer command
#[derive(Debug, Clone, Default, Args)]
pub struct BufferArgs {
    /// Channel capacity
    #[clap(long)]
    pub capacity: Option<usize>,

    /// Number of producers
    #[clap(long)]
    pub producers: Option<usize>,

    /// Number of consumers
    #[clap(long)]
    pub consumers: Option<usize>,

    /// Put/get attempts per worker
    #[clap(long)]
    pub iterations: Option<usize>,

    /// Pause after each put (ms)
    #[clap(long)]
    pub producer_delay_ms: Option<u64>,

    /// Pause after each get (ms)
    #[clap(long)]
    pub consumer_delay_ms: Option<u64>,
}

impl BufferArgs {
    /// Apply command-line overrides to the loaded settings
    pub fn apply(&self, settings: &mut SimulationConfig) {
        let coordinator = &mut settings.coordinator;
        if let Some(capacity) = self.capacity {
            coordinator.buffer_capacity = capacity;
        }
        if let Some(producers) = self.producers {
            coordinator.producers = producers;
        }
        if let Some(consumers) = self.consumers {
            coordinator.consumers = consumers;
        }
        if let Some(iterations) = self.iterations {
            settings.iterations = iterations;
        }
        if let Some(delay) = self.producer_delay_ms {
            settings.producer_delay_ms = delay;
        }
        if let Some(delay) = self.consumer_delay_ms {
            settings.consumer_delay_ms = delay;
        }
    }
}

/// What one producer or consumer did
#[derive(Debug, Clone, Serialize)]
pub struct RoleTally {
    /// The worker
    pub role: RoleId,

    /// Which side of the channel it was on
    pub kind: RoleKind,

    /// Transfers that completed
    pub completed: usize,

    /// Transfers abandoned because the opposite role was gone
    pub abandoned: usize,

    /// Whether the worker left its loop early on the pre-check
    pub stopped_early: bool,
}

/// Outcome of a buffer run
#[derive(Debug, Clone, Serialize)]
pub struct BufferReport {
    /// Capacity and role populations of the channel
    pub config: ChannelConfig,

    /// Items left in the channel after every worker terminated
    pub final_count: usize,

    /// Per-producer tallies
    pub producers: Vec<RoleTally>,

    /// Per-consumer tallies
    pub consumers: Vec<RoleTally>,

    /// Channel monitor statistics
    pub channel: MonitorStats,
}

impl BufferReport {
    /// Items deposited by all producers
    pub fn deposited(&self) -> usize {
        self.producers.iter().map(|t| t.completed).sum()
    }

    /// Items withdrawn by all consumers
    pub fn withdrawn(&self) -> usize {
        self.consumers.iter().map(|t| t.completed).sum()
    }

    /// Abandoned transfers across both roles
    pub fn abandoned(&self) -> usize {
        self.producers
            .iter()
            .chain(&self.consumers)
            .map(|t| t.abandoned)
            .sum()
    }
}

impl fmt::Display for BufferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tally in self.producers.iter().chain(&self.consumers) {
            writeln!(
                f,
                "{} {} finished: {} completed, {} abandoned{}",
                tally.kind,
                tally.role,
                tally.completed,
                tally.abandoned,
                if tally.stopped_early {
                    ", stopped early"
                } else {
                    ""
                }
            )?;
        }
        write!(
            f,
            "Deposited {}, withdrew {}, abandoned {}, {} left in a buffer of {}",
            self.deposited(),
            self.withdrawn(),
            self.abandoned(),
            self.final_count,
            self.config.capacity
        )
    }
}

fn run_role(
    channel: &BoundedChannel,
    kind: RoleKind,
    role: RoleId,
    iterations: usize,
    pacer: &Pacer,
) -> Result<RoleTally> {
    let mut tally = RoleTally {
        role,
        kind,
        completed: 0,
        abandoned: 0,
        stopped_early: false,
    };

    for _ in 0..iterations {
        let partner_gone = match kind.opposite() {
            RoleKind::Producer => channel.has_no_active_producers(),
            RoleKind::Consumer => channel.has_no_active_consumers(),
        };
        if partner_gone {
            tally.stopped_early = true;
            break;
        }

        let outcome = match kind {
            RoleKind::Producer => channel.put(role),
            RoleKind::Consumer => channel.get(role),
        };
        match outcome {
            Transfer::Completed { .. } => tally.completed += 1,
            Transfer::Abandoned => tally.abandoned += 1,
        }

        pacer.pause();
    }

    info!("{} {} finished", kind, role);
    match kind {
        RoleKind::Producer => channel.producer_terminated(role)?,
        RoleKind::Consumer => channel.consumer_terminated(role)?,
    }
    Ok(tally)
}

/// Run the producer/consumer simulation
pub fn run(settings: &SimulationConfig) -> Result<BufferReport> {
    let config = settings.coordinator.channel_config();
    let channel = Arc::new(BoundedChannel::new(config)?);
    let producer_pacer = Pacer::fixed(settings.producer_delay_ms);
    let consumer_pacer = Pacer::fixed(settings.consumer_delay_ms);

    info!(
        "Launching {} producers and {} consumers over a buffer of {}",
        config.producers, config.consumers, config.capacity
    );

    let roles = (0..config.producers)
        .map(|_| RoleKind::Producer)
        .chain((0..config.consumers).map(|_| RoleKind::Consumer));

    let workers = roles
        .enumerate()
        .map(|(id, kind)| {
            let channel = Arc::clone(&channel);
            let role = RoleId::new(id as u32);
            let iterations = settings.iterations;
            let pacer = match kind {
                RoleKind::Producer => producer_pacer,
                RoleKind::Consumer => consumer_pacer,
            };

            thread::Builder::new()
                .name(format!("{}-{}", kind, id))
                .spawn(move || run_role(&channel, kind, role, iterations, &pacer))
                .context("failed to spawn buffer worker")
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tallies = join_workers(workers)?;
    let consumers = tallies.split_off(config.producers);
    info!("All threads terminated");

    Ok(BufferReport {
        config: channel.config(),
        final_count: channel.count(),
        producers: tallies,
        consumers,
        channel: channel.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_settings(capacity: usize, producers: usize, consumers: usize) -> SimulationConfig {
        let mut settings = SimulationConfig::default();
        BufferArgs {
            capacity: Some(capacity),
            producers: Some(producers),
            consumers: Some(consumers),
            iterations: Some(50),
            producer_delay_ms: Some(0),
            consumer_delay_ms: Some(0),
        }
        .apply(&mut settings);
        settings
    }

    #[test]
    fn test_balance_matches_final_count() {
        let report = run(&quick_settings(10, 3, 2)).unwrap();

        assert_eq!(report.config, ChannelConfig::new(10, 3, 2));
        assert_eq!(report.producers.len(), 3);
        assert_eq!(report.consumers.len(), 2);
        assert_eq!(
            report.deposited(),
            report.withdrawn() + report.final_count
        );
        assert!(report.final_count <= 10);
    }

    #[test]
    fn test_surplus_producers_are_released() {
        // Producers attempt far more than consumers can take; they must not hang
        let report = run(&quick_settings(1, 4, 1)).unwrap();

        assert_eq!(report.withdrawn(), 50);
        assert_eq!(report.deposited(), report.withdrawn() + report.final_count);
        assert!(report
            .producers
            .iter()
            .all(|t| t.kind == RoleKind::Producer));
    }

    #[test]
    fn test_surplus_consumers_are_released() {
        let report = run(&quick_settings(2, 1, 4)).unwrap();

        assert_eq!(report.deposited(), 50);
        assert_eq!(report.deposited(), report.withdrawn() + report.final_count);
    }

    #[test]
    fn test_producer_and_consumer_pacing_are_separate() {
        let mut settings = quick_settings(2, 1, 1);
        BufferArgs {
            iterations: Some(10),
            consumer_delay_ms: Some(2),
            ..Default::default()
        }
        .apply(&mut settings);

        assert_eq!(settings.producer_delay_ms, 0);
        assert_eq!(settings.consumer_delay_ms, 2);

        // The consumer outlives the fast producer, so every put completes
        let report = run(&settings).unwrap();
        assert_eq!(report.deposited(), 10);
        assert_eq!(report.withdrawn() + report.final_count, 10);
        assert!(!report.producers[0].stopped_early);
        assert_eq!(report.producers[0].abandoned, 0);
    }
}
