//! Shared-device sampling run.
//!
//! Every worker repeatedly acquires the exclusive device, samples its own
//! input channel, releases the device, and pauses.

use anyhow::{Context, Result};
use clap::Args;
use cordon_sync::{ExclusiveResource, InputChannels, MonitorStats, RoleId};
use log::info;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread;

use super::join_workers;
use crate::pacing::Pacer;
use crate::settings::SimulationConfig;

/// Arguments for the adc command
#[derive(Debug, Clone, Default, Args)]
pub struct AdcArgs {
    /// Number of sampling workers
    #[clap(long)]
    pub workers: Option<usize>,

    /// Samples each worker takes
    #[clap(long)]
    pub samples: Option<usize>,
}

impl AdcArgs {
    /// Apply command-line overrides to the loaded settings
    pub fn apply(&self, settings: &mut SimulationConfig) {
        if let Some(workers) = self.workers {
            settings.workers = workers;
            settings.input_channels = settings.input_channels.max(workers);
        }
        if let Some(samples) = self.samples {
            settings.samples_per_worker = samples;
        }
    }
}

/// Samples taken by one worker
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSamples {
    /// The worker
    pub role: RoleId,

    /// Number of samples taken
    pub samples: usize,

    /// Value of the last sample, if any were taken
    pub last_value: Option<f64>,
}

/// Outcome of an adc run
#[derive(Debug, Clone, Serialize)]
pub struct AdcReport {
    /// Per-worker tallies, in worker order
    pub workers: Vec<WorkerSamples>,

    /// Device monitor statistics
    pub device: MonitorStats,
}

impl fmt::Display for AdcReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for worker in &self.workers {
            match worker.last_value {
                Some(value) => writeln!(
                    f,
                    "Worker {} took {} samples (value {})",
                    worker.role, worker.samples, value
                )?,
                None => writeln!(f, "Worker {} took no samples", worker.role)?,
            }
        }
        write!(
            f,
            "Device acquired {} times, {} waits",
            self.device.acquisition_count, self.device.wait_count
        )
    }
}

/// Acquire the device `count` times as `role`, sampling the role's own channel
/// each time and pausing after each release.
pub(crate) fn collect_samples(
    device: &ExclusiveResource,
    role: RoleId,
    count: usize,
    pacer: &Pacer,
) -> Result<Vec<f64>> {
    let mut samples = Vec::with_capacity(count);

    for _ in 0..count {
        device.acquire(role);
        let sample = device.sample(role);
        device.release(role)?;
        samples.push(sample?);

        pacer.pause();
    }

    Ok(samples)
}

/// Run the shared-device sampling simulation
pub fn run(settings: &SimulationConfig) -> Result<AdcReport> {
    let device = Arc::new(ExclusiveResource::with_wake_policy(
        InputChannels::new(settings.input_channels),
        settings.coordinator.device_wake_policy,
    ));
    let pacer = Pacer::new(settings.delay_min_ms, settings.delay_max_ms);

    info!("Launching {} sampling workers", settings.workers);

    let workers = (0..settings.workers)
        .map(|id| {
            let device = Arc::clone(&device);
            let role = RoleId::new(id as u32);
            let count = settings.samples_per_worker;

            thread::Builder::new()
                .name(format!("adc-{}", id))
                .spawn(move || -> Result<WorkerSamples> {
                    let samples = collect_samples(&device, role, count, &pacer)?;
                    info!("Worker {} finished executing", role);
                    Ok(WorkerSamples {
                        role,
                        samples: samples.len(),
                        last_value: samples.last().copied(),
                    })
                })
                .context("failed to spawn sampling worker")
        })
        .collect::<Result<Vec<_>>>()?;

    let workers = join_workers(workers)?;
    info!("All workers terminated");

    Ok(AdcReport {
        workers,
        device: device.stats(),
    })
}
