//! Simulation commands.
//!
//! Each command spawns a fixed population of worker threads that drive one or
//! more coordination components, joins them, and returns a report.

pub mod adc;
pub mod buffer;
pub mod telemetry;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fmt::Display;
use std::thread::JoinHandle;

/// Outcome of a simulation run.
pub trait Report: Serialize + Display {}

impl<T: Serialize + Display> Report for T {}

/// Print a report as text, or as JSON when `json` is set.
pub fn emit<R: Report>(report: &R, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("failed to encode report")?;
        println!("{}", text);
    } else {
        println!("{}", report);
    }
    Ok(())
}

/// Join worker threads in spawn order, surfacing the first failure.
pub(crate) fn join_workers<T>(workers: Vec<JoinHandle<Result<T>>>) -> Result<Vec<T>> {
    workers
        .into_iter()
        .enumerate()
        .map(|(index, handle)| {
            handle
                .join()
                .map_err(|_| anyhow!("worker {} panicked", index))?
                .with_context(|| format!("worker {} failed", index))
        })
        .collect()
}
