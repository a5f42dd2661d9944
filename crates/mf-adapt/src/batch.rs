//! Independent adaptation runs in parallel.

use mf_network::Network;
use mf_solver::FlowConfig;
use rayon::prelude::*;

use crate::config::AdaptationConfig;
use crate::engine::{AdaptationOutcome, run_adaptation};
use crate::error::AdaptResult;

/// One network with its own configuration.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub name: String,
    pub network: Network,
    pub flow: FlowConfig,
    pub adaptation: AdaptationConfig,
}

/// A finished job: the adapted network and how the run ended.
#[derive(Debug)]
pub struct BatchResult {
    pub name: String,
    pub network: Network,
    pub outcome: AdaptResult<AdaptationOutcome>,
}

/// Run every job on the rayon pool. Results keep the job order.
///
/// Each job owns its network, so a failure in one leaves the others untouched.
pub fn run_batch(jobs: Vec<BatchJob>) -> Vec<BatchResult> {
    jobs.into_par_iter()
        .map(|mut job| {
            let outcome = run_adaptation(&mut job.network, &job.flow, &job.adaptation);
            if let Err(e) = &outcome {
                tracing::warn!(job = %job.name, error = %e, "batch job failed");
            }
            BatchResult {
                name: job.name,
                network: job.network,
                outcome,
            }
        })
        .collect()
}
