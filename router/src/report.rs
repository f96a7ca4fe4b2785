use crate::error::RouteError;
use hroute_common::db::indices::NodeId;
use std::time::Duration;

/// Progress of one negotiation trial.
#[derive(Clone, Debug)]
pub struct TrialRecord {
    pub trial: usize,
    pub alpha: f32,
    /// Present-congestion factor the trial was routed with.
    pub pres_fac: f32,
    pub elapsed: Duration,
    pub rerouted: usize,
    pub opins_committed: usize,
    pub overused_nodes: usize,
    pub wirelength: u64,
}

#[derive(Clone, Debug)]
pub struct RouteReport {
    pub pass: String,
    pub success: bool,
    pub budget: usize,
    pub trials: Vec<TrialRecord>,
    /// Overused nodes on the pass's routes when it ended, sorted.
    pub overused: Vec<NodeId>,
    pub runtime: Duration,
}

impl RouteReport {
    pub fn num_trials(&self) -> usize {
        self.trials.len()
    }

    pub fn final_wirelength(&self) -> Option<u64> {
        self.trials.last().map(|t| t.wirelength)
    }

    /// Turns an unsuccessful report into a hard error.
    pub fn into_result(self) -> Result<RouteReport, RouteError> {
        if self.success {
            Ok(self)
        } else {
            Err(RouteError::TrialBudgetExhausted {
                trials: self.budget,
                overused: self.overused,
            })
        }
    }
}
