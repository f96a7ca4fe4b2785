use hroute_common::db::indices::{ConnId, NodeId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    /// The search ran out of candidates before reaching the sink. Points at
    /// a malformed graph or a disconnected source/sink pair, not congestion.
    #[error("{connection} of net '{net}': sink {sink} unreachable from {driver}")]
    UnreachableSink {
        connection: ConnId,
        net: String,
        driver: NodeId,
        sink: NodeId,
    },

    #[error("routing did not converge after {trials} trials ({} overused nodes)", .overused.len())]
    TrialBudgetExhausted { trials: usize, overused: Vec<NodeId> },

    #[error("connection {0} does not exist")]
    InvalidConnection(ConnId),
}
