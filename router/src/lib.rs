pub mod algo;
pub mod error;
pub mod pathfinder;
pub mod report;
pub mod state;

pub use error::RouteError;
pub use pathfinder::{Router, RoutingPass};
pub use report::{RouteReport, TrialRecord};

use hroute_common::db::circuit::Circuit;
use hroute_common::db::graph::ResourceGraph;
use hroute_common::util::config::RoutingConfig;

/// Routes every connection of `circuit` over `graph`. A report with
/// `success == false` means the trial budget ran out.
pub fn route(
    graph: &ResourceGraph,
    circuit: &mut Circuit,
    config: &RoutingConfig,
) -> Result<RouteReport, RouteError> {
    let mut router = Router::new(graph, config);
    router.route(circuit)
}
