use serde::{Deserialize, Deserializer};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub input: InputConfig,
}

/// Key used to order connections inside a trial, highest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionOrder {
    #[default]
    Fanout,
    BoundingBox,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_max_trials")]
    pub max_trials: usize,
    #[serde(default = "default_route_all")]
    pub route_all: bool,
    /// First trial at which nets get a committed output pin. `None` (written
    /// as `0` in a config file) disables.
    #[serde(
        default = "default_fix_opins_from",
        deserialize_with = "deserialize_trial_threshold"
    )]
    pub fix_opins_from: Option<usize>,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_initial_pres_fac")]
    pub initial_pres_fac: f32,
    #[serde(default = "default_pres_fac_mult")]
    pub pres_fac_mult: f32,
    #[serde(default = "default_acc_fac")]
    pub acc_fac: f32,
    #[serde(default = "default_bb_factor")]
    pub bb_factor: i32,
    #[serde(default)]
    pub connection_order: ConnectionOrder,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_trials: default_max_trials(),
            route_all: default_route_all(),
            fix_opins_from: default_fix_opins_from(),
            alpha: default_alpha(),
            initial_pres_fac: default_initial_pres_fac(),
            pres_fac_mult: default_pres_fac_mult(),
            acc_fac: default_acc_fac(),
            bb_factor: default_bb_factor(),
            connection_order: ConnectionOrder::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_fabric_width")]
    pub width: u32,
    #[serde(default = "default_fabric_height")]
    pub height: u32,
    #[serde(default = "default_channel_width")]
    pub channel_width: u32,
    #[serde(default = "default_opins_per_tile")]
    pub opins_per_tile: u32,
    #[serde(default = "default_ipins_per_tile")]
    pub ipins_per_tile: u32,
    #[serde(default = "default_num_nets")]
    pub num_nets: usize,
    #[serde(default = "default_max_fanout")]
    pub max_fanout: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            width: default_fabric_width(),
            height: default_fabric_height(),
            channel_width: default_channel_width(),
            opins_per_tile: default_opins_per_tile(),
            ipins_per_tile: default_ipins_per_tile(),
            num_nets: default_num_nets(),
            max_fanout: default_max_fanout(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_problem_file")]
    pub problem_file: String,
    #[serde(default = "default_output_routes")]
    pub output_routes: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            problem_file: default_problem_file(),
            output_routes: default_output_routes(),
        }
    }
}

fn default_max_trials() -> usize {
    100
}

fn default_route_all() -> bool {
    true
}

fn default_fix_opins_from() -> Option<usize> {
    Some(4)
}

fn deserialize_trial_threshold<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let trial = usize::deserialize(deserializer)?;
    Ok((trial > 0).then_some(trial))
}

fn default_alpha() -> f32 {
    1.5
}

fn default_initial_pres_fac() -> f32 {
    0.6
}

fn default_pres_fac_mult() -> f32 {
    2.0
}

fn default_acc_fac() -> f32 {
    1.0
}

fn default_bb_factor() -> i32 {
    3
}

fn default_fabric_width() -> u32 {
    8
}

fn default_fabric_height() -> u32 {
    8
}

fn default_channel_width() -> u32 {
    6
}

fn default_opins_per_tile() -> u32 {
    2
}

fn default_ipins_per_tile() -> u32 {
    4
}

fn default_num_nets() -> usize {
    24
}

fn default_max_fanout() -> usize {
    3
}

fn default_seed() -> u64 {
    1
}

fn default_problem_file() -> String {
    "inputs/fabric.rrg".to_string()
}

fn default_output_routes() -> String {
    "output/routes.txt".to_string()
}
