use clap::{Parser, Subcommand};
use hroute_common::db::parser::problem;
use hroute_common::util::config::Config;
use hroute_common::util::{check, generator, logger};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route the configured problem file.
    Route,
    /// Write a synthetic island-style fabric with random nets.
    Generate {
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        channel_width: Option<u32>,
        #[arg(long)]
        nets: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        output: Option<String>,
    },
    /// Verify a routes file against the configured problem.
    Check {
        #[arg(long)]
        routes: Option<String>,
    },
    /// Generate, then route.
    Flow,
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let mut config = if args.config.exists() {
        log::info!("Loading configuration from {:?}", args.config);
        let config_str = std::fs::read_to_string(&args.config)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?
    } else {
        log::warn!(
            "Configuration file {:?} not found. Using internal defaults.",
            args.config
        );
        Config::default()
    };

    let command = args.command.unwrap_or(Commands::Route);

    match command {
        Commands::Generate {
            width,
            height,
            channel_width,
            nets,
            seed,
            output,
        } => {
            let gen_cfg = &mut config.generator;
            if let Some(w) = width {
                gen_cfg.width = w;
            }
            if let Some(h) = height {
                gen_cfg.height = h;
            }
            if let Some(cw) = channel_width {
                gen_cfg.channel_width = cw;
            }
            if let Some(n) = nets {
                gen_cfg.num_nets = n;
            }
            if let Some(s) = seed {
                gen_cfg.seed = s;
            }
            let output = output.unwrap_or_else(|| config.input.problem_file.clone());
            run_generate(&config, &output)?;
        }
        Commands::Route => {
            validate_input_path(&config.input.problem_file)?;
            prepare_output_dir(&config.input.output_routes)?;

            if let Err(e) = run_routing(&config) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Check { routes } => {
            validate_input_path(&config.input.problem_file)?;
            let routes = routes.unwrap_or_else(|| config.input.output_routes.clone());
            validate_input_path(&routes)?;

            if let Err(e) = run_check(&config, &routes) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Flow => {
            let output = config.input.problem_file.clone();
            run_generate(&config, &output)?;
            prepare_output_dir(&config.input.output_routes)?;

            if let Err(e) = run_routing(&config) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn validate_input_path(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).exists() {
        return Err(anyhow::anyhow!("Input file missing: {}", path));
    }
    Ok(())
}

fn prepare_output_dir(path_str: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path_str).parent() {
        if !parent.exists() && !parent.as_os_str().is_empty() {
            log::info!("Creating output directory: {:?}", parent);
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn run_generate(config: &Config, output: &str) -> anyhow::Result<()> {
    prepare_output_dir(output)?;
    let p = generator::generate_fabric(&config.generator);
    problem::write(&p, output)?;
    log::info!("Generated: {}", output);
    Ok(())
}

fn run_routing(config: &Config) -> anyhow::Result<()> {
    let p = problem::parse(&config.input.problem_file)?;
    let mut circuit = p
        .build_circuit(config.routing.bb_factor)
        .map_err(|e| anyhow::anyhow!("Invalid netlist in '{}': {}", config.input.problem_file, e))?;

    if circuit.num_connections() == 0 {
        log::warn!("Nothing to route.");
        return Ok(());
    }

    log::info!("Starting Routing...");
    let report = hroute_router::route(&p.graph, &mut circuit, &config.routing)?;

    log::info!(
        "{}: {} after {} trials in {} ms, wirelength {}",
        report.pass,
        if report.success { "success" } else { "failure" },
        report.num_trials(),
        report.runtime.as_millis(),
        report.final_wirelength().unwrap_or(0)
    );
    report.into_result()?;

    check::run(&p.graph, &circuit).map_err(|e| anyhow::anyhow!("Verification Failed: {}", e))?;

    log::info!("Writing routes to {}", config.input.output_routes);
    problem::write_routes(&circuit, &config.input.output_routes)?;

    Ok(())
}

fn run_check(config: &Config, routes: &str) -> anyhow::Result<()> {
    let p = problem::parse(&config.input.problem_file)?;
    let mut circuit = p
        .build_circuit(config.routing.bb_factor)
        .map_err(|e| anyhow::anyhow!("Invalid netlist in '{}': {}", config.input.problem_file, e))?;

    let loaded = problem::parse_routes(&p.graph, &mut circuit, routes)?;
    log::info!("Loaded {} routes from {}", loaded, routes);

    check::run(&p.graph, &circuit).map_err(|e| anyhow::anyhow!("Verification Failed: {}", e))
}
