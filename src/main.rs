use aikv_router::cluster::{ClusterClient, ReadFrom, StaticTopology, Topology};
use aikv_router::observability::init_logging;
use aikv_router::transport::TcpTransport;
use aikv_router::{Config, RoutingDirective};
use anyhow::{bail, Context};
use std::sync::Arc;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line arguments structure
#[derive(Default)]
struct CliArgs {
    config_path: Option<String>,
    route: Option<String>,
    show_metrics: bool,
    show_help: bool,
    show_version: bool,
    command: Vec<String>,
}

fn print_help() {
    println!(
        "aikv-router v{} - cluster-aware command routing for AiKv / Redis Cluster",
        VERSION
    );
    println!();
    println!("USAGE:");
    println!("    aikv-router [OPTIONS] COMMAND [ARGS...]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>    Path to configuration file (TOML format)");
    println!("    -r, --route <ROUTE>    Explicit route: all-nodes, all-primaries, random,");
    println!("                           slot:<n>, replica-slot:<n>, key:<key>, <host:port>");
    println!("    -m, --metrics          Print routing metrics (JSON) after the reply");
    println!("    -h, --help             Print help information");
    println!("    -v, --version          Print version information");
    println!();
    println!("EXAMPLES:");
    println!("    aikv-router -c cluster.toml PING");
    println!("    aikv-router -c cluster.toml -r all-primaries INFO server");
    println!("    aikv-router -c cluster.toml GET user:1");
}

/// Parse command line arguments. Everything after the first non-option
/// word is the command.
fn parse_args() -> anyhow::Result<CliArgs> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                cli.show_help = true;
                return Ok(cli);
            }
            "-v" | "--version" => {
                cli.show_version = true;
                return Ok(cli);
            }
            "-m" | "--metrics" => cli.show_metrics = true,
            "-c" | "--config" => {
                let Some(path) = args.get(i + 1) else {
                    bail!("{} requires a file path argument", args[i]);
                };
                cli.config_path = Some(path.clone());
                i += 1;
            }
            "-r" | "--route" => {
                let Some(route) = args.get(i + 1) else {
                    bail!("{} requires a route argument", args[i]);
                };
                cli.route = Some(route.clone());
                i += 1;
            }
            arg if arg.starts_with('-') && cli.command.is_empty() => {
                bail!("Unknown option '{}'. Use --help for usage.", arg);
            }
            _ => {
                cli.command = args[i..].to_vec();
                break;
            }
        }
        i += 1;
    }

    Ok(cli)
}

async fn run(cli: CliArgs) -> anyhow::Result<()> {
    let config = match cli.config_path {
        Some(ref path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let log_config = config.logging.to_log_config()?;
    init_logging(&log_config);

    if cli.command.is_empty() {
        bail!("No command given. Use --help for usage.");
    }
    let route = cli
        .route
        .as_deref()
        .map(str::parse::<RoutingDirective>)
        .transpose()
        .context("invalid --route")?;

    let nodes = config.node_infos()?;
    if nodes.is_empty() {
        bail!("No [[nodes]] configured; pass a config file with -c");
    }
    let topology = Topology::new(nodes.clone()).context("invalid cluster topology")?;
    info!(nodes = topology.len(), "loaded topology from config");

    let transport =
        TcpTransport::new().with_replica_reads(config.client.read_from == ReadFrom::PreferReplica);
    let client = Arc::new(ClusterClient::with_topology(
        config.client.clone(),
        topology,
        Arc::new(StaticTopology::new(nodes)),
        Arc::new(transport),
    ));
    let _refresher = client.spawn_periodic_refresh();

    let value = client.execute_parts(&cli.command, route).await?;
    println!("{}", value);

    if cli.show_metrics {
        println!("{}", serde_json::to_string_pretty(&client.metrics().snapshot())?);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if cli.show_help {
        print_help();
        return;
    }
    if cli.show_version {
        println!("aikv-router {}", VERSION);
        return;
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
