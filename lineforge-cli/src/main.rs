use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use lineforge_config::AppConfig;
use lineforge_core::{run_provision, ProvisionSettings};
use lineforge_gateway::{load_snapshot, InMemoryAdServer};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "lineforge",
    version,
    about = "Declarative line-item provisioning for ad-serving platforms."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Provision the configured object graph: advertisers, orders,
    /// creatives, line items, and their associations.
    Create(CreateArgs),
    /// Show the expanded configuration: CPM points, batches, and fan-out.
    Show(ShowArgs),
}

#[derive(Debug, Parser)]
struct CreateArgs {
    /// Path to the declarative configuration file.
    config: Utf8PathBuf,

    /// Inventory snapshot (YAML) seeding the built-in in-memory ad server.
    /// Configured ad unit and placement names must resolve against it.
    #[arg(long)]
    inventory: Option<Utf8PathBuf>,

    /// Simulate creation without mutating the ad server.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Leave created orders in place if the run fails.
    #[arg(long, default_value_t = false)]
    skip_auto_archive: bool,

    /// Print the outcome as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Parser)]
struct ShowArgs {
    /// Path to the declarative configuration file.
    config: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        error!("{:?}", e);
        eprintln!("error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Create(args) => cmd_create(args),
        Command::Show(args) => cmd_show(args),
    }
}

fn cmd_create(args: CreateArgs) -> anyhow::Result<()> {
    let config = AppConfig::load(&args.config)?;
    let gateway = match &args.inventory {
        Some(path) => InMemoryAdServer::from_snapshot(load_snapshot(path)?),
        None => InMemoryAdServer::new(),
    };
    let settings = ProvisionSettings {
        dry_run: args.dry_run,
        skip_auto_archive: args.skip_auto_archive,
    };

    let outcome = run_provision(&settings, &config, &gateway)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("serialize outcome")?
        );
    } else {
        println!(
            "{}: {} advertisers, {} orders, {} creatives, {} line items, {} associations",
            if outcome.dry_run { "dry run" } else { "created" },
            outcome.advertisers,
            outcome.orders.len(),
            outcome.creatives,
            outcome.line_items,
            outcome.associations,
        );
    }
    Ok(())
}

fn cmd_show(args: ShowArgs) -> anyhow::Result<()> {
    let config = AppConfig::load(&args.config)?;
    let points = config.cpm_points();
    let batches = config.cpm_batches();

    let bidders: Vec<&str> = config.bidders.iter().map(|b| b.code.as_str()).collect();
    let media_types: Vec<&str> = config
        .media_types
        .iter()
        .map(|media| media.as_str())
        .collect();

    println!("bidders:     {}", bidders.join(", "));
    println!("media types: {}", media_types.join(", "));
    match (points.first(), points.last()) {
        (Some(min), Some(max)) => {
            println!("cpm points:  {} ({}..{})", points.len(), min, max);
        }
        _ => println!("cpm points:  0"),
    }
    println!(
        "batches:     {} (size {})",
        batches.len(),
        config.rate.cpm_batch_size
    );

    let builders = config.bidders.len() * config.media_types.len() * batches.len();
    let line_items = config.bidders.len() * config.media_types.len() * points.len();
    let associations: usize = config.bidders.len()
        * config
            .media_types
            .iter()
            .map(|media| {
                let creatives = config.sizes_for(*media).len();
                batches.iter().map(|batch| batch.len() * creatives).sum::<usize>()
            })
            .sum::<usize>();

    println!(
        "fan-out:     {} price batches -> {} line items, {} associations",
        builders, line_items, associations
    );
    Ok(())
}
