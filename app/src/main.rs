use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use common::{
    config::Config,
    group::Dimensions,
    ingest::{FileTags, MergeOutcome, load_unified, select_files},
};
use eyre::{Context, Result};
use tokio::fs::read_to_string;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const MODULES: &[&str] = &["common", "stacked_phases"];

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Args)]
struct Input {
    /// Folder holding the measurement files
    #[arg(short, long, default_value = "./test_data/")]
    dir: PathBuf,
    /// Plot config, the byzcoin monitor layout is used without one
    #[arg(short, long)]
    config_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List measurement files and the tags their names encode
    Ls {
        #[command(flatten)]
        input: Input,
    },
    /// Merge measurement files and print what was found
    Summary {
        #[command(flatten)]
        input: Input,
    },
    /// Generate one report per (delay, keep, batch) partition
    Plot {
        #[command(flatten)]
        input: Input,
        /// Output folder, defaults to the measurement folder
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("sim_plot={log_level}"));

    if !args.log.is_empty() {
        for log in &args.log {
            env_filter = env_filter.add_directive(log.parse()?);
        }
    }

    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    let result = match args.command {
        Commands::Ls { input } => list_files(&input).await,
        Commands::Summary { input } => summary(&input).await,
        Commands::Plot { input, out } => plot(&input, out).await,
    };
    if let Err(err) = &result {
        error!("{err:#?}");
    }
    result
}

async fn load_config(config_file: Option<&Path>) -> Result<Config> {
    match config_file {
        Some(path) => {
            let content = read_to_string(path)
                .await
                .context(format!("Read config {}", path.display()))?;
            serde_yml::from_str(&content).context(format!("Parse config {}", path.display()))
        }
        None => Ok(stacked_phases::default_config()),
    }
}

async fn list_files(input: &Input) -> Result<()> {
    let config = load_config(input.config_file.as_deref()).await?;
    for path in select_files(&input.dir, &config.settings).await? {
        let FileTags { batch, keep } = FileTags::from_path(&path, &config.settings);
        println!("{} batch={batch} keep={keep}", path.display());
    }
    Ok(())
}

async fn summary(input: &Input) -> Result<()> {
    let config = load_config(input.config_file.as_deref()).await?;
    let (table, summary) = load_unified(&input.dir, &config.settings).await?;

    for file in &summary.files {
        match &file.outcome {
            MergeOutcome::Merged { rows } => println!("merged  {} ({rows} rows)", file.path.display()),
            MergeOutcome::Skipped(reason) => println!("skipped {}: {reason}", file.path.display()),
        }
    }
    println!("{summary}");
    println!("schema: {}", table.schema());

    let dimensions = Dimensions::index(&table)?;
    println!("delay: {:?}", dimensions.delays);
    println!("keep: {:?}", dimensions.keeps);
    println!("batch: {:?}", dimensions.batches);
    println!("partitions: {}", dimensions.keys().count());

    for plot in &config.plots {
        let missing = plot
            .required_columns()
            .into_iter()
            .filter(|column| !table.schema().contains(column))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            println!("{} is missing columns: {}", config.name, missing.join(", "));
        }
    }
    Ok(())
}

async fn plot(input: &Input, out: Option<PathBuf>) -> Result<()> {
    let config = load_config(input.config_file.as_deref()).await?;
    let (table, summary) = load_unified(&input.dir, &config.settings)
        .await
        .context(format!("Load measurements from {}", input.dir.display()))?;
    if summary.skipped() > 0 {
        println!("{summary}");
    }

    let out = out.unwrap_or_else(|| input.dir.clone());
    let written = common::plot::plot(&config.plots, &table, &out, &config.settings).await?;
    info!("{} reports written to {}", written.len(), out.display());
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
