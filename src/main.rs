use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ffiphot::{
    assembler::load_photometry_series,
    checkpoint::{load_checkpoint, save_checkpoint},
    constants::DEFAULT_MAX_SEPARATION,
    fetch::{fetch_range, FetchScript, ShellFetcher},
    frame::FrameLoader,
    logging::init_tracing,
    orchestrator::{process_images_parallel, PipelineConfig, RunOutcome, CANCELLED_EXIT_CODE},
    photometry::PhotometryParams,
    target::Target,
};

#[derive(Parser, Debug)]
#[command(name = "ffiphot", version, about = "Target photometry across full-frame images")]
struct Cli {
    /// Log more (-v: debug, -vv: trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and measure every image of a download script
    Run(RunArgs),
    /// Build the light curve of a target from per-frame records
    Assemble(AssembleArgs),
    /// Fetch a range of images without measuring them
    Fetch(FetchArgs),
    /// Download the full-frame image script of a sector
    #[cfg(feature = "script-download")]
    Script(ScriptArgs),
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Right ascension, degrees or "HH MM SS.ss"
    #[arg(long, allow_hyphen_values = true)]
    ra: String,

    /// Declination, degrees or "±DD MM SS.s"
    #[arg(long, allow_hyphen_values = true)]
    dec: String,

    /// Target name used in logs
    #[arg(long, default_value = "target")]
    name: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Download script, one fetch command per line
    #[arg(long)]
    script: PathBuf,

    /// Catalog CSV with ra, dec and source_id columns
    #[arg(long)]
    catalog: PathBuf,

    /// Directory receiving the per-frame records
    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    target: TargetArgs,

    /// First script line to process
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Concurrent workers (default: available CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Acceptance radius around the target, arcseconds
    #[arg(long, default_value_t = DEFAULT_MAX_SEPARATION)]
    max_sep: f64,

    /// Resume from, and update, this checkpoint file
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Parent directory of the per-task scratch directories
    #[arg(long)]
    scratch: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AssembleArgs {
    /// Directory holding the per-frame records
    #[arg(long)]
    input: PathBuf,

    #[command(flatten)]
    target: TargetArgs,

    /// Acceptance radius around the target, arcseconds
    #[arg(long, default_value_t = DEFAULT_MAX_SEPARATION)]
    max_sep: f64,

    /// Sort the light curve by time
    #[arg(long)]
    sort: bool,

    /// Write the light curve to this CSV file
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Download script, one fetch command per line
    #[arg(long)]
    script: PathBuf,

    /// First script line to fetch
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Number of lines to fetch
    #[arg(long)]
    count: usize,

    /// Destination directory
    #[arg(long, default_value = "./tess_images")]
    dir: PathBuf,
}

#[cfg(feature = "script-download")]
#[derive(Args, Debug)]
struct ScriptArgs {
    /// Observing sector
    #[arg(long)]
    sector: u32,

    /// Directory where the script is stored
    #[arg(long, default_value = ".")]
    dir: PathBuf,
}

fn parse_target(args: &TargetArgs) -> Result<Target> {
    if let (Ok(ra), Ok(dec)) = (args.ra.trim().parse::<f64>(), args.dec.trim().parse::<f64>()) {
        return Ok(Target::new(&args.name, ra, dec));
    }
    Target::from_sexagesimal(&args.name, &args.ra, &args.dec)
        .with_context(|| format!("invalid target position ({}, {})", args.ra, args.dec))
}

#[cfg(feature = "fits")]
fn frame_loader() -> Result<Arc<dyn FrameLoader>> {
    Ok(Arc::new(ffiphot::frame::fits_loader::FitsFrameLoader))
}

#[cfg(not(feature = "fits"))]
fn frame_loader() -> Result<Arc<dyn FrameLoader>> {
    anyhow::bail!("this build cannot decode images: rebuild with `--features fits`")
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            signal_token.cancel();
        }
    });
    token
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let target = parse_target(&args.target)?;
    let loader = frame_loader()?;
    let params = PhotometryParams::builder()
        .max_separation(args.max_sep)
        .build()?;

    let mut start = args.start;
    if let Some(path) = &args.checkpoint {
        if let Some(saved) = load_checkpoint(path)? {
            info!(checkpoint = %path.display(), index = saved, "resuming from checkpoint");
            start = saved;
        }
    }

    let mut config = PipelineConfig::new(&args.script, &args.catalog, &args.output)
        .with_start_index(start)
        .with_params(params);
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(scratch) = &args.scratch {
        config = config.with_scratch_root(scratch);
    }

    let outcome = process_images_parallel(
        &config,
        &target,
        Arc::new(ShellFetcher::new()),
        loader,
        cancel_on_ctrl_c(),
    )
    .await?;

    if let Some(path) = &args.checkpoint {
        save_checkpoint(path, outcome.summary().resume_index)?;
    }

    match outcome {
        RunOutcome::Completed(summary) => {
            info!(%summary, "done");
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Cancelled(_) => Ok(ExitCode::from(CANCELLED_EXIT_CODE as u8)),
    }
}

fn assemble(args: AssembleArgs) -> Result<ExitCode> {
    let target = parse_target(&args.target)?;
    let mut series = load_photometry_series(&args.input, &target, args.max_sep)?;
    if args.sort {
        series.sort_by_time();
    }

    match &args.out {
        Some(path) => {
            series.write_csv(path)?;
            info!(points = series.len(), path = %path.display(), "light curve written");
        }
        None => {
            for (time, flux) in series.times().iter().zip(series.fluxes()) {
                println!("{time:.6},{flux}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn fetch(args: FetchArgs) -> Result<ExitCode> {
    let script = FetchScript::from_file(&args.script)?;
    let attempted =
        fetch_range(&script, &ShellFetcher::new(), args.start, args.count, &args.dir).await?;
    info!(attempted, dir = %args.dir.display(), "fetch finished");
    Ok(ExitCode::SUCCESS)
}

async fn dispatch(command: Command) -> Result<ExitCode> {
    match command {
        Command::Run(args) => run(args).await,
        Command::Assemble(args) => assemble(args),
        Command::Fetch(args) => fetch(args).await,
        #[cfg(feature = "script-download")]
        Command::Script(args) => {
            let path = ffiphot::script_download::download_sector_script(args.sector, &args.dir)
                .await?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("unable to start the async runtime")?;
    let result = runtime.block_on(dispatch(cli.command));
    // blocking measurements abandoned by a cancelled run are not awaited
    runtime.shutdown_background();
    result
}
