use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use landsnap::diff::{self, AnalysisReport, AnalyzeOptions};
use landsnap::heatmap::{HeatmapRenderer, ImageSource};
use landsnap::progress::{PollOutcome, Poller, ProgressSink};
use landsnap::upload::{PreviewState, SelectedFile, SubmitOutcome, UploadForm};
use landsnap::{dom, LandsnapConfig, Size};

#[derive(Parser, Debug)]
#[command(
    name = "landsnap",
    version,
    about = "Compare two images, follow the analysis and render difference heatmaps.",
    arg_required_else_help = true
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Worker threads for pixel work (defaults to the number of CPUs)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recolor an image into a red/green intensity heatmap
    Heatmap {
        /// Path, http(s) URL or data URL of the source image
        source: String,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Green falloff factor k in 255 - v*k
        #[arg(long)]
        scale: Option<f32>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Compute the difference heatmap and change percentage of two images
    Diff {
        before: PathBuf,
        after: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Grayscale difference above which a pixel counts as changed
        #[arg(long, default_value_t = diff::DEFAULT_THRESHOLD)]
        threshold: u8,
        /// Keep the raw difference instead of the JET palette
        #[arg(long)]
        gray: bool,
        /// Print an analysis report
        #[arg(long, value_enum)]
        report: Option<ReportFormat>,
    },
    /// Run the upload guard on one or two local files
    Check {
        #[arg(num_args = 1..=2, required = true)]
        files: Vec<PathBuf>,
        /// Write each inline preview (data URL) into this directory
        #[arg(long)]
        preview: Option<PathBuf>,
    },
    /// Validate and post both images to the analysis server
    Upload {
        image1: PathBuf,
        image2: PathBuf,
        /// Form endpoint, e.g. http://localhost:8000/
        #[arg(long)]
        server: String,
    },
    /// Follow an analysis progress endpoint until it finishes
    Poll {
        url: String,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        max_failures: Option<u32>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ReportFormat {
    Json,
    Text,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    match log_file {
        Some(path) => WriteLogger::init(
            level,
            Config::default(),
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )?,
        None => TermLogger::init(
            level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )?,
    }
    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => LandsnapConfig::load(path)?,
        None => LandsnapConfig::default(),
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads.unwrap_or_else(num_cpus::get).max(1))
        .build_global()
        .context("configuring worker threads")?;

    match cli.command {
        Command::Heatmap {
            source,
            width,
            height,
            scale,
            output,
        } => {
            if let Some(k) = scale {
                config.heatmap.green_scale = k;
            }
            config.validate()?;
            let base = config.heatmap.container;
            let container = Size::new(width.unwrap_or(base.width), height.unwrap_or(base.height));
            run_heatmap(&source, container, &config, &output)
        }
        Command::Diff {
            before,
            after,
            output,
            threshold,
            gray,
            report,
        } => run_diff(&before, &after, &output, threshold, gray, report),
        Command::Check { files, preview } => {
            runtime()?.block_on(run_check(&files, preview.as_deref(), &config))
        }
        Command::Upload {
            image1,
            image2,
            server,
        } => runtime()?.block_on(run_upload(&image1, &image2, &server, &config)),
        Command::Poll {
            url,
            interval_ms,
            max_failures,
        } => {
            if let Some(ms) = interval_ms {
                config.poller.interval_ms = ms;
            }
            if max_failures.is_some() {
                config.poller.max_consecutive_failures = max_failures;
            }
            config.validate()?;
            runtime()?.block_on(run_poll(&url, &config))
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

fn run_heatmap(
    source: &str,
    container: Size,
    config: &LandsnapConfig,
    output: &Path,
) -> Result<ExitCode> {
    let mut renderer = HeatmapRenderer::new(container, config.heatmap.clone());
    let source = ImageSource::parse(source);
    if !renderer.render(&source)? {
        eprintln!(
            "nothing to draw: container {}x{} has no area",
            container.width, container.height
        );
        return Ok(ExitCode::FAILURE);
    }
    renderer.save(output)?;

    if let Some(lb) = renderer.letterbox() {
        println!(
            "{}: ratio {:.4}, drawn {}x{} at ({}, {})",
            output.display(),
            lb.ratio,
            lb.drawn.width,
            lb.drawn.height,
            lb.offset.0,
            lb.offset.1
        );
    }
    println!("sha256 {}", renderer.digest());
    Ok(ExitCode::SUCCESS)
}

fn run_diff(
    before: &Path,
    after: &Path,
    output: &Path,
    threshold: u8,
    gray: bool,
    report: Option<ReportFormat>,
) -> Result<ExitCode> {
    let first = std::fs::read(before).with_context(|| format!("reading {}", before.display()))?;
    let second = std::fs::read(after).with_context(|| format!("reading {}", after.display()))?;
    let a = image::load_from_memory(&first)
        .with_context(|| format!("decoding {}", before.display()))?;
    let b = image::load_from_memory(&second)
        .with_context(|| format!("decoding {}", after.display()))?;

    let options = AnalyzeOptions {
        threshold,
        false_color: !gray,
    };
    let analysis = diff::analyze(&a, &b, options);
    analysis
        .heatmap
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;

    let summary = AnalysisReport::new(AnalysisReport::id_for(&first, &second), &analysis);
    match report {
        Some(ReportFormat::Json) => println!("{}", summary.to_json()?),
        Some(ReportFormat::Text) => print!("{}", summary.to_text()),
        None => println!(
            "{}: {:.2}% changed",
            output.display(),
            summary.change_percentage
        ),
    }
    Ok(ExitCode::SUCCESS)
}

/// Fill the form from local files in `image1`, `image2` order
fn fill_form(files: &[&Path], config: &LandsnapConfig) -> Result<UploadForm> {
    let mut form = UploadForm::new(config.upload.clone());
    for (name, path) in dom::IMAGE_FIELDS.iter().zip(files) {
        let file = SelectedFile::from_path(path)?;
        // rejections are recorded on the field and reported by the caller
        let _ = form.select(name, Some(file));
    }
    Ok(form)
}

fn print_fields(form: &UploadForm) {
    for field in form.fields() {
        let ids = field.ids();
        match (field.file(), field.error()) {
            (_, Some(err)) => println!("{}: {} [{}]", ids.input, err, ids.error),
            (Some(file), None) => println!(
                "{}: ok ({}, {}, {} bytes)",
                ids.input, file.name, file.mime, file.size
            ),
            (None, None) => println!("{}: empty", ids.input),
        }
    }
}

async fn run_check(
    files: &[PathBuf],
    preview_dir: Option<&Path>,
    config: &LandsnapConfig,
) -> Result<ExitCode> {
    let paths: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
    let mut form = fill_form(&paths, config)?;
    form.load_previews().await;

    if let Some(dir) = preview_dir {
        std::fs::create_dir_all(dir)?;
        for field in form.fields() {
            if let PreviewState::Ready(data_url) = field.preview() {
                let path = dir.join(format!("{}.dataurl", field.ids().preview));
                std::fs::write(&path, data_url)?;
                println!("preview written to {}", path.display());
            }
        }
    }

    let invalid = form.fields().iter().any(|f| f.error().is_some());
    print_fields(&form);
    Ok(if invalid {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(feature = "http")]
async fn run_upload(
    image1: &Path,
    image2: &Path,
    server: &str,
    config: &LandsnapConfig,
) -> Result<ExitCode> {
    use landsnap::upload::UploadClient;

    let mut form = fill_form(&[image1, image2], config)?;
    match form.submit() {
        SubmitOutcome::Proceed { .. } => {}
        SubmitOutcome::Blocked(_) | SubmitOutcome::InFlight => {
            print_fields(&form);
            return Ok(ExitCode::FAILURE);
        }
    }

    let timeout = Duration::from_millis(config.poller.request_timeout_ms);
    let client = UploadClient::new(server, timeout)?;
    let receipt = client.submit(&form).await?;
    println!("{}", receipt.location);
    Ok(ExitCode::SUCCESS)
}

#[cfg(not(feature = "http"))]
async fn run_upload(_: &Path, _: &Path, _: &str, _: &LandsnapConfig) -> Result<ExitCode> {
    bail!("upload requires the `http` feature")
}

/// Prints poller reactions for a terminal user
struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn progress(&self, percentage: u8) {
        println!("{}: {}%", dom::PROGRESS_BAR, percentage);
    }

    fn navigate(&self, target: &str) {
        println!("redirect: {}", target);
    }

    fn alert(&self, message: &str) {
        eprintln!("analysis failed: {}", message);
    }
}

#[cfg(feature = "http")]
async fn run_poll(url: &str, config: &LandsnapConfig) -> Result<ExitCode> {
    use landsnap::progress::HttpStatusSource;

    let timeout = Duration::from_millis(config.poller.request_timeout_ms);
    let source = HttpStatusSource::new(url, timeout)?;
    let handle = Poller::new(source, ConsoleSink, config.poller.clone()).spawn();

    let outcome = tokio::select! {
        outcome = handle.join() => outcome?,
        _ = tokio::signal::ctrl_c() => {
            bail!("interrupted");
        }
    };
    Ok(match outcome {
        PollOutcome::Complete { .. } => ExitCode::SUCCESS,
        PollOutcome::Failed { .. } | PollOutcome::Cancelled => ExitCode::FAILURE,
        PollOutcome::GaveUp { failures } => {
            eprintln!("giving up after {} failed requests", failures);
            ExitCode::from(2)
        }
    })
}

#[cfg(not(feature = "http"))]
async fn run_poll(_: &str, _: &LandsnapConfig) -> Result<ExitCode> {
    bail!("poll requires the `http` feature")
}
