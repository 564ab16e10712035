use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use figsim::config::{self, RunConfig};
use figsim::core::{compare, normalize, ConnectivityStore, Figure, ScheduleProgress, Scheduler};
use figsim::logging;
use figsim::services::export::{self, RunSummary};
use figsim::services::{extract_entities, Corpus, RasterExtractor};
use image::ImageReader;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(
    name = "figsim",
    version,
    about = "Find duplicated figures across submissions and references"
)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk submission and reference trees, extract figures and compare them
    Check {
        /// Directory containing one subdirectory per submission
        #[arg(long, value_name = "DIR", default_value = "submission")]
        input_dir: PathBuf,
        /// Directory containing reference documents
        #[arg(long, value_name = "DIR", default_value = "reference")]
        reference_dir: PathBuf,
        /// Compare submissions with each other only
        #[arg(long)]
        no_references: bool,
        /// Comma-separated file types to check
        #[arg(long, value_name = "EXTS", default_value = config::DEFAULT_FILE_TYPES)]
        check_filetype: String,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Compare an already-extracted staging area (`<id>/`, `ref_<id>/`)
    Staged {
        /// Staging directory
        #[arg(short, long, value_name = "DIR", default_value = "buffer")]
        buffer_dir: PathBuf,
        /// Comma-separated file types to load
        #[arg(long, value_name = "EXTS", default_value = "png")]
        check_filetype: String,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Print MSE, SSIM and PSNR for two image files
    Pair {
        #[arg(value_name = "IMAGE")]
        left: PathBuf,
        #[arg(value_name = "IMAGE")]
        right: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory to write the reports into
    #[arg(short, long, value_name = "DIR", default_value = "out")]
    output_dir: PathBuf,
    /// Number of worker threads (default: logical CPUs)
    #[arg(short = 'p', long = "workers", value_name = "N")]
    workers: Option<usize>,
    /// Reported only; not applied by the comparison
    #[arg(long, default_value_t = config::DEFAULT_SHAPE_THRESHOLD)]
    shape_threshold: u32,
    /// Pairs whose best MSE is below this are listed in suspicious.csv
    #[arg(long, default_value_t = config::DEFAULT_ERROR_THRESHOLD)]
    error_threshold: f64,
}

impl RunArgs {
    fn into_config(
        self,
        input_dir: PathBuf,
        reference_dir: Option<PathBuf>,
        file_types: Vec<String>,
    ) -> RunConfig {
        let defaults = RunConfig::default();
        RunConfig {
            input_dir,
            reference_dir,
            output_dir: self.output_dir,
            file_types,
            worker_count: self.workers.unwrap_or(defaults.worker_count).max(1),
            shape_threshold: self.shape_threshold,
            error_threshold: self.error_threshold,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(logging::level_from_flags(cli.verbose, cli.quiet));

    match cli.command {
        Commands::Check {
            input_dir,
            reference_dir,
            no_references,
            check_filetype,
            run,
        } => {
            let file_types = config::parse_file_types(&check_filetype)?;
            let reference_dir = (!no_references).then_some(reference_dir);
            let config = run.into_config(input_dir, reference_dir, file_types);

            let corpus = with_spinner("Scanning for documents…", || {
                Corpus::discover(
                    &config.input_dir,
                    config.reference_dir.as_deref(),
                    &config.file_types,
                )
            })?
            .context("Failed to discover corpus")?;

            analyse(&corpus, &config)?;
        }

        Commands::Staged {
            buffer_dir,
            check_filetype,
            run,
        } => {
            let file_types = config::parse_file_types(&check_filetype)?;
            let config = run.into_config(buffer_dir.clone(), None, file_types);

            let corpus = with_spinner("Reading staging area…", || {
                Corpus::from_staging(&buffer_dir, &config.file_types)
            })?
            .with_context(|| format!("Failed to load staging area {:?}", buffer_dir))?;

            analyse(&corpus, &config)?;
        }

        Commands::Pair { left, right } => {
            let a = load_figure(&left)?;
            let b = load_figure(&right)?;
            let (na, nb) = normalize(&a.image, &b.image)?;
            let triple = compare(&na, &nb)?;

            println!("▶ {} vs {}", left.display(), right.display());
            println!("   shape: {}x{}", na.width(), na.height());
            println!("   MSE:  {}", triple.mse);
            println!("   SSIM: {}", triple.ssim);
            println!("   PSNR: {}", triple.psnr);
        }
    }

    Ok(())
}

/// Extract, compare and write reports for a discovered corpus.
fn analyse(corpus: &Corpus, config: &RunConfig) -> Result<()> {
    let started = Instant::now();

    println!("▶ Submissions: {}", corpus.submissions.len());
    println!("▶ References: {}", corpus.references.len());
    println!("▶ Files to check: {}", corpus.files_checked());
    println!("▶ File types: {}", config.file_types.join(","));
    println!("▶ Output: {}", config.output_dir.display());
    println!("▶ Error threshold: {}", config.error_threshold);
    println!("▶ Shape threshold: {}", config.shape_threshold);

    let extraction_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_count)
        .build()
        .context("Failed to build extraction pool")?;
    let extractor = RasterExtractor::new();

    let bar = progress_bar(corpus.files_checked() as u64, "extracting")?;
    let tick: &(dyn Fn(&Path) + Sync) = &|_: &Path| bar.inc(1);
    let (submissions, references) = benchmark("extracting figures", || {
        extraction_pool.install(|| {
            (
                extract_entities(&extractor, &corpus.submissions, Some(tick)),
                extract_entities(&extractor, &corpus.references, Some(tick)),
            )
        })
    });
    bar.finish_and_clear();

    let figures_kept = submissions.figures + references.figures;
    println!(
        "▶ Kept {} figure(s) from {} document(s), {} failed",
        figures_kept,
        submissions.documents + references.documents,
        submissions.failures + references.failures
    );

    let units = Scheduler::plan(&submissions.entities, &references.entities).len();
    let bar = progress_bar(units as u64, "comparing")?;
    let bar_handle = bar.clone();
    let scheduler = Scheduler::new(config.worker_count).with_progress(Box::new(
        move |progress: ScheduleProgress| {
            bar_handle.set_position(progress.completed as u64);
            bar_handle.set_message(progress.current_unit);
        },
    ));

    let mut store = ConnectivityStore::new();
    let outcome = benchmark("comparing figures", || {
        scheduler.populate(&submissions.entities, &references.entities, &mut store)
    })?;
    bar.finish_and_clear();

    let rows = store.export();
    let mut summary = RunSummary {
        finished_at: Utc::now().to_rfc3339(),
        submissions: submissions.entities.len(),
        references: references.entities.len(),
        files_checked: corpus.files_checked(),
        figures_kept,
        extraction_failures: submissions.failures + references.failures,
        units_dispatched: outcome.dispatched,
        units_recorded: outcome.recorded,
        units_skipped: outcome.skipped,
        units_failed: outcome.failed,
        rows_exported: 0,
        rows_suspicious: 0,
        elapsed_secs: started.elapsed().as_secs_f64(),
        config: config.clone(),
    };

    let paths = export::write_report(&config.output_dir, &rows, &mut summary)
        .with_context(|| format!("Failed to write reports to {:?}", config.output_dir))?;

    println!(
        "\n✅ {} connection row(s), {} below error threshold",
        summary.rows_exported, summary.rows_suspicious
    );
    println!("   📄 {}", paths.connections.display());
    println!("   🚩 {}", paths.suspicious.display());
    println!("   🧾 {}", paths.summary.display());

    Ok(())
}

fn load_figure(path: &Path) -> Result<Figure> {
    let image = ImageReader::open(path)
        .with_context(|| format!("Failed to open {:?}", path))?
        .decode()
        .with_context(|| format!("Failed to decode {:?}", path))?;
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    Ok(Figure::new(name, image))
}

fn with_spinner<T, F: FnOnce() -> T>(message: &'static str, f: F) -> Result<T> {
    let spinner = logging::progress().add(ProgressBar::new_spinner());
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = f();
    spinner.finish_and_clear();
    Ok(result)
}

fn progress_bar(len: u64, prefix: &'static str) -> Result<ProgressBar> {
    let bar = logging::progress().add(ProgressBar::new(len));
    bar.set_style(
        ProgressStyle::with_template("{prefix:>10} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );
    bar.set_prefix(prefix);
    Ok(bar)
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
