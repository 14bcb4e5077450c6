use clap::{Parser, Subcommand};
use collectgen::config::{self, AppConfig};
use collectgen::error::PipelineError;
use collectgen::{output, pipeline};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Shared flag for commands that run collections.
#[derive(clap::Args, Clone)]
struct OnlyArgs {
    /// Run a single collection by name
    #[arg(long)]
    only: Option<String>,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "collectgen")]
#[command(about = "Build typed JSON collections from markdown documents")]
#[command(long_about = "\
Build typed JSON collections from markdown documents

Each collection in collectgen.toml names a directory, globs, and the fields
every document must have. A build validates every document and writes:

  generated/
  ├── collections.json     # Registry of built collections
  ├── index.mjs            # export { allPosts } from './posts'
  ├── index.d.ts           # type Post = {...}
  └── posts/
      ├── index.mjs        # Imports every artifact, exports allPosts
      ├── hello.json       # One artifact per document
      └── world.json

Run 'collectgen gen-config' to generate a documented collectgen.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project file
    #[arg(long, default_value = config::PROJECT_FILE, global = true)]
    config: PathBuf,

    /// Log per-file details to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert, validate and write every collection, then generate modules
    Build(OnlyArgs),
    /// Validate every document without writing anything
    Check(OnlyArgs),
    /// Remove the generated output directories
    Clean,
    /// Print a stock collectgen.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build(args) => {
            let (project, configs) = load(&cli.config)?;
            init_thread_pool(&project.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_build_event(&event);
                }
            });
            let result = pipeline::build_project(&configs, args.only.as_deref(), Some(tx));
            printer.join().ok();
            match result {
                Ok(reports) => {
                    for report in &reports {
                        output::print_collection_report(report);
                    }
                    println!("==> Build complete");
                }
                Err(err) => fail(&err),
            }
        }
        Command::Check(args) => {
            let (project, configs) = load(&cli.config)?;
            init_thread_pool(&project.processing);
            let reports = match pipeline::check_project(&configs, args.only.as_deref()) {
                Ok(reports) => reports,
                Err(err) => fail(&err),
            };
            for report in &reports {
                output::print_check_report(report);
            }
            if reports.iter().any(|r| !r.is_ok()) {
                std::process::exit(1);
            }
            println!("==> Content is valid");
        }
        Command::Clean => {
            let (_, configs) = load(&cli.config)?;
            match pipeline::clean(&configs) {
                Ok(removed) => {
                    for dir in removed {
                        println!("Removed {}", dir.display());
                    }
                }
                Err(err) => fail(&err),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the project file and resolve every collection.
fn load(path: &Path) -> Result<(config::ProjectConfig, Vec<AppConfig>), config::ConfigError> {
    let project = config::load_project(path)?;
    let configs = project.app_configs()?;
    if configs.is_empty() {
        warn!("no collections declared in {}", path.display());
    }
    Ok((project, configs))
}

/// Print a pipeline error with its tag and exit non-zero.
fn fail(err: &PipelineError) -> ! {
    for line in output::format_error(err) {
        eprintln!("{}", line);
    }
    std::process::exit(1);
}

/// Diagnostics to stderr. Default `warn`; `--verbose` shows this crate's debug
/// events. `RUST_LOG` wins when set.
fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,collectgen=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available cores; the config can only lower it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
