//! Fixed descriptor install check.
//!
//! Runs the install/retire scenarios against the in-process table or the
//! kernel's. Exits 0 on pass, 77 when the backend lacks install support, and
//! 1 on failure.

mod backend;
mod config;
mod logging;
mod scenarios;

use backend::{Backend, Emulated};
use clap::Parser;
use config::{Config, DEFAULT_CONFIG, Engine};
use scenarios::{EXIT_FAIL, Status};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fd-install")]
#[command(about = "Check fixed descriptor install and retire")]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    config: Option<PathBuf>,

    /// Backend under test, overrides the config file
    #[arg(short, long)]
    engine: Option<Engine>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print!("{DEFAULT_CONFIG}");
        return;
    }

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(EXIT_FAIL);
            }
        },
        None => Config::default(),
    };
    if let Some(engine) = args.engine {
        config.engine = engine;
    }

    logging::init(&config.logging);

    let status = match build_backend(&config) {
        Ok(mut backend) => scenarios::run_all(backend.as_mut()),
        Err(status) => status,
    };

    match &status {
        Status::Pass => info!(engine = config.engine.as_str(), "all scenarios passed"),
        Status::Skip(reason) => info!(engine = config.engine.as_str(), %reason, "skipped"),
        Status::Fail(reason) => error!(engine = config.engine.as_str(), %reason, "failed"),
    }
    std::process::exit(status.exit_code());
}

/// Build the backend named by the config, or the status to exit with if it
/// cannot be used here.
fn build_backend(config: &Config) -> Result<Box<dyn Backend>, Status> {
    match config.engine {
        Engine::Emulated => Emulated::new(&config.ring)
            .map(|b| Box::new(b) as Box<dyn Backend>)
            .map_err(|e| Status::Fail(format!("ring setup failed: {e}"))),
        Engine::Uring => kernel(config),
    }
}

#[cfg(all(target_os = "linux", feature = "io_uring"))]
fn kernel(config: &Config) -> Result<Box<dyn Backend>, Status> {
    if !io_direct::kernel_install_available() {
        return Err(Status::Skip("kernel lacks fixed fd install".into()));
    }
    match backend::Kernel::new(config.ring.sq_entries) {
        Ok(b) => Ok(Box::new(b) as Box<dyn Backend>),
        // io_uring itself can be disabled or filtered
        Err(e) if matches!(e.raw_os_error(), Some(libc::ENOSYS | libc::EPERM)) => {
            Err(Status::Skip(format!("io_uring unavailable: {e}")))
        }
        Err(e) => Err(Status::Fail(format!("ring setup failed: {e}"))),
    }
}

#[cfg(not(all(target_os = "linux", feature = "io_uring")))]
fn kernel(_config: &Config) -> Result<Box<dyn Backend>, Status> {
    Err(Status::Skip(
        "built without the io_uring feature; rebuild with --features io_uring".into(),
    ))
}
