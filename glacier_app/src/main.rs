//! glacier-replay
//!
//! Pre-warms a Vulkan driver's pipeline cache by replaying a fossilize
//! database: every pipeline is reconstructed with its full dependency
//! closure, handed to the driver, and immediately destroyed. A supervising
//! launcher can watch progress through a shared-memory control block passed
//! down as a file descriptor.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use glacier_replay::foundation::logging;
use glacier_replay::replay::{self, ControlBlock, ReplayOptions};
use glacier_replay::vulkan::{AshDevice, ContextOptions, VulkanContext};
use glacier_replay::{Database, ReplayResult};

#[derive(Parser, Debug)]
#[command(
    name = "glacier-replay",
    version,
    about = "Replay a fossilize database to pre-warm the Vulkan driver's pipeline cache"
)]
struct Args {
    /// Worker thread count; 0 selects the detected hardware concurrency.
    #[arg(long, default_value_t = 0)]
    num_threads: usize,

    /// Control-block shared-memory file descriptor inherited from a launcher.
    #[arg(long)]
    shmem_fd: Option<i32>,

    /// Enable the Khronos validation layer.
    #[arg(long)]
    enable_validation: bool,

    /// Physical device index to replay on.
    #[arg(long, default_value_t = 0)]
    device_index: usize,

    /// Log replay progress once a second.
    #[arg(long)]
    progress: bool,

    /// Database files; the first is replayed.
    #[arg(required = true)]
    databases: Vec<PathBuf>,
}

fn run(args: &Args) -> ReplayResult<()> {
    if args.databases.len() > 1 {
        warn!(
            "{} databases given; only {} is replayed",
            args.databases.len(),
            args.databases[0].display()
        );
    }
    let db = Database::open(&args.databases[0])?;
    let app_info = replay::verify_application_info(&db)?;
    info!(
        "database recorded by {} ({}), api version {:#x}",
        app_info.application_name, app_info.engine_name, app_info.api_version
    );

    let control = match args.shmem_fd {
        Some(fd) => ControlBlock::attach(fd)?,
        None => ControlBlock::disabled(),
    };

    let context = Arc::new(VulkanContext::new(
        &ContextOptions {
            enable_validation: args.enable_validation,
            device_index: args.device_index,
        },
        Some(&app_info),
    )?);
    let device = AshDevice::new(context);

    let summary = replay::run(
        &db,
        &device,
        &control,
        &ReplayOptions {
            thread_count: args.num_threads,
            show_progress: args.progress,
        },
    );
    info!(
        "created {} of {} root pipelines ({} failed)",
        summary.created.total(),
        summary.roots,
        summary.failed.total()
    );

    control.mark_clean_death();
    Ok(())
}

fn main() -> ExitCode {
    logging::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("replay aborted: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["glacier-replay", "steam.foz"]);
        assert_eq!(args.num_threads, 0);
        assert_eq!(args.device_index, 0);
        assert!(args.shmem_fd.is_none());
        assert!(!args.enable_validation);
        assert!(!args.progress);
        assert_eq!(args.databases, vec![PathBuf::from("steam.foz")]);
    }

    #[test]
    fn test_args_full() {
        let args = Args::parse_from([
            "glacier-replay",
            "--num-threads",
            "8",
            "--shmem-fd",
            "5",
            "--enable-validation",
            "--device-index",
            "1",
            "--progress",
            "a.foz",
            "b.foz",
        ]);
        assert_eq!(args.num_threads, 8);
        assert_eq!(args.shmem_fd, Some(5));
        assert!(args.enable_validation);
        assert_eq!(args.device_index, 1);
        assert!(args.progress);
        assert_eq!(args.databases.len(), 2);
    }

    #[test]
    fn test_args_require_database() {
        assert!(Args::try_parse_from(["glacier-replay"]).is_err());
    }
}
