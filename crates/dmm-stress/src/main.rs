//! Drives the dmm allocator through a scripted sequence or a randomized
//! workload and verifies the heap after the run.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::process;

use argh::FromArgs;
use dmm::{HeapConfig, InitError, ReserveError};
use log::LevelFilter;
use snafu::ResultExt as _;
use snafu_utils::{GenericError, Report};

mod logger;
mod random;
mod scripted;

/// Exercise the dmm allocator and check the heap after every run.
#[derive(Debug, FromArgs)]
struct Args {
    /// heap budget in bytes
    #[argh(option, default = "dmm::DEFAULT_MAX_HEAP_SIZE")]
    heap_size: usize,
    /// alignment boundary in bytes, a power of two
    #[argh(option, default = "dmm::DEFAULT_ALIGNMENT")]
    alignment: usize,
    /// log level: off, error, warn, info, debug or trace
    #[argh(option, default = "LevelFilter::Info")]
    log_level: LevelFilter,
    #[argh(subcommand)]
    command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Scripted(scripted::Args),
    Random(random::Args),
}

fn main() {
    let args: Args = argh::from_env();
    ansi_term::set_enabled(ansi_term::stderr_is_terminal());

    if let Err(err) = run(&args) {
        let report = Report::new(err)
            .locate::<InitError>()
            .locate::<ReserveError>();
        eprintln!("{report}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), GenericError> {
    logger::init(args.log_level).whatever_context("failed to install logger")?;

    let config = HeapConfig::new(args.alignment, args.heap_size).with_whatever_context(|_| {
        format!(
            "invalid heap configuration, alignment={}, heap_size={}",
            args.alignment, args.heap_size
        )
    })?;

    match &args.command {
        Command::Scripted(_) => scripted::run(config)?,
        Command::Random(random_args) => {
            let summary = random::run(config, random_args)?;
            println!("{summary}");
        }
    }

    Ok(())
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use snafu::ResultExt as _;

    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["dmm-stress"], args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["scripted"]);
        assert_eq!(args.heap_size, dmm::DEFAULT_MAX_HEAP_SIZE);
        assert_eq!(args.alignment, dmm::DEFAULT_ALIGNMENT);
        assert_eq!(args.log_level, LevelFilter::Info);
        assert!(matches!(args.command, Command::Scripted(_)));
    }

    #[test]
    fn test_random_options() {
        let args = parse(&[
            "--heap-size",
            "2097152",
            "--log-level",
            "debug",
            "random",
            "--loops",
            "10",
            "--seed",
            "42",
        ]);
        assert_eq!(args.heap_size, 2 * 1024 * 1024);
        assert_eq!(args.log_level, LevelFilter::Debug);
        let Command::Random(random) = args.command else {
            panic!("expected random subcommand");
        };
        assert_eq!(random.loops, 10);
        assert_eq!(random.slots, 1000);
        assert_eq!(random.seed, Some(42));
    }

    #[test]
    fn test_second_logger_install_is_reported() {
        // only this test installs the logger in the test binary
        logger::init(LevelFilter::Warn).unwrap();
        let err = logger::init(LevelFilter::Warn)
            .whatever_context::<_, GenericError>("failed to install logger")
            .unwrap_err();
        let report = Report::new(err).to_string();
        assert!(report.contains("failed to install logger"));
        assert!(report.contains("Caused by:"));
    }

    #[test]
    fn test_rejects_bad_level() {
        Args::from_args(&["dmm-stress"], &["--log-level", "loud", "scripted"]).unwrap_err();
    }
}
