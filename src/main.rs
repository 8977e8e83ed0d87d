use std::env;
use std::io;
use std::process::ExitCode;

use split_eng::csv::{read_records, write_balances, write_settlements};
use split_eng::{Engine, SettlementMode};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

const USAGE: &str = "usage: split-eng <records.csv> [--pairwise] [--balances]";

/// Command line options.
#[derive(Debug)]
struct Options {
    path: String,
    mode: SettlementMode,
    balances: bool,
}

impl Options {
    fn parse(args: impl Iterator<Item = String>) -> Option<Self> {
        let mut path = None;
        let mut mode = SettlementMode::Simplified;
        let mut balances = false;

        for arg in args {
            match arg.as_str() {
                "--pairwise" => mode = SettlementMode::Pairwise,
                "--balances" => balances = true,
                flag if flag.starts_with("--") => return None,
                _ if path.is_none() => path = Some(arg),
                _ => return None,
            }
        }

        Some(Self {
            path: path?,
            mode,
            balances,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let Some(options) = Options::parse(env::args().skip(1)) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    if !options.path.ends_with(".csv") {
        warn!(path = %options.path, "input file seems to not be a csv file");
    }

    let records = match read_records(options.path.clone()) {
        Ok(records) => records,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = Engine::new();
    let (record_sender, record_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in records {
            match result {
                Ok(record) => {
                    if record_sender.send(record).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(record_receiver)).await;

    let stdout = io::stdout();
    let written = if options.balances {
        write_balances(stdout.lock(), &engine.balances())
    } else {
        write_settlements(stdout.lock(), &engine.settlements(options.mode))
    };

    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("failed to write output: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Options> {
        Options::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn parse_path_only() {
        let options = parse(&["records.csv"]).unwrap();
        assert_eq!(options.path, "records.csv");
        assert_eq!(options.mode, SettlementMode::Simplified);
        assert!(!options.balances);
    }

    #[test]
    fn parse_flags_in_any_position() {
        let options = parse(&["--pairwise", "records.csv", "--balances"]).unwrap();
        assert_eq!(options.mode, SettlementMode::Pairwise);
        assert!(options.balances);
    }

    #[test]
    fn parse_rejects_bad_usage() {
        assert!(parse(&[]).is_none());
        assert!(parse(&["a.csv", "b.csv"]).is_none());
        assert!(parse(&["a.csv", "--verbose"]).is_none());
    }
}
