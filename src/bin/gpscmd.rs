#![deny(clippy::unwrap_used)]

use clap::{arg, command, value_parser};
use gpsctrl::device::{Device, SerialConfig};
use gpsctrl::poll::{self, Stop, Summary};
use gpsctrl::proto::Result;
use gpsctrl::report::{OutputFormat, ReportConfig, Reporter};
use gpsctrl::{proto, DEFAULT_BAUDRATE, DEFAULT_TIMEOUT, DEFAULT_TTY};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -d
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        eprintln!("Unable to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let matches =
        command!() // requires `cargo` feature
            .arg(
                arg!(
                    -p --device <PORT> "Serial port of the sensor"
                )
                .default_value(DEFAULT_TTY)
                .required(false)
                .value_parser(value_parser!(PathBuf)),
            )
            .arg(arg!(
                -d --debug ... "Turn debugging information on"
            ))
            .arg(
                arg!(
                    -b --baudrate <BAUDRATE> "Baudrate"
                )
                .default_value(DEFAULT_BAUDRATE.to_string())
                .value_parser(value_parser!(u32)),
            )
            .arg(
                arg!(
                    --"timeout-ms" <MILLIS> "Read timeout per line in milliseconds"
                )
                .default_value(DEFAULT_TIMEOUT.as_millis().to_string())
                .value_parser(value_parser!(u64).range(1..)),
            )
            .subcommand(
                clap::Command::new("poll")
                    .about("Read sensor readings")
                    .arg(arg!(
                        --"loop" "Poll readings until interrupted"
                    ))
                    .arg(
                        arg!(--"count" <N> "Number of lines to poll")
                            .value_parser(value_parser!(usize)),
                    )
                    .arg(
                        arg!(--"format" <fmt> "Output format")
                            .value_parser(value_parser!(OutputFormat)),
                    ),
            )
            .subcommand(
                clap::Command::new("replay")
                    .about("Parse a captured sensor log instead of the serial port")
                    .arg(arg!(<file> "Captured log file").value_parser(value_parser!(PathBuf)))
                    .arg(
                        arg!(--"format" <fmt> "Output format")
                            .value_parser(value_parser!(OutputFormat)),
                    ),
            )
            .subcommand_required(true)
            .get_matches();

    init_logging(matches.get_count("debug"));

    match handle_args(&matches).await {
        Ok(summary) => {
            if summary.undecodable > 0 {
                eprintln!(
                    "{} of {} lines could not be decoded",
                    summary.undecodable, summary.cycles
                );
            }
        }
        Err(e) => {
            let port = matches
                .get_one::<PathBuf>("device")
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            match e {
                proto::ProtoError::Serial(err) => {
                    if err.kind() == tokio_serial::ErrorKind::NoDevice
                        || matches!(err.kind(), tokio_serial::ErrorKind::Io(ErrorKind::NotFound))
                    {
                        eprintln!("{}: File not found", port);
                    } else {
                        eprintln!("Serial error: {} [device: {}]", err, port);
                    }
                    exit(-1);
                }
                proto::ProtoError::Io(err) => {
                    if err.kind() == ErrorKind::NotFound {
                        eprintln!("File not found: {}", err);
                    } else if err.kind() == ErrorKind::BrokenPipe {
                        // Output closed, e.g. piped into `head`
                        exit(0);
                    } else {
                        eprintln!("I/O Error: {} [device: {}]", err, port);
                    }
                    exit(-1);
                }
                proto::ProtoError::Abort => {
                    eprintln!("Lost connection to sensor, aborting!");
                    exit(-2);
                }
            }
        }
    }
}

async fn handle_args(matches: &clap::ArgMatches) -> Result<Summary> {
    let timeout = matches
        .get_one::<u64>("timeout-ms")
        .map(|ms| Duration::from_millis(*ms))
        .unwrap_or(DEFAULT_TIMEOUT);

    match matches.subcommand() {
        Some(("poll", args)) => {
            let config = SerialConfig {
                path: matches
                    .get_one::<PathBuf>("device")
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|| String::from(DEFAULT_TTY)),
                baudrate: *matches
                    .get_one::<u32>("baudrate")
                    .unwrap_or(&DEFAULT_BAUDRATE),
                timeout,
            };
            let endless_loop = args.get_flag("loop");
            let limit = match args.get_one::<usize>("count") {
                Some(count) => Some(*count),
                None if endless_loop => None,
                None => Some(1),
            };
            let format = args
                .get_one::<OutputFormat>("format")
                .copied()
                .unwrap_or_default();

            // Dropping the device at the end of this scope closes the port.
            let mut device = Device::new(&config)?;
            eprintln!("Connected to: {}\n", config.path);

            let mut reporter = Reporter::new(
                std::io::stdout().lock(),
                ReportConfig {
                    format,
                    numbered: endless_loop || limit != Some(1),
                },
            );
            let summary = poll::run(&mut device, &mut reporter, limit, shutdown_signal()).await?;
            if summary.stop == Stop::Closed {
                return Err(proto::ProtoError::Abort);
            }
            Ok(summary)
        }

        Some(("replay", args)) => {
            let path = args
                .get_one::<PathBuf>("file")
                .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "No file given"))?;
            let format = args
                .get_one::<OutputFormat>("format")
                .copied()
                .unwrap_or_default();

            let file = tokio::fs::File::open(path).await?;
            let mut device = Device::from_reader(file, timeout);
            let mut reporter = Reporter::new(
                std::io::stdout().lock(),
                ReportConfig {
                    format,
                    numbered: true,
                },
            );
            let summary = poll::run(&mut device, &mut reporter, None, shutdown_signal()).await?;
            info!(path = %path.display(), readings = summary.readings, "Replay finished");
            Ok(summary)
        }

        _ => Err(std::io::Error::new(
            ErrorKind::Unsupported,
            "Unsupported command line argument",
        )
        .into()),
    }
}
