//! ELM327 OBD2 client
//!
//! Connects to an ELM327-compatible adapter over TCP, initializes it, and
//! polls live data, clears trouble codes, or passes a raw command through.
//!
//! Usage: cargo run -p obdconnect-client -- [OPTIONS] <COMMAND>

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use obdconnect_client::{ClientConfig, Session};
use obdconnect_elm327_lib::{Command, DecodedValue, PidRequest, SUPPORTED_PIDS};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "obdconnect")]
#[command(about = "Read live data from an ELM327 OBD2 adapter over TCP")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Adapter host, overrides the config file
    #[arg(long, global = true)]
    host: Option<String>,

    /// Adapter port, overrides the config file
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Log every command and reply
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Poll PIDs and print decoded values
    Read {
        /// PID to poll, as mode+PID hex (e.g. 010C); repeatable, defaults to all supported
        #[arg(long = "pid")]
        pids: Vec<String>,

        /// Pause between polling rounds in milliseconds
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,

        /// Number of rounds (0 = run forever)
        #[arg(short = 'n', long, default_value = "0")]
        count: u64,
    },
    /// Clear stored diagnostic trouble codes
    ClearCodes,
    /// Send one command and print the cleaned reply
    Send {
        /// Command text, e.g. ATRV or 0100
        command: String,
    },
}

struct Stats {
    rounds: u64,
    errors: u64,
    min_latency: Duration,
    max_latency: Duration,
    total_latency: Duration,
}

impl Stats {
    fn new() -> Self {
        Self {
            rounds: 0,
            errors: 0,
            min_latency: Duration::MAX,
            max_latency: Duration::ZERO,
            total_latency: Duration::ZERO,
        }
    }

    fn record_success(&mut self, latency: Duration) {
        self.rounds += 1;
        self.total_latency += latency;
        self.min_latency = self.min_latency.min(latency);
        self.max_latency = self.max_latency.max(latency);
    }

    fn record_error(&mut self) {
        self.errors += 1;
    }

    fn print_summary(&self, total_elapsed: Duration) {
        println!("\n=== Summary ===");
        println!("Total time:     {:.2}s", total_elapsed.as_secs_f64());
        println!("Rounds:         {}", self.rounds);
        println!("Errors:         {}", self.errors);

        if let Ok(rounds) = u32::try_from(self.rounds) {
            if rounds > 0 {
                let avg_latency = self.total_latency / rounds;
                println!("Min latency:    {:.3}ms", self.min_latency.as_secs_f64() * 1000.0);
                println!("Max latency:    {:.3}ms", self.max_latency.as_secs_f64() * 1000.0);
                println!("Avg latency:    {:.3}ms", avg_latency.as_secs_f64() * 1000.0);
            }
        }
    }
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            ClientConfig::from_json(&json)
                .with_context(|| format!("Invalid config in {}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    if let Some(host) = &args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    Ok(config)
}

fn init_logging(config: &ClientConfig, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        config.log_level.as_level_filter()
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn parse_pids(codes: &[String]) -> Result<Vec<PidRequest>> {
    if codes.is_empty() {
        return Ok(SUPPORTED_PIDS.iter().map(|&spec| PidRequest::new(spec)).collect());
    }

    codes
        .iter()
        .map(|code| {
            PidRequest::from_code(code).with_context(|| {
                let supported: Vec<_> = SUPPORTED_PIDS.iter().map(|spec| spec.code()).collect();
                format!("Unsupported PID {code:?} (supported: {})", supported.join(", "))
            })
        })
        .collect()
}

fn format_round(values: &[DecodedValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

fn run_read(session: &mut Session, requests: &[PidRequest], interval: Duration, count: u64) -> Result<()> {
    let mut stats = Stats::new();
    let start = Instant::now();
    let mut round = 0;

    while count == 0 || round < count {
        round += 1;

        let round_start = Instant::now();
        match session.query_all(requests) {
            Ok(values) => {
                stats.record_success(round_start.elapsed());
                println!("{}", format_round(&values));
            }
            Err(e) if e.is_recoverable() => {
                stats.record_error();
                error!("Round {round} failed: {e}");
            }
            Err(e) => {
                stats.print_summary(start.elapsed());
                return Err(e).context("Lost adapter session");
            }
        }

        if count == 0 || round < count {
            std::thread::sleep(interval);
        }
    }

    stats.print_summary(start.elapsed());
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    init_logging(&config, args.verbose);

    let addr = config.addr();
    let mut session =
        Session::open(config).with_context(|| format!("Failed to open adapter at {addr}"))?;

    match args.command {
        Action::Read {
            pids,
            interval_ms,
            count,
        } => {
            let requests = parse_pids(&pids)?;
            run_read(
                &mut session,
                &requests,
                Duration::from_millis(interval_ms),
                count,
            )?;
        }
        Action::ClearCodes => {
            let response = session
                .clear_trouble_codes()
                .context("Clear trouble codes failed")?;
            println!("Adapter replied: {response}");
        }
        Action::Send { command } => {
            let command = Command::new(command.trim().to_uppercase());
            if command.as_str().is_empty() {
                bail!("Empty command");
            }
            let response = session
                .send_raw(&command)
                .with_context(|| format!("No reply to {command}"))?;
            println!("{response}");
        }
    }

    session.close();
    info!("Done");
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pids_default_is_all_supported() {
        let requests = parse_pids(&[]).unwrap();
        let codes: Vec<_> = requests.iter().map(|r| r.spec().code()).collect();
        assert_eq!(codes, ["010C", "010D", "0105"]);
    }

    #[test]
    fn test_parse_pids_rejects_unknown() {
        assert!(parse_pids(&["0111".to_string()]).is_err());
        assert_eq!(parse_pids(&["01 0d".to_string()]).unwrap().len(), 1);
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from(["obdconnect", "--host", "127.0.0.1", "-p", "35001", "clear-codes"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.addr(), "127.0.0.1:35001");
    }
}
