//! `sip-probe` command-line entry point
//!
//! Sends one SIP OPTIONS request to `--addr` and exits 0 on `200 OK`, 1 on
//! any other response, and 5 on configuration errors, transport errors,
//! timeouts and interrupts.

use std::io::{self, Write};

use clap::{CommandFactory, Parser};
use tracing::{debug, error, warn};

use sip_probe::logging::{setup_logging, LoggingConfig};
use sip_probe::prelude::*;

/// Exit code when no address was given
const EXIT_USAGE: i32 = 1;

/// SIP OPTIONS health check
#[derive(Parser, Debug)]
#[command(name = "sip-probe", version, about)]
struct Cli {
    /// SIP endpoint, e.g. udp://10.0.0.5:5060, tls://sip.example.com:5061 or
    /// wss://edge.example.com/ws
    #[arg(long, env = "SIP_PROBE_ADDR", default_value = "")]
    addr: String,

    /// Skip TLS certificate verification for tls and wss targets
    #[arg(long = "skipverify", env = "SIP_PROBE_SKIP_VERIFY")]
    skip_verify: bool,

    /// Do debug logging
    #[arg(long, env = "SIP_PROBE_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = run(cli).await;
    // Outstanding transport I/O is torn down by the exit itself
    std::process::exit(code);
}

/// Run the probe and return the exit code. The logging guard lives exactly
/// as long as this call, so every line is flushed before the process exits.
async fn run(cli: Cli) -> i32 {
    let _guard = match setup_logging(&LoggingConfig::for_debug_flag(cli.debug)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            return EXIT_FATAL;
        }
    };
    debug!("Debug logging enabled");

    if cli.addr.trim().is_empty() {
        warn!("No addr parameter found!");
        if let Err(e) = write_usage(&mut io::stdout()) {
            eprintln!("Failed to print usage: {}", e);
        }
        return EXIT_USAGE;
    }

    let target = match Target::parse(&cli.addr, TlsPolicy::from_skip_verify(cli.skip_verify)) {
        Ok(target) => target,
        Err(e) => {
            error!("addr: {}", e);
            return EXIT_FATAL;
        }
    };
    debug!("Got addr: \"{}\"", target);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    Prober::default().run(&target, cancel).await.exit_code()
}

fn write_usage(out: &mut impl Write) -> io::Result<()> {
    Cli::command().write_help(out)?;
    out.flush()
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    debug!("Setting up interrupt signal handler");
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel.cancel(),
            Err(e) => warn!("Unable to listen for interrupts: {}", e),
        }
    });
}
