// atkit test application -- CLI tool for exercising the AT client and
// server against real modems (serial or TCP) or a mock transport.
//
// Usage:
//   atkit-test-app --port /dev/ttyUSB0 send AT+GSN
//   atkit-test-app --port /dev/ttyUSB0 --baud 19200 send --crc AT%CRC=1
//   atkit-test-app --host 192.168.1.50:5000 send AT --timeout-ms 2000
//   atkit-test-app --mock send AT+GSN
//   atkit-test-app --port /dev/ttyUSB0 listen --read-until "\r\n" --duration 30
//   atkit-test-app serve --listen 0.0.0.0:5000
//
// Set RUST_LOG=debug (or trace) to watch the parser state machine work.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use atkit::client::{AtClient, UrcConfig};
use atkit::server::{AtServer, Command as AtCommand};
use atkit::test_harness::MockSerial;
use atkit::transport::{SerialTransport, TcpTransport};
use atkit::{Transport, CR};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// atkit test application -- exercises the AT toolkit from the command line.
#[derive(Parser)]
#[command(name = "atkit-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    #[arg(long)]
    port: Option<String>,

    /// Baud rate for the serial port.
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// TCP address of a modem or modem bridge (e.g. 192.168.1.50:5000).
    /// Used instead of --port.
    #[arg(long)]
    host: Option<String>,

    /// Use a mock transport that answers OK to everything.
    /// Useful for verifying CLI parsing and client wiring without hardware.
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one AT command and print the response.
    Send {
        /// The command, e.g. "AT+GSN".
        command: String,

        /// Response timeout in milliseconds.
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,

        /// Strip this prefix from the information response before printing.
        #[arg(long)]
        prefix: Option<String>,

        /// Start the session with CRC mode already enabled.
        #[arg(long)]
        crc: bool,

        /// Assume the device does not echo.
        #[arg(long)]
        no_echo: bool,

        /// Repeat the command this many times (for soak testing).
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },

    /// Poll for unsolicited result codes and print them as they arrive.
    Listen {
        /// First character of an unsolicited line.
        #[arg(long, default_value_t = '+')]
        prefix: char,

        /// Pattern that terminates an unsolicited line.
        #[arg(long, default_value = "\r\n")]
        read_until: String,

        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Run a demo AT server. Registers +GSN, +HELLO, and +ECHO.
    Serve {
        /// TCP address to listen on (e.g. 0.0.0.0:5000).
        /// Serves over --port instead when omitted.
        #[arg(long)]
        listen: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Transport construction
// ---------------------------------------------------------------------------

/// Open the transport selected by the connection flags.
async fn create_transport(cli: &Cli) -> Result<Box<dyn Transport>> {
    if cli.mock {
        bail!("--mock is handled per-command");
    }
    match (&cli.port, &cli.host) {
        (Some(_), Some(_)) => bail!("--port and --host are mutually exclusive"),
        (Some(port), None) => {
            let transport = SerialTransport::open(port, cli.baud)
                .await
                .with_context(|| format!("failed to open serial port {port} at {} baud", cli.baud))?;
            println!("Connected to {port} at {} baud", cli.baud);
            Ok(Box::new(transport))
        }
        (None, Some(host)) => {
            let transport = TcpTransport::connect(host)
                .await
                .with_context(|| format!("failed to connect to {host}"))?;
            println!("Connected to {host}");
            Ok(Box::new(transport))
        }
        (None, None) => bail!("one of --port, --host, or --mock is required"),
    }
}

/// A mock that answers `OK` (verbose, no echo) to the given command.
fn create_mock(command: &str, crc: bool, repeat: u32) -> MockSerial {
    let mut mock = MockSerial::new();
    let mut line = if crc {
        atkit::crc::apply_crc(command)
    } else {
        command.to_string()
    };
    line.push(CR as char);
    let reply: &[u8] = if crc { b"\r\nOK\r\n*86C5\r\n" } else { b"\r\nOK\r\n" };
    for _ in 0..repeat {
        mock.expect(line.as_bytes(), reply);
    }
    mock
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_send(
    mut client: AtClient,
    command: &str,
    timeout: Duration,
    prefix: Option<&str>,
    repeat: u32,
) -> Result<()> {
    for i in 1..=repeat {
        let started = Instant::now();
        let outcome = client.send_command(command, timeout).await;
        let elapsed = started.elapsed();
        match outcome {
            Ok(()) => {
                let body = client.response(prefix).unwrap_or_default();
                if body.is_empty() {
                    println!("[{i}/{repeat}] OK ({:.1} ms)", elapsed.as_secs_f64() * 1000.0);
                } else {
                    println!(
                        "[{i}/{repeat}] OK ({:.1} ms): {body}",
                        elapsed.as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                // An error response may still carry a body worth seeing.
                if let Some(body) = client.response(prefix) {
                    if !body.is_empty() {
                        eprintln!("[{i}/{repeat}] {e}: {body}");
                        continue;
                    }
                }
                eprintln!("[{i}/{repeat}] {e}");
            }
        }
    }
    if let Some(e) = client.last_error() {
        bail!("last command failed: {e}");
    }
    Ok(())
}

async fn cmd_listen(
    mut client: AtClient,
    prefix: char,
    read_until: &str,
    duration_secs: u64,
) -> Result<()> {
    let config = UrcConfig::new()
        .prefix(prefix)
        .read_until(read_until)
        .wait(Duration::from_millis(50));

    println!("Listening for unsolicited codes (Ctrl-C to stop)...");
    let deadline = (duration_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(duration_secs));
    let mut seen = 0u32;

    loop {
        if let Some(dl) = deadline {
            if Instant::now() >= dl {
                break;
            }
        }
        if client.check_urc(&config).await? {
            if let Some(body) = client.response(None) {
                seen += 1;
                println!("[urc] {body}");
            }
        }
    }

    println!("{seen} unsolicited code(s) received.");
    Ok(())
}

/// Register the demo command set on a server.
fn demo_server(transport: Box<dyn Transport>) -> Result<AtServer> {
    let mut server = AtServer::new(transport);
    let commands = [
        AtCommand::new("+GSN").on_read(|| Ok(Some("+GSN: 00000000SKYEE3D".to_string()))),
        AtCommand::new("+HELLO")
            .on_run(|| Ok(Some("Hello, World!".to_string())))
            .on_write(|params| Ok(Some(format!("Hello, {params}!")))),
        AtCommand::new("+ECHO").on_write(|params| Ok(Some(params.to_string()))),
    ];
    for command in commands {
        server
            .register(command)
            .map_err(|e| anyhow::anyhow!("demo command registration failed: {e}"))?;
    }
    Ok(server)
}

async fn run_server(mut server: AtServer) -> Result<()> {
    loop {
        let dispatched = server
            .service()
            .await
            .map_err(|e| anyhow::anyhow!("server transport failed: {e}"))?;
        if dispatched > 0 {
            if let Some(e) = server.last_error() {
                tracing::warn!(error = %e, "command line rejected");
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn cmd_serve(cli: &Cli, listen: Option<&str>) -> Result<()> {
    match listen {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            println!("Serving AT commands on {addr} (Ctrl-C to stop)...");
            loop {
                let (stream, peer) = listener.accept().await.context("accept failed")?;
                println!("Client connected: {peer}");
                let transport = TcpTransport::from_stream(stream, peer.to_string());
                let server = demo_server(Box::new(transport))?;
                // One client at a time; the session state is per-connection.
                if let Err(e) = run_server(server).await {
                    println!("Client disconnected: {e}");
                }
            }
        }
        None => {
            let transport = create_transport(cli).await?;
            let server = demo_server(transport)?;
            println!("Serving AT commands (Ctrl-C to stop)...");
            run_server(server).await
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Send {
            command,
            timeout_ms,
            prefix,
            crc,
            no_echo,
            repeat,
        } => {
            let client = if cli.mock {
                let mock = create_mock(command, *crc, *repeat);
                println!("Connected (mock transport)");
                AtClient::builder().echo(false).crc(*crc).build(Box::new(mock))
            } else {
                let transport = create_transport(&cli).await?;
                AtClient::builder()
                    .echo(!no_echo)
                    .crc(*crc)
                    .build(transport)
            };
            cmd_send(
                client,
                command,
                Duration::from_millis(*timeout_ms),
                prefix.as_deref(),
                *repeat,
            )
            .await
        }
        Command::Listen {
            prefix,
            read_until,
            duration,
        } => {
            if cli.mock {
                bail!("--mock is not supported for listen (nothing unsolicited arrives)");
            }
            let transport = create_transport(&cli).await?;
            let client = AtClient::new(transport);
            cmd_listen(client, *prefix, read_until, *duration).await
        }
        Command::Serve { listen } => {
            if cli.mock {
                bail!("--mock is not supported for serve");
            }
            cmd_serve(&cli, listen.as_deref()).await
        }
    }
}
