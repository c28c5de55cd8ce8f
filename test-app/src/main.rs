// atlink test application -- CLI tool for exercising both modem dialects
// (SIM7600, XBee) against real hardware or a mock transport.
//
// Usage:
//   atlink-test-app --dialect sim7600 --port /dev/ttyUSB2 probe
//   atlink-test-app --dialect sim7600 --port /dev/ttyUSB2 info
//   atlink-test-app --dialect sim7600 --port /dev/ttyUSB2 attach --apn internet
//   atlink-test-app --dialect xbee --port /dev/ttyUSB0 attach \
//       --ssid homenet --passphrase secret
//   atlink-test-app --dialect sim7600 --port /dev/ttyUSB2 http example.org
//   atlink-test-app --dialect sim7600 --mock probe
//   atlink-test-app list

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use atlink::sim7600::Sim7600;
use atlink::xbee::XBee;
use atlink::{Error, NetworkConfig, Session, SessionConfig};
use atlink_test_harness::MockHandle;
use atlink_transport::SerialTransport;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// atlink test application -- exercises modem dialects from the command line.
#[derive(Parser)]
#[command(name = "atlink-test-app", version, about)]
struct Cli {
    /// Dialect: sim7600 or xbee.
    /// Required for all commands except `list`.
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Serial port path (e.g. /dev/ttyUSB2, COM3).
    #[arg(long)]
    port: Option<String>,

    /// Override the default baud rate for the port.
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Use a scripted mock transport instead of a serial port.
    /// Only the `probe` command is scripted.
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Dialect {
    Sim7600,
    Xbee,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the modem and report whether it responded.
    Probe,
    /// Print modem identity, signal quality, SIM status, IP, and battery.
    Info,
    /// Attach to the data network.
    Attach {
        /// Cellular APN (SIM7600).
        #[arg(long)]
        apn: Option<String>,
        /// APN username.
        #[arg(long)]
        user: Option<String>,
        /// APN password.
        #[arg(long)]
        password: Option<String>,
        /// Wi-Fi SSID (XBee).
        #[arg(long)]
        ssid: Option<String>,
        /// Wi-Fi passphrase (XBee).
        #[arg(long)]
        passphrase: Option<String>,
    },
    /// Detach from the data network.
    Detach,
    /// Reset the modem and re-initialize it.
    Restart,
    /// Fetch `http://<host><path>` over socket 0 and print the response.
    Http {
        /// Server hostname.
        host: String,
        /// Request path.
        #[arg(default_value = "/")]
        path: String,
        /// Server TCP port.
        #[arg(long, default_value_t = 80)]
        tcp_port: u16,
    },
    /// List the dialects compiled into this build.
    List,
}

// ---------------------------------------------------------------------------
// Session construction
// ---------------------------------------------------------------------------

fn build_session(cli: &Cli) -> Result<Session> {
    let dialect = cli
        .dialect
        .context("--dialect is required for this command")?;

    let config = match dialect {
        Dialect::Sim7600 => SessionConfig {
            mux_count: atlink::sim7600::MUX_COUNT,
            ..SessionConfig::default()
        },
        Dialect::Xbee => SessionConfig {
            mux_count: atlink::xbee::MUX_COUNT,
            ..SessionConfig::default()
        },
    };

    let transport: Box<dyn atlink::Transport> = if cli.mock {
        Box::new(scripted_mock(dialect))
    } else {
        let port = cli
            .port
            .as_deref()
            .context("--port is required unless --mock is used")?;
        Box::new(SerialTransport::open(port, cli.baud)?)
    };

    let variant: Box<dyn atlink::ModemVariant> = match dialect {
        Dialect::Sim7600 => Box::new(Sim7600::new()),
        // Skip the guard silence against the mock; real modules need it.
        Dialect::Xbee if cli.mock => {
            Box::new(XBee::new().with_guard_delay(Duration::ZERO))
        }
        Dialect::Xbee => Box::new(XBee::new()),
    };

    Ok(Session::new(transport, variant, config))
}

/// Pre-load the responses `probe` will trigger, per dialect.
fn scripted_mock(dialect: Dialect) -> MockHandle {
    let mock = MockHandle::new();
    match dialect {
        Dialect::Sim7600 => {
            mock.expect(b"AT\r\n", b"\r\nOK\r\n");
            mock.expect(b"ATE0\r\n", b"\r\nOK\r\n");
            mock.expect(b"AT+CGMM\r\n", b"\r\nSIM7600G-H\r\n\r\nOK\r\n");
            mock.expect(b"AT+CPIN?\r\n", b"\r\n+CPIN: READY\r\n\r\nOK\r\n");
        }
        Dialect::Xbee => {
            mock.expect(b"+++", b"OK\r");
            mock.expect(b"AT\r", b"OK\r");
            mock.expect(b"ATCN\r", b"OK\r");
        }
    }
    mock
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Print one peripheral line, tolerating dialects that lack the query.
fn print_query<T: std::fmt::Display>(label: &str, result: atlink::Result<T>) {
    match result {
        Ok(value) => println!("{label}: {value}"),
        Err(Error::Unsupported(_)) => println!("{label}: (not supported)"),
        Err(err) => println!("{label}: query failed ({err})"),
    }
}

fn cmd_probe(session: &Session) -> Result<()> {
    let start = Instant::now();
    if session.begin()? {
        println!("Modem responded in {:?}", start.elapsed());
    } else {
        bail!("modem did not respond");
    }
    Ok(())
}

fn cmd_info(session: &Session) -> Result<()> {
    if !session.begin()? {
        bail!("modem did not respond");
    }
    print_query("Model", session.modem_name());
    print_query("Signal quality", session.signal_quality());
    match session.sim_status() {
        Ok(status) => println!("SIM: {status:?}"),
        Err(Error::Unsupported(_)) => println!("SIM: (not supported)"),
        Err(err) => println!("SIM: query failed ({err})"),
    }
    print_query("Local IP", session.local_ip());
    print_query("Battery (mV)", session.battery_millivolts());
    Ok(())
}

fn cmd_attach(
    session: &Session,
    dialect: Dialect,
    apn: Option<&str>,
    user: Option<&str>,
    password: Option<&str>,
    ssid: Option<&str>,
    passphrase: Option<&str>,
) -> Result<()> {
    if !session.begin()? {
        bail!("modem did not respond");
    }

    let config = match dialect {
        Dialect::Sim7600 => NetworkConfig::Cellular {
            apn: apn.context("--apn is required for sim7600")?,
            user,
            password,
        },
        Dialect::Xbee => NetworkConfig::WiFi {
            ssid: ssid.context("--ssid is required for xbee")?,
            passphrase: passphrase.context("--passphrase is required for xbee")?,
        },
    };

    let start = Instant::now();
    if session.attach_network(&config)? {
        println!("Attached in {:?}", start.elapsed());
    } else {
        bail!("network attach failed");
    }
    Ok(())
}

fn cmd_detach(session: &Session) -> Result<()> {
    if session.detach_network()? {
        println!("Detached");
    } else {
        println!("Nothing to detach");
    }
    Ok(())
}

fn cmd_restart(session: &Session) -> Result<()> {
    let start = Instant::now();
    if session.restart()? {
        println!("Restarted in {:?}", start.elapsed());
    } else {
        bail!("restart failed");
    }
    Ok(())
}

fn cmd_http(session: &Session, host: &str, path: &str, tcp_port: u16) -> Result<()> {
    let socket = session.socket(0)?;
    if !socket.connect(host, tcp_port)? {
        bail!("connect to {host}:{tcp_port} failed");
    }

    let request = format!("GET {path} HTTP/1.0\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    let sent = socket.write(request.as_bytes())?;
    if sent < request.len() {
        bail!("short write: {sent} of {} bytes accepted", request.len());
    }

    let deadline = Instant::now() + Duration::from_secs(30);
    let mut total = 0usize;
    let mut buf = [0u8; 512];
    while socket.connected()? {
        let n = socket.read(&mut buf)?;
        if n > 0 {
            total += n;
            print!("{}", String::from_utf8_lossy(&buf[..n]));
        } else if Instant::now() >= deadline {
            break;
        }
        session.maintain()?;
    }

    socket.stop()?;
    eprintln!("\n-- {total} bytes received --");
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::List = cli.command {
        for name in atlink::supported_dialects() {
            println!("{name}");
        }
        return Ok(());
    }

    let session = build_session(&cli)?;

    match &cli.command {
        Command::Probe => cmd_probe(&session),
        Command::Info => cmd_info(&session),
        Command::Attach {
            apn,
            user,
            password,
            ssid,
            passphrase,
        } => cmd_attach(
            &session,
            cli.dialect.context("--dialect is required")?,
            apn.as_deref(),
            user.as_deref(),
            password.as_deref(),
            ssid.as_deref(),
            passphrase.as_deref(),
        ),
        Command::Detach => cmd_detach(&session),
        Command::Restart => cmd_restart(&session),
        Command::Http {
            host,
            path,
            tcp_port,
        } => cmd_http(&session, host, path, *tcp_port),
        Command::List => unreachable!("handled above"),
    }
}
