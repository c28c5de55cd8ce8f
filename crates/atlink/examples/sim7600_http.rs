//! Fetch a web page over a SIM7600 cellular modem.
//!
//! Demonstrates the full session lifecycle: initialize, attach to the
//! carrier network, open a TCP socket, send an HTTP request, and drain
//! the response.
//!
//! # Requirements
//!
//! - A SIM7600-series modem with an activated SIM
//! - The serial port path and APN adjusted for your setup (the AT port is
//!   usually the third CDC interface, e.g. `/dev/ttyUSB2`)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p atlink --features sim7600 --example sim7600_http
//! ```

use atlink::sim7600::Sim7600;
use atlink::transport::SerialTransport;
use atlink::{NetworkConfig, Session, SessionConfig};

fn main() -> anyhow::Result<()> {
    // Adjust these for your modem and carrier.
    let serial_port = "/dev/ttyUSB2";
    let apn = "internet";

    println!("Opening {}...", serial_port);
    let port = SerialTransport::open(serial_port, 115_200)?;
    let session = Session::new(
        Box::new(port),
        Box::new(Sim7600::new()),
        SessionConfig::default(),
    );

    if !session.begin()? {
        anyhow::bail!("modem did not respond");
    }
    println!("Modem: {}", session.modem_name()?);
    println!("Signal quality: {}", session.signal_quality()?);

    println!("Attaching to APN {}...", apn);
    if !session.attach_network(&NetworkConfig::Cellular {
        apn,
        user: None,
        password: None,
    })? {
        anyhow::bail!("network attach failed");
    }
    println!("Local IP: {}", session.local_ip()?);

    let socket = session.socket(0)?;
    if !socket.connect("example.org", 80)? {
        anyhow::bail!("connect failed");
    }
    socket.write(b"GET / HTTP/1.0\r\nHost: example.org\r\n\r\n")?;

    let mut buf = [0u8; 512];
    while socket.connected()? {
        let n = socket.read(&mut buf)?;
        if n > 0 {
            print!("{}", String::from_utf8_lossy(&buf[..n]));
        }
        session.maintain()?;
    }

    socket.stop()?;
    session.detach_network()?;
    Ok(())
}
