//! Join a Wi-Fi network with an XBee module and echo a line to a server.
//!
//! The XBee carries a single transparent-mode link, so all payload after
//! `connect` moves as raw pass-through; only configuration goes through
//! command mode.
//!
//! # Requirements
//!
//! - A Digi XBee Wi-Fi module on a serial port
//! - SSID, passphrase, and server address adjusted below
//!
//! # Usage
//!
//! ```sh
//! cargo run -p atlink --features xbee --example xbee_wifi
//! ```

use atlink::transport::SerialTransport;
use atlink::xbee::{XBee, MUX_COUNT};
use atlink::{NetworkConfig, Session, SessionConfig};

fn main() -> anyhow::Result<()> {
    let serial_port = "/dev/ttyUSB0";

    let port = SerialTransport::open(serial_port, 9_600)?;
    let session = Session::new(
        Box::new(port),
        Box::new(XBee::new()),
        SessionConfig {
            mux_count: MUX_COUNT,
            ..SessionConfig::default()
        },
    );

    if !session.begin()? {
        anyhow::bail!("module did not respond to command mode");
    }

    println!("Joining network...");
    if !session.attach_network(&NetworkConfig::WiFi {
        ssid: "homenet",
        passphrase: "hunter2",
    })? {
        anyhow::bail!("association failed");
    }

    let socket = session.socket(0)?;
    if !socket.connect("192.168.1.10", 7)? {
        anyhow::bail!("connect failed");
    }
    socket.write(b"hello from atlink\n")?;

    let mut buf = [0u8; 128];
    loop {
        let n = socket.read(&mut buf)?;
        if n > 0 {
            println!("echo: {}", String::from_utf8_lossy(&buf[..n]));
            break;
        }
        session.maintain()?;
    }

    socket.stop()?;
    Ok(())
}
