//! End-to-end session flows against a scripted transport.

use atlink_core::{Error, NetworkConfig, Session, SessionConfig};
use atlink_sim7600::{Sim7600, TransferMode};
use atlink_test_harness::MockHandle;

fn session(mock: &MockHandle) -> Session {
    Session::new(
        Box::new(mock.clone()),
        Box::new(Sim7600::new()),
        SessionConfig::default(),
    )
}

#[test]
fn begin_initializes_modem() {
    let mock = MockHandle::new();
    mock.expect(b"AT\r\n", b"\r\nOK\r\n");
    mock.expect(b"ATE0\r\n", b"\r\nOK\r\n");
    mock.expect(b"AT+CGMM\r\n", b"\r\nSIM7600G-H\r\n\r\nOK\r\n");
    mock.expect(b"AT+CPIN?\r\n", b"\r\n+CPIN: READY\r\n\r\nOK\r\n");

    let session = session(&mock);
    assert!(session.begin().unwrap());
    assert_eq!(mock.remaining_expectations(), 0);
}

#[test]
fn connect_opens_tcp_link() {
    let mock = MockHandle::new();
    mock.expect(b"AT+CIPRXGET=1\r\n", b"\r\nOK\r\n");
    mock.expect(
        b"AT+CIPOPEN=2,\"TCP\",\"example.org\",8080\r\n",
        b"\r\n+CIPOPEN: 2,0\r\n",
    );

    let session = session(&mock);
    let socket = session.socket(2).unwrap();
    assert!(socket.connect("example.org", 8080).unwrap());
    assert!(session.maintain().is_ok());
    assert_eq!(mock.remaining_expectations(), 0);
}

#[test]
fn connect_failure_reports_false() {
    let mock = MockHandle::new();
    mock.expect(b"AT+CIPRXGET=1\r\n", b"\r\nOK\r\n");
    mock.expect(
        b"AT+CIPOPEN=0,\"TCP\",\"example.org\",80\r\n",
        b"\r\n+CIPOPEN: 0,1\r\n",
    );

    let session = session(&mock);
    let socket = session.socket(0).unwrap();
    assert!(!socket.connect("example.org", 80).unwrap());
}

#[test]
fn write_chunks_at_dialect_limit() {
    // 1200 bytes exceed the 1024-byte per-command cap, so the engine must
    // issue two send round-trips.
    let payload = vec![b'x'; 1200];

    let mock = MockHandle::new();
    mock.expect(b"AT+CIPSEND=0,1024\r\n", b"\r\n>");
    mock.expect(&payload[..1024], b"\r\n+CIPSEND: 0,1024,1024\r\n");
    mock.expect(b"AT+CIPSEND=0,176\r\n", b"\r\n>");
    mock.expect(&payload[1024..], b"\r\n+CIPSEND: 0,176,176\r\n");

    let session = session(&mock);
    let socket = session.socket(0).unwrap();
    assert_eq!(socket.write(&payload).unwrap(), 1200);

    let sent = mock.sent_data();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[1].len(), 1024);
    assert_eq!(sent[3].len(), 176);
    assert_eq!(mock.remaining_expectations(), 0);
}

#[test]
fn short_accept_stops_the_write_loop() {
    let payload = vec![b'x'; 100];

    let mock = MockHandle::new();
    mock.expect(b"AT+CIPSEND=0,100\r\n", b"\r\nERROR\r\n");

    let session = session(&mock);
    let socket = session.socket(0).unwrap();
    // The prompt never came; nothing was accepted.
    assert_eq!(socket.write(&payload).unwrap(), 0);
}

#[test]
fn read_combines_fifo_and_modem_buffer() {
    let mock = MockHandle::new();
    let session = session(&mock);
    let socket = session.socket(0).unwrap();

    // 20 bytes arrive; the first read takes 10 and leaves 10 buffered.
    mock.inject(b"\r\n+RECEIVE:0,20\r\n");
    mock.expect(b"AT+CIPRXGET=4,0\r\n", b"\r\n+CIPRXGET: 4,0,20\r\nOK\r\n");
    mock.expect(
        b"AT+CIPRXGET=2,0,20\r\n",
        b"\r\n+CIPRXGET: 2,0,20,0\r\nAAAAAAAAAABBBBBBBBBB\r\nOK\r\n",
    );
    let mut first = [0u8; 10];
    assert_eq!(socket.read(&mut first).unwrap(), 10);
    assert_eq!(&first, b"AAAAAAAAAA");

    // 40 more arrive on the modem. A read(50) must drain the 10 buffered
    // bytes and fetch the 40 outstanding in one call.
    mock.inject(b"\r\n+RECEIVE:0,40\r\n");
    mock.expect(b"AT+CIPRXGET=4,0\r\n", b"\r\n+CIPRXGET: 4,0,40\r\nOK\r\n");
    let mut fetched = Vec::from(&b"\r\n+CIPRXGET: 2,0,40,0\r\n"[..]);
    fetched.extend_from_slice(&[b'C'; 40]);
    fetched.extend_from_slice(b"\r\nOK\r\n");
    mock.expect(b"AT+CIPRXGET=2,0,40\r\n", &fetched);

    let mut second = [0u8; 50];
    assert_eq!(socket.read(&mut second).unwrap(), 50);
    assert_eq!(&second[..10], b"BBBBBBBBBB");
    assert!(second[10..].iter().all(|&b| b == b'C'));
    assert_eq!(mock.remaining_expectations(), 0);
}

#[test]
fn peer_close_keeps_buffered_bytes_readable() {
    let mock = MockHandle::new();
    mock.expect(b"AT+CIPRXGET=1\r\n", b"\r\nOK\r\n");
    mock.expect(
        b"AT+CIPOPEN=0,\"TCP\",\"example.org\",80\r\n",
        b"\r\n+CIPOPEN: 0,0\r\n",
    );

    let session = session(&mock);
    let socket = session.socket(0).unwrap();
    assert!(socket.connect("example.org", 80).unwrap());

    // Five bytes arrive; the application reads three of them.
    mock.inject(b"\r\n+RECEIVE:0,5\r\n");
    mock.expect(b"AT+CIPRXGET=4,0\r\n", b"\r\n+CIPRXGET: 4,0,5\r\nOK\r\n");
    mock.expect(
        b"AT+CIPRXGET=2,0,5\r\n",
        b"\r\n+CIPRXGET: 2,0,5,0\r\nhello\r\nOK\r\n",
    );
    let mut buf = [0u8; 3];
    assert_eq!(socket.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf, b"hel");

    // The peer closes while two bytes are still buffered locally. The
    // socket must stay readable until they are drained.
    mock.inject(b"\r\n+IPCLOSE: 0,1\r\n");
    assert!(socket.connected().unwrap());

    let mut rest = [0u8; 2];
    assert_eq!(socket.read(&mut rest).unwrap(), 2);
    assert_eq!(&rest, b"lo");

    // Drained: the close is now visible.
    mock.expect(b"AT+CIPRXGET=4,0\r\n", b"\r\n+CIPRXGET: 4,0,0\r\nOK\r\n");
    mock.expect(
        b"AT+CIPCLOSE?\r\n",
        b"\r\n+CIPCLOSE: 0,0,0,0,0,0,0,0,0,0\r\nOK\r\n",
    );
    assert!(!socket.connected().unwrap());
    assert_eq!(mock.remaining_expectations(), 0);
}

#[test]
fn stop_is_idempotent() {
    let mock = MockHandle::new();
    let session = session(&mock);
    let socket = session.socket(0).unwrap();

    mock.expect(b"AT+CIPCLOSE=0\r\n", b"\r\nOK\r\n");
    socket.stop().unwrap();

    // A second stop gets ERROR from the modem and still succeeds.
    mock.expect(b"AT+CIPCLOSE=0\r\n", b"\r\nERROR\r\n");
    socket.stop().unwrap();
}

#[test]
fn mux_isolation_routes_data_to_its_socket() {
    let mock = MockHandle::new();
    let session = session(&mock);
    let one = session.socket(1).unwrap();
    let two = session.socket(2).unwrap();

    // Data lands on mux 1 while mux 2 reads: mux 2 must see nothing.
    mock.inject(b"\r\n+RECEIVE:1,5\r\n");
    mock.expect(b"AT+CIPRXGET=4,1\r\n", b"\r\n+CIPRXGET: 4,1,5\r\nOK\r\n");
    let mut buf = [0u8; 8];
    assert_eq!(two.read(&mut buf).unwrap(), 0);

    mock.expect(
        b"AT+CIPRXGET=2,1,5\r\n",
        b"\r\n+CIPRXGET: 2,1,5,0\r\nworld\r\nOK\r\n",
    );
    let n = one.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"world");
    assert_eq!(mock.remaining_expectations(), 0);
}

#[test]
fn hex_transfer_decodes_pairs() {
    let mock = MockHandle::new();
    let session = Session::new(
        Box::new(mock.clone()),
        Box::new(Sim7600::new().with_transfer_mode(TransferMode::Hex)),
        SessionConfig::default(),
    );
    let socket = session.socket(0).unwrap();

    mock.inject(b"\r\n+RECEIVE:0,2\r\n");
    mock.expect(b"AT+CIPRXGET=4,0\r\n", b"\r\n+CIPRXGET: 4,0,2\r\nOK\r\n");
    mock.expect(
        b"AT+CIPRXGET=3,0,2\r\n",
        b"\r\n+CIPRXGET: 3,0,2,0\r\n6869\r\nOK\r\n",
    );

    let mut buf = [0u8; 2];
    assert_eq!(socket.read(&mut buf).unwrap(), 2);
    assert_eq!(&buf, b"hi");
}

#[test]
fn attach_network_runs_full_sequence() {
    let mock = MockHandle::new();
    // Detach-first is tolerated failing when the stack was never up.
    mock.expect(b"AT+NETCLOSE\r\n", b"\r\nERROR\r\n");
    mock.expect(b"AT+CGSOCKCONT=1,\"IP\",\"internet\"\r\n", b"\r\nOK\r\n");
    mock.expect(b"AT+CSOCKSETPN=1\r\n", b"\r\nOK\r\n");
    mock.expect(b"AT+CIPSENDMODE=0\r\n", b"\r\nOK\r\n");
    mock.expect(b"AT+CIPCCFG=10,0,0,0,1,0,75000\r\n", b"\r\nOK\r\n");
    mock.expect(b"AT+CIPMODE=0\r\n", b"\r\nOK\r\n");
    mock.expect(b"AT+CIPTIMEOUT=75000,15000,15000\r\n", b"\r\nOK\r\n");
    mock.expect(b"AT+NETOPEN\r\n", b"\r\nOK\r\n\r\n+NETOPEN: 0\r\n");

    let session = session(&mock);
    let attached = session
        .attach_network(&NetworkConfig::Cellular {
            apn: "internet",
            user: None,
            password: None,
        })
        .unwrap();
    assert!(attached);
    assert_eq!(mock.remaining_expectations(), 0);
}

#[test]
fn wifi_attach_is_rejected() {
    let mock = MockHandle::new();
    let session = session(&mock);
    let result = session.attach_network(&NetworkConfig::WiFi {
        ssid: "bench",
        passphrase: "hunter2",
    });
    assert!(matches!(result.unwrap_err(), Error::Unsupported(_)));
}

#[test]
fn signal_quality_parses_csq() {
    let mock = MockHandle::new();
    mock.expect(b"AT+CSQ\r\n", b"\r\n+CSQ: 17,99\r\n\r\nOK\r\n");
    let session = session(&mock);
    assert_eq!(session.signal_quality().unwrap(), 17);
}

#[test]
fn battery_query_parses_volts() {
    let mock = MockHandle::new();
    mock.expect(b"AT+CBC\r\n", b"\r\n+CBC: 3.832V\r\n\r\nOK\r\n");
    let session = session(&mock);
    assert_eq!(session.battery_millivolts().unwrap(), 3832);
}

#[test]
fn local_ip_strips_reply_framing() {
    let mock = MockHandle::new();
    mock.expect(b"AT+IPADDR\r\n", b"\r\n+IPADDR: 10.93.1.7\r\n\r\nOK\r\n");
    let session = session(&mock);
    assert_eq!(session.local_ip().unwrap(), "10.93.1.7");
}
