//! End-to-end protocol tests against a live TCP server over mock hardware.

use laser_server::engine::Engine;
use laser_server::hardware::mock::{mock_handles, MockLaser, MockModulator, MockSafetyInputs};
use laser_server::server::Listener;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

struct Harness {
    addr: SocketAddr,
    laser: Arc<MockLaser>,
    modulator: Arc<MockModulator>,
    safety: Arc<MockSafetyInputs>,
}

/// Boot a server on an ephemeral loopback port over mock hardware.
async fn start_server(strict: bool) -> Harness {
    let (handles, laser, modulator, safety) = mock_handles();
    let engine = Arc::new(Engine::new(handles, strict));
    let listener = Listener::bind("127.0.0.1:0".parse().expect("loopback addr"))
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(listener.serve(engine));
    Harness {
        addr,
        laser,
        modulator,
        safety,
    }
}

struct Client {
    stream: TcpStream,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self { stream }
    }

    /// Send raw bytes and read one CRLF-terminated response line.
    async fn send_raw(&mut self, raw: &[u8]) -> String {
        self.stream.write_all(raw).await.expect("write request");
        let mut reader = BufReader::new(&mut self.stream);
        let mut reply = String::new();
        reader.read_line(&mut reply).await.expect("read reply");
        reply
    }

    /// Send a command line (terminator appended) and return the response.
    async fn send(&mut self, line: &str) -> String {
        self.send_raw(format!("{line}\r\n").as_bytes()).await
    }
}

#[tokio::test]
async fn power_mutation_is_reflected_by_the_query() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;

    assert_eq!(
        client.send("LASER_POWER 50").await,
        "00 : Completed without errors\r\n"
    );
    assert_eq!(client.send("?LASER_POWER").await, "50\r\n");
}

#[tokio::test]
async fn strict_out_of_range_rejects_and_preserves_power() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;

    let reply = client.send("LASER_POWER 150").await;
    assert!(reply.starts_with("25 : "), "unexpected reply: {reply}");
    assert_eq!(client.send("?LASER_POWER").await, "0\r\n");
}

#[tokio::test]
async fn lenient_out_of_range_clamps_and_applies() {
    let harness = start_server(false).await;
    let mut client = Client::connect(harness.addr).await;

    let reply = client.send("LASER_POWER 150").await;
    assert!(reply.starts_with("02 : "), "unexpected reply: {reply}");
    assert_eq!(client.send("?LASER_POWER").await, "100\r\n");
}

#[tokio::test]
async fn repeating_a_mutation_warns_no_effect() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;

    client.send("LASER_POWER 42").await;
    assert_eq!(
        client.send("LASER_POWER 42").await,
        "01 : Command has no effect\r\n"
    );
    assert_eq!(client.send("?LASER_POWER").await, "42\r\n");
}

#[tokio::test]
async fn gated_mode_without_modulation_is_refused() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;

    let reply = client.send("LASER_MODE gated").await;
    assert!(reply.starts_with("26 : "), "unexpected reply: {reply}");
    assert_eq!(client.send("?LASER_MODE").await, "indep\r\n");
}

#[tokio::test]
async fn modulation_then_mode_then_query_round_trips() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;

    assert_eq!(
        client.send("LASER_MODULATION sine 100 50").await,
        "00 : Completed without errors\r\n"
    );
    assert_eq!(
        client.send("LASER_MODE gated").await,
        "00 : Completed without errors\r\n"
    );
    assert_eq!(client.send("?LASER_MODULATION").await, "sine 100 50\r\n");
    assert_eq!(client.send("?LASER_MODE").await, "gated\r\n");
}

#[tokio::test]
async fn oversized_frame_is_rejected_before_dispatch() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;

    let mut raw = vec![b'A'; 130];
    raw.extend_from_slice(b"\r\n");
    let reply = client.send_raw(&raw).await;
    assert!(reply.starts_with("11 : "), "unexpected reply: {reply}");

    // The connection stays healthy afterwards.
    assert_eq!(client.send("?LASER_POWER").await, "0\r\n");
}

#[tokio::test]
async fn framing_codes_cover_every_malformed_shape() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;

    assert!(client.send_raw(b"\r\n").await.starts_with("10 : "));
    assert!(client.send_raw(b"LASER_POWER 50\n").await.starts_with("12 : "));
    assert!(client.send_raw(b"   \r\n").await.starts_with("13 : "));
    assert!(client
        .send_raw(b"A B C D E F G H\r\n")
        .await
        .starts_with("14 : "));
    assert!(client.send("NO_SUCH_COMMAND").await.starts_with("20 : "));
}

#[tokio::test]
async fn open_interlock_rejects_mutations_until_overridden() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;
    harness.safety.set_interlock(false);

    assert_eq!(
        client.send("LASER_POWER 50").await,
        "90 : Safety interlock is open\r\n"
    );
    assert_eq!(client.send("?LASER_POWER").await, "0\r\n");
    assert_eq!(client.send("?INTERLOCK_STATUS").await, "open\r\n");

    harness.safety.set_override(true);
    assert_eq!(
        client.send("LASER_POWER 50").await,
        "04 : Safety interlock override is on\r\n"
    );
    assert_eq!(client.send("?LASER_POWER").await, "50\r\n");
}

#[tokio::test]
async fn warnings_compose_on_one_line() {
    let harness = start_server(false).await;
    let mut client = Client::connect(harness.addr).await;
    harness.safety.set_interlock(false);
    harness.safety.set_override(true);

    assert_eq!(
        client.send("LASER_POWER 150").await,
        "02 04 : One or more of the arguments were out of range; Safety interlock override is on\r\n"
    );
    assert_eq!(client.send("?LASER_POWER").await, "100\r\n");
}

#[tokio::test]
async fn device_fault_reports_code_with_detail() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;
    harness.laser.inject_fault("ERR-21").await;

    assert_eq!(
        client.send("LASER_MAINS on").await,
        "33 : Laser returned an error while executing command : ERR-21\r\n"
    );
}

#[tokio::test]
async fn concurrent_conflicting_writes_leave_one_winner() {
    let harness = start_server(true).await;

    let addr = harness.addr;
    let first = tokio::spawn(async move {
        let mut client = Client::connect(addr).await;
        client.send("LASER_POWER 10").await
    });
    let second = tokio::spawn(async move {
        let mut client = Client::connect(addr).await;
        client.send("LASER_POWER 90").await
    });
    let first = first.await.expect("first worker");
    let second = second.await.expect("second worker");

    // Both complete; at most one may report no-effect (never both).
    for reply in [&first, &second] {
        assert!(
            reply.starts_with("00 : ") || reply.starts_with("01 : "),
            "unexpected reply: {reply}"
        );
    }

    let mut client = Client::connect(addr).await;
    let power = client.send("?LASER_POWER").await;
    assert!(
        power == "10\r\n" || power == "90\r\n",
        "corrupted final state: {power}"
    );

    let applied = harness
        .modulator
        .applied()
        .await
        .power_percent
        .expect("a write was applied");
    assert!(applied == 10.0 || applied == 90.0);
}

#[tokio::test]
async fn info_and_strict_mode_queries_answer() {
    let harness = start_server(true).await;
    let mut client = Client::connect(harness.addr).await;

    assert!(client.send("?INFO_SERVER").await.contains("laser-server"));
    assert_eq!(client.send("?STRICT_MODE").await, "on\r\n");
    assert_eq!(
        client.send("STRICT_MODE off").await,
        "00 : Completed without errors\r\n"
    );
    assert_eq!(client.send("?STRICT_MODE").await, "off\r\n");
}
