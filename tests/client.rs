//! End-to-end tests of `OgnClient` over in-memory streams

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use ogn_client::{
    Result,
    client::{
        OgnClient,
        connection::{ConnectionState, Dialer},
        listener::AircraftBeaconListener,
    },
    config::ClientConfig,
    error::OgnClientError,
    protocol::beacon::{AddressType, AircraftBeacon, AircraftDescriptor, AircraftType, Beacon},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Hands out one duplex pipe per dial and forwards the server end
struct PipeDialer {
    dials: Arc<Mutex<Vec<u16>>>,
    servers: mpsc::UnboundedSender<DuplexStream>,
}

impl Dialer for PipeDialer {
    type Stream = Compat<DuplexStream>;

    async fn dial(&self, _host: &str, port: u16) -> std::io::Result<Self::Stream> {
        self.dials.lock().unwrap().push(port);
        let (client, server) = tokio::io::duplex(64 * 1024);
        let _ = self.servers.send(server);
        Ok(client.compat())
    }
}

/// Server end of one connection
struct Server {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl Server {
    fn new(stream: DuplexStream) -> Self {
        let (read, writer) = tokio::io::split(stream);
        Server {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn next_line(&mut self) -> Option<String> {
        tokio::time::timeout(TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a client line")
            .unwrap()
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }
}

struct Fixture {
    client: OgnClient<PipeDialer>,
    dials: Arc<Mutex<Vec<u16>>>,
    servers: mpsc::UnboundedReceiver<DuplexStream>,
    decoded: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    fn new(config: ClientConfig) -> Self {
        let (tx, servers) = mpsc::unbounded_channel();
        let dials = Arc::new(Mutex::new(Vec::new()));
        let decoded = Arc::new(Mutex::new(Vec::new()));

        let decoder = {
            let decoded = decoded.clone();
            move |line: &str, allow_aircraft: bool, _allow_receiver: bool| -> Result<Option<Beacon>> {
                decoded.lock().unwrap().push(line.to_string());
                match line.strip_prefix("A:") {
                    Some(address) if allow_aircraft => Ok(Some(aircraft(address).into())),
                    Some(_) => Ok(None),
                    None if line.starts_with('#') => Ok(None),
                    None => Err(OgnClientError::DecodeError(line.to_string())),
                }
            }
        };
        let dialer = PipeDialer {
            dials: dials.clone(),
            servers: tx,
        };

        Fixture {
            client: OgnClient::with_dialer(config, decoder, dialer),
            dials,
            servers,
            decoded,
        }
    }

    async fn accept(&mut self) -> Server {
        let stream = tokio::time::timeout(TIMEOUT, self.servers.recv())
            .await
            .expect("timed out waiting for a connection")
            .unwrap();
        Server::new(stream)
    }

    async fn wait_until<F: Fn() -> bool>(&self, condition: F) {
        tokio::time::timeout(TIMEOUT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

fn aircraft(address: &str) -> AircraftBeacon {
    AircraftBeacon {
        id: format!("FLR{address}"),
        address: address.into(),
        address_type: AddressType::Flarm,
        aircraft_type: AircraftType::Glider,
        timestamp: Utc::now(),
        receiver_name: "LFMX".into(),
        lat: 44.1,
        lon: 5.9,
        alt: 1200.0,
        track: None,
        ground_speed: None,
        climb_rate: None,
        raw: String::new(),
    }
}

fn config() -> ClientConfig {
    ClientConfig::builder()
        .port(10152)
        .port_filtered(14580)
        .reconnection_delay(Duration::from_millis(20))
        .keep_alive_interval(Duration::from_secs(3600))
        .build()
        .unwrap()
}

fn counting_listener(count: Arc<AtomicUsize>) -> Arc<dyn AircraftBeaconListener> {
    Arc::new(move |_: &AircraftBeacon, _: Option<&AircraftDescriptor>| {
        count.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn test_lines_are_decoded_in_arrival_order() {
    let mut fixture = Fixture::new(config());
    fixture.client.connect().unwrap();
    let mut server = fixture.accept().await;

    let expected: Vec<String> = (0..500).map(|i| format!("A:{i:06X}")).collect();
    for line in &expected {
        server.send(line).await;
    }

    let decoded = fixture.decoded.clone();
    fixture
        .wait_until(|| decoded.lock().unwrap().len() >= expected.len())
        .await;
    assert_eq!(*fixture.decoded.lock().unwrap(), expected);
}

#[tokio::test]
async fn test_login_and_heartbeat_on_connect() {
    let mut fixture = Fixture::new(config());
    fixture
        .client
        .connect_with_filter(Some("r/+49.782/+19.450/200"))
        .unwrap();
    let mut server = fixture.accept().await;

    let login = server.next_line().await.unwrap();
    assert!(login.starts_with("user OGN"));
    assert!(login.contains(" pass -1 vers ogn-client "));
    assert!(login.ends_with(" filter r/+49.782/+19.450/200"));
    assert_eq!(server.next_line().await.unwrap(), format!("#{login}"));
    assert_eq!(*fixture.dials.lock().unwrap(), vec![14580]);
}

#[tokio::test]
async fn test_default_filter_selects_port() {
    let mut fixture = Fixture::new(config());
    fixture.client.connect().unwrap();
    let mut server = fixture.accept().await;

    let login = server.next_line().await.unwrap();
    assert!(!login.contains("filter"));
    assert_eq!(*fixture.dials.lock().unwrap(), vec![10152]);
    fixture.client.disconnect();

    let filtered = ClientConfig::builder()
        .filter("r/+51.537/+5.472/250")
        .build()
        .unwrap();
    let mut fixture = Fixture::new(filtered);
    fixture.client.connect().unwrap();
    let mut server = fixture.accept().await;

    let login = server.next_line().await.unwrap();
    assert!(login.ends_with("filter r/+51.537/+5.472/250"));
    assert_eq!(*fixture.dials.lock().unwrap(), vec![14580]);
}

#[tokio::test]
async fn test_second_connect_is_noop() {
    let mut fixture = Fixture::new(config());
    fixture.client.connect().unwrap();
    fixture.client.connect().unwrap();
    let _server = fixture.accept().await;

    let mut state = fixture.client.watch_state();
    tokio::time::timeout(TIMEOUT, state.wait_for(|s| *s == ConnectionState::Streaming))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(fixture.client.is_connected());
    assert_eq!(fixture.dials.lock().unwrap().len(), 1);
    assert!(fixture.servers.try_recv().is_err());
}

#[tokio::test]
async fn test_reconnect_starts_fresh_connection() {
    let config = ClientConfig::builder()
        .reconnection_delay(Duration::from_millis(20))
        .keep_alive_interval(Duration::from_millis(30))
        .build()
        .unwrap();
    let mut fixture = Fixture::new(config);

    fixture.client.connect().unwrap();
    let mut old = fixture.accept().await;
    let old_login = old.next_line().await.unwrap();
    assert_eq!(old.next_line().await.unwrap(), format!("#{old_login}"));

    fixture.client.disconnect();
    assert_eq!(fixture.client.state(), ConnectionState::Terminated);
    assert!(!fixture.client.is_connected());

    fixture.client.connect().unwrap();
    let mut new = fixture.accept().await;
    let new_login = new.next_line().await.unwrap();
    assert_ne!(new_login, old_login);

    // The old connection is closed: whatever it still buffered ends in EOF.
    tokio::time::timeout(TIMEOUT, async {
        while let Some(line) = old.lines.next_line().await.unwrap() {
            assert_eq!(line, format!("#{old_login}"));
        }
    })
    .await
    .expect("old connection was not closed");

    // Only heartbeats of the new login reach the new connection.
    for _ in 0..3 {
        assert_eq!(new.next_line().await.unwrap(), format!("#{new_login}"));
    }
    assert_eq!(fixture.dials.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_server_disconnect_triggers_reconnect() {
    let mut fixture = Fixture::new(config());
    fixture.client.connect().unwrap();

    let first = fixture.accept().await;
    drop(first);

    let mut second = fixture.accept().await;
    assert!(second.next_line().await.unwrap().starts_with("user OGN"));
    assert_eq!(fixture.dials.lock().unwrap().len(), 2);
    assert!(fixture.client.is_connected());
}

#[tokio::test]
async fn test_queued_lines_survive_reconnect() {
    let mut fixture = Fixture::new(config());
    let count = Arc::new(AtomicUsize::new(0));
    fixture.client.subscribe_aircraft(counting_listener(count.clone()));

    fixture.client.connect().unwrap();
    let mut first = fixture.accept().await;
    for i in 0..10 {
        first.send(&format!("A:{i:06X}")).await;
    }
    drop(first);

    let mut second = fixture.accept().await;
    for i in 10..20 {
        second.send(&format!("A:{i:06X}")).await;
    }

    fixture
        .wait_until(|| count.load(Ordering::SeqCst) == 20)
        .await;
}

#[tokio::test]
async fn test_subscription_changes_while_streaming() {
    let mut fixture = Fixture::new(config());
    let count = Arc::new(AtomicUsize::new(0));
    let listener = counting_listener(count.clone());
    fixture.client.subscribe_aircraft(listener.clone());
    fixture.client.subscribe_aircraft(listener.clone());

    fixture.client.connect().unwrap();
    let mut server = fixture.accept().await;
    server.send("A:DD0001").await;
    fixture
        .wait_until(|| count.load(Ordering::SeqCst) == 1)
        .await;

    fixture.client.unsubscribe_aircraft(&listener);
    fixture.client.unsubscribe_aircraft(&listener);
    server.send("A:DD0002").await;

    let decoded = fixture.decoded.clone();
    fixture
        .wait_until(|| decoded.lock().unwrap().len() == 2)
        .await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_listener_does_not_starve_others() {
    let mut fixture = Fixture::new(config());
    let faulty: Arc<dyn AircraftBeaconListener> =
        Arc::new(|_: &AircraftBeacon, _: Option<&AircraftDescriptor>| {
            panic!("listener failure");
        });
    let count = Arc::new(AtomicUsize::new(0));
    fixture.client.subscribe_aircraft(faulty);
    fixture.client.subscribe_aircraft(counting_listener(count.clone()));

    fixture.client.connect().unwrap();
    let mut server = fixture.accept().await;
    server.send("garbage").await;
    for i in 0..25 {
        server.send(&format!("A:{i:06X}")).await;
    }

    fixture
        .wait_until(|| count.load(Ordering::SeqCst) == 25)
        .await;
}

#[tokio::test]
async fn test_ignore_aircraft_beacons_end_to_end() {
    let config = ClientConfig::builder()
        .ignore_aircraft_beacons(true)
        .build()
        .unwrap();
    let mut fixture = Fixture::new(config);
    let count = Arc::new(AtomicUsize::new(0));
    fixture.client.subscribe_aircraft(counting_listener(count.clone()));

    fixture.client.connect().unwrap();
    let mut server = fixture.accept().await;
    server.send("A:ABC123").await;

    let decoded = fixture.decoded.clone();
    fixture
        .wait_until(|| decoded.lock().unwrap().len() == 1)
        .await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_slow_listener_does_not_delay_heartbeats() {
    let config = ClientConfig::builder()
        .keep_alive_interval(Duration::from_millis(50))
        .build()
        .unwrap();
    let mut fixture = Fixture::new(config);
    let stalled = Arc::new(AtomicBool::new(false));
    let count = Arc::new(AtomicUsize::new(0));
    let slow: Arc<dyn AircraftBeaconListener> = Arc::new({
        let (stalled, count) = (stalled.clone(), count.clone());
        move |beacon: &AircraftBeacon, _: Option<&AircraftDescriptor>| {
            if beacon.address == "000000" {
                stalled.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1000));
                stalled.store(false, Ordering::SeqCst);
            }
            count.fetch_add(1, Ordering::SeqCst);
        }
    });
    fixture.client.subscribe_aircraft(slow);

    fixture.client.connect().unwrap();
    let mut server = fixture.accept().await;
    let login = server.next_line().await.unwrap();
    assert_eq!(server.next_line().await.unwrap(), format!("#{login}"));

    let expected: Vec<String> = (0..51).map(|i| format!("A:{i:06X}")).collect();
    server.send(&expected[0]).await;
    fixture.wait_until(|| stalled.load(Ordering::SeqCst)).await;

    // While the listener blocks, lines keep arriving and heartbeats keep
    // their period.
    for line in &expected[1..] {
        server.send(line).await;
    }
    for _ in 0..3 {
        assert_eq!(server.next_line().await.unwrap(), format!("#{login}"));
    }
    assert!(stalled.load(Ordering::SeqCst));

    fixture
        .wait_until(|| count.load(Ordering::SeqCst) == expected.len())
        .await;
    assert_eq!(*fixture.decoded.lock().unwrap(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnect_waits_for_running_listener() {
    let mut fixture = Fixture::new(config());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let listener: Arc<dyn AircraftBeaconListener> = Arc::new({
        let (in_flight, overlapped, delivered) =
            (in_flight.clone(), overlapped.clone(), delivered.clone());
        move |beacon: &AircraftBeacon, _: Option<&AircraftDescriptor>| {
            if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                overlapped.store(true, Ordering::SeqCst);
            }
            if beacon.address == "000001" {
                thread::sleep(Duration::from_millis(300));
            }
            delivered.lock().unwrap().push(beacon.address.clone());
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    });
    fixture.client.subscribe_aircraft(listener);

    fixture.client.connect().unwrap();
    let mut first = fixture.accept().await;
    first.send("A:000001").await;
    fixture
        .wait_until(|| in_flight.load(Ordering::SeqCst) == 1)
        .await;

    fixture.client.disconnect();
    fixture.client.connect().unwrap();
    let mut second = fixture.accept().await;
    second.send("A:000002").await;

    fixture
        .wait_until(|| delivered.lock().unwrap().len() == 2)
        .await;
    assert_eq!(*delivered.lock().unwrap(), vec!["000001", "000002"]);
    assert!(!overlapped.load(Ordering::SeqCst));
    assert_eq!(fixture.dials.lock().unwrap().len(), 2);
}

#[test]
fn test_connect_outside_runtime() {
    let fixture = Fixture::new(config());
    assert!(matches!(
        fixture.client.connect(),
        Err(OgnClientError::NoRuntime)
    ));
    assert!(!fixture.client.is_connected());
    assert_eq!(fixture.client.state(), ConnectionState::Idle);
}
