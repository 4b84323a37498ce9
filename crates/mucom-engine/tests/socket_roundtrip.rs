#![cfg(unix)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use mucom_engine::{Engine, EngineConfig, EngineError, Variable};
use mucom_transport::{StreamTransport, Transport, UnixDomainSocket};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_temp_dir(tag: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "mucom-engine-{tag}-{}-{n}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn socket_pair(tag: &str) -> (PathBuf, StreamTransport, StreamTransport) {
    let dir = unique_temp_dir(tag);
    let path = dir.join("line.sock");
    let listener = UnixDomainSocket::bind(&path).unwrap();
    let client_path = path.clone();
    let client = std::thread::spawn(move || UnixDomainSocket::connect(&client_path).unwrap());
    let server = listener.accept().unwrap();
    (dir, client.join().unwrap(), server)
}

fn config() -> EngineConfig {
    EngineConfig::default().with_read_timeout(Duration::from_millis(500))
}

#[test]
fn host_and_device_over_unix_socket() {
    let (dir, host_side, device_side) = socket_pair("roundtrip");
    let host = Engine::with_config(host_side, config()).unwrap();
    let device = Engine::with_config(device_side, config()).unwrap();

    let temperature = Arc::new(Mutex::new(-12.25f32));
    let counter = Arc::new(Mutex::new(0u64));
    let serial = Bytes::from_static(b"MC-01");
    device
        .link_variable(10, Variable::cell(Arc::clone(&temperature)))
        .unwrap();
    device
        .link_variable(11, Variable::cell(Arc::clone(&counter)))
        .unwrap();
    device
        .link_variable(12, Variable::reader(move || serial.clone()))
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    device.link_method(200, move |payload| {
        tx.lock().unwrap().send(payload.to_vec())?;
        Ok(())
    });

    host.open().unwrap();
    device.open().unwrap();

    assert_eq!(host.read_f32(10).unwrap(), -12.25);
    host.write_u64(11, u64::MAX - 1).unwrap();
    assert_eq!(host.read_u64(11).unwrap(), u64::MAX - 1);
    assert_eq!(*counter.lock().unwrap(), u64::MAX - 1);
    assert_eq!(host.read_bytes(12, 5).unwrap().as_ref(), b"MC-01");

    host.execute(200, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );
    assert!(device.last_frame_at().is_some());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn both_sides_can_serve_and_request() {
    let (dir, left_side, right_side) = socket_pair("duplex");
    let left = Engine::with_config(left_side, config()).unwrap();
    let right = Engine::with_config(right_side, config()).unwrap();

    left.link_variable(1, Variable::reader(|| 0x11u8)).unwrap();
    right.link_variable(1, Variable::reader(|| 0x22u8)).unwrap();
    left.open().unwrap();
    right.open().unwrap();

    let remote = Arc::clone(&right);
    let from_right = std::thread::spawn(move || remote.read_u8(1).unwrap());
    assert_eq!(left.read_u8(1).unwrap(), 0x22);
    assert_eq!(from_right.join().unwrap(), 0x11);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn peer_hangup_turns_reads_into_errors() {
    let (dir, host_side, device_side) = socket_pair("hangup");
    let host = Engine::with_config(
        host_side,
        EngineConfig::default().with_read_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    host.open().unwrap();
    drop(device_side);

    let deadline = Instant::now() + Duration::from_secs(2);
    while host.transport().is_open() {
        assert!(Instant::now() < deadline, "hangup should close the transport");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(matches!(host.read_u8(1), Err(EngineError::Transport(_))));

    let _ = std::fs::remove_dir_all(&dir);
}
