use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{timeout_millis, DataReceivedHandler, Transport, DEFAULT_READ_TIMEOUT};

const READ_CHUNK_SIZE: usize = 256;

#[derive(Default)]
struct Shared {
    buf: Mutex<VecDeque<u8>>,
    open: AtomicBool,
    handler: Mutex<Option<DataReceivedHandler>>,
}

/// A connected Unix domain socket used as a serial line.
///
/// `open` starts a reader thread that buffers incoming bytes and fires the
/// data-received handler after each chunk. The peer hanging up closes the
/// transport. A closed stream transport cannot be reopened.
pub struct StreamTransport {
    stream: UnixStream,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    read_timeout_ms: AtomicU64,
}

impl StreamTransport {
    /// Wrap a connected stream. The transport starts closed.
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            shared: Arc::new(Shared::default()),
            reader: Mutex::new(None),
            read_timeout_ms: AtomicU64::new(timeout_millis(DEFAULT_READ_TIMEOUT)),
        }
    }

    /// Create a connected pair of stream transports.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::new(left), Self::new(right)))
    }

    /// Borrow the underlying socket.
    pub fn get_ref(&self) -> &UnixStream {
        &self.stream
    }
}

fn read_loop(mut stream: UnixStream, shared: Arc<Shared>) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let read = match stream.read(&mut chunk) {
            Ok(0) => {
                debug!("peer closed stream");
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                if shared.open.load(Ordering::SeqCst) {
                    debug!(error = %err, "stream read failed");
                }
                break;
            }
        };

        lock(&shared.buf).extend(chunk[..read].iter().copied());
        let handler = lock(&shared.handler).clone();
        if let Some(handler) = handler {
            handler();
        }
    }
    shared.open.store(false, Ordering::SeqCst);
}

impl Transport for StreamTransport {
    fn open(&self) -> Result<()> {
        let mut reader = lock(&self.reader);
        if reader.is_some() {
            return Ok(());
        }

        let stream = self.stream.try_clone()?;
        // Reads block until data or hangup; the read timeout only bounds
        // request/response waits layered above.
        stream.set_read_timeout(None)?;
        self.shared.open.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("mucom-stream-rx".to_string())
            .spawn(move || read_loop(stream, shared));
        match handle {
            Ok(handle) => {
                *reader = Some(handle);
                debug!("stream transport opened");
                Ok(())
            }
            Err(err) => {
                self.shared.open.store(false, Ordering::SeqCst);
                Err(err.into())
            }
        }
    }

    fn close(&self) -> Result<()> {
        self.shared.open.store(false, Ordering::SeqCst);
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotConnected => {}
            Err(err) => return Err(err.into()),
        }

        let reader = lock(&self.reader).take();
        if let Some(reader) = reader {
            if reader.thread().id() != thread::current().id() {
                let _ = reader.join();
            }
            debug!("stream transport closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    fn available(&self) -> usize {
        lock(&self.shared.buf).len()
    }

    fn read_available(&self, dst: &mut BytesMut) -> Result<usize> {
        let mut buf = lock(&self.shared.buf);
        let count = buf.len();
        dst.reserve(count);
        let (front, back) = buf.as_slices();
        dst.extend_from_slice(front);
        dst.extend_from_slice(back);
        buf.clear();
        Ok(count)
    }

    fn write_all(&self, data: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        let mut writer = &self.stream;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    fn set_data_received(&self, handler: DataReceivedHandler) {
        *lock(&self.shared.handler) = Some(handler);
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.load(Ordering::Relaxed))
    }

    fn set_read_timeout(&self, timeout: Duration) {
        self.read_timeout_ms
            .store(timeout_millis(timeout), Ordering::Relaxed);
    }

    fn write_timeout(&self) -> Option<Duration> {
        self.stream.write_timeout().ok().flatten()
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream
            .set_write_timeout(timeout.filter(|t| !t.is_zero()))?;
        Ok(())
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("open", &self.is_open())
            .field("available", &self.available())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Instant;

    use super::*;

    #[test]
    fn pair_delivers_bytes_with_notification() {
        let (left, right) = StreamTransport::pair().unwrap();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        right.set_data_received(Arc::new(move || {
            let _ = tx.lock().unwrap().send(());
        }));
        left.open().unwrap();
        right.open().unwrap();

        left.write_all(&[0xE3, 0x5A, 0x43]).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while right.available() < 3 {
            rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .unwrap();
        }
        let mut dst = BytesMut::new();
        right.read_available(&mut dst).unwrap();
        assert_eq!(dst.as_ref(), &[0xE3, 0x5A, 0x43]);
    }

    #[test]
    fn peer_hangup_closes_transport() {
        let (left, right) = StreamTransport::pair().unwrap();
        right.open().unwrap();
        drop(left);

        let deadline = Instant::now() + Duration::from_secs(2);
        while right.is_open() {
            assert!(Instant::now() < deadline, "transport should observe hangup");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(
            right.write_all(&[0x80]),
            Err(TransportError::NotOpen)
        ));
    }

    #[test]
    fn write_timeout_applies_to_socket() {
        let (left, _right) = StreamTransport::pair().unwrap();
        left.set_write_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(left.write_timeout(), Some(Duration::from_millis(20)));
        left.set_write_timeout(None).unwrap();
        assert_eq!(left.write_timeout(), None);
    }
}
