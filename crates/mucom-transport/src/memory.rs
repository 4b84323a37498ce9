use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{timeout_millis, DataReceivedHandler, Transport, DEFAULT_READ_TIMEOUT};

/// One direction of an in-memory link.
#[derive(Default)]
struct Pipe {
    buf: Mutex<VecDeque<u8>>,
    /// Wakes the receiving side's notifier thread. `None` while it is closed.
    signal: Mutex<Option<Sender<()>>>,
}

impl Pipe {
    fn wake(&self) {
        if let Some(signal) = lock(&self.signal).as_ref() {
            let _ = signal.send(());
        }
    }
}

/// One end of an in-process duplex byte link.
///
/// Bytes written on one end become available on the other. Each end fires its
/// data-received handler from a dedicated notifier thread, the way a serial
/// driver raises its receive event, so handlers may freely write back.
///
/// Writes never block, so the write timeout is only recorded and reported.
pub struct MemoryTransport {
    rx: Arc<Pipe>,
    tx: Arc<Pipe>,
    handler: Arc<Mutex<Option<DataReceivedHandler>>>,
    notifier: Mutex<Option<JoinHandle<()>>>,
    read_timeout_ms: AtomicU64,
    write_timeout_ms: AtomicU64,
}

impl MemoryTransport {
    /// Create two connected ends. Both start closed.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());
        (
            Self::from_pipes(Arc::clone(&b_to_a), Arc::clone(&a_to_b)),
            Self::from_pipes(a_to_b, b_to_a),
        )
    }

    fn from_pipes(rx: Arc<Pipe>, tx: Arc<Pipe>) -> Self {
        Self {
            rx,
            tx,
            handler: Arc::new(Mutex::new(None)),
            notifier: Mutex::new(None),
            read_timeout_ms: AtomicU64::new(timeout_millis(DEFAULT_READ_TIMEOUT)),
            write_timeout_ms: AtomicU64::new(0),
        }
    }
}

impl Transport for MemoryTransport {
    fn open(&self) -> Result<()> {
        let mut signal = lock(&self.rx.signal);
        if signal.is_some() {
            return Ok(());
        }

        let (sender, receiver) = mpsc::channel::<()>();
        let handler = Arc::clone(&self.handler);
        let notifier = thread::Builder::new()
            .name("mucom-memory-rx".to_string())
            .spawn(move || {
                while receiver.recv().is_ok() {
                    // Coalesce wakeups queued while the previous handler ran.
                    while receiver.try_recv().is_ok() {}
                    let current = lock(&handler).clone();
                    if let Some(handler) = current {
                        handler();
                    }
                }
            })?;

        if !lock(&self.rx.buf).is_empty() {
            let _ = sender.send(());
        }
        *signal = Some(sender);
        *lock(&self.notifier) = Some(notifier);
        debug!("memory transport opened");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let sender = lock(&self.rx.signal).take();
        if sender.is_none() {
            return Ok(());
        }
        drop(sender);

        let notifier = lock(&self.notifier).take();
        if let Some(notifier) = notifier {
            // A handler may close its own transport; never join the current thread.
            if notifier.thread().id() != thread::current().id() {
                let _ = notifier.join();
            }
        }
        debug!("memory transport closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        lock(&self.rx.signal).is_some()
    }

    fn available(&self) -> usize {
        lock(&self.rx.buf).len()
    }

    fn read_available(&self, dst: &mut BytesMut) -> Result<usize> {
        let mut buf = lock(&self.rx.buf);
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
        lock(&self.tx.buf).extend(data.iter().copied());
        self.tx.wake();
        Ok(())
    }

    fn set_data_received(&self, handler: DataReceivedHandler) {
        *lock(&self.handler) = Some(handler);
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.load(Ordering::Relaxed))
    }

    fn set_read_timeout(&self, timeout: Duration) {
        self.read_timeout_ms
            .store(timeout_millis(timeout), Ordering::Relaxed);
    }

    fn write_timeout(&self) -> Option<Duration> {
        match self.write_timeout_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let ms = timeout.map_or(0, timeout_millis);
        self.write_timeout_ms.store(ms, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("open", &self.is_open())
            .field("available", &self.available())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
