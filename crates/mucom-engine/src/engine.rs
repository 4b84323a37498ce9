use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use mucom_frame::{
    encode, Frame, FrameKind, FrameReceiver, Scalar, Value, ValueType, MAX_DATA_COUNT,
};
use mucom_transport::Transport;
use tracing::{debug, error, trace, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::registry::{BindingRegistry, MethodResult, Variable};
use crate::worker::{panic_message, WorkerPool};

/// Protocol engine bound to one transport.
///
/// Answers incoming read, write and execute requests from its
/// [`BindingRegistry`] and issues requests of its own. Incoming bytes are
/// processed whenever the transport reports new data; [`Engine::ingest`]
/// feeds bytes directly.
///
/// At most one [`Engine::read`] is in flight at a time. A response that
/// arrives while nobody is waiting is kept until the next read clears it.
pub struct Engine<T: Transport> {
    transport: T,
    registry: BindingRegistry,
    workers: WorkerPool,
    /// Receive state machine; also serializes ingestion.
    receiver: Mutex<FrameReceiver>,
    /// Latest unclaimed read response; also serializes outbound frames.
    pending: Mutex<Option<Frame>>,
    response_ready: Condvar,
    read_lock: Mutex<()>,
    last_frame_at: Mutex<Option<Instant>>,
}

impl<T: Transport + 'static> Engine<T> {
    /// Create an engine with default configuration.
    pub fn new(transport: T) -> Result<Arc<Self>> {
        Self::with_config(transport, EngineConfig::default())
    }

    /// Create an engine, applying `config` to it and its transport.
    ///
    /// The transport is not opened; call [`Engine::open`].
    pub fn with_config(transport: T, config: EngineConfig) -> Result<Arc<Self>> {
        config.validate()?;
        transport.set_read_timeout(config.read_timeout);
        transport.set_write_timeout(config.write_timeout)?;
        let workers = WorkerPool::new(config.worker_threads, config.worker_queue_depth)?;

        let engine = Arc::new(Self {
            transport,
            registry: BindingRegistry::new(),
            workers,
            receiver: Mutex::new(FrameReceiver::new()),
            pending: Mutex::new(None),
            response_ready: Condvar::new(),
            read_lock: Mutex::new(()),
            last_frame_at: Mutex::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&engine);
        engine.transport.set_data_received(Arc::new(move || {
            if let Some(engine) = weak.upgrade() {
                if let Err(err) = engine.process_available() {
                    debug!(error = %err, "failed to drain transport");
                }
            }
        }));
        debug!(?config, "engine created");
        Ok(engine)
    }
}

impl<T: Transport> Engine<T> {
    /// Drain the transport's receive buffer and dispatch every completed
    /// frame. Returns the number of frames dispatched.
    pub fn process_available(&self) -> Result<usize> {
        let mut receiver = lock(&self.receiver);
        let mut bytes = BytesMut::new();
        self.transport.read_available(&mut bytes)?;
        Ok(self.ingest_locked(&mut receiver, &bytes))
    }

    /// Feed received bytes straight into the receive state machine.
    /// Returns the number of frames dispatched.
    pub fn ingest(&self, bytes: &[u8]) -> usize {
        let mut receiver = lock(&self.receiver);
        self.ingest_locked(&mut receiver, bytes)
    }

    fn ingest_locked(&self, receiver: &mut FrameReceiver, bytes: &[u8]) -> usize {
        let mut dispatched = 0;
        for &byte in bytes {
            match receiver.push(byte) {
                None => {}
                Some(Ok(frame)) => {
                    self.dispatch(frame);
                    dispatched += 1;
                }
                Some(Err(err)) => debug!(error = %err, "dropping malformed frame"),
            }
        }
        dispatched
    }

    fn dispatch(&self, frame: Frame) {
        *lock(&self.last_frame_at) = Some(Instant::now());
        trace!(kind = %frame.kind, id = frame.id, len = frame.data_count, "frame received");

        match frame.kind {
            FrameKind::ExecuteRequest => self.handle_execute(frame),
            FrameKind::ReadRequest => self.handle_read_request(&frame),
            FrameKind::WriteRequest => self.handle_write_request(&frame),
            FrameKind::ReadResponse => {
                *lock(&self.pending) = Some(frame);
                self.response_ready.notify_all();
            }
        }
    }

    fn handle_execute(&self, frame: Frame) {
        let Some(method) = self.registry.method(frame.id) else {
            trace!(id = frame.id, "execute request for unbound method");
            return;
        };
        self.workers.submit(frame.id, method, frame.payload);
    }

    fn handle_read_request(&self, frame: &Frame) {
        let id = frame.id;
        let Some(variable) = self.registry.variable(id) else {
            trace!(id, "read request for unbound variable");
            return;
        };
        let Some(reader) = variable.read_accessor() else {
            trace!(id, "read request for write-only variable");
            return;
        };

        let value = match panic::catch_unwind(AssertUnwindSafe(|| reader())) {
            Ok(value) => value,
            Err(cause) => {
                error!(id, panic = panic_message(&*cause), "read accessor panicked");
                return;
            }
        };
        if value.value_type() != variable.value_type() {
            warn!(
                id,
                expected = %variable.value_type(),
                actual = %value.value_type(),
                "read accessor returned a value of the wrong type"
            );
            return;
        }

        let data = match variable.value_type() {
            ValueType::Bytes => {
                let mut block = BytesMut::from(value.to_bytes().as_ref());
                block.resize(frame.data_count as usize, 0);
                block.freeze()
            }
            _ => value.to_bytes(),
        };
        if let Err(err) = self.send(FrameKind::ReadResponse, id, &data) {
            debug!(id, error = %err, "failed to send read response");
        }
    }

    fn handle_write_request(&self, frame: &Frame) {
        let id = frame.id;
        let Some(variable) = self.registry.variable(id) else {
            trace!(id, "write request for unbound variable");
            return;
        };
        let Some(writer) = variable.write_accessor() else {
            trace!(id, "write request for read-only variable");
            return;
        };

        let value = match Value::from_bytes(variable.value_type(), &frame.payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(id, error = %err, "dropping undecodable write request");
                return;
            }
        };
        if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| writer(value))) {
            error!(id, panic = panic_message(&*cause), "write accessor panicked");
        }
    }

    fn send(&self, kind: FrameKind, id: u8, payload: &[u8]) -> Result<()> {
        let wire = encode(kind, id, payload.len(), payload)?;
        let _pending = lock(&self.pending);
        self.transport.write_all(&wire)?;
        Ok(())
    }

    /// Read variable `id` from the peer, expecting `expected_count` bytes.
    ///
    /// Blocks until the response arrives or the transport's read timeout
    /// expires.
    pub fn read(&self, id: u8, expected_count: usize) -> Result<Bytes> {
        let _read = lock(&self.read_lock);
        let request = Frame::read_request(id, expected_count)?.encode()?;
        let timeout = self.transport.read_timeout();

        let mut pending = lock(&self.pending);
        *pending = None;
        self.transport.write_all(&request)?;

        let (mut pending, _) = self
            .response_ready
            .wait_timeout_while(pending, timeout, |response| response.is_none())
            .unwrap_or_else(PoisonError::into_inner);

        let Some(response) = pending.take() else {
            debug!(id, ?timeout, "read timed out");
            return Err(EngineError::Timeout(timeout));
        };
        if response.id != id {
            debug!(id, response_id = response.id, "response carries a different id");
        }
        let actual = response.data_count as usize;
        if actual != expected_count {
            return Err(EngineError::ProtocolMismatch {
                expected: expected_count,
                actual,
            });
        }
        Ok(response.payload)
    }

    /// Write `data` (1 to 8 bytes) to variable `id` on the peer.
    pub fn write(&self, id: u8, data: &[u8]) -> Result<()> {
        self.send(FrameKind::WriteRequest, id, data)
    }

    /// Execute method `id` on the peer. An empty payload is sent as a single
    /// zero byte.
    pub fn execute(&self, id: u8, data: &[u8]) -> Result<()> {
        let data = if data.is_empty() { &[0u8][..] } else { data };
        self.send(FrameKind::ExecuteRequest, id, data)
    }

    /// Read a typed variable. Byte blocks are read as 8 bytes.
    pub fn read_value<V: Scalar>(&self, id: u8) -> Result<V> {
        let width = V::VALUE_TYPE.width().unwrap_or(MAX_DATA_COUNT);
        let payload = self.read(id, width)?;
        let value = Value::from_bytes(V::VALUE_TYPE, &payload)?;
        V::from_value(value).ok_or_else(|| {
            EngineError::Configuration(format!("cannot convert {} value", V::VALUE_TYPE))
        })
    }

    /// Write a typed variable.
    pub fn write_value<V: Scalar>(&self, id: u8, value: V) -> Result<()> {
        self.write(id, &value.into_value().to_bytes())
    }

    /// Read a byte block of `count` bytes.
    pub fn read_bytes(&self, id: u8, count: usize) -> Result<Bytes> {
        self.read(id, count)
    }

    /// Write a byte block.
    pub fn write_bytes(&self, id: u8, data: &[u8]) -> Result<()> {
        self.write(id, data)
    }

    /// Bind a local variable that the peer may read and/or write.
    pub fn link_variable(&self, id: u8, variable: Variable) -> Result<()> {
        self.registry.link_variable(id, variable)
    }

    pub fn unlink_variable(&self, id: u8) {
        self.registry.unlink_variable(id);
    }

    /// Bind a local method that the peer may execute.
    pub fn link_method<F>(&self, id: u8, callback: F)
    where
        F: Fn(&[u8]) -> MethodResult + Send + Sync + 'static,
    {
        self.registry.link_method(id, callback);
    }

    pub fn unlink_method(&self, id: u8) {
        self.registry.unlink_method(id);
    }

    /// The bindings answered by this engine.
    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Open the transport and start from a clean receive state.
    pub fn open(&self) -> Result<()> {
        self.reset();
        self.transport.open()?;
        Ok(())
    }

    /// Close the transport.
    pub fn close(&self) -> Result<()> {
        self.transport.close()?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Drop any partial frame and unclaimed response.
    pub fn reset(&self) {
        lock(&self.receiver).reset();
        lock(&self.pending).take();
    }

    /// When the last complete frame was received, if ever.
    pub fn last_frame_at(&self) -> Option<Instant> {
        *lock(&self.last_frame_at)
    }

    /// The read timeout.
    pub fn timeout(&self) -> Duration {
        self.transport.read_timeout()
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.transport.set_read_timeout(timeout);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

macro_rules! typed_accessors {
    ($($ty:ty => $read:ident, $write:ident);* $(;)?) => {
        impl<T: Transport> Engine<T> {
            $(
                #[doc = concat!("Read a `", stringify!($ty), "` variable.")]
                pub fn $read(&self, id: u8) -> Result<$ty> {
                    self.read_value::<$ty>(id)
                }

                #[doc = concat!("Write a `", stringify!($ty), "` variable.")]
                pub fn $write(&self, id: u8, value: $ty) -> Result<()> {
                    self.write_value(id, value)
                }
            )*
        }
    };
}

typed_accessors! {
    i8 => read_i8, write_i8;
    i16 => read_i16, write_i16;
    i32 => read_i32, write_i32;
    i64 => read_i64, write_i64;
    u8 => read_u8, write_u8;
    u16 => read_u16, write_u16;
    u32 => read_u32, write_u32;
    u64 => read_u64, write_u64;
    f32 => read_f32, write_f32;
    f64 => read_f64, write_f64;
}

impl<T: Transport> Drop for Engine<T> {
    fn drop(&mut self) {
        self.workers.shutdown();
    }
}

impl<T: Transport> std::fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("open", &self.is_open())
            .field("registry", &self.registry)
            .field("last_frame_at", &self.last_frame_at())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
