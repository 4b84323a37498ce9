use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;

use crate::error::Result;

/// Read timeout applied when nothing else is configured.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Whole milliseconds of `timeout`. A non-zero timeout never rounds to 0.
pub(crate) fn timeout_millis(timeout: Duration) -> u64 {
    if timeout.is_zero() {
        return 0;
    }
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Callback fired by a transport whenever new bytes become available.
///
/// Implementations call it from their own I/O thread, never from inside
/// [`Transport::write_all`].
pub type DataReceivedHandler = Arc<dyn Fn() + Send + Sync>;

/// A duplex byte channel to exactly one peer.
///
/// This is the capability the protocol engine consumes. A serial port driver,
/// a socket, or an in-memory pipe all fit behind it.
pub trait Transport: Send + Sync {
    /// Start delivering bytes and notifications.
    fn open(&self) -> Result<()>;

    /// Stop delivering bytes and notifications. Closing twice is a no-op.
    fn close(&self) -> Result<()>;

    /// Whether the transport is currently open.
    fn is_open(&self) -> bool;

    /// Number of received bytes waiting to be read.
    fn available(&self) -> usize;

    /// Move every buffered received byte into `dst`, returning the count.
    fn read_available(&self, dst: &mut BytesMut) -> Result<usize>;

    /// Write all bytes to the peer.
    fn write_all(&self, data: &[u8]) -> Result<()>;

    /// Install the handler fired when data arrives, replacing any previous one.
    fn set_data_received(&self, handler: DataReceivedHandler);

    /// Timeout used by blocking reads layered on this transport.
    fn read_timeout(&self) -> Duration;

    /// Set the timeout used by blocking reads layered on this transport.
    fn set_read_timeout(&self, timeout: Duration);

    /// Timeout for a single outbound write, if any.
    fn write_timeout(&self) -> Option<Duration>;

    /// Set the timeout for outbound writes.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn open(&self) -> Result<()> {
        (**self).open()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn available(&self) -> usize {
        (**self).available()
    }

    fn read_available(&self, dst: &mut BytesMut) -> Result<usize> {
        (**self).read_available(dst)
    }

    fn write_all(&self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn set_data_received(&self, handler: DataReceivedHandler) {
        (**self).set_data_received(handler)
    }

    fn read_timeout(&self) -> Duration {
        (**self).read_timeout()
    }

    fn set_read_timeout(&self, timeout: Duration) {
        (**self).set_read_timeout(timeout)
    }

    fn write_timeout(&self) -> Option<Duration> {
        (**self).write_timeout()
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_write_timeout(timeout)
    }
}
