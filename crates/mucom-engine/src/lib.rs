//! Protocol engine for mucom.
//!
//! An [`Engine`] sits on a [`Transport`](mucom_transport::Transport) and
//! speaks the mucom frame protocol in both directions: it answers the peer's
//! read, write and execute requests from locally bound variables and methods,
//! and issues requests of its own.
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//!
//! use mucom_engine::{Engine, Variable};
//! use mucom_transport::MemoryTransport;
//!
//! # fn main() -> mucom_engine::Result<()> {
//! let (host_side, device_side) = MemoryTransport::pair();
//! let host = Engine::new(host_side)?;
//! let device = Engine::new(device_side)?;
//!
//! let setpoint = Arc::new(Mutex::new(21.5f32));
//! device.link_variable(10, Variable::cell(setpoint))?;
//! device.link_method(1, |payload| {
//!     println!("reset requested: {payload:?}");
//!     Ok(())
//! });
//!
//! host.open()?;
//! device.open()?;
//! host.write_f32(10, 23.0)?;
//! assert_eq!(host.read_f32(10)?, 23.0);
//! host.execute(1, &[])?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
mod worker;

pub use config::{EngineConfig, DEFAULT_WORKER_QUEUE_DEPTH, DEFAULT_WORKER_THREADS};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use registry::{BindingRegistry, Method, MethodResult, ReadAccessor, Variable, WriteAccessor};
