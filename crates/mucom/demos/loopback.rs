//! Host and device engines joined by an in-memory link.
//!
//! Run with:
//!   cargo run -p mucom --example loopback

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use mucom::{Engine, MemoryTransport, Variable};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host_side, device_side) = MemoryTransport::pair();
    let host = Engine::new(host_side)?;
    let device = Engine::new(device_side)?;

    // Device state.
    let setpoint = Arc::new(Mutex::new(21.5f32));
    let uptime = Arc::new(Mutex::new(0u32));
    device.link_variable(1, Variable::cell(Arc::clone(&setpoint)))?;
    let ticks = Arc::clone(&uptime);
    device.link_variable(2, Variable::reader(move || *ticks.lock().unwrap()))?;
    device.link_variable(3, Variable::reader(|| Bytes::from_static(b"LOOP")))?;
    device.link_method(10, |payload| {
        eprintln!("device: reset requested with {payload:02x?}");
        Ok(())
    });

    host.open()?;
    device.open()?;
    host.set_timeout(Duration::from_millis(250));

    eprintln!("host: setpoint = {}", host.read_f32(1)?);
    host.write_f32(1, 23.0)?;
    eprintln!("host: setpoint = {}", host.read_f32(1)?);

    *uptime.lock().unwrap() = 3600;
    eprintln!("host: uptime = {}", host.read_u32(2)?);
    eprintln!(
        "host: name = {}",
        String::from_utf8_lossy(&host.read_bytes(3, 4)?)
    );

    host.execute(10, &[0xA5])?;
    std::thread::sleep(Duration::from_millis(50));

    eprintln!("device: setpoint is now {}", setpoint.lock().unwrap());
    Ok(())
}
