use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mucom_engine::{Engine, Variable};
use mucom_frame::{to_hex, Value};
use mucom_transport::UnixDomainSocket;
use tracing::{info, warn};

use crate::cmd::{DeviceArgs, VarSpec};
use crate::exit::{engine_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record, DeviceEvent, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running), listener.path())?;

    // Values persist across host connections.
    let cells: Vec<(u8, Arc<Mutex<Value>>)> = args
        .vars
        .iter()
        .map(|VarSpec { id, value }| (*id, Arc::new(Mutex::new(value.clone()))))
        .collect();

    while running.load(Ordering::SeqCst) {
        let transport = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let engine =
            Engine::new(transport).map_err(|err| engine_error("engine setup failed", err))?;
        for (id, cell) in &cells {
            engine
                .link_variable(*id, cell_variable(*id, Arc::clone(cell), format))
                .map_err(|err| engine_error("variable setup failed", err))?;
        }
        for &id in &args.methods {
            engine.link_method(id, move |payload| {
                print_record(
                    &DeviceEvent {
                        event: "execute",
                        id,
                        value: None,
                        payload: to_hex(payload),
                    },
                    format,
                );
                Ok(())
            });
        }
        engine
            .open()
            .map_err(|err| engine_error("open failed", err))?;
        info!(
            path = ?listener.path(),
            variables = ?engine.registry().variable_ids(),
            methods = ?engine.registry().method_ids(),
            "host connected"
        );

        while running.load(Ordering::SeqCst) && engine.is_open() {
            std::thread::sleep(POLL_INTERVAL);
        }
        let _ = engine.close();
        info!("host disconnected");

        if args.once {
            break;
        }
    }

    Ok(SUCCESS)
}

fn cell_variable(id: u8, cell: Arc<Mutex<Value>>, format: OutputFormat) -> Variable {
    let value_type = lock_value(&cell).value_type();
    let read_cell = Arc::clone(&cell);
    Variable::new(value_type)
        .with_reader(move || lock_value(&read_cell).clone())
        .with_writer(move |value| {
            let payload = to_hex(&value.to_bytes());
            let shown = value.to_string();
            *lock_value(&cell) = value;
            print_record(
                &DeviceEvent {
                    event: "write",
                    id,
                    value: Some(shown),
                    payload,
                },
                format,
            );
        })
}

fn lock_value(cell: &Mutex<Value>) -> MutexGuard<'_, Value> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>, path: &Path) -> CliResult<()> {
    let path = path.to_path_buf();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        // Wake a blocking accept so the loop can observe the flag.
        if let Err(err) = UnixDomainSocket::connect(&path) {
            warn!(error = %err, "failed to wake listener");
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
