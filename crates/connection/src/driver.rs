//! The per-connection event loop.

use std::sync::{Arc, Mutex, MutexGuard};

use {
    lilac_common::Handle,
    lilac_engine::{Engine, EngineEvent},
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{Connection, ConnectionEvent, ConnectionOptions, ConnectionParams, Result, Wiring};

/// Work a connection posts to its own queue, handled on a later loop turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Tear down after the engine signed off.
    FinishShutdown,
    /// A capability poll timer fired.
    PollCapabilities { timer: u64, handle: Handle },
}

/// Shared handle to a running connection.
///
/// The driver task and every bus call take the same lock, so everything a
/// connection does is serialized. The lock is never held across an await.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<Mutex<Connection>>,
    bus_name: Arc<str>,
    object_path: Arc<str>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Create a connection and spawn its driver on the current runtime.
    pub fn spawn(
        engine: Arc<dyn Engine>,
        params: ConnectionParams,
        options: ConnectionOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>)> {
        let (wiring, receivers) = Wiring::new();
        let conn = Connection::new(engine, params, options, wiring)?;
        let handle = Self {
            bus_name: conn.bus_name().into(),
            object_path: conn.object_path().into(),
            inner: Arc::new(Mutex::new(conn)),
            cancel: CancellationToken::new(),
        };

        tokio::spawn(run(
            Arc::clone(&handle.inner),
            receivers.engine,
            receivers.commands,
            handle.cancel.clone(),
        ));
        Ok((handle, receivers.events))
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    /// Lock the connection. A poisoned lock is recovered; the connection's
    /// state is still consistent between handler calls.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `Connection.Disconnect`. Stops the driver right away if that was
    /// enough to finish the connection.
    pub fn disconnect(&self) {
        let finished = {
            let mut conn = self.lock();
            conn.shutdown();
            conn.is_finished()
        };
        if finished {
            self.cancel.cancel();
        }
    }

    /// Stop the driver without touching the connection.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

async fn run(
    conn: Arc<Mutex<Connection>>,
    mut engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
    mut commands_rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
) {
    let name = conn
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .unique_name()
        .to_string();
    debug!(connection = %name, "driver started");

    loop {
        let finished = tokio::select! {
            () = cancel.cancelled() => break,
            Some(event) = engine_rx.recv() => {
                let mut conn = conn.lock().unwrap_or_else(|e| e.into_inner());
                conn.handle_engine_event(event);
                conn.is_finished()
            },
            Some(command) = commands_rx.recv() => {
                let mut conn = conn.lock().unwrap_or_else(|e| e.into_inner());
                conn.handle_command(command);
                conn.is_finished()
            },
            else => break,
        };
        if finished {
            break;
        }
    }

    cancel.cancel();
    info!(connection = %name, "driver stopped");
}
