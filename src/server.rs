use crate::{Command, Connection, Db, DbDropGuard, Frame, Shutdown};

use crate::config::{config_local_pool_number, config_max_connection, LOGGER};
use crate::frame;
use crate::metrics::{
    CURRENT_CONNECTION_COUNTER, REQUEST_CMD_COUNTER, REQUEST_CMD_ERROR_COUNTER,
    REQUEST_CMD_FINISH_COUNTER, REQUEST_CMD_HANDLE_TIME, REQUEST_COUNTER,
    TOTAL_CONNECTION_PROCESSED,
};
use crate::utils::resp_err;
use slog::{debug, error, info};
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration, Instant};
use tokio_util::task::LocalPoolHandle;

/// Server listener state. Created in the `run` call. It includes a `run`
/// method which performs the TCP listening and initialization of
/// per-connection state.
#[derive(Debug)]
struct Listener {
    /// Shared keyspace handle.
    ///
    /// This holds a wrapper around the `Db`. The internal `Db` can be
    /// retrieved and passed into the per connection state (`Handler`).
    db_holder: DbDropGuard,

    /// TCP listener supplied by the `run` caller.
    listener: TcpListener,

    limit_connections: Arc<Semaphore>,

    /// Broadcasts a shutdown signal to all active connections.
    ///
    /// The initial `shutdown` trigger is provided by the `run` caller. The
    /// server is responsible for gracefully shutting down active
    /// connections. When a connection task is spawned, it is passed a
    /// broadcast receiver handle. When a graceful shutdown is initiated, a
    /// `()` value is sent via the broadcast::Sender. Each active connection
    /// receives it, reaches a safe terminal state, and completes the task.
    notify_shutdown: broadcast::Sender<()>,

    /// Sessions fire this when they process a `SHUTDOWN` command; the outer
    /// `run` select listens on the paired receiver.
    shutdown_trigger: mpsc::Sender<()>,

    /// Used as part of the graceful shutdown process to wait for client
    /// connections to complete processing.
    ///
    /// Tokio channels are closed once all `Sender` handles go out of scope.
    /// When a channel is closed, the receiver receives `None`. This is
    /// leveraged to detect all connection handlers completing. When a
    /// connection handler is initialized, it is assigned a clone of
    /// `shutdown_complete_tx`. When the listener shuts down, it drops the
    /// sender held by this `shutdown_complete_tx` field. Once all handler
    /// tasks complete, all clones of the `Sender` are also dropped. This
    /// results in `shutdown_complete_rx.recv()` completing with `None`. At
    /// this point, it is safe to exit the server process.
    shutdown_complete_rx: mpsc::Receiver<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
}

/// Per-connection handler. Reads requests from `connection` and applies the
/// commands to `db`.
#[derive(Debug)]
struct Handler {
    /// Shared keyspace handle.
    db: Db,

    /// The TCP connection decorated with the protocol encoder / decoder.
    connection: Connection,

    /// Listen for shutdown notifications.
    shutdown: Shutdown,

    /// Fires the server-wide shutdown when this session sees `SHUTDOWN`.
    shutdown_trigger: mpsc::Sender<()>,

    /// Not used directly. Instead, when `Handler` is dropped...?
    _shutdown_complete: mpsc::Sender<()>,
}

/// Run the canela server.
///
/// Accepts connections from the supplied listener. For each inbound
/// connection, a task is spawned to handle that connection. The server runs
/// until the `shutdown` future completes or a client issues `SHUTDOWN`, at
/// which point the server shuts down gracefully.
///
/// `tokio::signal::ctrl_c()` can be used as the `shutdown` argument. This
/// will listen for a SIGINT signal.
pub async fn run(listener: TcpListener, shutdown: impl Future) {
    // When the provided `shutdown` future completes, we must send a shutdown
    // message to all active connections. We use a broadcast channel for this
    // purpose. The call below ignores the receiver of the broadcast pair, and
    // when a receiver is needed, the subscribe() method on the sender is used
    // to create one.
    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);
    let (shutdown_trigger_tx, mut shutdown_trigger_rx) = mpsc::channel::<()>(1);

    // Initialize the listener state
    let mut server = Listener {
        listener,
        db_holder: DbDropGuard::new(),
        limit_connections: Arc::new(Semaphore::new(config_max_connection())),
        notify_shutdown,
        shutdown_trigger: shutdown_trigger_tx,
        shutdown_complete_tx,
        shutdown_complete_rx,
    };

    // The connection pool lives out here so it outlives the accept loop:
    // sessions still draining after shutdown keep running on it.
    let local_pool = LocalPoolHandle::new(config_local_pool_number());

    tokio::select! {
        res = server.run(&local_pool) => {
            // If an error is received here, accepting connections from the
            // TCP listener failed multiple times and the server is giving up
            // and shutting down.
            //
            // Errors encountered when handling individual connections do not
            // bubble up to this point.
            if let Err(err) = res {
                error!(LOGGER, "failed to accept, cause {}", err.to_string());
            }
        }
        _ = shutdown => {
            // The shutdown signal has been received.
            info!(LOGGER, "shutting down");
        }
        _ = shutdown_trigger_rx.recv() => {
            info!(LOGGER, "shutdown command received, shutting down");
        }
    }

    // Extract the `shutdown_complete` receiver and transmitter
    // explicitly drop `shutdown_transmitter`. This is important, as the
    // `.await` below would otherwise never complete.
    let Listener {
        mut shutdown_complete_rx,
        shutdown_complete_tx,
        notify_shutdown,
        shutdown_trigger,
        ..
    } = server;

    // When `notify_shutdown` is dropped, all tasks which have `subscribe`d
    // will receive the shutdown signal and can exit
    drop(notify_shutdown);
    drop(shutdown_trigger);
    // Drop final `Sender` so the `Receiver` below can complete
    drop(shutdown_complete_tx);

    // Wait for all active connections to finish processing. As the `Sender`
    // handle held by the listener has been dropped above, the only remaining
    // `Sender` instances are held by connection handler tasks. When those
    // drop, the `mpsc` channel will close and `recv()` will return `None`.
    let _ = shutdown_complete_rx.recv().await;
}

impl Listener {
    /// Run the server
    ///
    /// Listen for inbound connections. For each inbound connection, spawn a
    /// task to process that connection.
    ///
    /// # Errors
    ///
    /// Returns `Err` if accepting returns an error. This can happen for a
    /// number reasons that resolve over time. For example, if the underlying
    /// operating system has reached an internal limit for max number of
    /// sockets, accept will fail.
    async fn run(&mut self, local_pool: &LocalPoolHandle) -> crate::Result<()> {
        info!(LOGGER, "accepting inbound connections");

        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .unwrap();

            let socket = self.accept().await?;

            // Create the necessary per-connection handler state.
            let mut handler = Handler {
                db: self.db_holder.db(),
                connection: Connection::new(socket),
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
                shutdown_trigger: self.shutdown_trigger.clone(),
                _shutdown_complete: self.shutdown_complete_tx.clone(),
            };

            local_pool.spawn_pinned(|| async move {
                // Process the connection. If an error is encountered, log it.
                CURRENT_CONNECTION_COUNTER.inc();
                TOTAL_CONNECTION_PROCESSED.inc();
                if let Err(err) = handler.run().await {
                    error!(LOGGER, "connection error {:?}", err);
                }
                CURRENT_CONNECTION_COUNTER.dec();
                drop(permit)
            });
        }
    }

    /// Accept an inbound connection.
    ///
    /// Errors are handled by backing off and retrying. An exponential
    /// backoff strategy is used. After the first failure, the task waits for
    /// 1 second. After the second failure, the task waits for 2 seconds.
    /// Each subsequent failure doubles the wait time. If accepting fails on
    /// the 6th try after waiting for 64 seconds, then this function returns
    /// with an error.
    async fn accept(&mut self) -> crate::Result<TcpStream> {
        let mut backoff = 1;

        // Try to accept a few times
        loop {
            // Perform the accept operation. If a socket is successfully
            // accepted, return it. Otherwise, save the error.
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(err) => {
                    error!(LOGGER, "accept error {:?}", &err);
                    if backoff > 64 {
                        // Accept has failed too many times. Return the error.
                        return Err(err.into());
                    }
                }
            }

            // Pause execution until the back off period elapses.
            time::sleep(Duration::from_secs(backoff)).await;

            // Double the back off
            backoff *= 2;
        }
    }
}

impl Handler {
    /// Process a single connection.
    ///
    /// Request frames are read from the socket and processed. Responses are
    /// written back to the socket. Commands within one connection are
    /// processed strictly in receipt order; replies go out in the same
    /// order.
    ///
    /// When the shutdown signal is received, the connection is processed
    /// until it reaches a safe state, at which point it is terminated.
    async fn run(&mut self) -> crate::Result<()> {
        // As long as the shutdown signal has not been received, try to read a
        // new request frame.
        while !self.shutdown.is_shutdown() {
            // While reading a request frame, also listen for the shutdown
            // signal.
            let maybe_frame = tokio::select! {
                res = self.connection.read_frame() => match res {
                    Ok(maybe_frame) => maybe_frame,
                    Err(err) => {
                        // A malformed frame earns one last error reply before
                        // the session is torn down; transport failures get
                        // nothing further.
                        if err.is::<frame::Error>() {
                            let _ = self
                                .connection
                                .write_frame(&resp_err(&format!("ERR {}", err)))
                                .await;
                        }
                        return Err(err);
                    }
                },
                _ = self.shutdown.recv() => {
                    // If a shutdown signal is received, return from `run`.
                    // This will result in the task terminating.
                    return Ok(());
                }
            };

            // If `None` is returned from `read_frame()` then the peer closed
            // the socket. There is no further work to do and the task can be
            // terminated.
            let frame = match maybe_frame {
                Some(frame) => frame,
                None => return Ok(()),
            };

            // Blank inline lines and zero-length arrays carry no command and
            // elicit no reply.
            if matches!(&frame, Frame::Array(parts) if parts.is_empty()) {
                continue;
            }

            // Convert the frame into a command struct. This returns an error
            // only when the frame is not shaped like a request at all.
            let cmd = match Command::from_frame(frame) {
                Ok(cmd) => cmd,
                Err(err) => {
                    let _ = self
                        .connection
                        .write_frame(&resp_err(&format!("ERR {}", err)))
                        .await;
                    return Err(err);
                }
            };
            let cmd_name = cmd.get_name().to_owned();

            let start_at = Instant::now();
            REQUEST_COUNTER.inc();
            REQUEST_CMD_COUNTER.with_label_values(&[&cmd_name]).inc();

            debug!(LOGGER, "req, {:?}", cmd);

            match cmd {
                Command::Quit(cmd) => {
                    let close = cmd.valid();
                    cmd.apply(&mut self.connection).await?;
                    if close {
                        return Ok(());
                    }
                }
                Command::Shutdown(cmd) => {
                    let stop = cmd.valid();
                    cmd.apply(&mut self.connection).await?;
                    if stop {
                        // Reply is flushed; now take the whole server down.
                        let _ = self.shutdown_trigger.send(()).await;
                        return Ok(());
                    }
                }
                cmd => {
                    if let Err(err) = cmd.apply(&self.db, &mut self.connection).await {
                        REQUEST_CMD_ERROR_COUNTER
                            .with_label_values(&[&cmd_name])
                            .inc();
                        return Err(err);
                    }
                }
            }

            let duration = Instant::now() - start_at;
            REQUEST_CMD_HANDLE_TIME
                .with_label_values(&[&cmd_name])
                .observe(duration_to_sec(duration));
            REQUEST_CMD_FINISH_COUNTER
                .with_label_values(&[&cmd_name])
                .inc();
        }

        Ok(())
    }
}

#[inline]
pub fn duration_to_sec(d: Duration) -> f64 {
    let nanos = f64::from(d.subsec_nanos());
    d.as_secs() as f64 + (nanos / 1_000_000_000.0)
}
