//! Serial Duplex Driver
//!
//! Owns the serial connection and runs three tasks for its lifetime:
//! - write loop: drains the outbound queue onto the line
//! - read loop: frames device output into lines
//! - status updater: stores each line in the shared status record
//!
//! All three stop when the [`DriverHandle`] is shut down.

use crate::error::BridgeError;
use crate::metric;
use crate::queue::CommandReceiver;
use crate::status::SharedStatus;
use rig_protocol::{Command, Framed, LineFramer, DEFAULT_MAX_BUFFER, DEVICE_DELIMITER};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, trace, warn};

/// Default size of a single serial read
pub const DEFAULT_READ_BUFFER: usize = 1024;

/// Framed lines waiting for the status updater
const LINE_CHANNEL_CAPACITY: usize = 64;

/// Serial link configuration
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port device path (e.g., "/dev/ttyACM0" or "COM3")
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Bytes requested per read call
    pub read_buffer_size: usize,
    /// Limit on unframed bytes before the read loop gives up
    pub max_frame_bytes: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            read_buffer_size: DEFAULT_READ_BUFFER,
            max_frame_bytes: DEFAULT_MAX_BUFFER,
        }
    }
}

/// State of the device link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Port open, loops running
    Connected { device: String },
    /// Port could not be opened; HTTP keeps serving the last known record
    Degraded { device: String, reason: String },
    /// Port was open but a duplex loop has stopped
    Lost { device: String, reason: String },
}

impl LinkState {
    /// Check whether the device link is up
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected { .. })
    }

    /// Configured device path
    pub fn device(&self) -> &str {
        match self {
            LinkState::Connected { device }
            | LinkState::Degraded { device, .. }
            | LinkState::Lost { device, .. } => device,
        }
    }
}

/// Live view of the device link, updated as the duplex loops stop
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    inner: Arc<LinkFlags>,
}

#[derive(Debug)]
struct LinkFlags {
    device: String,
    open_error: Option<String>,
    reader_running: AtomicBool,
    writer_running: AtomicBool,
}

impl LinkMonitor {
    /// Link whose port is open and whose loops are running
    pub fn connected(device: impl Into<String>) -> Self {
        Self::with_flags(device.into(), None, true)
    }

    /// Link whose port could not be opened
    pub fn degraded(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_flags(device.into(), Some(reason.into()), false)
    }

    fn with_flags(device: String, open_error: Option<String>, running: bool) -> Self {
        Self {
            inner: Arc::new(LinkFlags {
                device,
                open_error,
                reader_running: AtomicBool::new(running),
                writer_running: AtomicBool::new(running),
            }),
        }
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        let device = self.inner.device.clone();
        if let Some(reason) = &self.inner.open_error {
            return LinkState::Degraded {
                device,
                reason: reason.clone(),
            };
        }

        let reader = self.inner.reader_running.load(Ordering::Acquire);
        let writer = self.inner.writer_running.load(Ordering::Acquire);
        let reason = match (reader, writer) {
            (true, true) => return LinkState::Connected { device },
            (false, true) => "read loop stopped",
            (true, false) => "write loop stopped",
            (false, false) => "read and write loops stopped",
        };
        LinkState::Lost {
            device,
            reason: reason.to_string(),
        }
    }

    fn reader_stopped(&self) {
        self.inner.reader_running.store(false, Ordering::Release);
    }

    fn writer_stopped(&self) {
        self.inner.writer_running.store(false, Ordering::Release);
    }
}

/// Starts the duplex loops on a serial connection
pub struct SerialDriver {
    config: SerialConfig,
}

impl SerialDriver {
    /// Create a driver for the given link
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    /// Open the configured serial port
    pub fn open(&self) -> Result<SerialStream, BridgeError> {
        info!(
            "Opening serial port {} at {} baud",
            self.config.device, self.config.baud_rate
        );
        tokio_serial::new(&self.config.device, self.config.baud_rate)
            .open_native_async()
            .map_err(|source| BridgeError::Open {
                device: self.config.device.clone(),
                source,
            })
    }

    /// Open the port and start the loops, or fall back to HTTP-only mode
    ///
    /// In degraded mode the command receiver is dropped, so queued commands
    /// fail fast instead of piling up with nothing draining them.
    pub fn open_or_degrade(
        &self,
        commands: CommandReceiver,
        status: SharedStatus,
    ) -> (LinkMonitor, Option<DriverHandle>) {
        match self.open() {
            Ok(stream) => {
                let handle = self.spawn(stream, commands, status);
                (handle.monitor(), Some(handle))
            }
            Err(e) => {
                warn!("WARNING. Could not open serial port ({})", e);
                warn!("Serving HTTP without a device link; check the serial port setting");
                drop(commands);
                let monitor = LinkMonitor::degraded(self.config.device.clone(), e.to_string());
                (monitor, None)
            }
        }
    }

    /// Start the write, read and status loops on any duplex byte stream
    pub fn spawn<S>(
        &self,
        stream: S,
        commands: CommandReceiver,
        status: SharedStatus,
    ) -> DriverHandle
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let framer = LineFramer::with_max_buffer(DEVICE_DELIMITER, self.config.max_frame_bytes);
        let monitor = LinkMonitor::connected(self.config.device.clone());

        let writer = {
            let monitor = monitor.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                write_loop(write_half, commands, shutdown).await;
                monitor.writer_stopped();
            })
        };
        let reader = {
            let monitor = monitor.clone();
            let shutdown = shutdown_rx.clone();
            let read_buffer_size = self.config.read_buffer_size;
            tokio::spawn(async move {
                read_loop(read_half, framer, read_buffer_size, line_tx, shutdown).await;
                monitor.reader_stopped();
            })
        };
        let updater = tokio::spawn(status_loop(line_rx, status, shutdown_rx));

        info!("Serial duplex loops started on {}", self.config.device);
        DriverHandle {
            shutdown: shutdown_tx,
            monitor,
            writer,
            reader,
            updater,
        }
    }
}

/// Running driver tasks
///
/// Dropping the handle also stops the loops, since it closes the shutdown
/// channel they watch.
pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    monitor: LinkMonitor,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    updater: JoinHandle<()>,
}

impl DriverHandle {
    /// Live link state shared with the HTTP layer
    pub fn monitor(&self) -> LinkMonitor {
        self.monitor.clone()
    }

    /// Check whether the read loop has stopped
    pub fn reader_finished(&self) -> bool {
        self.reader.is_finished()
    }

    /// Check whether the write loop has stopped
    pub fn writer_finished(&self) -> bool {
        self.writer.is_finished()
    }

    /// Signal every loop to stop and wait for them
    pub async fn shutdown(self) {
        info!("Stopping serial duplex loops");
        let _ = self.shutdown.send(true);

        for (name, task) in [
            ("write", self.writer),
            ("read", self.reader),
            ("status", self.updater),
        ] {
            if let Err(e) = task.await {
                error!("Serial {} loop panicked: {}", name, e);
            }
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut commands: CommandReceiver,
    mut shutdown: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let command = tokio::select! {
            _ = shutdown.changed() => break,
            next = commands.next() => match next {
                Some(command) => command,
                None => {
                    info!("Command queue closed, stopping write loop");
                    break;
                }
            },
        };

        match write_command(&mut writer, &command).await {
            Ok(()) => {
                debug!("Sent {:?}", command.as_str());
                metrics::counter!(metric::COMMANDS_WRITTEN).increment(1);
            }
            Err(e) if is_connection_lost(&e) => {
                metrics::counter!(metric::WRITE_ERRORS).increment(1);
                error!("Serial link lost while writing {:?}: {}", command.as_str(), e);
                break;
            }
            Err(e) => {
                metrics::counter!(metric::WRITE_ERRORS).increment(1);
                error!("Dropping command {:?}: {}", command.as_str(), e);
            }
        }
    }
    debug!("Write loop stopped");
}

async fn write_command<W>(writer: &mut W, command: &Command) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(command.as_bytes()).await?;
    writer.flush().await
}

fn is_connection_lost(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
            | ErrorKind::WriteZero
    )
}

async fn read_loop<R>(
    mut reader: R,
    mut framer: LineFramer,
    read_buffer_size: usize,
    lines: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; read_buffer_size.max(1)];

    loop {
        let n = tokio::select! {
            _ = shutdown.changed() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    error!("Serial port closed, stopping read loop");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    error!("Serial read failed, stopping read loop: {}", e);
                    break;
                }
            },
        };

        let Framed {
            lines: framed,
            overflow,
        } = framer.push(&buf[..n]);
        trace!("rcvBuf={:?}", String::from_utf8_lossy(framer.pending()));

        for line in framed {
            debug!("line={:?}", line);
            metrics::counter!(metric::LINES_RECEIVED).increment(1);
            if lines.send(line).await.is_err() {
                debug!("Status updater gone, stopping read loop");
                return;
            }
        }

        if let Some(e) = overflow {
            error!("Framing error, stopping read loop: {}", e);
            break;
        }
    }
    debug!("Read loop stopped");
}

async fn status_loop(
    mut lines: mpsc::Receiver<String>,
    status: SharedStatus,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.recv() => match line {
                Some(line) => status.set_message(line).await,
                None => break,
            },
        }
    }
    debug!("Status updater stopped");
}
