mod command_table;
mod handler;
pub mod handlers;
mod model;

pub use command_table::{CommandEntry, CommandOptions, CommandTable};
pub use handler::{exception_reply, CommandHandler, Reply};
pub use model::{DataModel, MemoryModel};

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::config::SlaveConfig;
use crate::errors::SlaveError;
use crate::frame::{exception_codes, Frame, FrameFlags, MAX_FUNCTION_CODE};
use crate::logging::generate_request_id;
use crate::transport::{Iface, Transport};

/// Snapshot of the slave's diagnostic counters. All of them saturate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlaveCounters {
    /// Frames seen on the bus that decoded cleanly.
    pub bus_messages: u32,
    /// Frames dropped for checksum/line damage.
    pub bus_comm_errors: u32,
    /// Clean frames addressed to this slave (or broadcast).
    pub slave_messages: u32,
    /// Exception replies produced.
    pub slave_exception_errors: u32,
    /// Requests processed without sending a reply.
    pub slave_no_responses: u32,
}

struct SlaveInner {
    rx_buffer: Vec<u8>,
    tx_buffer: Vec<u8>,
    model: Box<dyn DataModel>,
}

/// Slave-side poll engine: receive one frame, dispatch it through the
/// command table, send the reply (or deliberately stay silent).
pub struct Slave {
    transport: Arc<Transport>,
    iface: Iface,
    address: AtomicU8,
    listen_only: AtomicBool,
    delay_before_reply: StdMutex<Duration>,
    table: CommandTable,
    inner: AsyncMutex<SlaveInner>,
    bus_messages: AtomicU32,
    bus_comm_errors: AtomicU32,
    slave_messages: AtomicU32,
    slave_exception_errors: AtomicU32,
    slave_no_responses: AtomicU32,
    frame_flags: StdMutex<(FrameFlags, FrameFlags)>,
    cmd_last_error: StdMutex<Option<String>>,
}

fn saturating_increment(counter: &AtomicU32) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_add(1));
}

impl Slave {
    pub fn new(
        transport: Arc<Transport>,
        iface: Iface,
        config: &SlaveConfig,
        table: CommandTable,
        model: Box<dyn DataModel>,
    ) -> Self {
        Self {
            transport,
            iface,
            address: AtomicU8::new(config.address),
            listen_only: AtomicBool::new(config.listen_only),
            delay_before_reply: StdMutex::new(config.delay_before_reply),
            table,
            inner: AsyncMutex::new(SlaveInner {
                rx_buffer: vec![0u8; config.buffer_size],
                tx_buffer: vec![0u8; config.buffer_size],
                model,
            }),
            bus_messages: AtomicU32::new(0),
            bus_comm_errors: AtomicU32::new(0),
            slave_messages: AtomicU32::new(0),
            slave_exception_errors: AtomicU32::new(0),
            slave_no_responses: AtomicU32::new(0),
            frame_flags: StdMutex::new((FrameFlags::empty(), FrameFlags::empty())),
            cmd_last_error: StdMutex::new(None),
        }
    }

    pub fn iface(&self) -> Iface {
        self.iface
    }

    /// Unit address; 0 makes this a broadcast-only listener.
    pub fn address(&self) -> u8 {
        self.address.load(Ordering::Acquire)
    }

    pub fn set_address(&self, address: u8) {
        self.address.store(address, Ordering::Release);
    }

    pub fn is_listen_only(&self) -> bool {
        self.listen_only.load(Ordering::Acquire)
    }

    pub fn enter_listen_only(&self) -> Result<(), SlaveError> {
        if self.listen_only.swap(true, Ordering::AcqRel) {
            return Err(SlaveError::ListenOnlyAlreadyEntered);
        }
        debug!(iface = %self.iface, "entered listen-only mode");
        Ok(())
    }

    pub fn exit_listen_only(&self) -> Result<(), SlaveError> {
        if !self.listen_only.swap(false, Ordering::AcqRel) {
            return Err(SlaveError::ListenOnlyAlreadyExited);
        }
        debug!(iface = %self.iface, "exited listen-only mode");
        Ok(())
    }

    pub fn set_delay_before_reply(&self, delay: Duration) {
        *self.delay_before_reply.lock().unwrap() = delay;
    }

    pub fn delay_before_reply(&self) -> Duration {
        *self.delay_before_reply.lock().unwrap()
    }

    pub fn counters(&self) -> SlaveCounters {
        SlaveCounters {
            bus_messages: self.bus_messages.load(Ordering::Relaxed),
            bus_comm_errors: self.bus_comm_errors.load(Ordering::Relaxed),
            slave_messages: self.slave_messages.load(Ordering::Relaxed),
            slave_exception_errors: self.slave_exception_errors.load(Ordering::Relaxed),
            slave_no_responses: self.slave_no_responses.load(Ordering::Relaxed),
        }
    }

    pub fn clear_counters(&self) {
        self.bus_messages.store(0, Ordering::Relaxed);
        self.bus_comm_errors.store(0, Ordering::Relaxed);
        self.slave_messages.store(0, Ordering::Relaxed);
        self.slave_exception_errors.store(0, Ordering::Relaxed);
        self.slave_no_responses.store(0, Ordering::Relaxed);
    }

    /// Flags of the most recently received frame.
    pub fn last_frame_flags(&self) -> FrameFlags {
        self.frame_flags.lock().unwrap().0
    }

    /// Flags of the frame before that.
    pub fn previous_frame_flags(&self) -> FrameFlags {
        self.frame_flags.lock().unwrap().1
    }

    /// Description of the last command handler failure that was answered
    /// with Server Device Failure.
    pub fn last_command_error(&self) -> Option<String> {
        self.cmd_last_error.lock().unwrap().clone()
    }

    /// Run a closure against the data model. Waits for an in-flight poll
    /// to finish first.
    pub async fn with_model<R>(&self, apply: impl FnOnce(&mut dyn DataModel) -> R) -> R {
        let mut inner = self.inner.lock().await;
        apply(inner.model.as_mut())
    }

    /// Receive and handle one request. `None` timeout waits forever.
    ///
    /// Damaged frames, frames for other slaves and nonsense function codes
    /// are counted and dropped without an error. A second concurrent poll
    /// fails with `StillPolling`.
    pub async fn poll(&self, timeout: Option<Duration>) -> Result<(), SlaveError> {
        let mut inner = self.inner.try_lock().map_err(|_| SlaveError::StillPolling)?;
        let SlaveInner {
            rx_buffer,
            tx_buffer,
            model,
        } = &mut *inner;

        let poll_id = generate_request_id();

        // Stage 1: intake.
        let (frame, flags) = self
            .transport
            .receive_frame(self.iface, rx_buffer.as_mut_slice(), timeout)
            .await?;

        {
            let mut history = self.frame_flags.lock().unwrap();
            history.1 = history.0;
            history.0 = flags;
        }

        if flags.is_drop() {
            saturating_increment(&self.bus_comm_errors);
            debug!(poll = %poll_id, %flags, "damaged frame dropped");
            return Ok(());
        }
        saturating_increment(&self.bus_messages);

        let broadcast = frame.is_broadcast();
        if !broadcast && frame.address != self.address() {
            return Ok(());
        }
        if frame.function_code == 0 || frame.function_code > MAX_FUNCTION_CODE {
            return Ok(());
        }
        saturating_increment(&self.slave_messages);

        // Stage 2: dispatch.
        let listen_only = self.is_listen_only();
        let mut suppressed = false;
        let reply = match self.table.lookup(frame.function_code) {
            None => {
                saturating_increment(&self.slave_exception_errors);
                Some(exception_reply(
                    frame.function_code,
                    exception_codes::ILLEGAL_FUNCTION,
                    tx_buffer.as_mut_slice(),
                )?)
            }
            Some(entry) => {
                if broadcast && !entry.options.broadcast_allowed {
                    suppressed = true;
                    None
                } else if listen_only && !entry.options.listen_only_allowed {
                    suppressed = true;
                    None
                } else {
                    match entry.handler.handle(
                        model.as_mut(),
                        frame.function_code,
                        frame.data,
                        tx_buffer.as_mut_slice(),
                    ) {
                        Ok(reply) => {
                            if reply.function_code > 0x80 {
                                saturating_increment(&self.slave_exception_errors);
                            }
                            Some(reply)
                        }
                        Err(err) => {
                            debug!(poll = %poll_id, %err, "command handler failed");
                            *self.cmd_last_error.lock().unwrap() = Some(err.to_string());
                            saturating_increment(&self.slave_exception_errors);
                            Some(exception_reply(
                                frame.function_code,
                                exception_codes::SERVER_DEVICE_FAILURE,
                                tx_buffer.as_mut_slice(),
                            )?)
                        }
                    }
                }
            }
        };

        // Stage 3: reply. Broadcasts and listen-only mode never answer.
        let no_reply = suppressed || broadcast || listen_only || reply.is_none();
        if no_reply {
            saturating_increment(&self.slave_no_responses);
            return Ok(());
        }

        let delay = self.delay_before_reply();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = reply.expect("reply present unless suppressed");
        let out = Frame::new(
            frame.address,
            reply.function_code,
            &tx_buffer[..reply.data_len],
        );
        self.transport.transmit_frame(self.iface, &out).await?;
        debug!(poll = %poll_id, function_code = out.function_code, "reply transmitted");

        Ok(())
    }
}

impl std::fmt::Debug for Slave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slave")
            .field("iface", &self.iface)
            .field("address", &self.address())
            .field("listen_only", &self.is_listen_only())
            .finish_non_exhaustive()
    }
}
