pub mod cmdlet;

mod mask_write_register;
mod read_coils;
mod read_discrete_inputs;
mod read_holding_registers;
mod read_input_registers;
mod read_write_multiple_registers;
mod write_multiple_coils;
mod write_multiple_registers;
mod write_single_coil;
mod write_single_register;

pub use cmdlet::{
    BitValueSink, BitWrittenSink, Cmdlet, MaskWrittenSink, MultipleWrittenSink,
    RegisterValueSink, RegisterWrittenSink, ResponseSink, SinkError, SinkResult,
};
pub use mask_write_register::{MaskWriteRegister, MaskWriteRegisterRequest};
pub use read_coils::{ReadCoils, ReadCoilsRequest};
pub use read_discrete_inputs::{ReadDiscreteInputs, ReadDiscreteInputsRequest};
pub use read_holding_registers::{ReadHoldingRegisters, ReadHoldingRegistersRequest};
pub use read_input_registers::{ReadInputRegisters, ReadInputRegistersRequest};
pub use read_write_multiple_registers::{
    ReadWriteMultipleRegisters, ReadWriteMultipleRegistersRequest,
};
pub use write_multiple_coils::{WriteMultipleCoils, WriteMultipleCoilsRequest};
pub use write_multiple_registers::{WriteMultipleRegisters, WriteMultipleRegistersRequest};
pub use write_single_coil::{WriteSingleCoil, WriteSingleCoilRequest};
pub use write_single_register::{WriteSingleRegister, WriteSingleRegisterRequest};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::MasterConfig;
use crate::errors::{MasterError, TransportError};
use crate::frame::BROADCAST_ADDRESS;
use crate::logging::generate_request_id;
use crate::transport::{Iface, Transport};

/// Master-side transaction engine: one request/response exchange at a time
/// over one interface.
///
/// The TX and RX sides share one buffer, so at most one transaction can be
/// in flight; a second `post` while one is running fails with `StillBusy`
/// instead of queuing.
pub struct Master {
    transport: Arc<Transport>,
    iface: Iface,
    turnaround_delay: StdMutex<Duration>,
    buffer: AsyncMutex<Vec<u8>>,
    dropped_frames: AtomicU32,
}

impl Master {
    pub fn new(transport: Arc<Transport>, iface: Iface, config: &MasterConfig) -> Self {
        Self {
            transport,
            iface,
            turnaround_delay: StdMutex::new(config.turnaround_delay),
            buffer: AsyncMutex::new(vec![0u8; config.buffer_size]),
            dropped_frames: AtomicU32::new(0),
        }
    }

    pub fn iface(&self) -> Iface {
        self.iface
    }

    pub fn set_turnaround_delay(&self, delay: Duration) {
        *self.turnaround_delay.lock().unwrap() = delay;
    }

    pub fn turnaround_delay(&self) -> Duration {
        *self.turnaround_delay.lock().unwrap()
    }

    /// Number of `DROP`-flagged response frames silently discarded by the
    /// retry loop. A slave that consistently answers with bad checksums
    /// shows up here instead of only as timeouts.
    pub fn dropped_frames(&self) -> u32 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Execute one transaction: build the request through the cmdlet,
    /// transmit it, then await and parse the matching response.
    ///
    /// Broadcast requests (slave 0) return after the turn-around delay
    /// without awaiting a response. Unicast requests retry within the
    /// timeout across frames that are not ours: dropped frames and frames
    /// from other slaves are skipped, any other parse outcome ends the
    /// transaction. `None` waits forever.
    pub async fn post<C: Cmdlet>(
        &self,
        slave: u8,
        cmdlet: &C,
        request: &C::Request,
        sink: &mut C::Sink,
        timeout: Option<Duration>,
    ) -> Result<(), MasterError> {
        let mut buffer = self
            .buffer
            .try_lock()
            .map_err(|_| MasterError::StillBusy)?;

        let txn = generate_request_id();
        let deadline = timeout.map(|t| Instant::now() + t);

        {
            let frame = cmdlet.build_request(slave, request, buffer.as_mut_slice())?;
            debug!(txn = %txn, slave, function_code = frame.function_code, "posting request");
            self.transport.transmit_frame(self.iface, &frame).await?;
        }

        // Broadcasts are executed by every slave and acknowledged by none;
        // the turn-around delay gives them time to act before the next
        // request hits the line.
        if slave == BROADCAST_ADDRESS {
            let delay = self.turnaround_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            debug!(txn = %txn, "broadcast complete");
            return Ok(());
        }

        loop {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TransportError::Timeout.into());
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            let (frame, flags) = match self
                .transport
                .receive_frame(self.iface, buffer.as_mut_slice(), remaining)
                .await
            {
                Ok(received) => received,
                Err(TransportError::Timeout) => {
                    debug!(txn = %txn, "transaction timed out");
                    return Err(TransportError::Timeout.into());
                }
                Err(err) => return Err(err.into()),
            };

            if flags.is_drop() {
                let _ = self
                    .dropped_frames
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_add(1));
                debug!(txn = %txn, %flags, "dropping damaged frame");
                continue;
            }

            match cmdlet.handle_response(slave, request, sink, &frame) {
                // A reply from some other slave on the line is not ours to
                // judge; keep waiting for the right one.
                Err(MasterError::InvalidSlave) => continue,
                outcome => {
                    debug!(txn = %txn, ok = outcome.is_ok(), "transaction finished");
                    return outcome;
                }
            }
        }
    }
}

impl std::fmt::Debug for Master {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Master")
            .field("iface", &self.iface)
            .finish_non_exhaustive()
    }
}
