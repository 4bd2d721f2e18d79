use std::sync::Arc;

use crate::config::SerialConfig;
use crate::errors::DriverError;

use super::context::DeviceContext;

/// Half-duplex line direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Receive,
    Transmit,
}

/// Capability set every serial driver exposes to the transport.
///
/// The contract mirrors an interrupt-driven UART plus a half-character
/// timer: `rx_read` fetches the byte latched by the most recent RX
/// interrupt, `tx_transmit` loads one byte into the transmitter, and the
/// timer ticks at the 0.5-character cadence derived from the serial setup.
/// Drivers report events by invoking the [`IsrHandle`] they received at
/// `open`; those callbacks are cheap and safe from any thread.
pub trait SerialDriver: Send + Sync {
    fn open(&self, setup: &SerialConfig, isr: IsrHandle) -> Result<(), DriverError>;
    fn close(&self) -> Result<(), DriverError>;

    fn set_direction(&self, direction: Direction) -> Result<(), DriverError>;

    fn rx_start(&self) -> Result<(), DriverError>;
    fn rx_stop(&self) -> Result<(), DriverError>;
    /// Read the byte latched by the most recent RX interrupt.
    fn rx_read(&self) -> Result<u8, DriverError>;

    fn tx_start(&self) -> Result<(), DriverError>;
    fn tx_stop(&self) -> Result<(), DriverError>;
    /// Load one byte into the transmitter. The driver signals
    /// [`IsrHandle::tx_complete`] once the byte is on the wire.
    fn tx_transmit(&self, datum: u8) -> Result<(), DriverError>;

    fn half_char_timer_start(&self) -> Result<(), DriverError>;
    fn half_char_timer_stop(&self) -> Result<(), DriverError>;

    fn has_parity_error(&self) -> bool;
    fn clear_parity_error(&self);
    fn has_overrun_error(&self) -> bool;
    fn clear_overrun_error(&self);
    fn has_frame_error(&self) -> bool;
    fn clear_frame_error(&self);
}

/// ISR callback set handed to a driver when its device is opened.
///
/// Each method is the interrupt-side half of the transport: it updates the
/// shared context under its internal lock and posts the matching event
/// flag. No method blocks.
#[derive(Clone)]
pub struct IsrHandle {
    ctx: Arc<DeviceContext>,
}

impl IsrHandle {
    pub(crate) fn new(ctx: Arc<DeviceContext>) -> Self {
        Self { ctx }
    }

    /// One byte finished arriving; the driver's receive latch is ready to
    /// be read through `rx_read`.
    pub fn rx_complete(&self, driver: &dyn SerialDriver) {
        self.ctx.isr_rx_complete(driver);
    }

    /// The byte most recently loaded with `tx_transmit` is on the wire.
    pub fn tx_complete(&self) {
        self.ctx.isr_tx_complete();
    }

    /// The half-character timer ticked.
    pub fn half_char_tick(&self) {
        self.ctx.isr_half_char_tick();
    }
}

impl std::fmt::Debug for IsrHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsrHandle").finish_non_exhaustive()
    }
}
