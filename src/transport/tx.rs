use tracing::{debug, trace};

use crate::config::TransmissionMode;
use crate::errors::TransportError;
use crate::frame::{AsciiFrameEncoder, Frame, RtuFrameEncoder};

use super::device::Device;
use super::driver::{Direction, SerialDriver};
use super::events::{EV_T1_5_EXCEED, EV_T2_0_EXCEED, EV_T3_5_EXCEED, EV_TX_COMPLETE};

/// Cleanup companion of the transmit path: stops the transmitter, returns
/// the line to receive direction and stops the half-character timer on any
/// early exit. Cleanup failures are ignored, matching the original's
/// best-effort release stage.
struct TxGuard<'a> {
    driver: &'a dyn SerialDriver,
    transmitter: bool,
    direction: bool,
    timer: bool,
}

impl<'a> TxGuard<'a> {
    fn new(driver: &'a dyn SerialDriver) -> Self {
        Self {
            driver,
            transmitter: false,
            direction: false,
            timer: false,
        }
    }
}

impl Drop for TxGuard<'_> {
    fn drop(&mut self) {
        if self.timer {
            let _ = self.driver.half_char_timer_stop();
        }
        if self.transmitter {
            let _ = self.driver.tx_stop();
        }
        if self.direction {
            let _ = self.driver.set_direction(Direction::Receive);
        }
    }
}

impl Device {
    /// Transmit one frame, byte by byte, then hold the line quiet for the
    /// 3.5-character inter-frame gap (RTU only).
    pub(crate) async fn transmit_frame(&self, frame: &Frame<'_>) -> Result<(), TransportError> {
        let (mode, line_feed) = self.active_setup()?;

        let _admission = self.ctx.begin_tx().ok_or(TransportError::TxTooMany)?;
        let _io = self.ctx.io_lock.lock().await;

        let driver = self.driver.as_ref();
        let mut guard = TxGuard::new(driver);

        driver.set_direction(Direction::Transmit)?;
        guard.direction = true;
        driver.tx_start()?;
        guard.transmitter = true;

        match mode {
            TransmissionMode::Rtu => {
                let mut encoder = RtuFrameEncoder::new(*frame);
                while encoder.has_next() {
                    let datum = encoder.next()?;
                    self.ctx.events.clear(EV_TX_COMPLETE);
                    driver.tx_transmit(datum)?;
                    self.ctx.events.wait_any(EV_TX_COMPLETE).await;
                }
            }
            TransmissionMode::Ascii => {
                let mut encoder = AsciiFrameEncoder::new(*frame, line_feed);
                while encoder.has_next() {
                    let datum = encoder.next()?;
                    self.ctx.events.clear(EV_TX_COMPLETE);
                    driver.tx_transmit(datum)?;
                    self.ctx.events.wait_any(EV_TX_COMPLETE).await;
                }
            }
        }

        driver.tx_stop()?;
        guard.transmitter = false;
        driver.set_direction(Direction::Receive)?;
        guard.direction = false;

        // RTU frames end in silence: the next frame may not start until 3.5
        // character times after the last byte, so the I/O lock is held
        // through the gap.
        if mode == TransmissionMode::Rtu {
            self.ctx
                .events
                .clear(EV_T1_5_EXCEED | EV_T2_0_EXCEED | EV_T3_5_EXCEED);
            self.ctx.reset_half_char_counter();
            driver.half_char_timer_start()?;
            guard.timer = true;

            self.ctx.events.wait_any(EV_T3_5_EXCEED).await;

            driver.half_char_timer_stop()?;
            guard.timer = false;
        }

        self.ctx.record_last_tx(frame);

        trace!(
            iface = self.index,
            address = frame.address,
            function_code = frame.function_code,
            data = %hex::encode(frame.data),
            "frame transmitted"
        );
        if frame.is_exception() {
            debug!(
                iface = self.index,
                address = frame.address,
                exception = frame.exception_code().unwrap_or(0),
                "exception response transmitted"
            );
        }

        Ok(())
    }
}
