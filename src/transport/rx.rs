use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::TransmissionMode;
use crate::errors::TransportError;
use crate::frame::{AsciiFrameDecoder, Frame, FrameFlags, RtuFrameDecoder};

use super::context::DeviceContext;
use super::device::Device;
use super::driver::SerialDriver;
use super::events::{
    EV_RX_COMPLETE, EV_RX_TIMEOUT, EV_T1_5_EXCEED, EV_T2_0_EXCEED, EV_T3_5_EXCEED,
};

const ASCII_COLON: u8 = b':';
const ASCII_CR: u8 = b'\r';

/// One-shot receive timeout. Posts `RX_TIMEOUT` when it fires; aborted on
/// drop so a completed receive never leaves a stale timer behind.
pub(crate) struct TimeoutTimer {
    handle: JoinHandle<()>,
}

impl TimeoutTimer {
    pub fn start(ctx: Arc<DeviceContext>, timeout: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            ctx.events.post(EV_RX_TIMEOUT);
        });
        Self { handle }
    }
}

impl Drop for TimeoutTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Tracks which line resources are live so early returns still stop the
/// receiver and the half-character timer, mirroring the original cleanup
/// stage. Errors during drop-time cleanup are ignored.
pub(crate) struct LineGuard<'a> {
    driver: &'a dyn SerialDriver,
    pub receiver: bool,
    pub timer: bool,
}

impl<'a> LineGuard<'a> {
    pub fn new(driver: &'a dyn SerialDriver) -> Self {
        Self {
            driver,
            receiver: false,
            timer: false,
        }
    }
}

impl Drop for LineGuard<'_> {
    fn drop(&mut self) {
        if self.timer {
            let _ = self.driver.half_char_timer_stop();
        }
        if self.receiver {
            let _ = self.driver.rx_stop();
        }
    }
}

/// Line mode of the ASCII receive path: hunting for the framing colon,
/// collecting payload until CR, expecting the trailing line feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AsciiRxState {
    WaitColon,
    WaitCr,
    WaitLf,
}

impl Device {
    /// Receive one frame. `None` timeout means wait forever.
    pub(crate) async fn receive_frame<'b>(
        &self,
        buffer: &'b mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(Frame<'b>, FrameFlags), TransportError> {
        let (mode, line_feed) = self.active_setup()?;

        let _admission = self.ctx.begin_rx().ok_or(TransportError::RxTooMany)?;
        let _io = self.ctx.io_lock.lock().await;

        self.ctx.clear_rx_error_latches();
        self.ctx.events.clear(EV_RX_TIMEOUT);
        let _timer = timeout.map(|t| TimeoutTimer::start(Arc::clone(&self.ctx), t));
        self.ctx.prime_rx();

        let result = match mode {
            TransmissionMode::Rtu => self.receive_rtu(buffer).await,
            TransmissionMode::Ascii => self.receive_ascii(buffer, line_feed).await,
        };

        match &result {
            Ok((frame, flags)) => trace!(
                iface = self.index,
                address = frame.address,
                function_code = frame.function_code,
                data = %hex::encode(frame.data),
                %flags,
                "frame received"
            ),
            Err(err) => debug!(iface = self.index, %err, "receive failed"),
        }

        result
    }

    async fn receive_rtu<'b>(
        &self,
        buffer: &'b mut [u8],
    ) -> Result<(Frame<'b>, FrameFlags), TransportError> {
        let driver = self.driver.as_ref();
        let mut guard = LineGuard::new(driver);
        let mut decoder = RtuFrameDecoder::new(buffer);

        driver.rx_start()?;
        guard.receiver = true;

        // Reception: every byte restarts the half-character timer; the frame
        // is over when 1.5 character times pass without one. The caller's
        // timeout is armed only while the first byte is outstanding.
        let mut first_char = true;
        loop {
            self.ctx.events.clear(
                EV_RX_COMPLETE | EV_T1_5_EXCEED | EV_T2_0_EXCEED | EV_T3_5_EXCEED,
            );
            self.ctx.reset_half_char_counter();
            if !first_char {
                driver.half_char_timer_start()?;
                guard.timer = true;
            }

            let mask = if first_char {
                EV_RX_COMPLETE | EV_RX_TIMEOUT
            } else {
                EV_RX_COMPLETE | EV_T1_5_EXCEED
            };
            let fired = self.ctx.events.wait_any(mask).await;

            if !first_char {
                driver.half_char_timer_stop()?;
                guard.timer = false;
            }

            if fired & EV_RX_COMPLETE != 0 {
                first_char = false;
                decoder.update(self.ctx.take_rx_datum());
            }
            if fired & EV_T1_5_EXCEED != 0 {
                break;
            }
            if fired & EV_RX_TIMEOUT != 0 {
                return Err(TransportError::Timeout);
            }
        }

        decoder.end()?;

        // Control-and-wait: the counter restarts at the 1.5 mark, so the
        // 2.0 threshold here lands 3.5 character times after the last byte.
        // Stray bytes in this window are fed to the ended decoder, which
        // marks them redundant.
        self.ctx
            .events
            .clear(EV_T1_5_EXCEED | EV_T2_0_EXCEED | EV_T3_5_EXCEED);
        self.ctx.reset_half_char_counter();
        driver.half_char_timer_start()?;
        guard.timer = true;

        loop {
            self.ctx.events.clear(EV_RX_COMPLETE);
            let fired = self
                .ctx
                .events
                .wait_any(EV_RX_COMPLETE | EV_T2_0_EXCEED)
                .await;

            if fired & EV_RX_COMPLETE != 0 {
                decoder.update(self.ctx.take_rx_datum());
            }
            if fired & EV_T2_0_EXCEED != 0 {
                break;
            }
        }

        driver.rx_stop()?;
        guard.receiver = false;
        driver.half_char_timer_stop()?;
        guard.timer = false;

        let (frame, mut flags) = decoder.into_frame()?;
        self.ctx.overlay_rx_errors(&mut flags);
        Ok((frame, flags))
    }

    async fn receive_ascii<'b>(
        &self,
        buffer: &'b mut [u8],
        line_feed: u8,
    ) -> Result<(Frame<'b>, FrameFlags), TransportError> {
        let driver = self.driver.as_ref();
        let mut guard = LineGuard::new(driver);
        let mut decoder = AsciiFrameDecoder::new(buffer);

        driver.rx_start()?;
        guard.receiver = true;

        let mut state = AsciiRxState::WaitColon;
        let mut reset_decoder = true;

        loop {
            self.ctx.events.clear(EV_RX_COMPLETE);
            let fired = self
                .ctx
                .events
                .wait_any(EV_RX_COMPLETE | EV_RX_TIMEOUT)
                .await;

            if fired & EV_RX_COMPLETE != 0 {
                let datum = self.ctx.take_rx_datum();
                match state {
                    AsciiRxState::WaitColon => {
                        if datum == ASCII_COLON {
                            reset_decoder = true;
                            state = AsciiRxState::WaitCr;
                        }
                    }
                    AsciiRxState::WaitCr => {
                        if reset_decoder {
                            decoder.reset();
                            reset_decoder = false;
                        }
                        match datum {
                            ASCII_CR => {
                                decoder.end()?;
                                state = AsciiRxState::WaitLf;
                            }
                            // A peer may re-synchronize mid-frame.
                            ASCII_COLON => reset_decoder = true,
                            _ => decoder.update(datum),
                        }
                    }
                    AsciiRxState::WaitLf => {
                        if datum == line_feed {
                            break;
                        } else if datum == ASCII_COLON {
                            reset_decoder = true;
                            state = AsciiRxState::WaitCr;
                        } else {
                            state = AsciiRxState::WaitColon;
                        }
                    }
                }
            }
            if fired & EV_RX_TIMEOUT != 0 {
                return Err(TransportError::Timeout);
            }
        }

        driver.rx_stop()?;
        guard.receiver = false;

        let (frame, mut flags) = decoder.into_frame()?;
        self.ctx.overlay_rx_errors(&mut flags);
        Ok((frame, flags))
    }

    /// Block until the line has been idle for 3.5 character times.
    ///
    /// Only meaningful in RTU mode; in ASCII mode frames are delimited by
    /// characters, so this returns immediately.
    pub(crate) async fn wait_startup(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        let (mode, _) = self.active_setup()?;
        if mode != TransmissionMode::Rtu {
            return Ok(());
        }

        let _admission = self.ctx.begin_rx().ok_or(TransportError::RxTooMany)?;
        let _io = self.ctx.io_lock.lock().await;

        self.ctx.events.clear(EV_RX_TIMEOUT);
        let _timer = timeout.map(|t| TimeoutTimer::start(Arc::clone(&self.ctx), t));
        self.ctx.prime_rx();

        let driver = self.driver.as_ref();
        let mut guard = LineGuard::new(driver);
        driver.rx_start()?;
        guard.receiver = true;

        loop {
            self.ctx.events.clear(
                EV_RX_COMPLETE | EV_T1_5_EXCEED | EV_T2_0_EXCEED | EV_T3_5_EXCEED,
            );
            self.ctx.reset_half_char_counter();
            driver.half_char_timer_start()?;
            guard.timer = true;

            let fired = self
                .ctx
                .events
                .wait_any(EV_T3_5_EXCEED | EV_RX_COMPLETE | EV_RX_TIMEOUT)
                .await;

            driver.half_char_timer_stop()?;
            guard.timer = false;

            if fired & EV_RX_COMPLETE != 0 {
                // Unexpected traffic; discard and restart the idle window.
                let _ = self.ctx.take_rx_datum();
                continue;
            } else if fired & EV_T3_5_EXCEED != 0 {
                break;
            } else if fired & EV_RX_TIMEOUT != 0 {
                return Err(TransportError::Timeout);
            }
        }

        driver.rx_stop()?;
        guard.receiver = false;

        debug!(iface = self.index, "line idle, startup wait complete");
        Ok(())
    }
}
