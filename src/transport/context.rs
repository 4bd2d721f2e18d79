use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

use tokio::sync::Mutex as AsyncMutex;

use crate::frame::{Frame, FrameFlags};

use super::driver::SerialDriver;
use super::events::{
    EventFlags, EV_RX_COMPLETE, EV_T1_5_EXCEED, EV_T2_0_EXCEED, EV_T3_5_EXCEED, EV_TX_COMPLETE,
};

/// Base half-character tick thresholds: 1.5, 2.0 and 3.5 character times.
const THRESHOLD_1_5_BASE: u32 = 3;
const THRESHOLD_2_0_BASE: u32 = 4;
const THRESHOLD_3_5_BASE: u32 = 7;

/// Snapshot of the per-line error counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounters {
    pub parity_errors: u32,
    pub overrun_errors: u32,
    pub frame_errors: u32,
}

/// Snapshot of the last transmitted frame's diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastTransmit {
    pub address: u8,
    pub function_code: u8,
    /// First data byte of the last exception response sent, 0 otherwise.
    pub exception_code: u8,
}

/// State written by ISR callbacks and read by the synchronous path. Every
/// access happens under the mutex, which stands in for the original's
/// interrupt-disable window; nothing long-running ever holds it.
#[derive(Debug)]
struct IsrState {
    rx_datum: u8,
    rx_datum_eaten: bool,
    parity_error: bool,
    overrun_error: bool,
    frame_error: bool,
    half_char_counter: u32,
    threshold_1_5: u32,
    threshold_2_0: u32,
    threshold_3_5: u32,
}

impl IsrState {
    fn new() -> Self {
        Self {
            rx_datum: 0,
            rx_datum_eaten: true,
            parity_error: false,
            overrun_error: false,
            frame_error: false,
            half_char_counter: 0,
            threshold_1_5: THRESHOLD_1_5_BASE,
            threshold_2_0: THRESHOLD_2_0_BASE,
            threshold_3_5: THRESHOLD_3_5_BASE,
        }
    }
}

/// Per-device runtime state shared between the synchronous transport path
/// and the driver ISR callbacks.
#[derive(Debug)]
pub(crate) struct DeviceContext {
    /// Serializes send-or-receive: at most one I/O in flight per device.
    pub(crate) io_lock: AsyncMutex<()>,
    pub(crate) events: EventFlags,
    isr: Mutex<IsrState>,
    rx_in_progress: AtomicU8,
    tx_in_progress: AtomicU8,
    parity_error_count: AtomicU32,
    overrun_error_count: AtomicU32,
    frame_error_count: AtomicU32,
    last_tx: Mutex<LastTransmit>,
}

fn saturating_increment(counter: &AtomicU32) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        if v == u32::MAX {
            None
        } else {
            Some(v + 1)
        }
    });
}

impl DeviceContext {
    pub fn new() -> Self {
        Self {
            io_lock: AsyncMutex::new(()),
            events: EventFlags::new(),
            isr: Mutex::new(IsrState::new()),
            rx_in_progress: AtomicU8::new(0),
            tx_in_progress: AtomicU8::new(0),
            parity_error_count: AtomicU32::new(0),
            overrun_error_count: AtomicU32::new(0),
            frame_error_count: AtomicU32::new(0),
            last_tx: Mutex::new(LastTransmit::default()),
        }
    }

    // --- admission control -------------------------------------------------

    pub fn begin_rx(&self) -> Option<InProgressGuard<'_>> {
        InProgressGuard::admit(&self.rx_in_progress)
    }

    pub fn begin_tx(&self) -> Option<InProgressGuard<'_>> {
        InProgressGuard::admit(&self.tx_in_progress)
    }

    /// Whether any RX or TX call is currently admitted.
    pub fn is_busy(&self) -> bool {
        self.rx_in_progress.load(Ordering::Acquire) != 0
            || self.tx_in_progress.load(Ordering::Acquire) != 0
    }

    // --- ISR side ----------------------------------------------------------

    pub fn isr_rx_complete(&self, driver: &dyn SerialDriver) {
        {
            let mut isr = self.isr.lock().unwrap();

            if isr.rx_datum_eaten {
                match driver.rx_read() {
                    Ok(datum) => {
                        isr.rx_datum = datum;
                        isr.rx_datum_eaten = false;
                    }
                    Err(_) => return,
                }
            } else {
                // Soft overrun: the previous byte was never consumed. Read
                // and drop the new one so the driver latch stays clear.
                if driver.rx_read().is_err() {
                    return;
                }
                isr.overrun_error = true;
                saturating_increment(&self.overrun_error_count);
            }

            if driver.has_parity_error() {
                driver.clear_parity_error();
                isr.parity_error = true;
                saturating_increment(&self.parity_error_count);
            }
            if driver.has_overrun_error() {
                driver.clear_overrun_error();
                isr.overrun_error = true;
                saturating_increment(&self.overrun_error_count);
            }
            if driver.has_frame_error() {
                driver.clear_frame_error();
                isr.frame_error = true;
                saturating_increment(&self.frame_error_count);
            }
        }

        self.events.post(EV_RX_COMPLETE);
    }

    pub fn isr_tx_complete(&self) {
        self.events.post(EV_TX_COMPLETE);
    }

    pub fn isr_half_char_tick(&self) {
        let event = {
            let mut isr = self.isr.lock().unwrap();

            // Clamp at the 3.5 threshold so the counter cannot roll over.
            if isr.half_char_counter >= isr.threshold_3_5 {
                isr.half_char_counter = isr.threshold_3_5;
                return;
            }

            isr.half_char_counter += 1;

            if isr.half_char_counter >= isr.threshold_3_5 {
                Some(EV_T3_5_EXCEED)
            } else if isr.half_char_counter >= isr.threshold_2_0 {
                Some(EV_T2_0_EXCEED)
            } else if isr.half_char_counter >= isr.threshold_1_5 {
                Some(EV_T1_5_EXCEED)
            } else {
                None
            }
        };

        if let Some(event) = event {
            self.events.post(event);
        }
    }

    // --- synchronous side --------------------------------------------------

    /// Clear the RX latch before starting a receive.
    pub fn prime_rx(&self) {
        let mut isr = self.isr.lock().unwrap();
        isr.rx_datum = 0;
        isr.rx_datum_eaten = true;
    }

    /// Consume the latched byte.
    pub fn take_rx_datum(&self) -> u8 {
        let mut isr = self.isr.lock().unwrap();
        isr.rx_datum_eaten = true;
        isr.rx_datum
    }

    pub fn clear_rx_error_latches(&self) {
        let mut isr = self.isr.lock().unwrap();
        isr.parity_error = false;
        isr.overrun_error = false;
        isr.frame_error = false;
    }

    /// Fold the latched RX line errors into received-frame flags.
    pub fn overlay_rx_errors(&self, flags: &mut FrameFlags) {
        let isr = self.isr.lock().unwrap();
        if isr.parity_error {
            flags.insert(FrameFlags::DROP | FrameFlags::PARITY_ERROR);
        }
        if isr.overrun_error {
            flags.insert(FrameFlags::DROP | FrameFlags::OVERRUN_ERROR);
        }
        if isr.frame_error {
            flags.insert(FrameFlags::DROP | FrameFlags::FRAME_ERROR);
        }
    }

    pub fn reset_half_char_counter(&self) {
        let mut isr = self.isr.lock().unwrap();
        isr.half_char_counter = 0;
    }

    /// Cache the character-time thresholds for the given prescaler.
    pub fn set_char_time_thresholds(&self, prescaler: u16) {
        let mut isr = self.isr.lock().unwrap();
        isr.threshold_1_5 = THRESHOLD_1_5_BASE * prescaler as u32;
        isr.threshold_2_0 = THRESHOLD_2_0_BASE * prescaler as u32;
        isr.threshold_3_5 = THRESHOLD_3_5_BASE * prescaler as u32;
        isr.half_char_counter = 0;
    }

    // --- diagnostics -------------------------------------------------------

    pub fn line_counters(&self) -> LineCounters {
        LineCounters {
            parity_errors: self.parity_error_count.load(Ordering::Relaxed),
            overrun_errors: self.overrun_error_count.load(Ordering::Relaxed),
            frame_errors: self.frame_error_count.load(Ordering::Relaxed),
        }
    }

    pub fn clear_line_counters(&self) {
        self.parity_error_count.store(0, Ordering::Relaxed);
        self.overrun_error_count.store(0, Ordering::Relaxed);
        self.frame_error_count.store(0, Ordering::Relaxed);
    }

    pub fn record_last_tx(&self, frame: &Frame<'_>) {
        let mut last = self.last_tx.lock().unwrap();
        last.address = frame.address;
        last.function_code = frame.function_code;
        if frame.is_exception() {
            if let Some(code) = frame.exception_code() {
                last.exception_code = code;
            }
        }
    }

    pub fn last_transmit(&self) -> LastTransmit {
        *self.last_tx.lock().unwrap()
    }
}

/// RAII admission token; holds one slot of an in-progress counter.
#[derive(Debug)]
pub(crate) struct InProgressGuard<'a> {
    counter: &'a AtomicU8,
}

impl<'a> InProgressGuard<'a> {
    fn admit(counter: &'a AtomicU8) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                if v == u8::MAX {
                    None
                } else {
                    Some(v + 1)
                }
            })
            .ok()?;
        Some(Self { counter })
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SerialConfig;
    use crate::errors::DriverError;
    use crate::transport::driver::{Direction, IsrHandle};
    use crate::transport::events::EV_RX_TIMEOUT;
    use std::sync::Mutex as StdMutex;

    /// Minimal driver stub: a scripted RX latch plus error bits.
    #[derive(Default)]
    struct StubDriver {
        rx_latch: StdMutex<Option<u8>>,
        parity: StdMutex<bool>,
    }

    impl StubDriver {
        fn latch(&self, datum: u8) {
            *self.rx_latch.lock().unwrap() = Some(datum);
        }
    }

    impl SerialDriver for StubDriver {
        fn open(&self, _setup: &SerialConfig, _isr: IsrHandle) -> Result<(), DriverError> {
            Ok(())
        }
        fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }
        fn set_direction(&self, _direction: Direction) -> Result<(), DriverError> {
            Ok(())
        }
        fn rx_start(&self) -> Result<(), DriverError> {
            Ok(())
        }
        fn rx_stop(&self) -> Result<(), DriverError> {
            Ok(())
        }
        fn rx_read(&self) -> Result<u8, DriverError> {
            self.rx_latch
                .lock()
                .unwrap()
                .take()
                .ok_or(DriverError::RxEmpty)
        }
        fn tx_start(&self) -> Result<(), DriverError> {
            Ok(())
        }
        fn tx_stop(&self) -> Result<(), DriverError> {
            Ok(())
        }
        fn tx_transmit(&self, _datum: u8) -> Result<(), DriverError> {
            Ok(())
        }
        fn half_char_timer_start(&self) -> Result<(), DriverError> {
            Ok(())
        }
        fn half_char_timer_stop(&self) -> Result<(), DriverError> {
            Ok(())
        }
        fn has_parity_error(&self) -> bool {
            *self.parity.lock().unwrap()
        }
        fn clear_parity_error(&self) {
            *self.parity.lock().unwrap() = false;
        }
        fn has_overrun_error(&self) -> bool {
            false
        }
        fn clear_overrun_error(&self) {}
        fn has_frame_error(&self) -> bool {
            false
        }
        fn clear_frame_error(&self) {}
    }

    #[test]
    fn test_rx_latch_and_consume() {
        let ctx = DeviceContext::new();
        let driver = StubDriver::default();

        ctx.prime_rx();
        driver.latch(0x42);
        ctx.isr_rx_complete(&driver);
        assert_eq!(ctx.take_rx_datum(), 0x42);
    }

    #[test]
    fn test_soft_overrun_sets_latch_and_counter() {
        let ctx = DeviceContext::new();
        let driver = StubDriver::default();

        ctx.prime_rx();
        driver.latch(0x01);
        ctx.isr_rx_complete(&driver);
        // Second byte arrives before the first was consumed.
        driver.latch(0x02);
        ctx.isr_rx_complete(&driver);

        assert_eq!(ctx.line_counters().overrun_errors, 1);
        // The first byte survives; the second was dropped.
        assert_eq!(ctx.take_rx_datum(), 0x01);

        let mut flags = FrameFlags::empty();
        ctx.overlay_rx_errors(&mut flags);
        assert!(flags.contains(FrameFlags::DROP | FrameFlags::OVERRUN_ERROR));
    }

    #[test]
    fn test_parity_error_latched_from_driver() {
        let ctx = DeviceContext::new();
        let driver = StubDriver::default();

        ctx.prime_rx();
        driver.latch(0x55);
        *driver.parity.lock().unwrap() = true;
        ctx.isr_rx_complete(&driver);

        assert!(!driver.has_parity_error(), "latch must be cleared");
        assert_eq!(ctx.line_counters().parity_errors, 1);

        let mut flags = FrameFlags::empty();
        ctx.overlay_rx_errors(&mut flags);
        assert!(flags.contains(FrameFlags::DROP | FrameFlags::PARITY_ERROR));

        ctx.clear_rx_error_latches();
        let mut flags = FrameFlags::empty();
        ctx.overlay_rx_errors(&mut flags);
        assert!(flags.is_empty());

        ctx.clear_line_counters();
        assert_eq!(ctx.line_counters(), LineCounters::default());
    }

    #[tokio::test]
    async fn test_half_char_thresholds() {
        let ctx = DeviceContext::new();

        for _ in 0..2 {
            ctx.isr_half_char_tick();
        }
        // Two ticks: below every threshold.
        ctx.events.post(EV_RX_TIMEOUT);
        let fired = ctx
            .events
            .wait_any(EV_T1_5_EXCEED | EV_T2_0_EXCEED | EV_T3_5_EXCEED | EV_RX_TIMEOUT)
            .await;
        assert_eq!(fired, EV_RX_TIMEOUT);
        ctx.events.clear(EV_RX_TIMEOUT);

        ctx.isr_half_char_tick(); // 3 -> 1.5 char times
        assert_eq!(ctx.events.wait_any(EV_T1_5_EXCEED).await, EV_T1_5_EXCEED);

        ctx.isr_half_char_tick(); // 4 -> 2.0 char times
        assert_eq!(ctx.events.wait_any(EV_T2_0_EXCEED).await, EV_T2_0_EXCEED);

        for _ in 0..3 {
            ctx.isr_half_char_tick(); // 7 -> 3.5 char times
        }
        assert_eq!(ctx.events.wait_any(EV_T3_5_EXCEED).await, EV_T3_5_EXCEED);

        // Further ticks clamp without posting anything new.
        ctx.events
            .clear(EV_T1_5_EXCEED | EV_T2_0_EXCEED | EV_T3_5_EXCEED);
        ctx.isr_half_char_tick();
        ctx.events.post(EV_RX_TIMEOUT);
        let fired = ctx
            .events
            .wait_any(EV_T3_5_EXCEED | EV_RX_TIMEOUT)
            .await;
        assert_eq!(fired, EV_RX_TIMEOUT);
    }

    #[test]
    fn test_prescaler_scales_thresholds() {
        let ctx = DeviceContext::new();
        ctx.set_char_time_thresholds(2);

        for _ in 0..6 {
            ctx.isr_half_char_tick();
        }
        let isr = ctx.isr.lock().unwrap();
        assert_eq!(isr.threshold_1_5, 6);
        assert_eq!(isr.threshold_2_0, 8);
        assert_eq!(isr.threshold_3_5, 14);
        assert_eq!(isr.half_char_counter, 6);
    }

    #[test]
    fn test_admission_guard() {
        let ctx = DeviceContext::new();
        assert!(!ctx.is_busy());

        let guard = ctx.begin_rx().unwrap();
        assert!(ctx.is_busy());
        drop(guard);
        assert!(!ctx.is_busy());
    }

    #[test]
    fn test_last_transmit_snapshot() {
        let ctx = DeviceContext::new();

        ctx.record_last_tx(&Frame::new(0x11, 0x03, &[0x02, 0x2B]));
        let last = ctx.last_transmit();
        assert_eq!(last.address, 0x11);
        assert_eq!(last.function_code, 0x03);
        assert_eq!(last.exception_code, 0);

        ctx.record_last_tx(&Frame::new(0x11, 0x83, &[0x02]));
        assert_eq!(ctx.last_transmit().exception_code, 0x02);
    }
}
