use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::SerialConfig;
use crate::errors::DriverError;
use crate::transport::{Direction, IsrHandle, SerialDriver};

/// In-process serial driver: two linked endpoints exchanging bytes over a
/// virtual line with a configurable character time.
///
/// Each transmitted byte lands at the peer one character time after it was
/// loaded, and the sender's TX-complete fires at the same moment, exactly
/// like a UART shift register. The half-character timer is a spawned ticker
/// at half the character time. This makes the full RTU timing discipline
/// (1.5/2.0/3.5 character thresholds) observable without hardware, which is
/// what the end-to-end tests run on.
pub struct LoopbackDriver {
    inner: Mutex<Inner>,
    char_time: Duration,
    /// Invalidates ticks from a cancelled timer task: a stale tick must not
    /// advance the half-character counter after a restart.
    timer_generation: Arc<AtomicU64>,
}

struct Inner {
    peer: Weak<LoopbackDriver>,
    isr: Option<IsrHandle>,
    runtime: Option<Handle>,
    opened: bool,
    rx_started: bool,
    tx_started: bool,
    direction: Direction,
    rx_register: Option<u8>,
    ticker: Option<JoinHandle<()>>,
    parity_error: bool,
    overrun_error: bool,
    frame_error: bool,
}

impl LoopbackDriver {
    /// Create a linked pair of endpoints.
    pub fn pair(char_time: Duration) -> (Arc<Self>, Arc<Self>) {
        let a = Arc::new(Self::unlinked(char_time));
        let b = Arc::new(Self::unlinked(char_time));
        a.inner.lock().unwrap().peer = Arc::downgrade(&b);
        b.inner.lock().unwrap().peer = Arc::downgrade(&a);
        (a, b)
    }

    fn unlinked(char_time: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                peer: Weak::new(),
                isr: None,
                runtime: None,
                opened: false,
                rx_started: false,
                tx_started: false,
                direction: Direction::Receive,
                rx_register: None,
                ticker: None,
                parity_error: false,
                overrun_error: false,
                frame_error: false,
            }),
            char_time,
            timer_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn char_time(&self) -> Duration {
        self.char_time
    }

    /// Latch a byte into this endpoint's own receiver, as if it had arrived
    /// over the line. Test hook for injecting raw (possibly corrupt) bytes.
    pub fn inject(&self, datum: u8) {
        let isr = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.rx_started {
                return;
            }
            if inner.rx_register.is_some() {
                inner.overrun_error = true;
            }
            inner.rx_register = Some(datum);
            inner.isr.clone()
        };
        if let Some(isr) = isr {
            isr.rx_complete(self);
        }
    }

    /// Inject a whole wire image with one character time between bytes.
    pub async fn inject_frame(&self, bytes: &[u8]) {
        for &datum in bytes {
            tokio::time::sleep(self.char_time).await;
            self.inject(datum);
        }
    }

    /// Test hooks for the UART status-register error bits.
    pub fn inject_parity_error(&self) {
        self.inner.lock().unwrap().parity_error = true;
    }

    pub fn inject_frame_error(&self) {
        self.inner.lock().unwrap().frame_error = true;
    }

    fn deliver(&self, datum: u8) {
        let isr = {
            let mut inner = self.inner.lock().unwrap();
            // Half-duplex: an endpoint driving the line or with its
            // receiver stopped never sees the byte.
            if !inner.opened || !inner.rx_started || inner.direction == Direction::Transmit {
                return;
            }
            if inner.rx_register.is_some() {
                inner.overrun_error = true;
            }
            inner.rx_register = Some(datum);
            inner.isr.clone()
        };
        if let Some(isr) = isr {
            isr.rx_complete(self);
        }
    }
}

impl SerialDriver for LoopbackDriver {
    fn open(&self, _setup: &SerialConfig, isr: IsrHandle) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        inner.isr = Some(isr);
        inner.runtime = Some(Handle::current());
        inner.opened = true;
        Ok(())
    }

    fn close(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        inner.opened = false;
        inner.rx_started = false;
        inner.tx_started = false;
        inner.rx_register = None;
        Ok(())
    }

    fn set_direction(&self, direction: Direction) -> Result<(), DriverError> {
        self.inner.lock().unwrap().direction = direction;
        Ok(())
    }

    fn rx_start(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.opened {
            return Err(DriverError::NotOpen);
        }
        inner.rx_started = true;
        Ok(())
    }

    fn rx_stop(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        inner.rx_started = false;
        inner.rx_register = None;
        Ok(())
    }

    fn rx_read(&self) -> Result<u8, DriverError> {
        self.inner
            .lock()
            .unwrap()
            .rx_register
            .take()
            .ok_or(DriverError::RxEmpty)
    }

    fn tx_start(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.opened {
            return Err(DriverError::NotOpen);
        }
        inner.tx_started = true;
        Ok(())
    }

    fn tx_stop(&self) -> Result<(), DriverError> {
        self.inner.lock().unwrap().tx_started = false;
        Ok(())
    }

    fn tx_transmit(&self, datum: u8) -> Result<(), DriverError> {
        let (peer, isr, runtime) = {
            let inner = self.inner.lock().unwrap();
            if !inner.opened || !inner.tx_started {
                return Err(DriverError::NotOpen);
            }
            let peer = inner.peer.upgrade().ok_or(DriverError::Disconnected)?;
            let isr = inner.isr.clone().ok_or(DriverError::NotOpen)?;
            let runtime = inner.runtime.clone().ok_or(DriverError::NotOpen)?;
            (peer, isr, runtime)
        };

        // The byte spends one character time in the shift register; it
        // arrives at the peer and completes transmission at the same
        // instant.
        let char_time = self.char_time;
        runtime.spawn(async move {
            tokio::time::sleep(char_time).await;
            peer.deliver(datum);
            isr.tx_complete();
        });
        Ok(())
    }

    fn half_char_timer_start(&self) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.opened {
            return Err(DriverError::NotOpen);
        }
        if let Some(old) = inner.ticker.take() {
            old.abort();
        }
        let generation = self.timer_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let generation_word = Arc::clone(&self.timer_generation);

        let isr = inner.isr.clone().ok_or(DriverError::NotOpen)?;
        let runtime = inner.runtime.clone().ok_or(DriverError::NotOpen)?;
        let interval = self.char_time / 2;

        inner.ticker = Some(runtime.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if generation_word.load(Ordering::Acquire) != generation {
                    break;
                }
                isr.half_char_tick();
            }
        }));
        Ok(())
    }

    fn half_char_timer_stop(&self) -> Result<(), DriverError> {
        self.timer_generation.fetch_add(1, Ordering::AcqRel);
        let mut inner = self.inner.lock().unwrap();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        Ok(())
    }

    fn has_parity_error(&self) -> bool {
        self.inner.lock().unwrap().parity_error
    }

    fn clear_parity_error(&self) {
        self.inner.lock().unwrap().parity_error = false;
    }

    fn has_overrun_error(&self) -> bool {
        self.inner.lock().unwrap().overrun_error
    }

    fn clear_overrun_error(&self) {
        self.inner.lock().unwrap().overrun_error = false;
    }

    fn has_frame_error(&self) -> bool {
        self.inner.lock().unwrap().frame_error
    }

    fn clear_frame_error(&self) {
        self.inner.lock().unwrap().frame_error = false;
    }
}

impl std::fmt::Debug for LoopbackDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackDriver")
            .field("char_time", &self.char_time)
            .finish_non_exhaustive()
    }
}
