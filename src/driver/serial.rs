use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, warn};

use crate::config::SerialConfig;
use crate::errors::DriverError;
use crate::transport::{Direction, IsrHandle, SerialDriver};

/// Poll interval of the blocking reader thread.
const READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Host-side driver backed by the `serialport` crate.
///
/// A blocking reader thread stands in for the RX interrupt: each byte it
/// pulls off the port is latched and reported through the ISR handle. The
/// half-character timer is a dedicated thread ticking at the interval
/// derived from the serial setup. Host scheduling makes the character-time
/// thresholds best-effort rather than cycle-exact, which is adequate on the
/// master side and for moderate baud rates.
///
/// `serialport` exposes no UART status registers, so the parity/overrun/
/// frame error capabilities always report no error; soft-overrun detection
/// in the transport still applies.
pub struct SerialPortDriver {
    inner: Mutex<Inner>,
    self_ref: Mutex<Weak<SerialPortDriver>>,
    rx_enabled: Arc<AtomicBool>,
    ticker_enabled: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    rx_register: Arc<Mutex<Option<u8>>>,
}

struct Inner {
    port: Option<Box<dyn SerialPort>>,
    isr: Option<IsrHandle>,
    reader: Option<thread::JoinHandle<()>>,
    ticker: Option<thread::JoinHandle<()>>,
}

impl SerialPortDriver {
    pub fn new() -> Arc<Self> {
        let driver = Arc::new(Self {
            inner: Mutex::new(Inner {
                port: None,
                isr: None,
                reader: None,
                ticker: None,
            }),
            self_ref: Mutex::new(Weak::new()),
            rx_enabled: Arc::new(AtomicBool::new(false)),
            ticker_enabled: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            rx_register: Arc::new(Mutex::new(None)),
        });
        *driver.self_ref.lock().unwrap() = Arc::downgrade(&driver);
        driver
    }
}

impl SerialDriver for SerialPortDriver {
    fn open(&self, setup: &SerialConfig, isr: IsrHandle) -> Result<(), DriverError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.port.is_some() {
            return Ok(());
        }

        let port = serialport::new(&setup.device, setup.baud_rate)
            .data_bits(setup.data_bits.into())
            .parity(setup.parity.into())
            .stop_bits(setup.stop_bits.into())
            .timeout(READ_TIMEOUT)
            .open()?;

        let reader_port = port.try_clone()?;
        self.stop.store(false, Ordering::Release);

        // Reader thread: the RX interrupt stand-in.
        let reader = {
            let mut port = reader_port;
            let rx_enabled = Arc::clone(&self.rx_enabled);
            let stop = Arc::clone(&self.stop);
            let this = self.self_ref.lock().unwrap().clone();
            let isr = isr.clone();
            thread::spawn(move || {
                let mut byte = [0u8; 1];
                while !stop.load(Ordering::Acquire) {
                    match port.read(&mut byte) {
                        Ok(1) => {
                            if !rx_enabled.load(Ordering::Acquire) {
                                continue;
                            }
                            let Some(this) = this.upgrade() else { break };
                            *this.rx_register.lock().unwrap() = Some(byte[0]);
                            isr.rx_complete(this.as_ref());
                        }
                        Ok(_) => {}
                        Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                        Err(e) => {
                            warn!(%e, "serial reader stopped");
                            break;
                        }
                    }
                }
            })
        };

        // Ticker thread: the half-character timer stand-in.
        let ticker = {
            let interval = setup.half_char_interval();
            let enabled = Arc::clone(&self.ticker_enabled);
            let stop = Arc::clone(&self.stop);
            let isr = isr.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    if enabled.load(Ordering::Acquire) {
                        isr.half_char_tick();
                    }
                }
            })
        };

        debug!(setup = %setup.serial_port_info(), "serial port opened");

        inner.port = Some(port);
        inner.isr = Some(isr);
        inner.reader = Some(reader);
        inner.ticker = Some(ticker);
        Ok(())
    }

    fn close(&self) -> Result<(), DriverError> {
        self.stop.store(true, Ordering::Release);
        self.rx_enabled.store(false, Ordering::Release);
        self.ticker_enabled.store(false, Ordering::Release);

        let mut inner = self.inner.lock().unwrap();
        inner.port = None;
        inner.isr = None;
        if let Some(reader) = inner.reader.take() {
            let _ = reader.join();
        }
        if let Some(ticker) = inner.ticker.take() {
            let _ = ticker.join();
        }
        self.rx_register.lock().unwrap().take();
        Ok(())
    }

    fn set_direction(&self, _direction: Direction) -> Result<(), DriverError> {
        // Direction is handled by the RS-485 transceiver (or is moot on
        // RS-232/USB adapters); nothing to switch at this level.
        Ok(())
    }

    fn rx_start(&self) -> Result<(), DriverError> {
        if self.inner.lock().unwrap().port.is_none() {
            return Err(DriverError::NotOpen);
        }
        self.rx_register.lock().unwrap().take();
        self.rx_enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn rx_stop(&self) -> Result<(), DriverError> {
        self.rx_enabled.store(false, Ordering::Release);
        Ok(())
    }

    fn rx_read(&self) -> Result<u8, DriverError> {
        self.rx_register
            .lock()
            .unwrap()
            .take()
            .ok_or(DriverError::RxEmpty)
    }

    fn tx_start(&self) -> Result<(), DriverError> {
        if self.inner.lock().unwrap().port.is_none() {
            return Err(DriverError::NotOpen);
        }
        Ok(())
    }

    fn tx_stop(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn tx_transmit(&self, datum: u8) -> Result<(), DriverError> {
        let isr = {
            let mut inner = self.inner.lock().unwrap();
            let isr = inner.isr.clone().ok_or(DriverError::NotOpen)?;
            let port = inner.port.as_mut().ok_or(DriverError::NotOpen)?;
            port.write_all(&[datum])?;
            // Drain so completion tracks the actual wire, pacing the
            // byte-by-byte transmit loop at the line rate.
            port.flush()?;
            isr
        };
        isr.tx_complete();
        Ok(())
    }

    fn half_char_timer_start(&self) -> Result<(), DriverError> {
        if self.inner.lock().unwrap().port.is_none() {
            return Err(DriverError::NotOpen);
        }
        self.ticker_enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn half_char_timer_stop(&self) -> Result<(), DriverError> {
        self.ticker_enabled.store(false, Ordering::Release);
        Ok(())
    }

    fn has_parity_error(&self) -> bool {
        false
    }

    fn clear_parity_error(&self) {}

    fn has_overrun_error(&self) -> bool {
        false
    }

    fn clear_overrun_error(&self) {}

    fn has_frame_error(&self) -> bool {
        false
    }

    fn clear_frame_error(&self) {}
}

impl std::fmt::Debug for SerialPortDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortDriver").finish_non_exhaustive()
    }
}
