use std::sync::{Arc, Mutex};

use crate::config::{SerialConfig, TransmissionMode};
use crate::errors::{DeviceError, TransportError};

use super::context::DeviceContext;
use super::driver::{IsrHandle, SerialDriver};

#[derive(Debug)]
struct DeviceState {
    opened: bool,
    mode: TransmissionMode,
    ascii_line_feed: u8,
    char_time_prescaler: u16,
}

/// One registered serial interface: its driver, its tunables and its
/// runtime context.
pub(crate) struct Device {
    pub(crate) index: usize,
    pub(crate) driver: Arc<dyn SerialDriver>,
    pub(crate) ctx: Arc<DeviceContext>,
    state: Mutex<DeviceState>,
}

impl Device {
    pub fn new(index: usize, driver: Arc<dyn SerialDriver>) -> Self {
        Self {
            index,
            driver,
            ctx: Arc::new(DeviceContext::new()),
            state: Mutex::new(DeviceState {
                opened: false,
                mode: TransmissionMode::default(),
                ascii_line_feed: 0x0A,
                char_time_prescaler: 1,
            }),
        }
    }

    pub fn open(&self, setup: &SerialConfig) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.opened {
            return Err(DeviceError::AlreadyOpened(self.index).into());
        }
        self.driver
            .open(setup, IsrHandle::new(Arc::clone(&self.ctx)))?;
        self.ctx
            .set_char_time_thresholds(state.char_time_prescaler);
        state.opened = true;
        Ok(())
    }

    pub fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.opened {
            return Err(DeviceError::NotOpened(self.index).into());
        }
        if self.ctx.is_busy() {
            return Err(DeviceError::Busy(self.index).into());
        }
        self.driver.close()?;
        state.opened = false;
        Ok(())
    }

    pub fn is_opened(&self) -> bool {
        self.state.lock().unwrap().opened
    }

    /// Snapshot of (mode, line feed) for the RX/TX paths; fails unless the
    /// device is opened.
    pub fn active_setup(&self) -> Result<(TransmissionMode, u8), DeviceError> {
        let state = self.state.lock().unwrap();
        if !state.opened {
            return Err(DeviceError::NotOpened(self.index));
        }
        Ok((state.mode, state.ascii_line_feed))
    }

    fn with_idle_state<T>(
        &self,
        apply: impl FnOnce(&mut DeviceState) -> T,
    ) -> Result<T, DeviceError> {
        let mut state = self.state.lock().unwrap();
        if !state.opened {
            return Err(DeviceError::NotOpened(self.index));
        }
        if self.ctx.is_busy() {
            return Err(DeviceError::Busy(self.index));
        }
        Ok(apply(&mut state))
    }

    pub fn set_mode(&self, mode: TransmissionMode) -> Result<(), DeviceError> {
        self.with_idle_state(|state| state.mode = mode)
    }

    pub fn mode(&self) -> Result<TransmissionMode, DeviceError> {
        let state = self.state.lock().unwrap();
        if !state.opened {
            return Err(DeviceError::NotOpened(self.index));
        }
        Ok(state.mode)
    }

    pub fn set_ascii_line_feed(&self, line_feed: u8) -> Result<(), DeviceError> {
        self.with_idle_state(|state| state.ascii_line_feed = line_feed)
    }

    pub fn ascii_line_feed(&self) -> Result<u8, DeviceError> {
        let state = self.state.lock().unwrap();
        if !state.opened {
            return Err(DeviceError::NotOpened(self.index));
        }
        Ok(state.ascii_line_feed)
    }

    pub fn set_char_time_prescaler(&self, prescaler: u16) -> Result<(), DeviceError> {
        if prescaler == 0 {
            return Err(DeviceError::InvalidParameter(
                "character time prescaler must be non-zero",
            ));
        }
        self.with_idle_state(|state| {
            state.char_time_prescaler = prescaler;
            self.ctx.set_char_time_thresholds(prescaler);
        })
    }

    pub fn char_time_prescaler(&self) -> Result<u16, DeviceError> {
        let state = self.state.lock().unwrap();
        if !state.opened {
            return Err(DeviceError::NotOpened(self.index));
        }
        Ok(state.char_time_prescaler)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("index", &self.index)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
