pub(crate) mod context;
mod device;
mod driver;
pub(crate) mod events;
mod rx;
mod tx;

pub use context::{LastTransmit, LineCounters};
pub use driver::{Direction, IsrHandle, SerialDriver};

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::info;

use crate::config::{SerialConfig, TransmissionMode};
use crate::errors::{DeviceError, TransportError};
use crate::frame::{Frame, FrameFlags};

use device::Device;

/// Default size of the device registry.
pub const DEFAULT_MAX_INTERFACES: usize = 4;

/// Handle to one registered serial interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iface(usize);

impl Iface {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for Iface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "if{}", self.0)
    }
}

/// The transport core: a bounded registry of serial devices plus the
/// frame-level receive and transmit machinery on top of them.
///
/// There is no global state; build one `Transport`, register drivers into
/// it, and resolve the returned [`Iface`] handles against it. Operations on
/// different interfaces are independent; within one interface, RX and TX
/// serialize on the device's I/O lock.
#[derive(Debug)]
pub struct Transport {
    devices: RwLock<Vec<Option<Arc<Device>>>>,
}

impl Transport {
    pub fn new(max_interfaces: usize) -> Self {
        Self {
            devices: RwLock::new(vec![None; max_interfaces]),
        }
    }

    /// Register a driver into the first free slot.
    pub fn register(&self, driver: Arc<dyn SerialDriver>) -> Result<Iface, DeviceError> {
        let mut devices = self.devices.write().unwrap();
        let slot = devices
            .iter()
            .position(|d| d.is_none())
            .ok_or(DeviceError::NoFreeSlot(devices.len()))?;
        devices[slot] = Some(Arc::new(Device::new(slot, driver)));
        info!(iface = slot, "device registered");
        Ok(Iface(slot))
    }

    /// Remove a registered device. The device must be closed.
    pub fn unregister(&self, iface: Iface) -> Result<(), DeviceError> {
        let mut devices = self.devices.write().unwrap();
        let slot = devices
            .get(iface.0)
            .ok_or(DeviceError::NotExist(iface.0))?
            .as_ref()
            .ok_or(DeviceError::NotRegistered(iface.0))?;
        if slot.is_opened() {
            return Err(DeviceError::AlreadyOpened(iface.0));
        }
        devices[iface.0] = None;
        info!(iface = iface.0, "device unregistered");
        Ok(())
    }

    fn device(&self, iface: Iface) -> Result<Arc<Device>, DeviceError> {
        let devices = self.devices.read().unwrap();
        devices
            .get(iface.0)
            .ok_or(DeviceError::NotExist(iface.0))?
            .as_ref()
            .cloned()
            .ok_or(DeviceError::NotRegistered(iface.0))
    }

    pub fn open(&self, iface: Iface, setup: &SerialConfig) -> Result<(), TransportError> {
        self.device(iface)?.open(setup)?;
        info!(iface = iface.0, setup = %setup.serial_port_info(), "device opened");
        Ok(())
    }

    pub fn close(&self, iface: Iface) -> Result<(), TransportError> {
        self.device(iface)?.close()?;
        info!(iface = iface.0, "device closed");
        Ok(())
    }

    // --- tunables (opened and idle only) -----------------------------------

    pub fn set_mode(&self, iface: Iface, mode: TransmissionMode) -> Result<(), DeviceError> {
        self.device(iface)?.set_mode(mode)
    }

    pub fn mode(&self, iface: Iface) -> Result<TransmissionMode, DeviceError> {
        self.device(iface)?.mode()
    }

    pub fn set_ascii_line_feed(&self, iface: Iface, line_feed: u8) -> Result<(), DeviceError> {
        self.device(iface)?.set_ascii_line_feed(line_feed)
    }

    pub fn ascii_line_feed(&self, iface: Iface) -> Result<u8, DeviceError> {
        self.device(iface)?.ascii_line_feed()
    }

    pub fn set_char_time_prescaler(&self, iface: Iface, prescaler: u16) -> Result<(), DeviceError> {
        self.device(iface)?.set_char_time_prescaler(prescaler)
    }

    pub fn char_time_prescaler(&self, iface: Iface) -> Result<u16, DeviceError> {
        self.device(iface)?.char_time_prescaler()
    }

    // --- frame I/O ---------------------------------------------------------

    /// Receive one frame into `buffer`. `None` timeout waits forever.
    pub async fn receive_frame<'b>(
        &self,
        iface: Iface,
        buffer: &'b mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(Frame<'b>, FrameFlags), TransportError> {
        self.device(iface)?.receive_frame(buffer, timeout).await
    }

    /// Transmit one frame and enforce the post-frame line discipline.
    pub async fn transmit_frame(
        &self,
        iface: Iface,
        frame: &Frame<'_>,
    ) -> Result<(), TransportError> {
        self.device(iface)?.transmit_frame(frame).await
    }

    /// Wait for 3.5 character times of line silence (RTU; no-op in ASCII).
    pub async fn wait_startup(
        &self,
        iface: Iface,
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        self.device(iface)?.wait_startup(timeout).await
    }

    // --- diagnostics -------------------------------------------------------

    pub fn line_counters(&self, iface: Iface) -> Result<LineCounters, DeviceError> {
        Ok(self.device(iface)?.ctx.line_counters())
    }

    pub fn clear_line_counters(&self, iface: Iface) -> Result<(), DeviceError> {
        self.device(iface)?.ctx.clear_line_counters();
        Ok(())
    }

    pub fn last_transmit(&self, iface: Iface) -> Result<LastTransmit, DeviceError> {
        Ok(self.device(iface)?.ctx.last_transmit())
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INTERFACES)
    }
}
