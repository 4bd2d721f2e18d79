use std::sync::Arc;

use tracing::{error, info, warn};

use crate::driver::SerialPortDriver;
use crate::errors::{SlaveError, StackError, TransportError};
use crate::slave::{CommandTable, MemoryModel, Slave};
use crate::transport::{Iface, Transport};
use crate::StackConfig;

/// Size of each object table of the simulated data model.
const MODEL_TABLE_SIZE: u16 = 1024;

/// The slave simulator service: one serial device, the built-in command
/// catalog and an in-memory data model, polled until shutdown.
pub struct SlaveServer {
    config: StackConfig,
    transport: Arc<Transport>,
    slave: Arc<Slave>,
    iface: Iface,
}

impl SlaveServer {
    pub fn new(config: StackConfig) -> Result<Self, StackError> {
        StackConfig::validate(&config)?;

        let transport = Arc::new(Transport::default());
        let iface = transport.register(SerialPortDriver::new())?;
        transport.open(iface, &config.serial)?;
        transport.set_mode(iface, config.device.mode)?;
        transport.set_ascii_line_feed(iface, config.device.ascii_line_feed)?;
        transport.set_char_time_prescaler(iface, config.device.char_time_prescaler)?;

        let model = MemoryModel::new(
            MODEL_TABLE_SIZE,
            MODEL_TABLE_SIZE,
            MODEL_TABLE_SIZE,
            MODEL_TABLE_SIZE,
        );
        let slave = Arc::new(Slave::new(
            Arc::clone(&transport),
            iface,
            &config.slave,
            CommandTable::with_builtin(),
            Box::new(model),
        ));

        Ok(Self {
            config,
            transport,
            slave,
            iface,
        })
    }

    pub fn slave(&self) -> &Arc<Slave> {
        &self.slave
    }

    pub async fn run(&self) -> Result<(), StackError> {
        info!(
            address = self.config.slave.address,
            mode = %self.config.device.mode,
            serial = %self.config.serial.serial_port_info(),
            "slave server starting"
        );

        match self
            .transport
            .wait_startup(self.iface, Some(self.config.slave.poll_timeout))
            .await
        {
            Ok(()) => {}
            Err(TransportError::Timeout) => {
                warn!("line not idle within the startup window, continuing anyway")
            }
            Err(err) => return Err(err.into()),
        }

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    break;
                }
                result = self.slave.poll(Some(self.config.slave.poll_timeout)) => {
                    match result {
                        Ok(()) => {}
                        // An idle line is the normal case for a slave.
                        Err(SlaveError::Transport(TransportError::Timeout)) => {}
                        Err(err) => error!(%err, "poll failed"),
                    }
                }
            }
        }

        let counters = self.slave.counters();
        info!(
            bus_messages = counters.bus_messages,
            bus_comm_errors = counters.bus_comm_errors,
            slave_messages = counters.slave_messages,
            "slave server stopped"
        );
        self.transport.close(self.iface)?;
        Ok(())
    }
}
