//! Opens the register and stream buses the CLI drives.

use dlpc_control::{ControllerConfig, SimulatedController};
use dlpc_transport::{RegisterBus, StreamBus};

use crate::exit::CliResult;

pub type DynRegisterBus = Box<dyn RegisterBus>;
pub type DynStreamBus = Box<dyn StreamBus>;

pub struct Device {
    pub registers: DynRegisterBus,
    pub stream: DynStreamBus,
}

/// Open `sim` when given, the configured hardware buses otherwise.
pub fn open(config: &ControllerConfig, sim: Option<SimulatedController>) -> CliResult<Device> {
    if let Some(sim) = sim {
        tracing::debug!("using simulated controller");
        return Ok(Device {
            registers: Box::new(sim.clone()),
            stream: Box::new(sim),
        });
    }
    open_hardware(config)
}

#[cfg(all(feature = "linux", target_os = "linux"))]
fn open_hardware(config: &ControllerConfig) -> CliResult<Device> {
    use dlpc_transport::{open_i2c, open_spi, SpiSettings};

    use crate::exit::transport_error;

    let registers = open_i2c(&config.i2c_path, config.device_address)
        .map_err(|err| transport_error("open register bus", err))?;
    let settings = SpiSettings {
        max_speed_hz: config.spi_speed_hz,
        mode: config.spi_mode,
        max_chunk: config.spi_max_chunk,
    };
    let stream = open_spi(&config.spi_path, settings)
        .map_err(|err| transport_error("open stream bus", err))?;
    tracing::debug!(
        i2c = %config.i2c_path.display(),
        spi = %config.spi_path.display(),
        address = config.device_address,
        "opened controller buses"
    );
    Ok(Device {
        registers: Box::new(registers),
        stream: Box::new(stream),
    })
}

#[cfg(not(all(feature = "linux", target_os = "linux")))]
fn open_hardware(_config: &ControllerConfig) -> CliResult<Device> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        "hardware buses need a Linux build with the `linux` feature; use --simulate",
    ))
}

pub fn hardware_support() -> bool {
    cfg!(all(feature = "linux", target_os = "linux"))
}
