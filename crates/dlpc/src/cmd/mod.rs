use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use dlpc_control::{
    ControllerConfig, ExposureSequencer, OperatingMode, RegisterAccess, SimulatedController,
};
use dlpc_frame::{AddressWindow, BufferIndex, FrameWriter, PixelBuffer};

use crate::device::{self, Device, DynRegisterBus, DynStreamBus};
use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod config;
pub mod crc;
pub mod doctor;
pub mod expose;
pub mod mode;
pub mod prepare;
pub mod probe;
pub mod status;
pub mod stream;
pub mod test_pattern;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the controller answers on the register bus.
    Probe(ProbeArgs),
    /// Read and decode every mapped register.
    Status(StatusArgs),
    /// Request an operating mode.
    Mode(ModeArgs),
    /// Run the exposure preparation sequence.
    Prepare(PrepareArgs),
    /// Stream one image frame.
    Stream(StreamArgs),
    /// Run full exposure cycles.
    Expose(ExposeArgs),
    /// Read the controller's CRC of the last image stream.
    Crc(CrcArgs),
    /// Configure and enter test pattern mode.
    TestPattern(TestPatternArgs),
    /// Print the effective configuration.
    Config(ConfigArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
}

/// Settings shared by every command.
pub struct Context {
    pub config: ControllerConfig,
    pub config_path: Option<PathBuf>,
    pub simulate: bool,
    /// Simulated controller stops answering after this many exposures.
    pub simulate_drop_after: Option<usize>,
    pub format: OutputFormat,
}

impl Context {
    pub fn open(&self) -> CliResult<Device> {
        device::open(&self.config, self.simulate.then(|| self.simulator()))
    }

    fn simulator(&self) -> SimulatedController {
        match self.simulate_drop_after {
            Some(exposures) => SimulatedController::new().dropping_off_after(exposures),
            None => SimulatedController::new(),
        }
    }

    pub fn registers(&self) -> CliResult<RegisterAccess<DynRegisterBus>> {
        Ok(RegisterAccess::new(self.open()?.registers))
    }

    pub fn sequencer(&self) -> CliResult<ExposureSequencer<DynRegisterBus>> {
        Ok(ExposureSequencer::with_config(
            self.registers()?,
            self.config.sequencer_config(),
        ))
    }

    pub fn writer(&self, stream: DynStreamBus) -> FrameWriter<DynStreamBus> {
        FrameWriter::with_config(stream, self.config.framer_config())
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Probe(args) => probe::run(args, ctx),
        Command::Status(args) => status::run(args, ctx),
        Command::Mode(args) => mode::run(args, ctx),
        Command::Prepare(args) => prepare::run(args, ctx),
        Command::Stream(args) => stream::run(args, ctx),
        Command::Expose(args) => expose::run(args, ctx),
        Command::Crc(args) => crc::run(args, ctx),
        Command::TestPattern(args) => test_pattern::run(args, ctx),
        Command::Config(args) => config::run(args, ctx),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, ctx),
    }
}

#[derive(Args, Debug, Default)]
pub struct ProbeArgs {}

#[derive(Args, Debug, Default)]
pub struct StatusArgs {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeName {
    Standby,
    TestPattern,
    ExternalPrint,
}

impl From<ModeName> for OperatingMode {
    fn from(mode: ModeName) -> Self {
        match mode {
            ModeName::Standby => OperatingMode::Standby,
            ModeName::TestPattern => OperatingMode::TestPattern,
            ModeName::ExternalPrint => OperatingMode::ExternalPrint,
        }
    }
}

#[derive(Args, Debug)]
pub struct ModeArgs {
    /// Target mode. Omit to only read the current mode.
    pub mode: Option<ModeName>,
}

#[derive(Args, Debug, Default)]
pub struct PrepareArgs {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    /// Every pixel on.
    Solid,
    /// Every pixel off.
    Dark,
    /// Alternating square cells.
    Checker,
}

/// Where frame pixels come from and where they land.
#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Packed 1-bit-per-pixel image file, rows of the window width.
    #[arg(long, conflicts_with = "pattern")]
    pub file: Option<PathBuf>,
    /// Built-in pattern.
    #[arg(long, value_enum, default_value = "solid")]
    pub pattern: Pattern,
    /// Rows of the built-in pattern.
    #[arg(long, default_value = "64")]
    pub rows: usize,
    /// Checkerboard cell size in pixels.
    #[arg(long, default_value = "8")]
    pub cell: usize,
    /// First row (overrides config).
    #[arg(long)]
    pub row_start: Option<u16>,
    /// First 32-pixel column block (overrides config).
    #[arg(long)]
    pub col_start: Option<u8>,
    /// Last 32-pixel column block, inclusive (overrides config).
    #[arg(long)]
    pub col_end: Option<u8>,
}

impl FrameArgs {
    pub fn window(&self, config: &ControllerConfig, buffer: BufferIndex) -> AddressWindow {
        let mut window = config.window;
        if let Some(row_start) = self.row_start {
            window.row_start = row_start;
        }
        if let Some(col_start) = self.col_start {
            window.col_start = col_start;
        }
        if let Some(col_end) = self.col_end {
            window.col_end = col_end;
        }
        window.to_window(buffer)
    }

    pub fn pixels(&self, window: &AddressWindow) -> CliResult<PixelBuffer> {
        if let Some(path) = &self.file {
            let data = std::fs::read(path)
                .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
            return Ok(PixelBuffer::from(data));
        }
        if self.rows == 0 {
            return Err(CliError::new(USAGE, "--rows must be at least 1"));
        }
        let len = self.rows * window.row_bytes();
        Ok(match self.pattern {
            Pattern::Solid => PixelBuffer::filled(len, 0xFF),
            Pattern::Dark => PixelBuffer::dark(len),
            Pattern::Checker => PixelBuffer::checkerboard(window, self.rows, self.cell),
        })
    }
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Target image buffer.
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub buffer: u8,
}

#[derive(Args, Debug)]
pub struct ExposeArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Dark frames before exposure (overrides config).
    #[arg(long)]
    pub dark: Option<u32>,
    /// Exposed frames (overrides config).
    #[arg(long)]
    pub exposed: Option<u32>,
    /// Print settings byte; default keeps the controller's value.
    #[arg(long)]
    pub print_settings: Option<u8>,
    /// Number of exposure cycles, alternating image buffers.
    #[arg(long, default_value = "1")]
    pub repeat: usize,
}

#[derive(Args, Debug, Default)]
pub struct CrcArgs {}

#[derive(Args, Debug, Default)]
pub struct TestPatternArgs {
    /// Six comma-separated configuration bytes (default: 8-pixel line pattern).
    #[arg(long, value_delimiter = ',')]
    pub bytes: Option<Vec<u8>>,
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}
