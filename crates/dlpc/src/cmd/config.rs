use serde::Serialize;

use crate::cmd::{ConfigArgs, Context};
use crate::exit::{CliResult, SUCCESS};
use crate::output::print_record;

#[derive(Serialize)]
struct ConfigOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    simulate: bool,
    config: &'a dlpc_control::ControllerConfig,
}

pub fn run(_args: ConfigArgs, ctx: &Context) -> CliResult<i32> {
    let c = &ctx.config;
    let out = ConfigOutput {
        source: ctx.config_path.as_ref().map(|p| p.display().to_string()),
        simulate: ctx.simulate,
        config: c,
    };
    print_record(
        "config",
        &out,
        &[
            (
                "source",
                out.source.clone().unwrap_or_else(|| "defaults".to_string()),
            ),
            ("simulate", ctx.simulate.to_string()),
            ("i2c", format!("{} @ {:#04x}", c.i2c_path.display(), c.device_address)),
            (
                "spi",
                format!(
                    "{} @ {} Hz, mode {}",
                    c.spi_path.display(),
                    c.spi_speed_hz,
                    c.spi_mode
                ),
            ),
            ("settle_delay_ms", c.settle_delay_ms.to_string()),
            ("pattern_settle_ms", c.pattern_settle_ms.to_string()),
            ("frame_header", format!("{:#04x}", c.frame_header)),
            (
                "window",
                format!(
                    "row {}, blocks {}..={}",
                    c.window.row_start, c.window.col_start, c.window.col_end
                ),
            ),
            (
                "exposure",
                format!("dark {}, exposed {}", c.dark_frames, c.exposed_frames),
            ),
        ],
        ctx.format,
    );
    Ok(SUCCESS)
}
