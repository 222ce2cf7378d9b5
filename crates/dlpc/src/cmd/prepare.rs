use dlpc_control::{PrepareReport, StepOutcome};

use crate::cmd::{Context, PrepareArgs};
use crate::exit::{control_error, CliResult, SUCCESS};
use crate::output::{hex, print_record};

pub fn run(_args: PrepareArgs, ctx: &Context) -> CliResult<i32> {
    let mut seq = ctx.sequencer()?;
    let report = seq
        .prepare_exposure()
        .map_err(|err| control_error("prepare", err))?;

    print_record("prepare", &report, &fields(&report), ctx.format);
    Ok(SUCCESS)
}

fn fields(report: &PrepareReport) -> Vec<(&'static str, String)> {
    vec![
        (
            "mode",
            format!(
                "{} -> {}{}",
                report.mode.from,
                report.mode.to,
                if report.mode.written { "" } else { " (unchanged)" }
            ),
        ),
        ("fpga_control", step(&report.crc_enable)),
        ("active_buffer", step(&report.active_buffer)),
        ("print_config", hex(&report.print_config)),
        ("warnings", report.warnings().len().to_string()),
    ]
}

pub(crate) fn step(outcome: &StepOutcome) -> String {
    let mut text = format!("{:#04x} -> {:#04x}", outcome.rmw.old, outcome.rmw.new);
    if let Some(warning) = &outcome.warning {
        text.push_str(&format!(" (readback {})", hex(&warning.observed)));
    }
    text
}
