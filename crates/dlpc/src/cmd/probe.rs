use dlpc_transport::RegisterBus;
use serde::Serialize;

use crate::cmd::{Context, ProbeArgs};
use crate::exit::{control_error, CliResult, SUCCESS};
use crate::output::print_record;

#[derive(Serialize)]
struct ProbeOutput {
    address: u8,
    responding: bool,
}

pub fn run(_args: ProbeArgs, ctx: &Context) -> CliResult<i32> {
    let mut regs = ctx.registers()?;
    regs.probe().map_err(|err| control_error("probe", err))?;

    let out = ProbeOutput {
        address: regs.bus().address(),
        responding: true,
    };
    print_record(
        "probe",
        &out,
        &[
            ("address", format!("{:#04x} ({})", out.address, out.address)),
            ("responding", out.responding.to_string()),
        ],
        ctx.format,
    );
    Ok(SUCCESS)
}
