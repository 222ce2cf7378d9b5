use serde::Serialize;

use crate::cmd::{Context, ModeArgs};
use crate::exit::{control_error, CliResult, SUCCESS};
use crate::output::print_record;

#[derive(Serialize)]
struct CurrentMode {
    mode: dlpc_control::OperatingMode,
    code: u8,
}

pub fn run(args: ModeArgs, ctx: &Context) -> CliResult<i32> {
    let mut seq = ctx.sequencer()?;

    let Some(target) = args.mode else {
        let mode = seq
            .current_mode()
            .map_err(|err| control_error("read mode", err))?;
        let out = CurrentMode {
            mode,
            code: mode.code(),
        };
        print_record(
            "mode",
            &out,
            &[
                ("mode", mode.to_string()),
                ("code", format!("{:#04x}", out.code)),
            ],
            ctx.format,
        );
        return Ok(SUCCESS);
    };

    let transition = seq
        .request_mode(target.into())
        .map_err(|err| control_error("request mode", err))?;
    print_record(
        "mode_transition",
        &transition,
        &[
            ("from", transition.from.to_string()),
            ("to", transition.to.to_string()),
            ("written", transition.written.to_string()),
        ],
        ctx.format,
    );
    Ok(SUCCESS)
}
