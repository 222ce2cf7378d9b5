use serde::Serialize;

use crate::cmd::{Context, CrcArgs};
use crate::exit::{control_error, CliResult, SUCCESS};
use crate::output::{hex_u16, print_record};

#[derive(Serialize)]
struct CrcOutput {
    crc: u16,
}

pub fn run(_args: CrcArgs, ctx: &Context) -> CliResult<i32> {
    let crc = ctx
        .sequencer()?
        .read_crc()
        .map_err(|err| control_error("read crc", err))?;
    print_record("crc", &CrcOutput { crc }, &[("crc", hex_u16(crc))], ctx.format);
    Ok(SUCCESS)
}
