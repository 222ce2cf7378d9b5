use dlpc_frame::BufferIndex;
use serde::Serialize;

use crate::cmd::{Context, StreamArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{hex_u16, print_record};

#[derive(Serialize)]
struct StreamOutput {
    buffer: u8,
    row_start: u16,
    col_start: u8,
    col_end: u8,
    rows: usize,
    payload_len: usize,
    frame_len: usize,
    crc: u16,
}

pub fn run(args: StreamArgs, ctx: &Context) -> CliResult<i32> {
    let buffer = BufferIndex::try_from(args.buffer)
        .map_err(|err| CliError::new(USAGE, err.to_string()))?;
    let window = args.frame.window(&ctx.config, buffer);
    let pixels = args.frame.pixels(&window)?;

    let device = ctx.open()?;
    let mut writer = ctx.writer(device.stream);
    let response = writer
        .send_frame(&pixels, &window)
        .map_err(|err| frame_error("stream", err))?;

    let out = StreamOutput {
        buffer: buffer.as_u8(),
        row_start: window.row_start,
        col_start: window.col_start,
        col_end: window.col_end,
        rows: response.rows,
        payload_len: pixels.len(),
        frame_len: response.frame_len,
        crc: response.crc,
    };
    print_record(
        "stream",
        &out,
        &[
            ("buffer", out.buffer.to_string()),
            (
                "window",
                format!(
                    "rows {}..{}, blocks {}..={}",
                    out.row_start,
                    usize::from(out.row_start) + out.rows,
                    out.col_start,
                    out.col_end
                ),
            ),
            ("frame_len", out.frame_len.to_string()),
            ("crc", hex_u16(out.crc)),
        ],
        ctx.format,
    );
    Ok(SUCCESS)
}
