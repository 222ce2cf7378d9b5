use dlpc_control::TestPatternConfig;

use crate::cmd::{Context, TestPatternArgs};
use crate::exit::{control_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{hex, print_record};

pub fn run(args: TestPatternArgs, ctx: &Context) -> CliResult<i32> {
    let pattern = match args.bytes {
        Some(bytes) => TestPatternConfig {
            bytes: bytes.try_into().map_err(|bytes: Vec<u8>| {
                CliError::new(
                    USAGE,
                    format!("--bytes takes 6 values, got {}", bytes.len()),
                )
            })?,
        },
        None => TestPatternConfig::default(),
    };

    let transition = ctx
        .sequencer()?
        .configure_test_pattern(&pattern)
        .map_err(|err| control_error("test pattern", err))?;

    print_record(
        "test_pattern",
        &transition,
        &[
            ("pattern", hex(&pattern.bytes)),
            ("from", transition.from.to_string()),
            ("to", transition.to.to_string()),
        ],
        ctx.format,
    );
    Ok(SUCCESS)
}
