use dlpc_control::{
    BatchError, ExposureConfig, ExposureReport, ExposureSequencer, ExposureSession,
    RegisterAccess,
};
use dlpc_frame::BufferIndex;
use serde::Serialize;

use crate::cmd::prepare::step;
use crate::cmd::{Context, ExposeArgs};
use crate::exit::{control_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{hex, hex_u16, print_json, print_record, OutputFormat};

#[derive(Serialize)]
struct ExposeOutput<'a> {
    exposure: ExposureConfig,
    cycles: &'a [ExposureReport],
}

pub fn run(args: ExposeArgs, ctx: &Context) -> CliResult<i32> {
    if args.repeat == 0 {
        return Err(CliError::new(USAGE, "--repeat must be at least 1"));
    }
    let mut exposure = ExposureConfig::new(
        args.dark.unwrap_or(ctx.config.dark_frames),
        args.exposed.unwrap_or(ctx.config.exposed_frames),
    );
    if let Some(print_settings) = args.print_settings {
        exposure = exposure.with_print_settings(print_settings);
    }
    exposure
        .validate()
        .map_err(|err| control_error("expose", err))?;

    let placement = args.frame.window(&ctx.config, BufferIndex::Zero);
    let pixels = args.frame.pixels(&placement)?;

    let device = ctx.open()?;
    let sequencer = ExposureSequencer::with_config(
        RegisterAccess::new(device.registers),
        ctx.config.sequencer_config(),
    );
    let mut session = ExposureSession::new(sequencer, ctx.writer(device.stream), placement);

    let frames = vec![&pixels; args.repeat];
    match session.expose_all(frames, &exposure) {
        Ok(reports) => {
            print_expose(
                &ExposeOutput {
                    exposure,
                    cycles: &reports,
                },
                ctx.format,
            );
            Ok(SUCCESS)
        }
        Err(batch) => {
            if !batch.completed.is_empty() {
                print_expose(
                    &ExposeOutput {
                        exposure,
                        cycles: &batch.completed,
                    },
                    ctx.format,
                );
            }
            Err(batch_error(batch, args.repeat))
        }
    }
}

/// Exit error for a batch that stopped early; names how many cycles exposed.
fn batch_error(batch: BatchError, requested: usize) -> CliError {
    let context = format!(
        "expose cycle {} of {requested} ({} already exposed)",
        batch.completed.len() + 1,
        batch.completed.len()
    );
    control_error(&context, batch.source)
}

fn print_expose(out: &ExposeOutput<'_>, format: OutputFormat) {
    if let OutputFormat::Json = format {
        print_json("expose", out);
        return;
    }
    for (i, cycle) in out.cycles.iter().enumerate() {
        let crc = match cycle.crc_match {
            Some(true) => format!("{} (controller match)", hex_u16(cycle.frame_crc)),
            Some(false) => format!(
                "{} (controller reports {})",
                hex_u16(cycle.frame_crc),
                cycle.trigger.crc.map(hex_u16).unwrap_or_default()
            ),
            None => match &cycle.trigger.crc_error {
                Some(err) => format!("{} (controller crc unread: {err})", hex_u16(cycle.frame_crc)),
                None => hex_u16(cycle.frame_crc),
            },
        };
        print_record(
            "exposure",
            cycle,
            &[
                ("cycle", (i + 1).to_string()),
                ("buffer", cycle.buffer.to_string()),
                ("rows", cycle.rows.to_string()),
                ("crc", crc),
                ("active_buffer", step(&cycle.buffer_switch)),
                ("video_interface", step(&cycle.video_interface)),
                (
                    "mode",
                    format!("{} -> {}", cycle.mode.from, cycle.mode.to),
                ),
                ("trigger", hex(&cycle.trigger.payload)),
            ],
            format,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::TRANSPORT_ERROR;
    use dlpc_control::ControlError;
    use dlpc_transport::TransportError;

    #[test]
    fn batch_error_names_exposed_cycles() {
        let batch = BatchError {
            completed: Vec::new(),
            source: ControlError::Bus(TransportError::NotResponding { address: 27 }),
        };
        let err = batch_error(batch, 3);
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.contains("expose cycle 1 of 3 (0 already exposed)"));
    }
}
