use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dlpc_control::registers::{self, Register};
use dlpc_control::OperatingMode;
use serde::Serialize;

use crate::cmd::{Context, StatusArgs};
use crate::exit::{control_error, CliResult, SUCCESS};
use crate::output::{hex, print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct RegisterRow {
    name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    write_addr: Option<u8>,
    read_addr: u8,
    value: Vec<u8>,
    decoded: String,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    mode: OperatingMode,
    registers: Vec<RegisterRow>,
}

pub fn run(_args: StatusArgs, ctx: &Context) -> CliResult<i32> {
    let mut regs = ctx.registers()?;
    let mut rows = Vec::with_capacity(registers::ALL.len());
    for reg in registers::ALL.iter() {
        let value = regs
            .read_register(reg)
            .map_err(|err| control_error(&format!("read {}", reg.name), err))?;
        rows.push(RegisterRow {
            name: reg.name,
            write_addr: reg.write_addr,
            read_addr: reg.read_addr,
            decoded: decode(reg, &value),
            value,
        });
    }

    let mode = rows
        .iter()
        .find(|row| row.name == registers::MODE.name)
        .and_then(|row| row.value.first().copied())
        .map(OperatingMode::from_code)
        .unwrap_or(OperatingMode::Unknown(0));

    print_status(&StatusOutput { mode, registers: rows }, ctx.format);
    Ok(SUCCESS)
}

fn decode(reg: &Register, value: &[u8]) -> String {
    let byte = value.first().copied().unwrap_or(0);
    match reg.name {
        "operating_mode" => OperatingMode::from_code(byte).to_string(),
        "fpga_control" => format!(
            "crc16 {}",
            on_off(byte & registers::FPGA_CRC16_ENABLE != 0)
        ),
        "video_interface" => format!(
            "interface {}",
            on_off(byte & registers::VIDEO_INTERFACE_ENABLE != 0)
        ),
        "active_buffer" => match byte {
            0 | 1 => format!("buffer {byte}"),
            other => format!("unexpected {other}"),
        },
        "dark_exposed_frames" if value.len() == 5 => format!(
            "print {:#04x}, dark {}, exposed {}",
            value[0],
            u16::from_be_bytes([value[1], value[2]]),
            u16::from_be_bytes([value[3], value[4]])
        ),
        "external_print_config" if value.len() == 2 => {
            format!("degamma {:#04x}, illuminators {:#04x}", value[0], value[1])
        }
        "crc_result" if value.len() == 2 => {
            format!("{:#06x}", u16::from_le_bytes([value[0], value[1]]))
        }
        _ => String::new(),
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn print_status(out: &StatusOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json("status", out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["REGISTER", "WRITE", "READ", "VALUE", "DECODED"]);
            for row in &out.registers {
                table.add_row(vec![
                    row.name.to_string(),
                    row.write_addr
                        .map(|a| format!("{a:#04x}"))
                        .unwrap_or_else(|| "-".to_string()),
                    format!("{:#04x}", row.read_addr),
                    hex(&row.value),
                    row.decoded.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("mode: {}", out.mode);
            for row in &out.registers {
                println!(
                    "  {:<22} [{:#04x}] {:<15} {}",
                    row.name,
                    row.read_addr,
                    hex(&row.value),
                    row.decoded
                );
            }
        }
        OutputFormat::Raw => {
            for row in &out.registers {
                println!("{:#04x} {}", row.read_addr, hex(&row.value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_counts_big_endian() {
        let text = decode(
            &registers::DARK_EXPOSED_FRAMES,
            &[0x5A, 0x00, 0x20, 0x02, 0x00],
        );
        assert_eq!(text, "print 0x5a, dark 32, exposed 512");
    }

    #[test]
    fn decodes_flag_bits() {
        assert_eq!(decode(&registers::FPGA_CONTROL, &[0x05]), "crc16 on");
        assert_eq!(decode(&registers::VIDEO_INTERFACE, &[0x00]), "interface off");
        assert_eq!(decode(&registers::ACTIVE_BUFFER, &[0xC6]), "unexpected 198");
        assert_eq!(decode(&registers::MODE, &[0xFF]), "standby");
    }
}
