use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    kind: &'a str,
    #[serde(flatten)]
    data: &'a T,
}

/// Print `value` as one JSON object tagged with `kind`.
pub fn print_json<T: Serialize>(kind: &str, value: &T) {
    let envelope = Envelope { kind, data: value };
    println!(
        "{}",
        serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Print a command result.
///
/// JSON serializes `value`; the other formats show `fields` in order.
pub fn print_record<T: Serialize>(
    kind: &str,
    value: &T,
    fields: &[(&str, String)],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(kind, value),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            println!("{kind}");
            for (name, value) in fields {
                println!("  {name:<width$}  {value}");
            }
        }
        OutputFormat::Raw => {
            for (_, value) in fields {
                println!("{value}");
            }
        }
    }
}

/// Space-separated lowercase hex bytes.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn hex_u16(value: u16) -> String {
    format!("{value:#06x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        crc: u16,
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(hex(&[0x5A, 0x00, 0x20]), "5a 00 20");
        assert_eq!(hex(&[]), "");
        assert_eq!(hex_u16(0xAEE7), "0xaee7");
    }

    #[test]
    fn envelope_flattens_value() {
        let envelope = Envelope {
            kind: "crc",
            data: &Sample { crc: 7 },
        };
        let json = serde_json::to_string(&envelope).expect("envelope should serialize");
        assert_eq!(json, r#"{"kind":"crc","crc":7}"#);
    }
}
