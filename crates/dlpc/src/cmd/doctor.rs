use std::path::Path;

use serde::Serialize;

use crate::cmd::{Context, DoctorArgs};
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, ctx: &Context) -> CliResult<i32> {
    let mut checks = vec![
        hardware_support_check(),
        compiled_features_check(),
        config_source_check(ctx),
    ];
    if ctx.simulate {
        checks.push(skip("i2c_device", "simulated controller"));
        checks.push(skip("spi_device", "simulated controller"));
    } else {
        checks.push(device_node_check("i2c_device", &ctx.config.i2c_path));
        checks.push(device_node_check("spi_device", &ctx.config.spi_path));
    }
    checks.push(settle_delay_check(ctx.config.settle_delay_ms));

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };
    let output = DoctorOutput { checks, overall };

    print_doctor(&output, ctx.format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json("doctor", output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("dlpc doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn skip(name: &str, detail: &str) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status: CheckStatus::Skip,
        detail: detail.to_string(),
    }
}

fn hardware_support_check() -> CheckResult {
    if crate::device::hardware_support() {
        CheckResult {
            name: "hardware_buses".to_string(),
            status: CheckStatus::Pass,
            detail: "linux i2c/spidev backends compiled in".to_string(),
        }
    } else {
        CheckResult {
            name: "hardware_buses".to_string(),
            status: CheckStatus::Warn,
            detail: "no hardware backend; only --simulate is available".to_string(),
        }
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = vec!["cli"];
    if cfg!(feature = "linux") {
        features.push("linux");
    }
    CheckResult {
        name: "compiled_features".to_string(),
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}

fn config_source_check(ctx: &Context) -> CheckResult {
    let detail = match &ctx.config_path {
        Some(path) => format!("loaded {}", path.display()),
        None => "built-in defaults".to_string(),
    };
    CheckResult {
        name: "config".to_string(),
        status: CheckStatus::Pass,
        detail,
    }
}

fn device_node_check(name: &str, path: &Path) -> CheckResult {
    let (status, detail) = match std::fs::metadata(path) {
        Ok(_) => (CheckStatus::Pass, format!("{} present", path.display())),
        Err(err) => (CheckStatus::Fail, format!("{}: {err}", path.display())),
    };
    CheckResult {
        name: name.to_string(),
        status,
        detail,
    }
}

fn settle_delay_check(settle_delay_ms: u64) -> CheckResult {
    let status = if settle_delay_ms == 0 {
        CheckStatus::Warn
    } else {
        CheckStatus::Info
    };
    CheckResult {
        name: "settle_delay".to_string(),
        status,
        detail: format!("{settle_delay_ms} ms"),
    }
}
