//! Implements the command line behavior.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use jemu_bytecode::opcode;
use jemu_vm::{FaultContext, Frame, Outcome, Reference, Slot, StopHandle};
use log::info;
use serde_json::json;

/// Loads method bytecode from a file.
///
/// A `.hex` file holds hexadecimal text; whitespace is ignored and `#`
/// starts a comment running to the end of the line. Any other file is
/// read as raw bytes.
pub fn load_code(path: &Path) -> Result<Vec<u8>, String> {
    let is_hex = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("hex"));
    if !is_hex {
        return fs::read(path).map_err(|e| format!("Unable to open {}: {}", path.display(), e));
    }

    let text = fs::read_to_string(path)
        .map_err(|e| format!("Unable to open {}: {}", path.display(), e))?;
    parse_hex(&text).map_err(|e| format!("Unable to read {}: {e}", path.display()))
}

fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<char> = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(str::chars)
        .filter(|c| !c.is_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(String::from("odd number of hex digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let byte: String = pair.iter().collect();
            u8::from_str_radix(&byte, 16).map_err(|_| format!("invalid hex byte '{byte}'"))
        })
        .collect()
}

/// Parses a local variable argument of the form `KIND:VALUE`, or `null`.
pub fn parse_slot(arg: &str) -> Result<Slot, String> {
    if arg == "null" {
        return Ok(Slot::null());
    }
    let (kind, value) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected KIND:VALUE, got '{arg}'"))?;
    let invalid = |e: String| format!("invalid {kind} value '{value}': {e}");
    match kind {
        "int" => value.parse().map(Slot::int).map_err(|e| invalid(format!("{e}"))),
        "long" => value.parse().map(Slot::long).map_err(|e| invalid(format!("{e}"))),
        "float" => value.parse().map(Slot::float).map_err(|e| invalid(format!("{e}"))),
        "double" => value.parse().map(Slot::double).map_err(|e| invalid(format!("{e}"))),
        "bool" => value.parse().map(Slot::boolean).map_err(|e| invalid(format!("{e}"))),
        "str" => Ok(Slot::reference(Reference::String(Arc::from(value)))),
        _ => Err(format!("unknown argument kind '{kind}'")),
    }
}

fn new_frame(code: &[u8], locals: usize, args: &[Slot]) -> Result<Frame, String> {
    let mut frame = Frame::new(code, locals.max(args.len()));
    for (i, arg) in args.iter().enumerate() {
        frame
            .set_local(i, arg.clone())
            .map_err(|e| format!("Unable to set argument {i}: {e}"))?;
    }
    Ok(frame)
}

/// Loads a bytecode file and executes it in a single frame.
///
/// When `max_steps` is `Some(n)`, stops after `n` instructions. Otherwise
/// runs until the method returns or Ctrl+C is pressed. When `dump_locals`
/// is `Some(path)`, writes all local variables after stopping, including
/// after a trap.
pub fn run(
    path: &Path,
    locals: usize,
    args: &[Slot],
    max_steps: Option<u64>,
    dump_locals: Option<&Path>,
) -> Result<(), String> {
    let code = load_code(path)?;
    let mut frame = new_frame(&code, locals, args)?;

    let stop = install_stop_handler()?;
    let outcome = frame.run_bounded(max_steps, &stop);

    if let Some(dump_path) = dump_locals {
        dump_locals_to(&frame, dump_path)?;
    }

    match outcome {
        Ok(Outcome::Returned(Some(value))) => {
            println!("{value}");
            Ok(())
        }
        Ok(Outcome::Returned(None)) => Ok(()),
        Ok(Outcome::Interrupted { steps }) => {
            info!("Stopped after {steps} steps at pc {}", frame.pc());
            Ok(())
        }
        Err(fault) => Err(format!("VM trap: {fault}")),
    }
}

/// Installs a Ctrl+C handler that requests the returned handle to stop.
fn install_stop_handler() -> Result<StopHandle, String> {
    let stop = StopHandle::new();
    let handle = stop.clone();
    ctrlc::set_handler(move || handle.request_stop())
        .map_err(|e| format!("Failed to set signal handler: {e}"))?;
    Ok(stop)
}

/// Decodes a bytecode file and prints its instructions as JSON.
pub fn disassemble(path: &Path) -> Result<(), String> {
    let code = load_code(path)?;
    let instructions = jemu_bytecode::decode(&code)
        .map_err(|e| format!("Unable to decode {}: {e}", path.display()))?;

    let listing: Vec<serde_json::Value> = instructions
        .iter()
        .map(|insn| {
            let mut entry = json!({
                "offset": insn.offset,
                "opcode": insn.opcode,
                "name": insn.name(),
                "operands": insn.operands,
            });
            if let Some(target) = insn.branch_target() {
                entry["target"] = json!(target);
            }
            if opcode::is_reserved(insn.opcode) {
                entry["reserved"] = json!(true);
            }
            entry
        })
        .collect();

    let result = json!({
        "length": code.len(),
        "instructions": listing,
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&result).unwrap_or_default()
    );
    Ok(())
}

/// Benchmarks a bytecode file by running it `cycles` times in fresh frames,
/// preceded by `warmup` unmeasured runs, then prints JSON timing statistics.
///
/// Every run must return. A run that reaches `max_steps` instructions, or
/// is stopped by Ctrl+C, fails the benchmark.
pub fn benchmark(
    path: &Path,
    locals: usize,
    args: &[Slot],
    cycles: u64,
    warmup: u64,
    max_steps: Option<u64>,
) -> Result<(), String> {
    let code = load_code(path)?;
    let stop = install_stop_handler()?;

    let run_once = || -> Result<u64, String> {
        let mut frame = new_frame(&code, locals, args)?;
        match frame
            .run_bounded(max_steps, &stop)
            .map_err(|fault: FaultContext| fault.to_string())?
        {
            Outcome::Returned(_) => Ok(frame.steps()),
            Outcome::Interrupted { steps } => Err(format!(
                "run interrupted after {steps} steps at pc {}",
                frame.pc()
            )),
        }
    };

    // Warmup phase (unmeasured)
    for _ in 0..warmup {
        run_once().map_err(|e| format!("Benchmark failed during warmup: {e}"))?;
    }

    // Measured phase
    let mut durations_us = Vec::with_capacity(cycles as usize);
    let mut steps = 0;
    for _ in 0..cycles {
        let start = Instant::now();
        steps = run_once().map_err(|e| format!("Benchmark failed: {e}"))?;
        durations_us.push(start.elapsed().as_nanos() as f64 / 1000.0);
    }

    durations_us.sort_by(f64::total_cmp);
    let count = (durations_us.len() as f64).max(1.0);
    let mean = durations_us.iter().sum::<f64>() / count;
    let variance = durations_us.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / count;
    let stddev = variance.sqrt();
    let max = durations_us.last().copied().unwrap_or(0.0);
    let p99 = percentile(&durations_us, 99.0);

    let program_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = json!({
        "program": program_name,
        "cycles": cycles,
        "warmup": warmup,
        "steps_per_run": steps,
        "run_us": {
            "mean": round3(mean),
            "stddev": round3(stddev),
            "p99": round3(p99),
            "max": round3(max),
        },
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&result).unwrap_or_default()
    );
    Ok(())
}

/// Returns the value at the given percentile (0 to 100) using nearest-rank.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// Rounds to 3 decimal places.
fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn dump_locals_to(frame: &Frame, dump_path: &Path) -> Result<(), String> {
    let mut out = File::create(dump_path)
        .map_err(|e| format!("Unable to create dump file {}: {e}", dump_path.display()))?;
    for (i, value) in frame.locals().iter().enumerate() {
        writeln!(out, "local[{i}]: {value}")
            .map_err(|e| format!("Unable to write dump file: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_slot_when_int_then_int_slot() {
        assert_eq!(parse_slot("int:-7"), Ok(Slot::int(-7)));
    }

    #[test]
    fn parse_slot_when_each_kind_then_matching_slot() {
        assert_eq!(parse_slot("long:9000000000"), Ok(Slot::long(9_000_000_000)));
        assert_eq!(parse_slot("float:1.5"), Ok(Slot::float(1.5)));
        assert_eq!(parse_slot("double:-0.25"), Ok(Slot::double(-0.25)));
        assert_eq!(parse_slot("bool:true"), Ok(Slot::boolean(true)));
        assert_eq!(parse_slot("null"), Ok(Slot::null()));
    }

    #[test]
    fn parse_slot_when_str_then_string_reference() {
        let slot = parse_slot("str:a:b").unwrap();

        assert_eq!(slot.to_string(), "a:b");
    }

    #[test]
    fn parse_slot_when_bad_value_then_err() {
        assert!(parse_slot("int:x").is_err());
        assert!(parse_slot("short:1").is_err());
        assert!(parse_slot("7").is_err());
    }

    #[test]
    fn parse_hex_when_comments_and_spacing_then_bytes() {
        let text = "10 2A  # bipush 42\nac\n";

        assert_eq!(parse_hex(text), Ok(vec![0x10, 0x2A, 0xAC]));
    }

    #[test]
    fn parse_hex_when_odd_digits_then_err() {
        assert!(parse_hex("10 2").is_err());
    }

    #[test]
    fn parse_hex_when_not_hex_then_err() {
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn percentile_when_hundred_values_then_nearest_rank() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();

        assert_eq!(percentile(&sorted, 99.0), 99.0);
        assert_eq!(percentile(&[], 99.0), 0.0);
    }

    #[test]
    fn round3_when_many_decimals_then_three_kept() {
        assert_eq!(round3(1.23456), 1.235);
    }
}
