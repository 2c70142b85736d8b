//! Console output: one line per completed batch on stdout.

use bytesize::ByteSize;
use s3bench_core::{BatchReport, Operation, Preset, SweepSummary};
use yansi::Paint;

/// Prints a completed batch, e.g.
/// `WRITE from bucket/key in 12.345 ms 4 workers 1024 size, 81.0 KiB/s`.
pub fn print_batch(report: &BatchReport) {
    let line = batch_line(report);
    match report.operation {
        Operation::Write => println!("{}", line.yellow()),
        Operation::Read => println!("{}", line.green()),
    }
}

fn batch_line(report: &BatchReport) -> String {
    let mut line = report.to_string();
    if let Some(throughput) = report.throughput() {
        line.push_str(&format!(", {}/s", ByteSize::b(throughput as u64)));
    }
    line
}

pub fn print_summary(summary: &SweepSummary) {
    println!();
    print!("{} {} batches", "## DONE".bold(), summary.batches.bold());
    if summary.failures > 0 {
        print!(", {}", format!("{} FAILURES", summary.failures).bold().red());
    }
    println!();
}

pub fn print_presets() {
    for preset in Preset::ALL {
        println!("{}: {}", preset.name().bold().blue(), preset.plan());
    }
}
