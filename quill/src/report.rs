use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use plume::error::Error;
use plume::BuildReport;

pub fn error(error: &Error) {
    eprintln!("{} {}", "error:".red().bold(), error.line());
}

fn failure(unit: &str, error: &Error) {
    eprintln!("{} {} {}", "failed:".red().bold(), unit.bold(), error.line());
}

pub fn build(report: &BuildReport, output: &Path, elapsed: Duration) {
    for (unit, error) in report.failures() {
        failure(unit, error);
    }

    if let Some(fatal) = report.fatal() {
        eprintln!("{} {}", "aborted:".red().bold(), fatal.line());
    }

    let written = report.written().len();
    let ms = elapsed.as_millis();
    if report.is_success() {
        println!("{} {written} files into {} in {ms}ms", "built".green().bold(), output.display());
    } else {
        let failed = report.failures().count();
        eprintln!("{} {written} files written, {failed} failed ({:?}) in {ms}ms",
            "incomplete".yellow().bold(), report.phase());
    }
}

pub fn check(root: &Path, problems: &[Error]) {
    for problem in problems {
        error(problem);
    }

    match problems.len() {
        0 => println!("{} {}", "ok".green().bold(), root.display()),
        n => eprintln!("{} {n} problem(s) in {}", "check failed:".red().bold(), root.display()),
    }
}

pub fn initialized(dir: &Path) {
    println!("{} {}", "created".green().bold(), dir.display());
    println!("  run `quill build {}` to render it", dir.display());
}
