use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use plume::error::Result;
use plume::{Build, Mode};

mod flags;
mod init;
mod report;

fn main() -> ExitCode {
    let flags = flags::Quill::from_env_or_exit();
    init_tracing(flags.verbose);

    let result = match flags.subcommand {
        flags::QuillCmd::Build(cmd) => build(cmd),
        flags::QuillCmd::Check(cmd) => check(project_root(cmd.project)),
        flags::QuillCmd::Init(cmd) => init::scaffold(&cmd.dir).map(|_| {
            report::initialized(&cmd.dir);
            true
        }),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            report::error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let fallback = if verbose { "plume=debug,quill=debug" } else { "off" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn project_root(project: Option<PathBuf>) -> PathBuf {
    project.unwrap_or_else(|| PathBuf::from("."))
}

fn build(cmd: flags::Build) -> Result<bool> {
    let mut build = Build::load(project_root(cmd.project))?;
    if let Some(output) = cmd.output {
        build = build.output(output);
    }

    if cmd.sequential {
        build = build.mode(Mode::Sequential);
    }

    let start = Instant::now();
    let report = build.run();
    report::build(&report, build.output_dir(), start.elapsed());
    Ok(report.is_success())
}

fn check(root: PathBuf) -> Result<bool> {
    let problems = Build::load(&root)?.check();
    report::check(&root, &problems);
    Ok(problems.is_empty())
}
