// ==============================================================================
// `tarn` — compile, solve, and optionally verify a program
// ==============================================================================
//
// Drives the pipeline over one or more source paths: parse, weed, resolve
// and type, simplify, then the solver, with the verifier in between when
// requested. Diagnostics go to stderr in declaration order; table contents
// go to stdout. Exit codes: 0 success, 1 front-end error, 2 verifier
// counter-example (or unknown under --strict-verify), 3 iteration cap
// exceeded. SIGINT keeps its default disposition, so an interrupt reports
// the usual 130.

mod render;
mod source;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser as ClapParser;
use colored::Colorize;

use lang_check::diagnostic::{check_diagnostics, weed_diagnostics, Diagnostic, Phase};
use render::render_diagnostics;
use solver::SolverOptions;
use source::SourceMap;
use verifier::{Outcome, Z3Backend};

#[derive(ClapParser, Debug)]
#[command(name = "tarn", version, about = "Datalog with lattices", long_about = None)]
struct Cli {
    /// Source paths to compile, in order.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Run the verifier before solving.
    #[arg(long)]
    verify: bool,

    /// Treat verifier counter-examples and unknowns as fatal.
    #[arg(long = "strict-verify")]
    strict_verify: bool,

    /// Report per-phase wall-clock timings.
    #[arg(long = "Xmonitor")]
    monitor: bool,

    /// Directory containing the SMT backend binary.
    #[arg(long = "library-path")]
    library_path: Option<PathBuf>,

    /// Maximum number of fixpoint rounds per stratum.
    #[arg(long = "iteration-cap")]
    iteration_cap: Option<usize>,

    /// Per-query verifier timeout in milliseconds.
    #[arg(long = "verify-timeout")]
    verify_timeout: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut monitor = Monitor::new(cli.monitor);

    // Parse.
    let sources = match SourceMap::load(&cli.paths) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            return ExitCode::from(1);
        }
    };
    let parse_tree = {
        let _t = monitor.phase("parse");
        match parser::parse(sources.text()) {
            Ok(root) => root,
            Err(e) => {
                let diag = Diagnostic {
                    phase: Phase::Parser,
                    message: e.message,
                    span: e.span,
                };
                render_diagnostics(&sources, &[diag]);
                return ExitCode::from(1);
            }
        }
    };

    // Weed.
    let module = {
        let _t = monitor.phase("weed");
        match lang_ast::weed(&parse_tree) {
            Ok(module) => module,
            Err(errors) => {
                render_diagnostics(&sources, &weed_diagnostics(&errors));
                return ExitCode::from(1);
            }
        }
    };

    // Resolve, type, simplify.
    let root = {
        let _t = monitor.phase("check");
        match lang_check::check(&module) {
            Ok(root) => root,
            Err(errors) => {
                render_diagnostics(&sources, &check_diagnostics(&errors));
                return ExitCode::from(1);
            }
        }
    };

    // Verify.
    if cli.verify {
        let _t = monitor.phase("verify");
        let backend_path = match locate_backend(cli.library_path.as_deref()) {
            Some(path) => path,
            None => {
                eprintln!(
                    "{} no SMT backend found; pass --library-path or set the \
                     platform library path environment variable",
                    "error:".red().bold()
                );
                return ExitCode::from(2);
            }
        };
        let timeout = cli.verify_timeout.map(Duration::from_millis);
        let mut backend = Z3Backend::new(backend_path, timeout);
        match verifier::verify(&root, &mut backend) {
            Ok(reports) => {
                let mut fatal = false;
                for report in &reports {
                    match &report.outcome {
                        Outcome::Proved => {
                            eprintln!(
                                "{} {} / {}",
                                "proved:".green(),
                                report.subject,
                                report.kind
                            );
                        }
                        Outcome::CounterExample(model) => {
                            fatal = true;
                            eprintln!(
                                "{} {} / {} has a counter-example:",
                                "violation:".red().bold(),
                                report.subject,
                                report.kind
                            );
                            for (ident, value) in &model.0 {
                                eprintln!("    {ident} = {value}");
                            }
                        }
                        Outcome::Inconclusive(reason) => {
                            if cli.strict_verify {
                                fatal = true;
                            }
                            eprintln!(
                                "{} {} / {}: {reason}",
                                "unknown:".yellow(),
                                report.subject,
                                report.kind
                            );
                        }
                    }
                }
                if fatal {
                    return ExitCode::from(2);
                }
            }
            Err(e) => {
                eprintln!("{} {e}", "error:".red().bold());
                return ExitCode::from(2);
            }
        }
    }

    // Solve.
    let opts = SolverOptions {
        iteration_cap: cli.iteration_cap.unwrap_or_else(|| {
            SolverOptions::default().iteration_cap
        }),
    };
    let fixpoint = {
        let _t = monitor.phase("solve");
        match solver::solve(&root, &opts) {
            Ok(fix) => fix,
            Err(solver::SolverError::NonTerminating {
                cap, last_delta, ..
            }) => {
                eprintln!(
                    "{} fixpoint did not stabilize within {cap} iterations",
                    "error:".red().bold()
                );
                for (table, rows) in &last_delta {
                    eprintln!("    last delta of {table}: {} rows", rows.len());
                }
                return ExitCode::from(3);
            }
            Err(e) => {
                eprintln!("{} {e}", "error:".red().bold());
                return ExitCode::from(1);
            }
        }
    };

    render::render_fixpoint(&fixpoint);
    monitor.report();
    ExitCode::SUCCESS
}

/// Find the SMT backend binary: the explicit flag first, then the platform
/// library-path environment variables.
fn locate_backend(flag: Option<&std::path::Path>) -> Option<PathBuf> {
    let candidates = |dir: &std::path::Path| {
        let exe = dir.join("z3");
        exe.is_file().then_some(exe)
    };
    if let Some(dir) = flag {
        return candidates(dir);
    }
    for var in ["JAVA_LIBRARY_PATH", "LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH"] {
        let Ok(paths) = std::env::var(var) else {
            continue;
        };
        for dir in std::env::split_paths(&paths) {
            if let Some(found) = candidates(&dir) {
                return Some(found);
            }
        }
    }
    None
}

/// Per-phase wall-clock accounting for --Xmonitor.
struct Monitor {
    enabled: bool,
    timings: Vec<(&'static str, Duration)>,
}

struct PhaseTimer<'a> {
    monitor: &'a mut Monitor,
    name: &'static str,
    start: Instant,
}

impl Monitor {
    fn new(enabled: bool) -> Self {
        Monitor {
            enabled,
            timings: Vec::new(),
        }
    }

    fn phase(&mut self, name: &'static str) -> Option<PhaseTimer<'_>> {
        self.enabled.then(|| PhaseTimer {
            start: Instant::now(),
            name,
            monitor: self,
        })
    }

    fn report(&self) {
        if !self.enabled {
            return;
        }
        eprintln!("phase timings:");
        for (name, duration) in &self.timings {
            eprintln!("    {name:<8} {duration:?}");
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.monitor.timings.push((self.name, elapsed));
    }
}
