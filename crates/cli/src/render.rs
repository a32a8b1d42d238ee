// Diagnostic and result rendering. Errors go to stderr with the offending
// line; the final fixpoint prints per table on stdout, rows sorted, so runs
// are diffable.

use colored::Colorize;

use lang_check::diagnostic::Diagnostic;
use solver::Fixpoint;

use crate::source::{display_path, SourceMap};

pub fn render_diagnostics(sources: &SourceMap, diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        match sources.locate(diag.span) {
            Some(loc) => {
                eprintln!(
                    "{} {} {}",
                    "error:".red().bold(),
                    format!("[{}]", diag.phase).dimmed(),
                    diag.message
                );
                eprintln!(
                    "  {} {}:{}:{}",
                    "-->".blue(),
                    display_path(&loc.path),
                    loc.line,
                    loc.column
                );
                let snippet = sources.snippet(diag.span);
                if !snippet.trim().is_empty() {
                    eprintln!("   {}", snippet.dimmed());
                }
            }
            None => {
                eprintln!(
                    "{} {} {}",
                    "error:".red().bold(),
                    format!("[{}]", diag.phase).dimmed(),
                    diag.message
                );
            }
        }
    }
    let noun = if diagnostics.len() == 1 {
        "error"
    } else {
        "errors"
    };
    eprintln!("{} {noun}", diagnostics.len());
}

pub fn render_fixpoint(fixpoint: &Fixpoint) {
    for (name, rows) in &fixpoint.relations {
        println!("{name} ({} rows)", rows.len());
        for row in rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            println!("    ({})", cells.join(", "));
        }
    }
    for (name, rows) in &fixpoint.lattices {
        println!("{name} ({} keys)", rows.len());
        for (key, value) in rows {
            let cells: Vec<String> = key.iter().map(|v| v.to_string()).collect();
            println!("    ({}) -> {value}", cells.join(", "));
        }
    }
}
