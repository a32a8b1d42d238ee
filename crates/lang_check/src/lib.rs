// Resolver, typer, simplifier: everything between the weeded module and the
// frozen IR. `check` is the whole phase pipeline; the pieces stay public so
// the CLI can report phase timings and tests can poke at intermediates.

pub mod diagnostic;
pub mod infer;
pub mod ir;
mod lower;
pub mod resolve;
pub mod simplify;

#[cfg(test)]
mod tests;

use lang_ast::Module;
use thiserror::Error;

pub use infer::{TypeError, TypeInfo};
pub use resolve::{RefTarget, Resolution, ResolveError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Resolve, type, lower, and simplify a weeded module into the frozen IR.
/// Independent errors within a phase accumulate; a phase with errors stops
/// the pipeline.
pub fn check(module: &Module) -> Result<ir::Root, Vec<CheckError>> {
    let res = resolve::resolve(module)
        .map_err(|errs| errs.into_iter().map(CheckError::Resolve).collect::<Vec<_>>())?;
    let info = infer::infer(module, &res)?;
    let root = lower::lower(module, &res, &info);
    Ok(simplify::simplify(root))
}

/// Resolve only; exposed for phase timing and tests.
pub fn resolve_module(module: &Module) -> Result<Resolution, Vec<ResolveError>> {
    resolve::resolve(module)
}
