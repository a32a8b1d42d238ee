// ==============================================================================
// Display-Ready Diagnostics
// ==============================================================================
//
// The phase errors are small typed enums; this module flattens them into a
// uniform, renderable shape (phase, message, span) and provides the
// name-suggestion helper used for NameNotFound.

use std::fmt;

use lang_ast::{Span, WeedError};
use smol_str::SmolStr;

use crate::infer::TypeError;
use crate::resolve::ResolveError;
use crate::CheckError;

/// One renderable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parser,
    Weeder,
    Resolver,
    Typer,
    Solver,
    Verifier,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Parser => "parse",
            Phase::Weeder => "weed",
            Phase::Resolver => "resolve",
            Phase::Typer => "type",
            Phase::Solver => "solve",
            Phase::Verifier => "verify",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.phase, self.message)
    }
}

pub fn weed_diagnostics(errors: &[WeedError]) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|e| Diagnostic {
            phase: Phase::Weeder,
            message: e.to_string(),
            span: weed_error_span(e),
        })
        .collect()
}

pub fn check_diagnostics(errors: &[CheckError]) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|e| match e {
            CheckError::Resolve(r) => Diagnostic {
                phase: Phase::Resolver,
                message: r.to_string(),
                span: r.span(),
            },
            CheckError::Type(t) => Diagnostic {
                phase: Phase::Typer,
                message: t.to_string(),
                span: t.span(),
            },
        })
        .collect()
}

fn weed_error_span(e: &WeedError) -> Span {
    match e {
        WeedError::DuplicateAnnotation { loc2, .. }
        | WeedError::DuplicateAttribute { loc2, .. }
        | WeedError::DuplicateFormal { loc2, .. }
        | WeedError::DuplicateTag { loc2, .. }
        | WeedError::DuplicateAlias { loc2, .. }
        | WeedError::NonLinearPattern { loc2, .. } => *loc2,
        WeedError::EmptyRelation { loc, .. }
        | WeedError::EmptyLattice { loc, .. }
        | WeedError::EmptyIndex { loc, .. }
        | WeedError::IllegalIndex { loc }
        | WeedError::IllegalParameterList { loc }
        | WeedError::IllegalLattice { loc }
        | WeedError::IllegalAnnotation { loc, .. }
        | WeedError::IllegalExistential { loc }
        | WeedError::IllegalUniversal { loc }
        | WeedError::IllegalWildcard { loc }
        | WeedError::IllegalHeadPredicate { loc }
        | WeedError::IllegalHeadTerm { loc }
        | WeedError::IllegalBodyTerm { loc }
        | WeedError::IllegalFloat { loc, .. }
        | WeedError::IllegalInt { loc, .. }
        | WeedError::Unsupported { loc, .. } => *loc,
    }
}

// ==============================================================================
// Edit Distance (Levenshtein)
// ==============================================================================

/// Standard Levenshtein edit distance between two strings.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row = vec![0; b_len + 1];

    for (i, a_char) in a.chars().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b.chars().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            curr_row[j + 1] = (prev_row[j] + cost)
                .min(prev_row[j + 1] + 1)
                .min(curr_row[j] + 1);
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

/// Best near-miss among `candidates`, within a threshold of roughly half
/// the needle's length, capped at 3. Exact matches are not suggestions.
pub fn suggest_similar<'a>(
    needle: &str,
    candidates: impl IntoIterator<Item = &'a SmolStr>,
) -> Option<SmolStr> {
    let max_dist = needle.len().div_ceil(2).clamp(1, 3);

    let mut best: Option<(SmolStr, usize)> = None;
    for candidate in candidates {
        let dist = edit_distance(needle, candidate);
        if dist == 0 || dist > max_dist {
            continue;
        }
        if best.as_ref().is_none_or(|(_, d)| dist < *d) {
            best = Some((candidate.clone(), dist));
        }
    }
    best.map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("foo", "foo"), 0);
        assert_eq!(edit_distance("foo", "fop"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn suggest_similar_finds_close_match() {
        let candidates: Vec<SmolStr> = vec!["leq".into(), "lub".into(), "glb".into()];
        assert_eq!(
            suggest_similar("lep", candidates.iter()),
            Some(SmolStr::from("leq"))
        );
    }

    #[test]
    fn suggest_similar_rejects_distant_and_exact() {
        let candidates: Vec<SmolStr> = vec!["leq".into()];
        assert_eq!(suggest_similar("zzzzzz", candidates.iter()), None);
        assert_eq!(suggest_similar("leq", candidates.iter()), None);
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Typer.to_string(), "type");
        assert_eq!(Phase::Weeder.to_string(), "weed");
    }
}
