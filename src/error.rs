//! Error types for cvxcore.
//!
//! Every pass returns the first error it meets in its traversal order. Errors
//! raised while analyzing one fragment of a problem (the objective, a
//! constraint, a declaration) are wrapped in [`CvxError::InFragment`] so the
//! caller can point at the offending text.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Byte range inside a source fragment.
///
/// Nodes built programmatically (for instance by the canonicalizer) carry the
/// default, synthetic span `0..0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The part of a problem an error was raised in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Objective,
    Constraint { index: usize, name: Option<String> },
    Declaration(String),
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Objective => write!(f, "objective"),
            Fragment::Constraint { index, name: Some(name) } => {
                write!(f, "constraint {index} (`{name}`)")
            }
            Fragment::Constraint { index, name: None } => write!(f, "constraint {index}"),
            Fragment::Declaration(name) => write!(f, "declaration `{name}`"),
        }
    }
}

/// Error type for cvxcore operations.
#[derive(Debug, Error)]
pub enum CvxError {
    /// Input text contains a character that starts no token.
    #[error("Lex error at offset {offset}: unexpected character {found:?}")]
    Lex { offset: usize, found: char },

    /// Grammar violation.
    #[error("Parse error at {span}: {message}")]
    Parse { span: Span, message: String },

    /// Identifier with no matching declaration.
    #[error("Reference error at {span}: undeclared identifier `{name}`")]
    Reference { name: String, span: Span },

    /// Dimension mismatch or statically out-of-range index.
    #[error("Shape error at {span}: {message}")]
    Shape { span: Span, message: String },

    /// Problem is not DCP-compliant.
    #[error("Problem is not DCP: {message} (at {span})")]
    NotDcp { span: Span, message: String },

    /// A DCP-valid tree that no recipe can reduce. Always an internal defect.
    #[error("Canonicalization error: {0}")]
    Canonicalization(String),

    /// Invalid problem specification.
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Malformed problem document.
    #[error("Invalid problem document: {0}")]
    Document(#[from] serde_json::Error),

    /// An error tagged with the fragment it was raised in.
    #[error("in {fragment}: {source}")]
    InFragment {
        fragment: Fragment,
        #[source]
        source: Box<CvxError>,
    },
}

/// Coarse classification of a [`CvxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lex,
    Parse,
    Reference,
    Shape,
    Dcp,
    Canonicalization,
    InvalidProblem,
    Document,
}

impl CvxError {
    pub(crate) fn parse(span: Span, message: impl Into<String>) -> Self {
        CvxError::Parse {
            span,
            message: message.into(),
        }
    }

    pub(crate) fn shape(span: Span, message: impl Into<String>) -> Self {
        CvxError::Shape {
            span,
            message: message.into(),
        }
    }

    pub(crate) fn not_dcp(span: Span, message: impl Into<String>) -> Self {
        CvxError::NotDcp {
            span,
            message: message.into(),
        }
    }

    /// Tag this error with the fragment it came from.
    pub fn in_fragment(self, fragment: Fragment) -> Self {
        CvxError::InFragment {
            fragment,
            source: Box::new(self),
        }
    }

    /// Kind of the underlying error, looking through fragment tags.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CvxError::Lex { .. } => ErrorKind::Lex,
            CvxError::Parse { .. } => ErrorKind::Parse,
            CvxError::Reference { .. } => ErrorKind::Reference,
            CvxError::Shape { .. } => ErrorKind::Shape,
            CvxError::NotDcp { .. } => ErrorKind::Dcp,
            CvxError::Canonicalization(_) => ErrorKind::Canonicalization,
            CvxError::InvalidProblem(_) => ErrorKind::InvalidProblem,
            CvxError::Document(_) => ErrorKind::Document,
            CvxError::InFragment { source, .. } => source.kind(),
        }
    }

    /// Location inside the fragment, when the error has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CvxError::Lex { offset, found } => {
                Some(Span::new(*offset, *offset + found.len_utf8()))
            }
            CvxError::Parse { span, .. }
            | CvxError::Reference { span, .. }
            | CvxError::Shape { span, .. }
            | CvxError::NotDcp { span, .. } => Some(*span),
            CvxError::InFragment { source, .. } => source.span(),
            _ => None,
        }
    }

    /// Fragment the error was tagged with, if any.
    pub fn fragment(&self) -> Option<&Fragment> {
        match self {
            CvxError::InFragment { fragment, .. } => Some(fragment),
            _ => None,
        }
    }
}

/// Result type for cvxcore operations.
pub type Result<T> = std::result::Result<T, CvxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_sees_through_fragments() {
        let err = CvxError::parse(Span::new(2, 4), "unexpected `<=`")
            .in_fragment(Fragment::Constraint { index: 3, name: None });
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.span(), Some(Span::new(2, 4)));
        assert_eq!(
            err.fragment(),
            Some(&Fragment::Constraint { index: 3, name: None })
        );
    }

    #[test]
    fn test_display() {
        let err = CvxError::Reference {
            name: "y".into(),
            span: Span::new(0, 1),
        }
        .in_fragment(Fragment::Objective);
        assert_eq!(
            err.to_string(),
            "in objective: Reference error at 0..1: undeclared identifier `y`"
        );
    }

    #[test]
    fn test_span_join() {
        assert_eq!(Span::new(4, 6).join(Span::new(1, 3)), Span::new(1, 6));
        assert!(Span::default().is_synthetic());
    }
}
