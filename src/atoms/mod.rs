//! The closed set of atoms.
//!
//! Each [`Atom`] carries its [`AtomSpec`] as static data: curvature and sign
//! rules, arity, per-argument requirements, shape rule and canonicalization
//! recipe. Names resolve through one process-wide index that also holds the
//! alias table.

mod catalog;
pub mod spec;

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Serialize, Serializer};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

pub use spec::{
    ArgRequirement, ArgRole, ArgSpec, Arity, AtomSpec, CurvatureRule, Monotonicity, Recipe,
    ShapeRule, SignRule,
};

/// Atom identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Atom {
    // Affine
    Sum,
    Reshape,
    Transpose,
    Trace,
    Diag,
    Vstack,
    Hstack,
    // Convex
    #[strum(serialize = "norm1")]
    Norm1,
    #[strum(serialize = "norm2")]
    Norm2,
    NormInf,
    Abs,
    Pos,
    NegPart,
    Maximum,
    SumSquares,
    QuadForm,
    QuadOverLin,
    Exp,
    LambdaMax,
    // Concave
    Minimum,
    Log,
    Entropy,
    Sqrt,
    // Exponent-dependent
    Power,
}

impl Atom {
    /// Canonical name used in source text.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Static rule table entry.
    pub fn spec(self) -> &'static AtomSpec {
        match self {
            Atom::Sum => &catalog::SUM,
            Atom::Reshape => &catalog::RESHAPE,
            Atom::Transpose => &catalog::TRANSPOSE,
            Atom::Trace => &catalog::TRACE,
            Atom::Diag => &catalog::DIAG,
            Atom::Vstack => &catalog::VSTACK,
            Atom::Hstack => &catalog::HSTACK,
            Atom::Norm1 => &catalog::NORM1,
            Atom::Norm2 => &catalog::NORM2,
            Atom::NormInf => &catalog::NORM_INF,
            Atom::Abs => &catalog::ABS,
            Atom::Pos => &catalog::POS,
            Atom::NegPart => &catalog::NEG_PART,
            Atom::Maximum => &catalog::MAXIMUM,
            Atom::SumSquares => &catalog::SUM_SQUARES,
            Atom::QuadForm => &catalog::QUAD_FORM,
            Atom::QuadOverLin => &catalog::QUAD_OVER_LIN,
            Atom::Exp => &catalog::EXP,
            Atom::LambdaMax => &catalog::LAMBDA_MAX,
            Atom::Minimum => &catalog::MINIMUM,
            Atom::Log => &catalog::LOG,
            Atom::Entropy => &catalog::ENTROPY,
            Atom::Sqrt => &catalog::SQRT,
            Atom::Power => &catalog::POWER,
        }
    }

    /// Resolve a source name, canonical or alias.
    pub fn lookup(name: &str) -> Option<Resolved> {
        NAME_INDEX.get(name).copied()
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Alternative spelling of an atom name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alias {
    pub name: &'static str,
    pub atom: Atom,
    /// The spelling has more than one plausible meaning.
    pub ambiguous: bool,
}

/// Accepted aliases. `neg` resolves to `neg_part` but is flagged ambiguous,
/// since it also reads as plain negation.
pub static ALIASES: &[Alias] = &[
    Alias { name: "normInf", atom: Atom::NormInf, ambiguous: false },
    Alias { name: "negPart", atom: Atom::NegPart, ambiguous: false },
    Alias { name: "neg", atom: Atom::NegPart, ambiguous: true },
    Alias { name: "sumSquares", atom: Atom::SumSquares, ambiguous: false },
    Alias { name: "quadForm", atom: Atom::QuadForm, ambiguous: false },
    Alias { name: "quadOverLin", atom: Atom::QuadOverLin, ambiguous: false },
    Alias { name: "lambdaMax", atom: Atom::LambdaMax, ambiguous: false },
    Alias { name: "entr", atom: Atom::Entropy, ambiguous: false },
];

/// Result of a name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub atom: Atom,
    /// Set when the name was an alias.
    pub alias: Option<&'static Alias>,
}

static NAME_INDEX: LazyLock<HashMap<&'static str, Resolved>> = LazyLock::new(|| {
    let canonical = Atom::iter().map(|atom| (atom.name(), Resolved { atom, alias: None }));
    let aliases = ALIASES.iter().map(|alias| {
        (
            alias.name,
            Resolved {
                atom: alias.atom,
                alias: Some(alias),
            },
        )
    });
    canonical.chain(aliases).collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Atom::Norm1.name(), "norm1");
        assert_eq!(Atom::NormInf.name(), "norm_inf");
        assert_eq!(Atom::NegPart.name(), "neg_part");
        assert_eq!(Atom::SumSquares.name(), "sum_squares");
        assert_eq!(Atom::LambdaMax.name(), "lambda_max");
        assert_eq!(Atom::Vstack.name(), "vstack");
    }

    #[test]
    fn test_every_atom_has_a_matching_spec() {
        for atom in Atom::iter() {
            let spec = atom.spec();
            assert_eq!(spec.atom, atom);
            assert!(!spec.args.is_empty());
            assert!(spec.arity.min() >= 1);
            assert_eq!(Atom::lookup(atom.name()).map(|r| r.atom), Some(atom));
        }
    }

    #[test]
    fn test_aliases() {
        let resolved = Atom::lookup("normInf").unwrap();
        assert_eq!(resolved.atom, Atom::NormInf);
        assert!(resolved.alias.is_some());

        let neg = Atom::lookup("neg").unwrap();
        assert_eq!(neg.atom, Atom::NegPart);
        assert!(neg.alias.unwrap().ambiguous);

        assert!(Atom::lookup("frobenius").is_none());
    }

    #[test]
    fn test_aliases_do_not_shadow_canonical_names() {
        for alias in ALIASES {
            assert!(Atom::iter().all(|a| a.name() != alias.name));
        }
    }

    #[test]
    fn test_variadic_args_repeat() {
        let spec = Atom::Maximum.spec();
        assert_eq!(spec.arg(5), spec.arg(0));
        assert_eq!(Atom::Reshape.spec().literal_positions(3).collect::<Vec<_>>(), [1, 2]);
    }
}
