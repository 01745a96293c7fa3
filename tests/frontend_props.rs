//! Property-based tests for the lexer, parser and printer.
//!
//! - Arbitrary text never panics the frontend
//! - Printed expressions parse back to the same text
//! - Affine compositions of affine leaves analyze as affine

use proptest::prelude::*;

use cvxcore::analysis::{bind, infer_shapes};
use cvxcore::dcp::analyze_expr;
use cvxcore::frontend::{parse_constraint, parse_expression, tokenize};
use cvxcore::prelude::*;

// ============================================================================
// Generators
// ============================================================================

/// Source text of an affine expression over `x` (5,), `c` (5,) and `y` ().
fn arb_affine(depth: u32) -> BoxedStrategy<String> {
    let leaf = prop_oneof![
        Just("x".to_string()),
        Just("c".to_string()),
        Just("y".to_string()),
        (0u32..1000).prop_map(|n| n.to_string()),
    ];
    if depth == 0 {
        return leaf.boxed();
    }
    let inner = arb_affine(depth - 1);
    prop_oneof![
        3 => leaf,
        1 => (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}) + ({b})")),
        1 => (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}) - ({b})")),
        1 => (1u32..10, inner.clone()).prop_map(|(k, a)| format!("{k} * ({a})")),
        1 => inner.clone().prop_map(|a| format!("-({a})")),
        1 => inner.clone().prop_map(|a| format!("sum({a}) / 2")),
    ]
    .boxed()
}

fn declarations() -> DeclTable {
    let mut table = DeclTable::new();
    for decl in [
        Declaration::variable("x", 5),
        Declaration::parameter("c", 5),
        Declaration::variable("y", ()),
    ] {
        table.insert(decl).unwrap();
    }
    table
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn frontend_never_panics(source in "[ -~]{0,40}") {
        let _ = tokenize(&source);
        let _ = parse_expression(&source);
        let _ = parse_constraint(&source);
    }

    #[test]
    fn printed_expressions_reparse(source in arb_affine(3)) {
        let parsed = parse_expression(&source).unwrap();
        let printed = parsed.to_string();
        let reparsed = parse_expression(&printed).unwrap();
        prop_assert_eq!(reparsed.to_string(), printed);
    }

    #[test]
    fn affine_compositions_are_affine(source in arb_affine(3)) {
        let table = declarations();
        let expr = parse_expression(&source).unwrap();
        bind(&expr, &table).unwrap();
        infer_shapes(&expr, &table).unwrap();
        let (curvature, _) = analyze_expr(&expr, &table, &Settings::default()).unwrap();
        prop_assert!(curvature.is_affine(), "{} is {}", source, curvature);
    }

    #[test]
    fn affine_constraints_are_dcp(lhs in arb_affine(2), rhs in arb_affine(2)) {
        let problem = Problem::minimize("0")
            .declare_all(declarations().iter().cloned())
            .subject_to([format!("{lhs} == {rhs}"), format!("{lhs} <= {rhs}")])
            .build()
            .unwrap();
        prop_assert!(problem.is_dcp());
    }
}
