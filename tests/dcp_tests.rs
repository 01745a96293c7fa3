//! DCP analysis tests over parsed expressions.
//!
//! Pattern inspired by CVXPY's test_constant_atoms.py:
//! Define test cases as data, then run them programmatically.

use cvxcore::analysis::{bind, infer_shapes};
use cvxcore::dcp::analyze_expr;
use cvxcore::frontend::parse_expression;
use cvxcore::prelude::*;

/// A valid expression and its expected curvature and sign.
struct TestCase {
    name: &'static str,
    source: &'static str,
    curvature: Curvature,
    sign: Sign,
}

/// An expression the analyzer must reject, with a fragment of the message.
struct RejectCase {
    name: &'static str,
    source: &'static str,
    message: &'static str,
}

fn declarations() -> DeclTable {
    let mut table = DeclTable::new();
    for decl in [
        Declaration::variable("x", 5),
        Declaration::variable("y", ()),
        Declaration::variable("z", ()).nonneg(),
        Declaration::variable("X", (3, 3)),
        Declaration::parameter("gamma", ()),
        Declaration::parameter("c", 5),
        Declaration::parameter("P", (5, 5)).psd(),
        Declaration::parameter("N", (5, 5)).nsd(),
        Declaration::constant_value("half", 0.5),
    ] {
        table.insert(decl).unwrap();
    }
    table
}

fn analyze(source: &str, settings: &Settings) -> Result<(Curvature, Sign)> {
    let table = declarations();
    let expr = parse_expression(source)?;
    bind(&expr, &table)?;
    infer_shapes(&expr, &table)?;
    analyze_expr(&expr, &table, settings)
}

fn valid_cases() -> Vec<TestCase> {
    vec![
        // ========== Affine ==========
        TestCase {
            name: "literal",
            source: "3",
            curvature: Curvature::Constant,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "scaled_nonneg_variable",
            source: "-2 * z",
            curvature: Curvature::Affine,
            sign: Sign::Nonpositive,
        },
        TestCase {
            name: "negated_nonneg_variable",
            source: "-z",
            curvature: Curvature::Affine,
            sign: Sign::Nonpositive,
        },
        TestCase {
            name: "sum_divided",
            source: "sum(x) / 4",
            curvature: Curvature::Affine,
            sign: Sign::Unknown,
        },
        TestCase {
            name: "inner_product",
            source: "c @ x + y",
            curvature: Curvature::Affine,
            sign: Sign::Unknown,
        },
        // ========== Convex ==========
        TestCase {
            name: "norm2",
            source: "norm2(x)",
            curvature: Curvature::Convex,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "least_squares_plus_norm",
            source: "sum_squares(x - c) + 2 * norm_inf(x)",
            curvature: Curvature::Convex,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "quad_form_psd",
            source: "quad_form(x, P)",
            curvature: Curvature::Convex,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "square",
            source: "sum(x ** 2)",
            curvature: Curvature::Convex,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "parameter_weight",
            source: "gamma * sum_squares(x)",
            curvature: Curvature::Convex,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "squared_norm",
            source: "norm2(x) ** 2",
            curvature: Curvature::Convex,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "exp_of_norm",
            source: "exp(norm2(x))",
            curvature: Curvature::Convex,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "spectral",
            source: "lambda_max(X)",
            curvature: Curvature::Convex,
            sign: Sign::Unknown,
        },
        // ========== Concave ==========
        TestCase {
            name: "negated_norm1",
            source: "-norm1(x)",
            curvature: Curvature::Concave,
            sign: Sign::Nonpositive,
        },
        TestCase {
            name: "sqrt_nonneg",
            source: "sqrt(z)",
            curvature: Curvature::Concave,
            sign: Sign::Nonnegative,
        },
        TestCase {
            name: "quad_form_nsd",
            source: "quad_form(x, N)",
            curvature: Curvature::Concave,
            sign: Sign::Nonpositive,
        },
        TestCase {
            name: "log_minus_affine",
            source: "log(z) - y",
            curvature: Curvature::Concave,
            sign: Sign::Unknown,
        },
        TestCase {
            name: "negated_parameter_weight",
            source: "-gamma * sum_squares(x)",
            curvature: Curvature::Concave,
            sign: Sign::Nonpositive,
        },
        TestCase {
            name: "constant_weight",
            source: "half * sum(log(x))",
            curvature: Curvature::Concave,
            sign: Sign::Unknown,
        },
    ]
}

fn reject_cases() -> Vec<RejectCase> {
    vec![
        RejectCase {
            name: "norm_of_convex",
            source: "norm2(sum_squares(x))",
            message: "`norm2`",
        },
        RejectCase {
            name: "product_of_variables",
            source: "y * z",
            message: "product of two non-constant expressions",
        },
        RejectCase {
            name: "variable_denominator",
            source: "1 / y",
            message: "must be constant data",
        },
        RejectCase {
            name: "log_of_convex",
            source: "log(norm2(x))",
            message: "`log`",
        },
        RejectCase {
            name: "literal_difference_weight",
            source: "(1 - 2) * norm2(x)",
            message: "sign of the multiplier",
        },
        RejectCase {
            name: "square_of_unsigned_concave",
            source: "log(y) ** 2",
            message: "requires an affine base",
        },
        RejectCase {
            name: "unsupported_exponent",
            source: "y ** 3",
            message: "exponent",
        },
    ]
}

#[test]
fn test_valid_expressions() {
    let settings = Settings::default();
    for case in valid_cases() {
        let result = analyze(case.source, &settings);
        assert!(result.is_ok(), "{}: {:?}", case.name, result.err());
        let (curvature, sign) = result.unwrap();
        assert_eq!(curvature, case.curvature, "{}: curvature", case.name);
        assert_eq!(sign, case.sign, "{}: sign", case.name);
    }
}

#[test]
fn test_rejected_expressions() {
    let settings = Settings::default();
    for case in reject_cases() {
        let err = analyze(case.source, &settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dcp, "{}: {err}", case.name);
        assert!(
            err.to_string().contains(case.message),
            "{}: `{err}` should mention {}",
            case.name,
            case.message
        );
    }
}

#[test]
fn test_unsigned_parameter_weight_needs_assumption() {
    let settings = Settings {
        assume_nonneg_scalar_parameters: false,
        ..Settings::default()
    };
    let err = analyze("gamma * sum_squares(x)", &settings).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dcp);
    assert!(analyze("gamma * x", &settings).is_ok());
}

#[test]
fn test_annotations_are_cached_on_nodes() {
    let table = declarations();
    let expr = parse_expression("norm2(x - c)").unwrap();
    assert!(expr.curvature().is_none());
    bind(&expr, &table).unwrap();
    infer_shapes(&expr, &table).unwrap();
    analyze_expr(&expr, &table, &Settings::default()).unwrap();
    assert_eq!(expr.shape(), Some(&Shape::scalar()));
    assert_eq!(expr.curvature(), Some(Curvature::Convex));
    assert_eq!(expr.sign(), Some(Sign::Nonnegative));
}
