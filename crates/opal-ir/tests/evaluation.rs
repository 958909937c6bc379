//! Numeric evaluation of coefficients and operators.

use ndarray::Array2;
use num_complex::Complex64;
use opal_ir::{Bindings, Function, IrError, MathExpr, Operator, Pauli};
use proptest::prelude::*;

fn close(a: Complex64, b: Complex64) -> bool {
    (a - b).norm() <= 1e-9 * (1.0 + a.norm().max(b.norm()))
}

fn assert_matrix_eq(a: &Array2<Complex64>, b: &Array2<Complex64>) {
    assert_eq!(a.shape(), b.shape());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!(close(*x, *y), "{x} != {y}");
    }
}

fn identity(dim: usize) -> Array2<Complex64> {
    Array2::from_diag_elem(dim, Complex64::new(1.0, 0.0))
}

// ============================================================================
// Coefficients
// ============================================================================

proptest! {
    #[test]
    fn prop_overloads_match_complex_arithmetic(
        a in -10.0f64..10.0,
        b in -10.0f64..10.0,
        c in -10.0f64..10.0,
    ) {
        let bindings = Bindings::new()
            .with("a", a)
            .with("b", Complex64::new(b, c));
        let (za, zb) = (Complex64::new(a, 0.0), Complex64::new(b, c));

        let sum = MathExpr::var("a") + MathExpr::var("b");
        let product = MathExpr::var("a") * MathExpr::var("b") * MathExpr::imag();
        let difference = MathExpr::var("a") - -MathExpr::var("b");

        prop_assert!(close(sum.evaluate(&bindings).unwrap(), za + zb));
        prop_assert!(close(product.evaluate(&bindings).unwrap(), za * zb * Complex64::i()));
        prop_assert!(close(difference.evaluate(&bindings).unwrap(), za + zb));
    }

    #[test]
    fn prop_complex_cast_preserves_value(re in -5.0f64..5.0, im in -5.0f64..5.0) {
        let z = Complex64::new(re, im);
        let expr = MathExpr::from(z);
        prop_assert!(close(expr.evaluate(&Bindings::new()).unwrap(), z));
    }
}

#[test]
fn test_unbound_variable() {
    let err = MathExpr::var("g").evaluate(&Bindings::new()).unwrap_err();
    assert!(matches!(err, IrError::UnboundVariable(name) if name == "g"));
}

#[test]
fn test_division_by_zero() {
    let expr = MathExpr::num(1.0) / (MathExpr::var("x") - MathExpr::var("x"));
    let err = expr.evaluate(&Bindings::new().with("x", 2.0)).unwrap_err();
    assert!(matches!(err, IrError::DivisionByZero(_)));
}

#[test]
fn test_functions_evaluate() {
    let expr = MathExpr::func(Function::Cos, MathExpr::num(0.0))
        + MathExpr::func(Function::Exp, MathExpr::num(0.0));
    assert!(close(expr.evaluate(&Bindings::new()).unwrap(), Complex64::new(2.0, 0.0)));
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_pauli_squares_are_identity() {
    for p in [Pauli::I, Pauli::X, Pauli::Y, Pauli::Z] {
        let op = Operator::Pauli(p) * Operator::Pauli(p);
        let m = op.to_matrix(&Bindings::new(), 2).unwrap();
        assert_matrix_eq(&m, &identity(2));
    }
}

#[test]
fn test_xy_is_i_z() {
    let xy = (Operator::pauli_x() * Operator::pauli_y())
        .to_matrix(&Bindings::new(), 2)
        .unwrap();
    let iz = Operator::pauli_z()
        .scale(MathExpr::imag())
        .to_matrix(&Bindings::new(), 2)
        .unwrap();
    assert_matrix_eq(&xy, &iz);
}

#[test]
fn test_registers_precede_modes() {
    let bindings = Bindings::new();
    let register_first = Operator::pauli_x()
        .kron(Operator::creation())
        .to_matrix(&bindings, 3)
        .unwrap();
    let mode_first = Operator::creation()
        .kron(Operator::pauli_x())
        .to_matrix(&bindings, 3)
        .unwrap();
    assert_eq!(register_first.shape(), &[6, 6]);
    assert_matrix_eq(&register_first, &mode_first);
}

#[test]
fn test_commutator_below_cutoff() {
    let fock_dim = 5;
    let a = Operator::annihilation();
    let c = Operator::creation();
    let commutator = (a.clone() * c.clone() - c * a)
        .to_matrix(&Bindings::new(), fock_dim)
        .unwrap();
    // [a, a†] = 1 on every level except the truncated top one.
    for n in 0..fock_dim - 1 {
        assert!(close(commutator[[n, n]], Complex64::new(1.0, 0.0)));
    }
}

#[test]
fn test_symbolic_scale() {
    let op = Operator::pauli_z() * MathExpr::var("h");
    let m = op.to_matrix(&Bindings::new().with("h", 0.5), 2).unwrap();
    assert!(close(m[[0, 0]], Complex64::new(0.5, 0.0)));
    assert!(close(m[[1, 1]], Complex64::new(-0.5, 0.0)));
}

#[test]
fn test_mismatched_sum_rejected() {
    let op = Operator::pauli_x() + Operator::annihilation();
    let err = op.to_matrix(&Bindings::new(), 3).unwrap_err();
    assert!(matches!(err, IrError::DimensionMismatch { context: "Add", .. }));
}

#[test]
fn test_fock_dimension_too_small() {
    let err = Operator::creation().to_matrix(&Bindings::new(), 1).unwrap_err();
    assert!(matches!(err, IrError::InvalidFockDimension(1)));
}
