//! Integration tests for the canonicalization pipeline.
//!
//! Each test feeds an operator through the full compile graph and checks
//! the exact canonical tree, or the error the pipeline must raise.

use opal_compile::analysis::terms;
use opal_compile::flow::Traversal;
use opal_compile::passes::{GatherMathExpr, ScaleTerms, SortedOrder};
use opal_compile::{
    CanonicalFormError, Canonicalizer, CompileError, HilbertSpace, Key, Pass, TermIndex, Walk,
    canonicalize, hilbert_space_dims, term_index, term_indices, verify_canonical,
};
use opal_ir::{Bindings, MathExpr, Operator};

use num_complex::Complex64;

/// Helper: coefficient of a canonical single-term operator.
fn coefficient(op: &Operator) -> &MathExpr {
    match op {
        Operator::ScalarMul(_, coeff) => coeff,
        other => panic!("not a scaled term: {other}"),
    }
}

/// Helper: evaluate a coefficient with the given bindings.
fn eval(coeff: &MathExpr, bindings: &Bindings) -> Complex64 {
    coeff.evaluate(bindings).unwrap()
}

// ============================================================================
// Pauli algebra
// ============================================================================

#[test]
fn test_pauli_product_is_phase_times_pauli() {
    let xy = canonicalize(&(Operator::pauli_x() * Operator::pauli_y())).unwrap();
    assert_eq!(xy, Operator::pauli_z().scale(MathExpr::imag()));
}

#[test]
fn test_anticyclic_pauli_product() {
    // Y·X = -iZ
    let yx = canonicalize(&(Operator::pauli_y() * Operator::pauli_x())).unwrap();
    let Operator::ScalarMul(op, coeff) = &yx else {
        panic!("not a scaled term: {yx}");
    };
    assert_eq!(**op, Operator::pauli_z());
    assert_eq!(eval(coeff, &Bindings::new()), Complex64::new(0.0, -1.0));
}

#[test]
fn test_pauli_squares_to_identity() {
    for p in [Operator::pauli_x(), Operator::pauli_y(), Operator::pauli_z()] {
        let squared = canonicalize(&(p.clone() * p)).unwrap();
        assert_eq!(squared, Operator::pauli_i().scale(1.0));
    }
}

// ============================================================================
// Sums
// ============================================================================

#[test]
fn test_equal_terms_merge() {
    let sum = canonicalize(&(Operator::pauli_x() + Operator::pauli_x())).unwrap();
    assert_eq!(sum, Operator::pauli_x().scale(2.0));
}

#[test]
fn test_cancelling_terms_keep_zero_coefficient() {
    let diff = canonicalize(&(Operator::pauli_x() - Operator::pauli_x())).unwrap();
    assert_eq!(diff, Operator::pauli_x().scale(0.0));
}

#[test]
fn test_symbolic_coefficients_merge() {
    let op = Operator::pauli_z() * MathExpr::var("g") + Operator::pauli_z() * MathExpr::var("h");
    let merged = canonicalize(&op).unwrap();
    assert_eq!(terms(&merged).len(), 1);
    let bindings = Bindings::new().with("g", 1.0).with("h", 2.0);
    assert_eq!(eval(coefficient(&merged), &bindings), Complex64::new(3.0, 0.0));
}

#[test]
fn test_symbolic_sum_independent_of_term_order() {
    let (g, h) = (MathExpr::var("g"), MathExpr::var("h"));
    let x = Operator::pauli_x();
    let gh = canonicalize(&(x.clone() * g.clone() + x.clone() * h.clone())).unwrap();
    let hg = canonicalize(&(x.clone() * h.clone() + x * g.clone())).unwrap();
    assert_eq!(gh, hg);
    assert_eq!(gh, Operator::pauli_x().scale(g + h));
}

#[test]
fn test_like_symbolic_terms_collected() {
    let g = MathExpr::var("g");
    let op = Operator::pauli_x() * (MathExpr::num(2.0) * g.clone())
        + Operator::pauli_x() * (MathExpr::num(3.0) * g.clone());
    assert_eq!(
        canonicalize(&op).unwrap(),
        Operator::pauli_x().scale(MathExpr::num(5.0) * g)
    );
}

#[test]
fn test_long_sum_merges_into_one_term() {
    let sum = (1..20_000).fold(Operator::pauli_x().scale(1.0), |acc, _| {
        acc + Operator::pauli_x().scale(1.0)
    });
    assert_eq!(canonicalize(&sum).unwrap(), Operator::pauli_x().scale(20_000.0));
}

#[test]
fn test_kron_distributes_over_sum() {
    let op = Operator::pauli_x().kron(Operator::pauli_y() + Operator::pauli_z());
    let expected = Operator::pauli_x().kron(Operator::pauli_y()).scale(1.0)
        + Operator::pauli_x().kron(Operator::pauli_z()).scale(1.0);
    assert_eq!(canonicalize(&op).unwrap(), expected);
}

#[test]
fn test_terms_sorted_and_idempotent() {
    let op = Operator::pauli_x().kron(Operator::pauli_i()) * 2.0
        + Operator::pauli_i().kron(Operator::pauli_x()) * 3.0;
    let once = canonicalize(&op).unwrap();
    let expected = Operator::pauli_i().kron(Operator::pauli_x()).scale(3.0)
        + Operator::pauli_x().kron(Operator::pauli_i()).scale(2.0);
    assert_eq!(once, expected);
    assert_eq!(canonicalize(&once).unwrap(), once);
    assert_eq!(
        term_indices(&once).unwrap(),
        vec![
            TermIndex(vec![Key::Pauli(0), Key::Pauli(1)]),
            TermIndex(vec![Key::Pauli(1), Key::Pauli(0)]),
        ]
    );
}

// ============================================================================
// Ladder operators
// ============================================================================

#[test]
fn test_commutator_expansion() {
    let ac = canonicalize(&(Operator::annihilation() * Operator::creation())).unwrap();
    let rewritten =
        canonicalize(&(Operator::creation() * Operator::annihilation() + Operator::identity()))
            .unwrap();
    assert_eq!(ac, rewritten);
    // The identity key (0, 0) sorts before the a†a key (2, 1).
    assert_eq!(
        ac,
        Operator::identity().scale(1.0)
            + (Operator::creation() * Operator::annihilation()).scale(1.0)
    );
}

#[test]
fn test_normal_order_inside_tensor_product() {
    let op = Operator::pauli_z().kron(Operator::annihilation() * Operator::creation());
    let expected = Operator::pauli_z().kron(Operator::identity()).scale(1.0)
        + Operator::pauli_z()
            .kron(Operator::creation() * Operator::annihilation())
            .scale(1.0);
    assert_eq!(canonicalize(&op).unwrap(), expected);
}

#[test]
fn test_identity_pruned_from_products() {
    let op = Operator::creation() * Operator::identity() * Operator::annihilation();
    assert_eq!(
        canonicalize(&op).unwrap(),
        (Operator::creation() * Operator::annihilation()).scale(1.0)
    );
}

#[test]
fn test_pauli_slots_gathered_first() {
    let op = Operator::creation().kron(Operator::pauli_x());
    assert_eq!(
        canonicalize(&op).unwrap(),
        Operator::pauli_x().kron(Operator::creation()).scale(1.0)
    );
}

// ============================================================================
// Dimension checks
// ============================================================================

#[test]
fn test_register_mode_mismatch_rejected() {
    for mode in [Operator::creation(), Operator::annihilation()] {
        let err = canonicalize(&(Operator::pauli_x() + mode)).unwrap_err();
        assert!(
            matches!(err, CompileError::HilbertSpaceMismatch { .. }),
            "unexpected error {err}"
        );
    }
}

#[test]
fn test_consistent_two_register_sum_accepted() {
    let op = Operator::pauli_x().kron(Operator::pauli_i())
        + Operator::pauli_y().kron(Operator::pauli_z());
    let canonical = canonicalize(&op).unwrap();
    assert_eq!(hilbert_space_dims(&canonical).unwrap(), HilbertSpace::new(2, 0));
    verify_canonical(&canonical).unwrap();
}

#[test]
fn test_unchecked_input_fails_verification() {
    let canonicalizer = Canonicalizer::builder().verify_input(false).build().unwrap();
    let err = canonicalizer
        .canonicalize(&(Operator::pauli_x() + Operator::creation()))
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::CanonicalForm(CanonicalFormError::InconsistentTermShape { .. })
    ));
}

// ============================================================================
// Scalar gathering interleaved with term ordering
// ============================================================================

#[test]
fn test_nested_scalars_gathered_before_sorting() {
    // (2X) ⊗ (3Y) must become a single term with coefficient 6.
    let op = (Operator::pauli_x() * 2.0).kron(Operator::pauli_y() * 3.0);
    let canonical = canonicalize(&op).unwrap();
    assert_eq!(canonical, Operator::pauli_x().kron(Operator::pauli_y()).scale(6.0));
}

#[test]
fn test_phase_from_algebra_gathered_into_coefficient() {
    // X·(2Y) = 2iZ
    let op = Operator::pauli_x() * (Operator::pauli_y() * 2.0);
    let canonical = canonicalize(&op).unwrap();
    let Operator::ScalarMul(inner, coeff) = &canonical else {
        panic!("not a scaled term: {canonical}");
    };
    assert_eq!(**inner, Operator::pauli_z());
    assert_eq!(eval(coeff, &Bindings::new()), Complex64::new(0.0, 2.0));
}

#[test]
fn test_sorting_requires_gathered_scalars() {
    // An ungathered scalar survives ScaleTerms and SortedOrder as a nested scalar.
    let nested = Operator::pauli_z().kron(Operator::pauli_x() * 2.0)
        + Operator::pauli_x().kron(Operator::pauli_x());
    let scaled = ScaleTerms.run(&nested).unwrap();
    assert!(verify_canonical(&SortedOrder.run(&scaled).unwrap()).is_err());

    let gathered = Walk::post(GatherMathExpr).run(&nested).unwrap();
    let sorted = SortedOrder.run(&ScaleTerms.run(&gathered).unwrap()).unwrap();
    assert_eq!(
        sorted,
        Operator::pauli_x().kron(Operator::pauli_x()).scale(1.0)
            + Operator::pauli_z().kron(Operator::pauli_x()).scale(2.0)
    );
    assert_eq!(
        term_index(terms(&sorted)[0]).unwrap(),
        TermIndex(vec![Key::Pauli(1), Key::Pauli(1)])
    );
}

// ============================================================================
// Bounds and traces
// ============================================================================

#[test]
fn test_step_bound_is_fatal() {
    let canonicalizer = Canonicalizer::builder().with_max_steps(2).build().unwrap();
    let err = canonicalizer
        .canonicalize(&(Operator::pauli_x() * Operator::pauli_y()))
        .unwrap_err();
    assert!(matches!(err, CompileError::NonTermination { limit: 2, .. }));
}

/// Helper: most steps taken by any single graph of a run.
fn longest_run(traversal: &Traversal<Operator>) -> usize {
    traversal
        .sites
        .iter()
        .filter_map(|site| site.sub.as_ref().map(longest_run))
        .fold(traversal.sites.len(), usize::max)
}

#[test]
fn test_reversed_sum_sorts_within_step_bound() {
    // Every three-register Pauli string, largest key first.
    let paulis = [
        Operator::pauli_z(),
        Operator::pauli_y(),
        Operator::pauli_x(),
        Operator::pauli_i(),
    ];
    let string = |i: usize| {
        paulis[i / 16]
            .clone()
            .kron(paulis[(i / 4) % 4].clone())
            .kron(paulis[i % 4].clone())
            .scale(MathExpr::var(format!("c{i}")))
    };
    let reversed = (1..64).fold(string(0), |acc, i| acc + string(i));

    let short = Canonicalizer::new()
        .unwrap()
        .canonicalize_traced(&(string(0) + string(1)))
        .unwrap();
    let bound = longest_run(&short.traversal);
    assert!(bound < 64);

    let canonicalizer = Canonicalizer::builder().with_max_steps(bound).build().unwrap();
    let sorted = canonicalizer.canonicalize(&reversed).unwrap();
    let keys = term_indices(&sorted).unwrap();
    assert_eq!(keys.len(), 64);
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_traversal_serializes() {
    let canonicalizer = Canonicalizer::new().unwrap();
    let result = canonicalizer
        .canonicalize_traced(&(Operator::pauli_x() + Operator::pauli_x()))
        .unwrap();
    assert_eq!(result.model, Operator::pauli_x().scale(2.0));

    let json = serde_json::to_value(&result.traversal).unwrap();
    assert_eq!(json["graph"], "compile");
    let sites = json["sites"].as_array().unwrap();
    assert_eq!(sites[1]["node"], "verify_canonical_form");
    assert!(sites[1]["emission"]["error"].as_str().unwrap().contains("no explicit coefficient"));
    assert_eq!(sites[2]["sub"]["graph"], "canonicalize");
}
