//! Property-based tests for the canonical form.
//!
//! Random operators are built from well-shaped terms (every term acts on
//! the same registers and modes), combined by sums, differences and
//! products, and checked for idempotence, the structural invariants, and
//! numeric equality with their input.

use opal_compile::{canonicalize, hilbert_space_dims, term_indices};
use opal_ir::{Bindings, Ladder, Operator, Pauli};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

/// Fock cutoff used for dense spot checks.
const FOCK_DIM: usize = 8;

/// Highest level on which a product of up to four ladder factors is exact
/// in the truncated space.
const EXACT_LEVEL: usize = FOCK_DIM - 1 - 4;

fn arb_pauli() -> impl Strategy<Value = Operator> {
    prop_oneof![
        Just(Operator::pauli_i()),
        Just(Operator::pauli_x()),
        Just(Operator::pauli_y()),
        Just(Operator::pauli_z()),
    ]
}

fn arb_ladder() -> impl Strategy<Value = Operator> {
    prop_oneof![
        Just(Operator::creation()),
        Just(Operator::annihilation()),
        Just(Operator::identity()),
    ]
}

fn product(factors: Vec<Operator>) -> Operator {
    factors
        .into_iter()
        .reduce(|acc, f| acc * f)
        .unwrap_or_else(Operator::pauli_i)
}

/// A single term on `n_qreg` registers and `n_qmode` modes.
///
/// Mode slots may come first, leaving the slot order to the pipeline.
fn arb_term(n_qreg: usize, n_qmode: usize) -> impl Strategy<Value = Operator> {
    (
        prop::collection::vec(prop::collection::vec(arb_pauli(), 1..=2), n_qreg),
        prop::collection::vec(prop::collection::vec(arb_ladder(), 1..=2), n_qmode),
        -3_i32..=3,
        any::<bool>(),
    )
        .prop_map(|(registers, modes, coeff, modes_first)| {
            let registers = registers.into_iter().map(product);
            let modes = modes.into_iter().map(product);
            let slots: Vec<Operator> = if modes_first {
                modes.chain(registers).collect()
            } else {
                registers.chain(modes).collect()
            };
            let term = slots
                .into_iter()
                .reduce(Operator::kron)
                .unwrap_or_else(Operator::pauli_i);
            if coeff == 1 { term } else { term * f64::from(coeff) }
        })
}

/// A sum or difference of up to three terms of one shape.
fn arb_sum(n_qreg: usize, n_qmode: usize) -> impl Strategy<Value = Operator> {
    prop::collection::vec((arb_term(n_qreg, n_qmode), any::<bool>()), 1..=3).prop_map(|terms| {
        let mut terms = terms.into_iter();
        let (first, _) = terms.next().unwrap_or((Operator::pauli_i(), false));
        terms.fold(first, |acc, (term, subtract)| {
            if subtract { acc - term } else { acc + term }
        })
    })
}

/// A sum, or a product of two sums, on one to two registers and at most one mode.
fn arb_operator() -> impl Strategy<Value = Operator> {
    (1_usize..=2, 0_usize..=1).prop_flat_map(|(n_qreg, n_qmode)| {
        prop_oneof![
            arb_sum(n_qreg, n_qmode),
            (arb_sum(n_qreg, n_qmode), arb_sum(n_qreg, n_qmode)).prop_map(|(a, b)| a * b),
        ]
    })
}

/// Helper: visit every node of an operator tree.
fn for_each_node(op: &Operator, f: &mut impl FnMut(&Operator)) {
    f(op);
    match op {
        Operator::Add(a, b) | Operator::Sub(a, b) | Operator::Mul(a, b) | Operator::Kron(a, b) => {
            for_each_node(a, f);
            for_each_node(b, f);
        }
        Operator::ScalarMul(inner, _) => for_each_node(inner, f),
        Operator::Pauli(_) | Operator::Ladder(_) => {}
    }
}

/// Helper: the factor a product ends with.
fn last_factor(op: &Operator) -> &Operator {
    match op {
        Operator::Mul(_, last) => last,
        other => other,
    }
}

/// Helper: compare two operators on the exactly represented columns.
fn assert_same_action(a: &Operator, b: &Operator) -> Result<(), TestCaseError> {
    let has_mode = hilbert_space_dims(a).map_err(|e| TestCaseError::fail(e.to_string()))?.n_qmode > 0;
    let bindings = Bindings::new();
    let ma = a.to_matrix(&bindings, FOCK_DIM).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let mb = b.to_matrix(&bindings, FOCK_DIM).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(ma.shape(), mb.shape());
    let dim = ma.shape()[0];
    for col in 0..dim {
        if has_mode && col % FOCK_DIM > EXACT_LEVEL {
            continue;
        }
        for row in 0..dim {
            let diff = (ma[[row, col]] - mb[[row, col]]).norm();
            prop_assert!(diff < 1e-9, "entry ({}, {}) differs by {}", row, col, diff);
        }
    }
    Ok(())
}

#[test]
fn test_pauli_closure() {
    let paulis = [Pauli::I, Pauli::X, Pauli::Y, Pauli::Z];
    for p in paulis {
        for q in paulis {
            let canonical = canonicalize(&(Operator::Pauli(p) * Operator::Pauli(q))).unwrap();
            let Operator::ScalarMul(inner, _) = &canonical else {
                panic!("{p}·{q} gave unscaled {canonical}");
            };
            assert!(matches!(inner.as_ref(), Operator::Pauli(_)), "{p}·{q} gave {canonical}");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_idempotent(op in arb_operator()) {
        let once = canonicalize(&op).unwrap();
        let twice = canonicalize(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_no_pauli_pairs(op in arb_operator()) {
        let canonical = canonicalize(&op).unwrap();
        let mut pairs = 0;
        for_each_node(&canonical, &mut |node| {
            if let Operator::Mul(a, b) = node {
                if last_factor(a).is_pauli() && b.is_pauli() {
                    pairs += 1;
                }
            }
        });
        prop_assert_eq!(pairs, 0, "{}", canonical);
    }

    #[test]
    fn prop_normal_ordered(op in arb_operator()) {
        let canonical = canonicalize(&op).unwrap();
        let mut violations = 0;
        for_each_node(&canonical, &mut |node| {
            if let Operator::Mul(a, b) = node {
                let annihilation_first = matches!(last_factor(a), Operator::Ladder(Ladder::Annihilation));
                if annihilation_first && matches!(b.as_ref(), Operator::Ladder(Ladder::Creation)) {
                    violations += 1;
                }
            }
        });
        prop_assert_eq!(violations, 0, "{}", canonical);
    }

    #[test]
    fn prop_terms_strictly_sorted(op in arb_operator()) {
        let canonical = canonicalize(&op).unwrap();
        let keys = term_indices(&canonical).unwrap();
        for pair in keys.windows(2) {
            prop_assert!(pair[0] < pair[1], "{} !< {} in {}", pair[0], pair[1], canonical);
        }
    }

    #[test]
    fn prop_numerically_sound(op in arb_operator()) {
        let canonical = canonicalize(&op).unwrap();
        assert_same_action(&op, &canonical)?;
    }
}
