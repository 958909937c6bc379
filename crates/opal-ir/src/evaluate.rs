//! Numeric evaluation of coefficients and operators.
//!
//! Dense evaluation is meant for spot-checking rewrites on small systems,
//! not for simulation. Operators are represented on the space ordered as
//! (all qubit registers) ⊗ (all bosonic modes): a tensor product places the
//! registers of its left operand before those of its right operand, and
//! likewise for modes, regardless of how registers and modes interleave in
//! the expression. Bosonic modes are truncated to `fock_dim` levels.

use ndarray::{Array2, arr2};
use num_complex::Complex64;
use rustc_hash::FxHashMap;

use crate::error::{IrError, IrResult};
use crate::math::MathExpr;
use crate::operator::{Ladder, Operator, Pauli};

/// Largest dense matrix dimension [`Operator::to_matrix`] will build.
pub const MAX_DENSE_DIM: usize = 1024;

/// Values for the free variables of a coefficient expression.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: FxHashMap<String, Complex64>,
}

impl Bindings {
    /// Create an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, returning the updated bindings.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Complex64>) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind a variable in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Complex64>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a bound value.
    pub fn get(&self, name: &str) -> Option<Complex64> {
        self.values.get(name).copied()
    }
}

impl MathExpr {
    /// Evaluate to a complex number.
    pub fn evaluate(&self, bindings: &Bindings) -> IrResult<Complex64> {
        Ok(match self {
            MathExpr::Var(name) => bindings
                .get(name)
                .ok_or_else(|| IrError::UnboundVariable(name.clone()))?,
            MathExpr::Num(v) => Complex64::new(*v, 0.0),
            MathExpr::Imag => Complex64::i(),
            MathExpr::Func(func, arg) => func.apply(arg.evaluate(bindings)?),
            MathExpr::Add(a, b) => a.evaluate(bindings)? + b.evaluate(bindings)?,
            MathExpr::Sub(a, b) => a.evaluate(bindings)? - b.evaluate(bindings)?,
            MathExpr::Mul(a, b) => a.evaluate(bindings)? * b.evaluate(bindings)?,
            MathExpr::Div(a, b) => {
                let divisor = b.evaluate(bindings)?;
                if divisor.norm() == 0.0 {
                    return Err(IrError::DivisionByZero(self.to_string()));
                }
                a.evaluate(bindings)? / divisor
            }
            MathExpr::Pow(a, b) => {
                let base = a.evaluate(bindings)?;
                let exponent = b.evaluate(bindings)?;
                if exponent.im == 0.0 && exponent.re.fract() == 0.0 && exponent.re.abs() < 1e9 {
                    #[allow(clippy::cast_possible_truncation)]
                    base.powi(exponent.re as i32)
                } else {
                    base.powc(exponent)
                }
            }
        })
    }
}

impl Pauli {
    /// The 2x2 matrix of this Pauli generator.
    pub fn matrix(self) -> Array2<Complex64> {
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);
        let i = Complex64::i();
        match self {
            Pauli::I => arr2(&[[one, zero], [zero, one]]),
            Pauli::X => arr2(&[[zero, one], [one, zero]]),
            Pauli::Y => arr2(&[[zero, -i], [i, zero]]),
            Pauli::Z => arr2(&[[one, zero], [zero, -one]]),
        }
    }
}

impl Ladder {
    /// The matrix of this ladder generator truncated to `fock_dim` levels.
    pub fn matrix(self, fock_dim: usize) -> Array2<Complex64> {
        let mut m = Array2::<Complex64>::zeros((fock_dim, fock_dim));
        for n in 0..fock_dim {
            match self {
                Ladder::Identity => m[[n, n]] = Complex64::new(1.0, 0.0),
                Ladder::Creation if n + 1 < fock_dim => {
                    m[[n + 1, n]] = Complex64::new(((n + 1) as f64).sqrt(), 0.0);
                }
                Ladder::Annihilation if n + 1 < fock_dim => {
                    m[[n, n + 1]] = Complex64::new(((n + 1) as f64).sqrt(), 0.0);
                }
                _ => {}
            }
        }
        m
    }
}

/// A dense operator value together with the registers and modes it acts on.
struct Dense {
    qubits: usize,
    modes: usize,
    matrix: Array2<Complex64>,
}

impl Operator {
    /// Evaluate to a dense matrix on (qubit registers) ⊗ (modes).
    pub fn to_matrix(&self, bindings: &Bindings, fock_dim: usize) -> IrResult<Array2<Complex64>> {
        if fock_dim < 2 {
            return Err(IrError::InvalidFockDimension(fock_dim));
        }
        Ok(self.dense(bindings, fock_dim)?.matrix)
    }

    fn dense(&self, bindings: &Bindings, fock_dim: usize) -> IrResult<Dense> {
        match self {
            Operator::Pauli(p) => Ok(Dense {
                qubits: 1,
                modes: 0,
                matrix: p.matrix(),
            }),
            Operator::Ladder(l) => Ok(Dense {
                qubits: 0,
                modes: 1,
                matrix: l.matrix(fock_dim),
            }),
            Operator::ScalarMul(op, coeff) => {
                let value = coeff.evaluate(bindings)?;
                let mut inner = op.dense(bindings, fock_dim)?;
                inner.matrix.mapv_inplace(|z| z * value);
                Ok(inner)
            }
            Operator::Add(a, b) | Operator::Sub(a, b) | Operator::Mul(a, b) => {
                let a = a.dense(bindings, fock_dim)?;
                let b = b.dense(bindings, fock_dim)?;
                let context = match self {
                    Operator::Add(..) => "Add",
                    Operator::Sub(..) => "Sub",
                    _ => "Mul",
                };
                if (a.qubits, a.modes) != (b.qubits, b.modes) {
                    return Err(IrError::DimensionMismatch {
                        context,
                        left_qubits: a.qubits,
                        left_modes: a.modes,
                        right_qubits: b.qubits,
                        right_modes: b.modes,
                    });
                }
                let matrix = match self {
                    Operator::Add(..) => &a.matrix + &b.matrix,
                    Operator::Sub(..) => &a.matrix - &b.matrix,
                    _ => a.matrix.dot(&b.matrix),
                };
                Ok(Dense {
                    qubits: a.qubits,
                    modes: a.modes,
                    matrix,
                })
            }
            Operator::Kron(a, b) => {
                let a = a.dense(bindings, fock_dim)?;
                let b = b.dense(bindings, fock_dim)?;
                kron_ordered(&a, &b, fock_dim)
            }
        }
    }
}

/// Tensor product that keeps all qubit registers ahead of all modes.
fn kron_ordered(a: &Dense, b: &Dense, fock_dim: usize) -> IrResult<Dense> {
    let pow = |base: usize, exp: usize| -> IrResult<usize> {
        u32::try_from(exp)
            .ok()
            .and_then(|e| base.checked_pow(e))
            .ok_or(IrError::MatrixTooLarge(usize::MAX))
    };
    let (qa, ma) = (pow(2, a.qubits)?, pow(fock_dim, a.modes)?);
    let (qb, mb) = (pow(2, b.qubits)?, pow(fock_dim, b.modes)?);
    let dim = qa
        .checked_mul(ma)
        .and_then(|d| d.checked_mul(qb))
        .and_then(|d| d.checked_mul(mb))
        .ok_or(IrError::MatrixTooLarge(usize::MAX))?;
    if dim > MAX_DENSE_DIM {
        return Err(IrError::MatrixTooLarge(dim));
    }

    // Maps (row of A, row of B) to the row of the reordered product.
    let position = |ia: usize, ib: usize| {
        let (iaq, iam) = (ia / ma, ia % ma);
        let (ibq, ibm) = (ib / mb, ib % mb);
        (iaq * qb + ibq) * (ma * mb) + iam * mb + ibm
    };

    let mut matrix = Array2::<Complex64>::zeros((dim, dim));
    for ia in 0..qa * ma {
        for ib in 0..qb * mb {
            let row = position(ia, ib);
            for ja in 0..qa * ma {
                let left = a.matrix[[ia, ja]];
                if left.norm_sqr() == 0.0 {
                    continue;
                }
                for jb in 0..qb * mb {
                    matrix[[row, position(ja, jb)]] = left * b.matrix[[ib, jb]];
                }
            }
        }
    }

    Ok(Dense {
        qubits: a.qubits + b.qubits,
        modes: a.modes + b.modes,
        matrix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Array2<Complex64>, b: &Array2<Complex64>) -> bool {
        a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).norm() < 1e-9)
    }

    #[test]
    fn test_evaluate_symbolic() {
        let e = MathExpr::var("x") * MathExpr::Imag + MathExpr::num(1.0);
        let value = e.evaluate(&Bindings::new().with("x", 2.0)).unwrap();
        assert!((value - Complex64::new(1.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn test_evaluate_unbound() {
        let err = MathExpr::var("theta").evaluate(&Bindings::new()).unwrap_err();
        assert_eq!(err, IrError::UnboundVariable("theta".into()));
    }

    #[test]
    fn test_division_by_zero() {
        let e = MathExpr::num(1.0) / MathExpr::num(0.0);
        assert!(matches!(
            e.evaluate(&Bindings::new()),
            Err(IrError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_pauli_product() {
        let xy = (Operator::pauli_x() * Operator::pauli_y())
            .to_matrix(&Bindings::new(), 2)
            .unwrap();
        let iz = (Operator::pauli_z() * Complex64::i())
            .to_matrix(&Bindings::new(), 2)
            .unwrap();
        assert!(close(&xy, &iz));
    }

    #[test]
    fn test_kron_orders_registers_before_modes() {
        let b = Bindings::new();
        let left = Operator::creation()
            .kron(Operator::pauli_x())
            .to_matrix(&b, 3)
            .unwrap();
        let right = Operator::pauli_x()
            .kron(Operator::creation())
            .to_matrix(&b, 3)
            .unwrap();
        assert!(close(&left, &right));
    }

    #[test]
    fn test_mismatched_sum() {
        let op = Operator::pauli_x() + Operator::annihilation();
        assert!(matches!(
            op.to_matrix(&Bindings::new(), 2),
            Err(IrError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_fock_dim() {
        assert_eq!(
            Operator::creation()
                .to_matrix(&Bindings::new(), 1)
                .unwrap_err(),
            IrError::InvalidFockDimension(1)
        );
    }
}
