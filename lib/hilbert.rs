//! Plain-array descriptions of quantum states, and the vectorization
//! convention used by the superoperator machinery.
//!
//! Density matrices are flattened row-major, so a superoperator `S` built for
//! `vec(L ρ K) = S vec(ρ)` has elements `S[(i,q),(j,p)] = L[i,j] K[p,q]`.

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::error::FlimeError;

/// Compute the outer product `|a⟩⟨b|` of two state vectors.
pub fn outer_prod(a: &nd::Array1<C64>, b: &nd::Array1<C64>)
    -> nd::Array2<C64>
{
    let na = a.len();
    let nb = b.len();
    nd::Array2::from_shape_vec(
        (na, nb),
        a.iter().cartesian_product(b)
            .map(|(ai, bj)| *ai * bj.conj())
            .collect(),
    )
    .unwrap()
}

/// Compute the conjugate transpose of a matrix.
pub fn dagger(a: &nd::Array2<C64>) -> nd::Array2<C64> {
    a.t().mapv(|z| z.conj())
}

/// Compute the trace of a matrix.
pub fn trace(rho: &nd::Array2<C64>) -> C64 { rho.diag().sum() }

/// Compute the purity `Tr[ρ²]` of a density matrix.
pub fn purity(rho: &nd::Array2<C64>) -> f64 { rho.dot(rho).diag().sum().re }

/// Compute the expectation value `Tr[O ρ]` of an observable in a state.
pub fn expect_val(op: &nd::Array2<C64>, rho: &nd::Array2<C64>) -> C64 {
    op.dot(rho).diag().sum()
}

/// Rescale a density matrix to unit trace, passing it through unchanged if
/// its trace is too close to zero to divide by.
pub fn normalized(rho: &nd::Array2<C64>) -> nd::Array2<C64> {
    let tr = trace(rho);
    if tr.norm() < f64::EPSILON {
        rho.clone()
    } else {
        rho.mapv(|a| a / tr)
    }
}

/// Flatten a density matrix into a vector, row-major.
pub fn vectorize(rho: &nd::Array2<C64>) -> nd::Array1<C64> {
    nd::Array1::from_iter(rho.iter().copied())
}

/// Reshape a vectorized density matrix back into a `dim`x`dim` matrix.
pub fn unvectorize(v: &nd::Array1<C64>, dim: usize) -> nd::Array2<C64> {
    v.to_owned().into_shape((dim, dim))
        .expect("unvectorize: length does not match dimension")
}

/// Initial-state description accepted by the solver.
#[derive(Clone, Debug, PartialEq)]
pub enum InitialState {
    /// A pure state as a ket vector; promoted to its outer product.
    Ket(nd::Array1<C64>),
    /// A pre-constructed density matrix.
    Density(nd::Array2<C64>),
}

impl From<nd::Array1<C64>> for InitialState {
    fn from(psi: nd::Array1<C64>) -> Self { Self::Ket(psi) }
}

impl From<nd::Array2<C64>> for InitialState {
    fn from(rho: nd::Array2<C64>) -> Self { Self::Density(rho) }
}

impl InitialState {
    /// Convert to a density matrix for a system of dimension `dim`.
    ///
    /// Fails if the underlying array does not match the system dimension.
    pub fn into_density(self, dim: usize)
        -> Result<nd::Array2<C64>, FlimeError>
    {
        match self {
            Self::Ket(psi) if psi.len() == dim => Ok(outer_prod(&psi, &psi)),
            Self::Density(rho) if rho.shape() == [dim, dim] => Ok(rho),
            _ => Err(FlimeError::BadState { dim }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn zc(re: f64, im: f64) -> C64 { C64::new(re, im) }

    #[test]
    fn outer_prod_projector() {
        let up: nd::Array1<C64> = nd::array![1.0.into(), 0.0.into()];
        let proj = outer_prod(&up, &up);
        assert_eq!(proj, nd::array![
            [1.0.into(), 0.0.into()],
            [0.0.into(), 0.0.into()],
        ]);
    }

    #[test]
    fn vectorize_roundtrip() {
        let rho: nd::Array2<C64> = nd::array![
            [zc(0.5,  0.0), zc(0.1,  0.2)],
            [zc(0.1, -0.2), zc(0.5,  0.0)],
        ];
        let v = vectorize(&rho);
        assert_eq!(v[1], zc(0.1, 0.2));
        assert_eq!(unvectorize(&v, 2), rho);
    }

    #[test]
    fn expectation_and_purity() {
        let mixed: nd::Array2<C64> = nd::array![
            [0.5.into(), 0.0.into()],
            [0.0.into(), 0.5.into()],
        ];
        let sz: nd::Array2<C64> = nd::array![
            [1.0.into(), 0.0.into()],
            [0.0.into(), zc(-1.0, 0.0)],
        ];
        assert_abs_diff_eq!(expect_val(&sz, &mixed).re, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(purity(&mixed), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(trace(&mixed).re, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn initial_state_conversion() {
        let psi: nd::Array1<C64> = nd::array![0.0.into(), 1.0.into()];
        let rho = InitialState::from(psi).into_density(2).unwrap();
        assert_abs_diff_eq!(rho[[1, 1]].re, 1.0, epsilon = 1e-15);
        assert!(InitialState::Ket(nd::Array1::zeros(3)).into_density(2).is_err());
        assert!(
            InitialState::Density(nd::Array2::zeros((3, 3)))
                .into_density(2)
                .is_err()
        );
    }
}
