//! Assembly of the dissipative generator from a harmonic rate tensor.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::rate::RateTensor;

/// The dissipative generator `R(t) = Σ R_n e^{+i n ω t}` over vectorized
/// Floquet-frame density matrices, holding the static sector apart from the
/// oscillating harmonics.
///
/// An empty rate tensor assembles into the zero generator, under which
/// Floquet-frame states are constant in time.
#[derive(Clone, Debug)]
pub struct RateGenerator {
    dim: usize,
    omega: f64,
    static_term: nd::Array2<C64>,
    harmonics: Vec<(f64, nd::Array2<C64>)>,
}

impl RateGenerator {
    /// Assemble the generator from a rate tensor.
    pub fn new(tensor: &RateTensor) -> Self {
        let dim = tensor.dim();
        let hs2 = dim * dim;
        let mut static_term: nd::Array2<C64> = nd::Array2::zeros((hs2, hs2));
        let mut harmonics: Vec<(f64, nd::Array2<C64>)> = Vec::new();
        for (key, r) in tensor.iter() {
            if key.is_static() {
                static_term.assign(r);
            } else {
                harmonics.push((key.shift(), r.clone()));
            }
        }
        Self { dim, omega: tensor.omega(), static_term, harmonics }
    }

    /// Hilbert-space dimension; the generator acts on length-`dim²` vectors.
    pub fn dim(&self) -> usize { self.dim }

    /// Drive angular frequency the harmonic shifts are relative to.
    pub fn omega(&self) -> f64 { self.omega }

    /// `true` if no oscillating harmonics were retained, leaving `R(t)`
    /// constant in time.
    pub fn is_static(&self) -> bool { self.harmonics.is_empty() }

    /// The static sector `R_0`.
    pub fn static_part(&self) -> &nd::Array2<C64> { &self.static_term }

    /// Materialize the full generator matrix at time `t`.
    pub fn eval_at(&self, t: f64) -> nd::Array2<C64> {
        let mut r = self.static_term.clone();
        for (shift, m) in self.harmonics.iter() {
            r.scaled_add((C64::i() * shift * self.omega * t).exp(), m);
        }
        r
    }

    /// Apply `R(t)` to a vectorized density matrix without materializing the
    /// summed generator.
    pub fn apply(&self, y: &nd::Array1<C64>, t: f64) -> nd::Array1<C64> {
        let mut out = self.static_term.dot(y);
        for (shift, m) in self.harmonics.iter() {
            out.scaled_add(
                (C64::i() * shift * self.omega * t).exp(), &m.dot(y));
        }
        out
    }
}
