//! Floquet decomposition of a time-periodic Hamiltonian.
//!
//! A [`FloquetBasis`] integrates the one-period propagator of a
//! [`HPeriodic`], eigensolves it for quasi-energies and Floquet modes, and
//! provides mode evaluation at arbitrary times plus the lab⇄Floquet state
//! transforms built from them.
//!
//! Conventions: the mode matrix `Φ(t)` has the Floquet modes as columns and
//! is T-periodic; the Floquet-state matrix `Ψ(t) = Φ(t mod T)·diag(e^{−i e t})`
//! carries the quasi-energy phases with the unreduced time. A lab-frame
//! density matrix transforms into the Floquet frame as `Ψ(t)† ρ Ψ(t)`.

use std::{ fmt, rc::Rc };
use ndarray as nd;
use ndarray_linalg::Eig;
use num_complex::Complex64 as C64;
use rustc_hash::FxHashMap;
use crate::{
    error::FlimeError,
    hilbert::{ dagger, unvectorize, vectorize },
    integrate::Vern7Stepper,
};

/// Heap-allocated [`Fn`] trait object giving the complex coefficient of a
/// Hamiltonian term as a function of time.
pub type CoeffFn<'a> = Rc<dyn Fn(f64) -> C64 + 'a>;

/// Heap-allocated [`Fn`] trait object giving a full Hamiltonian matrix as a
/// function of time.
pub type HFn<'a> = Rc<dyn Fn(f64) -> nd::Array2<C64> + 'a>;

/// Description of a time-periodic Hamiltonian.
///
/// The caller asserts periodicity: evaluations are only ever requested within
/// one period, with periodic continuation implied.
#[derive(Clone)]
pub enum HPeriodic<'a> {
    /// A constant matrix, trivially periodic with any period.
    Constant(nd::Array2<C64>),
    /// A static part plus matrix terms with time-dependent coefficients.
    Terms {
        h0: nd::Array2<C64>,
        terms: Vec<(nd::Array2<C64>, CoeffFn<'a>)>,
    },
    /// An arbitrary matrix-valued function of time.
    Function(HFn<'a>),
}

impl fmt::Debug for HPeriodic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(h0) => write!(f, "Constant({:?})", h0),
            Self::Terms { h0, terms } => {
                write!(f, "Terms {{ h0: {:?}, terms: [", h0)?;
                for k in 0..terms.len() {
                    write!(f, "({:?}, ...)", terms[k].0)?;
                    if k < terms.len() - 1 { write!(f, ", ")?; }
                }
                write!(f, "] }}")
            },
            Self::Function(_) => write!(f, "Function(...)"),
        }
    }
}

impl<'a> HPeriodic<'a> {
    /// Create a [`Self::Function`] from an ordinary closure.
    pub fn function<F>(f: F) -> Self
    where F: Fn(f64) -> nd::Array2<C64> + 'a
    {
        Self::Function(Rc::new(f))
    }

    /// Evaluate the Hamiltonian matrix at time `t`.
    pub fn eval_at(&self, t: f64) -> nd::Array2<C64> {
        match self {
            Self::Constant(h0) => h0.clone(),
            Self::Terms { h0, terms } => {
                let mut h = h0.clone();
                for (hk, fk) in terms.iter() {
                    h.scaled_add(fk(t), hk);
                }
                h
            },
            Self::Function(f) => f(t),
        }
    }

    // validate shapes as far as the representation allows and return the
    // Hilbert-space dimension
    pub(crate) fn check_dim(&self) -> Result<usize, FlimeError> {
        let check_square = |m: &nd::Array2<C64>, expected: usize| {
            let (rows, cols) = m.dim();
            if rows == cols && (expected == 0 || rows == expected) {
                Ok(rows)
            } else {
                Err(FlimeError::BadHamiltonian {
                    expected: if expected == 0 { rows } else { expected },
                    rows,
                    cols,
                })
            }
        };
        match self {
            Self::Constant(h0) => check_square(h0, 0),
            Self::Terms { h0, terms } => {
                let dim = check_square(h0, 0)?;
                for (hk, _) in terms.iter() { check_square(hk, dim)?; }
                Ok(dim)
            },
            Self::Function(f) => check_square(&f(0.0), 0),
        }
    }
}

// propagator integration tolerances
const PROP_ATOL: f64 = 1e-12;
const PROP_RTOL: f64 = 1e-10;

// default number of stored propagator anchors per period
const DEFAULT_ANCHORS: usize = 64;

// in-period times are keyed in cache maps after rounding at this scale
const TAU_ROUND: f64 = 1e10;

/// Floquet structure of a periodic Hamiltonian: quasi-energies, modes, and
/// the basis transforms they generate.
///
/// Quasi-energies are folded into the first Brillouin zone
/// `[−ω/2, ω/2)`, ω = 2π/T.
#[derive(Clone)]
pub struct FloquetBasis<'a> {
    h: HPeriodic<'a>,
    period: f64,
    dim: usize,
    e_quasi: nd::Array1<f64>,
    modes0: nd::Array2<C64>,
    anchors: Vec<nd::Array2<C64>>,
}

impl fmt::Debug for FloquetBasis<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
            "FloquetBasis {{ h: {:?}, period: {:?}, e_quasi: {:?}, .. }}",
            self.h, self.period, self.e_quasi,
        )
    }
}

impl<'a> FloquetBasis<'a> {
    /// Compute the Floquet decomposition of `h` with drive period `period`.
    pub fn new(h: HPeriodic<'a>, period: f64) -> Result<Self, FlimeError> {
        Self::with_resolution(h, period, DEFAULT_ANCHORS)
    }

    /// Like [`Self::new`], storing `anchors` one-period propagator samples
    /// for mode evaluation at off-sample times.
    pub fn with_resolution(h: HPeriodic<'a>, period: f64, anchors: usize)
        -> Result<Self, FlimeError>
    {
        if !period.is_finite() || period <= 0.0 {
            return Err(FlimeError::BadPeriod(period));
        }
        let dim = h.check_dim()?;
        let n = anchors.max(1);
        let rhs = |t: f64, y: &nd::Array1<C64>| {
            let u = unvectorize(y, dim);
            vectorize(&(h.eval_at(t).dot(&u) * (-C64::i())))
        };
        let mut props: Vec<nd::Array2<C64>> = Vec::with_capacity(n + 1);
        props.push(nd::Array2::eye(dim));
        let u0 = vectorize(&nd::Array2::eye(dim));
        let mut stepper = Vern7Stepper::new(0.0, u0, PROP_ATOL, PROP_RTOL);
        for k in 1..=n {
            let tk = period * k as f64 / n as f64;
            let u = stepper.advance_to(&rhs, tk)?;
            props.push(unvectorize(u, dim));
        }
        let monodromy = props[n].clone();
        let (evals, modes0): (nd::Array1<C64>, nd::Array2<C64>)
            = monodromy.eig()?;
        let e_quasi: nd::Array1<f64> = evals.mapv(|l| -l.arg() / period);
        Ok(Self { h, period, dim, e_quasi, modes0, anchors: props })
    }

    /// Hilbert-space dimension.
    pub fn dim(&self) -> usize { self.dim }

    /// Drive period.
    pub fn period(&self) -> f64 { self.period }

    /// Drive angular frequency `2π / T`.
    pub fn omega(&self) -> f64 { std::f64::consts::TAU / self.period }

    /// Quasi-energies, in the eigensolver's mode order.
    pub fn quasienergies(&self) -> &nd::Array1<f64> { &self.e_quasi }

    // reduce to [0, T) and round, wrapping values within 1e-10 of T to 0
    fn wrap_in_period(&self, t: f64) -> f64 {
        let tau = t.rem_euclid(self.period);
        let tau = (tau * TAU_ROUND).round() / TAU_ROUND;
        if (tau - self.period).abs() < 1.0 / TAU_ROUND { 0.0 } else { tau }
    }

    /// Compute the propagator `U(τ, 0)` for an in-period time `τ ∈ [0, T)`.
    pub fn propagator(&self, t: f64) -> Result<nd::Array2<C64>, FlimeError> {
        let tau = self.wrap_in_period(t);
        let n = self.anchors.len() - 1;
        let k = ((tau / self.period * n as f64).floor() as usize).min(n - 1);
        let tk = self.period * k as f64 / n as f64;
        if tau <= tk {
            return Ok(self.anchors[k].clone());
        }
        let dim = self.dim;
        let h = &self.h;
        let rhs = |t: f64, y: &nd::Array1<C64>| {
            let u = unvectorize(y, dim);
            vectorize(&(h.eval_at(t).dot(&u) * (-C64::i())))
        };
        let mut stepper = Vern7Stepper::new(
            tk, vectorize(&self.anchors[k]), PROP_ATOL, PROP_RTOL);
        let u = stepper.advance_to(&rhs, tau)?;
        Ok(unvectorize(u, dim))
    }

    /// Evaluate the T-periodic mode matrix `Φ(t) = U(τ)·Φ(0)·diag(e^{+i e τ})`,
    /// τ = t mod T, with modes as columns.
    pub fn mode(&self, t: f64) -> Result<nd::Array2<C64>, FlimeError> {
        let tau = self.wrap_in_period(t);
        let u = self.propagator(tau)?;
        let phases: nd::Array1<C64>
            = self.e_quasi.mapv(|e| (C64::i() * e * tau).exp());
        Ok(&u.dot(&self.modes0) * &phases)
    }

    /// Evaluate the Floquet-state matrix `Ψ(t) = Φ(t mod T)·diag(e^{−i e t})`
    /// with the quasi-energy phases at the unreduced time.
    pub fn state_matrix(&self, t: f64) -> Result<nd::Array2<C64>, FlimeError> {
        let phi = self.mode(t)?;
        let phases: nd::Array1<C64>
            = self.e_quasi.mapv(|e| (-C64::i() * e * t).exp());
        Ok(&phi * &phases)
    }

    /// Transform a lab-frame density matrix into the Floquet frame at time
    /// `t`: `Ψ(t)† ρ Ψ(t)`.
    pub fn to_floquet_basis(&self, rho: &nd::Array2<C64>, t: f64)
        -> Result<nd::Array2<C64>, FlimeError>
    {
        let psi = self.state_matrix(t)?;
        Ok(dagger(&psi).dot(rho).dot(&psi))
    }

    /// Transform a Floquet-frame density matrix back to the lab frame at time
    /// `t`: `Ψ(t) ρ Ψ(t)†`.
    pub fn from_floquet_basis(&self, rho: &nd::Array2<C64>, t: f64)
        -> Result<nd::Array2<C64>, FlimeError>
    {
        let psi = self.state_matrix(t)?;
        Ok(psi.dot(rho).dot(&dagger(&psi)))
    }

    /// Transform a lab-frame ket into the Floquet frame at time `t`.
    pub fn ket_to_floquet_basis(&self, psi_ket: &nd::Array1<C64>, t: f64)
        -> Result<nd::Array1<C64>, FlimeError>
    {
        let psi = self.state_matrix(t)?;
        Ok(dagger(&psi).dot(psi_ket))
    }

    /// Transform a Floquet-frame ket back to the lab frame at time `t`.
    pub fn ket_from_floquet_basis(&self, psi_ket: &nd::Array1<C64>, t: f64)
        -> Result<nd::Array1<C64>, FlimeError>
    {
        let psi = self.state_matrix(t)?;
        Ok(psi.dot(psi_ket))
    }

    /// Evaluate the Floquet-state matrix at every time in `times`, computing
    /// the underlying mode matrix only once per distinct in-period time.
    pub fn state_table(&self, times: &[f64])
        -> Result<Vec<nd::Array2<C64>>, FlimeError>
    {
        let mut tally: FxHashMap<i64, Vec<usize>> = FxHashMap::default();
        for (x, &t) in times.iter().enumerate() {
            let key = (self.wrap_in_period(t) * TAU_ROUND).round() as i64;
            tally.entry(key).or_default().push(x);
        }
        let mut table: Vec<nd::Array2<C64>>
            = vec![nd::Array2::zeros((self.dim, self.dim)); times.len()];
        for (key, idx) in tally.into_iter() {
            let phi = self.mode(key as f64 / TAU_ROUND)?;
            for x in idx.into_iter() {
                let phases: nd::Array1<C64> = self.e_quasi
                    .mapv(|e| (-C64::i() * e * times[x]).exp());
                table[x] = &phi * &phases;
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::hilbert::trace;

    const T: f64 = std::f64::consts::TAU / 5.0;

    fn sz_half() -> nd::Array2<C64> {
        nd::array![
            [0.5.into(), 0.0.into()],
            [0.0.into(), (-0.5).into()],
        ]
    }

    // circularly driven two-level system: exactly solvable in the
    // co-rotating frame
    fn driven_tls<'a>(delta: f64, omega_r: f64, omega_d: f64)
        -> HPeriodic<'a>
    {
        let h0 = sz_half() * C64::from(delta);
        let fwd: nd::Array2<C64> = nd::array![
            [0.0.into(), (omega_r / 2.0).into()],
            [0.0.into(), 0.0.into()],
        ];
        let bwd: nd::Array2<C64> = nd::array![
            [0.0.into(), 0.0.into()],
            [(omega_r / 2.0).into(), 0.0.into()],
        ];
        HPeriodic::Terms {
            h0,
            terms: vec![
                (fwd, Rc::new(move |t: f64| (-C64::i() * omega_d * t).exp())),
                (bwd, Rc::new(move |t: f64| (C64::i() * omega_d * t).exp())),
            ],
        }
    }

    #[test]
    fn static_hamiltonian_quasienergies() {
        let fb = FloquetBasis::new(HPeriodic::Constant(sz_half()), T).unwrap();
        let mut e: Vec<f64> = fb.quasienergies().to_vec();
        e.sort_by(|a, b| a.total_cmp(b));
        assert_abs_diff_eq!(e[0], -0.5, epsilon = 1e-8);
        assert_abs_diff_eq!(e[1], 0.5, epsilon = 1e-8);
        // modes of a static diagonal hamiltonian are basis vectors
        let phi = fb.mode(0.0).unwrap();
        for j in 0..2 {
            let col_max = (0..2).map(|i| phi[[i, j]].norm())
                .fold(0.0_f64, f64::max);
            assert_abs_diff_eq!(col_max, 1.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn driven_quasienergy_splitting() {
        let delta = 5.2;
        let omega_r = 0.3;
        let omega_d = 5.0;
        let t_drive = std::f64::consts::TAU / omega_d;
        let fb = FloquetBasis::new(
            driven_tls(delta, omega_r, omega_d), t_drive).unwrap();
        let e = fb.quasienergies();
        let omega = fb.omega();
        let gap = (e[0] - e[1]).abs() % omega;
        let gap = gap.min(omega - gap);
        let expected = ((delta - omega_d).powi(2) + omega_r.powi(2)).sqrt();
        assert_abs_diff_eq!(gap, expected, epsilon = 1e-6);
    }

    #[test]
    fn mode_periodicity() {
        let fb = FloquetBasis::new(driven_tls(5.1, 0.4, 5.0),
            std::f64::consts::TAU / 5.0).unwrap();
        let t0 = 0.3 * fb.period();
        let phi_a = fb.mode(t0).unwrap();
        let phi_b = fb.mode(t0 + fb.period()).unwrap();
        for (a, b) in phi_a.iter().zip(phi_b.iter()) {
            assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-7);
        }
    }

    #[test]
    fn basis_round_trip() {
        let fb = FloquetBasis::new(driven_tls(5.3, 0.25, 5.0),
            std::f64::consts::TAU / 5.0).unwrap();
        let rho: nd::Array2<C64> = nd::array![
            [0.7.into(), C64::new(0.1, -0.2)],
            [C64::new(0.1, 0.2), 0.3.into()],
        ];
        let t = 0.37 * fb.period();
        let back = fb.from_floquet_basis(
            &fb.to_floquet_basis(&rho, t).unwrap(), t).unwrap();
        for (a, b) in rho.iter().zip(back.iter()) {
            assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-7);
        }
        assert_abs_diff_eq!(trace(&back).re, 1.0, epsilon = 1e-7);
    }

    #[test]
    fn state_table_matches_state_matrix() {
        let fb = FloquetBasis::new(driven_tls(5.0, 0.2, 5.0),
            std::f64::consts::TAU / 5.0).unwrap();
        let times: Vec<f64> = vec![0.0, 0.41 * fb.period(),
            1.41 * fb.period(), 2.0 * fb.period()];
        let table = fb.state_table(&times).unwrap();
        for (x, &t) in times.iter().enumerate() {
            let psi = fb.state_matrix(t).unwrap();
            for (a, b) in table[x].iter().zip(psi.iter()) {
                assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-7);
            }
        }
    }
}
