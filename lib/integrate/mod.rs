//! Numerical propagation strategies for vectorized master-equation states.
//!
//! Three strategies are available, selected once at solver construction: a
//! closed-form eigendecomposition propagator for time-independent generators
//! ([`DiagPropagator`]), an adaptive embedded Verner 7(6) stepper
//! ([`Vern7Stepper`]), and classical fixed-step fourth-order Runge-Kutta
//! ([`rk4_advance`]).

use ndarray as nd;
use ndarray_linalg::{ Eig, Inverse };
use num_complex::Complex64 as C64;
use crate::error::FlimeError;

pub mod vern7;

/// Integration strategy, fixed at solver construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    /// Eigendecompose a time-independent generator once and propagate in
    /// closed form. Construction fails for a time-dependent generator.
    Diag,
    /// Adaptive embedded Verner 7(6) stepper under `atol`/`rtol` control.
    Vern7,
    /// Classical fixed-step fourth-order Runge-Kutta.
    Rk4,
}

/// Advance `y` by a single classical fourth-order Runge-Kutta step of size
/// `dt` under the right-hand side `rhs(t, y) = dy/dt`.
pub fn rk4_step<F>(rhs: F, t: f64, y: &nd::Array1<C64>, dt: f64)
    -> nd::Array1<C64>
where F: Fn(f64, &nd::Array1<C64>) -> nd::Array1<C64>
{
    let k1 = rhs(t, y);
    let k2 = rhs(t + dt / 2.0, &(y + &k1 * (dt / 2.0)));
    let k3 = rhs(t + dt / 2.0, &(y + &k2 * (dt / 2.0)));
    let k4 = rhs(t + dt, &(y + &k3 * dt));
    y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

/// Advance `y0` from `t0` to `t1` with `substeps` equal fourth-order
/// Runge-Kutta steps.
pub fn rk4_advance<F>(
    rhs: F,
    t0: f64,
    y0: &nd::Array1<C64>,
    t1: f64,
    substeps: usize,
) -> nd::Array1<C64>
where F: Fn(f64, &nd::Array1<C64>) -> nd::Array1<C64>
{
    let n = substeps.max(1);
    let dt = (t1 - t0) / n as f64;
    let mut y = y0.clone();
    let mut t = t0;
    for _ in 0..n {
        y = rk4_step(&rhs, t, &y, dt);
        t += dt;
    }
    y
}

// single embedded step: return the seventh-order solution and the raw local
// error vector h·Σ (b - bh) k
fn vern7_core<F>(rhs: &F, t: f64, y: &nd::Array1<C64>, h: f64)
    -> (nd::Array1<C64>, nd::Array1<C64>)
where F: Fn(f64, &nd::Array1<C64>) -> nd::Array1<C64>
{
    let mut k: Vec<nd::Array1<C64>> = Vec::with_capacity(vern7::NSTAGE);
    k.push(rhs(t, y));
    let mut yi: nd::Array1<C64>;
    for i in 1..vern7::NSTAGE {
        yi = y.clone();
        for (j, kj) in k.iter().enumerate() {
            let aij = vern7::A[i][j];
            if aij != 0.0 { yi.scaled_add(C64::from(aij * h), kj); }
        }
        k.push(rhs(t + vern7::C[i] * h, &yi));
    }
    let mut y1 = y.clone();
    let mut err: nd::Array1<C64> = nd::Array1::zeros(y.len());
    for (i, ki) in k.iter().enumerate() {
        if vern7::B[i] != 0.0 {
            y1.scaled_add(C64::from(vern7::B[i] * h), ki);
        }
        let ei = vern7::B[i] - vern7::BH[i];
        if ei != 0.0 { err.scaled_add(C64::from(ei * h), ki); }
    }
    (y1, err)
}

/// Adaptive driver around the embedded 7(6) pair.
///
/// Holds the current time, state, and proposed step size between calls so a
/// sequence of targets can be hit without restarting. Steps are clipped to
/// land on each target exactly. A step is accepted when the scaled max-norm
/// of the local error, `max_i |err_i| / (atol + rtol·|y_i|)`, is at most 1;
/// the next step size is `h · clamp(0.9·norm^(−1/7), 0.2, 5.0)`.
#[derive(Clone, Debug)]
pub struct Vern7Stepper {
    t: f64,
    y: nd::Array1<C64>,
    dt: f64,
    atol: f64,
    rtol: f64,
}

impl Vern7Stepper {
    /// Create a new stepper at state `y0` and time `t0`.
    pub fn new(t0: f64, y0: nd::Array1<C64>, atol: f64, rtol: f64) -> Self {
        Self { t: t0, y: y0, dt: f64::NAN, atol, rtol }
    }

    /// Current integration time.
    pub fn time(&self) -> f64 { self.t }

    /// Current state.
    pub fn state(&self) -> &nd::Array1<C64> { &self.y }

    /// Advance to `t_target`, returning the state there.
    ///
    /// Targets at or before the current time return the current state
    /// unchanged. Fails if repeated step rejection shrinks the step size to
    /// nothing.
    pub fn advance_to<F>(&mut self, rhs: F, t_target: f64)
        -> Result<&nd::Array1<C64>, FlimeError>
    where F: Fn(f64, &nd::Array1<C64>) -> nd::Array1<C64>
    {
        while self.t < t_target {
            if !self.dt.is_finite() || self.dt <= 0.0 {
                self.dt = t_target - self.t;
            }
            let h = self.dt.min(t_target - self.t);
            let (y1, err) = vern7_core(&rhs, self.t, &self.y, h);
            let mut enorm: f64 = 0.0;
            let iter = err.iter().zip(self.y.iter().zip(y1.iter()));
            for (e, (y0i, y1i)) in iter {
                let sc = self.atol + self.rtol * y0i.norm().max(y1i.norm());
                enorm = enorm.max(e.norm() / sc);
            }
            if enorm.is_nan() { enorm = f64::INFINITY; }
            if enorm <= 1.0 {
                self.t += h;
                self.y = y1;
                self.dt
                    = h * (0.9 * enorm.powf(-1.0 / 7.0)).clamp(0.2, 5.0);
            } else {
                self.dt
                    = h * (0.9 * enorm.powf(-1.0 / 7.0)).clamp(0.2, 1.0);
                if self.dt < f64::EPSILON * self.t.abs().max(1.0) {
                    return Err(FlimeError::StepUnderflow(self.t));
                }
            }
        }
        Ok(&self.y)
    }
}

/// Closed-form propagation for a time-independent generator.
///
/// Decomposes `R = V·diag(λ)·V⁻¹` once; a state with eigenbasis coefficients
/// `c = V⁻¹ y(t0)` advances as `y(t) = V·(c ⊙ exp(λ·(t − t0)))`.
#[derive(Clone, Debug)]
pub struct DiagPropagator {
    evals: nd::Array1<C64>,
    evecs: nd::Array2<C64>,
    inv_evecs: nd::Array2<C64>,
}

impl DiagPropagator {
    /// Eigendecompose the generator.
    pub fn new(gen: &nd::Array2<C64>) -> Result<Self, FlimeError> {
        let (evals, evecs): (nd::Array1<C64>, nd::Array2<C64>) = gen.eig()?;
        let inv_evecs = evecs.inv()?;
        Ok(Self { evals, evecs, inv_evecs })
    }

    /// Project a state onto the eigenbasis.
    pub fn coeffs(&self, y: &nd::Array1<C64>) -> nd::Array1<C64> {
        self.inv_evecs.dot(y)
    }

    /// Reconstruct the state an elapsed time `dt` after the projection.
    pub fn propagate(&self, c: &nd::Array1<C64>, dt: f64) -> nd::Array1<C64> {
        let phases = self.evals.mapv(|l| (l * dt).exp());
        self.evecs.dot(&(c * &phases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // dy/dt = λ y with one complex component
    fn linear_rhs(lambda: C64)
        -> impl Fn(f64, &nd::Array1<C64>) -> nd::Array1<C64>
    {
        move |_t: f64, y: &nd::Array1<C64>| y * lambda
    }

    #[test]
    fn rk4_exponential_decay() {
        let y0: nd::Array1<C64> = nd::array![1.0.into()];
        let y = rk4_advance(linear_rhs((-1.0).into()), 0.0, &y0, 1.0, 100);
        assert_abs_diff_eq!(y[0].re, (-1.0_f64).exp(), epsilon = 1e-8);
        assert_abs_diff_eq!(y[0].im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn vern7_oscillator_phase() {
        let y0: nd::Array1<C64> = nd::array![1.0.into()];
        let mut stepper = Vern7Stepper::new(0.0, y0, 1e-12, 1e-10);
        let t1 = 10.0 * std::f64::consts::PI;
        let y = stepper.advance_to(linear_rhs(C64::i()), t1).unwrap();
        // e^{i t} after five full turns
        assert_abs_diff_eq!(y[0].re, -1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(y[0].im, 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(stepper.time(), t1, epsilon = 1e-12);
    }

    #[test]
    fn vern7_hits_sequential_targets() {
        let y0: nd::Array1<C64> = nd::array![1.0.into()];
        let mut stepper = Vern7Stepper::new(0.0, y0, 1e-12, 1e-10);
        let rhs = linear_rhs((-0.5).into());
        for k in 1..=8 {
            let t = 0.25 * k as f64;
            let y = stepper.advance_to(&rhs, t).unwrap();
            assert_abs_diff_eq!(y[0].re, (-0.5 * t).exp(), epsilon = 1e-9);
        }
    }

    #[test]
    fn diag_matches_exact_solution() {
        // upper-triangular generator with known spectrum {-1, -2}
        let r: nd::Array2<C64> = nd::array![
            [(-1.0).into(), 1.0.into()],
            [0.0.into(), (-2.0).into()],
        ];
        let prop = DiagPropagator::new(&r).unwrap();
        let y0: nd::Array1<C64> = nd::array![1.0.into(), 1.0.into()];
        let c = prop.coeffs(&y0);
        let t = 0.7;
        let y = prop.propagate(&c, t);
        // y1(t) = 2 e^{-t} - e^{-2t}, y2(t) = e^{-2t}
        let e1 = (-t).exp();
        let e2 = (-2.0 * t).exp();
        assert_abs_diff_eq!(y[0].re, 2.0 * e1 - e2, epsilon = 1e-12);
        assert_abs_diff_eq!(y[1].re, e2, epsilon = 1e-12);
    }

    #[test]
    fn diag_and_vern7_agree() {
        let r: nd::Array2<C64> = nd::array![
            [C64::new(-0.3, 1.0), C64::new(0.1, 0.0)],
            [C64::new(0.0, 0.2), C64::new(-0.6, -1.0)],
        ];
        let prop = DiagPropagator::new(&r).unwrap();
        let y0: nd::Array1<C64> = nd::array![0.8.into(), C64::new(0.0, 0.6)];
        let c = prop.coeffs(&y0);
        let t = 2.5;
        let exact = prop.propagate(&c, t);
        let rhs = |_t: f64, y: &nd::Array1<C64>| r.dot(y);
        let mut stepper = Vern7Stepper::new(0.0, y0, 1e-12, 1e-10);
        let y = stepper.advance_to(rhs, t).unwrap();
        assert_abs_diff_eq!((y[0] - exact[0]).norm(), 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!((y[1] - exact[1]).norm(), 0.0, epsilon = 1e-8);
    }
}
