//! Evolution engine and entry points for the Floquet-Lindblad master
//! equation.
//!
//! A [`FlimeSolver`] owns the Floquet structure of a driven system together
//! with the harmonic rate tensor built from its collapse operators; both are
//! fixed at construction, so a live solver cannot have its Hamiltonian or
//! dissipators swapped out. Evolution proceeds either through the
//! [`start`][FlimeSolver::start]/[`step`][FlimeSolver::step] state machine
//! or the batch [`run`][FlimeSolver::run] loop.

use std::fmt;
use ndarray as nd;
use ndarray_linalg::Eig;
use num_complex::Complex64 as C64;
use crate::{
    error::FlimeError,
    floquet::{ FloquetBasis, HPeriodic },
    generator::RateGenerator,
    hilbert::{ dagger, expect_val, normalized, trace, unvectorize, vectorize,
        InitialState },
    integrate::{ rk4_advance, DiagPropagator, Method, Vern7Stepper },
    rate::{ infer_nt, CollapseOperator, RateTensor, DEFAULT_NT },
    result::FloquetResult,
};

// acceptance threshold for the steady-state kernel eigenvalue, relative to
// the magnitude of the largest eigenvalue
const STEADY_TOL: f64 = 1e-10;

/// Solver configuration, fixed per instance once a solver is built with it.
#[derive(Clone, Debug, PartialEq)]
pub struct FlimeOptions {
    /// Store lab-frame states at every output time; unset means "store iff
    /// no observables are requested".
    pub store_states: Option<bool>,
    /// Keep the state at the last output time regardless of `store_states`.
    pub store_final_state: bool,
    /// Additionally store the raw Floquet-frame states.
    pub store_floquet_states: bool,
    /// Divide lab-frame states by their trace before storage and observable
    /// evaluation.
    pub normalize_output: bool,
    /// Integration strategy; unset selects [`Method::Diag`] for a static
    /// generator and [`Method::Vern7`] otherwise.
    pub method: Option<Method>,
    /// Print coarse progress to stderr during [`FlimeSolver::run`].
    pub progress_bar: bool,
    /// Absolute tolerance for the adaptive stepper.
    pub atol: f64,
    /// Relative tolerance for the adaptive stepper.
    pub rtol: f64,
    /// Mode samples per drive period; unset lets [`flimesolve`] infer a
    /// count from the output times.
    pub nt: Option<usize>,
    /// Fixed substeps per output interval for [`Method::Rk4`].
    pub rk4_substeps: usize,
}

impl Default for FlimeOptions {
    fn default() -> Self {
        Self {
            store_states: None,
            store_final_state: false,
            store_floquet_states: false,
            normalize_output: true,
            method: None,
            progress_bar: false,
            atol: 1e-8,
            rtol: 1e-6,
            nt: None,
            rk4_substeps: 64,
        }
    }
}

impl FlimeOptions {
    /// Parse options from TOML text.
    ///
    /// Exactly the struct's field names are recognized as keys; unknown keys
    /// and mistyped values are rejected. Methods are named `"diag"`,
    /// `"vern7"`, and `"rk4"`.
    pub fn from_toml_str(s: &str) -> Result<Self, FlimeError> {
        let bad = |key: &str, expected: &'static str| {
            FlimeError::BadOptionValue { key: key.into(), expected }
        };
        let as_bool = |key: &str, val: &toml::Value| {
            val.as_bool().ok_or_else(|| bad(key, "boolean"))
        };
        let as_float = |key: &str, val: &toml::Value| {
            val.as_float()
                .or_else(|| val.as_integer().map(|n| n as f64))
                .ok_or_else(|| bad(key, "number"))
        };
        let as_pos_int = |key: &str, val: &toml::Value| {
            match val.as_integer() {
                Some(n) if n > 0 => Ok(n as usize),
                _ => Err(bad(key, "positive integer")),
            }
        };
        let table: toml::Table = s.parse()?;
        let mut opts = Self::default();
        for (key, val) in table.iter() {
            match key.as_str() {
                "store_states" => {
                    opts.store_states = Some(as_bool(key, val)?);
                },
                "store_final_state" => {
                    opts.store_final_state = as_bool(key, val)?;
                },
                "store_floquet_states" => {
                    opts.store_floquet_states = as_bool(key, val)?;
                },
                "normalize_output" => {
                    opts.normalize_output = as_bool(key, val)?;
                },
                "method" => {
                    let name = val.as_str().ok_or_else(|| bad(key, "string"))?;
                    opts.method = Some(match name {
                        "diag" => Method::Diag,
                        "vern7" => Method::Vern7,
                        "rk4" => Method::Rk4,
                        _ => return Err(bad(
                            key, "\"diag\", \"vern7\", or \"rk4\"")),
                    });
                },
                "progress_bar" => {
                    opts.progress_bar = as_bool(key, val)?;
                },
                "atol" => { opts.atol = as_float(key, val)?; },
                "rtol" => { opts.rtol = as_float(key, val)?; },
                "nt" => { opts.nt = Some(as_pos_int(key, val)?); },
                "rk4_substeps" => {
                    opts.rk4_substeps = as_pos_int(key, val)?;
                },
                _ => return Err(FlimeError::BadOptionKey(key.clone())),
            }
        }
        Ok(opts)
    }
}

// per-run integrator state
enum Engine {
    Diag { prop: DiagPropagator, t0: f64, c0: nd::Array1<C64>, t: f64 },
    Vern7(Vern7Stepper),
    Rk4 { t: f64, y: nd::Array1<C64> },
}

impl Engine {
    fn time(&self) -> f64 {
        match self {
            Self::Diag { t, .. } => *t,
            Self::Vern7(stepper) => stepper.time(),
            Self::Rk4 { t, .. } => *t,
        }
    }

    fn advance(&mut self, gen: &RateGenerator, t: f64, substeps: usize)
        -> Result<nd::Array1<C64>, FlimeError>
    {
        let rhs = |tt: f64, y: &nd::Array1<C64>| gen.apply(y, tt);
        match self {
            Self::Diag { prop, t0, c0, t: cur } => {
                *cur = t;
                Ok(prop.propagate(c0, t - *t0))
            },
            Self::Vern7(stepper) => Ok(stepper.advance_to(rhs, t)?.clone()),
            Self::Rk4 { t: cur, y } => {
                *y = rk4_advance(rhs, *cur, y, t, substeps);
                *cur = t;
                Ok(y.clone())
            },
        }
    }
}

/// Floquet-Lindblad evolution engine for one Hamiltonian + dissipator
/// configuration.
pub struct FlimeSolver<'a> {
    basis: FloquetBasis<'a>,
    tensor: RateTensor,
    generator: RateGenerator,
    method: Method,
    time_sense: f64,
    options: FlimeOptions,
    engine: Option<Engine>,
}

impl fmt::Debug for FlimeSolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
            "FlimeSolver {{ basis: {:?}, method: {:?}, time_sense: {:?}, \
            options: {:?}, .. }}",
            self.basis, self.method, self.time_sense, self.options,
        )
    }
}

impl<'a> FlimeSolver<'a> {
    /// Build a solver from a pre-computed Floquet structure.
    ///
    /// The rate tensor is built here, once, with `options.nt` mode samples
    /// per period; the generator it assembles into is immutable for the life
    /// of the solver. Fails if a collapse operator does not match the system
    /// dimension, the cutoff is negative, or [`Method::Diag`] was requested
    /// for a time-dependent generator.
    pub fn new(
        basis: FloquetBasis<'a>,
        c_ops: &[CollapseOperator],
        time_sense: f64,
        options: FlimeOptions,
    ) -> Result<Self, FlimeError>
    {
        let nt = options.nt.unwrap_or(DEFAULT_NT);
        let tensor = RateTensor::build(&basis, c_ops, nt, time_sense)?;
        let generator = RateGenerator::new(&tensor);
        let method = match options.method {
            Some(Method::Diag) if !generator.is_static() => {
                return Err(FlimeError::DiagNonstatic);
            },
            Some(m) => m,
            None if generator.is_static() => Method::Diag,
            None => Method::Vern7,
        };
        Ok(Self {
            basis,
            tensor,
            generator,
            method,
            time_sense,
            options,
            engine: None,
        })
    }

    /// Build a solver directly from a periodic Hamiltonian and drive period.
    pub fn from_hamiltonian(
        h: HPeriodic<'a>,
        period: f64,
        c_ops: &[CollapseOperator],
        time_sense: f64,
        options: FlimeOptions,
    ) -> Result<Self, FlimeError>
    {
        Self::new(FloquetBasis::new(h, period)?, c_ops, time_sense, options)
    }

    /// The Floquet structure the solver was built on.
    pub fn basis(&self) -> &FloquetBasis<'a> { &self.basis }

    /// The harmonic rate tensor built at construction.
    pub fn rate_tensor(&self) -> &RateTensor { &self.tensor }

    /// The assembled dissipative generator.
    pub fn generator(&self) -> &RateGenerator { &self.generator }

    /// The integration strategy selected at construction.
    pub fn method(&self) -> Method { self.method }

    /// The secular cutoff the rate tensor was built with.
    pub fn time_sense(&self) -> f64 { self.time_sense }

    /// The options the solver was built with.
    pub fn options(&self) -> &FlimeOptions { &self.options }

    /// Initialize step-mode evolution from a lab-frame state at `t0`.
    ///
    /// Kets are promoted to density matrices. Any previous evolution state
    /// is replaced.
    pub fn start<S>(&mut self, state: S, t0: f64) -> Result<(), FlimeError>
    where S: Into<InitialState>
    {
        let rho = state.into().into_density(self.basis.dim())?;
        let rho_f = self.basis.to_floquet_basis(&rho, t0)?;
        self.start_floquet(rho_f, t0)
    }

    /// Initialize step-mode evolution from a state already expressed in the
    /// Floquet frame at `t0`.
    pub fn start_floquet<S>(&mut self, state: S, t0: f64)
        -> Result<(), FlimeError>
    where S: Into<InitialState>
    {
        let rho_f = state.into().into_density(self.basis.dim())?;
        let y0 = vectorize(&rho_f);
        self.engine = Some(match self.method {
            Method::Diag => {
                let prop = DiagPropagator::new(self.generator.static_part())?;
                let c0 = prop.coeffs(&y0);
                Engine::Diag { prop, t0, c0, t: t0 }
            },
            Method::Vern7 => Engine::Vern7(Vern7Stepper::new(
                t0, y0, self.options.atol, self.options.rtol)),
            Method::Rk4 => Engine::Rk4 { t: t0, y: y0 },
        });
        Ok(())
    }

    /// Advance the evolution to `t` and return the lab-frame state there,
    /// normalized if the options ask for it.
    ///
    /// Requires a preceding [`start`][Self::start]; times must be
    /// non-decreasing across calls.
    pub fn step(&mut self, t: f64) -> Result<nd::Array2<C64>, FlimeError> {
        let rho_f = self.step_floquet(t)?;
        let rho = self.basis.from_floquet_basis(&rho_f, t)?;
        Ok(if self.options.normalize_output { normalized(&rho) } else { rho })
    }

    /// Advance the evolution to `t` and return the raw Floquet-frame state.
    pub fn step_floquet(&mut self, t: f64)
        -> Result<nd::Array2<C64>, FlimeError>
    {
        let dim = self.basis.dim();
        let engine = self.engine.as_mut().ok_or(FlimeError::NotStarted)?;
        let last = engine.time();
        if t < last {
            return Err(FlimeError::TimeReversed { t, last });
        }
        let y = engine.advance(
            &self.generator, t, self.options.rk4_substeps)?;
        Ok(unvectorize(&y, dim))
    }

    /// Evolve `state0` across `times`, recording states and expectation
    /// values of `e_ops` per the solver's options.
    ///
    /// The initial state is taken in the lab frame at `times[0]`; every
    /// output state is transformed back to the lab frame through a
    /// state table built once for the whole time list.
    pub fn run<S>(
        &mut self,
        state0: S,
        times: &[f64],
        e_ops: &[nd::Array2<C64>],
    ) -> Result<FloquetResult, FlimeError>
    where S: Into<InitialState>
    {
        if times.is_empty() {
            return Err(FlimeError::NoTimes);
        }
        for w in times.windows(2) {
            if w[1] < w[0] {
                return Err(FlimeError::TimeReversed { t: w[1], last: w[0] });
            }
        }
        let n = times.len();
        let store_states
            = self.options.store_states.unwrap_or(e_ops.is_empty());
        let store_floquet = self.options.store_floquet_states;
        let store_final = self.options.store_final_state;
        self.start(state0, times[0])?;
        let psi_table = self.basis.state_table(times)?;
        let mut states: Vec<nd::Array2<C64>>
            = Vec::with_capacity(if store_states { n } else { 0 });
        let mut floquet_states: Vec<nd::Array2<C64>>
            = Vec::with_capacity(if store_floquet { n } else { 0 });
        let mut expect: Vec<Vec<C64>>
            = vec![Vec::with_capacity(n); e_ops.len()];
        let mut final_state: Option<nd::Array2<C64>> = None;
        let mut milestone: usize = 0;
        for (x, &t) in times.iter().enumerate() {
            let rho_f = self.step_floquet(t)?;
            let psi = &psi_table[x];
            let rho = psi.dot(&rho_f).dot(&dagger(psi));
            let rho
                = if self.options.normalize_output { normalized(&rho) }
                else { rho };
            if store_states { states.push(rho.clone()); }
            if store_floquet { floquet_states.push(rho_f); }
            for (series, op) in expect.iter_mut().zip(e_ops.iter()) {
                series.push(expect_val(op, &rho));
            }
            if store_final && x == n - 1 { final_state = Some(rho.clone()); }
            if self.options.progress_bar {
                let decile = 10 * (x + 1) / n;
                if decile > milestone {
                    milestone = decile;
                    eprintln!("  {:3}% (t = {:.6e})", 10 * decile, t);
                }
            }
        }
        Ok(FloquetResult::assemble(
            times.to_vec(), states, floquet_states, expect, final_state))
    }

    /// The steady state of the fully secular generator as a lab-frame
    /// density matrix at time 0.
    ///
    /// Diagonalizes the static rate matrix and takes the kernel eigenvector,
    /// hermitized and rescaled to unit trace. Fails unless the solver was
    /// built with cutoff 0, and when no eigenvalue is close enough to zero
    /// to identify a kernel.
    pub fn steadystate(&self) -> Result<nd::Array2<C64>, FlimeError> {
        if self.time_sense != 0.0 {
            return Err(FlimeError::NonSecular(self.time_sense));
        }
        let dim = self.basis.dim();
        let (evals, evecs): (nd::Array1<C64>, nd::Array2<C64>)
            = self.generator.static_part().eig()?;
        let mut best: usize = 0;
        let mut best_mag: f64 = f64::INFINITY;
        let mut scale: f64 = 0.0;
        for (k, l) in evals.iter().enumerate() {
            let mag = l.norm();
            if mag < best_mag {
                best_mag = mag;
                best = k;
            }
            scale = scale.max(mag);
        }
        if best_mag > STEADY_TOL * scale.max(1.0) {
            return Err(FlimeError::NoSteadyState(best_mag));
        }
        let kernel = evecs.column(best).to_owned();
        let rho = unvectorize(&kernel, dim);
        let rho = (&rho + &dagger(&rho)) * C64::from(0.5);
        let tr = trace(&rho);
        if tr.norm() < f64::EPSILON {
            return Err(FlimeError::NoSteadyState(best_mag));
        }
        let rho = rho.mapv(|a| a / tr);
        self.basis.from_floquet_basis(&rho, 0.0)
    }
}

/// One-shot solve of the Floquet-Lindblad master equation.
///
/// Builds the Floquet structure for `h` with drive period `period`, the rate
/// tensor for `c_ops` under secular cutoff `time_sense`, and evolves
/// `state0` across `times`. When `options.nt` is unset the per-period sample
/// count is inferred from the spacing of `times`. With no collapse operators
/// the call degrades to pure Floquet propagation of the initial state.
pub fn flimesolve<'a, S>(
    h: HPeriodic<'a>,
    period: f64,
    state0: S,
    times: &[f64],
    c_ops: &[CollapseOperator],
    e_ops: &[nd::Array2<C64>],
    time_sense: f64,
    options: FlimeOptions,
) -> Result<FloquetResult, FlimeError>
where S: Into<InitialState>
{
    if times.is_empty() {
        return Err(FlimeError::NoTimes);
    }
    let mut options = options;
    if options.nt.is_none() {
        options.nt = Some(infer_nt(times, period));
    }
    let basis = FloquetBasis::new(h, period)?;
    let mut solver = FlimeSolver::new(basis, c_ops, time_sense, options)?;
    solver.run(state0, times, e_ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    const T: f64 = std::f64::consts::TAU / 5.0;

    fn sz_half() -> nd::Array2<C64> {
        nd::array![
            [0.5.into(), 0.0.into()],
            [0.0.into(), (-0.5).into()],
        ]
    }

    fn sigma_minus() -> nd::Array2<C64> {
        let mut op: nd::Array2<C64> = nd::Array2::zeros((2, 2));
        op[[1, 0]] = 1.0.into();
        op
    }

    fn driven_tls<'a>() -> HPeriodic<'a> {
        let h0 = sz_half() * C64::from(5.2);
        let fwd: nd::Array2<C64> = nd::array![
            [0.0.into(), 0.15.into()],
            [0.0.into(), 0.0.into()],
        ];
        let bwd: nd::Array2<C64> = nd::array![
            [0.0.into(), 0.0.into()],
            [0.15.into(), 0.0.into()],
        ];
        HPeriodic::Terms {
            h0,
            terms: vec![
                (fwd, Rc::new(|t: f64| (-C64::i() * 5.0 * t).exp())),
                (bwd, Rc::new(|t: f64| (C64::i() * 5.0 * t).exp())),
            ],
        }
    }

    fn ground() -> nd::Array1<C64> {
        nd::array![0.0.into(), 1.0.into()]
    }

    #[test]
    fn options_from_toml() {
        let opts = FlimeOptions::from_toml_str(
            r#"
            store_states = true
            store_final_state = true
            normalize_output = false
            method = "rk4"
            atol = 1e-10
            rtol = 1e-8
            nt = 32
            rk4_substeps = 128
            "#,
        ).unwrap();
        assert_eq!(opts.store_states, Some(true));
        assert!(opts.store_final_state);
        assert!(!opts.store_floquet_states);
        assert!(!opts.normalize_output);
        assert_eq!(opts.method, Some(Method::Rk4));
        assert!(!opts.progress_bar);
        assert_eq!(opts.atol, 1e-10);
        assert_eq!(opts.rtol, 1e-8);
        assert_eq!(opts.nt, Some(32));
        assert_eq!(opts.rk4_substeps, 128);
        assert_eq!(FlimeOptions::from_toml_str("").unwrap(),
            FlimeOptions::default());
    }

    #[test]
    fn options_reject_bad_input() {
        assert!(matches!(
            FlimeOptions::from_toml_str("no_such_option = 1"),
            Err(FlimeError::BadOptionKey(_)),
        ));
        assert!(matches!(
            FlimeOptions::from_toml_str("atol = \"tight\""),
            Err(FlimeError::BadOptionValue { .. }),
        ));
        assert!(matches!(
            FlimeOptions::from_toml_str("method = \"euler\""),
            Err(FlimeError::BadOptionValue { .. }),
        ));
        assert!(matches!(
            FlimeOptions::from_toml_str("nt = -4"),
            Err(FlimeError::BadOptionValue { .. }),
        ));
        assert!(matches!(
            FlimeOptions::from_toml_str("store_states ="),
            Err(FlimeError::TomlParse(_)),
        ));
    }

    #[test]
    fn method_defaults_follow_generator() {
        let c_ops = [CollapseOperator::new(sigma_minus(), 0.1).unwrap()];
        let secular = FlimeSolver::from_hamiltonian(
            driven_tls(), T, &c_ops, 0.0, FlimeOptions::default()).unwrap();
        assert_eq!(secular.method(), Method::Diag);
        let nonsec = FlimeSolver::from_hamiltonian(
            driven_tls(), T, &c_ops, 1e9, FlimeOptions::default()).unwrap();
        assert_eq!(nonsec.method(), Method::Vern7);
        let forced = FlimeSolver::from_hamiltonian(
            driven_tls(), T, &c_ops, 1e9,
            FlimeOptions { method: Some(Method::Diag), ..Default::default() },
        );
        assert!(matches!(forced, Err(FlimeError::DiagNonstatic)));
    }

    #[test]
    fn step_state_machine_errors() {
        let c_ops = [CollapseOperator::new(sigma_minus(), 0.1).unwrap()];
        let mut solver = FlimeSolver::from_hamiltonian(
            driven_tls(), T, &c_ops, 0.0, FlimeOptions::default()).unwrap();
        assert!(matches!(solver.step(0.1), Err(FlimeError::NotStarted)));
        solver.start(ground(), 0.0).unwrap();
        solver.step(0.1).unwrap();
        assert!(matches!(
            solver.step(0.05),
            Err(FlimeError::TimeReversed { .. }),
        ));
        // restarting resets the clock
        solver.start(ground(), 0.0).unwrap();
        solver.step(0.05).unwrap();
    }

    #[test]
    fn run_requires_ordered_times() {
        let c_ops = [CollapseOperator::new(sigma_minus(), 0.1).unwrap()];
        let mut solver = FlimeSolver::from_hamiltonian(
            driven_tls(), T, &c_ops, 0.0, FlimeOptions::default()).unwrap();
        assert!(matches!(
            solver.run(ground(), &[], &[]),
            Err(FlimeError::NoTimes),
        ));
        assert!(matches!(
            solver.run(ground(), &[0.0, 0.2, 0.1], &[]),
            Err(FlimeError::TimeReversed { .. }),
        ));
    }

    #[test]
    fn steadystate_rejects_nonsecular_cutoff() {
        let c_ops = [CollapseOperator::new(sigma_minus(), 0.1).unwrap()];
        let solver = FlimeSolver::from_hamiltonian(
            driven_tls(), T, &c_ops, 0.5, FlimeOptions::default()).unwrap();
        assert!(matches!(
            solver.steadystate(),
            Err(FlimeError::NonSecular(_)),
        ));
    }
}
