//! Harmonic-resolved dissipation tensor for a periodically driven open
//! system.
//!
//! Collapse operators are moved into the Floquet frame, sampled over one
//! drive period, and decomposed into Fourier harmonics. Products of pairs of
//! harmonic amplitudes are then binned by their net oscillation frequency
//! into Lindblad-form rate matrices, one per retained [`HarmonicKey`].

use indexmap::IndexMap;
use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rustc_hash::FxHashMap;
use rustfft::FftPlanner;
use crate::{
    error::FlimeError,
    floquet::FloquetBasis,
    hilbert::dagger,
};

/// Number of mode samples per drive period used when none can be inferred
/// from a time grid.
pub const DEFAULT_NT: usize = 16;

// harmonic shifts are keyed after rounding at this scale
const KEY_SCALE: f64 = 1e6;

/// A jump operator together with its dissipation rate.
///
/// The rate is folded into the operator as a factor of `rate.sqrt()` before
/// any amplitude products are formed, so every rate matrix built from the
/// operator scales linearly with `rate`.
#[derive(Clone, Debug, PartialEq)]
pub struct CollapseOperator {
    matrix: nd::Array2<C64>,
    rate: f64,
}

impl CollapseOperator {
    /// Create a new collapse operator, verifying that the matrix is square
    /// and the rate finite and non-negative.
    pub fn new(matrix: nd::Array2<C64>, rate: f64)
        -> Result<Self, FlimeError>
    {
        let (rows, cols) = matrix.dim();
        if rows != cols {
            return Err(FlimeError::BadCollapseShape { dim: rows, rows, cols });
        }
        if !rate.is_finite() || rate < 0.0 {
            return Err(FlimeError::BadRate(rate));
        }
        Ok(Self { matrix, rate })
    }

    /// The bare jump operator.
    pub fn matrix(&self) -> &nd::Array2<C64> { &self.matrix }

    /// The dissipation rate.
    pub fn rate(&self) -> f64 { self.rate }

    // jump operator with the rate folded in as an amplitude
    pub(crate) fn scaled(&self) -> nd::Array2<C64> {
        let s = self.rate.sqrt();
        self.matrix.mapv(|a| a * s)
    }
}

/// Net harmonic shift of an amplitude product in units of the drive
/// frequency, rounded to six decimal places and stored as an integer
/// multiple of `1e-6`.
///
/// Rounding collapses shifts that differ only by floating-point noise onto
/// the same key; shift `0` is the static (time-averaged) sector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HarmonicKey(i64);

impl HarmonicKey {
    /// Round a raw shift, in units of the drive frequency, onto the key
    /// lattice.
    pub fn from_shift(shift: f64) -> Self {
        Self((shift * KEY_SCALE).round() as i64)
    }

    /// The shift in units of the drive frequency.
    pub fn shift(self) -> f64 { self.0 as f64 / KEY_SCALE }

    /// The underlying integer multiple of `1e-6`.
    pub fn raw(self) -> i64 { self.0 }

    /// `true` if this is the zero-shift (time-averaged) sector.
    pub fn is_static(self) -> bool { self.0 == 0 }
}

/// Infer a number of mode samples per drive period from a time grid.
///
/// The inferred value is the number of leading grid points needed to cover
/// one period; grids coarser than the period (or shorter than two points)
/// fall back to [`DEFAULT_NT`].
pub fn infer_nt(times: &[f64], period: f64) -> usize {
    if times.len() < 2 {
        return DEFAULT_NT;
    }
    let dt = times[1] - times[0];
    if dt >= period {
        return DEFAULT_NT;
    }
    let mut best: usize = 0;
    let mut best_val: f64 = f64::INFINITY;
    for (x, &t) in times.iter().enumerate() {
        let val = ((t - times[0]) + dt - period).abs();
        if val < best_val {
            best_val = val;
            best = x;
        }
    }
    best + 1
}

/// Decompose an operator, moved into the Floquet frame, into its Fourier
/// harmonics over one drive period.
///
/// The operator is sampled as `Φ(t_x)† C Φ(t_x)` at `nt` evenly spaced times
/// `t_x = x T / nt` and transformed with an unnormalized forward FFT, then
/// shifted so that the zero harmonic sits at index `nt / 2` and scaled by
/// `1 / nt`. Index `m` of the output holds the amplitude of
/// `e^{+i (m - nt/2) ω t}`.
pub fn fourier_amplitudes(
    basis: &FloquetBasis,
    op: &nd::Array2<C64>,
    nt: usize,
) -> Result<nd::Array3<C64>, FlimeError>
{
    let dim = basis.dim();
    let period = basis.period();
    let mut framed: nd::Array3<C64> = nd::Array3::zeros((nt, dim, dim));
    for x in 0..nt {
        let t = period * x as f64 / nt as f64;
        let phi = basis.mode(t)?;
        let sandwich = dagger(&phi).dot(op).dot(&phi);
        framed.index_axis_mut(nd::Axis(0), x).assign(&sandwich);
    }
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nt);
    let mut buf: Vec<C64> = vec![C64::from(0.0); nt];
    let mut amps: nd::Array3<C64> = nd::Array3::zeros((nt, dim, dim));
    for i in 0..dim {
        for j in 0..dim {
            for x in 0..nt { buf[x] = framed[[x, i, j]]; }
            fft.process(&mut buf);
            for m in 0..nt {
                let src = (m + (nt + 1) / 2) % nt;
                amps[[m, i, j]] = buf[src] / nt as f64;
            }
        }
    }
    Ok(amps)
}

/// Map from harmonic shifts to Lindblad-form rate matrices acting on
/// vectorized Floquet-frame density matrices.
///
/// Each entry is a `dim² × dim²` matrix in row-major vectorization; the full
/// dissipative generator at time `t` is the sum of all entries weighted by
/// `e^{i shift ω t}`. Keys are held sorted by shift.
#[derive(Clone, Debug)]
pub struct RateTensor {
    dim: usize,
    omega: f64,
    map: IndexMap<HarmonicKey, nd::Array2<C64>>,
}

impl RateTensor {
    /// Build the rate tensor for a set of collapse operators.
    ///
    /// Amplitude products `A_l[i, j] · conj(A_k[p, q])` oscillate at the
    /// net shift `((e_j - e_i) - (e_q - e_p)) / ω + (l - k)`; a product is
    /// retained iff `|shift · ω| ≤ |product| · time_sense`, so `time_sense
    /// = 0` keeps only shifts that vanish exactly. Retained products are
    /// accumulated into their key's matrix in Lindblad form.
    pub fn build(
        basis: &FloquetBasis,
        c_ops: &[CollapseOperator],
        nt: usize,
        time_sense: f64,
    ) -> Result<Self, FlimeError>
    {
        if !(time_sense >= 0.0) {
            return Err(FlimeError::BadCutoff(time_sense));
        }
        let nt = nt.max(1);
        let dim = basis.dim();
        let omega = basis.omega();
        let e = basis.quasienergies();
        // gaps[[i, j]] = e_j - e_i, precomputed so that equal gaps cancel
        // to exactly zero in the shift computation below
        let mut gaps: nd::Array2<f64> = nd::Array2::zeros((dim, dim));
        for ((i, j), g) in gaps.indexed_iter_mut() { *g = e[j] - e[i]; }
        let mut map: IndexMap<HarmonicKey, nd::Array2<C64>> = IndexMap::new();
        for c_op in c_ops.iter() {
            let (rows, cols) = c_op.matrix().dim();
            if rows != dim || cols != dim {
                return Err(FlimeError::BadCollapseShape { dim, rows, cols });
            }
            let amps = fourier_amplitudes(basis, &c_op.scaled(), nt)?;
            for (l, k) in (0..nt).cartesian_product(0..nt) {
                let a_l = amps.index_axis(nd::Axis(0), l);
                let a_k = amps.index_axis(nd::Axis(0), k);
                let shift_lk = l as f64 - k as f64;
                let mut tmp_by_key: FxHashMap<HarmonicKey, nd::Array2<C64>>
                    = FxHashMap::default();
                for i in 0..dim {
                    for j in 0..dim {
                        for p in 0..dim {
                            for q in 0..dim {
                                let shift = (gaps[[i, j]] - gaps[[p, q]])
                                    / omega + shift_lk;
                                let v = a_l[[i, j]] * a_k[[p, q]].conj();
                                if (shift * omega).abs()
                                    > v.norm() * time_sense
                                {
                                    continue;
                                }
                                let key = HarmonicKey::from_shift(shift);
                                let r = map.entry(key)
                                    .or_insert_with(|| {
                                        nd::Array2::zeros(
                                            (dim * dim, dim * dim))
                                    });
                                r[[i * dim + p, j * dim + q]] += v;
                                if p == i {
                                    let tmp = tmp_by_key.entry(key)
                                        .or_insert_with(|| {
                                            nd::Array2::zeros((dim, dim))
                                        });
                                    tmp[[j, q]] += v;
                                }
                            }
                        }
                    }
                }
                // anticommutator halves of the Lindblad form: subtract
                // ½ kron(tmpᵀ, 1) + ½ kron(1, tmp) for each key's trace
                for (key, tmp) in tmp_by_key.iter() {
                    let r = map.get_mut(key)
                        .expect("build: missing rate matrix for tallied key");
                    for i in 0..dim {
                        for j in 0..dim {
                            for p in 0..dim {
                                r[[i * dim + p, j * dim + p]]
                                    -= tmp[[j, i]] * 0.5;
                            }
                        }
                    }
                    for i in 0..dim {
                        for p in 0..dim {
                            for q in 0..dim {
                                r[[i * dim + p, i * dim + q]]
                                    -= tmp[[p, q]] * 0.5;
                            }
                        }
                    }
                }
            }
        }
        map.sort_keys();
        Ok(Self { dim, omega, map })
    }

    /// Hilbert-space dimension; rate matrices are `dim² × dim²`.
    pub fn dim(&self) -> usize { self.dim }

    /// Drive angular frequency the shifts are relative to.
    pub fn omega(&self) -> f64 { self.omega }

    /// Number of retained harmonic shifts.
    pub fn len(&self) -> usize { self.map.len() }

    /// `true` if no amplitude products were retained at all.
    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    /// Retained keys in ascending shift order.
    pub fn keys(&self) -> impl Iterator<Item = HarmonicKey> + '_ {
        self.map.keys().copied()
    }

    /// Iterate over `(key, rate matrix)` pairs in ascending shift order.
    pub fn iter(&self)
        -> impl Iterator<Item = (HarmonicKey, &nd::Array2<C64>)> + '_
    {
        self.map.iter().map(|(key, r)| (*key, r))
    }

    /// The rate matrix for a single key.
    pub fn get(&self, key: HarmonicKey) -> Option<&nd::Array2<C64>> {
        self.map.get(&key)
    }

    /// The zero-shift rate matrix, if any products landed there.
    pub fn static_part(&self) -> Option<&nd::Array2<C64>> {
        self.map.get(&HarmonicKey::from_shift(0.0))
    }

    /// `true` if every retained shift is the static one.
    pub fn is_secular(&self) -> bool {
        self.map.keys().all(|key| key.is_static())
    }
}
