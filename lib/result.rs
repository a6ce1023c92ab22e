//! Output of a solver run.

use ndarray as nd;
use num_complex::Complex64 as C64;

/// Sampled states and expectation-value series from a solver run.
///
/// Which fields are populated follows the options the solver was built
/// with: `states` and `floquet_states` are empty unless their storage was
/// requested, and `final_state` is `None` unless requested. Expectation
/// series are kept as raw complex traces, one series per observable in the
/// order they were passed.
#[derive(Clone, Debug)]
pub struct FloquetResult {
    times: Vec<f64>,
    states: Vec<nd::Array2<C64>>,
    floquet_states: Vec<nd::Array2<C64>>,
    expect: Vec<Vec<C64>>,
    final_state: Option<nd::Array2<C64>>,
}

impl FloquetResult {
    pub(crate) fn assemble(
        times: Vec<f64>,
        states: Vec<nd::Array2<C64>>,
        floquet_states: Vec<nd::Array2<C64>>,
        expect: Vec<Vec<C64>>,
        final_state: Option<nd::Array2<C64>>,
    ) -> Self
    {
        Self { times, states, floquet_states, expect, final_state }
    }

    /// Number of sample times.
    pub fn len(&self) -> usize { self.times.len() }

    pub fn is_empty(&self) -> bool { self.times.is_empty() }

    /// Sample times, as passed to the solver.
    pub fn times(&self) -> &[f64] { &self.times }

    /// Lab-frame density matrices at each sample time; empty if state
    /// storage was not requested.
    pub fn states(&self) -> &[nd::Array2<C64>] { &self.states }

    /// Floquet-frame density matrices at each sample time; empty if their
    /// storage was not requested.
    pub fn floquet_states(&self) -> &[nd::Array2<C64>] {
        &self.floquet_states
    }

    /// Expectation-value series, one per observable.
    pub fn expect(&self) -> &[Vec<C64>] { &self.expect }

    /// The state at the last sample time, if its storage was requested.
    pub fn final_state(&self) -> Option<&nd::Array2<C64>> {
        self.final_state.as_ref()
    }
}
