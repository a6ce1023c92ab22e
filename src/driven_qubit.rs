#![allow(dead_code, non_snake_case, non_upper_case_globals)]
#![allow(unused_imports, unused_variables, unused_mut)]

use std::{
    f64::consts::TAU,
    path::PathBuf,
};
use ndarray as nd;
use num_complex::Complex64 as C64;
use floquet_sim::{
    mkdir,
    write_npz,
    floquet::HPeriodic,
    hilbert::{ purity, trace },
    rate::CollapseOperator,
    solver::{ FlimeOptions, FlimeSolver },
};

const DELTA: f64 = TAU * 1.05; // MHz -- qubit splitting
const OMEGA_D: f64 = TAU * 1.00; // MHz -- drive frequency
const OMEGA_R: f64 = TAU * 0.05; // MHz -- drive strength
const GAMMA: f64 = 0.02; // 1/us -- spontaneous emission rate

const NPERIOD: usize = 40; // drive periods to evolve over
const NT: usize = 16; // output samples per period

fn main() -> anyhow::Result<()> {
    let outdir = PathBuf::from("output");
    mkdir!(outdir);

    // |e> = index 0, |g> = index 1; linear cosine drive keeps the
    // counter-rotating term
    let h0: nd::Array2<C64> = nd::array![
        [(DELTA / 2.0).into(), 0.0.into()],
        [0.0.into(), (-DELTA / 2.0).into()],
    ];
    let sx: nd::Array2<C64> = nd::array![
        [0.0.into(), (OMEGA_R / 2.0).into()],
        [(OMEGA_R / 2.0).into(), 0.0.into()],
    ];
    let h = HPeriodic::Terms {
        h0,
        terms: vec![
            (sx, std::rc::Rc::new(|t: f64| ((OMEGA_D * t).cos()).into())),
        ],
    };
    let period: f64 = TAU / OMEGA_D;

    let sm: nd::Array2<C64> = nd::array![
        [0.0.into(), 0.0.into()],
        [1.0.into(), 0.0.into()],
    ];
    let c_ops = [CollapseOperator::new(sm, GAMMA)?];

    let options = FlimeOptions {
        store_states: Some(true),
        normalize_output: false,
        progress_bar: true,
        nt: Some(NT),
        ..Default::default()
    };
    let mut solver
        = FlimeSolver::from_hamiltonian(h, period, &c_ops, 0.0, options)?;
    println!("quasi-energies = {:.6?}", solver.basis().quasienergies());

    let time: nd::Array1<f64>
        = nd::Array1::linspace(
            0.0, NPERIOD as f64 * period, NPERIOD * NT + 1);
    let psi0: nd::Array1<C64> = nd::array![1.0.into(), 0.0.into()];

    println!("evolve");
    let result = solver.run(psi0, time.as_slice().unwrap(), &[])?;

    let n = result.len();
    let mut p_e: nd::Array1<f64> = nd::Array1::zeros(n);
    let mut p_g: nd::Array1<f64> = nd::Array1::zeros(n);
    let mut tr: nd::Array1<f64> = nd::Array1::zeros(n);
    let mut pur: nd::Array1<f64> = nd::Array1::zeros(n);
    for (x, rho) in result.states().iter().enumerate() {
        p_e[x] = rho[[0, 0]].re;
        p_g[x] = rho[[1, 1]].re;
        tr[x] = trace(rho).re;
        pur[x] = purity(rho);
    }

    let rho_ss = solver.steadystate()?;
    println!("steady-state excited population = {:.6}", rho_ss[[0, 0]].re);

    write_npz!(
        outdir.join("driven_qubit.npz"),
        arrays: {
            "time" => &time,
            "p_e" => &p_e,
            "p_g" => &p_g,
            "trace" => &tr,
            "purity" => &pur,
        }
    );

    println!("done");
    Ok(())
}
