#![allow(dead_code, non_snake_case, non_upper_case_globals)]

pub mod utils;
pub mod error;
pub mod hilbert;
pub mod integrate;
pub mod floquet;
pub mod rate;
pub mod generator;
pub mod result;
pub mod solver;
