//! Object rendering pipeline (spec.md §4.11, §4.14).

pub mod decorrelate;
pub mod gain_calc;
pub mod renderer;

pub use gain_calc::GainCalc;
pub use renderer::ObjectRenderer;
