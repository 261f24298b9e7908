//! HOA (Higher-Order Ambisonics) rendering pipeline (spec.md §4.13, §4.16).

pub mod design;
pub mod hoa_math;
pub mod renderer;

pub use design::HoaDecoderDesign;
pub use renderer::HoaRenderer;
