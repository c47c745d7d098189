pub mod face;
pub mod keep;
