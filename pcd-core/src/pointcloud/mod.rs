pub mod clip;
pub mod point;
