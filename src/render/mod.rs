pub mod bars;
pub mod interpolate;
pub mod scheduler;
