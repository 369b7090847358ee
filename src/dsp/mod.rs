//! Signal conditioning for respiration amplitude

mod filter;

pub use filter::LowPassFilter;
