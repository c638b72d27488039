//! Terrain derivatives of a conditioned DEM
//!
//! - Slope: steepest gradient, in degrees
//! - Aspect: compass bearing of the downslope direction
//! - TWI: topographic wetness index from accumulation and slope

mod aspect;
mod gradient;
mod slope;
mod twi;

pub use aspect::{aspect, Aspect, FLAT_ASPECT};
pub use slope::{slope, Slope};
pub use twi::twi;
