//! Numerical solvers

mod root;

pub use root::{brent, RootError, RootParams};
