//! Transport abstraction
//!
//! The driver never touches pins or peripheral registers itself. Everything
//! it sends goes through a [`QspiBus`], which an integrator implements for
//! their controller.

mod traits;

pub use traits::*;
