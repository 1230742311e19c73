pub mod frame;
pub mod geometry;
pub mod runtime;

pub use frame::*;
pub use geometry::*;
pub use runtime::*;
