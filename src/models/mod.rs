pub mod context;
pub mod result;

pub use context::*;
pub use result::*;
