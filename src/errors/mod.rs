pub mod types;

pub use types::OutriderError;
