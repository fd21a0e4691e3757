pub mod types;

pub use types::{BatchMetadata, Layer};
