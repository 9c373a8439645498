pub mod error;
pub mod runtime;

pub use error::InvalidRuntimeFormat;
pub use runtime::Runtime;
