#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid runtime data")]
pub struct InvalidRuntimeFormat;
