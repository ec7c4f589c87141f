use std::error::Error;
use std::fmt;

/// The one recoverable failure in this crate: a VM value did not have
/// the shape a conversion asked for. Everything else the handle layer
/// can get wrong is a usage bug and panics instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl TypeMismatch {
    pub fn new(expected: &'static str, found: &'static str) -> Self {
        TypeMismatch { expected, found }
    }
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type mismatch: expected {}, found {}",
            self.expected, self.found
        )
    }
}

impl Error for TypeMismatch {}
