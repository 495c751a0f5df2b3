//! # Resilience Frontend
//!
//! Parser, AST, and validation for the network definition language used to
//! declare scenario resilience networks.

pub mod ast;
pub mod errors;
pub mod parser;
pub mod validate;

// Re-export commonly used types
pub use ast::*;
pub use errors::FrontendError;
pub use parser::parse_network;
pub use validate::validate_network;
