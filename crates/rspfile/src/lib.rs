//! Compiler response file parsing for Hivebuild.
//!
//! A response file holds one compiler argument per line. This crate turns it
//! into a structured [`CompileUnitDescriptor`] and, unless the unit is pinned
//! local, resolves the header dependency set the remote path needs. Missing
//! required fields are a fallback signal (`Ok(None)`, run locally), never an
//! error.

mod descriptor;
mod error;
mod parser;

pub use descriptor::{CompileUnitDescriptor, ToolArchitecture};
pub use error::ParseError;
pub use parser::ResponseFileParser;
