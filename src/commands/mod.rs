pub mod parser;
pub mod types;

pub use parser::Grammar;
pub use types::{Command, CommandKind, Modifiers};
