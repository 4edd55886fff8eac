//! Core term model for the SYRA reasoning runtime.
//!
//! This crate defines the four atom shapes and their canonical interned
//! identity, the per-atom belief/importance metadata, variable bindings,
//! unification and substitution, and the surface-syntax parser. Everything
//! here is pure with respect to the runtime: the store, interpreter, and
//! scheduler live in `syra-runtime`.

pub mod atom;
pub mod bindings;
pub mod error;
pub mod parse;
pub mod unify;
pub mod value;

pub use atom::{Atom, AtomId, AtomKind, GroundedValue, Interner};
pub use bindings::Bindings;
pub use error::RuntimeError;
pub use parse::{parse_all, parse_one, ParseError};
pub use unify::{substitute, unify};
pub use value::{AtomValue, Belief, Importance};
