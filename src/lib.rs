#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_panics_doc, clippy::module_name_repetitions)]

#[macro_use]
pub mod pcnf;
mod clause;
pub mod cli;
mod datastructure;
mod literal;
pub mod mem;
pub mod qbce;
pub mod qdimacs;
mod quantifier;
pub mod signals;

// Re-export
pub use clause::{Clause, ClauseId};
pub use literal::{Lit, Var};
pub use quantifier::QuantTy;
