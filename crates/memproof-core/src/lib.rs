#![deny(missing_docs)]

//! # memproof-core: Foundational Types for memproof
//!
//! This crate defines the types every other crate in the workspace agrees
//! on. It has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **One field encoding.** Every value that enters a tree, a commitment
//!    or a circuit witness is a [`FieldElement`]: an element of the BN254
//!    scalar field, reduced modulo `r` on construction. The tree, the hasher
//!    and the proof engine cannot disagree about encoding because there is
//!    only one type.
//!
//! 2. **Decimal strings on every wire.** Field elements can exceed native
//!    integer width, so they serialize as canonical decimal strings, the
//!    format circuit tooling expects for witnesses and public signals.
//!
//! 3. **Structured errors.** Errors use `thiserror`; no `Box<dyn Error>`,
//!    no `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod field;
pub mod persist;

// Re-export primary types at crate root for ergonomic imports.
pub use digest::{sha256_raw, Sha256Accumulator};
pub use error::{FieldError, MemproofError};
pub use field::FieldElement;
