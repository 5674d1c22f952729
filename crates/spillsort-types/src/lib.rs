//! Typed value model and byte codec shared by the spillsort engine.
//!
//! The engine sorts rows of [`Datum`] tuples. This crate supplies the value
//! type, the fallible typed comparison it performs under a
//! [`StatementContext`], and the self-delimiting per-value codec used by the
//! on-disk run format.

pub mod codec;
pub mod context;
pub mod value;

pub use codec::DecodeError;
pub use context::{Collation, CrossTypePolicy, StatementContext};
pub use value::{CompareError, Datum, StorageClass};
