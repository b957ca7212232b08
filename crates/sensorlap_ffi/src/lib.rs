//! FFI entry crate for the Flutter dashboard shell.
//!
//! # Responsibility
//! - Host the FRB-exported API surface in [`api`].

pub mod api;
