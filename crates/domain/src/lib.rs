//! Domain layer for Kasa
//!
//! Contains the value objects and errors shared across the speech subsystem.
//! This layer performs no I/O and defines the ubiquitous language.

pub mod errors;
pub mod value_objects;

pub use errors::DomainError;
pub use value_objects::*;
