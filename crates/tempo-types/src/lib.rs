//! Foundation types for the Tempo persistent-object storage core.
//!
//! This crate provides the identity, lifecycle, and caching primitives used
//! throughout the Tempo system. Every other Tempo crate depends on
//! `tempo-types`.
//!
//! # Key Types
//!
//! - [`Oid`] — Opaque, globally-unique persistent-object identifier
//! - [`Lifecycle`] — Reference-count-driven New/Managed/Old state shared by
//!   objects and database addresses
//! - [`CachedValue`] — Time-boxed cache cell wrapping a loader callback
//! - [`Principal`] — Caller identity handed to access-control hooks
//! - [`TypeError`] — Parse and conversion failures, carrying input + offset

pub mod cache;
pub mod error;
pub mod lifecycle;
pub mod oid;
pub mod principal;

pub use cache::CachedValue;
pub use error::TypeError;
pub use lifecycle::Lifecycle;
pub use oid::Oid;
pub use principal::Principal;
