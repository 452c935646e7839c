//! Tree-oriented serializer for the Tempo storage engine.
//!
//! Persistent objects become elements of one document per database: the
//! element name is the kind tag, properties and association targets are
//! attributes, and aggregated children nest under their parents.
//! [`TreeBackend`] plugs the document into the database core as a
//! [`StorageBackend`](tempo_db::StorageBackend), optionally persisted to a
//! single file.
//!
//! # Key Types
//!
//! - [`Element`] — one node of the parsed document tree
//! - [`Document`] — a whole database as an element tree, rooted at
//!   `tempo-database`
//! - [`TreeBackend`] — tree [`StorageBackend`](tempo_db::StorageBackend),
//!   in-memory or file-backed
//!
//! # Design Rules
//!
//! - Parsing a markup syntax is out of scope; only the object↔element
//!   mapping lives here, and documents persist through serde.
//! - Decoding is two-pass: structure first, association attributes resolved
//!   once every element is known. Association edges are never followed
//!   during the walk, so cycles through them cannot recurse.

pub mod backend;
pub mod document;
pub mod element;
pub mod error;
pub mod serializer;

pub use backend::TreeBackend;
pub use document::{Document, ROOT_TAG};
pub use element::{Element, OID_ATTR};
pub use error::{TreeError, TreeResult};
