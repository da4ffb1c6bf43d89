//! exval-core: serialize in-memory value graphs into executable source.
//!
//! Values live on a [`Heap`] whose realm models the host runtime's global
//! environment. A [`Serializer`] scans that environment once into a
//! [`PathTable`] of canonical access paths, then turns any value into one
//! expression that rebuilds it: shared values are bound once, cycles are
//! declared as placeholders and patched in place, and built-ins are
//! referenced by path instead of being re-created.
//!
//! # Public API
//!
//! - [`Serializer::configure()`] / [`Serializer::stringify()`] -- the pipeline
//! - [`Options`] -- serializer configuration
//! - [`Heap`], [`Value`], [`Property`] -- the value model
//! - [`load()`] -- materialize a JSON graph document onto a heap
//! - [`ExvalError`], [`DocumentError`] -- error types
//!
//! ```
//! use exval_core::{Heap, Options, Serializer};
//!
//! let mut heap = Heap::new();
//! let point = heap.object();
//! heap.set(point, "x", 1.0);
//! heap.set(point, "y", 2.0);
//!
//! let serializer = Serializer::configure(&heap, Options::default());
//! let source = serializer.stringify(&heap, &point.into()).unwrap();
//! assert_eq!(source, "{x:1,y:2}");
//! ```

pub mod assemble;
pub mod callable;
pub mod descriptor;
pub mod document;
pub mod encoder;
pub mod error;
pub mod heap;
pub mod literal;
pub mod path_table;
pub mod realm;
pub mod serializer;

// ── Convenience re-exports ───────────────────────────────────────────

pub use document::{load, materialize, GraphDocument};
pub use error::{AccessDenied, DocumentError, ExvalError};
pub use heap::{Heap, HeapObject, ObjectId, ObjectKind, Property, Slot, SymbolId, Value};
pub use path_table::{PathStep, PathTable};
pub use realm::Intrinsics;
pub use serializer::{Options, Serializer};
