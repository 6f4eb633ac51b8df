//! # cbor-skim
//!
//! Lazy, offset-driven querying over raw CBOR buffers (RFC 8949).
//!
//! ## Design principles
//!
//! - **The buffer is the value.**
//!   Nothing is parsed into a tree up front. A [`LazyValue`] is a typed
//!   position in the input; accessors decode exactly the bytes they need,
//!   and container children are located arithmetically by skip-walking item
//!   spans.
//! - **Queries are stage trees.**
//!   A compiled [`Query`] is a tree of stateless [`Stage`]s driven by one
//!   mutable [`QueryContext`]. The same compiled query can run over any
//!   number of buffers, concurrently.
//! - **Absence is a value, errors are errors.**
//!   A missed key or index makes the cursor absent and ultimately yields a
//!   well-defined null; malformed bytes and impossible type requests are
//!   [`Error`]s with a stable [`ErrorCode`] and the byte offset.
//!
//! ## Querying
//!
//! ```
//! use cbor_skim::{Input, QueryBuilder, Reader};
//!
//! // {"name": "v", "deps": ["a", "b"]}
//! let doc: &[u8] = &[
//!     0xa2, 0x64, b'n', b'a', b'm', b'e', 0x61, b'v', 0x64, b'd', b'e',
//!     b'p', b's', 0x82, 0x61, b'a', 0x61, b'b',
//! ];
//!
//! let reader = Reader::new();
//! let query = QueryBuilder::new()
//!     .dictionary_key("deps")
//!     .sequence_index(1)
//!     .build()?;
//!
//! let hit = reader.read(Input::from(doc), &query)?.unwrap();
//! assert_eq!(hit.materialize()?, cbor_skim::Value::Text("b".into()));
//! # Ok::<(), cbor_skim::Error>(())
//! ```
//!
//! ## Select statements
//!
//! A select statement rebuilds a shape out of several positions in one pass.
//! With the default [`StrategyKind::Projection`] the result is one owned
//! [`Value`]; with [`StrategyKind::Selection`] every selected position is
//! streamed to the consumer as it is encountered, absent ones as nulls.
//!
//! ## Semantic tags
//!
//! Tags 0, 1, 2, 3, 24, and 32 decode out of the box ([`TagRegistry`]).
//! Unregistered tags stay opaque by default and can be made hard errors with
//! [`UnknownTagPolicy::Fail`].
//!
//! ## Feature flags
//!
//! - `simdutf8`: SIMD-accelerated UTF-8 validation where supported.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

mod classify;
mod context;
pub mod decode;
mod error;
mod input;
mod lazy;
mod major;
mod optimize;
mod pipeline;
mod query;
mod reader;
mod strategy;
mod stream;
mod tags;
pub(crate) mod utf8;
mod value;

pub use crate::classify::{value_type, ValueType};
pub use crate::context::{QueryContext, QueryValue, ValueConsumer};
pub use crate::decode::Length;
pub use crate::error::{Error, ErrorCode, ErrorKind};
pub use crate::input::Input;
pub use crate::lazy::{Dictionary, DictionaryIter, LazyValue, Sequence, SequenceIter};
pub use crate::major::MajorType;
pub use crate::optimize::{default_optimizers, DedupTypeMatch, FlattenBase, QueryOptimizer};
pub use crate::pipeline::{KeySpec, PipelineStage, Stage, TypeSpec, VisitResult};
pub use crate::query::{Query, QueryBuilder, StrategyKind};
pub use crate::reader::Reader;
pub use crate::strategy::{ProjectionStrategy, SelectStatementStrategy, SelectionStrategy};
pub use crate::tags::{TagDecoderFn, TagRegistry, TagValue, UnknownTagPolicy};
pub use crate::value::{BigInt, Number, Value};
