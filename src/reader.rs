//! The top-level entry point: run queries against buffers.
//!
//! A [`Reader`] bundles the tag registry and the optimizer chain. It holds no
//! per-run state, so one reader can serve any number of buffers and queries.

use crate::context::{QueryContext, QueryValue, ValueConsumer};
use crate::input::Input;
use crate::lazy::LazyValue;
use crate::optimize::{self, QueryOptimizer};
use crate::query::{Query, StrategyKind};
use crate::strategy::{ProjectionStrategy, SelectStatementStrategy, SelectionStrategy};
use crate::tags::{TagDecoderFn, TagRegistry, UnknownTagPolicy};
use crate::value::Value;
use crate::{Error, ErrorCode};

/// Executes compiled queries over CBOR buffers.
pub struct Reader {
    tags: TagRegistry,
    optimizers: Vec<Box<dyn QueryOptimizer>>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    /// A reader with the built-in tag decoders and the default optimizer
    /// chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tags: TagRegistry::default(),
            optimizers: optimize::default_optimizers(),
        }
    }

    /// Replace the tag registry wholesale.
    #[must_use]
    pub fn with_tag_registry(mut self, tags: TagRegistry) -> Self {
        self.tags = tags;
        self
    }

    /// Register (or replace) the decoder for one tag number.
    #[must_use]
    pub fn with_tag_decoder(mut self, tag: u64, decoder: TagDecoderFn) -> Self {
        self.tags.register(tag, decoder);
        self
    }

    /// Set the policy for tags without a registered decoder.
    #[must_use]
    pub fn with_unknown_tag_policy(mut self, policy: UnknownTagPolicy) -> Self {
        self.tags = self.tags.with_unknown_tag_policy(policy);
        self
    }

    /// Append an optimizer to the chain.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Box<dyn QueryOptimizer>) -> Self {
        self.optimizers.push(optimizer);
        self
    }

    /// The reader's tag registry.
    #[must_use]
    pub const fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    /// Run the optimizer chain over a compiled query.
    ///
    /// Optimizers preserve semantics, so preparing is optional; it pays off
    /// for queries that run many times.
    #[must_use]
    pub fn prepare(&self, query: Query) -> Query {
        let (root, strategy) = query.into_parts();
        Query::from_parts(optimize::run(&self.optimizers, root), strategy)
    }

    /// Run `query` and return the first emitted value, `None` when the query
    /// positions at an absent value and emits nothing.
    ///
    /// # Errors
    ///
    /// Decode errors from evaluation; strategy errors from malformed select
    /// runs.
    pub fn read<'a>(
        &'a self,
        input: Input<'a>,
        query: &Query,
    ) -> Result<Option<QueryValue<'a>>, Error> {
        let mut single = SingleConsumer { slot: None };
        self.evaluate(input, query, &mut single)?;
        Ok(single.slot)
    }

    /// Run `query`, handing every emitted value to `consumer`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Reader::read`].
    pub fn read_many<'a>(
        &'a self,
        input: Input<'a>,
        query: &Query,
        consumer: &mut dyn ValueConsumer<'a>,
    ) -> Result<(), Error> {
        self.evaluate(input, query, consumer)
    }

    /// A lazy handle to the item at `offset`, without running a query.
    ///
    /// # Errors
    ///
    /// Format errors if no classifiable item starts at `offset`.
    pub fn read_at<'a>(&'a self, input: Input<'a>, offset: usize) -> Result<LazyValue<'a>, Error> {
        LazyValue::new(input, &self.tags, offset)
    }

    /// Run `query` and return the raw encoded span of the first result.
    ///
    /// Returns an empty slice when the query emits nothing or its first
    /// result is an absence null. Only defined for queries whose results are
    /// positions in the input; a projection query rebuilds values that have
    /// no source span.
    ///
    /// # Errors
    ///
    /// `ExtractUnsupported` for projection queries, otherwise the failure
    /// modes of [`Reader::read`].
    pub fn extract<'a>(&'a self, input: Input<'a>, query: &Query) -> Result<&'a [u8], Error> {
        if query.strategy() == StrategyKind::Projection {
            return Err(Error::compile(ErrorCode::ExtractUnsupported));
        }
        match self.read(input, query)? {
            None => Ok(&[]),
            Some(QueryValue::Stream(value)) => value.raw(),
            // The selection strategy signals an absent entry as an owned
            // null; it has no source span, so it reads as no match.
            Some(QueryValue::Object(Value::Null)) => Ok(&[]),
            Some(QueryValue::Object(_)) => Err(Error::compile(ErrorCode::ExtractUnsupported)),
        }
    }

    /// The raw encoded span of the item at `offset`.
    ///
    /// # Errors
    ///
    /// Format errors while walking the item.
    pub fn extract_at<'a>(&'a self, input: Input<'a>, offset: usize) -> Result<&'a [u8], Error> {
        self.read_at(input, offset)?.raw()
    }

    fn evaluate<'a>(
        &'a self,
        input: Input<'a>,
        query: &Query,
        consumer: &mut dyn ValueConsumer<'a>,
    ) -> Result<(), Error> {
        let strategy: Box<dyn SelectStatementStrategy> = match query.strategy() {
            StrategyKind::Selection => Box::new(SelectionStrategy::new()),
            StrategyKind::Projection => Box::new(ProjectionStrategy::new()),
        };
        let mut ctx = QueryContext::new(input, &self.tags, strategy, consumer);
        query.root().visit(&mut ctx)?;
        Ok(())
    }
}

/// Captures the first value and stops the run.
struct SingleConsumer<'a> {
    slot: Option<QueryValue<'a>>,
}

impl<'a> ValueConsumer<'a> for SingleConsumer<'a> {
    fn accept(&mut self, value: QueryValue<'a>) -> bool {
        self.slot = Some(value);
        false
    }
}
