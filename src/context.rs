//! Mutable query execution state.
//!
//! A [`QueryContext`] is the single mutable object threaded through a pipeline
//! run: the current offset cursor, the select strategy, and the consumer that
//! receives emitted values. Stages themselves stay stateless.

use crate::input::Input;
use crate::lazy::{LazyValue, SequenceIter};
use crate::strategy::SelectStatementStrategy;
use crate::tags::TagRegistry;
use crate::value::Value;
use crate::Error;

/// A value emitted by query execution.
///
/// Navigation emits [`QueryValue::Stream`] handles into the original buffer;
/// projection emits owned [`QueryValue::Object`] trees rebuilt by the
/// strategy.
#[derive(Debug, Clone)]
pub enum QueryValue<'a> {
    /// A lazy handle into the queried buffer.
    Stream(LazyValue<'a>),
    /// An owned value produced by a select statement.
    Object(Value),
}

impl QueryValue<'_> {
    /// Convert into an owned [`Value`], decoding stream handles fully.
    ///
    /// # Errors
    ///
    /// Any decode error reachable from a stream handle.
    pub fn materialize(&self) -> Result<Value, Error> {
        match self {
            Self::Stream(v) => v.materialize(),
            Self::Object(v) => Ok(v.clone()),
        }
    }
}

/// Receiver for values a query emits.
///
/// Return `false` to stop the run; remaining stages see `Exit`.
pub trait ValueConsumer<'a> {
    /// Accept one emitted value; `false` requests early termination.
    fn accept(&mut self, value: QueryValue<'a>) -> bool;
}

impl<'a, F: FnMut(QueryValue<'a>) -> bool> ValueConsumer<'a> for F {
    fn accept(&mut self, value: QueryValue<'a>) -> bool {
        self(value)
    }
}

/// One open sequence-stream iteration: the element iterator plus the cursor
/// to restore once the stream is exhausted.
struct StreamFrame<'a> {
    iter: SequenceIter<'a>,
    saved: Option<usize>,
}

/// The mutable state of one query run.
///
/// The cursor is `Option<usize>`: `Some(offset)` points at the current item,
/// `None` means the current position is absent (a missed key or index).
/// Absence is ordinary state, not an error; entry stages turn it into
/// well-defined nulls.
pub struct QueryContext<'a, 'c> {
    input: Input<'a>,
    tags: &'a TagRegistry,
    offset: Option<usize>,
    strategy: Box<dyn SelectStatementStrategy>,
    consumer: &'c mut dyn ValueConsumer<'a>,
    streams: Vec<StreamFrame<'a>>,
    done: bool,
}

impl<'a, 'c> QueryContext<'a, 'c> {
    /// Start a run at offset 0 of `input`.
    pub fn new(
        input: Input<'a>,
        tags: &'a TagRegistry,
        strategy: Box<dyn SelectStatementStrategy>,
        consumer: &'c mut dyn ValueConsumer<'a>,
    ) -> Self {
        Self {
            input,
            tags,
            offset: Some(0),
            strategy,
            consumer,
            streams: Vec::new(),
            done: false,
        }
    }

    /// Open a stream iteration over `iter`, remembering the current cursor.
    ///
    /// Frames nest with stage evaluation: an inner stream opened by a child
    /// stage is closed before the child returns, so the innermost frame always
    /// belongs to the stage driving it.
    pub(crate) fn open_stream(&mut self, iter: SequenceIter<'a>) {
        self.streams.push(StreamFrame {
            iter,
            saved: self.offset,
        });
    }

    /// The next element of the innermost stream, `None` when exhausted.
    pub(crate) fn advance_stream(&mut self) -> Option<Result<LazyValue<'a>, Error>> {
        self.streams.last_mut()?.iter.next()
    }

    /// Close the innermost stream; returns the cursor saved when it opened.
    pub(crate) fn close_stream(&mut self) -> Option<usize> {
        self.streams.pop().and_then(|frame| frame.saved)
    }

    /// The buffer under query.
    #[inline]
    #[must_use]
    pub const fn input(&self) -> Input<'a> {
        self.input
    }

    /// The current cursor, `None` when positioned at an absent value.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Move the cursor.
    #[inline]
    pub fn set_offset(&mut self, offset: Option<usize>) {
        self.offset = offset;
    }

    /// The lazy value at the cursor, `None` when the cursor is absent.
    ///
    /// # Errors
    ///
    /// Returns format errors if the item at the cursor cannot be classified.
    pub fn lazy_value(&self) -> Result<Option<LazyValue<'a>>, Error> {
        self.offset
            .map(|off| LazyValue::new(self.input, self.tags, off))
            .transpose()
    }

    /// Hand a value to the consumer; `false` means the run should exit.
    pub fn emit(&mut self, value: QueryValue<'a>) -> bool {
        if self.done {
            return false;
        }
        if !self.consumer.accept(value) {
            self.done = true;
        }
        !self.done
    }

    /// Open a sequence select scope, keyed when nested under a dictionary
    /// entry.
    pub fn begin_sequence(&mut self, key: Option<Value>) {
        self.strategy.begin_sequence(key);
    }

    /// Close the current sequence select scope; emits the finished root when
    /// this was the outermost scope.
    ///
    /// # Errors
    ///
    /// Returns `UnbalancedSelect` if no scope is open.
    pub fn end_sequence(&mut self) -> Result<bool, Error> {
        match self.strategy.end_sequence()? {
            Some(root) => Ok(self.emit(QueryValue::Object(root))),
            None => Ok(true),
        }
    }

    /// Open a dictionary select scope, keyed when nested under a dictionary
    /// entry.
    pub fn begin_dictionary(&mut self, key: Option<Value>) {
        self.strategy.begin_dictionary(key);
    }

    /// Close the current dictionary select scope; emits the finished root when
    /// this was the outermost scope.
    ///
    /// # Errors
    ///
    /// Returns `UnbalancedSelect` if no scope is open.
    pub fn end_dictionary(&mut self) -> Result<bool, Error> {
        match self.strategy.end_dictionary()? {
            Some(root) => Ok(self.emit(QueryValue::Object(root))),
            None => Ok(true),
        }
    }

    /// Feed one sequence entry value to the strategy.
    ///
    /// # Errors
    ///
    /// Strategy errors (`UnbalancedSelect`) or decode errors while the
    /// projection strategy materializes.
    pub fn put_sequence_value(&mut self, value: LazyValue<'a>) -> Result<bool, Error> {
        match self.strategy.put_sequence_value(value)? {
            Some(out) => Ok(self.emit(out)),
            None => Ok(true),
        }
    }

    /// Feed an absent sequence entry to the strategy.
    ///
    /// # Errors
    ///
    /// Strategy errors (`UnbalancedSelect`).
    pub fn put_sequence_null(&mut self) -> Result<bool, Error> {
        match self.strategy.put_sequence_null()? {
            Some(out) => Ok(self.emit(QueryValue::Object(out))),
            None => Ok(true),
        }
    }

    /// Feed one dictionary entry to the strategy.
    ///
    /// # Errors
    ///
    /// Strategy errors (`UnbalancedSelect`) or decode errors while the
    /// projection strategy materializes.
    pub fn put_dictionary_value(&mut self, key: Value, value: LazyValue<'a>) -> Result<bool, Error> {
        match self.strategy.put_dictionary_value(key, value)? {
            Some(out) => Ok(self.emit(out)),
            None => Ok(true),
        }
    }

    /// Feed an absent dictionary entry to the strategy.
    ///
    /// # Errors
    ///
    /// Strategy errors (`UnbalancedSelect`).
    pub fn put_dictionary_null(&mut self, key: Value) -> Result<bool, Error> {
        match self.strategy.put_dictionary_null(key)? {
            Some(out) => Ok(self.emit(QueryValue::Object(out))),
            None => Ok(true),
        }
    }
}
