//! Select statement strategies.
//!
//! A select statement can either stream every selected value straight to the
//! consumer ([`SelectionStrategy`]) or rebuild the selected shape as one owned
//! tree and emit it once at the end ([`ProjectionStrategy`]). The pipeline
//! drives both through the same eight calls; the strategy decides what each
//! call produces.

use crate::context::QueryValue;
use crate::lazy::LazyValue;
use crate::value::Value;
use crate::{Error, ErrorCode};

/// Behavior of a select statement's container and entry events.
///
/// `begin`/`end` calls must pair strictly; an `end` without a matching `begin`
/// is an `UnbalancedSelect` error. A `Some` return from an `end` or `put` call
/// is a value to emit to the consumer.
pub trait SelectStatementStrategy {
    /// A sequence scope opens; `key` is set when the scope sits under a
    /// dictionary entry of an enclosing scope.
    fn begin_sequence(&mut self, key: Option<Value>);

    /// The innermost sequence scope closes. Returns the finished root value
    /// when this was the outermost scope.
    ///
    /// # Errors
    ///
    /// `UnbalancedSelect` if no scope is open.
    fn end_sequence(&mut self) -> Result<Option<Value>, Error>;

    /// A dictionary scope opens; `key` is set when the scope sits under a
    /// dictionary entry of an enclosing scope.
    fn begin_dictionary(&mut self, key: Option<Value>);

    /// The innermost dictionary scope closes. Returns the finished root value
    /// when this was the outermost scope.
    ///
    /// # Errors
    ///
    /// `UnbalancedSelect` if no scope is open.
    fn end_dictionary(&mut self) -> Result<Option<Value>, Error>;

    /// A present value inside the current sequence scope.
    ///
    /// # Errors
    ///
    /// `UnbalancedSelect` if the current scope is not a sequence; decode
    /// errors if the strategy materializes the value.
    fn put_sequence_value<'a>(
        &mut self,
        value: LazyValue<'a>,
    ) -> Result<Option<QueryValue<'a>>, Error>;

    /// An absent value inside the current sequence scope.
    ///
    /// # Errors
    ///
    /// `UnbalancedSelect` if the current scope is not a sequence.
    fn put_sequence_null(&mut self) -> Result<Option<Value>, Error>;

    /// A present entry inside the current dictionary scope.
    ///
    /// # Errors
    ///
    /// `UnbalancedSelect` if the current scope is not a dictionary; decode
    /// errors if the strategy materializes the value.
    fn put_dictionary_value<'a>(
        &mut self,
        key: Value,
        value: LazyValue<'a>,
    ) -> Result<Option<QueryValue<'a>>, Error>;

    /// An absent entry inside the current dictionary scope.
    ///
    /// # Errors
    ///
    /// `UnbalancedSelect` if the current scope is not a dictionary.
    fn put_dictionary_null(&mut self, key: Value) -> Result<Option<Value>, Error>;
}

/// Streams every selected value to the consumer as it is encountered.
///
/// Scopes only track pairing; values pass through lazily, absent entries as
/// [`Value::Null`]. Dictionary keys are dropped: the stream carries values.
#[derive(Debug, Default)]
pub struct SelectionStrategy {
    open: usize,
}

impl SelectionStrategy {
    /// A fresh strategy with no open scopes.
    #[must_use]
    pub const fn new() -> Self {
        Self { open: 0 }
    }

    fn close(&mut self) -> Result<Option<Value>, Error> {
        if self.open == 0 {
            return Err(Error::compile(ErrorCode::UnbalancedSelect));
        }
        self.open -= 1;
        Ok(None)
    }
}

impl SelectStatementStrategy for SelectionStrategy {
    fn begin_sequence(&mut self, _key: Option<Value>) {
        self.open += 1;
    }

    fn end_sequence(&mut self) -> Result<Option<Value>, Error> {
        self.close()
    }

    fn begin_dictionary(&mut self, _key: Option<Value>) {
        self.open += 1;
    }

    fn end_dictionary(&mut self) -> Result<Option<Value>, Error> {
        self.close()
    }

    fn put_sequence_value<'a>(
        &mut self,
        value: LazyValue<'a>,
    ) -> Result<Option<QueryValue<'a>>, Error> {
        Ok(Some(QueryValue::Stream(value)))
    }

    fn put_sequence_null(&mut self) -> Result<Option<Value>, Error> {
        Ok(Some(Value::Null))
    }

    fn put_dictionary_value<'a>(
        &mut self,
        _key: Value,
        value: LazyValue<'a>,
    ) -> Result<Option<QueryValue<'a>>, Error> {
        Ok(Some(QueryValue::Stream(value)))
    }

    fn put_dictionary_null(&mut self, _key: Value) -> Result<Option<Value>, Error> {
        Ok(Some(Value::Null))
    }
}

/// One open container under construction.
#[derive(Debug)]
enum Builder {
    Seq {
        items: Vec<Value>,
        key: Option<Value>,
    },
    Dict {
        entries: Vec<(Value, Value)>,
        key: Option<Value>,
    },
}

impl Builder {
    fn finish(self) -> (Value, Option<Value>) {
        match self {
            Self::Seq { items, key } => (Value::Sequence(items), key),
            Self::Dict { entries, key } => (Value::Dictionary(entries), key),
        }
    }
}

/// Rebuilds the selected shape as one owned tree, emitted when the outermost
/// scope closes.
///
/// Selected values are materialized eagerly into the tree; absent entries
/// become [`Value::Null`]. Nested scopes attach to their parent on close,
/// under the key they were opened with when the parent is a dictionary.
#[derive(Debug, Default)]
pub struct ProjectionStrategy {
    stack: Vec<Builder>,
}

impl ProjectionStrategy {
    /// A fresh strategy with no open scopes.
    #[must_use]
    pub const fn new() -> Self {
        Self { stack: Vec::new() }
    }

    fn put_seq(&mut self, value: Value) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(Builder::Seq { items, .. }) => {
                items.push(value);
                Ok(())
            }
            _ => Err(Error::compile(ErrorCode::UnbalancedSelect)),
        }
    }

    fn put_dict(&mut self, key: Value, value: Value) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(Builder::Dict { entries, .. }) => {
                entries.push((key, value));
                Ok(())
            }
            _ => Err(Error::compile(ErrorCode::UnbalancedSelect)),
        }
    }

    fn close(&mut self, top: Builder) -> Result<Option<Value>, Error> {
        let (built, key) = top.finish();
        match self.stack.last_mut() {
            None => Ok(Some(built)),
            Some(Builder::Seq { items, .. }) => {
                items.push(built);
                Ok(None)
            }
            Some(Builder::Dict { entries, .. }) => {
                let key = key.ok_or(Error::compile(ErrorCode::UnbalancedSelect))?;
                entries.push((key, built));
                Ok(None)
            }
        }
    }
}

impl SelectStatementStrategy for ProjectionStrategy {
    fn begin_sequence(&mut self, key: Option<Value>) {
        self.stack.push(Builder::Seq {
            items: Vec::new(),
            key,
        });
    }

    fn end_sequence(&mut self) -> Result<Option<Value>, Error> {
        match self.stack.pop() {
            Some(top @ Builder::Seq { .. }) => self.close(top),
            Some(top) => {
                self.stack.push(top);
                Err(Error::compile(ErrorCode::UnbalancedSelect))
            }
            None => Err(Error::compile(ErrorCode::UnbalancedSelect)),
        }
    }

    fn begin_dictionary(&mut self, key: Option<Value>) {
        self.stack.push(Builder::Dict {
            entries: Vec::new(),
            key,
        });
    }

    fn end_dictionary(&mut self) -> Result<Option<Value>, Error> {
        match self.stack.pop() {
            Some(top @ Builder::Dict { .. }) => self.close(top),
            Some(top) => {
                self.stack.push(top);
                Err(Error::compile(ErrorCode::UnbalancedSelect))
            }
            None => Err(Error::compile(ErrorCode::UnbalancedSelect)),
        }
    }

    fn put_sequence_value<'a>(
        &mut self,
        value: LazyValue<'a>,
    ) -> Result<Option<QueryValue<'a>>, Error> {
        let value = value.materialize()?;
        self.put_seq(value)?;
        Ok(None)
    }

    fn put_sequence_null(&mut self) -> Result<Option<Value>, Error> {
        self.put_seq(Value::Null)?;
        Ok(None)
    }

    fn put_dictionary_value<'a>(
        &mut self,
        key: Value,
        value: LazyValue<'a>,
    ) -> Result<Option<QueryValue<'a>>, Error> {
        let value = value.materialize()?;
        self.put_dict(key, value)?;
        Ok(None)
    }

    fn put_dictionary_null(&mut self, key: Value) -> Result<Option<Value>, Error> {
        self.put_dict(key, Value::Null)?;
        Ok(None)
    }
}
