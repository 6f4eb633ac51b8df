//! The query pipeline: a tree of stateless stages.
//!
//! A compiled query is a [`PipelineStage`] tree. Visiting a stage evaluates
//! it against the shared [`QueryContext`], and container stages drive their
//! children in order. All per-run state lives in the context; the tree itself
//! can be reused across runs and threads.

use crate::classify::ValueType;
use crate::context::{QueryContext, QueryValue};
use crate::value::Value;
use crate::{Error, ErrorCode};

/// Outcome of evaluating one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Proceed to the next sibling stage.
    Continue,
    /// Re-evaluate this stage against the updated context.
    Loop,
    /// Abandon the current subtree; the nearest entry stage absorbs this into
    /// a well-defined null, otherwise it unwinds the run.
    Break,
    /// Stop the whole run immediately; nothing absorbs this.
    Exit,
}

/// A dictionary key to navigate by or to label an output entry with.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySpec {
    /// A text-string key.
    Text(String),
    /// An integer key (matches major types 0 and 1).
    Int(i64),
    /// A float key.
    Float(f64),
}

impl KeySpec {
    /// The owned value form of the key, for projection output.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::Text(s.clone()),
            Self::Int(i) => Value::Int(i128::from(*i)),
            Self::Float(f) => Value::Float(*f),
        }
    }
}

impl From<&str> for KeySpec {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for KeySpec {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for KeySpec {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// A coarse type expectation for [`Stage::TypeMatch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeSpec {
    /// Integer or float.
    Number,
    /// Text or byte string.
    String,
    /// Sequence (array).
    Sequence,
    /// Dictionary (map).
    Dictionary,
    /// Boolean.
    Bool,
    /// Null or undefined.
    Null,
    /// A semantic tag; `Some(n)` pins the tag number.
    Tag(Option<u64>),
}

impl TypeSpec {
    /// Whether `vt` satisfies this expectation.
    #[must_use]
    pub const fn matches(self, vt: ValueType) -> bool {
        match self {
            Self::Number => matches!(vt, ValueType::UInt | ValueType::NInt | ValueType::Float),
            Self::String => matches!(vt, ValueType::TextString | ValueType::ByteString),
            Self::Sequence => matches!(vt, ValueType::Sequence),
            Self::Dictionary => matches!(vt, ValueType::Dictionary),
            Self::Bool => matches!(vt, ValueType::Bool),
            Self::Null => matches!(vt, ValueType::Null | ValueType::Undefined),
            Self::Tag(None) => vt.is_tag(),
            Self::Tag(Some(n)) => matches!(vt.tag_number(), Some(m) if m == n),
        }
    }

    const fn mismatch_code(self) -> ErrorCode {
        match self {
            Self::Number => ErrorCode::ExpectedNumber,
            Self::String => ErrorCode::ExpectedString,
            Self::Sequence => ErrorCode::ExpectedSequence,
            Self::Dictionary => ErrorCode::ExpectedDictionary,
            Self::Bool => ErrorCode::ExpectedBool,
            Self::Null => ErrorCode::ExpectedNull,
            Self::Tag(_) => ErrorCode::ExpectedTag,
        }
    }
}

/// The closed set of stage behaviors.
///
/// Navigation stages move the cursor and run their children at the new
/// position; select stages open strategy scopes; consume stages emit. There
/// is no open extension point: queries compose these, they do not subclass
/// them.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// The root; evaluates its children in order.
    Base,
    /// Descend to the item at an index of the current sequence.
    SequenceIndex(u64),
    /// Visit every element of the current sequence in order, running the
    /// children once per element.
    ///
    /// Yields [`VisitResult::Loop`] between elements; an element whose
    /// subtree breaks is skipped, an empty sequence runs the children zero
    /// times. The cursor is restored once the sequence is exhausted.
    SequenceStream,
    /// Descend to the value under a key of the current dictionary.
    DictionaryKey(KeySpec),
    /// Check the current value's type.
    ///
    /// A mismatch is an error when `required`, otherwise the cursor goes
    /// absent and the subtree breaks.
    TypeMatch {
        /// The expected type.
        spec: TypeSpec,
        /// Fail (rather than go absent) on mismatch.
        required: bool,
    },
    /// Emit the current value to the consumer.
    Consume,
    /// Open a sequence select scope around the children (all entry stages).
    AsSequence {
        /// Output key, set when this select nests under a dictionary entry.
        key: Option<KeySpec>,
    },
    /// One positional entry of a sequence select; absorbs `Break` into a null
    /// and restores the cursor afterwards.
    SequenceEntry,
    /// Leaf of a sequence entry: feed the current value (or null) to the
    /// strategy.
    ConsumeSequenceEntry,
    /// Open a dictionary select scope around the children (all entry stages).
    AsDictionary {
        /// Output key, set when this select nests under a dictionary entry.
        key: Option<KeySpec>,
    },
    /// One keyed entry of a dictionary select; the key labels the output, the
    /// children navigate the input. Absorbs `Break` into a null and restores
    /// the cursor afterwards.
    DictionaryEntry(KeySpec),
    /// Leaf of a dictionary entry: feed the current value (or null) to the
    /// strategy under the given output key.
    ConsumeDictionaryEntry(KeySpec),
}

/// A stage with its children; the unit the tree is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStage {
    stage: Stage,
    children: Vec<PipelineStage>,
}

impl PipelineStage {
    /// A leaf node.
    #[must_use]
    pub const fn new(stage: Stage) -> Self {
        Self {
            stage,
            children: Vec::new(),
        }
    }

    /// A node with children.
    #[must_use]
    pub fn with_children(stage: Stage, children: Vec<PipelineStage>) -> Self {
        Self { stage, children }
    }

    /// The stage behavior of this node.
    #[must_use]
    pub const fn stage(&self) -> &Stage {
        &self.stage
    }

    /// The child nodes, in evaluation order.
    #[must_use]
    pub fn children(&self) -> &[PipelineStage] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<PipelineStage> {
        &mut self.children
    }

    pub(crate) fn into_children(self) -> Vec<PipelineStage> {
        self.children
    }

    /// Evaluate this node, re-running it as long as it yields
    /// [`VisitResult::Loop`].
    ///
    /// # Errors
    ///
    /// Decode/type errors from the stage, strategy errors from select scopes.
    pub fn visit(&self, ctx: &mut QueryContext<'_, '_>) -> Result<VisitResult, Error> {
        let mut entry = true;
        loop {
            match self.evaluate(ctx, entry)? {
                VisitResult::Loop => entry = false,
                r => return Ok(r),
            }
        }
    }

    fn visit_children(&self, ctx: &mut QueryContext<'_, '_>) -> Result<VisitResult, Error> {
        for child in &self.children {
            match child.visit(ctx)? {
                VisitResult::Continue | VisitResult::Loop => {}
                r @ (VisitResult::Break | VisitResult::Exit) => return Ok(r),
            }
        }
        Ok(VisitResult::Continue)
    }

    fn evaluate(&self, ctx: &mut QueryContext<'_, '_>, entry: bool) -> Result<VisitResult, Error> {
        match &self.stage {
            Stage::Base => self.visit_children(ctx),

            Stage::SequenceStream => {
                if entry {
                    let Some(value) = ctx.lazy_value()? else {
                        return Ok(VisitResult::Break);
                    };
                    ctx.open_stream(value.as_sequence()?.iter());
                }
                match ctx.advance_stream() {
                    Some(Ok(item)) => {
                        ctx.set_offset(Some(item.offset()));
                        match self.visit_children(ctx)? {
                            VisitResult::Exit => {
                                ctx.close_stream();
                                Ok(VisitResult::Exit)
                            }
                            // A break inside one element skips that element;
                            // the stream itself moves on.
                            _ => Ok(VisitResult::Loop),
                        }
                    }
                    Some(Err(e)) => {
                        ctx.close_stream();
                        Err(e)
                    }
                    None => {
                        let saved = ctx.close_stream();
                        ctx.set_offset(saved);
                        Ok(VisitResult::Continue)
                    }
                }
            }

            Stage::SequenceIndex(index) => {
                let Some(value) = ctx.lazy_value()? else {
                    return Ok(VisitResult::Break);
                };
                let seq = value.as_sequence()?;
                let found = usize::try_from(*index)
                    .ok()
                    .map_or(Ok(None), |i| seq.get(i))?;
                match found {
                    Some(item) => {
                        ctx.set_offset(Some(item.offset()));
                        self.visit_children(ctx)
                    }
                    None => {
                        ctx.set_offset(None);
                        Ok(VisitResult::Break)
                    }
                }
            }

            Stage::DictionaryKey(key) => {
                let Some(value) = ctx.lazy_value()? else {
                    return Ok(VisitResult::Break);
                };
                let dict = value.as_dictionary()?;
                match dict.get(key)? {
                    Some(item) => {
                        ctx.set_offset(Some(item.offset()));
                        self.visit_children(ctx)
                    }
                    None => {
                        ctx.set_offset(None);
                        Ok(VisitResult::Break)
                    }
                }
            }

            Stage::TypeMatch { spec, required } => {
                let Some(value) = ctx.lazy_value()? else {
                    return Ok(VisitResult::Break);
                };
                if spec.matches(value.value_type()) {
                    self.visit_children(ctx)
                } else if *required {
                    Err(Error::type_mismatch(spec.mismatch_code(), value.offset()))
                } else {
                    ctx.set_offset(None);
                    Ok(VisitResult::Break)
                }
            }

            Stage::Consume => {
                let emitted = match ctx.lazy_value()? {
                    Some(value) => ctx.emit(QueryValue::Stream(value)),
                    None => ctx.emit(QueryValue::Object(Value::Null)),
                };
                Ok(if emitted {
                    VisitResult::Continue
                } else {
                    VisitResult::Exit
                })
            }

            Stage::AsSequence { key } => {
                ctx.begin_sequence(key.as_ref().map(KeySpec::to_value));
                let r = self.visit_children(ctx)?;
                let emitted = ctx.end_sequence()?;
                Ok(if r == VisitResult::Exit || !emitted {
                    VisitResult::Exit
                } else {
                    VisitResult::Continue
                })
            }

            Stage::AsDictionary { key } => {
                ctx.begin_dictionary(key.as_ref().map(KeySpec::to_value));
                let r = self.visit_children(ctx)?;
                let emitted = ctx.end_dictionary()?;
                Ok(if r == VisitResult::Exit || !emitted {
                    VisitResult::Exit
                } else {
                    VisitResult::Continue
                })
            }

            Stage::SequenceEntry => {
                let saved = ctx.offset();
                match self.visit_children(ctx)? {
                    VisitResult::Break => {
                        if ctx.offset().is_none() && !ctx.put_sequence_null()? {
                            return Ok(VisitResult::Exit);
                        }
                        ctx.set_offset(saved);
                        Ok(VisitResult::Continue)
                    }
                    VisitResult::Exit => Ok(VisitResult::Exit),
                    _ => {
                        ctx.set_offset(saved);
                        Ok(VisitResult::Continue)
                    }
                }
            }

            Stage::DictionaryEntry(key) => {
                let saved = ctx.offset();
                match self.visit_children(ctx)? {
                    VisitResult::Break => {
                        if ctx.offset().is_none() && !ctx.put_dictionary_null(key.to_value())? {
                            return Ok(VisitResult::Exit);
                        }
                        ctx.set_offset(saved);
                        Ok(VisitResult::Continue)
                    }
                    VisitResult::Exit => Ok(VisitResult::Exit),
                    _ => {
                        ctx.set_offset(saved);
                        Ok(VisitResult::Continue)
                    }
                }
            }

            Stage::ConsumeSequenceEntry => {
                let fed = match ctx.lazy_value()? {
                    Some(value) => ctx.put_sequence_value(value)?,
                    None => ctx.put_sequence_null()?,
                };
                Ok(if fed {
                    VisitResult::Continue
                } else {
                    VisitResult::Exit
                })
            }

            Stage::ConsumeDictionaryEntry(key) => {
                let fed = match ctx.lazy_value()? {
                    Some(value) => ctx.put_dictionary_value(key.to_value(), value)?,
                    None => ctx.put_dictionary_null(key.to_value())?,
                };
                Ok(if fed {
                    VisitResult::Continue
                } else {
                    VisitResult::Exit
                })
            }
        }
    }
}
