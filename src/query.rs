//! Query compilation: builder, structural validation, and the reusable
//! compiled form.
//!
//! A [`Query`] owns a validated stage tree plus the strategy kind a run
//! should use. Compilation errors carry [`ErrorKind::QueryCompile`] and are
//! raised before any byte of input is touched.
//!
//! [`ErrorKind::QueryCompile`]: crate::ErrorKind::QueryCompile

use crate::pipeline::{KeySpec, PipelineStage, Stage, TypeSpec};
use crate::{Error, ErrorCode};

/// Which strategy a select statement runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Stream each selected value to the consumer as encountered.
    Selection,
    /// Rebuild the selected shape as one owned tree.
    #[default]
    Projection,
}

/// A compiled, validated, reusable query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    root: PipelineStage,
    strategy: StrategyKind,
}

impl Query {
    /// Validate `root` into a query.
    ///
    /// # Errors
    ///
    /// `EmptyPipeline` for a childless root, `InvalidSelectStatement`,
    /// `MisplacedEntryStage` and `MisplacedConsumeStage` for trees that break
    /// the select-statement shape.
    pub fn new(root: PipelineStage, strategy: StrategyKind) -> Result<Self, Error> {
        if root.children().is_empty() {
            return Err(Error::compile(ErrorCode::EmptyPipeline));
        }
        validate(&root, EntryScope::None)?;
        Ok(Self { root, strategy })
    }

    pub(crate) const fn from_parts(root: PipelineStage, strategy: StrategyKind) -> Self {
        Self { root, strategy }
    }

    pub(crate) fn into_parts(self) -> (PipelineStage, StrategyKind) {
        (self.root, self.strategy)
    }

    /// The root of the stage tree.
    #[must_use]
    pub const fn root(&self) -> &PipelineStage {
        &self.root
    }

    /// The strategy kind for this query's select statements.
    #[must_use]
    pub const fn strategy(&self) -> StrategyKind {
        self.strategy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryScope {
    None,
    Sequence,
    Dictionary,
}

fn validate(node: &PipelineStage, scope: EntryScope) -> Result<(), Error> {
    match node.stage() {
        Stage::Base
        | Stage::SequenceIndex(_)
        | Stage::SequenceStream
        | Stage::DictionaryKey(_)
        | Stage::TypeMatch { .. } => {
            for child in node.children() {
                validate(child, scope)?;
            }
            Ok(())
        }

        Stage::Consume => {
            if scope == EntryScope::None {
                Ok(())
            } else {
                Err(Error::compile(ErrorCode::MisplacedConsumeStage))
            }
        }

        Stage::AsSequence { .. } => {
            for child in node.children() {
                if !matches!(child.stage(), Stage::SequenceEntry) {
                    return Err(Error::compile(ErrorCode::InvalidSelectStatement));
                }
                for grandchild in child.children() {
                    validate(grandchild, EntryScope::Sequence)?;
                }
            }
            Ok(())
        }

        Stage::AsDictionary { .. } => {
            for child in node.children() {
                if !matches!(child.stage(), Stage::DictionaryEntry(_)) {
                    return Err(Error::compile(ErrorCode::InvalidSelectStatement));
                }
                for grandchild in child.children() {
                    validate(grandchild, EntryScope::Dictionary)?;
                }
            }
            Ok(())
        }

        // Entry stages are consumed by their As* parent above; one reached
        // through the generic walk sits outside its container selector.
        Stage::SequenceEntry | Stage::DictionaryEntry(_) => {
            Err(Error::compile(ErrorCode::MisplacedEntryStage))
        }

        Stage::ConsumeSequenceEntry => {
            if scope == EntryScope::Sequence {
                Ok(())
            } else {
                Err(Error::compile(ErrorCode::MisplacedConsumeStage))
            }
        }

        Stage::ConsumeDictionaryEntry(_) => {
            if scope == EntryScope::Dictionary {
                Ok(())
            } else {
                Err(Error::compile(ErrorCode::MisplacedConsumeStage))
            }
        }
    }
}

/// One open builder scope: the root, a select statement, or an entry.
#[derive(Debug)]
struct Frame {
    stage: Stage,
    /// Navigation stages issued in this scope, outermost first.
    chain: Vec<Stage>,
    /// Completed entry subtrees (select scopes only).
    entries: Vec<PipelineStage>,
    /// A completed nested select terminating the chain.
    tail: Option<PipelineStage>,
}

impl Frame {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            chain: Vec::new(),
            entries: Vec::new(),
            tail: None,
        }
    }
}

/// Fluent construction of a [`Query`].
///
/// Navigation calls chain: each subsequent stage runs at the position the
/// previous one reached. `select_*`/`*_entry`/`end_*` calls nest; a
/// navigation query without an explicit [`QueryBuilder::consume`] gets one
/// appended at the tip.
///
/// Structural mistakes (an entry outside a select, unbalanced `end_*` calls)
/// are remembered and surface from [`QueryBuilder::build`].
#[derive(Debug)]
pub struct QueryBuilder {
    frames: Vec<Frame>,
    strategy: Option<StrategyKind>,
    saw_select: bool,
    error: Option<Error>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    /// Start an empty query at the root of the input.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(Stage::Base)],
            strategy: None,
            saw_select: false,
            error: None,
        }
    }

    fn push_stage(mut self, stage: Stage) -> Self {
        if self.error.is_none() {
            if let Some(top) = self.frames.last_mut() {
                if top.tail.is_some() {
                    self.error = Some(Error::compile(ErrorCode::MisplacedConsumeStage));
                } else {
                    top.chain.push(stage);
                }
            }
        }
        self
    }

    fn fail(mut self, code: ErrorCode) -> Self {
        if self.error.is_none() {
            self.error = Some(Error::compile(code));
        }
        self
    }

    /// Descend into the item at `index` of the current sequence.
    #[must_use]
    pub fn sequence_index(self, index: u64) -> Self {
        self.push_stage(Stage::SequenceIndex(index))
    }

    /// Visit every element of the current sequence, running the rest of the
    /// query once per element.
    ///
    /// Elements whose subtree misses are skipped; an empty sequence emits
    /// nothing.
    #[must_use]
    pub fn sequence_stream(self) -> Self {
        self.push_stage(Stage::SequenceStream)
    }

    /// Descend into the value under `key` of the current dictionary.
    #[must_use]
    pub fn dictionary_key(self, key: impl Into<KeySpec>) -> Self {
        self.push_stage(Stage::DictionaryKey(key.into()))
    }

    /// Require the current value to have type `spec`; a mismatch fails the
    /// run.
    #[must_use]
    pub fn require_type(self, spec: TypeSpec) -> Self {
        self.push_stage(Stage::TypeMatch {
            spec,
            required: true,
        })
    }

    /// Match the current value against `spec`; a mismatch yields absence
    /// instead of an error.
    #[must_use]
    pub fn optional_type(self, spec: TypeSpec) -> Self {
        self.push_stage(Stage::TypeMatch {
            spec,
            required: false,
        })
    }

    /// Emit the current value. Appended automatically for navigation queries
    /// that never call it.
    #[must_use]
    pub fn consume(self) -> Self {
        self.push_stage(Stage::Consume)
    }

    /// Open a sequence select statement at the current position.
    #[must_use]
    pub fn select_sequence(mut self) -> Self {
        if self.error.is_none() {
            self.saw_select = true;
            self.frames.push(Frame::new(Stage::AsSequence { key: None }));
        }
        self
    }

    /// Open a dictionary select statement at the current position.
    #[must_use]
    pub fn select_dictionary(mut self) -> Self {
        if self.error.is_none() {
            self.saw_select = true;
            self.frames
                .push(Frame::new(Stage::AsDictionary { key: None }));
        }
        self
    }

    /// Open the next positional entry of the enclosing sequence select.
    #[must_use]
    pub fn sequence_entry(mut self) -> Self {
        match self.frames.last().map(Frame::stage_ref) {
            Some(Stage::AsSequence { .. }) if self.error.is_none() => {
                self.frames.push(Frame::new(Stage::SequenceEntry));
                self
            }
            _ => self.fail(ErrorCode::MisplacedEntryStage),
        }
    }

    /// Open a keyed entry of the enclosing dictionary select; `key` labels
    /// the output entry.
    #[must_use]
    pub fn dictionary_entry(mut self, key: impl Into<KeySpec>) -> Self {
        match self.frames.last().map(Frame::stage_ref) {
            Some(Stage::AsDictionary { .. }) if self.error.is_none() => {
                self.frames
                    .push(Frame::new(Stage::DictionaryEntry(key.into())));
                self
            }
            _ => self.fail(ErrorCode::MisplacedEntryStage),
        }
    }

    /// Close the innermost entry.
    #[must_use]
    pub fn end_entry(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(frame) = self.frames.pop() else {
            return self.fail(ErrorCode::UnbalancedSelect);
        };
        let Frame {
            stage, chain, tail, ..
        } = frame;
        let leaf = match (&stage, tail) {
            (Stage::SequenceEntry, None) => PipelineStage::new(Stage::ConsumeSequenceEntry),
            (Stage::DictionaryEntry(key), None) => {
                PipelineStage::new(Stage::ConsumeDictionaryEntry(key.clone()))
            }
            (Stage::SequenceEntry | Stage::DictionaryEntry(_), Some(tail)) => tail,
            _ => return self.fail(ErrorCode::UnbalancedSelect),
        };
        let entry = PipelineStage::with_children(stage, vec![fold_chain(chain, leaf)]);
        match self.frames.last_mut() {
            Some(parent) => {
                parent.entries.push(entry);
                self
            }
            None => self.fail(ErrorCode::UnbalancedSelect),
        }
    }

    /// Close the innermost select statement.
    #[must_use]
    pub fn end_select(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(frame) = self.frames.pop() else {
            return self.fail(ErrorCode::UnbalancedSelect);
        };
        let stage = match frame.stage {
            s @ (Stage::AsSequence { .. } | Stage::AsDictionary { .. }) => s,
            _ => return self.fail(ErrorCode::UnbalancedSelect),
        };
        // A select nested under a dictionary entry inherits that entry's key
        // so the rebuilt container lands under it.
        let stage = match (stage, self.frames.last().map(Frame::stage_ref)) {
            (Stage::AsSequence { .. }, Some(Stage::DictionaryEntry(key))) => Stage::AsSequence {
                key: Some(key.clone()),
            },
            (Stage::AsDictionary { .. }, Some(Stage::DictionaryEntry(key))) => {
                Stage::AsDictionary {
                    key: Some(key.clone()),
                }
            }
            (stage, _) => stage,
        };
        let node = PipelineStage::with_children(stage, frame.entries);
        let node = fold_chain(frame.chain, node);
        match self.frames.last_mut() {
            Some(parent) if parent.tail.is_none() => {
                parent.tail = Some(node);
                self
            }
            _ => self.fail(ErrorCode::UnbalancedSelect),
        }
    }

    /// Override the strategy the select statement runs with.
    ///
    /// Select queries default to [`StrategyKind::Projection`].
    #[must_use]
    pub const fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Compile into a validated [`Query`].
    ///
    /// # Errors
    ///
    /// Any structural mistake recorded during building, plus the validation
    /// failures of [`Query::new`].
    pub fn build(mut self) -> Result<Query, Error> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let Some(frame) = self.frames.pop() else {
            return Err(Error::compile(ErrorCode::UnbalancedSelect));
        };
        if !self.frames.is_empty() || !matches!(frame.stage, Stage::Base) {
            return Err(Error::compile(ErrorCode::UnbalancedSelect));
        }

        let mut chain = frame.chain;
        let leaf = match frame.tail {
            Some(select) => select,
            None => {
                if !matches!(chain.last(), Some(Stage::Consume)) {
                    chain.push(Stage::Consume);
                }
                let Some(last) = chain.pop() else {
                    return Err(Error::compile(ErrorCode::EmptyPipeline));
                };
                PipelineStage::new(last)
            }
        };
        let root = PipelineStage::with_children(Stage::Base, vec![fold_chain(chain, leaf)]);

        let strategy = self.strategy.unwrap_or_else(|| {
            if self.saw_select {
                StrategyKind::Projection
            } else {
                StrategyKind::Selection
            }
        });
        Query::new(root, strategy)
    }
}

impl Frame {
    fn stage_ref(&self) -> &Stage {
        &self.stage
    }
}

/// Nest `chain` around `leaf`: the first stage becomes the outermost node.
fn fold_chain(chain: Vec<Stage>, leaf: PipelineStage) -> PipelineStage {
    chain.into_iter().rev().fold(leaf, |inner, stage| {
        PipelineStage::with_children(stage, vec![inner])
    })
}
