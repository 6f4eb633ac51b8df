use std::cell::RefCell;
use std::rc::Rc;

use cbor_skim::{
    DedupTypeMatch, Error, ErrorCode, FlattenBase, Input, LazyValue, PipelineStage, Query,
    QueryBuilder, QueryContext, QueryOptimizer, QueryValue, Reader, SelectStatementStrategy, Stage,
    StrategyKind, TagRegistry, TypeSpec, Value, VisitResult,
};

// {"a": 1, "b": 2}
const TWO_KEYS: &[u8] = &[0xa2, 0x61, b'a', 0x01, 0x61, b'b', 0x02];

struct Collect(Vec<Value>);

impl<'a> cbor_skim::ValueConsumer<'a> for Collect {
    fn accept(&mut self, value: QueryValue<'a>) -> bool {
        self.0.push(value.materialize().unwrap());
        true
    }
}

/// Accepts `limit` values, then asks the run to stop.
struct Limited {
    values: Vec<Value>,
    limit: usize,
}

impl<'a> cbor_skim::ValueConsumer<'a> for Limited {
    fn accept(&mut self, value: QueryValue<'a>) -> bool {
        self.values.push(value.materialize().unwrap());
        self.values.len() < self.limit
    }
}

#[test]
fn projection_rebuilds_a_dictionary() {
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .select_dictionary()
        .dictionary_entry("x")
        .dictionary_key("a")
        .end_entry()
        .dictionary_entry("y")
        .dictionary_key("missing")
        .end_entry()
        .end_select()
        .build()
        .unwrap();
    assert_eq!(query.strategy(), StrategyKind::Projection);

    let hit = reader.read(Input::from(TWO_KEYS), &query).unwrap().unwrap();
    assert_eq!(
        hit.materialize().unwrap(),
        Value::Dictionary(vec![
            (Value::Text("x".into()), Value::Int(1)),
            (Value::Text("y".into()), Value::Null),
        ])
    );
}

#[test]
fn projection_rebuilds_a_sequence() {
    let doc: &[u8] = &[0x83, 0x01, 0x02, 0x03];
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .select_sequence()
        .sequence_entry()
        .sequence_index(0)
        .end_entry()
        .sequence_entry()
        .sequence_index(2)
        .end_entry()
        .end_select()
        .build()
        .unwrap();

    let hit = reader.read(Input::from(doc), &query).unwrap().unwrap();
    assert_eq!(
        hit.materialize().unwrap(),
        Value::Sequence(vec![Value::Int(1), Value::Int(3)])
    );
}

#[test]
fn absent_entry_emits_exactly_one_null() {
    // selecting index 0 out of []
    let doc: &[u8] = &[0x80];
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .select_sequence()
        .sequence_entry()
        .sequence_index(0)
        .end_entry()
        .end_select()
        .build()
        .unwrap();

    let hit = reader.read(Input::from(doc), &query).unwrap().unwrap();
    assert_eq!(
        hit.materialize().unwrap(),
        Value::Sequence(vec![Value::Null])
    );
}

#[test]
fn selects_nest_under_dictionary_entries() {
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .select_dictionary()
        .dictionary_entry("outer")
        .select_sequence()
        .sequence_entry()
        .dictionary_key("a")
        .end_entry()
        .sequence_entry()
        .dictionary_key("b")
        .end_entry()
        .end_select()
        .end_entry()
        .end_select()
        .build()
        .unwrap();

    let hit = reader.read(Input::from(TWO_KEYS), &query).unwrap().unwrap();
    assert_eq!(
        hit.materialize().unwrap(),
        Value::Dictionary(vec![(
            Value::Text("outer".into()),
            Value::Sequence(vec![Value::Int(1), Value::Int(2)]),
        )])
    );
}

#[test]
fn selection_strategy_streams_each_entry() {
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .select_dictionary()
        .dictionary_entry("x")
        .dictionary_key("a")
        .end_entry()
        .dictionary_entry("y")
        .dictionary_key("missing")
        .end_entry()
        .end_select()
        .strategy(StrategyKind::Selection)
        .build()
        .unwrap();

    let mut out = Collect(Vec::new());
    reader
        .read_many(Input::from(TWO_KEYS), &query, &mut out)
        .unwrap();
    // Values stream in encounter order; nothing is emitted at scope close.
    assert_eq!(out.0, vec![Value::Int(1), Value::Null]);
}

#[derive(Debug, PartialEq)]
enum StrategyCall {
    BeginSequence,
    EndSequence,
    BeginDictionary,
    EndDictionary,
    PutSequence(Value),
    PutSequenceNull,
    PutDictionary(Value, Value),
    PutDictionaryNull(Value),
}

/// Records every strategy call for later inspection.
struct Recording(Rc<RefCell<Vec<StrategyCall>>>);

impl SelectStatementStrategy for Recording {
    fn begin_sequence(&mut self, _key: Option<Value>) {
        self.0.borrow_mut().push(StrategyCall::BeginSequence);
    }

    fn end_sequence(&mut self) -> Result<Option<Value>, Error> {
        self.0.borrow_mut().push(StrategyCall::EndSequence);
        Ok(None)
    }

    fn begin_dictionary(&mut self, _key: Option<Value>) {
        self.0.borrow_mut().push(StrategyCall::BeginDictionary);
    }

    fn end_dictionary(&mut self) -> Result<Option<Value>, Error> {
        self.0.borrow_mut().push(StrategyCall::EndDictionary);
        Ok(None)
    }

    fn put_sequence_value<'a>(
        &mut self,
        value: LazyValue<'a>,
    ) -> Result<Option<QueryValue<'a>>, Error> {
        let value = value.materialize()?;
        self.0.borrow_mut().push(StrategyCall::PutSequence(value));
        Ok(None)
    }

    fn put_sequence_null(&mut self) -> Result<Option<Value>, Error> {
        self.0.borrow_mut().push(StrategyCall::PutSequenceNull);
        Ok(None)
    }

    fn put_dictionary_value<'a>(
        &mut self,
        key: Value,
        value: LazyValue<'a>,
    ) -> Result<Option<QueryValue<'a>>, Error> {
        let value = value.materialize()?;
        self.0
            .borrow_mut()
            .push(StrategyCall::PutDictionary(key, value));
        Ok(None)
    }

    fn put_dictionary_null(&mut self, key: Value) -> Result<Option<Value>, Error> {
        self.0.borrow_mut().push(StrategyCall::PutDictionaryNull(key));
        Ok(None)
    }
}

#[test]
fn dictionary_select_drives_one_put_per_entry() {
    let query = QueryBuilder::new()
        .select_dictionary()
        .dictionary_entry("b")
        .dictionary_key("b")
        .end_entry()
        .end_select()
        .build()
        .unwrap();

    let calls = Rc::new(RefCell::new(Vec::new()));
    let tags = TagRegistry::default();
    let mut consumer = |_: QueryValue<'_>| true;
    let mut ctx = QueryContext::new(
        Input::from(TWO_KEYS),
        &tags,
        Box::new(Recording(Rc::clone(&calls))),
        &mut consumer,
    );
    assert_eq!(query.root().visit(&mut ctx).unwrap(), VisitResult::Continue);
    drop(ctx);

    // One begin/end pair around exactly one put for the matched key.
    assert_eq!(
        *calls.borrow(),
        [
            StrategyCall::BeginDictionary,
            StrategyCall::PutDictionary(Value::Text("b".into()), Value::Int(2)),
            StrategyCall::EndDictionary,
        ]
    );
}

#[test]
fn consumer_false_halts_remaining_stages() {
    let doc: &[u8] = &[0x83, 0x01, 0x02, 0x03];
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .select_sequence()
        .sequence_entry()
        .sequence_index(0)
        .end_entry()
        .sequence_entry()
        .sequence_index(1)
        .end_entry()
        .sequence_entry()
        .sequence_index(2)
        .end_entry()
        .end_select()
        .strategy(StrategyKind::Selection)
        .build()
        .unwrap();

    let mut out = Limited {
        values: Vec::new(),
        limit: 1,
    };
    reader.read_many(Input::from(doc), &query, &mut out).unwrap();
    assert_eq!(out.values, vec![Value::Int(1)]);
}

#[test]
fn entry_cursor_restores_between_entries() {
    // Both entries navigate from the same root dictionary.
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .select_sequence()
        .sequence_entry()
        .dictionary_key("b")
        .end_entry()
        .sequence_entry()
        .dictionary_key("a")
        .end_entry()
        .end_select()
        .build()
        .unwrap();

    let hit = reader.read(Input::from(TWO_KEYS), &query).unwrap().unwrap();
    assert_eq!(
        hit.materialize().unwrap(),
        Value::Sequence(vec![Value::Int(2), Value::Int(1)])
    );
}

#[test]
fn sequence_stream_visits_every_element() {
    let doc: &[u8] = &[0x83, 0x01, 0x02, 0x03];
    let reader = Reader::new();
    let query = QueryBuilder::new().sequence_stream().build().unwrap();
    let mut out = Collect(Vec::new());
    reader.read_many(Input::from(doc), &query, &mut out).unwrap();
    assert_eq!(out.0, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn sequence_stream_walks_indefinite_sequences() {
    let doc: &[u8] = &[0x9f, 0x01, 0x02, 0xff];
    let reader = Reader::new();
    let query = QueryBuilder::new().sequence_stream().build().unwrap();
    let mut out = Collect(Vec::new());
    reader.read_many(Input::from(doc), &query, &mut out).unwrap();
    assert_eq!(out.0, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn sequence_streams_nest() {
    // [[1, 2], [3]]
    let doc: &[u8] = &[0x82, 0x82, 0x01, 0x02, 0x81, 0x03];
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .sequence_stream()
        .sequence_stream()
        .build()
        .unwrap();
    let mut out = Collect(Vec::new());
    reader.read_many(Input::from(doc), &query, &mut out).unwrap();
    assert_eq!(out.0, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn sequence_stream_skips_elements_that_miss() {
    // [{"a": 1}, {"b": 2}, {"a": 3}]
    let doc: &[u8] = &[
        0x83, 0xa1, 0x61, b'a', 0x01, 0xa1, 0x61, b'b', 0x02, 0xa1, 0x61, b'a', 0x03,
    ];
    let reader = Reader::new();
    let query = QueryBuilder::new()
        .sequence_stream()
        .dictionary_key("a")
        .build()
        .unwrap();
    let mut out = Collect(Vec::new());
    reader.read_many(Input::from(doc), &query, &mut out).unwrap();
    assert_eq!(out.0, vec![Value::Int(1), Value::Int(3)]);
}

#[test]
fn single_read_stops_a_stream_at_the_first_element() {
    let doc: &[u8] = &[0x83, 0x01, 0x02, 0x03];
    let reader = Reader::new();
    let query = QueryBuilder::new().sequence_stream().build().unwrap();
    let hit = reader.read(Input::from(doc), &query).unwrap().unwrap();
    assert_eq!(hit.materialize().unwrap(), Value::Int(1));
}

#[test]
fn sequence_stream_over_an_empty_sequence_emits_nothing() {
    let reader = Reader::new();
    let query = QueryBuilder::new().sequence_stream().build().unwrap();
    assert!(reader.read(Input::from(&[0x80]), &query).unwrap().is_none());
}

#[test]
fn sequence_stream_requires_a_sequence() {
    let reader = Reader::new();
    let query = QueryBuilder::new().sequence_stream().build().unwrap();
    let err = reader.read(Input::from(&[0x01]), &query).unwrap_err();
    assert_eq!(err.code, ErrorCode::ExpectedSequence);
}

#[test]
fn stream_restores_the_cursor_for_later_siblings() {
    let doc: &[u8] = &[0x82, 0x01, 0x02];
    let root = PipelineStage::with_children(
        Stage::Base,
        vec![
            PipelineStage::with_children(
                Stage::SequenceStream,
                vec![PipelineStage::new(Stage::Consume)],
            ),
            PipelineStage::new(Stage::Consume),
        ],
    );
    let query = Query::new(root, StrategyKind::Selection).unwrap();
    let mut out = Collect(Vec::new());
    Reader::new()
        .read_many(Input::from(doc), &query, &mut out)
        .unwrap();
    assert_eq!(
        out.0,
        vec![
            Value::Int(1),
            Value::Int(2),
            Value::Sequence(vec![Value::Int(1), Value::Int(2)]),
        ]
    );
}

#[test]
fn builder_rejects_entry_outside_select() {
    let err = QueryBuilder::new().sequence_entry().build().unwrap_err();
    assert!(err.is_compile());
    assert_eq!(err.code, ErrorCode::MisplacedEntryStage);

    let err = QueryBuilder::new()
        .select_sequence()
        .dictionary_entry("x")
        .build()
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MisplacedEntryStage);
}

#[test]
fn builder_rejects_unbalanced_ends() {
    let err = QueryBuilder::new().end_select().build().unwrap_err();
    assert_eq!(err.code, ErrorCode::UnbalancedSelect);

    let err = QueryBuilder::new()
        .select_sequence()
        .sequence_entry()
        .end_select()
        .build()
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnbalancedSelect);

    let err = QueryBuilder::new()
        .select_sequence()
        .sequence_entry()
        .end_entry()
        .build()
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnbalancedSelect);
}

#[test]
fn validation_rejects_bad_trees() {
    let err = Query::new(PipelineStage::new(Stage::Base), StrategyKind::Selection).unwrap_err();
    assert_eq!(err.code, ErrorCode::EmptyPipeline);

    // A select statement whose child is not an entry stage.
    let root = PipelineStage::with_children(
        Stage::Base,
        vec![PipelineStage::with_children(
            Stage::AsSequence { key: None },
            vec![PipelineStage::new(Stage::Consume)],
        )],
    );
    let err = Query::new(root, StrategyKind::Projection).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidSelectStatement);

    // A plain consume inside an entry.
    let root = PipelineStage::with_children(
        Stage::Base,
        vec![PipelineStage::with_children(
            Stage::AsSequence { key: None },
            vec![PipelineStage::with_children(
                Stage::SequenceEntry,
                vec![PipelineStage::new(Stage::Consume)],
            )],
        )],
    );
    let err = Query::new(root, StrategyKind::Projection).unwrap_err();
    assert_eq!(err.code, ErrorCode::MisplacedConsumeStage);

    // A dictionary-entry leaf under a sequence entry.
    let root = PipelineStage::with_children(
        Stage::Base,
        vec![PipelineStage::with_children(
            Stage::AsSequence { key: None },
            vec![PipelineStage::with_children(
                Stage::SequenceEntry,
                vec![PipelineStage::new(Stage::ConsumeDictionaryEntry("k".into()))],
            )],
        )],
    );
    let err = Query::new(root, StrategyKind::Projection).unwrap_err();
    assert_eq!(err.code, ErrorCode::MisplacedConsumeStage);

    // An entry stage adrift at the root.
    let root = PipelineStage::with_children(
        Stage::Base,
        vec![PipelineStage::with_children(
            Stage::SequenceEntry,
            vec![PipelineStage::new(Stage::ConsumeSequenceEntry)],
        )],
    );
    let err = Query::new(root, StrategyKind::Projection).unwrap_err();
    assert_eq!(err.code, ErrorCode::MisplacedEntryStage);
}

#[test]
fn flatten_base_splices_nested_roots() {
    let nested = PipelineStage::with_children(
        Stage::Base,
        vec![PipelineStage::with_children(
            Stage::Base,
            vec![PipelineStage::new(Stage::Consume)],
        )],
    );
    let flat = FlattenBase.optimize(nested);
    assert_eq!(flat.children().len(), 1);
    assert_eq!(*flat.children()[0].stage(), Stage::Consume);
}

#[test]
fn dedup_type_match_collapses_repeats() {
    let spec = TypeSpec::Number;
    let tree = PipelineStage::with_children(
        Stage::TypeMatch {
            spec,
            required: true,
        },
        vec![PipelineStage::with_children(
            Stage::TypeMatch {
                spec,
                required: true,
            },
            vec![PipelineStage::new(Stage::Consume)],
        )],
    );
    let deduped = DedupTypeMatch.optimize(tree);
    assert_eq!(
        *deduped.stage(),
        Stage::TypeMatch {
            spec,
            required: true
        }
    );
    assert_eq!(deduped.children().len(), 1);
    assert_eq!(*deduped.children()[0].stage(), Stage::Consume);
}

#[test]
fn dedup_keeps_differing_type_matches() {
    let tree = PipelineStage::with_children(
        Stage::TypeMatch {
            spec: TypeSpec::Number,
            required: true,
        },
        vec![PipelineStage::with_children(
            Stage::TypeMatch {
                spec: TypeSpec::Number,
                required: false,
            },
            vec![PipelineStage::new(Stage::Consume)],
        )],
    );
    let deduped = DedupTypeMatch.optimize(tree.clone());
    assert_eq!(deduped, tree);
}

#[test]
fn default_query_consumes_the_whole_document() {
    let reader = Reader::new();
    let query = QueryBuilder::new().build().unwrap();
    let hit = reader.read(Input::from(&[0x82, 0x01, 0x02]), &query).unwrap().unwrap();
    assert_eq!(
        hit.materialize().unwrap(),
        Value::Sequence(vec![Value::Int(1), Value::Int(2)])
    );
}
