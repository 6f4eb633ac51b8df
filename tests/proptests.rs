// Property-based coverage for the offset walker and lazy accessors.
//
// Inputs are kept small so the suite stays fast under CI.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use proptest::prelude::*;

use cbor_skim::{decode, Input, QueryBuilder, Reader, Value};

fn encode_head(major: u8, arg: u64, out: &mut Vec<u8>) {
    let mt = major << 5;
    if arg < 24 {
        out.push(mt | u8::try_from(arg).unwrap());
    } else if arg <= u64::from(u8::MAX) {
        out.push(mt | 24);
        out.push(u8::try_from(arg).unwrap());
    } else if arg <= u64::from(u16::MAX) {
        out.push(mt | 25);
        out.extend_from_slice(&u16::try_from(arg).unwrap().to_be_bytes());
    } else if arg <= u64::from(u32::MAX) {
        out.push(mt | 26);
        out.extend_from_slice(&u32::try_from(arg).unwrap().to_be_bytes());
    } else {
        out.push(mt | 27);
        out.extend_from_slice(&arg.to_be_bytes());
    }
}

fn encode(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Int(i) if *i >= 0 => encode_head(0, u64::try_from(*i).unwrap(), out),
        Value::Int(i) => encode_head(1, u64::try_from(-1 - *i).unwrap(), out),
        Value::Float(f) => {
            out.push(0xfb);
            out.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        Value::Bool(b) => out.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => out.push(0xf6),
        Value::Undefined => out.push(0xf7),
        Value::Bytes(b) => {
            encode_head(2, b.len() as u64, out);
            out.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_head(3, s.len() as u64, out);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Sequence(items) => {
            encode_head(4, items.len() as u64, out);
            for item in items {
                encode(item, out);
            }
        }
        Value::Dictionary(entries) => {
            encode_head(5, entries.len() as u64, out);
            for (k, v) in entries {
                encode(k, out);
                encode(v, out);
            }
        }
        _ => unreachable!("generator only produces plain values"),
    }
}

fn arb_key() -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::char::range('a', 'z'), 1..12)
        .prop_map(|chars| chars.into_iter().collect())
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|i| Value::Int(i128::from(i))),
        any::<f64>()
            .prop_filter("finite floats compare exactly", |f| f.is_finite())
            .prop_map(Value::Float),
        proptest::collection::vec(any::<u8>(), 0..24).prop_map(Value::Bytes),
        arb_key().prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
        Just(Value::Undefined),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Sequence),
            proptest::collection::btree_map(arb_key(), inner, 0..6).prop_map(|m| {
                Value::Dictionary(m.into_iter().map(|(k, v)| (Value::Text(k), v)).collect())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn value_end_equals_encoded_length(value in arb_value()) {
        let mut bytes = Vec::new();
        encode(&value, &mut bytes);
        let input = Input::from(bytes.as_slice());
        prop_assert_eq!(decode::value_end(input, 0).unwrap(), bytes.len());
        prop_assert_eq!(decode::item_byte_len(input, 0).unwrap(), bytes.len());
    }

    #[test]
    fn trailing_bytes_do_not_extend_the_span(value in arb_value(), junk in proptest::collection::vec(any::<u8>(), 0..8)) {
        let mut bytes = Vec::new();
        encode(&value, &mut bytes);
        let span = bytes.len();
        bytes.extend_from_slice(&junk);
        prop_assert_eq!(decode::value_end(Input::from(bytes.as_slice()), 0).unwrap(), span);
    }

    #[test]
    fn materialize_roundtrips(value in arb_value()) {
        let mut bytes = Vec::new();
        encode(&value, &mut bytes);
        let reader = Reader::new();
        let lazy = reader.read_at(Input::from(bytes.as_slice()), 0).unwrap();
        prop_assert_eq!(lazy.materialize().unwrap(), value);
    }

    #[test]
    fn raw_span_reclassifies_identically(value in arb_value()) {
        let mut bytes = Vec::new();
        encode(&value, &mut bytes);
        let reader = Reader::new();
        let lazy = reader.read_at(Input::from(bytes.as_slice()), 0).unwrap();
        let raw = lazy.raw().unwrap();
        prop_assert_eq!(raw, bytes.as_slice());

        let again = reader.read_at(Input::from(raw), 0).unwrap();
        prop_assert_eq!(again.value_type(), lazy.value_type());
        prop_assert_eq!(again.materialize().unwrap(), lazy.materialize().unwrap());
    }

    #[test]
    fn sequence_iteration_matches_materialization(items in proptest::collection::vec(arb_leaf(), 0..8)) {
        let doc = Value::Sequence(items.clone());
        let mut bytes = Vec::new();
        encode(&doc, &mut bytes);
        let reader = Reader::new();
        let seq = reader.read_at(Input::from(bytes.as_slice()), 0).unwrap().as_sequence().unwrap();

        prop_assert_eq!(seq.len().unwrap(), items.len());
        for (i, expected) in items.iter().enumerate() {
            let got = seq.get(i).unwrap().unwrap().materialize().unwrap();
            prop_assert_eq!(&got, expected);
        }
        prop_assert!(seq.get(items.len()).unwrap().is_none());
    }

    #[test]
    fn every_key_is_reachable_by_query(entries in proptest::collection::btree_map(arb_key(), arb_leaf(), 1..8)) {
        let entries: BTreeMap<String, Value> = entries;
        let doc = Value::Dictionary(
            entries.iter().map(|(k, v)| (Value::Text(k.clone()), v.clone())).collect(),
        );
        let mut bytes = Vec::new();
        encode(&doc, &mut bytes);
        let reader = Reader::new();

        for (key, expected) in &entries {
            let query = QueryBuilder::new().dictionary_key(key.as_str()).build().unwrap();
            let hit = reader.read(Input::from(bytes.as_slice()), &query).unwrap().unwrap();
            prop_assert_eq!(&hit.materialize().unwrap(), expected);
        }

        let query = QueryBuilder::new().dictionary_key("QQQ").build().unwrap();
        prop_assert!(reader.read(Input::from(bytes.as_slice()), &query).unwrap().is_none());
    }
}
