use cbor_skim::{
    ErrorCode, ErrorKind, Input, Number, Reader, TagRegistry, TagValue, UnknownTagPolicy, Value,
};

fn tagged_date(text: &str) -> Vec<u8> {
    let mut out = vec![0xc0, 0x74];
    assert_eq!(text.len(), 20);
    out.extend_from_slice(text.as_bytes());
    out
}

#[test]
fn date_time_decodes_rfc3339() {
    let bytes = tagged_date("2013-03-21T20:04:00Z");
    let tags = TagRegistry::default();
    let TagValue::DateTime(dt) = tags.decode(Input::from(bytes.as_slice()), 0).unwrap() else {
        panic!("expected date-time");
    };
    assert_eq!(dt.to_rfc3339(), "2013-03-21T20:04:00+00:00");
}

#[test]
fn corrupted_date_is_tag_decode_error() {
    let bytes = tagged_date("2013-03-21X20:04:00Z");
    let tags = TagRegistry::default();
    let err = tags.decode(Input::from(bytes.as_slice()), 0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagDecode);
    assert_eq!(err.code, ErrorCode::InvalidDateTime);
    assert_eq!(err.offset, 0);
}

#[test]
fn bignum_sign_comes_from_the_tag() {
    let tags = TagRegistry::default();

    let TagValue::BigNum(pos) = tags.decode(Input::from(&[0xc2, 0x41, 0x01]), 0).unwrap() else {
        panic!("expected bignum");
    };
    assert!(!pos.is_negative());
    assert_eq!(pos.to_i128(), Some(1));

    let TagValue::BigNum(neg) = tags.decode(Input::from(&[0xc3, 0x41, 0x01]), 0).unwrap() else {
        panic!("expected bignum");
    };
    assert!(neg.is_negative());
    assert_eq!(neg.to_i128(), Some(-2));
}

#[test]
fn bignum_magnitude_preserved_verbatim() {
    let tags = TagRegistry::default();
    let bytes = [0xc2, 0x45, 0x01, 0x02, 0x03, 0x04, 0x05];
    let TagValue::BigNum(big) = tags.decode(Input::from(&bytes), 0).unwrap() else {
        panic!("expected bignum");
    };
    assert_eq!(big.magnitude(), &[0x01, 0x02, 0x03, 0x04, 0x05]);
    assert_eq!(big.to_i128(), Some(0x01_02_03_04_05));
}

#[test]
fn timestamp_keeps_the_raw_number() {
    let tags = TagRegistry::default();
    let bytes = [0xc1, 0x1a, 0x51, 0x4b, 0x67, 0xb0];
    let TagValue::Timestamp(n) = tags.decode(Input::from(&bytes), 0).unwrap() else {
        panic!("expected timestamp");
    };
    assert_eq!(n, Number::Int(1_363_896_240));
}

#[test]
fn timestamp_rejects_non_number_payload() {
    let tags = TagRegistry::default();
    let err = tags.decode(Input::from(&[0xc1, 0x61, b'a']), 0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagDecode);
    assert_eq!(err.code, ErrorCode::InvalidTimestamp);
}

#[test]
fn uri_parses_payload() {
    let mut bytes = vec![0xd8, 0x20, 0x76];
    bytes.extend_from_slice(b"http://www.example.com");
    let tags = TagRegistry::default();
    let TagValue::Uri(url) = tags.decode(Input::from(bytes.as_slice()), 0).unwrap() else {
        panic!("expected uri");
    };
    assert_eq!(url.as_str(), "http://www.example.com/");
}

#[test]
fn relative_uri_rejected() {
    let bytes = [0xd8, 0x20, 0x63, b'a', b' ', b'b'];
    let tags = TagRegistry::default();
    let err = tags.decode(Input::from(&bytes), 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidUri);
}

#[test]
fn embedded_cbor_addresses_the_inner_item() {
    // tag 24 wrapping the encoding of [1, 2]
    let bytes = [0xd8, 0x18, 0x43, 0x82, 0x01, 0x02];
    let tags = TagRegistry::default();
    let TagValue::Nested(inner) = tags.decode(Input::from(&bytes), 0).unwrap() else {
        panic!("expected nested item");
    };
    assert_eq!(
        inner.materialize().unwrap(),
        Value::Sequence(vec![Value::Int(1), Value::Int(2)])
    );
}

#[test]
fn embedded_cbor_requires_definite_byte_string() {
    let bytes = [0xd8, 0x18, 0x5f, 0x41, 0x01, 0xff];
    let tags = TagRegistry::default();
    let err = tags.decode(Input::from(&bytes), 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidNestedItem);

    let text = [0xd8, 0x18, 0x61, b'a'];
    let err = tags.decode(Input::from(&text), 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidNestedItem);
}

#[test]
fn unknown_tag_stays_opaque_by_default() {
    let bytes = [0xd8, 0x63, 0x01];
    let tags = TagRegistry::default();
    let TagValue::Opaque { tag, raw } = tags.decode(Input::from(&bytes), 0).unwrap() else {
        panic!("expected opaque tag");
    };
    assert_eq!(tag, 99);
    assert_eq!(raw, &bytes[..]);
}

#[test]
fn unknown_tag_policy_fail() {
    let bytes = [0xd8, 0x63, 0x01];
    let tags = TagRegistry::default().with_unknown_tag_policy(UnknownTagPolicy::Fail);
    let err = tags.decode(Input::from(&bytes), 0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagDecode);
    assert_eq!(err.code, ErrorCode::UnknownTagRejected);
}

#[test]
fn non_tag_item_rejected() {
    let tags = TagRegistry::default();
    let err = tags.decode(Input::from(&[0x01]), 0).unwrap_err();
    assert_eq!(err.code, ErrorCode::ExpectedTag);
}

#[test]
fn custom_decoder_overrides_builtin() {
    fn always_timestamp_zero<'a>(
        _input: Input<'a>,
        _offset: usize,
        _tags: &'a TagRegistry,
    ) -> Result<TagValue<'a>, cbor_skim::Error> {
        Ok(TagValue::Timestamp(Number::Int(0)))
    }

    let bytes = tagged_date("2013-03-21T20:04:00Z");
    let reader = Reader::new().with_tag_decoder(0, always_timestamp_zero);
    let value = reader
        .read_at(Input::from(bytes.as_slice()), 0)
        .unwrap()
        .tag()
        .unwrap();
    assert!(matches!(value, TagValue::Timestamp(Number::Int(0))));
}

#[test]
fn materialize_carries_tag_values_through() {
    let bytes = tagged_date("2013-03-21T20:04:00Z");
    let reader = Reader::new();
    let value = reader
        .read_at(Input::from(bytes.as_slice()), 0)
        .unwrap()
        .materialize()
        .unwrap();
    assert!(matches!(value, Value::DateTime(_)));

    let opaque = [0xd8, 0x63, 0x01];
    let value = reader
        .read_at(Input::from(&opaque), 0)
        .unwrap()
        .materialize()
        .unwrap();
    assert_eq!(
        value,
        Value::Tagged {
            tag: 99,
            raw: opaque.to_vec()
        }
    );
}
