use std::io;

use super::{fields::*, AnyValue, InstrumentationScope, KeyValue, Resource};
use crate::{
    size::{length_delimited_size, size_message, size_repeated_message, size_string_with_len, size_uint32},
    wire::varint_size,
    Marshaler, Serializer, Text,
};

/// Immutable marshaler for an `AnyValue`.
///
/// Exactly one variant is set, and it is written even when it holds the default value, since presence of the variant
/// is what tells the receiver the value's type.
#[derive(Clone, Debug)]
pub struct AnyValueMarshaler {
    value: Value,
    size: usize,
}

#[derive(Clone, Debug)]
enum Value {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Array(ArrayValueMarshaler),
    KeyValueList(KeyValueListMarshaler),
    Bytes(Vec<u8>),
}

impl AnyValueMarshaler {
    /// Creates a marshaler from a copy of `value`.
    pub fn create(value: &AnyValue) -> Self {
        let value = match value {
            AnyValue::String(s) => Value::String(s.clone()),
            AnyValue::Bool(b) => Value::Bool(*b),
            AnyValue::Int(i) => Value::Int(*i),
            AnyValue::Double(d) => Value::Double(*d),
            AnyValue::Array(values) => Value::Array(ArrayValueMarshaler::create(values)),
            AnyValue::KeyValueList(values) => Value::KeyValueList(KeyValueListMarshaler::create(values)),
            AnyValue::Bytes(b) => Value::Bytes(b.clone()),
        };
        let size = value_size(&value);
        Self { value, size }
    }
}

fn value_size(value: &Value) -> usize {
    match value {
        Value::String(s) => length_delimited_size(&ANY_VALUE_STRING, s.len()),
        Value::Bool(_) => ANY_VALUE_BOOL.tag_size() + 1,
        Value::Int(i) => ANY_VALUE_INT.tag_size() + varint_size(*i as u64),
        Value::Double(_) => ANY_VALUE_DOUBLE.tag_size() + 8,
        Value::Array(array) => size_message(&ANY_VALUE_ARRAY, array),
        Value::KeyValueList(list) => size_message(&ANY_VALUE_KVLIST, list),
        Value::Bytes(b) => length_delimited_size(&ANY_VALUE_BYTES, b.len()),
    }
}

impl Marshaler for AnyValueMarshaler {
    fn compute_size(&self) -> usize {
        self.size
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        match &self.value {
            Value::String(s) => output.write_string(&ANY_VALUE_STRING, Text::Utf8(s), s.len()),
            Value::Bool(b) => output.write_bool(&ANY_VALUE_BOOL, *b),
            Value::Int(i) => output.write_int64(&ANY_VALUE_INT, *i),
            Value::Double(d) => output.write_double(&ANY_VALUE_DOUBLE, *d),
            Value::Array(array) => output.serialize_message(&ANY_VALUE_ARRAY, array),
            Value::KeyValueList(list) => output.serialize_message(&ANY_VALUE_KVLIST, list),
            Value::Bytes(b) => output.write_bytes(&ANY_VALUE_BYTES, b),
        }
    }
}

/// Immutable marshaler for an `ArrayValue`.
#[derive(Clone, Debug)]
pub struct ArrayValueMarshaler {
    values: Vec<AnyValueMarshaler>,
    size: usize,
}

impl ArrayValueMarshaler {
    pub fn create(values: &[AnyValue]) -> Self {
        let values: Vec<_> = values.iter().map(AnyValueMarshaler::create).collect();
        let size = size_repeated_message(&ARRAY_VALUE_VALUES, &values);
        Self { values, size }
    }
}

impl Marshaler for ArrayValueMarshaler {
    fn compute_size(&self) -> usize {
        self.size
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        output.serialize_repeated_message(&ARRAY_VALUE_VALUES, &self.values)
    }
}

/// Immutable marshaler for a `KeyValueList`.
#[derive(Clone, Debug)]
pub struct KeyValueListMarshaler {
    values: Vec<KeyValueMarshaler>,
    size: usize,
}

impl KeyValueListMarshaler {
    pub fn create(values: &[KeyValue]) -> Self {
        let values = KeyValueMarshaler::create_repeated(values);
        let size = size_repeated_message(&KEY_VALUE_LIST_VALUES, &values);
        Self { values, size }
    }
}

impl Marshaler for KeyValueListMarshaler {
    fn compute_size(&self) -> usize {
        self.size
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        output.serialize_repeated_message(&KEY_VALUE_LIST_VALUES, &self.values)
    }
}

/// Immutable marshaler for a `KeyValue`.
#[derive(Clone, Debug)]
pub struct KeyValueMarshaler {
    key: String,
    value: AnyValueMarshaler,
    size: usize,
}

impl KeyValueMarshaler {
    /// Creates a marshaler from a copy of `key_value`.
    pub fn create(key_value: &KeyValue) -> Self {
        let key = key_value.key.clone();
        let value = AnyValueMarshaler::create(&key_value.value);
        let size = size_string_with_len(&KEY_VALUE_KEY, key.len()) + size_message(&KEY_VALUE_VALUE, &value);
        Self { key, value, size }
    }

    /// Creates one marshaler per attribute.
    pub fn create_repeated(attributes: &[KeyValue]) -> Vec<Self> {
        attributes.iter().map(Self::create).collect()
    }
}

impl Marshaler for KeyValueMarshaler {
    fn compute_size(&self) -> usize {
        self.size
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        output.serialize_string(&KEY_VALUE_KEY, Text::Utf8(&self.key), self.key.len())?;
        output.serialize_message(&KEY_VALUE_VALUE, &self.value)
    }
}

/// Immutable marshaler for an `InstrumentationScope`.
#[derive(Clone, Debug)]
pub struct InstrumentationScopeMarshaler {
    name: String,
    version: String,
    attributes: Vec<KeyValueMarshaler>,
    dropped_attributes_count: u32,
    size: usize,
}

impl InstrumentationScopeMarshaler {
    pub fn create(scope: &InstrumentationScope) -> Self {
        let attributes = KeyValueMarshaler::create_repeated(&scope.attributes);
        let size = size_string_with_len(&SCOPE_NAME, scope.name.len())
            + size_string_with_len(&SCOPE_VERSION, scope.version.len())
            + size_repeated_message(&SCOPE_ATTRIBUTES, &attributes)
            + size_uint32(&SCOPE_DROPPED_ATTRIBUTES_COUNT, scope.dropped_attributes_count);
        Self {
            name: scope.name.clone(),
            version: scope.version.clone(),
            attributes,
            dropped_attributes_count: scope.dropped_attributes_count,
            size,
        }
    }
}

impl Marshaler for InstrumentationScopeMarshaler {
    fn compute_size(&self) -> usize {
        self.size
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        output.serialize_string(&SCOPE_NAME, Text::Utf8(&self.name), self.name.len())?;
        output.serialize_string(&SCOPE_VERSION, Text::Utf8(&self.version), self.version.len())?;
        output.serialize_repeated_message(&SCOPE_ATTRIBUTES, &self.attributes)?;
        output.serialize_uint32(&SCOPE_DROPPED_ATTRIBUTES_COUNT, self.dropped_attributes_count)
    }
}

/// Immutable marshaler for a `Resource`.
#[derive(Clone, Debug)]
pub struct ResourceMarshaler {
    attributes: Vec<KeyValueMarshaler>,
    dropped_attributes_count: u32,
    size: usize,
}

impl ResourceMarshaler {
    pub fn create(resource: &Resource) -> Self {
        let attributes = KeyValueMarshaler::create_repeated(&resource.attributes);
        let size = size_repeated_message(&RESOURCE_ATTRIBUTES, &attributes)
            + size_uint32(&RESOURCE_DROPPED_ATTRIBUTES_COUNT, resource.dropped_attributes_count);
        Self {
            attributes,
            dropped_attributes_count: resource.dropped_attributes_count,
            size,
        }
    }
}

impl Marshaler for ResourceMarshaler {
    fn compute_size(&self) -> usize {
        self.size
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        output.serialize_repeated_message(&RESOURCE_ATTRIBUTES, &self.attributes)?;
        output.serialize_uint32(&RESOURCE_DROPPED_ATTRIBUTES_COUNT, self.dropped_attributes_count)
    }
}

#[cfg(test)]
mod tests {
    use prost::Message as _;

    use super::*;
    use crate::{
        marshaler::write_json_to,
        otlp::reference::{self, any_value_proto},
        to_binary,
    };

    fn sample_attributes() -> Vec<KeyValue> {
        vec![
            KeyValue::new("service.name", "checkout"),
            KeyValue::new("enabled", false),
            KeyValue::new("retries", -3i64),
            KeyValue::new("ratio", 0.0),
            KeyValue::new("hosts", vec![AnyValue::from("a"), AnyValue::from(7i64)]),
            KeyValue::new("nested", AnyValue::KeyValueList(vec![KeyValue::new("inner", true)])),
            KeyValue::new("raw", AnyValue::Bytes(vec![0xDE, 0xAD])),
            KeyValue::new("", AnyValue::Array(Vec::new())),
        ]
    }

    #[test]
    fn resource_round_trips_through_reference_decoder() {
        let resource = Resource {
            attributes: sample_attributes(),
            dropped_attributes_count: 2,
        };
        let marshaler = ResourceMarshaler::create(&resource);
        let bytes = to_binary(&marshaler).unwrap();
        assert_eq!(bytes.len(), marshaler.compute_size());

        let decoded = reference::ResourceProto::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, reference::resource(&resource));

        // Default-valued variants are still present, so the receiver knows their type.
        let enabled = &decoded.attributes[1];
        assert_eq!(
            enabled.value.as_ref().and_then(|v| v.value.clone()),
            Some(any_value_proto::Value::BoolValue(false))
        );
        let ratio = &decoded.attributes[3];
        assert_eq!(
            ratio.value.as_ref().and_then(|v| v.value.clone()),
            Some(any_value_proto::Value::DoubleValue(0.0))
        );
    }

    #[test]
    fn scope_round_trips_through_reference_decoder() {
        let scope = InstrumentationScope {
            name: "io.conduit.test".to_string(),
            version: String::new(),
            attributes: vec![KeyValue::new("k", "v")],
            dropped_attributes_count: 0,
        };
        let marshaler = InstrumentationScopeMarshaler::create(&scope);
        let bytes = to_binary(&marshaler).unwrap();

        let decoded = reference::InstrumentationScopeProto::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, reference::scope(&scope));
    }

    #[test]
    fn json_mapping() {
        let resource = Resource {
            attributes: vec![
                KeyValue::new("count", 42i64),
                KeyValue::new("raw", AnyValue::Bytes(vec![0xFF, 0x00])),
                KeyValue::new("nan", f64::NAN),
                KeyValue::new("list", vec![AnyValue::from(true)]),
            ],
            dropped_attributes_count: 1,
        };

        let mut out = Vec::new();
        write_json_to(&ResourceMarshaler::create(&resource), &mut out).unwrap();
        similar_asserts::assert_eq!(
            String::from_utf8(out).unwrap(),
            concat!(
                r#"{"attributes":["#,
                r#"{"key":"count","value":{"intValue":"42"}},"#,
                r#"{"key":"raw","value":{"bytesValue":"/wA="}},"#,
                r#"{"key":"nan","value":{"doubleValue":"NaN"}},"#,
                r#"{"key":"list","value":{"arrayValue":{"values":[{"boolValue":true}]}}}"#,
                r#"],"droppedAttributesCount":1}"#,
            )
        );
    }
}
