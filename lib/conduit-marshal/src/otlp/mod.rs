//! Marshalers for the OTLP common messages: attribute values, key/value pairs, instrumentation scopes and resources.

use crate::{wire::WireType, Marshaler, MemoryMode, ProtoFieldInfo, ReusableMarshaler};

mod common;
pub use self::common::{
    AnyValueMarshaler, ArrayValueMarshaler, InstrumentationScopeMarshaler, KeyValueListMarshaler, KeyValueMarshaler,
    ResourceMarshaler,
};

mod stateless;
pub use self::stateless::{
    AnyValueStatelessMarshaler, InstrumentationScopeStatelessMarshaler, KeyValueStatelessMarshaler,
    ResourceStatelessMarshaler,
};

#[cfg(test)]
mod reference;

pub(crate) mod fields {
    use super::*;

    pub const ANY_VALUE_STRING: ProtoFieldInfo = ProtoFieldInfo::new(1, WireType::LengthDelimited, "stringValue");
    pub const ANY_VALUE_BOOL: ProtoFieldInfo = ProtoFieldInfo::new(2, WireType::Varint, "boolValue");
    pub const ANY_VALUE_INT: ProtoFieldInfo = ProtoFieldInfo::new(3, WireType::Varint, "intValue");
    pub const ANY_VALUE_DOUBLE: ProtoFieldInfo = ProtoFieldInfo::new(4, WireType::Fixed64, "doubleValue");
    pub const ANY_VALUE_ARRAY: ProtoFieldInfo = ProtoFieldInfo::new(5, WireType::LengthDelimited, "arrayValue");
    pub const ANY_VALUE_KVLIST: ProtoFieldInfo = ProtoFieldInfo::new(6, WireType::LengthDelimited, "kvlistValue");
    pub const ANY_VALUE_BYTES: ProtoFieldInfo = ProtoFieldInfo::new(7, WireType::LengthDelimited, "bytesValue");

    pub const ARRAY_VALUE_VALUES: ProtoFieldInfo = ProtoFieldInfo::new(1, WireType::LengthDelimited, "values");
    pub const KEY_VALUE_LIST_VALUES: ProtoFieldInfo = ProtoFieldInfo::new(1, WireType::LengthDelimited, "values");

    pub const KEY_VALUE_KEY: ProtoFieldInfo = ProtoFieldInfo::new(1, WireType::LengthDelimited, "key");
    pub const KEY_VALUE_VALUE: ProtoFieldInfo = ProtoFieldInfo::new(2, WireType::LengthDelimited, "value");

    pub const SCOPE_NAME: ProtoFieldInfo = ProtoFieldInfo::new(1, WireType::LengthDelimited, "name");
    pub const SCOPE_VERSION: ProtoFieldInfo = ProtoFieldInfo::new(2, WireType::LengthDelimited, "version");
    pub const SCOPE_ATTRIBUTES: ProtoFieldInfo = ProtoFieldInfo::new(3, WireType::LengthDelimited, "attributes");
    pub const SCOPE_DROPPED_ATTRIBUTES_COUNT: ProtoFieldInfo =
        ProtoFieldInfo::new(4, WireType::Varint, "droppedAttributesCount");

    pub const RESOURCE_ATTRIBUTES: ProtoFieldInfo = ProtoFieldInfo::new(1, WireType::LengthDelimited, "attributes");
    pub const RESOURCE_DROPPED_ATTRIBUTES_COUNT: ProtoFieldInfo =
        ProtoFieldInfo::new(2, WireType::Varint, "droppedAttributesCount");
}

/// An attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Array(Vec<AnyValue>),
    KeyValueList(Vec<KeyValue>),
    Bytes(Vec<u8>),
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        AnyValue::String(value.to_string())
    }
}

impl From<String> for AnyValue {
    fn from(value: String) -> Self {
        AnyValue::String(value)
    }
}

impl From<bool> for AnyValue {
    fn from(value: bool) -> Self {
        AnyValue::Bool(value)
    }
}

impl From<i64> for AnyValue {
    fn from(value: i64) -> Self {
        AnyValue::Int(value)
    }
}

impl From<f64> for AnyValue {
    fn from(value: f64) -> Self {
        AnyValue::Double(value)
    }
}

impl From<Vec<AnyValue>> for AnyValue {
    fn from(values: Vec<AnyValue>) -> Self {
        AnyValue::Array(values)
    }
}

/// A key/value pair, as used for attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    /// Creates a new `KeyValue`.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<AnyValue>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The library that produced a set of telemetry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
}

/// The entity that produced a set of telemetry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
}

/// Creates a marshaler for `resource` in the given memory mode.
///
/// In [`MemoryMode::ImmutableData`], the resource is copied into a marshaler that can be shared and encoded any number
/// of times. In [`MemoryMode::ReusableData`], the resource is kept as-is and encoded through a recycled
/// [`MarshalerContext`][crate::MarshalerContext].
pub fn resource_marshaler(resource: Resource, mode: MemoryMode) -> Box<dyn Marshaler + Send> {
    match mode {
        MemoryMode::ImmutableData => Box::new(ResourceMarshaler::create(&resource)),
        MemoryMode::ReusableData => Box::new(ReusableMarshaler::new(resource, ResourceStatelessMarshaler)),
    }
}

/// Creates a marshaler for `scope` in the given memory mode.
pub fn instrumentation_scope_marshaler(scope: InstrumentationScope, mode: MemoryMode) -> Box<dyn Marshaler + Send> {
    match mode {
        MemoryMode::ImmutableData => Box::new(InstrumentationScopeMarshaler::create(&scope)),
        MemoryMode::ReusableData => Box::new(ReusableMarshaler::new(scope, InstrumentationScopeStatelessMarshaler)),
    }
}

#[cfg(test)]
mod tests {
    use proptest::{collection::vec as arb_vec, prelude::*};
    use prost::Message as _;

    use super::*;
    use crate::to_binary;

    fn arb_key_values(value: impl Strategy<Value = AnyValue>, max_len: usize) -> impl Strategy<Value = Vec<KeyValue>> {
        arb_vec((".{0,8}", value), 0..max_len)
            .prop_map(|pairs| pairs.into_iter().map(|(key, value)| KeyValue { key, value }).collect())
    }

    fn arb_any_value() -> impl Strategy<Value = AnyValue> {
        let leaf = prop_oneof![
            ".{0,12}".prop_map(AnyValue::String),
            any::<bool>().prop_map(AnyValue::Bool),
            any::<i64>().prop_map(AnyValue::Int),
            (-1.0e12f64..1.0e12).prop_map(AnyValue::Double),
            arb_vec(any::<u8>(), 0..16).prop_map(AnyValue::Bytes),
        ];

        leaf.prop_recursive(4, 64, 6, |inner| {
            prop_oneof![
                arb_vec(inner.clone(), 0..6).prop_map(AnyValue::Array),
                arb_key_values(inner, 6).prop_map(AnyValue::KeyValueList),
            ]
        })
    }

    fn arb_resource() -> impl Strategy<Value = Resource> {
        (arb_key_values(arb_any_value(), 8), any::<u32>()).prop_map(|(attributes, dropped_attributes_count)| Resource {
            attributes,
            dropped_attributes_count,
        })
    }

    proptest! {
        #[test]
        fn property_test_resource_marshalers(resource in arb_resource()) {
            let immutable = resource_marshaler(resource.clone(), MemoryMode::ImmutableData);
            let reusable = resource_marshaler(resource.clone(), MemoryMode::ReusableData);

            let immutable_bytes = to_binary(&*immutable).unwrap();
            prop_assert_eq!(immutable_bytes.len(), immutable.compute_size());

            let reusable_bytes = to_binary(&*reusable).unwrap();
            prop_assert_eq!(reusable_bytes.len(), reusable.compute_size());
            prop_assert_eq!(&reusable_bytes, &immutable_bytes);

            let decoded = reference::ResourceProto::decode(immutable_bytes.as_slice()).unwrap();
            prop_assert_eq!(decoded, reference::resource(&resource));
        }
    }
}
