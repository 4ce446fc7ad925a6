//! Reference decoding of the OTLP common messages, for checking marshaler output.

use super::{AnyValue, InstrumentationScope, KeyValue, Resource};

#[derive(Clone, PartialEq, prost::Message)]
pub struct AnyValueProto {
    #[prost(oneof = "any_value_proto::Value", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub value: Option<any_value_proto::Value>,
}

pub mod any_value_proto {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "1")]
        StringValue(String),
        #[prost(bool, tag = "2")]
        BoolValue(bool),
        #[prost(int64, tag = "3")]
        IntValue(i64),
        #[prost(double, tag = "4")]
        DoubleValue(f64),
        #[prost(message, tag = "5")]
        ArrayValue(super::ArrayValueProto),
        #[prost(message, tag = "6")]
        KvlistValue(super::KeyValueListProto),
        #[prost(bytes = "vec", tag = "7")]
        BytesValue(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ArrayValueProto {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<AnyValueProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct KeyValueListProto {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<KeyValueProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct KeyValueProto {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<AnyValueProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InstrumentationScopeProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(message, repeated, tag = "3")]
    pub attributes: Vec<KeyValueProto>,
    #[prost(uint32, tag = "4")]
    pub dropped_attributes_count: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResourceProto {
    #[prost(message, repeated, tag = "1")]
    pub attributes: Vec<KeyValueProto>,
    #[prost(uint32, tag = "2")]
    pub dropped_attributes_count: u32,
}

pub fn any_value(value: &AnyValue) -> AnyValueProto {
    use any_value_proto::Value;

    let value = match value {
        AnyValue::String(s) => Value::StringValue(s.clone()),
        AnyValue::Bool(b) => Value::BoolValue(*b),
        AnyValue::Int(i) => Value::IntValue(*i),
        AnyValue::Double(d) => Value::DoubleValue(*d),
        AnyValue::Array(values) => Value::ArrayValue(ArrayValueProto {
            values: values.iter().map(any_value).collect(),
        }),
        AnyValue::KeyValueList(values) => Value::KvlistValue(KeyValueListProto {
            values: values.iter().map(key_value).collect(),
        }),
        AnyValue::Bytes(b) => Value::BytesValue(b.clone()),
    };
    AnyValueProto { value: Some(value) }
}

pub fn key_value(kv: &KeyValue) -> KeyValueProto {
    KeyValueProto {
        key: kv.key.clone(),
        value: Some(any_value(&kv.value)),
    }
}

pub fn scope(scope: &InstrumentationScope) -> InstrumentationScopeProto {
    InstrumentationScopeProto {
        name: scope.name.clone(),
        version: scope.version.clone(),
        attributes: scope.attributes.iter().map(key_value).collect(),
        dropped_attributes_count: scope.dropped_attributes_count,
    }
}

pub fn resource(resource: &Resource) -> ResourceProto {
    ResourceProto {
        attributes: resource.attributes.iter().map(key_value).collect(),
        dropped_attributes_count: resource.dropped_attributes_count,
    }
}
