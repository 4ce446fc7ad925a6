use std::io;

use super::{fields::*, AnyValue, InstrumentationScope, KeyValue, Resource};
use crate::{
    size::{length_delimited_size, size_uint32},
    stateless::{
        size_message_with_context, size_repeated_message_with_context, size_string_with_context, StatelessMarshaler,
    },
    wire::varint_size,
    MarshalerContext, Serializer, Text,
};

/// Stateless marshaler for an `AnyValue`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyValueStatelessMarshaler;

impl StatelessMarshaler<AnyValue> for AnyValueStatelessMarshaler {
    fn binary_size(&self, value: &AnyValue, context: &mut MarshalerContext) -> usize {
        match value {
            AnyValue::String(s) => length_delimited_size(&ANY_VALUE_STRING, s.len()),
            AnyValue::Bool(_) => ANY_VALUE_BOOL.tag_size() + 1,
            AnyValue::Int(i) => ANY_VALUE_INT.tag_size() + varint_size(*i as u64),
            AnyValue::Double(_) => ANY_VALUE_DOUBLE.tag_size() + 8,
            AnyValue::Array(values) => {
                size_message_with_context(&ANY_VALUE_ARRAY, values.as_slice(), &ArrayValues, context)
            }
            AnyValue::KeyValueList(values) => {
                size_message_with_context(&ANY_VALUE_KVLIST, values.as_slice(), &KeyValueList, context)
            }
            AnyValue::Bytes(b) => length_delimited_size(&ANY_VALUE_BYTES, b.len()),
        }
    }

    fn write_to(
        &self, output: &mut dyn Serializer, value: &AnyValue, context: &mut MarshalerContext,
    ) -> io::Result<()> {
        match value {
            AnyValue::String(s) => output.write_string(&ANY_VALUE_STRING, Text::Utf8(s), s.len()),
            AnyValue::Bool(b) => output.write_bool(&ANY_VALUE_BOOL, *b),
            AnyValue::Int(i) => output.write_int64(&ANY_VALUE_INT, *i),
            AnyValue::Double(d) => output.write_double(&ANY_VALUE_DOUBLE, *d),
            AnyValue::Array(values) => {
                output.serialize_message_with_context(&ANY_VALUE_ARRAY, values.as_slice(), &ArrayValues, context)
            }
            AnyValue::KeyValueList(values) => {
                output.serialize_message_with_context(&ANY_VALUE_KVLIST, values.as_slice(), &KeyValueList, context)
            }
            AnyValue::Bytes(b) => output.write_bytes(&ANY_VALUE_BYTES, b),
        }
    }
}

struct ArrayValues;

impl StatelessMarshaler<[AnyValue]> for ArrayValues {
    fn binary_size(&self, values: &[AnyValue], context: &mut MarshalerContext) -> usize {
        size_repeated_message_with_context(&ARRAY_VALUE_VALUES, values, &AnyValueStatelessMarshaler, context)
    }

    fn write_to(
        &self, output: &mut dyn Serializer, values: &[AnyValue], context: &mut MarshalerContext,
    ) -> io::Result<()> {
        output.serialize_repeated_message_with_context(
            &ARRAY_VALUE_VALUES,
            values,
            &AnyValueStatelessMarshaler,
            context,
        )
    }
}

struct KeyValueList;

impl StatelessMarshaler<[KeyValue]> for KeyValueList {
    fn binary_size(&self, values: &[KeyValue], context: &mut MarshalerContext) -> usize {
        size_repeated_message_with_context(&KEY_VALUE_LIST_VALUES, values, &KeyValueStatelessMarshaler, context)
    }

    fn write_to(
        &self, output: &mut dyn Serializer, values: &[KeyValue], context: &mut MarshalerContext,
    ) -> io::Result<()> {
        output.serialize_repeated_message_with_context(
            &KEY_VALUE_LIST_VALUES,
            values,
            &KeyValueStatelessMarshaler,
            context,
        )
    }
}

/// Stateless marshaler for a `KeyValue`.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyValueStatelessMarshaler;

impl StatelessMarshaler<KeyValue> for KeyValueStatelessMarshaler {
    fn binary_size(&self, value: &KeyValue, context: &mut MarshalerContext) -> usize {
        size_string_with_context(&KEY_VALUE_KEY, Text::from(&value.key), context)
            + size_message_with_context(&KEY_VALUE_VALUE, &value.value, &AnyValueStatelessMarshaler, context)
    }

    fn write_to(
        &self, output: &mut dyn Serializer, value: &KeyValue, context: &mut MarshalerContext,
    ) -> io::Result<()> {
        output.serialize_string_with_context(&KEY_VALUE_KEY, Text::from(&value.key), context)?;
        output.serialize_message_with_context(&KEY_VALUE_VALUE, &value.value, &AnyValueStatelessMarshaler, context)
    }
}

/// Stateless marshaler for an `InstrumentationScope`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstrumentationScopeStatelessMarshaler;

impl StatelessMarshaler<InstrumentationScope> for InstrumentationScopeStatelessMarshaler {
    fn binary_size(&self, scope: &InstrumentationScope, context: &mut MarshalerContext) -> usize {
        size_string_with_context(&SCOPE_NAME, Text::from(&scope.name), context)
            + size_string_with_context(&SCOPE_VERSION, Text::from(&scope.version), context)
            + size_repeated_message_with_context(
                &SCOPE_ATTRIBUTES,
                &scope.attributes,
                &KeyValueStatelessMarshaler,
                context,
            )
            + size_uint32(&SCOPE_DROPPED_ATTRIBUTES_COUNT, scope.dropped_attributes_count)
    }

    fn write_to(
        &self, output: &mut dyn Serializer, scope: &InstrumentationScope, context: &mut MarshalerContext,
    ) -> io::Result<()> {
        output.serialize_string_with_context(&SCOPE_NAME, Text::from(&scope.name), context)?;
        output.serialize_string_with_context(&SCOPE_VERSION, Text::from(&scope.version), context)?;
        output.serialize_repeated_message_with_context(
            &SCOPE_ATTRIBUTES,
            &scope.attributes,
            &KeyValueStatelessMarshaler,
            context,
        )?;
        output.serialize_uint32(&SCOPE_DROPPED_ATTRIBUTES_COUNT, scope.dropped_attributes_count)
    }
}

/// Stateless marshaler for a `Resource`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResourceStatelessMarshaler;

impl StatelessMarshaler<Resource> for ResourceStatelessMarshaler {
    fn binary_size(&self, resource: &Resource, context: &mut MarshalerContext) -> usize {
        size_repeated_message_with_context(
            &RESOURCE_ATTRIBUTES,
            &resource.attributes,
            &KeyValueStatelessMarshaler,
            context,
        ) + size_uint32(&RESOURCE_DROPPED_ATTRIBUTES_COUNT, resource.dropped_attributes_count)
    }

    fn write_to(
        &self, output: &mut dyn Serializer, resource: &Resource, context: &mut MarshalerContext,
    ) -> io::Result<()> {
        output.serialize_repeated_message_with_context(
            &RESOURCE_ATTRIBUTES,
            &resource.attributes,
            &KeyValueStatelessMarshaler,
            context,
        )?;
        output.serialize_uint32(&RESOURCE_DROPPED_ATTRIBUTES_COUNT, resource.dropped_attributes_count)
    }
}
