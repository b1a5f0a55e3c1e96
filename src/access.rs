//! Element access strategies.
//!
//! The codec reads and writes leaves through one of two accessors, chosen by
//! the buffer's representation: the deserialized form copies whole bytes in
//! host order, the serialized form goes through the bit serializer with the
//! element's byte order. Both expose the same `get`/`set` pair so the codec
//! code path is identical for either representation.

use crate::bits::{read_bits, write_bits};
use crate::errors::CodecError;
use crate::layout::{DataRepresentation, LayoutElement};
use crate::value::{Value, ValueType};

/// Strategy object for reading and writing a single leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementAccessor {
    Deserialized,
    Serialized,
}

impl ElementAccessor {
    pub fn for_representation(representation: DataRepresentation) -> ElementAccessor {
        match representation {
            DataRepresentation::Deserialized => ElementAccessor::Deserialized,
            DataRepresentation::Serialized => ElementAccessor::Serialized,
        }
    }

    /// Reads the element's value out of `data`.
    pub fn get_value(&self, element: &LayoutElement, data: &[u8]) -> Result<Value, CodecError> {
        match self {
            ElementAccessor::Deserialized => {
                let bytes = deserialized_slice(element, data)?;
                Ok(read_native(element.value_type, bytes))
            }
            ElementAccessor::Serialized => {
                let position = element.serialized;
                check_serialized_width(element.value_type, position.bit_size)?;
                let raw = read_bits(data, position.bit_offset, position.bit_size, element.byte_order)?;
                Ok(Value::from_bits(element.value_type, raw, position.bit_size))
            }
        }
    }

    /// Writes `value` into `data`, converting it to the element's type.
    pub fn set_value(
        &self,
        element: &LayoutElement,
        data: &mut [u8],
        value: &Value,
    ) -> Result<(), CodecError> {
        let value = value.convert_to(element.value_type)?;
        match self {
            ElementAccessor::Deserialized => {
                let range = deserialized_range(element, data.len())?;
                write_native(&value, &mut data[range]);
                Ok(())
            }
            ElementAccessor::Serialized => {
                let position = element.serialized;
                check_serialized_width(element.value_type, position.bit_size)?;
                write_bits(
                    data,
                    position.bit_offset,
                    position.bit_size,
                    value.to_bits(),
                    element.byte_order,
                )
            }
        }
    }
}

fn check_serialized_width(value_type: ValueType, bit_size: usize) -> Result<(), CodecError> {
    let width = value_type.bit_size();
    if value_type.is_float() && bit_size != width {
        return Err(CodecError::InvalidArg(format!(
            "float element of {bit_size} bits, expected {width}"
        )));
    }
    if bit_size == 0 || bit_size > width {
        return Err(CodecError::InvalidArg(format!(
            "element of {bit_size} bits does not fit its {width}-bit type"
        )));
    }
    Ok(())
}

fn deserialized_range(
    element: &LayoutElement,
    buffer_len: usize,
) -> Result<std::ops::Range<usize>, CodecError> {
    if buffer_len == 0 {
        return Err(CodecError::NullPointer);
    }
    let position = element.deserialized;
    if position.bit_offset % 8 != 0 || position.bit_size % 8 != 0 {
        return Err(CodecError::InvalidArg(format!(
            "element '{}' is not byte aligned in the deserialized layout",
            element.name
        )));
    }
    if position.bit_size != element.value_type.bit_size() {
        return Err(CodecError::InvalidArg(format!(
            "element '{}' has {} bits, expected {}",
            element.name,
            position.bit_size,
            element.value_type.bit_size()
        )));
    }
    let offset = position.bit_offset / 8;
    let size = position.bit_size / 8;
    if buffer_len < offset + size {
        return Err(CodecError::InvalidArg(format!(
            "element '{}' at byte {} exceeds buffer of {} bytes",
            element.name, offset, buffer_len
        )));
    }
    Ok(offset..offset + size)
}

fn deserialized_slice<'a>(
    element: &LayoutElement,
    data: &'a [u8],
) -> Result<&'a [u8], CodecError> {
    let range = deserialized_range(element, data.len())?;
    Ok(&data[range])
}

fn read_native(value_type: ValueType, bytes: &[u8]) -> Value {
    match value_type {
        ValueType::Bool => Value::Bool(bytes[0] != 0),
        ValueType::Int8 => Value::Int8(bytes[0] as i8),
        ValueType::UInt8 => Value::UInt8(bytes[0]),
        ValueType::Int16 => {
            let mut b = [0u8; 2];
            b.copy_from_slice(bytes);
            Value::Int16(i16::from_ne_bytes(b))
        }
        ValueType::UInt16 => {
            let mut b = [0u8; 2];
            b.copy_from_slice(bytes);
            Value::UInt16(u16::from_ne_bytes(b))
        }
        ValueType::Int32 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(bytes);
            Value::Int32(i32::from_ne_bytes(b))
        }
        ValueType::UInt32 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(bytes);
            Value::UInt32(u32::from_ne_bytes(b))
        }
        ValueType::Int64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(bytes);
            Value::Int64(i64::from_ne_bytes(b))
        }
        ValueType::UInt64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(bytes);
            Value::UInt64(u64::from_ne_bytes(b))
        }
        ValueType::Float32 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(bytes);
            Value::Float32(f32::from_ne_bytes(b))
        }
        ValueType::Float64 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(bytes);
            Value::Float64(f64::from_ne_bytes(b))
        }
    }
}

fn write_native(value: &Value, bytes: &mut [u8]) {
    match *value {
        Value::Bool(v) => bytes[0] = v as u8,
        Value::Int8(v) => bytes[0] = v as u8,
        Value::UInt8(v) => bytes[0] = v,
        Value::Int16(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
        Value::UInt16(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
        Value::Int32(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
        Value::UInt32(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
        Value::Int64(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
        Value::UInt64(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
        Value::Float32(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
        Value::Float64(v) => bytes.copy_from_slice(&v.to_ne_bytes()),
    }
}
