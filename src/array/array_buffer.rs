use thiserror::Error;

use crate::data_type::{
    copy_component, copy_value, format_value, parse_value, DataTypeError, ExtendedType, Record,
};

/// A buffer of values to write to an array or attribute.
///
/// Fixed size values are passed as native-endian bytes, strings as optional owned strings and values of
/// compound types with string components as [`Record`]s.
#[derive(Copy, Clone, Debug)]
pub enum ArrayBuffer<'a> {
    /// Fixed size values.
    Bytes(&'a [u8]),
    /// Strings.
    Strings(&'a [Option<String>]),
    /// Compound records with string components.
    Records(&'a [Record]),
}

/// A buffer receiving values read from an array or attribute. See [`ArrayBuffer`].
#[derive(Debug)]
pub enum ArrayBufferMut<'a> {
    /// Fixed size values.
    Bytes(&'a mut [u8]),
    /// Strings.
    Strings(&'a mut [Option<String>]),
    /// Compound records with string components.
    Records(&'a mut [Record]),
}

/// The buffer does not match its declared data type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("buffer of {0} does not match buffer data type {1}")]
pub struct IncompatibleBufferError(&'static str, String);

fn buffer_len(
    kind: &'static str,
    len: usize,
    buffer_type: &ExtendedType,
) -> Result<usize, IncompatibleBufferError> {
    match (kind, buffer_type.fixed_size()) {
        ("strings", None) if buffer_type.is_string() => Ok(len),
        ("records", None) if buffer_type.as_record_type().is_some() => Ok(len),
        ("bytes", Some(size)) if size > 0 => Ok(len / size),
        _ => Err(IncompatibleBufferError(kind, buffer_type.to_string())),
    }
}

fn incompatible(src_type: &ExtendedType, dst_type: &ExtendedType) -> DataTypeError {
    DataTypeError::IncompatibleConversion(src_type.to_string(), dst_type.to_string())
}

impl ArrayBuffer<'_> {
    /// Return the number of elements of `buffer_type` held by the buffer.
    ///
    /// # Errors
    /// Returns [`IncompatibleBufferError`] if the buffer kind does not match `buffer_type`.
    pub fn len_elements(&self, buffer_type: &ExtendedType) -> Result<usize, IncompatibleBufferError> {
        match self {
            Self::Bytes(bytes) => buffer_len("bytes", bytes.len(), buffer_type),
            Self::Strings(strings) => buffer_len("strings", strings.len(), buffer_type),
            Self::Records(records) => buffer_len("records", records.len(), buffer_type),
        }
    }

    /// Convert element `index` into a fixed size value of `dst_type`.
    pub(crate) fn load(
        &self,
        buffer_type: &ExtendedType,
        index: usize,
        dst: &mut [u8],
        dst_type: &ExtendedType,
    ) -> Result<(), DataTypeError> {
        match self {
            Self::Bytes(bytes) => copy_value(
                element(bytes, buffer_type, index),
                buffer_type,
                dst,
                dst_type,
            ),
            Self::Strings(strings) => parse_value(strings[index].as_deref(), dst, dst_type),
            Self::Records(records) => copy_component(
                records[index].bytes(),
                records[index].strings(),
                buffer_type,
                dst,
                &mut [],
                dst_type,
            ),
        }
    }

    /// Convert element `index` into a string.
    pub(crate) fn load_string(
        &self,
        buffer_type: &ExtendedType,
        index: usize,
    ) -> Result<Option<String>, DataTypeError> {
        match self {
            Self::Bytes(bytes) => {
                format_value(element(bytes, buffer_type, index), buffer_type).map(Some)
            }
            Self::Strings(strings) => Ok(strings[index].clone()),
            Self::Records(_) => Err(incompatible(buffer_type, &ExtendedType::string())),
        }
    }

    /// Convert element `index` into a record of `dst_type`, a compound type with string components.
    pub(crate) fn load_record(
        &self,
        buffer_type: &ExtendedType,
        index: usize,
        dst: &mut Record,
        dst_type: &ExtendedType,
    ) -> Result<(), DataTypeError> {
        if let Some(compound_type) = dst_type.as_record_type() {
            dst.conform(compound_type);
        }
        let (bytes, strings) = match self {
            Self::Bytes(bytes) => (element(bytes, buffer_type, index), &[][..]),
            Self::Strings(_) => return Err(incompatible(buffer_type, dst_type)),
            Self::Records(records) => (records[index].bytes(), records[index].strings()),
        };
        let (dst_bytes, dst_strings) = dst.parts_mut();
        copy_component(bytes, strings, buffer_type, dst_bytes, dst_strings, dst_type)
    }
}

impl ArrayBufferMut<'_> {
    /// Return the number of elements of `buffer_type` held by the buffer.
    ///
    /// # Errors
    /// Returns [`IncompatibleBufferError`] if the buffer kind does not match `buffer_type`.
    pub fn len_elements(&self, buffer_type: &ExtendedType) -> Result<usize, IncompatibleBufferError> {
        match self {
            Self::Bytes(bytes) => buffer_len("bytes", bytes.len(), buffer_type),
            Self::Strings(strings) => buffer_len("strings", strings.len(), buffer_type),
            Self::Records(records) => buffer_len("records", records.len(), buffer_type),
        }
    }

    /// Convert a fixed size value of `src_type` into element `index`.
    pub(crate) fn store(
        &mut self,
        buffer_type: &ExtendedType,
        index: usize,
        src: &[u8],
        src_type: &ExtendedType,
    ) -> Result<(), DataTypeError> {
        match self {
            Self::Bytes(bytes) => {
                copy_value(src, src_type, element_mut(bytes, buffer_type, index), buffer_type)
            }
            Self::Strings(strings) => {
                strings[index] = Some(format_value(src, src_type)?);
                Ok(())
            }
            Self::Records(records) => {
                store_in_record(&mut records[index], buffer_type, src, &[], src_type)
            }
        }
    }

    /// Convert a string into element `index`.
    pub(crate) fn store_string(
        &mut self,
        buffer_type: &ExtendedType,
        index: usize,
        src: Option<String>,
    ) -> Result<(), DataTypeError> {
        match self {
            Self::Bytes(bytes) => parse_value(
                src.as_deref(),
                element_mut(bytes, buffer_type, index),
                buffer_type,
            ),
            Self::Strings(strings) => {
                strings[index] = src;
                Ok(())
            }
            Self::Records(_) => Err(incompatible(&ExtendedType::string(), buffer_type)),
        }
    }

    /// Convert a record of `src_type`, a compound type with string components, into element `index`.
    pub(crate) fn store_record(
        &mut self,
        buffer_type: &ExtendedType,
        index: usize,
        src: &Record,
        src_type: &ExtendedType,
    ) -> Result<(), DataTypeError> {
        match self {
            Self::Bytes(bytes) => copy_component(
                src.bytes(),
                src.strings(),
                src_type,
                element_mut(bytes, buffer_type, index),
                &mut [],
                buffer_type,
            ),
            Self::Strings(_) => Err(incompatible(src_type, buffer_type)),
            Self::Records(records) => store_in_record(
                &mut records[index],
                buffer_type,
                src.bytes(),
                src.strings(),
                src_type,
            ),
        }
    }
}

fn store_in_record(
    record: &mut Record,
    record_type: &ExtendedType,
    src: &[u8],
    src_strings: &[Option<String>],
    src_type: &ExtendedType,
) -> Result<(), DataTypeError> {
    if let Some(compound_type) = record_type.as_record_type() {
        record.conform(compound_type);
    }
    let (bytes, strings) = record.parts_mut();
    copy_component(src, src_strings, src_type, bytes, strings, record_type)
}

fn element<'a>(bytes: &'a [u8], buffer_type: &ExtendedType, index: usize) -> &'a [u8] {
    let size = buffer_type.fixed_size().unwrap_or(1);
    &bytes[index * size..(index + 1) * size]
}

fn element_mut<'a>(bytes: &'a mut [u8], buffer_type: &ExtendedType, index: usize) -> &'a mut [u8] {
    let size = buffer_type.fixed_size().unwrap_or(1);
    &mut bytes[index * size..(index + 1) * size]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::{Component, CompoundType, NumericType};

    #[test]
    fn buffer_lengths() {
        let bytes = [0u8; 10];
        let float32: ExtendedType = NumericType::Float32.into();
        assert_eq!(ArrayBuffer::Bytes(&bytes).len_elements(&float32), Ok(2));
        assert!(ArrayBuffer::Bytes(&bytes)
            .len_elements(&ExtendedType::string())
            .is_err());
        let strings = vec![None; 3];
        assert_eq!(
            ArrayBuffer::Strings(&strings).len_elements(&ExtendedType::string()),
            Ok(3)
        );
        assert!(ArrayBuffer::Strings(&strings).len_elements(&float32).is_err());
    }

    #[test]
    fn buffer_conversions() {
        let int16: ExtendedType = NumericType::Int16.into();
        let float64: ExtendedType = NumericType::Float64.into();
        let mut strings = vec![None; 2];
        let mut buffer = ArrayBufferMut::Strings(&mut strings);
        buffer.store(&ExtendedType::string(), 1, &7i16.to_ne_bytes(), &int16).unwrap();
        assert_eq!(strings[1].as_deref(), Some("7"));

        let mut bytes = [0u8; 16];
        let mut buffer = ArrayBufferMut::Bytes(&mut bytes);
        buffer.store_string(&float64, 1, Some("1.5".to_string())).unwrap();
        assert_eq!(f64::from_ne_bytes(bytes[8..].try_into().unwrap()), 1.5);

        let mut value = [0u8; 2];
        ArrayBuffer::Bytes(&bytes)
            .load(&float64, 1, &mut value, &int16)
            .unwrap();
        assert_eq!(i16::from_ne_bytes(value), 2);
    }

    #[test]
    fn record_buffers() {
        let station = CompoundType::new(
            "station",
            12,
            vec![
                Component::new("name", 0, ExtendedType::string()),
                Component::new("id", 8, NumericType::Int32.into()),
            ],
        )
        .unwrap();
        let numeric = CompoundType::new(
            "station_id",
            8,
            vec![Component::new("id", 0, NumericType::Float64.into())],
        )
        .unwrap();
        let station_type: ExtendedType = station.clone().into();
        let numeric_type: ExtendedType = numeric.into();

        let mut record = Record::new(&station);
        record.strings_mut()[0] = Some("alpha".to_string());
        record.bytes_mut()[8..].copy_from_slice(&7i32.to_ne_bytes());
        let records = [Record::default(), record];
        let buffer = ArrayBuffer::Records(&records);
        assert_eq!(buffer.len_elements(&station_type), Ok(2));
        assert!(buffer.len_elements(&ExtendedType::string()).is_err());
        assert!(ArrayBuffer::Strings(&[]).len_elements(&station_type).is_err());

        let mut id = [0u8; 8];
        buffer.load(&station_type, 1, &mut id, &numeric_type).unwrap();
        assert_eq!(f64::from_ne_bytes(id), 7.0);
        assert!(buffer.load_string(&station_type, 1).is_err());

        let mut copy = Record::default();
        buffer.load_record(&station_type, 1, &mut copy, &station_type).unwrap();
        assert_eq!(copy, records[1]);

        let mut out = vec![Record::default(); 1];
        let mut buffer = ArrayBufferMut::Records(&mut out);
        buffer.store(&station_type, 0, &id, &numeric_type).unwrap();
        assert_eq!(out[0].strings(), &[None]);
        assert_eq!(i32::from_ne_bytes(out[0].bytes()[8..].try_into().unwrap()), 7);
    }
}
