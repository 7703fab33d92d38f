//! Attributes.
//!
//! An [`Attribute`] is a scalar or one-dimensional named value attached to a group or an array.
//!
//! Attributes stored as characters are exposed as a single string. Dynamically sized string attributes and
//! compound attributes can only be rewritten as a whole.

use std::sync::Arc;

use serde_json::{Number, Value};
use thiserror::Error;

use crate::{
    array::{ArrayBuffer, ArrayBufferMut, IncompatibleBufferError},
    array_subset::{Selection, SelectionError},
    data_type::{
        attribute_native_type, build_data_type, create_or_get_type, DataTypeError, Element,
        ExtendedType, NativeRepr, NativeTypeOverride, NumericType, Record,
    },
    engine::{Engine, EngineError, GroupId, LogEngineError, NativeType, VarId},
    group::{child_full_name, renamed_full_name},
    shared::SharedResources,
};

/// An attribute error.
#[derive(Debug, Error)]
pub enum AttributeError {
    /// An engine error.
    #[error(transparent)]
    EngineError(#[from] EngineError),
    /// A data type error.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// A selection error.
    #[error(transparent)]
    SelectionError(#[from] SelectionError),
    /// The buffer does not match the buffer data type.
    #[error(transparent)]
    IncompatibleBuffer(#[from] IncompatibleBufferError),
    /// The container is read only.
    #[error("attribute {0} cannot be created or modified in a read only container")]
    ReadOnly(String),
    /// Attributes have at most one dimension.
    #[error("attributes have at most one dimension, got {0}")]
    TooManyDimensions(usize),
    /// A write that does not cover the whole attribute.
    #[error("only contiguous writing of all values of attribute {0} is supported")]
    PartialWrite(String),
    /// The attribute type has no logical equivalent.
    #[error("attribute {0} has unsupported native type {1}")]
    UnsupportedType(String, NativeType),
}

/// Options for creating an [`Attribute`].
#[derive(Clone, Debug, Default)]
pub struct AttributeCreateOptions {
    native_type: Option<NativeTypeOverride>,
}

impl AttributeCreateOptions {
    /// Request a specific native type.
    ///
    /// [`NativeTypeOverride::Char`] applies to scalar strings, which are stored as characters by default.
    /// [`NativeTypeOverride::Byte`] applies to [`NumericType::Int16`] values, and
    /// [`NativeTypeOverride::Int64`] and [`NativeTypeOverride::UInt64`] to [`NumericType::Float64`] values.
    #[must_use]
    pub fn with_native_type(mut self, native_type: NativeTypeOverride) -> Self {
        self.native_type = Some(native_type);
        self
    }

    /// The requested native type.
    #[must_use]
    pub const fn native_type(&self) -> Option<NativeTypeOverride> {
        self.native_type
    }
}

/// Options for listing the attributes of a group or array.
#[derive(Clone, Debug, Default)]
pub struct AttributesOptions {
    show_all: bool,
}

impl AttributesOptions {
    /// Also list the attributes that are hidden by default, such as `_FillValue` or `units` on arrays.
    #[must_use]
    pub fn with_show_all(mut self, show_all: bool) -> Self {
        self.show_all = show_all;
        self
    }

    /// Returns true if hidden attributes are listed.
    #[must_use]
    pub const fn show_all(&self) -> bool {
        self.show_all
    }
}

/// An attribute of a group or array.
#[derive(Debug)]
pub struct Attribute {
    shared: Arc<SharedResources>,
    gid: GroupId,
    varid: VarId,
    name: String,
    full_name: String,
    shape: Vec<u64>,
    data_type: Option<ExtendedType>,
    native: NativeRepr,
}

/// Read the first value of a string or character attribute, [`None`] if absent or of another type.
pub(crate) fn text_attribute(
    engine: &dyn Engine,
    gid: GroupId,
    varid: VarId,
    name: &str,
) -> Option<String> {
    match engine.attribute_info(gid, varid, name) {
        Ok(Some((NativeType::Char, len))) => {
            let mut text = vec![0; len];
            engine
                .get_att(gid, varid, name, &mut text)
                .ok()
                .map(|()| text_until_nul(&text))
        }
        Ok(Some((NativeType::String, _))) => engine
            .get_att_strings(gid, varid, name)
            .ok()
            .and_then(|values| values.into_iter().next().flatten()),
        _ => None,
    }
}

/// Returns true if a variable carries a true `_Unsigned` marker.
pub(crate) fn unsigned_marker(engine: &dyn Engine, gid: GroupId, varid: VarId) -> bool {
    text_attribute(engine, gid, varid, "_Unsigned")
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

pub(crate) fn text_until_nul(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&byte| byte == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

impl Attribute {
    /// Open an existing attribute of variable `varid` of group `gid`, or of the group itself if `varid` is
    /// [`GLOBAL`](crate::engine::GLOBAL).
    pub(crate) fn open(
        shared: Arc<SharedResources>,
        gid: GroupId,
        varid: VarId,
        parent_full_name: &str,
        name: &str,
    ) -> Result<Option<Self>, AttributeError> {
        let opened = shared.with_engine(|engine| -> Result<_, AttributeError> {
            let Some((native_type, len)) = engine
                .attribute_info(gid, varid, name)
                .log_engine_error("attribute_info")?
            else {
                return Ok(None);
            };
            let (data_type, perfect, shape) = match native_type {
                NativeType::Char => (Some(ExtendedType::string()), true, vec![]),
                _ => {
                    let unsigned = unsigned_marker(engine, gid, varid);
                    let shape = if len > 1 { vec![len as u64] } else { vec![] };
                    match build_data_type(engine, native_type, unsigned) {
                        Ok((data_type, perfect)) => (Some(data_type), perfect, shape),
                        Err(err) => {
                            tracing::debug!("attribute {name} is not readable: {err}");
                            (None, false, shape)
                        }
                    }
                }
            };
            Ok(Some((native_type, data_type, perfect, shape)))
        })?;
        let Some((native_type, data_type, perfect, shape)) = opened else {
            return Ok(None);
        };
        let native = NativeRepr::new(
            native_type,
            perfect,
            data_type.as_ref().unwrap_or(&ExtendedType::string()),
        );
        Ok(Some(Self {
            full_name: child_full_name(parent_full_name, name),
            shared,
            gid,
            varid,
            name: name.to_string(),
            shape,
            data_type,
            native,
        }))
    }

    /// Create a new attribute. Its value is stored by the first write.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        shared: Arc<SharedResources>,
        gid: GroupId,
        varid: VarId,
        parent_full_name: &str,
        name: &str,
        dimensions: &[u64],
        data_type: &ExtendedType,
        options: &AttributeCreateOptions,
    ) -> Result<Self, AttributeError> {
        if shared.is_read_only() {
            return Err(AttributeError::ReadOnly(name.to_string()));
        }
        if dimensions.len() > 1 {
            return Err(AttributeError::TooManyDimensions(dimensions.len()));
        }
        let created = {
            let _lock = shared.lock();
            shared.set_define_mode(true)?;
            shared.with_engine(|engine| create_or_get_type(engine, gid, data_type))?
        };
        let (native_type, perfect) = attribute_native_type(
            data_type,
            created,
            dimensions.is_empty(),
            options.native_type,
        );
        Ok(Self {
            full_name: child_full_name(parent_full_name, name),
            shared,
            gid,
            varid,
            name: name.to_string(),
            shape: dimensions.to_vec(),
            data_type: Some(data_type.clone()),
            native: NativeRepr::new(native_type, perfect, data_type),
        })
    }

    /// The attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute name prefixed by the full name of its owner.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The attribute shape, empty for scalar attributes.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The number of values.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// The logical data type, [`None`] if the native type has no logical equivalent.
    #[must_use]
    pub const fn data_type(&self) -> Option<&ExtendedType> {
        self.data_type.as_ref()
    }

    /// The native type.
    #[must_use]
    pub const fn native_type(&self) -> NativeType {
        self.native.native_type()
    }

    /// Returns true if the native type is an exact match of the logical data type.
    #[must_use]
    pub const fn is_perfect_match(&self) -> bool {
        self.native.is_perfect()
    }

    /// Rename the attribute.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the container is read only, the attribute no longer exists, or the
    /// name is invalid or already in use.
    pub fn rename(&mut self, new_name: &str) -> Result<(), AttributeError> {
        if self.shared.is_read_only() {
            return Err(AttributeError::ReadOnly(self.full_name.clone()));
        }
        let _lock = self.shared.lock();
        self.shared.set_define_mode(true)?;
        self.shared
            .with_engine(|engine| engine.rename_att(self.gid, self.varid, &self.name, new_name))
            .log_engine_error("rename_att")?;
        self.full_name = renamed_full_name(&self.full_name, &self.name, new_name);
        self.name = new_name.to_string();
        Ok(())
    }

    fn require_data_type(&self) -> Result<&ExtendedType, AttributeError> {
        self.data_type
            .as_ref()
            .ok_or_else(|| AttributeError::UnsupportedType(self.name.clone(), self.native_type()))
    }

    /// Read the values of `selection` into `buffer`, converting them to `buffer_type`.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the selection is invalid, the buffer does not match `buffer_type`, a
    /// conversion is not supported or the engine fails.
    pub fn read(
        &self,
        selection: &Selection,
        buffer_type: &ExtendedType,
        mut buffer: ArrayBufferMut<'_>,
    ) -> Result<(), AttributeError> {
        let buffer_len = buffer.len_elements(buffer_type)?;
        selection.validate(&self.shape, &[false], buffer_len)?;
        if selection.num_elements() == 0 {
            return Ok(());
        }
        let data_type = self.require_data_type()?;
        let _lock = self.shared.lock();
        let (gid, varid, name) = (self.gid, self.varid, self.name.as_str());
        let count = selection.num_elements();
        let source_index = |i: usize| {
            if self.shape.is_empty() {
                0
            } else {
                usize::try_from(selection.array_index(0, i)).unwrap_or(usize::MAX)
            }
        };

        match self.native_type() {
            NativeType::User(_) if data_type.as_record_type().is_some() => {
                let values = self
                    .shared
                    .with_engine(|engine| engine.get_att_records(gid, varid, name))
                    .log_engine_error("get_att_records")?;
                for i in 0..count {
                    let value = values
                        .get(source_index(i))
                        .ok_or(EngineError::InvalidCoordinates)?;
                    buffer.store_record(buffer_type, selection.buffer_index(&[i]), value, data_type)?;
                }
                Ok(())
            }
            NativeType::String => {
                let values = self
                    .shared
                    .with_engine(|engine| engine.get_att_strings(gid, varid, name))
                    .log_engine_error("get_att_strings")?;
                for i in 0..count {
                    let value = values.get(source_index(i)).cloned().flatten();
                    buffer.store_string(buffer_type, selection.buffer_index(&[i]), value)?;
                }
                Ok(())
            }
            NativeType::Char => {
                let text = self
                    .shared
                    .with_engine(|engine| -> Result<_, EngineError> {
                        let len = engine
                            .attribute_info(gid, varid, name)?
                            .map_or(0, |(_, len)| len);
                        let mut text = vec![0; len];
                        engine.get_att(gid, varid, name, &mut text)?;
                        Ok(text)
                    })
                    .log_engine_error("get_att")?;
                buffer.store_string(
                    buffer_type,
                    selection.buffer_index(&[]),
                    Some(text_until_nul(&text)),
                )?;
                Ok(())
            }
            _ => {
                let whole = self.shape.is_empty()
                    || (selection.start()[0] == 0
                        && selection.count()[0] as u64 == self.shape[0]
                        && selection.step()[0] == 1
                        && selection.buffer_stride()[0] == 1);
                if let ArrayBufferMut::Bytes(bytes) = &mut buffer {
                    if whole && self.is_perfect_match() && buffer_type == data_type {
                        return Ok(self
                            .shared
                            .with_engine(|engine| engine.get_att(gid, varid, name, bytes))
                            .log_engine_error("get_att")?);
                    }
                }

                let native_size = self.native.native_size();
                let total = usize::try_from(self.num_elements()).unwrap_or(usize::MAX);
                let mut values = vec![0; total * native_size];
                self.shared
                    .with_engine(|engine| engine.get_att(gid, varid, name, &mut values))
                    .log_engine_error("get_att")?;
                let mut scratch = vec![0; self.native.scratch_size()];
                for i in 0..count {
                    let src = source_index(i);
                    scratch[..native_size]
                        .copy_from_slice(&values[src * native_size..(src + 1) * native_size]);
                    self.native.to_logical(&mut scratch);
                    buffer.store(buffer_type, selection.buffer_index(&[i]), &scratch, data_type)?;
                }
                Ok(())
            }
        }
    }

    /// Write the values of `selection` from `buffer`, converting them from `buffer_type`.
    ///
    /// Only whole attribute writes are supported.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the write does not cover the whole attribute, the buffer does not
    /// match `buffer_type`, a conversion is not supported, the container is read only or the engine fails.
    pub fn write(
        &self,
        selection: &Selection,
        buffer_type: &ExtendedType,
        buffer: ArrayBuffer<'_>,
    ) -> Result<(), AttributeError> {
        if let Some(&len) = self.shape.first() {
            if selection.start() != [0]
                || selection.count().first().map(|&count| count as u64) != Some(len)
                || selection.step() != [1]
            {
                return Err(AttributeError::PartialWrite(self.name.clone()));
            }
        }
        let buffer_len = buffer.len_elements(buffer_type)?;
        selection.validate(&self.shape, &[false], buffer_len)?;
        let data_type = self.require_data_type()?;
        let _lock = self.shared.lock();
        if self.shared.is_read_only() {
            return Err(AttributeError::ReadOnly(self.name.clone()));
        }
        self.shared.set_define_mode(true)?;
        let (gid, varid, name) = (self.gid, self.varid, self.name.as_str());
        let count = selection.num_elements();

        match self.native_type() {
            native_type @ NativeType::User(_) if data_type.as_record_type().is_some() => {
                let values = (0..count)
                    .map(|i| {
                        let mut record = Record::default();
                        buffer
                            .load_record(buffer_type, selection.buffer_index(&[i]), &mut record, data_type)
                            .map(|()| record)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.shared
                    .with_engine(|engine| engine.put_att_records(gid, varid, name, native_type, &values))
                    .log_engine_error("put_att_records")?;
            }
            NativeType::String => {
                let values = (0..count)
                    .map(|i| buffer.load_string(buffer_type, selection.buffer_index(&[i])))
                    .collect::<Result<Vec<_>, _>>()?;
                self.shared
                    .with_engine(|engine| engine.put_att_strings(gid, varid, name, &values))
                    .log_engine_error("put_att_strings")?;
            }
            NativeType::Char => {
                let text = buffer
                    .load_string(buffer_type, selection.buffer_index(&[]))?
                    .unwrap_or_default();
                self.shared
                    .with_engine(|engine| {
                        engine.put_att(gid, varid, name, NativeType::Char, text.len(), text.as_bytes())
                    })
                    .log_engine_error("put_att")?;
            }
            native_type => {
                let unit_stride = selection.buffer_stride().first().map_or(true, |&stride| stride == 1);
                if let ArrayBuffer::Bytes(bytes) = buffer {
                    if unit_stride && self.is_perfect_match() && buffer_type == data_type {
                        self.shared
                            .with_engine(|engine| {
                                engine.put_att(gid, varid, name, native_type, count, bytes)
                            })
                            .log_engine_error("put_att")?;
                        return Ok(());
                    }
                }

                let native_size = self.native.native_size();
                let mut values = vec![0; count * native_size];
                let mut scratch = vec![0; self.native.scratch_size()];
                for (i, value) in values.chunks_exact_mut(native_size).enumerate() {
                    buffer.load(buffer_type, selection.buffer_index(&[i]), &mut scratch, data_type)?;
                    self.native.to_native(&mut scratch);
                    value.copy_from_slice(&scratch[..native_size]);
                }
                self.shared
                    .with_engine(|engine| {
                        engine.put_att(gid, varid, name, native_type, count, &values)
                    })
                    .log_engine_error("put_att")?;
            }
        }
        Ok(())
    }

    fn whole_selection(&self) -> Selection {
        let count = self
            .shape
            .iter()
            .map(|&len| usize::try_from(len).unwrap_or(usize::MAX))
            .collect();
        Selection::new_contiguous(vec![0; self.shape.len()], count)
            .unwrap_or_default()
    }

    /// Read all values as strings.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the values cannot be read or converted to strings.
    pub fn read_strings(&self) -> Result<Vec<Option<String>>, AttributeError> {
        let selection = self.whole_selection();
        let mut values = vec![None; selection.num_elements()];
        self.read(
            &selection,
            &ExtendedType::string(),
            ArrayBufferMut::Strings(&mut values),
        )?;
        Ok(values)
    }

    /// Read the first value as a string.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the values cannot be read or converted to strings.
    pub fn read_string(&self) -> Result<Option<String>, AttributeError> {
        Ok(self.read_strings()?.into_iter().next().flatten())
    }

    /// Read all values as elements of `T`.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the values cannot be read or converted to `T`.
    pub fn read_elements<T: Element>(&self) -> Result<Vec<T>, AttributeError> {
        let selection = self.whole_selection();
        let mut values = vec![T::zeroed(); selection.num_elements()];
        self.read(
            &selection,
            &T::data_type(),
            ArrayBufferMut::Bytes(bytemuck::cast_slice_mut(&mut values)),
        )?;
        Ok(values)
    }

    /// Read the first value as a double.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the values cannot be read or converted to doubles.
    pub fn read_f64(&self) -> Result<f64, AttributeError> {
        Ok(self
            .read_elements::<f64>()?
            .first()
            .copied()
            .unwrap_or_default())
    }

    /// Read all values as records of the attribute data type.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the attribute data type is not a compound type with string
    /// components or the values cannot be read.
    pub fn read_records(&self) -> Result<Vec<Record>, AttributeError> {
        let data_type = self.require_data_type()?;
        let selection = self.whole_selection();
        let record = data_type.as_record_type().map(Record::new).unwrap_or_default();
        let mut values = vec![record; selection.num_elements()];
        self.read(&selection, data_type, ArrayBufferMut::Records(&mut values))?;
        Ok(values)
    }

    /// Write all values from records of the attribute data type.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the attribute data type is not a compound type with string
    /// components or the values cannot be written.
    pub fn write_records(&self, values: &[Record]) -> Result<(), AttributeError> {
        let data_type = self.require_data_type()?;
        self.write(&self.whole_selection(), data_type, ArrayBuffer::Records(values))
    }

    /// Write all values from strings.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the values cannot be converted or written.
    pub fn write_strings(&self, values: &[Option<String>]) -> Result<(), AttributeError> {
        self.write(
            &self.whole_selection(),
            &ExtendedType::string(),
            ArrayBuffer::Strings(values),
        )
    }

    /// Write a scalar string value.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the value cannot be converted or written.
    pub fn write_string(&self, value: &str) -> Result<(), AttributeError> {
        self.write_strings(&[Some(value.to_string())])
    }

    /// Write all values from elements of `T`.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the values cannot be converted or written.
    pub fn write_elements<T: Element>(&self, values: &[T]) -> Result<(), AttributeError> {
        self.write(
            &self.whole_selection(),
            &T::data_type(),
            ArrayBuffer::Bytes(bytemuck::cast_slice(values)),
        )
    }

    /// Write a scalar double value.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the value cannot be converted or written.
    pub fn write_f64(&self, value: f64) -> Result<(), AttributeError> {
        self.write_elements(&[value])
    }

    /// Render the attribute value as JSON.
    ///
    /// Strings become JSON strings, real numbers JSON numbers and complex numbers `[real, imag]` pairs.
    /// Multiple values become a JSON array. Compound values render as `null`.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the values cannot be read.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_json(&self) -> Result<Value, AttributeError> {
        let values: Vec<Value> = match self.require_data_type()? {
            ExtendedType::String { .. } => self
                .read_strings()?
                .into_iter()
                .map(|value| value.map_or(Value::Null, Value::String))
                .collect(),
            ExtendedType::Numeric(numeric_type) if numeric_type.is_complex() => self
                .read_elements::<num::complex::Complex64>()?
                .into_iter()
                .map(|value| Value::Array(vec![json_number(value.re), json_number(value.im)]))
                .collect(),
            ExtendedType::Numeric(numeric_type) => {
                let integer = !matches!(numeric_type, NumericType::Float32 | NumericType::Float64);
                self.read_elements::<f64>()?
                    .into_iter()
                    .map(|value| {
                        if integer {
                            Value::Number(Number::from(value as i64))
                        } else {
                            json_number(value)
                        }
                    })
                    .collect()
            }
            ExtendedType::Compound(_) => {
                vec![Value::Null; usize::try_from(self.num_elements()).unwrap_or_default()]
            }
        };
        Ok(if self.shape.is_empty() {
            values.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(values)
        })
    }
}

fn json_number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{MemoryEngine, GLOBAL},
        spatial_ref::CfGridMappingDecoder,
    };

    fn shared() -> Arc<SharedResources> {
        SharedResources::new(
            Box::new(MemoryEngine::new()),
            false,
            Arc::new(CfGridMappingDecoder),
        )
    }

    #[test]
    fn attribute_scalar_string_is_char() {
        let shared = shared();
        let attribute = Attribute::create(
            shared.clone(),
            0,
            GLOBAL,
            "/",
            "title",
            &[],
            &ExtendedType::string(),
            &AttributeCreateOptions::default(),
        )
        .unwrap();
        assert_eq!(attribute.native_type(), NativeType::Char);
        assert_eq!(attribute.full_name(), "/title");
        attribute.write_string("a title").unwrap();
        let opened = Attribute::open(shared, 0, GLOBAL, "/", "title")
            .unwrap()
            .unwrap();
        assert_eq!(opened.shape(), &[] as &[u64]);
        assert_eq!(opened.read_string().unwrap().as_deref(), Some("a title"));
        assert_eq!(opened.to_json().unwrap(), Value::from("a title"));
    }

    #[test]
    fn attribute_strings_whole_write_only() {
        let shared = shared();
        let attribute = Attribute::create(
            shared.clone(),
            0,
            GLOBAL,
            "/",
            "names",
            &[3],
            &ExtendedType::string(),
            &AttributeCreateOptions::default(),
        )
        .unwrap();
        assert_eq!(attribute.native_type(), NativeType::String);
        let values = vec![Some("a".to_string()), None, Some("c".to_string())];
        attribute.write_strings(&values).unwrap();
        let partial = Selection::new_contiguous(vec![1], vec![2]).unwrap();
        assert!(matches!(
            attribute.write(&partial, &ExtendedType::string(), ArrayBuffer::Strings(&values)),
            Err(AttributeError::PartialWrite(_))
        ));
        let opened = Attribute::open(shared, 0, GLOBAL, "/", "names")
            .unwrap()
            .unwrap();
        assert_eq!(opened.read_strings().unwrap(), values);

        let reversed = Selection::new(vec![2], vec![3], vec![-1], vec![1]).unwrap();
        let mut out = vec![None; 3];
        opened
            .read(&reversed, &ExtendedType::string(), ArrayBufferMut::Strings(&mut out))
            .unwrap();
        assert_eq!(out, vec![Some("c".to_string()), None, Some("a".to_string())]);
    }

    #[test]
    fn attribute_numeric_conversions() {
        let shared = shared();
        let attribute = Attribute::create(
            shared.clone(),
            0,
            GLOBAL,
            "/",
            "valid_range",
            &[2],
            &NumericType::Int16.into(),
            &AttributeCreateOptions::default().with_native_type(NativeTypeOverride::Byte),
        )
        .unwrap();
        assert_eq!(attribute.native_type(), NativeType::Byte);
        assert!(!attribute.is_perfect_match());
        attribute.write_elements(&[-5.0f64, 100.0]).unwrap();
        let opened = Attribute::open(shared, 0, GLOBAL, "/", "valid_range")
            .unwrap()
            .unwrap();
        assert_eq!(opened.data_type(), Some(&NumericType::Int16.into()));
        assert_eq!(opened.read_elements::<i16>().unwrap(), vec![-5, 100]);
        assert_eq!(opened.read_strings().unwrap()[1].as_deref(), Some("100"));
        assert_eq!(opened.to_json().unwrap(), serde_json::json!([-5, 100]));
    }

    #[test]
    fn attribute_creation_errors() {
        let shared = shared();
        assert!(matches!(
            Attribute::create(
                shared.clone(),
                0,
                GLOBAL,
                "/",
                "matrix",
                &[2, 2],
                &NumericType::Float32.into(),
                &AttributeCreateOptions::default(),
            ),
            Err(AttributeError::TooManyDimensions(2))
        ));
        assert!(Attribute::open(shared, 0, GLOBAL, "/", "missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn attribute_rename() {
        let shared = shared();
        let mut title = Attribute::create(
            shared.clone(),
            0,
            GLOBAL,
            "/",
            "title",
            &[],
            &ExtendedType::string(),
            &AttributeCreateOptions::default(),
        )
        .unwrap();
        title.write_string("surface temperature").unwrap();
        Attribute::create(
            shared.clone(),
            0,
            GLOBAL,
            "/",
            "source",
            &[],
            &ExtendedType::string(),
            &AttributeCreateOptions::default(),
        )
        .unwrap()
        .write_string("model")
        .unwrap();

        title.rename("long_name").unwrap();
        assert_eq!(title.name(), "long_name");
        assert_eq!(title.full_name(), "/long_name");
        assert_eq!(title.read_string().unwrap().as_deref(), Some("surface temperature"));
        assert!(Attribute::open(shared.clone(), 0, GLOBAL, "/", "title")
            .unwrap()
            .is_none());
        assert!(matches!(
            title.rename("source"),
            Err(AttributeError::EngineError(EngineError::NameInUse(_)))
        ));
        let opened = Attribute::open(shared, 0, GLOBAL, "/", "long_name")
            .unwrap()
            .unwrap();
        assert_eq!(opened.read_string().unwrap().as_deref(), Some("surface temperature"));
    }
}
