//! Arrays.
//!
//! An [`Array`] is a named, typed, multidimensional variable of a [`Group`](crate::group::Group).
//!
//! Values are transferred with [`Array::read`] and [`Array::write`], which take a strided [`Selection`] and
//! a buffer of any convertible data type. The transfer is served by the fastest applicable strategy:
//!   - a two-dimensional character variable exposed as a one-dimensional fixed-width string array is
//!     transferred one string at a time,
//!   - a densely packed selection with unit steps is transferred in one contiguous block,
//!   - a regular selection with positive steps and buffer strides is transferred by a single mapped call
//!     if no conversion is needed,
//!   - anything else is transferred element by element.
//!
//! [`Array::advise_read`] caches a region in memory so that later reads within it do not reach the engine.
//!
//! With the `ndarray` feature, [`Array::read_ndarray`] retrieves an [`ndarray::ArrayD`].

mod array_buffer;
mod array_create_options;
mod array_errors;
mod array_io;
#[cfg(feature = "ndarray")]
mod array_ndarray;
mod read_ahead;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

pub use self::{
    array_buffer::{ArrayBuffer, ArrayBufferMut, IncompatibleBufferError},
    array_create_options::{ArrayCreateOptions, Compression},
    array_errors::{ArrayCreateError, ArrayError},
};

use self::read_ahead::ReadAheadCache;

use crate::{
    array_subset::{ArraySubset, IncompatibleDimensionalityError, Selection},
    attribute::{
        text_attribute, unsigned_marker, Attribute, AttributeCreateOptions, AttributesOptions,
    },
    data_type::{
        array_native_type, build_data_type, copy_value, create_or_get_type, Element, ExtendedType,
        NativeRepr, NativeTypeOverride, NumericType, Record,
    },
    dimension::{fixed_text_length, logical_dims, tokenize, Dimension, DimensionType},
    engine::{DimId, Engine, EngineError, GroupId, LogEngineError, NativeType, VarId},
    group::{child_full_name, group_full_name, renamed_full_name, resolve_variable, ArrayDimension},
    shared::SharedResources,
    spatial_ref::{grid_mapping_attributes, SpatialRefMetadata, SpatialReference},
};

/// Attributes of an array hidden by [`Array::attributes`] unless requested.
const HIDDEN_ATTRIBUTES: [&str; 5] = [
    "_FillValue",
    "units",
    "scale_factor",
    "add_offset",
    "grid_mapping",
];

/// An array.
#[derive(Debug)]
pub struct Array {
    shared: Arc<SharedResources>,
    gid: GroupId,
    varid: VarId,
    name: String,
    full_name: String,
    dims: Vec<DimId>,
    data_type: Option<ExtendedType>,
    native: NativeRepr,
    fixed_text_length: Option<usize>,
    read_ahead: Mutex<Option<ReadAheadCache>>,
    spatial_ref: Mutex<Option<Option<SpatialReference>>>,
}

/// Find the dimension `name` visible from group `gid`, or define it there.
///
/// A visible dimension of another size is reused with a warning.
fn resolve_or_define_dimension(
    engine: &mut dyn Engine,
    gid: GroupId,
    name: &str,
    size: u64,
) -> Result<DimId, EngineError> {
    if let Some(dim) = engine.dim_by_name(gid, name)? {
        let len = engine.dim_len(dim)?;
        if len != size && !engine.dim_is_unlimited(dim)? {
            tracing::warn!("dimension {name} has size {len} rather than {size}, reusing it");
        }
        return Ok(dim);
    }
    engine.def_dim(gid, name, size, false).log_engine_error("def_dim")
}

impl Array {
    /// Open variable `varid` of group `gid`.
    ///
    /// A variable whose native type has no logical equivalent can be opened, but not read or written.
    pub(crate) fn open(
        shared: Arc<SharedResources>,
        gid: GroupId,
        varid: VarId,
    ) -> Result<Self, ArrayError> {
        let (name, group_name, native_type, fixed_text, dims, built) = {
            let _lock = shared.lock();
            shared
                .with_engine(|engine| -> Result<_, EngineError> {
                    let native_type = engine.var_type(gid, varid)?;
                    let unsigned = unsigned_marker(engine, gid, varid);
                    Ok((
                        engine.var_name(gid, varid)?,
                        group_full_name(engine, gid)?,
                        native_type,
                        fixed_text_length(engine, gid, varid)?,
                        logical_dims(engine, gid, varid)?,
                        build_data_type(engine, native_type, unsigned),
                    ))
                })
                .log_engine_error("open array")?
        };
        let fixed_text = fixed_text.and_then(|len| usize::try_from(len).ok());
        let (data_type, perfect) = match (built, fixed_text) {
            (_, Some(len)) => (Some(ExtendedType::fixed_string(len)), true),
            (Ok((data_type, perfect)), None) => (Some(data_type), perfect),
            (Err(err), None) => {
                tracing::debug!("array {name} is not readable: {err}");
                (None, false)
            }
        };
        let native = NativeRepr::new(
            native_type,
            perfect,
            data_type.as_ref().unwrap_or(&ExtendedType::string()),
        );
        Ok(Self {
            full_name: child_full_name(&group_name, &name),
            shared,
            gid,
            varid,
            name,
            dims,
            data_type,
            native,
            fixed_text_length: fixed_text,
            read_ahead: Mutex::new(None),
            spatial_ref: Mutex::new(None),
        })
    }

    /// Define a new variable in group `gid`.
    pub(crate) fn create(
        shared: Arc<SharedResources>,
        gid: GroupId,
        group_full_name: &str,
        name: &str,
        dimensions: &[ArrayDimension<'_>],
        data_type: &ExtendedType,
        options: &ArrayCreateOptions,
    ) -> Result<Self, ArrayCreateError> {
        if shared.is_read_only() {
            return Err(ArrayCreateError::ReadOnly(name.to_string()));
        }
        if let Some(block_size) = options.block_size() {
            if block_size.len() != dimensions.len() {
                return Err(ArrayCreateError::InvalidBlockSize(
                    block_size.len(),
                    dimensions.len(),
                ));
            }
            if block_size.contains(&0) {
                return Err(ArrayCreateError::ZeroBlockSize(block_size.to_vec()));
            }
        }

        let (varid, dims, native_type, perfect, fixed_text) = {
            let _lock = shared.lock();
            shared.set_define_mode(true)?;
            shared.with_engine(|engine| -> Result<_, ArrayCreateError> {
                let mut dims = Vec::with_capacity(dimensions.len() + 1);
                for dimension in dimensions {
                    dims.push(match dimension {
                        ArrayDimension::Dimension(dimension)
                            if Arc::ptr_eq(dimension.shared(), &shared) =>
                        {
                            dimension.dimid()
                        }
                        ArrayDimension::Dimension(dimension) => resolve_or_define_dimension(
                            engine,
                            gid,
                            dimension.name(),
                            dimension.size(),
                        )?,
                        ArrayDimension::Named { name, size } => {
                            resolve_or_define_dimension(engine, gid, name, *size)?
                        }
                    });
                }
                let created = create_or_get_type(engine, gid, data_type)?;
                let (native_type, perfect, fixed_text) = array_native_type(
                    data_type,
                    created,
                    dimensions.len(),
                    options.native_type(),
                );
                let mut var_dims = dims.clone();
                let fixed_text = if fixed_text {
                    let len = data_type.max_string_length().unwrap_or(1);
                    let length_name = format!("{}_length", engine.dim_name(dims[0])?);
                    var_dims.push(
                        engine
                            .def_dim(gid, &length_name, len as u64, false)
                            .log_engine_error("def_dim")?,
                    );
                    Some(len)
                } else {
                    None
                };

                let varid = engine
                    .def_var(gid, name, native_type, &var_dims)
                    .log_engine_error("def_var")?;
                if let Some(block_size) = options.block_size().filter(|b| !b.is_empty()) {
                    let mut chunks = block_size
                        .iter()
                        .map(|&size| usize::try_from(size).unwrap_or(usize::MAX))
                        .collect::<Vec<_>>();
                    chunks.extend(fixed_text);
                    engine
                        .def_var_chunking(gid, varid, &chunks)
                        .log_engine_error("def_var_chunking")?;
                }
                if options.compression() == Some(Compression::Deflate) {
                    engine
                        .def_var_deflate(gid, varid, options.deflate_level())
                        .log_engine_error("def_var_deflate")?;
                }
                if options.checksum() {
                    engine
                        .def_var_fletcher32(gid, varid)
                        .log_engine_error("def_var_fletcher32")?;
                }
                Ok((varid, dims, native_type, perfect, fixed_text))
            })?
        };

        Ok(Self {
            shared,
            gid,
            varid,
            name: name.to_string(),
            full_name: child_full_name(group_full_name, name),
            dims,
            data_type: Some(data_type.clone()),
            native: NativeRepr::new(native_type, perfect, data_type),
            fixed_text_length: fixed_text,
            read_ahead: Mutex::new(None),
            spatial_ref: Mutex::new(None),
        })
    }

    pub(crate) const fn ids(&self) -> (GroupId, VarId) {
        (self.gid, self.varid)
    }

    /// The array name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The array name prefixed by the full name of its group.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The number of dimensions.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.dims.len()
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

    fn require_data_type(&self) -> Result<&ExtendedType, ArrayError> {
        self.data_type
            .as_ref()
            .ok_or_else(|| ArrayError::UnsupportedType(self.name.clone(), self.native_type()))
    }

    fn require_writable(&self) -> Result<(), ArrayError> {
        if self.shared.is_read_only() {
            Err(ArrayError::ReadOnly(self.name.clone()))
        } else {
            Ok(())
        }
    }

    /// Return the dimensions of the array.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails.
    pub fn dimensions(&self) -> Result<Vec<Dimension>, EngineError> {
        let _lock = self.shared.lock();
        self.dims
            .iter()
            .map(|&dimid| Dimension::open(self.shared.clone(), self.gid, dimid))
            .collect()
    }

    /// Return the current shape of the array.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails.
    pub fn shape(&self) -> Result<Vec<u64>, EngineError> {
        Ok(self.shape_and_growable()?.0)
    }

    /// Return the current shape and which dimensions are unlimited.
    fn shape_and_growable(&self) -> Result<(Vec<u64>, Vec<bool>), EngineError> {
        self.shared
            .with_engine(|engine| -> Result<_, EngineError> {
                let mut shape = Vec::with_capacity(self.dims.len());
                let mut growable = Vec::with_capacity(self.dims.len());
                for &dimid in &self.dims {
                    shape.push(engine.dim_len(dimid)?);
                    growable.push(engine.dim_is_unlimited(dimid)?);
                }
                Ok((shape, growable))
            })
            .log_engine_error("dim_len")
    }

    /// Resize the array to `new_shape`.
    ///
    /// Only unlimited dimensions can change size, and only grow. Growing a dimension resizes every array over
    /// it. Elements in the new region read as the fill value.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the container is read only, `new_shape` does not match the array
    /// dimensionality, a fixed dimension would change size, an unlimited dimension would shrink, or the engine
    /// fails.
    pub fn resize(&self, new_shape: &[u64]) -> Result<(), ArrayError> {
        self.require_writable()?;
        if new_shape.len() != self.dims.len() {
            return Err(IncompatibleDimensionalityError::new(new_shape.len(), self.dims.len()).into());
        }
        let _lock = self.shared.lock();
        let (shape, growable) = self.shape_and_growable()?;
        for (i, (&size, &new_size)) in shape.iter().zip(new_shape).enumerate() {
            if size == new_size {
                continue;
            }
            let name = self
                .shared
                .with_engine(|engine| engine.dim_name(self.dims[i]))
                .log_engine_error("dim_name")?;
            if !growable[i] {
                return Err(ArrayError::FixedDimension(name, size, new_size));
            }
            if new_size < size {
                return Err(ArrayError::ShrinkDimension(name, size, new_size));
            }
        }
        self.shared.set_define_mode(false)?;
        self.shared
            .with_engine(|engine| -> Result<(), EngineError> {
                for ((&dimid, &size), &new_size) in self.dims.iter().zip(&shape).zip(new_shape) {
                    if new_size > size {
                        engine.grow_dim(dimid, new_size)?;
                    }
                }
                Ok(())
            })
            .log_engine_error("grow_dim")?;
        *self.read_ahead.lock() = None;
        tracing::debug!("resized array {} to {new_shape:?}", self.full_name);
        Ok(())
    }

    /// Rename the array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the container is read only, or the name is invalid or already in use in
    /// the group.
    pub fn rename(&mut self, new_name: &str) -> Result<(), ArrayError> {
        self.require_writable()?;
        let _lock = self.shared.lock();
        self.shared.set_define_mode(true)?;
        self.shared
            .with_engine(|engine| engine.rename_var(self.gid, self.varid, new_name))
            .log_engine_error("rename_var")?;
        self.shared.forget_dimension_owners();
        self.full_name = renamed_full_name(&self.full_name, &self.name, new_name);
        self.name = new_name.to_string();
        self.reset_spatial_ref();
        Ok(())
    }

    /// Return the coordinate variables of the array.
    ///
    /// These are the variables named by the `coordinates` attribute, followed by the indexing variable of
    /// each dimension, without duplicates and excluding the array itself.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if a coordinate variable cannot be opened or the engine fails.
    pub fn coordinate_variables(&self) -> Result<Vec<Self>, ArrayError> {
        let _lock = self.shared.lock();
        let mut found: Vec<(GroupId, VarId)> = self.shared.with_engine(|engine| {
            let engine: &dyn Engine = engine;
            text_attribute(engine, self.gid, self.varid, "coordinates")
                .map(|value| {
                    tokenize(&value)
                        .iter()
                        .filter_map(|name| resolve_variable(engine, self.gid, name))
                        .collect()
                })
                .unwrap_or_default()
        });
        for dimension in self.dimensions()? {
            if let Some(array) = dimension.indexing_variable() {
                found.push(array.ids());
            }
        }
        let mut coordinates: Vec<Self> = Vec::with_capacity(found.len());
        for ids in found {
            if ids == self.ids() || coordinates.iter().any(|array| array.ids() == ids) {
                continue;
            }
            coordinates.push(Self::open(self.shared.clone(), ids.0, ids.1)?);
        }
        Ok(coordinates)
    }

    /// Read the elements in `array_subset` as `T`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the subset is invalid, the values cannot be converted to `T` or the
    /// engine fails.
    pub fn read_elements<T: Element>(&self, array_subset: &ArraySubset) -> Result<Vec<T>, ArrayError> {
        let selection = Selection::from_subset(array_subset);
        let mut values = vec![T::zeroed(); selection.num_elements()];
        self.read(
            &selection,
            &T::data_type(),
            ArrayBufferMut::Bytes(bytemuck::cast_slice_mut(&mut values)),
        )?;
        Ok(values)
    }

    /// Write `values` as the elements in `array_subset`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the subset is invalid, the number of values does not match, the values
    /// cannot be converted, the container is read only or the engine fails.
    pub fn write_elements<T: Element>(
        &self,
        array_subset: &ArraySubset,
        values: &[T],
    ) -> Result<(), ArrayError> {
        self.write(
            &Selection::from_subset(array_subset),
            &T::data_type(),
            ArrayBuffer::Bytes(bytemuck::cast_slice(values)),
        )
    }

    /// Read the elements in `array_subset` as strings.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the subset is invalid, the values cannot be converted to strings or the
    /// engine fails.
    pub fn read_strings(&self, array_subset: &ArraySubset) -> Result<Vec<Option<String>>, ArrayError> {
        let selection = Selection::from_subset(array_subset);
        let mut values = vec![None; selection.num_elements()];
        self.read(
            &selection,
            &ExtendedType::string(),
            ArrayBufferMut::Strings(&mut values),
        )?;
        Ok(values)
    }

    /// Write `values` as the elements in `array_subset`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the subset is invalid, the number of values does not match, the values
    /// cannot be converted, the container is read only or the engine fails.
    pub fn write_strings(
        &self,
        array_subset: &ArraySubset,
        values: &[Option<String>],
    ) -> Result<(), ArrayError> {
        self.write(
            &Selection::from_subset(array_subset),
            &ExtendedType::string(),
            ArrayBuffer::Strings(values),
        )
    }

    /// Read the elements in `array_subset` as records of the array data type.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the array data type is not a compound type with string components, the
    /// subset is invalid or the engine fails.
    pub fn read_records(&self, array_subset: &ArraySubset) -> Result<Vec<Record>, ArrayError> {
        let data_type = self.require_data_type()?;
        let selection = Selection::from_subset(array_subset);
        let record = data_type.as_record_type().map(Record::new).unwrap_or_default();
        let mut values = vec![record; selection.num_elements()];
        self.read(&selection, data_type, ArrayBufferMut::Records(&mut values))?;
        Ok(values)
    }

    /// Write `values`, records of the array data type, as the elements in `array_subset`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the array data type is not a compound type with string components, the
    /// subset is invalid, the number of values does not match, the container is read only or the engine
    /// fails.
    pub fn write_records(&self, array_subset: &ArraySubset, values: &[Record]) -> Result<(), ArrayError> {
        let data_type = self.require_data_type()?;
        self.write(
            &Selection::from_subset(array_subset),
            data_type,
            ArrayBuffer::Records(values),
        )
    }

    /// Open the array attribute `name`, [`None`] if it does not exist.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the engine fails.
    pub fn attribute(&self, name: &str) -> Result<Option<Attribute>, ArrayError> {
        Ok(Attribute::open(
            self.shared.clone(),
            self.gid,
            self.varid,
            &self.full_name,
            name,
        )?)
    }

    /// Return the array attributes.
    ///
    /// Attributes exposed through dedicated methods, such as `_FillValue` or `units`, are hidden unless
    /// requested.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the engine fails.
    pub fn attributes(&self, options: &AttributesOptions) -> Result<Vec<Attribute>, ArrayError> {
        let _lock = self.shared.lock();
        let names = self
            .shared
            .with_engine(|engine| engine.attribute_names(self.gid, self.varid))
            .log_engine_error("attribute_names")?;
        let mut attributes = Vec::with_capacity(names.len());
        for name in names {
            let hidden = HIDDEN_ATTRIBUTES.contains(&name.as_str())
                || (name == "_Unsigned" && self.native_type() == NativeType::Byte);
            if hidden && !options.show_all() {
                continue;
            }
            if let Some(attribute) = self.attribute(&name)? {
                attributes.push(attribute);
            }
        }
        Ok(attributes)
    }

    /// Render every attribute of the array as JSON.
    ///
    /// Attributes that cannot be read render as `null`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the engine fails.
    pub fn attributes_json(&self) -> Result<Map<String, Value>, ArrayError> {
        Ok(self
            .attributes(&AttributesOptions::default().with_show_all(true))?
            .into_iter()
            .map(|attribute| {
                let value = attribute.to_json().unwrap_or(Value::Null);
                (attribute.name().to_string(), value)
            })
            .collect())
    }

    /// Create a new array attribute. Its value is stored by the first write.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the container is read only, the attribute has more than one dimension or
    /// its data type cannot be registered.
    pub fn create_attribute(
        &self,
        name: &str,
        dimensions: &[u64],
        data_type: &ExtendedType,
        options: &AttributeCreateOptions,
    ) -> Result<Attribute, ArrayError> {
        Ok(Attribute::create(
            self.shared.clone(),
            self.gid,
            self.varid,
            &self.full_name,
            name,
            dimensions,
            data_type,
            options,
        )?)
    }

    /// Delete the array attribute `name`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the container is read only or the attribute does not exist.
    pub fn delete_attribute(&self, name: &str) -> Result<(), ArrayError> {
        self.require_writable()?;
        let _lock = self.shared.lock();
        self.shared.set_define_mode(true)?;
        self.shared
            .with_engine(|engine| engine.del_att(self.gid, self.varid, name))
            .log_engine_error("del_att")?;
        Ok(())
    }

    /// Return the no data value as bytes of the array data type, [`None`] if unset.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the array data type is unsupported or the engine fails.
    pub fn no_data_raw(&self) -> Result<Option<Vec<u8>>, ArrayError> {
        let data_type = self.require_data_type()?;
        let Some(size) = data_type.fixed_size() else {
            return Ok(None);
        };
        let Some(attribute) = self.attribute("_FillValue")? else {
            return Ok(None);
        };
        let mut value = vec![0; size];
        let selection = Selection::new_contiguous(
            vec![0; attribute.shape().len()],
            vec![1; attribute.shape().len()],
        )?;
        attribute.read(&selection, data_type, ArrayBufferMut::Bytes(&mut value))?;
        Ok(Some(value))
    }

    /// Set the no data value from bytes of the array data type, or clear it if [`None`].
    ///
    /// The value is stored in the native type of the array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the value does not match the array data type, the container is read only
    /// or the engine fails.
    pub fn set_no_data_raw(&self, value: Option<&[u8]>) -> Result<(), ArrayError> {
        self.require_writable()?;
        let data_type = self.require_data_type()?;
        let _lock = self.shared.lock();
        let Some(value) = value else {
            if self.attribute("_FillValue")?.is_some() {
                self.delete_attribute("_FillValue")?;
            }
            return Ok(());
        };
        if data_type.fixed_size() != Some(value.len()) {
            return Err(ArrayError::InvalidNoData(value.len(), data_type.to_string()));
        }
        let native_type_override = match self.native_type() {
            NativeType::Byte => Some(NativeTypeOverride::Byte),
            NativeType::Int64 => Some(NativeTypeOverride::Int64),
            NativeType::UInt64 => Some(NativeTypeOverride::UInt64),
            _ => None,
        };
        let options = native_type_override.map_or_else(AttributeCreateOptions::default, |native_type| {
            AttributeCreateOptions::default().with_native_type(native_type)
        });
        let attribute = self.create_attribute("_FillValue", &[], data_type, &options)?;
        attribute.write(&Selection::default(), data_type, ArrayBuffer::Bytes(value))?;
        Ok(())
    }

    /// Return the no data value as a double, [`None`] if unset.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the value cannot be converted to a double or the engine fails.
    pub fn no_data_f64(&self) -> Result<Option<f64>, ArrayError> {
        let data_type = self.require_data_type()?;
        let Some(raw) = self.no_data_raw()? else {
            return Ok(None);
        };
        let mut value = [0; 8];
        copy_value(&raw, data_type, &mut value, &NumericType::Float64.into())?;
        Ok(Some(f64::from_ne_bytes(value)))
    }

    /// Set the no data value from a double, or clear it if [`None`].
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the value cannot be converted to the array data type, the container is
    /// read only or the engine fails.
    pub fn set_no_data_f64(&self, value: Option<f64>) -> Result<(), ArrayError> {
        let Some(value) = value else {
            return self.set_no_data_raw(None);
        };
        let data_type = self.require_data_type()?;
        let mut raw = vec![0; data_type.fixed_size().unwrap_or_default()];
        copy_value(
            &value.to_ne_bytes(),
            &NumericType::Float64.into(),
            &mut raw,
            data_type,
        )?;
        self.set_no_data_raw(Some(&raw))
    }

    fn numeric_attribute(&self, name: &str) -> Result<Option<f64>, ArrayError> {
        match self.attribute(name)? {
            Some(attribute) => Ok(Some(attribute.read_f64()?)),
            None => Ok(None),
        }
    }

    fn set_numeric_attribute(
        &self,
        name: &str,
        value: f64,
        storage_type: Option<NumericType>,
    ) -> Result<(), ArrayError> {
        self.require_writable()?;
        let _lock = self.shared.lock();
        let attribute = match self.attribute(name)? {
            Some(attribute) => attribute,
            None => self.create_attribute(
                name,
                &[],
                &storage_type.unwrap_or(NumericType::Float64).into(),
                &AttributeCreateOptions::default(),
            )?,
        };
        attribute.write_f64(value)?;
        Ok(())
    }

    /// Return the `scale_factor` attribute, [`None`] if unset.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the attribute cannot be read as a double.
    pub fn scale(&self) -> Result<Option<f64>, ArrayError> {
        self.numeric_attribute("scale_factor")
    }

    /// Set the `scale_factor` attribute, created with `storage_type` or as a double if it does not exist.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the container is read only or the engine fails.
    pub fn set_scale(&self, scale: f64, storage_type: Option<NumericType>) -> Result<(), ArrayError> {
        self.set_numeric_attribute("scale_factor", scale, storage_type)
    }

    /// Return the `add_offset` attribute, [`None`] if unset.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the attribute cannot be read as a double.
    pub fn offset(&self) -> Result<Option<f64>, ArrayError> {
        self.numeric_attribute("add_offset")
    }

    /// Set the `add_offset` attribute, created with `storage_type` or as a double if it does not exist.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the container is read only or the engine fails.
    pub fn set_offset(&self, offset: f64, storage_type: Option<NumericType>) -> Result<(), ArrayError> {
        self.set_numeric_attribute("add_offset", offset, storage_type)
    }

    /// Return the `units` attribute, [`None`] if unset.
    #[must_use]
    pub fn unit(&self) -> Option<String> {
        let _lock = self.shared.lock();
        self.shared
            .with_engine(|engine| text_attribute(engine, self.gid, self.varid, "units"))
    }

    /// Set the `units` attribute, or delete it if [`None`].
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the container is read only or the engine fails.
    pub fn set_unit(&self, unit: Option<&str>) -> Result<(), ArrayError> {
        self.require_writable()?;
        let _lock = self.shared.lock();
        match unit {
            Some(unit) => self
                .create_attribute("units", &[], &ExtendedType::string(), &AttributeCreateOptions::default())?
                .write_string(unit)?,
            None => {
                if self.attribute("units")?.is_some() {
                    self.delete_attribute("units")?;
                }
            }
        }
        Ok(())
    }

    /// Return the block (chunk) size of each dimension, zeros if the array is not chunked.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails.
    pub fn block_size(&self) -> Result<Vec<u64>, EngineError> {
        let _lock = self.shared.lock();
        let chunks = self
            .shared
            .with_engine(|engine| engine.var_chunking(self.gid, self.varid))
            .log_engine_error("var_chunking")?;
        Ok(match chunks {
            Some(chunks) => chunks
                .into_iter()
                .take(self.dims.len())
                .map(|chunk| chunk as u64)
                .collect(),
            None => vec![0; self.dims.len()],
        })
    }

    /// Return read only structural information, such as `COMPRESS=DEFLATE` for compressed arrays.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails.
    pub fn structural_info(&self) -> Result<Vec<(String, String)>, EngineError> {
        let _lock = self.shared.lock();
        let deflate = self
            .shared
            .with_engine(|engine| engine.var_deflate(self.gid, self.varid))
            .log_engine_error("var_deflate")?;
        Ok(deflate
            .map(|_| ("COMPRESS".to_string(), "DEFLATE".to_string()))
            .into_iter()
            .collect())
    }

    /// Return the spatial reference of the array, [`None`] if the array has none.
    ///
    /// The spatial reference is decoded from the grid mapping variable named by the `grid_mapping`
    /// attribute. The horizontal axes are the dimensions with a horizontal role, or else the last two
    /// dimensions. The result is cached until [`reset_spatial_ref`](Array::reset_spatial_ref).
    #[must_use]
    pub fn spatial_ref(&self) -> Option<SpatialReference> {
        let mut cached = self.spatial_ref.lock();
        cached.get_or_insert_with(|| self.decode_spatial_ref()).clone()
    }

    /// Drop the cached spatial reference.
    pub fn reset_spatial_ref(&self) {
        *self.spatial_ref.lock() = None;
    }

    /// Set the spatial reference of the array, or remove it if [`None`].
    ///
    /// The definition is written to the grid mapping variable named by the `grid_mapping` attribute. If there
    /// is none, a scalar `crs` variable is defined in the array group and named by a new `grid_mapping`
    /// attribute. The axis mapping is not stored, it is derived again from the dimensions on read.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the container is read only or the engine fails.
    pub fn set_spatial_ref(&self, spatial_ref: Option<&SpatialReference>) -> Result<(), ArrayError> {
        self.require_writable()?;
        let _lock = self.shared.lock();
        match spatial_ref {
            Some(spatial_ref) => self.write_grid_mapping(spatial_ref.definition())?,
            None => {
                if self.attribute("grid_mapping")?.is_some() {
                    self.delete_attribute("grid_mapping")?;
                }
            }
        }
        self.reset_spatial_ref();
        Ok(())
    }

    fn write_grid_mapping(&self, definition: &str) -> Result<(), ArrayError> {
        self.shared.set_define_mode(true)?;
        let (gid, varid, existing) = self
            .shared
            .with_engine(|engine| -> Result<_, EngineError> {
                let named = text_attribute(engine, self.gid, self.varid, "grid_mapping")
                    .and_then(|name| resolve_variable(engine, self.gid, &name));
                if let Some((gid, varid)) = named {
                    return Ok((gid, varid, true));
                }
                for name in ["crs".to_string(), format!("{}_crs", self.name)] {
                    match engine.var_by_name(self.gid, &name)? {
                        Some(varid) if engine.var_dims(self.gid, varid)?.is_empty() => {
                            return Ok((self.gid, varid, false));
                        }
                        Some(_) => {}
                        None => {
                            let varid = engine.def_var(self.gid, &name, NativeType::Int, &[])?;
                            return Ok((self.gid, varid, false));
                        }
                    }
                }
                Err(EngineError::NameInUse(format!("{}_crs", self.name)))
            })
            .log_engine_error("grid mapping variable")?;
        let grid_mapping = Self::open(self.shared.clone(), gid, varid)?;

        let attributes = grid_mapping_attributes(definition);
        for stale in ["grid_mapping_name", "crs_wkt", "spatial_ref"] {
            if !attributes.iter().any(|(name, _)| *name == stale)
                && grid_mapping.attribute(stale)?.is_some()
            {
                grid_mapping.delete_attribute(stale)?;
            }
        }
        for (name, value) in &attributes {
            grid_mapping
                .create_attribute(name, &[], &ExtendedType::string(), &AttributeCreateOptions::default())?
                .write_string(value)?;
        }
        if !existing {
            let reference = if gid == self.gid {
                grid_mapping.name().to_string()
            } else {
                grid_mapping.full_name().to_string()
            };
            self.create_attribute("grid_mapping", &[], &ExtendedType::string(), &AttributeCreateOptions::default())?
                .write_string(&reference)?;
        }
        tracing::debug!("wrote grid mapping {} of array {}", grid_mapping.full_name(), self.full_name);
        Ok(())
    }

    fn decode_spatial_ref(&self) -> Option<SpatialReference> {
        let rank = self.dims.len();
        if rank < 2 {
            return None;
        }
        let dimensions = self.dimensions().ok()?;
        let (mut found_x, mut found_y) = (None, None);
        for (i, dimension) in dimensions.iter().enumerate() {
            match dimension.dimension_type() {
                Some(DimensionType::HorizontalX) => found_x = Some(i + 1),
                Some(DimensionType::HorizontalY) => found_y = Some(i + 1),
                _ => {}
            }
        }
        // Both axes or neither: the trailing two dimensions otherwise.
        let (x, y) = match (found_x, found_y) {
            (Some(x), Some(y)) if x != y => (x, y),
            _ => (rank, rank - 1),
        };

        let attributes = self.attributes_json().ok()?;
        let grid_mapping = {
            let _lock = self.shared.lock();
            self.shared
                .with_engine(|engine| {
                    let name = text_attribute(engine, self.gid, self.varid, "grid_mapping")?;
                    resolve_variable(engine, self.gid, &name)
                })
                .and_then(|(gid, varid)| Self::open(self.shared.clone(), gid, varid).ok())
                .and_then(|array| array.attributes_json().ok())
        };
        let metadata = SpatialRefMetadata {
            name: self.name.clone(),
            dimension_names: dimensions
                .iter()
                .map(|dimension| dimension.name().to_string())
                .collect(),
            attributes,
            grid_mapping,
        };
        let decoded = self.shared.spatial_ref_decoder().decode(&metadata)?;
        let mapping = decoded
            .axis_mapping
            .iter()
            .map(|&axis| if axis == 1 { x } else { y })
            .collect();
        Some(SpatialReference::new(decoded.definition, mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::MemoryEngine, group::Group};

    fn root() -> Group {
        Group::create_root(Box::new(MemoryEngine::new()))
    }

    #[test]
    fn array_create_options_applied() {
        let root = root();
        let array = root
            .create_md_array(
                "temp",
                &[
                    ArrayDimension::Named { name: "y", size: 4 },
                    ArrayDimension::Named { name: "x", size: 6 },
                ],
                &NumericType::Float32.into(),
                &ArrayCreateOptions::default()
                    .with_block_size(vec![2, 3])
                    .with_compression(Compression::Deflate)
                    .with_checksum(true),
            )
            .unwrap();
        assert_eq!(array.full_name(), "/temp");
        assert_eq!(array.shape().unwrap(), vec![4, 6]);
        assert_eq!(array.block_size().unwrap(), vec![2, 3]);
        assert_eq!(
            array.structural_info().unwrap(),
            vec![("COMPRESS".to_string(), "DEFLATE".to_string())]
        );
        let opened = root.open_md_array("temp").unwrap().unwrap();
        assert_eq!(opened.data_type(), Some(&NumericType::Float32.into()));
        assert_eq!(opened.block_size().unwrap(), vec![2, 3]);

        assert!(matches!(
            root.create_md_array(
                "bad",
                &[ArrayDimension::Named { name: "x", size: 6 }],
                &NumericType::Float32.into(),
                &ArrayCreateOptions::default().with_block_size(vec![2, 3]),
            ),
            Err(ArrayCreateError::InvalidBlockSize(2, 1))
        ));
        assert!(root.open_md_array("bad").unwrap().is_none());
    }

    #[test]
    fn array_dimension_reuse() {
        let root = root();
        let x = root.create_dimension("x", None, None, 3, false).unwrap();
        let float64: ExtendedType = NumericType::Float64.into();
        let a = root
            .create_md_array("a", &[(&x).into()], &float64, &ArrayCreateOptions::default())
            .unwrap();
        let b = root
            .create_md_array(
                "b",
                &[ArrayDimension::Named { name: "x", size: 5 }],
                &float64,
                &ArrayCreateOptions::default(),
            )
            .unwrap();
        assert_eq!(a.shape().unwrap(), vec![3]);
        assert_eq!(b.shape().unwrap(), vec![3]);
        assert_eq!(root.dimensions().unwrap().len(), 1);
        assert_eq!(b.dimensions().unwrap()[0].full_name(), "/x");
    }

    #[test]
    fn array_native_type_overrides() {
        let root = root();
        let x = root.create_dimension("x", None, None, 2, false).unwrap();
        let array = root
            .create_md_array(
                "small",
                &[(&x).into()],
                &NumericType::Int16.into(),
                &ArrayCreateOptions::default().with_native_type(NativeTypeOverride::Byte),
            )
            .unwrap();
        assert_eq!(array.native_type(), NativeType::Byte);
        assert!(!array.is_perfect_match());
        let subset = ArraySubset::new_with_shape(vec![2]);
        array.write_elements::<i16>(&subset, &[-3, 7]).unwrap();
        assert_eq!(array.read_elements::<i16>(&subset).unwrap(), vec![-3, 7]);

        let large = root
            .create_md_array(
                "large",
                &[(&x).into()],
                &NumericType::Float64.into(),
                &ArrayCreateOptions::default().with_native_type(NativeTypeOverride::Int64),
            )
            .unwrap();
        assert_eq!(large.native_type(), NativeType::Int64);
        large.write_elements::<f64>(&subset, &[1.0, -2.0]).unwrap();
        assert_eq!(large.read_elements::<f64>(&subset).unwrap(), vec![1.0, -2.0]);
        let reopened = root.open_md_array("large").unwrap().unwrap();
        assert_eq!(reopened.data_type(), Some(&NumericType::Float64.into()));
        assert!(!reopened.is_perfect_match());
    }

    #[test]
    fn array_no_data_scale_offset_unit() {
        let root = root();
        let array = root
            .create_md_array(
                "temp",
                &[ArrayDimension::Named { name: "x", size: 4 }],
                &NumericType::Int16.into(),
                &ArrayCreateOptions::default(),
            )
            .unwrap();
        assert_eq!(array.no_data_f64().unwrap(), None);
        array.set_no_data_f64(Some(-999.0)).unwrap();
        assert_eq!(array.no_data_raw().unwrap(), Some((-999i16).to_ne_bytes().to_vec()));
        assert_eq!(array.no_data_f64().unwrap(), Some(-999.0));
        assert!(matches!(
            array.set_no_data_raw(Some(&[0; 4])),
            Err(ArrayError::InvalidNoData(4, _))
        ));

        array.set_scale(0.5, None).unwrap();
        array.set_offset(10.0, Some(NumericType::Float32)).unwrap();
        array.set_unit(Some("K")).unwrap();
        assert_eq!(array.scale().unwrap(), Some(0.5));
        assert_eq!(array.offset().unwrap(), Some(10.0));
        assert_eq!(array.unit().as_deref(), Some("K"));
        assert_eq!(
            array.attribute("add_offset").unwrap().unwrap().native_type(),
            NativeType::Float
        );
        assert!(array.attributes(&AttributesOptions::default()).unwrap().is_empty());
        let json = array.attributes_json().unwrap();
        assert_eq!(json["units"], Value::from("K"));
        assert_eq!(json["_FillValue"], Value::from(-999));

        let subset = ArraySubset::new_with_shape(vec![4]);
        assert_eq!(array.read_elements::<i16>(&subset).unwrap(), vec![-999; 4]);

        array.set_no_data_f64(None).unwrap();
        array.set_unit(None).unwrap();
        assert_eq!(array.no_data_f64().unwrap(), None);
        assert_eq!(array.unit(), None);
    }

    #[test]
    fn array_spatial_ref() {
        let root = root();
        let float64: ExtendedType = NumericType::Float64.into();
        let crs = root
            .create_md_array("crs", &[], &NumericType::Int32.into(), &ArrayCreateOptions::default())
            .unwrap();
        crs.create_attribute(
            "grid_mapping_name",
            &[],
            &ExtendedType::string(),
            &AttributeCreateOptions::default(),
        )
        .unwrap()
        .write_string("latitude_longitude")
        .unwrap();
        let array = root
            .create_md_array(
                "temp",
                &[
                    ArrayDimension::Named { name: "lat", size: 2 },
                    ArrayDimension::Named { name: "lon", size: 3 },
                ],
                &float64,
                &ArrayCreateOptions::default(),
            )
            .unwrap();
        assert_eq!(array.spatial_ref(), None);
        array
            .create_attribute("grid_mapping", &[], &ExtendedType::string(), &AttributeCreateOptions::default())
            .unwrap()
            .write_string("crs")
            .unwrap();
        assert_eq!(array.spatial_ref(), None);
        array.reset_spatial_ref();
        let spatial_ref = array.spatial_ref().unwrap();
        assert_eq!(spatial_ref.definition(), "EPSG:4326");
        assert_eq!(spatial_ref.data_axis_to_srs_axis_mapping(), &[1, 2]);
    }
}
