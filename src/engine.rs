//! The array-storage engine interface.
//!
//! The [`Engine`] trait is the narrow boundary between this crate and the library that actually stores
//! groups, dimensions, variables and attributes. It follows netCDF-4 conventions:
//!  - objects are addressed by integer ids ([`GroupId`], [`DimId`], [`VarId`]),
//!  - dimensions are visible from the group that defines them and from all of its descendants,
//!  - group attributes are addressed with the reserved variable id [`GLOBAL`],
//!  - metadata definitions require *define mode* while data transfers require *data mode*.
//!
//! Element data crosses the boundary as native-endian bytes in the engine's native representation, except
//! for dynamically sized strings and compound values with string fields, which have dedicated methods.
//! A string field occupies a [`STRING_SLOT_SIZE`] byte slot of its compound type.
//!
//! [`MemoryEngine`] is a complete in-memory implementation.

mod memory;

pub use memory::{MemoryEngine, MemoryEngineStats};

use derive_more::Display;
use thiserror::Error;

pub use crate::data_type::STRING_SLOT_SIZE;
use crate::data_type::Record;

/// A group identifier.
pub type GroupId = i32;

/// A dimension identifier.
pub type DimId = i32;

/// A variable identifier.
pub type VarId = i32;

/// A user-defined type identifier.
pub type UserTypeId = u32;

/// The reserved variable id addressing the attributes of a group.
pub const GLOBAL: VarId = -1;

/// An engine-native type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum NativeType {
    /// Signed 8-bit integer.
    #[display("NC_BYTE")]
    Byte,
    /// 8-bit character.
    #[display("NC_CHAR")]
    Char,
    /// Signed 16-bit integer.
    #[display("NC_SHORT")]
    Short,
    /// Signed 32-bit integer.
    #[display("NC_INT")]
    Int,
    /// 32-bit IEEE float.
    #[display("NC_FLOAT")]
    Float,
    /// 64-bit IEEE float.
    #[display("NC_DOUBLE")]
    Double,
    /// Unsigned 8-bit integer.
    #[display("NC_UBYTE")]
    UByte,
    /// Unsigned 16-bit integer.
    #[display("NC_USHORT")]
    UShort,
    /// Unsigned 32-bit integer.
    #[display("NC_UINT")]
    UInt,
    /// Signed 64-bit integer.
    #[display("NC_INT64")]
    Int64,
    /// Unsigned 64-bit integer.
    #[display("NC_UINT64")]
    UInt64,
    /// Dynamically sized string.
    #[display("NC_STRING")]
    String,
    /// A user-defined type.
    #[display("user type {_0}")]
    User(UserTypeId),
}

impl NativeType {
    /// Return the size in bytes of an element of a built-in type.
    ///
    /// Returns [`None`] for [`NativeType::String`] and user-defined types, the latter are sized by the engine.
    #[must_use]
    pub const fn builtin_size(&self) -> Option<usize> {
        match self {
            Self::Byte | Self::Char | Self::UByte => Some(1),
            Self::Short | Self::UShort => Some(2),
            Self::Int | Self::UInt | Self::Float => Some(4),
            Self::Double | Self::Int64 | Self::UInt64 => Some(8),
            Self::String | Self::User(_) => None,
        }
    }
}

/// The class of a user-defined type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum UserTypeClass {
    /// A record of named fields.
    Compound,
    /// A variable-length sequence.
    #[display("vlen")]
    VLen,
    /// An opaque blob.
    Opaque,
    /// An enumeration over an integer base type.
    Enum,
}

/// A field of a compound user-defined type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompoundField {
    /// The field name.
    pub name: String,
    /// The byte offset of the field within the record.
    pub offset: usize,
    /// The field type.
    pub field_type: NativeType,
    /// The field array shape, empty for scalar fields.
    pub dims: Vec<usize>,
}

/// A description of a user-defined type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserTypeInfo {
    /// The type name.
    pub name: String,
    /// The size in bytes of one element.
    pub size: usize,
    /// The type class.
    pub class: UserTypeClass,
    /// The base type of vlen and enum types.
    pub base_type: Option<NativeType>,
    /// The fields of compound types.
    pub fields: Vec<CompoundField>,
}

/// An engine error.
///
/// Each variant corresponds to a native engine status code, see [`EngineError::code`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Not a valid id.
    #[error("not a valid id")]
    BadId,
    /// A name is already in use.
    #[error("name {0} is already in use")]
    NameInUse(String),
    /// A name is not valid.
    #[error("name {0:?} is not valid")]
    BadName(String),
    /// The operation is not allowed in define mode.
    #[error("operation not allowed in define mode")]
    InDefineMode,
    /// The operation is not allowed in data mode.
    #[error("operation not allowed in data mode")]
    NotInDefineMode,
    /// Write to a read only container.
    #[error("write to read only container")]
    ReadOnly,
    /// An index exceeds a dimension bound.
    #[error("index exceeds dimension bound")]
    InvalidCoordinates,
    /// Start plus count exceeds a dimension bound.
    #[error("start+count exceeds dimension bound")]
    EdgeExceeded,
    /// A stride is not valid.
    #[error("illegal stride")]
    BadStride,
    /// The attribute was not found.
    #[error("attribute {0} not found")]
    AttributeNotFound(String),
    /// The variable was not found.
    #[error("variable not found")]
    VariableNotFound,
    /// The dimension was not found.
    #[error("invalid dimension id or name")]
    BadDimension,
    /// The type is not valid for the operation.
    #[error("not a valid data type or type mismatch")]
    BadType,
    /// A size is not valid.
    #[error("invalid size {0}")]
    BadSize(u64),
    /// An argument is not valid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The container is closed.
    #[error("container is closed")]
    Closed,
}

impl EngineError {
    /// Return the native status code of the error.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::BadId => -33,
            Self::InvalidArgument(_) => -36,
            Self::ReadOnly => -37,
            Self::NotInDefineMode => -38,
            Self::InDefineMode => -39,
            Self::InvalidCoordinates => -40,
            Self::NameInUse(_) => -42,
            Self::AttributeNotFound(_) => -43,
            Self::BadType => -45,
            Self::BadDimension => -46,
            Self::VariableNotFound => -49,
            Self::BadSize(_) => -53,
            Self::BadName(_) => -59,
            Self::EdgeExceeded => -57,
            Self::BadStride => -58,
            Self::Closed => -115,
        }
    }
}

/// Log a failed engine call with the engine diagnostic and pass the result through.
pub(crate) trait LogEngineError {
    fn log_engine_error(self, call: &str) -> Self;
}

impl<T> LogEngineError for Result<T, EngineError> {
    fn log_engine_error(self, call: &str) -> Self {
        if let Err(err) = &self {
            tracing::error!(code = err.code(), "{call}: {err}");
        }
        self
    }
}

/// An array-storage engine.
///
/// Methods taking `&mut self` may modify the container. Methods defining metadata must only succeed in
/// define mode, and data transfers must only succeed in data mode.
pub trait Engine: Send + std::fmt::Debug {
    /// Return the engine library version, e.g. `"4.9.2"`.
    fn library_version(&self) -> String;

    /// Returns true if the container is in define mode.
    fn in_define_mode(&self) -> bool;

    /// Enter define mode.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the container is already in define mode or cannot be modified.
    fn redef(&mut self) -> Result<(), EngineError>;

    /// Leave define mode and enter data mode.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the container is not in define mode.
    fn enddef(&mut self) -> Result<(), EngineError>;

    /// Close the container. Subsequent calls fail with [`EngineError::Closed`].
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the container was already closed.
    fn close(&mut self) -> Result<(), EngineError>;

    /// Return the root group id.
    fn root_group(&self) -> GroupId;

    /// Return the name of a group. The root group is named `/`.
    ///
    /// # Errors
    /// Returns [`EngineError::BadId`] if `gid` is not a group.
    fn group_name(&self, gid: GroupId) -> Result<String, EngineError>;

    /// Return the parent of a group, [`None`] for the root group.
    ///
    /// # Errors
    /// Returns [`EngineError::BadId`] if `gid` is not a group.
    fn group_parent(&self, gid: GroupId) -> Result<Option<GroupId>, EngineError>;

    /// Return the child groups of a group in definition order.
    ///
    /// # Errors
    /// Returns [`EngineError::BadId`] if `gid` is not a group.
    fn group_children(&self, gid: GroupId) -> Result<Vec<GroupId>, EngineError>;

    /// Define a child group.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the name is invalid or in use.
    fn def_group(&mut self, parent: GroupId, name: &str) -> Result<GroupId, EngineError>;

    /// Rename a group.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if `gid` is the root group, or the name is invalid or in use by a sibling.
    fn rename_group(&mut self, gid: GroupId, name: &str) -> Result<(), EngineError>;

    /// Return the dimensions defined in a group (not its ancestors).
    ///
    /// # Errors
    /// Returns [`EngineError::BadId`] if `gid` is not a group.
    fn group_dimensions(&self, gid: GroupId) -> Result<Vec<DimId>, EngineError>;

    /// Find a dimension by name in a group or its ancestors.
    ///
    /// # Errors
    /// Returns [`EngineError::BadId`] if `gid` is not a group.
    fn dim_by_name(&self, gid: GroupId, name: &str) -> Result<Option<DimId>, EngineError>;

    /// Return the name of a dimension.
    ///
    /// # Errors
    /// Returns [`EngineError::BadDimension`] if `dim` is not a dimension.
    fn dim_name(&self, dim: DimId) -> Result<String, EngineError>;

    /// Return the current length of a dimension.
    ///
    /// # Errors
    /// Returns [`EngineError::BadDimension`] if `dim` is not a dimension.
    fn dim_len(&self, dim: DimId) -> Result<u64, EngineError>;

    /// Returns true if a dimension is unlimited.
    ///
    /// # Errors
    /// Returns [`EngineError::BadDimension`] if `dim` is not a dimension.
    fn dim_is_unlimited(&self, dim: DimId) -> Result<bool, EngineError>;

    /// Define a dimension. The length is ignored for unlimited dimensions.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the name is invalid or in use, or the size is not valid.
    fn def_dim(
        &mut self,
        gid: GroupId,
        name: &str,
        len: u64,
        unlimited: bool,
    ) -> Result<DimId, EngineError>;

    /// Rename a dimension of group `gid`.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the dimension does not belong to the group, or the name is invalid or
    /// in use in the group.
    fn rename_dim(&mut self, gid: GroupId, dim: DimId, name: &str) -> Result<(), EngineError>;

    /// Grow an unlimited dimension to at least `len`. Elements in the new region read as fill values.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if `dim` is not an unlimited dimension.
    fn grow_dim(&mut self, dim: DimId, len: u64) -> Result<(), EngineError>;

    /// Return the variables of a group in definition order.
    ///
    /// # Errors
    /// Returns [`EngineError::BadId`] if `gid` is not a group.
    fn group_variables(&self, gid: GroupId) -> Result<Vec<VarId>, EngineError>;

    /// Find a variable by name in a group.
    ///
    /// # Errors
    /// Returns [`EngineError::BadId`] if `gid` is not a group.
    fn var_by_name(&self, gid: GroupId, name: &str) -> Result<Option<VarId>, EngineError>;

    /// Return the name of a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the variable does not exist.
    fn var_name(&self, gid: GroupId, varid: VarId) -> Result<String, EngineError>;

    /// Return the native type of a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the variable does not exist.
    fn var_type(&self, gid: GroupId, varid: VarId) -> Result<NativeType, EngineError>;

    /// Return the dimensions of a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the variable does not exist.
    fn var_dims(&self, gid: GroupId, varid: VarId) -> Result<Vec<DimId>, EngineError>;

    /// Define a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the name is invalid or in use, or a dimension or type is not valid.
    fn def_var(
        &mut self,
        gid: GroupId,
        name: &str,
        native_type: NativeType,
        dims: &[DimId],
    ) -> Result<VarId, EngineError>;

    /// Set the chunk shape of a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the chunk shape is not valid for the variable.
    fn def_var_chunking(
        &mut self,
        gid: GroupId,
        varid: VarId,
        chunks: &[usize],
    ) -> Result<(), EngineError>;

    /// Return the chunk shape of a variable, [`None`] if the variable is stored contiguously.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the variable does not exist.
    fn var_chunking(&self, gid: GroupId, varid: VarId) -> Result<Option<Vec<usize>>, EngineError>;

    /// Enable deflate compression with shuffling for a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the level is not in `0..=9`.
    fn def_var_deflate(&mut self, gid: GroupId, varid: VarId, level: u32)
        -> Result<(), EngineError>;

    /// Return the deflate level of a variable, [`None`] if it is not compressed.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the variable does not exist.
    fn var_deflate(&self, gid: GroupId, varid: VarId) -> Result<Option<u32>, EngineError>;

    /// Enable the fletcher32 checksum filter for a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the variable does not exist.
    fn def_var_fletcher32(&mut self, gid: GroupId, varid: VarId) -> Result<(), EngineError>;

    /// Returns true if the fletcher32 checksum filter is enabled for a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the variable does not exist.
    fn var_fletcher32(&self, gid: GroupId, varid: VarId) -> Result<bool, EngineError>;

    /// Set the fill value of a variable from one native element.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if `fill` is not one native element.
    fn def_var_fill(&mut self, gid: GroupId, varid: VarId, fill: &[u8]) -> Result<(), EngineError>;

    /// Read a contiguous hyperslab into `out`, packed in row-major order.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the hyperslab is out of bounds or `out` is too small.
    fn get_vara(
        &self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        out: &mut [u8],
    ) -> Result<(), EngineError>;

    /// Write a contiguous hyperslab from `data`, packed in row-major order.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the hyperslab is out of bounds or `data` is too small.
    fn put_vara(
        &mut self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        data: &[u8],
    ) -> Result<(), EngineError>;

    /// Read a strided hyperslab into a mapped buffer.
    ///
    /// Element `i` is read from index `start + i * stride` into `out` at offset `sum(i * imap)`. The unit of
    /// `imap` is elements for engines from version 4.4, bytes for older engines.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the hyperslab is out of bounds, a stride is zero or `out` is too small.
    #[allow(clippy::too_many_arguments)]
    fn get_varm(
        &self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        stride: &[usize],
        imap: &[usize],
        out: &mut [u8],
    ) -> Result<(), EngineError>;

    /// Write a strided hyperslab from a mapped buffer. See [`Engine::get_varm`].
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the hyperslab is out of bounds, a stride is zero or `data` is too small.
    #[allow(clippy::too_many_arguments)]
    fn put_varm(
        &mut self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        stride: &[usize],
        imap: &[usize],
        data: &[u8],
    ) -> Result<(), EngineError>;

    /// Read one element.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the index is out of bounds or `out` is too small.
    fn get_var1(
        &self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
        out: &mut [u8],
    ) -> Result<(), EngineError>;

    /// Write one element.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the index is out of bounds or `data` is too small.
    fn put_var1(
        &mut self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
        data: &[u8],
    ) -> Result<(), EngineError>;

    /// Read one element of a string variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the index is out of bounds or the variable is not a string variable.
    fn get_var1_string(
        &self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
    ) -> Result<Option<String>, EngineError>;

    /// Write one element of a string variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the index is out of bounds or the variable is not a string variable.
    fn put_var1_string(
        &mut self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
        value: Option<&str>,
    ) -> Result<(), EngineError>;

    /// Read one element of a variable of a compound type with string fields.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the index is out of bounds or the variable type has no string fields.
    fn get_var1_record(
        &self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
    ) -> Result<Record, EngineError>;

    /// Write one element of a variable of a compound type with string fields.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the index is out of bounds, the variable type has no string fields or
    /// `value` does not match it.
    fn put_var1_record(
        &mut self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
        value: &Record,
    ) -> Result<(), EngineError>;

    /// Rename a variable.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the variable does not exist, or the name is invalid or in use.
    fn rename_var(&mut self, gid: GroupId, varid: VarId, name: &str) -> Result<(), EngineError>;

    /// Return the attribute names of a variable, or of a group if `varid` is [`GLOBAL`].
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the owner does not exist.
    fn attribute_names(&self, gid: GroupId, varid: VarId) -> Result<Vec<String>, EngineError>;

    /// Return the native type and number of values of an attribute, [`None`] if it does not exist.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the owner does not exist.
    fn attribute_info(
        &self,
        gid: GroupId,
        varid: VarId,
        name: &str,
    ) -> Result<Option<(NativeType, usize)>, EngineError>;

    /// Read all values of a non-string attribute.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the attribute does not exist, is a string attribute or `out` is too small.
    fn get_att(
        &self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        out: &mut [u8],
    ) -> Result<(), EngineError>;

    /// Read all values of a string attribute.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the attribute does not exist or is not a string attribute.
    fn get_att_strings(
        &self,
        gid: GroupId,
        varid: VarId,
        name: &str,
    ) -> Result<Vec<Option<String>>, EngineError>;

    /// Create or replace a non-string attribute with `len` values.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the type is not valid or `data` does not hold `len` values.
    fn put_att(
        &mut self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        native_type: NativeType,
        len: usize,
        data: &[u8],
    ) -> Result<(), EngineError>;

    /// Create or replace a string attribute.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the owner does not exist or the name is not valid.
    fn put_att_strings(
        &mut self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        values: &[Option<String>],
    ) -> Result<(), EngineError>;

    /// Read all values of an attribute of a compound type with string fields.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the attribute does not exist or its type has no string fields.
    fn get_att_records(
        &self,
        gid: GroupId,
        varid: VarId,
        name: &str,
    ) -> Result<Vec<Record>, EngineError>;

    /// Create or replace an attribute of a compound type with string fields.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the type has no string fields or a value does not match it.
    fn put_att_records(
        &mut self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        native_type: NativeType,
        values: &[Record],
    ) -> Result<(), EngineError>;

    /// Rename an attribute.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the attribute does not exist, or the new name is invalid or in use.
    fn rename_att(
        &mut self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        new_name: &str,
    ) -> Result<(), EngineError>;

    /// Delete an attribute.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the attribute does not exist.
    fn del_att(&mut self, gid: GroupId, varid: VarId, name: &str) -> Result<(), EngineError>;

    /// Find a user-defined type by name in a group or its ancestors.
    ///
    /// # Errors
    /// Returns [`EngineError::BadId`] if `gid` is not a group.
    fn user_type_by_name(&self, gid: GroupId, name: &str)
        -> Result<Option<UserTypeId>, EngineError>;

    /// Describe a user-defined type.
    ///
    /// # Errors
    /// Returns [`EngineError::BadType`] if `id` is not a user-defined type.
    fn user_type_info(&self, id: UserTypeId) -> Result<UserTypeInfo, EngineError>;

    /// Define an empty compound type of `size` bytes.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the name is invalid or in use.
    fn def_compound(
        &mut self,
        gid: GroupId,
        name: &str,
        size: usize,
    ) -> Result<UserTypeId, EngineError>;

    /// Insert a scalar field into a compound type. [`NativeType::String`] fields take [`STRING_SLOT_SIZE`]
    /// bytes.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the field does not fit in the record or the name is in use.
    fn insert_compound_field(
        &mut self,
        id: UserTypeId,
        name: &str,
        offset: usize,
        field_type: NativeType,
    ) -> Result<(), EngineError>;

    /// Return the size in bytes of one element of a type.
    ///
    /// # Errors
    /// Returns [`EngineError::BadType`] for [`NativeType::String`] and unknown user-defined types.
    fn type_size(&self, native_type: NativeType) -> Result<usize, EngineError> {
        match native_type {
            NativeType::User(id) => Ok(self.user_type_info(id)?.size),
            _ => native_type.builtin_size().ok_or(EngineError::BadType),
        }
    }
}

/// Returns true if an engine with `version` expresses `imap` strides in elements rather than bytes.
///
/// Versions before 4.4 use bytes. Unparseable versions are assumed to be recent.
#[must_use]
pub fn imap_in_elements(version: &str) -> bool {
    let mut parts = version
        .trim()
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u32>().unwrap_or(0));
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => major > 4 || (major == 4 && minor >= 4),
        (Some(major), None) => major > 4,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_imap_unit_from_version() {
        assert!(imap_in_elements("4.9.2"));
        assert!(imap_in_elements("4.4.0"));
        assert!(imap_in_elements("5.0"));
        assert!(!imap_in_elements("4.3.3.1"));
        assert!(!imap_in_elements("3.6.3 of Dec 22 2009"));
        assert!(imap_in_elements("unknown"));
    }

    #[test]
    fn engine_error_codes() {
        assert_eq!(EngineError::NameInUse("x".to_string()).code(), -42);
        assert_eq!(EngineError::NotInDefineMode.code(), -38);
        assert_eq!(
            EngineError::AttributeNotFound("units".to_string()).to_string(),
            "attribute units not found"
        );
    }

    #[test]
    fn native_type_sizes() {
        assert_eq!(NativeType::Byte.builtin_size(), Some(1));
        assert_eq!(NativeType::UInt64.builtin_size(), Some(8));
        assert_eq!(NativeType::String.builtin_size(), None);
        assert_eq!(NativeType::User(3).builtin_size(), None);
        assert_eq!(NativeType::Short.to_string(), "NC_SHORT");
    }
}
