//! Logical data types.
//!
//! An [`ExtendedType`] is the caller-facing description of the values of an array or attribute: a
//! [`NumericType`], a string, or a [`CompoundType`] of named components.
//! Complex numbers are numeric types, stored by the engine as a two field compound.
//!
//! Values of compound types with string components are held in [`Record`]s rather than plain bytes.
//!
//! [`copy_value`] converts one value between extended types. It is the conversion applied whenever the
//! buffer type of a read or write differs from the logical type of the array or attribute.

mod native;

pub use native::NativeTypeOverride;
pub(crate) use native::{
    array_native_type, attribute_native_type, build_data_type, create_or_get_type, NativeRepr,
};
use derive_more::Display;
use num::complex::{Complex, Complex32, Complex64};
use thiserror::Error;

use crate::engine::{EngineError, NativeType, UserTypeClass};

/// A numeric data type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum NumericType {
    /// `u8`
    UInt8,
    /// `i16`
    Int16,
    /// `u16`
    UInt16,
    /// `i32`
    Int32,
    /// `u32`
    UInt32,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// [`Complex<i16>`]
    ComplexInt16,
    /// [`Complex<i32>`]
    ComplexInt32,
    /// [`Complex32`]
    ComplexFloat32,
    /// [`Complex64`]
    ComplexFloat64,
}

impl NumericType {
    /// Return the size in bytes of one value.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 | Self::ComplexInt16 => 4,
            Self::Float64 | Self::ComplexInt32 | Self::ComplexFloat32 => 8,
            Self::ComplexFloat64 => 16,
        }
    }

    /// Returns true if the type is complex.
    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(
            self,
            Self::ComplexInt16 | Self::ComplexInt32 | Self::ComplexFloat32 | Self::ComplexFloat64
        )
    }

    /// Return the type of the real and imaginary parts of a complex type, or the type itself.
    #[must_use]
    pub const fn component_type(self) -> NumericType {
        match self {
            Self::ComplexInt16 => Self::Int16,
            Self::ComplexInt32 => Self::Int32,
            Self::ComplexFloat32 => Self::Float32,
            Self::ComplexFloat64 => Self::Float64,
            other => other,
        }
    }

    fn decode(self, bytes: &[u8]) -> f64 {
        macro_rules! read {
            ($t:ty) => {{
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                f64::from(<$t>::from_ne_bytes(raw))
            }};
        }
        match self.component_type() {
            Self::UInt8 => f64::from(bytes[0]),
            Self::Int16 => read!(i16),
            Self::UInt16 => read!(u16),
            Self::Int32 => read!(i32),
            Self::UInt32 => read!(u32),
            Self::Float32 => read!(f32),
            _ => read!(f64),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn encode(self, value: f64, bytes: &mut [u8]) {
        macro_rules! write_int {
            ($t:ty) => {{
                let value = if value.is_nan() {
                    0
                } else {
                    value.round().clamp(f64::from(<$t>::MIN), f64::from(<$t>::MAX)) as $t
                };
                bytes[..std::mem::size_of::<$t>()].copy_from_slice(&value.to_ne_bytes());
            }};
        }
        match self.component_type() {
            Self::UInt8 => write_int!(u8),
            Self::Int16 => write_int!(i16),
            Self::UInt16 => write_int!(u16),
            Self::Int32 => write_int!(i32),
            Self::UInt32 => write_int!(u32),
            Self::Float32 => bytes[..4].copy_from_slice(&(value as f32).to_ne_bytes()),
            _ => bytes[..8].copy_from_slice(&value.to_ne_bytes()),
        }
    }

    /// Decode a value into its real and imaginary parts.
    fn decode_complex(self, bytes: &[u8]) -> (f64, f64) {
        let component = self.component_type();
        let real = component.decode(bytes);
        let imag = if self.is_complex() {
            component.decode(&bytes[component.size()..])
        } else {
            0.0
        };
        (real, imag)
    }

    fn encode_complex(self, (real, imag): (f64, f64), bytes: &mut [u8]) {
        let component = self.component_type();
        component.encode(real, bytes);
        if self.is_complex() {
            component.encode(imag, &mut bytes[component.size()..]);
        }
    }
}

/// A component of a [`CompoundType`].
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    name: String,
    offset: usize,
    data_type: ExtendedType,
}

impl Component {
    /// Create a new component at byte `offset` within its record.
    #[must_use]
    pub fn new(name: impl Into<String>, offset: usize, data_type: ExtendedType) -> Self {
        Self {
            name: name.into(),
            offset,
            data_type,
        }
    }

    /// The component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The byte offset of the component within its record.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The component data type.
    #[must_use]
    pub const fn data_type(&self) -> &ExtendedType {
        &self.data_type
    }
}

/// The size in bytes of the slot of a string component within a compound record.
pub const STRING_SLOT_SIZE: usize = 8;

/// A named record type.
#[derive(Clone, Debug, PartialEq)]
pub struct CompoundType {
    name: String,
    size: usize,
    components: Vec<Component>,
}

impl CompoundType {
    /// Create a new compound type of `size` bytes.
    ///
    /// String components occupy [`STRING_SLOT_SIZE`] bytes.
    ///
    /// # Errors
    /// Returns [`DataTypeError::ComponentOutOfBounds`] if a component does not fit within `size` bytes.
    pub fn new(
        name: impl Into<String>,
        size: usize,
        components: Vec<Component>,
    ) -> Result<Self, DataTypeError> {
        let name = name.into();
        for component in &components {
            if component.offset + component.data_type.slot_size() > size {
                return Err(DataTypeError::ComponentOutOfBounds(
                    name,
                    component.name.clone(),
                ));
            }
        }
        Ok(Self {
            name,
            size,
            components,
        })
    }

    /// The type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The size in bytes of one record.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The components.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The number of string values of one record, nested compound components included.
    #[must_use]
    pub fn string_count(&self) -> usize {
        self.components
            .iter()
            .map(|component| component.data_type.string_count())
            .sum()
    }

    /// The index of the first string value of each component within [`Record::strings`].
    fn string_starts(&self) -> Vec<usize> {
        self.components
            .iter()
            .scan(0, |start, component| {
                let current = *start;
                *start += component.data_type.string_count();
                Some(current)
            })
            .collect()
    }
}

/// One value of a [`CompoundType`] with string components.
///
/// The bytes hold the record laid out as described by its compound type. The slots of string components
/// within the bytes are unused: string values are held separately, in component order with nested compound
/// components expanded in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    bytes: Vec<u8>,
    strings: Vec<Option<String>>,
}

impl Record {
    /// Create a zeroed record of `compound_type` with all strings unset.
    #[must_use]
    pub fn new(compound_type: &CompoundType) -> Self {
        Self {
            bytes: vec![0; compound_type.size],
            strings: vec![None; compound_type.string_count()],
        }
    }

    /// Create a record from its bytes and string values.
    #[must_use]
    pub fn from_parts(bytes: Vec<u8>, strings: Vec<Option<String>>) -> Self {
        Self { bytes, strings }
    }

    /// The record bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The mutable record bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// The string values.
    #[must_use]
    pub fn strings(&self) -> &[Option<String>] {
        &self.strings
    }

    /// The mutable string values.
    pub fn strings_mut(&mut self) -> &mut [Option<String>] {
        &mut self.strings
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [u8], &mut [Option<String>]) {
        (&mut self.bytes, &mut self.strings)
    }

    /// Resize the record to hold a value of `compound_type`, keeping the leading bytes and strings.
    pub(crate) fn conform(&mut self, compound_type: &CompoundType) {
        self.bytes.resize(compound_type.size, 0);
        self.strings.resize(compound_type.string_count(), None);
    }

    /// Decompose the record into its bytes and string values.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, Vec<Option<String>>) {
        (self.bytes, self.strings)
    }
}

/// A logical data type.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtendedType {
    /// A numeric type.
    Numeric(NumericType),
    /// A string, optionally with a fixed maximum length in bytes.
    String {
        /// The maximum length, [`None`] if unbounded.
        max_length: Option<usize>,
    },
    /// A compound type.
    Compound(CompoundType),
}

impl From<NumericType> for ExtendedType {
    fn from(numeric_type: NumericType) -> Self {
        Self::Numeric(numeric_type)
    }
}

impl From<CompoundType> for ExtendedType {
    fn from(compound_type: CompoundType) -> Self {
        Self::Compound(compound_type)
    }
}

impl std::fmt::Display for ExtendedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(numeric_type) => write!(f, "{numeric_type}"),
            Self::String { max_length: None } => write!(f, "String"),
            Self::String {
                max_length: Some(max_length),
            } => write!(f, "String({max_length})"),
            Self::Compound(compound_type) => write!(f, "Compound({})", compound_type.name),
        }
    }
}

impl ExtendedType {
    /// An unbounded string type.
    #[must_use]
    pub const fn string() -> Self {
        Self::String { max_length: None }
    }

    /// A string type with a fixed maximum length.
    #[must_use]
    pub const fn fixed_string(max_length: usize) -> Self {
        Self::String {
            max_length: Some(max_length),
        }
    }

    /// Return the size in bytes of one value, [`None`] for strings and compound types with string components.
    #[must_use]
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Numeric(numeric_type) => Some(numeric_type.size()),
            Self::String { .. } => None,
            Self::Compound(compound_type) => {
                self.is_numeric_only().then_some(compound_type.size)
            }
        }
    }

    /// The size of the type within a compound record.
    fn slot_size(&self) -> usize {
        match self {
            Self::Numeric(numeric_type) => numeric_type.size(),
            Self::String { .. } => STRING_SLOT_SIZE,
            Self::Compound(compound_type) => compound_type.size,
        }
    }

    fn string_count(&self) -> usize {
        match self {
            Self::Numeric(_) => 0,
            Self::String { .. } => 1,
            Self::Compound(compound_type) => compound_type.string_count(),
        }
    }

    /// Return the compound type if values of the type are held in [`Record`]s.
    #[must_use]
    pub fn as_record_type(&self) -> Option<&CompoundType> {
        match self {
            Self::Compound(compound_type) if !self.is_numeric_only() => Some(compound_type),
            _ => None,
        }
    }

    /// Returns true if the type is a string.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String { .. })
    }

    /// Return the numeric type, if the type is numeric.
    #[must_use]
    pub const fn as_numeric(&self) -> Option<NumericType> {
        match self {
            Self::Numeric(numeric_type) => Some(*numeric_type),
            _ => None,
        }
    }

    /// Return the maximum string length of a fixed length string type.
    #[must_use]
    pub const fn max_string_length(&self) -> Option<usize> {
        match self {
            Self::String { max_length } => *max_length,
            _ => None,
        }
    }

    /// Returns true if the type holds no strings at any level.
    #[must_use]
    pub fn is_numeric_only(&self) -> bool {
        match self {
            Self::Numeric(_) => true,
            Self::String { .. } => false,
            Self::Compound(compound_type) => compound_type
                .components
                .iter()
                .all(|component| component.data_type.is_numeric_only()),
        }
    }
}

/// A data type error.
#[derive(Debug, Error)]
pub enum DataTypeError {
    /// An engine error.
    #[error(transparent)]
    EngineError(#[from] EngineError),
    /// A user-defined type class with no logical equivalent.
    #[error("unsupported {0} user-defined type {1}")]
    UnsupportedUserType(UserTypeClass, String),
    /// A native type with no logical equivalent.
    #[error("unsupported native type {0}")]
    UnsupportedNativeType(NativeType),
    /// A compound field is an array.
    #[error("field {1} of compound type {0} is not a scalar")]
    NonScalarField(String, String),
    /// A compound field is not an exact match of its logical type.
    #[error("field {1} of compound type {0} has no exact logical equivalent")]
    ImperfectField(String, String),
    /// A record does not hold a value of its compound type.
    #[error("record does not match compound type {0}")]
    RecordMismatch(String),
    /// A compound component does not fit in the record.
    #[error("component {1} of compound type {0} does not fit in the record")]
    ComponentOutOfBounds(String, String),
    /// A conversion between two types is not supported.
    #[error("cannot convert {0} to {1}")]
    IncompatibleConversion(String, String),
}

/// Copy one value of `src_type` from the start of `src` into the start of `dst` as `dst_type`.
///
/// Numeric conversions round to nearest and saturate for integer targets, map NaN to zero, drop the
/// imaginary part when converting complex to real values and set it to zero in the other direction.
/// Compound values are converted component by component, matched by name; destination components absent
/// from the source are zeroed. Use [`copy_record`] for compound types with string components.
///
/// # Errors
/// Returns [`DataTypeError::IncompatibleConversion`] if either type holds strings, or one type is numeric
/// and the other compound.
pub fn copy_value(
    src: &[u8],
    src_type: &ExtendedType,
    dst: &mut [u8],
    dst_type: &ExtendedType,
) -> Result<(), DataTypeError> {
    match (src_type, dst_type) {
        (ExtendedType::Numeric(src_numeric), ExtendedType::Numeric(dst_numeric)) => {
            if src_numeric == dst_numeric {
                let size = src_numeric.size();
                dst[..size].copy_from_slice(&src[..size]);
            } else {
                dst_numeric.encode_complex(src_numeric.decode_complex(src), dst);
            }
            Ok(())
        }
        (ExtendedType::Compound(src_compound), ExtendedType::Compound(dst_compound))
            if src_type.is_numeric_only() && dst_type.is_numeric_only() =>
        {
            if src_compound == dst_compound {
                dst[..dst_compound.size].copy_from_slice(&src[..src_compound.size]);
                return Ok(());
            }
            copy_components(src, &[], src_compound, dst, &mut [], dst_compound)
        }
        _ => Err(DataTypeError::IncompatibleConversion(
            src_type.to_string(),
            dst_type.to_string(),
        )),
    }
}

/// Copy one record of `src_type` into `dst` as `dst_type`.
///
/// Components are matched by name as in [`copy_value`]. String components are copied to string
/// components, formatted from real numeric components and parsed into them. `dst` is resized to hold a
/// value of `dst_type`.
///
/// # Errors
/// Returns a [`DataTypeError`] if `src` does not hold a value of `src_type` or two matched components
/// cannot be converted.
pub fn copy_record(
    src: &Record,
    src_type: &CompoundType,
    dst: &mut Record,
    dst_type: &CompoundType,
) -> Result<(), DataTypeError> {
    if src.bytes.len() < src_type.size || src.strings.len() < src_type.string_count() {
        return Err(DataTypeError::RecordMismatch(src_type.name.clone()));
    }
    dst.conform(dst_type);
    copy_components(
        &src.bytes,
        &src.strings,
        src_type,
        &mut dst.bytes,
        &mut dst.strings,
        dst_type,
    )
}

fn copy_components(
    src: &[u8],
    src_strings: &[Option<String>],
    src_type: &CompoundType,
    dst: &mut [u8],
    dst_strings: &mut [Option<String>],
    dst_type: &CompoundType,
) -> Result<(), DataTypeError> {
    dst[..dst_type.size].fill(0);
    for string in dst_strings.iter_mut().take(dst_type.string_count()) {
        *string = None;
    }
    let src_starts = src_type.string_starts();
    for (dst_component, dst_start) in std::iter::zip(&dst_type.components, dst_type.string_starts()) {
        let Some((src_component, &src_start)) = std::iter::zip(&src_type.components, &src_starts)
            .find(|(component, _)| component.name == dst_component.name)
        else {
            continue;
        };
        copy_component(
            &src[src_component.offset..],
            src_strings.get(src_start..).unwrap_or_default(),
            &src_component.data_type,
            &mut dst[dst_component.offset..],
            dst_strings.get_mut(dst_start..).unwrap_or_default(),
            &dst_component.data_type,
        )?;
    }
    Ok(())
}

/// Copy one value between record representations: bytes plus the strings of the value.
pub(crate) fn copy_component(
    src: &[u8],
    src_strings: &[Option<String>],
    src_type: &ExtendedType,
    dst: &mut [u8],
    dst_strings: &mut [Option<String>],
    dst_type: &ExtendedType,
) -> Result<(), DataTypeError> {
    let mismatch = |data_type: &ExtendedType| DataTypeError::RecordMismatch(data_type.to_string());
    match (src_type, dst_type) {
        (ExtendedType::String { .. }, ExtendedType::String { .. }) => {
            let value = src_strings.first().ok_or_else(|| mismatch(src_type))?;
            *dst_strings.first_mut().ok_or_else(|| mismatch(dst_type))? = value.clone();
            Ok(())
        }
        (ExtendedType::String { .. }, _) => {
            let value = src_strings.first().ok_or_else(|| mismatch(src_type))?;
            parse_value(value.as_deref(), dst, dst_type)
        }
        (_, ExtendedType::String { .. }) => {
            let value = format_value(src, src_type)?;
            *dst_strings.first_mut().ok_or_else(|| mismatch(dst_type))? = Some(value);
            Ok(())
        }
        (ExtendedType::Compound(src_compound), ExtendedType::Compound(dst_compound)) => {
            if src_strings.len() < src_compound.string_count()
                || dst_strings.len() < dst_compound.string_count()
            {
                return Err(mismatch(src_type));
            }
            copy_components(src, src_strings, src_compound, dst, dst_strings, dst_compound)
        }
        _ => copy_value(src, src_type, dst, dst_type),
    }
}

/// Format a numeric value as a string.
///
/// # Errors
/// Returns [`DataTypeError::IncompatibleConversion`] if the type is not a real numeric type.
pub(crate) fn format_value(src: &[u8], src_type: &ExtendedType) -> Result<String, DataTypeError> {
    match src_type {
        ExtendedType::Numeric(numeric_type) if !numeric_type.is_complex() => {
            Ok(numeric_type.decode(src).to_string())
        }
        _ => Err(DataTypeError::IncompatibleConversion(
            src_type.to_string(),
            ExtendedType::string().to_string(),
        )),
    }
}

/// Parse a string into one value of a real numeric type. Unparseable strings give zero.
///
/// # Errors
/// Returns [`DataTypeError::IncompatibleConversion`] if the type is not a real numeric type.
pub(crate) fn parse_value(
    src: Option<&str>,
    dst: &mut [u8],
    dst_type: &ExtendedType,
) -> Result<(), DataTypeError> {
    match dst_type {
        ExtendedType::Numeric(numeric_type) if !numeric_type.is_complex() => {
            let value = src
                .and_then(|src| src.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
            numeric_type.encode(value, dst);
            Ok(())
        }
        _ => Err(DataTypeError::IncompatibleConversion(
            ExtendedType::string().to_string(),
            dst_type.to_string(),
        )),
    }
}

/// A fixed size element type that can be read from and written to numeric arrays.
pub trait Element: bytemuck::Pod {
    /// The numeric type of the element.
    const NUMERIC_TYPE: NumericType;

    /// The extended type of the element.
    #[must_use]
    fn data_type() -> ExtendedType {
        ExtendedType::Numeric(Self::NUMERIC_TYPE)
    }
}

macro_rules! impl_element {
    ($raw_type:ty, $numeric_type:ident) => {
        impl Element for $raw_type {
            const NUMERIC_TYPE: NumericType = NumericType::$numeric_type;
        }
    };
}

impl_element!(u8, UInt8);
impl_element!(i16, Int16);
impl_element!(u16, UInt16);
impl_element!(i32, Int32);
impl_element!(u32, UInt32);
impl_element!(f32, Float32);
impl_element!(f64, Float64);
impl_element!(Complex<i16>, ComplexInt16);
impl_element!(Complex<i32>, ComplexInt32);
impl_element!(Complex32, ComplexFloat32);
impl_element!(Complex64, ComplexFloat64);

#[cfg(test)]
mod tests {
    use super::*;

    fn convert<S: Element, D: Element>(value: S) -> D {
        let mut dst = D::zeroed();
        copy_value(
            bytemuck::bytes_of(&value),
            &S::data_type(),
            bytemuck::bytes_of_mut(&mut dst),
            &D::data_type(),
        )
        .unwrap();
        dst
    }

    #[test]
    fn numeric_conversions() {
        assert_eq!(convert::<f64, u8>(300.0), 255);
        assert_eq!(convert::<f64, u8>(-3.0), 0);
        assert_eq!(convert::<f32, i16>(-2.5), -3);
        assert_eq!(convert::<f64, i32>(f64::NAN), 0);
        assert_eq!(convert::<u32, f64>(u32::MAX), f64::from(u32::MAX));
        assert_eq!(convert::<i16, u16>(-1), 0);
    }

    #[test]
    fn complex_conversions() {
        assert_eq!(
            convert::<Complex32, f64>(Complex32::new(1.5, 2.0)),
            1.5
        );
        assert_eq!(
            convert::<i16, Complex64>(7),
            Complex64::new(7.0, 0.0)
        );
        assert_eq!(
            convert::<Complex64, Complex<i16>>(Complex64::new(1.4, -2.6)),
            Complex::new(1, -3)
        );
    }

    #[test]
    fn compound_conversion_by_name() {
        let src_type: ExtendedType = CompoundType::new(
            "src",
            8,
            vec![
                Component::new("a", 0, NumericType::Int32.into()),
                Component::new("b", 4, NumericType::Float32.into()),
            ],
        )
        .unwrap()
        .into();
        let dst_type: ExtendedType = CompoundType::new(
            "dst",
            10,
            vec![
                Component::new("b", 0, NumericType::Float64.into()),
                Component::new("c", 8, NumericType::Int16.into()),
            ],
        )
        .unwrap()
        .into();
        let mut src = [0u8; 8];
        src[..4].copy_from_slice(&5i32.to_ne_bytes());
        src[4..].copy_from_slice(&2.5f32.to_ne_bytes());
        let mut dst = [0xffu8; 10];
        copy_value(&src, &src_type, &mut dst, &dst_type).unwrap();
        assert_eq!(f64::from_ne_bytes(dst[..8].try_into().unwrap()), 2.5);
        assert_eq!(i16::from_ne_bytes(dst[8..].try_into().unwrap()), 0);
    }

    #[test]
    fn compound_validation() {
        let named = CompoundType::new(
            "s",
            8,
            vec![Component::new("name", 0, ExtendedType::string())],
        )
        .unwrap();
        assert_eq!(named.string_count(), 1);
        assert_eq!(ExtendedType::from(named.clone()).fixed_size(), None);
        assert_eq!(ExtendedType::from(named).as_record_type().map(CompoundType::size), Some(8));
        assert!(matches!(
            CompoundType::new(
                "s",
                4,
                vec![Component::new("name", 0, ExtendedType::string())]
            ),
            Err(DataTypeError::ComponentOutOfBounds(_, _))
        ));
        assert!(matches!(
            CompoundType::new(
                "s",
                4,
                vec![Component::new("x", 2, NumericType::Float32.into())]
            ),
            Err(DataTypeError::ComponentOutOfBounds(_, _))
        ));
    }

    #[test]
    fn record_conversion_by_name() {
        let inner = CompoundType::new(
            "inner",
            12,
            vec![
                Component::new("label", 0, ExtendedType::string()),
                Component::new("code", 8, NumericType::Int32.into()),
            ],
        )
        .unwrap();
        let src_type = CompoundType::new(
            "src",
            24,
            vec![
                Component::new("name", 0, ExtendedType::string()),
                Component::new("inner", 8, inner.clone().into()),
                Component::new("depth", 20, NumericType::Float32.into()),
            ],
        )
        .unwrap();
        let dst_type = CompoundType::new(
            "dst",
            32,
            vec![
                Component::new("depth", 0, ExtendedType::string()),
                Component::new("inner", 8, inner.into()),
                Component::new("name", 20, ExtendedType::string()),
                Component::new("missing", 28, NumericType::Int32.into()),
            ],
        )
        .unwrap();
        assert_eq!(src_type.string_count(), 2);

        let mut src = Record::new(&src_type);
        src.strings_mut()[0] = Some("alpha".to_string());
        src.strings_mut()[1] = Some("nested".to_string());
        src.bytes_mut()[16..20].copy_from_slice(&42i32.to_ne_bytes());
        src.bytes_mut()[20..24].copy_from_slice(&1.5f32.to_ne_bytes());

        let mut dst = Record::default();
        copy_record(&src, &src_type, &mut dst, &dst_type).unwrap();
        assert_eq!(dst.bytes().len(), 32);
        assert_eq!(
            dst.strings(),
            &[
                Some("1.5".to_string()),
                Some("nested".to_string()),
                Some("alpha".to_string())
            ]
        );
        assert_eq!(i32::from_ne_bytes(dst.bytes()[16..20].try_into().unwrap()), 42);
        assert_eq!(i32::from_ne_bytes(dst.bytes()[28..32].try_into().unwrap()), 0);

        assert!(matches!(
            copy_record(&Record::default(), &src_type, &mut dst, &dst_type),
            Err(DataTypeError::RecordMismatch(_))
        ));
        assert!(copy_value(
            src.bytes(),
            &src_type.clone().into(),
            &mut [0; 24],
            &src_type.into()
        )
        .is_err());
    }

    #[test]
    fn numeric_to_string_conversion_fails() {
        let err = copy_value(
            &[0; 4],
            &NumericType::Float32.into(),
            &mut [0; 4],
            &ExtendedType::string(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot convert Float32 to String");
        assert_eq!(
            format_value(&2.5f64.to_ne_bytes(), &NumericType::Float64.into()).unwrap(),
            "2.5"
        );
    }

    #[test]
    fn string_to_numeric_conversion() {
        let mut dst = [0u8; 2];
        parse_value(Some(" 42 "), &mut dst, &NumericType::Int16.into()).unwrap();
        assert_eq!(i16::from_ne_bytes(dst), 42);
        parse_value(Some("x"), &mut dst, &NumericType::Int16.into()).unwrap();
        assert_eq!(i16::from_ne_bytes(dst), 0);
        assert!(parse_value(None, &mut [0; 8], &NumericType::ComplexFloat32.into()).is_err());
    }
}
