//! Mapping between logical data types and engine-native types.

use crate::engine::{Engine, GroupId, NativeType, UserTypeClass, UserTypeInfo};

use super::{Component, CompoundType, DataTypeError, ExtendedType, NumericType};

/// A request to store values with a specific native type rather than the default for their logical type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NativeTypeOverride {
    /// Store strings as fixed-width characters.
    Char,
    /// Store 16-bit integers as signed bytes.
    Byte,
    /// Store doubles as signed 64-bit integers.
    Int64,
    /// Store doubles as unsigned 64-bit integers.
    UInt64,
}

const REAL: &str = "real";
const IMAG: &str = "imag";

const fn complex_type_name(numeric_type: NumericType) -> Option<&'static str> {
    match numeric_type {
        NumericType::ComplexInt16 => Some("ComplexInt16"),
        NumericType::ComplexInt32 => Some("ComplexInt32"),
        NumericType::ComplexFloat32 => Some("ComplexFloat32"),
        NumericType::ComplexFloat64 => Some("ComplexFloat64"),
        _ => None,
    }
}

const fn scalar_native_type(numeric_type: NumericType) -> NativeType {
    match numeric_type.component_type() {
        NumericType::UInt8 => NativeType::UByte,
        NumericType::Int16 => NativeType::Short,
        NumericType::UInt16 => NativeType::UShort,
        NumericType::Int32 => NativeType::Int,
        NumericType::UInt32 => NativeType::UInt,
        NumericType::Float32 => NativeType::Float,
        _ => NativeType::Double,
    }
}

/// Register `data_type` with the engine, or find an existing registration, and return its native type.
///
/// Complex types map to a compound named after the type with `real` and `imag` fields. Compound types are
/// looked up by name first, then defined with each component registered recursively.
pub(crate) fn create_or_get_type(
    engine: &mut dyn Engine,
    gid: GroupId,
    data_type: &ExtendedType,
) -> Result<NativeType, DataTypeError> {
    match data_type {
        ExtendedType::Numeric(numeric_type) => match complex_type_name(*numeric_type) {
            Some(name) => {
                if let Some(id) = engine.user_type_by_name(gid, name)? {
                    return Ok(NativeType::User(id));
                }
                let component = numeric_type.component_type();
                let id = engine.def_compound(gid, name, numeric_type.size())?;
                engine.insert_compound_field(id, REAL, 0, scalar_native_type(component))?;
                engine.insert_compound_field(
                    id,
                    IMAG,
                    component.size(),
                    scalar_native_type(component),
                )?;
                Ok(NativeType::User(id))
            }
            None => Ok(scalar_native_type(*numeric_type)),
        },
        ExtendedType::String { .. } => Ok(NativeType::String),
        ExtendedType::Compound(compound_type) => {
            if let Some(id) = engine.user_type_by_name(gid, compound_type.name())? {
                return Ok(NativeType::User(id));
            }
            let field_types = compound_type
                .components()
                .iter()
                .map(|component| create_or_get_type(engine, gid, component.data_type()))
                .collect::<Result<Vec<_>, _>>()?;
            let id = engine.def_compound(gid, compound_type.name(), compound_type.size())?;
            for (component, field_type) in std::iter::zip(compound_type.components(), field_types)
            {
                engine.insert_compound_field(
                    id,
                    component.name(),
                    component.offset(),
                    field_type,
                )?;
            }
            Ok(NativeType::User(id))
        }
    }
}

/// Build the logical type of a native type, and whether the native type is a perfect match of it.
///
/// `unsigned` is the `_Unsigned` marker of the owning variable, which turns signed bytes into unsigned
/// bytes. Characters build a single character string; callers exposing a trailing length dimension
/// as fixed-width text adjust the maximum length.
pub(crate) fn build_data_type(
    engine: &dyn Engine,
    native_type: NativeType,
    unsigned: bool,
) -> Result<(ExtendedType, bool), DataTypeError> {
    let numeric = |numeric_type: NumericType| -> Result<(ExtendedType, bool), DataTypeError> {
        Ok((ExtendedType::Numeric(numeric_type), true))
    };
    match native_type {
        NativeType::Byte if unsigned => numeric(NumericType::UInt8),
        NativeType::Byte => Ok((NumericType::Int16.into(), false)),
        NativeType::Char => Ok((ExtendedType::fixed_string(1), true)),
        NativeType::String => Ok((ExtendedType::string(), true)),
        NativeType::Short => numeric(NumericType::Int16),
        NativeType::Int => numeric(NumericType::Int32),
        NativeType::Float => numeric(NumericType::Float32),
        NativeType::Double => numeric(NumericType::Float64),
        NativeType::UByte => numeric(NumericType::UInt8),
        NativeType::UShort => numeric(NumericType::UInt16),
        NativeType::UInt => numeric(NumericType::UInt32),
        NativeType::Int64 | NativeType::UInt64 => Ok((NumericType::Float64.into(), false)),
        NativeType::User(id) => {
            let info = engine.user_type_info(id)?;
            match info.class {
                UserTypeClass::Compound => {
                    if let Some(complex) = complex_of(&info) {
                        return numeric(complex);
                    }
                    let mut components = Vec::with_capacity(info.fields.len());
                    for field in &info.fields {
                        if !field.dims.is_empty() {
                            return Err(DataTypeError::NonScalarField(
                                info.name.clone(),
                                field.name.clone(),
                            ));
                        }
                        let (data_type, perfect) = build_data_type(engine, field.field_type, false)?;
                        if !perfect || field.field_type == NativeType::Char {
                            return Err(DataTypeError::ImperfectField(
                                info.name.clone(),
                                field.name.clone(),
                            ));
                        }
                        components.push(Component::new(&field.name, field.offset, data_type));
                    }
                    Ok((
                        CompoundType::new(info.name, info.size, components)?.into(),
                        true,
                    ))
                }
                UserTypeClass::Enum => {
                    let base_type = info
                        .base_type
                        .ok_or(DataTypeError::UnsupportedNativeType(native_type))?;
                    build_data_type(engine, base_type, unsigned)
                }
                UserTypeClass::VLen | UserTypeClass::Opaque => {
                    Err(DataTypeError::UnsupportedUserType(info.class, info.name))
                }
            }
        }
    }
}

/// Recognise a two field compound with identical scalar fields and a name starting with `complex`.
fn complex_of(info: &UserTypeInfo) -> Option<NumericType> {
    let [real, imag] = info.fields.as_slice() else {
        return None;
    };
    if !info.name.to_ascii_lowercase().starts_with("complex")
        || real.field_type != imag.field_type
        || !real.dims.is_empty()
        || !imag.dims.is_empty()
    {
        return None;
    }
    match real.field_type {
        NativeType::Short => Some(NumericType::ComplexInt16),
        NativeType::Int => Some(NumericType::ComplexInt32),
        NativeType::Float => Some(NumericType::ComplexFloat32),
        NativeType::Double => Some(NumericType::ComplexFloat64),
        _ => None,
    }
}

/// How the values of a logical type are represented natively.
///
/// For non-perfect matches the native value is converted in place within a scratch buffer of
/// [`NativeRepr::scratch_size`] bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct NativeRepr {
    native_type: NativeType,
    perfect: bool,
    logical_size: usize,
}

impl NativeRepr {
    pub(crate) fn new(native_type: NativeType, perfect: bool, data_type: &ExtendedType) -> Self {
        Self {
            native_type,
            perfect,
            logical_size: data_type.fixed_size().unwrap_or(1),
        }
    }

    pub(crate) const fn native_type(&self) -> NativeType {
        self.native_type
    }

    pub(crate) const fn is_perfect(&self) -> bool {
        self.perfect
    }

    /// The size in bytes of one native value.
    pub(crate) fn native_size(&self) -> usize {
        if self.perfect {
            self.logical_size
        } else {
            self.native_type.builtin_size().unwrap_or(self.logical_size)
        }
    }

    /// The size of a buffer able to hold one native or logical value.
    pub(crate) fn scratch_size(&self) -> usize {
        self.logical_size.max(self.native_size())
    }

    /// Convert a native value at the start of `buffer` to its logical representation in place.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn to_logical(&self, buffer: &mut [u8]) {
        if self.perfect {
            return;
        }
        match self.native_type {
            NativeType::Byte | NativeType::Char => {
                let value = i16::from(i8::from_ne_bytes([buffer[0]]));
                buffer[..2].copy_from_slice(&value.to_ne_bytes());
            }
            NativeType::Int64 => {
                let value = i64::from_ne_bytes(eight_bytes(buffer)) as f64;
                buffer[..8].copy_from_slice(&value.to_ne_bytes());
            }
            NativeType::UInt64 => {
                let value = u64::from_ne_bytes(eight_bytes(buffer)) as f64;
                buffer[..8].copy_from_slice(&value.to_ne_bytes());
            }
            _ => {}
        }
    }

    /// Convert a logical value at the start of `buffer` to its native representation in place.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn to_native(&self, buffer: &mut [u8]) {
        if self.perfect {
            return;
        }
        match self.native_type {
            NativeType::Byte | NativeType::Char => {
                let value = i16::from_ne_bytes([buffer[0], buffer[1]]) as i8;
                buffer[0] = value.to_ne_bytes()[0];
            }
            NativeType::Int64 => {
                let value = f64::from_ne_bytes(eight_bytes(buffer)) as i64;
                buffer[..8].copy_from_slice(&value.to_ne_bytes());
            }
            NativeType::UInt64 => {
                let value = f64::from_ne_bytes(eight_bytes(buffer)) as u64;
                buffer[..8].copy_from_slice(&value.to_ne_bytes());
            }
            _ => {}
        }
    }
}

fn eight_bytes(buffer: &[u8]) -> [u8; 8] {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&buffer[..8]);
    bytes
}

/// Decide the native type of a new array from its logical type, rank and override.
///
/// Returns the native type, whether it is a perfect match of the logical type and whether it is
/// fixed-width text requiring a trailing length dimension. Overrides that do not apply to the logical
/// type are ignored with a warning.
pub(crate) fn array_native_type(
    data_type: &ExtendedType,
    created: NativeType,
    rank: usize,
    native_type_override: Option<NativeTypeOverride>,
) -> (NativeType, bool, bool) {
    match (data_type, native_type_override) {
        (ExtendedType::String { max_length: Some(len) }, None | Some(NativeTypeOverride::Char))
            if rank == 1 && *len > 0 =>
        {
            (NativeType::Char, true, true)
        }
        (ExtendedType::Numeric(NumericType::Int16), Some(NativeTypeOverride::Byte)) => {
            (NativeType::Byte, false, false)
        }
        (ExtendedType::Numeric(NumericType::Float64), Some(NativeTypeOverride::Int64)) => {
            (NativeType::Int64, false, false)
        }
        (ExtendedType::Numeric(NumericType::Float64), Some(NativeTypeOverride::UInt64)) => {
            (NativeType::UInt64, false, false)
        }
        (_, None) => (created, true, false),
        (_, Some(native_type_override)) => {
            tracing::warn!("native type {native_type_override:?} does not apply to {data_type}, ignored");
            (created, true, false)
        }
    }
}

/// Decide the native type of a new attribute, and whether it is a perfect match of its logical type.
pub(crate) fn attribute_native_type(
    data_type: &ExtendedType,
    created: NativeType,
    scalar: bool,
    native_type_override: Option<NativeTypeOverride>,
) -> (NativeType, bool) {
    match (data_type, native_type_override) {
        (ExtendedType::String { .. }, None | Some(NativeTypeOverride::Char)) if scalar => {
            (NativeType::Char, true)
        }
        (ExtendedType::Numeric(NumericType::Int16), Some(NativeTypeOverride::Byte)) => {
            (NativeType::Byte, false)
        }
        (ExtendedType::Numeric(NumericType::Float64), Some(NativeTypeOverride::Int64)) => {
            (NativeType::Int64, false)
        }
        (ExtendedType::Numeric(NumericType::Float64), Some(NativeTypeOverride::UInt64)) => {
            (NativeType::UInt64, false)
        }
        _ => (created, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;

    #[test]
    fn complex_types_are_registered_once() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let complex: ExtendedType = NumericType::ComplexFloat32.into();
        let first = create_or_get_type(&mut engine, root, &complex).unwrap();
        let second = create_or_get_type(&mut engine, root, &complex).unwrap();
        assert_eq!(first, second);
        let NativeType::User(id) = first else {
            panic!("expected a user-defined type")
        };
        let info = engine.user_type_info(id).unwrap();
        assert_eq!(info.name, "ComplexFloat32");
        assert_eq!(info.fields[1].name, "imag");
        assert_eq!(info.fields[1].offset, 4);
        assert_eq!(
            build_data_type(&engine, first, false).unwrap(),
            (complex, true)
        );
    }

    #[test]
    fn compound_type_round_trip() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let compound: ExtendedType = CompoundType::new(
            "point",
            24,
            vec![
                Component::new("id", 0, NumericType::Int32.into()),
                Component::new("value", 8, NumericType::ComplexFloat64.into()),
            ],
        )
        .unwrap()
        .into();
        let native = create_or_get_type(&mut engine, root, &compound).unwrap();
        assert_eq!(build_data_type(&engine, native, false).unwrap(), (compound, true));
    }

    #[test]
    fn compound_type_with_strings_round_trip() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let compound: ExtendedType = CompoundType::new(
            "observation",
            16,
            vec![
                Component::new("station", 0, ExtendedType::string()),
                Component::new("value", 8, NumericType::Float64.into()),
            ],
        )
        .unwrap()
        .into();
        let native = create_or_get_type(&mut engine, root, &compound).unwrap();
        let NativeType::User(id) = native else {
            panic!("expected a user-defined type")
        };
        assert_eq!(engine.user_type_info(id).unwrap().fields[0].field_type, NativeType::String);
        assert_eq!(build_data_type(&engine, native, false).unwrap(), (compound, true));
    }

    #[test]
    fn builtin_types() {
        let engine = MemoryEngine::new();
        assert_eq!(
            build_data_type(&engine, NativeType::Byte, false).unwrap(),
            (NumericType::Int16.into(), false)
        );
        assert_eq!(
            build_data_type(&engine, NativeType::Byte, true).unwrap(),
            (NumericType::UInt8.into(), true)
        );
        assert_eq!(
            build_data_type(&engine, NativeType::UInt64, false).unwrap(),
            (NumericType::Float64.into(), false)
        );
        assert_eq!(
            build_data_type(&engine, NativeType::Char, false).unwrap(),
            (ExtendedType::fixed_string(1), true)
        );
    }

    #[test]
    fn compound_with_imperfect_field_is_unsupported() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let id = engine.def_compound(root, "record", 16).unwrap();
        engine.insert_compound_field(id, "a", 0, NativeType::Int64).unwrap();
        assert!(matches!(
            build_data_type(&engine, NativeType::User(id), false),
            Err(DataTypeError::ImperfectField(_, _))
        ));
        let id = engine.def_compound(root, "letter", 1).unwrap();
        engine.insert_compound_field(id, "c", 0, NativeType::Char).unwrap();
        assert!(matches!(
            build_data_type(&engine, NativeType::User(id), false),
            Err(DataTypeError::ImperfectField(_, _))
        ));
    }

    #[test]
    fn native_repr_conversions() {
        let repr = NativeRepr::new(NativeType::Byte, false, &NumericType::Int16.into());
        assert_eq!(repr.native_size(), 1);
        assert_eq!(repr.scratch_size(), 2);
        let mut buffer = [0xfe, 0x00];
        repr.to_logical(&mut buffer);
        assert_eq!(i16::from_ne_bytes(buffer), -2);
        repr.to_native(&mut buffer);
        assert_eq!(buffer[0], 0xfe);

        let repr = NativeRepr::new(NativeType::UInt64, false, &NumericType::Float64.into());
        let mut buffer = (1u64 << 40).to_ne_bytes();
        repr.to_logical(&mut buffer);
        assert_eq!(f64::from_ne_bytes(buffer), 2f64.powi(40));
    }
}
