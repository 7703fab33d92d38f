//! Dimensions.
//!
//! A [`Dimension`] is a named axis of a fixed or unlimited size, defined in a group and visible from all of
//! its descendants.
//!
//! The semantic role of a dimension ([`DimensionType`] and [`DimensionDirection`]) is either set when it is
//! created or inferred once, on first request, from the CF metadata of its indexing variable.

use std::sync::Arc;

use derive_more::Display;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::Array,
    attribute::text_attribute,
    engine::{DimId, Engine, EngineError, GroupId, LogEngineError, NativeType, VarId},
    group::{child_full_name, group_full_name, renamed_full_name, resolve_variable},
    shared::SharedResources,
};

/// The semantic type of a dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionType {
    /// A horizontal axis along longitudes or projected eastings.
    #[display("HORIZONTAL_X")]
    HorizontalX,
    /// A horizontal axis along latitudes or projected northings.
    #[display("HORIZONTAL_Y")]
    HorizontalY,
    /// A vertical axis.
    #[display("VERTICAL")]
    Vertical,
    /// A time axis.
    #[display("TEMPORAL")]
    Temporal,
}

/// The direction of increasing indices of a dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DimensionDirection {
    /// East.
    #[display("EAST")]
    East,
    /// West.
    #[display("WEST")]
    West,
    /// North.
    #[display("NORTH")]
    North,
    /// South.
    #[display("SOUTH")]
    South,
    /// Up.
    #[display("UP")]
    Up,
    /// Down.
    #[display("DOWN")]
    Down,
    /// Future.
    #[display("FUTURE")]
    Future,
    /// Past.
    #[display("PAST")]
    Past,
}

/// A dimension error.
#[derive(Debug, Error)]
pub enum DimensionError {
    /// An engine error.
    #[error(transparent)]
    EngineError(#[from] EngineError),
    /// The container is read only.
    #[error("dimension {0} cannot be created or modified in a read only container")]
    ReadOnly(String),
    /// Virtual groups cannot hold new dimensions.
    #[error("dimension {0} cannot be created in a virtual group")]
    VirtualGroup(String),
}

type DimensionRole = (Option<DimensionType>, Option<DimensionDirection>);

/// A dimension.
#[derive(Debug)]
pub struct Dimension {
    shared: Arc<SharedResources>,
    gid: GroupId,
    dimid: DimId,
    name: String,
    full_name: String,
    size: u64,
    unlimited: bool,
    role: Mutex<Option<DimensionRole>>,
}

const DEGREES_EAST: [&str; 6] = [
    "degrees_east",
    "degree_east",
    "degree_E",
    "degrees_E",
    "degreeE",
    "degreesE",
];
const DEGREES_NORTH: [&str; 6] = [
    "degrees_north",
    "degree_north",
    "degree_N",
    "degrees_N",
    "degreeN",
    "degreesN",
];

/// Infer the role of the coordinate variable `varid` from its CF attributes.
pub(crate) fn infer_role(
    engine: &dyn Engine,
    gid: GroupId,
    varid: VarId,
    name: &str,
) -> DimensionRole {
    let attribute = |key: &str| text_attribute(engine, gid, varid, key);
    let standard_name = attribute("standard_name");
    let axis = attribute("axis");
    let units = attribute("units");
    let is = |value: &Option<String>, candidates: &[&str]| {
        value
            .as_deref()
            .is_some_and(|value| candidates.iter().any(|c| value.eq_ignore_ascii_case(c)))
    };

    let named = |names: &[&str]| standard_name.is_none() && names.contains(&name);
    if is(&standard_name, &["longitude", "projection_x_coordinate", "grid_longitude"])
        || is(&axis, &["X"])
        || is(&units, &DEGREES_EAST)
        || named(&["lon", "longitude"])
    {
        let east = is(&units, &["degrees_east"]);
        return (
            Some(DimensionType::HorizontalX),
            east.then_some(DimensionDirection::East),
        );
    }
    if is(&standard_name, &["latitude", "projection_y_coordinate", "grid_latitude"])
        || is(&axis, &["Y"])
        || is(&units, &DEGREES_NORTH)
        || named(&["lat", "latitude"])
    {
        let north = is(&units, &["degrees_north"]);
        return (
            Some(DimensionType::HorizontalY),
            north.then_some(DimensionDirection::North),
        );
    }
    let positive = attribute("positive");
    if positive.is_some()
        || is(&axis, &["Z"])
        || is(
            &standard_name,
            &["height", "depth", "altitude", "air_pressure", "atmosphere_sigma_coordinate"],
        )
    {
        let direction = match positive.as_deref() {
            Some(value) if value.eq_ignore_ascii_case("up") => Some(DimensionDirection::Up),
            Some(value) if value.eq_ignore_ascii_case("down") => Some(DimensionDirection::Down),
            _ => None,
        };
        return (Some(DimensionType::Vertical), direction);
    }
    if is(&standard_name, &["time"])
        || is(&axis, &["T"])
        || units.as_deref().is_some_and(|units| units.contains(" since "))
    {
        return (Some(DimensionType::Temporal), None);
    }
    (None, None)
}

/// Return the length of the text dimension of a fixed-width text variable, [`None`] for other variables.
///
/// A fixed-width text variable is a two-dimensional character variable whose trailing dimension has no
/// same-named variable.
pub(crate) fn fixed_text_length(
    engine: &dyn Engine,
    gid: GroupId,
    varid: VarId,
) -> Result<Option<u64>, EngineError> {
    if engine.var_type(gid, varid)? != NativeType::Char {
        return Ok(None);
    }
    let dims = engine.var_dims(gid, varid)?;
    let [_, text_dim] = dims.as_slice() else {
        return Ok(None);
    };
    let text_dim_name = engine.dim_name(*text_dim)?;
    if engine.var_by_name(gid, &text_dim_name)?.is_some() {
        return Ok(None);
    }
    Ok(Some(engine.dim_len(*text_dim)?).filter(|&len| len > 0))
}

/// Return the dimensions of a variable as seen by callers, omitting the text dimension of fixed-width text.
pub(crate) fn logical_dims(
    engine: &dyn Engine,
    gid: GroupId,
    varid: VarId,
) -> Result<Vec<DimId>, EngineError> {
    let mut dims = engine.var_dims(gid, varid)?;
    if fixed_text_length(engine, gid, varid)?.is_some() {
        dims.truncate(1);
    }
    Ok(dims)
}

pub(crate) fn tokenize(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

impl Dimension {
    /// Open dimension `dimid` as seen from group `from`.
    pub(crate) fn open(
        shared: Arc<SharedResources>,
        from: GroupId,
        dimid: DimId,
    ) -> Result<Self, EngineError> {
        let gid = shared.resolve_owning_group(from, dimid)?;
        let (name, group_name, size, unlimited) = shared
            .with_engine(|engine| -> Result<_, EngineError> {
                Ok((
                    engine.dim_name(dimid)?,
                    group_full_name(engine, gid)?,
                    engine.dim_len(dimid)?,
                    engine.dim_is_unlimited(dimid)?,
                ))
            })
            .log_engine_error("dimension")?;
        Ok(Self {
            full_name: child_full_name(&group_name, &name),
            shared,
            gid,
            dimid,
            name,
            size,
            unlimited,
            role: Mutex::new(None),
        })
    }

    /// Define a new dimension in group `gid`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        shared: Arc<SharedResources>,
        gid: GroupId,
        group_full_name: &str,
        name: &str,
        dimension_type: Option<DimensionType>,
        direction: Option<DimensionDirection>,
        size: u64,
        unlimited: bool,
    ) -> Result<Self, DimensionError> {
        if shared.is_read_only() {
            return Err(DimensionError::ReadOnly(name.to_string()));
        }
        let (dimid, unlimited) = {
            let _lock = shared.lock();
            shared.set_define_mode(true)?;
            shared
                .with_engine(|engine| -> Result<_, EngineError> {
                    let dimid = engine.def_dim(gid, name, size, unlimited)?;
                    Ok((dimid, engine.dim_is_unlimited(dimid)?))
                })
                .log_engine_error("def_dim")?
        };
        Ok(Self {
            shared,
            gid,
            dimid,
            name: name.to_string(),
            full_name: child_full_name(group_full_name, name),
            size: if unlimited { 0 } else { size },
            unlimited,
            role: Mutex::new(dimension_type.map(|dimension_type| (Some(dimension_type), direction))),
        })
    }

    /// The dimension name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dimension name prefixed by the full name of the group defining it.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The current size. The size of an unlimited dimension grows as data is written.
    #[must_use]
    pub fn size(&self) -> u64 {
        if self.unlimited {
            let _lock = self.shared.lock();
            self.shared
                .with_engine(|engine| engine.dim_len(self.dimid))
                .unwrap_or(self.size)
        } else {
            self.size
        }
    }

    /// Returns true if the dimension is unlimited.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    /// Rename the dimension. Every array over it sees the new name.
    ///
    /// # Errors
    /// Returns a [`DimensionError`] if the container is read only, or the name is invalid or already in use
    /// in the group defining the dimension.
    pub fn rename(&mut self, new_name: &str) -> Result<(), DimensionError> {
        if self.shared.is_read_only() {
            return Err(DimensionError::ReadOnly(self.full_name.clone()));
        }
        let _lock = self.shared.lock();
        self.shared.set_define_mode(true)?;
        self.shared
            .with_engine(|engine| engine.rename_dim(self.gid, self.dimid, new_name))
            .log_engine_error("rename_dim")?;
        self.shared.forget_dimension_owners();
        self.full_name = renamed_full_name(&self.full_name, &self.name, new_name);
        self.name = new_name.to_string();
        Ok(())
    }

    pub(crate) const fn dimid(&self) -> DimId {
        self.dimid
    }

    pub(crate) fn shared(&self) -> &Arc<SharedResources> {
        &self.shared
    }

    fn role(&self) -> DimensionRole {
        let mut role = self.role.lock();
        *role.get_or_insert_with(|| {
            self.indexing_variable()
                .map_or((None, None), |array| {
                    let (gid, varid) = array.ids();
                    self.shared
                        .with_engine(|engine| infer_role(engine, gid, varid, array.name()))
                })
        })
    }

    /// The semantic type of the dimension, [`None`] if unknown.
    #[must_use]
    pub fn dimension_type(&self) -> Option<DimensionType> {
        self.role().0
    }

    /// The direction of the dimension, [`None`] if unknown.
    #[must_use]
    pub fn direction(&self) -> Option<DimensionDirection> {
        self.role().1
    }

    /// Return the variable holding the coordinate values of the dimension, if any.
    ///
    /// This is the same-named one-dimensional variable of the group defining the dimension. Otherwise, the
    /// variables of that group are searched for a `coordinates` attribute naming one variable per dimension,
    /// and the name at the position of this dimension is resolved. Failing that, the only one-dimensional
    /// variable over this dimension is used.
    #[must_use]
    pub fn indexing_variable(&self) -> Option<Array> {
        let _lock = self.shared.lock();
        let found = self
            .shared
            .with_engine(|engine| self.find_indexing_variable(engine))
            .ok()
            .flatten()?;
        Array::open(self.shared.clone(), found.0, found.1).ok()
    }

    fn find_indexing_variable(
        &self,
        engine: &dyn Engine,
    ) -> Result<Option<(GroupId, VarId)>, EngineError> {
        if let Some(varid) = engine.var_by_name(self.gid, &self.name)? {
            let dims = engine.var_dims(self.gid, varid)?;
            let char_type = engine.var_type(self.gid, varid)? == NativeType::Char;
            if (dims.len() == 1 || (dims.len() == 2 && char_type)) && dims[0] == self.dimid {
                if dims.len() == 2 && engine.var_by_name(self.gid, &engine.dim_name(dims[1])?)?.is_some() {
                    return Ok(None);
                }
                return Ok(Some((self.gid, varid)));
            }
        }

        let mut candidate = None;
        for varid in engine.group_variables(self.gid)? {
            let dims = logical_dims(engine, self.gid, varid)?;
            if dims.is_empty() {
                continue;
            }
            if dims == [self.dimid] {
                if candidate.is_some() {
                    return Ok(None);
                }
                candidate = Some((self.gid, varid));
                continue;
            }
            let Some(coordinates) = text_attribute(engine, self.gid, varid, "coordinates") else {
                continue;
            };
            let coordinates = tokenize(&coordinates);
            if coordinates.len() != dims.len() {
                continue;
            }
            let Some(position) = dims.iter().position(|&dim| dim == self.dimid) else {
                continue;
            };
            let reversed = coordinates.len() > 1
                && resolve_variable(engine, self.gid, &coordinates[0]).is_some_and(
                    |(gid, first)| {
                        infer_role(engine, gid, first, &coordinates[0]).0
                            == Some(DimensionType::HorizontalX)
                    },
                );
            let index = if reversed {
                coordinates.len() - 1 - position
            } else {
                position
            };
            if let Some(found) = resolve_variable(engine, self.gid, &coordinates[index]) {
                return Ok(Some(found));
            }
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::ArrayCreateOptions,
        data_type::NumericType,
        engine::MemoryEngine,
        group::{ContainerOptions, Group},
    };

    fn text(engine: &mut MemoryEngine, varid: VarId, name: &str, value: &str) {
        engine
            .put_att(0, varid, name, NativeType::Char, value.len(), value.as_bytes())
            .unwrap();
    }

    #[test]
    fn dimension_role_markers() {
        let mut engine = MemoryEngine::new();
        let x = engine.def_dim(0, "x", 3, false).unwrap();
        let lon = engine.def_var(0, "lon", NativeType::Double, &[x]).unwrap();
        let lat = engine.def_var(0, "lat", NativeType::Double, &[x]).unwrap();
        let level = engine.def_var(0, "level", NativeType::Double, &[x]).unwrap();
        let time = engine.def_var(0, "t", NativeType::Double, &[x]).unwrap();
        let other = engine.def_var(0, "other", NativeType::Double, &[x]).unwrap();
        text(&mut engine, lon, "units", "degrees_east");
        text(&mut engine, lat, "standard_name", "latitude");
        text(&mut engine, level, "positive", "down");
        text(&mut engine, time, "units", "days since 2000-01-01");
        text(&mut engine, other, "units", "K");

        assert_eq!(
            infer_role(&engine, 0, lon, "lon"),
            (Some(DimensionType::HorizontalX), Some(DimensionDirection::East))
        );
        assert_eq!(
            infer_role(&engine, 0, lat, "lat"),
            (Some(DimensionType::HorizontalY), None)
        );
        assert_eq!(
            infer_role(&engine, 0, level, "level"),
            (Some(DimensionType::Vertical), Some(DimensionDirection::Down))
        );
        assert_eq!(
            infer_role(&engine, 0, time, "t"),
            (Some(DimensionType::Temporal), None)
        );
        assert_eq!(infer_role(&engine, 0, other, "other"), (None, None));
    }

    #[test]
    fn fixed_text_detection() {
        let mut engine = MemoryEngine::new();
        let n = engine.def_dim(0, "n", 2, false).unwrap();
        let len = engine.def_dim(0, "len", 8, false).unwrap();
        let names = engine.def_var(0, "names", NativeType::Char, &[n, len]).unwrap();
        assert_eq!(fixed_text_length(&engine, 0, names), Ok(Some(8)));
        assert_eq!(logical_dims(&engine, 0, names), Ok(vec![n]));
        engine.def_var(0, "len", NativeType::Int, &[len]).unwrap();
        assert_eq!(fixed_text_length(&engine, 0, names), Ok(None));
        assert_eq!(logical_dims(&engine, 0, names), Ok(vec![n, len]));
    }

    #[test]
    fn dimension_role_display() {
        assert_eq!(DimensionType::HorizontalX.to_string(), "HORIZONTAL_X");
        assert_eq!(
            serde_json::to_string(&DimensionDirection::North).unwrap(),
            "\"NORTH\""
        );
        assert_eq!(
            serde_json::from_str::<DimensionType>("\"TEMPORAL\"").unwrap(),
            DimensionType::Temporal
        );
    }

    #[test]
    fn dimension_rename() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let sub = root.create_group("sub").unwrap();
        let mut x = sub.create_dimension("x", None, None, 3, false).unwrap();
        sub.create_dimension("y", None, None, 2, false).unwrap();
        let array = sub
            .create_md_array("values", &[(&x).into()], &NumericType::Int32.into(), &ArrayCreateOptions::default())
            .unwrap();
        x.rename("station").unwrap();
        assert_eq!(x.name(), "station");
        assert_eq!(x.full_name(), "/sub/station");
        assert_eq!(array.dimensions().unwrap()[0].full_name(), "/sub/station");
        let names: Vec<_> = sub
            .dimensions()
            .unwrap()
            .iter()
            .map(|dimension| dimension.name().to_string())
            .collect();
        assert_eq!(names, ["station", "y"]);
        assert!(matches!(
            x.rename("y"),
            Err(DimensionError::EngineError(EngineError::NameInUse(_)))
        ));
        assert_eq!(x.name(), "station");
    }

    #[test]
    fn dimension_rename_read_only() {
        let mut engine = MemoryEngine::new();
        engine.def_dim(0, "x", 3, false).unwrap();
        let root = Group::open_root(Box::new(engine), &ContainerOptions::default().with_read_only(true));
        let mut x = root.dimensions().unwrap().remove(0);
        assert!(matches!(x.rename("y"), Err(DimensionError::ReadOnly(_))));
    }
}
