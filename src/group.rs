//! Groups.
//!
//! A [`Group`] is a namespace of a container holding dimensions, arrays, attributes and subgroups.
//! A container is entered through its root group, see [`Group::create_root`] and [`Group::open_root`].
//!
//! A group without subgroups can optionally expose *virtual* groups, one per dimension of its
//! one-dimensional arrays, see [`GroupNamesOptions::with_group_by_same_dimension`].

mod array_names_options;
mod group_names_options;

use std::{collections::HashSet, sync::Arc};

use thiserror::Error;

pub use self::{array_names_options::ArrayNamesOptions, group_names_options::GroupNamesOptions};

use crate::{
    array::{Array, ArrayCreateError, ArrayCreateOptions, ArrayError},
    attribute::{
        text_attribute, Attribute, AttributeCreateOptions, AttributeError, AttributesOptions,
    },
    data_type::ExtendedType,
    dimension::{logical_dims, Dimension, DimensionDirection, DimensionError, DimensionType},
    engine::{Engine, EngineError, GroupId, LogEngineError, VarId, GLOBAL},
    shared::SharedResources,
    spatial_ref::{CfGridMappingDecoder, SpatialRefDecoder},
};

/// A group error.
#[derive(Debug, Error)]
pub enum GroupError {
    /// An engine error.
    #[error(transparent)]
    EngineError(#[from] EngineError),
    /// An attribute error.
    #[error(transparent)]
    AttributeError(#[from] AttributeError),
    /// The container is read only.
    #[error("{0} cannot be created or modified in a read only container")]
    ReadOnly(String),
    /// Virtual groups cannot be modified.
    #[error("{0} cannot be created or modified in virtual group {1}")]
    VirtualGroup(String, String),
}

/// Options for opening a container.
#[derive(Clone, Debug)]
pub struct ContainerOptions {
    read_only: bool,
    spatial_ref_decoder: Arc<dyn SpatialRefDecoder>,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            spatial_ref_decoder: Arc::new(CfGridMappingDecoder),
        }
    }
}

impl ContainerOptions {
    /// Open the container read only.
    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Decode spatial references with `spatial_ref_decoder` rather than [`CfGridMappingDecoder`].
    #[must_use]
    pub fn with_spatial_ref_decoder(mut self, spatial_ref_decoder: Arc<dyn SpatialRefDecoder>) -> Self {
        self.spatial_ref_decoder = spatial_ref_decoder;
        self
    }

    /// Returns true if the container is opened read only.
    #[must_use]
    pub const fn read_only(&self) -> bool {
        self.read_only
    }
}

/// A dimension of a new array.
#[derive(Clone, Copy, Debug)]
pub enum ArrayDimension<'a> {
    /// An existing dimension.
    Dimension(&'a Dimension),
    /// A dimension found by name in the group or its ancestors, or defined in the group if not found.
    Named {
        /// The dimension name.
        name: &'a str,
        /// The dimension size.
        size: u64,
    },
}

impl<'a> From<&'a Dimension> for ArrayDimension<'a> {
    fn from(dimension: &'a Dimension) -> Self {
        Self::Dimension(dimension)
    }
}

#[derive(Clone, Debug)]
enum GroupKind {
    Real,
    Virtual { dimension: String },
}

/// A group.
#[derive(Clone, Debug)]
pub struct Group {
    shared: Arc<SharedResources>,
    gid: GroupId,
    name: String,
    full_name: String,
    kind: GroupKind,
}

/// Join a parent full name and a child name.
pub(crate) fn child_full_name(parent_full_name: &str, name: &str) -> String {
    if parent_full_name == "/" {
        format!("/{name}")
    } else {
        format!("{parent_full_name}/{name}")
    }
}

/// Replace the trailing `name` of `full_name` with `new_name`.
pub(crate) fn renamed_full_name(full_name: &str, name: &str, new_name: &str) -> String {
    let parent = full_name.strip_suffix(name).unwrap_or(full_name);
    format!("{parent}{new_name}")
}

/// Return the full name of group `gid`.
pub(crate) fn group_full_name(engine: &dyn Engine, gid: GroupId) -> Result<String, EngineError> {
    let mut names = Vec::new();
    let mut current = gid;
    while let Some(parent) = engine.group_parent(current)? {
        names.push(engine.group_name(current)?);
        current = parent;
    }
    names.reverse();
    Ok(format!("/{}", names.join("/")))
}

fn child_group(engine: &dyn Engine, gid: GroupId, name: &str) -> Result<Option<GroupId>, EngineError> {
    for child in engine.group_children(gid)? {
        if engine.group_name(child)? == name {
            return Ok(Some(child));
        }
    }
    Ok(None)
}

/// Resolve a variable name as seen from group `gid`.
///
/// Absolute names are resolved from the root group and relative names containing a `/` from `gid`. Plain
/// names are searched in `gid` and then its ancestors.
pub(crate) fn resolve_variable(
    engine: &dyn Engine,
    gid: GroupId,
    name: &str,
) -> Option<(GroupId, VarId)> {
    if let Some((path, var_name)) = name.rsplit_once('/') {
        let mut current = if name.starts_with('/') {
            engine.root_group()
        } else {
            gid
        };
        for group_name in path.split('/').filter(|part| !part.is_empty()) {
            current = child_group(engine, current, group_name).ok()??;
        }
        return engine
            .var_by_name(current, var_name)
            .ok()?
            .map(|varid| (current, varid));
    }
    let mut current = Some(gid);
    while let Some(group) = current {
        if let Ok(Some(varid)) = engine.var_by_name(group, name) {
            return Some((group, varid));
        }
        current = engine.group_parent(group).ok()?;
    }
    None
}

/// List the arrays of group `gid` passing the filters of `options`.
fn filtered_array_names(
    engine: &dyn Engine,
    gid: GroupId,
    options: &ArrayNamesOptions,
) -> Result<Vec<String>, EngineError> {
    let variables = engine.group_variables(gid)?;
    let mut ignored = HashSet::new();
    for &varid in &variables {
        if !options.show_coordinates() {
            if let Some(coordinates) = text_attribute(engine, gid, varid, "coordinates") {
                ignored.extend(coordinates.split_whitespace().map(str::to_string));
            }
        }
        if !options.show_bounds() {
            if let Some(bounds) = text_attribute(engine, gid, varid, "bounds") {
                if !bounds.is_empty() {
                    ignored.insert(bounds);
                }
            }
        }
    }

    let mut names = Vec::with_capacity(variables.len());
    for varid in variables {
        let name = engine.var_name(gid, varid)?;
        let dims = logical_dims(engine, gid, varid)?;
        if dims.is_empty() && !options.show_zero_dim() {
            continue;
        }
        if dims.len() == 1 {
            if options.group_by_same_dimension() {
                continue;
            }
            if !options.show_indexing() && engine.dim_name(dims[0])? == name {
                continue;
            }
        }
        if !options.show_time()
            && text_attribute(engine, gid, varid, "standard_name").as_deref() == Some("time")
        {
            continue;
        }
        if ignored.contains(&name) {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

/// Return the dimension name of each one-dimensional array, without duplicates.
fn same_dimension_group_names(engine: &dyn Engine, gid: GroupId) -> Result<Vec<String>, EngineError> {
    let mut names: Vec<String> = Vec::new();
    let show_all = ArrayNamesOptions::default().with_show_all(true);
    for name in filtered_array_names(engine, gid, &show_all)? {
        let Some(varid) = engine.var_by_name(gid, &name)? else {
            continue;
        };
        if let [dim] = logical_dims(engine, gid, varid)?.as_slice() {
            let dim_name = engine.dim_name(*dim)?;
            if !names.contains(&dim_name) {
                names.push(dim_name);
            }
        }
    }
    Ok(names)
}

impl Group {
    fn root(shared: Arc<SharedResources>) -> Self {
        let gid = shared.with_engine(|engine| engine.root_group());
        Self {
            shared,
            gid,
            name: "/".to_string(),
            full_name: "/".to_string(),
            kind: GroupKind::Real,
        }
    }

    /// Create a new writable container backed by `engine` and return its root group.
    #[must_use]
    pub fn create_root(engine: Box<dyn Engine>) -> Self {
        Self::open_root(engine, &ContainerOptions::default())
    }

    /// Open a container backed by `engine` and return its root group.
    ///
    /// A read only container is switched to data mode once and rejects every modification.
    #[must_use]
    pub fn open_root(engine: Box<dyn Engine>, options: &ContainerOptions) -> Self {
        Self::root(SharedResources::new(
            engine,
            options.read_only,
            options.spatial_ref_decoder.clone(),
        ))
    }

    /// The group name, `/` for the root group.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The group name prefixed by the names of its ancestors.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns true if the group is a virtual group of the arrays over one dimension.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        matches!(self.kind, GroupKind::Virtual { .. })
    }

    /// The resources shared by every object of the container.
    #[must_use]
    pub fn shared_resources(&self) -> &Arc<SharedResources> {
        &self.shared
    }

    fn require_real(&self, what: &str) -> Result<(), GroupError> {
        if self.is_virtual() {
            Err(GroupError::VirtualGroup(what.to_string(), self.full_name.clone()))
        } else {
            Ok(())
        }
    }

    /// List the names of the subgroups.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails.
    pub fn group_names(&self, options: &GroupNamesOptions) -> Result<Vec<String>, EngineError> {
        if self.is_virtual() {
            return Ok(Vec::new());
        }
        let _lock = self.shared.lock();
        self.shared
            .with_engine(|engine| -> Result<_, EngineError> {
                let children = engine.group_children(self.gid)?;
                if children.is_empty() && options.group_by_same_dimension() {
                    return same_dimension_group_names(engine, self.gid);
                }
                children
                    .into_iter()
                    .map(|child| engine.group_name(child))
                    .collect()
            })
            .log_engine_error("group_names")
    }

    /// Open the subgroup `name`, [`None`] if it does not exist.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails.
    pub fn open_group(
        &self,
        name: &str,
        options: &GroupNamesOptions,
    ) -> Result<Option<Self>, EngineError> {
        if self.is_virtual() {
            return Ok(None);
        }
        let _lock = self.shared.lock();
        let found = self
            .shared
            .with_engine(|engine| -> Result<_, EngineError> {
                if let Some(child) = child_group(engine, self.gid, name)? {
                    return Ok(Some((GroupKind::Real, child)));
                }
                if options.group_by_same_dimension()
                    && engine.group_children(self.gid)?.is_empty()
                    && same_dimension_group_names(engine, self.gid)?.iter().any(|n| n == name)
                {
                    let kind = GroupKind::Virtual {
                        dimension: name.to_string(),
                    };
                    return Ok(Some((kind, self.gid)));
                }
                Ok(None)
            })
            .log_engine_error("open_group")?;
        Ok(found.map(|(kind, gid)| Self {
            shared: self.shared.clone(),
            gid,
            name: name.to_string(),
            full_name: child_full_name(&self.full_name, name),
            kind,
        }))
    }

    /// Create the subgroup `name`.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if the group is virtual, the container is read only, or the name is invalid
    /// or already in use.
    pub fn create_group(&self, name: &str) -> Result<Self, GroupError> {
        self.require_real(name)?;
        if self.shared.is_read_only() {
            return Err(GroupError::ReadOnly(name.to_string()));
        }
        let _lock = self.shared.lock();
        self.shared.set_define_mode(true)?;
        let gid = self
            .shared
            .with_engine(|engine| engine.def_group(self.gid, name))
            .log_engine_error("def_group")?;
        Ok(Self {
            shared: self.shared.clone(),
            gid,
            name: name.to_string(),
            full_name: child_full_name(&self.full_name, name),
            kind: GroupKind::Real,
        })
    }

    /// Return the dimensions defined in the group.
    ///
    /// A virtual group returns the dimension it is named after.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails.
    pub fn dimensions(&self) -> Result<Vec<Dimension>, EngineError> {
        let _lock = self.shared.lock();
        let dims = self
            .shared
            .with_engine(|engine| -> Result<_, EngineError> {
                match &self.kind {
                    GroupKind::Real => engine.group_dimensions(self.gid),
                    GroupKind::Virtual { dimension } => Ok(engine
                        .dim_by_name(self.gid, dimension)?
                        .into_iter()
                        .collect()),
                }
            })
            .log_engine_error("group_dimensions")?;
        dims.into_iter()
            .map(|dimid| Dimension::open(self.shared.clone(), self.gid, dimid))
            .collect()
    }

    /// Define a new dimension in the group.
    ///
    /// `dimension_type` and `direction` set the role of the dimension rather than inferring it from its
    /// indexing variable.
    ///
    /// # Errors
    /// Returns a [`DimensionError`] if the group is virtual, the container is read only, or the engine rejects
    /// the name or size.
    pub fn create_dimension(
        &self,
        name: &str,
        dimension_type: Option<DimensionType>,
        direction: Option<DimensionDirection>,
        size: u64,
        unlimited: bool,
    ) -> Result<Dimension, DimensionError> {
        if self.is_virtual() {
            return Err(DimensionError::VirtualGroup(name.to_string()));
        }
        Dimension::create(
            self.shared.clone(),
            self.gid,
            &self.full_name,
            name,
            dimension_type,
            direction,
            size,
            unlimited,
        )
    }

    /// List the names of the arrays of the group passing the filters of `options`.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails.
    pub fn md_array_names(&self, options: &ArrayNamesOptions) -> Result<Vec<String>, EngineError> {
        let _lock = self.shared.lock();
        self.shared
            .with_engine(|engine| -> Result<_, EngineError> {
                let GroupKind::Virtual { dimension } = &self.kind else {
                    return filtered_array_names(engine, self.gid, options);
                };
                let mut names = Vec::new();
                for name in filtered_array_names(engine, self.gid, &ArrayNamesOptions::default())? {
                    let Some(varid) = engine.var_by_name(self.gid, &name)? else {
                        continue;
                    };
                    if let [dim] = logical_dims(engine, self.gid, varid)?.as_slice() {
                        if engine.dim_name(*dim)? == *dimension {
                            names.push(name);
                        }
                    }
                }
                Ok(names)
            })
            .log_engine_error("md_array_names")
    }

    /// Open the array `name`, [`None`] if it does not exist.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the engine fails.
    pub fn open_md_array(&self, name: &str) -> Result<Option<Array>, ArrayError> {
        let _lock = self.shared.lock();
        let varid = self
            .shared
            .with_engine(|engine| engine.var_by_name(self.gid, name))
            .log_engine_error("var_by_name")?;
        varid
            .map(|varid| Array::open(self.shared.clone(), self.gid, varid))
            .transpose()
    }

    /// Create a new array `name` over `dimensions`.
    ///
    /// Named dimensions reuse a visible dimension of the same name, or are defined in the group.
    ///
    /// # Errors
    /// Returns an [`ArrayCreateError`] if the group is virtual, the container is read only, an option is
    /// invalid, the data type cannot be registered or the engine fails.
    pub fn create_md_array(
        &self,
        name: &str,
        dimensions: &[ArrayDimension<'_>],
        data_type: &ExtendedType,
        options: &ArrayCreateOptions,
    ) -> Result<Array, ArrayCreateError> {
        if self.is_virtual() {
            return Err(ArrayCreateError::VirtualGroup(name.to_string()));
        }
        Array::create(
            self.shared.clone(),
            self.gid,
            &self.full_name,
            name,
            dimensions,
            data_type,
            options,
        )
    }

    /// Open the group attribute `name`, [`None`] if it does not exist.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the engine fails.
    pub fn attribute(&self, name: &str) -> Result<Option<Attribute>, AttributeError> {
        if self.is_virtual() {
            return Ok(None);
        }
        let _lock = self.shared.lock();
        Attribute::open(self.shared.clone(), self.gid, GLOBAL, &self.full_name, name)
    }

    /// Return the group attributes. The `_NCProperties` provenance attribute is hidden unless requested.
    ///
    /// # Errors
    /// Returns an [`AttributeError`] if the engine fails.
    pub fn attributes(&self, options: &AttributesOptions) -> Result<Vec<Attribute>, AttributeError> {
        if self.is_virtual() {
            return Ok(Vec::new());
        }
        let _lock = self.shared.lock();
        let names = self
            .shared
            .with_engine(|engine| engine.attribute_names(self.gid, GLOBAL))
            .log_engine_error("attribute_names")?;
        let mut attributes = Vec::with_capacity(names.len());
        for name in names {
            if name == "_NCProperties" && !options.show_all() {
                continue;
            }
            if let Some(attribute) = self.attribute(&name)? {
                attributes.push(attribute);
            }
        }
        Ok(attributes)
    }

    /// Create a new group attribute. Its value is stored by the first write.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if the group is virtual, the container is read only, the attribute has more
    /// than one dimension or its data type cannot be registered.
    pub fn create_attribute(
        &self,
        name: &str,
        dimensions: &[u64],
        data_type: &ExtendedType,
        options: &AttributeCreateOptions,
    ) -> Result<Attribute, GroupError> {
        self.require_real(name)?;
        Ok(Attribute::create(
            self.shared.clone(),
            self.gid,
            GLOBAL,
            &self.full_name,
            name,
            dimensions,
            data_type,
            options,
        )?)
    }

    /// Delete the group attribute `name`.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if the group is virtual, the container is read only or the attribute does not
    /// exist.
    pub fn delete_attribute(&self, name: &str) -> Result<(), GroupError> {
        self.require_real(name)?;
        if self.shared.is_read_only() {
            return Err(GroupError::ReadOnly(name.to_string()));
        }
        let _lock = self.shared.lock();
        self.shared.set_define_mode(true)?;
        self.shared
            .with_engine(|engine| engine.del_att(self.gid, GLOBAL, name))
            .log_engine_error("del_att")?;
        Ok(())
    }

    /// Rename the group.
    ///
    /// Handles opened before the rename keep reporting full names under the old name.
    ///
    /// # Errors
    /// Returns a [`GroupError`] if the group is virtual or the root group, the container is read only, or the
    /// name is invalid or already in use by a sibling.
    pub fn rename(&mut self, new_name: &str) -> Result<(), GroupError> {
        self.require_real(new_name)?;
        if self.shared.is_read_only() {
            return Err(GroupError::ReadOnly(self.full_name.clone()));
        }
        let _lock = self.shared.lock();
        self.shared.set_define_mode(true)?;
        self.shared
            .with_engine(|engine| engine.rename_group(self.gid, new_name))
            .log_engine_error("rename_group")?;
        self.shared.forget_dimension_owners();
        self.full_name = renamed_full_name(&self.full_name, &self.name, new_name);
        self.name = new_name.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data_type::NumericType, engine::MemoryEngine};

    #[test]
    fn group_full_names() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        assert_eq!(root.full_name(), "/");
        let a = root.create_group("a").unwrap();
        let b = a.create_group("b").unwrap();
        assert_eq!(b.full_name(), "/a/b");
        assert_eq!(b.name(), "b");
        assert_eq!(root.group_names(&GroupNamesOptions::default()).unwrap(), ["a"]);
        let opened = root
            .open_group("a", &GroupNamesOptions::default())
            .unwrap()
            .unwrap();
        assert!(!opened.is_virtual());
        assert!(root
            .open_group("missing", &GroupNamesOptions::default())
            .unwrap()
            .is_none());
        assert!(matches!(
            root.create_group("a"),
            Err(GroupError::EngineError(EngineError::NameInUse(_)))
        ));
        let full_name = root
            .shared_resources()
            .with_engine(|engine| group_full_name(engine, 2))
            .unwrap();
        assert_eq!(full_name, "/a/b");
    }

    #[test]
    fn variable_resolution() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let sub = root.create_group("sub").unwrap();
        let float32: ExtendedType = NumericType::Float32.into();
        root.create_md_array("lat", &[], &float32, &ArrayCreateOptions::default())
            .unwrap();
        sub.create_md_array("lon", &[], &float32, &ArrayCreateOptions::default())
            .unwrap();
        root.shared_resources().with_engine(|engine| {
            assert_eq!(resolve_variable(engine, 1, "lat"), Some((0, 0)));
            assert_eq!(resolve_variable(engine, 1, "lon"), Some((1, 0)));
            assert_eq!(resolve_variable(engine, 0, "/sub/lon"), Some((1, 0)));
            assert_eq!(resolve_variable(engine, 0, "sub/lon"), Some((1, 0)));
            assert_eq!(resolve_variable(engine, 0, "lon"), None);
        });
    }

    #[test]
    fn group_attributes_hide_provenance() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        for name in ["_NCProperties", "title"] {
            root.create_attribute(name, &[], &ExtendedType::string(), &AttributeCreateOptions::default())
                .unwrap()
                .write_string("value")
                .unwrap();
        }
        let names = |options: &AttributesOptions| -> Vec<String> {
            root.attributes(options)
                .unwrap()
                .iter()
                .map(|attribute| attribute.name().to_string())
                .collect()
        };
        assert_eq!(names(&AttributesOptions::default()), ["title"]);
        assert_eq!(
            names(&AttributesOptions::default().with_show_all(true)),
            ["_NCProperties", "title"]
        );
        root.delete_attribute("title").unwrap();
        assert!(root.attribute("title").unwrap().is_none());
        assert!(root.delete_attribute("title").is_err());
    }

    #[test]
    fn group_rename() {
        let mut root = Group::create_root(Box::new(MemoryEngine::new()));
        let mut sub = root.create_group("sub").unwrap();
        let mut nested = sub.create_group("nested").unwrap();
        root.create_group("other").unwrap();
        sub.rename("renamed").unwrap();
        assert_eq!(sub.name(), "renamed");
        assert_eq!(sub.full_name(), "/renamed");
        assert_eq!(root.group_names(&GroupNamesOptions::default()).unwrap(), ["renamed", "other"]);
        assert!(root.open_group("sub", &GroupNamesOptions::default()).unwrap().is_none());
        let reopened = root
            .open_group("renamed", &GroupNamesOptions::default())
            .unwrap()
            .unwrap()
            .open_group("nested", &GroupNamesOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(reopened.full_name(), "/renamed/nested");

        assert!(matches!(sub.rename("other"), Err(GroupError::EngineError(EngineError::NameInUse(_)))));
        assert!(root.rename("top").is_err());
        nested.rename("inner").unwrap();
        assert_eq!(nested.full_name(), "/sub/inner");
    }
}
