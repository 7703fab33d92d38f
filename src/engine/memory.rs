//! An in-memory engine.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use itertools::Itertools;

use super::{
    imap_in_elements, CompoundField, DimId, Engine, EngineError, GroupId, NativeType, Record,
    UserTypeClass, UserTypeId, UserTypeInfo, VarId, GLOBAL, STRING_SLOT_SIZE,
};

/// Counters shared between a [`MemoryEngine`] and its creator.
///
/// The engine is usually moved into a container, so these counters are the only way to observe how it was
/// driven afterwards.
#[derive(Debug, Default)]
pub struct MemoryEngineStats {
    mode_switches: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryEngineStats {
    /// The number of successful define/data mode switches.
    #[must_use]
    pub fn mode_switches(&self) -> usize {
        self.mode_switches.load(Ordering::Relaxed)
    }

    /// The number of times the engine was closed.
    #[must_use]
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
enum Element {
    Fixed(Vec<u8>),
    Text(Option<String>),
    Record(Record),
}

#[derive(Debug, Clone)]
enum AttValue {
    Bytes { len: usize, data: Vec<u8> },
    Strings(Vec<Option<String>>),
    Records(Vec<Record>),
}

#[derive(Debug, Clone)]
struct AttNode {
    name: String,
    native_type: NativeType,
    value: AttValue,
}

#[derive(Debug)]
struct VarNode {
    name: String,
    native_type: NativeType,
    dims: Vec<DimId>,
    attributes: Vec<AttNode>,
    chunking: Option<Vec<usize>>,
    deflate: Option<u32>,
    fletcher32: bool,
    fill: Option<Vec<u8>>,
    data: BTreeMap<Vec<u64>, Element>,
}

#[derive(Debug)]
struct GroupNode {
    name: String,
    parent: Option<GroupId>,
    children: Vec<GroupId>,
    dims: Vec<DimId>,
    vars: Vec<VarNode>,
    attributes: Vec<AttNode>,
    types: Vec<UserTypeId>,
}

impl GroupNode {
    fn new(name: &str, parent: Option<GroupId>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            dims: Vec::new(),
            vars: Vec::new(),
            attributes: Vec::new(),
            types: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct DimNode {
    name: String,
    group: GroupId,
    len: u64,
    unlimited: bool,
}

/// An in-memory engine.
///
/// A new engine holds an empty root group and starts in define mode, like a freshly created file.
/// Variable data is stored sparsely; elements that were never written read back as the `_FillValue`
/// attribute, the fill value set with [`Engine::def_var_fill`], or zero, in that order of preference.
#[derive(Debug)]
pub struct MemoryEngine {
    version: String,
    define_mode: bool,
    closed: bool,
    groups: Vec<GroupNode>,
    dims: Vec<DimNode>,
    types: Vec<(GroupId, UserTypeInfo)>,
    stats: Arc<MemoryEngineStats>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn index_of(id: i32) -> Result<usize, EngineError> {
    usize::try_from(id).map_err(|_| EngineError::BadId)
}

fn id_of(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.is_empty() || name.contains('/') || name.starts_with(char::is_whitespace) {
        Err(EngineError::BadName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Visit every index of a `count` shaped region in row-major order.
fn for_each_position(
    count: &[usize],
    mut f: impl FnMut(&[usize]) -> Result<(), EngineError>,
) -> Result<(), EngineError> {
    if count.is_empty() {
        f(&[])
    } else {
        count
            .iter()
            .map(|&c| 0..c)
            .multi_cartesian_product()
            .try_for_each(|position| f(&position))
    }
}

impl MemoryEngine {
    /// Create a new in-memory engine reporting the library version `4.9.2`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: "4.9.2".to_string(),
            define_mode: true,
            closed: false,
            groups: vec![GroupNode::new("/", None)],
            dims: Vec::new(),
            types: Vec::new(),
            stats: Arc::default(),
        }
    }

    /// Set the reported library version.
    ///
    /// Versions before `4.4` interpret `imap` strides in bytes, see [`Engine::get_varm`].
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Return the counters of this engine.
    #[must_use]
    pub fn stats(&self) -> Arc<MemoryEngineStats> {
        self.stats.clone()
    }

    fn check_open(&self) -> Result<(), EngineError> {
        if self.closed {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn require_define_mode(&self) -> Result<(), EngineError> {
        self.check_open()?;
        if self.define_mode {
            Ok(())
        } else {
            Err(EngineError::NotInDefineMode)
        }
    }

    fn require_data_mode(&self) -> Result<(), EngineError> {
        self.check_open()?;
        if self.define_mode {
            Err(EngineError::InDefineMode)
        } else {
            Ok(())
        }
    }

    fn group(&self, gid: GroupId) -> Result<&GroupNode, EngineError> {
        self.check_open()?;
        self.groups.get(index_of(gid)?).ok_or(EngineError::BadId)
    }

    fn group_mut(&mut self, gid: GroupId) -> Result<&mut GroupNode, EngineError> {
        self.check_open()?;
        self.groups
            .get_mut(index_of(gid)?)
            .ok_or(EngineError::BadId)
    }

    fn dim(&self, dim: DimId) -> Result<&DimNode, EngineError> {
        self.check_open()?;
        usize::try_from(dim)
            .ok()
            .and_then(|index| self.dims.get(index))
            .ok_or(EngineError::BadDimension)
    }

    fn var(&self, gid: GroupId, varid: VarId) -> Result<&VarNode, EngineError> {
        let group = self.group(gid)?;
        usize::try_from(varid)
            .ok()
            .and_then(|index| group.vars.get(index))
            .ok_or(EngineError::VariableNotFound)
    }

    fn var_mut(&mut self, gid: GroupId, varid: VarId) -> Result<&mut VarNode, EngineError> {
        let group = self.group_mut(gid)?;
        usize::try_from(varid)
            .ok()
            .and_then(|index| group.vars.get_mut(index))
            .ok_or(EngineError::VariableNotFound)
    }

    fn attributes(&self, gid: GroupId, varid: VarId) -> Result<&Vec<AttNode>, EngineError> {
        if varid == GLOBAL {
            Ok(&self.group(gid)?.attributes)
        } else {
            Ok(&self.var(gid, varid)?.attributes)
        }
    }

    fn attributes_mut(
        &mut self,
        gid: GroupId,
        varid: VarId,
    ) -> Result<&mut Vec<AttNode>, EngineError> {
        if varid == GLOBAL {
            Ok(&mut self.group_mut(gid)?.attributes)
        } else {
            Ok(&mut self.var_mut(gid, varid)?.attributes)
        }
    }

    fn ancestors(&self, gid: GroupId) -> Result<Vec<GroupId>, EngineError> {
        let mut chain = vec![gid];
        let mut current = self.group(gid)?.parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.group(parent)?.parent;
        }
        Ok(chain)
    }

    fn fixed_element_size(&self, native_type: NativeType) -> Result<usize, EngineError> {
        if native_type == NativeType::String || self.string_slots(native_type)? > 0 {
            return Err(EngineError::BadType);
        }
        self.type_size(native_type)
    }

    /// The number of string fields of a value, nested compound fields included.
    fn string_slots(&self, native_type: NativeType) -> Result<usize, EngineError> {
        match native_type {
            NativeType::String => Ok(1),
            NativeType::User(id) => {
                let info = self.user_type_info(id)?;
                if info.class != UserTypeClass::Compound {
                    return Ok(0);
                }
                info.fields
                    .iter()
                    .map(|field| self.string_slots(field.field_type))
                    .sum()
            }
            _ => Ok(0),
        }
    }

    /// The size and number of string fields of a compound type with string fields.
    fn record_layout(&self, native_type: NativeType) -> Result<(usize, usize), EngineError> {
        let NativeType::User(_) = native_type else {
            return Err(EngineError::BadType);
        };
        match self.string_slots(native_type)? {
            0 => Err(EngineError::BadType),
            slots => Ok((self.type_size(native_type)?, slots)),
        }
    }

    fn check_record(layout: (usize, usize), record: &Record) -> Result<(), EngineError> {
        let (size, slots) = layout;
        if record.bytes().len() == size && record.strings().len() == slots {
            Ok(())
        } else {
            Err(EngineError::InvalidArgument(format!(
                "record of {} bytes and {} strings, expected {size} and {slots}",
                record.bytes().len(),
                record.strings().len()
            )))
        }
    }

    fn var_shape(&self, var: &VarNode) -> Result<Vec<(u64, bool)>, EngineError> {
        var.dims
            .iter()
            .map(|&dim| {
                let dim = self.dim(dim)?;
                Ok((dim.len, dim.unlimited))
            })
            .collect()
    }

    fn fill_element(var: &VarNode, size: usize) -> Vec<u8> {
        let from_attribute = var.attributes.iter().find_map(|att| match &att.value {
            AttValue::Bytes { len: 1, data }
                if att.name == "_FillValue" && att.native_type == var.native_type =>
            {
                Some(data.clone())
            }
            _ => None,
        });
        from_attribute
            .or_else(|| var.fill.clone())
            .filter(|fill| fill.len() == size)
            .unwrap_or_else(|| vec![0; size])
    }

    /// Check that `index` addresses an element of a variable with `shape`.
    fn check_index(shape: &[(u64, bool)], index: &[u64], write: bool) -> Result<(), EngineError> {
        if index.len() != shape.len() {
            return Err(EngineError::InvalidArgument(format!(
                "index {index:?} does not match rank {}",
                shape.len()
            )));
        }
        for (&i, &(len, unlimited)) in std::iter::zip(index, shape) {
            if i >= len && !(write && unlimited) {
                return Err(EngineError::InvalidCoordinates);
            }
        }
        Ok(())
    }

    /// Check that a strided hyperslab lies within a variable with `shape`.
    fn check_region(
        shape: &[(u64, bool)],
        start: &[u64],
        count: &[usize],
        stride: &[usize],
        write: bool,
    ) -> Result<(), EngineError> {
        if start.len() != shape.len() || count.len() != shape.len() || stride.len() != shape.len()
        {
            return Err(EngineError::InvalidArgument(format!(
                "start {start:?} count {count:?} does not match rank {}",
                shape.len()
            )));
        }
        for (((&start, &count), &stride), &(len, unlimited)) in
            start.iter().zip(count).zip(stride).zip(shape)
        {
            if stride == 0 {
                return Err(EngineError::BadStride);
            }
            if write && unlimited {
                continue;
            }
            if start > len {
                return Err(EngineError::InvalidCoordinates);
            }
            if count > 0 && start + (count as u64 - 1) * stride as u64 >= len {
                return Err(EngineError::EdgeExceeded);
            }
        }
        Ok(())
    }

    fn grow_unlimited(&mut self, dims: &[DimId], last_index: &[u64]) {
        for (&dim, &index) in std::iter::zip(dims, last_index) {
            if let Some(dim) = usize::try_from(dim).ok().and_then(|i| self.dims.get_mut(i)) {
                if dim.unlimited {
                    dim.len = dim.len.max(index + 1);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read_mapped(
        &self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        stride: &[usize],
        offset_of: impl Fn(&[usize], usize) -> usize,
        out: &mut [u8],
    ) -> Result<(), EngineError> {
        self.require_data_mode()?;
        let var = self.var(gid, varid)?;
        let size = self.fixed_element_size(var.native_type)?;
        let shape = self.var_shape(var)?;
        Self::check_region(&shape, start, count, stride, false)?;
        for_each_position(count, |position| {
            let index: Vec<u64> = itertools::izip!(start, position, stride)
                .map(|(&start, &i, &stride)| start + (i * stride) as u64)
                .collect();
            let offset = offset_of(position, size);
            let dst = out
                .get_mut(offset..offset + size)
                .ok_or_else(|| EngineError::InvalidArgument("buffer too small".to_string()))?;
            match var.data.get(&index) {
                Some(Element::Fixed(bytes)) => dst.copy_from_slice(bytes),
                _ => dst.copy_from_slice(&Self::fill_element(var, size)),
            }
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn write_mapped(
        &mut self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        stride: &[usize],
        offset_of: impl Fn(&[usize], usize) -> usize,
        data: &[u8],
    ) -> Result<(), EngineError> {
        self.require_data_mode()?;
        let var = self.var(gid, varid)?;
        let size = self.fixed_element_size(var.native_type)?;
        let shape = self.var_shape(var)?;
        let dims = var.dims.clone();
        Self::check_region(&shape, start, count, stride, true)?;
        let mut elements = Vec::new();
        for_each_position(count, |position| {
            let index: Vec<u64> = itertools::izip!(start, position, stride)
                .map(|(&start, &i, &stride)| start + (i * stride) as u64)
                .collect();
            let offset = offset_of(position, size);
            let src = data
                .get(offset..offset + size)
                .ok_or_else(|| EngineError::InvalidArgument("buffer too small".to_string()))?;
            elements.push((index, Element::Fixed(src.to_vec())));
            Ok(())
        })?;
        if count.iter().all(|&c| c > 0) {
            let last: Vec<u64> = itertools::izip!(start, count, stride)
                .map(|(&start, &count, &stride)| start + ((count - 1) * stride) as u64)
                .collect();
            self.grow_unlimited(&dims, &last);
        }
        self.var_mut(gid, varid)?.data.extend(elements);
        Ok(())
    }
}

impl Engine for MemoryEngine {
    fn library_version(&self) -> String {
        self.version.clone()
    }

    fn in_define_mode(&self) -> bool {
        self.define_mode
    }

    fn redef(&mut self) -> Result<(), EngineError> {
        self.check_open()?;
        if self.define_mode {
            return Err(EngineError::InDefineMode);
        }
        self.define_mode = true;
        self.stats.mode_switches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn enddef(&mut self) -> Result<(), EngineError> {
        self.require_define_mode()?;
        self.define_mode = false;
        self.stats.mode_switches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.check_open()?;
        self.closed = true;
        self.stats.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn root_group(&self) -> GroupId {
        0
    }

    fn group_name(&self, gid: GroupId) -> Result<String, EngineError> {
        Ok(self.group(gid)?.name.clone())
    }

    fn group_parent(&self, gid: GroupId) -> Result<Option<GroupId>, EngineError> {
        Ok(self.group(gid)?.parent)
    }

    fn group_children(&self, gid: GroupId) -> Result<Vec<GroupId>, EngineError> {
        Ok(self.group(gid)?.children.clone())
    }

    fn def_group(&mut self, parent: GroupId, name: &str) -> Result<GroupId, EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        let siblings = self.group(parent)?.children.clone();
        for sibling in siblings {
            if self.group(sibling)?.name == name {
                return Err(EngineError::NameInUse(name.to_string()));
            }
        }
        let gid = id_of(self.groups.len());
        self.groups.push(GroupNode::new(name, Some(parent)));
        self.group_mut(parent)?.children.push(gid);
        Ok(gid)
    }

    fn rename_group(&mut self, gid: GroupId, name: &str) -> Result<(), EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        let parent = self
            .group(gid)?
            .parent
            .ok_or_else(|| EngineError::InvalidArgument("the root group cannot be renamed".to_string()))?;
        for sibling in self.group(parent)?.children.clone() {
            if sibling != gid && self.group(sibling)?.name == name {
                return Err(EngineError::NameInUse(name.to_string()));
            }
        }
        self.group_mut(gid)?.name = name.to_string();
        Ok(())
    }

    fn group_dimensions(&self, gid: GroupId) -> Result<Vec<DimId>, EngineError> {
        Ok(self.group(gid)?.dims.clone())
    }

    fn dim_by_name(&self, gid: GroupId, name: &str) -> Result<Option<DimId>, EngineError> {
        for group in self.ancestors(gid)? {
            for &dim in &self.group(group)?.dims {
                if self.dim(dim)?.name == name {
                    return Ok(Some(dim));
                }
            }
        }
        Ok(None)
    }

    fn dim_name(&self, dim: DimId) -> Result<String, EngineError> {
        Ok(self.dim(dim)?.name.clone())
    }

    fn dim_len(&self, dim: DimId) -> Result<u64, EngineError> {
        Ok(self.dim(dim)?.len)
    }

    fn dim_is_unlimited(&self, dim: DimId) -> Result<bool, EngineError> {
        Ok(self.dim(dim)?.unlimited)
    }

    fn def_dim(
        &mut self,
        gid: GroupId,
        name: &str,
        len: u64,
        unlimited: bool,
    ) -> Result<DimId, EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        for &dim in &self.group(gid)?.dims {
            if self.dim(dim)?.name == name {
                return Err(EngineError::NameInUse(name.to_string()));
            }
        }
        let unlimited = unlimited || len == 0;
        let dim = id_of(self.dims.len());
        self.dims.push(DimNode {
            name: name.to_string(),
            group: gid,
            len: if unlimited { 0 } else { len },
            unlimited,
        });
        self.group_mut(gid)?.dims.push(dim);
        Ok(dim)
    }

    fn rename_dim(&mut self, gid: GroupId, dim: DimId, name: &str) -> Result<(), EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        let dims = self.group(gid)?.dims.clone();
        if !dims.contains(&dim) {
            return Err(EngineError::BadDimension);
        }
        for other in dims {
            if other != dim && self.dim(other)?.name == name {
                return Err(EngineError::NameInUse(name.to_string()));
            }
        }
        let index = index_of(dim).map_err(|_| EngineError::BadDimension)?;
        self.dims[index].name = name.to_string();
        Ok(())
    }

    fn grow_dim(&mut self, dim: DimId, len: u64) -> Result<(), EngineError> {
        self.check_open()?;
        if !self.dim(dim)?.unlimited {
            return Err(EngineError::InvalidArgument(format!(
                "dimension {} is not unlimited",
                self.dim(dim)?.name
            )));
        }
        let index = index_of(dim).map_err(|_| EngineError::BadDimension)?;
        self.dims[index].len = self.dims[index].len.max(len);
        Ok(())
    }

    fn group_variables(&self, gid: GroupId) -> Result<Vec<VarId>, EngineError> {
        Ok((0..self.group(gid)?.vars.len()).map(id_of).collect())
    }

    fn var_by_name(&self, gid: GroupId, name: &str) -> Result<Option<VarId>, EngineError> {
        Ok(self
            .group(gid)?
            .vars
            .iter()
            .position(|var| var.name == name)
            .map(id_of))
    }

    fn var_name(&self, gid: GroupId, varid: VarId) -> Result<String, EngineError> {
        Ok(self.var(gid, varid)?.name.clone())
    }

    fn var_type(&self, gid: GroupId, varid: VarId) -> Result<NativeType, EngineError> {
        Ok(self.var(gid, varid)?.native_type)
    }

    fn var_dims(&self, gid: GroupId, varid: VarId) -> Result<Vec<DimId>, EngineError> {
        Ok(self.var(gid, varid)?.dims.clone())
    }

    fn def_var(
        &mut self,
        gid: GroupId,
        name: &str,
        native_type: NativeType,
        dims: &[DimId],
    ) -> Result<VarId, EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        if self.var_by_name(gid, name)?.is_some() {
            return Err(EngineError::NameInUse(name.to_string()));
        }
        if let NativeType::User(id) = native_type {
            self.user_type_info(id)?;
        }
        let visible = self.ancestors(gid)?;
        for &dim in dims {
            if !visible.contains(&self.dim(dim)?.group) {
                return Err(EngineError::BadDimension);
            }
        }
        let group = self.group_mut(gid)?;
        group.vars.push(VarNode {
            name: name.to_string(),
            native_type,
            dims: dims.to_vec(),
            attributes: Vec::new(),
            chunking: None,
            deflate: None,
            fletcher32: false,
            fill: None,
            data: BTreeMap::new(),
        });
        Ok(id_of(group.vars.len() - 1))
    }

    fn rename_var(&mut self, gid: GroupId, varid: VarId, name: &str) -> Result<(), EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        match self.var_by_name(gid, name)? {
            Some(other) if other != varid => Err(EngineError::NameInUse(name.to_string())),
            _ => {
                self.var_mut(gid, varid)?.name = name.to_string();
                Ok(())
            }
        }
    }

    fn def_var_chunking(
        &mut self,
        gid: GroupId,
        varid: VarId,
        chunks: &[usize],
    ) -> Result<(), EngineError> {
        self.require_define_mode()?;
        let var = self.var_mut(gid, varid)?;
        if chunks.len() != var.dims.len() || chunks.contains(&0) {
            return Err(EngineError::InvalidArgument(format!(
                "invalid chunk shape {chunks:?}"
            )));
        }
        var.chunking = Some(chunks.to_vec());
        Ok(())
    }

    fn var_chunking(&self, gid: GroupId, varid: VarId) -> Result<Option<Vec<usize>>, EngineError> {
        Ok(self.var(gid, varid)?.chunking.clone())
    }

    fn def_var_deflate(
        &mut self,
        gid: GroupId,
        varid: VarId,
        level: u32,
    ) -> Result<(), EngineError> {
        self.require_define_mode()?;
        if level > 9 {
            return Err(EngineError::InvalidArgument(format!(
                "invalid deflate level {level}"
            )));
        }
        self.var_mut(gid, varid)?.deflate = Some(level);
        Ok(())
    }

    fn var_deflate(&self, gid: GroupId, varid: VarId) -> Result<Option<u32>, EngineError> {
        Ok(self.var(gid, varid)?.deflate)
    }

    fn def_var_fletcher32(&mut self, gid: GroupId, varid: VarId) -> Result<(), EngineError> {
        self.require_define_mode()?;
        self.var_mut(gid, varid)?.fletcher32 = true;
        Ok(())
    }

    fn var_fletcher32(&self, gid: GroupId, varid: VarId) -> Result<bool, EngineError> {
        Ok(self.var(gid, varid)?.fletcher32)
    }

    fn def_var_fill(&mut self, gid: GroupId, varid: VarId, fill: &[u8]) -> Result<(), EngineError> {
        self.require_define_mode()?;
        let size = self.fixed_element_size(self.var(gid, varid)?.native_type)?;
        if fill.len() != size {
            return Err(EngineError::InvalidArgument(format!(
                "fill value has {} bytes, expected {size}",
                fill.len()
            )));
        }
        self.var_mut(gid, varid)?.fill = Some(fill.to_vec());
        Ok(())
    }

    fn get_vara(
        &self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        out: &mut [u8],
    ) -> Result<(), EngineError> {
        let stride = vec![1; count.len()];
        let row_major = row_major_strides(count);
        self.read_mapped(
            gid,
            varid,
            start,
            count,
            &stride,
            |position, size| linear_offset(position, &row_major) * size,
            out,
        )
    }

    fn put_vara(
        &mut self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        data: &[u8],
    ) -> Result<(), EngineError> {
        let stride = vec![1; count.len()];
        let row_major = row_major_strides(count);
        self.write_mapped(
            gid,
            varid,
            start,
            count,
            &stride,
            |position, size| linear_offset(position, &row_major) * size,
            data,
        )
    }

    fn get_varm(
        &self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        stride: &[usize],
        imap: &[usize],
        out: &mut [u8],
    ) -> Result<(), EngineError> {
        let in_elements = imap_in_elements(&self.version);
        self.read_mapped(
            gid,
            varid,
            start,
            count,
            stride,
            |position, size| {
                let offset = linear_offset(position, imap);
                if in_elements {
                    offset * size
                } else {
                    offset
                }
            },
            out,
        )
    }

    fn put_varm(
        &mut self,
        gid: GroupId,
        varid: VarId,
        start: &[u64],
        count: &[usize],
        stride: &[usize],
        imap: &[usize],
        data: &[u8],
    ) -> Result<(), EngineError> {
        let in_elements = imap_in_elements(&self.version);
        self.write_mapped(
            gid,
            varid,
            start,
            count,
            stride,
            |position, size| {
                let offset = linear_offset(position, imap);
                if in_elements {
                    offset * size
                } else {
                    offset
                }
            },
            data,
        )
    }

    fn get_var1(
        &self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
        out: &mut [u8],
    ) -> Result<(), EngineError> {
        let count = vec![1; index.len()];
        self.get_vara(gid, varid, index, &count, out)
    }

    fn put_var1(
        &mut self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
        data: &[u8],
    ) -> Result<(), EngineError> {
        let count = vec![1; index.len()];
        self.put_vara(gid, varid, index, &count, data)
    }

    fn get_var1_string(
        &self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
    ) -> Result<Option<String>, EngineError> {
        self.require_data_mode()?;
        let var = self.var(gid, varid)?;
        if var.native_type != NativeType::String {
            return Err(EngineError::BadType);
        }
        Self::check_index(&self.var_shape(var)?, index, false)?;
        Ok(match var.data.get(index) {
            Some(Element::Text(text)) => text.clone(),
            _ => None,
        })
    }

    fn put_var1_string(
        &mut self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
        value: Option<&str>,
    ) -> Result<(), EngineError> {
        self.require_data_mode()?;
        let var = self.var(gid, varid)?;
        if var.native_type != NativeType::String {
            return Err(EngineError::BadType);
        }
        Self::check_index(&self.var_shape(var)?, index, true)?;
        let dims = var.dims.clone();
        self.grow_unlimited(&dims, index);
        self.var_mut(gid, varid)?
            .data
            .insert(index.to_vec(), Element::Text(value.map(str::to_string)));
        Ok(())
    }

    fn get_var1_record(
        &self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
    ) -> Result<Record, EngineError> {
        self.require_data_mode()?;
        let var = self.var(gid, varid)?;
        let (size, slots) = self.record_layout(var.native_type)?;
        Self::check_index(&self.var_shape(var)?, index, false)?;
        Ok(match var.data.get(index) {
            Some(Element::Record(record)) => record.clone(),
            _ => Record::from_parts(vec![0; size], vec![None; slots]),
        })
    }

    fn put_var1_record(
        &mut self,
        gid: GroupId,
        varid: VarId,
        index: &[u64],
        value: &Record,
    ) -> Result<(), EngineError> {
        self.require_data_mode()?;
        let var = self.var(gid, varid)?;
        Self::check_record(self.record_layout(var.native_type)?, value)?;
        Self::check_index(&self.var_shape(var)?, index, true)?;
        let dims = var.dims.clone();
        self.grow_unlimited(&dims, index);
        self.var_mut(gid, varid)?
            .data
            .insert(index.to_vec(), Element::Record(value.clone()));
        Ok(())
    }

    fn attribute_names(&self, gid: GroupId, varid: VarId) -> Result<Vec<String>, EngineError> {
        Ok(self
            .attributes(gid, varid)?
            .iter()
            .map(|att| att.name.clone())
            .collect())
    }

    fn attribute_info(
        &self,
        gid: GroupId,
        varid: VarId,
        name: &str,
    ) -> Result<Option<(NativeType, usize)>, EngineError> {
        Ok(self
            .attributes(gid, varid)?
            .iter()
            .find(|att| att.name == name)
            .map(|att| {
                let len = match &att.value {
                    AttValue::Bytes { len, .. } => *len,
                    AttValue::Strings(values) => values.len(),
                    AttValue::Records(values) => values.len(),
                };
                (att.native_type, len)
            }))
    }

    fn get_att(
        &self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        out: &mut [u8],
    ) -> Result<(), EngineError> {
        let att = self
            .attributes(gid, varid)?
            .iter()
            .find(|att| att.name == name)
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?;
        match &att.value {
            AttValue::Bytes { data, .. } => {
                out.get_mut(..data.len())
                    .ok_or_else(|| EngineError::InvalidArgument("buffer too small".to_string()))?
                    .copy_from_slice(data);
                Ok(())
            }
            AttValue::Strings(_) | AttValue::Records(_) => Err(EngineError::BadType),
        }
    }

    fn get_att_strings(
        &self,
        gid: GroupId,
        varid: VarId,
        name: &str,
    ) -> Result<Vec<Option<String>>, EngineError> {
        let att = self
            .attributes(gid, varid)?
            .iter()
            .find(|att| att.name == name)
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?;
        match &att.value {
            AttValue::Strings(values) => Ok(values.clone()),
            AttValue::Bytes { .. } | AttValue::Records(_) => Err(EngineError::BadType),
        }
    }

    fn put_att(
        &mut self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        native_type: NativeType,
        len: usize,
        data: &[u8],
    ) -> Result<(), EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        let size = self.fixed_element_size(native_type)?;
        let data = data
            .get(..len * size)
            .ok_or_else(|| EngineError::InvalidArgument("buffer too small".to_string()))?
            .to_vec();
        let node = AttNode {
            name: name.to_string(),
            native_type,
            value: AttValue::Bytes { len, data },
        };
        upsert_attribute(self.attributes_mut(gid, varid)?, node);
        Ok(())
    }

    fn put_att_strings(
        &mut self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        values: &[Option<String>],
    ) -> Result<(), EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        let node = AttNode {
            name: name.to_string(),
            native_type: NativeType::String,
            value: AttValue::Strings(values.to_vec()),
        };
        upsert_attribute(self.attributes_mut(gid, varid)?, node);
        Ok(())
    }

    fn get_att_records(
        &self,
        gid: GroupId,
        varid: VarId,
        name: &str,
    ) -> Result<Vec<Record>, EngineError> {
        let att = self
            .attributes(gid, varid)?
            .iter()
            .find(|att| att.name == name)
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?;
        match &att.value {
            AttValue::Records(values) => Ok(values.clone()),
            AttValue::Bytes { .. } | AttValue::Strings(_) => Err(EngineError::BadType),
        }
    }

    fn put_att_records(
        &mut self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        native_type: NativeType,
        values: &[Record],
    ) -> Result<(), EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        let layout = self.record_layout(native_type)?;
        for value in values {
            Self::check_record(layout, value)?;
        }
        let node = AttNode {
            name: name.to_string(),
            native_type,
            value: AttValue::Records(values.to_vec()),
        };
        upsert_attribute(self.attributes_mut(gid, varid)?, node);
        Ok(())
    }

    fn rename_att(
        &mut self,
        gid: GroupId,
        varid: VarId,
        name: &str,
        new_name: &str,
    ) -> Result<(), EngineError> {
        self.require_define_mode()?;
        validate_name(new_name)?;
        let attributes = self.attributes_mut(gid, varid)?;
        if name != new_name && attributes.iter().any(|att| att.name == new_name) {
            return Err(EngineError::NameInUse(new_name.to_string()));
        }
        attributes
            .iter_mut()
            .find(|att| att.name == name)
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?
            .name = new_name.to_string();
        Ok(())
    }

    fn del_att(&mut self, gid: GroupId, varid: VarId, name: &str) -> Result<(), EngineError> {
        self.require_define_mode()?;
        let attributes = self.attributes_mut(gid, varid)?;
        let position = attributes
            .iter()
            .position(|att| att.name == name)
            .ok_or_else(|| EngineError::AttributeNotFound(name.to_string()))?;
        attributes.remove(position);
        Ok(())
    }

    fn user_type_by_name(
        &self,
        gid: GroupId,
        name: &str,
    ) -> Result<Option<UserTypeId>, EngineError> {
        for group in self.ancestors(gid)? {
            for &id in &self.group(group)?.types {
                if self.user_type_info(id)?.name == name {
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    fn user_type_info(&self, id: UserTypeId) -> Result<UserTypeInfo, EngineError> {
        self.check_open()?;
        usize::try_from(id)
            .ok()
            .and_then(|index| self.types.get(index))
            .map(|(_, info)| info.clone())
            .ok_or(EngineError::BadType)
    }

    fn def_compound(
        &mut self,
        gid: GroupId,
        name: &str,
        size: usize,
    ) -> Result<UserTypeId, EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        if size == 0 {
            return Err(EngineError::BadSize(0));
        }
        for &id in &self.group(gid)?.types {
            if self.user_type_info(id)?.name == name {
                return Err(EngineError::NameInUse(name.to_string()));
            }
        }
        let id = UserTypeId::try_from(self.types.len()).map_err(|_| EngineError::BadType)?;
        self.types.push((
            gid,
            UserTypeInfo {
                name: name.to_string(),
                size,
                class: UserTypeClass::Compound,
                base_type: None,
                fields: Vec::new(),
            },
        ));
        self.group_mut(gid)?.types.push(id);
        Ok(id)
    }

    fn insert_compound_field(
        &mut self,
        id: UserTypeId,
        name: &str,
        offset: usize,
        field_type: NativeType,
    ) -> Result<(), EngineError> {
        self.require_define_mode()?;
        validate_name(name)?;
        let field_size = match field_type {
            NativeType::String => STRING_SLOT_SIZE,
            _ => self.type_size(field_type)?,
        };
        let (_, info) = usize::try_from(id)
            .ok()
            .and_then(|index| self.types.get_mut(index))
            .ok_or(EngineError::BadType)?;
        if info.class != UserTypeClass::Compound {
            return Err(EngineError::BadType);
        }
        if offset + field_size > info.size {
            return Err(EngineError::InvalidArgument(format!(
                "field {name} at offset {offset} does not fit in {} bytes",
                info.size
            )));
        }
        if info.fields.iter().any(|field| field.name == name) {
            return Err(EngineError::NameInUse(name.to_string()));
        }
        info.fields.push(CompoundField {
            name: name.to_string(),
            offset,
            field_type,
            dims: Vec::new(),
        });
        Ok(())
    }
}

fn upsert_attribute(attributes: &mut Vec<AttNode>, node: AttNode) {
    if let Some(existing) = attributes.iter_mut().find(|att| att.name == node.name) {
        *existing = node;
    } else {
        attributes.push(node);
    }
}

fn row_major_strides(count: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; count.len()];
    for i in (0..count.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * count[i + 1];
    }
    strides
}

fn linear_offset(position: &[usize], strides: &[usize]) -> usize {
    std::iter::zip(position, strides).map(|(p, s)| p * s).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_variable() -> (MemoryEngine, GroupId, VarId) {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let y = engine.def_dim(root, "y", 2, false).unwrap();
        let x = engine.def_dim(root, "x", 3, false).unwrap();
        let var = engine.def_var(root, "v", NativeType::Short, &[y, x]).unwrap();
        engine.enddef().unwrap();
        (engine, root, var)
    }

    #[test]
    fn memory_engine_define_and_data_mode() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        assert!(engine.in_define_mode());
        engine.def_dim(root, "x", 4, false).unwrap();
        engine.enddef().unwrap();
        assert_eq!(
            engine.def_dim(root, "y", 4, false),
            Err(EngineError::NotInDefineMode)
        );
        assert_eq!(engine.enddef(), Err(EngineError::NotInDefineMode));
        engine.redef().unwrap();
        assert_eq!(engine.redef(), Err(EngineError::InDefineMode));
        assert_eq!(engine.stats().mode_switches(), 2);
    }

    #[test]
    fn memory_engine_duplicate_names() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        engine.def_dim(root, "x", 4, false).unwrap();
        assert_eq!(
            engine.def_dim(root, "x", 5, false),
            Err(EngineError::NameInUse("x".to_string()))
        );
        engine.def_group(root, "g").unwrap();
        assert!(engine.def_group(root, "g").is_err());
        assert!(engine.def_group(root, "a/b").is_err());
    }

    #[test]
    fn memory_engine_vara_and_fill() {
        let (mut engine, root, var) = engine_with_variable();
        let values: Vec<i16> = vec![1, 2, 3, 4];
        engine
            .put_vara(root, var, &[0, 1], &[2, 2], bytemuck::cast_slice(&values))
            .unwrap();
        let mut out = vec![0i16; 6];
        engine
            .get_vara(root, var, &[0, 0], &[2, 3], bytemuck::cast_slice_mut(&mut out))
            .unwrap();
        assert_eq!(out, vec![0, 1, 2, 0, 3, 4]);
        assert_eq!(
            engine.get_vara(root, var, &[1, 0], &[2, 3], bytemuck::cast_slice_mut(&mut out)),
            Err(EngineError::EdgeExceeded)
        );
    }

    #[test]
    fn memory_engine_varm_imap_units() {
        for (version, imap) in [("4.9.2", [1usize, 2]), ("4.3.0", [2, 4])] {
            let (engine, root, var) = {
                let (mut engine, root, var) = engine_with_variable();
                engine.version = version.to_string();
                let values: Vec<i16> = (0..6).collect();
                engine
                    .put_vara(root, var, &[0, 0], &[2, 3], bytemuck::cast_slice(&values))
                    .unwrap();
                (engine, root, var)
            };
            // transpose the first two columns
            let mut out = vec![0i16; 4];
            engine
                .get_varm(
                    root,
                    var,
                    &[0, 0],
                    &[2, 2],
                    &[1, 1],
                    &imap,
                    bytemuck::cast_slice_mut(&mut out),
                )
                .unwrap();
            assert_eq!(out, vec![0, 3, 1, 4], "{version}");
        }
    }

    #[test]
    fn memory_engine_unlimited_growth() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let t = engine.def_dim(root, "time", 0, true).unwrap();
        let var = engine.def_var(root, "t", NativeType::Double, &[t]).unwrap();
        engine.enddef().unwrap();
        assert_eq!(engine.dim_len(t), Ok(0));
        engine
            .put_var1(root, var, &[4], &1.5f64.to_ne_bytes())
            .unwrap();
        assert_eq!(engine.dim_len(t), Ok(5));
        let mut out = [0u8; 8];
        engine.get_var1(root, var, &[4], &mut out).unwrap();
        assert_eq!(f64::from_ne_bytes(out), 1.5);
    }

    #[test]
    fn memory_engine_attributes() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        engine
            .put_att(
                root,
                GLOBAL,
                "n",
                NativeType::Int,
                2,
                bytemuck::cast_slice::<i32, u8>(&[1, 2]),
            )
            .unwrap();
        engine
            .put_att_strings(root, GLOBAL, "s", &[Some("a".to_string()), None])
            .unwrap();
        assert_eq!(engine.attribute_info(root, GLOBAL, "n"), Ok(Some((NativeType::Int, 2))));
        assert_eq!(engine.attribute_names(root, GLOBAL).unwrap(), vec!["n", "s"]);
        assert_eq!(
            engine.get_att_strings(root, GLOBAL, "s").unwrap(),
            vec![Some("a".to_string()), None]
        );
        engine.del_att(root, GLOBAL, "n").unwrap();
        assert_eq!(engine.attribute_info(root, GLOBAL, "n"), Ok(None));
    }

    #[test]
    fn memory_engine_dimension_visibility() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let child = engine.def_group(root, "child").unwrap();
        let x = engine.def_dim(root, "x", 2, false).unwrap();
        let local = engine.def_dim(child, "local", 2, false).unwrap();
        assert_eq!(engine.dim_by_name(child, "x"), Ok(Some(x)));
        assert_eq!(engine.dim_by_name(root, "local"), Ok(None));
        assert!(engine.def_var(child, "v", NativeType::Int, &[x, local]).is_ok());
        assert_eq!(
            engine.def_var(root, "w", NativeType::Int, &[local]),
            Err(EngineError::BadDimension)
        );
    }

    #[test]
    fn memory_engine_close_once() {
        let mut engine = MemoryEngine::new();
        let stats = engine.stats();
        engine.close().unwrap();
        assert_eq!(engine.close(), Err(EngineError::Closed));
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn memory_engine_records_with_strings() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let id = engine.def_compound(root, "station", 12).unwrap();
        engine.insert_compound_field(id, "name", 0, NativeType::String).unwrap();
        engine.insert_compound_field(id, "code", 8, NativeType::Int).unwrap();
        assert!(engine
            .insert_compound_field(id, "late", 8, NativeType::String)
            .is_err());
        let x = engine.def_dim(root, "x", 2, false).unwrap();
        let var = engine.def_var(root, "stations", NativeType::User(id), &[x]).unwrap();
        let record = Record::from_parts(
            [0, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0].to_vec(),
            vec![Some("alpha".to_string())],
        );
        engine
            .put_att_records(root, var, "first", NativeType::User(id), &[record.clone()])
            .unwrap();
        assert_eq!(
            engine.attribute_info(root, var, "first"),
            Ok(Some((NativeType::User(id), 1)))
        );
        assert_eq!(engine.get_att_records(root, var, "first").unwrap(), vec![record.clone()]);
        assert_eq!(
            engine.put_att(root, var, "raw", NativeType::User(id), 1, &[0; 12]),
            Err(EngineError::BadType)
        );
        engine.enddef().unwrap();

        engine.put_var1_record(root, var, &[1], &record).unwrap();
        assert_eq!(engine.get_var1_record(root, var, &[1]).unwrap(), record);
        assert_eq!(
            engine.get_var1_record(root, var, &[0]).unwrap(),
            Record::from_parts(vec![0; 12], vec![None])
        );
        assert!(engine
            .put_var1_record(root, var, &[0], &Record::from_parts(vec![0; 12], vec![]))
            .is_err());
        assert_eq!(
            engine.get_vara(root, var, &[0], &[1], &mut [0; 12]),
            Err(EngineError::BadType)
        );
    }

    #[test]
    fn memory_engine_renames() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let child = engine.def_group(root, "child").unwrap();
        engine.def_group(root, "other").unwrap();
        let x = engine.def_dim(root, "x", 2, false).unwrap();
        engine.def_dim(root, "y", 2, false).unwrap();
        let var = engine.def_var(root, "v", NativeType::Int, &[x]).unwrap();
        engine.def_var(root, "w", NativeType::Int, &[x]).unwrap();
        engine
            .put_att_strings(root, var, "a", &[Some("1".to_string())])
            .unwrap();
        engine.put_att_strings(root, var, "b", &[None]).unwrap();

        assert!(engine.rename_group(root, "top").is_err());
        assert_eq!(
            engine.rename_group(child, "other"),
            Err(EngineError::NameInUse("other".to_string()))
        );
        engine.rename_group(child, "renamed").unwrap();
        assert_eq!(engine.group_name(child).unwrap(), "renamed");

        assert!(engine.rename_dim(root, x, "y").is_err());
        assert_eq!(engine.rename_dim(child, x, "z"), Err(EngineError::BadDimension));
        engine.rename_dim(root, x, "lon").unwrap();
        assert_eq!(engine.dim_by_name(child, "lon"), Ok(Some(x)));

        assert!(engine.rename_var(root, var, "w").is_err());
        engine.rename_var(root, var, "v").unwrap();
        engine.rename_var(root, var, "values").unwrap();
        assert_eq!(engine.var_by_name(root, "values"), Ok(Some(var)));

        assert!(engine.rename_att(root, var, "a", "b").is_err());
        assert!(engine.rename_att(root, var, "missing", "c").is_err());
        engine.rename_att(root, var, "a", "c").unwrap();
        assert_eq!(engine.attribute_names(root, var).unwrap(), vec!["c", "b"]);

        engine.enddef().unwrap();
        assert_eq!(
            engine.rename_var(root, var, "v"),
            Err(EngineError::NotInDefineMode)
        );
    }

    #[test]
    fn memory_engine_grow_dim() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let t = engine.def_dim(root, "time", 0, true).unwrap();
        let x = engine.def_dim(root, "x", 3, false).unwrap();
        engine.enddef().unwrap();
        engine.grow_dim(t, 4).unwrap();
        engine.grow_dim(t, 2).unwrap();
        assert_eq!(engine.dim_len(t), Ok(4));
        assert!(engine.grow_dim(x, 5).is_err());
        assert_eq!(engine.dim_len(x), Ok(3));
    }
}
