//! State shared by every object of one open container.

use std::{cell::RefCell, collections::HashMap, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{
    engine::{imap_in_elements, DimId, Engine, EngineError, GroupId, LogEngineError},
    spatial_ref::SpatialRefDecoder,
};

#[derive(Debug)]
struct SharedState {
    engine: Box<dyn Engine>,
    define_mode: bool,
    dim_owner: HashMap<DimId, GroupId>,
}

/// The resources of one open container.
///
/// Every [`Group`](crate::group::Group), [`Dimension`](crate::dimension::Dimension),
/// [`Attribute`](crate::attribute::Attribute) and [`Array`](crate::array::Array) of a container holds an
/// [`Arc`] of its [`SharedResources`]. The engine is closed when the last of them is dropped.
///
/// All engine access is serialised by a reentrant mutex, so a public operation can hold the lock for its
/// whole duration while the helpers it calls lock again.
#[derive(Debug)]
pub struct SharedResources {
    state: ReentrantMutex<RefCell<SharedState>>,
    read_only: bool,
    imap_in_elements: bool,
    spatial_ref_decoder: Arc<dyn SpatialRefDecoder>,
}

impl SharedResources {
    /// Take ownership of an engine.
    ///
    /// A read only container is switched to data mode once here, and never switched again.
    #[must_use]
    pub fn new(
        mut engine: Box<dyn Engine>,
        read_only: bool,
        spatial_ref_decoder: Arc<dyn SpatialRefDecoder>,
    ) -> Arc<Self> {
        let imap_in_elements = imap_in_elements(&engine.library_version());
        if read_only && engine.in_define_mode() {
            let _ = engine.enddef().log_engine_error("enddef");
        }
        let define_mode = engine.in_define_mode();
        Arc::new(Self {
            state: ReentrantMutex::new(RefCell::new(SharedState {
                engine,
                define_mode,
                dim_owner: HashMap::new(),
            })),
            read_only,
            imap_in_elements,
            spatial_ref_decoder,
        })
    }

    /// Hold the container lock until the returned guard is dropped.
    pub(crate) fn lock(&self) -> impl Sized + '_ {
        self.state.lock()
    }

    /// Run `f` with exclusive access to the engine.
    ///
    /// # Panics
    /// Panics if called from within `f`.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut dyn Engine) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(state.engine.as_mut())
    }

    /// Returns true if the container is read only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns true if the engine expresses mapped strides in elements rather than bytes.
    #[must_use]
    pub const fn imap_in_elements(&self) -> bool {
        self.imap_in_elements
    }

    /// Returns true if the container is in define mode.
    #[must_use]
    pub fn is_define_mode(&self) -> bool {
        self.state.lock().borrow().define_mode
    }

    pub(crate) fn spatial_ref_decoder(&self) -> &dyn SpatialRefDecoder {
        self.spatial_ref_decoder.as_ref()
    }

    /// Switch the container to define mode if `define`, otherwise to data mode.
    ///
    /// This is a no-op if the container is already in the requested mode or is read only. If the engine
    /// refuses the switch, the mode it reports afterwards is recorded.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if the engine fails to switch mode.
    pub fn set_define_mode(&self, define: bool) -> Result<(), EngineError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.define_mode == define || self.read_only {
            return Ok(());
        }
        let result = if define {
            state.engine.redef().log_engine_error("redef")
        } else {
            state.engine.enddef().log_engine_error("enddef")
        };
        if result.is_ok() {
            tracing::debug!(define, "switched container mode");
            state.define_mode = define;
        } else {
            state.define_mode = state.engine.in_define_mode();
        }
        result
    }

    /// Return the group that defines dimension `dim`, searching from group `from` upwards and then the whole
    /// container.
    ///
    /// # Errors
    /// Returns an [`EngineError`] if no group defines the dimension.
    pub fn resolve_owning_group(&self, from: GroupId, dim: DimId) -> Result<GroupId, EngineError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(&owner) = state.dim_owner.get(&dim) {
            return Ok(owner);
        }
        let engine = state.engine.as_ref();
        let mut owner = None;
        let mut current = Some(from);
        while let Some(gid) = current {
            if engine.group_dimensions(gid)?.contains(&dim) {
                owner = Some(gid);
                break;
            }
            current = engine.group_parent(gid)?;
        }
        if owner.is_none() {
            let mut stack = vec![engine.root_group()];
            while let Some(gid) = stack.pop() {
                if engine.group_dimensions(gid)?.contains(&dim) {
                    owner = Some(gid);
                    break;
                }
                stack.extend(engine.group_children(gid)?.into_iter().rev());
            }
        }
        let owner = owner.ok_or(EngineError::BadDimension)?;
        state.dim_owner.insert(dim, owner);
        Ok(owner)
    }

    /// Forget the owning groups found by [`resolve_owning_group`](SharedResources::resolve_owning_group).
    pub(crate) fn forget_dimension_owners(&self) {
        self.state.lock().borrow_mut().dim_owner.clear();
    }
}

impl Drop for SharedResources {
    fn drop(&mut self) {
        let state = self.state.get_mut().get_mut();
        let _ = state.engine.close().log_engine_error("close");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::MemoryEngine, spatial_ref::CfGridMappingDecoder};

    fn shared(engine: MemoryEngine, read_only: bool) -> Arc<SharedResources> {
        SharedResources::new(
            Box::new(engine),
            read_only,
            Arc::new(CfGridMappingDecoder),
        )
    }

    #[test]
    fn define_mode_switches_only_when_needed() {
        let engine = MemoryEngine::new();
        let stats = engine.stats();
        let shared = shared(engine, false);
        assert!(shared.is_define_mode());
        shared.set_define_mode(true).unwrap();
        assert_eq!(stats.mode_switches(), 0);
        shared.set_define_mode(false).unwrap();
        shared.set_define_mode(false).unwrap();
        assert_eq!(stats.mode_switches(), 1);
        shared.set_define_mode(true).unwrap();
        assert_eq!(stats.mode_switches(), 2);
        assert!(shared.is_define_mode());
    }

    #[test]
    fn read_only_never_switches() {
        let engine = MemoryEngine::new();
        let stats = engine.stats();
        let shared = shared(engine, true);
        assert_eq!(stats.mode_switches(), 1);
        assert!(!shared.is_define_mode());
        shared.set_define_mode(true).unwrap();
        assert!(!shared.is_define_mode());
        assert_eq!(stats.mode_switches(), 1);
    }

    #[test]
    fn failed_switch_records_engine_state() {
        let mut engine = MemoryEngine::new();
        engine.enddef().unwrap();
        let shared = shared(engine, false);
        assert!(!shared.is_define_mode());
        shared.with_engine(|engine| engine.close()).unwrap();
        assert!(shared.set_define_mode(true).is_err());
        assert!(!shared.is_define_mode());
    }

    #[test]
    fn owning_group_resolution() {
        let mut engine = MemoryEngine::new();
        let root = engine.root_group();
        let a = engine.def_group(root, "a").unwrap();
        let b = engine.def_group(root, "b").unwrap();
        let x = engine.def_dim(root, "x", 1, false).unwrap();
        let y = engine.def_dim(b, "y", 1, false).unwrap();
        let shared = shared(engine, false);
        assert_eq!(shared.resolve_owning_group(a, x), Ok(root));
        assert_eq!(shared.resolve_owning_group(a, y), Ok(b));
        assert_eq!(shared.resolve_owning_group(a, y), Ok(b));
        assert_eq!(
            shared.resolve_owning_group(a, 42),
            Err(EngineError::BadDimension)
        );
    }

    #[test]
    fn engine_closed_once_on_last_release() {
        let engine = MemoryEngine::new();
        let stats = engine.stats();
        let shared = shared(engine, false);
        let other = shared.clone();
        drop(shared);
        assert_eq!(stats.closes(), 0);
        drop(other);
        assert_eq!(stats.closes(), 1);
    }
}
