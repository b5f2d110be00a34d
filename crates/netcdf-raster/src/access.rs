//! Serialized access to a container.
//!
//! The underlying library is not reentrant across handles, so every
//! container in the process shares one library lock in addition to its own
//! state lock. Public dataset and band operations take a [`ContainerGuard`]
//! for their duration; internal helpers receive `&mut ContainerState` and
//! never lock again.

use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use parking_lot::{const_mutex, Mutex, MutexGuard};
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::error::NetCdfResult;
use crate::store::ArrayStore;

static LIBRARY_LOCK: Mutex<()> = const_mutex(());

/// Container mutability mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Structure and attribute changes allowed
    Define,
    /// Bulk data transfer allowed
    Data,
}

/// References to attach to band variables once georeferencing is emitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    pub grid_mapping: Option<String>,
    pub coordinates: Option<String>,
}

/// Mutable state of one open container.
pub struct ContainerState {
    pub store: Box<dyn ArrayStore>,
    mode: Mode,
    pub diagnostics: Diagnostics,
    written: HashSet<usize>,
    /// Longitude shift detection still pending
    pub(crate) longitude_check_pending: bool,
    pub(crate) attachment: Option<Attachment>,
    attached: HashSet<usize>,
}

impl ContainerState {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch the container to `mode` if it is not already there.
    pub fn ensure_mode(&mut self, mode: Mode) -> NetCdfResult<()> {
        if self.mode == mode {
            return Ok(());
        }
        match mode {
            Mode::Define => self.store.redef()?,
            Mode::Data => self.store.enddef()?,
        }
        debug!(path = %self.store.path(), mode = ?mode, "Switched container mode");
        self.mode = mode;
        Ok(())
    }

    pub fn mark_written(&mut self, var: usize) {
        self.written.insert(var);
    }

    pub fn has_written(&self, var: usize) -> bool {
        self.written.contains(&var)
    }

    /// Attach pending grid-mapping references to `var`, at most once.
    pub(crate) fn attach_references(&mut self, var: usize) -> NetCdfResult<()> {
        let Some(attachment) = self.attachment.clone() else {
            return Ok(());
        };
        if !self.attached.insert(var) {
            return Ok(());
        }
        self.ensure_mode(Mode::Define)?;
        let owner = crate::store::AttrOwner::Var(var);
        if let Some(name) = attachment.grid_mapping {
            self.store.put_attr(owner, "grid_mapping", name.into())?;
        }
        if let Some(coords) = attachment.coordinates {
            self.store.put_attr(owner, "coordinates", coords.into())?;
        }
        Ok(())
    }
}

/// Lock-owning service around one container.
pub struct ContainerAccess {
    state: Mutex<ContainerState>,
}

impl ContainerAccess {
    pub fn new(store: Box<dyn ArrayStore>, longitude_check: bool) -> Self {
        let mode = if store.is_define_mode() {
            Mode::Define
        } else {
            Mode::Data
        };
        Self {
            state: Mutex::new(ContainerState {
                store,
                mode,
                diagnostics: Diagnostics::new(),
                written: HashSet::new(),
                longitude_check_pending: longitude_check,
                attachment: None,
                attached: HashSet::new(),
            }),
        }
    }

    /// Acquire the library lock, then this container's state.
    pub fn lock(&self) -> ContainerGuard<'_> {
        let library = LIBRARY_LOCK.lock();
        let state = self.state.lock();
        ContainerGuard {
            state,
            _library: library,
        }
    }

    pub fn into_state(self) -> ContainerState {
        self.state.into_inner()
    }
}

/// Scoped access to a container; both locks release on drop.
pub struct ContainerGuard<'a> {
    state: MutexGuard<'a, ContainerState>,
    _library: MutexGuard<'static, ()>,
}

impl Deref for ContainerGuard<'_> {
    type Target = ContainerState;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl DerefMut for ContainerGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AttrOwner, Format, MemoryStore, NcType};

    fn access() -> (ContainerAccess, usize) {
        let mut store = MemoryStore::create("access.nc", Format::Nc);
        let x = store.def_dim("x", 2).unwrap();
        let var = store.def_var("v", NcType::Int, &[x]).unwrap();
        (ContainerAccess::new(Box::new(store), true), var)
    }

    #[test]
    fn test_ensure_mode_flips_only_when_needed() {
        let (access, _) = access();
        let mut guard = access.lock();
        assert_eq!(guard.mode(), Mode::Define);
        guard.ensure_mode(Mode::Define).unwrap();
        guard.ensure_mode(Mode::Data).unwrap();
        guard.ensure_mode(Mode::Data).unwrap();
        assert!(!guard.store.is_define_mode());
    }

    #[test]
    fn test_attachment_written_once() {
        let (access, var) = access();
        let mut guard = access.lock();
        guard.attachment = Some(Attachment {
            grid_mapping: Some("crs".to_string()),
            coordinates: None,
        });
        guard.attach_references(var).unwrap();
        guard.ensure_mode(Mode::Data).unwrap();
        // Second attachment is a no-op and does not flip the mode back.
        guard.attach_references(var).unwrap();
        assert_eq!(guard.mode(), Mode::Data);
        assert_eq!(
            guard
                .store
                .get_attr(AttrOwner::Var(var), "grid_mapping")
                .unwrap()
                .and_then(|v| v.as_text().map(str::to_string)),
            Some("crs".to_string())
        );
    }

    #[test]
    fn test_lock_released_on_drop() {
        let (first, _) = access();
        let (second, _) = access();
        {
            let _guard = first.lock();
        }
        let _guard = second.lock();
    }
}
