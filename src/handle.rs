//! Ownership wrapper for engine-side objects
//!
//! Every object living in the engine's memory arena is represented host-side
//! by a [`Handle`] carrying an ownership flag. An owning handle is
//! responsible for releasing the object exactly once; a borrowed handle is a
//! read-only view whose object is owned elsewhere, typically by a parent
//! container.
//!
//! The engine's arena is not covered by the host's memory management, so a
//! leaked owning handle leaks engine memory permanently. [`Handle`]
//! therefore releases on drop as well as on [`Handle::close`].
//!
//! State machine:
//!
//! ```text
//! Handle::owned ──▶ Live(owner) ───close/drop───▶ Released (terminal)
//! Handle::borrowed ──▶ Live(borrowed) ──close────▶ no-op
//! ```

use crate::engine::{EngineRef, RawRef};

/// Host-side reference to an engine-side object
pub struct Handle {
    engine: EngineRef,
    addr: RawRef,
    owner: bool,
    closed: bool,
}

impl Handle {
    /// Wrap an address the host owns.
    ///
    /// Constructors and create/build calls return owned addresses.
    pub fn owned(engine: EngineRef, addr: RawRef) -> Self {
        debug_assert!(addr.is_valid());
        Self {
            engine,
            addr,
            owner: true,
            closed: false,
        }
    }

    /// Wrap an address owned by another object.
    ///
    /// Get-style accessors on a parent object return borrowed addresses.
    pub fn borrowed(engine: EngineRef, addr: RawRef) -> Self {
        debug_assert!(addr.is_valid());
        Self {
            engine,
            addr,
            owner: false,
            closed: false,
        }
    }

    pub fn addr(&self) -> RawRef {
        self.addr
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the underlying object if this handle owns it.
    ///
    /// Idempotent: a second call, or any call on a borrowed handle, performs
    /// no engine call.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.owner {
            self.engine.borrow_mut().release(self.addr);
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("addr", &self.addr)
            .field("owner", &self.owner)
            .field("closed", &self.closed)
            .finish()
    }
}
