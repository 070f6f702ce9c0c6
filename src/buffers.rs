// Role-keyed output buffers. A buffer is only reallocated when the geometry
// asked for differs from the one it already has; same-size frames reuse it.

use tracing::{debug, warn};

use crate::error::Error;
use crate::types::{BufferRole, FrameBuffer, Geometry};

const ROLE_COUNT: usize = BufferRole::ALL.len();

/// Where buffer memory comes from. Buffers handed out here must be readable
/// and writable by both the control loop and the engine without a copy.
pub trait Allocator {
    /// Returns `None` when the memory cannot be acquired.
    fn allocate_mapped(&mut self, geometry: Geometry) -> Option<FrameBuffer>;
    fn free(&mut self, buffer: FrameBuffer);
}

/// Plain host memory. Exhaustion is reported instead of aborting the process.
#[derive(Debug, Default)]
pub struct HostAllocator;

impl Allocator for HostAllocator {
    fn allocate_mapped(&mut self, geometry: Geometry) -> Option<FrameBuffer> {
        let Some(len) = geometry.checked_area() else {
            warn!("host allocation of {geometry} overflows");
            return None;
        };
        let mut pixels: Vec<u32> = Vec::new();
        if let Err(e) = pixels.try_reserve_exact(len) {
            warn!("host allocation of {geometry} failed: {e}");
            return None;
        }
        pixels.resize(len, 0);
        Some(FrameBuffer { width: geometry.width, height: geometry.height, pixels })
    }

    fn free(&mut self, buffer: FrameBuffer) {
        drop(buffer);
    }
}

/// Owns every output buffer. Other components borrow them, never keep them.
pub struct BufferManager {
    allocator: Box<dyn Allocator>,
    slots: [Option<FrameBuffer>; ROLE_COUNT],
    allocations: [u64; ROLE_COUNT], // per-role count of successful allocations
}

impl BufferManager {
    pub fn new(allocator: Box<dyn Allocator>) -> Self {
        Self {
            allocator,
            slots: Default::default(),
            allocations: [0; ROLE_COUNT],
        }
    }

    /// Make sure `role` holds a buffer of exactly `required` geometry.
    ///
    /// Returns the existing buffer untouched when it already matches. Otherwise
    /// the old one is released first and a new one allocated; if that fails the
    /// role is left empty and `Error::Allocation` is returned.
    pub fn ensure(&mut self, role: BufferRole, required: Geometry) -> Result<&mut FrameBuffer, Error> {
        let idx = role.index();
        let matches = self.slots[idx].as_ref().is_some_and(|b| b.geometry() == required);

        if !matches {
            self.release(role);
            let buffer = self
                .allocator
                .allocate_mapped(required)
                .ok_or(Error::Allocation { role, geometry: required })?;
            self.allocations[idx] += 1;
            debug!("allocated {role} buffer ({required})");
            self.slots[idx] = Some(buffer);
        }

        self.slots[idx].as_mut().ok_or(Error::MissingBuffer(role))
    }

    /// Free the buffer for `role`. Releasing an empty role does nothing.
    pub fn release(&mut self, role: BufferRole) {
        if let Some(old) = self.slots[role.index()].take() {
            debug!("released {role} buffer ({})", old.geometry());
            self.allocator.free(old);
        }
    }

    pub fn release_all(&mut self) {
        for role in BufferRole::ALL {
            self.release(role);
        }
    }

    pub fn get(&self, role: BufferRole) -> Option<&FrameBuffer> {
        self.slots[role.index()].as_ref()
    }

    pub fn get_mut(&mut self, role: BufferRole) -> Option<&mut FrameBuffer> {
        self.slots[role.index()].as_mut()
    }

    pub fn geometry(&self, role: BufferRole) -> Option<Geometry> {
        self.get(role).map(FrameBuffer::geometry)
    }

    /// Borrow one buffer for reading and a different one for writing at the same time.
    pub fn pair_mut(
        &mut self,
        read: BufferRole,
        write: BufferRole,
    ) -> Result<(&FrameBuffer, &mut FrameBuffer), Error> {
        let (r, w) = (read.index(), write.index());
        if r == w {
            return Err(Error::processing("buffer pairing", format!("{read} cannot be both source and target")));
        }

        let (src, dst) = if r < w {
            let (lo, hi) = self.slots.split_at_mut(w);
            (lo[r].as_ref(), hi[0].as_mut())
        } else {
            let (lo, hi) = self.slots.split_at_mut(r);
            (hi[0].as_ref(), lo[w].as_mut())
        };

        let src = src.ok_or(Error::MissingBuffer(read))?;
        let dst = dst.ok_or(Error::MissingBuffer(write))?;
        Ok((src, dst))
    }

    /// How many times `role` has been (re)allocated since creation.
    pub fn allocation_count(&self, role: BufferRole) -> u64 {
        self.allocations[role.index()]
    }

    /// Number of roles currently holding a buffer.
    pub fn held(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        self.release_all();
    }
}
