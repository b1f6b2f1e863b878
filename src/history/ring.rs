use std::collections::BTreeMap;

use glam::UVec2;

use crate::backend::{GraphicsBackend, TextureHandle};
use crate::error::{PostFxError, PostFxResult};
use crate::history::{HistoryBufferDesc, HistoryId};

/// What the allocator of a history entry gets to see.
pub struct HistoryAllocContext<'a> {
    pub id: HistoryId,
    /// Reference size the slot is allocated for.
    pub reference_size: UVec2,
    pub backend: &'a mut dyn GraphicsBackend,
}

/// Caller-supplied slot allocator, invoked once per slot index.
pub type HistoryFactory =
    Box<dyn FnMut(&mut HistoryAllocContext<'_>, usize) -> PostFxResult<TextureHandle> + Send>;

enum HistoryAllocator {
    Desc(HistoryBufferDesc),
    Factory(HistoryFactory),
}

impl HistoryAllocator {
    fn allocate(
        &mut self,
        ctx: &mut HistoryAllocContext<'_>,
        slot: usize,
    ) -> PostFxResult<TextureHandle> {
        match self {
            HistoryAllocator::Desc(desc) => {
                let texture = desc.texture_descriptor(ctx.reference_size, slot);
                Ok(ctx.backend.create_texture(&texture)?)
            }
            HistoryAllocator::Factory(factory) => factory(ctx, slot),
        }
    }

    /// Whether slots allocated at `allocated` are too small for `reference`.
    fn needs_growth(&self, allocated: UVec2, reference: UVec2) -> bool {
        match self {
            HistoryAllocator::Desc(desc) => {
                desc.fixed_size.is_none() && reference.cmpgt(allocated).any()
            }
            HistoryAllocator::Factory(_) => reference.cmpgt(allocated).any(),
        }
    }
}

struct HistoryEntry {
    slots: Vec<TextureHandle>,
    allocator: HistoryAllocator,
    generation: u64,
    allocated_for: UVec2,
    /// Swap count of the frame that last wrote the current slot.
    written_at: Option<u64>,
}

impl HistoryEntry {
    fn index(&self, frames_ago: usize) -> usize {
        let count = self.slots.len();
        let current = (self.generation % count as u64) as usize;
        (current + count - frames_ago) % count
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for slot in self.slots.drain(..) {
            backend.destroy_texture(slot);
        }
    }
}

/// Result of [`HistoryBufferRing::swap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Every ring advanced by one slot.
    Advanced,
    /// The reference size grew past the tracked maximum; undersized rings
    /// were reallocated in place and hold no valid history.
    Grown,
    /// The reference size shrank below the tracked maximum; every ring was
    /// released.
    Reset,
}

impl SwapOutcome {
    /// Whether consumers must treat their history as invalid this frame.
    pub fn invalidates_history(&self) -> bool {
        !matches!(self, SwapOutcome::Advanced)
    }
}

/// Keyed registry of N-deep texture rings sharing one frame clock.
///
/// Slot `frames_ago` of an entry resolves to
/// `slots[(generation - frames_ago) mod N]`, where the generation advances
/// once per [`swap`](Self::swap).
#[derive(Default)]
pub struct HistoryBufferRing {
    entries: BTreeMap<HistoryId, HistoryEntry>,
    reference_size: UVec2,
    max_reference_size: UVec2,
    swap_count: u64,
}

impl HistoryBufferRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size passed to the last swap.
    pub fn reference_size(&self) -> UVec2 {
        self.reference_size
    }

    /// Largest size serviced since the last reset.
    pub fn max_reference_size(&self) -> UVec2 {
        self.max_reference_size
    }

    pub fn swap_count(&self) -> u64 {
        self.swap_count
    }

    pub fn is_allocated(&self, id: HistoryId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of slots held for `id`.
    pub fn buffer_count(&self, id: HistoryId) -> Option<usize> {
        self.entries.get(&id).map(|entry| entry.slots.len())
    }

    /// Every slot of `id`, in slot order.
    pub fn slots(&self, id: HistoryId) -> Option<&[TextureHandle]> {
        self.entries.get(&id).map(|entry| entry.slots.as_slice())
    }

    pub fn ids(&self) -> impl Iterator<Item = HistoryId> + '_ {
        self.entries.keys().copied()
    }

    /// Allocate `buffer_count` slots for `id` from a descriptor.
    ///
    /// Requesting an existing id with an equal descriptor is a no-op. A
    /// changed descriptor releases and reallocates the ring.
    pub fn allocate_buffer(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        id: HistoryId,
        desc: &HistoryBufferDesc,
        buffer_count: usize,
    ) -> PostFxResult<()> {
        if let Some(entry) = self.entries.get(&id) {
            let same_desc =
                matches!(&entry.allocator, HistoryAllocator::Desc(current) if current == desc);
            if entry.slots.len() == buffer_count {
                if same_desc {
                    return Ok(());
                }
                log::debug!("History {id:?}: allocation parameters changed, reallocating");
                self.release_buffer(backend, id);
            }
        }
        self.allocate_entry(backend, id, HistoryAllocator::Desc(desc.clone()), buffer_count)
    }

    /// Allocate `buffer_count` slots for `id` through a custom factory.
    ///
    /// The factory is kept and re-run when the reference size grows. An
    /// existing entry with the same count is left untouched.
    pub fn allocate_buffer_with<F>(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        id: HistoryId,
        buffer_count: usize,
        factory: F,
    ) -> PostFxResult<()>
    where
        F: FnMut(&mut HistoryAllocContext<'_>, usize) -> PostFxResult<TextureHandle> + Send + 'static,
    {
        if let Some(entry) = self.entries.get(&id) {
            if entry.slots.len() == buffer_count {
                return Ok(());
            }
        }
        self.allocate_entry(backend, id, HistoryAllocator::Factory(Box::new(factory)), buffer_count)
    }

    fn allocate_entry(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        id: HistoryId,
        mut allocator: HistoryAllocator,
        buffer_count: usize,
    ) -> PostFxResult<()> {
        if buffer_count == 0 {
            log::debug!("History {id:?}: ignoring allocation of zero buffers");
            return Ok(());
        }

        if let Some(existing) = self.entries.get(&id) {
            if existing.slots.len() != buffer_count {
                log::error!(
                    "History {id:?}: requested {buffer_count} buffers but {} are allocated; release the buffer before changing its shape",
                    existing.slots.len()
                );
                debug_assert!(
                    false,
                    "history {id:?} reallocated with a different buffer count"
                );
            }
            self.release_buffer(backend, id);
        }

        let reference_size = self.reference_size;
        let slots = allocate_slots(backend, id, &mut allocator, reference_size, buffer_count)?;
        log::debug!(
            "History {id:?}: allocated {buffer_count} buffers at {}x{}",
            reference_size.x,
            reference_size.y
        );
        self.entries.insert(
            id,
            HistoryEntry {
                slots,
                allocator,
                generation: 0,
                allocated_for: reference_size,
                written_at: None,
            },
        );
        Ok(())
    }

    /// Handle `frames_ago` swaps behind the current write slot.
    pub fn get_slot(&self, id: HistoryId, frames_ago: usize) -> PostFxResult<TextureHandle> {
        let entry = self
            .entries
            .get(&id)
            .ok_or(PostFxError::HistoryNotAllocated(id))?;
        if frames_ago >= entry.slots.len() {
            return Err(PostFxError::FramesAgoOutOfRange {
                id,
                frames_ago,
                buffer_count: entry.slots.len(),
            });
        }
        Ok(entry.slots[entry.index(frames_ago)])
    }

    /// Slot written this frame.
    pub fn current(&self, id: HistoryId) -> PostFxResult<TextureHandle> {
        self.get_slot(id, 0)
    }

    /// Slot written last frame. Same as [`current`](Self::current) for
    /// single-slot entries.
    pub fn previous(&self, id: HistoryId) -> PostFxResult<TextureHandle> {
        match self.buffer_count(id) {
            Some(1) => self.get_slot(id, 0),
            _ => self.get_slot(id, 1),
        }
    }

    /// Record that the current slot of `id` was written this frame.
    pub fn mark_written(&mut self, id: HistoryId) -> PostFxResult<()> {
        let swap_count = self.swap_count;
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(PostFxError::HistoryNotAllocated(id))?;
        entry.written_at = Some(swap_count);
        Ok(())
    }

    /// Whether [`previous`](Self::previous) holds data written last frame.
    ///
    /// False for fresh or regrown entries and after a frame without a write.
    pub fn previous_is_valid(&self, id: HistoryId) -> bool {
        self.entries
            .get(&id)
            .and_then(|entry| entry.written_at)
            .is_some_and(|written_at| written_at.wrapping_add(1) == self.swap_count)
    }

    /// Advance the ring clock for a new frame rendered at `width`x`height`.
    ///
    /// Shrinking below the tracked maximum in either dimension releases every
    /// entry. Growing past it reallocates undersized entries with their stored
    /// allocators.
    pub fn swap(&mut self, backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> SwapOutcome {
        let size = UVec2::new(width, height);
        self.reference_size = size;
        self.swap_count += 1;

        if size.cmplt(self.max_reference_size).any() {
            log::debug!(
                "History reset: {}x{} is smaller than {}x{}",
                size.x,
                size.y,
                self.max_reference_size.x,
                self.max_reference_size.y
            );
            self.release_all(backend);
            self.max_reference_size = size;
            return SwapOutcome::Reset;
        }

        let grew = size.cmpgt(self.max_reference_size).any();
        self.max_reference_size = self.max_reference_size.max(size);

        let mut outcome = SwapOutcome::Advanced;
        if grew {
            let mut dropped = Vec::new();
            for (&id, entry) in self.entries.iter_mut() {
                if !entry.allocator.needs_growth(entry.allocated_for, size) {
                    continue;
                }
                let count = entry.slots.len();
                entry.release(backend);
                match allocate_slots(backend, id, &mut entry.allocator, size, count) {
                    Ok(slots) => {
                        entry.slots = slots;
                        entry.allocated_for = size;
                        entry.written_at = None;
                        outcome = SwapOutcome::Grown;
                    }
                    Err(err) => {
                        log::warn!("History {id:?}: reallocation at {}x{} failed: {err}", size.x, size.y);
                        dropped.push(id);
                    }
                }
            }
            for id in dropped {
                self.entries.remove(&id);
                outcome = SwapOutcome::Grown;
            }
        }

        for entry in self.entries.values_mut() {
            entry.generation = entry.generation.wrapping_add(1);
        }
        outcome
    }

    /// Free and forget every slot of `id`. Returns whether it was allocated.
    pub fn release_buffer(&mut self, backend: &mut dyn GraphicsBackend, id: HistoryId) -> bool {
        match self.entries.remove(&id) {
            Some(mut entry) => {
                entry.release(backend);
                log::debug!("History {id:?}: released");
                true
            }
            None => false,
        }
    }

    /// Free every tracked entry.
    pub fn release_all(&mut self, backend: &mut dyn GraphicsBackend) {
        for entry in self.entries.values_mut() {
            entry.release(backend);
        }
        self.entries.clear();
    }

    /// Release everything and forget the tracked sizes.
    pub fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        self.release_all(backend);
        self.reference_size = UVec2::ZERO;
        self.max_reference_size = UVec2::ZERO;
    }
}

impl std::fmt::Debug for HistoryBufferRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryBufferRing")
            .field("ids", &self.entries.keys().collect::<Vec<_>>())
            .field("reference_size", &self.reference_size)
            .field("max_reference_size", &self.max_reference_size)
            .field("swap_count", &self.swap_count)
            .finish()
    }
}

fn allocate_slots(
    backend: &mut dyn GraphicsBackend,
    id: HistoryId,
    allocator: &mut HistoryAllocator,
    reference_size: UVec2,
    buffer_count: usize,
) -> PostFxResult<Vec<TextureHandle>> {
    let mut slots = Vec::with_capacity(buffer_count);
    for slot in 0..buffer_count {
        let mut ctx = HistoryAllocContext {
            id,
            reference_size,
            backend: &mut *backend,
        };
        match allocator.allocate(&mut ctx, slot) {
            Ok(handle) => slots.push(handle),
            Err(err) => {
                for handle in slots {
                    backend.destroy_texture(handle);
                }
                return Err(err);
            }
        }
    }
    Ok(slots)
}
