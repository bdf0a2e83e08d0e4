use crate::error::ModelError;
use crate::layout::CELL_SIZE;
#[cfg(debug_assertions)]
use crate::liveness::LivenessTracker;
use crate::model::{FieldShape, GolemModel};
use crate::slot_value::SlotValue;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::alloc::{alloc, alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ─── Handles ────────────────────────────────────────────────────────────────

/// Address-based reference to one record instance. Owning or non-owning is a
/// property of how it was constructed, not of the type: exactly one handle is
/// the logical owner of a heap allocation, and a handle wrapping external
/// storage must never be deallocated through this runtime.
///
/// Handles are plain copies of an address. Copying never transfers ownership
/// and nothing here is reference-counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHandle {
    ptr: Option<NonNull<u8>>,
}

impl ObjectHandle {
    #[inline]
    pub(crate) fn from_ptr(ptr: NonNull<u8>) -> Self {
        ObjectHandle { ptr: Some(ptr) }
    }

    /// Drop this copy's reference without deallocating. Any later access
    /// through this copy panics; other copies are unaffected.
    #[inline]
    pub fn invalidate(&mut self) {
        self.ptr = None;
    }

    #[inline]
    pub fn is_invalidated(&self) -> bool {
        self.ptr.is_none()
    }

    #[inline]
    pub fn addr(&self) -> Option<usize> {
        self.ptr.map(|p| p.as_ptr() as usize)
    }

    #[inline]
    pub(crate) fn base(&self) -> *mut u8 {
        match self.ptr {
            Some(ptr) => ptr.as_ptr(),
            None => panic!("access through an invalidated handle"),
        }
    }

    /// Address identity. Two identities compare equal iff the addresses are
    /// equal; value equality of members plays no part.
    #[inline]
    pub fn id(&self) -> ObjectId {
        ObjectId {
            addr: self.base() as usize,
        }
    }
}

/// Identity of one record instance: its storage address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    addr: usize,
}

impl ObjectId {
    #[inline]
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Rebuild a handle from an identity with no liveness proof.
    ///
    /// # Safety
    /// The caller vouches that the storage behind this identity is still
    /// live; there is no check, not even in debug builds.
    #[inline]
    pub unsafe fn unchecked_object(self) -> ObjectHandle {
        // SAFETY: identities are only minted from non-null handles.
        ObjectHandle {
            ptr: Some(unsafe { NonNull::new_unchecked(self.addr as *mut u8) }),
        }
    }
}

// ─── Runtime ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Master switch for the debug liveness tracker. Has no effect in release
    /// builds, where the tracker is compiled out entirely.
    pub liveness_checks: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            liveness_checks: true,
        }
    }
}

/// The runtime context: registered models, their liveness registries, and
/// configuration. One per process is the expected shape, but nothing is
/// global; two runtimes track liveness independently.
#[derive(Debug)]
pub struct GolemRuntime {
    models: FxHashMap<SmolStr, Arc<GolemModel>>,
    #[cfg(debug_assertions)]
    liveness: LivenessTracker,
    liveness_enabled: AtomicBool,
}

impl Default for GolemRuntime {
    fn default() -> Self {
        GolemRuntime::new(RuntimeOptions::default())
    }
}

impl GolemRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        GolemRuntime {
            models: FxHashMap::default(),
            #[cfg(debug_assertions)]
            liveness: LivenessTracker::default(),
            liveness_enabled: AtomicBool::new(options.liveness_checks),
        }
    }

    /// Toggle the liveness tracker at run time. Disabling turns bookkeeping
    /// and checks off together, so a disabled tracker can never raise a
    /// spurious assertion later.
    pub fn set_liveness_checks(&self, enabled: bool) {
        self.liveness_enabled.store(enabled, Ordering::Relaxed);
    }

    #[cfg(debug_assertions)]
    fn liveness_on(&self) -> bool {
        self.liveness_enabled.load(Ordering::Relaxed)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Registration
    // ════════════════════════════════════════════════════════════════════════

    /// Register a compiled model. For a derived model this resolves the base
    /// by name and verifies the storage contract for real: the base's slot
    /// sequence must literally equal the derived record's leading slots.
    /// Upcast and downcast stay unchecked address reinterpretations at use
    /// time; this is the one place legality is established.
    pub fn register(&mut self, mut model: GolemModel) -> Result<Arc<GolemModel>, ModelError> {
        if let Some(base_name) = model.schema().base.clone() {
            let base = self
                .models
                .get(&base_name)
                .cloned()
                .ok_or(ModelError::UnknownBase(base_name))?;
            if !base.record().is_prefix_of(model.record()) {
                return Err(ModelError::BaseLayoutMismatch {
                    base: base.type_name().clone(),
                    derived: model.type_name().clone(),
                });
            }
            // Liveness is tracked under the root-most base so that every view
            // of one object resolves to the same registry.
            model.root_id = base.root_id;
            model.base = Some(base);
        }
        let model = Arc::new(model);
        if self
            .models
            .insert(model.type_name().clone(), model.clone())
            .is_some()
        {
            warn!("model {} re-registered, replacing", model.type_name());
        }
        debug!(
            "registered model {} (root id {:#x})",
            model.type_name(),
            model.root_id()
        );
        Ok(model)
    }

    pub fn model(&self, type_name: &str) -> Option<&Arc<GolemModel>> {
        self.models.get(type_name)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ════════════════════════════════════════════════════════════════════════

    /// Reserve one record-sized region and initialize every scalar member
    /// from `initial_values`, exactly once each. The region is zero-filled
    /// first, so fixed-stack members come up logically initialized with count
    /// 0 and fixed-array members come up zeroed.
    pub fn allocate(
        &self,
        model: &GolemModel,
        initial_values: &[(&str, SlotValue)],
    ) -> Result<ObjectHandle, ModelError> {
        // Validate everything before touching the allocator; error paths must
        // not leak.
        let mut writes: Vec<(usize, u64)> = Vec::with_capacity(initial_values.len());
        let mut seen: Vec<u64> = Vec::with_capacity(initial_values.len());
        for (name, value) in initial_values {
            let entry = model.field(name)?;
            if entry.shape != FieldShape::Scalar {
                return Err(ModelError::KindMismatch {
                    member: entry.name.clone(),
                    expected: "scalar",
                });
            }
            if seen.contains(&entry.name_hash) {
                return Err(ModelError::DuplicateInitializer(entry.name.clone()));
            }
            seen.push(entry.name_hash);
            writes.push((entry.first_slot as usize, value.encode(entry.ty)?));
        }
        for entry in model.entries() {
            if entry.shape == FieldShape::Scalar && !seen.contains(&entry.name_hash) {
                return Err(ModelError::MissingInitializer(entry.name.clone()));
            }
        }

        let layout = record_layout(model);
        // SAFETY: the layout always has non-zero size (empty records are
        // padded to one cell so identities stay unique).
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout)
        };
        for (slot, bits) in writes {
            // SAFETY: slot < slot_count, region freshly allocated 8-aligned.
            unsafe { ptr.as_ptr().cast::<u64>().add(slot).write(bits) };
        }
        self.note_allocated(model, ptr.as_ptr() as usize);
        Ok(ObjectHandle::from_ptr(ptr))
    }

    /// As `allocate`, but every cell is left as the allocator returned it.
    /// The caller must initialize each member exactly once (via the
    /// field/array/stack initializers) before the first read, or behavior is
    /// undefined.
    pub fn allocate_uninitialized(&self, model: &GolemModel) -> ObjectHandle {
        let layout = record_layout(model);
        // SAFETY: non-zero layout size, as above.
        let ptr = unsafe { alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout)
        };
        self.note_allocated(model, ptr.as_ptr() as usize);
        ObjectHandle::from_ptr(ptr)
    }

    /// Wrap caller-owned storage as a non-owning handle. No registry entry is
    /// created and no deallocation is ever implied.
    ///
    /// # Safety
    /// `storage` must be 8-aligned and span at least the model's record size,
    /// and must stay valid for as long as any copy of the handle is used.
    /// Reads after the owner releases the storage are undefined behavior;
    /// nothing detects that, not even in debug builds.
    pub unsafe fn from_external_storage(&self, storage: NonNull<u8>) -> ObjectHandle {
        debug_assert!(
            storage.as_ptr() as usize % CELL_SIZE == 0,
            "external storage must be 8-aligned"
        );
        ObjectHandle::from_ptr(storage)
    }

    /// Release an owning handle's region. In debug builds the address is
    /// asserted live first, then unregistered, so a second call on the same
    /// handle trips that assertion. In release builds a double free is
    /// undefined behavior.
    ///
    /// # Safety
    /// `handle` must own a live allocation made by this runtime with this
    /// model. After the call, no copy of the handle may be used again.
    pub unsafe fn deallocate(&self, model: &GolemModel, handle: ObjectHandle) {
        let addr = handle.base();
        self.assert_exists(model, handle);
        self.note_deallocated(model, addr as usize);
        // SAFETY: per contract, addr was allocated with record_layout(model).
        unsafe { dealloc(addr, record_layout(model)) };
    }

    // ════════════════════════════════════════════════════════════════════════
    // Identity & existence
    // ════════════════════════════════════════════════════════════════════════

    #[inline]
    pub fn identity(&self, handle: ObjectHandle) -> ObjectId {
        handle.id()
    }

    /// Registry query. Reports true when the tracker is compiled out or
    /// disabled (everything is assumed live), and false for invalidated
    /// handles and never-registered (external) storage.
    pub fn exists(&self, model: &GolemModel, handle: ObjectHandle) -> bool {
        let Some(addr) = handle.addr() else {
            return false;
        };
        self.is_live(model, addr)
    }

    pub fn assert_exists(&self, model: &GolemModel, handle: ObjectHandle) {
        #[cfg(debug_assertions)]
        if self.liveness_on() {
            self.liveness
                .registry(model.root_id())
                .assert_live(handle.base() as usize);
        }
        #[cfg(not(debug_assertions))]
        let _ = (model, handle);
    }

    pub fn assert_not_exists(&self, model: &GolemModel, handle: ObjectHandle) {
        #[cfg(debug_assertions)]
        if self.liveness_on() {
            if let Some(addr) = handle.addr() {
                self.liveness.registry(model.root_id()).assert_dead(addr);
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = (model, handle);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Structural casts
    // ════════════════════════════════════════════════════════════════════════

    /// Reinterpret a derived handle under its base model. No copy, no layout
    /// work at use time; registration already proved the prefix contract.
    pub fn upcast(
        &self,
        model: &Arc<GolemModel>,
        handle: ObjectHandle,
    ) -> Result<(Arc<GolemModel>, ObjectHandle), ModelError> {
        let base = model
            .base_model()
            .cloned()
            .ok_or_else(|| ModelError::NoDeclaredBase(model.type_name().clone()))?;
        self.accessor_check(model, handle.base() as usize);
        Ok((base, handle))
    }

    /// Reinterpret a base handle under a derived model. The caller asserts
    /// the object really was allocated as (at least) `derived`; nothing can
    /// verify that here, which is why registration insists on the prefix
    /// contract.
    pub fn downcast(
        &self,
        derived: &Arc<GolemModel>,
        handle: ObjectHandle,
    ) -> Result<ObjectHandle, ModelError> {
        if derived.base_model().is_none() {
            return Err(ModelError::NoDeclaredBase(derived.type_name().clone()));
        }
        self.accessor_check(derived, handle.base() as usize);
        Ok(handle)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Liveness plumbing (compiled out of release builds)
    // ════════════════════════════════════════════════════════════════════════

    #[cfg(debug_assertions)]
    fn note_allocated(&self, model: &GolemModel, addr: usize) {
        if self.liveness_on() {
            self.liveness.registry(model.root_id()).insert(addr);
        }
    }

    #[cfg(not(debug_assertions))]
    fn note_allocated(&self, _model: &GolemModel, _addr: usize) {}

    #[cfg(debug_assertions)]
    fn note_deallocated(&self, model: &GolemModel, addr: usize) {
        if self.liveness_on() {
            self.liveness.registry(model.root_id()).remove(addr);
        }
    }

    #[cfg(not(debug_assertions))]
    fn note_deallocated(&self, _model: &GolemModel, _addr: usize) {}

    #[cfg(debug_assertions)]
    fn is_live(&self, model: &GolemModel, addr: usize) -> bool {
        if !self.liveness_on() {
            return true;
        }
        self.liveness.registry(model.root_id()).contains(addr)
    }

    #[cfg(not(debug_assertions))]
    fn is_live(&self, _model: &GolemModel, _addr: usize) -> bool {
        true
    }

    /// Accessor precondition: a once-allocated address must still be live.
    /// Addresses this runtime never allocated (external storage) pass.
    #[cfg(debug_assertions)]
    pub(super) fn accessor_check(&self, model: &GolemModel, addr: usize) {
        if self.liveness_on() {
            self.liveness.registry(model.root_id()).assert_not_freed(addr);
        }
    }

    #[cfg(not(debug_assertions))]
    pub(super) fn accessor_check(&self, _model: &GolemModel, _addr: usize) {}
}

// ─── Cell access ────────────────────────────────────────────────────────────

#[inline]
fn record_layout(model: &GolemModel) -> Layout {
    // Empty records still get one cell so every instance has a unique
    // address. Slot counts are bounded by the parser, so this cannot
    // overflow.
    Layout::array::<u64>(model.slot_count().max(1)).expect("record layout overflow")
}

/// # Safety
/// `base` must point at a live record with more than `slot` cells, 8-aligned.
#[inline]
pub(super) unsafe fn read_cell(base: *mut u8, slot: usize) -> u64 {
    unsafe { base.cast::<u64>().add(slot).read() }
}

/// # Safety
/// Same contract as [`read_cell`].
#[inline]
pub(super) unsafe fn write_cell(base: *mut u8, slot: usize, bits: u64) {
    unsafe { base.cast::<u64>().add(slot).write(bits) }
}
