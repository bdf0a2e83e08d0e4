use super::runtime::{read_cell, write_cell, GolemRuntime, ObjectHandle};
use crate::error::ModelError;
use crate::model::{FieldEntry, FieldShape, GolemModel};
use crate::slot_value::SlotValue;

// ════════════════════════════════════════════════════════════════════════════
// Fixed-stack operations
// ════════════════════════════════════════════════════════════════════════════
//
// A stack member is a state machine over its leading count cell: the count is
// always in [0, capacity], only the first `count` element cells are logically
// populated, and cells at index ≥ count hold implementation-defined contents
// (popped cells are cleared here, pushed cells written in place).

fn stack_entry<'m>(
    model: &'m GolemModel,
    name: &str,
) -> Result<(&'m FieldEntry, usize), ModelError> {
    let entry = model.field(name)?;
    match entry.shape {
        FieldShape::Stack { capacity } => Ok((entry, capacity as usize)),
        _ => Err(ModelError::KindMismatch {
            member: entry.name.clone(),
            expected: "fixed-stack",
        }),
    }
}

impl GolemRuntime {
    /// Set the count to 0. Must run exactly once before first use on storage
    /// from `allocate_uninitialized`; `allocate` zero-fills and therefore
    /// implies it.
    pub fn stack_initialize(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
    ) -> Result<(), ModelError> {
        let (entry, _) = stack_entry(model, name)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        // SAFETY: count cell is first_slot, in range by construction.
        unsafe { write_cell(base, entry.first_slot as usize, 0) };
        Ok(())
    }

    /// As `stack_initialize`, but also clears every element cell.
    pub fn stack_initialize_zeroed(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
    ) -> Result<(), ModelError> {
        let (entry, capacity) = stack_entry(model, name)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        for slot in 0..=capacity {
            // SAFETY: count + element cells span first_slot..=first_slot+capacity.
            unsafe { write_cell(base, entry.first_slot as usize + slot, 0) };
        }
        Ok(())
    }

    /// Current element count.
    pub fn stack_len(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
    ) -> Result<usize, ModelError> {
        let (entry, capacity) = stack_entry(model, name)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        // SAFETY: count cell is first_slot.
        let count = unsafe { read_cell(base, entry.first_slot as usize) } as usize;
        debug_assert!(count <= capacity, "stack count {count} exceeds capacity {capacity}");
        Ok(count)
    }

    /// Push one value. Returns false (without mutating) when full.
    pub fn stack_push(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        value: SlotValue,
    ) -> Result<bool, ModelError> {
        let (entry, capacity) = stack_entry(model, name)?;
        // Type errors surface even when the push would be refused.
        let bits = value.encode(entry.ty)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        let first = entry.first_slot as usize;
        // SAFETY: count cell and element cells are in range; see module note.
        unsafe {
            let count = read_cell(base, first) as usize;
            debug_assert!(count <= capacity);
            if count == capacity {
                return Ok(false);
            }
            write_cell(base, first + 1 + count, bits);
            write_cell(base, first, count as u64 + 1);
        }
        Ok(true)
    }

    /// Pop the most recently pushed value, or `None` when empty. The popped
    /// cell is cleared.
    pub fn stack_pop(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
    ) -> Result<Option<SlotValue>, ModelError> {
        let (entry, capacity) = stack_entry(model, name)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        let first = entry.first_slot as usize;
        // SAFETY: as in `stack_push`.
        unsafe {
            let count = read_cell(base, first) as usize;
            debug_assert!(count <= capacity);
            if count < 1 {
                return Ok(None);
            }
            let bits = read_cell(base, first + count);
            write_cell(base, first + count, 0);
            write_cell(base, first, count as u64 - 1);
            Ok(Some(SlotValue::decode(bits, entry.ty)))
        }
    }

    /// Pop with a fallback instead of an option. Same strict emptiness guard
    /// as `stack_pop`: a single-element stack pops its last element.
    pub fn stack_pop_or(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        default_if_empty: SlotValue,
    ) -> Result<SlotValue, ModelError> {
        Ok(self.stack_pop(model, handle, name)?.unwrap_or(default_if_empty))
    }

    /// Pop `n` values at once. Returns false (without mutating) when fewer
    /// than `n` are populated; the popped cells are cleared.
    pub fn stack_pop_n(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        n: usize,
    ) -> Result<bool, ModelError> {
        let (entry, capacity) = stack_entry(model, name)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        let first = entry.first_slot as usize;
        // SAFETY: as in `stack_push`.
        unsafe {
            let count = read_cell(base, first) as usize;
            debug_assert!(count <= capacity);
            if count < n {
                return Ok(false);
            }
            for i in (count - n)..count {
                write_cell(base, first + 1 + i, 0);
            }
            write_cell(base, first, (count - n) as u64);
        }
        Ok(true)
    }

    /// Read the top value without mutating, or `None` when empty.
    pub fn stack_peek(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
    ) -> Result<Option<SlotValue>, ModelError> {
        let (entry, capacity) = stack_entry(model, name)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        let first = entry.first_slot as usize;
        // SAFETY: as in `stack_push`.
        unsafe {
            let count = read_cell(base, first) as usize;
            debug_assert!(count <= capacity);
            if count < 1 {
                return Ok(None);
            }
            let bits = read_cell(base, first + count);
            Ok(Some(SlotValue::decode(bits, entry.ty)))
        }
    }

    /// Peek with a fallback instead of an option.
    pub fn stack_peek_or(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        default_if_empty: SlotValue,
    ) -> Result<SlotValue, ModelError> {
        Ok(self
            .stack_peek(model, handle, name)?
            .unwrap_or(default_if_empty))
    }
}
