use super::runtime::{read_cell, write_cell, GolemRuntime, ObjectHandle};
use crate::error::ModelError;
use crate::model::{FieldEntry, FieldShape, GolemModel};
use crate::schema::Mutability;
use crate::slot_value::SlotValue;

fn scalar_entry<'m>(model: &'m GolemModel, name: &str) -> Result<&'m FieldEntry, ModelError> {
    let entry = model.field(name)?;
    if entry.shape != FieldShape::Scalar {
        return Err(ModelError::KindMismatch {
            member: entry.name.clone(),
            expected: "scalar",
        });
    }
    Ok(entry)
}

fn array_entry<'m>(
    model: &'m GolemModel,
    name: &str,
) -> Result<(&'m FieldEntry, usize), ModelError> {
    let entry = model.field(name)?;
    match entry.shape {
        FieldShape::Array { len } => Ok((entry, len as usize)),
        _ => Err(ModelError::KindMismatch {
            member: entry.name.clone(),
            expected: "fixed-array",
        }),
    }
}

impl GolemRuntime {
    // ════════════════════════════════════════════════════════════════════════
    // Scalar member access
    // ════════════════════════════════════════════════════════════════════════

    /// Read a scalar member straight out of its cell.
    #[inline]
    pub fn get(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
    ) -> Result<SlotValue, ModelError> {
        let entry = scalar_entry(model, name)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        // SAFETY: first_slot < slot_count by construction; handle points at a
        // record of this model's shape per the lifecycle contract.
        let bits = unsafe { read_cell(base, entry.first_slot as usize) };
        Ok(SlotValue::decode(bits, entry.ty))
    }

    /// Write a mutable scalar member in place.
    #[inline]
    pub fn set(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        value: SlotValue,
    ) -> Result<(), ModelError> {
        let entry = scalar_entry(model, name)?;
        if entry.mutability == Mutability::Immutable {
            return Err(ModelError::ImmutableField(entry.name.clone()));
        }
        self.write_scalar(model, handle, entry, value)
    }

    /// Write an immutable scalar member anyway, bypassing the declared
    /// immutability. The guarantee is gone the moment a caller reaches for
    /// this.
    #[inline]
    pub fn force_set(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        value: SlotValue,
    ) -> Result<(), ModelError> {
        let entry = scalar_entry(model, name)?;
        self.write_scalar(model, handle, entry, value)
    }

    /// First write of a scalar member on storage from
    /// `allocate_uninitialized`. Must run exactly once per member before its
    /// first read; mutability is not consulted (immutable members need their
    /// one write too).
    #[inline]
    pub fn initialize_field(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        value: SlotValue,
    ) -> Result<(), ModelError> {
        let entry = scalar_entry(model, name)?;
        self.write_scalar(model, handle, entry, value)
    }

    fn write_scalar(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        entry: &FieldEntry,
        value: SlotValue,
    ) -> Result<(), ModelError> {
        let bits = value.encode(entry.ty)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        // SAFETY: as in `get`.
        unsafe { write_cell(base, entry.first_slot as usize, bits) };
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Fixed-array element access
    // ════════════════════════════════════════════════════════════════════════
    //
    // Elements are read and written directly, with no bounds check in release
    // builds: bounds are the caller's responsibility. The debug assertion
    // below is the only net.

    #[inline]
    pub fn array_get(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        index: usize,
    ) -> Result<SlotValue, ModelError> {
        let (entry, len) = array_entry(model, name)?;
        debug_assert!(index < len, "array index {index} out of bounds ({len})");
        let base = handle.base();
        self.accessor_check(model, base as usize);
        // SAFETY: element slots are first_slot..first_slot+len, in range.
        let bits = unsafe { read_cell(base, entry.first_slot as usize + index) };
        Ok(SlotValue::decode(bits, entry.ty))
    }

    #[inline]
    pub fn array_set(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        index: usize,
        value: SlotValue,
    ) -> Result<(), ModelError> {
        let (entry, len) = array_entry(model, name)?;
        if entry.mutability == Mutability::Immutable {
            return Err(ModelError::ImmutableField(entry.name.clone()));
        }
        debug_assert!(index < len, "array index {index} out of bounds ({len})");
        let bits = value.encode(entry.ty)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        // SAFETY: as in `array_get`.
        unsafe { write_cell(base, entry.first_slot as usize + index, bits) };
        Ok(())
    }

    /// In-place first write of one element on uninitialized storage.
    /// Mutability is not consulted.
    #[inline]
    pub fn array_initialize(
        &self,
        model: &GolemModel,
        handle: ObjectHandle,
        name: &str,
        index: usize,
        value: SlotValue,
    ) -> Result<(), ModelError> {
        let (entry, len) = array_entry(model, name)?;
        debug_assert!(index < len, "array index {index} out of bounds ({len})");
        let bits = value.encode(entry.ty)?;
        let base = handle.base();
        self.accessor_check(model, base as usize);
        // SAFETY: as in `array_get`.
        unsafe { write_cell(base, entry.first_slot as usize + index, bits) };
        Ok(())
    }
}
