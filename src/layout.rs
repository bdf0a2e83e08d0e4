use crate::schema::{FieldKind, GolemSchema};
use crate::slot_value::SlotTy;
use log::debug;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

// ─── Storage Layout ─────────────────────────────────────────────────────────
//
//  One record = consecutive 8-byte cells, declaration order:
//
//  ┌─────────────────────────────────────────────┐
//  │ scalar field         → 1 cell               │
//  ├─────────────────────────────────────────────┤
//  │ fixed array, count N → N cells (Elem 0..N)  │
//  │   element count is a named constant,        │
//  │   never stored                              │
//  ├─────────────────────────────────────────────┤
//  │ fixed stack, cap C   → 1 Count cell (u64)   │
//  │                      + C cells (Elem 0..C)  │
//  └─────────────────────────────────────────────┘

pub const CELL_SIZE: usize = 8;

/// Synthetic type reference carried by a stack's count cell.
const COUNT_TYPE_REF: &str = "UInt64";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotRole {
    Scalar,
    Elem(u32),
    Count,
}

/// One primitive cell of the synthesized layout, tagged with the member that
/// owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub owner: SmolStr,
    pub role: SlotRole,
    pub ty: SlotTy,
    pub type_ref: SmolStr,
}

/// The single storage representation of a schema: a linear record of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    slots: Vec<Slot>,
    bare: bool,
}

impl StorageRecord {
    /// Map a schema onto its storage record.
    pub fn synthesize(schema: &GolemSchema) -> StorageRecord {
        let mut slots = Vec::new();
        for field in &schema.fields {
            match &field.kind {
                FieldKind::Scalar(ty) => {
                    slots.push(Slot {
                        owner: field.name.clone(),
                        role: SlotRole::Scalar,
                        ty: SlotTy::classify(ty),
                        type_ref: ty.clone(),
                    });
                }
                FieldKind::FixedArray { of, count } => {
                    let ty = SlotTy::classify(of);
                    for i in 0..*count {
                        slots.push(Slot {
                            owner: field.name.clone(),
                            role: SlotRole::Elem(i as u32),
                            ty,
                            type_ref: of.clone(),
                        });
                    }
                }
                FieldKind::FixedStack { of, capacity } => {
                    slots.push(Slot {
                        owner: field.name.clone(),
                        role: SlotRole::Count,
                        ty: SlotTy::U64,
                        type_ref: SmolStr::new(COUNT_TYPE_REF),
                    });
                    let ty = SlotTy::classify(of);
                    for i in 0..*capacity {
                        slots.push(Slot {
                            owner: field.name.clone(),
                            role: SlotRole::Elem(i as u32),
                            ty,
                            type_ref: of.clone(),
                        });
                    }
                }
            }
        }
        // With a single scalar member the record degenerates to that member's
        // raw cell, no aggregate wrapping.
        let bare =
            schema.fields.len() == 1 && matches!(schema.fields[0].kind, FieldKind::Scalar(_));
        debug!(
            "synthesized layout for {}: {} cells{}",
            schema.type_name,
            slots.len(),
            if bare { " (bare)" } else { "" }
        );
        StorageRecord { slots, bare }
    }

    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// True when the record is a single scalar member's raw cell.
    #[inline]
    pub fn is_bare(&self) -> bool {
        self.bare
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.slots.len() * CELL_SIZE
    }

    /// Literal prefix compatibility: every one of `self`'s slots equals the
    /// slot at the same position in `other`. This is what makes address
    /// reinterpretation between base and derived records legal.
    pub fn is_prefix_of(&self, other: &StorageRecord) -> bool {
        self.slots.len() <= other.slots.len()
            && self
                .slots
                .iter()
                .zip(other.slots.iter())
                .all(|(a, b)| a == b)
    }

}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::DiagnosticLog;
    use crate::golem_members;
    use crate::schema::{array, stack, RawObjectSpec};
    use crate::spec_parse::parse_spec;

    fn layout_of(members: Vec<crate::schema::RawMember>) -> StorageRecord {
        let raw = RawObjectSpec::record("Probe", members);
        let mut log = DiagnosticLog::new();
        let schema = parse_spec(&raw, &mut log).unwrap();
        StorageRecord::synthesize(&schema)
    }

    #[test]
    fn test_scalar_fields_map_one_to_one() {
        let record = layout_of(golem_members! {
            "mutable y" => "Int",
            "immutable x" => "Double",
        });
        assert_eq!(record.slot_count(), 2);
        assert!(!record.is_bare());
        assert_eq!(record.slots()[0].owner, "y");
        assert_eq!(record.slots()[0].ty, SlotTy::I64);
        assert_eq!(record.slots()[1].owner, "x");
        assert_eq!(record.slots()[1].ty, SlotTy::F64);
        assert_eq!(record.byte_len(), 16);
    }

    #[test]
    fn test_single_scalar_degenerates_to_bare_cell() {
        let record = layout_of(golem_members! { "mutable y" => "Int" });
        assert!(record.is_bare());
        assert_eq!(record.slot_count(), 1);
    }

    #[test]
    fn test_single_array_is_not_bare() {
        let record = layout_of(golem_members! { "mutable ring" => array("Int", 3) });
        assert!(!record.is_bare());
    }

    #[test]
    fn test_array_expands_to_consecutive_slots() {
        let record = layout_of(golem_members! {
            "mutable head" => "Int",
            "mutable ring" => array("Double", 3),
        });
        assert_eq!(record.slot_count(), 4);
        for (i, slot) in record.slots()[1..].iter().enumerate() {
            assert_eq!(slot.owner, "ring");
            assert_eq!(slot.role, SlotRole::Elem(i as u32));
            assert_eq!(slot.ty, SlotTy::F64);
        }
    }

    #[test]
    fn test_stack_gets_leading_count_slot() {
        let record = layout_of(golem_members! { "mutable pending" => stack("Int", 2) });
        assert_eq!(record.slot_count(), 3);
        assert_eq!(record.slots()[0].role, SlotRole::Count);
        assert_eq!(record.slots()[0].ty, SlotTy::U64);
        assert_eq!(record.slots()[1].role, SlotRole::Elem(0));
        assert_eq!(record.slots()[2].role, SlotRole::Elem(1));
    }

    #[test]
    fn test_prefix_compatibility() {
        let base = layout_of(golem_members! {
            "mutable y" => "Int",
            "immutable x" => "Double",
        });
        let derived = layout_of(golem_members! {
            "mutable y" => "Int",
            "immutable x" => "Double",
            "mutable z" => "Bool",
        });
        let unrelated = layout_of(golem_members! {
            "mutable y" => "Double",
            "immutable x" => "Double",
        });
        assert!(base.is_prefix_of(&derived));
        assert!(base.is_prefix_of(&base));
        assert!(!derived.is_prefix_of(&base));
        assert!(!base.is_prefix_of(&unrelated));
        assert!(!unrelated.is_prefix_of(&derived));
    }

    #[test]
    fn test_opaque_type_refs_are_echoed() {
        let record = layout_of(golem_members! { "immutable cb" => "(Int) -> Bool" });
        assert_eq!(record.slots()[0].ty, SlotTy::Opaque);
        assert_eq!(record.slots()[0].type_ref, "(Int) -> Bool");
    }
}
