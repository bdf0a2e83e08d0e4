use crate::diag::DiagnosticSink;
use crate::error::ModelError;
use crate::layout::StorageRecord;
use crate::schema::{FieldKind, GolemSchema, Mutability, RawObjectSpec, Scope, Visibility};
use crate::slot_value::SlotTy;
use crate::spec_parse::parse_spec;
use log::debug;
use smol_str::{format_smolstr, SmolStr};
use std::sync::Arc;
use xxhash_rust::xxh64::xxh64;

// ─── Generated declarations ─────────────────────────────────────────────────

/// What a generated operation is. This is the host-facing declaration set:
/// the host maps each entry onto its own declaration representation, and the
/// runtime in `golem_object` gives every kind its behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Allocate,
    AllocateUninitialized,
    FromExternalStorage,
    Deallocate,
    Identity,
    Exists,
    AssertExists,
    AssertNotExists,
    Getter,
    Setter,
    /// Deliberate escape hatch: writes an immutable member, bypassing the
    /// declared immutability.
    ForceSetter,
    Initializer,
    ArrayIndex,
    /// Compile-time element count, exposed as a named constant.
    ArrayCount,
    StackPush,
    StackPop,
    StackPopN,
    StackPeek,
    StackInitialize,
    StackCount,
    StackCapacity,
    Upcast,
    Downcast,
    /// Read-only accessor producing an alternate offset view.
    AltView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDecl {
    pub name: SmolStr,
    pub op: OpKind,
    pub visibility: Scope,
    pub field: Option<SmolStr>,
}

// ─── Field index ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    Array { len: u32 },
    Stack { capacity: u32 },
}

/// Resolved access path of one member: where its cells sit and how they may
/// be touched. Entries are sorted by name hash for the lookup below.
#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub name_hash: u64,
    pub name: SmolStr,
    pub first_slot: u32,
    pub shape: FieldShape,
    pub ty: SlotTy,
    pub type_ref: SmolStr,
    pub mutability: Mutability,
    pub visibility: Visibility,
}

// ─── GolemModel ─────────────────────────────────────────────────────────────

/// A compiled schema: storage record, hash-indexed access paths, and the
/// generated declaration set. Base resolution happens at registration with a
/// `GolemRuntime`, which verifies the prefix contract and fills `base` /
/// `root_id`.
#[derive(Debug, Clone)]
pub struct GolemModel {
    schema: GolemSchema,
    record: StorageRecord,
    fields: Vec<FieldEntry>,
    decls: Vec<GeneratedDecl>,
    type_hash: u64,
    pub(crate) base: Option<Arc<GolemModel>>,
    pub(crate) root_id: u64,
}

/// Compile a raw specification into a model. All validation failures go to
/// the sink; any failure yields `None` and no declarations.
pub fn compile(raw: &RawObjectSpec, sink: &mut dyn DiagnosticSink) -> Option<GolemModel> {
    let schema = parse_spec(raw, sink)?;
    let record = StorageRecord::synthesize(&schema);
    Some(GolemModel::new(schema, record))
}

impl GolemModel {
    pub(crate) fn new(schema: GolemSchema, record: StorageRecord) -> GolemModel {
        let mut fields = Vec::with_capacity(schema.fields.len());
        let mut cursor: u32 = 0;
        for field in &schema.fields {
            let (shape, span) = match &field.kind {
                FieldKind::Scalar(_) => (FieldShape::Scalar, 1),
                FieldKind::FixedArray { count, .. } => (
                    FieldShape::Array {
                        len: *count as u32,
                    },
                    *count as u32,
                ),
                FieldKind::FixedStack { capacity, .. } => (
                    FieldShape::Stack {
                        capacity: *capacity as u32,
                    },
                    *capacity as u32 + 1,
                ),
            };
            fields.push(FieldEntry {
                name_hash: xxh64(field.name.as_bytes(), 0),
                name: field.name.clone(),
                first_slot: cursor,
                shape,
                ty: SlotTy::classify(field.kind.type_ref()),
                type_ref: field.kind.type_ref().clone(),
                mutability: field.mutability,
                visibility: field.visibility,
            });
            cursor += span;
        }
        // Sorted by hash for the linear/binary lookup.
        fields.sort_unstable_by_key(|e| e.name_hash);

        let decls = build_decls(&schema);
        let type_hash = xxh64(schema.type_name.as_bytes(), 0);
        debug!(
            "compiled model {}: {} decls over {} cells",
            schema.type_name,
            decls.len(),
            record.slot_count()
        );
        GolemModel {
            schema,
            record,
            fields,
            decls,
            type_hash,
            base: None,
            root_id: type_hash,
        }
    }

    #[inline]
    pub fn type_name(&self) -> &SmolStr {
        &self.schema.type_name
    }

    #[inline]
    pub fn schema(&self) -> &GolemSchema {
        &self.schema
    }

    #[inline]
    pub fn record(&self) -> &StorageRecord {
        &self.record
    }

    #[inline]
    pub fn decls(&self) -> &[GeneratedDecl] {
        &self.decls
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.record.slot_count()
    }

    #[inline]
    pub fn type_hash(&self) -> u64 {
        self.type_hash
    }

    /// Registry identifier of the root schema: own hash for a root model, the
    /// root-most base's hash once registered.
    #[inline]
    pub fn root_id(&self) -> u64 {
        self.root_id
    }

    #[inline]
    pub fn base_model(&self) -> Option<&Arc<GolemModel>> {
        self.base.as_ref()
    }

    #[inline]
    pub fn is_derived(&self) -> bool {
        self.schema.base.is_some()
    }

    #[inline]
    pub(crate) fn entries(&self) -> &[FieldEntry] {
        &self.fields
    }

    /// Find a member's access path. Linear scan up to 4 members, binary
    /// search above that; the index is hash-sorted.
    pub fn field(&self, name: &str) -> Result<&FieldEntry, ModelError> {
        let hash = xxh64(name.as_bytes(), 0);
        let n = self.fields.len();
        if n == 0 {
            return Err(ModelError::FieldNotFound);
        }
        if n <= 4 {
            return self
                .fields
                .iter()
                .find(|e| e.name_hash == hash)
                .ok_or(ModelError::FieldNotFound);
        }
        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.fields[mid].name_hash.cmp(&hash) {
                std::cmp::Ordering::Equal => return Ok(&self.fields[mid]),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Err(ModelError::FieldNotFound)
    }

    /// Compile-time element count of a fixed-array member.
    pub fn array_len(&self, name: &str) -> Result<usize, ModelError> {
        match self.field(name)?.shape {
            FieldShape::Array { len } => Ok(len as usize),
            _ => Err(ModelError::KindMismatch {
                member: SmolStr::new(name),
                expected: "fixed-array",
            }),
        }
    }

    /// Compile-time capacity of a fixed-stack member.
    pub fn stack_capacity(&self, name: &str) -> Result<usize, ModelError> {
        match self.field(name)?.shape {
            FieldShape::Stack { capacity } => Ok(capacity as usize),
            _ => Err(ModelError::KindMismatch {
                member: SmolStr::new(name),
                expected: "fixed-stack",
            }),
        }
    }
}

// ─── Declaration building ───────────────────────────────────────────────────

fn build_decls(schema: &GolemSchema) -> Vec<GeneratedDecl> {
    let root_vis = if schema.is_public_root {
        Scope::Public
    } else {
        Scope::Internal
    };
    let lifecycle = |name: &str, op: OpKind| GeneratedDecl {
        name: SmolStr::new(name),
        op,
        visibility: root_vis,
        field: None,
    };

    let mut decls = vec![
        lifecycle("allocate", OpKind::Allocate),
        lifecycle("allocate_uninitialized", OpKind::AllocateUninitialized),
        lifecycle("from_external_storage", OpKind::FromExternalStorage),
        lifecycle("deallocate", OpKind::Deallocate),
        lifecycle("identity", OpKind::Identity),
        lifecycle("exists", OpKind::Exists),
        lifecycle("assert_exists", OpKind::AssertExists),
        lifecycle("assert_not_exists", OpKind::AssertNotExists),
    ];
    if schema.base.is_some() {
        decls.push(lifecycle("upcast", OpKind::Upcast));
        decls.push(lifecycle("downcast", OpKind::Downcast));
    }

    for field in &schema.fields {
        let name = &field.name;
        let member = |decl_name: SmolStr, op: OpKind, visibility: Scope| GeneratedDecl {
            name: decl_name,
            op,
            visibility,
            field: Some(name.clone()),
        };
        let get_vis = field.visibility.get;
        let set_vis = field.visibility.set;
        match &field.kind {
            FieldKind::Scalar(_) => {
                decls.push(member(name.clone(), OpKind::Getter, get_vis));
                match field.mutability {
                    Mutability::Mutable => {
                        decls.push(member(format_smolstr!("set_{}", name), OpKind::Setter, set_vis));
                    }
                    Mutability::Immutable => {
                        decls.push(member(
                            format_smolstr!("force_set_{}", name),
                            OpKind::ForceSetter,
                            set_vis,
                        ));
                    }
                }
                decls.push(member(
                    format_smolstr!("initialize_{}", name),
                    OpKind::Initializer,
                    set_vis,
                ));
            }
            FieldKind::FixedArray { .. } => {
                decls.push(member(format_smolstr!("{}_at", name), OpKind::ArrayIndex, get_vis));
                decls.push(member(
                    format_smolstr!("{}_count", name),
                    OpKind::ArrayCount,
                    get_vis,
                ));
                decls.push(member(
                    format_smolstr!("initialize_{}", name),
                    OpKind::Initializer,
                    set_vis,
                ));
            }
            FieldKind::FixedStack { .. } => {
                decls.push(member(format_smolstr!("push_{}", name), OpKind::StackPush, set_vis));
                decls.push(member(format_smolstr!("pop_{}", name), OpKind::StackPop, set_vis));
                decls.push(member(
                    format_smolstr!("pop_n_{}", name),
                    OpKind::StackPopN,
                    set_vis,
                ));
                decls.push(member(format_smolstr!("peek_{}", name), OpKind::StackPeek, get_vis));
                decls.push(member(
                    format_smolstr!("initialize_{}", name),
                    OpKind::StackInitialize,
                    set_vis,
                ));
                decls.push(member(
                    format_smolstr!("{}_count", name),
                    OpKind::StackCount,
                    get_vis,
                ));
                decls.push(member(
                    format_smolstr!("{}_capacity", name),
                    OpKind::StackCapacity,
                    get_vis,
                ));
            }
        }
    }
    decls
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::DiagnosticLog;
    use crate::golem_members;
    use crate::schema::{array, stack};

    fn compiled(members: Vec<crate::schema::RawMember>) -> GolemModel {
        let raw = RawObjectSpec::record("Probe", members);
        let mut log = DiagnosticLog::new();
        let model = compile(&raw, &mut log);
        assert!(log.is_empty(), "unexpected diagnostics: {:?}", log.diagnostics());
        model.unwrap()
    }

    fn decl<'m>(model: &'m GolemModel, name: &str) -> Option<&'m GeneratedDecl> {
        model.decls().iter().find(|d| d.name == name)
    }

    #[test]
    fn test_setter_only_for_mutable_members() {
        let model = compiled(golem_members! {
            "mutable y" => "Int",
            "immutable x" => "Double",
        });
        assert_eq!(decl(&model, "set_y").unwrap().op, OpKind::Setter);
        assert!(decl(&model, "set_x").is_none());
        assert_eq!(decl(&model, "force_set_x").unwrap().op, OpKind::ForceSetter);
        assert!(decl(&model, "force_set_y").is_none());
    }

    #[test]
    fn test_casts_generated_only_with_base() {
        let root = compiled(golem_members! { "mutable y" => "Int" });
        assert!(decl(&root, "upcast").is_none());
        assert!(decl(&root, "downcast").is_none());

        let raw = RawObjectSpec::record("Derived", golem_members! { "mutable y" => "Int" })
            .with_base("Probe");
        let mut log = DiagnosticLog::new();
        let derived = compile(&raw, &mut log).unwrap();
        assert!(derived.is_derived());
        assert_eq!(decl(&derived, "upcast").unwrap().op, OpKind::Upcast);
        assert_eq!(decl(&derived, "downcast").unwrap().op, OpKind::Downcast);
    }

    #[test]
    fn test_member_decl_visibility() {
        let model = compiled(golem_members! {
            "public private(set) mutable y" => "Int",
            "private immutable x" => "Double",
        });
        let getter = decl(&model, "y").unwrap();
        let setter = decl(&model, "set_y").unwrap();
        assert_eq!(getter.visibility, Scope::Public);
        assert_eq!(setter.visibility, Scope::Private);
        assert_eq!(decl(&model, "x").unwrap().visibility, Scope::Private);
    }

    #[test]
    fn test_lifecycle_visibility_follows_root_flag() {
        let raw = RawObjectSpec::record("Probe", golem_members! { "mutable y" => "Int" }).public();
        let mut log = DiagnosticLog::new();
        let model = compile(&raw, &mut log).unwrap();
        assert_eq!(decl(&model, "allocate").unwrap().visibility, Scope::Public);

        let model = compiled(golem_members! { "mutable y" => "Int" });
        assert_eq!(decl(&model, "allocate").unwrap().visibility, Scope::Internal);
    }

    #[test]
    fn test_stack_and_array_decls() {
        let model = compiled(golem_members! {
            "mutable ring" => array("Int", 4),
            "mutable pending" => stack("Int", 2),
        });
        assert_eq!(decl(&model, "ring_at").unwrap().op, OpKind::ArrayIndex);
        assert_eq!(decl(&model, "ring_count").unwrap().op, OpKind::ArrayCount);
        assert_eq!(decl(&model, "push_pending").unwrap().op, OpKind::StackPush);
        assert_eq!(decl(&model, "pending_capacity").unwrap().op, OpKind::StackCapacity);
        assert_eq!(model.array_len("ring").unwrap(), 4);
        assert_eq!(model.stack_capacity("pending").unwrap(), 2);
        assert!(model.array_len("pending").is_err());
    }

    #[test]
    fn test_field_lookup_small_and_large() {
        // ≤4 members: linear path.
        let small = compiled(golem_members! {
            "mutable a" => "Int",
            "mutable b" => "Int",
        });
        assert_eq!(small.field("b").unwrap().name, "b");
        assert!(matches!(
            small.field("zz"),
            Err(ModelError::FieldNotFound)
        ));

        // >4 members: binary search path over the hash-sorted index.
        let members: Vec<crate::schema::RawMember> = (0..9)
            .map(|i| crate::schema::RawMember {
                key: format!("mutable f{}", i),
                descriptor: crate::schema::plain("Int"),
                at: Default::default(),
            })
            .collect();
        let large = compiled(members);
        for i in 0..9 {
            let name = format!("f{}", i);
            assert_eq!(large.field(&name).unwrap().name, name.as_str());
        }
        assert!(large.field("f9").is_err());
    }

    #[test]
    fn test_access_paths_follow_declaration_order() {
        let model = compiled(golem_members! {
            "mutable head" => "Int",
            "mutable ring" => array("Int", 3),
            "mutable pending" => stack("Int", 2),
            "mutable tail" => "Int",
        });
        assert_eq!(model.field("head").unwrap().first_slot, 0);
        assert_eq!(model.field("ring").unwrap().first_slot, 1);
        assert_eq!(model.field("pending").unwrap().first_slot, 4);
        assert_eq!(model.field("tail").unwrap().first_slot, 7);
        assert_eq!(model.slot_count(), 8);
    }

    #[test]
    fn test_compile_reports_and_returns_nothing_on_error() {
        let raw = RawObjectSpec::record(
            "Probe",
            golem_members! {
                "mutable x" => "Int",
                "mutable x" => "Int",
            },
        );
        let mut log = DiagnosticLog::new();
        assert!(compile(&raw, &mut log).is_none());
        assert_eq!(log.count_of("member_name_collision"), 1);
    }
}
