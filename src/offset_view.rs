use crate::diag::{Diagnostic, DiagnosticSink, SourceRef};
use crate::error::ModelError;
use crate::golem_object::ObjectHandle;
use crate::model::{GeneratedDecl, OpKind};
use crate::schema::Scope;
use crate::spec_parse::is_identifier;
use log::debug;
use smol_str::{format_smolstr, SmolStr};
use std::ptr::NonNull;

// ─── OffsetView ─────────────────────────────────────────────────────────────

/// A typed window over an opaque byte region: a non-owning origin plus signed
/// byte offsets. Two views rebased against each other alias the same bytes
/// (one may read forward from its origin while the other looks backward) and
/// both observe the same writes. No ownership, no liveness tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetView {
    origin: NonNull<u8>,
}

impl OffsetView {
    #[inline]
    pub fn new(origin: NonNull<u8>) -> Self {
        OffsetView { origin }
    }

    /// View over an object's storage. Panics on an invalidated handle.
    #[inline]
    pub fn from_handle(handle: ObjectHandle) -> Self {
        // SAFETY: a live handle's base is never null.
        OffsetView {
            origin: unsafe { NonNull::new_unchecked(handle.base()) },
        }
    }

    #[inline]
    pub fn origin_addr(&self) -> usize {
        self.origin.as_ptr() as usize
    }

    /// The alternate view: same region, origin shifted by `delta` bytes.
    /// Negative deltas build backward-looking views sharing an anchor.
    #[inline]
    pub fn rebased(&self, delta: isize) -> OffsetView {
        let shifted = self.origin.as_ptr().wrapping_offset(delta);
        debug_assert!(!shifted.is_null());
        // SAFETY: rebasing stays inside one allocated region, which never
        // contains address zero.
        OffsetView {
            origin: unsafe { NonNull::new_unchecked(shifted) },
        }
    }

    /// Reinterpret `origin + offset` as a `T` and read it (unaligned).
    ///
    /// # Safety
    /// `origin + offset .. origin + offset + size_of::<T>()` must lie inside
    /// one allocated region holding a valid bit pattern for `T`.
    #[inline]
    pub unsafe fn read<T: Copy>(&self, offset: isize) -> T {
        // SAFETY: per the caller contract; unaligned because offsets are
        // arbitrary byte distances.
        unsafe { self.origin.as_ptr().offset(offset).cast::<T>().read_unaligned() }
    }

    /// Reinterpret `origin + offset` as a `T` and write it (unaligned).
    ///
    /// # Safety
    /// Same contract as [`OffsetView::read`], plus write permission for the
    /// region.
    #[inline]
    pub unsafe fn write<T: Copy>(&self, offset: isize, value: T) {
        // SAFETY: per the caller contract.
        unsafe {
            self.origin
                .as_ptr()
                .offset(offset)
                .cast::<T>()
                .write_unaligned(value)
        }
    }

    /// Raw pointer at `origin + offset`.
    ///
    /// # Safety
    /// `offset` must stay inside the region the origin points into.
    #[inline]
    pub unsafe fn ptr_at(&self, offset: isize) -> *mut u8 {
        // SAFETY: per the caller contract.
        unsafe { self.origin.as_ptr().offset(offset) }
    }
}

// ─── View specification → declarations ──────────────────────────────────────

/// A member stored at a fixed byte offset from the view's origin.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetField {
    pub name: SmolStr,
    pub type_ref: SmolStr,
    pub offset: isize,
    pub at: SourceRef,
}

/// An alternate view starting at a (possibly negative) offset from the
/// origin.
#[derive(Debug, Clone, PartialEq)]
pub struct AltViewField {
    pub name: SmolStr,
    pub view_type: SmolStr,
    pub start_offset: isize,
    pub at: SourceRef,
}

/// Raw specification of one offset-view type, as the host hands it over.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub name: SmolStr,
    pub is_public: bool,
    pub fields: Vec<OffsetField>,
    pub alt_views: Vec<AltViewField>,
    pub at: SourceRef,
}

/// Compiled offset-view type: resolved offsets plus the generated accessor
/// declarations (a get/set pair per offset member, a read-only accessor per
/// alternate view).
#[derive(Debug, Clone)]
pub struct ViewModel {
    name: SmolStr,
    fields: Vec<OffsetField>,
    alt_views: Vec<AltViewField>,
    decls: Vec<GeneratedDecl>,
}

impl ViewModel {
    #[inline]
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    #[inline]
    pub fn decls(&self) -> &[GeneratedDecl] {
        &self.decls
    }

    pub fn field_offset(&self, name: &str) -> Option<isize> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.offset)
    }

    pub fn alt_view_offset(&self, name: &str) -> Option<isize> {
        self.alt_views
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.start_offset)
    }

    /// Build the alternate view declared under `name` over `view`'s region.
    pub fn alt_view(&self, view: OffsetView, name: &str) -> Option<OffsetView> {
        Some(view.rebased(self.alt_view_offset(name)?))
    }
}

/// Validate a view specification into a model. Same reporting contract as
/// the object compiler: every failure goes to the sink, any failure yields
/// `None`.
pub fn compile_view(spec: &ViewSpec, sink: &mut dyn DiagnosticSink) -> Option<ViewModel> {
    let mut clean = true;
    let emit = |sink: &mut dyn DiagnosticSink, error: &ModelError, at: SourceRef| {
        sink.report(Diagnostic::new(error, at));
    };

    let names: Vec<(SmolStr, SourceRef)> = spec
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.at))
        .chain(spec.alt_views.iter().map(|v| (v.name.clone(), v.at)))
        .collect();

    for (name, at) in &names {
        if !is_identifier(name) {
            emit(
                sink,
                &ModelError::MalformedFieldName(name.to_string()),
                *at,
            );
            clean = false;
        }
    }
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            if names[i].0 == names[j].0 {
                emit(sink, &ModelError::NameCollision(names[i].0.clone()), names[j].1);
                clean = false;
            }
        }
    }
    if !clean {
        return None;
    }

    let vis = if spec.is_public {
        Scope::Public
    } else {
        Scope::Internal
    };
    let mut decls = Vec::new();
    for field in &spec.fields {
        decls.push(GeneratedDecl {
            name: field.name.clone(),
            op: OpKind::Getter,
            visibility: vis,
            field: Some(field.name.clone()),
        });
        decls.push(GeneratedDecl {
            name: format_smolstr!("set_{}", field.name),
            op: OpKind::Setter,
            visibility: vis,
            field: Some(field.name.clone()),
        });
    }
    for alt in &spec.alt_views {
        decls.push(GeneratedDecl {
            name: alt.name.clone(),
            op: OpKind::AltView,
            visibility: vis,
            field: Some(alt.name.clone()),
        });
    }
    debug!("compiled view {}: {} decls", spec.name, decls.len());

    Some(ViewModel {
        name: spec.name.clone(),
        fields: spec.fields.clone(),
        alt_views: spec.alt_views.clone(),
        decls,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::DiagnosticLog;

    fn field(name: &str, type_ref: &str, offset: isize) -> OffsetField {
        OffsetField {
            name: SmolStr::new(name),
            type_ref: SmolStr::new(type_ref),
            offset,
            at: SourceRef::default(),
        }
    }

    fn spec_with(fields: Vec<OffsetField>, alt_views: Vec<AltViewField>) -> ViewSpec {
        ViewSpec {
            name: SmolStr::new("FrameView"),
            is_public: false,
            fields,
            alt_views,
            at: SourceRef::default(),
        }
    }

    #[test]
    fn test_view_decls() {
        let spec = spec_with(
            vec![field("seq", "UInt64", 0), field("len", "UInt64", 8)],
            vec![AltViewField {
                name: SmolStr::new("header"),
                view_type: SmolStr::new("HeaderView"),
                start_offset: -16,
                at: SourceRef::default(),
            }],
        );
        let mut log = DiagnosticLog::new();
        let model = compile_view(&spec, &mut log).unwrap();
        assert!(log.is_empty());
        let names: Vec<&str> = model.decls().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["seq", "set_seq", "len", "set_len", "header"]);
        assert_eq!(model.decls()[4].op, OpKind::AltView);
        assert_eq!(model.field_offset("len"), Some(8));
        assert_eq!(model.alt_view_offset("header"), Some(-16));
    }

    #[test]
    fn test_view_name_collisions_reported() {
        let spec = spec_with(
            vec![field("seq", "UInt64", 0), field("seq", "UInt64", 8)],
            vec![AltViewField {
                name: SmolStr::new("9bad"),
                view_type: SmolStr::new("X"),
                start_offset: 0,
                at: SourceRef::default(),
            }],
        );
        let mut log = DiagnosticLog::new();
        assert!(compile_view(&spec, &mut log).is_none());
        assert_eq!(log.count_of("member_name_collision"), 1);
        assert_eq!(log.count_of("malformed_member_name"), 1);
    }

    #[test]
    fn test_typed_window_reads_and_writes() {
        let mut region = [0u8; 64];
        let view = OffsetView::new(NonNull::from(&mut region[0]));
        unsafe {
            view.write::<u64>(0, 0xfeed_beef);
            view.write::<u32>(9, 77); // unaligned offset
            assert_eq!(view.read::<u64>(0), 0xfeed_beef);
            assert_eq!(view.read::<u32>(9), 77);
        }
    }

    #[test]
    fn test_forward_and_backward_views_alias_one_region() {
        let mut region = [0u8; 64];
        let front = OffsetView::new(NonNull::from(&mut region[0]));
        // Anchor in the middle; it reads the same cells backward.
        let anchored = front.rebased(32);
        assert_eq!(anchored.origin_addr(), front.origin_addr() + 32);
        unsafe {
            front.write::<u64>(24, 4242);
            assert_eq!(anchored.read::<u64>(-8), 4242);
            anchored.write::<u64>(-32, 7);
            assert_eq!(front.read::<u64>(0), 7);
        }
        // Rebasing back lands on the original origin.
        assert_eq!(anchored.rebased(-32), front);
    }

    #[test]
    fn test_alt_view_follows_declared_offset() {
        let spec = spec_with(
            vec![field("payload", "UInt64", 0)],
            vec![AltViewField {
                name: SmolStr::new("header"),
                view_type: SmolStr::new("HeaderView"),
                start_offset: -16,
                at: SourceRef::default(),
            }],
        );
        let mut log = DiagnosticLog::new();
        let model = compile_view(&spec, &mut log).unwrap();

        let mut region = [0u8; 64];
        // Logical payload origin sits 16 bytes in; its header view looks back.
        let payload = OffsetView::new(NonNull::from(&mut region[16]));
        let header = model.alt_view(payload, "header").unwrap();
        unsafe {
            header.write::<u64>(0, 0xa5a5);
            assert_eq!(payload.read::<u64>(-16), 0xa5a5);
        }
        assert!(model.alt_view(payload, "missing").is_none());
    }
}
