//! Schema-driven compiler and runtime for manually-managed value objects.
//!
//! Declare an object's members once (names encode visibility and mutability;
//! descriptors pick scalar, fixed-array, or fixed-stack layout) and get back:
//! the exact linear storage layout, a generated declaration set enforcing the
//! declared mutability and visibility, lifecycle operations over raw heap
//! memory, address-based identity, checked structural upcast/downcast, and a
//! debug-only liveness net that turns use-after-free into an assertion
//! failure. Offset views are the independent second half: typed windows over
//! opaque byte regions, including backward-looking aliases.

pub mod diag;
pub mod error;
pub mod golem_object;
pub mod layout;
#[cfg(debug_assertions)]
mod liveness;
pub mod model;
pub mod offset_view;
pub mod schema;
pub mod slot_value;
pub mod spec_parse;

pub use diag::{Diagnostic, DiagnosticLog, DiagnosticSink, SourceRef};
pub use error::ModelError;
pub use golem_object::{GolemRuntime, ObjectHandle, ObjectId, RuntimeOptions};
pub use model::{compile, GeneratedDecl, GolemModel, OpKind};
pub use offset_view::{compile_view, OffsetView, ViewModel, ViewSpec};
pub use schema::{GolemSchema, RawFieldType, RawMember, RawObjectSpec};
pub use slot_value::{SlotTy, SlotValue};
pub use spec_parse::parse_spec;
