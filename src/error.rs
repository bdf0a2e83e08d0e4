// ─── Error ──────────────────────────────────────────────────────────────────
use crate::slot_value::SlotTy;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("malformed member name {0:?}")]
    MalformedFieldName(String),
    #[error("unsupported member kind for {0:?}")]
    UnsupportedFieldKind(SmolStr),
    #[error("missing required argument: {0}")]
    MissingRequiredArgument(&'static str),
    #[error("duplicate member name {0:?}")]
    NameCollision(SmolStr),
    #[error("{0}")]
    StructuralPrerequisiteViolation(String),
    #[error("specification exceeds the member limit")]
    TooManyMembers,
    #[error("base schema not registered: {0}")]
    UnknownBase(SmolStr),
    #[error("schema {0} declares no base")]
    NoDeclaredBase(SmolStr),
    #[error("storage of {base} is not a prefix of {derived}")]
    BaseLayoutMismatch { base: SmolStr, derived: SmolStr },
    #[error("member not found")]
    FieldNotFound,
    #[error("{member} is not a {expected} member")]
    KindMismatch {
        member: SmolStr,
        expected: &'static str,
    },
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: SlotTy, actual: SlotTy },
    #[error("cannot set immutable member {0}")]
    ImmutableField(SmolStr),
    #[error("missing initial value for member {0}")]
    MissingInitializer(SmolStr),
    #[error("duplicate initial value for member {0}")]
    DuplicateInitializer(SmolStr),
}

impl ModelError {
    /// Stable snake_case code, used as the diagnostic `code` field.
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::MalformedFieldName(_) => "malformed_member_name",
            ModelError::UnsupportedFieldKind(_) => "unsupported_member_kind",
            ModelError::MissingRequiredArgument(_) => "missing_required_argument",
            ModelError::NameCollision(_) => "member_name_collision",
            ModelError::StructuralPrerequisiteViolation(_) => "structural_prerequisite",
            ModelError::TooManyMembers => "too_many_members",
            ModelError::UnknownBase(_) => "unknown_base",
            ModelError::NoDeclaredBase(_) => "no_declared_base",
            ModelError::BaseLayoutMismatch { .. } => "base_layout_mismatch",
            ModelError::FieldNotFound => "member_not_found",
            ModelError::KindMismatch { .. } => "member_kind_mismatch",
            ModelError::TypeMismatch { .. } => "type_mismatch",
            ModelError::ImmutableField(_) => "immutable_member",
            ModelError::MissingInitializer(_) => "missing_initializer",
            ModelError::DuplicateInitializer(_) => "duplicate_initializer",
        }
    }
}
