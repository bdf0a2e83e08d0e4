use crate::diag::SourceRef;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Capability a raw specification must declare before it can become a schema.
/// Mirrors the host-side marker protocol for manually-managed objects.
pub const UNMANAGED_CAPABILITY: &str = "Unmanaged";

// ─── Visibility ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Private,
    Module,
    Internal,
    Public,
}

impl Scope {
    pub fn keyword(&self) -> &'static str {
        match self {
            Scope::Private => "private",
            Scope::Module => "module",
            Scope::Internal => "internal",
            Scope::Public => "public",
        }
    }
}

/// Read and write scope of one member. A "mutation-restricted" member is one
/// whose `set` scope is narrower than its `get` scope, e.g. `public
/// private(set)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Visibility {
    pub get: Scope,
    pub set: Scope,
}

impl Visibility {
    pub fn uniform(scope: Scope) -> Self {
        Visibility {
            get: scope,
            set: scope,
        }
    }

    pub fn is_set_restricted(&self) -> bool {
        self.get != self.set
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::uniform(Scope::Internal)
    }
}

// ─── Mutability ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutability {
    Immutable,
    Mutable,
}

// ─── Field kinds ────────────────────────────────────────────────────────────

/// Layout kind of one member. Type references are opaque structural names;
/// the generator echoes them without resolving.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar(SmolStr),
    FixedArray { of: SmolStr, count: usize },
    FixedStack { of: SmolStr, capacity: usize },
}

impl FieldKind {
    pub fn type_ref(&self) -> &SmolStr {
        match self {
            FieldKind::Scalar(ty) => ty,
            FieldKind::FixedArray { of, .. } => of,
            FieldKind::FixedStack { of, .. } => of,
        }
    }
}

// ─── FieldSpec / GolemSchema ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: SmolStr,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub kind: FieldKind,
}

/// A validated specification: ordered members, root flag, optional base.
/// Produced only by the specification parser; field order is declaration
/// order and is semantically significant for storage layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GolemSchema {
    pub type_name: SmolStr,
    pub is_public_root: bool,
    pub base: Option<SmolStr>,
    pub fields: Vec<FieldSpec>,
}

// ─── Raw host input ─────────────────────────────────────────────────────────

/// Descriptor on the value side of one member entry. Anything that is not a
/// plain type reference or a recognized array/stack construction request is
/// an `UnsupportedFieldKind` validation error, which the catch-all variant
/// funnels through deserialization intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFieldType {
    Plain(SmolStr),
    Array { array: SmolStr, count: u64 },
    Stack { stack: SmolStr, capacity: u64 },
    Other(serde_json::Value),
}

impl From<&str> for RawFieldType {
    fn from(type_ref: &str) -> Self {
        RawFieldType::Plain(SmolStr::new(type_ref))
    }
}

pub fn plain(type_ref: &str) -> RawFieldType {
    RawFieldType::Plain(SmolStr::new(type_ref))
}

pub fn array(of: &str, count: u64) -> RawFieldType {
    RawFieldType::Array {
        array: SmolStr::new(of),
        count,
    }
}

pub fn stack(of: &str, capacity: u64) -> RawFieldType {
    RawFieldType::Stack {
        stack: SmolStr::new(of),
        capacity,
    }
}

/// One raw member entry: the encoded name string (visibility prefix,
/// mutability keyword, identifier) and its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    pub key: String,
    pub descriptor: RawFieldType,
    #[serde(default)]
    pub at: SourceRef,
}

/// The declarative specification as the host hands it over: already parsed
/// out of source syntax, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObjectSpec {
    pub type_name: SmolStr,
    #[serde(default = "default_true")]
    pub is_plain_record: bool,
    #[serde(default)]
    pub capabilities: Vec<SmolStr>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub members: Option<Vec<RawMember>>,
    #[serde(default)]
    pub base: Option<SmolStr>,
    #[serde(default)]
    pub at: SourceRef,
}

fn default_true() -> bool {
    true
}

impl RawObjectSpec {
    /// Minimal well-formed spec for the given members. Test and host helper.
    pub fn record(type_name: &str, members: Vec<RawMember>) -> Self {
        RawObjectSpec {
            type_name: SmolStr::new(type_name),
            is_plain_record: true,
            capabilities: vec![SmolStr::new(UNMANAGED_CAPABILITY)],
            is_public: false,
            members: Some(members),
            base: None,
            at: SourceRef::default(),
        }
    }

    pub fn with_base(mut self, base: &str) -> Self {
        self.base = Some(SmolStr::new(base));
        self
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }
}

// Einstiegspunkt für Member-Listen in Tests und Hosts.
#[macro_export]
macro_rules! golem_members {
    ( $( $key:expr => $desc:expr ),* $(,)? ) => {{
        let members: Vec<$crate::schema::RawMember> = vec![
            $(
                $crate::schema::RawMember {
                    key: ($key).to_string(),
                    descriptor: ($desc).into(),
                    at: $crate::diag::SourceRef::default(),
                },
            )*
        ];
        members
    }};
}
