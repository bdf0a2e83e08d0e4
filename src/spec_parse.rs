use crate::diag::{Diagnostic, DiagnosticSink, SourceRef};
use crate::error::ModelError;
use crate::schema::{
    FieldKind, FieldSpec, GolemSchema, Mutability, RawFieldType, RawObjectSpec, Scope, Visibility,
    UNMANAGED_CAPABILITY,
};
use arrayvec::ArrayVec;
use log::debug;
use smol_str::SmolStr;
use std::sync::LazyLock;

/// Hard bound on members per schema. Keeps the compiled field index small
/// enough for the linear/binary hash search to stay cheap.
pub const MAX_MEMBERS: usize = 32;

/// Bound on fixed-array counts and fixed-stack capacities. A construction
/// request beyond it is not recognized.
pub const MAX_ELEMENTS: u64 = 1 << 16;

// ─── Visibility prefix table ────────────────────────────────────────────────

/// Every recognized visibility prefix (with trailing space), longest first so
/// that e.g. `"private(set) "` can never be shadowed by `"private "`.
static VISIBILITY_PREFIXES: LazyLock<Vec<(String, Visibility)>> = LazyLock::new(|| {
    const SCOPES: [Scope; 4] = [Scope::Private, Scope::Module, Scope::Internal, Scope::Public];
    const SETTER_SCOPES: [Scope; 3] = [Scope::Private, Scope::Module, Scope::Internal];

    let mut table = Vec::new();
    for outer in SCOPES {
        table.push((
            format!("{} ", outer.keyword()),
            Visibility::uniform(outer),
        ));
        for inner in SETTER_SCOPES {
            table.push((
                format!("{} {}(set) ", outer.keyword(), inner.keyword()),
                Visibility {
                    get: outer,
                    set: inner,
                },
            ));
        }
    }
    for inner in SETTER_SCOPES {
        table.push((
            format!("{}(set) ", inner.keyword()),
            Visibility {
                get: Visibility::default().get,
                set: inner,
            },
        ));
    }
    table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    table
});

fn split_visibility(key: &str) -> (Visibility, &str) {
    for (prefix, visibility) in VISIBILITY_PREFIXES.iter() {
        if let Some(rest) = key.strip_prefix(prefix.as_str()) {
            return (*visibility, rest);
        }
    }
    (Visibility::default(), key)
}

// ─── Member key parsing ─────────────────────────────────────────────────────

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Split one encoded member name: longest visibility prefix, then exactly one
/// mutability keyword, then the identifier.
fn parse_member_key(key: &str) -> Result<(Visibility, Mutability, SmolStr), ModelError> {
    let (visibility, rest) = split_visibility(key);
    let (mutability, ident) = if let Some(ident) = rest.strip_prefix("immutable ") {
        (Mutability::Immutable, ident)
    } else if let Some(ident) = rest.strip_prefix("mutable ") {
        (Mutability::Mutable, ident)
    } else {
        return Err(ModelError::MalformedFieldName(key.to_string()));
    };
    if !is_identifier(ident) {
        return Err(ModelError::MalformedFieldName(key.to_string()));
    }
    Ok((visibility, mutability, SmolStr::new(ident)))
}

fn resolve_descriptor(name: &SmolStr, descriptor: &RawFieldType) -> Result<FieldKind, ModelError> {
    match descriptor {
        RawFieldType::Plain(ty) => Ok(FieldKind::Scalar(ty.clone())),
        RawFieldType::Array { array, count } => {
            if *count > MAX_ELEMENTS {
                return Err(ModelError::UnsupportedFieldKind(name.clone()));
            }
            Ok(FieldKind::FixedArray {
                of: array.clone(),
                count: *count as usize,
            })
        }
        RawFieldType::Stack { stack, capacity } => {
            if *capacity > MAX_ELEMENTS {
                return Err(ModelError::UnsupportedFieldKind(name.clone()));
            }
            Ok(FieldKind::FixedStack {
                of: stack.clone(),
                capacity: *capacity as usize,
            })
        }
        RawFieldType::Other(_) => Err(ModelError::UnsupportedFieldKind(name.clone())),
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

fn emit(sink: &mut dyn DiagnosticSink, clean: &mut bool, error: &ModelError, at: SourceRef) {
    sink.report(Diagnostic::new(error, at));
    *clean = false;
}

/// Validate a raw specification into a schema.
///
/// Pure: the same input always yields the same schema or the same diagnostic
/// set, and every detectable error is reported in one pass. Any reported
/// error yields `None`: the host gets no declarations for a bad spec.
pub fn parse_spec(raw: &RawObjectSpec, sink: &mut dyn DiagnosticSink) -> Option<GolemSchema> {
    let mut clean = true;

    if !raw.is_plain_record {
        emit(
            sink,
            &mut clean,
            &ModelError::StructuralPrerequisiteViolation(format!(
                "{} is not a plain record and cannot carry manual storage",
                raw.type_name
            )),
            raw.at,
        );
    }
    if !raw
        .capabilities
        .iter()
        .any(|c| c == UNMANAGED_CAPABILITY)
    {
        emit(
            sink,
            &mut clean,
            &ModelError::StructuralPrerequisiteViolation(format!(
                "{} must declare the {} capability",
                raw.type_name, UNMANAGED_CAPABILITY
            )),
            raw.at,
        );
    }

    let members: &[crate::schema::RawMember] = match &raw.members {
        Some(members) => members,
        None => {
            emit(
                sink,
                &mut clean,
                &ModelError::MissingRequiredArgument("members"),
                raw.at,
            );
            &[]
        }
    };

    let mut fields: ArrayVec<FieldSpec, MAX_MEMBERS> = ArrayVec::new();
    // Parsed names, including any that overflowed the member limit, so the
    // collision scan still sees everything.
    let mut names: Vec<(SmolStr, SourceRef)> = Vec::with_capacity(members.len());
    let mut overflow_reported = false;

    for member in members {
        let (visibility, mutability, name) = match parse_member_key(&member.key) {
            Ok(parts) => parts,
            Err(error) => {
                emit(sink, &mut clean, &error, member.at);
                continue;
            }
        };
        let kind = match resolve_descriptor(&name, &member.descriptor) {
            Ok(kind) => kind,
            Err(error) => {
                emit(sink, &mut clean, &error, member.at);
                continue;
            }
        };
        names.push((name.clone(), member.at));
        let spec = FieldSpec {
            name,
            visibility,
            mutability,
            kind,
        };
        if fields.try_push(spec).is_err() && !overflow_reported {
            emit(sink, &mut clean, &ModelError::TooManyMembers, member.at);
            overflow_reported = true;
        }
    }

    // O(n²) all-pairs scan; one report per colliding pair, never stopping at
    // the first.
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            if names[i].0 == names[j].0 {
                emit(
                    sink,
                    &mut clean,
                    &ModelError::NameCollision(names[i].0.clone()),
                    names[j].1,
                );
            }
        }
    }

    if !clean {
        return None;
    }

    debug!(
        "parsed schema {} ({} members, base: {:?})",
        raw.type_name,
        fields.len(),
        raw.base
    );

    Some(GolemSchema {
        type_name: raw.type_name.clone(),
        is_public_root: raw.is_public,
        base: raw.base.clone(),
        fields: fields.into_iter().collect(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
