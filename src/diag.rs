use crate::error::ModelError;

// ─── Source references ──────────────────────────────────────────────────────

/// Opaque handle into the host's source map. The generator never interprets
/// it, only threads it back through diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceRef(pub u32);

// ─── Diagnostics ────────────────────────────────────────────────────────────

/// One validation failure, in the shape the host contract expects:
/// a stable code, a human message, and the source handle it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: &'static str,
    pub message: String,
    pub at: SourceRef,
}

impl Diagnostic {
    pub fn new(error: &ModelError, at: SourceRef) -> Self {
        Diagnostic {
            code: error.code(),
            message: error.to_string(),
            at,
        }
    }
}

/// Where the compile pipeline reports validation failures. The pipeline never
/// hard-fails its caller: it reports everything it finds and returns no
/// declarations, so a host can surface multiple errors at once.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Collecting sink. The default host integration and what every test uses.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Count of diagnostics carrying the given code.
    pub fn count_of(&self, code: &str) -> usize {
        self.diagnostics.iter().filter(|d| d.code == code).count()
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
