//! LSP type conversion utilities.

use lintbridge_engine::{FixCommand, LintOutput, Problem, Severity, Suggestion};
use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{
    CodeDescription, Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range, Url,
};

/// Value of [`Diagnostic::source`].
pub const SOURCE: &str = "lintbridge";

/// Fix payload stored in [`Diagnostic::data`] for later code actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixCommand>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

impl DiagnosticData {
    /// Reads the payload back from a diagnostic.
    pub fn from_diagnostic(diagnostic: &Diagnostic) -> Option<Self> {
        let data = diagnostic.data.as_ref()?;
        serde_json::from_value(data.clone()).ok()
    }
}

/// Converts an engine result to LSP diagnostics.
pub fn to_lsp_diagnostics(output: &LintOutput) -> Vec<Diagnostic> {
    output
        .problems
        .iter()
        .map(|problem| {
            let docs = problem
                .rule_id
                .as_deref()
                .and_then(|rule| output.metadata.docs_url(rule));
            to_lsp_diagnostic(problem, docs)
        })
        .collect()
}

/// Converts one engine problem to an LSP diagnostic.
pub fn to_lsp_diagnostic(problem: &Problem, docs_url: Option<&str>) -> Diagnostic {
    let start = Position::new(
        problem.line.saturating_sub(1),
        problem.column.saturating_sub(1),
    );
    let end = match (problem.end_line, problem.end_column) {
        (Some(line), Some(column)) => {
            Position::new(line.saturating_sub(1), column.saturating_sub(1))
        }
        _ => start,
    };

    let severity = match problem.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    };

    let data = (problem.fix.is_some() || !problem.suggestions.is_empty()).then(|| DiagnosticData {
        fix: problem.fix.clone(),
        suggestions: problem.suggestions.clone(),
    });

    Diagnostic {
        range: Range::new(start, end),
        severity: Some(severity),
        code: problem.rule_id.clone().map(NumberOrString::String),
        code_description: docs_url
            .and_then(|url| Url::parse(url).ok())
            .map(|href| CodeDescription { href }),
        source: Some(SOURCE.to_string()),
        message: problem.message.clone(),
        data: data.and_then(|d| serde_json::to_value(d).ok()),
        ..Default::default()
    }
}

/// Converts UTF-16 offsets to an LSP range.
pub fn offset_to_range(start: usize, end: usize, text: &str) -> Option<Range> {
    let start_pos = offset_to_position(start, text)?;
    let end_pos = offset_to_position(end, text)?;
    Some(Range::new(start_pos, end_pos))
}

/// Converts a UTF-16 offset to an LSP position.
pub fn offset_to_position(offset: usize, text: &str) -> Option<Position> {
    let mut line = 0u32;
    let mut col = 0u32;
    let mut current_offset = 0;

    for ch in text.chars() {
        if current_offset >= offset {
            break;
        }

        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += ch.len_utf16() as u32;
        }

        current_offset += ch.len_utf16();
    }

    (current_offset >= offset).then(|| Position::new(line, col))
}

/// Helper to compare Positions (p1 <= p2)
pub fn positions_le(p1: Position, p2: Position) -> bool {
    p1.line < p2.line || (p1.line == p2.line && p1.character <= p2.character)
}
