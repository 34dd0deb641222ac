//! Code action handler for auto-fix support.

use std::collections::HashMap;

use lintbridge_engine::FixCommand;
use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::conversion::{DiagnosticData, offset_to_range, positions_le};

/// Builds quick fixes for diagnostics in the requested range and a
/// "fix all" action for the whole document.
///
/// `diagnostics` are the diagnostics last published for the document.
pub fn handle_code_action(
    text: &str,
    diagnostics: &[Diagnostic],
    params: &CodeActionParams,
) -> CodeActionResponse {
    debug!("Code action request: {}", params.text_document.uri);

    let uri = &params.text_document.uri;
    let mut actions = Vec::new();

    let (wants_fix_all, wants_quickfix) = match &params.context.only {
        Some(only) => (
            only.contains(&CodeActionKind::SOURCE_FIX_ALL)
                || only.contains(&CodeActionKind::SOURCE),
            only.contains(&CodeActionKind::QUICKFIX),
        ),
        None => (true, true),
    };

    if wants_quickfix {
        add_quickfix_actions(diagnostics, text, uri, &params.range, &mut actions);
    }

    if wants_fix_all {
        add_fix_all_action(diagnostics, text, uri, &mut actions);
    }

    actions
}

fn edit_for(fix: &FixCommand, text: &str) -> Option<TextEdit> {
    let (start, end) = fix.range;
    let range = offset_to_range(start as usize, end as usize, text)?;
    Some(TextEdit {
        range,
        new_text: fix.text.clone(),
    })
}

fn workspace_edit(uri: &Url, edits: Vec<TextEdit>) -> WorkspaceEdit {
    WorkspaceEdit {
        changes: Some(HashMap::from([(uri.clone(), edits)])),
        ..Default::default()
    }
}

fn add_quickfix_actions(
    diagnostics: &[Diagnostic],
    text: &str,
    uri: &Url,
    request_range: &Range,
    actions: &mut Vec<CodeActionOrCommand>,
) {
    for diag in diagnostics {
        if !positions_le(diag.range.start, request_range.end)
            || !positions_le(request_range.start, diag.range.end)
        {
            continue;
        }
        let Some(data) = DiagnosticData::from_diagnostic(diag) else {
            continue;
        };

        if let Some(edit) = data.fix.as_ref().and_then(|fix| edit_for(fix, text)) {
            actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                title: format!("Fix: {}", diag.message),
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![diag.clone()]),
                edit: Some(workspace_edit(uri, vec![edit])),
                is_preferred: Some(true),
                ..Default::default()
            }));
        }

        for suggestion in &data.suggestions {
            if let Some(edit) = edit_for(&suggestion.fix, text) {
                actions.push(CodeActionOrCommand::CodeAction(CodeAction {
                    title: suggestion.desc.clone(),
                    kind: Some(CodeActionKind::QUICKFIX),
                    diagnostics: Some(vec![diag.clone()]),
                    edit: Some(workspace_edit(uri, vec![edit])),
                    ..Default::default()
                }));
            }
        }
    }
}

fn add_fix_all_action(
    diagnostics: &[Diagnostic],
    text: &str,
    uri: &Url,
    actions: &mut Vec<CodeActionOrCommand>,
) {
    let mut fixes: Vec<FixCommand> = diagnostics
        .iter()
        .filter_map(DiagnosticData::from_diagnostic)
        .filter_map(|data| data.fix)
        .collect();
    fixes.sort_by_key(|fix| fix.range);

    // Edits are applied together, so overlapping fixes are dropped.
    let mut edits = Vec::new();
    let mut last_end = 0;
    for fix in &fixes {
        if fix.range.0 < last_end && !edits.is_empty() {
            continue;
        }
        if let Some(edit) = edit_for(fix, text) {
            edits.push(edit);
            last_end = fix.range.1;
        }
    }

    if edits.is_empty() {
        return;
    }

    actions.push(CodeActionOrCommand::CodeAction(CodeAction {
        title: "Fix all LintBridge problems".to_string(),
        kind: Some(CodeActionKind::SOURCE_FIX_ALL),
        edit: Some(workspace_edit(uri, edits)),
        ..Default::default()
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::to_lsp_diagnostic;
    use lintbridge_engine::{Problem, Severity, Suggestion};
    use pretty_assertions::assert_eq;

    fn problem(line: u32, column: u32, fix: Option<(u32, u32, &str)>) -> Problem {
        Problem {
            severity: Severity::Error,
            line,
            column,
            end_line: Some(line),
            end_column: Some(column + 1),
            message: "Unexpected tab".to_string(),
            rule_id: Some("no-tabs".to_string()),
            fix: fix.map(|(start, end, text)| FixCommand {
                range: (start, end),
                text: text.to_string(),
            }),
            suggestions: vec![],
        }
    }

    fn params(uri: &Url, range: Range, only: Option<Vec<CodeActionKind>>) -> CodeActionParams {
        CodeActionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            range,
            context: CodeActionContext {
                diagnostics: vec![],
                only,
                trigger_kind: None,
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        }
    }

    fn titles(actions: &[CodeActionOrCommand]) -> Vec<String> {
        actions
            .iter()
            .map(|a| match a {
                CodeActionOrCommand::CodeAction(action) => action.title.clone(),
                CodeActionOrCommand::Command(command) => command.title.clone(),
            })
            .collect()
    }

    #[test]
    fn test_quickfix_in_range() {
        let uri = Url::parse("file:///work/a.txt").unwrap();
        let text = "a\tb\nc\td\n";
        let diagnostics = vec![
            to_lsp_diagnostic(&problem(1, 2, Some((1, 2, " "))), None),
            to_lsp_diagnostic(&problem(2, 2, Some((5, 6, " "))), None),
        ];
        let range = Range::new(Position::new(1, 0), Position::new(1, 3));

        let actions = handle_code_action(
            text,
            &diagnostics,
            &params(&uri, range, Some(vec![CodeActionKind::QUICKFIX])),
        );

        assert_eq!(actions.len(), 1);
        let CodeActionOrCommand::CodeAction(action) = &actions[0] else {
            panic!("expected a code action");
        };
        let edits = &action.edit.as_ref().unwrap().changes.as_ref().unwrap()[&uri];
        assert_eq!(
            edits[0].range,
            Range::new(Position::new(1, 1), Position::new(1, 2))
        );
    }

    #[test]
    fn test_suggestions_become_quickfixes() {
        let uri = Url::parse("file:///work/a.txt").unwrap();
        let mut p = problem(1, 2, None);
        p.suggestions = vec![Suggestion {
            desc: "Remove the tab".to_string(),
            fix: FixCommand {
                range: (1, 2),
                text: String::new(),
            },
        }];
        let diagnostics = vec![to_lsp_diagnostic(&p, None)];
        let range = Range::new(Position::new(0, 0), Position::new(0, 3));

        let actions = handle_code_action("a\tb", &diagnostics, &params(&uri, range, None));

        assert_eq!(titles(&actions), vec!["Remove the tab".to_string()]);
    }

    #[test]
    fn test_fix_all_skips_overlaps() {
        let uri = Url::parse("file:///work/a.txt").unwrap();
        let text = "a\t\tb";
        let diagnostics = vec![
            to_lsp_diagnostic(&problem(1, 3, Some((2, 3, " "))), None),
            to_lsp_diagnostic(&problem(1, 2, Some((1, 3, "  "))), None),
        ];
        let range = Range::new(Position::new(0, 0), Position::new(0, 0));

        let actions = handle_code_action(
            text,
            &diagnostics,
            &params(&uri, range, Some(vec![CodeActionKind::SOURCE_FIX_ALL])),
        );

        assert_eq!(titles(&actions), vec!["Fix all LintBridge problems".to_string()]);
        let CodeActionOrCommand::CodeAction(action) = &actions[0] else {
            panic!("expected a code action");
        };
        let edits = &action.edit.as_ref().unwrap().changes.as_ref().unwrap()[&uri];
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].new_text, "  ");
    }

    #[test]
    fn test_no_fixes_no_actions() {
        let uri = Url::parse("file:///work/a.txt").unwrap();
        let diagnostics = vec![to_lsp_diagnostic(&problem(1, 1, None), None)];
        let range = Range::new(Position::new(0, 0), Position::new(0, 1));

        let actions = handle_code_action("abc", &diagnostics, &params(&uri, range, None));
        assert!(actions.is_empty());
    }
}
