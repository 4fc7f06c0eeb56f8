//! Quick fixes that rewrite declared versions to the suggested ones

use std::collections::HashMap;

use tower_lsp::lsp_types::{CodeAction, CodeActionKind, Range, TextEdit, Url, WorkspaceEdit};

use crate::config::Settings;
use crate::lsp::diagnostics::{PackageDecision, create_diagnostic, version_range};
use crate::version::decision::Classification;

/// Extract the leading operator (^, ~, =, >=, <=) kept when rewriting a version
fn extract_version_prefix(version: &str) -> &str {
    let version = version.trim_start();
    if version.starts_with(">=") {
        ">="
    } else if version.starts_with("<=") {
        "<="
    } else if version.starts_with('=') {
        "="
    } else if version.starts_with('^') {
        "^"
    } else if version.starts_with('~') {
        "~"
    } else {
        ""
    }
}

fn intersects(a: &Range, b: &Range) -> bool {
    a.start <= b.end && b.start <= a.end
}

fn is_single_line(range: &Range) -> bool {
    range.start.line == range.end.line
}

/// Generate update actions for `selection`.
///
/// One action per package for single-line selections, one bulk action
/// for wider ones, plus an "update all" action when the document has
/// more candidates than were selected.
pub fn generate_update_actions(
    uri: &Url,
    packages: &[PackageDecision],
    selection: Range,
    settings: &Settings,
) -> Vec<CodeAction> {
    let actionable: Vec<&PackageDecision> = packages
        .iter()
        .filter(|p| p.decision.suggested_version.is_some())
        // The manifest already names the suggestion; only an install is missing
        .filter(|p| !matches!(p.decision.classification, Classification::ReadyToInstall))
        .collect();

    let selected: Vec<&PackageDecision> = actionable
        .iter()
        .copied()
        .filter(|p| intersects(&version_range(&p.declaration.location), &selection))
        .collect();

    if selected.is_empty() {
        return vec![];
    }

    let mut actions = Vec::new();

    if is_single_line(&selection) || selected.len() == 1 {
        actions.extend(
            selected
                .iter()
                .map(|package| create_single_action(uri, package, settings)),
        );
    } else if let Some(action) = create_bulk_action(uri, &selected, settings, |n| {
        format!("Update {} selected packages", n)
    }) {
        actions.push(action);
    }

    let updatable: Vec<&PackageDecision> = actionable
        .iter()
        .copied()
        .filter(|p| !p.decision.is_advisory())
        .collect();
    if updatable.len() > 1
        && updatable.len() > selected.len()
        && let Some(action) =
            create_bulk_action(uri, &updatable, settings, |n| format!("Update all {} packages", n))
    {
        actions.push(action);
    }

    actions
}

fn create_single_action(uri: &Url, package: &PackageDecision, settings: &Settings) -> CodeAction {
    let version = package.decision.suggested_version.as_deref().unwrap_or_default();
    let mut title = format!("Update \"{}\" to {}", package.declaration.name, version);
    if settings.major_update_protection && package.decision.is_major() {
        title.push_str(" (major)");
    }

    create_update_action(uri, title, &[package], true)
}

/// Bulk update over `packages`, advisories excluded.
///
/// With major-update protection, major bumps are dropped from a mixed set;
/// an all-major set is kept and labeled as such.
fn create_bulk_action(
    uri: &Url,
    packages: &[&PackageDecision],
    settings: &Settings,
    title: impl Fn(usize) -> String,
) -> Option<CodeAction> {
    let mut packages: Vec<&PackageDecision> = packages
        .iter()
        .copied()
        .filter(|p| !p.decision.is_advisory())
        .collect();

    let mut all_major = false;
    if settings.major_update_protection {
        let majors = packages.iter().filter(|p| p.decision.is_major()).count();
        if majors == packages.len() {
            all_major = majors > 0;
        } else {
            packages.retain(|p| !p.decision.is_major());
        }
    }

    match packages.as_slice() {
        [] => None,
        [package] => Some(create_single_action(uri, package, settings)),
        _ => {
            let mut title = title(packages.len());
            if all_major {
                title.push_str(" (major)");
            }
            Some(create_update_action(uri, title, &packages, false))
        }
    }
}

fn create_update_action(
    uri: &Url,
    title: String,
    packages: &[&PackageDecision],
    is_preferred: bool,
) -> CodeAction {
    let edits = packages
        .iter()
        .filter_map(|package| {
            let version = package.decision.suggested_version.as_deref()?;
            let prefix = extract_version_prefix(&package.declaration.version);
            Some(TextEdit {
                range: version_range(&package.declaration.location),
                new_text: format!("{prefix}{version}"),
            })
        })
        .collect();

    let diagnostics = packages.iter().filter_map(|p| create_diagnostic(p)).collect();

    let mut changes = HashMap::new();
    changes.insert(uri.clone(), edits);

    CodeAction {
        title,
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(diagnostics),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }),
        is_preferred: is_preferred.then_some(true),
        ..Default::default()
    }
}
