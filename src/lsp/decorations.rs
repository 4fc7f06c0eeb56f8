//! Inline decorations rendered as inlay hints at the end of dependency lines

use tower_lsp::lsp_types::{
    InlayHint, InlayHintLabel, InlayHintLabelPart, InlayHintLabelPartTooltip, Position, Range,
};

use crate::config::DecorationsMode;
use crate::lsp::diagnostics::PackageDecision;
use crate::parser::types::DependencyDeclaration;
use crate::version::decision::Classification;
use crate::version::semver::is_prerelease;

const ICON_ADVISORY: &str = "☢";
const ICON_CHECKING: &str = "🗘";
const ICON_PENDING: &str = "⭳";
const ICON_UPDATABLE: &str = "⚠";

/// One rendered fragment; icons are dropped in simple mode
struct Part {
    text: String,
    is_icon: bool,
    tooltip: Option<String>,
}

impl Part {
    fn icon(icon: &str) -> Self {
        Self {
            text: icon.to_string(),
            is_icon: true,
            tooltip: None,
        }
    }

    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_icon: false,
            tooltip: None,
        }
    }

    fn with_tooltip(mut self, tooltip: String) -> Self {
        self.tooltip = Some(tooltip);
        self
    }
}

fn checking_parts() -> Vec<Part> {
    vec![Part::icon(ICON_CHECKING), Part::text("Checking for update...")]
}

fn decision_parts(package: &PackageDecision) -> Vec<Part> {
    let suggested = package.decision.suggested_version.as_deref().unwrap_or_default();

    match &package.decision.classification {
        Classification::PendingInstall => {
            vec![Part::icon(ICON_PENDING), Part::text("Install pending")]
        }
        Classification::ReadyToInstall => vec![
            Part::icon(ICON_PENDING),
            Part::text(suggested),
            Part::text("(install pending)"),
        ],
        Classification::UpdateAvailable {
            candidate,
            is_major,
            already_installed,
        } => {
            let mut parts = vec![
                Part::icon(ICON_UPDATABLE),
                Part::text("Update available:"),
                Part::text(candidate.clone()),
            ];
            if *is_major {
                parts.push(Part::text("(attention: major update!)"));
            }
            if *already_installed {
                parts.push(Part::text("(already installed, just formalization)"));
            }
            if is_prerelease(candidate) {
                parts.push(Part::text("<pre-release>"));
            }
            parts
        }
        Classification::SecurityAdvisory(details) => vec![
            Part::icon(ICON_ADVISORY),
            Part::text(format!(
                "Security advisory ({}/{}):",
                details.severity.to_uppercase(),
                details.score
            )),
            Part::text(details.title.clone())
                .with_tooltip(format!("Vulnerable versions: {}", details.vulnerable_versions)),
        ],
        // Errors and notices are carried by diagnostics alone
        Classification::InvalidRange
        | Classification::VersionNotReleased
        | Classification::Prerelease
        | Classification::AlreadyLatest => vec![],
    }
}

fn render_label(parts: Vec<Part>, mode: DecorationsMode) -> Option<InlayHintLabel> {
    let parts: Vec<Part> = match mode {
        DecorationsMode::Disabled => return None,
        DecorationsMode::Simple => parts.into_iter().filter(|p| !p.is_icon).collect(),
        DecorationsMode::Fancy => parts,
    };
    if parts.is_empty() {
        return None;
    }

    match mode {
        DecorationsMode::Simple => Some(InlayHintLabel::String(
            parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        )),
        _ => {
            let last = parts.len() - 1;
            Some(InlayHintLabel::LabelParts(
                parts
                    .into_iter()
                    .enumerate()
                    .map(|(i, part)| InlayHintLabelPart {
                        value: if i < last {
                            format!("{} ", part.text)
                        } else {
                            part.text
                        },
                        tooltip: part.tooltip.map(InlayHintLabelPartTooltip::String),
                        ..Default::default()
                    })
                    .collect(),
            ))
        }
    }
}

/// Length of `line` in UTF-16 code units, the LSP default position encoding
fn line_end(content: &str, line: usize) -> u32 {
    content
        .lines()
        .nth(line)
        .map(|text| text.encode_utf16().count() as u32)
        .unwrap_or_default()
}

fn hint_at(content: &str, line: usize, label: InlayHintLabel) -> InlayHint {
    InlayHint {
        position: Position {
            line: line as u32,
            character: line_end(content, line),
        },
        label,
        kind: None,
        text_edits: None,
        tooltip: None,
        padding_left: Some(true),
        padding_right: None,
        data: None,
    }
}

/// Inlay hints for the lines of `range`.
///
/// `checking` lists declarations whose evaluation is still running;
/// lines with a decision show it instead.
pub fn generate_inlay_hints(
    content: &str,
    checking: &[DependencyDeclaration],
    packages: &[PackageDecision],
    mode: DecorationsMode,
    range: Range,
) -> Vec<InlayHint> {
    if mode == DecorationsMode::Disabled {
        return vec![];
    }

    let visible = |line: usize| {
        let line = line as u32;
        line >= range.start.line && line <= range.end.line
    };
    let decided = |line: usize| packages.iter().any(|p| p.declaration.location.line == line);

    let checking_hints = checking
        .iter()
        .map(|d| d.location.line)
        .filter(|&line| visible(line) && !decided(line))
        .filter_map(|line| {
            render_label(checking_parts(), mode).map(|label| hint_at(content, line, label))
        });

    let decision_hints = packages
        .iter()
        .filter(|p| visible(p.declaration.location.line))
        .filter_map(|p| {
            render_label(decision_parts(p), mode)
                .map(|label| hint_at(content, p.declaration.location.line, label))
        });

    checking_hints.chain(decision_hints).collect()
}
