//! Update decisions for a manifest and their diagnostics

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tower_lsp::lsp_types::{
    CodeDescription, Diagnostic, DiagnosticSeverity, Position, Range, Url,
};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::parser::traits::Parser;
use crate::parser::types::{DependencyDeclaration, VersionLocation};
use crate::version::advisory::find_remediation;
use crate::version::client::RegistryClient;
use crate::version::decision::{AdvisoryDetails, Classification, UpdateDecision};
use crate::version::evaluator::{PackageEvaluator, is_name_valid, is_version_complex};
use crate::version::installed::{InstalledInspector, InstalledVersionMap};
use crate::version::limiter::ConcurrencyLimiter;
use crate::version::range::valid_range;
use crate::version::types::PackageVersions;

const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Decision for one declared dependency
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDecision {
    pub declaration: DependencyDeclaration,
    pub decision: UpdateDecision,
}

/// Turns manifest text into update decisions
pub struct DiagnosticGenerator {
    parser: Arc<dyn Parser>,
    registry: Arc<RegistryClient>,
    inspector: Arc<InstalledInspector>,
}

impl DiagnosticGenerator {
    pub fn new(
        parser: Arc<dyn Parser>,
        registry: Arc<RegistryClient>,
        inspector: Arc<InstalledInspector>,
    ) -> Self {
        Self {
            parser,
            registry,
            inspector,
        }
    }

    /// Declarations worth evaluating: valid names with a single range
    pub fn checkable_declarations(&self, content: &str) -> Vec<DependencyDeclaration> {
        self.parser
            .parse(content)
            .inspect_err(|e| warn!("Failed to parse document: {}", e))
            .unwrap_or_default()
            .into_iter()
            .filter(|declaration| is_name_valid(&declaration.name))
            .filter(|declaration| !is_version_complex(&declaration.version))
            .collect()
    }

    /// Evaluate every checkable declaration of the manifest at `manifest_dir`.
    ///
    /// Evaluations run concurrently under the configured limit. When advisory
    /// checking is on, a second pass appends one security decision per
    /// package whose installed version is affected.
    pub async fn compute_update_decisions(
        &self,
        content: &str,
        manifest_dir: &Path,
        settings: &Settings,
    ) -> Vec<PackageDecision> {
        let declarations = self.checkable_declarations(content);
        if declarations.is_empty() {
            return Vec::new();
        }

        let installed = self
            .inspector
            .installed_versions(manifest_dir, settings.cache_lifetime())
            .await;
        let installed = installed.as_deref();
        let limiter = ConcurrencyLimiter::new(settings.parallel_processes_limit);

        let fetches = declarations
            .iter()
            .map(|declaration| limiter.run(self.fetch_versions(declaration, settings)));
        let known_versions: Vec<Option<Arc<PackageVersions>>> = join_all(fetches).await;

        let mut decisions: Vec<PackageDecision> = declarations
            .iter()
            .zip(&known_versions)
            .filter_map(|(declaration, versions)| {
                evaluate(declaration, versions.as_deref(), installed, settings)
            })
            .collect();

        debug!(
            "Evaluated {} of {} dependencies",
            decisions.len(),
            declarations.len()
        );

        if settings.identify_security_advisories
            && let Some(installed) = installed
        {
            // Only packages with registry data and an installed version are audited
            let audited: Vec<(&DependencyDeclaration, &str, Arc<PackageVersions>)> = declarations
                .iter()
                .zip(known_versions)
                .filter_map(|(declaration, versions)| {
                    let installed_version = installed.get(&declaration.name)?;
                    Some((declaration, installed_version.as_str(), versions?))
                })
                .collect();
            let advisories = self.advisory_decisions(&audited, settings).await;
            decisions.extend(advisories);
        }

        decisions
    }

    /// Registry versions for a declaration; malformed ranges never reach the registry
    async fn fetch_versions(
        &self,
        declaration: &DependencyDeclaration,
        settings: &Settings,
    ) -> Option<Arc<PackageVersions>> {
        if !valid_range(&declaration.version) {
            return None;
        }
        self.registry
            .get_versions(&declaration.name, settings.cache_lifetime())
            .await
    }

    async fn advisory_decisions(
        &self,
        audited: &[(&DependencyDeclaration, &str, Arc<PackageVersions>)],
        settings: &Settings,
    ) -> Vec<PackageDecision> {
        if audited.is_empty() {
            return Vec::new();
        }

        let stable_versions: HashMap<&str, Vec<String>> = audited
            .iter()
            .map(|(declaration, _, versions)| (declaration.name.as_str(), versions.stable()))
            .collect();
        let request: HashMap<String, Vec<String>> = stable_versions
            .iter()
            .map(|(name, stable)| (name.to_string(), stable.clone()))
            .collect();
        let advisories = self
            .registry
            .get_advisories(&request, settings.cache_lifetime())
            .await;

        audited
            .iter()
            .filter_map(|(declaration, installed_version, _)| {
                let package_advisories = advisories.get(&declaration.name)?;
                let advisory = package_advisories
                    .iter()
                    .find(|advisory| advisory.affects(installed_version))?;

                let stable = stable_versions
                    .get(declaration.name.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let remediation = find_remediation(installed_version, stable, package_advisories);

                let details = AdvisoryDetails {
                    severity: advisory.severity.clone(),
                    score: advisory.cvss.score,
                    title: advisory.title.clone(),
                    url: advisory.url.clone(),
                    vulnerable_versions: advisory.vulnerable_versions.clone(),
                    fix_version: remediation.upgrade.clone(),
                    downgrade_version: remediation.downgrade.clone(),
                };
                let suggestion = remediation.upgrade.or(remediation.downgrade);
                let classification = Classification::SecurityAdvisory(details);

                Some(PackageDecision {
                    declaration: (*declaration).clone(),
                    decision: match suggestion {
                        Some(version) => UpdateDecision::with_suggestion(classification, version),
                        None => UpdateDecision::new(classification),
                    },
                })
            })
            .collect()
    }

    /// Expire installed snapshots, e.g. after a lockfile changed
    pub fn invalidate_package_cache(&self) {
        self.inspector.invalidate_package_cache();
    }
}

fn evaluate(
    declaration: &DependencyDeclaration,
    versions: Option<&PackageVersions>,
    installed: Option<&InstalledVersionMap>,
    settings: &Settings,
) -> Option<PackageDecision> {
    let installed_version = installed
        .and_then(|installed| installed.get(&declaration.name))
        .map(String::as_str);

    let decision =
        PackageEvaluator::new(declaration, settings, versions, installed_version).classify()?;

    Some(PackageDecision {
        declaration: declaration.clone(),
        decision,
    })
}

/// LSP range covering the declared version text
pub fn version_range(location: &VersionLocation) -> Range {
    Range {
        start: Position {
            line: location.line as u32,
            character: location.column as u32,
        },
        end: Position {
            line: location.line as u32,
            character: location.end_column as u32,
        },
    }
}

fn advisory_message(details: &AdvisoryDetails) -> String {
    let mut message = format!(
        "Security advisory: this package version has a known flaw of level {}/{}.",
        details.severity.to_uppercase(),
        details.score
    );

    match (&details.fix_version, &details.downgrade_version) {
        (Some(fix), _) => message.push_str(&format!(" Upgrade to {} to fix it.", fix)),
        (None, Some(downgrade)) => message.push_str(&format!(
            " No fix available yet. Downgrade to {} to fix it.",
            downgrade
        )),
        (None, None) => message.push_str(" No fix available yet."),
    }

    message
}

/// Create the diagnostic for a decision.
/// Returns None if nothing should be shown (the package is current).
pub fn create_diagnostic(package: &PackageDecision) -> Option<Diagnostic> {
    if !package.decision.is_reportable() {
        return None;
    }

    let name = &package.declaration.name;
    let suggested = package.decision.suggested_version.as_deref().unwrap_or_default();
    let mut code_description = None;

    let (severity, message) = match &package.decision.classification {
        Classification::AlreadyLatest => return None,
        Classification::InvalidRange => (
            DiagnosticSeverity::ERROR,
            "Invalid package version.".to_string(),
        ),
        Classification::VersionNotReleased => (
            DiagnosticSeverity::ERROR,
            "Package version not available.".to_string(),
        ),
        Classification::PendingInstall => (
            DiagnosticSeverity::WARNING,
            format!("Package \"{}\" pending installation: {}.", name, suggested),
        ),
        Classification::ReadyToInstall => (
            DiagnosticSeverity::INFORMATION,
            format!("Package \"{}\" is ready to be installed: {}.", name, suggested),
        ),
        Classification::UpdateAvailable { candidate, .. } => (
            DiagnosticSeverity::WARNING,
            format!("Newer version of \"{}\" is available: {}.", name, candidate),
        ),
        Classification::Prerelease => (
            DiagnosticSeverity::INFORMATION,
            format!("Pre-release version of \"{}\".", name),
        ),
        Classification::SecurityAdvisory(details) => {
            code_description = Url::parse(&details.url)
                .ok()
                .map(|href| CodeDescription { href });
            (DiagnosticSeverity::ERROR, advisory_message(details))
        }
    };

    Some(Diagnostic {
        range: version_range(&package.declaration.location),
        severity: Some(severity),
        code_description,
        message,
        source: Some(PACKAGE_NAME.to_string()),
        ..Default::default()
    })
}
