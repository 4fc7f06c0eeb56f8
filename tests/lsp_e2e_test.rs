//! LSP E2E tests
//!
//! These tests verify the LSP protocol communication through tower-lsp's Service layer.
//! Uses mock registries and a fake npm, with the manifest inside a temp directory.

mod helper;

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::Service;
use tower_lsp::LspService;
use tower_lsp::jsonrpc::Request;
use tower_lsp::lsp_types::*;

use helper::*;
use outdated_lsp::lsp::backend::Backend;

const MANIFEST: &str = r#"{
  "dependencies": {
    "lodash": "^4.17.20",
    "react": "^18.2.0"
  }
}"#;

const LODASH_ONLY: &str = r#"{
  "dependencies": {
    "lodash": "^4.17.20"
  }
}"#;

struct TestServer {
    service: LspService<Backend>,
    notifications: mpsc::Receiver<Request>,
    uri: Url,
    dir: TempDir,
}

impl TestServer {
    async fn start(
        registry: MockRegistry,
        advisories: MockAdvisorySource,
        npm: FakeNpm,
        options: Option<serde_json::Value>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let uri = Url::from_file_path(dir.path().join("package.json")).unwrap();

        let (mut service, socket) = LspService::build(|client| {
            Backend::build(
                client,
                Arc::new(registry),
                Arc::new(advisories),
                Arc::new(npm),
            )
        })
        .finish();
        let notifications = spawn_notification_collector(socket);

        let initialize = match options {
            Some(options) => create_initialize_request_with_options(1, options),
            None => create_initialize_request(1),
        };
        let init_response = service.call(initialize).await.unwrap();
        assert!(init_response.is_some());
        service
            .call(create_initialized_notification())
            .await
            .unwrap();

        Self {
            service,
            notifications,
            uri,
            dir,
        }
    }

    async fn notify(&mut self, request: Request) {
        self.service.call(request).await.unwrap();
    }

    async fn request(&mut self, request: Request) -> serde_json::Value {
        let response = self.service.call(request).await.unwrap().unwrap();
        let (_, result) = response.into_parts();
        result.unwrap()
    }

    async fn open(&mut self, content: &str) -> PublishDiagnosticsParams {
        let uri = self.uri.clone();
        self.notify(create_did_open_notification(&uri, content)).await;
        wait_for_diagnostics(&mut self.notifications).await
    }
}

fn no_advisories() -> serde_json::Value {
    json!({ "identifySecurityAdvisories": false })
}

fn registry() -> MockRegistry {
    MockRegistry::new()
        .with_versions("lodash", vec!["4.17.20", "4.17.21"])
        .with_versions("react", vec!["18.2.0", "18.3.1"])
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_open_publishes_newer_version_warning() {
    let npm = FakeNpm::new(&[("lodash", "4.17.20"), ("react", "18.3.1")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;

    let params = server.open(MANIFEST).await;

    assert_eq!(params.uri, server.uri);
    let lodash = params
        .diagnostics
        .iter()
        .find(|d| d.range.start.line == 2)
        .expect("diagnostic for lodash");
    assert_eq!(lodash.severity, Some(DiagnosticSeverity::WARNING));
    assert_eq!(
        lodash.message,
        "Newer version of \"lodash\" is available: 4.17.21."
    );
    assert_eq!(lodash.source.as_deref(), Some("outdated-lsp"));
    assert_eq!(lodash.range.start.character, 15);
    assert_eq!(lodash.range.end.character, 23);
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_open_reports_pending_installation() {
    let npm = FakeNpm::new(&[("react", "18.3.1")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;

    let params = server.open(MANIFEST).await;

    let messages: Vec<_> = params.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert!(messages.contains(&"Package \"lodash\" pending installation: 4.17.21."));
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_open_reports_invalid_range_as_error() {
    let npm = FakeNpm::new(&[("lodash", "4.17.20")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;

    let params = server
        .open(r#"{"dependencies": {"lodash": "^a.b.c"}}"#)
        .await;

    assert_eq!(params.diagnostics.len(), 1);
    assert_eq!(
        params.diagnostics[0].severity,
        Some(DiagnosticSeverity::ERROR)
    );
    assert_eq!(params.diagnostics[0].message, "Invalid package version.");
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_open_no_diagnostics_for_latest_version() {
    let npm = FakeNpm::new(&[("lodash", "4.17.21")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;

    let params = server
        .open(r#"{"dependencies": {"lodash": "^4.17.21"}}"#)
        .await;

    assert!(params.diagnostics.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_level_option_suppresses_smaller_updates() {
    let npm = FakeNpm::new(&[("lodash", "4.17.20"), ("react", "18.2.0")]);
    let options = json!({ "level": "major", "identifySecurityAdvisories": false });
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(options)).await;

    let params = server.open(MANIFEST).await;

    assert!(params.diagnostics.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_change_publishes_diagnostics_on_version_update() {
    let npm = FakeNpm::new(&[("lodash", "4.17.21")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;

    let initial = server
        .open(r#"{"dependencies": {"lodash": "^4.17.21"}}"#)
        .await;
    assert!(initial.diagnostics.is_empty());

    let uri = server.uri.clone();
    server
        .notify(create_did_change_notification(
            &uri,
            r#"{"dependencies": {"lodash": "^4.17.22"}}"#,
            2,
        ))
        .await;
    let changed = wait_for_diagnostics(&mut server.notifications).await;

    assert_eq!(changed.diagnostics.len(), 1);
    assert_eq!(
        changed.diagnostics[0].message,
        "Package version not available."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_security_advisory_suggests_upgrade() {
    let registry = MockRegistry::new().with_versions("pkg", vec!["1.0.0", "1.0.1", "1.0.2"]);
    let advisories = MockAdvisorySource::new().with_advisory("pkg", "high", "=1.0.1");
    let npm = FakeNpm::new(&[("pkg", "1.0.1")]);
    let mut server = TestServer::start(registry, advisories, npm, None).await;

    let params = server.open(r#"{"dependencies": {"pkg": "1.0.1"}}"#).await;

    let advisory = params
        .diagnostics
        .iter()
        .find(|d| d.message.starts_with("Security advisory"))
        .expect("advisory diagnostic");
    assert_eq!(advisory.severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(
        advisory.message,
        "Security advisory: this package version has a known flaw of level HIGH/7.5. Upgrade to 1.0.2 to fix it."
    );
    assert_eq!(
        advisory
            .code_description
            .as_ref()
            .map(|c| c.href.as_str()),
        Some("https://github.com/advisories/pkg")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_code_action_offers_single_and_bulk_updates() {
    let npm = FakeNpm::new(&[("lodash", "4.17.20"), ("react", "18.2.0")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;
    let params = server.open(MANIFEST).await;
    assert_eq!(params.diagnostics.len(), 2);

    let uri = server.uri.clone();
    let result = server
        .request(create_code_action_request(2, &uri, 2, 2))
        .await;
    let actions: Vec<CodeAction> = serde_json::from_value(result).unwrap();

    let titles: Vec<_> = actions.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Update \"lodash\" to 4.17.21", "Update all 2 packages"]
    );
    let edits = &actions[0].edit.as_ref().unwrap().changes.as_ref().unwrap()[&uri];
    assert_eq!(edits[0].new_text, "^4.17.21");
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_inlay_hints_show_update_labels() {
    let npm = FakeNpm::new(&[("lodash", "4.17.20"), ("react", "18.3.1")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;
    server.open(LODASH_ONLY).await;

    let uri = server.uri.clone();
    let result = server
        .request(create_inlay_hint_request(2, &uri, 0, 5))
        .await;
    let hints: Vec<InlayHint> = serde_json::from_value(result).unwrap();

    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].position.line, 2);
    let InlayHintLabel::LabelParts(parts) = &hints[0].label else {
        panic!("fancy decorations use label parts");
    };
    let label: String = parts.iter().map(|p| p.value.as_str()).collect();
    assert_eq!(label, "⚠ Update available: 4.17.21");
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_did_close_clears_diagnostics() {
    let npm = FakeNpm::new(&[("lodash", "4.17.20")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;
    let params = server.open(MANIFEST).await;
    assert!(!params.diagnostics.is_empty());

    let uri = server.uri.clone();
    server.notify(create_did_close_notification(&uri)).await;
    let cleared = wait_for_diagnostics(&mut server.notifications).await;

    assert_eq!(cleared.uri, uri);
    assert!(cleared.diagnostics.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_lockfile_change_refreshes_installed_packages() {
    let npm = FakeNpm::new(&[("react", "18.3.1")]);
    let mut server = TestServer::start(
        registry(),
        MockAdvisorySource::new(),
        npm.clone(),
        Some(no_advisories()),
    )
    .await;

    let before = server.open(LODASH_ONLY).await;
    assert_eq!(
        before.diagnostics[0].message,
        "Package \"lodash\" pending installation: 4.17.21."
    );

    npm.set_installed(&[("lodash", "4.17.20"), ("react", "18.3.1")]);
    let lockfile = Url::from_file_path(server.dir.path().join("package-lock.json")).unwrap();
    server
        .notify(create_did_change_watched_files_notification(&lockfile))
        .await;
    let after = wait_for_diagnostics(&mut server.notifications).await;

    assert_eq!(after.diagnostics.len(), 1);
    assert_eq!(
        after.diagnostics[0].message,
        "Newer version of \"lodash\" is available: 4.17.21."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_configuration_change_reanalyses_open_documents() {
    let npm = FakeNpm::new(&[("lodash", "4.17.20"), ("react", "18.3.1")]);
    let mut server =
        TestServer::start(registry(), MockAdvisorySource::new(), npm, Some(no_advisories())).await;
    let before = server.open(LODASH_ONLY).await;
    assert_eq!(before.diagnostics.len(), 1);

    server
        .notify(create_did_change_configuration_notification(json!({
            "outdated": { "level": "minor", "identifySecurityAdvisories": false }
        })))
        .await;
    let after = wait_for_diagnostics(&mut server.notifications).await;

    assert!(after.diagnostics.is_empty());
}
