// ABOUTME: End-to-end tests: mock Readwise API into a directory vault
// ABOUTME: Covers first sync, incremental reruns, resync and failure notices

use readwise_atoms::commands::{Atoms, SyncState};
use readwise_atoms::notify::Notifier;
use readwise_atoms::storage::JsonSettingsStore;
use readwise_atoms::vault::FsVault;
use readwise_atoms::Error;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Recorder {
    notices: Mutex<Vec<String>>,
    logs: Mutex<Vec<String>>,
}

impl Recorder {
    fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for Recorder {
    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn log(&self, message: &str) {
        self.logs.lock().unwrap().push(message.to_string());
    }

    fn set_status_bar_text(&self, _text: &str, _should_log: bool) {}
}

type TestAtoms = Atoms<JsonSettingsStore, FsVault, Recorder>;

struct Workspace {
    _temp: TempDir,
    vault: std::path::PathBuf,
    settings_file: std::path::PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let vault = temp.path().join("vault");
        let settings_file = temp.path().join("config").join("data.json");
        fs::create_dir_all(&vault).unwrap();
        fs::create_dir_all(settings_file.parent().unwrap()).unwrap();
        fs::write(&settings_file, r#"{"readwiseToken":"test_token"}"#).unwrap();
        Workspace {
            _temp: temp,
            vault,
            settings_file,
        }
    }

    fn atoms(&self, server: &MockServer) -> TestAtoms {
        Atoms::load(
            JsonSettingsStore::new(&self.settings_file),
            FsVault::new(&self.vault),
            Recorder::default(),
            Some(server.uri()),
        )
        .unwrap()
    }

    fn saved_settings(&self) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(&self.settings_file).unwrap()).unwrap()
    }

    fn files(&self) -> Vec<String> {
        let mut files = Vec::new();
        collect_files(&self.vault, &self.vault, &mut files);
        files.sort();
        files
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.vault.join(relative)).unwrap()
    }
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(root, &path, files);
        } else {
            let relative = path.strip_prefix(root).unwrap();
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }
}

fn export_body() -> serde_json::Value {
    serde_json::json!({
        "count": 2,
        "nextPageCursor": null,
        "results": [
            {
                "user_book_id": 7,
                "title": "The Dispossessed: An Ambiguous Utopia",
                "author": "Ursula K. Le Guin",
                "category": "books",
                "highlights": [
                    {
                        "id": 10,
                        "text": "You cannot buy the revolution.",
                        "note": "on Anarres",
                        "highlighted_at": "2024-01-10T08:00:00Z",
                        "tags": [{ "id": 1, "name": "politics" }]
                    },
                    { "id": 11, "text": "True journey is return." }
                ]
            },
            {
                "user_book_id": 8,
                "title": "Notes",
                "author": "Ann",
                "highlights": [{ "id": 20, "text": "Short one." }]
            }
        ]
    })
}

async fn mock_api() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    server
}

async fn mount_full_export(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/export/"))
        .and(query_param_is_missing("updatedAfter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(export_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_first_sync_writes_atoms_and_indexes() {
    let server = mock_api().await;
    mount_full_export(&server).await;
    let workspace = Workspace::new();
    let mut atoms = workspace.atoms(&server);

    let report = atoms.sync().await.unwrap();

    assert_eq!(atoms.state(), SyncState::Succeeded);
    assert_eq!(report.books, 2);
    assert_eq!(report.highlights, 3);
    assert_eq!(report.created, 5);

    insta::assert_snapshot!(workspace.files().join("\n"), @r###"
    Readwise Atoms/Ann - Notes/index.md
    Readwise Atoms/Ann - Notes/quotes/20.md
    Readwise Atoms/Ursula K. Le Guin - The Dispossessed - An Ambiguous Utopia/index.md
    Readwise Atoms/Ursula K. Le Guin - The Dispossessed - An Ambiguous Utopia/quotes/10.md
    Readwise Atoms/Ursula K. Le Guin - The Dispossessed - An Ambiguous Utopia/quotes/11.md
    "###);

    let quote = workspace.read(
        "Readwise Atoms/Ursula K. Le Guin - The Dispossessed - An Ambiguous Utopia/quotes/10.md",
    );
    assert!(quote.starts_with("---\nid: 10\n"));
    assert!(quote.contains(
        "book: \"[[Readwise Atoms/Ursula K. Le Guin - The Dispossessed - An Ambiguous Utopia/index|The Dispossessed: An Ambiguous Utopia]]\""
    ));
    assert!(quote.contains("> You cannot buy the revolution."));
    assert!(quote.contains("on Anarres"));
    assert!(quote.contains("  - politics"));
    assert!(quote.contains("(Ursula K. Le Guin, *The Dispossessed: An Ambiguous Utopia*)"));

    let index = workspace
        .read("Readwise Atoms/Ursula K. Le Guin - The Dispossessed - An Ambiguous Utopia/index.md");
    assert!(index.starts_with("# The Dispossessed: An Ambiguous Utopia"));
    assert!(index.contains("Category: #books"));
    assert!(index.contains("- [[quotes/10|You cannot buy the revolution.]]"));
    assert!(index.contains("- [[quotes/11|True journey is return.]]"));

    let notices = atoms.notifier().notices();
    assert_eq!(notices.first().map(String::as_str), Some("synchronizing highlights"));
    assert_eq!(
        notices.last().map(String::as_str),
        Some("synced 3 highlights from 2 books (5 new, 0 updated, 0 unchanged)")
    );

    let saved = workspace.saved_settings();
    assert_eq!(saved["readwiseToken"], "test_token");
    let mark = saved["readwiseUpdateAfter"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(mark).is_ok());
}

#[tokio::test]
async fn test_rerun_is_incremental_and_idempotent() {
    let server = mock_api().await;
    mount_full_export(&server).await;
    let workspace = Workspace::new();

    let mut atoms = workspace.atoms(&server);
    atoms.sync().await.unwrap();
    let mark = workspace.saved_settings()["readwiseUpdateAfter"]
        .as_str()
        .unwrap()
        .to_string();

    Mock::given(method("GET"))
        .and(path("/export/"))
        .and(query_param("updatedAfter", mark.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(export_body()))
        .expect(1)
        .mount(&server)
        .await;

    let edited = "Readwise Atoms/Ann - Notes/quotes/20.md";
    fs::write(workspace.vault.join(edited), "local edit").unwrap();

    // A fresh load picks the mark up from disk.
    let mut atoms = workspace.atoms(&server);
    let report = atoms.sync().await.unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 4);
    assert!(workspace.read(edited).contains("> Short one."));
    assert_eq!(workspace.files().len(), 5);
}

#[tokio::test]
async fn test_resync_clears_the_mark() {
    let server = mock_api().await;
    mount_full_export(&server).await;
    let workspace = Workspace::new();
    let mut atoms = workspace.atoms(&server);
    atoms.sync().await.unwrap();

    let report = atoms.resync().await.unwrap();

    assert_eq!(report.unchanged, 5);
    let requests = server.received_requests().await.unwrap();
    let exports: Vec<_> = requests
        .iter()
        .filter(|r| r.url.path() == "/export/")
        .collect();
    assert_eq!(exports.len(), 2);
    assert!(exports
        .iter()
        .all(|r| r.url.query_pairs().all(|(k, _)| k != "updatedAfter")));
    assert!(workspace.saved_settings()["readwiseUpdateAfter"].is_string());
}

#[tokio::test]
async fn test_empty_index_template_writes_only_atoms() {
    let server = mock_api().await;
    mount_full_export(&server).await;
    let workspace = Workspace::new();
    let mut atoms = workspace.atoms(&server);
    atoms
        .update_settings(|settings| settings.set("indexPathTemplate", ""))
        .unwrap();

    let report = atoms.sync().await.unwrap();

    assert_eq!(report.skipped_indexes, 2);
    assert!(workspace.files().iter().all(|f| !f.ends_with("index.md")));
    assert_eq!(workspace.files().len(), 3);
    assert_eq!(workspace.saved_settings()["indexPathTemplate"], "");
}

#[tokio::test]
async fn test_failed_sync_notifies_and_keeps_mark() {
    let server = mock_api().await;
    Mock::given(method("GET"))
        .and(path("/export/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let workspace = Workspace::new();
    let mut atoms = workspace.atoms(&server);

    let result = atoms.sync().await;

    assert!(matches!(result, Err(Error::Server { status: 500, .. })));
    assert_eq!(atoms.state(), SyncState::Failed);

    let notices = atoms.notifier().notices();
    assert_eq!(notices.len(), 2);
    assert!(notices[1].starts_with(
        "synchronization error: There was an error with the following request: "
    ));
    assert!(notices[1].ends_with("500: Internal Server Error"));
    assert!(atoms
        .notifier()
        .logs
        .lock()
        .unwrap()
        .contains(&"sync failed on HTTP status 500".to_string()));

    assert!(workspace.files().is_empty());
    assert!(workspace.saved_settings().get("readwiseUpdateAfter").is_none());
}
