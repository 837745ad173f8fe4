// ABOUTME: Orchestrates sync runs across client, synchronizer, settings and notifier
// ABOUTME: Every error ends as one user-visible notice; settings changes re-bind dependents

use crate::{
    api::ReadwiseClient,
    auth::TOKEN_PAGE,
    notify::Notifier,
    settings::{Settings, SettingsStore},
    sync::{SyncReport, Synchronizer},
    templates::{HandlebarsEngine, TemplateEngine},
    vault::Vault,
    Error, Result,
};
use chrono::{SecondsFormat, Utc};

/// Where the most recent sync run got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    Synchronizing,
    Succeeded,
    Failed,
}

pub struct Atoms<S, V, N, E: TemplateEngine = HandlebarsEngine> {
    settings: Settings,
    store: S,
    client: ReadwiseClient,
    synchronizer: Synchronizer<V, E>,
    notifier: N,
    state: SyncState,
    token_override: Option<String>,
}

impl<S: SettingsStore, V: Vault, N: Notifier> Atoms<S, V, N> {
    /// Loads settings from `store` and wires up a client and synchronizer.
    pub fn load(store: S, vault: V, notifier: N, base_url: Option<String>) -> Result<Self> {
        let settings = Settings::load(&store)?;
        let client = ReadwiseClient::from_settings(&settings, base_url)?;
        let synchronizer = Synchronizer::new(vault, settings.templates.clone());
        Ok(Self::new(settings, store, client, synchronizer, notifier))
    }
}

impl<S, V, N, E> Atoms<S, V, N, E>
where
    S: SettingsStore,
    V: Vault,
    N: Notifier,
    E: TemplateEngine + Default,
{
    pub fn new(
        settings: Settings,
        store: S,
        client: ReadwiseClient,
        synchronizer: Synchronizer<V, E>,
        notifier: N,
    ) -> Self {
        Atoms {
            settings,
            store,
            client,
            synchronizer,
            notifier,
            state: SyncState::Idle,
            token_override: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn vault(&self) -> &V {
        self.synchronizer.vault()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Applies a settings change, persists it and re-binds the client and
    /// synchronizer to the new values.
    pub fn update_settings(&mut self, change: impl FnOnce(&mut Settings) -> Result<()>) -> Result<()> {
        let mut next = self.settings.clone();
        change(&mut next)?;
        self.store.save(&next)?;
        self.settings = next;
        self.rebind();
        Ok(())
    }

    /// Uses `token` for this session without persisting it.
    pub fn override_token(&mut self, token: String) {
        self.token_override = Some(token);
        self.rebind_client();
    }

    /// The session override if set, otherwise the saved token.
    pub fn token(&self) -> &str {
        self.token_override
            .as_deref()
            .unwrap_or(&self.settings.readwise_token)
    }

    fn rebind_client(&mut self) {
        self.client.rebind(&self.settings);
        if let Some(token) = &self.token_override {
            self.client.set_token(token.clone());
        }
    }

    fn rebind(&mut self) {
        self.rebind_client();
        self.synchronizer.rebind(&self.settings);
    }

    /// Fetches changed books and writes them to the vault.
    ///
    /// Failures are reported as a `synchronization error` notice and then
    /// returned; files written before the failure remain.
    pub async fn sync(&mut self) -> Result<SyncReport> {
        self.notifier.notice("synchronizing highlights");

        match self.run_sync().await {
            Ok(report) => {
                self.state = SyncState::Succeeded;
                self.notifier.set_status_bar_text("", false);
                self.notifier.notice(&report.to_string());
                Ok(report)
            }
            Err(e) => {
                self.state = SyncState::Failed;
                if let Some(status) = e.status() {
                    self.notifier
                        .log(&format!("sync failed on HTTP status {}", status));
                }
                self.notifier.set_status_bar_text("", false);
                self.notifier
                    .notice(&format!("synchronization error: {}", e));
                Err(e)
            }
        }
    }

    async fn run_sync(&mut self) -> Result<SyncReport> {
        if self.token().trim().is_empty() {
            return Err(Error::InvalidToken(format!(
                "No Readwise token configured. Get one at {}",
                TOKEN_PAGE
            )));
        }

        self.state = SyncState::Fetching;
        self.notifier.set_status_bar_text("fetching highlights", true);
        let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let books = self.client.get_highlights().await?;

        self.state = SyncState::Synchronizing;
        self.notifier.log(&format!("synchronizing {} books", books.len()));
        let report = self
            .synchronizer
            .sync_highlights(&books, &self.notifier)
            .await?;

        self.settings.readwise_update_after = Some(started_at);
        self.store.save(&self.settings)?;
        self.rebind_client();

        Ok(report)
    }

    /// Forgets the high-water mark and syncs everything again.
    pub async fn resync(&mut self) -> Result<SyncReport> {
        if let Err(e) = self.update_settings(|settings| {
            settings.readwise_update_after = None;
            Ok(())
        }) {
            self.notifier
                .notice(&format!("synchronization error: {}", e));
            return Err(e);
        }
        self.sync().await
    }

    /// Runs a sync when the settings ask for one at startup.
    pub async fn startup(&mut self) -> Result<Option<SyncReport>> {
        if !self.settings.sync_on_start {
            return Ok(None);
        }
        self.sync().await.map(Some)
    }

    pub async fn check_token(&mut self) -> Result<()> {
        match self.client.validate_token().await {
            Ok(()) => {
                self.notifier.notice("token is valid");
                Ok(())
            }
            Err(e) => {
                self.notifier.notice(&format!("token check failed: {}", e));
                Err(e)
            }
        }
    }
}
