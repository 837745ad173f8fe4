// ABOUTME: Core sync logic rendering books and highlights into vault files
// ABOUTME: Create-or-update writes keyed by template-resolved paths, with progress

use crate::{
    model::Book,
    notify::Notifier,
    settings::Settings,
    templates::{
        HandlebarsEngine, TemplateEngine, TemplateResolver, TemplateSet, HIGHLIGHT_FILE,
        HIGHLIGHT_PATH, INDEX_FILE, INDEX_PATH,
    },
    util::{clean_path, parent_folder},
    vault::Vault,
    Result,
};
use serde_json::json;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub books: usize,
    pub highlights: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_highlights: usize,
    pub skipped_indexes: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.created += 1,
            WriteOutcome::Updated => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "synced {} highlights from {} books ({} new, {} updated, {} unchanged)",
            self.highlights, self.books, self.created, self.updated, self.unchanged
        )
    }
}

fn progress_text(processed: usize, total: usize) -> String {
    let percent = if total == 0 {
        100
    } else {
        processed * 100 / total
    };
    format!("synchronizing highlights {}/{} ({}%)", processed, total, percent)
}

/// Wiki-link target for a vault file: its path without the `.md` extension.
fn link_target(path: &str) -> &str {
    path.strip_suffix(".md").unwrap_or(path)
}

pub struct Synchronizer<V, E: TemplateEngine = HandlebarsEngine> {
    vault: V,
    templates: TemplateSet,
    resolver: TemplateResolver<E>,
}

impl<V: Vault> Synchronizer<V> {
    pub fn new(vault: V, templates: TemplateSet) -> Self {
        Self::with_engine(vault, templates, HandlebarsEngine::new())
    }
}

impl<V: Vault, E: TemplateEngine> Synchronizer<V, E> {
    pub fn with_engine(vault: V, templates: TemplateSet, engine: E) -> Self {
        Synchronizer {
            vault,
            templates,
            resolver: TemplateResolver::new(engine),
        }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Takes the current templates and starts over with an empty cache.
    pub fn rebind(&mut self, settings: &Settings)
    where
        E: Default,
    {
        self.templates = settings.templates.clone();
        self.resolver = TemplateResolver::new(E::default());
    }

    /// Writes one file per highlight and one index file per book.
    ///
    /// Books and highlights are processed in order. Files already written
    /// stay on disk when a later step fails.
    pub async fn sync_highlights(
        &mut self,
        books: &[Book],
        notifier: &impl Notifier,
    ) -> Result<SyncReport> {
        let total: usize = books.iter().map(|book| book.highlights.len()).sum();
        let mut report = SyncReport::default();
        let mut processed = 0;

        for book in books {
            let book_context = serde_json::to_value(book)?;
            let index_path = clean_path(&self.resolver.resolve(
                INDEX_PATH,
                &self.templates.index_path,
                &book_context,
            )?);
            let has_index = !index_path.is_empty() && !parent_folder(&index_path).is_empty();
            let index_link = if has_index { link_target(&index_path) } else { "" };

            for highlight in &book.highlights {
                let context = json!({
                    "book": book_context,
                    "highlight": highlight,
                    "index_link": index_link,
                });
                let path = clean_path(&self.resolver.resolve(
                    HIGHLIGHT_PATH,
                    &self.templates.highlight_path,
                    &context,
                )?);

                processed += 1;
                report.highlights += 1;

                if path.is_empty() {
                    log::warn!(
                        "highlight {} of {:?} resolved to an empty path, skipping",
                        highlight.id,
                        book.title
                    );
                    report.skipped_highlights += 1;
                } else {
                    let content = self.resolver.resolve(
                        HIGHLIGHT_FILE,
                        &self.templates.highlight_file,
                        &context,
                    )?;
                    let outcome = self.write_file(&path, &content).await?;
                    report.record(outcome);
                }

                notifier.set_status_bar_text(&progress_text(processed, total), false);
            }

            if !has_index {
                log::debug!("no index file for {:?}", book.title);
                report.skipped_indexes += 1;
            } else {
                let content =
                    self.resolver
                        .resolve(INDEX_FILE, &self.templates.index_file, &book_context)?;
                let outcome = self.write_file(&index_path, &content).await?;
                report.record(outcome);
            }

            report.books += 1;
        }

        Ok(report)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<WriteOutcome> {
        let folder = parent_folder(path);
        if !folder.is_empty() && !self.vault.exists(folder).await? {
            self.vault.mkdir(folder).await?;
        }

        if self.vault.exists(path).await? {
            if self.vault.read(path).await? == content {
                return Ok(WriteOutcome::Unchanged);
            }
            self.vault.write(path, content).await?;
            log::info!("updated {}", path);
            Ok(WriteOutcome::Updated)
        } else {
            self.vault.write(path, content).await?;
            log::info!("created {}", path);
            Ok(WriteOutcome::Created)
        }
    }
}
