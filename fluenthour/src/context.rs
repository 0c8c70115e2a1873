//! Shared state for every subcommand: configuration, the progress database
//! and the catalog built from all library sources.

use anyhow::{Context, Result};
use fluenthour_core::library::SourceStatus;
use fluenthour_core::{Catalog, Config, Database, Level, LibrarySource, LoadReport};
use std::path::PathBuf;

use crate::LibraryArgs;

pub struct AppContext {
    pub config: Config,
    pub db: Database,
    pub db_path: PathBuf,
}

impl AppContext {
    /// Open (and migrate) the progress database at the XDG data path.
    pub fn open(config: Config) -> Result<Self> {
        let db_path = Config::database_path();
        tracing::info!(path = %db_path.display(), "Opening database");

        let db = Database::open(&db_path).context("failed to open database")?;
        db.migrate().context("failed to run database migrations")?;

        Ok(Self {
            config,
            db,
            db_path,
        })
    }

    /// Library sources in precedence order.
    ///
    /// Command-line patterns come first, then configured patterns, then
    /// imported texts (oldest first), then the bundled starter library.
    /// The catalog keeps the first session seen for each id.
    pub fn library_sources(&self, args: &LibraryArgs) -> Result<Vec<LibrarySource>> {
        let mut sources: Vec<LibrarySource> = args
            .library
            .iter()
            .cloned()
            .map(LibrarySource::Files)
            .collect();
        sources.extend(
            self.config
                .library_patterns()
                .into_iter()
                .map(LibrarySource::Files),
        );

        let imports = self.db.list_imports().context("failed to list imports")?;
        sources.extend(imports.into_iter().map(|import| LibrarySource::Text {
            origin: format!("import:{}", &import.hash[..12.min(import.hash.len())]),
            text: import.content,
        }));

        if self.config.library.include_starter && !args.no_starter {
            sources.push(LibrarySource::Starter);
        }
        Ok(sources)
    }

    pub fn load_catalog(&self, args: &LibraryArgs) -> Result<(Catalog, LoadReport)> {
        let (catalog, report) = self.load_catalog_quiet(args)?;
        for source in report.failed() {
            match &source.status {
                SourceStatus::Failed(message) => {
                    eprintln!("warning: library source {} failed: {}", source.origin, message)
                }
                _ => eprintln!("warning: library source {} matched no files", source.origin),
            }
        }
        Ok((catalog, report))
    }

    /// Load the catalog without printing source warnings.
    pub fn load_catalog_quiet(&self, args: &LibraryArgs) -> Result<(Catalog, LoadReport)> {
        let sources = self.library_sources(args)?;
        Ok(Catalog::load(&sources, self.config.library.default_level))
    }

    /// Explicit level, else the last level practised, else the configured default.
    pub fn resolve_level(&self, explicit: Option<Level>) -> Result<Level> {
        if let Some(level) = explicit {
            return Ok(level);
        }
        let last = self.db.last_level().context("failed to read last level")?;
        Ok(last.unwrap_or(self.config.library.default_level))
    }
}
