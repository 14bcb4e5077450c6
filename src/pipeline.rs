//! Orchestration of a collection build.
//!
//! A [`Pipeline`] wires one stage implementation per concern and drives them
//! in a fixed order:
//!
//! ```text
//! Loader ──► conflict check ──► ModuleResolver::prepare
//!                                   │
//!                   ┌───────────────┴───────────────┐
//!                   ▼               ▼               ▼     (rayon fan-out)
//!            FileConverter   FileConverter   FileConverter
//!                   │               │               │
//!                Writer          Writer          Writer
//!                   └───────────────┬───────────────┘
//!                                   ▼
//!                       ModuleResolver::resolve
//!                (aggregator, shared modules, pruning)
//! ```
//!
//! The fan-out is fail-fast: the first failing file stops the batch and is
//! returned. Artifacts written before the failure stay on disk, but codegen
//! has not run, so no module references a missing artifact.
//!
//! Stages are injected as trait objects. [`Pipeline::for_collection`] picks
//! the filesystem implementations and the converter registered for the
//! collection's `format`; tests swap in mocks.
//!
//! Progress is reported through an optional [`BuildEvent`] channel, consumed by
//! the CLI printer thread (see [`crate::output`]).

use crate::codegen::{FsModuleResolver, ModuleResolver, ResolvedModule, check_conflicts};
use crate::config::{AppConfig, ConfigError};
use crate::convert::{DefaultFileConverter, FileConverter};
use crate::converter::ConverterRegistry;
use crate::error::PipelineError;
use crate::loader::{GlobLoader, Loader};
use crate::validator::SchemaValidator;
use crate::writer::{FsWriter, WriteOutcome, Writer};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use tracing::info;

/// Progress of a build, in the order things happen.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    CollectionStarted {
        collection: String,
        sources: usize,
    },
    /// Sent from worker threads; siblings arrive in any order.
    ArtifactWritten {
        collection: String,
        artifact: ArtifactReport,
    },
    ModuleGenerated {
        collection: String,
        aggregator: PathBuf,
        imports: usize,
    },
    Pruned {
        collection: String,
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    /// Source path relative to the collection directory.
    pub source: String,
    pub artifact: PathBuf,
    pub outcome: WriteOutcome,
}

/// Result of a successful collection build.
#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub collection: String,
    pub module_dir: PathBuf,
    /// One entry per source, in source order.
    pub artifacts: Vec<ArtifactReport>,
    pub module: ResolvedModule,
}

impl CollectionReport {
    pub fn written(&self) -> usize {
        self.count(WriteOutcome::Written)
    }

    pub fn unchanged(&self) -> usize {
        self.count(WriteOutcome::Unchanged)
    }

    fn count(&self, outcome: WriteOutcome) -> usize {
        self.artifacts
            .iter()
            .filter(|a| a.outcome == outcome)
            .count()
    }
}

/// Result of validating a collection without writing anything.
#[derive(Debug)]
pub struct CheckReport {
    pub collection: String,
    pub checked: usize,
    /// Every failing file, in source order.
    pub failures: Vec<PipelineError>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One collection's stages, ready to run.
pub struct Pipeline {
    config: AppConfig,
    loader: Arc<dyn Loader>,
    file_converter: Arc<dyn FileConverter>,
    resolver: Arc<dyn ModuleResolver>,
    writer: Arc<dyn Writer>,
    events: Option<Sender<BuildEvent>>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        loader: Arc<dyn Loader>,
        file_converter: Arc<dyn FileConverter>,
        resolver: Arc<dyn ModuleResolver>,
        writer: Arc<dyn Writer>,
    ) -> Self {
        Self {
            config,
            loader,
            file_converter,
            resolver,
            writer,
            events: None,
        }
    }

    /// Filesystem stages and the standard converters.
    pub fn for_collection(config: AppConfig) -> Result<Self, PipelineError> {
        let registry = ConverterRegistry::standard(&config.markdown);
        Self::with_registry(config, &registry)
    }

    /// Filesystem stages, converter looked up by the collection's `format`.
    pub fn with_registry(
        config: AppConfig,
        registry: &ConverterRegistry,
    ) -> Result<Self, PipelineError> {
        let converter = registry.get(&config.format).ok_or_else(|| {
            ConfigError::Validation(format!(
                "collection `{}`: unknown format `{}` (available: {})",
                config.name,
                config.format,
                registry.formats().join(", ")
            ))
        })?;
        let validator = Arc::new(SchemaValidator::for_config(&config));
        let file_converter = DefaultFileConverter::new(&config, converter, validator);

        Ok(Self::new(
            config,
            Arc::new(GlobLoader),
            Arc::new(file_converter),
            Arc::new(FsModuleResolver),
            Arc::new(FsWriter),
        ))
    }

    pub fn with_events(mut self, events: Sender<BuildEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the collection: load, convert and write every file, then codegen.
    pub fn run(&self) -> Result<CollectionReport, PipelineError> {
        let config = &self.config;
        let collection = config.name.clone();

        let files = self.loader.load(config)?;
        check_conflicts(&files)?;
        info!(collection = %collection, sources = files.len(), "building");
        self.emit(BuildEvent::CollectionStarted {
            collection: collection.clone(),
            sources: files.len(),
        });

        self.resolver.prepare(config)?;

        let artifacts = files
            .par_iter()
            .map_with(self.events.clone(), |events, file| {
                let output = self.file_converter.convert(file)?;
                let outcome = self.writer.write(&output)?;
                let report = ArtifactReport {
                    source: file.display_name(),
                    artifact: output.path(),
                    outcome,
                };
                if let Some(tx) = events {
                    tx.send(BuildEvent::ArtifactWritten {
                        collection: collection.clone(),
                        artifact: report.clone(),
                    })
                    .ok();
                }
                Ok(report)
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let module = self.resolver.resolve(config, &files)?;
        self.emit(BuildEvent::ModuleGenerated {
            collection: collection.clone(),
            aggregator: module.aggregator.clone(),
            imports: module.identifiers.len(),
        });
        for path in &module.pruned {
            self.emit(BuildEvent::Pruned {
                collection: collection.clone(),
                path: path.clone(),
            });
        }

        Ok(CollectionReport {
            collection,
            module_dir: config.output.module_dir(),
            artifacts,
            module,
        })
    }

    /// Convert and validate every file without writing. Collects all failures.
    pub fn check(&self) -> Result<CheckReport, PipelineError> {
        let files = self.loader.load(&self.config)?;
        check_conflicts(&files)?;

        let failures: Vec<PipelineError> = files
            .par_iter()
            .filter_map(|file| self.file_converter.convert(file).err())
            .collect();

        Ok(CheckReport {
            collection: self.config.name.clone(),
            checked: files.len(),
            failures,
        })
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }
}

/// Build collections one after another, stopping at the first failure.
///
/// `only` restricts the run to the collection with that name.
pub fn build_project(
    configs: &[AppConfig],
    only: Option<&str>,
    events: Option<Sender<BuildEvent>>,
) -> Result<Vec<CollectionReport>, PipelineError> {
    select(configs, only)?
        .into_iter()
        .map(|config| {
            let mut pipeline = Pipeline::for_collection(config.clone())?;
            if let Some(tx) = &events {
                pipeline = pipeline.with_events(tx.clone());
            }
            pipeline.run()
        })
        .collect()
}

/// Check collections one after another. Load and setup errors abort; file
/// failures are collected into the reports.
pub fn check_project(
    configs: &[AppConfig],
    only: Option<&str>,
) -> Result<Vec<CheckReport>, PipelineError> {
    select(configs, only)?
        .into_iter()
        .map(|config| Pipeline::for_collection(config.clone())?.check())
        .collect()
}

/// Remove every collection's base directory. Returns the directories removed.
pub fn clean(configs: &[AppConfig]) -> Result<Vec<PathBuf>, PipelineError> {
    let base_dirs: BTreeSet<&PathBuf> = configs.iter().map(|c| &c.output.base_dir).collect();
    let mut removed = Vec::new();
    for dir in base_dirs {
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(|source| PipelineError::write(dir, source))?;
            info!("removed {}", dir.display());
            removed.push(dir.clone());
        }
    }
    Ok(removed)
}

fn select<'a>(
    configs: &'a [AppConfig],
    only: Option<&str>,
) -> Result<Vec<&'a AppConfig>, PipelineError> {
    let Some(name) = only else {
        return Ok(configs.iter().collect());
    };
    match configs.iter().find(|c| c.name == name) {
        Some(config) => Ok(vec![config]),
        None => {
            let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
            Err(ConfigError::Validation(format!(
                "no collection named `{name}` (configured: {})",
                names.join(", ")
            ))
            .into())
        }
    }
}
