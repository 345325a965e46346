//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info};

use crate::api::{ApiRequest, Router};
use crate::cli::parse::{Commands, OutputFormat, ProgressCommands};
use crate::cli::presentation::{
    format_listing, format_overlay, format_roadmap, format_user_listing, format_user_view,
    format_violations, to_pretty_json,
};
use crate::config::{ConfigLoader, SkillsprintConfig};
use crate::dispatch::{HttpTaskDispatcher, InProcessDispatcher, TaskDispatcher};
use crate::error::{ApiError, StorageError};
use crate::generator::ProviderGenerator;
use crate::pipeline::{GenerationPipeline, RoadmapRequest};
use crate::progress::{OverlayPatch, ProgressStatus};
use crate::provider::{CompletionOptions, ProviderFactory};
use crate::scheduler::ContinuationScheduler;
use crate::search::HttpResourceSearch;
use crate::store::SledRecordStore;
use crate::tree::{Projection, Roadmap, RoadmapCodec};

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(900);

/// Command name used in logs, e.g. "progress.set".
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Generate { .. } => "generate".to_string(),
        Commands::Show { .. } => "show".to_string(),
        Commands::List { .. } => "list".to_string(),
        Commands::Update { .. } => "update".to_string(),
        Commands::Delete { .. } => "delete".to_string(),
        Commands::Enrich { .. } => "enrich".to_string(),
        Commands::Verify { .. } => "verify".to_string(),
        Commands::Progress { command } => {
            let sub = match command {
                ProgressCommands::Show { .. } => "show",
                ProgressCommands::Set { .. } => "set",
                ProgressCommands::Delete { .. } => "delete",
                ProgressCommands::List { .. } => "list",
            };
            format!("progress.{sub}")
        }
        Commands::Request { .. } => "request".to_string(),
    }
}

/// Runtime context for CLI execution: loaded config, the opened store and the codec.
/// Collaborators that need network configuration are built per command.
pub struct RunContext {
    config: SkillsprintConfig,
    store: Arc<SledRecordStore>,
    codec: Arc<RoadmapCodec>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        config.ensure_valid()?;
        Self::from_config(&workspace_root, config)
    }

    pub fn from_config(workspace_root: &Path, config: SkillsprintConfig) -> Result<Self, ApiError> {
        let store_path = config.storage.resolve(workspace_root);
        std::fs::create_dir_all(&store_path).map_err(StorageError::IoError)?;
        let store = Arc::new(SledRecordStore::new(&store_path)?);
        let codec = Arc::new(RoadmapCodec::new(store.clone()));
        debug!(store = %store_path.display(), "Run context ready");
        Ok(Self {
            config,
            store,
            codec,
        })
    }

    pub fn codec(&self) -> &RoadmapCodec {
        &self.codec
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let name = command_name(command);
        let result = self.execute_inner(command).await;
        if result.is_ok() {
            self.store.flush()?;
        }
        info!(
            command = %name,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Generate {
                skill,
                goal,
                current_level,
                desired_level,
                duration,
                daily_time,
                format,
            } => {
                let request = RoadmapRequest {
                    skill_name: skill.clone(),
                    goal: goal.clone(),
                    current_skill_level: current_level.clone(),
                    desired_skill_level: desired_level.clone(),
                    estimated_learning_duration: duration.clone(),
                    daily_time: daily_time.clone(),
                };
                let roadmap = self.pipeline()?.generate(&request).await?;
                format_roadmap(&roadmap, *format)
            }
            Commands::Show {
                roadmap_id,
                user,
                format,
            } => match user {
                Some(user) => format_user_view(&self.codec.load_for_user(user, roadmap_id)?, *format),
                None => format_roadmap(&self.codec.load(roadmap_id)?, *format),
            },
            Commands::List {
                limit,
                user,
                format,
            } => match user {
                Some(user) => format_user_listing(user, &self.codec.list_for_user(user)?, *format),
                None => format_listing(&self.codec.list(&Projection::summary(), *limit)?, *format),
            },
            Commands::Update { roadmap_id, file } => {
                let raw = std::fs::read_to_string(file).map_err(StorageError::IoError)?;
                let tree: Roadmap = serde_json::from_str(&raw).map_err(|e| {
                    ApiError::Validation(format!("{} is not a roadmap document: {e}", file.display()))
                })?;
                self.codec.update(roadmap_id, &tree)?;
                Ok(format!("Updated roadmap {roadmap_id}"))
            }
            Commands::Delete { roadmap_id } => {
                self.codec.delete(roadmap_id)?;
                Ok(format!("Deleted roadmap {roadmap_id}"))
            }
            Commands::Enrich { roadmap_id, local } => {
                let tree = self.codec.load(roadmap_id)?;
                let before = tree.enriched_topic_count();
                let scheduler = self.scheduler()?;
                let tree = if *local {
                    scheduler.run_local(tree).await?
                } else {
                    scheduler.enrich(tree).await?
                };
                self.codec.update(roadmap_id, &tree)?;
                Ok(format!(
                    "Enriched {} topics; {} of {} now carry resources",
                    tree.enriched_topic_count() - before,
                    tree.enriched_topic_count(),
                    tree.topics().count()
                ))
            }
            Commands::Verify { roadmap_id } => {
                let violations = self.codec.verify(roadmap_id)?;
                Ok(format_violations(roadmap_id, &violations))
            }
            Commands::Progress { command } => self.handle_progress_command(command),
            Commands::Request {
                method,
                path,
                body,
                body_file,
            } => {
                let body = match (body, body_file) {
                    (Some(inline), _) => Some(parse_body(inline)?),
                    (None, Some(file)) => Some(parse_body(
                        &std::fs::read_to_string(file).map_err(StorageError::IoError)?,
                    )?),
                    (None, None) => None,
                };
                let request = ApiRequest {
                    method: method.parse()?,
                    path: path.clone(),
                    body,
                };
                let response = Router::new(self.codec.clone()).handle(&request);
                to_pretty_json(&response)
            }
        }
    }

    fn handle_progress_command(&self, command: &ProgressCommands) -> Result<String, ApiError> {
        let overlays = self.codec.overlays();
        match command {
            ProgressCommands::Show {
                user,
                roadmap_id,
                format,
            } => {
                let overlay = overlays.get(user, roadmap_id)?.ok_or_else(|| {
                    ApiError::NotFound(format!("progress for user {user} on roadmap {roadmap_id}"))
                })?;
                format_overlay(&overlay, *format)
            }
            ProgressCommands::Set {
                user,
                roadmap_id,
                status,
                lesson,
                phase,
                answers,
            } => {
                let patch = OverlayPatch {
                    status: status.as_deref().map(str::parse::<ProgressStatus>).transpose()?,
                    current_lesson: *lesson,
                    current_phase: *phase,
                    quiz_answers: if answers.is_empty() {
                        None
                    } else {
                        Some(parse_answers(answers)?)
                    },
                };
                let overlay = self.codec.upsert_progress(user, roadmap_id, &patch)?;
                format_overlay(&overlay, OutputFormat::Text)
            }
            ProgressCommands::Delete { user, roadmap_id } => {
                overlays.delete(user, roadmap_id)?;
                Ok(format!("Removed progress for {user} on {roadmap_id}"))
            }
            ProgressCommands::List { user, format } => {
                format_user_listing(user, &self.codec.list_for_user(user)?, *format)
            }
        }
    }

    fn scheduler(&self) -> Result<Arc<ContinuationScheduler>, ApiError> {
        let search = Arc::new(HttpResourceSearch::new(&self.config.search)?);
        let scheduler_config = self.config.scheduler.clone();
        match &scheduler_config.dispatch_url {
            Some(url) => {
                let dispatcher: Arc<dyn TaskDispatcher> =
                    Arc::new(HttpTaskDispatcher::new(url.clone(), DISPATCH_TIMEOUT)?);
                Ok(Arc::new(ContinuationScheduler::new(
                    search,
                    dispatcher,
                    scheduler_config,
                )))
            }
            None => {
                let dispatcher = Arc::new(InProcessDispatcher::new());
                let scheduler = Arc::new(ContinuationScheduler::new(
                    search,
                    dispatcher.clone(),
                    scheduler_config,
                ));
                dispatcher.register(scheduler.job_name(), &scheduler);
                Ok(scheduler)
            }
        }
    }

    fn pipeline(&self) -> Result<GenerationPipeline, ApiError> {
        let client = ProviderFactory::create_client(&self.config.provider)?;
        let generator = Arc::new(ProviderGenerator::new(
            client,
            CompletionOptions::from(&self.config.provider),
        ));
        Ok(GenerationPipeline::new(
            generator,
            self.scheduler()?,
            self.codec.clone(),
        ))
    }
}

fn parse_body(raw: &str) -> Result<Value, ApiError> {
    serde_json::from_str(raw).map_err(|e| ApiError::Validation(format!("body is not JSON: {e}")))
}

fn parse_answers(pairs: &[String]) -> Result<BTreeMap<String, String>, ApiError> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(id, answer)| (id.trim().to_string(), answer.to_string()))
                .ok_or_else(|| {
                    ApiError::Validation(format!("answer must look like INFOBIT_ID=ANSWER, got {pair:?}"))
                })
        })
        .collect()
}
