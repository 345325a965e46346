//! CLI parse: clap types for skillsprint. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Skillsprint CLI - personalised learning roadmaps
#[derive(Parser, Debug)]
#[command(name = "skillsprint")]
#[command(about = "Generate, store and track progress on personalised learning roadmaps")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate, enrich and store a new roadmap
    Generate {
        /// Skill to learn
        #[arg(long)]
        skill: String,
        /// What the learner wants to achieve
        #[arg(long, default_value = "")]
        goal: String,
        #[arg(long, default_value = "beginner")]
        current_level: String,
        #[arg(long, default_value = "intermediate")]
        desired_level: String,
        /// Expected time to finish, e.g. "6 weeks"
        #[arg(long, default_value = "")]
        duration: String,
        /// Time available per day, e.g. "1 hour"
        #[arg(long, default_value = "")]
        daily_time: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show a stored roadmap, optionally as one user sees it
    Show {
        roadmap_id: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List stored roadmaps (or one user's roadmaps)
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Replace a roadmap's content from a JSON document
    Update {
        roadmap_id: String,
        /// Path to the roadmap JSON document
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a roadmap and every record beneath it
    Delete { roadmap_id: String },
    /// Search resources for every topic still lacking them
    Enrich {
        roadmap_id: String,
        /// Drive hops in a local loop instead of through the dispatcher
        #[arg(long)]
        local: bool,
    },
    /// Report count and numbering drift in a stored roadmap
    Verify { roadmap_id: String },
    /// Per-user progress
    Progress {
        #[command(subcommand)]
        command: ProgressCommands,
    },
    /// Route a single request through the HTTP-shaped API
    Request {
        /// GET, POST, DELETE or OPTIONS
        method: String,
        /// Request path, e.g. /roadmap/{roadmapId}
        path: String,
        /// Inline JSON body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,
        /// Read the JSON body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProgressCommands {
    /// Show a user's progress on a roadmap
    Show {
        user: String,
        roadmap_id: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Create or patch a user's progress
    Set {
        user: String,
        roadmap_id: String,
        /// not_started, ongoing or completed
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        lesson: Option<u32>,
        #[arg(long)]
        phase: Option<u32>,
        /// Quiz answer as INFOBIT_ID=ANSWER (repeatable)
        #[arg(long = "answer")]
        answers: Vec<String>,
    },
    /// Remove a user's progress (no error when absent)
    Delete { user: String, roadmap_id: String },
    /// List every roadmap a user has progress on
    List {
        user: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}
