//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use evidra_domain::{Category, EvidenceLevel};
use evidra_search::SearchMode;

/// Evidra - automated research pipeline for exercise science literature.
#[derive(Debug, Parser)]
#[command(name = "evidra")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "EVIDRA_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline until interrupted
    Run,

    /// Run each agent exactly once, in pipeline order
    RunOnce {
        /// Restrict the pass to one agent
        /// (research, extraction, validation, knowledge, conflict)
        agent: Option<String>,
    },

    /// Show queue, embedding, and hierarchy status
    Status,

    /// Search the knowledge base
    Search(SearchArgs),

    /// Requeue failed and orphaned embeddings
    RecoverEmbeddings,
}

/// Arguments for the search command.
#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Search query text
    pub query: String,

    /// Restrict results to one category
    #[arg(short = 'C', long, value_enum)]
    pub category: Option<CategoryArg>,

    /// Minimum evidence level
    #[arg(short, long, value_enum)]
    pub min_evidence: Option<EvidenceArg>,

    /// How results are scored
    #[arg(long, value_enum, default_value = "hybrid")]
    pub mode: SearchModeArg,

    /// Semantic-mode cutoff; hits below it are dropped
    #[arg(long, default_value = "0.7")]
    pub min_similarity: f64,

    /// Maximum number of results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
}

/// Search mode argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SearchModeArg {
    /// Blend semantic and text similarity
    Hybrid,
    /// Cosine similarity only
    Semantic,
    /// Trigram text similarity only, no model call
    Text,
}

/// Category argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CategoryArg {
    /// Strength training
    StrengthTraining,
    /// Muscle hypertrophy
    Hypertrophy,
    /// Nutrition and supplementation
    Nutrition,
    /// Recovery and sleep
    Recovery,
    /// Cardiovascular training
    Cardio,
    /// Everything else
    General,
}

/// Evidence level argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum EvidenceArg {
    /// Expert opinion
    ExpertOpinion,
    /// Case report
    CaseReport,
    /// Observational study
    Observational,
    /// Randomized trial
    RandomizedTrial,
    /// Meta-analysis
    MetaAnalysis,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::StrengthTraining => Category::StrengthTraining,
            CategoryArg::Hypertrophy => Category::Hypertrophy,
            CategoryArg::Nutrition => Category::Nutrition,
            CategoryArg::Recovery => Category::Recovery,
            CategoryArg::Cardio => Category::Cardio,
            CategoryArg::General => Category::General,
        }
    }
}

impl From<SearchModeArg> for SearchMode {
    fn from(arg: SearchModeArg) -> Self {
        match arg {
            SearchModeArg::Hybrid => SearchMode::Hybrid,
            SearchModeArg::Semantic => SearchMode::Semantic,
            SearchModeArg::Text => SearchMode::Text,
        }
    }
}

impl From<EvidenceArg> for EvidenceLevel {
    fn from(arg: EvidenceArg) -> Self {
        match arg {
            EvidenceArg::ExpertOpinion => EvidenceLevel::ExpertOpinion,
            EvidenceArg::CaseReport => EvidenceLevel::CaseReport,
            EvidenceArg::Observational => EvidenceLevel::Observational,
            EvidenceArg::RandomizedTrial => EvidenceLevel::RandomizedTrial,
            EvidenceArg::MetaAnalysis => EvidenceLevel::MetaAnalysis,
        }
    }
}
