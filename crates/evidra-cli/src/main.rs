//! Evidra CLI - command-line interface for the literature pipeline.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use evidra_agents::{unix_now, PipelineConfig, Scheduler};
use evidra_cli::{AppConfig, Cli, Command, SearchArgs};
use evidra_domain::traits::{ClaimFilter, ClaimStore, LanguageModel};
use evidra_domain::{Category, ClaimStatus};
use evidra_llm::OpenAiModel;
use evidra_search::{RetrievalEngine, SearchMode, SearchOptions};
use evidra_sources::{CrossRefSource, LiteratureSource, PubMedSource, RssSource};
use evidra_store::SqliteStore;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cli.command, config).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    match command {
        Command::Run => {
            let scheduler = build_scheduler(&config)?;
            scheduler.run().await?;
        }
        Command::RunOnce { agent } => {
            let mut scheduler = build_scheduler(&config)?;
            let results = scheduler.run_once(agent.as_deref()).await?;
            for (name, summary) in results {
                println!(
                    "{name:<12} processed={} succeeded={} failed={} skipped={}",
                    summary.processed, summary.succeeded, summary.failed, summary.skipped
                );
            }
        }
        Command::Status => {
            let store = open_store(&config)?;
            print_status(&store, &config)?;
        }
        Command::Search(args) => {
            let store = open_store(&config)?;
            search(&store, &config, args)?;
        }
        Command::RecoverEmbeddings => {
            let mut store = open_store(&config)?;
            let now = unix_now();
            let stale = store.reset_stale_embeddings(now, now)?;
            let retried = store.retry_failed_embeddings(now)?;
            println!("Requeued {retried} failed and {stale} orphaned embeddings");
        }
    }
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    SqliteStore::new(&config.database_path)
        .with_context(|| format!("failed to open database at {}", config.database_path))
}

fn build_model(config: &AppConfig) -> Result<OpenAiModel> {
    let api_key = config
        .openai
        .resolved_api_key()
        .ok_or_else(|| anyhow!("no OpenAI API key configured (set OPENAI_API_KEY)"))?;
    Ok(OpenAiModel::new(api_key)?
        .with_chat_model(&config.openai.chat_model)
        .with_embedding_model(
            &config.openai.embedding_model,
            config.openai.embedding_dimension,
        ))
}

fn build_sources(config: &AppConfig) -> Result<Vec<Box<dyn LiteratureSource + Send>>> {
    let mut sources: Vec<Box<dyn LiteratureSource + Send>> = Vec::new();

    if config.sources.pubmed {
        let mut source = PubMedSource::new()?;
        if let Some(query) = &config.sources.pubmed_query {
            source = source.with_query(query);
        }
        sources.push(Box::new(source));
    }
    if config.sources.crossref {
        let mut source = CrossRefSource::new()?;
        if let Some(mailto) = &config.sources.crossref_mailto {
            source = source.with_mailto(mailto);
        }
        sources.push(Box::new(source));
    }
    for feed in &config.sources.rss_feeds {
        sources.push(Box::new(RssSource::new(&feed.name, &feed.url)?));
    }

    if sources.is_empty() {
        return Err(anyhow!("no literature sources enabled"));
    }
    Ok(sources)
}

fn build_scheduler(config: &AppConfig) -> Result<Scheduler<SqliteStore, OpenAiModel>> {
    let store = Arc::new(Mutex::new(open_store(config)?));
    let model = Arc::new(build_model(config)?);
    let sources = build_sources(config)?;
    Ok(Scheduler::new(
        store,
        model,
        sources,
        config.pipeline.clone(),
    ))
}

fn print_status(store: &SqliteStore, config: &AppConfig) -> Result<()> {
    let queue = store.queue_counts()?;
    println!("Research queue:");
    println!(
        "  pending={} processing={} completed={} failed={} rejected={}",
        queue.pending, queue.processing, queue.completed, queue.failed, queue.rejected
    );

    let embeddings = store.embedding_counts()?;
    println!("Embeddings:");
    println!(
        "  pending={} processing={} completed={} failed={}",
        embeddings.pending, embeddings.processing, embeddings.completed, embeddings.failed
    );

    println!("Evidence hierarchies:");
    for category in Category::ALL {
        match store.get_hierarchy(category)? {
            Some(h) => println!(
                "  {:<18} claims={} avg_strength={:.2} conflicting={} consensus={:?}",
                category.as_str(),
                h.claim_count,
                h.avg_strength,
                h.conflicting_count,
                h.consensus
            ),
            None => println!("  {:<18} (not computed)", category.as_str()),
        }
    }

    let runs = store.agent_runs()?;
    let now = unix_now();
    println!("Agents:");
    for name in ["research", "extraction", "validation", "knowledge", "conflict"] {
        let interval = agent_interval(&config.pipeline, name);
        match runs.iter().find(|r| r.agent == name) {
            Some(run) => {
                let ago = now.saturating_sub(run.last_run);
                let due = (run.last_run + interval).saturating_sub(now);
                match &run.last_error {
                    Some(err) => println!(
                        "  {name:<12} last run {ago}s ago, next due in {due}s, last error: {err}"
                    ),
                    None => println!(
                        "  {name:<12} last run {ago}s ago, next due in {due}s, \
                         processed={} succeeded={} failed={} skipped={}",
                        run.processed, run.succeeded, run.failed, run.skipped
                    ),
                }
            }
            None => println!("  {name:<12} never run, interval {interval}s"),
        }
    }
    Ok(())
}

fn agent_interval(pipeline: &PipelineConfig, name: &str) -> u64 {
    match name {
        "research" => pipeline.research.interval_secs,
        "extraction" => pipeline.extraction.interval_secs,
        "validation" => pipeline.validation.interval_secs,
        "knowledge" => pipeline.knowledge.interval_secs,
        _ => pipeline.conflict.interval_secs,
    }
}

fn search(store: &SqliteStore, config: &AppConfig, args: SearchArgs) -> Result<()> {
    let claims = store.query_claims(&ClaimFilter {
        status: Some(ClaimStatus::Active),
        embedded_only: true,
        ..Default::default()
    })?;
    if claims.is_empty() {
        println!("Knowledge base is empty; run the pipeline first");
        return Ok(());
    }

    let engine = RetrievalEngine::build(config.openai.embedding_dimension, claims)?;

    let mode = SearchMode::from(args.mode);
    let options = SearchOptions {
        mode,
        category: args.category.map(Into::into),
        min_evidence: args.min_evidence.map(Into::into),
        min_similarity: args.min_similarity,
        limit: args.limit,
    };

    // Text mode needs no model, so it works without an API key
    let hits = if mode == SearchMode::Text {
        engine.search_text(&args.query, &options)
    } else {
        let model = build_model(config)?;
        let query_embedding = model.embed(&args.query)?;
        engine.search(&args.query, &query_embedding, &options)?
    };

    if hits.is_empty() {
        println!("No matching claims");
        return Ok(());
    }
    for hit in hits {
        let conflict_marker = if hit.claim.conflicting { " [conflicting]" } else { "" };
        println!(
            "{:.3}  [{}] [{:?}]{} {}",
            hit.score,
            hit.claim.category.as_str(),
            hit.claim.evidence_level,
            conflict_marker,
            hit.claim.text
        );
    }
    Ok(())
}
