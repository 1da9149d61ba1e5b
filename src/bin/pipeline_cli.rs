//! Pipeline CLI
//!
//! Runs the four-phase extraction pipeline over a directory of transcripts.
//!
//! Usage:
//!   pipeline_cli --corpus ./interviews --question "How do practitioners think about AI risk?" \
//!     --output ./run-output
//!
//!   # closed code mode with a user-supplied codebook
//!   pipeline_cli --corpus ./interviews --question "..." \
//!     --code-mode closed --code-seed ./codebook.txt
//!
//!   # persist into Neo4j
//!   NEO4J_PASSWORD=... pipeline_cli --corpus ./interviews --question "..." \
//!     --neo4j-uri bolt://localhost:7687 --neo4j-user neo4j

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use qualcode::config::PipelineConfig;
use qualcode::graph::{GraphStore, Neo4jConfig, Neo4jGraphStore};
use qualcode::llm::create_llm_client;
use qualcode::pipeline::ExtractionPipeline;
use qualcode::schema::DiscoveryMode;
use qualcode::source::{DocumentSource, TextDirSource};

/// Qualitative coding extraction pipeline
#[derive(Parser, Debug)]
#[command(name = "pipeline_cli")]
#[command(about = "Discover coding schemas from a corpus and apply them per document")]
struct Args {
    /// Directory of .txt transcripts (file stem = document id)
    #[arg(long, short = 'c')]
    corpus: PathBuf,

    /// The analytic question guiding discovery
    #[arg(long, short = 'q')]
    question: String,

    /// YAML config file; CLI flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Artifact output directory
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Max documents processed concurrently in Phase 4
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Discovery mode for codes: open, closed, mixed
    #[arg(long)]
    code_mode: Option<DiscoveryMode>,

    /// Free-text codebook for closed/mixed code mode
    #[arg(long)]
    code_seed: Option<PathBuf>,

    /// Discovery mode for speaker properties: open, closed, mixed
    #[arg(long)]
    speaker_mode: Option<DiscoveryMode>,

    /// Free-text speaker property definitions
    #[arg(long)]
    speaker_seed: Option<PathBuf>,

    /// Discovery mode for entities: open, closed, mixed
    #[arg(long)]
    entity_mode: Option<DiscoveryMode>,

    /// Free-text entity/relationship type definitions
    #[arg(long)]
    entity_seed: Option<PathBuf>,

    /// Run the three discovery phases concurrently
    #[arg(long)]
    discover_concurrently: bool,

    /// Neo4j bolt URI; graph persistence is skipped when unset
    #[arg(long, env = "NEO4J_URI")]
    neo4j_uri: Option<String>,

    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    neo4j_user: String,

    #[arg(long, env = "NEO4J_PASSWORD", default_value = "")]
    neo4j_password: String,
}

impl Args {
    fn into_config(self) -> Result<(PipelineConfig, PathBuf, String)> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_yaml_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(n) = self.max_concurrency {
            config.max_concurrency = n;
        }
        if let Some(mode) = self.code_mode {
            config.codes.mode = mode;
        }
        if self.code_seed.is_some() {
            config.codes.seed_file = self.code_seed;
        }
        if let Some(mode) = self.speaker_mode {
            config.speakers.mode = mode;
        }
        if self.speaker_seed.is_some() {
            config.speakers.seed_file = self.speaker_seed;
        }
        if let Some(mode) = self.entity_mode {
            config.entities.mode = mode;
        }
        if self.entity_seed.is_some() {
            config.entities.seed_file = self.entity_seed;
        }
        if self.discover_concurrently {
            config.discover_concurrently = true;
        }
        if self.output.is_some() {
            config.output_dir = self.output;
        }
        if let Some(uri) = self.neo4j_uri {
            config.neo4j = Some(Neo4jConfig {
                uri,
                user: self.neo4j_user,
                password: self.neo4j_password,
                database: "neo4j".to_string(),
                max_connections: 8,
            });
        }

        Ok((config, self.corpus, self.question))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let (config, corpus_dir, question) = args.into_config()?;

    let documents = TextDirSource::new(&corpus_dir)
        .load()
        .context("loading corpus")?;
    println!("Loaded {} document(s) from {}", documents.len(), corpus_dir.display());

    let client = create_llm_client()?;
    let mut pipeline = ExtractionPipeline::new(client, config.clone());
    if let Some(neo4j) = &config.neo4j {
        let store: Arc<dyn GraphStore> = Arc::new(Neo4jGraphStore::connect(neo4j).await?);
        pipeline = pipeline.with_graph_store(store);
    }

    let report = match pipeline.run(&documents, &question).await {
        Ok(report) => report,
        Err(err) => {
            eprintln!("FATAL: {}", err);
            std::process::exit(1);
        }
    };

    println!();
    println!("Run {} complete", report.run_id);
    println!("  codes discovered:      {}", report.schemas.taxonomy.len());
    println!(
        "  speaker properties:    {}",
        report.schemas.speaker_schema.len()
    );
    println!(
        "  entity types:          {}",
        report.schemas.entity_schema.entity_types.len()
    );
    println!("  documents processed:   {}", report.results.len());
    println!("  total quotes:          {}", report.aggregate.total_quotes);

    if !report.quarantined.is_empty() {
        println!();
        println!("Quarantined documents ({}):", report.quarantined.len());
        for q in &report.quarantined {
            println!("  - {}: {}", q.document_id, q.reason);
        }
    }
    let warning_count = report.warning_count();
    if warning_count > 0 {
        println!("Recovered warnings: {} (see artifacts for details)", warning_count);
    }
    if report.is_clean() {
        println!("No warnings; run is clean.");
    }

    Ok(())
}
