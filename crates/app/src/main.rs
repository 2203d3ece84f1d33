use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pdf_chat_core::config::{
    DEFAULT_CHAT_MODEL, DEFAULT_COHERE_BASE_URL, DEFAULT_EMBEDDING_MODEL, DEFAULT_GROQ_BASE_URL,
    DEFAULT_RERANK_MODEL, DEFAULT_TEMPERATURE,
};
use pdf_chat_core::{
    build_chunks, discover_pdf_files, extract_pdf_text, load_pdf_sources, Answer,
    ChunkingOptions, ConversationTurn, ExtractionWarning, LopdfExtractor, PdfSource,
    ProcessingReport, ProcessingStage, ProgressObserver, Retrieval, RetrievalOptions,
    ServiceConfig, Session,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Cohere API key used for embeddings and reranking
    #[arg(long, env = "COHERE_API_KEY", hide_env_values = true)]
    cohere_api_key: Option<String>,

    /// Groq API key used for extraction and answering
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    groq_api_key: Option<String>,

    /// Cohere API base URL
    #[arg(long, env = "COHERE_BASE_URL", default_value = DEFAULT_COHERE_BASE_URL)]
    cohere_url: String,

    /// Groq OpenAI-compatible base URL
    #[arg(long, env = "GROQ_BASE_URL", default_value = DEFAULT_GROQ_BASE_URL)]
    groq_url: String,

    /// Embedding model
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Rerank model
    #[arg(long, default_value = DEFAULT_RERANK_MODEL)]
    rerank_model: String,

    /// Chat model
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Sampling temperature for the chat model
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Per-request timeout in seconds; unbounded when omitted
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Maximum characters per chunk
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value = "200")]
    chunk_overlap: usize,

    /// Candidates pulled from the vector index
    #[arg(long, default_value = "20")]
    recall_k: usize,

    /// Candidates kept after reranking
    #[arg(long, default_value = "10")]
    rerank_top_n: usize,

    /// Rewrite follow-up questions into standalone ones before retrieval
    #[arg(long, default_value_t = false)]
    condense_follow_ups: bool,
}

#[derive(Args)]
struct DocumentArgs {
    /// Folder searched recursively for PDFs.
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Individual PDF file; repeatable.
    #[arg(long = "file")]
    files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Process PDFs, then answer questions read from stdin.
    Chat {
        #[command(flatten)]
        documents: DocumentArgs,
    },
    /// Process PDFs and answer the given questions in order.
    Ask {
        #[command(flatten)]
        documents: DocumentArgs,
        /// Question to ask; repeat for follow-ups.
        #[arg(long = "question", required = true)]
        questions: Vec<String>,
    },
    /// Process PDFs and show what each retrieval stage keeps for a query.
    Retrieve {
        #[command(flatten)]
        documents: DocumentArgs,
        #[arg(long)]
        query: String,
    },
    /// Extract and chunk PDFs without calling any hosted service.
    Chunks {
        #[command(flatten)]
        documents: DocumentArgs,
        /// Print every chunk's text.
        #[arg(long, default_value_t = false)]
        show_text: bool,
    },
}

impl Cli {
    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            cohere_base_url: self.cohere_url.clone(),
            groq_base_url: self.groq_url.clone(),
            embedding_model: self.embedding_model.clone(),
            rerank_model: self.rerank_model.clone(),
            chat_model: self.chat_model.clone(),
            temperature: self.temperature,
            request_timeout_secs: self.timeout_secs,
            ..ServiceConfig::default()
        }
        .with_cohere_api_key(self.cohere_api_key.clone())
        .with_groq_api_key(self.groq_api_key.clone())
    }

    fn chunking(&self) -> ChunkingOptions {
        ChunkingOptions {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }

    fn retrieval(&self) -> RetrievalOptions {
        RetrievalOptions {
            recall_k: self.recall_k,
            rerank_top_n: self.rerank_top_n,
            condense_follow_ups: self.condense_follow_ups,
        }
    }

    fn session(&self) -> Session<ServiceConfig> {
        Session::new(self.service_config())
            .with_chunking(self.chunking())
            .with_retrieval(self.retrieval())
    }
}

/// Stage lines on stderr so stdout only carries answers.
struct StderrStatus;

impl ProgressObserver for StderrStatus {
    fn stage(&self, stage: ProcessingStage) {
        let _ = writeln!(std::io::stderr().lock(), "{}", stage.label());
    }

    fn warning(&self, warning: &ExtractionWarning) {
        let _ = writeln!(std::io::stderr().lock(), "warning: {warning}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    match &cli.command {
        Command::Chat { documents } => {
            let mut session = cli.session();
            let sources = read_documents(documents)?;
            process(&mut session, &sources).await?;
            chat_loop(&mut session).await?;
        }
        Command::Ask {
            documents,
            questions,
        } => {
            let mut session = cli.session();
            let sources = read_documents(documents)?;
            process(&mut session, &sources).await?;

            for question in questions {
                match session.ask(question).await {
                    Ok(answer) => log_answer_details(&answer),
                    Err(error) => eprintln!("Error processing your question: {error}"),
                }
            }
            render_history(session.history());
        }
        Command::Retrieve { documents, query } => {
            let mut session = cli.session();
            let sources = read_documents(documents)?;
            process(&mut session, &sources).await?;

            let retrieval = session
                .retrieve(query)
                .await
                .map_err(|error| anyhow::anyhow!("{} stage: {error}", error.stage()))?;
            print_retrieval(&retrieval);
        }
        Command::Chunks {
            documents,
            show_text,
        } => {
            let sources = read_documents(documents)?;
            let extracted = extract_pdf_text(&sources, &LopdfExtractor);
            for warning in &extracted.warnings {
                StderrStatus.warning(warning);
            }

            let chunks = build_chunks(&extracted.text, cli.chunking())
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!(
                "files_read={} characters={} chunks={}",
                extracted.files_read,
                extracted.text.chars().count(),
                chunks.len()
            );
            for chunk in &chunks {
                println!(
                    "[{}] chars={} id={}",
                    chunk.chunk_index,
                    chunk.text.chars().count(),
                    &chunk.chunk_id[..12]
                );
                if *show_text {
                    println!("{}\n", chunk.text);
                }
            }
        }
    }

    Ok(())
}

fn read_documents(documents: &DocumentArgs) -> anyhow::Result<Vec<PdfSource>> {
    let mut paths = documents.files.clone();
    if let Some(folder) = &documents.folder {
        paths.extend(discover_pdf_files(folder));
    }

    if paths.is_empty() {
        anyhow::bail!("Upload at least one PDF (use --folder or --file)");
    }

    let loaded = load_pdf_sources(&paths);
    for unreadable in &loaded.unreadable {
        warn!(file = %unreadable.file_name, reason = %unreadable.reason, "unreadable file");
        StderrStatus.warning(unreadable);
    }
    if loaded.sources.is_empty() {
        anyhow::bail!("none of the {} selected files could be read", paths.len());
    }

    Ok(loaded.sources)
}

async fn process(
    session: &mut Session<ServiceConfig>,
    sources: &[PdfSource],
) -> anyhow::Result<ProcessingReport> {
    eprintln!("Processing documents...");
    let report = session
        .process_documents(sources, &StderrStatus)
        .await
        .map_err(|error| anyhow::anyhow!("Processing failed at {} stage: {error}", error.stage()))?;

    eprintln!(
        "Documents processed successfully! files={}/{} chunks={} vectors={}x{}",
        report.files_read,
        report.files_received,
        report.chunk_count,
        report.indexed_vectors,
        report.embedding_dimensions
    );
    Ok(report)
}

async fn chat_loop(session: &mut Session<ServiceConfig>) -> anyhow::Result<()> {
    eprintln!("Ask about your documents (/history to review, /quit to leave).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                render_history(session.history());
                continue;
            }
            _ => {}
        }

        match session.ask(question).await {
            Ok(answer) => {
                if let Some(turn) = answer.history.last() {
                    render_turn(turn);
                }
            }
            Err(error) => eprintln!("Error processing your question: {error}"),
        }
    }

    Ok(())
}

fn render_turn(turn: &ConversationTurn) {
    println!("user: {}", turn.question);
    println!("assistant: {}\n", turn.answer);
}

fn render_history(turns: &[ConversationTurn]) {
    for turn in turns {
        render_turn(turn);
    }
}

fn log_answer_details(answer: &Answer) {
    if let Some(standalone) = &answer.standalone_question {
        info!(standalone = %standalone, "retrieved with condensed question");
    }
    info!(
        recalled = answer.retrieval.counts.recalled,
        reranked = answer.retrieval.counts.reranked,
        compressed = answer.retrieval.counts.compressed,
        "answered"
    );
}

fn print_retrieval(retrieval: &Retrieval) {
    println!("query: {}", retrieval.query);
    println!(
        "stages: recalled={} reranked={} compressed={}",
        retrieval.counts.recalled, retrieval.counts.reranked, retrieval.counts.compressed
    );
    for passage in &retrieval.passages {
        println!(
            "[chunk {}] score={:.4} stage={:?}",
            passage.chunk.chunk_index, passage.score, passage.stage
        );
        println!("  {}", passage.text().replace('\n', "\n  "));
    }
}
