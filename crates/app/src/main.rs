use chrono::Utc;
use clap::{Parser, Subcommand};
use corpus_assistant_core::{
    discover_corpus_files, system_stats, ChatOptions, ChatOrchestrator, HttpKnowledgeEngine,
    HttpObjectStore, Identity, IngestCoordinator, IngestOptions, OpenAiCompletionClient, Role,
    SqliteStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "corpus-assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Knowledge engine base URL
    #[arg(long, env = "ENGINE_URL", default_value = "http://localhost:8100")]
    engine_url: String,

    /// OpenAI-compatible completions base URL (query rewriting)
    #[arg(
        long,
        env = "COMPLETIONS_URL",
        default_value = "https://api.openai.com/v1"
    )]
    completions_url: String,

    /// API key for the completions endpoint
    #[arg(long, env = "COMPLETIONS_API_KEY", default_value = "")]
    completions_api_key: String,

    /// Model used for query rewriting
    #[arg(long, env = "COMPLETIONS_MODEL", default_value = "gpt-4o-mini")]
    completions_model: String,

    /// Object store base URL for uploaded blobs
    #[arg(
        long,
        env = "OBJECT_STORE_URL",
        default_value = "http://localhost:9000/corpus"
    )]
    object_store_url: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "corpus-assistant.db")]
    database_path: PathBuf,

    /// Upper bound in seconds for one knowledge-engine call
    #[arg(long, default_value = "120")]
    engine_timeout_secs: u64,

    /// Authenticated user id, as issued by the auth layer
    #[arg(long, env = "ASSISTANT_USER_ID")]
    user_id: Uuid,

    /// Authenticated role: admin, staff or member
    #[arg(long, env = "ASSISTANT_ROLE", default_value = "member")]
    role: String,
}

#[derive(Subcommand)]
enum Command {
    /// Send a chat message, creating a conversation when no id is given.
    Chat {
        /// The message to send
        #[arg(long)]
        message: String,
        /// Continue an existing conversation
        #[arg(long)]
        conversation_id: Option<Uuid>,
    },
    /// List the caller's conversations, newest first.
    Conversations,
    /// Print every turn of one conversation, oldest first.
    History {
        #[arg(long)]
        conversation_id: Uuid,
    },
    /// Upload a document, or a folder of documents, into blob storage.
    Upload {
        /// A single PDF or DOC/DOCX file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Recursively upload every supported file under a folder
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// List uploaded documents, newest first.
    Documents,
    /// Normalize an uploaded document and add it to the knowledge engine.
    Process {
        #[arg(long)]
        document_id: Uuid,
    },
    /// Delete a document record and its stored blob.
    DeleteDocument {
        #[arg(long)]
        document_id: Uuid,
    },
    /// Corpus-wide counters.
    Stats,
}

fn content_type_for(filename: &str) -> &'static str {
    match Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("doc") => "application/msword",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let identity = Identity {
        user_id: cli.user_id,
        role: Role::from_name(&cli.role),
    };

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "corpus-assistant boot"
    );

    let engine = Arc::new(HttpKnowledgeEngine::new(&cli.engine_url));
    let engine_timeout = Duration::from_secs(cli.engine_timeout_secs);

    match cli.command {
        Command::Chat {
            message,
            conversation_id,
        } => {
            let store = SqliteStore::open(&cli.database_path)
                .map_err(|store_error| anyhow::anyhow!(store_error.to_string()))?;
            let model = OpenAiCompletionClient::new(
                &cli.completions_url,
                &cli.completions_api_key,
                &cli.completions_model,
            );
            let chat = ChatOrchestrator::with_options(
                store,
                engine,
                model,
                ChatOptions {
                    engine_timeout,
                    ..ChatOptions::default()
                },
            );

            match chat.handle_turn(&identity, &message, conversation_id).await {
                Ok(outcome) => {
                    println!("conversation: {}", outcome.conversation_id);
                    println!("{}", outcome.answer);
                }
                Err(turn_error) => {
                    error!(%turn_error, "chat turn failed");
                    println!("{}", turn_error.user_message());
                }
            }
        }
        Command::Conversations => {
            let store = SqliteStore::open(&cli.database_path)
                .map_err(|store_error| anyhow::anyhow!(store_error.to_string()))?;
            let model = OpenAiCompletionClient::new(
                &cli.completions_url,
                &cli.completions_api_key,
                &cli.completions_model,
            );
            let chat = ChatOrchestrator::new(store, engine, model);

            for summary in chat
                .conversations(&identity)
                .await
                .map_err(|list_error| anyhow::anyhow!(list_error.to_string()))?
            {
                println!(
                    "[{}] {} {} ({} messages)",
                    summary.created_at.to_rfc3339(),
                    summary.id,
                    summary.title,
                    summary.message_count
                );
            }
        }
        Command::History { conversation_id } => {
            let store = SqliteStore::open(&cli.database_path)
                .map_err(|store_error| anyhow::anyhow!(store_error.to_string()))?;
            let model = OpenAiCompletionClient::new(
                &cli.completions_url,
                &cli.completions_api_key,
                &cli.completions_model,
            );
            let chat = ChatOrchestrator::new(store, engine, model);

            for turn in chat
                .history(&identity, conversation_id)
                .await
                .map_err(|history_error| anyhow::anyhow!(history_error.to_string()))?
            {
                println!("[{}] user: {}", turn.timestamp.to_rfc3339(), turn.user_message);
                println!("  assistant: {}", turn.ai_response);
            }
        }
        Command::Upload { file, folder } => {
            let documents = SqliteStore::open(&cli.database_path)
                .map_err(|store_error| anyhow::anyhow!(store_error.to_string()))?;
            let blobs = HttpObjectStore::new(&cli.object_store_url);
            let ingestor = IngestCoordinator::new(documents, blobs, engine);

            let paths = match (file, folder) {
                (Some(file), None) => vec![file],
                (None, Some(folder)) => {
                    let discovered = discover_corpus_files(&folder);
                    if discovered.is_empty() {
                        anyhow::bail!("no supported files found in {}", folder.display());
                    }
                    discovered
                }
                _ => anyhow::bail!("pass exactly one of --file or --folder"),
            };

            for path in paths {
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| anyhow::anyhow!("path missing filename: {}", path.display()))?
                    .to_string();
                let content = std::fs::read(&path)?;

                let document = ingestor
                    .upload(&identity, &filename, &content, content_type_for(&filename))
                    .await
                    .map_err(|upload_error| anyhow::anyhow!(upload_error.to_string()))?;
                println!("{} uploaded as document {}", filename, document.id);
            }
        }
        Command::Documents => {
            let documents = SqliteStore::open(&cli.database_path)
                .map_err(|store_error| anyhow::anyhow!(store_error.to_string()))?;
            let blobs = HttpObjectStore::new(&cli.object_store_url);
            let ingestor = IngestCoordinator::new(documents, blobs, engine);

            for document in ingestor
                .documents(&identity)
                .await
                .map_err(|list_error| anyhow::anyhow!(list_error.to_string()))?
            {
                println!(
                    "[{}] {} {} {} bytes uploaded {}",
                    if document.processed {
                        "processed"
                    } else {
                        "uploaded"
                    },
                    document.id,
                    document.filename,
                    document.file_size,
                    document.uploaded_at.to_rfc3339()
                );
            }
        }
        Command::Process { document_id } => {
            let documents = SqliteStore::open(&cli.database_path)
                .map_err(|store_error| anyhow::anyhow!(store_error.to_string()))?;
            let blobs = HttpObjectStore::new(&cli.object_store_url);
            let ingestor = IngestCoordinator::with_options(
                documents,
                blobs,
                engine,
                IngestOptions {
                    insert_timeout: engine_timeout,
                },
            );

            ingestor
                .ingest(&identity, document_id)
                .await
                .map_err(|ingest_error| anyhow::anyhow!(ingest_error.to_string()))?;
            println!("document {document_id} processed");
        }
        Command::DeleteDocument { document_id } => {
            let documents = SqliteStore::open(&cli.database_path)
                .map_err(|store_error| anyhow::anyhow!(store_error.to_string()))?;
            let blobs = HttpObjectStore::new(&cli.object_store_url);
            let ingestor = IngestCoordinator::new(documents, blobs, engine);

            ingestor
                .delete(&identity, document_id)
                .await
                .map_err(|delete_error| anyhow::anyhow!(delete_error.to_string()))?;
            println!("document {document_id} deleted");
        }
        Command::Stats => {
            let store = SqliteStore::open(&cli.database_path)
                .map_err(|store_error| anyhow::anyhow!(store_error.to_string()))?;

            let stats = system_stats(&identity, &store, &store)
                .await
                .map_err(|stats_error| anyhow::anyhow!(stats_error.to_string()))?;
            println!("conversations: {}", stats.conversations);
            println!("turns: {}", stats.turns);
            println!("documents: {}", stats.documents);
            println!("processed documents: {}", stats.processed_documents);
        }
    }

    Ok(())
}
