use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use legalmind_api::auth::EnvTokenProvider;
use legalmind_api::client::AnalysisClient;
use legalmind_core::backend::{AnalysisBackend, TokenProvider};
use legalmind_core::cache::LocalHistoryCache;
use legalmind_core::config::Config;
use legalmind_core::history::{RemoteHistory, TieredHistory};
use legalmind_core::markdown::{render, Block, Span};
use legalmind_core::transcript::ChatSession;
use legalmind_core::types::{risk_tier, AnalysisEvent, ChatMessage, Role, TaskStatus};
use legalmind_core::upload::{IncomingFile, Uploader};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "legalmind=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let auth: Arc<dyn TokenProvider> = Arc::new(EnvTokenProvider::from_config(&config));
    let client: Arc<dyn AnalysisBackend> =
        Arc::new(AnalysisClient::new(&config, Arc::clone(&auth))?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("upload") => {
            let path = args.get(1).context("usage: legalmind upload <file.pdf>")?;
            run_upload(&config, client, auth, path).await
        }
        Some("chat") => run_chat(&config, client, auth, args.get(1).cloned()).await,
        Some("documents") => run_documents(client).await,
        Some("stats") => run_stats(client).await,
        Some("health") => run_health(client).await,
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("LegalMind — contract analysis client");
    println!();
    println!("  legalmind upload <file.pdf>   analyze a contract, then chat about it");
    println!("  legalmind chat [document-id]  chat about a document, or generally");
    println!("  legalmind documents           list analyzed documents");
    println!("  legalmind stats               risk-tier breakdown of your documents");
    println!("  legalmind health              chatbot service health");
}

/// Upload a file, follow the analysis to completion, then hand off to the
/// chat view for the resulting document.
async fn run_upload(
    config: &Config,
    client: Arc<dyn AnalysisBackend>,
    auth: Arc<dyn TokenProvider>,
    path: &str,
) -> Result<()> {
    let file = IncomingFile::from_path(path).with_context(|| format!("open {path}"))?;
    let (uploader, mut rx) = Uploader::new(Arc::clone(&client), Arc::clone(&auth), config);

    uploader.enqueue(vec![file]).await;
    if let Some(task) = uploader.tasks().await.first() {
        if task.status == TaskStatus::Error {
            bail!("{}", task.error.clone().unwrap_or_else(|| "invalid file".into()));
        }
    }

    println!("Uploading {path} ...");
    Arc::clone(&uploader).submit().await?;

    let mut last_step = u8::MAX;
    let document_id = loop {
        match rx.recv().await {
            Ok(AnalysisEvent::Progress { stage, step, progress, .. }) => {
                // Only redraw when the visual step advances.
                if step != last_step {
                    last_step = step;
                    let label = if stage.is_empty() { "processing" } else { stage.as_str() };
                    println!("  [{}/4] {label} ({progress}%)", step.min(4));
                }
            }
            Ok(AnalysisEvent::Completed { document_id, .. }) => break document_id,
            Ok(AnalysisEvent::Failed { message, .. }) => {
                uploader.shutdown();
                bail!("analysis failed: {message}");
            }
            Err(e) => {
                uploader.shutdown();
                bail!("event stream closed: {e}");
            }
        }
    };
    uploader.shutdown();

    println!("Analysis complete — document {document_id}");
    println!();
    run_chat(config, client, auth, Some(document_id)).await
}

/// Interactive chat. With a document id the session is scoped to that
/// contract (report + summary + persisted history); without one it is the
/// general assistant.
async fn run_chat(
    config: &Config,
    client: Arc<dyn AnalysisBackend>,
    auth: Arc<dyn TokenProvider>,
    document_id: Option<String>,
) -> Result<()> {
    if let Some(id) = &document_id {
        let presence = client.document_exists(id).await?;
        if !presence.exists {
            bail!("document {id} is not available: {}", presence.message);
        }
    }

    let user_id = auth.user_id().unwrap_or_else(|| "anonymous".into());
    let history = Arc::new(TieredHistory::new(
        Arc::new(RemoteHistory::new(Arc::clone(&client))),
        Arc::new(LocalHistoryCache::new(&config.cache_dir)),
    ));
    let session = ChatSession::new(client, history, user_id, document_id, config);

    session
        .bootstrap()
        .await
        .map_err(|e| anyhow::anyhow!("could not load the conversation: {e}"))?;

    for message in session.transcript().await {
        print_message(&message);
    }
    let suggestions = session.suggestions().await;
    if !suggestions.is_empty() {
        println!("Suggested questions:");
        for (i, q) in suggestions.iter().enumerate() {
            println!("  {}. {q}", i + 1);
        }
    }
    println!();
    println!("Type a question, /clear to reset history, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_history().await;
                println!("History cleared.");
                continue;
            }
            text => match session.send_message(text).await {
                Ok(Some(reply)) => print_message(&reply),
                Ok(None) => {}
                Err(e) => println!("! {e}"),
            },
        }
    }

    session.close();
    Ok(())
}

async fn run_documents(client: Arc<dyn AnalysisBackend>) -> Result<()> {
    let docs = client.documents().await?;
    if docs.is_empty() {
        println!("No analyzed documents yet.");
        return Ok(());
    }
    for d in &docs {
        println!(
            "{}  risk {:>3} ({:<6})  {}",
            d.id,
            d.risk_score,
            risk_tier(d.risk_score),
            d.file_name
        );
    }
    Ok(())
}

async fn run_stats(client: Arc<dyn AnalysisBackend>) -> Result<()> {
    let docs = client.documents().await?;
    if docs.is_empty() {
        println!("No analyzed documents yet.");
        return Ok(());
    }
    let mut high = 0usize;
    let mut medium = 0usize;
    let mut low = 0usize;
    for d in &docs {
        match risk_tier(d.risk_score) {
            "high" => high += 1,
            "medium" => medium += 1,
            _ => low += 1,
        }
    }
    let avg = docs.iter().map(|d| d.risk_score).sum::<i64>() / docs.len() as i64;
    println!("Documents: {}", docs.len());
    println!("  high risk:   {high}");
    println!("  medium risk: {medium}");
    println!("  low risk:    {low}");
    println!("  average risk score: {avg}");
    Ok(())
}

async fn run_health(client: Arc<dyn AnalysisBackend>) -> Result<()> {
    match client.chatbot_health().await {
        Ok(h) => {
            println!("status: {}", h.status);
            if let Some(model) = h.model {
                println!("model:  {model}");
            }
            println!("ready:  {}", h.ready);
            if let Some(error) = h.error {
                println!("error:  {error}");
            }
        }
        Err(e) => {
            warn!("chatbot health check failed: {e}");
            println!("chatbot unreachable: {e}");
        }
    }
    Ok(())
}

// ── Terminal rendering ───────────────────────────────────────────────────

fn print_message(message: &ChatMessage) {
    match message.role {
        Role::User => println!("you: {}", message.content),
        Role::Assistant => {
            println!("assistant:");
            print_blocks(&render(&message.content));
        }
    }
    println!();
}

fn flatten(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|s| match s {
            Span::Text(t) | Span::Bold(t) | Span::Italic(t) => t.as_str(),
        })
        .collect()
}

fn print_blocks(blocks: &[Block]) {
    for block in blocks {
        match block {
            Block::Heading { level, spans } => {
                println!("{} {}", "#".repeat(*level as usize), flatten(spans));
            }
            Block::Paragraph(spans) => println!("{}", flatten(spans)),
            Block::Bullet(spans) => println!("  • {}", flatten(spans)),
            Block::Numbered { number, spans } => println!("  {number}. {}", flatten(spans)),
            Block::Code(code) => {
                for line in code.lines() {
                    println!("    {line}");
                }
            }
            Block::Rule => println!("{}", "─".repeat(40)),
            Block::Spacer => println!(),
        }
    }
}
