use clap::Parser;
use docs_agent::{AppConfig, DocumentService, DocumentType, Order, ResolverStrategy};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EXIT_WORDS: &[&str] = &["выход", "quit", "exit"];
const YES_WORDS: &[&str] = &["да", "yes", "y"];

type Input = Lines<BufReader<Stdin>>;

#[derive(Debug, Parser)]
#[command(name = "docs-agent", version, about = "Generate invoices, acts and organization cards as PDF")]
struct Cli {
    /// Organization type key in the profile store
    #[arg(long, default_value = "ip")]
    org_type: String,

    /// Organization slug in the profile store
    #[arg(long, default_value = "ip_angarhaeva")]
    slug: String,

    /// Order file with customer and jobs, needed for invoices and acts
    #[arg(long)]
    request: Option<PathBuf>,

    /// Override DOCS_RESOLVER (keyword | llm)
    #[arg(long)]
    resolver: Option<ResolverStrategy>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// First request, e.g. "нужен акт"
    input: Option<String>,
}

fn init_logger(verbose: bool) {
    let default = if verbose {
        "docs_agent=debug,info"
    } else {
        "docs_agent=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = AppConfig::from_env()?;
    if let Some(resolver) = cli.resolver {
        config = config.with_resolver(resolver)?;
    }

    info!(resolver = %config.resolver, "Document generator starting");

    let service = DocumentService::from_config(&config)?;
    let order = match &cli.request {
        Some(path) => Some(load_order(path)?),
        None => None,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = cli.input.clone();

    println!("Генератор PDF документов");

    loop {
        let Some(document_type) = choose_document(
            &service,
            &mut lines,
            pending.take(),
            config.max_prompt_attempts,
        )
        .await?
        else {
            break;
        };

        println!("Тип документа: {}", document_type);

        match service
            .generate(document_type, order.as_ref(), &cli.org_type, &cli.slug)
            .await
        {
            Ok(document) => println!("{}", document),
            Err(e) => {
                warn!(error = %e, "Document generation failed");
                eprintln!("Не удалось сформировать документ: {}", e);
            }
        }

        let answer = ask(&mut lines, "Хотите создать ещё один документ? (да/нет): ").await?;
        if !answer.as_deref().map(is_yes).unwrap_or(false) {
            break;
        }
    }

    println!("До свидания!");
    Ok(())
}

/// Ask until the text resolves to a document type.
///
/// `None` when the user quits, stdin closes or the attempts run out.
async fn choose_document<R>(
    service: &DocumentService<R>,
    lines: &mut Input,
    mut pending: Option<String>,
    max_attempts: u32,
) -> std::io::Result<Option<DocumentType>>
where
    R: docs_agent::renderer::ProcessRunner,
{
    let mut attempts = 0;

    while attempts < max_attempts {
        let text = match pending.take() {
            Some(text) => text,
            None => match ask(lines, "Какой документ хотите сформировать? ").await? {
                Some(text) => text,
                None => return Ok(None),
            },
        };

        if is_exit(&text) {
            return Ok(None);
        }

        if let Some(document_type) = service.resolve_document_type(&text).await {
            return Ok(Some(document_type));
        }

        attempts += 1;
        println!(
            "Не удалось определить тип документа. Доступные типы: {}",
            available_types()
        );
    }

    println!("Превышено число попыток, завершаю работу.");
    Ok(None)
}

async fn ask(lines: &mut Input, prompt: &str) -> std::io::Result<Option<String>> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}

fn load_order(path: &Path) -> Result<Order, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read order file {}: {}", path.display(), e))?;
    let order: Order = serde_json::from_str(&text)
        .map_err(|e| format!("order file {} is invalid: {}", path.display(), e))?;
    Ok(order)
}

fn available_types() -> String {
    DocumentType::ALL
        .iter()
        .map(|doc_type| doc_type.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_exit(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    EXIT_WORDS.contains(&text.as_str())
}

fn is_yes(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    YES_WORDS.contains(&text.as_str())
}
