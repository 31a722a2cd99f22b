use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scr_ai::cache::{IndexBuildSettings, IndexCacheManager, LoadOutcome};
use scr_ai::chat::{ChatSession, ChatSettings, ComparisonReport, TurnReply, COMPARISON_PAIR};
use scr_ai::embeddings::openai_embed::OpenAiEmbedder;
use scr_ai::embeddings::Embedder;
use scr_ai::index::{IndexStore, StoredFiles};
use scr_ai::llm::openai_llm::OpenAiLlm;
use scr_ai::llm::Llm;
use scr_ai::openai::ApiClient;
use scr_ai::websearch::{DuckDuckGoSearch, WebSearch};
use scr_core::config::AssistantConfig;

#[derive(Parser, Debug)]
#[command(name = "scr-assistant", version, about = "Ask questions about the SCR 3040 documents")]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true, env = "SCR_ASSISTANT_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session. Commands: /clear, /rebuild, /quit
    Chat {
        #[arg(long)]
        model: Option<String>,
        /// Answer every question with gpt-4o and gpt-3.5-turbo side by side
        #[arg(long)]
        compare: bool,
    },
    /// Answer a single question and exit
    Ask {
        question: String,
        #[arg(long)]
        model: Option<String>,
    },
    /// Discard the persisted index and build it again
    Rebuild,
    /// Show configured sources and persisted index state
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cfg = AssistantConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Status => status(&cfg),
        Command::Rebuild => {
            let app = App::new(&cfg)?;
            app.cache.force_rebuild()?;
            report_outcome(&app.cache);
            Ok(())
        }
        Command::Ask { question, model } => {
            let app = App::new(&cfg)?;
            let model = model.unwrap_or_else(|| cfg.model.chat_model.clone());
            let mut session = app.session(&cfg);
            let reply = session.ask(&question, &model)?;
            print_reply(&reply);
            Ok(())
        }
        Command::Chat { model, compare } => {
            let app = App::new(&cfg)?;
            let model = model.unwrap_or_else(|| cfg.model.chat_model.clone());
            // Surface build failures before the first question.
            app.cache.load_or_build_index()?;
            report_outcome(&app.cache);
            chat_loop(&app, &cfg, &model, compare)
        }
    }
}

struct App {
    cache: Arc<IndexCacheManager>,
    llm: Arc<dyn Llm>,
    web: Option<Arc<dyn WebSearch>>,
}

impl App {
    fn new(cfg: &AssistantConfig) -> Result<Self> {
        let client = ApiClient::from_config(&cfg.model)?;
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(client.clone()));
        let llm: Arc<dyn Llm> = Arc::new(OpenAiLlm::new(client, &cfg.model));
        let web: Option<Arc<dyn WebSearch>> = if cfg.chat.web_search {
            Some(Arc::new(DuckDuckGoSearch::default()))
        } else {
            None
        };
        let cache = Arc::new(IndexCacheManager::new(
            IndexBuildSettings::from_config(cfg),
            embedder,
        ));
        Ok(Self { cache, llm, web })
    }

    fn session(&self, cfg: &AssistantConfig) -> ChatSession {
        let session = ChatSession::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.llm),
            ChatSettings::from_config(cfg),
        );
        match &self.web {
            Some(web) => session.with_web_search(Arc::clone(web)),
            None => session,
        }
    }
}

fn chat_loop(app: &App, cfg: &AssistantConfig, model: &str, compare: bool) -> Result<()> {
    let mut session = app.session(cfg);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    if compare {
        println!("Comparing {} vs {}", COMPARISON_PAIR[0], COMPARISON_PAIR[1]);
    } else {
        println!("Model: {model}");
    }
    println!("Type a question, or /clear, /rebuild, /quit.");

    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_history();
                println!("History cleared.");
            }
            "/rebuild" => {
                match app.cache.force_rebuild() {
                    Ok(_) => report_outcome(&app.cache),
                    Err(e) => eprintln!("Rebuild failed: {e}"),
                }
            }
            question if compare => match session.compare(question, &COMPARISON_PAIR) {
                Ok(report) => print_comparison(&report),
                Err(e) => eprintln!("{e}"),
            },
            question => match session.ask(question, model) {
                Ok(reply) => print_reply(&reply),
                Err(e) => eprintln!("{e}"),
            },
        }
    }
    info!(messages = session.messages().len(), "session ended");
    Ok(())
}

fn status(cfg: &AssistantConfig) -> Result<()> {
    let paths = cfg.source_paths();
    let show = |label: &str, p: &std::path::Path| {
        let state = if p.is_file() { "ok" } else { "missing" };
        println!("  {label:<18} {state:<8} {}", p.display());
    };
    println!("Sources:");
    show("pdf", &paths.pdf);
    show("table", &paths.table);
    match &paths.table_aux {
        Some(p) => show("table_aux", p),
        None => println!("  {:<18} (not configured)", "table_aux"),
    }
    show("structured_sample", &paths.structured_sample);

    let store = IndexStore::open(cfg.index_dir());
    println!("Index: {}", store.dir().display());
    match store.files() {
        StoredFiles::None => println!("  not built"),
        StoredFiles::Partial { present } => {
            println!("  partial state ({}); will be rebuilt", present.display())
        }
        StoredFiles::Both => match store.read() {
            Ok(index) => {
                let m = index.manifest();
                println!(
                    "  {} segments, model {}, {} dims, built {}",
                    m.segment_count, m.model, m.dims, m.built_at
                );
            }
            Err(e) => println!("  unreadable ({e}); will be rebuilt"),
        },
    }
    Ok(())
}

fn report_outcome(cache: &IndexCacheManager) {
    match cache.last_outcome() {
        Some(LoadOutcome::Hit) => println!("Index loaded from {}", cache.store().dir().display()),
        Some(LoadOutcome::Rebuilt {
            reason,
            persisted,
            warnings,
        }) => {
            println!("Index rebuilt ({reason:?}); saved: {persisted}");
            for w in warnings {
                println!("  warning: [{}] {}", w.code, w.message);
            }
        }
        None => {}
    }
}

fn print_reply(reply: &TurnReply) {
    println!("\n[{}]\n{}\n", reply.model, reply.answer);
    if !reply.sources.is_empty() {
        println!("Sources:");
        for s in &reply.sources {
            println!("  - {} (score {:.3})", s.segment.provenance(), s.score);
        }
    }
    if let Some(note) = &reply.web_note {
        println!("\nFrom the web:\n{note}");
    }
    println!();
}

fn print_comparison(report: &ComparisonReport) {
    for a in &report.answers {
        match &a.result {
            Ok(reply) => print_reply(reply),
            Err(e) => println!("\n[{}]\nError: {e}\n", a.model),
        }
    }
    let s = &report.summary;
    println!("Summary:");
    if let Some(avg) = s.average_answer_chars {
        println!("  average answer length: {avg} chars");
    }
    println!("  models answered: {}/{}", s.succeeded, report.answers.len());
    if let Some(m) = &s.most_detailed {
        println!("  most detailed: {m}");
    }
}
