//! # Custom AI CLI (`cai`)
//!
//! The `cai` binary drives a [`Session`]: store documents, build the index,
//! and ask questions against it.
//!
//! ## Usage
//!
//! ```bash
//! cai --config ./config/cai.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cai ingest <file>` | Store a file in the document directory |
//! | `cai index` | Build the index, or reload a persisted one |
//! | `cai retrieve "<query>"` | Show the most similar chunks |
//! | `cai ask "<query>"` | Title prompt, encyclopedia lookup, research answer |
//! | `cai question "<text>"` | Answer a single follow-up question |
//! | `cai chat` | Interactive session |
//! | `cai completions <shell>` | Print shell completions |
//!
//! The API key comes from `--api-key` or `OPENAI_API_KEY`; in `chat` it can
//! also be set with `/key`.

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use custom_ai::config::{self, Config};
use custom_ai::logging;
use custom_ai::session::{Notice, Session};

/// Custom AI: ask questions about your own documents.
///
/// Settings are read from a TOML file; every section is optional. See
/// `config/cai.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cai",
    about = "Custom AI: upload documents, index them, and ask questions grounded in them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/cai.toml`. Built-in defaults are used when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/cai.toml")]
    config: PathBuf,

    /// Provider API key.
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file in the document directory.
    ///
    /// PDFs also get a `.txt` file with their extracted text.
    Ingest {
        /// File to upload.
        file: PathBuf,
    },

    /// Build the index from the document directory.
    ///
    /// Reloads the persisted index instead when persistence is enabled and
    /// the persist directory is populated.
    Index,

    /// Show the chunks most similar to a query.
    Retrieve {
        query: String,

        /// Number of chunks to return.
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Answer a query with the title and research prompts.
    Ask { query: String },

    /// Answer one additional question with no prior history.
    Question { text: String },

    /// Start an interactive session.
    ///
    /// Lines are queries. `/key <key>`, `/upload <path>`, `/more <text>` and
    /// `/index` run the matching action; `quit`, `q` or `exit` leaves.
    Chat,

    /// Print a shell completion script.
    Completions { shell: Shell },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "cai", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        debug!(path = %cli.config.display(), "config file not found; using defaults");
        Config::default()
    };

    let mut session = Session::new(cfg);
    if let Some(key) = cli.api_key.as_deref() {
        let notice = session.set_api_key(key);
        if !matches!(notice, Notice::Success(_)) {
            print_notices(&[notice]);
        }
    }

    let notices = match cli.command {
        Commands::Ingest { file } => session.upload_path(&file),
        Commands::Index => session.rebuild_index().await,
        Commands::Retrieve { query, k } => {
            let k = k.unwrap_or(session.config().retrieval.k);
            let hits = session.retrieve(&query, k).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} (chunk {})",
                    i + 1,
                    hit.score,
                    hit.chunk.document_id,
                    hit.chunk.chunk_index
                );
                println!("    {}", snippet(&hit.chunk.text, 200));
            }
            Vec::new()
        }
        Commands::Ask { query } => session.ask(&query).await.notices,
        Commands::Question { text } => session.additional_question(&text).await.notices,
        Commands::Chat => {
            run_chat(&mut session).await?;
            Vec::new()
        }
        Commands::Completions { .. } => Vec::new(),
    };

    print_notices(&notices);
    if notices.iter().any(Notice::is_error) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn run_chat(session: &mut Session) -> anyhow::Result<()> {
    if !session.has_api_key() {
        println!("Enter your API key with /key <key>.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        let notices = match line.split_once(' ') {
            _ if matches!(line, "quit" | "q" | "exit") => break,
            _ if line.is_empty() => continue,
            Some(("/key", key)) => vec![session.set_api_key(key)],
            Some(("/upload", path)) => session.upload_path(std::path::Path::new(path.trim())),
            Some(("/more", text)) => session.additional_question(text).await.notices,
            None if line == "/index" => session.rebuild_index().await,
            _ if line.starts_with('/') => {
                vec![Notice::Warning(format!("unknown command: {}", line))]
            }
            _ => session.ask(line).await.notices,
        };
        print_notices(&notices);
    }
    Ok(())
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::Answer(_) | Notice::Success(_) => println!("{}", notice),
            Notice::Warning(_) | Notice::Error(_) => eprintln!("{}", notice),
        }
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}
