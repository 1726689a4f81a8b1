use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use legal_agent_team::agents::{Capabilities, LegalRole};
use legal_agent_team::config::{
    CredentialResolver, EnvSecrets, Profile, Settings, OPENAI_API_KEY, QDRANT_API_KEY, QDRANT_URL,
};
use legal_agent_team::orchestrator::{AnalysisType, SynthesisPolicy, TeamReport};
use legal_agent_team::{Session, UploadOutcome};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "legal-agent-team",
    about = "Ask a team of legal AI agents about a PDF, grounded in a Qdrant knowledge base"
)]
struct Cli {
    /// OpenAI API key; a key in the environment or .env takes precedence.
    #[arg(long)]
    openai_api_key: Option<String>,

    /// Qdrant API key; a key in the environment or .env takes precedence.
    #[arg(long)]
    qdrant_api_key: Option<String>,

    /// Qdrant URL, e.g. https://xyz.cloud.qdrant.io:6333.
    #[arg(long)]
    qdrant_url: Option<String>,

    /// PDF to ingest before answering; repeatable.
    #[arg(short, long)]
    document: Vec<PathBuf>,

    /// One-shot question; if omitted the CLI enters interactive mode.
    #[arg(short, long)]
    query: Option<String>,

    #[arg(long, value_enum, default_value_t = AnalysisType::Custom)]
    analysis: AnalysisType,

    /// Members to consult (comma separated); defaults to the analysis preset.
    #[arg(long, value_enum, value_delimiter = ',')]
    members: Vec<LegalRole>,

    #[arg(long, value_enum, default_value_t = SynthesisPolicy::Summarize)]
    synthesis: SynthesisPolicy,

    /// Use a local Ollama endpoint and a local Qdrant node.
    #[arg(long, default_value_t = false)]
    local: bool,

    /// Run the researcher without web search.
    #[arg(long, default_value_t = false)]
    no_web_search: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Exit,
    Status,
    Connect,
    Upload(PathBuf),
    Members(Option<Vec<LegalRole>>),
    Analysis(AnalysisType),
    Credential(&'static str, String),
    Ask(String),
    Empty,
    Message(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let profile = if cli.local {
        Profile::Local
    } else {
        Profile::Cloud
    };
    let mut settings = Settings::from_env(profile);
    if cli.no_web_search {
        settings.web_search_enabled = false;
    }

    let mut resolver =
        CredentialResolver::new(EnvSecrets).with_defaults(profile.default_secrets());
    for (name, value) in [
        (OPENAI_API_KEY, &cli.openai_api_key),
        (QDRANT_API_KEY, &cli.qdrant_api_key),
        (QDRANT_URL, &cli.qdrant_url),
    ] {
        if let Some(value) = value {
            resolver.set_interactive(name, value.clone());
        }
    }

    let capabilities = Capabilities::resolve(&settings);
    let mut session =
        Session::new(settings, resolver, capabilities).with_synthesis(cli.synthesis);
    if !cli.members.is_empty() {
        session.select_members(cli.members.clone());
    }

    if session.connect().await.is_some() {
        println!("Connected to Qdrant.");
    } else {
        println!("{}", session.status());
        println!("Add API keys to begin (flags, environment, or :key in interactive mode).");
    }

    for path in &cli.document {
        upload(&mut session, path).await?;
    }

    if cli.query.is_some() || (!cli.document.is_empty() && cli.analysis != AnalysisType::Custom) {
        let query = cli.query.unwrap_or_default();
        return run_single(&mut session, &query, cli.analysis).await;
    }

    run_repl(&mut session, cli.analysis).await
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

async fn upload(session: &mut Session, path: &Path) -> anyhow::Result<()> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        bail!("{} is not a PDF", path.display());
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Upload path has no file name")?;

    println!("Indexing {file_name}...");
    match session.ingest_upload(file_name, &bytes).await? {
        UploadOutcome::Indexed { chunks } => println!("Indexed {file_name} ({chunks} chunks)."),
        UploadOutcome::Skipped => println!("{file_name} was already ingested this session."),
    }
    Ok(())
}

async fn run_single(
    session: &mut Session,
    query: &str,
    analysis: AnalysisType,
) -> anyhow::Result<()> {
    let report = session.run_query(query, analysis).await.map_err(|err| {
        error!(error = %err, "Team run failed");
        err
    })?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &TeamReport) {
    println!("\n{}\n", report.answer.trim());
    for partial in &report.partials {
        let web = if partial.grounding.web_results {
            " + web search"
        } else {
            ""
        };
        println!(
            "(grounding: {} drew on {} passage(s){web})",
            partial.role, partial.grounding.passages
        );
    }
    for failure in &report.failures {
        println!("(note: {} did not answer: {})", failure.role, failure.error);
    }
}

async fn run_repl(session: &mut Session, default_analysis: AnalysisType) -> anyhow::Result<()> {
    println!("Legal Agent Team ready. Type :help for commands, 'exit' to quit.\n");
    let stdin = io::stdin();
    let mut analysis = default_analysis;

    loop {
        print!("You > ");
        io::stdout().flush()?;

        let mut buffer = String::new();
        if stdin.read_line(&mut buffer)? == 0 {
            break;
        }

        match parse_command(&buffer) {
            ReplCommand::Exit => {
                info!("User exited CLI");
                break;
            }
            ReplCommand::Empty => continue,
            ReplCommand::Status => println!("{}", session.status()),
            ReplCommand::Connect => {
                if session.connect().await.is_some() {
                    println!("Connected to Qdrant.");
                } else {
                    println!("{}", session.status());
                }
            }
            ReplCommand::Credential(name, value) => {
                session.set_credential(name, value);
                println!("{name} updated. Run :connect to use it.");
            }
            ReplCommand::Upload(path) => {
                if let Err(err) = upload(session, &path).await {
                    println!("Upload failed: {err:#}");
                }
            }
            ReplCommand::Members(Some(roles)) => {
                session.select_members(roles);
                println!("{}", session.status());
            }
            ReplCommand::Members(None) => {
                session.clear_member_selection();
                println!("Member selection cleared; presets decide.");
            }
            ReplCommand::Analysis(next) => {
                analysis = next;
                println!("Analysis type set to {next:?}.");
            }
            ReplCommand::Ask(query) => {
                if let Err(err) = run_single(session, &query, analysis).await {
                    println!("{err:#}");
                }
            }
            ReplCommand::Message(message) => println!("{message}"),
        }
    }

    Ok(())
}

const COMMANDS: &str = "Commands:
  :upload <path.pdf>                 ingest a document
  :members <role,...>|all|preset     choose team members
  :analysis <type>                   contract-review, legal-research, risk-assessment, compliance-check, custom
  :key openai|qdrant <value>         supply an API key
  :url <qdrant url>                  supply the Qdrant URL
  :connect                           connect to Qdrant
  :status                            show session state
  exit                               quit
Anything else is sent to the team as a question.";

fn help_text() -> String {
    let roles = LegalRole::ALL
        .iter()
        .filter_map(|role| {
            let value = role.to_possible_value()?;
            Some(format!(
                "  {:<12} {} ({})",
                value.get_name(),
                role.name(),
                role.description()
            ))
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{COMMANDS}\n\nTeam members:\n{roles}")
}

fn parse_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case(":quit") {
        return ReplCommand::Exit;
    }
    if !trimmed.starts_with(':') {
        return ReplCommand::Ask(trimmed.to_string());
    }

    let (command, rest) = trimmed
        .split_once(char::is_whitespace)
        .map(|(c, r)| (c, r.trim()))
        .unwrap_or((trimmed, ""));

    match command {
        ":help" => ReplCommand::Message(help_text()),
        ":status" => ReplCommand::Status,
        ":connect" => ReplCommand::Connect,
        ":upload" if !rest.is_empty() => ReplCommand::Upload(PathBuf::from(rest)),
        ":members" => parse_members(rest),
        ":analysis" => match AnalysisType::from_str(rest, true) {
            Ok(analysis) => ReplCommand::Analysis(analysis),
            Err(err) => ReplCommand::Message(err),
        },
        ":url" if !rest.is_empty() => ReplCommand::Credential(QDRANT_URL, rest.to_string()),
        ":key" => match rest.split_once(char::is_whitespace) {
            Some(("openai", value)) => ReplCommand::Credential(OPENAI_API_KEY, value.trim().to_string()),
            Some(("qdrant", value)) => ReplCommand::Credential(QDRANT_API_KEY, value.trim().to_string()),
            _ => ReplCommand::Message("usage: :key openai|qdrant <value>".to_string()),
        },
        _ => ReplCommand::Message(format!("unknown command {command}; try :help")),
    }
}

fn parse_members(rest: &str) -> ReplCommand {
    match rest {
        "all" => ReplCommand::Members(Some(LegalRole::ALL.to_vec())),
        "preset" | "" => ReplCommand::Members(None),
        list => list
            .split(',')
            .map(|name| LegalRole::from_str(name.trim(), true))
            .collect::<Result<Vec<_>, _>>()
            .map(|roles| ReplCommand::Members(Some(roles)))
            .unwrap_or_else(ReplCommand::Message),
    }
}
