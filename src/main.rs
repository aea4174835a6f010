//! Memory Console - administrative client for the memory backend

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use memory_console::{
    api::{
        self, AppConfig, AppConfigUpdate, ChatHistory, HistoryQuery, MemoryConfigUpdate,
        MemoryList, MemoryQuery, QueryResults, SimilarityMode, SubmitReceipt, Transcript,
        UserConfig, format_timestamp,
    },
    cli::{AppConfigCommand, Cli, Command, OutputFormat, UserConfigCommand},
    config::Config,
    gateway::{Completion, RequestDescriptor, RequestGateway},
    protocol::CanonicalResponse,
    render::{self, Terminal},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let gateway = match RequestGateway::from_config(&config) {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let console = Console {
        gateway,
        output: cli.output,
        color: config.notifications.color,
        similarity_mode: config.query.similarity_mode,
        default_top_k: config.query.default_top_k,
    };

    match console.run(cli.command).await {
        Ok(Some(completion)) if completion.is_success() => ExitCode::SUCCESS,
        Ok(Some(_)) => ExitCode::FAILURE,
        Ok(None) => {
            eprintln!("Aborted.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration and apply command-line overrides
fn load_config(cli: &Cli) -> memory_console::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        config.backend.base_url.clone_from(base_url);
    }
    if cli.no_color {
        config.notifications.color = false;
    }
    config.validate()?;
    info!(base_url = %config.backend.base_url, "Configuration loaded");
    Ok(config)
}

struct Console {
    gateway: RequestGateway,
    output: OutputFormat,
    color: bool,
    similarity_mode: SimilarityMode,
    default_top_k: u32,
}

impl Console {
    /// Run one command. `Ok(None)` means the user declined a confirmation.
    async fn run(&self, command: Command) -> memory_console::Result<Option<Completion>> {
        let descriptor = match command {
            Command::Submit {
                user,
                app,
                messages,
            } => api::submit_transcript(&Transcript {
                user_id: user,
                app_name: app,
                messages,
            })?
            .on_success(self.printer(|receipt: SubmitReceipt| {
                println!("Submitted; memory id {}", receipt.memory_id);
            })),

            Command::Query {
                user,
                app,
                text,
                top_k,
                similarity_mode,
            } => {
                let mode = similarity_mode.unwrap_or(self.similarity_mode);
                api::query_memories(&MemoryQuery {
                    user_id: user,
                    app_name: app,
                    query: text,
                    top_k: top_k.unwrap_or(self.default_top_k),
                })?
                .on_success(self.printer(move |results: QueryResults| {
                    print_query_results(&results, mode);
                }))
            }

            Command::List { user, app } => api::list_memories(&user, &app)?
                .on_success(self.printer(|list: MemoryList| print_memory_list(&list))),

            Command::Delete { id, yes } => {
                let descriptor = api::delete_memory(&id)?;
                if !yes && !confirm(&format!("Delete memory {}?", id.trim())).await? {
                    return Ok(None);
                }
                descriptor
            }

            Command::History { user, app, session } => api::chat_history(&HistoryQuery {
                user_id: user,
                app_name: app,
                session_id: session,
            })?
            .on_success(self.printer(print_history)),

            Command::Config(UserConfigCommand::Get { user, app }) => {
                api::get_user_config(&user, &app)?
                    .on_success(self.printer(|config: UserConfig| print_user_config(&config)))
            }

            Command::Config(UserConfigCommand::Set {
                user,
                app,
                extraction_prompt,
                merge_threshold,
                expiry_strategy,
                expiry_days,
            }) => api::update_user_config(
                &user,
                &app,
                &MemoryConfigUpdate {
                    extraction_prompt,
                    merge_threshold,
                    expiry_strategy,
                    expiry_days,
                },
            )?,

            Command::AppConfig(AppConfigCommand::Get { app: Some(app) }) => {
                api::get_app_config(Some(&app))?
                    .on_success(self.printer(|config: AppConfig| print_app_config(&config)))
            }

            Command::AppConfig(AppConfigCommand::Get { app: None }) => api::get_app_config(None)?
                .on_success(self.printer(|configs: Vec<AppConfig>| {
                    if configs.is_empty() {
                        println!("No application configurations.");
                    }
                    for config in &configs {
                        print_app_config(config);
                        println!();
                    }
                })),

            Command::AppConfig(AppConfigCommand::Set { app, file }) => {
                let update = read_app_config_update(&file).await?;
                let (descriptor, warnings) = api::update_app_config(&app, &update)?;
                return Ok(Some(self.dispatch(descriptor, &warnings).await));
            }
        };

        Ok(Some(self.dispatch(descriptor, &[]).await))
    }

    /// Send through the gateway while rendering notifications to stderr
    async fn dispatch(&self, descriptor: RequestDescriptor, warnings: &[String]) -> Completion {
        let notifications = self.gateway.notifications();
        let mut terminal = Terminal::stderr(self.color);
        let mut changes = notifications.subscribe();

        for warning in warnings {
            notifications.show_warning(warning.as_str());
            let state = changes.borrow_and_update().clone();
            if let Err(e) = terminal.render(state.as_ref()) {
                debug!(error = %e, "Failed to render warning");
            }
        }

        render::drive(&mut terminal, &mut changes, self.gateway.send(descriptor)).await
    }

    /// Success handler that prints the payload in the selected format
    fn printer<T, F>(&self, summarize: F) -> impl FnOnce(CanonicalResponse) + Send + use<T, F>
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let output = self.output;
        let notifications = self.gateway.notifications().clone();
        move |response| {
            match output {
                OutputFormat::Json => print_json(response.data()),
                OutputFormat::Yaml => print_yaml(response.data()),
                OutputFormat::Text => match response.decode::<T>() {
                    Ok(value) => summarize(value),
                    Err(e) => {
                        notifications.show_warning(format!("Unexpected payload shape: {e}"));
                        print_json(response.data());
                        return;
                    }
                },
            }
            notifications.show_success(response.notice_text());
        }
    }
}

fn print_json(data: &Value) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("❌ Failed to serialize to JSON: {e}"),
    }
}

fn print_yaml(data: &Value) {
    match serde_yaml::to_string(data) {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => eprintln!("❌ Failed to serialize to YAML: {e}"),
    }
}

fn print_query_results(results: &QueryResults, mode: SimilarityMode) {
    if results.results.is_empty() {
        println!("No matching memories.");
        return;
    }
    for (rank, hit) in results.results.iter().enumerate() {
        println!(
            "{}. [{:>3}%] #{} {}",
            rank + 1,
            hit.similarity_percent(mode),
            hit.memory_id,
            hit.content()
        );
        if let Some(created) = &hit.created_at {
            println!("         created {}", format_timestamp(created));
        }
    }
}

fn print_memory_list(list: &MemoryList) {
    println!("{} memor{}", list.memories.len(), if list.memories.len() == 1 { "y" } else { "ies" });
    for memory in &list.memories {
        let created = memory
            .created_at
            .as_deref()
            .map(format_timestamp)
            .unwrap_or_default();
        println!("  #{:<6} {created:<19}  {}", memory.memory_id, memory.memory_content);
    }
}

fn print_history(history: ChatHistory) {
    let sessions = api::group_by_session(history.chat_history);
    if sessions.is_empty() {
        println!("No chat history.");
        return;
    }
    for session in &sessions {
        let started = session
            .started_at()
            .map(format_timestamp)
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "Session {} (started {started})",
            session.session_id.as_deref().unwrap_or("(none)")
        );
        for record in &session.records {
            let at = record
                .timestamp
                .as_deref()
                .map(format_timestamp)
                .unwrap_or_default();
            println!("  [{at}] {}: {}", record.role, record.content);
        }
        println!();
    }
}

fn print_user_config(config: &UserConfig) {
    let record = &config.config;
    println!("User:              {}", record.user_id);
    println!("App:               {}", record.app_name);
    println!("Merge threshold:   {}", record.merge_threshold);
    println!("Expiry strategy:   {}", record.expiry_strategy);
    println!("Expiry days:       {}", record.expiry_days);
    if let Some(updated) = &record.updated_at {
        println!("Updated:           {}", format_timestamp(updated));
    }
    println!("Extraction prompt:\n{}", record.extraction_prompt);
}

fn print_app_config(config: &AppConfig) {
    println!("📦 {}", config.app_name);
    if let Some(rounds) = config.conversation_rounds {
        println!("   Conversation rounds:  {rounds}");
    }
    if let Some(length) = config.max_summary_length {
        println!("   Max summary length:   {length}");
    }
    if let Some(threshold) = config.similarity_threshold {
        println!("   Similarity threshold: {threshold}");
    }
    if let Some(enabled) = config.enable_auto_summarize {
        println!("   Auto summarize:       {enabled}");
    }
    if let Some(enabled) = config.enable_element_extraction {
        println!("   Element extraction:   {enabled}");
    }
    if let Some(weights) = &config.priority_weights {
        println!(
            "   Priority weights:     length {} / elements {} / frequency {}",
            weights.content_length, weights.element_count, weights.access_frequency
        );
    }
    if let Some(fields) = &config.extraction_fields {
        println!("   Extraction fields:");
        for (name, description) in fields {
            match description {
                Value::String(text) => println!("     {name}: {text}"),
                other => println!("     {name}: {other}"),
            }
        }
    }
}

/// Parse an update file; YAML is a superset of JSON so one parser covers both
async fn read_app_config_update(path: &Path) -> memory_console::Result<AppConfigUpdate> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        memory_console::Error::Config(format!("Failed to read {}: {e}", path.display()))
    })?;
    serde_yaml::from_str(&content).map_err(|e| {
        memory_console::Error::validation(format!("Invalid update file {}: {e}", path.display()))
    })
}

/// Ask a yes/no question on the terminal; anything but y/yes declines
async fn confirm(question: &str) -> memory_console::Result<bool> {
    eprint!("{question} [y/N] ");
    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
