//! Thin CLI harness: wires a `Session` to stdin/stdout for interactive manual testing. No
//! persistence, no authentication, no sandboxing — those stay out of scope for the core.

use std::io::Write;
use std::sync::Arc;

use agentcore_engine::{Session, SessionConfig};
use agentcore_llm::{AnthropicAdapter, Client, OpenAiCompatAdapter};
use agentcore_tools::LocalEnvironment;
use agentcore_types::{ReasoningEffort, SessionEvent};
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "agentcore", about = "Interactive harness for the Agent Session Engine")]
struct Cli {
    /// Model identifier passed to the provider.
    #[arg(long, default_value = "claude-sonnet-4-5")]
    model: String,

    /// Provider to route requests to.
    #[arg(long, default_value = "anthropic")]
    provider: String,

    /// Base URL override for the OpenAI-compatible adapter.
    #[arg(long)]
    openai_base_url: Option<String>,

    /// Working directory the tool executors operate against.
    #[arg(long, default_value = ".")]
    working_dir: String,

    /// Maximum agent turns for the whole session.
    #[arg(long, default_value_t = 100)]
    max_turns: usize,

    /// Maximum tool-call rounds per single user input.
    #[arg(long, default_value_t = 10)]
    max_tool_rounds: usize,

    /// Context window size in tokens, used for the context-warning threshold.
    #[arg(long)]
    context_window_tokens: Option<usize>,

    /// Reasoning effort hint forwarded to providers that support it.
    #[arg(long, value_enum)]
    reasoning_effort: Option<ReasoningEffortArg>,

    /// A single instruction prepended to every system prompt this session builds.
    #[arg(long)]
    user_instruction: Option<String>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ReasoningEffortArg {
    Low,
    Medium,
    High,
}

impl From<ReasoningEffortArg> for ReasoningEffort {
    fn from(value: ReasoningEffortArg) -> Self {
        match value {
            ReasoningEffortArg::Low => ReasoningEffort::Low,
            ReasoningEffortArg::Medium => ReasoningEffort::Medium,
            ReasoningEffortArg::High => ReasoningEffort::High,
        }
    }
}

fn build_client(cli: &Cli) -> anyhow::Result<Client> {
    let mut client = Client::new();

    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        client = client.register(Arc::new(AnthropicAdapter::new(key)));
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        let mut adapter = OpenAiCompatAdapter::new(key);
        if let Some(url) = &cli.openai_base_url {
            adapter = adapter.with_base_url(url.clone());
        }
        client = client.register(Arc::new(adapter));
    }

    Ok(client)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry().with(EnvFilter::from_default_env()).with(fmt::layer()).init();

    let cli = Cli::parse();

    let client = Arc::new(build_client(&cli)?);
    let environment: Arc<dyn agentcore_tools::Environment> = Arc::new(LocalEnvironment::new(&cli.working_dir));

    let config = SessionConfig {
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        max_turns: cli.max_turns,
        max_tool_rounds_per_input: cli.max_tool_rounds,
        context_window_tokens: cli.context_window_tokens,
        reasoning_effort: cli.reasoning_effort.map(Into::into),
        user_instruction: cli.user_instruction.clone(),
        ..Default::default()
    };

    let session = Session::new(config, environment, client, 0).await;

    let mut events = session.subscribe().expect("fresh session always has an unconsumed stream");
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => print_event(&event),
                Err(message) => {
                    eprintln!("[stream closed: {message}]");
                    break;
                }
            }
        }
    });

    println!("agentcore ready. Type a message and press enter; Ctrl-D to exit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        let bytes_read = stdin.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Err(err) = session.submit(line).await {
            eprintln!("error: {err}");
            break;
        }
    }

    session.abort().await;
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::AssistantTextDelta { text } => print!("{text}"),
        SessionEvent::AssistantTextEnd => println!(),
        SessionEvent::ThinkingDelta { text } => eprint!("{text}"),
        SessionEvent::ToolCallStart { name, .. } => eprintln!("\n[tool: {name}]"),
        SessionEvent::ToolCallEnd { name, is_error, output, .. } => {
            let label = if *is_error { "error" } else { "ok" };
            eprintln!("[tool {name} {label}: {:.200}]", output);
        }
        SessionEvent::LoopDetection { message } => eprintln!("[loop detected: {message}]"),
        SessionEvent::TurnLimit { reason } => eprintln!("[turn limit: {reason}]"),
        SessionEvent::ContextWarning { fraction } => eprintln!("[context at {:.0}%]", fraction * 100.0),
        SessionEvent::Error { message } => eprintln!("[error: {message}]"),
        SessionEvent::SessionStart { .. } | SessionEvent::SessionEnd { .. } | SessionEvent::AssistantTextStart => {}
        SessionEvent::SubagentEvent { subagent_id, event } => {
            eprint!("[subagent {subagent_id}] ");
            print_event(event);
        }
    }
}
