use std::io::{self, Write};

use clap::Parser;

use agentcall_rs::agent::{
    AgentSettings, ChatRequest, FunctionCallAgent, ToolRegistry, TurnObserver,
};
use agentcall_rs::config::load_config;
use agentcall_rs::observability::init_tracing;
use agentcall_rs::protocol::{Event, EventPayload};
use agentcall_rs::transport::HttpTransport;

#[derive(Debug, Parser)]
#[command(name = "agentcall")]
#[command(about = "Ask the integrated function-call endpoint one question")]
struct Cli {
    /// Path to the YAML configuration
    #[arg(long = "config", default_value = "config.yaml")]
    config_path: String,

    /// Print answer fragments as they stream in
    #[arg(long)]
    stream: bool,

    /// Continue an existing conversation
    #[arg(long = "conversation")]
    conversation_id: Option<String>,

    /// The question; words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
}

/// Prints streamed fragments to stdout as they arrive.
struct StdoutObserver {
    stream: bool,
}

impl TurnObserver for StdoutObserver {
    fn on_fragment(&mut self, fragment: &str) {
        if self.stream {
            let mut out = io::stdout().lock();
            let _ = out.write_all(fragment.as_bytes());
            let _ = out.flush();
        }
    }
}

fn describe(event: &Event) -> String {
    let body = match event.payload() {
        EventPayload::Text(text) | EventPayload::Url(text) => text.clone(),
        _ => event.payload_json().to_string(),
    };
    format!("[{:?}/{:?}] {body}", event.kind(), event.status())
}

fn run(args: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config_path).map_err(|e| {
        format!(
            "failed to load {}: {e} (copy config.example.yaml to config.yaml and edit it)",
            args.config_path
        )
    })?;
    init_tracing(&config.features.log_level);

    let transport = HttpTransport::new(&config.client, &config.auth)?;
    let agent = FunctionCallAgent::new(transport, AgentSettings::from_config(&config));

    let mut request = ChatRequest::new(args.query.join(" ")).stream(args.stream);
    if let Some(id) = args.conversation_id {
        request = request.conversation_id(id);
    }

    let mut observer = StdoutObserver {
        stream: args.stream,
    };
    let outcome = agent.chat(request, &ToolRegistry::new(), &mut observer)?;

    let mut out = io::stdout().lock();
    if args.stream {
        writeln!(out)?;
    } else {
        writeln!(out, "{}", outcome.answer())?;
    }
    for event in &outcome.visible_events {
        writeln!(out, "{}", describe(event))?;
    }
    if !outcome.message.extra.is_empty() {
        writeln!(out, "citations:")?;
        for (source, citations) in outcome.message.extra.iter() {
            writeln!(out, "  [source {source}] {} citation(s)", citations.len())?;
        }
    }
    writeln!(out, "conversation_id: {}", outcome.conversation_id)?;
    Ok(())
}

fn main() {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_and_query_words() {
        let cli = Cli::try_parse_from([
            "agentcall",
            "--stream",
            "--conversation",
            "c-1",
            "who",
            "was",
            "Qin Shi Huang?",
        ])
        .unwrap();
        assert_eq!(cli.config_path, "config.yaml");
        assert!(cli.stream);
        assert_eq!(cli.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(cli.query.join(" "), "who was Qin Shi Huang?");
    }

    #[test]
    fn test_cli_requires_a_query() {
        assert!(Cli::try_parse_from(["agentcall", "--config", "x.yaml"]).is_err());
    }
}
