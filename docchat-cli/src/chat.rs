//! Interactive chat loop and one-shot exchange handling

use anyhow::Result;
use console::style;
use dialoguer::Input;
use docchat_core::config::Config;
use docchat_core::session::{Session, SessionManager};
use docchat_providers::{ChatProvider, ChatStreamEvent, Message, ProviderError};
use futures::StreamExt;
use indicatif::ProgressBar;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Per-exchange request parameters
pub struct ExchangeOptions {
    pub model: Option<String>,
    pub max_tokens: i32,
    pub temperature: f64,
}

impl ExchangeOptions {
    fn from_config(config: &Config, model_override: Option<String>) -> Self {
        Self {
            model: model_override.or_else(|| Some(config.chat.model.clone())),
            max_tokens: config.chat.max_tokens as i32,
            temperature: config.chat.temperature as f64,
        }
    }
}

/// Run one streamed exchange against the provider.
///
/// The user turn and the accumulated assistant turn are committed to the
/// session only after the stream completes successfully; on any failure the
/// session is left untouched and the error is surfaced to the caller.
pub async fn run_exchange<P: ChatProvider + ?Sized>(
    provider: &P,
    session: &mut Session,
    prompt: &str,
    opts: &ExchangeOptions,
    mut on_delta: impl FnMut(&str),
) -> std::result::Result<String, ProviderError> {
    let messages: Vec<Message> = session
        .assemble_request(prompt)
        .iter()
        .map(Message::from)
        .collect();

    let mut stream = provider
        .chat_stream(messages, opts.model.clone(), opts.max_tokens, opts.temperature)
        .await?;

    let mut accumulated = String::new();
    let mut completed = None;
    while let Some(event) = stream.next().await {
        match event? {
            ChatStreamEvent::TextDelta(text) => {
                on_delta(&text);
                accumulated.push_str(&text);
            }
            ChatStreamEvent::Completed(response) => completed = Some(response),
        }
    }

    let response = completed.ok_or_else(|| {
        ProviderError::InvalidResponse("stream ended without completion".to_string())
    })?;

    let final_text = if response.text().is_empty() {
        accumulated
    } else {
        response.text().to_string()
    };

    session.push_user(prompt);
    session.push_assistant(&final_text);
    Ok(final_text)
}

/// Extract a document and attach it to the session
fn attach_document(session: &mut Session, path: &Path, config: &Config) -> Result<()> {
    let doc = docchat_extract::extract_file(path, config.upload.max_bytes)?;
    info!(file = %doc.file_name, "attached document context");
    session.attach_document(&doc.file_name, &doc.text);
    println!(
        "{}",
        style(format!(
            "File '{}' has been uploaded and processed.",
            doc.file_name
        ))
        .green()
    );
    Ok(())
}

/// Run the interactive chat REPL
pub async fn run_chat(
    config: &Config,
    file: Option<PathBuf>,
    model: Option<String>,
    session_key: Option<String>,
) -> Result<()> {
    let provider = super::build_provider(config)?;
    let opts = ExchangeOptions::from_config(config, model);

    let workspace = super::expand_tilde(&config.chat.workspace);
    std::fs::create_dir_all(&workspace)?;
    let mut manager = SessionManager::new(&workspace);

    let session_key = session_key.unwrap_or_else(|| "cli:chat".to_string());
    let mut session = manager.get_or_create(&session_key).clone();

    println!(
        "{}",
        style(format!(
            "docchat - model: {} - session: {}",
            opts.model.as_deref().unwrap_or("default"),
            session_key
        ))
        .cyan()
    );
    println!("Commands: /load <file>  /clear  /quit\n");

    if let Some(path) = file {
        if let Err(e) = attach_document(&mut session, &path, config) {
            error!("Failed to attach document: {}", e);
            anyhow::bail!("Failed to process '{}': {}", path.display(), e);
        }
        manager.save(&session)?;
    }

    loop {
        let line: String = Input::new()
            .with_prompt(style("you").cyan().to_string())
            .allow_empty(true)
            .interact_text()?;
        let line = line.trim().to_string();

        if line.is_empty() {
            continue;
        }

        if line == "/quit" {
            break;
        }

        if line == "/clear" {
            session.clear();
            manager.save(&session)?;
            println!("{}", style("Chat history and uploaded file cleared.").yellow());
            continue;
        }

        if let Some(path) = line.strip_prefix("/load ") {
            let path = super::expand_tilde(path.trim());
            match attach_document(&mut session, &path, config) {
                Ok(()) => manager.save(&session)?,
                Err(e) => {
                    println!("{} {}", style("error:").red().bold(), e);
                }
            }
            continue;
        }

        print!("{} ", style("assistant").green().bold());
        std::io::stdout().flush()?;

        let result = run_exchange(&provider, &mut session, &line, &opts, |delta| {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        })
        .await;

        println!();
        match result {
            Ok(_) => {
                manager.save(&session)?;
            }
            Err(e) => {
                // Failed exchanges leave the transcript untouched
                error!("Chat request failed: {}", e);
                println!("{} {}", style("error:").red().bold(), e);
            }
        }
    }

    // Persist whatever the final state is before leaving
    manager.save(&session)?;
    Ok(())
}

/// Run a one-shot exchange
pub async fn run_ask(
    config: &Config,
    message: &str,
    file: Option<PathBuf>,
    model: Option<String>,
) -> Result<()> {
    let provider = super::build_provider(config)?;
    let opts = ExchangeOptions::from_config(config, model);

    let mut session = Session::new("cli:ask");
    if let Some(path) = file {
        attach_document(&mut session, &path, config)
            .map_err(|e| anyhow::anyhow!("Failed to process '{}': {}", path.display(), e))?;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("waiting for model...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let mut first_delta = true;
    let result = run_exchange(&provider, &mut session, message, &opts, |delta| {
        if first_delta {
            spinner.finish_and_clear();
            first_delta = false;
        }
        print!("{}", delta);
        let _ = std::io::stdout().flush();
    })
    .await;

    spinner.finish_and_clear();
    println!();

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Chat request failed: {}", e);
            anyhow::bail!("Chat request failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docchat_providers::{ChatResponse, ProviderResult};

    /// Provider stub; `reply: None` simulates a remote failure
    struct StubProvider {
        reply: Option<String>,
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _model: Option<String>,
            _max_tokens: i32,
            _temperature: f64,
        ) -> ProviderResult<ChatResponse> {
            match &self.reply {
                Some(text) => Ok(ChatResponse {
                    content: Some(text.clone()),
                    finish_reason: "stop".to_string(),
                    usage: Default::default(),
                }),
                None => Err(ProviderError::ApiError("HTTP 500: boom".to_string())),
            }
        }

        fn get_default_model(&self) -> String {
            "stub-model".to_string()
        }
    }

    fn opts() -> ExchangeOptions {
        ExchangeOptions {
            model: None,
            max_tokens: 256,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn test_successful_exchange_commits_both_turns() {
        let provider = StubProvider {
            reply: Some("the answer".to_string()),
        };
        let mut session = Session::new("test");

        let mut deltas = String::new();
        let text = run_exchange(&provider, &mut session, "question", &opts(), |d| {
            deltas.push_str(d)
        })
        .await
        .unwrap();

        assert_eq!(text, "the answer");
        assert_eq!(deltas, "the answer");
        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].content, "question");
        assert_eq!(session.turns[1].content, "the answer");
    }

    #[tokio::test]
    async fn test_failed_exchange_leaves_session_untouched() {
        let provider = StubProvider { reply: None };
        let mut session = Session::new("test");
        session.push_user("earlier");
        session.push_assistant("reply");
        session.attach_document("a.txt", "doc");

        let err = run_exchange(&provider, &mut session, "question", &opts(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::ApiError(_)));
        assert_eq!(session.turns.len(), 2);
        assert!(session.document.is_some());
    }
}
