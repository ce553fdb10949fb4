//! convflow demo
//!
//! A registration conversation on the console. `/start` begins it, `/cancel`
//! leaves it, `!<data>` presses an inline button and a line starting with `{`
//! is decoded as a raw JSON envelope.

use async_trait::async_trait;
use convflow::{
    AppConfig, CallbackQuery, ConvKey, ConvStatesGroup, ConversationStore, DefinitionError,
    Envelope, HandleException, HandlerResult, InMemoryStore, IncomingMessage, InlineButton,
    InlineKeyboard, NewData, NewState, PostProcessor, Quest, QuestFunc, QuestText, RouterConfig,
    RouterError, ScopedStore, SqliteStore, StateRegistry, Transport, TransportError,
};
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CHAT_ID: i64 = 1;
const USER_ID: i64 = 1;
const BOT_ID: i64 = 0;
const REGISTRATION: &str = "registration";

/// Prints outbound messages to stdout
struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        println!("[bot -> {chat_id}] {text}");
        for row in keyboard.map(|k| k.rows.as_slice()).unwrap_or_default() {
            let buttons: Vec<String> = row
                .iter()
                .map(|button| match &button.callback_data {
                    Some(data) => format!("[{} !{data}]", button.text),
                    None => format!("[{}]", button.text),
                })
                .collect();
            println!("    {}", buttons.join(" "));
        }
        Ok(())
    }

    async fn answer_callback_query(&self, query_id: &str) -> Result<(), TransportError> {
        tracing::debug!(query_id, "Callback query answered");
        Ok(())
    }
}

enum Input {
    Text(String),
    Button(String),
    Raw(HandlerResult),
}

impl Input {
    fn parse(line: &str) -> Result<Self, serde_json::Error> {
        if let Some(data) = line.strip_prefix('!') {
            Ok(Input::Button(data.to_string()))
        } else if line.starts_with('{') {
            let envelope: Envelope = serde_json::from_str(line)?;
            Ok(Input::Raw(envelope.into()))
        } else {
            Ok(Input::Text(line.to_string()))
        }
    }
}

fn registry() -> Result<StateRegistry, DefinitionError> {
    let typing = QuestFunc::new(|key: ConvKey| {
        async move {
            println!("[bot -> {}] (typing...)", key.chat_id);
            Ok::<(), TransportError>(())
        }
        .boxed()
    });
    let confirm = QuestText::new(
        "Is that correct?",
        InlineKeyboard::new().row([
            InlineButton::callback("Yes", "yes"),
            InlineButton::callback("No", "no"),
        ]),
    );

    StateRegistry::new([ConvStatesGroup::new(REGISTRATION)
        .state("name", "What is your name?")
        .state("age", "How old are you?")
        .state("confirm", vec![Quest::from(typing), Quest::from(confirm)])])
}

/// The bot's handler: reads the conversation, returns envelopes
async fn handle<S: ConversationStore>(
    store: &ScopedStore<S>,
    transport: &ConsoleTransport,
    key: ConvKey,
    input: &Input,
) -> Result<HandlerResult, RouterError> {
    let record = store.snapshot(key).await?;
    let state = record.position.current.as_ref().map(|s| s.name.as_str());

    let result = match (input, state) {
        (Input::Raw(result), _) => result.clone(),
        (Input::Text(text), _) if text == "/start" => NewState::group(REGISTRATION).into(),
        (Input::Text(text), _) if text == "/cancel" => {
            NewState::previous().on_exit("Registration cancelled.").into()
        }
        (Input::Text(name), Some("name")) => NewData::new().set("name", name.as_str()).into(),
        (Input::Text(age), Some("age")) => match age.parse::<u8>() {
            Ok(age) => NewData::new().set("age", age).into(),
            Err(_) => {
                HandleException::new(vec!["Please send your age as a number.", "How old are you?"])
                    .into()
            }
        },
        (Input::Button(answer), Some("confirm")) if answer == "yes" => {
            let name = record.data.get("name").and_then(Value::as_str).unwrap_or("?");
            let age = record.data.get("age").and_then(Value::as_u64).unwrap_or_default();
            transport
                .send_message(key.chat_id, &format!("Registered {name}, {age} years old."), None)
                .await?;
            HandlerResult::none()
        }
        (Input::Button(_), Some("confirm")) => NewState::state(REGISTRATION, "name").into(),
        (_, Some("confirm")) => HandleException::new("Please use the buttons above.").into(),
        (_, None) => {
            transport
                .send_message(key.chat_id, "Send /start to register.", None)
                .await?;
            HandlerResult::none()
        }
        (Input::Button(_), Some(_)) => {
            HandleException::new("That button is no longer active.").into()
        }
        (Input::Text(_), Some(_)) => HandlerResult::none(),
    };
    Ok(result)
}

async fn run<S: ConversationStore + 'static>(
    store: S,
    registry: StateRegistry,
    config: RouterConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = Arc::new(ConsoleTransport);
    let processor = PostProcessor::new(transport.clone(), store, Arc::new(registry), config);
    let key = ConvKey::new(CHAT_ID, USER_ID);

    println!("Send /start to register, /cancel to stop, !<data> to press a button.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut message_id = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        message_id += 1;

        let input = match Input::parse(line) {
            Ok(input) => input,
            Err(e) => {
                println!("(invalid envelope: {e})");
                continue;
            }
        };

        let outcome = async {
            let results = handle(processor.store(), &transport, key, &input).await?;
            if let Input::Button(data) = &input {
                let query = CallbackQuery {
                    id: format!("cb-{message_id}"),
                    from_user_id: USER_ID,
                    data: Some(data.clone()),
                    message: IncomingMessage::new(message_id, CHAT_ID, BOT_ID, ""),
                };
                processor.on_callback_query(&query, &results).await
            } else {
                let message = IncomingMessage::new(message_id, CHAT_ID, USER_ID, line);
                processor.on_message(&message, &results).await
            }
        }
        .await;

        if let Err(e) = outcome {
            tracing::error!(error = %e, "Post-processing round failed");
            println!("(error: {e})");
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convflow=info".into()),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();
    init_tracing(config.json_logs);

    let registry = registry()?;

    match &config.db_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %path.display(), "Opening database");
            run(SqliteStore::open(path)?, registry, config.router).await
        }
        None => {
            tracing::info!("No CONVFLOW_DB_PATH set, conversations are kept in memory");
            run(InMemoryStore::new(), registry, config.router).await
        }
    }
}
