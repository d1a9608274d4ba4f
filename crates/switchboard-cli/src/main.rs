use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;
use tracing_subscriber::EnvFilter;

use switchboard_core::app::{MessagingBuilder, MessagingConfig};
use switchboard_core::domain::{CommandMessage, EventMessage, HandlerError, QueryMessage};
use switchboard_core::impls::LoggingCallback;
use switchboard_core::typed::{Answers, Command, Event, Handles, Observes, Query};

#[derive(Debug, Serialize, Deserialize)]
struct Ping {
    from: String,
}

impl Command for Ping {
    const NAME: &'static str = "demo.ping.v1";
}

#[derive(Debug, Serialize, Deserialize)]
struct Spell {
    word: String,
}

impl Query for Spell {
    const NAME: &'static str = "demo.spell.v1";
    type Response = String;
}

#[derive(Debug, Serialize, Deserialize)]
struct Greeted {
    name: String,
}

impl Event for Greeted {
    const NAME: &'static str = "demo.greeted.v1";
}

struct Ponger;

#[async_trait]
impl Handles<Ping> for Ponger {
    type Output = String;

    async fn handle(&self, command: Ping) -> Result<String, HandlerError> {
        Ok(format!("Pong, {}", command.from))
    }
}

/// 三通りの綴り方で答えるクエリハンドラ
enum Speller {
    Upper,
    Lower,
    Reversed,
}

#[async_trait]
impl Answers<Spell> for Speller {
    async fn answer(&self, query: Spell) -> Result<String, HandlerError> {
        Ok(match self {
            Self::Upper => query.word.to_uppercase(),
            Self::Lower => query.word.to_lowercase(),
            Self::Reversed => query.word.chars().rev().collect(),
        })
    }
}

struct Tally(Arc<AtomicUsize>);

#[async_trait]
impl Observes<Greeted> for Tally {
    async fn observe(&self, event: Greeted, message: &EventMessage) -> Result<(), HandlerError> {
        let seen = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        info!(name = %event.name, at = %message.timestamp(), seen, "greeting observed");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // (A) ログ初期化（RUST_LOG、既定は info）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (B) 設定ファイル（任意）を読み込んでバスを構築
    let config = match std::env::args().nth(1) {
        Some(path) => MessagingConfig::from_path(path)?,
        None => MessagingConfig::default(),
    };
    let greetings = Arc::new(AtomicUsize::new(0));
    let messaging = MessagingBuilder::new()
        .with_config(config)
        .register_command::<Ping, _>(Ponger)
        .register_query::<Spell, _>(Speller::Upper)
        .register_query::<Spell, _>(Speller::Lower)
        .register_query::<Spell, _>(Speller::Reversed)
        .register_event::<Greeted, _>(Tally(Arc::clone(&greetings)))
        .expect_commands(&[Ping::NAME])
        .expect_queries(&[Spell::NAME])
        .build()?;

    // (C) Ping → Pong
    let ping = CommandMessage::from_command(&Ping {
        from: "switchboard".into(),
    })?;
    let reply = messaging.command_bus().dispatch::<String>(&ping).await?;
    println!("dispatch: {:?}", reply.into_result()?);
    messaging
        .command_bus()
        .dispatch_with(&ping, &LoggingCallback)
        .await?;

    // (D) scatter-gather: 一致するハンドラ全員に聞く
    let spell = QueryMessage::from_query(&Spell {
        word: "Switchboard".into(),
    })?;
    let mut answers = messaging.query_bus().scatter_gather::<String>(&spell);
    while let Some(answer) = answers.next().await {
        println!("scatter-gather: {:?}", answer.into_result()?);
    }

    // (E) イベント fan-out
    let events = ["ada", "grace"]
        .into_iter()
        .map(|name| EventMessage::from_event(&Greeted { name: name.into() }))
        .collect::<Result<Vec<_>, _>>()?;
    messaging.event_bus().publish(&events).await?;
    println!("events observed: {}", greetings.load(Ordering::SeqCst));

    // (F) 解除後は "no handler"
    messaging.unsubscribe_all();
    match messaging.command_bus().dispatch::<String>(&ping).await {
        Ok(_) => println!("unexpected: still routed after unsubscribe"),
        Err(error) => println!("after unsubscribe: {error}"),
    }

    Ok(())
}
