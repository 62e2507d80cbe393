//! flowbot console demo
//!
//! Runs a small greeting bot over stdin/stdout. Type `exit` to quit.

use chrono::Timelike;
use flowbot::{
    Callback, ConsoleChannel, ConsoleConfig, Engine, EngineConfig, ExpectedResponse, Flow,
    InMemorySessionStore, Step, StepOverlay,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the conversation
    let json_logs = std::env::var_os("FLOWBOT_LOG_JSON").is_some();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowbot=warn".into()),
        )
        .with(json_logs.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr)
        }))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let config = EngineConfig::from_env();
    let console_config = ConsoleConfig::from_env();
    tracing::info!(
        conv_id = %console_config.conversation_id,
        max_render_passes = config.max_render_passes,
        "Starting console bot"
    );

    let mut engine = Engine::with_config(InMemorySessionStore::new(), main_flow(), config)?;
    engine.register_flow(profile_flow())?;

    let console = ConsoleChannel::new(console_config);
    let console_done = console.shutdown_token();
    engine.register(console);

    let engine = Arc::new(engine);
    engine.start()?;

    let interrupted = tokio::select! {
        () = console_done.cancelled() => false,
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupted");
            true
        }
    };

    engine.stop();
    if interrupted {
        // A pending stdin read would block runtime shutdown
        std::process::exit(130);
    }
    Ok(())
}

fn greeting(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    }
}

/// Default flow: greets the user and offers a small menu
fn main_flow() -> Flow {
    let greet = Callback::new(|ctx| {
        Box::pin(async move {
            let name: Option<String> = ctx.get("name").await?;
            let hello = greeting(chrono::Local::now().hour());
            let hello = match name {
                Some(name) => format!("{hello}, {name}!"),
                None => format!("{hello}!"),
            };
            Ok(Some(
                StepOverlay::new()
                    .text(hello)
                    .text("Type help, name or bye."),
            ))
        })
    });

    let farewell = Callback::new(|ctx| {
        Box::pin(async move {
            ctx.end_flow().await?;
            Ok(Some(
                StepOverlay::new()
                    .text("Bye! Say anything to start over.")
                    .responses(Vec::new()),
            ))
        })
    });

    Flow::new("main", "welcome")
        .step(
            Step::new("welcome")
                .on_render(greet)
                .response(ExpectedResponse::text("help", Callback::goto("help")))
                .response(ExpectedResponse::text("name", Callback::start_flow("profile")))
                .response(ExpectedResponse::text("bye", farewell)),
        )
        .step(
            Step::new("help")
                .text("This bot remembers your name for the rest of the session.")
                .text("Send anything to go back.")
                .response(ExpectedResponse::any_text(Callback::goto("welcome"))),
        )
}

/// Asks for the user's name, then returns to the main menu
fn profile_flow() -> Flow {
    let save_name = Callback::new(|ctx| {
        Box::pin(async move {
            let name = ctx
                .message()
                .text
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            ctx.set("name", &name).await?;
            Ok(Some(ctx.start_flow_by_name("main", Some("welcome")).await?.into()))
        })
    });

    Flow::new("profile", "ask").step(
        Step::new("ask")
            .text("What should I call you?")
            .response(ExpectedResponse::any_text(save_name)),
    )
}
