//! teahaz-watch: log in to a chatroom and print new messages as they arrive.
//!
//! Settings come from `config/teahaz.toml` (or `$TEAHAZ_CONFIG_PATH`) plus env:
//!   TEAHAZ_CHATROOM, TEAHAZ_USER_ID, TEAHAZ_PASSWORD  (login)
//!   TEAHAZ_COOKIE                                     (resume instead of login)

use anyhow::{Context, Result};
use teahaz_client::{
    config::load_settings_default, ChatClient, MonitorExit, Payload, Session,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("teahaz_client=info,monitor=info,client=info,warn"));

    let json = std::env::var("TEAHAZ_LOG_JSON").ok().is_some_and(|v| v == "1");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing env var {name}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = load_settings_default().context("loading settings")?;
    let client = ChatClient::new(&settings.client).context("building http client")?;

    let chatroom = required("TEAHAZ_CHATROOM")?;
    let session = match std::env::var("TEAHAZ_COOKIE") {
        Ok(cookie) => {
            let mut s = Session::new(chatroom, cookie);
            s.user_id = std::env::var("TEAHAZ_USER_ID").ok();
            s
        }
        Err(_) => {
            let user_id = required("TEAHAZ_USER_ID")?;
            let password = required("TEAHAZ_PASSWORD")?;
            client
                .login(&chatroom, &user_id, &password)
                .await
                .context("login failed")?
        }
    };

    let monitor = client.monitor(session, settings.monitor);
    let cancel = monitor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, stopping monitor");
            cancel.cancel();
        }
    });

    let exit = monitor
        .run(
            |batch| {
                for ev in batch.fresh() {
                    let who = ev.username.as_deref().unwrap_or("?");
                    match &ev.payload {
                        Payload::Text(text) => println!("[{:.0}] {who}: {text}", ev.timestamp),
                        Payload::Structured(v) => println!("[{:.0}] ({}) {v}", ev.timestamp, ev.kind),
                    }
                }
            },
            |error| tracing::warn!(%error, "poll failed"),
        )
        .await;

    match exit {
        MonitorExit::Delivered(batch) => {
            tracing::info!(tick = batch.tick, fresh = batch.fresh_count(), "stopped after delivery")
        }
        MonitorExit::Failed(error) => return Err(error).context("monitor stopped on failure"),
        MonitorExit::Cancelled => tracing::info!("monitor cancelled"),
    }
    Ok(())
}
