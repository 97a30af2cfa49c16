use std::sync::Arc;

use anyhow::Context;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;

use vab_api::SessionGateway;
use vab_core::{
    config::Config,
    domain::ChatId,
    engine::{Endpoints, NotificationEngine},
    menu::Menu,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    ports::{RecordStore, VotingApi},
    render::Renderer,
    scheduler::{DispatchSettings, Dispatcher},
};
use vab_store::SqliteStore;
use vab_telegram::{
    router::{run_polling, AppState},
    TelegramMessenger,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vab_core::logging::init("vab")?;

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteStore::open(&cfg.database_path)
            .with_context(|| format!("opening {}", cfg.database_path.display()))?,
    );
    let api: Arc<dyn VotingApi> = Arc::new(SessionGateway::new(&cfg.api)?);

    let engine = Arc::new(NotificationEngine::new(
        api,
        store.clone(),
        Endpoints::from(&cfg.api),
        Renderer::new(cfg.links.clone(), cfg.thresholds),
        cfg.thresholds,
    ));

    // One throttled messenger for both the scheduled fan-out and menu replies,
    // so their bursts share the flood budget.
    let bot = Bot::new(cfg.bot_token.clone());
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let dispatcher = Dispatcher::new(
        engine.clone(),
        store.clone(),
        messenger.clone(),
        DispatchSettings::from(cfg.as_ref()),
    );
    let menu = Arc::new(Menu::new(engine, store, cfg.action_delay, cfg.message_limit));
    let state = Arc::new(AppState::new(
        menu,
        messenger,
        ChatId(cfg.broadcast_chat_id),
    ));

    tracing::info!(
        check_interval_secs = cfg.check_interval.as_secs(),
        digest_time = %cfg.digest_time.format("%H:%M"),
        "vab started"
    );

    let cancel = CancellationToken::new();
    tokio::select! {
        res = dispatcher.run(cancel.clone()) => {
            // Exit non-zero and let the supervisor restart us.
            res.context("check cycle failed")?;
        }
        res = run_polling(bot, state) => {
            res.context("telegram front-end stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            cancel.cancel();
        }
    }

    Ok(())
}
