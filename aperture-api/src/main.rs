use std::net::SocketAddr;
use std::sync::Arc;

use aperture_api::{app, middleware::rate_limit::RateLimiter, state::AppState};
use aperture_core::session::SessionStore;
use aperture_store::app_config::Config;
use aperture_store::{
    Mailer, MemoryBookingRepository, MemoryMessageRepository, MemorySessionStore, RedisClient,
    RedisSessionStore,
};
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aperture_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::load().expect("Failed to load config"));
    tracing::info!("Starting Aperture API on port {}", config.server.port);

    // Sessions go to Redis when configured; bookings and messages live in
    // process memory either way.
    let sessions: Arc<dyn SessionStore> = match config.redis.url.as_deref() {
        Some(url) => {
            let client = RedisClient::new(url)
                .await
                .expect("Failed to connect to Redis");
            tracing::info!("Session store backed by Redis");
            Arc::new(RedisSessionStore::new(client, config.session.ttl_seconds))
        }
        None => Arc::new(MemorySessionStore::new(config.session.ttl_seconds)),
    };

    let mailer = Mailer::new(&config.smtp).expect("Failed to build SMTP transport");

    let state = AppState {
        bookings: Arc::new(MemoryBookingRepository::new()),
        messages: Arc::new(MemoryMessageRepository::new()),
        sessions,
        mailer: Arc::new(mailer),
        rate_limiter: Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window_seconds,
        )),
        config: config.clone(),
        started_at: Utc::now(),
    };

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
