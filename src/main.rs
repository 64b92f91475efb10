use log::{error, info};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use market_chat::state::AppState;
use market_chat::{integration, order, router};

#[tokio::main]
async fn main() {
    let cfg = integration::Config::default();

    let state = match AppState::init(&cfg) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {e}");
            std::process::exit(1);
        }
    };

    if let Some(pubsub) = &cfg.pubsub {
        let client = pubsub.connect().await;
        tokio::spawn(order::listener::listen(client, state.fanout.clone()));
    }

    let app = router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(cfg.env.allow_origin())
                .allow_methods(cfg.env.allow_methods())
                .allow_headers(cfg.env.allow_headers()),
        )
        .layer(TraceLayer::new_for_http());

    let addr = cfg.env.addr();
    info!("Listening on {addr}");

    let served = match cfg.env.ssl_config() {
        Some(ssl) => {
            axum_server::bind_openssl(addr, ssl)
                .serve(app.into_make_service())
                .await
        }
        None => axum_server::bind(addr).serve(app.into_make_service()).await,
    };

    if let Err(e) = served {
        error!("Server stopped: {e}");
    }
}
