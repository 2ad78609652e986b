mod app;
mod assets;
mod auth;
mod config;
mod designs;
mod error;
mod generate;
mod imagegen;
mod state;
#[cfg(test)]
mod testing;
mod types;
mod uploads;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "jewelcraft=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = state::AppState::init().await?;
    tokio::fs::create_dir_all(&state.config.uploads.dir).await?;

    let http = state.config.http.clone();
    app::serve(app::build_app(state), &http).await
}
