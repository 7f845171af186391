use anyhow::{Context, Result};
use axum::Json;
use axum::routing::get;
use tenant_session::InMemoryCodeStore;
use tenant_session::middleware::{AuthSession, SessionAuthConfig, TENANT_HEADER, auth_routes};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Who is logged in, and which tenant requests would be scoped to.
async fn me(AuthSession(session): AuthSession) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "sub": session.user.sub,
        "email": session.user.email,
        "tenantId": session.tenant_id,
        "tenantHeader": TENANT_HEADER,
        "needsOnboarding": session.needs_onboarding,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SessionAuthConfig::from_env().context("loading auth configuration")?;
    let cookies = config.session_cookies();

    let app = axum::Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/me", get(me))
        .with_state(cookies)
        .merge(auth_routes(config, InMemoryCodeStore::new()));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!("session gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Shutting down server");
        })
        .await?;
    Ok(())
}
