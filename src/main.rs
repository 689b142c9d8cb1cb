// ============================================================================
// HUNTER PROTOCOL - JACKPOT SETTLEMENT SERVICE
// ============================================================================
//
// Admin ingestion, /admin/settling grading, cycle join/settle.
// Storage: hosted Supabase (PostgREST + RPC), or in-memory for local runs.
//
// Run:  HUNTER_STORE=memory ADMIN_API_KEY=dev cargo run
// Test: curl http://localhost:8080/health

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use hunter::auth::{AuthDisabled, SupabaseAuth, UserVerifier};
use hunter::routes::{self, AppState};
use hunter::supabase::SupabaseManager;
use hunter::{Config, JackpotStore, MemoryStore, StoreBackend, SupabaseStore};

// ============================================================================
// GRACEFUL SHUTDOWN
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Failed to install Ctrl+C handler: {}", e);
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("🛑 Shutdown signal received");
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() {
    // 1. Environment + logging
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hunter=debug")))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .init();

    info!("╔══════════════════════════════════════════════════════╗");
    info!("║       HUNTER PROTOCOL - JACKPOT SETTLEMENT           ║");
    info!("╚══════════════════════════════════════════════════════╝");

    // 2. Config
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ FATAL: {}", e);
            std::process::exit(1);
        }
    };

    // 3. Store (built once, injected everywhere)
    let store: Arc<dyn JackpotStore> = match (&config.backend, &config.supabase) {
        (StoreBackend::Supabase, Some(supabase)) => {
            match SupabaseManager::new(&supabase.url, &supabase.service_role_key, supabase.timeout) {
                Ok(manager) => {
                    info!("🗄️  Supabase store at {}", supabase.url);
                    Arc::new(SupabaseStore::new(manager))
                }
                Err(e) => {
                    error!("❌ FATAL: {}", e);
                    std::process::exit(1);
                }
            }
        }
        _ => {
            warn!("⚠️  In-memory store: data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // 4. User auth
    let auth: Arc<dyn UserVerifier> = match &config.user_auth {
        Some(user_auth) => {
            info!("🔐 Verifying user tokens for project {}", user_auth.project_id);
            Arc::new(SupabaseAuth::new(&user_auth.jwks_url, &user_auth.project_id))
        }
        None => {
            warn!("⚠️  SUPABASE_JWKS_URL not set: joining cycles is disabled");
            Arc::new(AuthDisabled)
        }
    };

    // 5. Router
    let state = AppState::new(store, config.tier_policy, &config.admin_api_key, auth);
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // 6. Serve
    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("❌ FATAL: cannot bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };

    info!("🚀 Listening on http://{}", config.bind_addr);
    info!("   Tier policy: {:?}", config.tier_policy);
    info!("");
    info!("🎯 SETTLING:");
    info!("   GET  /admin/settling/{{id}}          Snapshot");
    info!("   POST /admin/settling/{{id}}/lock     Lock Results");
    info!("   POST /admin/settling/{{id}}/repair   Re-run cascade");
    info!("🎟️ CYCLES:");
    info!("   POST /cycles/{{id}}/join             Join with credits");
    info!("   POST /admin/cycles/{{id}}/settle     Legacy settle");
    info!("");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server error: {}", e);
    }

    info!("✅ Server shutdown complete");
}
