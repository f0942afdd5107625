use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use car_marketplace::config::environment::EnvironmentConfig;
use car_marketplace::database::DatabaseConnection;
use car_marketplace::middleware::cors::cors_middleware;
use car_marketplace::routes;
use car_marketplace::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("🚗 Car Marketplace - Listings API");
    info!("=================================");

    let config = EnvironmentConfig::default();

    // Inicializar base de datos
    let db_connection = match DatabaseConnection::new_default().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    if let Err(e) = db_connection.health_check().await {
        error!("❌ La base de datos no responde: {}", e);
        return Err(anyhow::anyhow!("Error de base de datos: {}", e));
    }

    let pool = db_connection.pool().clone();

    // Crear router de la API
    let cors = cors_middleware(&config);
    let addr: SocketAddr = config.server_url().parse()?;
    let app_state = AppState::new(pool, config);

    let app = Router::new()
        .nest("/api/car", routes::car_routes::create_car_router())
        .layer(cors)
        .with_state(app_state);

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   POST   /api/car - Crear anuncio");
    info!("   GET    /api/car - Listar anuncios");
    info!("   GET    /api/car/:id - Obtener anuncio");
    info!("   PUT    /api/car/:id - Actualizar anuncio (versión presentada)");
    info!("   DELETE /api/car/:id - Eliminar anuncio");
    info!("   GET    /api/car/:id/history - Último chequeo de historial");
    info!("   GET    /api/car/:id/mot - Historial MOT");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Error del servidor: {}", e);
            anyhow::anyhow!(e)
        })?;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
