use crate::server::app_state::AppState;
use crate::server::router::create_router;

pub async fn run_server(app_state: AppState, port: u16) -> Result<(), std::io::Error> {
  tracing::info!(
    "Gateway starting with endpoint freshness of {} second(s)",
    app_state.discovery.cache().freshness().num_seconds()
  );

  let app = create_router().with_state(app_state);
  let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

  tracing::info!("Gateway running on port {}", port);
  axum::serve(listener, app).await?;

  Ok(())
}
