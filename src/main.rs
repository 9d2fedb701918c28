use machgate::init_logging;
use machgate_machine::{MachineManager, ManagerConfig, SerialTransport};
use machgate_settings::FileStore;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let store = Arc::new(FileStore::open_default()?);
    let manager = Arc::new(MachineManager::new(
        Arc::new(SerialTransport::new()),
        store,
        ManagerConfig::default(),
    ));
    manager.start()?;

    let addr: SocketAddr = std::env::var("MACHGATE_LISTEN")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "machgate up");

    machgate_server::serve(listener, manager).await?;
    Ok(())
}
