#![allow(dead_code)]

use std::sync::Arc;

use webhook_processor::config::{Config, StoreBackend};
use webhook_processor::outbound::store::InMemoryDeliveryStore;
use webhook_processor::outbound::webhook::{BatchRunner, WebhookHttpClient};
use webhook_processor::server::Server;

fn test_config() -> Config {
    let mut config = Config::load_with_sources(Some(Default::default())).unwrap();
    config.server.host = "localhost".to_string();
    config.server.port = 0;
    config.store.backend = StoreBackend::Memory;
    config
}

async fn start(server: Server, host: &str) -> String {
    let port = server.port().unwrap();
    tokio::spawn(server.run());

    format!("http://{}:{}", host, port)
}

/// Server built from configuration, backed by an empty in-memory store
pub async fn spawn_server() -> String {
    let config = test_config();
    let server = Server::new(&config).await.unwrap();
    start(server, &config.server.host).await
}

/// Server using the REST store without credentials
pub async fn spawn_unconfigured_server() -> String {
    let mut config = test_config();
    config.store.backend = StoreBackend::Rest;
    config.store.base_url = None;

    let server = Server::new(&config).await.unwrap();
    start(server, &config.server.host).await
}

/// Server whose runner drains the given store through a real HTTP client
pub async fn spawn_server_with_store(store: InMemoryDeliveryStore) -> String {
    let config = test_config();
    let transport = WebhookHttpClient::new().unwrap();
    let runner = BatchRunner::from_config(&config.delivery, Arc::new(store), Arc::new(transport));

    let server = Server::with_runner(&config, runner).await.unwrap();
    start(server, &config.server.host).await
}
