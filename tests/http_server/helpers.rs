use std::{net::SocketAddr, sync::Arc};

use reqwest::Client;
use tokio::task;
use tokio_util::sync::CancellationToken;
use vigil::{
    config::RhaiConfig,
    engine::rhai::HostServices,
    http_server,
    kv::KvStore,
    runner::RhaiRunner,
    scripts::{Script, ScriptRegistry},
};

pub struct TestServer {
    pub address: SocketAddr,
    pub server_handle: task::JoinHandle<()>,
    pub client: Client,
    pub kv: Arc<KvStore>,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Serves the given `(name, body)` scripts through a real runner.
    pub async fn with_scripts(scripts: &[(&str, &str)]) -> Self {
        let registry = ScriptRegistry::from_scripts(
            scripts
                .iter()
                .map(|(name, body)| Script::parse(*name, *body).expect("Failed to parse script")),
        );
        let kv = Arc::new(KvStore::new());
        let services = HostServices { kv: Arc::clone(&kv), ..Default::default() };
        let runner = Arc::new(RhaiRunner::new(Arc::new(registry), RhaiConfig::default(), services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let address = listener.local_addr().expect("Failed to get address");
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        let server_handle = task::spawn(async move {
            http_server::serve(listener, runner, token).await.expect("Server failed");
        });

        Self { address, server_handle, client: Client::new(), kv, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.expect("Failed to send request")
    }

    pub async fn post(&self, path: &str, body: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Stops the server gracefully and waits for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.server_handle.await.expect("Server task panicked");
    }
}
