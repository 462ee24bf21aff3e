use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};

#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    manager: ConnectionManager,
}

impl RedisClient {
    pub async fn from_url(url: &str) -> RedisResult<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, manager })
    }

    /// Multiplexed connection for regular commands (PUBLISH etc.).
    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Raw client; pub/sub needs a dedicated connection, not the multiplexed one.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
