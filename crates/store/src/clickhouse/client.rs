//! ClickHouse client wrapper.

use ::clickhouse::Client;
use tracing::info;

use super::config::ClickHouseConfig;

/// Shared handle to the ClickHouse HTTP interface. Cloning is cheap.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    pub fn new(config: ClickHouseConfig) -> Self {
        let client = Self::base(&config).with_database(&config.database);

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Self {
            inner: client,
            config,
        }
    }

    /// Client bound to the configured database.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Client without a database, for statements that create it.
    pub(crate) fn server(&self) -> Client {
        Self::base(&self.config)
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    fn base(config: &ClickHouseConfig) -> Client {
        let mut client = Client::default().with_url(&config.url);
        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }
        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }
        client
    }
}
