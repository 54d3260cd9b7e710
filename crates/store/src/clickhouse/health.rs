//! ClickHouse health checks and schema bootstrap.

use engine_core::Result;
use tracing::{debug, error, info};

use super::client::ClickHouseClient;
use super::{schema, store_error};

/// Returns whether ClickHouse answers a trivial query.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!(error = %e, "ClickHouse health check failed");
            false
        }
    }
}

/// Creates the database and every table if missing.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    let database = &client.config().database;
    client
        .server()
        .query(&schema::create_database(database))
        .execute()
        .await
        .map_err(store_error("create database"))?;

    for ddl in schema::all_tables() {
        client
            .inner()
            .query(ddl)
            .execute()
            .await
            .map_err(store_error("create table"))?;
    }

    info!(database = %database, "ClickHouse schema initialized");
    Ok(())
}
