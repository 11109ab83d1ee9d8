//! Row source for the catalog join.
//!
//! [`MySqlCatalog`] opens one connection per call and closes it before
//! returning, whether or not the query succeeded.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::CatalogRow;
use crate::config::DatabaseConfig;

const CATALOG_QUERY: &str = r#"
    SELECT
        c.name AS customer_name,
        p.name AS part_name,
        pr.name AS revision_name,
        pr.uuid AS revision_uuid,
        pr.geometry_file_uuid AS cad_file_uuid,
        cadf.type AS cad_file_type,
        cadf.location AS cad_file_location,
        t.uuid AS trial_uuid,
        pru.type AS process_run_type,
        f.uuid AS file_uuid,
        f.type AS file_type,
        f.location AS file_location
    FROM customer c
    JOIN part p ON c.uuid = p.customer_uuid
    JOIN part_revision pr ON p.uuid = pr.part_uuid
    LEFT JOIN file cadf ON pr.geometry_file_uuid = cadf.uuid
    LEFT JOIN trial t ON pr.uuid = t.part_revision_uuid
    LEFT JOIN process_run pru ON t.uuid = pru.trial_uuid
    LEFT JOIN process_run_file_artifact prfa ON pru.uuid = prfa.process_run_uuid
    LEFT JOIN file f ON prfa.file_artifact_uuid = f.uuid
    ORDER BY c.name, p.name, pr.name, t.uuid, pru.type, f.uuid
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Connect(#[source] sqlx::Error),
    #[error("{0}")]
    Query(#[source] sqlx::Error),
}

/// Anything that can produce the ordered catalog rows.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<CatalogRow>, StoreError>;
}

/// MySQL-backed catalog source.
#[derive(Debug, Clone)]
pub struct MySqlCatalog {
    options: MySqlConnectOptions,
}

impl MySqlCatalog {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        Self { options }
    }
}

#[async_trait]
impl CatalogSource for MySqlCatalog {
    async fn fetch_rows(&self) -> Result<Vec<CatalogRow>, StoreError> {
        let mut conn: MySqlConnection =
            self.options.connect().await.map_err(StoreError::Connect)?;

        let result = sqlx::query_as::<_, CatalogRow>(CATALOG_QUERY)
            .fetch_all(&mut conn)
            .await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close catalog connection cleanly: {}", e);
        }

        let rows = result.map_err(StoreError::Query)?;
        debug!("Catalog query returned {} rows", rows.len());
        Ok(rows)
    }
}
