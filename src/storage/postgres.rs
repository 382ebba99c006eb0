use anyhow::{Result, Context};
use async_trait::async_trait;
use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use tracing::debug;

use crate::cli::config::StorageSettings;
use crate::crawler::task::DomainListing;
use crate::enrichment::record::MetricsRecord;
use crate::storage::sink::{ListingSink, MetricsSink};

const CREATE_DOMAIN_NAMES: &str = "CREATE TABLE IF NOT EXISTS domain_names (
    id BIGSERIAL PRIMARY KEY,
    domain VARCHAR(255) NOT NULL,
    page INTEGER NOT NULL,
    scraped_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const CREATE_PAGE_DATA: &str = "CREATE TABLE IF NOT EXISTS page_data (
    id BIGSERIAL PRIMARY KEY,
    page VARCHAR(255) NOT NULL,
    subdomain VARCHAR(255) NOT NULL,
    root_domain VARCHAR(255) NOT NULL,
    last_crawled VARCHAR(100),
    http_code INTEGER,
    pages_to_page BIGINT,
    nofollow_pages_to_page BIGINT,
    redirect_pages_to_page BIGINT,
    external_pages_to_page BIGINT,
    spam_score INTEGER,
    page_authority INTEGER,
    domain_authority INTEGER,
    link_propensity DOUBLE PRECISION,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const INSERT_DOMAIN_NAME: &str = "INSERT INTO domain_names (domain, page) VALUES ($1, $2)";

const INSERT_PAGE_DATA: &str = "INSERT INTO page_data (
    page, subdomain, root_domain, last_crawled, http_code,
    pages_to_page, nofollow_pages_to_page, redirect_pages_to_page, external_pages_to_page,
    spam_score, page_authority, domain_authority, link_propensity
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)";

/// PostgreSQL store for scraped listings and metrics records
pub struct PostgresStore {
    /// PostgreSQL connection pool
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect and make sure both tables exist
    pub async fn connect(settings: &StorageSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let store = Self { pool };
        store.ensure_schema().await?;

        debug!("Connected to PostgreSQL database");

        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in [CREATE_DOMAIN_NAMES, CREATE_PAGE_DATA] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create table")?;
        }

        debug!("Ensured tables domain_names and page_data exist");

        Ok(())
    }
}

#[async_trait]
impl ListingSink for PostgresStore {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn append_listings(&self, listings: &[DomainListing]) -> Result<()> {
        let mut tx = self.pool.begin().await
            .context("Failed to start transaction")?;

        for listing in listings {
            sqlx::query(INSERT_DOMAIN_NAME)
                .bind(&listing.domain)
                .bind(listing.page as i32)
                .execute(&mut *tx)
                .await
                .context(format!("Failed to insert domain {}", listing.domain))?;
        }

        tx.commit().await
            .context("Failed to commit domain names")?;

        debug!("Stored {} domain names", listings.len());

        Ok(())
    }
}

#[async_trait]
impl MetricsSink for PostgresStore {
    async fn append_metrics(&self, records: &[MetricsRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await
            .context("Failed to start transaction")?;

        for record in records {
            sqlx::query(INSERT_PAGE_DATA)
                .bind(&record.page)
                .bind(&record.subdomain)
                .bind(&record.root_domain)
                .bind(&record.last_crawled)
                .bind(record.http_code)
                .bind(record.pages_to_page)
                .bind(record.nofollow_pages_to_page)
                .bind(record.redirect_pages_to_page)
                .bind(record.external_pages_to_page)
                .bind(record.spam_score)
                .bind(record.page_authority)
                .bind(record.domain_authority)
                .bind(record.link_propensity)
                .execute(&mut *tx)
                .await
                .context(format!("Failed to insert metrics for {}", record.page))?;
        }

        // Dropping an uncommitted transaction rolls the whole chunk back
        tx.commit().await
            .context("Failed to commit metrics records")?;

        debug!("Stored {} metrics records", records.len());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> PostgresStore {
        let settings = StorageSettings {
            connection_string: std::env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set for integration tests"),
            max_connections: 2,
        };
        PostgresStore::connect(&settings).await.unwrap()
    }

    fn record(page: &str) -> MetricsRecord {
        serde_json::from_value(json!({ "page": page, "root_domain": "example.ca", "domain_authority": 12 })).unwrap()
    }

    async fn count(store: &PostgresStore, sql: &str, key: &str) -> i64 {
        sqlx::query_scalar(sql).bind(key).fetch_one(&store.pool).await.unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL
    async fn test_metrics_chunk_is_all_or_none() {
        let store = store().await;
        let marker = format!("run-{}.ca/", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());

        // The second record overflows VARCHAR(255), so the first must not survive
        let chunk = vec![record(&marker), record(&"x".repeat(300))];
        assert!(store.append_metrics(&chunk).await.is_err());
        assert_eq!(count(&store, "SELECT COUNT(*) FROM page_data WHERE page = $1", &marker).await, 0);

        store.append_metrics(&[record(&marker)]).await.unwrap();
        assert_eq!(count(&store, "SELECT COUNT(*) FROM page_data WHERE page = $1", &marker).await, 1);
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL
    async fn test_listings_append_on_every_run() {
        let store = store().await;
        let domain = format!("dup-{}.ca", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
        let batch = vec![DomainListing { domain: domain.clone(), page: 1 }];

        store.append_listings(&batch).await.unwrap();
        store.append_listings(&batch).await.unwrap();

        assert_eq!(count(&store, "SELECT COUNT(*) FROM domain_names WHERE domain = $1", &domain).await, 2);
    }
}
