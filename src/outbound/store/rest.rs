use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::domain::models::{DeliveryStatus, DeliveryUpdate, PendingDelivery};
use crate::domain::ports::{DeliveryStore, StoreError};

/// Delivery store backed by a PostgREST-compatible API in front of the queue tables
#[derive(Debug, Clone)]
pub struct RestDeliveryStore {
    client: Client,

    /// `<base_url>/rest/v1`
    rest_url: String,

    service_key: String,

    deliveries_table: String,

    destinations_table: String,
}

impl RestDeliveryStore {
    /// Build the store from configuration; the base URL and service key are required.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StoreError::Configuration("store.base_url is not set".to_string()))?;

        let service_key = config
            .service_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StoreError::Configuration("store.service_key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StoreError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
            deliveries_table: config.deliveries_table.clone(),
            destinations_table: config.destinations_table.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Eligibility as a PostgREST logic tree: due pending records, or expired leases.
    fn eligibility_filter(now: &str) -> String {
        format!(
            "(and(status.eq.pending,or(next_retry_at.is.null,next_retry_at.lte.\"{now}\")),\
             and(status.eq.in_progress,next_retry_at.lte.\"{now}\"))"
        )
    }
}

#[async_trait]
impl DeliveryStore for RestDeliveryStore {
    async fn fetch_eligible(
        &self,
        limit: usize,
        now: OffsetDateTime,
    ) -> Result<Vec<PendingDelivery>, StoreError> {
        let now = format_timestamp(now)?;
        let select = format!("*,destination:{}(*)", self.destinations_table);

        let request = self
            .client
            .get(self.table_url(&self.deliveries_table))
            .query(&[
                ("select", select),
                ("or", Self::eligibility_filter(&now)),
                ("order", "created_at.asc".to_string()),
                ("limit", limit.to_string()),
            ]);

        let response = send(self.authorize(request)).await?;
        let deliveries: Vec<PendingDelivery> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        debug!(count = deliveries.len(), "Fetched eligible deliveries");
        Ok(deliveries)
    }

    async fn claim(
        &self,
        delivery: &PendingDelivery,
        lease_until: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let observed = &delivery.record;

        let mut filters = vec![
            ("id", format!("eq.{}", observed.id)),
            ("status", format!("eq.{}", observed.status.as_str())),
            ("attempt_count", format!("eq.{}", observed.attempt_count)),
        ];
        filters.push(match observed.next_retry_at {
            Some(at) => ("next_retry_at", format!("eq.{}", format_timestamp(at)?)),
            None => ("next_retry_at", "is.null".to_string()),
        });

        let body = serde_json::json!({
            "status": DeliveryStatus::InProgress,
            "next_retry_at": format_timestamp(lease_until)?,
        });

        let request = self
            .client
            .patch(self.table_url(&self.deliveries_table))
            .query(&filters)
            .header("Prefer", "return=representation")
            .json(&body);

        let response = send(self.authorize(request)).await?;
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(!rows.is_empty())
    }

    async fn update_status(
        &self,
        id: Uuid,
        lease_until: OffsetDateTime,
        update: &DeliveryUpdate,
    ) -> Result<(), StoreError> {
        let filters = [
            ("id", format!("eq.{id}")),
            ("status", format!("eq.{}", DeliveryStatus::InProgress.as_str())),
            ("next_retry_at", format!("eq.{}", format_timestamp(lease_until)?)),
        ];

        let request = self
            .client
            .patch(self.table_url(&self.deliveries_table))
            .query(&filters)
            .header("Prefer", "return=representation")
            .json(update);

        let response = send(self.authorize(request)).await?;
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if rows.is_empty() {
            return Err(StoreError::LeaseLost(id));
        }
        Ok(())
    }
}

fn format_timestamp(at: OffsetDateTime) -> Result<String, StoreError> {
    at.format(&Rfc3339)
        .map_err(|e| StoreError::Request(format!("Failed to format timestamp: {e}")))
}

async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}
