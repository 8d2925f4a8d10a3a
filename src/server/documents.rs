use std::{collections::HashMap, fs, path::Path};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation::report::BasicMetrics;

/// A site owner whose analytics the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: String,
    pub client_name: String,
    pub website_domain: String,
    #[serde(default, alias = "googleAnalyticsPropertyId")]
    pub analytics_property_id: Option<String>,
}

/// Fields accepted when registering a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub client_name: String,
    pub website_domain: String,
    #[serde(default, alias = "googleAnalyticsPropertyId")]
    pub analytics_property_id: Option<String>,
}

/// Pre-aggregated metrics for one client and day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRow {
    pub client_id: String,
    pub website_domain: String,
    pub page_views: u64,
    pub unique_visitors: u64,
    pub session_duration: f64,
    pub bounce_rate: f64,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

impl SnapshotRow {
    pub fn new(
        client_id: &str,
        website_domain: &str,
        metrics: &BasicMetrics,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            website_domain: website_domain.to_string(),
            page_views: metrics.page_views,
            unique_visitors: metrics.unique_visitors,
            session_duration: metrics.session_duration,
            bounce_rate: metrics.bounce_rate,
            date: timestamp.date_naive(),
            timestamp,
        }
    }
}

/// Interface to the document database holding clients and historical
/// snapshots. The tracker never talks to it.
pub trait DocumentStore {
    type Error;

    fn get_client(&self, id: &str) -> Result<Option<ClientRecord>, Self::Error>;

    fn list_clients(&self) -> Result<Vec<ClientRecord>, Self::Error>;

    fn create_client(&mut self, client: NewClient) -> Result<ClientRecord, Self::Error>;

    fn add_snapshot(&mut self, row: SnapshotRow) -> Result<(), Self::Error>;

    /// Snapshots of one client, oldest first.
    fn snapshots_for(&self, client_id: &str) -> Result<Vec<SnapshotRow>, Self::Error>;
}

/// In-memory document store.
#[derive(Debug, Default)]
pub struct HashMapDocumentStore {
    clients: HashMap<String, ClientRecord>,
    snapshots: Vec<SnapshotRow>,
    next_id: u64,
    reject_snapshots: bool,
}

impl HashMapDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose snapshot writes always fail.
    pub fn rejecting_snapshots(mut self) -> Self {
        self.reject_snapshots = true;
        self
    }

    pub fn insert_client(&mut self, client: ClientRecord) {
        self.clients.insert(client.id.clone(), client);
    }

    /// Seeds the store from a JSON array of client records.
    pub fn load_clients_file(&mut self, path: &Path) -> Result<usize, anyhow::Error> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let clients: Vec<ClientRecord> = serde_json::from_str(&contents)
            .with_context(|| format!("malformed clients file {}", path.display()))?;
        let count = clients.len();
        for client in clients {
            self.insert_client(client);
        }
        Ok(count)
    }
}

impl DocumentStore for HashMapDocumentStore {
    type Error = anyhow::Error;

    fn get_client(&self, id: &str) -> Result<Option<ClientRecord>, Self::Error> {
        Ok(self.clients.get(id).cloned())
    }

    fn list_clients(&self) -> Result<Vec<ClientRecord>, Self::Error> {
        let mut clients: Vec<_> = self.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.client_name.cmp(&b.client_name));
        Ok(clients)
    }

    fn create_client(&mut self, client: NewClient) -> Result<ClientRecord, Self::Error> {
        if client.client_name.trim().is_empty() {
            anyhow::bail!("client name is required");
        }
        // Skip ids taken by seeded records.
        let id = loop {
            self.next_id += 1;
            let id = format!("client_{}", self.next_id);
            if !self.clients.contains_key(&id) {
                break id;
            }
        };
        let record = ClientRecord {
            id,
            client_name: client.client_name,
            website_domain: client.website_domain,
            analytics_property_id: client
                .analytics_property_id
                .filter(|id| !id.trim().is_empty()),
        };
        self.insert_client(record.clone());
        Ok(record)
    }

    fn add_snapshot(&mut self, row: SnapshotRow) -> Result<(), Self::Error> {
        if self.reject_snapshots {
            anyhow::bail!("snapshot collection is read-only");
        }
        self.snapshots.push(row);
        Ok(())
    }

    fn snapshots_for(&self, client_id: &str) -> Result<Vec<SnapshotRow>, Self::Error> {
        Ok(self
            .snapshots
            .iter()
            .filter(|row| row.client_id == client_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_and_snapshots() {
        let mut store = HashMapDocumentStore::new();
        store.insert_client(ClientRecord {
            id: "client_1".to_string(),
            client_name: "Seeded".to_string(),
            website_domain: "seeded.com".to_string(),
            analytics_property_id: None,
        });

        let created = store
            .create_client(NewClient {
                client_name: "Acme".to_string(),
                website_domain: "acme.com".to_string(),
                analytics_property_id: Some("acme.com".to_string()),
            })
            .unwrap();
        assert_eq!(created.id, "client_2");
        assert_eq!(store.list_clients().unwrap().len(), 2);
        assert_eq!(store.get_client("client_2").unwrap(), Some(created));

        let row = SnapshotRow::new(
            "client_2",
            "acme.com",
            &BasicMetrics::default(),
            Utc::now(),
        );
        store.add_snapshot(row.clone()).unwrap();
        assert_eq!(store.snapshots_for("client_2").unwrap(), vec![row.clone()]);
        assert!(store.snapshots_for("client_1").unwrap().is_empty());

        let mut read_only = HashMapDocumentStore::new().rejecting_snapshots();
        assert!(read_only.add_snapshot(row).is_err());
    }

    #[test]
    fn test_client_record_accepts_legacy_property_field() {
        let record: ClientRecord = serde_json::from_str(
            r#"{"id": "c", "clientName": "C", "websiteDomain": "c.io",
                "googleAnalyticsPropertyId": "c.io"}"#,
        )
        .unwrap();
        assert_eq!(record.analytics_property_id.as_deref(), Some("c.io"));
    }
}
