//! Named-SQL metric catalog (the semantic layer the analyst agent fronts).

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::core::engine::ComputeEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFormat {
    Currency,
    Percent,
    Number,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    pub name: String,
    pub description: String,
    /// The aggregate statement that produces this metric as a single scalar.
    pub sql: String,
    pub format: MetricFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_sql: Option<String>,
}

pub struct MetricCatalog {
    metrics: Vec<Metric>,
}

impl MetricCatalog {
    pub fn with_defaults() -> Self {
        let mut catalog = Self { metrics: Vec::new() };
        catalog.register(Metric {
            id: "total_revenue".to_string(),
            name: "Total Revenue".to_string(),
            description: "Sum of all sales orders".to_string(),
            sql: "SELECT SUM(TRY_CAST(sales AS DOUBLE)) FROM main".to_string(),
            format: MetricFormat::Currency,
            trend_sql: None,
        });
        catalog.register(Metric {
            id: "avg_satisfaction".to_string(),
            name: "Avg Satisfaction".to_string(),
            description: "Average customer score (1-10)".to_string(),
            sql: "SELECT AVG(TRY_CAST(satisfaction AS DOUBLE)) FROM main".to_string(),
            format: MetricFormat::Number,
            trend_sql: None,
        });
        catalog.register(Metric {
            id: "sales_volume".to_string(),
            name: "Total Volume".to_string(),
            description: "Total units sold globally".to_string(),
            sql: "SELECT SUM(TRY_CAST(units AS INTEGER)) FROM main".to_string(),
            format: MetricFormat::Number,
            trend_sql: None,
        });
        catalog
    }

    /// Add or replace a metric by id.
    pub fn register(&mut self, metric: Metric) {
        self.metrics.retain(|m| m.id != metric.id);
        self.metrics.push(metric);
    }

    pub fn get(&self, id: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.id == id)
    }

    pub fn list(&self) -> &[Metric] {
        &self.metrics
    }

    /// Run a metric's SQL and pull out the scalar. An unknown id is an
    /// error; an engine failure (typically: no data ingested yet) is logged
    /// and reported as no value.
    pub async fn calculate(&self, engine: &dyn ComputeEngine, id: &str) -> Result<Option<f64>> {
        let metric = self.get(id).ok_or_else(|| anyhow!("Metric '{id}' not found"))?;
        info!("Calculating metric [{}]", metric.name);

        match engine.query(&metric.sql).await {
            Ok(rows) => Ok(scalar_of(&rows)),
            Err(e) => {
                warn!("Failed to calculate metric {id}: {e}");
                Ok(None)
            }
        }
    }
}

fn scalar_of(rows: &[crate::core::engine::Row]) -> Option<f64> {
    let value = rows.first()?.values().next()?;
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::StubEngine;

    #[test]
    fn defaults_cover_the_known_metrics() {
        let catalog = MetricCatalog::with_defaults();
        for id in ["total_revenue", "avg_satisfaction", "sales_volume"] {
            assert!(catalog.get(id).is_some(), "missing {id}");
        }
        assert_eq!(catalog.list().len(), 3);
    }

    #[test]
    fn register_replaces_by_id() {
        let mut catalog = MetricCatalog::with_defaults();
        catalog.register(Metric {
            id: "total_revenue".to_string(),
            name: "Total Revenue v2".to_string(),
            description: String::new(),
            sql: "SELECT SUM(TRY_CAST(amount AS DOUBLE)) FROM main".to_string(),
            format: MetricFormat::Currency,
            trend_sql: None,
        });
        assert_eq!(catalog.list().len(), 3);
        assert_eq!(catalog.get("total_revenue").unwrap().name, "Total Revenue v2");
    }

    #[tokio::test]
    async fn unknown_metric_is_an_error() {
        let catalog = MetricCatalog::with_defaults();
        let engine = StubEngine::new();
        let err = catalog.calculate(&engine, "churn").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn engine_failure_yields_no_value() {
        let catalog = MetricCatalog::with_defaults();
        let engine = StubEngine::new(); // no `main` table ingested
        let value = catalog.calculate(&engine, "total_revenue").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn computes_scalar_over_ingested_data() {
        let catalog = MetricCatalog::with_defaults();
        let engine = StubEngine::new();
        engine
            .register_tabular_source("main.csv", "sales,units\n100,1\n250,2\n")
            .await
            .unwrap();
        engine
            .query("CREATE TABLE main AS SELECT * FROM read_csv_auto('main.csv')")
            .await
            .unwrap();

        let value = catalog.calculate(&engine, "total_revenue").await.unwrap();
        assert_eq!(value, Some(350.0));
    }
}
