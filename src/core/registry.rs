//! Capability registry: which agents exist and what they can do.
//!
//! Pure lookup table. Profiles are immutable once registered; re-registering
//! an id replaces the profile wholesale.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Enum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl Parameter {
    fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            options: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub intent: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub role: String,
    pub description: String,
    pub capabilities: Vec<Capability>,
}

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentProfile>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Registry preloaded with the built-in agents.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for agent in builtin_agents() {
            registry.register(agent);
        }
        registry
    }

    pub fn register(&self, agent: AgentProfile) {
        info!("Registered agent: {}", agent.name);
        self.agents
            .write()
            .expect("agent registry")
            .insert(agent.id.clone(), agent);
    }

    pub fn get(&self, id: &str) -> Option<AgentProfile> {
        self.agents.read().expect("agent registry").get(id).cloned()
    }

    pub fn list(&self) -> Vec<AgentProfile> {
        let mut agents: Vec<AgentProfile> = self
            .agents
            .read()
            .expect("agent registry")
            .values()
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn builtin_agents() -> Vec<AgentProfile> {
    vec![
        AgentProfile {
            id: "data_engineer".to_string(),
            name: "Data Engineer".to_string(),
            role: "Data Engineering".to_string(),
            description: "Cleans, transforms, and ingests data.".to_string(),
            capabilities: vec![
                Capability {
                    intent: "run_sql".to_string(),
                    description: "Execute raw SQL".to_string(),
                    parameters: vec![Parameter::required("query", ParamType::String, "SQL query")],
                },
                Capability {
                    intent: "ingest_file".to_string(),
                    description: "Load file into table".to_string(),
                    parameters: vec![
                        Parameter::required("path", ParamType::String, "File path"),
                        Parameter::required("tableName", ParamType::String, "Target table name"),
                    ],
                },
                Capability {
                    intent: "clean_data".to_string(),
                    description: "Clean nulls/duplicates".to_string(),
                    parameters: vec![Parameter::required(
                        "tableName",
                        ParamType::String,
                        "Table name",
                    )],
                },
                Capability {
                    intent: "get_schema".to_string(),
                    description: "Get table schema".to_string(),
                    parameters: vec![Parameter::required("table", ParamType::String, "Table name")],
                },
            ],
        },
        AgentProfile {
            id: "schema_agent".to_string(),
            name: "Schema Detective".to_string(),
            role: "Metadata Analyst".to_string(),
            description: "Analyzes file structure and types.".to_string(),
            capabilities: vec![Capability {
                intent: "detect_schema".to_string(),
                description: "Infer schema from CSV".to_string(),
                parameters: vec![Parameter::required("path", ParamType::String, "File path")],
            }],
        },
        AgentProfile {
            id: "analyst".to_string(),
            name: "Data Analyst".to_string(),
            role: "Financial Analyst".to_string(),
            description: "Generates insights and answers questions.".to_string(),
            capabilities: vec![
                Capability {
                    intent: "calculate_metric".to_string(),
                    description: "Calculate a specific business metric".to_string(),
                    parameters: vec![Parameter::required(
                        "metricId",
                        ParamType::String,
                        "ID of the metric",
                    )],
                },
                Capability {
                    intent: "analyze_trend".to_string(),
                    description: "Analyze trends over time and generate charts".to_string(),
                    parameters: vec![Parameter::required(
                        "metricId",
                        ParamType::String,
                        "Metric to analyze",
                    )],
                },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_bootstrapped() {
        let registry = AgentRegistry::with_builtins();
        assert_eq!(registry.list().len(), 3);

        let engineer = registry.get("data_engineer").unwrap();
        let intents: Vec<&str> = engineer
            .capabilities
            .iter()
            .map(|c| c.intent.as_str())
            .collect();
        assert_eq!(intents, vec!["run_sql", "ingest_file", "clean_data", "get_schema"]);

        assert!(registry.get("schema_agent").is_some());
        assert!(registry.get("analyst").is_some());
    }

    #[test]
    fn unknown_agent_is_none() {
        let registry = AgentRegistry::with_builtins();
        assert!(registry.get("ghost").is_none());
    }

    #[test]
    fn register_replaces_by_id() {
        let registry = AgentRegistry::with_builtins();
        registry.register(AgentProfile {
            id: "analyst".to_string(),
            name: "Analyst v2".to_string(),
            role: "Analyst".to_string(),
            description: String::new(),
            capabilities: vec![],
        });
        assert_eq!(registry.list().len(), 3);
        assert_eq!(registry.get("analyst").unwrap().name, "Analyst v2");
    }

    #[test]
    fn list_is_sorted_by_id() {
        let registry = AgentRegistry::with_builtins();
        let ids: Vec<String> = registry.list().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["analyst", "data_engineer", "schema_agent"]);
    }
}
