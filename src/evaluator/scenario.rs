//! # Scenarios and the Scenario Repository
//!
//! A scenario is the loaded, evaluatable form of one rule from a template. A
//! [`ScenarioRepository`] holds the scenarios one evaluator worker is
//! responsible for: a shard of every active standard template for normal
//! operation, or every scenario unsharded for a one-off template action.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::graph::{Edge, Vertex};
use crate::storage::{TemplateRecord, TemplateStatus};

/// Property key matched against an edge's label
pub const EDGE_LABEL_KEY: &str = "relationship_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RaiseAlarm,
    SetState,
    AddCausalRelationship,
    MarkDown,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::RaiseAlarm => "raise_alarm",
            ActionType::SetState => "set_state",
            ActionType::AddCausalRelationship => "add_causal_relationship",
            ActionType::MarkDown => "mark_down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub action_type: ActionType,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl ActionSpec {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Persisted definition of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    /// `"{template_name}-scenario{n}"`
    pub id: String,
    /// Property values an element must carry for the scenario to match
    pub condition: HashMap<String, Value>,
    pub actions: Vec<ActionSpec>,
}

impl ScenarioDefinition {
    pub fn new(template_name: &str, index: usize) -> Self {
        Self {
            id: scenario_id(template_name, index),
            condition: HashMap::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition.insert(key.into(), value.into());
        self
    }

    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.actions.push(action);
        self
    }

    /// Every condition property equals the vertex's property
    ///
    /// An empty condition matches nothing.
    pub fn matches_vertex(&self, vertex: &Vertex) -> bool {
        !self.condition.is_empty()
            && self
                .condition
                .iter()
                .all(|(key, expected)| vertex.get(key) == Some(expected))
    }

    pub fn matches_edge(&self, edge: &Edge) -> bool {
        !self.condition.is_empty()
            && self.condition.iter().all(|(key, expected)| {
                if key == EDGE_LABEL_KEY {
                    expected.as_str() == Some(edge.label.as_str())
                } else {
                    edge.properties.get(key) == Some(expected)
                }
            })
    }
}

pub fn scenario_id(template_name: &str, index: usize) -> String {
    format!("{template_name}-scenario{index}")
}

/// Scenario `id` was generated by [`scenario_id`] for `template_name`
pub fn belongs_to_template(id: &str, template_name: &str) -> bool {
    id.strip_prefix(template_name)
        .and_then(|rest| rest.strip_prefix("-scenario"))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

/// A scenario loaded into a repository
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub definition: ScenarioDefinition,
    pub template_name: String,
    pub enabled: bool,
}

impl Scenario {
    pub fn id(&self) -> &str {
        &self.definition.id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioRepository {
    scenarios: Vec<Scenario>,
}

impl ScenarioRepository {
    /// The shard of active standard scenarios owned by `worker_index`
    ///
    /// Scenarios are numbered in template order (creation time, then name)
    /// and scenario `i` belongs to worker `i % workers_num`.
    pub fn sharded(templates: &[TemplateRecord], worker_index: usize, workers_num: usize) -> Self {
        let workers_num = workers_num.max(1);
        let scenarios = collect_scenarios(templates, &[TemplateStatus::Active])
            .enumerate()
            .filter(|(position, _)| position % workers_num == worker_index)
            .map(|(_, scenario)| scenario)
            .collect();
        Self { scenarios }
    }

    /// Every scenario of every standard template that is active or in a
    /// pending add or delete
    pub fn unsharded(templates: &[TemplateRecord]) -> Self {
        let scenarios = collect_scenarios(
            templates,
            &[
                TemplateStatus::Loading,
                TemplateStatus::Active,
                TemplateStatus::Deleting,
            ],
        )
        .collect();
        Self { scenarios }
    }

    pub fn from_scenarios(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Enable only the scenarios of the named templates
    pub fn enable_only_templates(&mut self, template_names: &[String]) {
        for scenario in &mut self.scenarios {
            scenario.enabled = template_names
                .iter()
                .any(|name| belongs_to_template(&scenario.definition.id, name));
        }
    }

    pub fn enabled_scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().filter(|scenario| scenario.enabled)
    }

    pub fn enabled_ids(&self) -> Vec<&str> {
        self.enabled_scenarios().map(Scenario::id).collect()
    }

    pub fn scenarios_for_vertex(&self, vertex: &Vertex) -> Vec<&Scenario> {
        self.enabled_scenarios()
            .filter(|scenario| scenario.definition.matches_vertex(vertex))
            .collect()
    }

    pub fn scenarios_for_edge(&self, edge: &Edge) -> Vec<&Scenario> {
        self.enabled_scenarios()
            .filter(|scenario| scenario.definition.matches_edge(edge))
            .collect()
    }
}

fn collect_scenarios<'a>(
    templates: &'a [TemplateRecord],
    statuses: &'a [TemplateStatus],
) -> impl Iterator<Item = Scenario> + 'a {
    let mut ordered: Vec<&TemplateRecord> = templates
        .iter()
        .filter(|template| template.is_standard() && statuses.contains(&template.status))
        .collect();
    ordered.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });

    ordered.into_iter().flat_map(|template| {
        template.scenarios.iter().map(move |definition| Scenario {
            definition: definition.clone(),
            template_name: template.name.clone(),
            enabled: true,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::properties;
    use crate::storage::TemplateType;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn template(name: &str, status: TemplateStatus, scenarios: usize) -> TemplateRecord {
        let definitions = (0..scenarios)
            .map(|n| ScenarioDefinition::new(name, n).with_condition(properties::TYPE, "host"))
            .collect();
        TemplateRecord::new(name, status, definitions)
    }

    #[test]
    fn test_vertex_matching() {
        let scenario = ScenarioDefinition::new("tpl1", 0)
            .with_condition(properties::TYPE, "host")
            .with_condition(properties::STATE, "down");

        let matching = Vertex::new("h1")
            .with_property(properties::TYPE, "host")
            .with_property(properties::STATE, "down");
        let other = Vertex::new("h2").with_property(properties::TYPE, "host");

        assert!(scenario.matches_vertex(&matching));
        assert!(!scenario.matches_vertex(&other));
        assert!(!ScenarioDefinition::new("tpl1", 1).matches_vertex(&matching));
    }

    #[test]
    fn test_edge_matching_uses_label() {
        let scenario = ScenarioDefinition::new("tpl1", 0).with_condition(EDGE_LABEL_KEY, "on");
        assert!(scenario.matches_edge(&Edge::new("a", "b", "on")));
        assert!(!scenario.matches_edge(&Edge::new("a", "b", "contains")));
    }

    #[test]
    fn test_only_active_standard_templates_are_sharded() {
        let templates = vec![
            template("tpl1", TemplateStatus::Active, 2),
            template("tpl2", TemplateStatus::Loading, 2),
            template("tpl3", TemplateStatus::Active, 1).with_type(TemplateType::Equivalence),
            template("tpl4", TemplateStatus::Deleting, 1),
            template("tpl5", TemplateStatus::Deleted, 1),
        ];
        let repository = ScenarioRepository::sharded(&templates, 0, 1);
        assert_eq!(repository.enabled_ids(), vec!["tpl1-scenario0", "tpl1-scenario1"]);

        let unsharded = ScenarioRepository::unsharded(&templates);
        assert_eq!(unsharded.len(), 5);
    }

    #[test]
    fn test_enable_only_templates() {
        let templates = vec![
            template("tpl1", TemplateStatus::Active, 1),
            template("tpl2", TemplateStatus::Loading, 2),
        ];
        let mut repository = ScenarioRepository::unsharded(&templates);
        repository.enable_only_templates(&["tpl2".to_string()]);

        assert_eq!(
            repository.enabled_ids(),
            vec!["tpl2-scenario0", "tpl2-scenario1"]
        );
    }

    #[test]
    fn test_template_name_prefix_does_not_enable_other_templates() {
        let templates = vec![
            template("tpl1", TemplateStatus::Loading, 1),
            template("tpl10", TemplateStatus::Loading, 1),
            template("tpl1-scenario", TemplateStatus::Loading, 1),
        ];
        let mut repository = ScenarioRepository::unsharded(&templates);
        repository.enable_only_templates(&["tpl1".to_string()]);

        assert_eq!(repository.enabled_ids(), vec!["tpl1-scenario0"]);
        assert!(belongs_to_template("tpl1-scenario12", "tpl1"));
        assert!(!belongs_to_template("tpl1-scenario", "tpl1"));
        assert!(!belongs_to_template("tpl1-scenario-scenario0", "tpl1"));
    }

    proptest! {
        #[test]
        fn prop_shards_are_complete_and_disjoint(
            sizes in proptest::collection::vec(0usize..6, 1..6),
            workers_num in 1usize..6,
        ) {
            let templates: Vec<TemplateRecord> = sizes
                .iter()
                .enumerate()
                .map(|(i, size)| template(&format!("tpl{i}"), TemplateStatus::Active, *size))
                .collect();
            let full = ScenarioRepository::unsharded(&templates);

            let mut seen = HashSet::new();
            let mut total = 0;
            for worker_index in 0..workers_num {
                let shard = ScenarioRepository::sharded(&templates, worker_index, workers_num);
                for scenario in shard.scenarios() {
                    prop_assert!(seen.insert(scenario.id().to_string()));
                }
                total += shard.len();
            }

            prop_assert_eq!(total, full.len());
            let all: HashSet<String> = full.scenarios().iter().map(|s| s.id().to_string()).collect();
            prop_assert_eq!(seen, all);
        }
    }
}
