//! # Scenario Evaluator
//!
//! Matches graph changes against the enabled scenarios of a repository and
//! executes the resulting actions. Disabled evaluators ignore changes until
//! they are enabled directly or through a full pass.

use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};

use super::actions::{ActionExecutor, ActionInfo};
use super::scenario::{Scenario, ScenarioRepository};
use crate::graph::{EntityGraph, GraphElement};
use crate::messaging::ActionMode;

#[derive(Debug)]
pub struct ScenarioEvaluator {
    enabled: bool,
    repository: ScenarioRepository,
    executor: ActionExecutor,
}

impl ScenarioEvaluator {
    pub fn new(repository: ScenarioRepository, executor: ActionExecutor) -> Self {
        Self {
            enabled: false,
            repository,
            executor,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn repository(&self) -> &ScenarioRepository {
        &self.repository
    }

    pub fn set_repository(&mut self, repository: ScenarioRepository) {
        self.repository = repository;
    }

    /// Swap in `repository`, returning the one it replaces
    pub fn replace_repository(&mut self, repository: ScenarioRepository) -> ScenarioRepository {
        std::mem::replace(&mut self.repository, repository)
    }

    /// Enable evaluation and run every vertex of `graph` through it
    ///
    /// In `Do` mode each vertex is treated as newly created, in `Undo` mode as
    /// just removed. Returns the number of actions executed.
    pub fn run_evaluator(&mut self, graph: &EntityGraph, mode: ActionMode) -> usize {
        self.enabled = true;
        let started = Instant::now();
        let vertices: Vec<GraphElement> = graph.vertices().cloned().map(Into::into).collect();

        let mut executed = 0;
        for vertex in vertices {
            executed += match mode {
                ActionMode::Do => self.process_event(None, Some(&vertex), true),
                ActionMode::Undo => self.process_event(Some(&vertex), None, true),
            };
        }

        info!(
            mode = %mode,
            vertices = graph.num_vertices(),
            actions = executed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "🧮 EVALUATOR: Full evaluation pass completed"
        );
        executed
    }

    /// Evaluate one graph change; returns the number of actions executed
    ///
    /// Scenarios matching both `before` and `current` are unchanged by the
    /// event and are skipped. The rest produce `Undo` actions for `before` and
    /// `Do` actions for `current`.
    pub fn process_event(
        &self,
        before: Option<&GraphElement>,
        current: Option<&GraphElement>,
        is_vertex: bool,
    ) -> usize {
        if !self.enabled {
            return 0;
        }

        let before_scenarios = self.element_scenarios(before, is_vertex);
        let current_scenarios = self.element_scenarios(current, is_vertex);
        let overlap: HashSet<&str> = before_scenarios
            .iter()
            .filter(|scenario| current_scenarios.iter().any(|c| c.id() == scenario.id()))
            .map(|scenario| scenario.id())
            .collect();

        let mut actions = Vec::new();
        if let Some(element) = before {
            collect_actions(&mut actions, element, &before_scenarios, &overlap, ActionMode::Undo);
        }
        if let Some(element) = current {
            collect_actions(&mut actions, element, &current_scenarios, &overlap, ActionMode::Do);
        }

        if actions.is_empty() {
            return 0;
        }
        debug!(actions = actions.len(), "Scenario actions triggered");
        self.executor.execute(&dedup_actions(actions))
    }

    fn element_scenarios(&self, element: Option<&GraphElement>, is_vertex: bool) -> Vec<&Scenario> {
        match element {
            None => Vec::new(),
            Some(element) if element.is_deleted() => Vec::new(),
            Some(GraphElement::Vertex(vertex)) if is_vertex => {
                self.repository.scenarios_for_vertex(vertex)
            }
            Some(GraphElement::Edge(edge)) if !is_vertex => self.repository.scenarios_for_edge(edge),
            Some(_) => Vec::new(),
        }
    }
}

fn target_id(element: &GraphElement) -> String {
    match element {
        GraphElement::Vertex(vertex) => vertex.vertex_id.clone(),
        GraphElement::Edge(edge) => edge.key().to_string(),
    }
}

fn collect_actions(
    actions: &mut Vec<ActionInfo>,
    element: &GraphElement,
    scenarios: &[&Scenario],
    overlap: &HashSet<&str>,
    mode: ActionMode,
) {
    let target = target_id(element);
    for scenario in scenarios.iter().filter(|s| !overlap.contains(s.id())) {
        for action in &scenario.definition.actions {
            actions.push(ActionInfo {
                scenario_id: scenario.id().to_string(),
                action: action.clone(),
                mode,
                target_id: target.clone(),
            });
        }
    }
}

/// Keep the first occurrence of each (scenario, action, target, mode)
fn dedup_actions(actions: Vec<ActionInfo>) -> Vec<ActionInfo> {
    let mut seen = HashSet::new();
    actions
        .into_iter()
        .filter(|action| {
            seen.insert((
                action.scenario_id.clone(),
                action.action.action_type,
                action.target_id.clone(),
                action.mode,
            ))
        })
        .collect()
}
