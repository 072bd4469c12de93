//! # Evaluator Module
//!
//! Scenario repositories, the evaluator that matches graph changes against
//! them, and the executor that publishes the resulting actions.

pub mod actions;
pub mod scenario;
pub mod scenario_evaluator;

pub use actions::{ActionExecutor, ActionInfo};
pub use scenario::{
    belongs_to_template, scenario_id, ActionSpec, ActionType, Scenario, ScenarioDefinition,
    ScenarioRepository,
};
pub use scenario_evaluator::ScenarioEvaluator;
