//! Dependency graph over workflow steps.
//!
//! Wraps a [`Workflow`] in a validated DAG view: readiness queries,
//! per-phase slices, progress, and critical-path computation. Validation
//! (unknown dependencies, cycles) happens at construction time so every
//! later query can assume an acyclic graph.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use orchestry_types::error::GraphError;
use orchestry_types::workflow::{SdlcPhase, StepStatus, Workflow, WorkflowStep};

/// Result of a critical-path computation: step ids in start-to-end order
/// plus the summed estimated duration along that path.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalPath {
    pub steps: Vec<String>,
    pub total_duration: f64,
}

/// Validated DAG over a workflow's steps.
///
/// Owns the workflow for the duration of an execution; the trigger applies
/// all status transitions through this type so readiness bookkeeping stays
/// consistent.
#[derive(Debug)]
pub struct WorkflowGraph {
    workflow: Workflow,
}

impl WorkflowGraph {
    /// Build a graph, rejecting unknown dependencies and cycles.
    pub fn new(workflow: Workflow) -> Result<Self, GraphError> {
        Self::validate(&workflow)?;
        Ok(Self { workflow })
    }

    fn validate(workflow: &Workflow) -> Result<(), GraphError> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for step in &workflow.steps {
            let idx = graph.add_node(step.step_id.as_str());
            nodes.insert(step.step_id.as_str(), idx);
        }

        for step in &workflow.steps {
            let to = nodes[step.step_id.as_str()];
            for dep in &step.depends_on {
                let from = nodes.get(dep.as_str()).ok_or_else(|| {
                    GraphError::UnknownDependency {
                        step_id: step.step_id.clone(),
                        dependency: dep.clone(),
                    }
                })?;
                graph.add_edge(*from, to, ());
            }
        }

        toposort(&graph, None)
            .map_err(|cycle| GraphError::CycleDetected(graph[cycle.node_id()].to_string()))?;
        Ok(())
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow.workflow_id
    }

    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.workflow.step(step_id)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Steps that can run now: pending or ready, with every dependency
    /// completed. A step with a failed or skipped dependency is never
    /// returned here.
    pub fn ready_steps(&self) -> Vec<&WorkflowStep> {
        self.workflow
            .steps
            .iter()
            .filter(|step| {
                matches!(step.status, StepStatus::Pending | StepStatus::Ready)
                    && self.dependencies_satisfied(step)
            })
            .collect()
    }

    fn dependencies_satisfied(&self, step: &WorkflowStep) -> bool {
        step.depends_on.iter().all(|dep| {
            self.workflow
                .step(dep)
                .is_some_and(|d| d.status == StepStatus::Completed)
        })
    }

    pub fn steps_by_phase(&self, phase: SdlcPhase) -> Vec<&WorkflowStep> {
        self.workflow
            .steps
            .iter()
            .filter(|step| step.phase == phase)
            .collect()
    }

    /// Completed steps over total steps, as a percentage. `0.0` for an
    /// empty workflow.
    pub fn progress_pct(&self) -> f64 {
        if self.workflow.steps.is_empty() {
            return 0.0;
        }
        let completed = self
            .workflow
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        completed as f64 / self.workflow.steps.len() as f64 * 100.0
    }

    pub fn completed_step_ids(&self) -> Vec<String> {
        self.workflow
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.step_id.clone())
            .collect()
    }

    pub fn failed_step_ids(&self) -> Vec<String> {
        self.workflow
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .map(|s| s.step_id.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Critical path
    // -----------------------------------------------------------------------

    /// Longest-duration dependency chain through the workflow.
    ///
    /// Memoized longest-path over the DAG: each step's value is its own
    /// duration plus the maximum value among its dependencies. The path is
    /// reconstructed backwards from the maximal step; when dependencies tie,
    /// the lexicographically smallest step id wins so the result is
    /// deterministic.
    pub fn critical_path(&self) -> CriticalPath {
        if self.workflow.steps.is_empty() {
            return CriticalPath {
                steps: Vec::new(),
                total_duration: 0.0,
            };
        }

        let by_id: BTreeMap<&str, &WorkflowStep> = self
            .workflow
            .steps
            .iter()
            .map(|s| (s.step_id.as_str(), s))
            .collect();

        let mut memo: HashMap<&str, f64> = HashMap::new();
        for &id in by_id.keys() {
            Self::longest_path_to(id, &by_id, &mut memo);
        }

        // BTreeMap iteration keeps the end-step choice deterministic on ties.
        let mut end: &str = "";
        let mut best = f64::NEG_INFINITY;
        for &id in by_id.keys() {
            let value = memo[id];
            if value > best {
                best = value;
                end = id;
            }
        }

        let mut path = vec![end.to_string()];
        let mut current = end;
        loop {
            let step = by_id[current];
            let Some(next) = step
                .depends_on
                .iter()
                .filter_map(|dep| memo.get(dep.as_str()).map(|v| (dep.as_str(), *v)))
                .fold(None::<(&str, f64)>, |acc, (dep, v)| match acc {
                    // depends_on is a BTreeSet, so on equal values the first
                    // (lexicographically smallest) dependency is kept.
                    Some((_, best)) if v > best => Some((dep, v)),
                    Some(keep) => Some(keep),
                    None => Some((dep, v)),
                })
            else {
                break;
            };
            path.push(next.0.to_string());
            current = next.0;
        }
        path.reverse();

        debug!(
            workflow_id = %self.workflow.workflow_id,
            duration_hours = best,
            path_len = path.len(),
            "computed critical path"
        );

        CriticalPath {
            steps: path,
            total_duration: best,
        }
    }

    fn longest_path_to<'a>(
        step_id: &'a str,
        by_id: &BTreeMap<&'a str, &'a WorkflowStep>,
        memo: &mut HashMap<&'a str, f64>,
    ) -> f64 {
        if let Some(&value) = memo.get(step_id) {
            return value;
        }
        let step = by_id[step_id];
        let max_dep = step
            .depends_on
            .iter()
            .filter(|dep| by_id.contains_key(dep.as_str()))
            .map(|dep| Self::longest_path_to(dep.as_str(), by_id, memo))
            .fold(0.0_f64, f64::max);
        let value = step.estimated_duration + max_dep;
        memo.insert(step_id, value);
        value
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Move a step into `InProgress`, stamping `started_at`.
    pub fn mark_started(&mut self, step_id: &str) -> Result<(), GraphError> {
        let step = self.step_for_transition(step_id)?;
        step.status = StepStatus::InProgress;
        step.started_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Move a step into `Completed`, stamping `completed_at`, then promote
    /// any dependents whose dependencies are now all satisfied to `Ready`.
    pub fn mark_completed(&mut self, step_id: &str) -> Result<(), GraphError> {
        let step = self.step_for_transition(step_id)?;
        step.status = StepStatus::Completed;
        step.completed_at = Some(chrono::Utc::now());
        self.refresh_readiness();
        Ok(())
    }

    /// Move a step into `Failed` and tag every transitive dependent as
    /// `BlockedByFailedDependency`. Dependents are deliberately not failed;
    /// recovery needs an explicit resume or abort.
    pub fn mark_failed(&mut self, step_id: &str) -> Result<(), GraphError> {
        let step = self.step_for_transition(step_id)?;
        step.status = StepStatus::Failed;
        step.completed_at = Some(chrono::Utc::now());
        self.block_dependents_of(step_id);
        Ok(())
    }

    /// Move a step into `Skipped`.
    pub fn mark_skipped(&mut self, step_id: &str) -> Result<(), GraphError> {
        let step = self.step_for_transition(step_id)?;
        step.status = StepStatus::Skipped;
        step.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    fn step_for_transition(
        &mut self,
        step_id: &str,
    ) -> Result<&mut WorkflowStep, GraphError> {
        let step = self
            .workflow
            .step_mut(step_id)
            .ok_or_else(|| GraphError::StepNotFound(step_id.to_string()))?;
        if step.status.is_terminal() {
            return Err(GraphError::TerminalTransition {
                step_id: step_id.to_string(),
                status: format!("{:?}", step.status),
            });
        }
        Ok(step)
    }

    fn refresh_readiness(&mut self) {
        let ready: Vec<String> = self
            .workflow
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending && self.dependencies_satisfied(s))
            .map(|s| s.step_id.clone())
            .collect();
        for id in ready {
            if let Some(step) = self.workflow.step_mut(&id) {
                step.status = StepStatus::Ready;
            }
        }
    }

    fn block_dependents_of(&mut self, failed_id: &str) {
        let mut frontier = vec![failed_id.to_string()];
        while let Some(blocked) = frontier.pop() {
            let dependents: Vec<String> = self
                .workflow
                .steps
                .iter()
                .filter(|s| {
                    s.depends_on.contains(&blocked)
                        && !s.status.is_terminal()
                        && s.status != StepStatus::BlockedByFailedDependency
                })
                .map(|s| s.step_id.clone())
                .collect();
            for id in dependents {
                if let Some(step) = self.workflow.step_mut(&id) {
                    step.status = StepStatus::BlockedByFailedDependency;
                }
                frontier.push(id);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
