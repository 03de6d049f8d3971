// ABOUTME: Dependency-ordered plan of steps and the convergence pass that runs it.
// ABOUTME: Independent steps run concurrently; the first failure aborts the pass.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::deferred::{Deferred, StepId};
use super::error::{ConvergeError, OrderingError};
use crate::error::Error;

static NEXT_PLAN: AtomicU64 = AtomicU64::new(1);

/// How an edge between two steps came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// The downstream step reads a value the upstream step produces.
    Data,
    /// Pure ordering; no value is threaded through.
    Order,
}

/// Whether a step only declares state or mutates something outside the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Declarative,
    /// Performs an external mutation that a later failure will not undo.
    SideEffecting,
}

/// Read access handed to a running step.
#[derive(Debug, Clone)]
pub struct StepContext {
    name: Arc<str>,
    ancestors: Arc<HashSet<StepId>>,
}

impl StepContext {
    pub fn step_name(&self) -> &str {
        &self.name
    }

    /// Read a deferred value this step is ordered after.
    pub fn read<'d, T>(&self, value: &'d Deferred<T>) -> Result<&'d T, OrderingError> {
        let producer = value.producer();
        if !producer.is_known() && !self.ancestors.contains(&producer) {
            return Err(OrderingError::MissingEdge {
                step: self.name.to_string(),
                producer: value.label().to_string(),
            });
        }
        value.get().ok_or_else(|| OrderingError::Unresolved {
            producer: value.label().to_string(),
        })
    }
}

type Action = Box<dyn FnOnce(StepContext) -> BoxFuture<'static, Result<(), Error>> + Send>;

struct StepNode {
    name: String,
    kind: StepKind,
    edges: BTreeMap<usize, EdgeKind>,
    foreign: Vec<String>,
    action: Action,
}

/// Steps plus the edges between them.
///
/// Steps can only depend on values that already exist, so every edge points
/// at an earlier step and the graph is acyclic by construction.
pub struct Plan {
    id: u64,
    steps: Vec<StepNode>,
}

/// Summary of a successful convergence pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergeReport {
    /// Step names in completion order.
    pub completed: Vec<String>,
    /// Side-effecting steps among them.
    pub side_effects: Vec<String>,
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

impl Plan {
    pub fn new() -> Self {
        Self {
            id: NEXT_PLAN.fetch_add(1, Ordering::Relaxed),
            steps: Vec::new(),
        }
    }

    /// Start declaring a step.
    pub fn step(&mut self, name: impl Into<String>) -> StepBuilder<'_> {
        StepBuilder {
            plan: self,
            name: name.into(),
            kind: StepKind::Declarative,
            edges: BTreeMap::new(),
            foreign: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in declaration order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Every edge as `(upstream, downstream, kind)`.
    pub fn edges(&self) -> Vec<(&str, &str, EdgeKind)> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.edges.iter().map(move |(&upstream, &kind)| {
                    (self.steps[upstream].name.as_str(), step.name.as_str(), kind)
                })
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConvergeError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(ConvergeError::DuplicateStep {
                    name: step.name.clone(),
                });
            }
            if let Some(dependency) = step.foreign.first() {
                return Err(ConvergeError::ForeignDependency {
                    step: step.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        Ok(())
    }

    fn ancestors(&self) -> Vec<HashSet<StepId>> {
        let mut all: Vec<HashSet<StepId>> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let mut mine = HashSet::new();
            for &upstream in step.edges.keys() {
                mine.insert(self.step_id(upstream));
                mine.extend(all[upstream].iter().copied());
            }
            all.push(mine);
        }
        all
    }

    fn step_id(&self, index: usize) -> StepId {
        StepId {
            plan: self.id,
            index,
        }
    }

    /// Run every step once, each only after all of its upstream steps.
    ///
    /// The first failing step aborts the pass and drops steps still in
    /// flight. Completed side-effecting steps are reported but not reverted.
    pub async fn converge(self) -> Result<ConvergeReport, ConvergeError> {
        self.validate()?;

        let ancestors = self.ancestors();
        let total = self.steps.len();
        let mut waiting_on: Vec<usize> = self.steps.iter().map(|s| s.edges.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); total];
        for (index, step) in self.steps.iter().enumerate() {
            for &upstream in step.edges.keys() {
                dependents[upstream].push(index);
            }
        }

        let mut names = Vec::with_capacity(total);
        let mut kinds = Vec::with_capacity(total);
        let mut actions: Vec<Option<Action>> = Vec::with_capacity(total);
        for step in self.steps {
            names.push(step.name);
            kinds.push(step.kind);
            actions.push(Some(step.action));
        }

        let mut running = FuturesUnordered::new();
        let launch = |index: usize, actions: &mut Vec<Option<Action>>| {
            let ctx = StepContext {
                name: Arc::from(names[index].as_str()),
                ancestors: Arc::new(ancestors[index].clone()),
            };
            let action = actions[index].take();
            let name = names[index].clone();
            async move {
                tracing::info!(step = %name, "step started");
                let result = match action {
                    Some(action) => action(ctx).await,
                    None => Ok(()),
                };
                (index, result)
            }
        };

        for index in (0..total).filter(|&i| waiting_on[i] == 0) {
            running.push(launch(index, &mut actions));
        }

        let mut report = ConvergeReport::default();
        while let Some((index, result)) = running.next().await {
            let name = &names[index];
            if let Err(source) = result {
                tracing::warn!(step = %name, error = %source, "step failed, aborting convergence");
                // The mutation landed even though the step as a whole failed.
                if kinds[index] == StepKind::SideEffecting && source.left_external_effect() {
                    report.side_effects.push(name.clone());
                }
                if !report.side_effects.is_empty() {
                    tracing::warn!(
                        fired = ?report.side_effects,
                        "external side effects already applied are not rolled back"
                    );
                }
                return Err(ConvergeError::StepFailed {
                    step: name.clone(),
                    fired: report.side_effects,
                    source: Box::new(source),
                });
            }

            tracing::info!(step = %name, "step finished");
            report.completed.push(name.clone());
            if kinds[index] == StepKind::SideEffecting {
                report.side_effects.push(name.clone());
            }

            for &next in &dependents[index] {
                waiting_on[next] -= 1;
                if waiting_on[next] == 0 {
                    running.push(launch(next, &mut actions));
                }
            }
        }

        Ok(report)
    }
}

/// Declares one step: its edges, its kind, then its action.
pub struct StepBuilder<'p> {
    plan: &'p mut Plan,
    name: String,
    kind: StepKind,
    edges: BTreeMap<usize, EdgeKind>,
    foreign: Vec<String>,
}

impl StepBuilder<'_> {
    /// Declare that the step reads `value`, adding a data edge to its producer.
    pub fn reads<T>(self, value: &Deferred<T>) -> Self {
        self.edge(value, EdgeKind::Data)
    }

    /// Order the step after the producer of `value` without reading it.
    pub fn after<T>(self, value: &Deferred<T>) -> Self {
        self.edge(value, EdgeKind::Order)
    }

    /// Mark the step as mutating state outside the plan.
    pub fn side_effecting(mut self) -> Self {
        self.kind = StepKind::SideEffecting;
        self
    }

    fn edge<T>(mut self, value: &Deferred<T>, kind: EdgeKind) -> Self {
        let producer = value.producer();
        if producer.is_known() {
            return self;
        }
        if producer.plan != self.plan.id || producer.index >= self.plan.steps.len() {
            self.foreign.push(value.label().to_string());
            return self;
        }
        // A data edge subsumes an ordering edge to the same step.
        let entry = self.edges.entry(producer.index).or_insert(kind);
        if kind == EdgeKind::Data {
            *entry = EdgeKind::Data;
        }
        self
    }

    /// Finish the declaration with the step's action.
    ///
    /// The returned deferred value resolves to the action's output once the
    /// step has run.
    pub fn run<T, F, Fut>(self, body: F) -> Deferred<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(StepContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let id = self.plan.step_id(self.plan.steps.len());
        let output = Deferred::pending(id, &self.name);
        let slot = output.clone();

        let action: Action = Box::new(move |ctx: StepContext| {
            Box::pin(async move {
                let value = body(ctx).await?;
                slot.fulfil(value);
                Ok(())
            }) as BoxFuture<'static, Result<(), Error>>
        });

        tracing::debug!(
            step = %self.name,
            upstream = ?self.edges.keys().collect::<BTreeSet<_>>(),
            "declared step"
        );

        self.plan.steps.push(StepNode {
            name: self.name,
            kind: self.kind,
            edges: self.edges,
            foreign: self.foreign,
            action,
        });
        output
    }
}
