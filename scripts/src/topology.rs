//! Resolution of the order in which units are instantiated
//!
//! Units and derived calls form the nodes of a dependency graph; an edge runs
//! from a node to every unit address or derived value it consumes at
//! construction time. The graph is sorted topologically with Kahn's
//! algorithm. Ready nodes are taken in declaration order (units before
//! derived calls) so that a fixed configuration always yields the same plan.

use std::{
    collections::{BTreeSet, HashMap},
    fmt::{self, Display, Formatter},
};

use itertools::Itertools;
use tracing::debug;

use crate::{config::DeploymentConfig, errors::DeployError, types::Dependency};

/// A step of a deployment plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Instantiate a unit
    Deploy {
        /// The unit to instantiate
        unit: String,
        /// Whether a later step consumes the unit's address, in which case
        /// its confirmation must be awaited before continuing
        blocking: bool,
    },
    /// Submit a derived call, await it, and read the produced value
    Derive {
        /// The derived call
        call: String,
        /// The steps that consume the produced value
        unblocks: Vec<String>,
    },
}

impl PlanStep {
    /// The name of the unit or derived call executed by the step
    pub fn name(&self) -> &str {
        match self {
            PlanStep::Deploy { unit, .. } => unit,
            PlanStep::Derive { call, .. } => call,
        }
    }
}

/// An ordering of the units and derived calls of a configuration in which
/// every node appears after all nodes it depends on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentPlan {
    /// The steps, in execution order
    pub steps: Vec<PlanStep>,
}

impl DeploymentPlan {
    /// The units in instantiation order
    pub fn unit_order(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                PlanStep::Deploy { unit, .. } => Some(unit.as_str()),
                PlanStep::Derive { .. } => None,
            })
            .collect()
    }

    /// The position of the named unit or derived call in the plan
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name() == name)
    }

    /// The number of blocking instantiations in the plan
    pub fn blocking_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, PlanStep::Deploy { blocking: true, .. }))
            .count()
    }
}

impl Display for DeploymentPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.steps.iter().map(PlanStep::name).join(" -> "))
    }
}

/// A node of the dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node<'a> {
    /// A unit instantiation
    Unit(&'a str),
    /// A derived call
    Derived(&'a str),
}

impl Node<'_> {
    /// The label under which the node is reported
    fn label(&self) -> String {
        match self {
            Node::Unit(name) => name.to_string(),
            Node::Derived(name) => format!("derived:{}", name),
        }
    }
}

/// Resolve the deployment plan of a configuration.
///
/// Fails with [`DeployError::CyclicDependency`] naming one cycle of the graph
/// if no valid order exists.
pub fn resolve(config: &DeploymentConfig) -> Result<DeploymentPlan, DeployError> {
    let nodes: Vec<Node<'_>> = config
        .units
        .iter()
        .map(|unit| Node::Unit(unit.name.as_str()))
        .chain(config.derived.iter().map(|call| Node::Derived(call.name.as_str())))
        .collect();

    let unit_index: HashMap<&str, usize> = config
        .units
        .iter()
        .enumerate()
        .map(|(i, unit)| (unit.name.as_str(), i))
        .collect();
    let derived_index: HashMap<&str, usize> = config
        .derived
        .iter()
        .enumerate()
        .map(|(i, call)| (call.name.as_str(), config.units.len() + i))
        .collect();

    let lookup = |owner: &str, dep: Dependency<'_>| -> Result<usize, DeployError> {
        let index = match dep {
            Dependency::Unit(name) => unit_index.get(name),
            Dependency::Derived(name) => derived_index.get(name),
        };
        index.copied().ok_or_else(|| {
            DeployError::Configuration(format!("`{}` references unknown `{}`", owner, dep))
        })
    };

    // Edges point from a node to the nodes it depends on
    let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nodes.len()];
    for (i, unit) in config.units.iter().enumerate() {
        for dep in unit.dependencies() {
            dependencies[i].insert(lookup(&unit.name, dep)?);
        }
    }
    for (i, call) in config.derived.iter().enumerate() {
        for dep in call.dependencies() {
            dependencies[config.units.len() + i].insert(lookup(&call.name, dep)?);
        }
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (node, deps) in dependencies.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(node);
        }
    }

    // Kahn's algorithm, always taking the earliest declared ready node
    let mut in_degree: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &dependent in &dependents[node] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < nodes.len() {
        let cycle = find_cycle(&dependencies, &in_degree)
            .into_iter()
            .map(|i| nodes[i].label())
            .collect_vec();
        return Err(DeployError::CyclicDependency(cycle));
    }

    let steps = order
        .into_iter()
        .map(|i| match nodes[i] {
            Node::Unit(name) => PlanStep::Deploy {
                unit: name.to_string(),
                blocking: !dependents[i].is_empty(),
            },
            Node::Derived(name) => PlanStep::Derive {
                call: name.to_string(),
                unblocks: dependents[i]
                    .iter()
                    .sorted()
                    .map(|&d| nodes[d].label())
                    .collect(),
            },
        })
        .collect_vec();
    debug!(
        "resolved deployment order: {}",
        steps.iter().map(PlanStep::name).join(", ")
    );

    Ok(DeploymentPlan { steps })
}

/// Find one cycle among the nodes Kahn's algorithm could not order.
///
/// Every unordered node still has an unordered dependency, so following the
/// first such dependency from any unordered node must revisit a node.
fn find_cycle(dependencies: &[BTreeSet<usize>], in_degree: &[usize]) -> Vec<usize> {
    let stuck = |node: usize| in_degree[node] > 0;
    let Some(start) = (0..in_degree.len()).find(|&i| stuck(i)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut seen_at: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut current = start;
    loop {
        let Some(next) = dependencies[current].iter().copied().find(|&d| stuck(d)) else {
            return path;
        };
        if let Some(&pos) = seen_at.get(&next) {
            // Each node of the cycle requires the one after it
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            return cycle;
        }

        seen_at.insert(next, path.len());
        path.push(next);
        current = next;
    }
}
