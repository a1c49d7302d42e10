//! Dependency graph resolution
//!
//! Adjacency map over model names with index handles into a node arena.
//! External tables are nodes too, but carry no outgoing edges, so cycles
//! can only form among in-corpus models. Cycle detection is Tarjan SCC;
//! topological ordering breaks ties by smaller lexicographic name so that
//! SQL emission and plan application are deterministic.

use std::collections::{BTreeMap, HashMap};

use crate::error::MedallionError;
use crate::model::Model;

/// Resolved dependency graph over a model corpus.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Node arena; indices are the handles used in `deps` / `dependents`
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// node -> nodes it depends on
    deps: Vec<Vec<usize>>,
    /// node -> nodes that depend on it
    dependents: Vec<Vec<usize>>,
    /// whether the node is an in-corpus model (false: external table)
    is_model: Vec<bool>,
}

impl DependencyGraph {
    /// Build the graph from a loaded corpus.
    pub fn build(models: &BTreeMap<String, Model>) -> Self {
        let mut names: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        fn intern(name: &str, names: &mut Vec<String>, index: &mut HashMap<String, usize>) -> usize {
            if let Some(&i) = index.get(name) {
                return i;
            }
            let i = names.len();
            names.push(name.to_string());
            index.insert(name.to_string(), i);
            i
        }

        // Models first (BTreeMap order keeps the arena deterministic),
        // externals interned as they appear.
        for name in models.keys() {
            intern(name, &mut names, &mut index);
        }
        for model in models.values() {
            for dep in &model.depends_on {
                intern(dep, &mut names, &mut index);
            }
            if let Some(base) = &model.base_table {
                intern(base, &mut names, &mut index);
            }
        }

        let mut deps = vec![Vec::new(); names.len()];
        let mut dependents = vec![Vec::new(); names.len()];
        let mut is_model = vec![false; names.len()];

        for (name, model) in models {
            let from = index[name];
            is_model[from] = true;
            for dep in &model.depends_on {
                let to = index[dep.as_str()];
                if !deps[from].contains(&to) {
                    deps[from].push(to);
                    dependents[to].push(from);
                }
            }
        }

        DependencyGraph {
            names,
            index,
            deps,
            dependents,
            is_model,
        }
    }

    /// Detect dependency cycles (invariant I4) via Tarjan SCC.
    ///
    /// Halts on the first cycle found, reporting every member of that cycle
    /// in lexicographic order.
    pub fn detect_cycles(&self) -> Result<(), MedallionError> {
        let mut state = TarjanState::new(self.names.len());
        let mut cycles: Vec<Vec<String>> = Vec::new();

        for node in 0..self.names.len() {
            if state.indices[node].is_none() {
                self.strong_connect(node, &mut state, &mut cycles);
            }
        }

        if cycles.is_empty() {
            return Ok(());
        }
        // Deterministic choice of "first" cycle: smallest leading member.
        let mut members: Vec<Vec<String>> = cycles
            .into_iter()
            .map(|mut c| {
                c.sort();
                c
            })
            .collect();
        members.sort();
        Err(MedallionError::CycleDetected {
            members: members.remove(0),
        })
    }

    fn strong_connect(&self, node: usize, state: &mut TarjanState, cycles: &mut Vec<Vec<String>>) {
        state.indices[node] = Some(state.counter);
        state.lowlinks[node] = state.counter;
        state.counter += 1;
        state.stack.push(node);
        state.on_stack[node] = true;

        for &next in &self.deps[node] {
            if state.indices[next].is_none() {
                self.strong_connect(next, state, cycles);
                state.lowlinks[node] = state.lowlinks[node].min(state.lowlinks[next]);
            } else if state.on_stack[next] {
                state.lowlinks[node] = state.lowlinks[node].min(state.indices[next].unwrap());
            }
        }

        if Some(state.lowlinks[node]) == state.indices[node] {
            let mut component = Vec::new();
            loop {
                let member = state.stack.pop().unwrap();
                state.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            let self_loop = component.len() == 1 && self.deps[node].contains(&node);
            if component.len() > 1 || self_loop {
                cycles.push(component.iter().map(|&i| self.names[i].clone()).collect());
            }
        }
    }

    /// Topological order over in-corpus models, dependencies first.
    ///
    /// Ties between independent siblings break toward the smaller
    /// lexicographic name. Errors when the graph is cyclic.
    pub fn topo_order(&self) -> Result<Vec<String>, MedallionError> {
        self.detect_cycles()?;

        // Externals have no dependencies, so they drain first and never
        // block a model.
        let mut indegree: Vec<usize> = (0..self.names.len()).map(|n| self.deps[n].len()).collect();

        // Min-heap on name for deterministic tie-breaking
        let mut ready: std::collections::BinaryHeap<std::cmp::Reverse<(&str, usize)>> =
            std::collections::BinaryHeap::new();
        for node in 0..self.names.len() {
            if indegree[node] == 0 {
                ready.push(std::cmp::Reverse((self.names[node].as_str(), node)));
            }
        }

        let mut order = Vec::new();
        while let Some(std::cmp::Reverse((_, node))) = ready.pop() {
            if self.is_model[node] {
                order.push(self.names[node].clone());
            }
            for &dependent in &self.dependents[node] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(std::cmp::Reverse((
                        self.names[dependent].as_str(),
                        dependent,
                    )));
                }
            }
        }
        Ok(order)
    }

    /// Position of each model in the topological order.
    pub fn topo_positions(&self) -> Result<HashMap<String, usize>, MedallionError> {
        Ok(self
            .topo_order()?
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect())
    }

    /// Direct dependents of a model, sorted by name.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let Some(&node) = self.index.get(name) else {
            return Vec::new();
        };
        let mut result: Vec<String> = self.dependents[node]
            .iter()
            .map(|&i| self.names[i].clone())
            .collect();
        result.sort();
        result
    }

    /// Transitive `cte_refs` closure of a model, innermost first.
    ///
    /// Nested CTE models are expanded before their users, following the
    /// global topological order, so a parent can splice the returned list
    /// straight into a WITH clause.
    pub fn cte_closure(
        &self,
        models: &BTreeMap<String, Model>,
        model: &Model,
    ) -> Result<Vec<String>, MedallionError> {
        let mut needed: Vec<String> = Vec::new();
        let mut pending: Vec<&str> = model.cte_refs.iter().map(String::as_str).collect();
        while let Some(name) = pending.pop() {
            if needed.iter().any(|n| n == name) {
                continue;
            }
            if let Some(cte) = models.get(name) {
                needed.push(name.to_string());
                pending.extend(cte.cte_refs.iter().map(String::as_str));
            }
        }

        let positions = self.topo_positions()?;
        needed.sort_by_key(|name| positions.get(name).copied().unwrap_or(usize::MAX));
        Ok(needed)
    }
}

struct TarjanState {
    counter: usize,
    indices: Vec<Option<usize>>,
    lowlinks: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
}

impl TarjanState {
    fn new(len: usize) -> Self {
        TarjanState {
            counter: 0,
            indices: vec![None; len],
            lowlinks: vec![0; len],
            on_stack: vec![false; len],
            stack: Vec::new(),
        }
    }
}
