//! Service dependency graph

use crate::model::{Object, Services};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use tracing::debug;

/// Dependency graph built from `depends_on`.
///
/// Only dependencies on declared services become edges; references to unknown
/// services are reported by validation instead.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Service -> services it depends on
    dependencies: IndexMap<String, IndexSet<String>>,
    /// Service -> services depending on it
    dependents: IndexMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Create a dependency graph from a set of services
    pub fn from_services(services: &Services) -> Self {
        let mut dependencies = IndexMap::new();
        let mut dependents: IndexMap<String, Vec<String>> = IndexMap::new();

        for (name, service) in services {
            let mut deps = IndexSet::new();
            for dep in &service.depends_on {
                if !services.contains_key(dep) {
                    continue;
                }
                if deps.insert(dep.clone()) {
                    dependents.entry(dep.clone()).or_default().push(name.clone());
                }
            }
            dependencies.insert(name.clone(), deps);
        }

        Self {
            dependencies,
            dependents,
        }
    }

    /// Create a dependency graph from a document's services
    pub fn from_object(obj: &Object) -> Self {
        Self::from_services(&obj.services)
    }

    /// Services `name` depends on
    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.dependencies
            .get(name)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Find one dependency cycle.
    ///
    /// Services without pending dependencies are peeled off repeatedly; if
    /// anything is left, the walk follows first dependencies from the first
    /// remaining service until a service repeats. The returned chain starts
    /// and ends with that service, e.g. `[a, b, c, a]`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut remaining = self.dependencies.clone();
        loop {
            if remaining.is_empty() {
                return None;
            }
            let free: Vec<String> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| name.clone())
                .collect();
            if free.is_empty() {
                break;
            }
            for name in &free {
                remaining.shift_remove(name);
            }
            for deps in remaining.values_mut() {
                for name in &free {
                    deps.shift_remove(name);
                }
            }
        }

        let mut current = remaining.keys().next()?.clone();
        let mut chain = vec![current.clone()];
        loop {
            let next = remaining.get(&current)?.first()?.clone();
            if let Some(pos) = chain.iter().position(|name| *name == next) {
                let mut cycle = chain.split_off(pos);
                cycle.push(next);
                debug!("Found dependency cycle: {}", cycle.join(" -> "));
                return Some(cycle);
            }
            chain.push(next.clone());
            current = next;
        }
    }

    /// Perform topological sort to find a startup order.
    ///
    /// Ties are broken by declaration order. Returns `None` on a cycle.
    pub fn startup_order(&self) -> Option<Vec<String>> {
        let mut in_degree: IndexMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();
        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());
            for dependent in self.dependents.get(name).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        (order.len() == self.dependencies.len()).then_some(order)
    }

    /// Group services into waves that can start together once every earlier
    /// wave is up. Returns `None` on a cycle.
    pub fn startup_waves(&self) -> Option<Vec<Vec<String>>> {
        let mut started: IndexSet<&str> = IndexSet::new();
        let mut waves = Vec::new();
        while started.len() < self.dependencies.len() {
            let ready: Vec<&str> = self
                .dependencies
                .iter()
                .filter(|(name, _)| !started.contains(name.as_str()))
                .filter(|(_, deps)| deps.iter().all(|dep| started.contains(dep.as_str())))
                .map(|(name, _)| name.as_str())
                .collect();
            if ready.is_empty() {
                return None;
            }
            started.extend(ready.iter().copied());
            waves.push(ready.into_iter().map(String::from).collect());
        }
        Some(waves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Service;

    fn services(edges: &[(&str, &[&str])]) -> Services {
        edges
            .iter()
            .map(|(name, deps)| {
                let service = Service {
                    depends_on: deps.iter().map(|d| d.to_string()).collect(),
                    ..Default::default()
                };
                (name.to_string(), service)
            })
            .collect()
    }

    #[test]
    fn test_find_cycle() {
        let graph = DependencyGraph::from_services(&services(&[
            ("a", &["b", "c"]),
            ("b", &["c"]),
            ("c", &["a"]),
        ]));
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.len(), 4);
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle, vec!["a", "b", "c", "a"]);
        assert!(graph.startup_order().is_none());
        assert!(graph.startup_waves().is_none());
    }

    #[test]
    fn test_cycle_behind_acyclic_prefix() {
        let graph = DependencyGraph::from_services(&services(&[
            ("web", &["api"]),
            ("api", &["db", "cache"]),
            ("db", &[]),
            ("cache", &["api"]),
        ]));
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle, vec!["api", "cache", "api"]);
    }

    #[test]
    fn test_no_cycle() {
        let graph = DependencyGraph::from_services(&services(&[
            ("web", &["api", "missing"]),
            ("api", &["db"]),
            ("db", &[]),
            ("worker", &["db"]),
        ]));
        assert!(graph.find_cycle().is_none());
        assert_eq!(
            graph.startup_order().unwrap(),
            vec!["db", "api", "worker", "web"]
        );
        assert_eq!(
            graph.startup_waves().unwrap(),
            vec![vec!["db"], vec!["api", "worker"], vec!["web"]]
        );
        assert_eq!(graph.dependencies_of("web").collect::<Vec<_>>(), vec!["api"]);
    }
}
