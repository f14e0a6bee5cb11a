//! Task registry
//!
//! The registry is built once from static definitions and never mutated
//! afterwards. All structural checks (duplicate names, dangling references,
//! reference cycles) happen in [`Registry::load`], so anything holding a
//! `Registry` can expand tasks without further validation.

use crate::core::{
    error::{NameScope, RegistryError},
    step::PlannedStep,
    task::{Task, TaskEntry},
};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Read-only mapping from task name to task definition
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: IndexMap<String, Task>,
}

impl Registry {
    /// Build a registry, rejecting duplicate names, unknown references and cycles
    pub fn load(definitions: Vec<Task>) -> Result<Self, RegistryError> {
        let mut tasks = IndexMap::with_capacity(definitions.len());

        for task in definitions {
            task.validate_steps()?;
            if tasks.contains_key(&task.name) {
                return Err(RegistryError::DuplicateName {
                    scope: NameScope::Task,
                    name: task.name,
                });
            }
            tasks.insert(task.name.clone(), task);
        }

        for task in tasks.values() {
            for reference in task.references() {
                if !tasks.contains_key(reference) {
                    return Err(RegistryError::UnknownTask {
                        name: reference.to_string(),
                        referenced_by: Some(task.name.clone()),
                    });
                }
            }
        }

        Self::check_cycles(&tasks)?;

        debug!("Loaded registry with {} tasks", tasks.len());
        Ok(Self { tasks })
    }

    /// Look up a task by name
    pub fn resolve(&self, name: &str) -> Result<&Task, RegistryError> {
        self.tasks
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTask {
                name: name.to_string(),
                referenced_by: None,
            })
    }

    /// All tasks, in declaration order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Expand task references depth-first, left-to-right
    pub fn flatten(&self, task: &Task) -> Vec<PlannedStep> {
        let mut plan = Vec::new();
        self.expand(task, &mut plan);
        plan
    }

    fn expand(&self, task: &Task, plan: &mut Vec<PlannedStep>) {
        for entry in &task.entries {
            match entry {
                TaskEntry::Step(step) => plan.push(PlannedStep {
                    task: task.name.clone(),
                    step: step.clone(),
                }),
                TaskEntry::Task(name) => match self.tasks.get(name) {
                    Some(referenced) => self.expand(referenced, plan),
                    // Only reachable for tasks built outside this registry.
                    None => warn!("Skipping unknown task reference '{}' in '{}'", name, task.name),
                },
            }
        }
    }

    /// Reject any task whose expansion would revisit a task on its own path
    ///
    /// Shared sub-tasks (diamonds) are fine; only a task reappearing on the
    /// current expansion path is a cycle.
    fn check_cycles(tasks: &IndexMap<String, Task>) -> Result<(), RegistryError> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        for name in tasks.keys() {
            if !visited.contains(name.as_str()) {
                Self::dfs_check(name, tasks, &mut visited, &mut path)?;
            }
        }

        Ok(())
    }

    fn dfs_check<'a>(
        name: &'a str,
        tasks: &'a IndexMap<String, Task>,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), RegistryError> {
        path.push(name);

        if let Some(task) = tasks.get(name) {
            for reference in task.references() {
                if let Some(start) = path.iter().position(|p| *p == reference) {
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|p| p.to_string()).collect();
                    cycle.push(reference.to_string());
                    return Err(RegistryError::CyclicReference { path: cycle });
                }
                if !visited.contains(reference) {
                    Self::dfs_check(reference, tasks, visited, path)?;
                }
            }
        }

        path.pop();
        visited.insert(name);
        Ok(())
    }
}
