//! Process registry: maps process identifiers to descriptors.
//!
//! Built once at start-up and immutable afterwards, so lookups need no
//! locking. Share it behind an `Arc`.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::process::ProcessDescriptor;
use crate::processes::hello_world::HelloWorld;

#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    processes: BTreeMap<String, ProcessDescriptor>,
}

impl ProcessRegistry {
    pub fn builder() -> ProcessRegistryBuilder {
        ProcessRegistryBuilder::default()
    }

    /// Registry containing the built-in processes.
    pub fn builtin() -> Self {
        let hello = HelloWorld::descriptor();
        let mut processes = BTreeMap::new();
        processes.insert(hello.id().to_string(), hello);
        Self { processes }
    }

    /// Look up a process by identifier.
    pub fn resolve(&self, process_id: &str) -> Result<&ProcessDescriptor, CoreError> {
        self.processes
            .get(process_id)
            .ok_or_else(|| CoreError::ProcessNotFound(process_id.to_string()))
    }

    /// All registered processes, ordered by identifier.
    pub fn list(&self) -> impl Iterator<Item = &ProcessDescriptor> {
        self.processes.values()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// Collects descriptors before the registry is frozen.
#[derive(Debug, Default)]
pub struct ProcessRegistryBuilder {
    processes: BTreeMap<String, ProcessDescriptor>,
}

impl ProcessRegistryBuilder {
    /// Start from the built-in processes.
    pub fn with_builtin(self) -> Result<Self, CoreError> {
        self.register(HelloWorld::descriptor())
    }

    /// Add a process. Identifiers must be unique.
    pub fn register(mut self, descriptor: ProcessDescriptor) -> Result<Self, CoreError> {
        let id = descriptor.id().to_string();
        if self.processes.contains_key(&id) {
            return Err(CoreError::DuplicateProcess(id));
        }
        self.processes.insert(id, descriptor);
        Ok(self)
    }

    pub fn build(self) -> ProcessRegistry {
        ProcessRegistry {
            processes: self.processes,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::execution::JobControlOption;
    use crate::process::{Inputs, ProcessError, ProcessMetadata, ProcessOutput};
    use crate::processes::hello_world::PROCESS_ID;

    fn descriptor(id: &str) -> ProcessDescriptor {
        ProcessDescriptor::new(
            ProcessMetadata {
                id: id.to_string(),
                title: id.to_string(),
                description: String::new(),
                version: "1.0.0".to_string(),
                job_control_options: vec![JobControlOption::SyncExecute],
            },
            |_: &Inputs| -> Result<ProcessOutput, ProcessError> {
                Ok(ProcessOutput::bytes("text/plain", "ok"))
            },
        )
    }

    #[test]
    fn builtin_contains_hello_world() {
        let registry = ProcessRegistry::builtin();
        assert_eq!(registry.resolve(PROCESS_ID).unwrap().id(), PROCESS_ID);
    }

    #[test]
    fn resolve_unknown_process() {
        let registry = ProcessRegistry::builtin();
        assert_matches!(
            registry.resolve("foo"),
            Err(CoreError::ProcessNotFound(id)) if id == "foo"
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let result = ProcessRegistry::builder()
            .register(descriptor("a"))
            .and_then(|b| b.register(descriptor("a")));
        assert_matches!(result, Err(CoreError::DuplicateProcess(id)) if id == "a");
    }

    #[test]
    fn list_is_sorted_by_id() {
        let registry = ProcessRegistry::builder()
            .register(descriptor("zeta"))
            .and_then(|b| b.register(descriptor("alpha")))
            .and_then(|b| b.with_builtin())
            .unwrap()
            .build();

        let ids: Vec<&str> = registry.list().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["alpha", "hello-world", "zeta"]);
        assert_eq!(registry.len(), 3);
    }
}
