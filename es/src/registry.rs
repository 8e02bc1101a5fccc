//! Environment registry
//!
//! Ordered collection of environments with active/default tracking. Every
//! mutation is staged on a copy, persisted through the injected store, and
//! only then made visible; a failed save leaves the registry unchanged.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::environment::{Environment, EnvironmentPatch};
use crate::error::RegistryError;
use crate::store::EnvironmentStore;

/// Consistent view of the registry taken at one instant
///
/// Coordinator calls work from a snapshot so registry mutations made while a
/// call is in flight never change that call's targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Active environments in registry order
    pub active: Vec<Environment>,
    /// Default environment, active or not
    pub default: Option<Environment>,
}

/// The single source of truth for which backends exist
pub struct EnvironmentRegistry {
    environments: Vec<Environment>,
    store: Arc<dyn EnvironmentStore>,
    load_error: Option<String>,
}

impl std::fmt::Debug for EnvironmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentRegistry")
            .field("environments", &self.environments)
            .field("load_error", &self.load_error)
            .finish_non_exhaustive()
    }
}

impl EnvironmentRegistry {
    /// Open the registry from `store`
    ///
    /// Falls back to a single bootstrap default environment when the store is
    /// empty or cannot be read. Loaded data is normalized to unique ids and
    /// exactly one default.
    pub fn open(store: Arc<dyn EnvironmentStore>) -> Self {
        debug!("EnvironmentRegistry::open: called");
        let mut load_error = None;
        let environments = match store.load_environments() {
            Ok(Some(environments)) if !environments.is_empty() => {
                debug!(count = environments.len(), "EnvironmentRegistry::open: loaded environments");
                environments
            }
            Ok(_) => {
                info!("No stored environments, using bootstrap default environment");
                vec![Environment::bootstrap()]
            }
            Err(e) => {
                warn!("Failed to load environments, using bootstrap default environment: {}", e);
                load_error = Some(e.to_string());
                vec![Environment::bootstrap()]
            }
        };

        Self {
            environments: normalize(environments),
            store,
            load_error,
        }
    }

    /// Why the stored environments could not be read, when `open` fell back
    /// to the bootstrap environment
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn list(&self) -> &[Environment] {
        &self.environments
    }

    /// Active environments in registry order
    pub fn list_active(&self) -> Vec<&Environment> {
        self.environments.iter().filter(|env| env.is_active).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Environment> {
        self.environments.iter().find(|env| env.id == id)
    }

    pub fn get_default(&self) -> Option<&Environment> {
        self.environments.iter().find(|env| env.is_default)
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Clone the active set and default for one coordinator call
    pub fn snapshot(&self) -> RegistrySnapshot {
        debug!("EnvironmentRegistry::snapshot: called");
        RegistrySnapshot {
            active: self.environments.iter().filter(|env| env.is_active).cloned().collect(),
            default: self.get_default().cloned(),
        }
    }

    /// Register a new environment
    ///
    /// An environment added with `is_default` becomes the only default.
    pub fn add(&mut self, environment: Environment) -> Result<(), RegistryError> {
        debug!(env_id = %environment.id, "EnvironmentRegistry::add: called");
        validate(&environment)?;
        if self.get(&environment.id).is_some() {
            debug!(env_id = %environment.id, "EnvironmentRegistry::add: duplicate id");
            return Err(RegistryError::DuplicateId(environment.id));
        }

        let mut next = self.environments.clone();
        if environment.is_default {
            clear_defaults(&mut next);
        }
        info!(env_id = %environment.id, region = %environment.region, "Adding environment");
        next.push(environment);
        self.commit(next)
    }

    /// Add several environments at once (all or nothing)
    ///
    /// If any imported entry is flagged default, the first such entry becomes
    /// the registry default.
    pub fn import(&mut self, environments: Vec<Environment>) -> Result<usize, RegistryError> {
        debug!(count = environments.len(), "EnvironmentRegistry::import: called");
        let mut seen: HashSet<String> = self.environments.iter().map(|env| env.id.clone()).collect();
        for env in &environments {
            validate(env)?;
            if !seen.insert(env.id.clone()) {
                return Err(RegistryError::DuplicateId(env.id.clone()));
            }
        }

        let count = environments.len();
        let mut next = self.environments.clone();
        let imported_default = environments.iter().position(|env| env.is_default);
        if imported_default.is_some() {
            clear_defaults(&mut next);
        }
        for (index, mut env) in environments.into_iter().enumerate() {
            env.is_default = Some(index) == imported_default;
            next.push(env);
        }

        self.commit(next)?;
        info!(count, "Imported environments");
        Ok(count)
    }

    /// Apply a partial update; the id cannot change
    pub fn update(&mut self, id: &str, patch: &EnvironmentPatch) -> Result<Environment, RegistryError> {
        debug!(%id, "EnvironmentRegistry::update: called");
        let index = self.index_of(id)?;

        let mut next = self.environments.clone();
        patch.apply(&mut next[index]);
        let updated = next[index].clone();
        self.commit(next)?;

        info!(env_id = %id, "Updated environment");
        Ok(updated)
    }

    /// Remove an environment
    ///
    /// Fails with `LastEnvironment` for the sole remaining entry. Removing the
    /// default promotes the first survivor.
    pub fn remove(&mut self, id: &str) -> Result<Environment, RegistryError> {
        debug!(%id, "EnvironmentRegistry::remove: called");
        let index = self.index_of(id)?;
        if self.environments.len() == 1 {
            debug!(%id, "EnvironmentRegistry::remove: refusing to remove last environment");
            return Err(RegistryError::LastEnvironment(id.to_string()));
        }

        let mut next = self.environments.clone();
        let removed = next.remove(index);
        if removed.is_default {
            next[0].is_default = true;
            info!(env_id = %next[0].id, "Default environment reassigned");
        }
        self.commit(next)?;

        info!(env_id = %id, "Removed environment");
        Ok(removed)
    }

    /// Make `id` the default, clearing the flag everywhere else
    pub fn set_default(&mut self, id: &str) -> Result<(), RegistryError> {
        debug!(%id, "EnvironmentRegistry::set_default: called");
        let index = self.index_of(id)?;

        let mut next = self.environments.clone();
        clear_defaults(&mut next);
        next[index].is_default = true;
        self.commit(next)?;

        info!(env_id = %id, "Default environment set");
        Ok(())
    }

    fn index_of(&self, id: &str) -> Result<usize, RegistryError> {
        self.environments
            .iter()
            .position(|env| env.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn commit(&mut self, next: Vec<Environment>) -> Result<(), RegistryError> {
        debug!(count = next.len(), "EnvironmentRegistry::commit: called");
        self.store.save_environments(&next)?;
        self.environments = next;
        Ok(())
    }
}

fn validate(env: &Environment) -> Result<(), RegistryError> {
    if env.id.trim().is_empty() {
        return Err(RegistryError::Invalid("id must not be empty".to_string()));
    }
    if env.region.trim().is_empty() {
        return Err(RegistryError::Invalid(format!("{}: region must not be empty", env.id)));
    }
    Ok(())
}

fn clear_defaults(environments: &mut [Environment]) {
    for env in environments.iter_mut() {
        env.is_default = false;
    }
}

/// Drop duplicate ids and leave exactly one default
fn normalize(environments: Vec<Environment>) -> Vec<Environment> {
    let mut seen = HashSet::new();
    let mut result: Vec<Environment> = Vec::with_capacity(environments.len());
    for env in environments {
        if seen.insert(env.id.clone()) {
            result.push(env);
        } else {
            warn!(env_id = %env.id, "Ignoring duplicate stored environment");
        }
    }

    let mut found_default = false;
    for env in result.iter_mut() {
        if env.is_default {
            if found_default {
                warn!(env_id = %env.id, "Clearing extra default flag");
                env.is_default = false;
            }
            found_default = true;
        }
    }
    if !found_default && let Some(first) = result.first_mut() {
        first.is_default = true;
    }

    result
}
