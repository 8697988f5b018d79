//! Jinja environment setup for lea script templates.

use crate::error::JinjaResult;
use minijinja::{Environment, Error as MjError, ErrorKind, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared capture of YAML files loaded during a render.
type YamlCapture = Arc<Mutex<Vec<PathBuf>>>;

/// Jinja environment for rendering `.sql.jinja` scripts.
///
/// The template context is deliberately narrow: an `env` global exposing the
/// process environment and a `load_yaml(relpath)` function resolving paths
/// relative to the scripts root. Every YAML file touched by a render is
/// recorded so the parser can fold its mtime into the script's.
pub struct JinjaEnvironment<'a> {
    env: Environment<'a>,
    yaml_capture: YamlCapture,
}

impl std::fmt::Debug for JinjaEnvironment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaEnvironment")
            .field("env", &"<Environment>")
            .finish()
    }
}

impl JinjaEnvironment<'_> {
    /// Create an environment rooted at `base_dir` (the scripts root).
    pub fn new(base_dir: &Path) -> Self {
        Self::with_env_vars(base_dir, std::env::vars().collect())
    }

    /// Create an environment with an explicit `env` map. Useful in tests.
    pub fn with_env_vars(base_dir: &Path, vars: HashMap<String, String>) -> Self {
        let mut env = Environment::new();
        let yaml_capture: YamlCapture = Arc::new(Mutex::new(Vec::new()));

        env.add_global("env", Value::from_serialize(&vars));
        env.add_function("load_yaml", make_load_yaml_fn(base_dir, yaml_capture.clone()));

        Self { env, yaml_capture }
    }

    /// Render a template string.
    pub fn render(&self, template: &str) -> JinjaResult<String> {
        self.read_capture().clear();
        let rendered = self.env.render_str(template, ())?;
        Ok(rendered)
    }

    /// YAML files loaded during the last render.
    pub fn loaded_yaml_paths(&self) -> Vec<PathBuf> {
        self.read_capture().clone()
    }

    /// Acquire the capture lock, recovering from poison.
    fn read_capture(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.yaml_capture.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Build the `load_yaml(relpath)` template function.
fn make_load_yaml_fn(
    base_dir: &Path,
    capture: YamlCapture,
) -> impl Fn(String) -> Result<Value, MjError> + Send + Sync + 'static {
    let base_dir = base_dir.to_path_buf();
    move |relpath: String| {
        let full = base_dir.join(&relpath);
        let contents = std::fs::read_to_string(&full).map_err(|e| {
            MjError::new(
                ErrorKind::InvalidOperation,
                format!("load_yaml: cannot read {}: {e}", full.display()),
            )
        })?;
        let yaml: serde_yaml::Value = serde_yaml::from_str(&contents).map_err(|e| {
            MjError::new(
                ErrorKind::InvalidOperation,
                format!("load_yaml: invalid YAML in {}: {e}", full.display()),
            )
        })?;

        capture
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(full);

        // serde_yaml::Value serializes cleanly into a template value.
        Ok(Value::from_serialize(&yaml))
    }
}

#[cfg(test)]
#[path = "environment_test.rs"]
mod tests;
