//! lea-jinja - Jinja templating layer for lea
//!
//! Renders `.sql.jinja` scripts with a context of environment variables
//! (`{{ env.VAR }}`) and a `load_yaml()` function, recording every YAML
//! file a render touches so callers can compute effective mtimes.

pub mod environment;
pub mod error;

pub use environment::JinjaEnvironment;
pub use error::{JinjaError, JinjaResult};
