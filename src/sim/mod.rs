//! Predefined simulations.
//!
//! A predefined simulation is an annotated SQL bundle shipped inside the
//! binary plus a set of demo queries and scenarios registered in code.
//! Selecting one overrides any configured SQL files.

mod retail;

use crate::config::Config;
use crate::context::Context;
use crate::core::{PulseError, Result};

pub const RETAIL_SIMULATION: &str = "retail";

/// Names accepted by the `predefined` setting.
pub const SIMULATIONS: &[&str] = &[RETAIL_SIMULATION];

/// Assemble a context from the configuration: predefined bundle when
/// requested, configured SQL files otherwise.
pub fn build_context(config: &Config) -> Result<Context> {
    let sources = match config.predefined.as_deref() {
        Some(RETAIL_SIMULATION) => vec![include_str!("retail.sql").to_string()],
        Some(other) => {
            return Err(PulseError::UnsupportedSimulation(other.to_string()));
        }
        None => config.sources()?,
    };

    let ctx = Context::with_sources(sources);
    if config.predefined.is_some() {
        retail::register(&ctx)?;
    }
    Ok(ctx)
}
