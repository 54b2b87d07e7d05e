use crate::{CompositorError, Result};

const DEFAULT_WORKSPACES: usize = 4;
const DEFAULT_OUTPUT: &str = "headless-1";

/// Settings of the demo compositor, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Workspaces created in each output's group at startup (`OXWS_WORKSPACES`).
    pub workspaces_per_output: usize,
    /// Headless outputs to create (`OXWS_OUTPUTS`, comma separated).
    pub outputs: Vec<String>,
    /// Client spawned once the socket is up; the compositor exits with it.
    pub spawn: Option<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            workspaces_per_output: DEFAULT_WORKSPACES,
            outputs: vec![DEFAULT_OUTPUT.to_string()],
            spawn: None,
        }
    }
}

impl DemoConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            std::env::var("OXWS_WORKSPACES").ok().as_deref(),
            std::env::var("OXWS_OUTPUTS").ok().as_deref(),
            std::env::args().nth(1),
        )
    }

    fn from_vars(workspaces: Option<&str>, outputs: Option<&str>, spawn: Option<String>) -> Result<Self> {
        let mut config = Self {
            spawn,
            ..Self::default()
        };

        if let Some(raw) = workspaces {
            config.workspaces_per_output = raw
                .trim()
                .parse()
                .map_err(|_| CompositorError::Config(format!("OXWS_WORKSPACES={raw:?} is not a number")))?;
        }

        if let Some(raw) = outputs {
            let names: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            if names.is_empty() {
                return Err(CompositorError::Config("OXWS_OUTPUTS names no output".into()));
            }
            config.outputs = names;
        }

        Ok(config)
    }
}
