//! System instruction rendering.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::tools::ToolSpec;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

/// Render the fixed system instruction, listing every available tool.
pub fn render_system_instruction(tools: &[ToolSpec]) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("system", SYSTEM_TEMPLATE)
        .context("load system prompt template")?;
    let rendered = env
        .get_template("system")?
        .render(context! { tools => tools })
        .context("render system prompt")?;
    debug!(bytes = rendered.len(), tools = tools.len(), "rendered system instruction");
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    #[test]
    fn lists_every_tool() {
        let registry = ToolRegistry::builtin().expect("registry");
        let prompt = render_system_instruction(registry.specs()).expect("render");
        for spec in registry.specs() {
            assert!(prompt.contains(&format!("`{}`", spec.name)), "{}", spec.name);
        }
        assert!(prompt.contains("relative to the working directory"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let registry = ToolRegistry::builtin().expect("registry");
        let first = render_system_instruction(registry.specs()).expect("render");
        let second = render_system_instruction(registry.specs()).expect("render");
        assert_eq!(first, second);
    }
}
