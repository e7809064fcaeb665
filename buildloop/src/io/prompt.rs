//! Prompt templates for the plan and build requests.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::io::state_store::Documents;

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const BUILD_TEMPLATE: &str = include_str!("prompts/build.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("plan", PLAN_TEMPLATE)
            .context("load plan template")?;
        env.add_template("build", BUILD_TEMPLATE)
            .context("load build template")?;
        Ok(Self { env })
    }

    /// Ask for one small, concrete next increment given both documents.
    pub fn render_plan(&self, docs: &Documents) -> Result<String> {
        let template = self.env.get_template("plan")?;
        let rendered = template.render(context! {
            target => docs.target.trim(),
            current => docs.current.trim(),
        })?;
        debug!(bytes = rendered.len(), "rendered plan prompt");
        Ok(rendered)
    }

    /// Ask for the increment's full content, framed by one of the two markers.
    pub fn render_build(&self, current: &str, plan: &str) -> Result<String> {
        let template = self.env.get_template("build")?;
        let rendered = template.render(context! {
            current => current.trim(),
            plan => plan.trim(),
        })?;
        debug!(bytes = rendered.len(), "rendered build prompt");
        Ok(rendered)
    }
}
