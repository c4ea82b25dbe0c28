//! Lifecycle hooks.

use std::fmt;

use crate::project::Project;
use crate::types::{BuildError, HookError};

/// A caller-supplied callback that receives the project snapshot.
pub type Hook = Box<dyn Fn(&Project) -> Result<(), HookError>>;

/// Optional callbacks run once before the first build step and once after
/// staging and debug symbol relocation.
#[derive(Default)]
pub struct Hooks {
    pre_compile: Option<Hook>,
    post_compile: Option<Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_compile<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Project) -> Result<(), HookError> + 'static,
    {
        self.pre_compile = Some(Box::new(hook));
        self
    }

    pub fn post_compile<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Project) -> Result<(), HookError> + 'static,
    {
        self.post_compile = Some(Box::new(hook));
        self
    }

    pub fn run_pre(&self, project: &Project) -> Result<(), BuildError> {
        run("pre_compile", self.pre_compile.as_ref(), project)
    }

    pub fn run_post(&self, project: &Project) -> Result<(), BuildError> {
        run("post_compile", self.post_compile.as_ref(), project)
    }
}

fn run(stage: &'static str, hook: Option<&Hook>, project: &Project) -> Result<(), BuildError> {
    match hook {
        Some(hook) => hook(project).map_err(|source| BuildError::Hook { stage, source }),
        None => Ok(()),
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_compile", &self.pre_compile.is_some())
            .field("post_compile", &self.post_compile.is_some())
            .finish()
    }
}
