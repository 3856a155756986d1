//! Deterministic names derived from an (application, environment) pair.
//!
//! Nothing here is stored. The deploy path and the role cleanup path both
//! recompute names through [`EnvStackNames`] so they always agree.

/// Tag key marking resources created for an application.
pub const APP_TAG_KEY: &str = "stackwright-application";
/// Tag key marking resources created for an environment.
pub const ENV_TAG_KEY: &str = "stackwright-environment";

const EXECUTION_ROLE_SUFFIX: &str = "CFNExecutionRole";
const MANAGER_ROLE_SUFFIX: &str = "EnvManagerRole";

/// Stack and role names for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvStackNames {
    app: String,
    env: String,
    stack_name: String,
}

impl EnvStackNames {
    pub fn new(app: &str, env: &str) -> Self {
        Self {
            app: app.to_string(),
            env: env.to_string(),
            stack_name: format!("{}-{}", app, env),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn execution_role(&self) -> String {
        format!("{}-{}", self.stack_name, EXECUTION_ROLE_SUFFIX)
    }

    pub fn manager_role(&self) -> String {
        format!("{}-{}", self.stack_name, MANAGER_ROLE_SUFFIX)
    }

    /// Both retained roles, execution role first.
    pub fn roles(&self) -> [String; 2] {
        [self.execution_role(), self.manager_role()]
    }

    /// Whether `tags` mark a resource as created for this environment.
    pub fn owns<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut env_tag = false;
        let mut app_tag_ok = true;
        for (k, v) in tags {
            match k.as_str() {
                ENV_TAG_KEY => env_tag = *v == self.env,
                APP_TAG_KEY => app_tag_ok = *v == self.app,
                _ => {}
            }
        }
        env_tag && app_tag_ok
    }

    /// Tags applied to the environment stack and everything it creates.
    pub fn tags(&self) -> Vec<(String, String)> {
        vec![
            (APP_TAG_KEY.to_string(), self.app.clone()),
            (ENV_TAG_KEY.to_string(), self.env.clone()),
        ]
    }
}
