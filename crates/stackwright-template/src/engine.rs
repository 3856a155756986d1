//! Workload document composition.
//!
//! A render loads one base document, attaches every fragment in
//! [`PARTIALS`] under its own name, then executes the base against the data
//! with the function set from [`crate::funcs`]. Base documents pull
//! fragments in with `{% include "<name>" %}`.

use std::sync::Arc;

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{Result, TemplateError};
use crate::funcs;
use crate::source::{EmbeddedSource, TemplateSource};
use crate::workload::{PlatformView, WorkloadOpts};

const SERVICES_DIR: &str = "services";
const JOBS_DIR: &str = "jobs";

const LB_WEB_SVC: &str = "lb-web";
const RD_WEB_SVC: &str = "rd-web";
const BACKEND_SVC: &str = "backend";
const WORKER_SVC: &str = "worker";
const SCHEDULED_JOB: &str = "scheduled-job";

const BASE_NAME: &str = "base";

/// Fragments attached to every workload document, regardless of kind.
pub const PARTIALS: [&str; 28] = [
    "loggroup",
    "envvars-container",
    "envvars-common",
    "secrets",
    "executionrole",
    "taskrole",
    "workload-container",
    "fargate-taskdef-base-properties",
    "service-base-properties",
    "servicediscovery",
    "addons",
    "sidecars",
    "logconfig",
    "autoscaling",
    "eventrule",
    "state-machine",
    "state-machine-definition.json",
    "efs-access-point",
    "env-controller",
    "mount-points",
    "volumes",
    "image-overrides",
    "instancerole",
    "accessrole",
    "publish",
    "subscribe",
    "nlb",
    "vpc-connector",
];

pub(crate) fn base_path(kind_dir: &str, name: &str) -> String {
    format!("workloads/{}/{}/cf.yml", kind_dir, name)
}

pub(crate) fn partial_path(name: &str) -> String {
    format!("workloads/partials/cf/{}.yml", name)
}

/// A fully rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content(String);

impl Content {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workload data plus the values derived from it that documents branch on.
#[derive(Serialize)]
struct WorkloadView<'a> {
    #[serde(flatten)]
    opts: &'a WorkloadOpts,
    runtime_platform: PlatformView<'a>,
    has_topic_queues: bool,
}

impl<'a> WorkloadView<'a> {
    fn new(opts: &'a WorkloadOpts) -> Self {
        Self {
            opts,
            runtime_platform: PlatformView::from(&opts.platform),
            has_topic_queues: opts
                .subscribe
                .as_ref()
                .is_some_and(|s| s.has_topic_queues()),
        }
    }
}

/// Renders workload documents from a [`TemplateSource`].
#[derive(Clone)]
pub struct Composer {
    source: Arc<dyn TemplateSource>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::embedded()
    }
}

impl Composer {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self { source }
    }

    /// Composer over the documents compiled into the binary.
    pub fn embedded() -> Self {
        Self::new(Arc::new(EmbeddedSource))
    }

    pub fn source(&self) -> &dyn TemplateSource {
        self.source.as_ref()
    }

    pub fn parse_load_balanced_web_service(&self, data: &WorkloadOpts) -> Result<Content> {
        self.render(LB_WEB_SVC, SERVICES_DIR, &WorkloadView::new(data))
    }

    pub fn parse_request_driven_web_service(&self, data: &WorkloadOpts) -> Result<Content> {
        self.render(RD_WEB_SVC, SERVICES_DIR, &WorkloadView::new(data))
    }

    pub fn parse_backend_service(&self, data: &WorkloadOpts) -> Result<Content> {
        self.render(BACKEND_SVC, SERVICES_DIR, &WorkloadView::new(data))
    }

    pub fn parse_worker_service(&self, data: &WorkloadOpts) -> Result<Content> {
        self.render(WORKER_SVC, SERVICES_DIR, &WorkloadView::new(data))
    }

    pub fn parse_scheduled_job(&self, data: &WorkloadOpts) -> Result<Content> {
        self.render(SCHEDULED_JOB, JOBS_DIR, &WorkloadView::new(data))
    }

    /// Render `workloads/{kind_dir}/{name}/cf.yml` with every catalog
    /// fragment attached. Nothing is returned unless the whole document
    /// renders.
    #[instrument(skip_all, fields(name = %name, kind = %kind_dir))]
    pub fn render<T: Serialize>(&self, name: &str, kind_dir: &str, data: &T) -> Result<Content> {
        let base = self.source.read(&base_path(kind_dir, name))?;

        let mut fragments = Vec::with_capacity(PARTIALS.len());
        for fragment in PARTIALS {
            let src = self
                .source
                .read(&partial_path(fragment))
                .map_err(|e| TemplateError::Fragment {
                    name: fragment.to_string(),
                    message: e.to_string(),
                })?;
            fragments.push((fragment, src));
        }

        let mut env = new_environment();
        env.add_template(BASE_NAME, &base)
            .map_err(|e| TemplateError::Parse {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        for (fragment, src) in &fragments {
            env.add_template(fragment, src)
                .map_err(|e| TemplateError::Fragment {
                    name: fragment.to_string(),
                    message: e.to_string(),
                })?;
        }

        let data = context_json(data)?;
        let tmpl = env
            .get_template(BASE_NAME)
            .map_err(|e| TemplateError::Parse {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        let rendered = tmpl
            .render(Value::from_serialize(&data))
            .map_err(|e| TemplateError::Execute {
                name: name.to_string(),
                data: data.to_string(),
                message: e.to_string(),
            })?;

        debug!(bytes = rendered.len(), "document rendered");
        Ok(Content(rendered))
    }
}

fn new_environment<'a>() -> Environment<'a> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    funcs::register(&mut env);
    env
}

/// The data as a JSON object, also reachable as `workload` so functions can
/// be handed the whole value.
fn context_json<T: Serialize>(data: &T) -> Result<serde_json::Value> {
    let mut json = serde_json::to_value(data).map_err(|e| TemplateError::Data(e.to_string()))?;
    if let serde_json::Value::Object(map) = &mut json {
        let whole = serde_json::Value::Object(map.clone());
        map.insert("workload".to_string(), whole);
    }
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn source_with_partials() -> MemorySource {
        let mut source = MemorySource::new();
        for name in PARTIALS {
            source.insert(partial_path(name), format!("# {}\n", name));
        }
        source
    }

    #[test]
    fn fragments_addressable_by_name() {
        let source = source_with_partials().with(
            base_path("services", "demo"),
            "{% include \"nlb\" %}{% include \"loggroup\" %}name: {{ name }}",
        );
        let composer = Composer::new(Arc::new(source));

        #[derive(Serialize)]
        struct Data {
            name: &'static str,
        }
        let out = composer
            .render("demo", "services", &Data { name: "api" })
            .unwrap();
        assert_eq!(out.as_str(), "# nlb\n# loggroup\nname: api");
    }

    #[test]
    fn missing_catalog_fragment_names_the_fragment() {
        let mut source = MemorySource::new().with(base_path("services", "demo"), "ok");
        for name in PARTIALS.iter().filter(|n| **n != "autoscaling") {
            source.insert(partial_path(name), "");
        }
        let composer = Composer::new(Arc::new(source));

        let err = composer
            .render("demo", "services", &serde_json::json!({}))
            .unwrap_err();
        match err {
            TemplateError::Fragment { name, .. } => assert_eq!(name, "autoscaling"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn malformed_fragment_aborts_render() {
        let source = source_with_partials()
            .with(partial_path("sidecars"), "{% if %}")
            .with(base_path("services", "demo"), "ok");
        let composer = Composer::new(Arc::new(source));

        let err = composer
            .render("demo", "services", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, TemplateError::Fragment { ref name, .. } if name == "sidecars"));
    }

    #[test]
    fn undeclared_include_fails_whole_render() {
        let source = source_with_partials().with(
            base_path("services", "demo"),
            "before\n{% include \"not-a-fragment\" %}\nafter",
        );
        let composer = Composer::new(Arc::new(source));

        let err = composer
            .render("demo", "services", &serde_json::json!({"name": "api"}))
            .unwrap_err();
        match err {
            TemplateError::Execute { name, data, .. } => {
                assert_eq!(name, "demo");
                assert!(data.contains("api"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_base_document_is_not_found() {
        let composer = Composer::new(Arc::new(source_with_partials()));
        let err = composer
            .render("ghost", "services", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { .. }));
    }

    #[test]
    fn whole_data_reachable_as_workload() {
        let source = source_with_partials().with(
            base_path("services", "demo"),
            "{{ env_controller_params(workload) | join(',') }}",
        );
        let composer = Composer::new(Arc::new(source));
        let opts = WorkloadOpts {
            workload_type: crate::workload::LB_WEB_SERVICE_TYPE.to_string(),
            ..Default::default()
        };
        let out = composer
            .render("demo", SERVICES_DIR, &WorkloadView::new(&opts))
            .unwrap();
        assert_eq!(out.as_str(), "ALBWorkloads,Aliases");
    }
}
