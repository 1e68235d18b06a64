//! Injected registry of everything a worker loads once at startup: native step
//! factories (contributed by plugins), flow definitions and script sources.
//!
//! Built once per worker process and read-only afterwards; shared as `Arc<Registry>`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::flow_io::{self, FlowLoadError};
use crate::steps::{ModelBinder, NativeStep, Step};
use crate::types::{ConfigModel, Flow, FlowKind};

/// Builds a configured step instance from a part's (override-merged) model.
pub type StepFactory = Arc<dyn Fn(&ConfigModel) -> Box<dyn Step> + Send + Sync>;

/// A unit that contributes native steps.
pub trait Plugin {
  /// Plugin name, for logging.
  fn name(&self) -> &str;
  /// Registers the plugin's step types.
  fn register(&self, steps: &mut StepRegistry);
}

/// Native step factories by fully-qualified type name.
#[derive(Default, Clone)]
pub struct StepRegistry {
  factories: HashMap<String, StepFactory>,
}

impl fmt::Debug for StepRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names: Vec<_> = self.factories.keys().collect();
    names.sort();
    f.debug_struct("StepRegistry").field("steps", &names).finish()
  }
}

impl StepRegistry {
  /// Registers `T` under [NativeStep::TYPE_NAME], binding its fields from the model.
  pub fn register<T: NativeStep + 'static>(&mut self) {
    self.register_factory(
      T::TYPE_NAME,
      Arc::new(|model: &ConfigModel| {
        let mut step = T::default();
        step.bind(&mut ModelBinder::new(T::TYPE_NAME, model));
        Box::new(step) as Box<dyn Step>
      }),
    );
  }

  pub fn register_factory(&mut self, name: impl Into<String>, factory: StepFactory) {
    let name = name.into();
    if self.factories.insert(name.clone(), factory).is_some() {
      warn!(step = %name, "step type registered twice; last registration wins");
    }
  }

  /// New configured instance of the named step type.
  pub fn create(&self, name: &str, model: &ConfigModel) -> Option<Box<dyn Step>> {
    self.factories.get(name).map(|f| f(model))
  }

  pub fn contains(&self, name: &str) -> bool {
    self.factories.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.factories.len()
  }

  pub fn is_empty(&self) -> bool {
    self.factories.is_empty()
  }
}

/// Flows, scripts and step types available to every run in this worker.
#[derive(Debug, Default)]
pub struct Registry {
  steps: StepRegistry,
  flows: HashMap<Uuid, Arc<Flow>>,
  scripts: HashMap<String, Arc<str>>,
  failure_flow: Option<Uuid>,
}

impl Registry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::default()
  }

  pub fn steps(&self) -> &StepRegistry {
    &self.steps
  }

  pub fn flow(&self, uid: &Uuid) -> Option<Arc<Flow>> {
    self.flows.get(uid).cloned()
  }

  /// Flow with the given name (case-insensitive).
  pub fn flow_by_name(&self, name: &str) -> Option<Arc<Flow>> {
    self
      .flows
      .values()
      .find(|f| f.name.eq_ignore_ascii_case(name))
      .cloned()
  }

  pub fn flows(&self) -> impl Iterator<Item = &Arc<Flow>> {
    self.flows.values()
  }

  pub fn script(&self, name: &str) -> Option<Arc<str>> {
    self.scripts.get(name).cloned()
  }

  /// The designated failure flow: the configured one, else the first flow of kind Failure.
  pub fn failure_flow(&self) -> Option<Arc<Flow>> {
    if let Some(uid) = &self.failure_flow {
      return self.flow(uid);
    }
    let mut failure: Vec<_> = self
      .flows
      .values()
      .filter(|f| f.kind == FlowKind::Failure)
      .collect();
    failure.sort_by(|a, b| a.name.cmp(&b.name));
    failure.first().map(|f| Arc::clone(*f))
  }
}

/// Builder for [Registry].
#[derive(Default)]
pub struct RegistryBuilder {
  inner: Registry,
}

impl RegistryBuilder {
  pub fn plugin(mut self, plugin: &dyn Plugin) -> Self {
    let before = self.inner.steps.len();
    plugin.register(&mut self.inner.steps);
    info!(
      plugin = plugin.name(),
      steps = self.inner.steps.len() - before,
      "plugin loaded"
    );
    self
  }

  pub fn step<T: NativeStep + 'static>(mut self) -> Self {
    self.inner.steps.register::<T>();
    self
  }

  pub fn flow(mut self, flow: Flow) -> Self {
    for problem in flow.validate() {
      warn!(flow = %flow.name, "{}", problem);
    }
    debug!(flow = %flow.name, uid = %flow.uid, kind = %flow.kind, "flow registered");
    self.inner.flows.insert(flow.uid, Arc::new(flow));
    self
  }

  pub fn flows(self, flows: impl IntoIterator<Item = Flow>) -> Self {
    flows.into_iter().fold(self, |b, f| b.flow(f))
  }

  pub fn script(mut self, name: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
    self.inner.scripts.insert(name.into(), source.into());
    self
  }

  /// Overrides which flow is dispatched after a failed run.
  pub fn failure_flow(mut self, uid: Uuid) -> Self {
    self.inner.failure_flow = Some(uid);
    self
  }

  /// Loads every `*.json` flow definition under `dir`.
  pub fn flows_dir(self, dir: &Path) -> Result<Self, FlowLoadError> {
    let flows = flow_io::load_flows_dir(dir)?;
    info!(dir = %dir.display(), count = flows.len(), "flows loaded");
    Ok(self.flows(flows))
  }

  /// Loads every `*.rhai` script under `dir`, named by file stem.
  pub fn scripts_dir(mut self, dir: &Path) -> Result<Self, FlowLoadError> {
    let scripts = flow_io::load_scripts_dir(dir)?;
    info!(dir = %dir.display(), count = scripts.len(), "scripts loaded");
    for (name, source) in scripts {
      self.inner.scripts.insert(name, source.into());
    }
    Ok(self)
  }

  pub fn build(self) -> Registry {
    self.inner
  }
}
