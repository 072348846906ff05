//! The [`DiceYaml`] facade: runs the pass pipeline over descriptor text and
//! hands out the resolved document.

use crate::error::ValidateErrors;
use crate::graph::DependencyGraph;
use crate::merge::{self, Merge};
use crate::model::{EnvMap, Object};
use crate::mutate::{self, EnvSelector};
use crate::normalize;
use crate::resolver::resolve_template;
use crate::validate;
use crate::{Error, Result};
use indexmap::IndexMap;
use tracing::{debug, info};

/// A parsed diceyml descriptor
#[derive(Debug, Clone)]
pub struct DiceYaml {
    /// Untyped parse of the resolved text, kept for unknown key detection
    raw: serde_yaml::Value,
    obj: Object,
}

impl DiceYaml {
    /// Parse a descriptor without selecting an environment.
    ///
    /// Template placeholders take their defaults. Overlays and values are kept
    /// so the caller can inspect or compose them.
    pub fn new(text: &str, validate: bool) -> Result<Self> {
        let resolved = resolve_template(text, None)?;
        let mut dice = Self::parse(&resolved)?;
        normalize::set_default_values(&mut dice.obj);
        normalize::compatible_expose(&mut dice.obj);
        if validate {
            dice.validate().into_result()?;
        }
        info!(
            "Parsed descriptor with {} services and {} jobs",
            dice.obj.services.len(),
            dice.obj.jobs.len()
        );
        Ok(dice)
    }

    /// Parse a descriptor for deployment to `env`.
    ///
    /// Placeholders resolve against the values of `env`, the matching overlay
    /// is merged in, and overlays and values are dropped from the result.
    pub fn new_deployable(text: &str, env: &str, validate: bool) -> Result<Self> {
        let resolved = resolve_template(text, Some(env))?;
        let mut dice = Self::parse(&resolved)?;
        merge::merge_env(&mut dice.obj, env);
        normalize::set_default_values(&mut dice.obj);
        normalize::expand_global_env(&mut dice.obj);
        normalize::compatible_expose(&mut dice.obj);
        dice.obj.environments.clear();
        dice.obj.values.clear();
        if validate {
            dice.validate().into_result()?;
        }
        info!(
            "Resolved descriptor for '{}' with {} services and {} jobs",
            env,
            dice.obj.services.len(),
            dice.obj.jobs.len()
        );
        Ok(dice)
    }

    /// Wrap an already built document
    pub fn from_object(obj: Object) -> Result<Self> {
        let raw = serde_yaml::to_value(&obj)?;
        Ok(Self { raw, obj })
    }

    fn parse(text: &str) -> Result<Self> {
        let raw: serde_yaml::Value = if text.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(text)?
        };
        let obj = if raw.is_null() {
            Object::default()
        } else {
            serde_yaml::from_str(text)?
        };
        debug!("Decoded {} bytes of descriptor text", text.len());
        Ok(Self { raw, obj })
    }

    /// Run every validation pass and return all findings
    pub fn validate(&self) -> ValidateErrors {
        validate::validate(&self.raw, &self.obj)
    }

    /// Merge the overlay of `env` into the document.
    ///
    /// Returns `false` and changes nothing when there is no such overlay.
    pub fn merge_env(&mut self, env: &str) -> bool {
        let merged = merge::merge_env(&mut self.obj, env);
        if merged {
            normalize::set_default_values(&mut self.obj);
            normalize::expand_global_env(&mut self.obj);
            normalize::compatible_expose(&mut self.obj);
        }
        merged
    }

    /// Merge `other` into the overlay of `env`, or into the base document
    /// when `env` is empty
    pub fn compose(&mut self, env: &str, other: &DiceYaml) {
        merge::compose(&mut self.obj, env, &other.obj);
    }

    /// Merge `other` directly into the base document
    pub fn merge(&mut self, other: &DiceYaml) {
        self.obj.merge(&other.obj);
    }

    /// A copy of the document
    pub fn obj(&self) -> Object {
        self.obj.clone()
    }

    /// Render the document as YAML
    pub fn yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.obj)?)
    }

    /// Render the document as JSON
    pub fn json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.obj)?)
    }

    /// Render the document as indented JSON
    pub fn json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.obj)?)
    }

    /// Bind images, and optional extra envs, to services and jobs by name
    pub fn insert_image(
        &mut self,
        images: &IndexMap<String, String>,
        envs: &IndexMap<String, EnvMap>,
    ) -> Result<()> {
        mutate::insert_image(&mut self.obj, images, envs)
    }

    /// Bind images to sidecars by sidecar name
    pub fn insert_sidecar_image(&mut self, images: &IndexMap<String, String>) -> Result<()> {
        mutate::insert_sidecar_image(&mut self.obj, images)
    }

    /// Merge options into the addons whose plan name is `plan`
    pub fn insert_addon_options(
        &mut self,
        selector: &EnvSelector,
        plan: &str,
        options: &IndexMap<String, String>,
    ) -> usize {
        mutate::insert_addon_options(&mut self.obj, selector, plan, options)
    }

    /// Replace `${platform.KEY}` placeholders
    pub fn render_platform(&mut self, platform: &IndexMap<String, String>) -> Result<()> {
        mutate::render_platform(&mut self.obj, platform)
    }

    /// Dependency graph of the services
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::from_object(&self.obj)
    }

    /// One dependency cycle among the services, if there is any
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        self.dependency_graph().find_cycle()
    }
}

impl TryFrom<Object> for DiceYaml {
    type Error = Error;

    fn try_from(obj: Object) -> Result<Self> {
        Self::from_object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationError;

    const DOC: &str = r#"
version: "2.0"
envs:
  REGION: eu
services:
  web:
    ports:
      - 8080
    expose:
      - 8080
    resources:
      cpu: ${cpu:0.25}
      mem: 256
environments:
  production:
    services:
      web:
        resources:
          mem: 1024
values:
  production:
    cpu: 2
"#;

    #[test]
    fn test_new_keeps_overlays() {
        let dice = DiceYaml::new(DOC, true).unwrap();
        let obj = dice.obj();
        let web = &obj.services["web"];
        assert_eq!(web.resources.cpu, 0.25);
        assert_eq!(web.resources.network["mode"], "container");
        assert!(web.ports[0].expose);
        assert!(!web.envs.contains_key("REGION"));
        assert!(obj.environments.contains_key("production"));
        assert!(obj.values.contains_key("production"));
    }

    #[test]
    fn test_new_deployable_resolves_env() {
        let dice = DiceYaml::new_deployable(DOC, "Prod", true).unwrap();
        let obj = dice.obj();
        let web = &obj.services["web"];
        assert_eq!(web.resources.cpu, 2.0);
        assert_eq!(web.resources.mem, 1024);
        assert_eq!(web.envs["REGION"], "eu");
        assert!(obj.environments.is_empty());
        assert!(obj.values.is_empty());
    }

    #[test]
    fn test_merge_env_matches_deployable() {
        let text = DOC.replace("${cpu:0.25}", "0.5");
        let mut merged = DiceYaml::new(&text, true).unwrap();
        assert!(merged.merge_env("production"));
        let deployable = DiceYaml::new_deployable(&text, "production", true).unwrap();

        let web = &merged.obj().services["web"];
        assert_eq!(web.envs["REGION"], "eu");
        assert_eq!(web.resources.mem, 1024);
        assert_eq!(merged.obj().services, deployable.obj().services);

        let mut untouched = DiceYaml::new(&text, true).unwrap();
        assert!(!untouched.merge_env("staging"));
        assert!(!untouched.obj().services["web"].envs.contains_key("REGION"));
    }

    #[test]
    fn test_validation_failure_is_aggregated() {
        let text = "services:\n  web:\n    resources:\n      cpu: 0\n      mem: 0\n";
        let err = DiceYaml::new(text, true).unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error, got {err}");
        };
        assert_eq!(errors.len(), 2);
        assert!(DiceYaml::new(text, false).is_ok());
    }

    #[test]
    fn test_empty_document() {
        let dice = DiceYaml::new("", false).unwrap();
        let errors = dice.validate();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors.errors().next(),
            Some(ValidationError::EmptyDocument)
        ));
    }

    #[test]
    fn test_parse_errors_fail_fast() {
        assert!(matches!(
            DiceYaml::new("services: [", true),
            Err(Error::Yaml(_))
        ));
        assert!(matches!(
            DiceYaml::new("services:\n  web:\n    ports:\n      - http\n", true),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_obj_is_a_copy() {
        let dice = DiceYaml::new(DOC, false).unwrap();
        let mut copy = dice.obj();
        copy.services.clear();
        assert_eq!(dice.obj().services.len(), 1);
    }

    #[test]
    fn test_yaml_and_json_rendering() {
        let dice = DiceYaml::new_deployable(DOC, "production", false).unwrap();
        let reparsed = DiceYaml::new(&dice.yaml().unwrap(), true).unwrap();
        assert_eq!(reparsed.obj().services, dice.obj().services);

        let json: serde_json::Value = serde_json::from_str(&dice.json().unwrap()).unwrap();
        assert_eq!(json["services"]["web"]["resources"]["mem"], 1024);
        assert_eq!(json["services"]["web"]["ports"][0]["port"], 8080);
    }
}
