//! Mutation passes applied to a resolved document: build artifacts, sidecar
//! images, addon options and platform placeholders.

use crate::model::{AddOn, EnvMap, EnvObject, Job, Object, Service, SideCar, canonical_env};
use crate::visitor::Visitor;
use crate::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

static PLATFORM_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{platform\.([\w.-]+)\}").unwrap());

/// Which addons an option injection targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSelector {
    /// Addons of the base document
    Base,
    /// Addons of one environment overlay
    Named(String),
}

struct ImageVisitor<'a> {
    images: &'a IndexMap<String, String>,
    envs: &'a IndexMap<String, EnvMap>,
    pending: IndexSet<String>,
}

impl ImageVisitor<'_> {
    fn bind(&mut self, name: &str, image: &mut String, envs: &mut EnvMap) {
        let Some(bound) = self.images.get(name) else {
            return;
        };
        debug!("Binding image '{}' to '{}'", bound, name);
        *image = bound.clone();
        if let Some(extra) = self.envs.get(name) {
            envs.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.pending.shift_remove(name);
    }
}

impl Visitor for ImageVisitor<'_> {
    fn visit_service(&mut self, name: &str, service: &mut Service) {
        self.bind(name, &mut service.image, &mut service.envs);
    }

    fn visit_job(&mut self, name: &str, job: &mut Job) {
        self.bind(name, &mut job.image, &mut job.envs);
    }
}

/// Set images (and extra envs) on the services and jobs they name.
///
/// Fails with [`Error::ImageTargetNotFound`] when the document declares
/// workloads but some names matched none of them.
pub fn insert_image(
    obj: &mut Object,
    images: &IndexMap<String, String>,
    envs: &IndexMap<String, EnvMap>,
) -> Result<()> {
    let mut visitor = ImageVisitor {
        images,
        envs,
        pending: images.keys().cloned().collect(),
    };
    obj.accept(&mut visitor);

    let has_workloads = !obj.services.is_empty() || !obj.jobs.is_empty();
    if has_workloads && !visitor.pending.is_empty() {
        return Err(Error::ImageTargetNotFound(
            visitor.pending.into_iter().collect(),
        ));
    }
    Ok(())
}

struct SidecarImageVisitor<'a> {
    images: &'a IndexMap<String, String>,
    pending: IndexSet<String>,
}

impl Visitor for SidecarImageVisitor<'_> {
    fn visit_sidecar(&mut self, service: &str, name: &str, sidecar: &mut SideCar) {
        if let Some(image) = self.images.get(name) {
            debug!("Binding image '{}' to sidecar '{}' of '{}'", image, name, service);
            sidecar.image = image.clone();
            self.pending.shift_remove(name);
        }
    }
}

/// Set images on sidecars by sidecar name
pub fn insert_sidecar_image(obj: &mut Object, images: &IndexMap<String, String>) -> Result<()> {
    let mut visitor = SidecarImageVisitor {
        images,
        pending: images.keys().cloned().collect(),
    };
    obj.accept(&mut visitor);

    if !visitor.pending.is_empty() {
        return Err(Error::SidecarNotFound(visitor.pending.into_iter().collect()));
    }
    Ok(())
}

struct AddonOptionsVisitor<'a> {
    selector: &'a EnvSelector,
    plan: &'a str,
    options: &'a IndexMap<String, String>,
    updated: usize,
}

impl AddonOptionsVisitor<'_> {
    fn apply(&mut self, addon: &mut AddOn) {
        if addon.plan_name() != self.plan {
            return;
        }
        for (key, value) in self.options {
            addon.options.insert(key.clone(), value.clone());
        }
        self.updated += 1;
    }
}

impl Visitor for AddonOptionsVisitor<'_> {
    fn visit_addon(&mut self, _name: &str, addon: &mut AddOn) {
        if *self.selector == EnvSelector::Base {
            self.apply(addon);
        }
    }

    fn visit_env_object(&mut self, env: &str, overlay: &mut EnvObject) {
        let EnvSelector::Named(wanted) = self.selector else {
            return;
        };
        if canonical_env(env) != canonical_env(wanted) {
            return;
        }
        for addon in overlay.addons.values_mut() {
            self.apply(addon);
        }
    }
}

/// Merge `options` into every addon whose plan name is `plan`, either in the
/// base document or in one environment overlay. Returns the number of addons
/// updated.
pub fn insert_addon_options(
    obj: &mut Object,
    selector: &EnvSelector,
    plan: &str,
    options: &IndexMap<String, String>,
) -> usize {
    let mut visitor = AddonOptionsVisitor {
        selector,
        plan,
        options,
        updated: 0,
    };
    obj.accept(&mut visitor);
    debug!("Injected options into {} '{}' addon(s)", visitor.updated, plan);
    visitor.updated
}

/// Replace `${platform.KEY}` placeholders anywhere in the document.
///
/// Every placeholder is processed; all keys without a value are reported
/// together in [`Error::UnresolvedPlatform`] and the document is left as is.
pub fn render_platform(obj: &mut Object, platform: &IndexMap<String, String>) -> Result<()> {
    let text = serde_yaml::to_string(obj)?;
    let mut unresolved = IndexSet::new();

    let rendered = PLATFORM_PLACEHOLDER.replace_all(&text, |caps: &Captures| {
        match platform.get(&caps[1]) {
            Some(value) => value.clone(),
            None => {
                unresolved.insert(caps[1].to_string());
                caps[0].to_string()
            }
        }
    });

    if !unresolved.is_empty() {
        return Err(Error::UnresolvedPlatform(unresolved.into_iter().collect()));
    }
    *obj = serde_yaml::from_str(&rendered)?;
    Ok(())
}
