// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Log level control at runtime.

use ordermap::OrderMap;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

use crate::targets::LOG_TARGETS;
use crate::trace_target;

trace_target!("tracectl", LevelFilter::INFO, &[]);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TraceCtlError {
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("Invalid directive '{0}': expected tag=level")]
    InvalidDirective(String),
    #[error("Unknown tag '{0}'")]
    UnknownTag(String),
}

/// Current setting of a single log target
#[derive(Debug, Clone)]
pub struct TargetSetting {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: Vec<&'static str>,
}

impl TargetSetting {
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug)]
pub(crate) struct TargetRegistry {
    pub(crate) default: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetSetting>,
    pub(crate) tags: OrderMap<&'static str, BTreeSet<&'static str>>,
}

impl TargetRegistry {
    fn from_linked(default: LevelFilter) -> Self {
        let mut registry = Self {
            default,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for t in LOG_TARGETS {
            registry.register(t.target, t.name, t.level, t.tags);
        }
        registry
    }

    fn register(
        &mut self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) {
        // a target can always be addressed by its own name
        let mut all_tags = tags.to_vec();
        if !all_tags.contains(&name) {
            all_tags.push(name);
        }
        for tag in &all_tags {
            self.tags.entry(*tag).or_default().insert(target);
        }
        let setting = TargetSetting {
            target,
            name,
            level,
            tags: all_tags,
        };
        if self.targets.insert(target, setting).is_some() {
            warn!("Log target {target} declared more than once");
        }
    }

    fn set_tag_level(&mut self, tag: &str, level: LevelFilter) -> Result<usize, TraceCtlError> {
        let members = self
            .tags
            .get(tag)
            .ok_or_else(|| TraceCtlError::UnknownTag(tag.to_string()))?;
        let mut changed = 0;
        for target in members {
            if let Some(setting) = self.targets.get_mut(target)
                && setting.level != level
            {
                setting.level = level;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn env_filter(&self) -> EnvFilter {
        self.targets.values().fold(
            EnvFilter::new(self.default.to_string()),
            |filter, setting| match format!("{}={}", setting.target, setting.level)
                .parse::<tracing_subscriber::filter::Directive>()
            {
                Ok(directive) => filter.add_directive(directive),
                Err(e) => {
                    warn!("Skipping bad directive for {}: {e}", setting.target);
                    filter
                }
            },
        )
    }

    pub(crate) fn as_config_string(&self) -> String {
        self.targets
            .values()
            .fold(format!("default={}", self.default), |mut out, s| {
                out += &format!(",{}={}", s.name, s.level);
                out
            })
    }
}

/// Handle to the global log configuration
#[derive(Debug)]
pub struct TracingControl {
    registry: Mutex<TargetRegistry>,
    reload: reload::Handle<EnvFilter, Registry>,
}

impl TracingControl {
    fn new() -> Self {
        let registry = TargetRegistry::from_linked(LevelFilter::INFO);
        let (filter, reload) = reload::Layer::new(registry.env_filter());
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true);

        // another subscriber (e.g. a test harness) may already be installed
        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(ErrorLayer::default())
            .try_init()
        {
            warn!("Log subscriber not installed: {e}");
        }
        Self {
            registry: Mutex::new(registry),
            reload,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TargetRegistry> {
        // a poisoned registry still holds usable settings
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn apply(&self, registry: &TargetRegistry) {
        if let Err(e) = self.reload.reload(registry.env_filter()) {
            warn!("Failed to reload log filter: {e}");
        }
    }

    pub fn set_default_level(&self, level: LevelFilter) {
        let mut registry = self.lock();
        if registry.default != level {
            registry.default = level;
            self.apply(&registry);
            info!("Default log level set to {level}");
        }
    }

    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.lock().default
    }

    /// Set the level of all the targets carrying the given tag.
    ///
    /// # Errors
    ///
    /// Fails if no target carries the tag.
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) -> Result<(), TraceCtlError> {
        let mut registry = self.lock();
        let changed = registry.set_tag_level(tag, level)?;
        if changed > 0 {
            self.apply(&registry);
        }
        info!("Log level of tag '{tag}' set to {level} ({changed} targets changed)");
        Ok(())
    }

    pub fn set_level_all(&self, level: LevelFilter) {
        let mut registry = self.lock();
        registry.targets.values_mut().for_each(|s| s.level = level);
        self.apply(&registry);
    }

    /// Apply a comma-separated list of `tag=level` directives. `default` sets the
    /// default level and `all` sets every known target.
    ///
    /// # Errors
    ///
    /// Fails on malformed directives, bad levels or unknown tags. Nothing is applied
    /// in that case.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let mut directives: OrderMap<String, LevelFilter> = OrderMap::new();
        for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (tag, level) = item
                .split_once('=')
                .ok_or_else(|| TraceCtlError::InvalidDirective(item.to_string()))?;
            let level = LevelFilter::from_str(level.trim())
                .map_err(|_| TraceCtlError::InvalidLevel(level.trim().to_string()))?;
            directives.insert(tag.trim().to_string(), level);
        }

        let mut registry = self.lock();
        for tag in directives.keys() {
            if tag != "default" && tag != "all" && !registry.tags.contains_key(tag.as_str()) {
                return Err(TraceCtlError::UnknownTag(tag.clone()));
            }
        }
        for (tag, level) in &directives {
            match tag.as_str() {
                "default" => registry.default = *level,
                "all" => registry.targets.values_mut().for_each(|s| s.level = *level),
                tag => {
                    registry.set_tag_level(tag, *level)?;
                }
            }
        }
        self.apply(&registry);
        Ok(())
    }

    #[must_use]
    pub fn target(&self, target: &str) -> Option<TargetSetting> {
        self.lock().targets.get(target).cloned()
    }

    #[must_use]
    pub fn targets_by_tag(&self, tag: &str) -> Vec<TargetSetting> {
        let registry = self.lock();
        registry
            .tags
            .get(tag)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|t| registry.targets.get(t).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn as_config_string(&self) -> String {
        self.lock().as_config_string()
    }

    pub fn dump(&self) {
        let registry = self.lock();
        info!("{registry}");
    }
}

/// Get the global [`TracingControl`], installing the log subscriber on first use.
pub fn get_trace_ctl() -> &'static TracingControl {
    static CTL: OnceLock<TracingControl> = OnceLock::new();
    CTL.get_or_init(TracingControl::new)
}
