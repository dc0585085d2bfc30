// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Link-time registry of log targets

use crate::LevelFilter;
use linkme::distributed_slice;

/// A log target declared somewhere in the linked crates.
pub struct LogTarget {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: &'static [&'static str],
}

impl LogTarget {
    #[must_use]
    pub const fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        Self {
            target,
            name,
            level,
            tags,
        }
    }
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }
}

#[distributed_slice]
pub static LOG_TARGETS: [LogTarget];

#[doc(hidden)]
#[macro_export]
macro_rules! log_target_deps {
    () => {
        use linkme::distributed_slice;
        use $crate::LevelFilter;
        use $crate::targets::{LOG_TARGETS, LogTarget};
    };
}

/// Declare the log target of the calling module, with a short name, default level and tags.
#[macro_export]
macro_rules! trace_target {
    // scoped in an anonymous const so that the macro can be used several times per crate
    ($name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            use $crate::log_target_deps;
            log_target_deps!();

            #[distributed_slice(LOG_TARGETS)]
            static LOG_TGT: LogTarget = LogTarget::new(module_path!(), $name, $level, $tags);
        };
    };
}

/// Declare a log target that is not a module path (e.g. a third-party crate).
#[macro_export]
macro_rules! custom_target {
    ($target:expr, $level:expr, $tags:expr) => {
        const _: () = {
            use $crate::log_target_deps;
            log_target_deps!();

            #[distributed_slice(LOG_TARGETS)]
            static LOG_TGT: LogTarget = LogTarget::new($target, $target, $level, $tags);
        };
    };
}
