// Hecaton Routing
// Decides which master group a new device belongs to

use chrono::{Local, NaiveTime, Timelike};

use crate::config::{RuleSet, DISABLED};
use crate::device::Device;
use crate::matcher::{matches, GlobPattern};

/// Prefix of the groups created by the time-bucket policy
pub const TIME_BUCKET_PREFIX: &str = "Hecaton Master";

/// How devices are assigned to groups. Exactly one policy is active.
#[derive(Debug, Clone)]
pub enum RoutingPolicy {
    /// First group in declaration order with a matching pattern
    Rules(CompiledRules),
    /// Devices plugged in the same `lag_minutes` wall-clock window share a group
    TimeBucket { lag_minutes: u32 },
}

/// A rule set with its patterns compiled
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    groups: Vec<(String, Vec<GlobPattern>)>,
    disabled: Vec<GlobPattern>,
}

impl CompiledRules {
    pub fn new(rules: &RuleSet) -> Self {
        let groups = rules
            .routing_groups()
            .map(|(name, patterns)| {
                let patterns = patterns.into_iter().map(GlobPattern::new).collect();
                (name.to_string(), patterns)
            })
            .collect();
        let disabled = rules
            .patterns(DISABLED)
            .unwrap_or_default()
            .into_iter()
            .map(GlobPattern::new)
            .collect();
        Self { groups, disabled }
    }

    /// First group, in declaration order, with a pattern matching `device`
    pub fn route(&self, device: &Device) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|pattern| matches(device, pattern)))
            .map(|(name, _)| name.as_str())
    }

    pub fn is_disabled(&self, device: &Device) -> bool {
        self.disabled.iter().any(|pattern| matches(device, pattern))
    }
}

impl RoutingPolicy {
    pub fn rules(rules: &RuleSet) -> Self {
        RoutingPolicy::Rules(CompiledRules::new(rules))
    }

    pub fn time_bucket(lag_minutes: u32) -> Self {
        RoutingPolicy::TimeBucket { lag_minutes }
    }

    /// Group for `device` now, or `None` to leave it unmanaged
    pub fn route(&self, device: &Device) -> Option<String> {
        self.route_at(device, Local::now().time())
    }

    /// Group for `device` at the given wall-clock time
    pub fn route_at(&self, device: &Device, now: NaiveTime) -> Option<String> {
        match self {
            RoutingPolicy::Rules(rules) => rules.route(device).map(str::to_string),
            RoutingPolicy::TimeBucket { .. } => self.fixed_group_at(now),
        }
    }

    /// Group every device goes to right now, when the policy doesn't look
    /// at the device at all
    pub fn fixed_group(&self) -> Option<String> {
        self.fixed_group_at(Local::now().time())
    }

    pub fn fixed_group_at(&self, now: NaiveTime) -> Option<String> {
        match self {
            RoutingPolicy::Rules(_) => None,
            RoutingPolicy::TimeBucket { lag_minutes } => Some(time_bucket_name(now, *lag_minutes)),
        }
    }

    /// Whether `device` should be switched off instead of routed
    pub fn is_disabled(&self, device: &Device) -> bool {
        match self {
            RoutingPolicy::Rules(rules) => rules.is_disabled(device),
            RoutingPolicy::TimeBucket { .. } => false,
        }
    }
}

/// Group name for the `lag`-minute window containing `now`, e.g.
/// "Hecaton Master 1004" for 10:05 with a 2 minute lag
pub fn time_bucket_name(now: NaiveTime, lag_minutes: u32) -> String {
    let lag = lag_minutes.max(1);
    let minute = now.minute() - now.minute() % lag;
    format!("{} {:02}{:02}", TIME_BUCKET_PREFIX, now.hour(), minute)
}
