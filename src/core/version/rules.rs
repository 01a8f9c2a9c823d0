// ─── Rule Evaluator ───
// Decides whether a rule-gated manifest entry applies to a host.
//
// Default is exclude, rules apply in declared order and every matching
// rule overwrites the decision (last match wins). An empty list includes.

use std::collections::HashMap;

use serde::Deserialize;

use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::platform::RuleContext;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Rule {
    #[serde(default)]
    pub action: Option<RuleAction>,
    #[serde(default)]
    pub os: Option<OsRule>,
    #[serde(default)]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

/// Result of evaluating a rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Include,
    Exclude,
}

impl RuleOutcome {
    pub fn is_included(self) -> bool {
        self == RuleOutcome::Include
    }
}

impl Rule {
    pub fn allow() -> Self {
        Self {
            action: Some(RuleAction::Allow),
            os: None,
            features: None,
        }
    }

    pub fn disallow() -> Self {
        Self {
            action: Some(RuleAction::Disallow),
            ..Self::allow()
        }
    }

    pub fn for_os(mut self, name: &str) -> Self {
        self.os.get_or_insert_with(OsRule::default).name = Some(name.to_string());
        self
    }

    pub fn for_arch(mut self, arch: &str) -> Self {
        self.os.get_or_insert_with(OsRule::default).arch = Some(arch.to_string());
        self
    }

    pub fn with_feature(mut self, key: &str, value: bool) -> Self {
        self.features
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value);
        self
    }

    /// Every condition the rule states must equal the input; omitted ones are wildcards.
    /// Feature flags absent from the context count as `false`.
    fn matches(&self, ctx: &RuleContext) -> bool {
        if let Some(os) = &self.os {
            if let Some(name) = &os.name {
                if name != &ctx.os_name {
                    return false;
                }
            }
            if let Some(arch) = &os.arch {
                if ctx.os_arch.as_deref() != Some(arch.as_str()) {
                    return false;
                }
            }
        }

        if let Some(required) = &self.features {
            for (key, expected) in required {
                let actual = ctx
                    .features
                    .as_ref()
                    .and_then(|f| f.get(key))
                    .copied()
                    .unwrap_or(false);
                if actual != *expected {
                    return false;
                }
            }
        }

        true
    }
}

/// Evaluate `rules` against `ctx`.
///
/// A missing or unrecognized action anywhere in the list is a malformed
/// manifest and fails regardless of whether that rule would have matched.
pub fn evaluate(rules: &[Rule], ctx: &RuleContext) -> ProvisionResult<RuleOutcome> {
    if rules.is_empty() {
        return Ok(RuleOutcome::Include);
    }

    let mut outcome = RuleOutcome::Exclude;
    for (index, rule) in rules.iter().enumerate() {
        let action = match rule.action {
            Some(RuleAction::Allow) => RuleOutcome::Include,
            Some(RuleAction::Disallow) => RuleOutcome::Exclude,
            Some(RuleAction::Unrecognized) => {
                return Err(ProvisionError::InvalidRule {
                    index,
                    action: "unrecognized".into(),
                })
            }
            None => {
                return Err(ProvisionError::InvalidRule {
                    index,
                    action: "missing".into(),
                })
            }
        };

        if rule.matches(ctx) {
            outcome = action;
        }
    }

    Ok(outcome)
}

/// Same as [`evaluate`] for an optional list; `None` includes.
pub fn evaluate_optional(
    rules: Option<&[Rule]>,
    ctx: &RuleContext,
) -> ProvisionResult<RuleOutcome> {
    match rules {
        Some(rules) => evaluate(rules, ctx),
        None => Ok(RuleOutcome::Include),
    }
}
