// ─── Launch Arguments ───
// `arguments.game` / `arguments.jvm` entries: plain strings or rule-gated values.

use std::collections::HashMap;

use serde::Deserialize;

use crate::core::error::ProvisionResult;
use crate::core::platform::RuleContext;

use super::rules::{self, Rule};

/// Feature flags offered when resolving game arguments.
pub const GAME_FEATURES: [&str; 3] = [
    "is_demo_user",
    "has_custom_resolution",
    "has_quick_plays_support",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Argument {
    Literal(String),
    Conditional {
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl Argument {
    /// Values this argument contributes under `ctx` (empty when its rules exclude it).
    pub fn resolve(&self, ctx: &RuleContext) -> ProvisionResult<Vec<String>> {
        match self {
            Argument::Literal(arg) => Ok(vec![arg.clone()]),
            Argument::Conditional { rules, value } => {
                if !rules::evaluate(rules, ctx)?.is_included() {
                    return Ok(Vec::new());
                }
                Ok(match value {
                    ArgumentValue::One(v) => vec![v.clone()],
                    ArgumentValue::Many(vs) => vs.clone(),
                })
            }
        }
    }
}

impl Arguments {
    /// Game arguments; feature flags missing from `ctx` default to `false`.
    pub fn resolve_game(&self, ctx: &RuleContext) -> ProvisionResult<Vec<String>> {
        let ctx = match &ctx.features {
            Some(_) => ctx.clone(),
            None => ctx.clone().with_features(default_game_features()),
        };
        resolve_all(&self.game, &ctx)
    }

    pub fn resolve_jvm(&self, ctx: &RuleContext) -> ProvisionResult<Vec<String>> {
        resolve_all(&self.jvm, ctx)
    }
}

pub fn default_game_features() -> HashMap<String, bool> {
    GAME_FEATURES
        .iter()
        .map(|key| (key.to_string(), false))
        .collect()
}

fn resolve_all(args: &[Argument], ctx: &RuleContext) -> ProvisionResult<Vec<String>> {
    let mut out = Vec::new();
    for arg in args {
        out.extend(arg.resolve(ctx)?);
    }
    Ok(out)
}
