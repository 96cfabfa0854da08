use serde_json::{Value, json};

/// Host pipeline node that adds extra runs before a battle.
pub const DEFAULT_ADD_RUNS_NODE: &str = "活动_添加战斗次数";
/// Where a single-run plan continues after skipping the add-runs node.
pub const DEFAULT_SKIP_NEXT: [&str; 2] = ["活动_确认", "活动_开始战斗"];

/// How the host should treat its "add runs" node for a requested number of runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatPlan {
    /// Parameter missing or unusable; leave the pipeline alone.
    Unchanged,
    /// Exactly one run: skip the "add runs" click and go straight to confirm/start.
    SkipExtraRuns,
    /// Repeat the "add runs" node this many times.
    ExtraRuns(u32),
}

impl RepeatPlan {
    pub fn from_param(raw: Option<&Value>) -> Self {
        let Some(raw) = raw else {
            return RepeatPlan::Unchanged;
        };

        let value: i64 = match raw {
            Value::Null => return RepeatPlan::Unchanged,
            Value::Number(n) => match n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)) {
                Some(v) => v,
                None => return RepeatPlan::Unchanged,
            },
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return RepeatPlan::Unchanged;
                }
                match s.parse() {
                    Ok(v) => v,
                    Err(err) => {
                        tracing::warn!(param = s, %err, "repeat.param.invalid");
                        return RepeatPlan::Unchanged;
                    }
                }
            }
            other => {
                tracing::warn!(param = %other, "repeat.param.invalid");
                return RepeatPlan::Unchanged;
            }
        };

        let value = value.max(1);
        if value == 1 {
            return RepeatPlan::SkipExtraRuns;
        }
        RepeatPlan::ExtraRuns(u32::try_from(value - 1).unwrap_or(u32::MAX))
    }

    /// Host pipeline override for `node`, or `None` when nothing should change.
    pub fn pipeline_override(&self, node: &str, skip_next: &[&str]) -> Option<Value> {
        match self {
            RepeatPlan::Unchanged => None,
            RepeatPlan::SkipExtraRuns => Some(json!({
                node: {
                    "recognition": { "type": "DirectHit", "param": {} },
                    "action": { "type": "DoNothing", "param": {} },
                    "next": skip_next,
                }
            })),
            RepeatPlan::ExtraRuns(n) => Some(json!({ node: { "repeat": n } })),
        }
    }
}

/// A `calc_repeat` invocation: the raw run count plus the pipeline nodes it rewrites.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatRequest {
    pub runs: Option<Value>,
    pub node: String,
    pub skip_next: Vec<String>,
}

impl Default for RepeatRequest {
    fn default() -> Self {
        Self {
            runs: None,
            node: DEFAULT_ADD_RUNS_NODE.to_string(),
            skip_next: DEFAULT_SKIP_NEXT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RepeatRequest {
    pub fn plan(&self) -> RepeatPlan {
        RepeatPlan::from_param(self.runs.as_ref())
    }

    /// The override to hand the host, or `None` when the pipeline stays as is.
    pub fn pipeline_override(&self) -> Option<Value> {
        let plan = self.plan();
        let next: Vec<&str> = self.skip_next.iter().map(String::as_str).collect();
        let doc = plan.pipeline_override(&self.node, &next);
        tracing::info!(?plan, node = %self.node, "repeat.plan");
        doc
    }
}
