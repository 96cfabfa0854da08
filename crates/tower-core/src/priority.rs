//! Named-target selection for the buff offer screen.
//!
//! The invoking pipeline may hand over a table of `priority -> [target names]`. On the buff screen
//! each target is tried as a text probe, highest priority first, before falling back to the
//! recommendation marker.

use std::collections::BTreeMap;

use anyhow::Context;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::StopRequested;
use crate::probe::{Frame, Probe, ProbeGateway, Rect};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityTable {
    tiers: BTreeMap<i64, Vec<String>>,
}

impl PriorityTable {
    /// Normalizes a raw table: a JSON object, or a string containing one.
    ///
    /// Keys that are not integers are skipped. Values may be a single string or a list.
    /// Blank targets are dropped. `null` and blank strings yield an empty table.
    pub fn from_value(raw: &Value) -> anyhow::Result<Self> {
        let parsed;
        let obj = match raw {
            Value::Null => return Ok(Self::default()),
            Value::String(s) => {
                if s.trim().is_empty() {
                    return Ok(Self::default());
                }
                parsed = serde_json::from_str::<Value>(s).context("priority table is not json")?;
                parsed
                    .as_object()
                    .ok_or_else(|| anyhow::anyhow!("priority table must be an object"))?
            }
            Value::Object(map) => map,
            _ => anyhow::bail!("priority table must be an object or a json string"),
        };

        let mut tiers = BTreeMap::new();
        for (key, value) in obj {
            let Ok(priority) = key.trim().parse::<i64>() else {
                continue;
            };
            let targets: Vec<String> = match value {
                Value::Array(items) => items.iter().map(target_text).collect(),
                other => vec![target_text(other)],
            };
            let targets: Vec<String> = targets
                .into_iter()
                .filter(|t| !t.trim().is_empty())
                .collect();
            tiers.insert(priority, targets);
        }
        Ok(Self { tiers })
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.values().all(|t| t.is_empty())
    }

    /// Targets in evaluation order: highest priority first, listed order within a priority.
    pub fn ordered(&self) -> impl Iterator<Item = (i64, &str)> {
        self.tiers
            .iter()
            .rev()
            .flat_map(|(p, targets)| targets.iter().map(move |t| (*p, t.as_str())))
    }
}

fn target_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityHit {
    pub priority: i64,
    pub target: String,
    pub bbox: Rect,
}

/// Runs one text probe per target until something hits. Checks `stop` before every probe.
pub async fn find_priority_target(
    gateway: &dyn ProbeGateway,
    frame: &Frame,
    table: &PriorityTable,
    stop: &CancellationToken,
) -> anyhow::Result<Option<PriorityHit>> {
    for (priority, target) in table.ordered() {
        if stop.is_cancelled() {
            return Err(StopRequested.into());
        }
        tracing::debug!(priority, name = target, "buff.priority.probe");
        let probe = Probe::text(target);
        let res = gateway
            .probe(&probe, frame)
            .await
            .with_context(|| format!("probe text {target:?}"))?;
        if let Some(bbox) = res.actionable() {
            tracing::info!(priority, name = target, ?bbox, "buff.priority.hit");
            return Ok(Some(PriorityHit {
                priority,
                target: target.to_string(),
                bbox,
            }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ordered(table: &PriorityTable) -> Vec<(i64, String)> {
        table.ordered().map(|(p, t)| (p, t.to_string())).collect()
    }

    #[test]
    fn normalizes_keys_values_and_blanks() {
        let table = PriorityTable::from_value(&json!({
            "2": ["Wind Seed", " ", "Self Improvement"],
            "3": "Flower Sea",
            "high": ["ignored"],
            "1": [],
        }))
        .unwrap();
        assert_eq!(
            ordered(&table),
            vec![
                (3, "Flower Sea".to_string()),
                (2, "Wind Seed".to_string()),
                (2, "Self Improvement".to_string()),
            ]
        );
    }

    #[test]
    fn accepts_json_string_and_treats_blank_as_empty() {
        let table = PriorityTable::from_value(&json!(r#"{"5": ["A"], "7": ["B"]}"#)).unwrap();
        assert_eq!(ordered(&table), vec![(7, "B".into()), (5, "A".into())]);

        assert!(PriorityTable::from_value(&json!("  ")).unwrap().is_empty());
        assert!(PriorityTable::from_value(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_object_tables() {
        assert!(PriorityTable::from_value(&json!([1, 2])).is_err());
        assert!(PriorityTable::from_value(&json!("[1, 2]")).is_err());
        assert!(PriorityTable::from_value(&json!("{not json")).is_err());
    }
}
