use serde::Deserialize;
use serde_json::Value;

use crate::error::FlowError;
use crate::priority::PriorityTable;
use crate::repeat::{DEFAULT_ADD_RUNS_NODE, DEFAULT_SKIP_NEXT, RepeatRequest};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    CompleteShopFlow,
    /// Translate a run count into a host pipeline override.
    CalcRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShopType {
    #[default]
    Regular,
    /// Last shop of a run: may be refreshed once the grid is exhausted.
    Final,
}

impl ShopType {
    /// Only `final` is special; anything else runs as a regular shop.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "final" => ShopType::Final,
            "regular" => ShopType::Regular,
            other => {
                tracing::warn!(shop_type = other, "payload.shop_type.unknown");
                ShopType::Regular
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopPayload {
    pub shop_type: ShopType,
    pub buff_priority: PriorityTable,
}

/// A parsed host invocation, one variant per supported `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Shop(ShopPayload),
    Repeat(RepeatRequest),
}

#[derive(Deserialize)]
struct PayloadWire {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    shop_type: Value,
    #[serde(default)]
    buff_priority: Value,
    #[serde(default)]
    runs: Option<Value>,
    #[serde(default)]
    node: Option<String>,
    #[serde(default)]
    skip_next: Option<Vec<String>>,
}

impl Invocation {
    /// Parses the invocation payload: a JSON object, or a JSON string encoding one.
    pub fn from_value(raw: &Value) -> Result<Self, FlowError> {
        let obj = match raw {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map_err(|e| FlowError::Config(format!("payload is not json: {e}")))?,
            other => other.clone(),
        };
        if !obj.is_object() {
            return Err(FlowError::Config("payload must be an object".to_string()));
        }

        let wire: PayloadWire = serde_json::from_value(obj)
            .map_err(|e| FlowError::Config(format!("payload decode failed: {e}")))?;

        let kind_text = wire
            .kind
            .ok_or_else(|| FlowError::Config("missing flow type".to_string()))?;
        let kind: FlowKind = serde_json::from_value(Value::String(kind_text.clone()))
            .map_err(|_| FlowError::Config(format!("unsupported flow type: {kind_text}")))?;

        match kind {
            FlowKind::CompleteShopFlow => {
                let shop_type = match &wire.shop_type {
                    Value::Null => ShopType::Regular,
                    Value::String(s) => ShopType::from_label(s),
                    other => ShopType::from_label(&other.to_string()),
                };

                // A bad priority table only costs the named-target preference, not the whole flow.
                let buff_priority = match PriorityTable::from_value(&wire.buff_priority) {
                    Ok(table) => table,
                    Err(err) => {
                        tracing::warn!(error = %format!("{err:#}"), "payload.buff_priority.invalid");
                        PriorityTable::default()
                    }
                };

                Ok(Invocation::Shop(ShopPayload {
                    shop_type,
                    buff_priority,
                }))
            }
            FlowKind::CalcRepeat => Ok(Invocation::Repeat(RepeatRequest {
                runs: wire.runs,
                node: wire
                    .node
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ADD_RUNS_NODE.to_string()),
                skip_next: wire
                    .skip_next
                    .unwrap_or_else(|| DEFAULT_SKIP_NEXT.iter().map(|s| s.to_string()).collect()),
            })),
        }
    }
}

impl ShopPayload {
    /// Parses a payload that must select the shop flow.
    pub fn from_value(raw: &Value) -> Result<Self, FlowError> {
        match Invocation::from_value(raw)? {
            Invocation::Shop(payload) => Ok(payload),
            Invocation::Repeat(_) => Err(FlowError::Config(
                "calc_repeat is not a shop flow".to_string(),
            )),
        }
    }

    pub fn parse_str(raw: &str) -> Result<Self, FlowError> {
        Self::from_value(&Value::String(raw.to_string()))
    }
}
