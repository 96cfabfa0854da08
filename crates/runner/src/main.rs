use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, tcp::OwnedReadHalf, tcp::OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tower_core::config::ConfigLoader;
use tower_core::payload::Invocation;
use tower_core::probe::{DeviceController, Frame, Probe, ProbeGateway, RecognitionResult};
use tower_core::shop::invoke;

struct ControlConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Host control port speaking newline-delimited JSON. Serves as both the recognizer and the device.
struct RemoteHost {
    conn: Mutex<ControlConn>,
}

impl RemoteHost {
    async fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect control port {addr}"))?;
        let (read, write) = stream.into_split();
        Ok(Self {
            conn: Mutex::new(ControlConn {
                reader: BufReader::new(read),
                writer: write,
            }),
        })
    }

    async fn request_json(&self, req: Value) -> anyhow::Result<Value> {
        let line = format!("{req}\n");
        let mut conn = self.conn.lock().await;
        conn.writer
            .write_all(line.as_bytes())
            .await
            .context("control write")?;
        conn.writer.flush().await.ok();

        let mut resp_line = String::new();
        let n = conn
            .reader
            .read_line(&mut resp_line)
            .await
            .context("control read")?;
        if n == 0 {
            anyhow::bail!("control connection closed");
        }
        serde_json::from_str(resp_line.trim()).context("invalid control json response")
    }

    fn probe_request(probe: &Probe, frame: &Frame) -> Value {
        json!({
            "op": "probe",
            "frame": frame.id,
            "probe": probe,
        })
    }

    fn click_request(x: i32, y: i32) -> Value {
        json!({ "op": "click", "x": x, "y": y })
    }

    fn override_request(pipeline: Value) -> Value {
        json!({ "op": "override_pipeline", "pipeline": pipeline })
    }

    async fn override_pipeline(&self, pipeline: Value) -> anyhow::Result<()> {
        let v = self.request_json(Self::override_request(pipeline)).await?;
        if v.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            anyhow::bail!("override_pipeline failed: {}", v);
        }
        Ok(())
    }

    /// Checks the `ok` flag and pulls `field` out of a successful response.
    fn take_field(op: &str, resp: &Value, field: &str) -> anyhow::Result<Value> {
        if resp.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let reason = resp
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            anyhow::bail!("{op} failed: {reason}");
        }
        resp.get(field)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing {field} in {op} response"))
    }
}

impl ProbeGateway for RemoteHost {
    fn probe<'a>(
        &'a self,
        probe: &'a Probe,
        frame: &'a Frame,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<RecognitionResult>> + Send + 'a>> {
        Box::pin(async move {
            let v = self.request_json(Self::probe_request(probe, frame)).await?;
            let result = Self::take_field("probe", &v, "result")?;
            serde_json::from_value(result).context("decode probe result")
        })
    }
}

impl DeviceController for RemoteHost {
    fn capture<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<Frame>> + Send + 'a>> {
        Box::pin(async move {
            let v = self.request_json(json!({ "op": "capture" })).await?;
            let frame = Self::take_field("capture", &v, "frame")?;
            serde_json::from_value(frame).context("decode frame")
        })
    }

    fn click<'a>(
        &'a self,
        x: i32,
        y: i32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let v = self.request_json(Self::click_request(x, y)).await?;
            if v.get("ok").and_then(|v| v.as_bool()) != Some(true) {
                anyhow::bail!("click failed: {}", v);
            }
            Ok(())
        })
    }
}

/// Payload from the first CLI argument, else `TOWER_AGENT_PAYLOAD`.
fn read_payload() -> anyhow::Result<Value> {
    let raw = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TOWER_AGENT_PAYLOAD").ok())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("no payload: pass it as an argument or TOWER_AGENT_PAYLOAD"))?;
    // Kept as a string so the flow applies its own payload parsing.
    Ok(Value::String(raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let control_addr = std::env::var("TOWER_AGENT_CONTROL_ADDR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "127.0.0.1:7878".to_string());

    let payload = read_payload()?;
    let invocation = Invocation::from_value(&payload)?;
    let host = RemoteHost::connect(&control_addr).await?;
    tracing::info!(addr = %control_addr, "runner.connected");

    if let Invocation::Repeat(req) = invocation {
        if let Some(pipeline) = req.pipeline_override() {
            host.override_pipeline(pipeline).await?;
        }
        tracing::info!("runner.done");
        return Ok(());
    }

    let settings = ConfigLoader::load_flow_settings("shop_flow.toml")?;

    let stop = CancellationToken::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("runner.interrupt");
            on_signal.cancel();
        }
    });

    if !invoke(&host, &host, &payload, &settings, &stop).await {
        anyhow::bail!("shop flow failed");
    }
    tracing::info!("runner.done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_core::probe::Marker;

    #[test]
    fn probe_request_carries_frame_and_tagged_probe() {
        let frame = Frame {
            id: 42,
            width: 1280,
            height: 720,
        };
        let v = RemoteHost::probe_request(&Probe::from(Marker::Refresh), &frame);
        assert_eq!(v["op"], "probe");
        assert_eq!(v["frame"], 42);
        assert_eq!(v["probe"]["kind"], "marker");
        assert_eq!(v["probe"]["marker"], "refresh");

        let v = RemoteHost::probe_request(&Probe::text("Flower Sea"), &frame);
        assert_eq!(v["probe"]["expected"], "Flower Sea");
    }

    #[test]
    fn click_request_shape() {
        assert_eq!(
            RemoteHost::click_request(695, 225),
            json!({ "op": "click", "x": 695, "y": 225 })
        );
    }

    #[test]
    fn repeat_payload_becomes_override_request() {
        let Invocation::Repeat(req) =
            Invocation::from_value(&json!(r#"{"type":"calc_repeat","runs":3}"#)).unwrap()
        else {
            panic!("expected a repeat request");
        };
        let v = RemoteHost::override_request(req.pipeline_override().unwrap());
        assert_eq!(v["op"], "override_pipeline");
        assert_eq!(v["pipeline"][req.node.as_str()]["repeat"], 2);
    }

    #[test]
    fn responses_decode_or_surface_the_host_error() {
        let ok = json!({ "ok": true, "result": { "hit": true, "bbox": [1, 2, 3, 4] } });
        let result: RecognitionResult =
            serde_json::from_value(RemoteHost::take_field("probe", &ok, "result").unwrap())
                .unwrap();
        assert!(result.hit);

        let frame = json!({ "ok": true, "frame": { "id": 7, "width": 1280, "height": 720 } });
        let frame: Frame =
            serde_json::from_value(RemoteHost::take_field("capture", &frame, "frame").unwrap())
                .unwrap();
        assert_eq!(frame.id, 7);

        let bad = json!({ "ok": false, "error": "emulator offline" });
        let err = RemoteHost::take_field("capture", &bad, "frame").unwrap_err();
        assert!(err.to_string().contains("emulator offline"));

        let missing = json!({ "ok": true });
        assert!(RemoteHost::take_field("probe", &missing, "result").is_err());
    }
}
