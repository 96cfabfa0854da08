//! In-process fakes for the recognizer and device boundaries.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::probe::{DeviceController, Frame, Marker, Probe, ProbeGateway, Rect, RecognitionResult};

/// What is visible on one captured frame.
#[derive(Debug, Clone, Default)]
pub struct Screen {
    markers: HashMap<Marker, Rect>,
    texts: HashMap<String, Rect>,
}

impl Screen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, marker: Marker, rect: Rect) -> Self {
        self.markers.insert(marker, rect);
        self
    }

    pub fn showing(marker: Marker) -> Self {
        Self::new().with(marker, Rect::new(100, 100, 40, 20))
    }

    pub fn with_text(mut self, text: &str, rect: Rect) -> Self {
        self.texts.insert(text.to_string(), rect);
        self
    }

    fn lookup(&self, probe: &Probe) -> RecognitionResult {
        let found = match probe {
            Probe::Marker { marker } => self.markers.get(marker),
            Probe::Text { expected } => self.texts.get(expected),
        };
        found.map(|r| RecognitionResult::hit_at(*r)).unwrap_or_default()
    }
}

/// Replays scripted screens: each capture pops the next one (or the idle screen once the script
/// runs out) and every probe is answered from the screen of the frame it names.
#[derive(Default)]
pub struct FakeHost {
    script: Mutex<VecDeque<Screen>>,
    idle: Mutex<Screen>,
    frames: Mutex<HashMap<u64, Screen>>,
    next_frame: Mutex<u64>,
    clicks: Mutex<Vec<(i32, i32)>>,
    probes: Mutex<Vec<(String, u64)>>,
    failing: Mutex<HashSet<Marker>>,
}

impl FakeHost {
    pub fn push_screen(&self, screen: Screen) {
        self.script.lock().unwrap().push_back(screen);
    }

    pub fn set_idle(&self, screen: Screen) {
        *self.idle.lock().unwrap() = screen;
    }

    pub fn fail_probe(&self, marker: Marker) {
        self.failing.lock().unwrap().insert(marker);
    }

    pub fn clicks(&self) -> Vec<(i32, i32)> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn capture_count(&self) -> u64 {
        *self.next_frame.lock().unwrap()
    }

    pub fn probes(&self) -> Vec<(String, u64)> {
        self.probes.lock().unwrap().clone()
    }

    pub fn probe_count(&self, marker: Marker) -> usize {
        self.probes
            .lock()
            .unwrap()
            .iter()
            .filter(|(label, _)| label == marker.name())
            .count()
    }
}

impl ProbeGateway for FakeHost {
    fn probe<'a>(
        &'a self,
        probe: &'a Probe,
        frame: &'a Frame,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<RecognitionResult>> + Send + 'a>> {
        Box::pin(async move {
            self.probes
                .lock()
                .unwrap()
                .push((probe.label().to_string(), frame.id));
            if let Probe::Marker { marker } = probe
                && self.failing.lock().unwrap().contains(marker)
            {
                anyhow::bail!("recognizer crashed on {}", marker.name());
            }
            let frames = self.frames.lock().unwrap();
            Ok(frames
                .get(&frame.id)
                .map(|s| s.lookup(probe))
                .unwrap_or_default())
        })
    }
}

impl DeviceController for FakeHost {
    fn capture<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<Frame>> + Send + 'a>> {
        Box::pin(async move {
            let screen = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.idle.lock().unwrap().clone());
            let mut next = self.next_frame.lock().unwrap();
            *next += 1;
            let id = *next;
            self.frames.lock().unwrap().insert(id, screen);
            Ok(Frame {
                id,
                width: 1280,
                height: 720,
            })
        })
    }

    fn click<'a>(
        &'a self,
        x: i32,
        y: i32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.clicks.lock().unwrap().push((x, y));
            Ok(())
        })
    }
}
