use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Screen rectangle in device pixels, serialized as `[x, y, w, h]`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Click point for this rectangle. Integer division, matching the host's own rounding.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

impl From<[i32; 4]> for Rect {
    fn from([x, y, w, h]: [i32; 4]) -> Self {
        Self { x, y, w, h }
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        [r.x, r.y, r.w, r.h]
    }
}

/// Outcome of one probe against one frame. Never mutated after the gateway hands it out.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct RecognitionResult {
    pub hit: bool,
    #[serde(default)]
    pub bbox: Option<Rect>,
}

impl RecognitionResult {
    pub const MISS: Self = Self {
        hit: false,
        bbox: None,
    };

    pub fn hit_at(bbox: Rect) -> Self {
        Self {
            hit: true,
            bbox: Some(bbox),
        }
    }

    /// The box to click, if the probe hit and located its element.
    pub fn actionable(&self) -> Option<Rect> {
        if self.hit { self.bbox } else { None }
    }
}

/// Opaque handle to a captured screen image. The pixels stay with the controller.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct Frame {
    pub id: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Every visual marker the shop flow knows how to ask the recognizer about.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    BuffRecommend,
    BuffTake,
    ItemDetail,
    BlankClose,
    ShopMain,
    ShopEntry,
    EndStrengthen,
    NotEnoughMoney,
    Strengthen,
    NextFloor,
    FinalLeave,
    Leave,
    SoldOut,
    ItemBuff,
    ItemNote,
    BuffDiscount,
    Discount,
    NoteActive,
    Buy,
    CloseItem,
    Back,
    Refresh,
    CannotRefresh,
}

impl Marker {
    /// Stable node name the host pipeline registers this probe under.
    pub fn name(&self) -> &'static str {
        match self {
            Marker::BuffRecommend => "tower.buff.recommend",
            Marker::BuffTake => "tower.buff.take",
            Marker::ItemDetail => "tower.shop.item.detail",
            Marker::BlankClose => "tower.blank_close",
            Marker::ShopMain => "tower.shop.main",
            Marker::ShopEntry => "tower.shop.entry",
            Marker::EndStrengthen => "tower.shop.strengthen.end",
            Marker::NotEnoughMoney => "tower.shop.item.not_enough_money",
            Marker::Strengthen => "tower.shop.strengthen",
            Marker::NextFloor => "tower.shop.next_floor",
            Marker::FinalLeave => "tower.final_shop.leave",
            Marker::Leave => "tower.leave",
            Marker::SoldOut => "tower.shop.item.sold_out",
            Marker::ItemBuff => "tower.shop.item.buff",
            Marker::ItemNote => "tower.shop.item.note",
            Marker::BuffDiscount => "tower.shop.item.buff_discount",
            Marker::Discount => "tower.shop.item.discount",
            Marker::NoteActive => "tower.shop.item.note_active",
            Marker::Buy => "tower.shop.item.buy",
            Marker::CloseItem => "tower.shop.item.close",
            Marker::Back => "tower.shop.back",
            Marker::Refresh => "tower.final_shop.refresh",
            Marker::CannotRefresh => "tower.final_shop.cannot_refresh",
        }
    }
}

/// What to ask the recognizer: a registered marker, or an OCR match for a literal string.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Probe {
    Marker { marker: Marker },
    Text { expected: String },
}

impl Probe {
    pub fn text(expected: impl Into<String>) -> Self {
        Probe::Text {
            expected: expected.into(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Probe::Marker { marker } => marker.name(),
            Probe::Text { expected } => expected,
        }
    }
}

impl From<Marker> for Probe {
    fn from(marker: Marker) -> Self {
        Probe::Marker { marker }
    }
}

/// Boundary to the external recognizer. Implementations must be side-effect free.
pub trait ProbeGateway: Send + Sync {
    fn probe<'a>(
        &'a self,
        probe: &'a Probe,
        frame: &'a Frame,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<RecognitionResult>> + Send + 'a>>;
}

/// Boundary to the device: screen capture and taps. Both complete before returning.
pub trait DeviceController: Send + Sync {
    fn capture<'a>(&'a self) -> Pin<Box<dyn Future<Output = anyhow::Result<Frame>> + Send + 'a>>;

    fn click<'a>(
        &'a self,
        x: i32,
        y: i32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}
