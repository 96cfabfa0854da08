//! The shop episode: classification, per-state handlers, and the loop that drives them.

mod buff;
pub mod classifier;
pub mod context;
pub mod controller;
pub mod handlers;
pub mod inventory;
pub mod refresh;
pub mod state;

pub use classifier::classify;
pub use context::FlowContext;
pub use controller::{FlowExit, FlowReport, invoke, run_shop_flow};
pub use handlers::{HandlerStep, ItemKind, ShopFlow, SlotProbe};
pub use inventory::{GridInventory, GridSlot};
pub use refresh::RefreshOutcome;
pub use state::{RecognitionCache, ScreenState};
