use tokio::time::Instant;

use super::inventory::GridInventory;
use super::state::RecognitionCache;

/// Mutable state of one shop episode. Owned by a single controller; dropped when the loop exits.
#[derive(Debug, Clone)]
pub struct FlowContext {
    shop_processed: bool,
    strengthen_processed: bool,
    pub inventory: GridInventory,
    pub cache: RecognitionCache,
    pub iteration: u64,
    pub started_at: Instant,
    pub consecutive_complete: u32,
    pub purchases: u32,
}

impl FlowContext {
    pub fn new(started_at: Instant) -> Self {
        Self {
            shop_processed: false,
            strengthen_processed: false,
            inventory: GridInventory::default(),
            cache: RecognitionCache::default(),
            iteration: 0,
            started_at,
            consecutive_complete: 0,
            purchases: 0,
        }
    }

    pub fn shop_processed(&self) -> bool {
        self.shop_processed
    }

    pub fn strengthen_processed(&self) -> bool {
        self.strengthen_processed
    }

    /// One-way: the shop flag never goes back to false within an episode.
    /// Returns whether this call flipped it.
    pub fn mark_shop_processed(&mut self) -> bool {
        if self.shop_processed {
            return false;
        }
        self.shop_processed = true;
        tracing::info!(iteration = self.iteration, "shop.flag.shop_processed");
        true
    }

    /// One-way, like [`Self::mark_shop_processed`].
    pub fn mark_strengthen_processed(&mut self) -> bool {
        if self.strengthen_processed {
            return false;
        }
        self.strengthen_processed = true;
        tracing::info!(iteration = self.iteration, "shop.flag.strengthen_processed");
        true
    }
}
