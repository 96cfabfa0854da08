use std::collections::VecDeque;

use crate::probe::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSlot {
    /// 1-based position in the shop grid; the slot's identity.
    pub index: u8,
    pub region: Rect,
}

/// Slots still to visit in the current shop episode, in ascending index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridInventory {
    slots: Option<VecDeque<GridSlot>>,
    discoveries: u32,
}

impl GridInventory {
    pub fn is_discovered(&self) -> bool {
        self.slots.is_some()
    }

    /// How many times the grid has been (re)discovered this episode.
    pub fn discoveries(&self) -> u32 {
        self.discoveries
    }

    /// Populates the inventory from the fixed grid if it has not been discovered yet.
    ///
    /// Every region counts as available; there is no disqualifying probe at discovery time.
    pub fn discover_if_needed(&mut self, regions: &[Rect]) -> bool {
        if self.slots.is_some() {
            return false;
        }
        let slots = regions
            .iter()
            .enumerate()
            .map(|(i, region)| GridSlot {
                index: u8::try_from(i + 1).unwrap_or(u8::MAX),
                region: *region,
            })
            .collect();
        self.slots = Some(slots);
        self.discoveries += 1;
        true
    }

    pub fn front(&self) -> Option<GridSlot> {
        self.slots.as_ref().and_then(|s| s.front().copied())
    }

    /// Drops the front slot once it is resolved (sold out, unaffordable, or handled).
    pub fn resolve_front(&mut self) -> Option<GridSlot> {
        self.slots.as_mut().and_then(|s| s.pop_front())
    }

    pub fn remaining(&self) -> usize {
        self.slots.as_ref().map_or(0, |s| s.len())
    }

    pub fn indices(&self) -> Vec<u8> {
        self.slots
            .as_ref()
            .map(|s| s.iter().map(|g| g.index).collect())
            .unwrap_or_default()
    }

    /// Forgets the grid so the next shop-main pass rediscovers it. Only a successful refresh does this.
    pub fn reset(&mut self) {
        self.slots = None;
    }
}
