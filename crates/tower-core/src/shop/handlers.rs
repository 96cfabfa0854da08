use crate::action::{Actor, BACK, BUY, CLOSE_ITEM, ClickOutcome};
use crate::payload::ShopType;
use crate::priority::PriorityTable;
use crate::probe::Marker;

use super::context::FlowContext;
use super::inventory::GridSlot;
use super::state::ScreenState;

/// What the controller should do after a handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStep {
    Continue,
    /// End the flow successfully.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Buff,
    Note,
}

impl ItemKind {
    fn discount_marker(&self) -> Marker {
        match self {
            ItemKind::Buff => Marker::BuffDiscount,
            ItemKind::Note => Marker::Discount,
        }
    }
}

/// Result of tapping one grid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotProbe {
    SoldOut,
    NotEnoughMoney,
    Item(ItemKind),
    /// Neither a verdict nor a detail screen showed up yet; retry the slot next pass.
    Undefined,
}

/// Per-state handlers for one shop episode. Holds no episode state of its own; everything
/// mutable lives in the [`FlowContext`] passed in.
pub struct ShopFlow<'a> {
    pub(crate) actor: Actor<'a>,
    pub(crate) shop_type: ShopType,
    pub(crate) buff_priority: &'a PriorityTable,
}

impl<'a> ShopFlow<'a> {
    pub fn new(actor: Actor<'a>, shop_type: ShopType, buff_priority: &'a PriorityTable) -> Self {
        Self {
            actor,
            shop_type,
            buff_priority,
        }
    }

    pub fn actor(&self) -> &Actor<'a> {
        &self.actor
    }

    pub async fn handle(
        &self,
        state: ScreenState,
        ctx: &mut FlowContext,
    ) -> anyhow::Result<HandlerStep> {
        match state {
            ScreenState::ShopShopping | ScreenState::BlankClose | ScreenState::StrengthenProcess => {
                if self.click_cached(state, ctx).await? {
                    self.actor.settle().await;
                }
            }
            // Exit buttons pause whether or not the click happened.
            ScreenState::ShopNextFloor | ScreenState::FinalShopLeave | ScreenState::LeaveTower => {
                self.click_cached(state, ctx).await?;
                self.actor.settle().await;
            }
            ScreenState::ItemMain => {
                self.actor.recognize_and_click(CLOSE_ITEM, None).await?;
            }
            ScreenState::BuffMain => {
                let picked = self.select_buff().await?;
                tracing::info!(picked, "shop.buff.selected");
            }
            ScreenState::ShopMain => {
                self.resolve_grid(ctx).await?;
            }
            ScreenState::ShopMainProcessed => {
                self.actor
                    .recognize_and_click(BACK.with_fallback(self.actor.settings.back_button), None)
                    .await?;
                self.actor.settle().await;
            }
            ScreenState::EndStrengthen | ScreenState::NotEnoughMoneySetStrengthenProcessed => {
                ctx.mark_strengthen_processed();
            }
            ScreenState::ItemBuff | ScreenState::ItemNote => {
                let bought = self.actor.recognize_and_click(BUY, None).await?;
                if bought.success() {
                    ctx.purchases += 1;
                }
                self.actor.recognize_and_click(CLOSE_ITEM, None).await?;
            }
            ScreenState::NotEnoughMoney | ScreenState::SoldOut => {
                self.actor.click_blank().await?;
            }
            ScreenState::Unknown => {
                tracing::warn!(iteration = ctx.iteration, "shop.state.unknown");
                self.actor.click_blank().await?;
                return Ok(HandlerStep::Stop);
            }
            // Counted by the controller; nothing to click.
            ScreenState::ShopFlowComplete => {}
        }
        Ok(HandlerStep::Continue)
    }

    /// Clicks the box the classifier already found for `state`. Returns whether a click happened.
    async fn click_cached(&self, state: ScreenState, ctx: &FlowContext) -> anyhow::Result<bool> {
        match ctx.cache.for_state(state).and_then(|r| r.actionable()) {
            Some(bbox) => {
                tracing::info!(%state, ?bbox, "shop.click.cached");
                self.actor.click_rect(bbox).await?;
                Ok(true)
            }
            None => {
                tracing::debug!(%state, "shop.click.cached_missing");
                Ok(false)
            }
        }
    }

    /// Works through the grid one slot per call.
    async fn resolve_grid(&self, ctx: &mut FlowContext) -> anyhow::Result<()> {
        let settings = self.actor.settings;
        if ctx.inventory.discover_if_needed(&settings.grid_regions) {
            tracing::info!(slots = ?ctx.inventory.indices(), "shop.grid.discovered");
        }

        if let Some(slot) = ctx.inventory.front() {
            match self.open_slot(slot).await? {
                SlotProbe::SoldOut | SlotProbe::NotEnoughMoney => {
                    ctx.inventory.resolve_front();
                }
                SlotProbe::Item(kind) => {
                    if self.settle_item(slot, kind).await? {
                        ctx.purchases += 1;
                    }
                    self.actor.settle().await;
                    ctx.inventory.resolve_front();
                    tracing::info!(grid = slot.index, "shop.grid.resolved");
                }
                SlotProbe::Undefined => {
                    tracing::info!(grid = slot.index, "shop.grid.retry");
                }
            }
            return Ok(());
        }

        tracing::info!("shop.grid.exhausted");
        if self.shop_type == ShopType::Final {
            let refresh = self.refresh_shop().await?;
            if refresh.refreshed {
                ctx.inventory.reset();
                return Ok(());
            }
            tracing::info!(polls = refresh.polls, "shop.refresh.exhausted");
        }

        ctx.mark_shop_processed();
        self.actor.click_blank().await
    }

    /// Taps a slot and reports what the shop showed for it.
    pub async fn open_slot(&self, slot: GridSlot) -> anyhow::Result<SlotProbe> {
        tracing::info!(grid = slot.index, "shop.grid.open");
        self.actor.click_rect(slot.region).await?;
        self.actor.settle().await;

        let frame = self.actor.capture().await?;
        if self.actor.probe(Marker::SoldOut, &frame).await?.hit {
            tracing::info!(grid = slot.index, "shop.grid.sold_out");
            return Ok(SlotProbe::SoldOut);
        }
        if self.actor.probe(Marker::NotEnoughMoney, &frame).await?.hit {
            tracing::info!(grid = slot.index, "shop.grid.not_enough_money");
            return Ok(SlotProbe::NotEnoughMoney);
        }
        if self.actor.probe(Marker::ItemBuff, &frame).await?.hit {
            return Ok(SlotProbe::Item(ItemKind::Buff));
        }
        if self.actor.probe(Marker::ItemNote, &frame).await?.hit {
            return Ok(SlotProbe::Item(ItemKind::Note));
        }
        Ok(SlotProbe::Undefined)
    }

    /// Buys a discounted item or closes its detail screen. Returns whether a buy click happened.
    ///
    /// Notes are only worth buying while the activation marker shows; otherwise they are closed
    /// whatever the discount says.
    async fn settle_item(&self, slot: GridSlot, kind: ItemKind) -> anyhow::Result<bool> {
        let frame = self.actor.capture().await?;
        let discounted = self.actor.probe(kind.discount_marker(), &frame).await?.hit;
        let buy = match kind {
            ItemKind::Buff => discounted,
            ItemKind::Note => {
                let active = self.actor.probe(Marker::NoteActive, &frame).await?.hit;
                tracing::info!(grid = slot.index, active, "shop.grid.note_active");
                active && discounted
            }
        };
        tracing::info!(grid = slot.index, ?kind, discounted, buy, "shop.grid.item");

        if buy {
            let out = self.actor.recognize_and_click(BUY, Some(frame)).await?;
            if !out.success() {
                tracing::warn!(grid = slot.index, "shop.grid.buy_failed");
            }
            return Ok(matches!(out, ClickOutcome::Recognized(_)));
        }
        self.actor.recognize_and_click(CLOSE_ITEM, Some(frame)).await?;
        Ok(false)
    }
}
