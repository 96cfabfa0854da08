use crate::priority::find_priority_target;
use crate::probe::{Marker, Rect};

use super::handlers::ShopFlow;

impl ShopFlow<'_> {
    /// Picks an option on the buff offer screen and takes it.
    ///
    /// Named targets from the priority table win over the game's own recommendation marker.
    /// Returns whether both the pick and the take click landed; the caller keeps looping either way.
    pub async fn select_buff(&self) -> anyhow::Result<bool> {
        let frame = self.actor.capture().await?;

        let mut choice: Option<Rect> = None;
        if !self.buff_priority.is_empty() {
            choice = find_priority_target(
                self.actor.gateway,
                &frame,
                self.buff_priority,
                self.actor.stop,
            )
            .await?
            .map(|hit| hit.bbox);
            if choice.is_none() {
                tracing::info!("shop.buff.priority_miss");
            }
        }
        if choice.is_none() {
            choice = self
                .actor
                .probe(Marker::BuffRecommend, &frame)
                .await?
                .actionable();
        }

        let Some(bbox) = choice else {
            tracing::info!("shop.buff.no_choice");
            return Ok(false);
        };
        self.actor.click_rect(bbox).await?;
        self.actor.settle().await;

        let frame = self.actor.capture().await?;
        let Some(take) = self.actor.probe(Marker::BuffTake, &frame).await?.actionable() else {
            tracing::info!("shop.buff.take_missing");
            return Ok(false);
        };
        self.actor.click_rect(take).await?;
        Ok(true)
    }
}
