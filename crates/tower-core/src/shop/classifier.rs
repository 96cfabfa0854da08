use crate::action::Actor;
use crate::probe::{Frame, Marker, RecognitionResult};

use super::context::FlowContext;
use super::state::ScreenState;

/// Classifies one frame into exactly one [`ScreenState`].
///
/// Probes run in a fixed priority order and the first accepted hit wins; later probes are skipped.
/// Every probe that did run lands in `ctx.cache` (also when its flag gate rejected the hit) so the
/// handler for this pass can click without recognizing again.
///
/// Flag gates keep an action from re-triggering when its effect already happened but its button
/// can still flicker into view.
pub async fn classify(
    actor: &Actor<'_>,
    frame: &Frame,
    ctx: &mut FlowContext,
) -> anyhow::Result<ScreenState> {
    ctx.cache.clear();
    let shop_done = ctx.shop_processed();
    let strengthen_done = ctx.strengthen_processed();
    let cache = &mut ctx.cache;

    if record(actor, frame, Marker::BuffRecommend, &mut cache.buff_recommend).await? {
        return Ok(ScreenState::BuffMain);
    }
    if record(actor, frame, Marker::ItemDetail, &mut cache.item_detail).await? {
        return Ok(ScreenState::ItemMain);
    }
    if record(actor, frame, Marker::BlankClose, &mut cache.blank_close).await? {
        return Ok(ScreenState::BlankClose);
    }
    if record(actor, frame, Marker::ShopMain, &mut cache.shop_main).await? {
        return Ok(if shop_done {
            ScreenState::ShopMainProcessed
        } else {
            ScreenState::ShopMain
        });
    }
    if record(actor, frame, Marker::ShopEntry, &mut cache.shop_entry).await? && !shop_done {
        return Ok(ScreenState::ShopShopping);
    }
    if record(actor, frame, Marker::EndStrengthen, &mut cache.end_strengthen).await?
        && !strengthen_done
    {
        return Ok(ScreenState::EndStrengthen);
    }
    // Before the shop is done this marker belongs to a grid slot; afterwards it means the
    // upgrade cannot be afforded.
    if record(actor, frame, Marker::NotEnoughMoney, &mut cache.not_enough_money).await?
        && shop_done
    {
        return Ok(ScreenState::NotEnoughMoneySetStrengthenProcessed);
    }
    if record(actor, frame, Marker::Strengthen, &mut cache.strengthen).await?
        && shop_done
        && !strengthen_done
    {
        return Ok(ScreenState::StrengthenProcess);
    }
    if record(actor, frame, Marker::NextFloor, &mut cache.next_floor).await? {
        return Ok(ScreenState::ShopNextFloor);
    }
    if record(actor, frame, Marker::FinalLeave, &mut cache.final_leave).await? {
        return Ok(ScreenState::FinalShopLeave);
    }
    if record(actor, frame, Marker::Leave, &mut cache.leave).await? {
        return Ok(ScreenState::LeaveTower);
    }

    Ok(ScreenState::ShopFlowComplete)
}

async fn record(
    actor: &Actor<'_>,
    frame: &Frame,
    marker: Marker,
    slot: &mut Option<RecognitionResult>,
) -> anyhow::Result<bool> {
    let res = actor.probe(marker, frame).await?;
    *slot = Some(res);
    Ok(res.hit)
}
