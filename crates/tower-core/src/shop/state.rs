use crate::probe::RecognitionResult;

/// Exactly one of these is produced per classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenState {
    BuffMain,
    ItemMain,
    BlankClose,
    ShopMain,
    /// Shop main screen after this episode's purchases are done.
    ShopMainProcessed,
    ShopShopping,
    EndStrengthen,
    NotEnoughMoneySetStrengthenProcessed,
    StrengthenProcess,
    ShopNextFloor,
    FinalShopLeave,
    LeaveTower,
    /// Nothing matched. Fed to the hysteresis counter, not handled directly.
    ShopFlowComplete,
    ItemBuff,
    ItemNote,
    NotEnoughMoney,
    SoldOut,
    Unknown,
}

impl ScreenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenState::BuffMain => "buff_main",
            ScreenState::ItemMain => "item_main",
            ScreenState::BlankClose => "blank_close",
            ScreenState::ShopMain => "shop_main",
            ScreenState::ShopMainProcessed => "shop_main_processed",
            ScreenState::ShopShopping => "shop_shopping",
            ScreenState::EndStrengthen => "end_strengthen",
            ScreenState::NotEnoughMoneySetStrengthenProcessed => {
                "not_enough_money_set_strengthen_processed"
            }
            ScreenState::StrengthenProcess => "strengthen_process",
            ScreenState::ShopNextFloor => "shop_next_floor",
            ScreenState::FinalShopLeave => "final_shop_leave",
            ScreenState::LeaveTower => "leave_tower",
            ScreenState::ShopFlowComplete => "shop_flow_complete",
            ScreenState::ItemBuff => "buff_interface",
            ScreenState::ItemNote => "note_interface",
            ScreenState::NotEnoughMoney => "not_enough_money",
            ScreenState::SoldOut => "sold_out",
            ScreenState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ScreenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probe results from the most recent classification pass, one slot per classifier probe.
///
/// A slot is `None` when the pass short-circuited before reaching that probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionCache {
    pub buff_recommend: Option<RecognitionResult>,
    pub item_detail: Option<RecognitionResult>,
    pub blank_close: Option<RecognitionResult>,
    pub shop_main: Option<RecognitionResult>,
    pub shop_entry: Option<RecognitionResult>,
    pub end_strengthen: Option<RecognitionResult>,
    pub not_enough_money: Option<RecognitionResult>,
    pub strengthen: Option<RecognitionResult>,
    pub next_floor: Option<RecognitionResult>,
    pub final_leave: Option<RecognitionResult>,
    pub leave: Option<RecognitionResult>,
}

impl RecognitionCache {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// The cached result that located the element a state's handler should click, if any.
    pub fn for_state(&self, state: ScreenState) -> Option<&RecognitionResult> {
        let slot = match state {
            ScreenState::ShopShopping => &self.shop_entry,
            ScreenState::BlankClose => &self.blank_close,
            ScreenState::StrengthenProcess => &self.strengthen,
            ScreenState::ShopNextFloor => &self.next_floor,
            ScreenState::FinalShopLeave => &self.final_leave,
            ScreenState::LeaveTower => &self.leave,
            _ => return None,
        };
        slot.as_ref()
    }
}

impl RecognitionCache {
    /// Number of probes the last pass actually ran.
    pub fn evaluated(&self) -> usize {
        [
            self.buff_recommend,
            self.item_detail,
            self.blank_close,
            self.shop_main,
            self.shop_entry,
            self.end_strengthen,
            self.not_enough_money,
            self.strengthen,
            self.next_floor,
            self.final_leave,
            self.leave,
        ]
        .iter()
        .filter(|r| r.is_some())
        .count()
    }
}
