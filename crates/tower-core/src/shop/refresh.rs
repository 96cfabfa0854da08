use crate::action::REFRESH;
use crate::probe::Marker;

use super::handlers::ShopFlow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// The shop was refreshed and its grid is worth rediscovering.
    pub refreshed: bool,
    /// Confirmation polls performed after the refresh click.
    pub polls: u32,
}

impl ShopFlow<'_> {
    /// Clicks refresh, then watches a few frames for the "cannot refresh" marker.
    ///
    /// The click alone does not prove anything: with no refreshes left the button is still there
    /// and the marker only appears afterwards. Not finding the button at all fails without polling.
    pub async fn refresh_shop(&self) -> anyhow::Result<RefreshOutcome> {
        let clicked = self.actor.recognize_and_click(REFRESH, None).await?;
        if !clicked.success() {
            return Ok(RefreshOutcome {
                refreshed: false,
                polls: 0,
            });
        }

        let max_polls = self.actor.settings.refresh_polls;
        for poll in 1..=max_polls {
            let frame = self.actor.capture().await?;
            let cannot = self.actor.probe(Marker::CannotRefresh, &frame).await?;
            tracing::debug!(poll, hit = cannot.hit, "shop.refresh.poll");
            if cannot.hit {
                tracing::info!(poll, "shop.refresh.cannot_refresh");
                return Ok(RefreshOutcome {
                    refreshed: false,
                    polls: poll,
                });
            }
            self.actor.settle().await;
        }

        tracing::info!("shop.refresh.ok");
        Ok(RefreshOutcome {
            refreshed: true,
            polls: max_polls,
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::action::Actor;
    use crate::config::FlowSettings;
    use crate::payload::ShopType;
    use crate::priority::PriorityTable;
    use crate::testing::{FakeHost, Screen};

    async fn run_refresh(host: &FakeHost) -> anyhow::Result<RefreshOutcome> {
        let settings = FlowSettings::default();
        let stop = CancellationToken::new();
        let table = PriorityTable::default();
        let flow = ShopFlow::new(
            Actor::new(host, host, &settings, &stop),
            ShopType::Final,
            &table,
        );
        flow.refresh_shop().await
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_refresh_on_any_poll_fails() -> anyhow::Result<()> {
        for hit_on in 1..=3u32 {
            let host = FakeHost::default();
            host.push_screen(Screen::showing(Marker::Refresh));
            for poll in 1..=3 {
                if poll == hit_on {
                    host.push_screen(Screen::showing(Marker::CannotRefresh));
                } else {
                    host.push_screen(Screen::new());
                }
            }
            let out = run_refresh(&host).await?;
            assert_eq!(
                out,
                RefreshOutcome {
                    refreshed: false,
                    polls: hit_on
                }
            );
            assert_eq!(host.probe_count(Marker::CannotRefresh), hit_on as usize);
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn three_clean_polls_keep_success() -> anyhow::Result<()> {
        let host = FakeHost::default();
        host.push_screen(Screen::showing(Marker::Refresh));
        let out = run_refresh(&host).await?;
        assert_eq!(
            out,
            RefreshOutcome {
                refreshed: true,
                polls: 3
            }
        );
        assert_eq!(host.clicks().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn missing_refresh_button_fails_without_polling() -> anyhow::Result<()> {
        let host = FakeHost::default();
        let out = run_refresh(&host).await?;
        assert_eq!(
            out,
            RefreshOutcome {
                refreshed: false,
                polls: 0
            }
        );
        assert_eq!(host.probe_count(Marker::CannotRefresh), 0);
        assert_eq!(host.capture_count(), 1);
        assert!(host.clicks().is_empty());
        Ok(())
    }
}
