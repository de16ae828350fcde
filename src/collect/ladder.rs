//! Ladder stage: league pages to `summoners` rows.

use serde_json::Value;
use tracing::{debug, info};

use super::{BatchWriter, Harvester, PartitionReport, skip_item};
use crate::error::HarvestError;
use crate::riot::Transport;
use crate::sink::{Sink, Table};
use crate::transform::{apex_summoner_rows, summoner_rows, today};
use crate::types::{Division, Platform, Tier};

impl<S, T> Harvester<S, T>
where
    S: Sink + 'static,
    T: Transport + 'static,
{
    pub(super) async fn collect_summoners(
        &self,
        platform: Platform,
    ) -> Result<PartitionReport, HarvestError> {
        let date = today();
        let mut report = PartitionReport::new(platform.as_str());
        let mut writer = BatchWriter::new(&*self.sink, Table::Summoners, self.config.batch_size);

        for &tier in &self.config.tiers {
            if tier.is_apex() {
                self.shutdown().check()?;
                let item = format!("{platform}/{tier}");
                let rows = self
                    .client
                    .apex_league(platform, self.config.queue, tier)
                    .await
                    .and_then(|league| apex_summoner_rows(&league, platform, date));
                match rows {
                    Ok(rows) => {
                        report.fetched += 1;
                        debug!(%platform, %tier, players = rows.len(), "apex league fetched");
                        writer.extend(rows).await?;
                    }
                    Err(e) => skip_item(&mut report, &item, e)?,
                }
                tokio::task::yield_now().await;
                continue;
            }

            for &division in &self.config.divisions {
                self.collect_pages(platform, tier, division, date, &mut writer, &mut report)
                    .await?;
            }
        }

        report.stored = writer.finish().await?;
        info!(%platform, pages = report.fetched, stored = report.stored, "ladder collected");
        Ok(report)
    }

    /// Walk pages of one tier and division until an empty page or the page limit.
    async fn collect_pages(
        &self,
        platform: Platform,
        tier: Tier,
        division: Division,
        date: time::Date,
        writer: &mut BatchWriter<'_, S>,
        report: &mut PartitionReport,
    ) -> Result<(), HarvestError> {
        let mut page = self.config.start_page;
        let mut requested = 0u32;

        loop {
            if self.config.page_limit.is_some_and(|limit| requested >= limit) {
                debug!(%platform, %tier, %division, page, "page limit reached");
                break;
            }
            self.shutdown().check()?;
            requested += 1;

            let item = format!("{platform}/{tier}/{division}/page {page}");
            let result = self
                .client
                .league_entries(platform, self.config.queue, tier, division, page)
                .await;
            let entries = match result {
                Ok(entries) => entries,
                Err(e) => {
                    // The following pages cannot be told apart from missing ones.
                    skip_item(report, &item, e)?;
                    break;
                }
            };
            report.fetched += 1;

            if is_last_page(&entries) {
                debug!(%platform, %tier, %division, page, "empty page, ladder exhausted");
                break;
            }
            match summoner_rows(&entries, platform, date) {
                Ok(rows) => {
                    debug!(%platform, %tier, %division, page, players = rows.len(), "page fetched");
                    writer.extend(rows).await?;
                }
                Err(e) => {
                    skip_item(report, &item, e)?;
                    break;
                }
            }

            page += 1;
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

/// An empty page ends pagination.
fn is_last_page(entries: &Value) -> bool {
    entries.as_array().is_some_and(Vec::is_empty)
}
