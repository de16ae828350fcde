//! Continental stages: match ids, match details and timelines.
//!
//! Each stage reads its work set from the sink and fans the items out. The
//! item futures own clones of the harvester, so they can sit in a buffered
//! stream without borrowing the partition task.

use std::collections::HashSet;
use std::pin::pin;

use futures_util::{StreamExt, stream};
use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};

use super::{BatchWriter, Harvester, PartitionReport, skip_item};
use crate::error::HarvestError;
use crate::riot::{MatchIdsQuery, Transport};
use crate::sink::{MatchRef, PlayerRef, Sink, Table};
use crate::transform::{MatchRows, Record, match_id_rows, match_rows, tier_from_entries, timeline_rows, today};
use crate::types::Continent;

impl<S, T> Harvester<S, T>
where
    S: Sink + 'static,
    T: Transport + 'static,
{
    pub(super) async fn collect_match_ids(
        &self,
        continent: Continent,
    ) -> Result<PartitionReport, HarvestError> {
        let date = today();
        let mut report = PartitionReport::new(continent.as_str());
        let players: Vec<PlayerRef> = self
            .sink
            .players_in(continent)
            .await?
            .into_iter()
            .filter(|player| self.config.platforms.contains(&player.platform))
            .collect();
        info!(%continent, players = players.len(), "collecting match ids");

        let query = MatchIdsQuery {
            match_type: self.config.match_type,
            start: 0,
            count: self.config.match_count,
            start_time: self.config.start_time(OffsetDateTime::now_utc()),
        };

        let mut writer = BatchWriter::new(&*self.sink, Table::MatchIds, self.config.batch_size);
        let harvester = self.clone();
        let mut results = pin!(
            stream::iter(players)
                .map(move |player| {
                    let harvester = harvester.clone();
                    let query = query.clone();
                    async move {
                        let result = harvester
                            .player_match_ids(continent, &player, &query, date)
                            .await;
                        (player.puuid, result)
                    }
                })
                .buffered(self.config.max_concurrency)
        );

        while let Some((puuid, result)) = results.next().await {
            match result {
                Ok(rows) => {
                    report.fetched += 1;
                    writer.extend(rows).await?;
                }
                Err(e) => skip_item(&mut report, &puuid, e)?,
            }
            tokio::task::yield_now().await;
        }

        report.stored = writer.finish().await?;
        Ok(report)
    }

    /// Match id rows of one player, tagged with their current tier.
    async fn player_match_ids(
        &self,
        continent: Continent,
        player: &PlayerRef,
        query: &MatchIdsQuery,
        date: Date,
    ) -> Result<Vec<Record>, HarvestError> {
        let match_ids = self
            .client
            .match_ids_by_puuid(continent, &player.puuid, query)
            .await?;
        if match_ids.is_empty() {
            return Ok(Vec::new());
        }

        let tier = if self.config.refresh_tiers {
            self.current_tier(player).await?
        } else {
            player.tier.clone()
        };
        debug!(puuid = %player.puuid, %tier, matches = match_ids.len(), "match ids fetched");
        Ok(match_id_rows(&match_ids, &player.puuid, &tier, continent, date))
    }

    /// The player's tier now, falling back to the stored one.
    async fn current_tier(&self, player: &PlayerRef) -> Result<String, HarvestError> {
        match self
            .client
            .league_entries_by_puuid(player.platform, &player.puuid)
            .await
        {
            Ok(entries) => Ok(tier_from_entries(&entries, self.config.queue)
                .unwrap_or_else(|| player.tier.clone())),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(puuid = %player.puuid, error = %e, "tier refresh failed, keeping stored tier");
                Ok(player.tier.clone())
            }
        }
    }

    pub(super) async fn collect_match_data(
        &self,
        continent: Continent,
    ) -> Result<PartitionReport, HarvestError> {
        let mut report = PartitionReport::new(continent.as_str());
        let done: HashSet<String> = self
            .sink
            .matches_with_participants_in(continent)
            .await?
            .into_iter()
            .map(|m| m.match_id)
            .collect();
        let pending: Vec<MatchRef> = self
            .sink
            .matches_in(continent)
            .await?
            .into_iter()
            .filter(|m| !done.contains(&m.match_id))
            .collect();
        info!(%continent, pending = pending.len(), done = done.len(), "collecting match details");

        let mut teams = BatchWriter::new(&*self.sink, Table::MatchTeams, self.config.batch_size);
        let mut participants =
            BatchWriter::new(&*self.sink, Table::MatchParticipants, self.config.batch_size);

        let harvester = self.clone();
        let mut results = pin!(
            stream::iter(pending)
                .map(move |m| {
                    let harvester = harvester.clone();
                    async move {
                        let result = harvester
                            .client
                            .match_by_id(continent, &m.match_id)
                            .await
                            .and_then(|data| match_rows(&data, &m.tier));
                        (m.match_id, result)
                    }
                })
                .buffered(self.config.max_concurrency)
        );

        while let Some((match_id, result)) = results.next().await {
            match result {
                Ok(Some(MatchRows {
                    teams: team_rows,
                    participants: participant_rows,
                })) => {
                    report.fetched += 1;
                    teams.extend(team_rows).await?;
                    participants.extend(participant_rows).await?;
                }
                Ok(None) => {
                    report.fetched += 1;
                    debug!(%match_id, "match without two teams skipped");
                }
                Err(e) => skip_item(&mut report, &match_id, e)?,
            }
            tokio::task::yield_now().await;
        }

        report.stored = teams.finish().await? + participants.finish().await?;
        Ok(report)
    }

    pub(super) async fn collect_timelines(
        &self,
        continent: Continent,
    ) -> Result<PartitionReport, HarvestError> {
        let mut report = PartitionReport::new(continent.as_str());
        let matches = self.sink.matches_with_participants_in(continent).await?;
        info!(%continent, matches = matches.len(), "collecting timelines");

        let mut writer = BatchWriter::new(&*self.sink, Table::MatchTimeline, self.config.batch_size);
        let harvester = self.clone();
        let mut results = pin!(
            stream::iter(matches)
                .map(move |m| {
                    let harvester = harvester.clone();
                    async move {
                        let result = harvester.match_timeline_rows(continent, &m.match_id).await;
                        (m.match_id, result)
                    }
                })
                .buffered(self.config.max_concurrency)
        );

        while let Some((match_id, result)) = results.next().await {
            match result {
                Ok(rows) => {
                    report.fetched += 1;
                    debug!(%match_id, rows = rows.len(), "timeline fetched");
                    writer.extend(rows).await?;
                }
                Err(e) => skip_item(&mut report, &match_id, e)?,
            }
            tokio::task::yield_now().await;
        }

        report.stored = writer.finish().await?;
        Ok(report)
    }

    async fn match_timeline_rows(
        &self,
        continent: Continent,
        match_id: &str,
    ) -> Result<Vec<Record>, HarvestError> {
        let timeline = self.client.match_timeline(continent, match_id).await?;
        let positions = self.sink.team_positions(match_id).await?;
        Ok(timeline_rows(&timeline, match_id, &positions))
    }
}
