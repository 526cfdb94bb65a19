use std::cmp::Ordering;

use crate::{
    dto::results::{
        GiftHighlight, GiftInsightsResponse, GiftRecommendation, GiftStats, LeaderboardEntry,
        ReceiverRecommendations,
    },
    state::game::{Player, Roster},
};

/// Standings by descending score; ties keep join order and share a rank.
pub fn leaderboard(roster: &Roster) -> Vec<LeaderboardEntry> {
    let mut players = roster.by_join_order();
    players.sort_by(|a, b| b.score.cmp(&a.score));

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(players.len());
    for (index, player) in players.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(previous) if previous.score == player.score => previous.rank,
            _ => index + 1,
        };
        entries.push(LeaderboardEntry {
            rank,
            player_id: player.id.clone(),
            name: player.name.clone(),
            score: player.score,
        });
    }
    entries
}

/// Per-player averages plus the four highlights and every receiver's recommendations.
pub fn gift_insights(roster: &Roster) -> GiftInsightsResponse {
    let players = roster.by_join_order();
    let stats: Vec<GiftStats> = players
        .iter()
        .map(|player| GiftStats {
            player_id: player.id.clone(),
            name: player.name.clone(),
            avg_given: average(given_ratings(roster, player)),
            avg_received: average(received_ratings(&players, player)),
        })
        .collect();

    GiftInsightsResponse {
        most_versatile: pick(&stats, |s| s.avg_given, Ordering::Greater),
        most_niche: pick(&stats, |s| s.avg_given, Ordering::Less),
        easiest_to_gift: pick(&stats, |s| s.avg_received, Ordering::Greater),
        hardest_to_gift: pick(&stats, |s| s.avg_received, Ordering::Less),
        recommendations: players
            .iter()
            .map(|receiver| ReceiverRecommendations {
                receiver_id: receiver.id.clone(),
                receiver_name: receiver.name.clone(),
                gifts: recommendations(roster, &receiver.id),
            })
            .collect(),
        players: stats,
    }
}

/// Every other player's gift for `receiver`, best rated first; unrated gifts score 0.
pub fn recommendations(roster: &Roster, receiver: &str) -> Vec<GiftRecommendation> {
    let mut gifts: Vec<GiftRecommendation> = roster
        .by_join_order()
        .into_iter()
        .filter(|giver| giver.id != receiver)
        .map(|giver| GiftRecommendation {
            giver_id: giver.id.clone(),
            giver_name: giver.name.clone(),
            score: giver.gift_suitability.get(receiver).copied().unwrap_or(0),
        })
        .collect();
    gifts.sort_by(|a, b| b.score.cmp(&a.score));
    gifts
}

fn given_ratings<'a>(roster: &'a Roster, giver: &'a Player) -> impl Iterator<Item = u8> + 'a {
    giver
        .gift_suitability
        .iter()
        .filter(move |(receiver, _)| **receiver != giver.id && roster.contains(receiver))
        .map(|(_, rating)| *rating)
}

fn received_ratings<'a>(
    players: &'a [&'a Player],
    receiver: &'a Player,
) -> impl Iterator<Item = u8> + 'a {
    players
        .iter()
        .filter(move |giver| giver.id != receiver.id)
        .filter_map(move |giver| giver.gift_suitability.get(&receiver.id).copied())
        .filter(|rating| *rating > 0)
}

fn average(ratings: impl Iterator<Item = u8>) -> f64 {
    let (sum, count) = ratings.fold((0u32, 0u32), |(sum, count), rating| {
        (sum + u32::from(rating), count + 1)
    });
    if count == 0 {
        0.0
    } else {
        f64::from(sum) / f64::from(count)
    }
}

/// First entry (in join order) whose value compares as `wanted` against every earlier pick.
fn pick(
    stats: &[GiftStats],
    value: impl Fn(&GiftStats) -> f64,
    wanted: Ordering,
) -> Option<GiftHighlight> {
    let mut best: Option<&GiftStats> = None;
    for candidate in stats {
        let better = match best {
            None => true,
            Some(current) => value(candidate).partial_cmp(&value(current)) == Some(wanted),
        };
        if better {
            best = Some(candidate);
        }
    }
    best.map(|stats| GiftHighlight {
        player_id: stats.player_id.clone(),
        name: stats.name.clone(),
        average: value(stats),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn player(id: &str, joined_at: u64, score: i64, ratings: &[(&str, u8)]) -> Player {
        Player {
            id: id.into(),
            name: id.to_uppercase(),
            secrets: Vec::new(),
            score,
            joined_at,
            gift_suitability: ratings
                .iter()
                .map(|(target, rating)| (target.to_string(), *rating))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn tied_scores_share_a_rank() {
        let roster: Roster = [
            player("a", 1, 10, &[]),
            player("b", 2, 30, &[]),
            player("c", 3, 10, &[]),
            player("d", 4, -5, &[]),
        ]
        .into_iter()
        .collect();

        let board = leaderboard(&roster);

        let rows: Vec<(usize, &str)> = board
            .iter()
            .map(|entry| (entry.rank, entry.player_id.as_str()))
            .collect();
        assert_eq!(rows, [(1, "b"), (2, "a"), (2, "c"), (4, "d")]);
    }

    #[test]
    fn insights_average_ratings_and_pick_highlights() {
        let roster: Roster = [
            player("a", 1, 0, &[("b", 5), ("c", 3)]),
            player("b", 2, 0, &[("a", 2), ("c", 2)]),
            player("c", 3, 0, &[("a", 4), ("b", 5), ("ghost", 1)]),
        ]
        .into_iter()
        .collect();

        let insights = gift_insights(&roster);

        let a = &insights.players[0];
        assert_eq!((a.avg_given, a.avg_received), (4.0, 3.0));
        let c = &insights.players[2];
        assert_eq!((c.avg_given, c.avg_received), (4.5, 2.5));
        assert_eq!(insights.most_versatile.unwrap().player_id, "c");
        assert_eq!(insights.most_niche.unwrap().player_id, "b");
        assert_eq!(insights.easiest_to_gift.unwrap().player_id, "b");
        assert_eq!(insights.hardest_to_gift.unwrap().player_id, "c");
    }

    #[test]
    fn highlight_ties_go_to_the_earliest_joiner() {
        let roster: Roster = [player("b", 2, 0, &[]), player("a", 1, 0, &[])]
            .into_iter()
            .collect();
        let insights = gift_insights(&roster);
        assert_eq!(insights.most_versatile.unwrap().player_id, "a");
        assert_eq!(insights.hardest_to_gift.unwrap().player_id, "a");
    }

    #[test]
    fn recommendations_rank_gifts_and_default_to_zero() {
        let roster: Roster = [
            player("a", 1, 0, &[]),
            player("b", 2, 0, &[("a", 3)]),
            player("c", 3, 0, &[("a", 5)]),
        ]
        .into_iter()
        .collect();

        let gifts = recommendations(&roster, "a");

        let rows: Vec<(&str, u8)> = gifts
            .iter()
            .map(|gift| (gift.giver_id.as_str(), gift.score))
            .collect();
        assert_eq!(rows, [("c", 5), ("b", 3)]);

        let gifts = recommendations(&roster, "b");
        assert_eq!(gifts.iter().map(|gift| gift.score).collect::<Vec<_>>(), [0, 0]);
    }

    #[test]
    fn empty_roster_has_no_highlights() {
        let insights = gift_insights(&Roster::default());
        assert!(insights.players.is_empty());
        assert!(insights.most_versatile.is_none());
    }
}
