//! Per-tick matching of surplus meters to deficit meters.
//!
//! Each requester scores the current offers and registers with the best
//! ones (how many depends on the [`Selection`] policy). Each seller then
//! serves exactly one of its registered requesters: the best-scoring one
//! not already served by an earlier seller. Sellers are visited in id order.

use std::collections::{BTreeMap, HashSet};

use chrono::TimeDelta;

use crate::generators::grid::GridState;
use crate::scoring::ScoringModel;

use super::types::{Meter, MeterId};

/// How many offers each requester registers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Only the single best-scoring offer.
    Best,
    /// The `k` best-scoring offers.
    TopK(usize),
    /// Every offer except the worst one; all of them when only one exists.
    AllButOne,
}

impl Selection {
    /// Number of offers to keep out of `offers` candidates.
    pub fn limit(self, offers: usize) -> usize {
        let wanted = match self {
            Self::Best => 1,
            Self::TopK(k) => k,
            Self::AllButOne => offers.saturating_sub(1).max(1),
        };
        wanted.min(offers)
    }
}

/// An offer scored from one requester's point of view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredOffer {
    pub seller: MeterId,
    pub score: f64,
}

/// A requester registered with a seller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRequest {
    pub buyer: MeterId,
    pub score: f64,
}

/// An executed transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub seller: MeterId,
    pub buyer: MeterId,
    pub amount: f64,
}

/// The matching engine.
#[derive(Debug)]
pub struct Trader {
    scoring: ScoringModel,
    selection: Selection,
}

impl Trader {
    pub fn new(scoring: ScoringModel, selection: Selection) -> Self {
        Self { scoring, selection }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn scoring(&self) -> &ScoringModel {
        &self.scoring
    }

    /// Scores every offer for one requester and keeps the best ones.
    ///
    /// # Returns
    ///
    /// Offers in descending score order, truncated by the selection policy.
    /// Equal scores keep their input order.
    pub fn score_offers(&self, requester: &Meter, offers: &[&Meter], grid: &GridState) -> Vec<ScoredOffer> {
        let needed = requester.surplus;
        let mut scored: Vec<ScoredOffer> = offers
            .iter()
            .map(|offer| ScoredOffer {
                seller: offer.id,
                score: self
                    .scoring
                    .fitness(needed, offer.surplus, offer.participation, grid),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.selection.limit(offers.len()));
        scored
    }

    /// Registers every requester with its selected sellers.
    ///
    /// # Returns
    ///
    /// Pending requests per seller, keyed in seller id order. Empty when
    /// there are no offers.
    pub fn collect_requests(&self, meters: &[Meter], grid: &GridState) -> BTreeMap<MeterId, Vec<TradeRequest>> {
        let offers: Vec<&Meter> = meters.iter().filter(|m| m.is_offer()).collect();
        let mut requests: BTreeMap<MeterId, Vec<TradeRequest>> = BTreeMap::new();
        if offers.is_empty() {
            return requests;
        }

        for requester in meters.iter().filter(|m| m.is_requester()) {
            for offer in self.score_offers(requester, &offers, grid) {
                requests.entry(offer.seller).or_default().push(TradeRequest {
                    buyer: requester.id,
                    score: offer.score,
                });
            }
        }
        requests
    }

    /// Decides this tick's trades without touching the meters.
    ///
    /// # Arguments
    ///
    /// * `meters` - All meters, indexed by [`MeterId::index`]
    /// * `grid` - Grid readings for the tick
    /// * `tick` - Tick length, bounding the transferable energy
    ///
    /// # Returns
    ///
    /// At most one trade per seller and per buyer, each moving
    /// `min(seller surplus, grid capacity, buyer deficit)`.
    pub fn plan_trades(&self, meters: &[Meter], grid: &GridState, tick: TimeDelta) -> Vec<Trade> {
        let capacity = grid.transmission_capacity(tick).max(0.0);
        let mut served: HashSet<MeterId> = HashSet::new();
        let mut trades = Vec::new();

        for (seller_id, mut pending) in self.collect_requests(meters, grid) {
            let Some(seller) = meters.get(seller_id.index()) else {
                continue;
            };
            pending.sort_by(|a, b| b.score.total_cmp(&a.score));

            let Some(buyer) = pending
                .iter()
                .filter(|r| !served.contains(&r.buyer))
                .find_map(|r| meters.get(r.buyer.index()))
            else {
                continue;
            };

            let amount = seller.surplus.min(capacity).min(buyer.surplus.abs());
            if amount.is_nan() || amount <= 0.0 {
                continue;
            }
            served.insert(buyer.id);
            trades.push(Trade {
                seller: seller.id,
                buyer: buyer.id,
                amount,
            });
        }
        trades
    }

    /// Plans and applies this tick's trades.
    pub fn execute(&self, meters: &mut [Meter], grid: &GridState, tick: TimeDelta) -> Vec<Trade> {
        let trades = self.plan_trades(meters, grid, tick);
        apply_trades(meters, &trades);
        trades
    }
}

/// Records trades on the meters: mirrored transfer amounts, counterparties
/// on both sides, and one participation for each seller.
pub fn apply_trades(meters: &mut [Meter], trades: &[Trade]) {
    for trade in trades {
        if let Some(seller) = meters.get_mut(trade.seller.index()) {
            seller.participation += 1;
            seller.transferred = -trade.amount;
            seller.counterparty = Some(trade.buyer);
        }
        if let Some(buyer) = meters.get_mut(trade.buyer.index()) {
            buyer.transferred = trade.amount;
            buyer.counterparty = Some(trade.seller);
        }
    }
}
