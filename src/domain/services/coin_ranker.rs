use tracing::debug;

use crate::domain::entities::market::CoinSelectionCriteria;
use crate::domain::entities::time_series::TimeSeriesSummary;

/// Scores coins against the active tier's selection criteria
#[derive(Debug, Clone)]
pub struct CoinRanker {
    /// Points awarded per matched criterion
    pub ranking_increment: i64,
    /// USD committed to each purchase
    pub investment_increment_usd: f64,
    /// Hard ceiling on simultaneous purchases per cycle
    pub max_positions: usize,
}

impl Default for CoinRanker {
    fn default() -> Self {
        CoinRanker {
            ranking_increment: 100,
            investment_increment_usd: 50.0,
            max_positions: 10,
        }
    }
}

impl CoinRanker {
    pub fn new(ranking_increment: i64, investment_increment_usd: f64, max_positions: usize) -> Self {
        Self {
            ranking_increment,
            investment_increment_usd,
            max_positions,
        }
    }

    /// Add `ranking_increment` to each summary's ranking per matched criterion
    pub fn rank(&self, batch: &mut [TimeSeriesSummary], criteria: &CoinSelectionCriteria) {
        for summary in batch.iter_mut() {
            let matched = criteria.matched_criteria(summary);
            summary.ranking += self.ranking_increment * matched as i64;

            debug!(
                asset_id = %summary.asset_id,
                matched_criteria = matched,
                ranking = summary.ranking,
                "Ranked coin"
            );
        }
    }

    /// Number of purchases the USD balance can fund this cycle
    pub fn purchase_slots(&self, usd_balance: f64) -> usize {
        if self.investment_increment_usd <= 0.0 || !usd_balance.is_finite() || usd_balance <= 0.0 {
            return 0;
        }
        let affordable = (usd_balance / self.investment_increment_usd).floor() as usize;
        affordable.min(self.max_positions)
    }

    /// Highest-ranked coins first, limited by the tier's order cap and by the
    /// slots the balance supports. Equal rankings keep batch order.
    pub fn select(
        &self,
        mut ranked: Vec<TimeSeriesSummary>,
        criteria: &CoinSelectionCriteria,
        usd_balance: f64,
    ) -> Vec<TimeSeriesSummary> {
        ranked.sort_by(|a, b| b.ranking.cmp(&a.ranking));

        let limit = criteria
            .maximum_number_of_orders
            .min(self.purchase_slots(usd_balance));
        ranked.truncate(limit);

        debug!(
            selected = ranked.len(),
            limit = limit,
            usd_balance = usd_balance,
            "Selected purchase candidates"
        );

        ranked
    }
}
