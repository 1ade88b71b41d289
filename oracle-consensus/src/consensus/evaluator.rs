use std::collections::BTreeSet;

use rust_decimal::Decimal;
use tracing::debug;

use oracle_common::{ConsensusPrice, NodeId, PriceReport, QuorumPolicy, RoundId, RoundOutcome};

/// A contiguous run of reports, in price order, whose members all agree.
#[derive(Debug, Clone, PartialEq)]
pub struct AgreementCluster {
    /// Sorted ascending by price, then node id.
    pub members: Vec<(NodeId, Decimal)>,
    pub spread: Decimal,
}

impl AgreementCluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn median(&self) -> Option<Decimal> {
        let prices: Vec<Decimal> = self.members.iter().map(|(_, p)| *p).collect();
        median(&prices)
    }

    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.members.iter().map(|(id, _)| id.clone()).collect()
    }
}

/// Median of an ascending slice; the exact midpoint of the two central values for even lengths.
///
/// `None` for an empty slice or when the midpoint is not representable.
pub fn median(sorted: &[Decimal]) -> Option<Decimal> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        return Some(sorted[n / 2]);
    }
    let (low, high) = (sorted[n / 2 - 1], sorted[n / 2]);
    let half_gap = high.checked_sub(low)?.checked_div(Decimal::from(2))?;
    low.checked_add(half_gap)
}

/// Picks the largest agreeing cluster and decides whether it carries quorum.
#[derive(Debug, Clone)]
pub struct ClusterEvaluator {
    pub tolerance: Decimal,
    pub policy: QuorumPolicy,
}

impl ClusterEvaluator {
    pub fn new(tolerance: Decimal, policy: QuorumPolicy) -> Self {
        Self { tolerance, policy }
    }

    /// `|a - b| / a <= tolerance`.
    pub fn agrees(&self, a: Decimal, b: Decimal) -> bool {
        if a <= Decimal::ZERO {
            return false;
        }
        match a.checked_sub(b) {
            Some(diff) => diff.abs() <= self.tolerance * a,
            None => false,
        }
    }

    /// An ascending run agrees when its spread is within tolerance of its median
    /// and its two extremes agree with each other, which bounds every inner pair.
    fn run_agrees(&self, run: &[Decimal]) -> bool {
        let (Some(&low), Some(&high)) = (run.first(), run.last()) else {
            return false;
        };
        let Some(mid) = median(run) else {
            return false;
        };
        let Some(spread) = high.checked_sub(low) else {
            return false;
        };
        spread <= self.tolerance * mid && self.agrees(low, high)
    }

    /// Longest contiguous agreeing run over the price-sorted reports.
    ///
    /// Equal lengths go to the tighter spread, then to the lower-priced run.
    pub fn largest_cluster(&self, reports: &[PriceReport]) -> Option<AgreementCluster> {
        let mut points: Vec<(NodeId, Decimal)> = reports
            .iter()
            .map(|r| (r.node_id.clone(), r.price))
            .collect();
        points.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let prices: Vec<Decimal> = points.iter().map(|(_, p)| *p).collect();
        let n = prices.len();

        let mut best: Option<(usize, usize, Decimal)> = None;
        for start in 0..n {
            for end in (start + 1..=n).rev() {
                let run = &prices[start..end];
                if !self.run_agrees(run) {
                    continue;
                }

                let len = end - start;
                let spread = run[len - 1] - run[0];
                let better = match best {
                    None => true,
                    Some((s, e, best_spread)) => {
                        let best_len = e - s;
                        len > best_len || (len == best_len && spread < best_spread)
                    }
                };
                if better {
                    best = Some((start, end, spread));
                }
                break;
            }
        }

        best.map(|(start, end, spread)| AgreementCluster {
            members: points[start..end].to_vec(),
            spread,
        })
    }

    /// Closing decision for a round.
    pub fn evaluate(&self, round_id: RoundId, reports: &[PriceReport], registered: usize) -> RoundOutcome {
        let quorum_threshold = self.policy.threshold(registered);
        let cluster = self.largest_cluster(reports);
        let largest = cluster.as_ref().map(AgreementCluster::len).unwrap_or(0);

        debug!(
            "🗳️ Round {} evaluation: reports={}, largest_cluster={}, quorum={}",
            round_id,
            reports.len(),
            largest,
            quorum_threshold
        );

        match cluster {
            Some(cluster) if largest >= quorum_threshold => match cluster.median() {
                Some(price) => RoundOutcome::Finalized(ConsensusPrice {
                    round_id,
                    price,
                    contributing_nodes: cluster.node_ids(),
                    agreement_ratio: largest as f64 / reports.len() as f64,
                }),
                None => self.timed_out(round_id, reports.len(), 0, quorum_threshold),
            },
            _ => self.timed_out(round_id, reports.len(), largest, quorum_threshold),
        }
    }

    fn timed_out(&self, round_id: RoundId, received: usize, largest: usize, threshold: usize) -> RoundOutcome {
        RoundOutcome::TimedOut {
            round_id,
            reports_received: received,
            largest_cluster: largest,
            quorum_threshold: threshold,
        }
    }
}
