// Peer comparison against the industry benchmark table.
//
// Compares the target customer's average monthly amount per waste item with
// the competitor cohort: percentile ranks per item, a z-score tier for the
// cohort's most common item, and a few headline facts for the narrative.
//
// Higher amounts mean more waste, so a high percentile is the unfavourable end.

use crate::types::BenchmarkRecord;
use crate::util::{average, sample_std_dev};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

// Percentile of score

/// How ties between the score and the reference values are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileKind {
    /// Average rank of the matching values (scipy's `rank`).
    Rank,
    /// Share of values `<=` score.
    Weak,
    /// Share of values `<` score.
    Strict,
    /// Mean of `Weak` and `Strict`; the report's default.
    #[default]
    Mean,
}

/// Percentile (0-100) of `score` within `values`. 0 for an empty slice.
pub fn percentile_of_score(values: &[f64], score: f64, kind: PercentileKind) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let left = values.iter().filter(|v| **v < score).count() as f64;
    let right = values.iter().filter(|v| **v <= score).count() as f64;
    match kind {
        PercentileKind::Rank => {
            let plus1 = if left < right { 1.0 } else { 0.0 };
            (left + right + plus1) * (50.0 / n)
        }
        PercentileKind::Weak => right / n * 100.0,
        PercentileKind::Strict => left / n * 100.0,
        PercentileKind::Mean => (left + right) * (50.0 / n),
    }
}

/// Percentile rank used throughout the report: ties count half below and
/// half above, so `[10, 20, 30]` ranks 20 at exactly 50.
pub fn percentile_rank(values: &[f64], score: f64) -> f64 {
    percentile_of_score(values, score, PercentileKind::Mean)
}

// Z-score tiers

/// Standardized distance from the peer mean using the sample standard
/// deviation. 0 when the deviation is zero or undefined (fewer than 2 peers).
pub fn z_score(value: f64, peers: &[f64]) -> f64 {
    match sample_std_dev(peers) {
        Some(sd) if sd > 0.0 => (value - average(peers)) / sd,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmaTier {
    MarkedlyBelow,
    SomewhatBelow,
    Average,
    SomewhatAbove,
    SubstantiallyAbove,
    ExtremeOutlier,
}

impl SigmaTier {
    /// Bands are closed on their upper edge: `z <= -2`, `(-2, -1]`, `(-1, 1]`,
    /// `(1, 2]`, `(2, 3]`, `> 3`.
    pub fn from_z(z: f64) -> Self {
        if z <= -2.0 {
            SigmaTier::MarkedlyBelow
        } else if z <= -1.0 {
            SigmaTier::SomewhatBelow
        } else if z <= 1.0 {
            SigmaTier::Average
        } else if z <= 2.0 {
            SigmaTier::SomewhatAbove
        } else if z <= 3.0 {
            SigmaTier::SubstantiallyAbove
        } else {
            SigmaTier::ExtremeOutlier
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SigmaTier::MarkedlyBelow => {
                "is managed very efficiently, with emissions markedly below the industry average."
            }
            SigmaTier::SomewhatBelow => {
                "is within the typical range, emitting somewhat less than the industry average."
            }
            SigmaTier::Average => "is emitting at an average level for the industry.",
            SigmaTier::SomewhatAbove => {
                "is within the typical range, but emitting somewhat more than the industry average."
            }
            SigmaTier::SubstantiallyAbove => "is emitting substantially more than the industry average.",
            SigmaTier::ExtremeOutlier => {
                "is emitting far more than the industry average and should be reviewed."
            }
        }
    }

    pub fn needs_review(&self) -> bool {
        matches!(self, SigmaTier::ExtremeOutlier)
    }
}

// Per-item comparison

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileResult {
    pub waste_item: String,
    pub waste_item_group: String,
    pub target_value: f64,
    pub peer_count: usize,
    pub peer_mean: f64,
    /// 0-100 position of the target within the competitor distribution.
    pub percentile: f64,
    /// `100 - percentile`, the "top X%" figure.
    pub top_share: f64,
}

/// First target row per item, in first-seen order. Duplicates are ignored.
fn target_items(target: &[BenchmarkRecord]) -> Vec<&BenchmarkRecord> {
    let mut seen = HashSet::new();
    target
        .iter()
        .filter(|r| seen.insert(r.waste_item.as_str()))
        .collect()
}

fn peer_values(competitors: &[BenchmarkRecord], item: &str) -> Vec<f64> {
    competitors
        .iter()
        .filter(|r| r.waste_item == item)
        .map(|r| r.avg_monthly_amount)
        .collect()
}

/// One result per target item that at least two competitor rows report.
/// Below two samples the percentile is too unstable to show.
pub fn percentile_by_item(
    target: &[BenchmarkRecord],
    competitors: &[BenchmarkRecord],
    kind: PercentileKind,
) -> Vec<PercentileResult> {
    target_items(target)
        .into_iter()
        .filter_map(|t| {
            let peers = peer_values(competitors, &t.waste_item);
            if peers.len() < 2 {
                debug!(
                    "skipping '{}': {} competitor value(s)",
                    t.waste_item,
                    peers.len()
                );
                return None;
            }
            let percentile = percentile_of_score(&peers, t.avg_monthly_amount, kind);
            Some(PercentileResult {
                waste_item: t.waste_item.clone(),
                waste_item_group: t.waste_item_group.clone(),
                target_value: t.avg_monthly_amount,
                peer_count: peers.len(),
                peer_mean: average(&peers),
                percentile,
                top_share: 100.0 - percentile,
            })
        })
        .collect()
}

// Peer comparison section

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDiversity {
    pub target_items: usize,
    /// Mean number of distinct items per competitor company.
    pub peer_mean_items: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceStanding {
    pub waste_item: String,
    pub target_value: f64,
    pub peer_mean: f64,
    pub z_score: f64,
    pub tier: SigmaTier,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerComparison {
    pub diversity: Option<ItemDiversity>,
    /// The target's largest item by absolute volume.
    pub top_volume_item: Option<String>,
    /// Standing on the item most competitors report.
    pub reference: Option<ReferenceStanding>,
    /// The item with the highest percentile, i.e. worst relative to peers.
    pub relative_worst: Option<PercentileResult>,
    /// Sorted by percentile, highest first.
    pub percentiles: Vec<PercentileResult>,
}

pub fn item_diversity(
    target: &[BenchmarkRecord],
    competitors: &[BenchmarkRecord],
) -> Option<ItemDiversity> {
    let mut per_company: HashMap<&str, HashSet<&str>> = HashMap::new();
    for r in competitors {
        per_company
            .entry(r.customer_company_name.as_str())
            .or_default()
            .insert(r.waste_item.as_str());
    }
    if per_company.is_empty() {
        return None;
    }
    let counts: Vec<f64> = per_company.values().map(|s| s.len() as f64).collect();
    let target_items: HashSet<&str> = target.iter().map(|r| r.waste_item.as_str()).collect();
    Some(ItemDiversity {
        target_items: target_items.len(),
        peer_mean_items: average(&counts),
    })
}

/// Item reported by the most competitor rows; ties go to the first seen.
pub fn most_common_item(competitors: &[BenchmarkRecord]) -> Option<&str> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in competitors {
        let c = counts.entry(r.waste_item.as_str()).or_insert(0);
        if *c == 0 {
            order.push(r.waste_item.as_str());
        }
        *c += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for item in order {
        let c = counts[item];
        if best.map_or(true, |(_, b)| c > b) {
            best = Some((item, c));
        }
    }
    best.map(|(item, _)| item)
}

pub fn top_volume_item(target: &[BenchmarkRecord]) -> Option<&str> {
    let mut best: Option<&BenchmarkRecord> = None;
    for r in target {
        if best.map_or(true, |b| r.avg_monthly_amount > b.avg_monthly_amount) {
            best = Some(r);
        }
    }
    best.map(|r| r.waste_item.as_str())
}

fn reference_standing(
    target: &[BenchmarkRecord],
    competitors: &[BenchmarkRecord],
) -> Option<ReferenceStanding> {
    let item = most_common_item(competitors)?;
    let t = target.iter().find(|r| r.waste_item == item)?;
    let peers = peer_values(competitors, item);
    let z = z_score(t.avg_monthly_amount, &peers);
    let tier = SigmaTier::from_z(z);
    Some(ReferenceStanding {
        waste_item: item.to_string(),
        target_value: t.avg_monthly_amount,
        peer_mean: average(&peers),
        z_score: z,
        tier,
        message: tier.message().to_string(),
    })
}

/// Build the whole peer section. Every part degrades to `None`/empty when the
/// benchmark lacks the data for it.
pub fn compare_with_peers(
    target: &[BenchmarkRecord],
    competitors: &[BenchmarkRecord],
    kind: PercentileKind,
) -> PeerComparison {
    let mut percentiles = percentile_by_item(target, competitors, kind);
    percentiles.sort_by(|a, b| {
        b.percentile
            .partial_cmp(&a.percentile)
            .unwrap_or(Ordering::Equal)
    });
    PeerComparison {
        diversity: item_diversity(target, competitors),
        top_volume_item: top_volume_item(target).map(str::to_string),
        reference: reference_standing(target, competitors),
        relative_worst: percentiles.first().cloned(),
        percentiles,
    }
}
