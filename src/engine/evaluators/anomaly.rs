use std::collections::HashMap;

use serde_json::json;

use crate::config::AnomalyEvaluatorConfig;
use crate::db::models::{AlertType, Priority, Transaction};
use crate::engine::round2;
use crate::error::AppError;

use super::{Candidate, EvalOutput, Evaluator, UserSnapshot};

/// Flags recent transactions that sit far above their category's trailing
/// mean. Categories with fewer than `min_samples` prior transactions are
/// skipped outright: sparse history gives no signal worth alerting on.
pub struct AnomalyEvaluator {
    cfg: AnomalyEvaluatorConfig,
}

impl AnomalyEvaluator {
    pub fn new(cfg: AnomalyEvaluatorConfig) -> Self {
        Self { cfg }
    }
}

/// Mean and sample standard deviation of a series.
fn mean_stddev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

impl Evaluator for AnomalyEvaluator {
    fn name(&self) -> &'static str {
        "anomaly"
    }

    fn evaluate(&self, snapshot: &UserSnapshot) -> Result<EvalOutput, AppError> {
        let mut candidates = Vec::new();

        // Snapshot transactions are oldest-first over the stats window.
        let mut by_category: HashMap<&str, Vec<&Transaction>> = HashMap::new();
        for txn in &snapshot.transactions {
            if let Some(cat) = txn.category_id.as_deref() {
                by_category.entry(cat).or_default().push(txn);
            }
        }

        let recent_cutoff = snapshot.today - chrono::Duration::days(self.cfg.recent_days);

        for (category_id, txns) in by_category {
            for (idx, txn) in txns.iter().enumerate() {
                if txn.occurred_on < recent_cutoff {
                    continue;
                }

                // History: strictly earlier transactions in the same category.
                let history: Vec<f64> = txns[..idx]
                    .iter()
                    .filter(|h| h.occurred_on < txn.occurred_on)
                    .map(|h| h.amount)
                    .collect();
                if history.len() < self.cfg.min_samples {
                    continue;
                }

                let (mean, stddev) = mean_stddev(&history);
                if stddev <= 0.0 {
                    continue;
                }

                let amount = round2(txn.amount);
                let threshold = round2(mean + self.cfg.stddev_multiplier * stddev);
                if amount <= threshold {
                    continue;
                }

                let escalation = round2(mean + self.cfg.escalation_multiplier * stddev);
                let priority = if amount > escalation {
                    Priority::High
                } else {
                    Priority::Medium
                };

                candidates.push(Candidate {
                    alert_type: AlertType::AnomalousSpending,
                    priority,
                    title: "Unusual spending detected".to_string(),
                    message: format!(
                        "A transaction of {amount:.2} is well above the usual {:.2} for this category",
                        round2(mean)
                    ),
                    target: None,
                    metadata: Some(json!({
                        "transaction_id": txn.id,
                        "category_id": category_id,
                        "amount": amount,
                        "category_mean": round2(mean),
                        "category_stddev": round2(stddev),
                        "sample_size": history.len(),
                    })),
                    expires_at: None,
                });
            }
        }

        Ok(EvalOutput::from_candidates(candidates))
    }
}
