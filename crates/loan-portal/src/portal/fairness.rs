//! Approval-rate parity across monthly-income bands.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::domain::{FairnessReport, FairnessReportId, LoanApplication, LoanStatus};

const LOW_INCOME_CEILING: f64 = 3_000.0;
const HIGH_INCOME_FLOOR: f64 = 8_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IncomeGroup {
    Low,
    Middle,
    High,
}

impl IncomeGroup {
    pub const ALL: [IncomeGroup; 3] = [IncomeGroup::Low, IncomeGroup::Middle, IncomeGroup::High];

    pub fn from_monthly_income(income: f64) -> Self {
        if income < LOW_INCOME_CEILING {
            IncomeGroup::Low
        } else if income < HIGH_INCOME_FLOOR {
            IncomeGroup::Middle
        } else {
            IncomeGroup::High
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            IncomeGroup::Low => "Low income",
            IncomeGroup::Middle => "Middle income",
            IncomeGroup::High => "High income",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    approved: u32,
    rejected: u32,
    pending: u32,
    score_total: f64,
    scored: u32,
}

impl Tally {
    fn record(&mut self, loan: &LoanApplication) {
        match loan.status {
            LoanStatus::Approved => self.approved += 1,
            LoanStatus::Rejected => self.rejected += 1,
            LoanStatus::Pending => self.pending += 1,
        }
        if let Some(score) = loan.decision.predicted_score.filter(|score| score.is_finite()) {
            self.score_total += score;
            self.scored += 1;
        }
    }

    fn decided(&self) -> u32 {
        self.approved + self.rejected
    }

    fn total(&self) -> u32 {
        self.decided() + self.pending
    }

    fn approval_rate(&self) -> f64 {
        match self.decided() {
            0 => 0.0,
            decided => f64::from(self.approved) / f64::from(decided),
        }
    }

    fn rejection_rate(&self) -> f64 {
        match self.decided() {
            0 => 0.0,
            _ => 1.0 - self.approval_rate(),
        }
    }
}

/// One report per non-empty income group. The bias score is the distance between the
/// group's approval rate and the overall approval rate.
pub fn compute_fairness(loans: &[LoanApplication], now: DateTime<Utc>) -> Vec<FairnessReport> {
    let mut overall = Tally::default();
    let mut groups: BTreeMap<IncomeGroup, Tally> = BTreeMap::new();
    for loan in loans {
        overall.record(loan);
        groups
            .entry(IncomeGroup::from_monthly_income(loan.monthly_income))
            .or_default()
            .record(loan);
    }

    let overall_rate = overall.approval_rate();
    IncomeGroup::ALL
        .iter()
        .filter_map(|group| groups.get(group).map(|tally| (*group, *tally)))
        .filter(|(_, tally)| tally.total() > 0)
        .map(|(group, tally)| {
            let approval_rate = tally.approval_rate();
            let mut metrics = BTreeMap::from([
                ("decided".to_string(), f64::from(tally.decided())),
                ("approved".to_string(), f64::from(tally.approved)),
                ("rejected".to_string(), f64::from(tally.rejected)),
                ("pending".to_string(), f64::from(tally.pending)),
                ("overallApprovalRate".to_string(), overall_rate),
            ]);
            if tally.scored > 0 {
                metrics.insert(
                    "averagePredictedScore".to_string(),
                    tally.score_total / f64::from(tally.scored),
                );
            }

            FairnessReport {
                id: FairnessReportId::generate(),
                group: group.label().to_string(),
                approval_rate,
                rejection_rate: tally.rejection_rate(),
                bias_score: (approval_rate - overall_rate).abs(),
                metrics,
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}
