//! Final document score: supervisor averages grouped by function type and
//! weighted by the owner's division distribution.

use std::collections::BTreeMap;

use officeflow_storage::{AssociationRecord, WorkflowStorage};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::actor::Actor;
use crate::aggregate::round2;
use crate::directory::{Directory, FunctionType, PerformancePlan, WeightDistribution};
use crate::error::WorkflowError;
use crate::policy::{authorize, Action};
use crate::service::Engine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentScore {
    pub document_id: i64,
    /// Mean supervisor average per function type, for types with a rating.
    pub by_function: BTreeMap<FunctionType, Decimal>,
    /// `None` when nothing is rated or no weight distribution applies.
    pub final_score: Option<Decimal>,
}

/// Mean of the present supervisor averages per function type. Plans without
/// a function type do not contribute.
pub fn function_means<F>(
    associations: &[AssociationRecord],
    plan: F,
) -> BTreeMap<FunctionType, Decimal>
where
    F: Fn(i64) -> Option<PerformancePlan>,
{
    let mut sums: BTreeMap<FunctionType, (Decimal, u32)> = BTreeMap::new();
    for row in associations {
        let (Some(avg), Some(ft)) = (
            row.sup_average,
            plan(row.plan_id).and_then(|p| p.function_type),
        ) else {
            continue;
        };
        let entry = sums.entry(ft).or_insert((Decimal::ZERO, 0));
        entry.0 += avg;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(ft, (sum, n))| (ft, round2(sum / Decimal::from(n))))
        .collect()
}

/// Σ(weight × mean) / Σ(weight), over types that have a mean.
pub fn weighted_score(
    means: &BTreeMap<FunctionType, Decimal>,
    weights: &WeightDistribution,
) -> Option<Decimal> {
    let mut numerator = Decimal::ZERO;
    let mut denominator = Decimal::ZERO;
    for (ft, mean) in means {
        let w = weights.weight(*ft);
        numerator += w * mean;
        denominator += w;
    }
    if denominator.is_zero() {
        None
    } else {
        Some(round2(numerator / denominator))
    }
}

impl<S: WorkflowStorage, D: Directory> Engine<S, D> {
    pub async fn document_score(
        &self,
        actor: &Actor,
        document_id: i64,
    ) -> Result<DocumentScore, WorkflowError> {
        authorize(actor, Action::ViewScore)?;
        let doc = self.storage.get_document(document_id).await?;
        self.check_reader(actor, doc.employee_id, Action::ViewScore)?;
        let rows = self.storage.list_associations(document_id).await?;
        let by_function = function_means(&rows, |id| self.directory.plan(id));
        let final_score = self
            .directory
            .weights_for(doc.employee_id)
            .and_then(|w| weighted_score(&by_function, &w));
        Ok(DocumentScore {
            document_id,
            by_function,
            final_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn plan(id: i64) -> Option<PerformancePlan> {
        let function_type = match id {
            1 | 2 => Some(FunctionType::Core),
            3 => Some(FunctionType::Strategic),
            4 => Some(FunctionType::Support),
            _ => None,
        };
        Some(PerformancePlan {
            id,
            success_indicator: format!("indicator {id}"),
            function_type,
            personnel: vec![],
        })
    }

    fn rated(plan_id: i64, sup: Option<&str>) -> AssociationRecord {
        let mut row = AssociationRecord::new(plan_id, 1, plan_id, "2025-09-01T00:00:00Z");
        row.sup_average = sup.map(d);
        row
    }

    const WEIGHTS: WeightDistribution = WeightDistribution {
        strategic: 20,
        core: 70,
        support: 10,
    };

    #[test]
    fn means_group_by_function_type() {
        let rows = [
            rated(1, Some("80")),
            rated(2, Some("90")),
            rated(3, Some("70")),
            rated(4, None),
            rated(9, Some("10")),
        ];
        let means = function_means(&rows, plan);
        assert_eq!(means.get(&FunctionType::Core), Some(&d("85.00")));
        assert_eq!(means.get(&FunctionType::Strategic), Some(&d("70.00")));
        assert_eq!(means.get(&FunctionType::Support), None);
    }

    #[test]
    fn weights_only_count_rated_types() {
        let rows = [rated(1, Some("80")), rated(3, Some("70"))];
        let means = function_means(&rows, plan);
        // (70*80 + 20*70) / 90
        assert_eq!(weighted_score(&means, &WEIGHTS), Some(d("77.78")));
    }

    #[test]
    fn nothing_rated_has_no_score() {
        let rows = [rated(1, None)];
        assert_eq!(weighted_score(&function_means(&rows, plan), &WEIGHTS), None);
    }

    #[test]
    fn zero_weight_types_have_no_score() {
        let rows = [rated(4, Some("90"))];
        let weights = WeightDistribution {
            strategic: 50,
            core: 50,
            support: 0,
        };
        assert_eq!(weighted_score(&function_means(&rows, plan), &weights), None);
    }
}
