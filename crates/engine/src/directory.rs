//! Reference data the workflows consult but never change: who supervises
//! whom, the performance-plan catalogue, and division weight distributions.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionType {
    Strategic,
    Core,
    Support,
}

impl FunctionType {
    pub const ALL: [FunctionType; 3] = [
        FunctionType::Strategic,
        FunctionType::Core,
        FunctionType::Support,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformancePlan {
    pub id: i64,
    pub success_indicator: String,
    #[serde(default)]
    pub function_type: Option<FunctionType>,
    /// Employees who may set targets against this plan. Empty means anyone.
    #[serde(default)]
    pub personnel: Vec<i64>,
}

/// Percentage weight of each function type in a division's final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightDistribution {
    pub strategic: u32,
    pub core: u32,
    pub support: u32,
}

impl WeightDistribution {
    pub fn weight(&self, function_type: FunctionType) -> Decimal {
        Decimal::from(match function_type {
            FunctionType::Strategic => self.strategic,
            FunctionType::Core => self.core,
            FunctionType::Support => self.support,
        })
    }
}

/// Lookup interface over organisational reference data.
pub trait Directory: Send + Sync {
    /// The employee's supervisor, if they have one.
    fn supervisor_of(&self, employee_id: i64) -> Option<i64>;

    fn plan(&self, plan_id: i64) -> Option<PerformancePlan>;

    /// Weights of the division the employee belongs to.
    fn weights_for(&self, employee_id: i64) -> Option<WeightDistribution>;

    /// Employees whose supervisor is `supervisor_id`.
    fn subordinates_of(&self, supervisor_id: i64) -> Vec<i64>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid directory JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid directory: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub division: Option<String>,
    /// Overrides the division chief as supervisor.
    #[serde(default)]
    pub supervisor_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionEntry {
    pub name: String,
    #[serde(default)]
    pub chief_id: Option<i64>,
    #[serde(default)]
    pub weights: Option<WeightDistribution>,
}

/// Wire form of a [`StaticDirectory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryData {
    #[serde(default)]
    pub employees: Vec<EmployeeEntry>,
    #[serde(default)]
    pub divisions: Vec<DivisionEntry>,
    #[serde(default)]
    pub plans: Vec<PerformancePlan>,
}

/// A [`Directory`] held entirely in memory, usually loaded from JSON.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    employees: BTreeMap<i64, EmployeeEntry>,
    divisions: BTreeMap<String, DivisionEntry>,
    plans: BTreeMap<i64, PerformancePlan>,
}

impl StaticDirectory {
    pub fn new(data: DirectoryData) -> Result<Self, DirectoryError> {
        let mut dir = StaticDirectory::default();
        for division in data.divisions {
            if let Some(w) = division.weights {
                let total = w
                    .strategic
                    .checked_add(w.core)
                    .and_then(|sum| sum.checked_add(w.support));
                let Some(total) = total else {
                    return Err(DirectoryError::Invalid(format!(
                        "division '{}' weights overflow",
                        division.name
                    )));
                };
                if total == 0 {
                    return Err(DirectoryError::Invalid(format!(
                        "division '{}' has all-zero weights",
                        division.name
                    )));
                }
            }
            let name = division.name.clone();
            if dir.divisions.insert(name.clone(), division).is_some() {
                return Err(DirectoryError::Invalid(format!("duplicate division '{name}'")));
            }
        }
        for employee in data.employees {
            if let Some(division) = &employee.division {
                if !dir.divisions.contains_key(division) {
                    return Err(DirectoryError::Invalid(format!(
                        "employee {} references unknown division '{division}'",
                        employee.id
                    )));
                }
            }
            let id = employee.id;
            if dir.employees.insert(id, employee).is_some() {
                return Err(DirectoryError::Invalid(format!("duplicate employee {id}")));
            }
        }
        for plan in data.plans {
            let id = plan.id;
            if dir.plans.insert(id, plan).is_some() {
                return Err(DirectoryError::Invalid(format!("duplicate plan {id}")));
            }
        }
        Ok(dir)
    }

    pub fn from_json_str(text: &str) -> Result<Self, DirectoryError> {
        Self::new(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let text = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    fn division_of(&self, employee_id: i64) -> Option<&DivisionEntry> {
        let name = self.employees.get(&employee_id)?.division.as_ref()?;
        self.divisions.get(name)
    }
}

impl Directory for StaticDirectory {
    fn supervisor_of(&self, employee_id: i64) -> Option<i64> {
        let employee = self.employees.get(&employee_id)?;
        if employee.supervisor_id.is_some() {
            return employee.supervisor_id;
        }
        self.division_of(employee_id)?
            .chief_id
            .filter(|chief| *chief != employee_id)
    }

    fn plan(&self, plan_id: i64) -> Option<PerformancePlan> {
        self.plans.get(&plan_id).cloned()
    }

    fn weights_for(&self, employee_id: i64) -> Option<WeightDistribution> {
        self.division_of(employee_id)?.weights
    }

    fn subordinates_of(&self, supervisor_id: i64) -> Vec<i64> {
        self.employees
            .keys()
            .copied()
            .filter(|id| self.supervisor_of(*id) == Some(supervisor_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "employees": [
            {"id": 1, "name": "Ana", "division": "MIS"},
            {"id": 2, "name": "Ben", "division": "MIS"},
            {"id": 3, "name": "Chief", "division": "MIS"},
            {"id": 4, "name": "Dee", "division": "MIS", "supervisor_id": 9}
        ],
        "divisions": [
            {"name": "MIS", "chief_id": 3,
             "weights": {"strategic": 30, "core": 40, "support": 30}}
        ],
        "plans": [
            {"id": 10, "success_indicator": "Uptime", "function_type": "core", "personnel": [1, 2]},
            {"id": 11, "success_indicator": "Training"}
        ]
    }"#;

    #[test]
    fn division_chief_supervises_members() {
        let dir = StaticDirectory::from_json_str(SAMPLE).unwrap();
        assert_eq!(dir.supervisor_of(1), Some(3));
        assert_eq!(dir.supervisor_of(3), None);
        assert_eq!(dir.supervisor_of(4), Some(9));
        assert_eq!(dir.supervisor_of(42), None);
        assert_eq!(dir.subordinates_of(3), vec![1, 2]);
    }

    #[test]
    fn oversized_weights_are_rejected() {
        let text = format!(
            r#"{{"divisions": [{{"name": "MIS",
                "weights": {{"strategic": {max}, "core": 1, "support": 0}}}}]}}"#,
            max = u32::MAX
        );
        match StaticDirectory::from_json_str(&text) {
            Err(DirectoryError::Invalid(msg)) => assert!(msg.contains("overflow"), "{msg}"),
            other => panic!("expected invalid directory, got {other:?}"),
        }
    }

    #[test]
    fn plans_and_weights_resolve() {
        let dir = StaticDirectory::from_json_str(SAMPLE).unwrap();
        assert_eq!(dir.plan(10).unwrap().function_type, Some(FunctionType::Core));
        assert_eq!(dir.plan(11).unwrap().function_type, None);
        assert!(dir.plan(12).is_none());
        let weights = dir.weights_for(1).unwrap();
        assert_eq!(weights.weight(FunctionType::Core), Decimal::from(40));
    }

    #[test]
    fn unknown_division_is_rejected() {
        let err = StaticDirectory::from_json_str(
            r#"{"employees": [{"id": 1, "name": "Ana", "division": "Nowhere"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DirectoryError::Invalid(_)), "{err}");
    }

    #[test]
    fn duplicate_plan_is_rejected() {
        let err = StaticDirectory::from_json_str(
            r#"{"plans": [
                {"id": 1, "success_indicator": "a"},
                {"id": 1, "success_indicator": "b"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate plan 1"));
    }
}
