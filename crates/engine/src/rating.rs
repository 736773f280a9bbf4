use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::SCALE;
use crate::error::{FieldError, Violations};

/// Installation-wide scale every rating input is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingScale {
    /// Whole numbers 1 through 5.
    FivePoint,
    /// 0 through 100 with at most two decimal places.
    Percent,
}

impl RatingScale {
    pub fn as_str(self) -> &'static str {
        match self {
            RatingScale::FivePoint => "five_point",
            RatingScale::Percent => "percent",
        }
    }

    pub fn check(self, field: &str, value: Decimal) -> Result<(), FieldError> {
        match self {
            RatingScale::FivePoint => {
                if !value.fract().is_zero() {
                    return Err(FieldError::new(field, "must be a whole number"));
                }
                if value < Decimal::ONE || value > Decimal::from(5) {
                    return Err(FieldError::new(field, "must be between 1 and 5"));
                }
            }
            RatingScale::Percent => {
                if value.normalize().scale() > SCALE {
                    return Err(FieldError::new(field, "must have at most 2 decimal places"));
                }
                if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                    return Err(FieldError::new(field, "must be between 0 and 100"));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for RatingScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatingScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "five_point" => Ok(RatingScale::FivePoint),
            "percent" => Ok(RatingScale::Percent),
            other => Err(format!("unknown rating scale '{other}'")),
        }
    }
}

/// Quality, efficiency and timeliness, any of which may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub quality: Option<Decimal>,
    #[serde(default)]
    pub efficiency: Option<Decimal>,
    #[serde(default)]
    pub timeliness: Option<Decimal>,
}

impl Dimensions {
    pub fn new(quality: Decimal, efficiency: Decimal, timeliness: Decimal) -> Self {
        Self {
            quality: Some(quality),
            efficiency: Some(efficiency),
            timeliness: Some(timeliness),
        }
    }

    pub fn as_array(&self) -> [Option<Decimal>; 3] {
        [self.quality, self.efficiency, self.timeliness]
    }

    /// Validate each present dimension; with `required`, absence is an error
    /// too. Field names are `{prefix}_quality` and so on.
    pub(crate) fn validate(
        &self,
        scale: RatingScale,
        prefix: &str,
        required: bool,
        violations: &mut Violations,
    ) {
        let named = [
            ("quality", self.quality),
            ("efficiency", self.efficiency),
            ("timeliness", self.timeliness),
        ];
        for (name, value) in named {
            let field = format!("{prefix}_{name}");
            match value {
                Some(v) => {
                    if let Err(e) = scale.check(&field, v) {
                        violations.push(e);
                    }
                }
                None if required => violations.add(&field, "is required"),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_point_accepts_whole_numbers_in_range() {
        let s = RatingScale::FivePoint;
        assert!(s.check("q", Decimal::from(1)).is_ok());
        assert!(s.check("q", Decimal::from(5)).is_ok());
        assert!(s.check("q", Decimal::from(0)).is_err());
        assert!(s.check("q", Decimal::from(6)).is_err());
        assert!(s.check("q", Decimal::new(35, 1)).is_err());
    }

    #[test]
    fn percent_accepts_two_places_up_to_100() {
        let s = RatingScale::Percent;
        assert!(s.check("q", Decimal::ZERO).is_ok());
        assert!(s.check("q", Decimal::ONE_HUNDRED).is_ok());
        assert!(s.check("q", Decimal::new(8725, 2)).is_ok());
        assert!(s.check("q", Decimal::new(87250, 3)).is_ok());
        assert!(s.check("q", Decimal::new(87251, 3)).is_err());
        assert!(s.check("q", Decimal::new(10001, 2)).is_err());
        assert!(s.check("q", Decimal::from(-1)).is_err());
    }

    #[test]
    fn required_dimensions_report_each_missing_field() {
        let mut v = Violations::new();
        Dimensions {
            quality: Some(Decimal::from(3)),
            ..Default::default()
        }
        .validate(RatingScale::FivePoint, "self", true, &mut v);
        match v.into_result() {
            Err(crate::WorkflowError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, ["self_efficiency", "self_timeliness"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn optional_dimensions_may_all_be_absent() {
        let mut v = Violations::new();
        Dimensions::default().validate(RatingScale::Percent, "sup", false, &mut v);
        assert!(v.into_result().is_ok());
    }

    #[test]
    fn scale_names_round_trip() {
        for s in [RatingScale::FivePoint, RatingScale::Percent] {
            assert_eq!(s.as_str().parse::<RatingScale>(), Ok(s));
        }
    }
}
