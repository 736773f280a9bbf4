use rust_decimal::{Decimal, RoundingStrategy};

/// Places every stored average and score is rounded to.
pub const SCALE: u32 = 2;

/// Rounds half away from zero and always carries exactly two places, so
/// `4` is stored and printed as `4.00`.
pub(crate) fn round2(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(SCALE);
    rounded
}

/// Mean of the present values, rounded half away from zero to two places.
///
/// Absent values are dropped rather than counted as zero. Returns `None`
/// when nothing is present.
pub fn average(values: &[Option<Decimal>]) -> Option<Decimal> {
    let present: Vec<Decimal> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    let sum: Decimal = present.iter().sum();
    Some(round2(sum / Decimal::from(present.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn mean_of_three() {
        assert_eq!(
            average(&[Some(d("80")), Some(d("90")), Some(d("70"))]),
            Some(d("80.00"))
        );
    }

    #[test]
    fn absent_values_are_not_zero() {
        assert_eq!(average(&[Some(d("80")), None, None]), Some(d("80.00")));
        assert_eq!(average(&[None, Some(d("3")), Some(d("4"))]), Some(d("3.5")));
    }

    #[test]
    fn all_absent_is_none() {
        assert_eq!(average(&[None, None, None]), None);
        assert_eq!(average(&[]), None);
    }

    #[test]
    fn zero_is_a_present_value() {
        assert_eq!(average(&[Some(d("0")), Some(d("90")), None]), Some(d("45")));
    }

    #[test]
    fn repeating_thirds_round_to_two_places() {
        assert_eq!(
            average(&[Some(d("4")), Some(d("4")), Some(d("5"))]),
            Some(d("4.33"))
        );
        assert_eq!(
            average(&[Some(d("5")), Some(d("5")), Some(d("4"))]),
            Some(d("4.67"))
        );
    }

    #[test]
    fn results_always_carry_two_places() {
        let avg = average(&[Some(d("3")), Some(d("4")), Some(d("5"))]).unwrap();
        assert_eq!(avg.to_string(), "4.00");
        assert_eq!(avg.scale(), SCALE);
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        assert_eq!(round2(d("2.345")), d("2.35"));
        assert_eq!(round2(d("-2.345")), d("-2.35"));
    }
}
