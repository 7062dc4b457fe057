use image::Rgb;

use crate::estimation::domain::attribute_estimator::AttributeEstimate;
use crate::shared::constants::SENIOR_AGE_THRESHOLD;

pub const SENIOR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const NON_SENIOR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// How one face is drawn and whether it is logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub senior: bool,
    pub label: String,
    pub color: Rgb<u8>,
}

/// Ages strictly above the threshold are seniors; exactly 60 is not.
pub fn classify(estimate: &AttributeEstimate) -> Classification {
    if estimate.age > SENIOR_AGE_THRESHOLD {
        Classification {
            senior: true,
            label: format!("Senior ({})", estimate.gender),
            color: SENIOR_COLOR,
        }
    } else {
        Classification {
            senior: false,
            label: format!("{}, {} yrs", estimate.gender, estimate.age),
            color: NON_SENIOR_COLOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::domain::attribute_estimator::Gender;
    use rstest::rstest;

    #[test]
    fn test_senior_label_and_color() {
        let c = classify(&AttributeEstimate {
            age: 72,
            gender: Gender::Female,
        });
        assert!(c.senior);
        assert_eq!(c.label, "Senior (Woman)");
        assert_eq!(c.color, SENIOR_COLOR);
    }

    #[test]
    fn test_non_senior_label_and_color() {
        let c = classify(&AttributeEstimate {
            age: 34,
            gender: Gender::Male,
        });
        assert!(!c.senior);
        assert_eq!(c.label, "Man, 34 yrs");
        assert_eq!(c.color, NON_SENIOR_COLOR);
    }

    #[rstest]
    #[case(0, false)]
    #[case(59, false)]
    #[case(60, false)]
    #[case(61, true)]
    #[case(120, true)]
    fn test_threshold_boundary(#[case] age: u32, #[case] senior: bool) {
        let c = classify(&AttributeEstimate {
            age,
            gender: Gender::Male,
        });
        assert_eq!(c.senior, senior);
        assert_eq!(c.label.starts_with("Senior"), senior);
    }
}
