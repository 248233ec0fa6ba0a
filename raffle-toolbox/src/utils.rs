/// Tolerance used when checking that probabilities are normalized.
pub const PROBABILITY_EPSILON: f64 = 1e-9;

pub fn are_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= PROBABILITY_EPSILON
}

pub fn assert_are_close(a: f64, b: f64) {
    assert!(are_close(a, b), "{} and {} differ by more than {}", a, b, PROBABILITY_EPSILON);
}
