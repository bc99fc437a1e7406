pub mod clock;
pub mod evaluators;
pub mod orchestrator;
pub mod scheduler;
pub mod status;

/// Round to the currency's minor unit (two decimals). Applied before every
/// threshold comparison so floating-point noise cannot flap an alert across
/// a boundary.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(849.999999), 850.0);
        assert_eq!(round2(849.994), 849.99);
        assert_eq!(round2(-0.005), -0.01);
        assert_eq!(round2(0.0), 0.0);
    }
}
