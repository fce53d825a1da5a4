pub const MICROVOLTS_PER_VOLT: f64 = 1e6;

/// Converts a raw lock-in reading into the voltage at the input of the preamplifier.
pub fn raw_code_to_physical(raw: f64, gain: f64) -> f64 {
    raw / gain
}

pub fn to_microvolts(volts: f64) -> f64 {
    volts * MICROVOLTS_PER_VOLT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_divides_the_raw_reading() {
        assert_eq!(raw_code_to_physical(2.5e-3, 1000.0), 2.5e-6);
        assert_eq!(raw_code_to_physical(-4.0, 1.0), -4.0);
        assert!((to_microvolts(2.5e-6) - 2.5).abs() < 1e-12);
    }
}
