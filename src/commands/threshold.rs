use anyhow::{Result, bail};
use tracing::info;

use crate::cli::ThresholdArgs;
use crate::rules::theoretical_threshold_for_radius;

pub fn run(args: ThresholdArgs) -> Result<()> {
    let threshold = threshold_for(args.radius)?;
    info!(radius = args.radius, threshold, "theoretical SNR threshold");
    println!("{threshold}");

    Ok(())
}

fn threshold_for(radius: f64) -> Result<u32> {
    if !radius.is_finite() || radius < 0.0 {
        bail!("radius must be a non-negative number, got {radius}");
    }

    Ok(theoretical_threshold_for_radius(radius))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_follows_radius_steps() {
        assert_eq!(threshold_for(0.0).expect("zero radius is valid"), 83);
        assert_eq!(threshold_for(35.0).expect("radius should be valid"), 20);
        assert_eq!(threshold_for(130.0).expect("radius should be valid"), 6);
        assert_eq!(threshold_for(1_000.0).expect("radius should be valid"), 5);

        run(ThresholdArgs { radius: 45.0 }).expect("valid radius should print");
    }

    #[test]
    fn negative_or_nan_radius_is_rejected() {
        for radius in [-1.0, f64::NAN, f64::INFINITY] {
            let err = run(ThresholdArgs { radius }).expect_err("radius should be rejected");
            assert!(err.to_string().contains("non-negative"));
        }
    }
}
