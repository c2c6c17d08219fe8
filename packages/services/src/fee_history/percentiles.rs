use crate::{Error, Result};

/// Checks that every percentile lies in `[0, 100]` and that the list never
/// decreases. An empty list is valid and means no rewards were requested.
pub fn validate_percentiles(percentiles: &[f64]) -> Result<()> {
    let mut previous = None;
    for (index, &percentile) in percentiles.iter().enumerate() {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(Error::InvalidPercentile(format!(
                "percentile #{index} ({percentile}) is outside of [0, 100]"
            )));
        }

        if let Some(previous) = previous.filter(|&previous| percentile < previous) {
            return Err(Error::InvalidPercentile(format!(
                "percentile #{index} ({percentile}) is lower than its predecessor ({previous})"
            )));
        }

        previous = Some(percentile);
    }

    Ok(())
}
