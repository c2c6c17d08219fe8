use super::port::Transaction;

/// Gas-weighted percentiles of the effective gas price paid in one block.
///
/// `percentiles` must already be validated (ascending, within `[0, 100]`),
/// which allows a single pass over the price-sorted transactions. A block
/// without transactions reports its base fee for every percentile.
pub fn compute_rewards(
    base_fee: u128,
    transactions: &[Transaction],
    percentiles: &[f64],
) -> Vec<u128> {
    if transactions.is_empty() {
        return vec![base_fee; percentiles.len()];
    }

    let mut sorted = transactions.to_vec();
    sorted.sort_by_key(|tx| tx.effective_gas_price);

    let total_gas_used: u64 = sorted.iter().map(|tx| tx.gas_used).sum();

    let mut index = 0;
    let mut cumulative_gas_used = sorted[0].gas_used;

    percentiles
        .iter()
        .map(|percentile| {
            let threshold = total_gas_used as f64 * percentile / 100.0;
            while (cumulative_gas_used as f64) < threshold && index < sorted.len() - 1 {
                index += 1;
                cumulative_gas_used += sorted[index].gas_used;
            }
            sorted[index].effective_gas_price
        })
        .collect()
}
