/// `cost_usd = tokens_in * cost_per_input_token + tokens_out * cost_per_output_token`
/// (spec §3 invariant). Shared by `Worker::poll`/completion bookkeeping and by
/// the router's budget gate so the two never drift apart.
pub fn compute_cost_usd(
    tokens_in: u64,
    tokens_out: u64,
    cost_per_input_token: f64,
    cost_per_output_token: f64,
) -> f64 {
    tokens_in as f64 * cost_per_input_token + tokens_out as f64 * cost_per_output_token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_provider_rates() {
        let cost = compute_cost_usd(1000, 500, 1e-6, 2e-6);
        assert!((cost - 0.002).abs() < 1e-12);
    }
}
