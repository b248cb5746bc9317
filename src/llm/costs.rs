//! Static per-model price table (USD per token).

use rust_decimal::Decimal;

/// Look up (input, output) cost per token for a model.
///
/// Unknown models cost zero; usage is still tracked in tokens.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    match model {
        // $0.59 / $0.79 per million tokens
        "llama-3.3-70b-versatile" => (Decimal::new(59, 8), Decimal::new(79, 8)),
        // $0.05 / $0.08 per million tokens
        "llama-3.1-8b-instant" => (Decimal::new(5, 8), Decimal::new(8, 8)),
        // $2.50 / $10.00 per million tokens
        "gpt-4o" => (Decimal::new(25, 7), Decimal::new(1, 5)),
        // $0.15 / $0.60 per million tokens
        "gpt-4o-mini" => (Decimal::new(15, 8), Decimal::new(6, 7)),
        _ => (Decimal::ZERO, Decimal::ZERO),
    }
}

/// Total cost of a call.
pub fn call_cost(rates: (Decimal, Decimal), input_tokens: u32, output_tokens: u32) -> Decimal {
    rates.0 * Decimal::from(input_tokens) + rates.1 * Decimal::from(output_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_has_nonzero_cost() {
        let (input, output) = model_cost("llama-3.3-70b-versatile");
        assert!(input > Decimal::ZERO);
        assert!(output > input);
    }

    #[test]
    fn unknown_model_is_free() {
        assert_eq!(model_cost("my-local-model"), (Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn call_cost_per_million() {
        let cost = call_cost(model_cost("gpt-4o"), 1_000_000, 1_000_000);
        assert_eq!(cost, Decimal::new(1250, 2));
    }
}
