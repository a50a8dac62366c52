use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Deserialize a request piped on stdin. Interactive terminals and empty
/// input yield `None`.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_payload(&buffer)
}

fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let payload = raw.trim();
    if payload.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(payload)
        .map(Some)
        .map_err(|e| format!("Invalid JSON request on stdin: {e}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loan_sim_core::amortization::SimulationInput;
    use rust_decimal::Decimal;

    #[test]
    fn test_payload_parses_into_request() {
        let raw = r#"
            {"product": {"name": "Personal", "annual_rate": "12.00", "max_term_months": 24},
             "principal": "5000.00", "term_months": 24}
        "#;
        let parsed: SimulationInput = parse_payload(raw).unwrap().unwrap();
        assert_eq!(parsed.principal, Some(Decimal::new(500000, 2)));
        assert_eq!(parsed.term_months, Some(24));
        assert_eq!(parsed.product.map(|p| p.max_term_months), Some(24));
    }

    #[test]
    fn test_blank_payload_is_none() {
        let parsed: Option<SimulationInput> = parse_payload("  \n").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_malformed_payload_is_error() {
        let err = parse_payload::<SimulationInput>("{\"principal\": ").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON request on stdin"));
    }
}
