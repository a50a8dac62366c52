use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::amortization::{self, SimulationInput, SimulationResult};
use crate::error::LoanSimError;
use crate::types::*;
use crate::LoanSimResult;

const MAX_NAME_LEN: usize = 100;
const MAX_ANNUAL_RATE: Rate = dec!(100);
const RATE_DP: u32 = 2;

/// Payload for creating or updating a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub annual_rate: Option<Rate>,
    #[serde(default)]
    pub max_term_months: Option<i64>,
}

/// Simulation against a catalogued product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub product_id: i64,
    pub principal: Money,
    pub term_months: i64,
}

fn invalid(field: &str, reason: impl Into<String>) -> LoanSimError {
    LoanSimError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

impl ProductRequest {
    /// Check the request and produce an id-less product.
    pub fn validate(&self) -> LoanSimResult<LoanProduct> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(invalid("name", "Product name is required"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(invalid(
                "name",
                format!("Product name must be at most {MAX_NAME_LEN} characters"),
            ));
        }

        let annual_rate = self
            .annual_rate
            .ok_or_else(|| invalid("annual_rate", "Annual rate is required"))?;
        if annual_rate < Decimal::ZERO || annual_rate > MAX_ANNUAL_RATE {
            return Err(invalid(
                "annual_rate",
                format!("Annual rate must be between 0 and {MAX_ANNUAL_RATE}, got {annual_rate}"),
            ));
        }
        if annual_rate.normalize().scale() > RATE_DP {
            return Err(invalid(
                "annual_rate",
                format!("Annual rate allows at most {RATE_DP} decimal places"),
            ));
        }

        let max_term_months = match self.max_term_months {
            Some(m) if m > i64::from(amortization::MAX_TERM_MONTHS) => {
                return Err(invalid(
                    "max_term_months",
                    format!(
                        "Maximum term must not exceed {} months, got {m}",
                        amortization::MAX_TERM_MONTHS
                    ),
                ))
            }
            Some(m) if m > 0 => u32::try_from(m)
                .map_err(|_| invalid("max_term_months", format!("{m} is out of range")))?,
            Some(m) => {
                return Err(invalid(
                    "max_term_months",
                    format!("Maximum term must be positive, got {m}"),
                ))
            }
            None => return Err(invalid("max_term_months", "Maximum term is required")),
        };

        Ok(LoanProduct::new(name, annual_rate, max_term_months))
    }
}

impl SimulationRequest {
    fn validate(&self) -> LoanSimResult<u64> {
        if self.product_id <= 0 {
            return Err(invalid("product_id", "Product id must be positive"));
        }
        if self.principal <= Decimal::ZERO {
            return Err(invalid("principal", "Requested amount must be positive"));
        }
        if self.term_months <= 0 {
            return Err(invalid("term_months", "Term in months must be positive"));
        }
        Ok(self.product_id as u64)
    }
}

/// In-memory loan product store. Ids are assigned sequentially from 1.
#[derive(Debug, Clone)]
pub struct ProductCatalogue {
    products: BTreeMap<u64, LoanProduct>,
    next_id: u64,
}

impl Default for ProductCatalogue {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductCatalogue {
    pub fn new() -> Self {
        ProductCatalogue {
            products: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild a catalogue from stored records, keeping their ids.
    pub fn from_products(products: Vec<LoanProduct>) -> LoanSimResult<Self> {
        let mut catalogue = Self::new();
        for product in products {
            let id = product
                .id
                .ok_or_else(|| invalid("id", format!("Product '{}' has no id", product.name)))?;
            if id == 0 {
                return Err(invalid("id", "Product ids start at 1"));
            }
            let request = ProductRequest {
                name: product.name.clone(),
                annual_rate: Some(product.annual_rate),
                max_term_months: Some(i64::from(product.max_term_months)),
            };
            let mut validated = request.validate()?;
            validated.id = Some(id);
            if catalogue.products.insert(id, validated).is_some() {
                return Err(invalid("id", format!("Duplicate product id {id}")));
            }
            let after = id
                .checked_add(1)
                .ok_or_else(|| invalid("id", format!("Product id {id} is out of range")))?;
            catalogue.next_id = catalogue.next_id.max(after);
        }
        Ok(catalogue)
    }

    pub fn list(&self) -> Vec<LoanProduct> {
        self.products.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, id: u64) -> LoanSimResult<&LoanProduct> {
        self.products
            .get(&id)
            .ok_or(LoanSimError::ProductNotFound(id))
    }

    pub fn create(&mut self, request: &ProductRequest) -> LoanSimResult<LoanProduct> {
        let mut product = request.validate()?;
        let id = self.next_id;
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| invalid("id", "Product id sequence is exhausted"))?;
        product.id = Some(id);
        self.products.insert(id, product.clone());
        self.next_id = next_id;
        debug!("created product {id} '{}'", product.name);
        Ok(product)
    }

    pub fn update(&mut self, id: u64, request: &ProductRequest) -> LoanSimResult<LoanProduct> {
        let validated = request.validate()?;
        let product = self
            .products
            .get_mut(&id)
            .ok_or(LoanSimError::ProductNotFound(id))?;
        product.name = validated.name;
        product.annual_rate = validated.annual_rate;
        product.max_term_months = validated.max_term_months;
        debug!("updated product {id}");
        Ok(product.clone())
    }

    pub fn remove(&mut self, id: u64) -> LoanSimResult<LoanProduct> {
        let removed = self
            .products
            .remove(&id)
            .ok_or(LoanSimError::ProductNotFound(id))?;
        debug!("removed product {id}");
        Ok(removed)
    }

    /// Look the product up and run the amortization simulation for it.
    pub fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> LoanSimResult<ComputationOutput<SimulationResult>> {
        let id = request.validate()?;
        let product = self.get(id)?;
        amortization::simulate(&SimulationInput {
            product: Some(product.clone()),
            principal: Some(request.principal),
            term_months: Some(request.term_months),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(name: &str, rate: Decimal, max_term: i64) -> ProductRequest {
        ProductRequest {
            name: name.into(),
            annual_rate: Some(rate),
            max_term_months: Some(max_term),
        }
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let mut catalogue = ProductCatalogue::new();
        let a = catalogue.create(&request("Personal", dec!(12.00), 24)).unwrap();
        let b = catalogue.create(&request("Payroll", dec!(8.50), 48)).unwrap();
        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(2));
        assert_eq!(catalogue.len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut catalogue = ProductCatalogue::new();
        catalogue.create(&request("Personal", dec!(12.00), 24)).unwrap();
        catalogue.remove(1).unwrap();
        let next = catalogue.create(&request("Vehicle", dec!(18.00), 60)).unwrap();
        assert_eq!(next.id, Some(2));
    }

    #[test]
    fn test_validation_rules() {
        assert!(request("  ", dec!(12), 24).validate().is_err());
        assert!(request(&"x".repeat(101), dec!(12), 24).validate().is_err());
        assert!(request("Loan", dec!(-0.01), 24).validate().is_err());
        assert!(request("Loan", dec!(100.01), 24).validate().is_err());
        assert!(request("Loan", dec!(12.345), 24).validate().is_err());
        assert!(request("Loan", dec!(12), 0).validate().is_err());
        assert!(request("Loan", dec!(12), 601).validate().is_err());
        assert!(request("Loan", dec!(12), 600).validate().is_ok());
        assert!(request("Loan", dec!(100), 1).validate().is_ok());
        assert!(request("Loan", dec!(12.500), 24).validate().is_ok());

        let missing_rate = ProductRequest {
            name: "Loan".into(),
            annual_rate: None,
            max_term_months: Some(12),
        };
        match missing_rate.validate() {
            Err(LoanSimError::InvalidInput { field, .. }) => assert_eq!(field, "annual_rate"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_from_products_rejects_duplicates() {
        let mut p = LoanProduct::new("Personal", dec!(12), 24);
        p.id = Some(3);
        let err = ProductCatalogue::from_products(vec![p.clone(), p]).unwrap_err();
        assert!(matches!(err, LoanSimError::InvalidInput { .. }));
    }

    #[test]
    fn test_from_products_rejects_id_at_range_end() {
        let mut p = LoanProduct::new("Personal", dec!(12), 24);
        p.id = Some(u64::MAX);
        match ProductCatalogue::from_products(vec![p]) {
            Err(LoanSimError::InvalidInput { field, .. }) => assert_eq!(field, "id"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }

        let mut last = LoanProduct::new("Personal", dec!(12), 24);
        last.id = Some(u64::MAX - 1);
        let mut catalogue = ProductCatalogue::from_products(vec![last]).unwrap();
        let err = catalogue.create(&request("Vehicle", dec!(18), 60)).unwrap_err();
        assert!(matches!(err, LoanSimError::InvalidInput { .. }));
        assert_eq!(catalogue.len(), 1);
    }

    #[test]
    fn test_simulate_unknown_product() {
        let catalogue = ProductCatalogue::new();
        let err = catalogue
            .simulate(&SimulationRequest {
                product_id: 9,
                principal: dec!(1000),
                term_months: 12,
            })
            .unwrap_err();
        assert!(matches!(err, LoanSimError::ProductNotFound(9)));
        assert_eq!(err.status_code(), 404);
    }
}
