use log::{debug, warn};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LoanSimError;
use crate::types::*;
use crate::LoanSimResult;

const MONEY_DP: u32 = 2;
const FACTOR_DP: u32 = 10;
const MONTHS_PER_YEAR: u32 = 12;
const ROOT_CONVERGENCE_THRESHOLD: Decimal = dec!(0.00000000000000000001);
const MAX_ROOT_ITERATIONS: u32 = 100;
/// Highest annual rate the product catalogue accepts
const CATALOGUE_MAX_RATE: Rate = dec!(100);
const DRIFT_TOLERANCE: Money = dec!(0.01);
/// Longest term the engine will schedule
pub const MAX_TERM_MONTHS: u32 = 600;

/// One month of a fixed-installment schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthEntry {
    pub month: u32,
    pub installment: Money,
    pub interest: Money,
    pub amortization: Money,
    pub remaining_balance: Money,
}

/// Request-shaped simulation input. Absent values are reported with the
/// matching error kind rather than rejected by deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationInput {
    #[serde(default)]
    pub product: Option<LoanProduct>,
    #[serde(default)]
    pub principal: Option<Money>,
    #[serde(default)]
    pub term_months: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub product: LoanProduct,
    pub annual_rate: Rate,
    pub effective_monthly_rate: Rate,
    pub principal: Money,
    pub installment: Money,
    /// installment × term
    pub total_paid: Money,
    pub total_interest: Money,
    pub schedule: Vec<MonthEntry>,
}

/// Round half-up to cents, always carrying two fractional digits.
pub fn round_money(value: Decimal) -> Money {
    let mut rounded = value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_DP);
    rounded
}

fn to_fraction(percent: Rate) -> Decimal {
    percent / dec!(100)
}

/// `base^periods` by repeated multiplication. `None` once the decimal range is exceeded.
fn compound(base: Decimal, periods: u32) -> Option<Decimal> {
    (0..periods).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(base))
}

/// n-th root of a decimal >= 1 by Newton-Raphson: x <- ((n-1)x + a/x^(n-1)) / n
fn nth_root(value: Decimal, n: u32) -> LoanSimResult<Decimal> {
    let n_dec = Decimal::from(n);
    let n_minus_one = n_dec - Decimal::ONE;

    // Seed from the transcendental power; Bernoulli's bound is a safe fallback above the root.
    let mut x = value
        .checked_powd(Decimal::ONE / n_dec)
        .filter(|seed| *seed >= Decimal::ONE)
        .unwrap_or_else(|| Decimal::ONE + (value - Decimal::ONE) / n_dec);

    let mut delta = Decimal::ZERO;
    for i in 0..MAX_ROOT_ITERATIONS {
        let x_pow = compound(x, n - 1)
            .filter(|p| !p.is_zero())
            .ok_or_else(|| LoanSimError::ConvergenceFailure {
                function: "nth_root".into(),
                iterations: i,
                last_delta: delta,
            })?;

        let next = (n_minus_one * x + value / x_pow) / n_dec;
        delta = (next - x).abs();
        x = next;

        if delta < ROOT_CONVERGENCE_THRESHOLD {
            return Ok(x);
        }
    }

    Err(LoanSimError::ConvergenceFailure {
        function: "nth_root".into(),
        iterations: MAX_ROOT_ITERATIONS,
        last_delta: delta,
    })
}

fn validate_rate(rate: Rate, label: &str) -> LoanSimResult<()> {
    if rate < Decimal::ZERO {
        return Err(LoanSimError::InvalidRate(format!(
            "{label} must be non-negative, got {rate}"
        )));
    }
    Ok(())
}

fn validate_principal(principal: Money) -> LoanSimResult<()> {
    if principal <= Decimal::ZERO {
        return Err(LoanSimError::InvalidPrincipal(format!(
            "principal must be positive, got {principal}"
        )));
    }
    Ok(())
}

fn validate_term(term_months: u32) -> LoanSimResult<()> {
    if term_months == 0 {
        return Err(LoanSimError::InvalidTerm(
            "term must be at least 1 month".into(),
        ));
    }
    if term_months > MAX_TERM_MONTHS {
        return Err(LoanSimError::InvalidTerm(format!(
            "term must be at most {MAX_TERM_MONTHS} months, got {term_months}"
        )));
    }
    Ok(())
}

/// Effective monthly rate equivalent to a nominal annual rate, both in percent.
///
/// `(1 + annual/100)^(1/12) - 1`, expressed back as a percentage and rounded
/// half-up to 2 decimals. The twelfth root is resolved in decimal arithmetic so
/// the rounded figure never depends on binary floating-point error.
pub fn effective_monthly_rate(annual_rate: Rate) -> LoanSimResult<Rate> {
    validate_rate(annual_rate, "annual rate")?;

    if annual_rate.is_zero() {
        return Ok(round_money(Decimal::ZERO));
    }

    let growth = Decimal::ONE + to_fraction(annual_rate);
    let root = nth_root(growth, MONTHS_PER_YEAR)?;
    Ok(round_money((root - Decimal::ONE) * dec!(100)))
}

/// Fixed installment (Price method) that amortizes `principal` over `term_months`.
///
/// PMT = P * i(1+i)^n / ((1+i)^n - 1), with the factor rounded to 10 decimals
/// and the installment to cents. A zero rate falls back to `P / n`.
pub fn installment_amount(
    principal: Money,
    monthly_rate: Rate,
    term_months: u32,
) -> LoanSimResult<Money> {
    validate_principal(principal)?;
    validate_rate(monthly_rate, "monthly rate")?;
    validate_term(term_months)?;

    let i = to_fraction(monthly_rate);
    let periods = Decimal::from(term_months);

    if i.is_zero() {
        return Ok(round_money(principal / periods));
    }

    let factor = match compound(Decimal::ONE + i, term_months) {
        Some(growth) => {
            let denominator = growth - Decimal::ONE;
            if denominator.is_zero() {
                // Rate below decimal resolution
                return Ok(round_money(principal / periods));
            }
            i.checked_mul(growth)
                .map(|numerator| numerator / denominator)
                .unwrap_or(i)
                .round_dp_with_strategy(FACTOR_DP, RoundingStrategy::MidpointAwayFromZero)
        }
        // (1+i)^n beyond the decimal range: the factor equals i to full precision
        None => i,
    };

    let installment = principal.checked_mul(factor).ok_or_else(|| {
        LoanSimError::InvalidPrincipal(format!(
            "principal {principal} is too large to amortize"
        ))
    })?;

    Ok(round_money(installment))
}

/// Month-by-month breakdown of a fixed-installment loan.
///
/// Interest is rounded to cents each month on the running balance and the
/// installment is never recomputed, so the final balance can differ from zero
/// by a few cents of rounding drift. A balance that would go negative is
/// clamped to zero; earlier months are never adjusted.
///
/// The installment must cover at least the first month's interest, otherwise
/// the balance would grow instead of amortizing.
pub fn build_schedule(
    principal: Money,
    installment: Money,
    monthly_rate: Rate,
    term_months: u32,
) -> LoanSimResult<Vec<MonthEntry>> {
    validate_principal(principal)?;
    validate_rate(monthly_rate, "monthly rate")?;
    validate_term(term_months)?;

    let i = to_fraction(monthly_rate);
    if installment <= Decimal::ZERO {
        return Err(LoanSimError::InvalidInput {
            field: "installment".into(),
            reason: format!("installment must be positive, got {installment}"),
        });
    }
    let first_interest = principal.checked_mul(i).map(round_money).ok_or_else(|| {
        LoanSimError::InvalidPrincipal(format!("principal {principal} is too large to amortize"))
    })?;
    if installment < first_interest {
        return Err(LoanSimError::InvalidInput {
            field: "installment".into(),
            reason: format!(
                "installment {installment} does not cover the first month's interest of {first_interest}"
            ),
        });
    }

    let mut balance = principal;
    let mut schedule = Vec::with_capacity(term_months as usize);

    for month in 1..=term_months {
        let accrued = balance.checked_mul(i).ok_or_else(|| {
            LoanSimError::InvalidPrincipal(format!(
                "balance overflowed the decimal range in month {month}"
            ))
        })?;
        let interest = round_money(accrued);
        let amortization = installment - interest;

        balance = balance.checked_sub(amortization).ok_or_else(|| {
            LoanSimError::InvalidPrincipal(format!(
                "balance overflowed the decimal range in month {month}"
            ))
        })?;
        if balance < Decimal::ZERO {
            balance = round_money(Decimal::ZERO);
        }

        schedule.push(MonthEntry {
            month,
            installment,
            interest,
            amortization,
            remaining_balance: balance,
        });
    }

    Ok(schedule)
}

/// Simulate a loan against a product: rate conversion, installment, schedule.
pub fn simulate_loan(
    product: &LoanProduct,
    principal: Money,
    term_months: u32,
) -> LoanSimResult<SimulationResult> {
    if term_months > product.max_term_months {
        return Err(LoanSimError::TermExceedsLimit {
            requested: i64::from(term_months),
            max: product.max_term_months,
        });
    }

    let effective_monthly_rate = effective_monthly_rate(product.annual_rate)?;
    debug!(
        "{}: annual rate {}% -> effective monthly {}%",
        product.name, product.annual_rate, effective_monthly_rate
    );

    let installment = installment_amount(principal, effective_monthly_rate, term_months)?;
    let too_large = || {
        LoanSimError::InvalidPrincipal(format!("principal {principal} is too large to amortize"))
    };
    let total_paid = installment
        .checked_mul(Decimal::from(term_months))
        .ok_or_else(too_large)?;
    let total_interest = total_paid.checked_sub(principal).ok_or_else(too_large)?;
    debug!(
        "{}: installment {} over {} months (total {})",
        product.name, installment, term_months, total_paid
    );

    let schedule = build_schedule(principal, installment, effective_monthly_rate, term_months)?;

    Ok(SimulationResult {
        product: product.clone(),
        annual_rate: product.annual_rate,
        effective_monthly_rate,
        principal,
        installment,
        total_paid,
        total_interest,
        schedule,
    })
}

/// Run a simulation from request-shaped input and wrap it in the standard envelope.
pub fn simulate(input: &SimulationInput) -> LoanSimResult<ComputationOutput<SimulationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let product = input.product.as_ref().ok_or(LoanSimError::ProductRequired)?;

    let requested = match input.term_months {
        Some(t) if t > 0 => t,
        Some(t) => {
            return Err(LoanSimError::InvalidTerm(format!(
                "term must be positive, got {t}"
            )))
        }
        None => return Err(LoanSimError::InvalidTerm("term is required".into())),
    };
    if requested > i64::from(product.max_term_months) {
        return Err(LoanSimError::TermExceedsLimit {
            requested,
            max: product.max_term_months,
        });
    }
    let term_months = u32::try_from(requested)
        .map_err(|_| LoanSimError::InvalidTerm(format!("term {requested} is out of range")))?;

    let principal = input
        .principal
        .ok_or_else(|| LoanSimError::InvalidPrincipal("principal is required".into()))?;

    if product.annual_rate > CATALOGUE_MAX_RATE {
        warnings.push(format!(
            "Annual rate {}% is above the catalogue maximum of {}%",
            product.annual_rate, CATALOGUE_MAX_RATE
        ));
    }

    let result = simulate_loan(product, principal, term_months)?;

    if let Some(paid_off) = result
        .schedule
        .iter()
        .find(|e| e.remaining_balance.is_zero() && e.month < term_months)
    {
        warnings.push(format!(
            "Balance reached zero in month {} of {}; later installments overpay",
            paid_off.month, term_months
        ));
    }
    if let Some(last) = result.schedule.last() {
        if last.remaining_balance > DRIFT_TOLERANCE {
            warn!(
                "{}: residual balance {} after {} months",
                product.name, last.remaining_balance, term_months
            );
            warnings.push(format!(
                "Final remaining balance of {} reflects per-month rounding drift",
                last.remaining_balance
            ));
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Fixed-installment (Price) amortization",
        &serde_json::json!({
            "product": product.name,
            "annual_rate": product.annual_rate.to_string(),
            "principal": principal.to_string(),
            "term_months": term_months,
            "rounding": "half-up to 2 decimals, interest rounded monthly",
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn personal_loan() -> LoanProduct {
        LoanProduct::new("Personal Loan", dec!(12.00), 24)
    }

    #[test]
    fn test_effective_monthly_rate_twelve_percent() {
        // (1.12)^(1/12) - 1 = 0.9489% => 0.95
        let rate = effective_monthly_rate(dec!(12.00)).unwrap();
        assert_eq!(rate, dec!(0.95));
        assert_eq!(rate.scale(), 2);
    }

    #[test]
    fn test_effective_monthly_rate_zero() {
        let rate = effective_monthly_rate(Decimal::ZERO).unwrap();
        assert!(rate.is_zero());
        assert_eq!(rate.to_string(), "0.00");
    }

    #[test]
    fn test_effective_monthly_rate_negative() {
        let err = effective_monthly_rate(dec!(-5.00)).unwrap_err();
        assert!(matches!(err, LoanSimError::InvalidRate(_)));
    }

    #[test]
    fn test_nth_root_matches_power() {
        let root = nth_root(dec!(1.12), 12).unwrap();
        let back = compound(root, 12).unwrap();
        assert!((back - dec!(1.12)).abs() < dec!(0.000000000000000001));
    }

    #[test]
    fn test_installment_zero_rate() {
        // 5000 / 24 = 208.333...
        let pmt = installment_amount(dec!(5000.00), Decimal::ZERO, 24).unwrap();
        assert_eq!(pmt, dec!(208.33));
    }

    #[test]
    fn test_installment_price_method() {
        // 5000 at 0.95% over 12 months
        let pmt = installment_amount(dec!(5000.00), dec!(0.95), 12).unwrap();
        assert_eq!(pmt, dec!(442.84));
        assert_eq!(pmt.scale(), 2);
    }

    #[test]
    fn test_installment_saturates_on_huge_growth() {
        // 1.5^600 exceeds the decimal range; the factor collapses to the rate itself
        let pmt = installment_amount(dec!(1000), dec!(50), 600).unwrap();
        assert_eq!(pmt, dec!(500.00));
    }

    #[test]
    fn test_installment_rejects_bad_input() {
        assert!(matches!(
            installment_amount(Decimal::ZERO, dec!(1.39), 24),
            Err(LoanSimError::InvalidPrincipal(_))
        ));
        assert!(matches!(
            installment_amount(dec!(5000), dec!(-1), 24),
            Err(LoanSimError::InvalidRate(_))
        ));
        assert!(matches!(
            installment_amount(dec!(5000), dec!(1.39), 0),
            Err(LoanSimError::InvalidTerm(_))
        ));
    }

    #[test]
    fn test_schedule_three_months() {
        let schedule = build_schedule(dec!(5000.00), dec!(1698.43), dec!(0.95), 3).unwrap();
        assert_eq!(schedule.len(), 3);

        assert_eq!(schedule[0].month, 1);
        assert_eq!(schedule[0].interest, dec!(47.50));
        assert_eq!(schedule[0].amortization, dec!(1650.93));
        assert_eq!(schedule[0].remaining_balance, dec!(3349.07));

        assert_eq!(schedule[1].interest, dec!(31.82));
        assert_eq!(schedule[2].interest, dec!(15.98));
        assert_eq!(schedule[2].remaining_balance, dec!(0.01));
    }

    #[test]
    fn test_schedule_clamps_overpayment() {
        // 100 at 0% paid 60 per month: month 2 would leave -20
        let schedule = build_schedule(dec!(100), dec!(60), Decimal::ZERO, 2).unwrap();
        assert_eq!(schedule[0].remaining_balance, dec!(40));
        assert_eq!(schedule[1].amortization, dec!(60));
        assert!(schedule[1].remaining_balance.is_zero());
    }

    #[test]
    fn test_term_cap() {
        assert!(installment_amount(dec!(1000), Decimal::ZERO, MAX_TERM_MONTHS).is_ok());
        assert!(matches!(
            installment_amount(dec!(1000), Decimal::ZERO, MAX_TERM_MONTHS + 1),
            Err(LoanSimError::InvalidTerm(_))
        ));
        assert!(matches!(
            build_schedule(dec!(1000), dec!(1), Decimal::ZERO, 4_000_000_000),
            Err(LoanSimError::InvalidTerm(_))
        ));
    }

    #[test]
    fn test_schedule_rejects_non_amortizing_installment() {
        // 10% of 1000 is 100 of interest; 1 per month never pays it down
        for installment in [dec!(1), dec!(0), dec!(-50), dec!(99.99)] {
            assert!(matches!(
                build_schedule(dec!(1000), installment, dec!(10), 3),
                Err(LoanSimError::InvalidInput { ref field, .. }) if field == "installment"
            ));
        }
        // Interest-only installment keeps the balance flat
        let flat = build_schedule(dec!(1000), dec!(100), dec!(10), 2).unwrap();
        assert_eq!(flat[1].remaining_balance, dec!(1000));
    }

    #[test]
    fn test_schedule_huge_principal_is_an_error() {
        let err = build_schedule(dec!(50000000000000000000000000000), dec!(1), dec!(100), 3)
            .unwrap_err();
        assert!(matches!(err, LoanSimError::InvalidInput { .. }));

        // Interest-free amortization of the same balance stays in range
        let schedule =
            build_schedule(dec!(50000000000000000000000000000), dec!(1), Decimal::ZERO, 3).unwrap();
        assert!(schedule[2].remaining_balance < dec!(50000000000000000000000000000));
    }

    #[test]
    fn test_simulate_loan_total_overflow() {
        let product = LoanProduct::new("Jumbo", dec!(12.00), 24);
        let err = simulate_loan(&product, dec!(79000000000000000000000000000), 24).unwrap_err();
        assert!(matches!(err, LoanSimError::InvalidPrincipal(_)));
    }

    #[test]
    fn test_simulate_loan_term_limit() {
        let err = simulate_loan(&personal_loan(), dec!(5000), 25).unwrap_err();
        assert!(matches!(
            err,
            LoanSimError::TermExceedsLimit { requested: 25, max: 24 }
        ));
    }

    #[test]
    fn test_simulate_requires_product() {
        let input = SimulationInput {
            product: None,
            principal: Some(dec!(10000.00)),
            term_months: Some(12),
        };
        assert!(matches!(simulate(&input), Err(LoanSimError::ProductRequired)));
    }

    #[test]
    fn test_simulate_missing_principal_and_term() {
        let mut input = SimulationInput {
            product: Some(personal_loan()),
            principal: None,
            term_months: Some(12),
        };
        assert!(matches!(
            simulate(&input),
            Err(LoanSimError::InvalidPrincipal(_))
        ));

        input.principal = Some(dec!(10000.00));
        input.term_months = Some(-1);
        assert!(matches!(simulate(&input), Err(LoanSimError::InvalidTerm(_))));

        input.term_months = None;
        assert!(matches!(simulate(&input), Err(LoanSimError::InvalidTerm(_))));
    }

    #[test]
    fn test_simulate_reports_rounding_drift() {
        // 5000 over 12 months leaves 0.03 of drift
        let input = SimulationInput {
            product: Some(personal_loan()),
            principal: Some(dec!(5000.00)),
            term_months: Some(12),
        };
        let output = simulate(&input).unwrap();
        assert_eq!(output.result.schedule.last().unwrap().remaining_balance, dec!(0.03));
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("rounding drift"));
    }
}
