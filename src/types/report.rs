use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Salary aggregates over one department. Min/max are `None` for an empty
/// department; the average is then zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryStats {
  pub min_salary: Option<BigDecimal>,
  pub max_salary: Option<BigDecimal>,
  pub average_salary: BigDecimal,
  pub employee_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HireYearCount {
  pub year: i32,
  pub count: i64,
}
