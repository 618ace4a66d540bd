use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
  pub id: i32,
  pub name: String,
  pub email: String,
  pub department_id: Option<i32>,
  /// Fixed-point, two fraction digits
  pub salary: BigDecimal,
  pub hire_date: NaiveDate,
  pub phone: Option<String>,
  pub address: Option<String>,
}

/// Insert payload for an employee; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmployee {
  pub name: String,
  pub email: String,
  pub department_id: Option<i32>,
  pub salary: BigDecimal,
  pub hire_date: NaiveDate,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
}

impl NewEmployee {
  pub fn into_employee(self, id: i32) -> Employee {
    Employee {
      id,
      name: self.name,
      email: self.email,
      department_id: self.department_id,
      salary: self.salary.with_scale_round(2, RoundingMode::HalfUp),
      hire_date: self.hire_date,
      phone: self.phone,
      address: self.address,
    }
  }
}
