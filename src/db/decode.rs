//! Column decoding shared by the backends. Money travels as text so both
//! drivers hand back the exact fixed-point value.

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use std::str::FromStr;

use super::backend::{StorageError, StorageResult};

pub const MONEY_SCALE: i64 = 2;

pub fn parse_money(column: &'static str, raw: &str) -> StorageResult<BigDecimal> {
  BigDecimal::from_str(raw.trim())
    .map(round_money)
    .map_err(|e| StorageError::decode(column, e))
}

pub fn parse_optional_money(
  column: &'static str,
  raw: Option<String>,
) -> StorageResult<Option<BigDecimal>> {
  raw.as_deref().map(|s| parse_money(column, s)).transpose()
}

/// Round half-up to two fraction digits
pub fn round_money(value: BigDecimal) -> BigDecimal {
  value.with_scale_round(MONEY_SCALE, RoundingMode::HalfUp)
}

pub fn zero_money() -> BigDecimal {
  round_money(BigDecimal::from(0))
}

pub fn parse_date(column: &'static str, raw: &str) -> StorageResult<NaiveDate> {
  NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| StorageError::decode(column, e))
}
