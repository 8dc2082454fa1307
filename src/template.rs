//! Templates de strings vindas da configuração
//!
//! SQL, caminhos de staging e opções de backend podem conter marcadores
//! `{nome}` ou `{nome:formato}`. Os valores vêm de um [`TemplateContext`]
//! explícito; nada é avaliado como código. `{{` e `}}` produzem chaves literais.
//!
//! Datas relativas (`today-7d`, `month_start`, `2024-01-31+1m`) são avaliadas
//! por [`DateExpr`] contra a data de referência do contexto.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};

use chrono::{Datelike, Days, Local, Months, NaiveDate, NaiveDateTime};

use crate::error::TemplateError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Valor disponível para substituição
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl TemplateValue {
    fn render(&self, name: &str, format: Option<&str>) -> Result<String, TemplateError> {
        let invalid = || TemplateError::InvalidFormat {
            name: name.to_string(),
            format: format.unwrap_or_default().to_string(),
        };

        let mut out = String::new();
        match (self, format) {
            (TemplateValue::Text(text), None) => out.push_str(text),
            (TemplateValue::Text(_), Some(_)) => return Err(invalid()),
            (TemplateValue::Date(date), fmt) => {
                write!(out, "{}", date.format(fmt.unwrap_or(DATE_FORMAT))).map_err(|_| invalid())?
            }
            (TemplateValue::DateTime(dt), fmt) => {
                write!(out, "{}", dt.format(fmt.unwrap_or(DATETIME_FORMAT))).map_err(|_| invalid())?
            }
        }
        Ok(out)
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::Text(text) => f.write_str(text),
            TemplateValue::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            TemplateValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        TemplateValue::Text(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        TemplateValue::Text(value)
    }
}

impl From<NaiveDate> for TemplateValue {
    fn from(value: NaiveDate) -> Self {
        TemplateValue::Date(value)
    }
}

impl From<NaiveDateTime> for TemplateValue {
    fn from(value: NaiveDateTime) -> Self {
        TemplateValue::DateTime(value)
    }
}

/// Variáveis nomeadas + data de referência
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    values: BTreeMap<String, TemplateValue>,
    today: NaiveDate,
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

impl TemplateContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            values: BTreeMap::new(),
            today,
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TemplateValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Adiciona variáveis textuais do chamador
    pub fn extend_text(&mut self, vars: &HashMap<String, String>) {
        for (name, value) in vars {
            self.insert(name.clone(), value.clone());
        }
    }

    /// Avalia uma expressão de data e guarda o resultado em `name`
    pub fn insert_date_expr(&mut self, name: &str, expr: &str) -> Result<(), TemplateError> {
        let value = DateExpr::parse(expr)?.evaluate(self.today)?;
        self.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.values.get(name)
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn render(&self, template: &str) -> Result<String, TemplateError> {
        render(template, self)
    }
}

/// Substitui os marcadores de `template` usando `ctx`
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
    if !template.contains(['{', '}']) {
        return Ok(template.to_string());
    }

    let malformed = || TemplateError::Malformed(template.to_string());
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(malformed()),
                        _ => inner.push(c),
                    }
                }
                if !closed {
                    return Err(malformed());
                }

                let (name, format) = match inner.split_once(':') {
                    Some((name, format)) => (name.trim(), Some(format)),
                    None => (inner.trim(), None),
                };
                if name.is_empty() {
                    return Err(malformed());
                }

                let value = ctx
                    .get(name)
                    .ok_or_else(|| TemplateError::MissingVariable(name.to_string()))?;
                out.push_str(&value.render(name, format)?);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(malformed()),
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Âncora de uma expressão de data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DateAnchor {
    Today,
    Yesterday,
    MonthStart,
    YearStart,
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetUnit {
    Days,
    Weeks,
    Months,
    Years,
}

/// Deslocamento `±N{d,w,m,y}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOffset {
    pub amount: i64,
    pub unit: OffsetUnit,
}

impl DateOffset {
    fn parse(text: &str) -> Option<Self> {
        let (sign, rest) = match text.chars().next()? {
            '+' => (1, &text[1..]),
            '-' => (-1, &text[1..]),
            _ => return None,
        };

        let unit = match rest.chars().last()? {
            'd' => OffsetUnit::Days,
            'w' => OffsetUnit::Weeks,
            'm' => OffsetUnit::Months,
            'y' => OffsetUnit::Years,
            _ => return None,
        };

        let digits = &rest[..rest.len() - 1];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            amount: sign * digits.parse::<i64>().ok()?,
            unit,
        })
    }
}

/// Expressão de data relativa ou absoluta
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateExpr {
    pub anchor: DateAnchor,
    pub offset: Option<DateOffset>,
}

impl DateExpr {
    pub fn parse(expr: &str) -> Result<Self, TemplateError> {
        let expr = expr.trim();
        let invalid = || TemplateError::InvalidDateExpr(expr.to_string());

        if let Some(anchor) = parse_anchor(expr) {
            return Ok(Self { anchor, offset: None });
        }

        let split = expr.rfind(['+', '-']).ok_or_else(invalid)?;
        let (anchor, offset) = expr.split_at(split);
        let anchor = parse_anchor(anchor.trim()).ok_or_else(invalid)?;
        let offset = DateOffset::parse(offset).ok_or_else(invalid)?;

        Ok(Self {
            anchor,
            offset: Some(offset),
        })
    }

    pub fn evaluate(&self, today: NaiveDate) -> Result<TemplateValue, TemplateError> {
        let overflow = || TemplateError::InvalidDateExpr(format!("{:?}", self));

        let base = match self.anchor {
            DateAnchor::Today => TemplateValue::Date(today),
            DateAnchor::Yesterday => {
                TemplateValue::Date(today.checked_sub_days(Days::new(1)).ok_or_else(overflow)?)
            }
            DateAnchor::MonthStart => TemplateValue::Date(today.with_day(1).ok_or_else(overflow)?),
            DateAnchor::YearStart => TemplateValue::Date(
                NaiveDate::from_ymd_opt(today.year(), 1, 1).ok_or_else(overflow)?,
            ),
            DateAnchor::Date(date) => TemplateValue::Date(date),
            DateAnchor::DateTime(dt) => TemplateValue::DateTime(dt),
        };

        match self.offset {
            None => Ok(base),
            Some(offset) => shift(base, offset).ok_or_else(overflow),
        }
    }
}

fn parse_anchor(text: &str) -> Option<DateAnchor> {
    match text {
        "today" => return Some(DateAnchor::Today),
        "yesterday" => return Some(DateAnchor::Yesterday),
        "month_start" => return Some(DateAnchor::MonthStart),
        "year_start" => return Some(DateAnchor::YearStart),
        _ => {}
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT) {
        return Some(DateAnchor::DateTime(dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(DateAnchor::DateTime(dt));
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .map(DateAnchor::Date)
}

fn shift(value: TemplateValue, offset: DateOffset) -> Option<TemplateValue> {
    let magnitude = offset.amount.unsigned_abs();
    let forward = offset.amount >= 0;

    match value {
        TemplateValue::Date(date) => {
            let shifted = match offset.unit {
                OffsetUnit::Days => shift_days(date, magnitude, forward),
                OffsetUnit::Weeks => shift_days(date, magnitude.checked_mul(7)?, forward),
                OffsetUnit::Months => shift_months(date, magnitude, forward),
                OffsetUnit::Years => shift_months(date, magnitude.checked_mul(12)?, forward),
            }?;
            Some(TemplateValue::Date(shifted))
        }
        TemplateValue::DateTime(dt) => {
            let date = match offset.unit {
                OffsetUnit::Days => shift_days(dt.date(), magnitude, forward),
                OffsetUnit::Weeks => shift_days(dt.date(), magnitude.checked_mul(7)?, forward),
                OffsetUnit::Months => shift_months(dt.date(), magnitude, forward),
                OffsetUnit::Years => shift_months(dt.date(), magnitude.checked_mul(12)?, forward),
            }?;
            Some(TemplateValue::DateTime(date.and_time(dt.time())))
        }
        TemplateValue::Text(_) => None,
    }
}

fn shift_days(date: NaiveDate, days: u64, forward: bool) -> Option<NaiveDate> {
    if forward {
        date.checked_add_days(Days::new(days))
    } else {
        date.checked_sub_days(Days::new(days))
    }
}

fn shift_months(date: NaiveDate, months: u64, forward: bool) -> Option<NaiveDate> {
    let months = Months::new(u32::try_from(months).ok()?);
    if forward {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx() -> TemplateContext {
        TemplateContext::new(date(2024, 3, 15))
            .with("start_date", date(2024, 3, 8))
            .with("schema", "public")
    }

    #[test]
    fn test_plain_string_unchanged() {
        assert_eq!(render("SELECT 1", &ctx()).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_render_variables() {
        let sql = "DELETE FROM {schema}.vendas WHERE dia >= '{start_date}'";
        assert_eq!(
            render(sql, &ctx()).unwrap(),
            "DELETE FROM public.vendas WHERE dia >= '2024-03-08'"
        );
    }

    #[test]
    fn test_render_with_format_and_escapes() {
        let path = "s3://bucket/{start_date:%Y/%m/%d}/{{raw}}.csv";
        assert_eq!(render(path, &ctx()).unwrap(), "s3://bucket/2024/03/08/{raw}.csv");
    }

    #[test]
    fn test_render_errors() {
        assert_eq!(
            render("{missing}", &ctx()),
            Err(TemplateError::MissingVariable("missing".into()))
        );
        assert!(matches!(render("{schema", &ctx()), Err(TemplateError::Malformed(_))));
        assert!(matches!(render("a}b", &ctx()), Err(TemplateError::Malformed(_))));
        assert!(matches!(
            render("{schema:%Y}", &ctx()),
            Err(TemplateError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_date_expressions() {
        let today = date(2024, 3, 15);
        let cases = [
            ("today", date(2024, 3, 15)),
            ("yesterday", date(2024, 3, 14)),
            ("today-7d", date(2024, 3, 8)),
            ("today+2w", date(2024, 3, 29)),
            ("month_start", date(2024, 3, 1)),
            ("month_start-1m", date(2024, 2, 1)),
            ("year_start", date(2024, 1, 1)),
            ("2024-01-31+1m", date(2024, 2, 29)),
            ("2024-01-31-1y", date(2023, 1, 31)),
        ];

        for (expr, expected) in cases {
            let value = DateExpr::parse(expr).unwrap().evaluate(today).unwrap();
            assert_eq!(value, TemplateValue::Date(expected), "{}", expr);
        }
    }

    #[test]
    fn test_datetime_expression() {
        let value = DateExpr::parse("2024-03-01 10:30:00-1d")
            .unwrap()
            .evaluate(date(2024, 3, 15))
            .unwrap();
        let expected = date(2024, 2, 29).and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(value, TemplateValue::DateTime(expected));
    }

    #[test]
    fn test_invalid_date_expressions() {
        for expr in ["tomorrow", "today-7", "today*2d", "2024-13-01", ""] {
            assert!(DateExpr::parse(expr).is_err(), "{}", expr);
        }
    }

    #[test]
    fn test_insert_date_expr() {
        let mut ctx = TemplateContext::new(date(2024, 3, 15));
        ctx.insert_date_expr("end_date", "today-1d").unwrap();
        assert_eq!(ctx.render("{end_date:%d/%m/%Y}").unwrap(), "14/03/2024");
    }
}
