use chrono::{Datelike, Local, Months, NaiveDate};
use log::{debug, trace, warn};
use std::fmt;

use crate::error::ValidationError;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A household loan as persisted by a [`crate::store::LoanStore`].
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loan {
    pub id: i64,
    pub lender_name: String,
    pub principal: f64,
    pub yearly_rate: f64, // decimal fraction, 0.04 for 4%
    pub start_date: NaiveDate,
    pub currency: String,
    pub description: Option<String>,
}

impl Loan {
    pub fn monthly_rate(&self) -> f64 {
        self.yearly_rate / 12.
    }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loan {}, lender {}, principal {:.2} {}, rate {:.2}%, started {}",
            self.id,
            self.lender_name,
            self.principal,
            self.currency,
            self.yearly_rate * 100.,
            self.start_date
        )
    }
}

/// Fields for creating a loan or fully replacing an existing one.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewLoan {
    pub lender_name: String,
    pub principal: f64,
    pub yearly_rate: f64,
    pub start_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub description: Option<String>,
}

impl NewLoan {
    pub fn new(lender_name: &str, principal: f64, yearly_rate: f64, start_date: NaiveDate) -> Self {
        Self {
            lender_name: lender_name.to_string(),
            principal,
            yearly_rate,
            start_date: Some(start_date),
            currency: None,
            description: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lender_name.trim().is_empty() {
            return Err(ValidationError::MissingField("lender_name"));
        }
        require_positive("principal", self.principal)?;
        require_positive("yearly_rate", self.yearly_rate)?;
        if self.start_date.is_none() {
            return Err(ValidationError::MissingField("start_date"));
        }
        Ok(())
    }

    /// Currency code to persist; blank or missing codes fall back to USD.
    pub fn currency(&self) -> String {
        match self.currency.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_uppercase(),
            _ => DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Builds the stored record. Only meaningful after [`NewLoan::validate`] succeeded.
    pub fn into_loan(self, id: i64) -> Result<Loan, ValidationError> {
        let start_date = self
            .start_date
            .ok_or(ValidationError::MissingField("start_date"))?;
        let currency = self.currency();
        Ok(Loan {
            id,
            lender_name: self.lender_name,
            principal: self.principal,
            yearly_rate: self.yearly_rate,
            start_date,
            currency,
            description: self.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Payment {
    pub id: i64,
    pub loan_id: i64,
    pub payment_date: NaiveDate,
    pub payment_amount: f64,
}

impl fmt::Display for Payment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "payment {}, loan {}, date {}, amount {:.2}",
            self.id, self.loan_id, self.payment_date, self.payment_amount
        )
    }
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewPayment {
    pub loan_id: i64,
    pub payment_date: Option<NaiveDate>,
    pub payment_amount: f64,
}

impl NewPayment {
    pub fn new(loan_id: i64, payment_date: NaiveDate, payment_amount: f64) -> Self {
        Self {
            loan_id,
            payment_date: Some(payment_date),
            payment_amount,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive("payment_amount", self.payment_amount)?;
        if self.payment_date.is_none() {
            return Err(ValidationError::MissingField("payment_date"));
        }
        Ok(())
    }
}

/// One closed calendar month of a loan's life.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleEntry {
    pub month_number: u32,
    pub period_date: NaiveDate, // last calendar day of the month
    pub opening_balance: f64,
    pub monthly_interest: f64,
    pub debt: f64,
    pub monthly_payments: f64,
    pub closing_balance: f64,
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "month {}, period {}, opening ${:.2}, interest ${:.2}, debt ${:.2}, payments ${:.2}, closing ${:.2}",
            self.month_number,
            self.period_date,
            self.opening_balance,
            self.monthly_interest,
            self.debt,
            self.monthly_payments,
            self.closing_balance
        )
    }
}

/// Rebuilds the month by month balance history of `loan`.
///
/// Covers every calendar month from the start month up to, but not including,
/// the month containing `today`. Payments are bucketed by calendar month
/// regardless of day. Interest is flat monthly compounding on the opening
/// balance and the closing balance is never clamped, so overpayment shows up
/// as a negative balance.
///
/// A loan whose principal or rate is not a positive number yields an empty
/// schedule instead of an error.
pub fn compute_schedule(loan: &Loan, payments: &[Payment], today: NaiveDate) -> Vec<ScheduleEntry> {
    let mut schedule: Vec<ScheduleEntry> = Vec::new();

    if !is_positive(loan.principal) || !is_positive(loan.yearly_rate) {
        warn!(
            "loan {} has principal {} and rate {}, skipping schedule",
            loan.id, loan.principal, loan.yearly_rate
        );
        return schedule;
    }

    let monthly_rate = loan.monthly_rate();
    let end_of_loop = first_of_month(today); // the current month is still open
    let mut cursor = first_of_month(loan.start_date);
    let mut opening_balance = loan.principal;
    let mut month_number = 1;

    while cursor < end_of_loop {
        let Some(next_month) = cursor.checked_add_months(Months::new(1)) else {
            break;
        };
        let Some(period_date) = next_month.pred_opt() else {
            break;
        };

        let monthly_payments: f64 = payments
            .iter()
            .filter(|p| same_month(p.payment_date, cursor))
            .fold(0., |acc, p| acc + p.payment_amount);

        let monthly_interest = opening_balance * monthly_rate;
        let debt = opening_balance + monthly_interest;
        let closing_balance = debt - monthly_payments;
        trace!(
            "loan {}, month {}, opening {}, interest {}, payments {}, closing {}",
            loan.id,
            month_number,
            opening_balance,
            monthly_interest,
            monthly_payments,
            closing_balance
        );

        schedule.push(ScheduleEntry {
            month_number,
            period_date,
            opening_balance,
            monthly_interest,
            debt,
            monthly_payments,
            closing_balance,
        });

        opening_balance = closing_balance;
        cursor = next_month;
        month_number += 1;
    }

    debug!(
        "loan {}: {} closed months as of {}",
        loan.id,
        schedule.len(),
        today
    );
    schedule
}

/// Today's date on the local calendar, the default clock for schedules.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses a `YYYY-MM-DD` string as a plain calendar date, no time zone involved.
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if is_positive(value) {
        Ok(())
    } else {
        Err(ValidationError::NotPositive { field, value })
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}
