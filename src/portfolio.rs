use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;

use crate::loan::{compute_schedule, Loan, Payment};

/// A loan enriched with the metrics derived from its schedule.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortfolioEntry {
    pub loan: Loan,
    pub current_balance: f64,
    pub months_elapsed: usize,
    pub total_payments: f64, // every recorded payment, including the open month
    pub next_month_interest: f64,
    pub is_highest_interest: bool,
}

impl PortfolioEntry {
    pub fn new(loan: Loan, payments: &[Payment], today: NaiveDate) -> Self {
        let schedule = compute_schedule(&loan, payments, today);
        let current_balance = schedule
            .last()
            .map_or(loan.principal, |entry| entry.closing_balance);
        let total_payments = payments.iter().fold(0., |acc, p| acc + p.payment_amount);
        let next_month_interest = current_balance * loan.monthly_rate();

        Self {
            months_elapsed: schedule.len(),
            current_balance,
            total_payments,
            next_month_interest,
            is_highest_interest: false,
            loan,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortfolioTotals {
    pub total_principal: f64,
    pub total_current_balance: f64,
    pub total_payments: f64,
    pub total_next_month_interest: f64,
    pub total_interest_paid: f64,
}

impl PortfolioTotals {
    /// Sums the entries. Interest paid is derived as payments that did not
    /// reduce principal and may be negative for a net overpaid set.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a PortfolioEntry>,
    {
        let mut totals = entries
            .into_iter()
            .fold(PortfolioTotals::default(), |mut acc, entry| {
                acc.total_principal += entry.loan.principal;
                acc.total_current_balance += entry.current_balance;
                acc.total_payments += entry.total_payments;
                acc.total_next_month_interest += entry.next_month_interest;
                acc
            });
        totals.total_interest_paid =
            totals.total_payments - (totals.total_principal - totals.total_current_balance);
        totals
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Portfolio {
    pub entries: Vec<PortfolioEntry>,
    pub totals: PortfolioTotals,
}

impl Portfolio {
    /// Aggregates `loans` in the order given. Loans missing from
    /// `payments_by_loan` are treated as having no payments.
    pub fn build(
        loans: &[Loan],
        payments_by_loan: &HashMap<i64, Vec<Payment>>,
        today: NaiveDate,
    ) -> Self {
        let mut entries: Vec<PortfolioEntry> = loans
            .iter()
            .map(|loan| {
                let payments = payments_by_loan
                    .get(&loan.id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                PortfolioEntry::new(loan.clone(), payments, today)
            })
            .collect();

        mark_highest_interest(&mut entries);
        let totals = PortfolioTotals::from_entries(&entries);
        debug!(
            "portfolio of {} loans as of {}, balance {:.2}",
            entries.len(),
            today,
            totals.total_current_balance
        );

        Self { entries, totals }
    }

    pub fn highest_interest(&self) -> impl Iterator<Item = &PortfolioEntry> {
        self.entries.iter().filter(|e| e.is_highest_interest)
    }
}

/// Flags every entry accruing the portfolio's largest positive next month
/// interest. Ties are all flagged, zero or negative interest never is.
pub fn mark_highest_interest(entries: &mut [PortfolioEntry]) {
    let max = entries
        .iter()
        .map(|e| e.next_month_interest)
        .fold(None, |max: Option<f64>, value| match max {
            Some(m) if m >= value => Some(m),
            _ => Some(value),
        });

    for entry in entries.iter_mut() {
        entry.is_highest_interest = match max {
            Some(max) => entry.next_month_interest > 0. && entry.next_month_interest == max,
            None => false,
        };
    }
}
