use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashMap;

use crate::error::{Error, Result, ValidationError};
use crate::loan::{compute_schedule, local_today, Loan, NewLoan, NewPayment, Payment, ScheduleEntry};
use crate::portfolio::{Portfolio, PortfolioEntry};
use crate::report::{filter_and_summarize, render_detailed, FilteredReport, ReportCriteria, ReportKind, SummaryReport};
use crate::store::LoanStore;

/// Everything the loan detail view shows.
#[derive(Clone, PartialEq, Debug)]
pub struct LoanDetails {
    pub loan: Loan,
    pub payments: Vec<Payment>,
    pub schedule: Vec<ScheduleEntry>,
}

impl LoanDetails {
    pub fn current_balance(&self) -> f64 {
        self.schedule
            .last()
            .map_or(self.loan.principal, |entry| entry.closing_balance)
    }
}

/// Owns a store and the last computed portfolio. Mutations only mark the
/// portfolio stale; call [`LoanBook::recompute`] to refresh it.
pub struct LoanBook<S: LoanStore> {
    store: S,
    today: Option<NaiveDate>,
    portfolio: Portfolio,
    generation: u64,
    computed_generation: u64,
}

impl<S: LoanStore> LoanBook<S> {
    /// Takes ownership of `store` and computes the initial portfolio.
    pub fn open(store: S) -> Result<Self> {
        Self::open_at(store, None)
    }

    /// Like [`LoanBook::open`] but with "today" pinned instead of read from
    /// the local clock.
    pub fn with_today(store: S, today: NaiveDate) -> Result<Self> {
        Self::open_at(store, Some(today))
    }

    fn open_at(store: S, today: Option<NaiveDate>) -> Result<Self> {
        let mut book = Self {
            store,
            today,
            portfolio: Portfolio::default(),
            generation: 0,
            computed_generation: 0,
        };
        book.recompute()?;
        Ok(book)
    }

    /// Hands the store back, ending the book's lifetime.
    pub fn close(self) -> S {
        info!("closing loan book");
        self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(local_today)
    }

    pub fn set_today(&mut self, today: Option<NaiveDate>) {
        self.today = today;
        self.generation += 1;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn is_stale(&self) -> bool {
        self.computed_generation != self.generation
    }

    /// Re-reads every loan and payment and rebuilds the portfolio. A failed
    /// payment fetch fails the whole pass and keeps the previous snapshot.
    pub fn recompute(&mut self) -> Result<&Portfolio> {
        let today = self.today();
        let loans = self.store.list_loans()?;
        let mut payments_by_loan = HashMap::with_capacity(loans.len());
        for loan in &loans {
            payments_by_loan.insert(loan.id, self.store.list_payments_for_loan(loan.id)?);
        }

        self.portfolio = Portfolio::build(&loans, &payments_by_loan, today);
        self.computed_generation = self.generation;
        info!(
            "recomputed {} loans as of {}, total balance {:.2}",
            self.portfolio.entries.len(),
            today,
            self.portfolio.totals.total_current_balance
        );
        Ok(&self.portfolio)
    }

    pub fn add_loan(&mut self, loan: &NewLoan) -> Result<i64> {
        loan.validate().inspect_err(|e| warn!("rejected loan: {}", e))?;
        let id = self.store.create_loan(loan)?;
        self.generation += 1;
        Ok(id)
    }

    /// Fully replaces the loan's fields.
    pub fn edit_loan(&mut self, id: i64, loan: &NewLoan) -> Result<()> {
        loan.validate().inspect_err(|e| warn!("rejected edit of loan {}: {}", id, e))?;
        if self.store.update_loan(id, loan)? == 0 {
            return Err(Error::LoanNotFound(id));
        }
        self.generation += 1;
        Ok(())
    }

    pub fn delete_loan(&mut self, id: i64) -> Result<()> {
        self.store.delete_loan(id)?;
        self.generation += 1;
        Ok(())
    }

    pub fn add_payment(&mut self, payment: &NewPayment) -> Result<i64> {
        payment
            .validate()
            .inspect_err(|e| warn!("rejected payment for loan {}: {}", payment.loan_id, e))?;
        let payment_date = payment
            .payment_date
            .ok_or(ValidationError::MissingField("payment_date"))?;
        self.store.get_loan(payment.loan_id)?;
        let id = self
            .store
            .create_payment(payment.loan_id, payment_date, payment.payment_amount)?;
        self.generation += 1;
        Ok(id)
    }

    pub fn delete_payment(&mut self, id: i64) -> Result<()> {
        self.store.delete_payment(id)?;
        self.generation += 1;
        Ok(())
    }

    /// Loan, its payments and its schedule, read fresh from the store.
    pub fn loan_details(&self, id: i64) -> Result<LoanDetails> {
        let loan = self.store.get_loan(id)?;
        let payments = self.store.list_payments_for_loan(id)?;
        let schedule = compute_schedule(&loan, &payments, self.today());
        Ok(LoanDetails {
            loan,
            payments,
            schedule,
        })
    }

    /// Filters the current snapshot. Run [`LoanBook::recompute`] first if the
    /// book is stale.
    pub fn filter(&self, criteria: &ReportCriteria) -> FilteredReport {
        filter_and_summarize(&self.portfolio.entries, criteria)
    }

    /// Renders the report document for the loans matching `criteria`. The
    /// detailed kind fetches each loan's payments in order and rebuilds its
    /// schedule.
    pub fn report(&self, criteria: &ReportCriteria, kind: ReportKind) -> Result<String> {
        let today = self.today();
        let report = self.filter(criteria);
        let summary = SummaryReport {
            entries: &report.filtered,
            totals: &report.totals,
            generated_on: today,
        };

        match kind {
            ReportKind::Summary => Ok(summary.to_string()),
            ReportKind::Detailed => {
                let details = report
                    .filtered
                    .iter()
                    .map(|entry| {
                        let payments = self.store.list_payments_for_loan(entry.loan.id)?;
                        Ok((entry, compute_schedule(&entry.loan, &payments, today)))
                    })
                    .collect::<Result<Vec<(&PortfolioEntry, Vec<ScheduleEntry>)>>>()?;
                Ok(render_detailed(&summary, &details))
            }
        }
    }
}
