use chrono::NaiveDate;
use log::info;

use crate::error::{Error, Result};
use crate::loan::{Loan, NewLoan, Payment};
use crate::store::LoanStore;

/// Volatile store, used for tests and `--in-memory` sessions.
#[derive(Debug)]
pub struct MemoryStore {
    loans: Vec<Loan>,
    payments: Vec<Payment>,
    next_loan_id: i64,
    next_payment_id: i64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            loans: Vec::new(),
            payments: Vec::new(),
            next_loan_id: 1,
            next_payment_id: 1,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoanStore for MemoryStore {
    fn list_loans(&self) -> Result<Vec<Loan>> {
        let mut loans = self.loans.clone();
        loans.sort_by_key(|l| l.start_date);
        Ok(loans)
    }

    fn get_loan(&self, id: i64) -> Result<Loan> {
        self.loans
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(Error::LoanNotFound(id))
    }

    fn create_loan(&mut self, loan: &NewLoan) -> Result<i64> {
        let id = self.next_loan_id;
        let record = loan.clone().into_loan(id)?;
        self.loans.push(record);
        self.next_loan_id += 1;
        info!("created loan {}", id);
        Ok(id)
    }

    fn update_loan(&mut self, id: i64, loan: &NewLoan) -> Result<usize> {
        let record = loan.clone().into_loan(id)?;
        match self.loans.iter_mut().find(|l| l.id == id) {
            Some(existing) => {
                *existing = record;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_loan(&mut self, id: i64) -> Result<()> {
        if !self.loans.iter().any(|l| l.id == id) {
            return Err(Error::LoanNotFound(id));
        }
        // nothing below can fail, so both removals always happen together
        self.payments.retain(|p| p.loan_id != id);
        self.loans.retain(|l| l.id != id);
        info!("deleted loan {} and its payments", id);
        Ok(())
    }

    fn list_payments_for_loan(&self, loan_id: i64) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.payment_date);
        Ok(payments)
    }

    fn get_payment(&self, id: i64) -> Result<Payment> {
        self.payments
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(Error::PaymentNotFound(id))
    }

    fn create_payment(&mut self, loan_id: i64, payment_date: NaiveDate, payment_amount: f64) -> Result<i64> {
        let id = self.next_payment_id;
        self.payments.push(Payment {
            id,
            loan_id,
            payment_date,
            payment_amount,
        });
        self.next_payment_id += 1;
        info!("created payment {} for loan {}", id, loan_id);
        Ok(id)
    }

    fn delete_payment(&mut self, id: i64) -> Result<()> {
        let before = self.payments.len();
        self.payments.retain(|p| p.id != id);
        if self.payments.len() == before {
            return Err(Error::PaymentNotFound(id));
        }
        info!("deleted payment {}", id);
        Ok(())
    }
}
