mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::NaiveDate;

use crate::error::Result;
use crate::loan::{Loan, NewLoan, Payment};

pub trait LoanStore {
    /// All loans, sorted by start date ascending.
    fn list_loans(&self) -> Result<Vec<Loan>>;

    /// Fails with [`crate::error::Error::LoanNotFound`] for an unknown id.
    fn get_loan(&self, id: i64) -> Result<Loan>;

    fn create_loan(&mut self, loan: &NewLoan) -> Result<i64>;

    /// Replaces every field of the loan, returning the number of loans updated.
    fn update_loan(&mut self, id: i64, loan: &NewLoan) -> Result<usize>;

    /// Removes the loan and every payment referencing it. Either both go or
    /// neither does.
    fn delete_loan(&mut self, id: i64) -> Result<()>;

    /// Payments of one loan, sorted by payment date ascending.
    fn list_payments_for_loan(&self, loan_id: i64) -> Result<Vec<Payment>>;

    fn get_payment(&self, id: i64) -> Result<Payment>;

    fn create_payment(&mut self, loan_id: i64, payment_date: NaiveDate, payment_amount: f64) -> Result<i64>;

    fn delete_payment(&mut self, id: i64) -> Result<()>;
}
