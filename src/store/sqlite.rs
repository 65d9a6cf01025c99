use chrono::NaiveDate;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::error::{Error, Result};
use crate::loan::{Loan, NewLoan, Payment};
use crate::store::LoanStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS loans (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        lender_name    TEXT NOT NULL,
        principal      REAL NOT NULL,
        yearly_rate    REAL NOT NULL,
        start_date     TEXT NOT NULL,
        currency       TEXT NOT NULL DEFAULT 'USD',
        description    TEXT
    );
    CREATE INDEX IF NOT EXISTS loans_start_date ON loans (start_date);
    CREATE TABLE IF NOT EXISTS payments (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        loan_id        INTEGER NOT NULL,
        payment_date   TEXT NOT NULL,
        payment_amount REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS payments_loan_id ON payments (loan_id);
";

/// SQLite backed store. Dates are kept as `YYYY-MM-DD` text.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!("opened loan database {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

impl LoanStore for SqliteStore {
    fn list_loans(&self) -> Result<Vec<Loan>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lender_name, principal, yearly_rate, start_date, currency, description
             FROM loans ORDER BY start_date, id",
        )?;
        let loans = stmt
            .query_map([], loan_from_row)?
            .collect::<rusqlite::Result<Vec<Loan>>>()?;
        Ok(loans)
    }

    fn get_loan(&self, id: i64) -> Result<Loan> {
        self.conn
            .query_row(
                "SELECT id, lender_name, principal, yearly_rate, start_date, currency, description
                 FROM loans WHERE id = ?1",
                params![id],
                loan_from_row,
            )
            .optional()?
            .ok_or(Error::LoanNotFound(id))
    }

    fn create_loan(&mut self, loan: &NewLoan) -> Result<i64> {
        let record = loan.clone().into_loan(0)?;
        self.conn.execute(
            "INSERT INTO loans (lender_name, principal, yearly_rate, start_date, currency, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.lender_name,
                record.principal,
                record.yearly_rate,
                record.start_date,
                record.currency,
                record.description
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("created loan {}", id);
        Ok(id)
    }

    fn update_loan(&mut self, id: i64, loan: &NewLoan) -> Result<usize> {
        let record = loan.clone().into_loan(id)?;
        let updated = self.conn.execute(
            "UPDATE loans
             SET lender_name = ?1, principal = ?2, yearly_rate = ?3, start_date = ?4,
                 currency = ?5, description = ?6
             WHERE id = ?7",
            params![
                record.lender_name,
                record.principal,
                record.yearly_rate,
                record.start_date,
                record.currency,
                record.description,
                id
            ],
        )?;
        debug!("update of loan {} touched {} rows", id, updated);
        Ok(updated)
    }

    fn delete_loan(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;
        let payments = tx.execute("DELETE FROM payments WHERE loan_id = ?1", params![id])?;
        let loans = tx.execute("DELETE FROM loans WHERE id = ?1", params![id])?;
        if loans == 0 {
            // dropping the transaction rolls the payment delete back
            return Err(Error::LoanNotFound(id));
        }
        tx.commit()?;
        info!("deleted loan {} and {} payments", id, payments);
        Ok(())
    }

    fn list_payments_for_loan(&self, loan_id: i64) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, loan_id, payment_date, payment_amount
             FROM payments WHERE loan_id = ?1 ORDER BY payment_date, id",
        )?;
        let payments = stmt
            .query_map(params![loan_id], payment_from_row)?
            .collect::<rusqlite::Result<Vec<Payment>>>()?;
        Ok(payments)
    }

    fn get_payment(&self, id: i64) -> Result<Payment> {
        self.conn
            .query_row(
                "SELECT id, loan_id, payment_date, payment_amount FROM payments WHERE id = ?1",
                params![id],
                payment_from_row,
            )
            .optional()?
            .ok_or(Error::PaymentNotFound(id))
    }

    fn create_payment(&mut self, loan_id: i64, payment_date: NaiveDate, payment_amount: f64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO payments (loan_id, payment_date, payment_amount) VALUES (?1, ?2, ?3)",
            params![loan_id, payment_date, payment_amount],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("created payment {} for loan {}", id, loan_id);
        Ok(id)
    }

    fn delete_payment(&mut self, id: i64) -> Result<()> {
        if self.conn.execute("DELETE FROM payments WHERE id = ?1", params![id])? == 0 {
            return Err(Error::PaymentNotFound(id));
        }
        info!("deleted payment {}", id);
        Ok(())
    }
}

fn loan_from_row(row: &Row<'_>) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id: row.get("id")?,
        lender_name: row.get("lender_name")?,
        principal: row.get("principal")?,
        yearly_rate: row.get("yearly_rate")?,
        start_date: row.get("start_date")?,
        currency: row.get("currency")?,
        description: row.get("description")?,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get("id")?,
        loan_id: row.get("loan_id")?,
        payment_date: row.get("payment_date")?,
        payment_amount: row.get("payment_amount")?,
    })
}
