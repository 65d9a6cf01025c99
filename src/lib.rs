//! Household loan tracking: month by month amortization of informal loans,
//! portfolio totals across loans and filtered reports.

pub mod book;
pub mod error;
pub mod loan;
pub mod portfolio;
pub mod report;
pub mod store;

pub use book::{LoanBook, LoanDetails};
pub use error::{Error, Result, ValidationError};
pub use loan::{compute_schedule, Loan, NewLoan, NewPayment, Payment, ScheduleEntry};
pub use portfolio::{Portfolio, PortfolioEntry, PortfolioTotals};
pub use report::{filter_and_summarize, FilteredReport, NumericRange, ReportCriteria, ReportKind};
