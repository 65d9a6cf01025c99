use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeSet;
use std::fmt;

use crate::loan::{ScheduleEntry, DEFAULT_CURRENCY};
use crate::portfolio::{PortfolioEntry, PortfolioTotals};

/// Lender value matching every lender.
pub const ALL_LENDERS: &str = "ALL";
pub const PAGE_BREAK: &str = "\x0c";

/// Inclusive numeric bounds. A missing min means 0 and a missing max means
/// no upper bound; a range with neither bound does not constrain at all.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        if self.min.is_none() && self.max.is_none() {
            return true;
        }
        value >= self.min.unwrap_or(0.) && value <= self.max.unwrap_or(f64::INFINITY)
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportCriteria {
    pub lender: Option<String>, // exact name, or ALL_LENDERS
    pub current_balance: NumericRange,
    pub total_payments: NumericRange,
    pub months_elapsed: NumericRange,
    pub start_from: Option<NaiveDate>,
    pub start_to: Option<NaiveDate>,
}

impl ReportCriteria {
    pub fn matches(&self, entry: &PortfolioEntry) -> bool {
        let lender_match = match self.lender.as_deref() {
            None | Some(ALL_LENDERS) => true,
            Some(name) => entry.loan.lender_name == name,
        };
        let start = entry.loan.start_date;

        lender_match
            && self.current_balance.contains(entry.current_balance)
            && self.total_payments.contains(entry.total_payments)
            && self.months_elapsed.contains(entry.months_elapsed as f64)
            && self.start_from.map_or(true, |from| start >= from)
            && self.start_to.map_or(true, |to| start <= to)
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilteredReport {
    pub filtered: Vec<PortfolioEntry>,
    pub totals: PortfolioTotals,
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub enum ReportKind {
    #[default]
    Summary,
    Detailed,
}

/// Keeps the entries matching every criterion, in their original order,
/// and sums them from scratch. An empty result is valid and has zero totals.
pub fn filter_and_summarize(entries: &[PortfolioEntry], criteria: &ReportCriteria) -> FilteredReport {
    let filtered: Vec<PortfolioEntry> = entries
        .iter()
        .filter(|entry| criteria.matches(entry))
        .cloned()
        .collect();
    let totals = PortfolioTotals::from_entries(&filtered);
    debug!("report filter kept {} of {} loans", filtered.len(), entries.len());

    FilteredReport { filtered, totals }
}

/// Sorted, de-duplicated lender names for the lender selector.
pub fn lenders(entries: &[PortfolioEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.loan.lender_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Portfolio summary document: totals followed by one row per loan.
pub struct SummaryReport<'a> {
    pub entries: &'a [PortfolioEntry],
    pub totals: &'a PortfolioTotals,
    pub generated_on: NaiveDate,
}

impl fmt::Display for SummaryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.totals;
        writeln!(f, "Household Loans Summary Report")?;
        writeln!(f, "Generated on {}", self.generated_on)?;
        writeln!(f)?;
        writeln!(f, "Overall Summary")?;
        writeln!(f, "  Total Payments Made:      {}", money(totals.total_payments, DEFAULT_CURRENCY))?;
        writeln!(
            f,
            "  Current Monthly Interest: {}",
            money(totals.total_next_month_interest, DEFAULT_CURRENCY)
        )?;
        writeln!(
            f,
            "  Total Current Balance:    {}",
            money(totals.total_current_balance, DEFAULT_CURRENCY)
        )?;
        writeln!(f, "    Original Principal:     {}", money(totals.total_principal, DEFAULT_CURRENCY))?;
        writeln!(
            f,
            "    Total Interest Paid:    {}",
            money(totals.total_interest_paid, DEFAULT_CURRENCY)
        )?;
        writeln!(f)?;
        writeln!(f, "All Loans")?;
        writeln!(
            f,
            "{:<20} {:>16} {:>10} {:>8} {:>6} {:>16} {:>16} {:>16}",
            "Lender", "Principal", "Start", "Rate", "Months", "Next Interest", "Payments", "Balance"
        )?;

        for entry in self.entries {
            let loan = &entry.loan;
            writeln!(
                f,
                "{:<20} {:>16} {:>10} {:>7.2}% {:>6} {:>16} {:>16} {:>16}{}",
                loan.lender_name,
                money(loan.principal, &loan.currency),
                month_year(loan.start_date),
                loan.yearly_rate * 100.,
                entry.months_elapsed,
                money(entry.next_month_interest, &loan.currency),
                money(entry.total_payments, &loan.currency),
                money(entry.current_balance, &loan.currency),
                if entry.is_highest_interest { "  *" } else { "" }
            )?;
        }
        Ok(())
    }
}

/// Single loan document: header and the full amortization table.
pub struct LoanDetailReport<'a> {
    pub entry: &'a PortfolioEntry,
    pub schedule: &'a [ScheduleEntry],
    pub generated_on: NaiveDate,
}

impl fmt::Display for LoanDetailReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loan = &self.entry.loan;
        let currency = loan.currency.as_str();

        writeln!(f, "Loan Report: {}", loan.lender_name)?;
        match &loan.description {
            Some(description) => writeln!(f, "{}", description)?,
            None => writeln!(f, "Loan details as of {}", self.generated_on)?,
        }
        writeln!(f)?;
        writeln!(f, "  Principal:       {}", money(loan.principal, currency))?;
        writeln!(f, "  Yearly Rate:     {:.2}%", loan.yearly_rate * 100.)?;
        writeln!(f, "  Start Date:      {}", month_year(loan.start_date))?;
        writeln!(f, "  Current Balance: {}", money(self.entry.current_balance, currency))?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>5} {:>9} {:>16} {:>16} {:>16} {:>16} {:>16}",
            "Month", "Period", "Opening", "Interest", "Debt", "Payments", "Closing"
        )?;

        for row in self.schedule {
            let payments = if row.monthly_payments > 0. {
                money(row.monthly_payments, currency)
            } else {
                "-".to_string()
            };
            writeln!(
                f,
                "{:>5} {:>9} {:>16} {:>16} {:>16} {:>16} {:>16}",
                row.month_number,
                month_year(row.period_date),
                money(row.opening_balance, currency),
                money(row.monthly_interest, currency),
                money(row.debt, currency),
                payments,
                money(row.closing_balance, currency)
            )?;
        }
        Ok(())
    }
}

/// Summary followed by one detail page per loan, separated by page breaks.
pub fn render_detailed(
    summary: &SummaryReport<'_>,
    details: &[(&PortfolioEntry, Vec<ScheduleEntry>)],
) -> String {
    let mut pages = vec![summary.to_string()];
    pages.extend(details.iter().map(|(entry, schedule)| {
        LoanDetailReport {
            entry: *entry,
            schedule: schedule.as_slice(),
            generated_on: summary.generated_on,
        }
        .to_string()
    }));
    pages.join(&format!("{}\n", PAGE_BREAK))
}

fn money(amount: f64, currency: &str) -> String {
    format!("{:.2} {}", amount, currency)
}

fn month_year(date: NaiveDate) -> String {
    date.format("%b-%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        filter_and_summarize, lenders, render_detailed, LoanDetailReport, NumericRange, ReportCriteria,
        SummaryReport, ALL_LENDERS, PAGE_BREAK,
    };
    use crate::loan::{compute_schedule, Loan, Payment};
    use crate::portfolio::{Portfolio, PortfolioTotals};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use test_log::test;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(id: i64, lender: &str, principal: f64, start_date: NaiveDate) -> Loan {
        Loan {
            id,
            lender_name: lender.to_string(),
            principal,
            yearly_rate: 0.12,
            start_date,
            currency: "USD".to_string(),
            description: None,
        }
    }

    // Mom: 2 months, balance 10000, paid 201
    // Dad: 0 months, balance 1500
    // Mom: 12 months, overpaid to a negative balance
    fn portfolio() -> Portfolio {
        let loans = vec![
            loan(1, "Mom", 10000., date(2025, 1, 1)),
            loan(2, "Dad", 1500., date(2025, 3, 1)),
            loan(3, "Mom", 100., date(2024, 3, 1)),
        ];
        let mut payments = HashMap::new();
        payments.insert(
            1,
            vec![Payment {
                id: 1,
                loan_id: 1,
                payment_date: date(2025, 2, 15),
                payment_amount: 201.,
            }],
        );
        payments.insert(
            3,
            vec![Payment {
                id: 2,
                loan_id: 3,
                payment_date: date(2024, 3, 3),
                payment_amount: 150.,
            }],
        );
        Portfolio::build(&loans, &payments, date(2025, 3, 5))
    }

    fn ids(report: &super::FilteredReport) -> Vec<i64> {
        report.filtered.iter().map(|e| e.loan.id).collect()
    }

    #[test]
    fn test_no_criteria_keeps_everything() {
        let portfolio = portfolio();
        let report = filter_and_summarize(&portfolio.entries, &ReportCriteria::default());

        assert_eq!(report.filtered, portfolio.entries);
        assert_eq!(report.totals, portfolio.totals);

        let all = ReportCriteria {
            lender: Some(ALL_LENDERS.to_string()),
            ..Default::default()
        };
        assert_eq!(filter_and_summarize(&portfolio.entries, &all).totals, portfolio.totals);
    }

    #[test]
    fn test_lender_filter_recomputes_totals() {
        let portfolio = portfolio();
        let criteria = ReportCriteria {
            lender: Some("Mom".to_string()),
            ..Default::default()
        };

        let report = filter_and_summarize(&portfolio.entries, &criteria);

        assert_eq!(ids(&report), vec![1, 3]);
        assert_eq!(report.totals, PortfolioTotals::from_entries(&report.filtered));
        assert_eq!(report.totals.total_principal, 10100.);
        assert_eq!(report.totals.total_payments, 351.);
    }

    #[test]
    fn test_numeric_ranges() {
        let portfolio = portfolio();

        let balance = ReportCriteria {
            current_balance: NumericRange::new(Some(1000.), Some(5000.)),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_summarize(&portfolio.entries, &balance)), vec![2]);

        // min defaults to 0 once a bound is given, so the negative balance drops out
        let upper_only = ReportCriteria {
            current_balance: NumericRange::new(None, Some(5000.)),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_summarize(&portfolio.entries, &upper_only)), vec![2]);

        let paid = ReportCriteria {
            total_payments: NumericRange::new(Some(1.), None),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_summarize(&portfolio.entries, &paid)), vec![1, 3]);

        let months = ReportCriteria {
            months_elapsed: NumericRange::new(Some(2.), Some(2.)),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_summarize(&portfolio.entries, &months)), vec![1]);
    }

    #[test]
    fn test_start_date_range_is_inclusive() {
        let portfolio = portfolio();
        let criteria = ReportCriteria {
            start_from: Some(date(2024, 3, 1)),
            start_to: Some(date(2025, 1, 1)),
            ..Default::default()
        };

        assert_eq!(ids(&filter_and_summarize(&portfolio.entries, &criteria)), vec![1, 3]);
    }

    #[test]
    fn test_criteria_are_conjunctive() {
        let portfolio = portfolio();
        let criteria = ReportCriteria {
            lender: Some("Mom".to_string()),
            months_elapsed: NumericRange::new(Some(3.), None),
            ..Default::default()
        };

        assert_eq!(ids(&filter_and_summarize(&portfolio.entries, &criteria)), vec![3]);
    }

    #[test]
    fn test_empty_result_has_zero_totals() {
        let portfolio = portfolio();
        let criteria = ReportCriteria {
            lender: Some("Nobody".to_string()),
            ..Default::default()
        };

        let report = filter_and_summarize(&portfolio.entries, &criteria);
        assert!(report.filtered.is_empty());
        assert_eq!(report.totals, PortfolioTotals::default());
    }

    #[test]
    fn test_lenders_are_unique_and_sorted() {
        assert_eq!(lenders(&portfolio().entries), vec!["Dad".to_string(), "Mom".to_string()]);
    }

    #[test]
    fn test_summary_report_rows() {
        let portfolio = portfolio();
        let text = SummaryReport {
            entries: &portfolio.entries,
            totals: &portfolio.totals,
            generated_on: date(2025, 3, 5),
        }
        .to_string();

        assert!(text.starts_with("Household Loans Summary Report\nGenerated on 2025-03-05\n"));
        assert!(text.contains("Original Principal:     11600.00 USD"));
        assert!(text.contains("Jan-2025"));
        assert!(text.contains("12.00%"));
        assert_eq!(text.lines().filter(|l| l.starts_with("Mom")).count(), 2);
    }

    #[test]
    fn test_summary_row_without_payments_shows_zero() {
        let portfolio = portfolio();
        let text = SummaryReport {
            entries: &portfolio.entries,
            totals: &portfolio.totals,
            generated_on: date(2025, 3, 5),
        }
        .to_string();

        let dad = text.lines().find(|l| l.starts_with("Dad")).unwrap();
        assert!(dad.contains(" 0.00 USD"));
        assert!(!dad.contains("-0.00"));
    }

    #[test]
    fn test_detail_report_marks_months_without_payments() {
        let portfolio = portfolio();
        let entry = &portfolio.entries[0];
        let payments = [Payment {
            id: 1,
            loan_id: 1,
            payment_date: date(2025, 2, 15),
            payment_amount: 201.,
        }];
        let schedule = compute_schedule(&entry.loan, &payments, date(2025, 3, 5));

        let text = LoanDetailReport {
            entry,
            schedule: &schedule,
            generated_on: date(2025, 3, 5),
        }
        .to_string();

        let rows: Vec<&str> = text.lines().rev().take(2).collect();
        assert!(rows[0].contains("Feb-2025") && rows[0].contains("201.00 USD"));
        assert!(rows[1].contains("Jan-2025") && rows[1].contains(" - "));
        assert!(text.contains("Loan details as of 2025-03-05"));
    }

    #[test]
    fn test_detailed_report_has_one_page_per_loan() {
        let portfolio = portfolio();
        let summary = SummaryReport {
            entries: &portfolio.entries,
            totals: &portfolio.totals,
            generated_on: date(2025, 3, 5),
        };
        let details: Vec<_> = portfolio
            .entries
            .iter()
            .map(|e| (e, compute_schedule(&e.loan, &[], date(2025, 3, 5))))
            .collect();

        let text = render_detailed(&summary, &details);

        assert_eq!(text.matches(PAGE_BREAK).count(), 3);
        assert_eq!(text.matches("Loan Report: Mom").count(), 2);
    }
}
