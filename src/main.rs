use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use household_loans::loan::parse_date;
use household_loans::report::{lenders, SummaryReport};
use household_loans::store::{LoanStore, MemoryStore, SqliteStore};
use household_loans::{LoanBook, NewLoan, NewPayment, NumericRange, ReportCriteria, ReportKind};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "household-loans", about = "Track informal household loans and their payments.")]
struct Cli {
    /// SQLite database file
    #[arg(long, default_value = "household_loans.db")]
    db: PathBuf,

    /// Keep everything in memory for this run only
    #[arg(long)]
    in_memory: bool,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Pin "today" (YYYY-MM-DD) instead of using the local clock
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a new loan
    AddLoan(LoanArgs),
    /// Replace every field of an existing loan
    EditLoan {
        id: i64,
        #[command(flatten)]
        loan: LoanArgs,
    },
    /// Delete a loan together with all of its payments
    DeleteLoan { id: i64 },
    AddPayment {
        loan_id: i64,
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
        amount: f64,
    },
    DeletePayment { id: i64 },
    /// Dashboard: every loan with its balance, plus totals
    List,
    /// Amortization schedule of one loan
    Schedule { loan_id: i64 },
    /// Distinct lender names
    Lenders,
    /// Filtered summary or detailed report
    Report(ReportArgs),
}

#[derive(Args, Debug)]
struct LoanArgs {
    #[arg(long)]
    lender: String,
    #[arg(long)]
    principal: f64,
    /// Yearly interest rate in percent, e.g. 4 for 4%
    #[arg(long)]
    rate: f64,
    #[arg(long, value_parser = parse_date)]
    start_date: NaiveDate,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

impl From<LoanArgs> for NewLoan {
    fn from(args: LoanArgs) -> Self {
        NewLoan {
            lender_name: args.lender,
            principal: args.principal,
            yearly_rate: args.rate / 100.,
            start_date: Some(args.start_date),
            currency: args.currency,
            description: args.description,
        }
    }
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Exact lender name, or ALL
    #[arg(long)]
    lender: Option<String>,
    #[arg(long)]
    balance_min: Option<f64>,
    #[arg(long)]
    balance_max: Option<f64>,
    #[arg(long)]
    payments_min: Option<f64>,
    #[arg(long)]
    payments_max: Option<f64>,
    #[arg(long)]
    months_min: Option<f64>,
    #[arg(long)]
    months_max: Option<f64>,
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
    /// Append one detail page per loan
    #[arg(long)]
    detailed: bool,
}

impl From<&ReportArgs> for ReportCriteria {
    fn from(args: &ReportArgs) -> Self {
        ReportCriteria {
            lender: args.lender.clone(),
            current_balance: NumericRange::new(args.balance_min, args.balance_max),
            total_payments: NumericRange::new(args.payments_min, args.payments_max),
            months_elapsed: NumericRange::new(args.months_min, args.months_max),
            start_from: args.from,
            start_to: args.to,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    SimpleLogger::new()
        .with_level(cli.log_level)
        .init()
        .context("initializing logger")?;

    if cli.in_memory {
        let store = MemoryStore::new();
        run(open_book(store, cli.today)?, cli.command)
    } else {
        let store = SqliteStore::open(&cli.db).with_context(|| format!("opening {}", cli.db.display()))?;
        run(open_book(store, cli.today)?, cli.command)
    }
}

fn open_book<S: LoanStore>(store: S, today: Option<NaiveDate>) -> Result<LoanBook<S>> {
    let book = match today {
        Some(today) => LoanBook::with_today(store, today),
        None => LoanBook::open(store),
    };
    book.context("loading loans")
}

fn run<S: LoanStore>(mut book: LoanBook<S>, command: Command) -> Result<()> {
    match command {
        Command::AddLoan(args) => {
            let id = book.add_loan(&args.into())?;
            println!("Added loan {}", id);
        }
        Command::EditLoan { id, loan } => {
            book.edit_loan(id, &loan.into())?;
            println!("Updated loan {}", id);
        }
        Command::DeleteLoan { id } => {
            book.delete_loan(id)?;
            println!("Deleted loan {} and its payments", id);
        }
        Command::AddPayment { loan_id, date, amount } => {
            let id = book.add_payment(&NewPayment::new(loan_id, date, amount))?;
            println!("Added payment {} to loan {}", id, loan_id);
        }
        Command::DeletePayment { id } => {
            book.delete_payment(id)?;
            println!("Deleted payment {}", id);
        }
        Command::List => {
            let portfolio = book.portfolio();
            let report = SummaryReport {
                entries: &portfolio.entries,
                totals: &portfolio.totals,
                generated_on: book.today(),
            };
            print!("{}", report);
        }
        Command::Schedule { loan_id } => {
            let details = book.loan_details(loan_id)?;
            println!("{}", details.loan);
            for payment in &details.payments {
                println!("  {}", payment);
            }
            for entry in &details.schedule {
                println!("{}", entry);
            }
            println!("current balance ${:.2}", details.current_balance());
        }
        Command::Lenders => {
            for lender in lenders(&book.portfolio().entries) {
                println!("{}", lender);
            }
        }
        Command::Report(args) => {
            let kind = if args.detailed {
                ReportKind::Detailed
            } else {
                ReportKind::Summary
            };
            print!("{}", book.report(&ReportCriteria::from(&args), kind)?);
        }
    }

    book.close();
    info!("done");
    Ok(())
}

// compile-time check that the public types can cross threads
#[allow(dead_code)]
fn is_normal<T: Sized + Send + Sync + Unpin>() {}

#[test]
fn normal_types() {
    is_normal::<household_loans::Loan>();
    is_normal::<household_loans::ScheduleEntry>();
    is_normal::<household_loans::Portfolio>();
    is_normal::<household_loans::Error>();
}

#[test]
fn cli_parses_report_flags() {
    let cli = Cli::try_parse_from([
        "household-loans",
        "--in-memory",
        "--today",
        "2025-03-05",
        "report",
        "--lender",
        "Mom",
        "--balance-max",
        "5000",
        "--detailed",
    ])
    .unwrap();

    assert_eq!(cli.today, NaiveDate::from_ymd_opt(2025, 3, 5));
    let Command::Report(args) = cli.command else {
        panic!("expected report command");
    };
    let criteria = ReportCriteria::from(&args);
    assert_eq!(criteria.lender.as_deref(), Some("Mom"));
    assert_eq!(criteria.current_balance, NumericRange::new(None, Some(5000.)));
    assert!(args.detailed);
}

#[test]
fn cli_converts_rate_percent() {
    let cli = Cli::try_parse_from([
        "household-loans",
        "add-loan",
        "--lender",
        "Dad",
        "--principal",
        "1500",
        "--rate",
        "4",
        "--start-date",
        "2025-06-01",
    ])
    .unwrap();

    let Command::AddLoan(args) = cli.command else {
        panic!("expected add-loan command");
    };
    let new_loan = NewLoan::from(args);
    assert_eq!(new_loan.yearly_rate, 0.04);
    assert_eq!(new_loan.start_date, NaiveDate::from_ymd_opt(2025, 6, 1));
}
