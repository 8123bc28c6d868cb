use crate::utils::start_of_day;
use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ObligationKind {
    #[schemars(description = "Money coming in (salary, benefits). Dates falling on non-business days move to the prior business day.")]
    Income,

    #[schemars(description = "Fixed recurring expense such as rent or insurance.")]
    FixedExpense,

    #[schemars(description = "Subscription renewed on a schedule, usually anchored on the last renewal date.")]
    Subscription,

    #[schemars(description = "Scheduled payment towards a debt account.")]
    DebtPayment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    Quarterly,
    Yearly,
    #[schemars(description = "Twice a month on two fixed days of the month (see semi_monthly_first_day / semi_monthly_second_day).")]
    SemiMonthly,
    /// Anything the engine does not recognise. Expanded as monthly.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorKind {
    #[default]
    #[schemars(description = "The anchor date is itself the first due period.")]
    StartDate,

    #[schemars(description = "The anchor date is the last renewal already paid; the first due period is one step after it.")]
    LastRenewal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RecurringObligation {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub kind: ObligationKind,

    #[schemars(description = "Amount per period. Passed through untouched.")]
    pub amount: f64,

    pub frequency: Frequency,

    #[serde(default)]
    #[schemars(description = "Start date, or last renewal date when anchor_kind is last-renewal. When absent, evaluation starts at the window start.")]
    pub anchor_date: Option<NaiveDate>,

    #[serde(default)]
    pub anchor_kind: AnchorKind,

    #[serde(default)]
    #[schemars(description = "Day of month of the first semi-monthly payment. Required for semi-monthly.")]
    pub semi_monthly_first_day: Option<u32>,

    #[serde(default)]
    #[schemars(description = "Day of month of the second semi-monthly payment. Required for semi-monthly.")]
    pub semi_monthly_second_day: Option<u32>,

    #[serde(default)]
    #[schemars(description = "Occurrences strictly after this date are excluded.")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DebtAccount {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[schemars(description = "Scheduled payment amount (usually the minimum payment).")]
    pub amount: f64,

    #[serde(default)]
    pub payment_day_of_month: Option<u32>,

    #[serde(default)]
    #[schemars(description = "The next payment due date known to the lender. Occurrences are aligned backwards and forwards from it.")]
    pub next_due_date: Option<NaiveDate>,

    #[schemars(description = "weekly, bi-weekly or monthly. Anything else is treated as monthly.")]
    pub payment_frequency: Frequency,

    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// A recurring item from either source table, behind one interface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Obligation {
    Recurring(RecurringObligation),
    Debt(DebtAccount),
}

impl Obligation {
    pub fn reference(&self) -> ObligationRef {
        match self {
            Obligation::Recurring(item) => ObligationRef::Recurring(item.id.clone()),
            Obligation::Debt(account) => ObligationRef::Debt(account.id.clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Obligation::Recurring(item) => &item.name,
            Obligation::Debt(account) => &account.name,
        }
    }

    pub fn kind(&self) -> ObligationKind {
        match self {
            Obligation::Recurring(item) => item.kind,
            Obligation::Debt(_) => ObligationKind::DebtPayment,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Obligation::Recurring(item) => item.amount,
            Obligation::Debt(account) => account.amount,
        }
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Obligation::Recurring(item) => item.frequency,
            Obligation::Debt(account) => account.payment_frequency,
        }
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        match self {
            Obligation::Recurring(item) => item.end_date,
            Obligation::Debt(account) => account.end_date,
        }
    }
}

/// Identifies an obligation in the ledger. Recurring items and debt accounts
/// live in separate id spaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum ObligationRef {
    Recurring(String),
    Debt(String),
}

impl ObligationRef {
    pub fn source(&self) -> &'static str {
        match self {
            ObligationRef::Recurring(_) => "recurring",
            ObligationRef::Debt(_) => "debt",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ObligationRef::Recurring(id) | ObligationRef::Debt(id) => id,
        }
    }

    pub fn from_parts(source: &str, id: String) -> Option<Self> {
        match source {
            "recurring" => Some(ObligationRef::Recurring(id)),
            "debt" => Some(ObligationRef::Debt(id)),
            _ => None,
        }
    }
}

impl fmt::Display for ObligationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source(), self.id())
    }
}

/// One concrete due date of an obligation. Never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub obligation: ObligationRef,
    pub period_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub user_id: String,
    pub obligation: ObligationRef,
    pub period_date: NaiveDate,
    pub completed_date: NaiveDate,
    pub linked_transaction_id: Option<String>,
}

impl CompletionRecord {
    /// Record produced by a backfill: completed on its own period date, unlinked.
    pub fn backfilled(user_id: &str, obligation: ObligationRef, period_date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            obligation,
            period_date,
            completed_date: period_date,
            linked_transaction_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotatedPeriod {
    pub period: Period,
    pub name: String,
    pub kind: ObligationKind,
    pub amount: f64,
    pub is_completed: bool,
    pub is_overdue: bool,
    pub days_past_due: Option<i64>,
    pub completed_date: Option<NaiveDate>,
    /// Completed only because the period precedes the tracking start date.
    pub auto_completed: bool,
    pub linked_transaction_id: Option<String>,
}

impl AnnotatedPeriod {
    pub fn period_date(&self) -> NaiveDate {
        self.period.period_date
    }
}

/// Inclusive calendar window `[start, end]` at day granularity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn from_instants(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::new(start_of_day(start), start_of_day(end))
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Payload shape collaborators use to hand obligation definitions to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ObligationSet {
    #[schemars(description = "All recurring items and debt accounts belonging to one user.")]
    pub obligations: Vec<Obligation>,
}

impl ObligationSet {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ObligationSet)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
