use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    // ── Infrastructure ─────────────────────────────
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Domain rejections ──────────────────────────
    #[error("Reading date {reading_date} is outside the reading window {window_start}..={window_end}")]
    OutsideReadingWindow {
        reading_date: NaiveDate,
        window_start: NaiveDate,
        window_end:   NaiveDate,
    },

    #[error("Reading already submitted on {last_bill_date} for the window {window_start}..={window_end}")]
    DuplicateReadingThisCycle {
        last_bill_date: NaiveDate,
        window_start:   NaiveDate,
        window_end:     NaiveDate,
    },

    #[error("Reading dated {reading_date} is earlier than the last bill on {last_bill_date}")]
    BackdatedReading {
        reading_date:   NaiveDate,
        last_bill_date: NaiveDate,
    },

    #[error("Current reading {submitted} must be greater than previous reading {previous}")]
    NonIncreasingReading { previous: f64, submitted: f64 },

    #[error("Invalid tariff plan '{plan}'")]
    InvalidTariffPlan { plan: String },

    #[error("Invalid reading input: {reason}")]
    InvalidReadingInput { reason: String },

    #[error("Invalid bill amount {amount}")]
    InvalidBillAmount { amount: f64 },

    #[error("Consumer '{consumer_number}' not found")]
    ConsumerNotFound { consumer_number: String },

    #[error("Consumer '{consumer_number}' already exists")]
    ConsumerAlreadyExists { consumer_number: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BillingError {
    /// True for caller-facing rejections (4xx-style); false for
    /// infrastructure failures the caller cannot fix.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Serialization(_) | Self::Other(_)
        )
    }

    /// Stable label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_)                     => "database",
            Self::Serialization(_)                => "serialization",
            Self::OutsideReadingWindow { .. }     => "outside_reading_window",
            Self::DuplicateReadingThisCycle { .. } => "duplicate_reading_this_cycle",
            Self::BackdatedReading { .. }         => "backdated_reading",
            Self::NonIncreasingReading { .. }     => "non_increasing_reading",
            Self::InvalidTariffPlan { .. }        => "invalid_tariff_plan",
            Self::InvalidReadingInput { .. }      => "invalid_reading_input",
            Self::InvalidBillAmount { .. }        => "invalid_bill_amount",
            Self::ConsumerNotFound { .. }         => "consumer_not_found",
            Self::ConsumerAlreadyExists { .. }    => "consumer_already_exists",
            Self::Other(_)                        => "internal",
        }
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
