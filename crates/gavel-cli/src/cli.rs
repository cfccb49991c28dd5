//! Command-line argument parsing with clap.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use gavel_alerts::{AlertType, Rate};

/// Gavel - search alert dispatch and delivery.
#[derive(Parser, Debug, Clone)]
#[command(name = "gavel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding engine state snapshots.
    #[arg(short, long, env = "GAVEL_STATE_DIR", default_value = "./gavel-state")]
    pub state_dir: PathBuf,

    /// Site base URL used in email links and unsubscribe targets.
    #[arg(long, env = "GAVEL_BASE_URL", default_value = "https://www.gavel.dev")]
    pub base_url: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Dispatch one newly-created document against the alert corpus.
    HandleDocument {
        /// Path to the document as JSON.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run batched alert delivery for one rate.
    SendScheduled {
        /// The cadence to deliver.
        #[arg(short, long, value_enum)]
        rate: BatchRate,

        /// Run date; defaults to today. Monthly runs refuse the 29th-31st.
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Purge scheduled-hit rows past their retention horizon.
    Cleanup,

    /// Register an alert (normally done by the web layer).
    AddAlert(AddAlertArgs),

    /// Register a user's delivery targets (normally done by the web layer).
    AddUser(AddUserArgs),
}

/// Rates the batch scheduler delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchRate {
    /// Daily delivery.
    Dly,
    /// Weekly delivery.
    Wly,
    /// Monthly delivery.
    Mly,
}

impl From<BatchRate> for Rate {
    fn from(rate: BatchRate) -> Self {
        match rate {
            BatchRate::Dly => Self::Daily,
            BatchRate::Wly => Self::Weekly,
            BatchRate::Mly => Self::Monthly,
        }
    }
}

/// All alert rates, for registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlertRate {
    /// Real-time delivery.
    Rt,
    /// Daily delivery.
    Dly,
    /// Weekly delivery.
    Wly,
    /// Monthly delivery.
    Mly,
    /// Disabled.
    Off,
}

impl From<AlertRate> for Rate {
    fn from(rate: AlertRate) -> Self {
        match rate {
            AlertRate::Rt => Self::RealTime,
            AlertRate::Dly => Self::Daily,
            AlertRate::Wly => Self::Weekly,
            AlertRate::Mly => Self::Monthly,
            AlertRate::Off => Self::Off,
        }
    }
}

/// Document categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    /// Court opinions.
    O,
    /// Oral argument audio.
    Oa,
    /// RECAP filings.
    R,
    /// Whole dockets.
    D,
}

impl From<TypeArg> for AlertType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::O => Self::Opinion,
            TypeArg::Oa => Self::OralArgument,
            TypeArg::R => Self::Recap,
            TypeArg::D => Self::Docket,
        }
    }
}

/// Arguments for `add-alert`.
#[derive(Args, Debug, Clone)]
pub struct AddAlertArgs {
    /// Alert id.
    #[arg(long)]
    pub id: u64,

    /// Owning user id.
    #[arg(long)]
    pub user: u64,

    /// Alert name, shown in email subjects.
    #[arg(long)]
    pub name: String,

    /// Query string, e.g. "q=fourth+amendment&type=o".
    #[arg(long)]
    pub query: String,

    /// Delivery cadence.
    #[arg(long, value_enum, default_value = "dly")]
    pub rate: AlertRate,

    /// Document category.
    #[arg(long = "type", value_enum, default_value = "o")]
    pub alert_type: TypeArg,
}

/// Arguments for `add-user`.
#[derive(Args, Debug, Clone)]
pub struct AddUserArgs {
    /// User id.
    #[arg(long)]
    pub id: u64,

    /// Email address alerts go to.
    #[arg(long)]
    pub email: String,

    /// Optional webhook endpoint URL.
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Webhook payload version.
    #[arg(long, value_enum, default_value = "v2")]
    pub webhook_version: VersionArg,
}

/// Webhook payload versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VersionArg {
    /// Legacy flat records.
    V1,
    /// Nested document records.
    V2,
}

impl From<VersionArg> for gavel_alerts::WebhookVersion {
    fn from(arg: VersionArg) -> Self {
        match arg {
            VersionArg::V1 => Self::V1,
            VersionArg::V2 => Self::V2,
        }
    }
}
