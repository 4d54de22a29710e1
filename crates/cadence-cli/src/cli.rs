use clap::{Args, Parser, Subcommand, ValueEnum};
use cadence_core::models::{OccurrenceStatus, RecurrenceKind, TaskKind};

/// Recurring tasks, habit streaks and someday reviews from the terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a task, a recurring task or a habit
    Add(AddCommand),
    /// List occurrences
    List(ListCommand),
    /// Mark an occurrence as completed
    Done(DoneCommand),
    /// Change the status of an occurrence
    Mark(MarkCommand),
    /// Archive an occurrence
    Archive(ArchiveCommand),
    /// Show the streak of a habit
    Streak(StreakCommand),
    /// Preview upcoming due dates of a recurrence
    Preview(PreviewCommand),
    /// Show someday tasks that are due for review
    Review(ReviewCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the task
    pub title: String,
    /// The description of the task
    #[clap(short, long)]
    pub description: Option<String>,
    /// The due date of the task (first due date for after-completion recurrences)
    #[clap(long)]
    pub due: Option<String>,
    /// Tags to add to the task
    #[clap(short, long, num_args = 1..)]
    pub tag: Vec<String>,
    /// What kind of task this is
    #[clap(short, long, value_enum, default_value_t = KindArg::Task)]
    pub kind: KindArg,
    /// Estimated duration in minutes
    #[clap(long)]
    pub estimate: Option<u32>,
    /// The parent task ID
    #[clap(long)]
    pub parent: Option<String>,
    /// Days a habit may be missed without breaking its streak
    #[clap(long, help = "Grace period in days for habits")]
    pub grace: Option<u32>,
    /// Weekdays a habit is due on
    #[clap(long, help = "Habit days (mon,tue,wed,thu,fri,sat,sun); all days when omitted")]
    pub on: Option<String>,
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
}

/// Recurrence options shared by `add` and `preview`
#[derive(Args, Debug, Clone, Default)]
pub struct RecurrenceArgs {
    /// Recurrence interval
    #[clap(
        long,
        allow_hyphen_values = true,
        help = "Interval such as 'daily', 'weekly', '3d', '2w', '1m' or '6h'; '0d' for one-time"
    )]
    pub every: Option<String>,
    /// How the next due date is placed
    #[clap(long, value_enum, requires = "every")]
    pub mode: Option<ModeArg>,
    /// First schedule point of a fixed schedule
    #[clap(
        long,
        requires = "every",
        help = "Anchor date of a fixed schedule; defaults to the due date or now"
    )]
    pub anchor: Option<String>,
    /// Weekdays never used by a fixed schedule
    #[clap(long, requires = "every", help = "Weekdays to skip (e.g. 'sat,sun')")]
    pub skip: Option<String>,
    /// Day of month for monthly recurrences
    #[clap(long, requires = "every", help = "Day of month (1-31 or 'last')")]
    pub day_of_month: Option<String>,
    /// End date for recurrence
    #[clap(long, requires = "every", help = "End date for recurrence (e.g., '2025-12-31')")]
    pub until: Option<String>,
    /// Maximum number of occurrences
    #[clap(long, requires = "every", help = "Maximum number of occurrences")]
    pub count: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Include completed and archived occurrences
    #[clap(short, long)]
    pub all: bool,
    /// Only list occurrences of this kind
    #[clap(short, long, value_enum)]
    pub kind: Option<KindArg>,
}

#[derive(Parser, Debug, Clone)]
pub struct DoneCommand {
    /// The ID of the occurrence to complete
    pub id: String,
    /// When it was actually done; marks the completion as retroactive
    #[clap(long)]
    pub at: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct MarkCommand {
    /// The ID of the occurrence
    pub id: String,
    /// The new status
    #[clap(value_enum)]
    pub status: StatusArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ArchiveCommand {
    /// The ID of the occurrence to archive
    pub id: String,
    /// Archive without confirmation
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct StreakCommand {
    /// The ID of any occurrence of the habit
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct PreviewCommand {
    /// The ID of an occurrence whose recurrence to preview
    #[clap(conflicts_with = "every")]
    pub id: Option<String>,
    /// Number of due dates to show
    #[clap(short = 'n', long, default_value_t = 5)]
    pub count: usize,
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ReviewCommand {
    /// Record a nudge for every task shown, restarting its review interval
    #[clap(long)]
    pub ack: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Task,
    Habit,
    /// Open-ended task that comes back for review
    Someday,
}

impl From<KindArg> for TaskKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Task => TaskKind::Task,
            KindArg::Habit => TaskKind::Habit,
            KindArg::Someday => TaskKind::Someday,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Follow the calendar from an anchor date
    Fixed,
    /// Count the interval from the actual completion
    After,
}

impl From<ModeArg> for RecurrenceKind {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Fixed => RecurrenceKind::FixedSchedule,
            ModeArg::After => RecurrenceKind::AfterCompletion,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    Ready,
    InProgress,
    Blocked,
}

impl From<StatusArg> for OccurrenceStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Ready => OccurrenceStatus::Ready,
            StatusArg::InProgress => OccurrenceStatus::InProgress,
            StatusArg::Blocked => OccurrenceStatus::Blocked,
        }
    }
}
