use clap::{Parser, Subcommand};
use metaflex_ops::cli;
use metaflex_ops::config::OpsConfig;
use metaflex_ops::error::OpsResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mfops")]
#[command(about = "MetaFlex Ops - task tracking over the shared operations sheet")]
#[command(long_about = "MetaFlex Ops - task tracking over the shared operations sheet

Reads the task worksheet, normalizes its columns, and writes edits back
under a guard that refuses any save that would shrink the sheet. Tasks
marked Done are moved to the Archive worksheet automatically.

BACKENDS:
  xlsx     - a local .xlsx workbook (sheet.xlsx_path / MFOPS_XLSX_PATH)
  remote   - the Google Sheets API (sheet.spreadsheet_id + MFOPS_API_TOKEN)
  memory   - an empty in-memory sheet, for experiments

COMMANDS:
  overview    - Headline KPIs and per-project breakdown
  list        - List tasks with filters
  add         - Append a new task row
  update      - Change one task's status (and optionally due date)
  archive     - Sweep every Done row to the Archive worksheet
  validate    - Check the sheet's shape without writing
  quarantine  - Show rows rejected at load
  serve       - Run the HTTP API in-process

EXAMPLES:
  mfops overview --user \"Téa Phillips\"
  mfops list --project Marketing --search gloves
  mfops add --person \"Megan Cole\" --task \"Draft campaign\" --project Marketing
  mfops update 2JPQQNH5ETL3YFWW --status Done
  mfops validate")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ./mfops.yaml when present)
    #[arg(short, long, global = true, env = "MFOPS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline KPIs and per-project breakdown
    Overview {
        /// Count "my open tasks" for this user
        #[arg(short, long)]
        user: Option<String>,
    },

    #[command(long_about = "List tasks from the active worksheet.

Done tasks are hidden by default (they are on their way to the Archive);
pass --include-done to see them. --user restricts the list to one person's
tasks, the same first-name match the dashboard uses.")]
    /// List tasks with filters
    List {
        /// Only this user's tasks
        #[arg(short, long)]
        user: Option<String>,

        /// Filter by project (exact, case-insensitive)
        #[arg(long)]
        project: Option<String>,

        /// Filter by assignee (first-name match)
        #[arg(long)]
        person: Option<String>,

        /// Keyword search across all fields
        #[arg(short, long)]
        search: Option<String>,

        /// Include Done tasks
        #[arg(long)]
        include_done: bool,
    },

    /// Append a new task row
    Add {
        /// Assignee full name
        #[arg(long)]
        person: String,

        /// Task description
        #[arg(long)]
        task: String,

        /// Project name
        #[arg(long)]
        project: String,

        /// External transcript id
        #[arg(long)]
        transcript_id: Option<String>,

        /// Initial status (default: Open)
        #[arg(long)]
        status: Option<String>,

        /// Due date (MM/DD/YYYY or YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
    },

    #[command(long_about = "Update one task's status by its Transcript ID.

The progress percentage is reconciled with the new status: Open pins it to
0%, Done to 100%, and Working on it keeps an existing 1-99% value (falling
back to the 50% placeholder). Setting a task to Done moves it to the
Archive worksheet on the same save.")]
    /// Change one task's status (and optionally due date)
    Update {
        /// Transcript ID of the task
        transcript_id: String,

        /// New status (Open / Working on it / Done)
        #[arg(short, long)]
        status: String,

        /// New due date (MM/DD/YYYY or YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// Sweep every Done row to the Archive worksheet
    Archive,

    /// Check the sheet's shape without writing
    Validate,

    /// Show rows rejected at load
    Quarantine,

    /// Run the HTTP API in-process
    Serve {
        /// Host address to bind to (overrides config)
        #[arg(short = 'H', long, env = "MFOPS_HOST")]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long, env = "MFOPS_PORT")]
        port: Option<u16>,
    },
}

fn main() -> OpsResult<()> {
    let cli = Cli::parse();
    let config = OpsConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Overview { user } => cli::overview(&config, user),

        Commands::List {
            user,
            project,
            person,
            search,
            include_done,
        } => cli::list(&config, user, project, person, search, include_done),

        Commands::Add {
            person,
            task,
            project,
            transcript_id,
            status,
            due,
            notes,
        } => cli::add(
            &config,
            person,
            task,
            project,
            transcript_id,
            status,
            due,
            notes,
        ),

        Commands::Update {
            transcript_id,
            status,
            due,
        } => cli::update(&config, transcript_id, status, due),

        Commands::Archive => cli::archive_sweep(&config),

        Commands::Validate => cli::validate(&config),

        Commands::Quarantine => cli::quarantine(&config),

        Commands::Serve { host, port } => cli::serve(config, host, port),
    }
}
