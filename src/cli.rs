use crate::cache::{FetchStatus, QueryCache};
use crate::entity::EntityKind;
use crate::gateway::HttpGateway;
use crate::model::{ConsoleConfig, ConsoleEvent, GroupingKey, PrintProgress, Record};
use crate::orchestrator::ListController;
use crate::print::{PrintSubsystem, SpoolPrinter};
use crate::session::{self, Session};
use crate::status::StatusFilter;
use crate::table::TableView;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "fair-console",
    version,
    about = "Admin console for fair registrations and participants, with optional TUI"
)]
pub struct Cli {
    /// Base URL of the panel API
    #[arg(long, default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Which list to open
    #[arg(long, value_enum, default_value_t = EntityKind::Participants)]
    pub entity: EntityKind,

    /// Event to list participants for (defaults to the current fair)
    #[arg(long)]
    pub event: Option<String>,

    /// Status pre-filter: Pending, Confirm, "Stall Issued", Cancel or All
    #[arg(long, default_value = "All", value_parser = parse_status_filter)]
    pub status: StatusFilter,

    /// Case-insensitive text filter across every field
    #[arg(long)]
    pub search: Option<String>,

    /// Restrict --search to one column
    #[arg(long, requires = "search")]
    pub search_column: Option<String>,

    /// Per-column substring filter, COLUMN=TEXT (repeatable)
    #[arg(long = "filter", value_parser = parse_column_filter)]
    pub filters: Vec<(String, String)>,

    /// Column to sort by
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending (with --sort)
    #[arg(long)]
    pub desc: bool,

    /// Print the filtered rows as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text table with status tallies and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Print a badge for every unprinted registration and exit
    #[arg(long)]
    pub print_unprinted: bool,

    /// Directory badges are spooled into
    #[arg(long)]
    pub spool_dir: Option<PathBuf>,

    /// Command run on each spooled badge, with the file path appended (e.g. "lp -o fit-to-page")
    #[arg(long)]
    pub print_command: Option<String>,

    /// Base URL registrant photos are served from
    #[arg(
        long,
        default_value = "http://southindiagarmentsassociation.com/public/register_images"
    )]
    pub image_base_url: String,

    /// Pause before each print and between prints
    #[arg(long, default_value = "500ms")]
    pub settle_delay: humantime::Duration,

    /// Give up on a single print after this long
    #[arg(long, default_value = "60s")]
    pub print_timeout: humantime::Duration,

    /// Store this bearer token in the session file
    #[arg(long)]
    pub token: Option<String>,

    /// Store this panel user type in the session file
    #[arg(long)]
    pub user_type: Option<i64>,

    /// Session file (defaults to the user config directory)
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// HTTP request timeout
    #[arg(long, default_value = "30s")]
    pub timeout: humantime::Duration,
}

fn parse_status_filter(s: &str) -> Result<StatusFilter, String> {
    StatusFilter::parse(s).ok_or_else(|| {
        format!("unknown status `{s}` (expected Pending, Confirm, Stall Issued, Cancel or All)")
    })
}

fn parse_column_filter(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((col, text)) if !col.trim().is_empty() => {
            Ok((col.trim().to_string(), text.to_string()))
        }
        _ => Err(format!("expected COLUMN=TEXT, got `{s}`")),
    }
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.json || self.text || self.print_unprinted
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.print_unprinted && args.entity != EntityKind::Registrations {
        return Err(anyhow::anyhow!(
            "--print-unprinted only applies to --entity registrations"
        ));
    }

    let session = open_session(&args)?;

    if !args.is_headless() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, session).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_listing(args, session, false).await;
        }
    }

    if args.print_unprinted {
        return run_print_unprinted(args, session).await;
    }

    let json = args.json;
    run_listing(args, session, json).await
}

fn default_spool_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("fair-console")
        .join("spool")
}

/// Build a `ConsoleConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ConsoleConfig {
    ConsoleConfig {
        base_url: args.base_url.clone(),
        entity: args.entity,
        grouping: args.event.clone().map(GroupingKey),
        user_agent: format!("fair-console/{}", env!("CARGO_PKG_VERSION")),
        request_timeout: Duration::from(args.timeout),
        settle_delay: Duration::from(args.settle_delay),
        print_timeout: Duration::from(args.print_timeout),
        spool_dir: args.spool_dir.clone().unwrap_or_else(default_spool_dir),
        print_command: args.print_command.clone(),
        image_base_url: args.image_base_url.clone(),
    }
}

/// Load the persisted session, folding in `--token` / `--user-type` and saving them back.
fn open_session(args: &Cli) -> Result<Session> {
    let path = match &args.session_file {
        Some(p) => p.clone(),
        None => session::default_session_path()?,
    };
    let session = Session::new(session::load(&path)?);
    if args.token.is_some() || args.user_type.is_some() {
        session.update(|data| {
            if let Some(token) = &args.token {
                data.token = Some(token.clone());
            }
            if let Some(user_type) = args.user_type {
                data.user_type = Some(user_type);
            }
        });
        session::save(&path, &session.snapshot())?;
        tracing::info!(path = %path.display(), "session saved");
    }
    Ok(session)
}

/// Wire gateway, cache, printer and controller for one entity.
pub fn build_controller(
    cfg: &ConsoleConfig,
    session: Session,
    events: mpsc::UnboundedSender<ConsoleEvent>,
) -> Result<ListController> {
    let gateway = Arc::new(HttpGateway::new(cfg, session.clone())?);
    let printer: Arc<dyn PrintSubsystem> = Arc::new(SpoolPrinter::new(
        cfg.spool_dir.clone(),
        cfg.print_command.clone(),
    ));
    Ok(ListController::new(
        cfg,
        session,
        gateway,
        Arc::new(QueryCache::new()),
        Some(printer),
        events,
    ))
}

/// Table controls from the command line. Headless output is one unpaginated page.
pub fn build_view(args: &Cli, page_size: Option<usize>) -> TableView<Record> {
    let entity = args.entity;
    let mut view = TableView::new(
        entity.columns(),
        page_size.unwrap_or(entity.page_size()),
        entity.status_field(),
    );
    view.set_status_filter(args.status.as_value());
    if let Some(q) = &args.search {
        view.set_global_filter(q.clone());
        view.scope_global_filter(args.search_column.as_deref());
    }
    for (column, text) in &args.filters {
        view.set_column_filter(column, text.clone());
    }
    if let Some(col) = &args.sort {
        view.toggle_sort(col);
        if args.desc {
            view.toggle_sort(col);
        }
    }
    view
}

async fn run_listing(args: Cli, session: Session, json: bool) -> Result<()> {
    let cfg = build_config(&args);
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<ConsoleEvent>();
    let controller = build_controller(&cfg, session, evt_tx)?;

    let entry = controller.load().await;
    while let Ok(ev) = evt_rx.try_recv() {
        if let ConsoleEvent::Notice(n) = ev {
            let _ = out_tx.send(OutputLine::Stderr(n.to_message()));
        }
    }
    if entry.status == FetchStatus::Error {
        drop(out_tx);
        let _ = out_handle.await;
        let cause = entry
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".into());
        return Err(anyhow::anyhow!(cause)).context("failed to load listing");
    }

    let view = build_view(&args, Some(usize::MAX));
    let projection = view.project(&entry.data);
    if json {
        let out = serde_json::to_string_pretty(&projection.rows)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = crate::text_summary::build_text_summary(
            cfg.entity,
            controller.grouping().as_ref(),
            &view,
            &entry.data,
        );
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn run_print_unprinted(args: Cli, session: Session) -> Result<()> {
    let cfg = build_config(&args);
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<ConsoleEvent>();
    let controller = build_controller(&cfg, session, evt_tx)?;
    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Spooling badges into {}",
        cfg.spool_dir.display()
    )));

    let printer = tokio::spawn(async move { controller.print_unprinted().await });

    while let Some(ev) = evt_rx.recv().await {
        let line = match ev {
            ConsoleEvent::Print(PrintProgress::Started { id }) => format!("Printing {id}…"),
            ConsoleEvent::Print(PrintProgress::Printed { id }) => format!("Printed {id}"),
            ConsoleEvent::Print(PrintProgress::Skipped { id, reason }) => {
                format!("Skipped {id}: {reason}")
            }
            ConsoleEvent::Print(PrintProgress::Failed { id, reason }) => {
                format!("Failed {id}: {reason}")
            }
            ConsoleEvent::Notice(n) => n.to_message(),
            _ => continue,
        };
        let _ = out_tx.send(OutputLine::Stderr(line));
    }

    let run = printer.await.context("print task failed")??;
    tracing::debug!(?run, "print run result");
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
