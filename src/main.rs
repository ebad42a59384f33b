mod app;
mod domain;
mod persistence;
mod ticker;

use anyhow::{Context, Result};
use app::TimerApp;
use chrono::Utc;
use clap::{Parser, Subcommand};
use domain::time::{format_duration, format_span};
use domain::{apply_tag, compute_total, flatten_entries, status_badge, tree_connector, EntryUpdate};
use persistence::{get_stint_dir, init_local_stint, ArchiveWatcher};
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stint")]
#[command(about = "A task timer that keeps its archive inside a markdown note", long_about = None)]
struct Cli {
    /// Archive folder. Defaults to the nearest .stint, then ~/.stint
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Archive document to use for this run instead of the remembered one
    #[arg(long, global = true)]
    file: Option<String>,

    /// Log more (-v info, -vv debug). STINT_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a local .stint directory in the current directory
    Init,
    /// Stop everything running and start a new task
    Start {
        name: Vec<String>,
        /// Two-letter tag, e.g. WK
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Start a task alongside whatever is running
    Add {
        name: Vec<String>,
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Create a project to group tasks under
    Project { name: Vec<String> },
    /// Start a sub-task under an entry
    Sub {
        /// Parent id or id prefix
        parent: String,
        name: Vec<String>,
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Stop one entry, or everything running
    Stop { id: Option<String> },
    /// Change an entry's name or times
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Start time (RFC 3339 or local "YYYY-MM-DD HH:MM")
        #[arg(long)]
        start: Option<String>,
        /// End time; pass "" to mark the entry running again
        #[arg(long)]
        end: Option<String>,
    },
    /// Mark a stopped entry as running again
    Reset { id: String },
    /// Delete an entry and everything under it
    Rm { id: String },
    /// Move an entry under another, or back to the top level
    Mv { id: String, parent: Option<String> },
    /// List entries
    Ls,
    /// List archive documents in the folder
    Files,
    /// Switch the active archive document
    Use { file: String },
    /// Show running durations and reload on external edits
    Watch,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("STINT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Init) = cli.command {
        let stint_dir = init_local_stint()?;
        println!("Initialized stint directory: {}", stint_dir.display());
        println!();
        println!("Stint will now keep its archives in this directory.");
        println!("Run 'stint start <name>' to start tracking.");
        return Ok(());
    }

    let folder = get_stint_dir(cli.dir.as_deref())?;
    debug!(folder = %folder.display(), "using archive folder");
    let mut app = TimerApp::open(&folder, cli.file.as_deref())?;

    match cli.command.unwrap_or(Commands::Ls) {
        Commands::Init => Ok(()),
        Commands::Start { name, tag } => {
            let name = task_name(&app, &name, tag.as_deref());
            let id = app.start_new_task(&name)?;
            print_started(&app, &id);
            Ok(())
        }
        Commands::Add { name, tag } => {
            let name = task_name(&app, &name, tag.as_deref());
            let id = app.append_task(&name)?;
            print_started(&app, &id);
            Ok(())
        }
        Commands::Project { name } => {
            let id = app.append_project(&name.join(" "))?;
            print_started(&app, &id);
            Ok(())
        }
        Commands::Sub { parent, name, tag } => {
            let parent = resolve_id(&app, &parent)?;
            let name = task_name(&app, &name, tag.as_deref());
            if let Some(id) = app.start_sub_task(&parent, &name)? {
                print_started(&app, &id);
            }
            Ok(())
        }
        Commands::Stop { id: Some(id) } => {
            let id = resolve_id(&app, &id)?;
            app.end_task(&id)?;
            Ok(())
        }
        Commands::Stop { id: None } => {
            let ended = app.end_all_tasks()?;
            println!("Stopped {} running entr{}", ended, if ended == 1 { "y" } else { "ies" });
            Ok(())
        }
        Commands::Edit {
            id,
            name,
            start,
            end,
        } => {
            let id = resolve_id(&app, &id)?;
            let Some(current) = app.entry(&id) else {
                return Ok(());
            };
            let update = EntryUpdate {
                name: name.unwrap_or_else(|| current.name.clone()),
                start_time: start.unwrap_or_else(|| current.start_time.clone()),
                end_time: end.unwrap_or_else(|| current.end_time.clone().unwrap_or_default()),
            };
            app.update_task(&id, &update)?;
            Ok(())
        }
        Commands::Reset { id } => {
            let id = resolve_id(&app, &id)?;
            app.reset_task(&id)
        }
        Commands::Rm { id } => {
            let id = resolve_id(&app, &id)?;
            let removed = app.delete_task(&id)?;
            println!("Deleted {} entr{}", removed.len(), if removed.len() == 1 { "y" } else { "ies" });
            Ok(())
        }
        Commands::Mv { id, parent } => {
            let id = resolve_id(&app, &id)?;
            match parent {
                Some(parent) => {
                    let parent = resolve_id(&app, &parent)?;
                    app.reparent_task(&id, &parent)
                }
                None => app.clear_parent(&id),
            }
        }
        Commands::Ls => {
            print_entries(&app);
            Ok(())
        }
        Commands::Files => {
            let active = app.address().file_name.clone();
            for file in app.list_archive_files()? {
                let marker = if file == active { "*" } else { " " };
                println!("{} {}", marker, file);
            }
            Ok(())
        }
        Commands::Use { file } => {
            app.switch_address(&file)?;
            println!("Using {}", app.address().path().display());
            Ok(())
        }
        Commands::Watch => run_watch(&mut app),
    }
}

/// Join CLI words into a name and apply the tag, if any
fn task_name(app: &TimerApp, words: &[String], tag: Option<&str>) -> String {
    let name = words.join(" ");
    let Some(tag) = tag else {
        return name;
    };
    let tag = tag.to_uppercase();
    let known = &app.settings().tags;
    if !known.is_empty() && !known.contains(&tag) {
        warn!(tag = %tag, "tag is not in settings.json");
    }
    apply_tag(&name, &tag)
}

fn resolve_id(app: &TimerApp, prefix: &str) -> Result<String> {
    app.find(prefix)
        .map(|entry| entry.id.clone())
        .with_context(|| format!("No single entry matches id '{}'", prefix))
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn print_started(app: &TimerApp, id: &str) {
    if let Some(entry) = app.entry(id) {
        println!("{} [{}] {}", status_badge(entry), short_id(&entry.id), entry.name);
    }
}

fn print_entries(app: &TimerApp) {
    let now = Utc::now();
    let rows = flatten_entries(app.top_level(), |id| app.children(id));
    if rows.is_empty() {
        println!("No entries in {}", app.address().file_name);
        return;
    }

    for row in rows {
        let Some(entry) = app.entry(&row.id) else {
            continue;
        };
        let indent = if row.depth == 0 {
            String::new()
        } else {
            format!("{}{} ", "  ".repeat(row.depth - 1), tree_connector(row.is_last))
        };
        let duration = app.duration(&entry.id, now).unwrap_or_else(chrono::Duration::zero);
        println!(
            "{}{} [{}] {}  {}  {}",
            indent,
            status_badge(entry),
            short_id(&entry.id),
            entry.name,
            format_duration(duration),
            format_span(&entry.start_time, entry.end_time.as_deref()),
        );
    }
    println!();
    println!("Total: {}", format_duration(compute_total(&app.all(), now)));
}

/// One status line: each running entry with its time, plus its project's
/// total when it has a parent
fn running_line(app: &TimerApp, rows: &[(String, chrono::Duration)]) -> String {
    let now = Utc::now();
    rows.iter()
        .filter_map(|(id, duration)| {
            let entry = app.entry(id)?;
            let own = format!("{} {}", entry.name, format_duration(*duration));
            let project = entry.parent_id.as_deref().and_then(|parent| {
                app.entry(parent).map(|p| {
                    format!("{} {}", p.name, format_duration(app.project_duration(parent, now)))
                })
            });
            Some(match project {
                Some(project) => format!("{} ({})", own, project),
                None => own,
            })
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn run_watch(app: &mut TimerApp) -> Result<()> {
    let watcher = ArchiveWatcher::start(&app.address().path())?;
    let subscription = app.subscribe(|kind| debug!(kind = ?kind, "archive changed"));
    let token = app.start_refresh();
    eprintln!("Watching {} (Ctrl-C to quit)", app.address().path().display());

    loop {
        if watcher.has_changed() {
            if let Err(e) = app.handle_external_change() {
                eprintln!("Error reloading archive: {}", e);
            }
        }

        let ids: Vec<String> = app.running().iter().map(|e| e.id.clone()).collect();
        let Some(rows) = app.refresh_durations(token, &ids, Utc::now()) else {
            break;
        };
        let line = running_line(app, &rows);
        if line.is_empty() {
            println!("Nothing running");
        } else {
            println!("{}", line);
        }

        std::thread::sleep(ticker::refresh_interval());
    }

    app.unsubscribe(subscription);
    Ok(())
}
