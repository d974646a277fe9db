use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bulk::parse_bulk_rows;
use crate::cli::Invocation;
use crate::config::Config;
use crate::controller::{ViewController, ViewState};
use crate::datastore::DataStore;
use crate::datetime::parse_date_expr;
use crate::event::{Event, EventType, NewEvent, search_events};
use crate::holiday::HolidayTable;
use crate::range::{Direction, ViewMode};
use crate::render::{Renderer, short_id};

type Controller = ViewController<DataStore>;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show", "next", "prev", "today", "view", "add", "import", "delete", "list", "alerts",
        "holidays", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, holidays, inv))]
pub async fn dispatch(
    store: DataStore,
    cfg: &Config,
    renderer: &Renderer,
    holidays: HolidayTable,
    today: NaiveDate,
    inv: Invocation,
) -> anyhow::Result<()> {
    let state = match store.load_view_state() {
        Ok(Some(state)) => state,
        Ok(None) => ViewState::new(today, cfg.default_view()),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "ignoring unreadable view state");
            ViewState::new(today, cfg.default_view())
        }
    };
    let mut controller = ViewController::new(store, holidays, today).with_state(state);
    let command = inv.command.as_str();

    debug!(command, args = ?inv.args, ?state, "dispatching command");

    match command {
        "show" => cmd_show(&mut controller, renderer, &inv.args).await,
        "next" => cmd_navigate(&mut controller, renderer, Some(Direction::Next)).await,
        "prev" => cmd_navigate(&mut controller, renderer, Some(Direction::Prev)).await,
        "today" => cmd_navigate(&mut controller, renderer, None).await,
        "view" => cmd_view(&mut controller, renderer, &inv.args).await,
        "add" => cmd_add(&mut controller, &inv.args).await,
        "import" => cmd_import(&mut controller, &inv.args).await,
        "delete" => cmd_delete(&mut controller, &inv.args).await,
        "list" => cmd_list(&mut controller, renderer, &inv.args).await,
        "alerts" => cmd_alerts(&mut controller, renderer).await,
        "holidays" => cmd_holidays(&controller, renderer, &inv.args),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(controller, renderer, args))]
async fn cmd_show(
    controller: &mut Controller,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command show");

    let mut changed = false;
    for arg in args {
        match parse_one_mod(arg, controller.today())? {
            Some(Mod::View(mode)) => {
                controller.set_mode(mode);
                changed = true;
            }
            Some(Mod::Date(date)) => {
                controller.go_to(date);
                changed = true;
            }
            Some(_) => return Err(anyhow!("show: only view: and date: modifiers apply")),
            None => return Err(anyhow!("unknown command or argument: {arg}")),
        }
    }

    if changed {
        persist_view(controller)?;
    }
    refresh_or_warn(controller, renderer).await?;
    render_view(controller, renderer)
}

/// `None` jumps back to today.
#[instrument(skip(controller, renderer))]
async fn cmd_navigate(
    controller: &mut Controller,
    renderer: &Renderer,
    direction: Option<Direction>,
) -> anyhow::Result<()> {
    info!("command navigate");

    match direction {
        Some(direction) => controller.navigate(direction),
        None => controller.go_today(),
    }
    persist_view(controller)?;
    refresh_or_warn(controller, renderer).await?;
    render_view(controller, renderer)
}

#[instrument(skip(controller, renderer, args))]
async fn cmd_view(
    controller: &mut Controller,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command view");

    let [mode] = args else {
        return Err(anyhow!("view: expected exactly one of month, week or day"));
    };
    let mode = mode.parse::<ViewMode>()?;

    controller.set_mode(mode);
    persist_view(controller)?;
    refresh_or_warn(controller, renderer).await?;
    render_view(controller, renderer)
}

#[instrument(skip(controller, args))]
async fn cmd_add(controller: &mut Controller, args: &[String]) -> anyhow::Result<()> {
    info!("command add");

    let new = parse_new_event(args, controller.today())?;
    let event = controller.create_event(new).await?;

    println!(
        "일정 {} 등록: {} ({})",
        short_id(event.id),
        event.date.format("%Y-%m-%d"),
        event.kind.label()
    );
    Ok(())
}

#[instrument(skip(controller, args))]
async fn cmd_import(controller: &mut Controller, args: &[String]) -> anyhow::Result<()> {
    info!("command import");

    let raw = match args {
        [] => {
            let mut stdin = String::new();
            io::stdin()
                .read_to_string(&mut stdin)
                .context("failed reading stdin")?;
            stdin
        }
        [path] => fs::read_to_string(path).with_context(|| format!("failed reading {path}"))?,
        _ => return Err(anyhow!("import: expected at most one file")),
    };

    let rows = parse_bulk_rows(&raw)?;
    let total = rows.len();
    let created = controller.import_events(rows).await?;

    let skipped = total - created.len();
    if skipped > 0 {
        println!("일정 {}건 등록, 제목 없는 행 {skipped}개 건너뜀", created.len());
    } else {
        println!("일정 {}건 등록", created.len());
    }
    Ok(())
}

#[instrument(skip(controller, args))]
async fn cmd_delete(controller: &mut Controller, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let [prefix] = args else {
        return Err(anyhow!("delete: expected one event id or id prefix"));
    };

    controller.refresh().await?;
    let (id, title) = {
        let event = resolve_id_prefix(controller.events(), prefix)?;
        (event.id, event.title.clone())
    };

    controller.delete_event(id).await?;
    println!("일정 {} 삭제 ({title})", short_id(id));
    Ok(())
}

#[instrument(skip(controller, renderer, args))]
async fn cmd_list(
    controller: &mut Controller,
    renderer: &Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command list");

    controller.refresh().await?;
    let query = args.join(" ");
    let matches = search_events(controller.events(), &query);
    debug!(query = %query, matches = matches.len(), "list filtered");

    let mut out = io::stdout().lock();
    renderer.write_event_table(&mut out, &matches)
}

#[instrument(skip(controller, renderer))]
async fn cmd_alerts(controller: &mut Controller, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command alerts");

    controller.refresh().await?;
    let mut out = io::stdout().lock();
    match controller.todays_notice() {
        Some(notice) => renderer.write_day_notice(&mut out, &notice),
        None => {
            writeln!(out, "오늘 일정이 없습니다.")?;
            Ok(())
        }
    }
}

#[instrument(skip(controller, renderer, args))]
fn cmd_holidays(controller: &Controller, renderer: &Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command holidays");

    let year = match args {
        [] => controller.state().reference.year(),
        [year] => year
            .parse::<i32>()
            .with_context(|| format!("holidays: invalid year: {year}"))?,
        _ => return Err(anyhow!("holidays: expected at most one year")),
    };

    let table = controller.holidays();
    if !table.supports_year(year) {
        let years = table.years();
        warn!(
            year,
            first = years.start(),
            last = years.end(),
            "year outside the holiday table"
        );
    }

    let mut out = io::stdout().lock();
    renderer.write_holidays(&mut out, year, &table.holidays_in_year(year))
}

fn cmd_help() -> anyhow::Result<()> {
    let types = EventType::all().map(EventType::as_key).join(", ");
    println!("usage: hrcal [options] [command] [args]");
    println!();
    println!("  show [view:month|week|day] [date:EXPR]   render the calendar (default)");
    println!("  next | prev | today                      move the view and render");
    println!("  view <month|week|day>                    switch the view mode");
    println!("  add <title> [date:EXPR] [type:KEY] [desc:TEXT] [memo:TEXT]");
    println!("  import [FILE]                            bulk add from JSON or JSON lines");
    println!("  delete <id>                              delete one event by id prefix");
    println!("  list [terms]                             search events by title or type");
    println!("  alerts                                   events dated today");
    println!("  holidays [YEAR]                          public holidays for a year");
    println!();
    println!("  date expressions: today, tomorrow, yesterday, YYYY-MM-DD, YYYYMMDD, +Nd, -Nw, +Nm");
    println!("  event types: {types}");
    Ok(())
}

fn persist_view(controller: &Controller) -> anyhow::Result<()> {
    controller
        .store()
        .save_view_state(&controller.state())
        .context("failed to persist view state")
}

/// Read-only commands still render when the store fails, with a notice on stderr.
async fn refresh_or_warn(controller: &mut Controller, renderer: &Renderer) -> anyhow::Result<()> {
    if controller.refresh().await.is_err()
        && let Some(notice) = controller.notice()
    {
        renderer.write_notice(&mut io::stderr().lock(), notice)?;
    }
    Ok(())
}

fn render_view(controller: &Controller, renderer: &Renderer) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    renderer.write_calendar(
        &mut out,
        &controller.title(),
        controller.state().mode,
        controller.cells(),
    )?;

    if let Some(notice) = controller.todays_notice() {
        writeln!(out)?;
        renderer.write_day_notice(&mut out, &notice)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mod {
    View(ViewMode),
    Date(NaiveDate),
    Type(EventType),
    Description(String),
    Memo(String),
}

/// Words that are not modifiers form the title; `--` ends modifier parsing.
fn parse_new_event(args: &[String], today: NaiveDate) -> anyhow::Result<NewEvent> {
    let mut title_parts = Vec::new();
    let mut new = NewEvent::new("", today, EventType::Other);

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, today)? {
            match one_mod {
                Mod::Date(date) => new.date = date,
                Mod::Type(kind) => new.kind = kind,
                Mod::Description(text) => new.description = Some(text),
                Mod::Memo(text) => new.memo = Some(text),
                Mod::View(_) => return Err(anyhow!("add: view: does not apply to events")),
            }
            continue;
        }

        title_parts.push(arg.as_str());
    }

    new.title = title_parts.join(" ");
    Ok(new)
}

fn parse_one_mod(tok: &str, today: NaiveDate) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };

    match key.to_ascii_lowercase().as_str() {
        "view" => Ok(Some(Mod::View(value.parse()?))),
        "date" => Ok(Some(Mod::Date(parse_date_expr(value, today)?))),
        "type" => Ok(Some(Mod::Type(value.parse()?))),
        "desc" | "description" => Ok(Some(Mod::Description(value.to_string()))),
        "memo" => Ok(Some(Mod::Memo(value.to_string()))),
        _ => Ok(None),
    }
}

fn resolve_id_prefix<'a>(events: &'a [Event], prefix: &str) -> anyhow::Result<&'a Event> {
    let needle = prefix.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("delete: empty id"));
    }

    if let Ok(id) = Uuid::parse_str(&needle) {
        return events
            .iter()
            .find(|event| event.id == id)
            .ok_or_else(|| anyhow!("no event with id {id}"));
    }

    let mut matches = events.iter().filter(|event| {
        event.id.simple().to_string().starts_with(&needle)
            || event.id.to_string().starts_with(&needle)
    });
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no event matches id prefix: {prefix}"))?;
    let extra = matches.count();
    if extra > 0 {
        return Err(anyhow!(
            "id prefix {prefix} is ambiguous ({} events match)",
            extra + 1
        ));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("n", &known), Some("next"));
        assert_eq!(expand_command_abbrev("hol", &known), Some("holidays"));
        assert_eq!(expand_command_abbrev("h", &known), None);
        assert_eq!(expand_command_abbrev("a", &known), None);
        assert_eq!(expand_command_abbrev("today", &known), Some("today"));
    }

    #[test]
    fn add_arguments_split_into_title_and_modifiers() {
        let today = day(2024, 5, 1);
        let new = parse_new_event(
            &args(&["May", "payroll", "date:2024-05-10", "type:payroll", "desc:all staff", "Meeting:10am"]),
            today,
        )
        .expect("parse");

        assert_eq!(new.title, "May payroll Meeting:10am");
        assert_eq!(new.date, day(2024, 5, 10));
        assert_eq!(new.kind, EventType::Payroll);
        assert_eq!(new.description.as_deref(), Some("all staff"));
        assert_eq!(new.memo, None);
    }

    #[test]
    fn literal_marker_stops_modifier_parsing() {
        let new = parse_new_event(&args(&["--", "type:coffee"]), day(2024, 5, 1)).expect("parse");
        assert_eq!(new.title, "type:coffee");
        assert_eq!(new.date, day(2024, 5, 1));
        assert_eq!(new.kind, EventType::Other);
    }

    #[test]
    fn bad_modifier_values_are_errors() {
        assert!(parse_new_event(&args(&["x", "type:party"]), day(2024, 5, 1)).is_err());
        assert!(parse_new_event(&args(&["x", "date:someday"]), day(2024, 5, 1)).is_err());
        assert_eq!(
            parse_one_mod("view:w", day(2024, 5, 1)).expect("mod"),
            Some(Mod::View(ViewMode::Week))
        );
    }

    #[test]
    fn id_prefix_resolution() {
        let now = Utc::now();
        let events: Vec<Event> = ["A", "B", "C"]
            .into_iter()
            .map(|title| Event::from_new(NewEvent::new(title, day(2024, 5, 10), EventType::Other), now))
            .collect();

        let target = &events[1];
        let full = target.id.to_string();
        assert_eq!(resolve_id_prefix(&events, &full).expect("full id").id, target.id);

        // A full simple-form id is unique by construction.
        let simple = target.id.simple().to_string();
        assert_eq!(resolve_id_prefix(&events, &simple).expect("simple id").title, "B");

        assert!(resolve_id_prefix(&events, "").is_err());
        assert!(resolve_id_prefix(&events, "zzzz").is_err());
    }
}
