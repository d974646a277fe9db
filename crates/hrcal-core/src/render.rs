use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::config::Config;
use crate::controller::{Notice, NoticeLevel};
use crate::event::Event;
use crate::datetime::weekday_label;
use crate::grid::CalendarCell;
use crate::holiday::Holiday;
use crate::notify::DayNotice;
use crate::range::ViewMode;

const RED: &str = "31";
const DIM: &str = "90";
const TODAY: &str = "7";
const HEADER: &str = "1";

const WEEKDAY_HEADERS: [&str; 7] = ["일", "월", "화", "수", "목", "금", "토"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Grid (month and week) followed by an agenda of the visible period.
    #[tracing::instrument(skip(self, out, cells))]
    pub fn write_calendar<W: Write>(
        &self,
        out: &mut W,
        title: &str,
        mode: ViewMode,
        cells: &[CalendarCell],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(title, HEADER))?;
        writeln!(out)?;

        if mode != ViewMode::Day {
            self.write_grid(out, cells)?;
            writeln!(out)?;
        }

        self.write_agenda(out, cells)
    }

    fn write_grid<W: Write>(&self, out: &mut W, cells: &[CalendarCell]) -> anyhow::Result<()> {
        let header = WEEKDAY_HEADERS
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                // Two-column names line up with the day digits of a cell.
                let padded = format!(" {name}  ");
                if idx == 0 || idx == 6 {
                    self.paint(&padded, RED)
                } else {
                    padded
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{}", header.trim_end())?;

        for week in cells.chunks(7) {
            let line = week
                .iter()
                .map(|cell| self.grid_cell(cell))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }

    /// Five columns: today brackets, the day, then `*` when events exist.
    fn grid_cell(&self, cell: &CalendarCell) -> String {
        let (open, close) = if cell.is_today { ('[', ']') } else { (' ', ' ') };
        let marker = if cell.events.is_empty() { ' ' } else { '*' };
        let text = format!("{open}{:>2}{close}{marker}", cell.date.day());

        let tone = if !cell.in_current_period {
            Some(DIM)
        } else if cell.red_day {
            Some(RED)
        } else {
            None
        };
        match (cell.is_today, tone) {
            (true, Some(tone)) => self.paint(&text, &format!("{TODAY};{tone}")),
            (true, None) => self.paint(&text, TODAY),
            (false, Some(tone)) => self.paint(&text, tone),
            (false, None) => text,
        }
    }

    fn write_agenda<W: Write>(&self, out: &mut W, cells: &[CalendarCell]) -> anyhow::Result<()> {
        let mut rows = Vec::new();
        for cell in cells.iter().filter(|cell| cell.in_current_period) {
            let date = format_day(cell.date);
            if let Some(name) = cell.holiday.as_deref() {
                rows.push(vec![
                    self.paint(&date, RED),
                    self.paint("공휴일", RED),
                    name.to_string(),
                    String::new(),
                ]);
            }
            for event in &cell.events {
                rows.push(vec![
                    date.clone(),
                    self.paint(event.kind.label(), event.kind.color_code()),
                    event_summary(event),
                    short_id(event.id),
                ]);
            }
        }

        if rows.is_empty() {
            writeln!(out, "이 기간에 일정이 없습니다.")?;
            return Ok(());
        }

        let headers = vec![
            "날짜".to_string(),
            "구분".to_string(),
            "제목".to_string(),
            "ID".to_string(),
        ];
        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, out, events))]
    pub fn write_event_table<W: Write>(&self, out: &mut W, events: &[&Event]) -> anyhow::Result<()> {
        if events.is_empty() {
            writeln!(out, "일치하는 일정이 없습니다.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "날짜".to_string(),
            "구분".to_string(),
            "제목".to_string(),
            "설명".to_string(),
            "메모".to_string(),
        ];

        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.paint(&short_id(event.id), "33"),
                    event.date.format("%Y-%m-%d").to_string(),
                    self.paint(event.kind.label(), event.kind.color_code()),
                    event.title.clone(),
                    event.description.clone().unwrap_or_default(),
                    event.memo.clone().unwrap_or_default(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_holidays<W: Write>(
        &self,
        out: &mut W,
        year: i32,
        holidays: &[Holiday],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&format!("{year}년 공휴일"), HEADER))?;
        if holidays.is_empty() {
            writeln!(out, "{year}년 공휴일 자료가 없습니다.")?;
            return Ok(());
        }

        let rows = holidays
            .iter()
            .map(|holiday| {
                vec![
                    self.paint(&format_day(holiday.date), RED),
                    holiday.kind.label().to_string(),
                    holiday.name.clone(),
                ]
            })
            .collect();
        let headers = vec!["날짜".to_string(), "구분".to_string(), "이름".to_string()];
        write_table(out, headers, rows)
    }

    pub fn write_day_notice<W: Write>(&self, out: &mut W, notice: &DayNotice) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&notice.title(), HEADER))?;
        for line in notice.lines() {
            writeln!(out, "  {line}")?;
        }
        Ok(())
    }

    pub fn write_notice<W: Write>(&self, out: &mut W, notice: &Notice) -> anyhow::Result<()> {
        let prefix = match notice.level {
            NoticeLevel::Warning => self.paint("경고:", "33"),
            NoticeLevel::Error => self.paint("오류:", RED),
        };
        writeln!(out, "{prefix} {}", notice.message)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// The first eight hex digits, enough to address an event on the command line.
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string().chars().take(8).collect()
}

fn format_day(date: NaiveDate) -> String {
    format!("{} ({})", date.format("%Y-%m-%d"), weekday_label(date.weekday()))
}

fn event_summary(event: &Event) -> String {
    match event.description.as_deref() {
        Some(description) => format!("{} - {}", event.title, description),
        None => event.title.clone(),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
