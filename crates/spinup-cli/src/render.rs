use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() {
        return OutputStyle::Plain;
    }
    if std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {}", badge(status), message),
    }
}

pub fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
