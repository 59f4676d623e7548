//! Used to color diagnostics when stderr is a terminal.
use nu_ansi_term::{Color, Style};
use std::io::IsTerminal;

pub trait Styling {
    fn warn(self) -> String;
}

impl Styling for &str {
    fn warn(self) -> String {
        style(self, Color::Red.bold())
    }
}

fn style(text: &str, style: Style) -> String {
    if std::io::stderr().is_terminal() {
        style.paint(text).to_string()
    } else {
        text.to_string()
    }
}
