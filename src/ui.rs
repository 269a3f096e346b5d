use std::fmt::Display;
use std::io::{self, BufRead, Write};

use indicatif::{ProgressBar, ProgressStyle};

use crate::scan::{ProgressSink, ScanProgress};
use crate::selection::{apply_toggle, parse_menu_input, select_all, MenuInput, Selection};

const PROMPT: &str = "Pick a number to toggle it (0 to confirm): ";
const PROGRESS_TEMPLATE: &str = " ⏩ {wide_bar:.cyan/blue} {pos}/{len} {msg}";

/// Prints the options with their selection marks.
pub fn print_menu<T: Display, W: Write>(out: &mut W, options: &[T], selected: &Selection) -> io::Result<()> {
    for (i, option) in options.iter().enumerate() {
        let number = i + 1;
        let checkbox = if selected.contains(&number) { "✅" } else { "❌" };
        writeln!(out, "{} {} {}", number, checkbox, option)?;
    }
    Ok(())
}

/// Lets the operator toggle options until `0` is entered. Everything starts
/// selected. End of input confirms the current selection.
pub fn choose<T, R, W>(title: &str, options: &[T], input: &mut R, out: &mut W) -> io::Result<Selection>
where
    T: Display,
    R: BufRead,
    W: Write,
{
    let mut selected = select_all(options.len());
    writeln!(out, "{}", title)?;
    print_menu(out, options, &selected)?;

    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(selected);
        }

        match parse_menu_input(&line, options.len()) {
            MenuInput::Confirm => return Ok(selected),
            MenuInput::Toggle(choice) => {
                selected = apply_toggle(&selected, choice);
                print_menu(out, options, &selected)?;
            }
            MenuInput::OutOfRange => writeln!(out, "Invalid option, enter a number from the list.")?,
            MenuInput::Invalid => writeln!(out, "Invalid input, enter a number.")?,
        }
    }
}

/// Progress bar over all messages of the selected folders.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(total: u64) -> Self {
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(total).with_style(style);
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("100.00%");
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressSink for ConsoleProgress {
    fn folder_started(&mut self, folder: &str, count: u32) {
        self.bar
            .println(format!("ⓘ Found {} messages in folder: {}", count, folder));
    }

    fn update(&mut self, progress: ScanProgress) {
        self.bar.set_length(progress.total);
        self.bar.set_position(progress.current);
        self.bar.set_message(format!("{:.2}%", progress.percent()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn confirm_keeps_everything_selected() {
        let mut input = Cursor::new("0\n");
        let mut out = Vec::new();
        let selected = choose("Folders:", &["INBOX", "Sent"], &mut input, &mut out).unwrap();
        assert_eq!(selected, select_all(2));
    }

    #[test]
    fn toggles_and_reprompts_on_bad_input() {
        let mut input = Cursor::new("2\nx\n9\n0\n");
        let mut out = Vec::new();
        let selected = choose("Folders:", &["INBOX", "Sent", "Trash"], &mut input, &mut out).unwrap();
        assert_eq!(selected, [1, 3].into_iter().collect());

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("2 ❌ Sent"));
        assert!(printed.contains("Invalid input"));
        assert!(printed.contains("Invalid option"));
    }

    #[test]
    fn end_of_input_confirms() {
        let mut input = Cursor::new("1\n");
        let mut out = Vec::new();
        let selected = choose("Headers:", &["To", "From"], &mut input, &mut out).unwrap();
        assert_eq!(selected, [2].into_iter().collect());
    }
}
