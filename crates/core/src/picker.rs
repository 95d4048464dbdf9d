//! Station selection strategies.

use std::io::{self, BufRead, Write};

use crate::{
    error::Result,
    stations::title_case,
    validate::parse_menu_choice,
};

/// Suggestions shown per attempt in the plain picker.
pub const MAX_SUGGESTIONS: usize = 10;

/// Resolves free text to a title-cased station name.
pub trait StationPicker {
    /// Ask with `prompt` and return the chosen station.
    ///
    /// An empty `candidates` list means any text is accepted.
    fn pick(&mut self, prompt: &str, candidates: &[String]) -> Result<String>;
}

/// Candidates containing `typed`, ignoring case, in candidate order.
pub fn suggest<'a>(typed: &str, candidates: &'a [String]) -> Vec<&'a String> {
    let needle = typed.trim().to_lowercase();
    candidates
        .iter()
        .filter(|candidate| candidate.to_lowercase().contains(&needle))
        .collect()
}

/// Line-based picker for terminals without raw-mode support.
pub struct PlainPicker<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PlainPicker<R, W> {
    /// Picker reading answers from `input` and writing prompts to `output`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed").into());
        }
        Ok(line.trim().to_string())
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        Ok(self.ask(question)?.eq_ignore_ascii_case("y"))
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> StationPicker for PlainPicker<R, W> {
    fn pick(&mut self, prompt: &str, candidates: &[String]) -> Result<String> {
        if candidates.is_empty() {
            return Ok(title_case(&self.ask(prompt)?));
        }

        loop {
            let typed = self.ask(prompt)?;
            if typed.is_empty() {
                self.say("Enter at least 1 character to see suggestions.")?;
                continue;
            }
            let typed_title = title_case(&typed);
            let shown: Vec<String> = suggest(&typed, candidates)
                .into_iter()
                .take(MAX_SUGGESTIONS)
                .cloned()
                .collect();

            if shown.is_empty() {
                let question =
                    format!("No suggestions found for '{typed_title}'. Use it anyway? (y/n): ");
                if self.confirm(&question)? {
                    return Ok(typed_title);
                }
                continue;
            }

            self.say("\nSuggestions:")?;
            for (number, station) in shown.iter().enumerate() {
                self.say(&format!("{}. {}", number + 1, station))?;
            }
            let choice =
                self.ask("Choose number (e.g. 1) or press Enter to use typed value: ")?;
            if !choice.is_empty() && choice.chars().all(|ch| ch.is_ascii_digit()) {
                match parse_menu_choice(&choice, shown.len()) {
                    Ok(index) => return Ok(shown[index].clone()),
                    Err(_) => {
                        self.say("Invalid number. Try again.")?;
                        continue;
                    }
                }
            }

            if candidates.contains(&typed_title) {
                return Ok(typed_title);
            }
            let question =
                format!("'{typed_title}' not found in suggestions. Use it anyway? (y/n): ");
            if self.confirm(&question)? {
                return Ok(typed_title);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stations() -> Vec<String> {
        ["Agra", "Delhi", "New Delhi", "Mumbai"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn run(script: &str, candidates: &[String]) -> (Result<String>, String) {
        let mut output = Vec::new();
        let result = {
            let mut picker = PlainPicker::new(Cursor::new(script.to_string()), &mut output);
            picker.pick("Station: ", candidates)
        };
        (result, String::from_utf8_lossy(&output).into_owned())
    }

    #[test]
    fn suggestions_match_substrings_case_insensitively() {
        let all = stations();
        let found = suggest("DEL", &all);
        assert_eq!(found, vec!["Delhi", "New Delhi"]);
    }

    #[test]
    fn numeric_choice_selects_suggestion() {
        let (result, output) = run("del\n2\n", &stations());
        assert_eq!(result.unwrap(), "New Delhi");
        assert!(output.contains("1. Delhi"));
    }

    #[test]
    fn empty_and_out_of_range_input_reprompts() {
        let (result, output) = run("\ndel\n9\ndel\n1\n", &stations());
        assert_eq!(result.unwrap(), "Delhi");
        assert!(output.contains("Enter at least 1 character"));
        assert!(output.contains("Invalid number"));
    }

    #[test]
    fn exact_candidate_is_accepted_without_confirmation() {
        let (result, _) = run("agra\n\n", &stations());
        assert_eq!(result.unwrap(), "Agra");
    }

    #[test]
    fn unknown_text_needs_confirmation() {
        let (result, output) = run("pune\nn\npune\ny\n", &stations());
        assert_eq!(result.unwrap(), "Pune");
        assert!(output.contains("No suggestions found for 'Pune'"));
    }

    #[test]
    fn partial_match_typed_verbatim_needs_confirmation() {
        let (result, _) = run("mum\n\ny\n", &stations());
        assert_eq!(result.unwrap(), "Mum");
    }

    #[test]
    fn empty_candidates_take_free_text() {
        let (result, _) = run("goa junction\n", &[]);
        assert_eq!(result.unwrap(), "Goa Junction");
    }

    #[test]
    fn closed_input_is_an_error() {
        let (result, _) = run("", &stations());
        assert!(result.is_err());
    }
}
