//! Interactive command menu.

use anyhow::Result;
use roomdet_core::Prompt;
use std::io::{self, BufRead, Write};

const WELCOME_MESSAGE: &str = ">>> Roommate Detector <<<\n";
const OPTIONS_MESSAGE: &str = "Type the number of what option you would like to run:\n\n\
     \t1. Add / Edit a Dataset\n\
     \t2. Train the Roommate Detecting Model\n\
     \t3. Run Roommate Detector\n\
     \tOr type \"exit\" to exit the application\n> ";
const NOT_RECOGNIZED_MESSAGE: &str = "Option not recognized, please type in the number of the option you want.\n";

/// The workflows the menu can launch.
pub trait MenuActions<R, W> {
    fn add_dataset(&mut self, prompt: &mut Prompt<R, W>) -> Result<()>;
    fn train_model(&mut self, prompt: &mut Prompt<R, W>) -> Result<()>;
    fn run_detector(&mut self, prompt: &mut Prompt<R, W>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    AddDataset,
    Train,
    Detect,
    Exit,
}

/// Exact match, ignoring case only. The line ending is already stripped.
fn parse_choice(input: &str) -> Option<MenuChoice> {
    match input.to_lowercase().as_str() {
        "1" => Some(MenuChoice::AddDataset),
        "2" => Some(MenuChoice::Train),
        "3" => Some(MenuChoice::Detect),
        "exit" => Some(MenuChoice::Exit),
        _ => None,
    }
}

/// Run the menu until `exit` or end of input.
///
/// A failing workflow is reported and the menu is shown again.
pub fn run_menu<R, W, A>(prompt: &mut Prompt<R, W>, actions: &mut A) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    A: MenuActions<R, W> + ?Sized,
{
    prompt.say(WELCOME_MESSAGE)?;

    loop {
        let Some(line) = prompt.ask(OPTIONS_MESSAGE)? else {
            tracing::debug!("input closed, leaving menu");
            return Ok(());
        };

        let result = match parse_choice(&line) {
            Some(MenuChoice::AddDataset) => actions.add_dataset(prompt),
            Some(MenuChoice::Train) => actions.train_model(prompt),
            Some(MenuChoice::Detect) => actions.run_detector(prompt),
            Some(MenuChoice::Exit) => return Ok(()),
            None => {
                prompt.say(NOT_RECOGNIZED_MESSAGE)?;
                continue;
            }
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "workflow failed");
            prompt.say(&format!("Error: {e:#}\n"))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        fail_train: bool,
    }

    impl<R: BufRead, W: Write> MenuActions<R, W> for Recorder {
        fn add_dataset(&mut self, _prompt: &mut Prompt<R, W>) -> Result<()> {
            self.calls.push("dataset");
            Ok(())
        }

        fn train_model(&mut self, _prompt: &mut Prompt<R, W>) -> Result<()> {
            self.calls.push("train");
            if self.fail_train {
                anyhow::bail!("dataset_dir missing");
            }
            Ok(())
        }

        fn run_detector(&mut self, _prompt: &mut Prompt<R, W>) -> Result<()> {
            self.calls.push("detect");
            Ok(())
        }
    }

    fn run(input: &str, actions: &mut Recorder) -> String {
        let mut prompt = Prompt::new(Cursor::new(input.to_string()), Vec::new());
        run_menu(&mut prompt, actions).unwrap();
        String::from_utf8(prompt.into_output()).unwrap()
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("1"), Some(MenuChoice::AddDataset));
        assert_eq!(parse_choice("EXIT"), Some(MenuChoice::Exit));
        assert_eq!(parse_choice("eXiT"), Some(MenuChoice::Exit));
        assert_eq!(parse_choice(" 1 "), None);
        assert_eq!(parse_choice("exit\t"), None);
        assert_eq!(parse_choice("4"), None);
        assert_eq!(parse_choice(""), None);
    }

    #[test]
    fn test_dispatch_in_order_then_exit() {
        let mut actions = Recorder::default();
        let out = run("1\n2\n3\nexit\n1\n", &mut actions);
        assert_eq!(actions.calls, vec!["dataset", "train", "detect"]);
        assert!(out.starts_with(WELCOME_MESSAGE));
    }

    #[test]
    fn test_unrecognized_reprompts() {
        let mut actions = Recorder::default();
        let out = run("hello\n\n 2\n3\nexit\n", &mut actions);
        assert_eq!(actions.calls, vec!["detect"]);
        assert_eq!(out.matches("Option not recognized").count(), 3);
    }

    #[test]
    fn test_error_returns_to_menu() {
        let mut actions = Recorder {
            fail_train: true,
            ..Recorder::default()
        };
        let out = run("2\n1\nexit\n", &mut actions);
        assert_eq!(actions.calls, vec!["train", "dataset"]);
        assert!(out.contains("Error: dataset_dir missing"));
    }

    #[test]
    fn test_eof_exits() {
        let mut actions = Recorder::default();
        run("1\n", &mut actions);
        assert_eq!(actions.calls, vec!["dataset"]);
    }
}
