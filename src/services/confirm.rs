use std::io::{self, BufRead, Write};

pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct AssumeAnswer(pub bool);

impl Confirm for AssumeAnswer {
    fn confirm(&mut self, question: &str) -> bool {
        tracing::debug!(question, answer = self.0, "answered from command line");
        self.0
    }
}

/// Interactive y/n prompt on stderr. Repeats until the answer is y or n; end of input is no.
pub struct Prompt<R> {
    input: R,
}

impl Prompt<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self {
            input: io::stdin().lock(),
        }
    }
}

impl<R: BufRead> Prompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> Confirm for Prompt<R> {
    fn confirm(&mut self, question: &str) -> bool {
        loop {
            eprint!("{question} (y/n): ");
            let _ = io::stderr().flush();
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) => {}
            }
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_repeats_until_clear_answer() {
        let mut p = Prompt::new("maybe\n\nY\n".as_bytes());
        assert!(p.confirm("Modify Weather?"));
        let mut p = Prompt::new("no\n".as_bytes());
        assert!(!p.confirm("Modify Weather?"));
    }

    #[test]
    fn closed_input_declines() {
        let mut p = Prompt::new("".as_bytes());
        assert!(!p.confirm("Reset?"));
    }
}
