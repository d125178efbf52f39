use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Asks `question` on stdout and reads one answer line from stdin.
///
/// Only `y` / `yes` confirm. Anything else, including EOF, counts as a
/// dismissal.
pub async fn ask(question: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || -> Result<bool> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{} [y/N] ", question)?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    })
    .await
    .context("Prompt task failed")?
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }
}
