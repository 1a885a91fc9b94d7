//! Confirmation prompts for destructive operations (restoring game files).

use anyhow::Result;

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Reads one answer line from `input` after printing `prompt` to `output`.
/// Anything other than `y`/`yes` (case-insensitive) counts as a refusal, including EOF.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(false);
    }

    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        confirm_with_io(prompt, &mut stdin_lock, &mut stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::confirm_with_io;
    use anyhow::Result;
    use std::io::Cursor;

    fn answer(input: &str) -> Result<(bool, String)> {
        let mut input = Cursor::new(input.as_bytes().to_vec());
        let mut output = Vec::new();
        let ok = confirm_with_io("Restore original game files?", &mut input, &mut output)?;
        Ok((ok, String::from_utf8(output)?))
    }

    #[test]
    fn accepts_yes_variants() -> Result<()> {
        for case in ["y\n", "Y\n", "yes\n", " YES \n"] {
            let (ok, _) = answer(case)?;
            assert!(ok, "expected {:?} to confirm", case);
        }
        Ok(())
    }

    #[test]
    fn refuses_everything_else() -> Result<()> {
        for case in ["n\n", "\n", "sure\n", ""] {
            let (ok, _) = answer(case)?;
            assert!(!ok, "expected {:?} to refuse", case);
        }
        Ok(())
    }

    #[test]
    fn prompt_is_written_before_reading() -> Result<()> {
        let (_, out) = answer("n\n")?;
        assert_eq!(out, "Restore original game files? [y/N] ");
        Ok(())
    }
}
