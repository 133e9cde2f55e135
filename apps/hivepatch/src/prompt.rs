//! # Operator Confirmation
//!
//! Nothing is written to a store before an operator says yes.
//!
//! The prompt repeats until the answer is understood. End of input counts as
//! "no", so a closed stdin never turns into consent.

use hivepatch_core::HivepatchError;
use std::io::{BufRead, Write};

/// Interpret one answer line.
///
/// Leading and trailing whitespace is ignored, case is not significant.
/// Returns `None` for anything other than yes/y/no/n.
#[must_use]
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

/// Ask `question` until a yes or no arrives on `input`.
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> Result<bool, HivepatchError> {
    let io = |e: std::io::Error| HivepatchError::Aborted(format!("Prompt failed: {}", e));

    loop {
        write!(output, "{} (yes/no): ", question).map_err(io)?;
        output.flush().map_err(io)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io)? == 0 {
            writeln!(output).map_err(io)?;
            return Ok(false);
        }

        match parse_answer(&line) {
            Some(answer) => return Ok(answer),
            None => writeln!(
                output,
                "Can't understand answer '{}', please answer 'yes' or 'no'.",
                line.trim()
            )
            .map_err(io)?,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
