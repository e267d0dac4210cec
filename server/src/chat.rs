use std::io::{BufRead, Write};

use policy_ai::answer::{build_context, AnswerEngine};
use policy_core::error::AppError;
use tracing::error;

fn io_err(e: std::io::Error) -> AppError {
    AppError::new("CHAT_IO_FAILED", "Terminal I/O failed").with_details(e.to_string())
}

/// Interactive question loop. Ends on a line that is exactly `exit` (any case) or at
/// end of input. Blank lines are skipped.
///
/// A failed question prints the error and keeps the loop going.
pub fn run_chat<R: BufRead, W: Write>(
    engine: &AnswerEngine,
    show_context: bool,
    mut input: R,
    mut out: W,
) -> Result<(), AppError> {
    writeln!(out, "\nPolicy assistant ready. Ask questions (type 'exit' to quit)\n").map_err(io_err)?;

    let mut line = String::new();
    loop {
        write!(out, "Question: ").map_err(io_err)?;
        out.flush().map_err(io_err)?;

        line.clear();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            break;
        }
        let question = line.trim_end_matches(['\r', '\n']);
        if question.to_lowercase() == "exit" {
            break;
        }
        if question.trim().is_empty() {
            continue;
        }

        if show_context {
            match engine.retrieve_context(question) {
                Ok(hits) => writeln!(out, "\nContext:\n{}", build_context(&hits)).map_err(io_err)?,
                Err(e) => error!(error = %e, "Failed to retrieve context"),
            }
        }

        match engine.answer(question) {
            Ok(answer) => writeln!(out, "\nAnswer:\n{answer}\n").map_err(io_err)?,
            Err(e) => {
                error!(error = %e, "Failed to answer question");
                writeln!(out, "\nError: {}\n", e.message).map_err(io_err)?;
            }
        }
    }
    Ok(())
}
