//! Terminal operator

use devflow_core::{CoreError, Operator};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Prints banners to stdout and waits for Enter on stdin
#[derive(Debug, Default)]
pub(crate) struct ConsoleOperator;

impl ConsoleOperator {
    fn banner(text: &str) {
        println!();
        println!();
        println!("{}", "#".repeat(text.len()));
        println!("{text}");
    }
}

impl Operator for ConsoleOperator {
    fn confirm(&mut self, banner: &str) -> Result<(), CoreError> {
        Self::banner(banner);
        print!("Press enter...");
        let stdin_error = |source| CoreError::Io {
            path: PathBuf::from("<stdin>"),
            source,
        };
        io::stdout().flush().map_err(stdin_error)?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map_err(stdin_error)?;
        Ok(())
    }

    fn notify(&mut self, message: &str) {
        Self::banner(message);
    }
}

/// Final banner after a workflow run
pub(crate) fn done() {
    println!();
    println!();
    println!("############################");
    println!("        DONE");
    println!("############################");
}
