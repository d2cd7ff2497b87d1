//! Thin command-line front end over the document session.
//!
//! # Responsibility
//! - Drive document lifecycle commands from stdin lines.
//! - Map the core error taxonomy 1:1 onto process exit codes.
//!
//! Commands: child, set-int, get-int, forget, open, commit, abort, undo,
//! redo, touch, recompute, save, load, quit.

use std::io::{self, BufRead};
use std::process::ExitCode;
use taproot_core::{
    core_version, DocumentSession, Entry, ErrorClass, IntegerAttribute, SessionError,
};

enum CliError {
    /// Input line could not be parsed into a command.
    Usage(String),
    /// Core rejected the command.
    Session(SessionError),
}

impl From<SessionError> for CliError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

fn exit_code_for(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::NotFound => 2,
        ErrorClass::Domain => 3,
        ErrorClass::Cycle => 4,
        ErrorClass::Corruption => 9,
    }
}

fn report(err: CliError) -> ExitCode {
    match err {
        CliError::Usage(detail) => {
            eprintln!("error: {detail}");
            ExitCode::from(exit_code_for(ErrorClass::Domain))
        }
        CliError::Session(err) => {
            eprintln!("error: {err}");
            if err.class() == ErrorClass::Corruption {
                eprintln!("warning: the document may be corrupted; reload it from its last save");
            }
            ExitCode::from(exit_code_for(err.class()))
        }
    }
}

fn parse_entry(raw: &str) -> Result<Entry, CliError> {
    raw.parse().map_err(|err| CliError::Usage(format!("{err}")))
}

fn parse_int(raw: &str, what: &str) -> Result<i64, CliError> {
    raw.parse()
        .map_err(|_| CliError::Usage(format!("{what} must be an integer, got `{raw}`")))
}

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("TAPROOT_LOG_DIR") {
        if let Err(err) = taproot_core::init_logging(taproot_core::default_log_level(), &log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    println!("taproot {}", core_version());
    let mut session = DocumentSession::new();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => return report(CliError::Usage(format!("stdin: {err}"))),
        };
        match run_command(&mut session, &line) {
            Ok(Command::Continue) => {}
            Ok(Command::Quit) => break,
            Err(err) => return report(err),
        }
    }
    ExitCode::SUCCESS
}

enum Command {
    Continue,
    Quit,
}

fn run_command(session: &mut DocumentSession, line: &str) -> Result<Command, CliError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [] => {}
        ["quit"] => return Ok(Command::Quit),
        ["child", parent, tag] => {
            let parent = parse_entry(parent)?;
            let tag = u32::try_from(parse_int(tag, "tag")?)
                .map_err(|_| CliError::Usage(format!("tag out of range: {tag}")))?;
            let document = session.document_mut();
            let parent = document.label_at(&parent).map_err(SessionError::from)?;
            let child = document
                .find_child(parent, tag, true)
                .map_err(SessionError::from)?;
            println!("created {}", document.entry(child).map_err(SessionError::from)?);
        }
        ["set-int", entry, value] => {
            let entry = parse_entry(entry)?;
            let value = parse_int(value, "value")?;
            let document = session.document_mut();
            let label = document.label_at(&entry).map_err(SessionError::from)?;
            IntegerAttribute::set(document, label, value).map_err(SessionError::from)?;
        }
        ["get-int", entry] => {
            let entry = parse_entry(entry)?;
            let document = session.document();
            let label = document.label_at(&entry).map_err(SessionError::from)?;
            let attribute = document
                .find_attribute::<IntegerAttribute>(label)
                .map_err(SessionError::from)?;
            println!("{} = {}", entry, attribute.value);
        }
        ["forget", entry] => {
            let entry = parse_entry(entry)?;
            let document = session.document_mut();
            let label = document.label_at(&entry).map_err(SessionError::from)?;
            document.forget_all(label).map_err(SessionError::from)?;
        }
        ["open"] => {
            session.open_transaction()?;
        }
        ["commit"] => {
            session.commit_transaction()?;
        }
        ["abort"] => session.abort_transaction()?,
        ["undo"] => session.undo()?,
        ["redo"] => session.redo()?,
        ["touch", entry] => {
            let entry = parse_entry(entry)?;
            let document = session.document_mut();
            let label = document.label_at(&entry).map_err(SessionError::from)?;
            document.logbook_mut().set_touched(label);
        }
        ["recompute"] => {
            let outcome = session.recompute()?;
            println!("recomputed {} functions", outcome.executed.len());
        }
        ["save", path] => session.save(path)?,
        ["load", path] => session.load(path)?,
        other => {
            return Err(CliError::Usage(format!(
                "unknown command: {}",
                other.join(" ")
            )))
        }
    }
    Ok(Command::Continue)
}
