//! Parse client lines into [`Command`]s.
//!
//! Grammar (space separated):
//! - `calcsfh <param> <phot> <fake> <fit> [flags...] [> output]`
//! - `cancel all` | `cancel <original command>`
//! - `show` | `show queue` | `show threads`
//! - `sleep <seconds>`

use crate::descriptor::{CalcsfhJob, JobDescriptor, JobFlags, JobKind, SleepJob};
use crate::error::CommandError;
use crate::sweep::{DavRange, Sweep};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A single job subject to admission control.
    Submit(JobDescriptor),
    /// A `-dAvrange=` request to expand into queued single-value jobs.
    Sweep(SweepRequest),
    CancelAll,
    /// Cancel the job whose original command equals this text.
    Cancel(String),
    Show(ShowScope),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowScope {
    All,
    Queue,
    Threads,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub original_command: String,
    pub range: DavRange,
}

impl SweepRequest {
    /// The lazy sequence of single-value command lines.
    pub fn expand(&self) -> Result<Sweep, CommandError> {
        Sweep::new(&self.original_command, self.range)
    }
}

/// Parse one line. Leading/trailing whitespace (including `\r`) is ignored.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&keyword) = tokens.first() else {
        return Err(CommandError::Empty);
    };

    match keyword {
        "calcsfh" => parse_calcsfh(line, &tokens),
        "sleep" => parse_sleep(line, &tokens),
        "cancel" => parse_cancel(line, &tokens),
        "show" => parse_show(&tokens),
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

fn parse_sleep(line: &str, tokens: &[&str]) -> Result<Command, CommandError> {
    let [_, seconds] = tokens else {
        return Err(CommandError::MalformedCommand("usage: sleep <seconds>".into()));
    };
    match seconds.parse::<f64>() {
        Ok(s) if s.is_finite() && s >= 0.0 => Ok(Command::Submit(JobDescriptor {
            original_command: line.to_string(),
            kind: JobKind::Sleep(SleepJob {
                seconds: seconds.to_string(),
            }),
        })),
        _ => Err(CommandError::InvalidNumber {
            field: "sleep seconds",
            value: seconds.to_string(),
        }),
    }
}

fn parse_cancel(line: &str, tokens: &[&str]) -> Result<Command, CommandError> {
    match tokens {
        [_] => Err(CommandError::MalformedCommand(
            "usage: cancel all | cancel <command>".into(),
        )),
        [_, "all"] => Ok(Command::CancelAll),
        _ => {
            let target = line["cancel".len()..].trim_start();
            Ok(Command::Cancel(target.to_string()))
        }
    }
}

fn parse_show(tokens: &[&str]) -> Result<Command, CommandError> {
    let scope = match tokens {
        [_] => ShowScope::All,
        [_, "queue"] => ShowScope::Queue,
        [_, "threads"] => ShowScope::Threads,
        _ => {
            return Err(CommandError::MalformedCommand(
                "usage: show [queue|threads]".into(),
            ))
        }
    };
    Ok(Command::Show(scope))
}

fn parse_calcsfh(line: &str, tokens: &[&str]) -> Result<Command, CommandError> {
    if tokens.len() < 5 {
        return Err(CommandError::MalformedCommand(
            "usage: calcsfh <param> <phot> <fake> <fit> [flags...] [> output]".into(),
        ));
    }

    let (flag_tokens, output_file) = match tokens.iter().position(|t| *t == ">") {
        None => (&tokens[5..], None),
        Some(i) if i >= 5 && i == tokens.len() - 2 => (&tokens[5..i], Some(tokens[i + 1].to_string())),
        Some(_) => {
            return Err(CommandError::MalformedCommand(
                "'>' must follow the flags and name exactly one output file".into(),
            ))
        }
    };

    let mut flags = JobFlags::default();
    let mut range: Option<DavRange> = None;

    for &flag in flag_tokens {
        if let Some(raw) = flag.strip_prefix("-dAvrange=") {
            if range.is_some() {
                return Err(CommandError::ConflictingFlags("-dAvrange given twice".into()));
            }
            range = Some(DavRange::parse(raw)?);
        } else if flag.starts_with("-dAvrange") {
            return Err(CommandError::MalformedCommand(
                "expected -dAvrange=<lower>,<upper>,<step>".into(),
            ));
        } else if let Some(value) = flag.strip_prefix("-dAv=") {
            let dav = value.parse::<f64>().map_err(|_| CommandError::InvalidNumber {
                field: "dAv",
                value: value.to_string(),
            })?;
            flags.dav = Some(dav);
            flags.passthrough.push(flag.to_string());
        } else if let Some(name) = flag.strip_prefix("-group=") {
            if name.is_empty() {
                return Err(CommandError::MalformedCommand("-group= needs a name".into()));
            }
            flags.group = Some(name.to_string());
        } else if flag == "-skip" {
            flags.skip = true;
        } else {
            match flag {
                "-mcdata" => flags.mcdata = true,
                "-ssp" => flags.ssp = true,
                _ => {}
            }
            flags.passthrough.push(flag.to_string());
        }
    }

    if range.is_some() && flags.dav.is_some() {
        return Err(CommandError::ConflictingFlags(
            "-dAv and -dAvrange cannot be combined".into(),
        ));
    }
    if flags.ssp && output_file.is_none() {
        return Err(CommandError::MalformedCommand(
            "-ssp needs an output redirect for sspcombine".into(),
        ));
    }

    if let Some(range) = range {
        return Ok(Command::Sweep(SweepRequest {
            original_command: line.to_string(),
            range,
        }));
    }

    Ok(Command::Submit(JobDescriptor {
        original_command: line.to_string(),
        kind: JobKind::Calcsfh(CalcsfhJob {
            parameter_file: tokens[1].to_string(),
            photometry_file: tokens[2].to_string(),
            fake_file: tokens[3].to_string(),
            fit_name: tokens[4].to_string(),
            output_file,
            flags,
        }),
    }))
}
