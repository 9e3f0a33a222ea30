//! Typed representation of one submitted job line.

use std::fmt;
use std::path::{Path, PathBuf};

/// One accepted submission. `original_command` is the line exactly as the
/// client sent it and doubles as the key for `cancel <command>`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub original_command: String,
    pub kind: JobKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    Calcsfh(CalcsfhJob),
    /// Synthetic test job that just sleeps.
    Sleep(SleepJob),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SleepJob {
    /// Seconds as written by the client (passed verbatim to `sleep`).
    pub seconds: String,
}

/// Positional fields and recognized flags of a `calcsfh` line.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcsfhJob {
    pub parameter_file: String,
    pub photometry_file: String,
    pub fake_file: String,
    pub fit_name: String,
    /// Target of the trailing `> file` redirect, if any.
    pub output_file: Option<String>,
    pub flags: JobFlags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFlags {
    pub dav: Option<f64>,
    pub mcdata: bool,
    pub ssp: bool,
    pub skip: bool,
    pub group: Option<String>,
    /// Flag tokens forwarded to calcsfh in submission order: everything
    /// except the server-side `-group=` and `-skip`.
    pub passthrough: Vec<String>,
}

impl JobDescriptor {
    pub fn group_tag(&self) -> Option<&str> {
        match &self.kind {
            JobKind::Calcsfh(job) => job.flags.group.as_deref(),
            JobKind::Sleep(_) => None,
        }
    }

    pub fn as_calcsfh(&self) -> Option<&CalcsfhJob> {
        match &self.kind {
            JobKind::Calcsfh(job) => Some(job),
            JobKind::Sleep(_) => None,
        }
    }
}

impl fmt::Display for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original_command)
    }
}

impl CalcsfhJob {
    /// Directory of the parameter file. Every stage runs here.
    pub fn working_directory(&self) -> PathBuf {
        match Path::new(&self.parameter_file).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Resolve a file argument to `<working_directory>/<basename>`, where the
    /// combine and post-processing stages look for calcsfh's products.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.working_directory().join(base_name(name))
    }

    /// Basename of the fit; stage outputs are derived from it.
    pub fn fit_base(&self) -> &str {
        base_name(&self.fit_name)
    }

    pub fn fit_path(&self) -> PathBuf {
        self.resolve(&self.fit_name)
    }

    /// `<fit>.<ext>` next to the fit file.
    pub fn fit_sibling(&self, ext: &str) -> PathBuf {
        self.working_directory()
            .join(format!("{}.{}", self.fit_base(), ext))
    }

    /// CMD file that calcsfh writes for the fit.
    pub fn cmd_file(&self) -> PathBuf {
        self.fit_sibling("cmd")
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_file.as_deref().map(|o| self.resolve(o))
    }

    pub fn parameter_path(&self) -> PathBuf {
        self.resolve(&self.parameter_file)
    }

    pub fn photometry_path(&self) -> PathBuf {
        self.resolve(&self.photometry_file)
    }

    pub fn fake_path(&self) -> PathBuf {
        self.resolve(&self.fake_file)
    }
}

/// Last `/`-separated component of a path-like argument.
pub fn base_name(arg: &str) -> &str {
    arg.rsplit('/').next().unwrap_or(arg)
}

/// Directory-free form of a calcsfh line, as recorded in the run log: the four
/// positional file arguments and the redirect target lose their directories.
pub fn strip_directories(line: &str) -> String {
    let mut tokens: Vec<&str> = line.split_whitespace().collect();
    for token in tokens.iter_mut().take(5).skip(1) {
        *token = base_name(token);
    }
    let n = tokens.len();
    if n >= 2 && tokens[n - 2] == ">" {
        tokens[n - 1] = base_name(tokens[n - 1]);
    }
    tokens.join(" ")
}
