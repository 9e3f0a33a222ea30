//! Staged execution of one job: what to run ([`PipelinePlan`]) and the
//! polling runner that drives it.

mod cleanup;
mod run_log;
mod runner;

use std::path::PathBuf;

use matchd_core::config::MatchConfig;
use matchd_core::{strip_directories, CalcsfhJob, JobDescriptor, JobKind};
use tracing::warn;

pub use cleanup::remove_partial_outputs;
pub use run_log::{append_run_log, RunLogEntry, RUN_LOG_FILE};
pub use runner::run_pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Primary,
    Combine,
    PostProcess,
    Sleep,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Primary => "primary",
            StageKind::Combine => "combine",
            StageKind::PostProcess => "post-process",
            StageKind::Sleep => "sleep",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineTool {
    Zcombine,
    Sspcombine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScript {
    Default,
    Hybrid,
    Ssp,
}

impl CombineTool {
    pub fn for_job(job: &CalcsfhJob) -> Self {
        if job.flags.ssp { CombineTool::Sspcombine } else { CombineTool::Zcombine }
    }

    /// Extension of the combined result next to the fit.
    pub fn output_ext(&self) -> &'static str {
        match self {
            CombineTool::Zcombine => "zc",
            CombineTool::Sspcombine => "ssp",
        }
    }
}

impl PostScript {
    /// `-ssp` takes precedence over `-mcdata`.
    pub fn for_job(job: &CalcsfhJob) -> Self {
        if job.flags.ssp {
            PostScript::Ssp
        } else if job.flags.mcdata {
            PostScript::Hybrid
        } else {
            PostScript::Default
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            PostScript::Default => "calcsfh_script.sh",
            PostScript::Hybrid => "hybridMC_script.sh",
            PostScript::Ssp => "ssp_script.sh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub kind: StageKind,
    pub command: String,
    pub cwd: PathBuf,
}

/// Everything a runner needs to execute one job, computed up front.
#[derive(Debug, Clone, Default)]
pub struct PipelinePlan {
    pub stages: Vec<Stage>,
    /// Files removed when the job is canceled.
    pub cleanup: Vec<PathBuf>,
    /// Appended after every stage succeeded.
    pub run_log: Option<RunLogEntry>,
}

impl PipelinePlan {
    pub fn for_job(descriptor: &JobDescriptor, matching: &MatchConfig) -> Self {
        match &descriptor.kind {
            JobKind::Sleep(sleep) => Self {
                stages: vec![Stage {
                    kind: StageKind::Sleep,
                    command: format!("sleep {}", sleep.seconds),
                    cwd: PathBuf::from("."),
                }],
                ..Self::default()
            },
            JobKind::Calcsfh(job) => Self::for_calcsfh(&descriptor.original_command, job, matching),
        }
    }

    fn for_calcsfh(original: &str, job: &CalcsfhJob, matching: &MatchConfig) -> Self {
        let cwd = job.working_directory();
        let fit = job.fit_path();
        let output = job.output_path();
        let combine = CombineTool::for_job(job);
        let combined = job.fit_sibling(combine.output_ext());
        let mut stages = Vec::new();

        if job.flags.skip {
            tracing::debug!(command = original, "skipping primary stage");
        } else {
            // Client paths go through untouched; they are relative to `cwd`.
            let mut cmd = format!(
                "{} {} {} {} {}",
                matching.tool("calcsfh"),
                job.parameter_file,
                job.photometry_file,
                job.fake_file,
                job.fit_name,
            );
            for flag in &job.flags.passthrough {
                cmd.push(' ');
                cmd.push_str(flag);
            }
            if let Some(out) = &job.output_file {
                cmd.push_str(" > ");
                cmd.push_str(out);
            }
            stages.push(Stage { kind: StageKind::Primary, command: cmd, cwd: cwd.clone() });
        }

        let combine_cmd = match (combine, &output) {
            (CombineTool::Zcombine, _) => Some(format!(
                "{} -bestonly {} > {}",
                matching.tool("zcombine"),
                fit.display(),
                combined.display()
            )),
            (CombineTool::Sspcombine, Some(out)) => {
                let stripped = job.fit_sibling("so");
                Some(format!(
                    "tail -n +11 {} > {}; {} {} > {}",
                    out.display(),
                    stripped.display(),
                    matching.tool("sspcombine"),
                    stripped.display(),
                    combined.display()
                ))
            }
            (CombineTool::Sspcombine, None) => {
                warn!(command = original, "sspcombine needs the calcsfh output; skipping combine");
                None
            }
        };
        if let Some(command) = combine_cmd {
            stages.push(Stage { kind: StageKind::Combine, command, cwd: cwd.clone() });
        }

        match &output {
            Some(out) => {
                let script = PostScript::for_job(job);
                let mut cmd = format!(
                    "{} {} {} {} {} {} {} {}",
                    matching.script(script.file_name()).display(),
                    job.parameter_path().display(),
                    job.photometry_path().display(),
                    job.fake_path().display(),
                    fit.display(),
                    out.display(),
                    combined.display(),
                    job.cmd_file().display(),
                );
                if script == PostScript::Hybrid {
                    cmd.push_str(&format!(" {}", job.fit_sibling("dat").display()));
                }
                stages.push(Stage { kind: StageKind::PostProcess, command: cmd, cwd: cwd.clone() });
            }
            None => warn!(command = original, "no output redirect; skipping post-processing"),
        }

        let mut cleanup = vec![fit.clone()];
        cleanup.extend(output.clone());
        cleanup.push(combined);
        if combine == CombineTool::Sspcombine {
            cleanup.push(job.fit_sibling("so"));
        }
        cleanup.push(job.cmd_file());

        Self {
            stages,
            cleanup,
            run_log: Some(RunLogEntry {
                log_path: cwd.join(RUN_LOG_FILE),
                parameter_file: job.parameter_path(),
                summary: strip_directories(original),
            }),
        }
    }

    /// Stage command strings in execution order.
    pub fn stage_commands(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.command.clone()).collect()
    }
}
