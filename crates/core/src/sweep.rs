//! Parameter-sweep expansion for `-dAvrange=lower,upper,step` submissions.
//!
//! One request becomes a finite, deterministic sequence of single-value
//! `calcsfh` lines. Each line gets its own `-dAv=` flag and fit/output names
//! suffixed with the value, so the runs never overwrite each other.

use crate::error::CommandError;

/// Upper bound on the number of commands one sweep may generate.
pub const MAX_SWEEP_VALUES: usize = 10_000;

/// Absorbs float error in `(upper - lower) / step` so that e.g. `0.3 / 0.1`
/// yields four values, not three.
const COUNT_TOLERANCE: f64 = 1e-9;

/// Index of the fit-name argument in a `calcsfh` line.
const FIT_INDEX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DavRange {
    pub lower: f64,
    pub upper: f64,
    pub step: f64,
}

impl DavRange {
    pub fn new(lower: f64, upper: f64, step: f64) -> Result<Self, CommandError> {
        if !(lower.is_finite() && upper.is_finite() && step.is_finite()) {
            return Err(CommandError::InvalidRange("bounds must be finite".into()));
        }
        if step <= 0.0 {
            return Err(CommandError::InvalidRange(format!("step must be positive, got {step}")));
        }
        if upper < lower {
            return Err(CommandError::InvalidRange(format!(
                "upper bound {upper} is below lower bound {lower}"
            )));
        }
        let range = Self { lower, upper, step };
        // Checked as a float so a huge span never reaches the integer cast.
        let steps = range.steps();
        if !steps.is_finite() || steps >= MAX_SWEEP_VALUES as f64 {
            return Err(CommandError::InvalidRange(format!(
                "range {lower}..{upper} by {step} exceeds the limit of {MAX_SWEEP_VALUES} values"
            )));
        }
        Ok(range)
    }

    fn steps(&self) -> f64 {
        ((self.upper - self.lower) / self.step + COUNT_TOLERANCE).floor()
    }

    /// Parse the `lower,upper,step` part of `-dAvrange=`.
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let parts: Vec<&str> = raw.split(',').collect();
        if parts.len() != 3 {
            return Err(CommandError::InvalidRange(format!(
                "expected lower,upper,step but got '{raw}'"
            )));
        }
        let num = |field: &'static str, text: &str| {
            text.trim().parse::<f64>().map_err(|_| CommandError::InvalidNumber {
                field,
                value: text.to_string(),
            })
        };
        Self::new(num("dAv lower", parts[0])?, num("dAv upper", parts[1])?, num("dAv step", parts[2])?)
    }

    /// `floor((upper - lower) / step) + 1`
    pub fn count(&self) -> usize {
        (self.steps() as usize).saturating_add(1)
    }

    pub fn value(&self, index: usize) -> f64 {
        self.lower + index as f64 * self.step
    }
}

/// Lazy expansion of one sweep request. A clone resumes from the same
/// position; [`Sweep::new`] always starts again at the first value.
#[derive(Debug, Clone)]
pub struct Sweep {
    tokens: Vec<String>,
    range_index: usize,
    output_index: Option<usize>,
    range: DavRange,
    next: usize,
    count: usize,
}

impl Sweep {
    /// Prepare the expansion of `base_command`, which must carry exactly one
    /// `-dAvrange=` token after the four positional arguments.
    pub fn new(base_command: &str, range: DavRange) -> Result<Self, CommandError> {
        let tokens: Vec<String> = base_command.split_whitespace().map(str::to_string).collect();
        if tokens.len() <= FIT_INDEX {
            return Err(CommandError::MalformedCommand(
                "sweep needs <param> <phot> <fake> <fit>".into(),
            ));
        }
        let range_index = tokens
            .iter()
            .position(|t| t.starts_with("-dAvrange"))
            .filter(|&i| i > FIT_INDEX)
            .ok_or_else(|| CommandError::MalformedCommand("no -dAvrange flag to expand".into()))?;
        let n = tokens.len();
        let output_index = (n >= 2 && tokens[n - 2] == ">").then_some(n - 1);

        Ok(Self {
            tokens,
            range_index,
            output_index,
            range,
            next: 0,
            count: range.count(),
        })
    }

    /// Validate the bounds and prepare the expansion in one step.
    pub fn expand(base_command: &str, lower: f64, upper: f64, step: f64) -> Result<Self, CommandError> {
        Self::new(base_command, DavRange::new(lower, upper, step)?)
    }

    fn line_for(&self, value: f64) -> String {
        let suffix = format!("_dAv_{value:.2}").replace('.', "-");
        let mut tokens = self.tokens.clone();
        tokens[self.range_index] = format!("-dAv={value:.3}");
        tokens[FIT_INDEX] = append_to_basename(&tokens[FIT_INDEX], &suffix);
        if let Some(i) = self.output_index {
            tokens[i] = insert_before_extension(&tokens[i], &suffix);
        }
        tokens.join(" ")
    }
}

impl Iterator for Sweep {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.count {
            return None;
        }
        let line = self.line_for(self.range.value(self.next));
        self.next += 1;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Sweep {}

fn split_dir(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    }
}

fn append_to_basename(path: &str, suffix: &str) -> String {
    let (dir, name) = split_dir(path);
    format!("{dir}{name}{suffix}")
}

fn insert_before_extension(path: &str, suffix: &str) -> String {
    let (dir, name) = split_dir(path);
    match name.find('.') {
        Some(i) => format!("{dir}{}{suffix}{}", &name[..i], &name[i..]),
        None => format!("{dir}{name}{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str =
        "calcsfh /d/param /d/phot /d/fake /d/fits/m83 -full -dAvrange=0.0,1.0,0.2 > /d/out/m83.out";

    #[test]
    fn six_values_for_zero_to_one_by_point_two() {
        let lines: Vec<String> = Sweep::expand(BASE, 0.0, 1.0, 0.2).unwrap().collect();
        assert_eq!(lines.len(), 6);
        let davs: Vec<&str> = lines
            .iter()
            .map(|l| l.split_whitespace().find(|t| t.starts_with("-dAv=")).unwrap())
            .collect();
        assert_eq!(
            davs,
            ["-dAv=0.000", "-dAv=0.200", "-dAv=0.400", "-dAv=0.600", "-dAv=0.800", "-dAv=1.000"]
        );
        assert_eq!(
            lines[3],
            "calcsfh /d/param /d/phot /d/fake /d/fits/m83_dAv_0-60 -full -dAv=0.600 > /d/out/m83_dAv_0-60.out"
        );
    }

    #[test]
    fn derived_names_are_distinct() {
        let lines: Vec<String> = Sweep::expand(BASE, 0.0, 1.0, 0.2).unwrap().collect();
        let fits: std::collections::HashSet<&str> =
            lines.iter().map(|l| l.split_whitespace().nth(4).unwrap()).collect();
        let outs: std::collections::HashSet<&str> =
            lines.iter().map(|l| l.split_whitespace().last().unwrap()).collect();
        assert_eq!(fits.len(), 6);
        assert_eq!(outs.len(), 6);
        assert!(lines.iter().all(|l| !l.contains("-dAvrange")));
    }

    #[test]
    fn expansion_is_repeatable() {
        let a: Vec<String> = Sweep::expand(BASE, 0.0, 1.0, 0.2).unwrap().collect();
        let b: Vec<String> = Sweep::expand(BASE, 0.0, 1.0, 0.2).unwrap().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn clone_continues_from_same_position() {
        let mut sweep = Sweep::expand(BASE, 0.0, 1.0, 0.2).unwrap();
        sweep.next();
        let rest: Vec<String> = sweep.clone().collect();
        assert_eq!(rest.len(), 5);
        assert_eq!(sweep.len(), 5);
        assert_eq!(rest, sweep.collect::<Vec<_>>());
    }

    #[test]
    fn count_tolerates_float_error() {
        assert_eq!(DavRange::new(0.0, 0.3, 0.1).unwrap().count(), 4);
        assert_eq!(DavRange::new(0.5, 0.5, 0.1).unwrap().count(), 1);
        assert_eq!(DavRange::new(0.0, 1.0, 0.3).unwrap().count(), 4);
    }

    #[test]
    fn without_redirect_only_fit_is_renamed() {
        let lines: Vec<String> =
            Sweep::expand("calcsfh p ph f fit -dAvrange=0.1,0.2,0.1", 0.1, 0.2, 0.1)
                .unwrap()
                .collect();
        assert_eq!(lines, ["calcsfh p ph f fit_dAv_0-10 -dAv=0.100", "calcsfh p ph f fit_dAv_0-20 -dAv=0.200"]);
    }

    #[test]
    fn output_without_extension_gets_suffix_appended() {
        assert_eq!(insert_before_extension("/x/out", "_s"), "/x/out_s");
        assert_eq!(insert_before_extension("a.b.c", "_s"), "a_s.b.c");
        assert_eq!(append_to_basename("dir/fit", "_s"), "dir/fit_s");
    }

    #[test]
    fn negative_values_keep_their_sign() {
        let lines: Vec<String> =
            Sweep::expand("calcsfh p ph f fit -dAvrange=-0.2,0.0,0.2", -0.2, 0.0, 0.2)
                .unwrap()
                .collect();
        assert_eq!(lines[0], "calcsfh p ph f fit_dAv_-0-20 -dAv=-0.200");
    }

    #[test]
    fn invalid_ranges_rejected() {
        assert!(matches!(DavRange::new(0.0, 1.0, 0.0), Err(CommandError::InvalidRange(_))));
        assert!(matches!(DavRange::new(1.0, 0.0, 0.1), Err(CommandError::InvalidRange(_))));
        assert!(matches!(DavRange::new(0.0, 100.0, 0.001), Err(CommandError::InvalidRange(_))));
        assert!(matches!(DavRange::parse("0.0,1.0"), Err(CommandError::InvalidRange(_))));
        assert!(matches!(DavRange::parse("a,1.0,0.1"), Err(CommandError::InvalidNumber { .. })));
    }

    #[test]
    fn enormous_span_is_rejected_not_overflowed() {
        assert!(matches!(DavRange::parse("-1e308,1e308,1"), Err(CommandError::InvalidRange(_))));
        assert!(matches!(DavRange::new(0.0, 1.0, 1e-300), Err(CommandError::InvalidRange(_))));
        assert!(matches!(DavRange::new(0.0, 10_000.0, 1.0), Err(CommandError::InvalidRange(_))));
        assert_eq!(DavRange::new(0.0, 9_999.0, 1.0).unwrap().count(), MAX_SWEEP_VALUES);
    }

    #[test]
    fn missing_range_token_is_malformed() {
        let err = Sweep::expand("calcsfh p ph f fit -dAv=0.1", 0.0, 1.0, 0.5).unwrap_err();
        assert!(matches!(err, CommandError::MalformedCommand(_)));
    }
}
