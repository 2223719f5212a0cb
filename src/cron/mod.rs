//! Compilation of app cron entries into an `/etc/cron.d` file.
//!
//! Each entry is either a five-field schedule followed by a command, or an
//! `@keyword` followed by a command. Commands run through a login bash that
//! first exports the project's `.env` and changes into the project
//! directory. Bare management commands such as `cleanup` are expanded to run
//! `manage.py` with the project's virtualenv interpreter.


use crate::coerce;
use crate::error::ConfigError;
use crate::paths::ProjectPaths;
use crate::shell;

/// `@` shortcuts understood by cron.
pub const KEYWORDS: &[&str] = &[
    "@reboot",
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

/// Leading words that mark a command as already runnable.
const PASSTHROUGH_COMMANDS: &[&str] = &[
    "bash",
    "sh",
    "cd",
    "python",
    "python3",
    "node",
    "npm",
    "manage.py",
];

const CRON_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// One parsed cron entry before rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CronEntry {
    /// Five-field schedule or `@keyword`.
    pub schedule: String,
    /// The command after placeholder substitution and normalisation.
    pub command: String,
}

/// A rendered cron file: a fixed header followed by one line per job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CronTable {
    header: Vec<String>,
    jobs: Vec<String>,
}

impl CronTable {
    /// Returns whether the table has any job beyond its header.
    #[must_use]
    pub const fn has_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    /// Returns the job lines.
    #[must_use]
    pub fn jobs(&self) -> &[String] {
        &self.jobs
    }

    /// Renders the file contents, newline terminated.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = String::new();
        for line in self.header.iter().chain(&self.jobs) {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Compiles raw entries for one project into a cron table.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming `apps.NAME.cron[i]` when an
/// entry is blank, a comment, spans more than one line, lacks a command, uses
/// an unknown `@` keyword, has fewer than five schedule fields, or names an
/// unknown `{placeholder}`.
pub fn compile<S: AsRef<str>>(
    entries: &[S],
    user: &str,
    paths: &ProjectPaths,
) -> Result<CronTable, ConfigError> {
    let header = vec![
        format!(
            "# Managed by stageops for {}; changes are overwritten on deploy.",
            paths.project_name
        ),
        String::from("SHELL=/bin/bash"),
        format!("PATH={CRON_PATH}"),
    ];

    let mut jobs = Vec::with_capacity(entries.len());
    for (index, raw) in entries.iter().enumerate() {
        let field = format!("apps.{}.cron[{index}]", paths.project_name);
        let entry = parse_entry(raw.as_ref(), paths, &field)?;
        jobs.push(format!(
            "{} {user} {}",
            entry.schedule,
            wrap_command(&entry.command, paths)
        ));
    }

    Ok(CronTable { header, jobs })
}

/// Splits and normalises one raw entry.
///
/// # Errors
///
/// See [`compile`].
pub fn parse_entry(raw: &str, paths: &ProjectPaths, field: &str) -> Result<CronEntry, ConfigError> {
    let entry = coerce::single_line(raw.trim(), field)?;
    if entry.is_empty() {
        return Err(invalid(field, String::from("cron entry is empty")));
    }
    if entry.starts_with('#') {
        return Err(invalid(
            field,
            String::from("comments are not allowed in cron entries"),
        ));
    }

    let (schedule, command) = if entry.starts_with('@') {
        let (keyword, rest) = entry
            .split_once(char::is_whitespace)
            .ok_or_else(|| invalid(field, format!("'{entry}' has no command")))?;
        if !KEYWORDS.contains(&keyword) {
            return Err(invalid(field, format!("unknown cron keyword '{keyword}'")));
        }
        (keyword.to_owned(), rest.trim())
    } else {
        split_schedule(entry).ok_or_else(|| {
            invalid(
                field,
                format!("'{entry}' needs five schedule fields followed by a command"),
            )
        })?
    };

    if command.is_empty() {
        return Err(invalid(field, format!("'{entry}' has no command")));
    }

    Ok(CronEntry {
        schedule,
        command: normalise_command(command, paths, field)?,
    })
}

/// Returns the five schedule fields joined by single spaces, and the rest.
fn split_schedule(entry: &str) -> Option<(String, &str)> {
    let mut rest = entry;
    let mut fields = Vec::with_capacity(5);
    for _ in 0..5 {
        let (field, tail) = rest.split_once(char::is_whitespace)?;
        fields.push(field);
        rest = tail.trim_start();
    }
    Some((fields.join(" "), rest))
}

/// Substitutes placeholders, or expands bare management commands.
///
/// A `{name}` left over after substitution is a misspelt placeholder and is
/// rejected. Shell parameter expansions such as `${HOME}` are left alone.
fn normalise_command(
    command: &str,
    paths: &ProjectPaths,
    field: &str,
) -> Result<String, ConfigError> {
    let venv_bin = paths.venv_bin();
    let substituted = command
        .replace("{project_dir}", &paths.project_dir)
        .replace("{project_name}", &paths.project_name)
        .replace("{venv_bin}", &venv_bin);
    if let Some(unknown) = leftover_placeholder(&substituted) {
        return Err(invalid(
            field,
            format!(
                "unknown placeholder '{{{unknown}}}'; expected {{project_dir}}, \
                 {{project_name}} or {{venv_bin}}"
            ),
        ));
    }
    if substituted != command {
        return Ok(substituted);
    }

    let first = command.split_whitespace().next().unwrap_or_default();
    let runnable = first.starts_with('/')
        || first.starts_with("./")
        || first.starts_with("venv/")
        || PASSTHROUGH_COMMANDS.contains(&first);
    if runnable {
        Ok(command.to_owned())
    } else {
        Ok(format!(
            "{venv_bin}/python {}/manage.py {command}",
            paths.project_dir
        ))
    }
}

/// Returns the first `{identifier}` not preceded by `$`.
fn leftover_placeholder(command: &str) -> Option<&str> {
    command.match_indices('{').find_map(|(start, _)| {
        if command.get(..start).is_some_and(|head| head.ends_with('$')) {
            return None;
        }
        let body = command.get(start + 1..)?;
        let end = body.find('}')?;
        let name = body.get(..end)?;
        let identifier = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        identifier.then_some(name)
    })
}

/// Wraps a command so it runs with the project environment loaded.
fn wrap_command(command: &str, paths: &ProjectPaths) -> String {
    let env_file = shell::quote_arg(&paths.env_file);
    let script = format!(
        "set -a; [ -f {env_file} ] && . {env_file}; set +a; cd {} && {command}",
        shell::quote_arg(&paths.project_dir)
    );
    format!("/bin/bash -lc {}", shell::quote(&script)).replace('%', r"\%")
}

fn invalid(field: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
}
