//! POSIX shell quoting for commands sent to the host.

/// Quotes `s` as a single shell word, always using single quotes.
///
/// Embedded single quotes are written as `'\''`.
#[must_use]
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Quotes `s` only when it contains characters the shell would interpret.
#[must_use]
pub fn quote_arg(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=%+,".contains(c))
    {
        s.to_owned()
    } else {
        quote(s)
    }
}

/// Quotes every argument and joins them with spaces.
#[must_use]
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| quote_arg(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
