//! Configuration unit tests, split by concern.

/// Fixtures and `MergeComposer` shortcuts.
mod helpers;
