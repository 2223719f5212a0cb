//! Merging of `server.defaults` into app entries.

use serde_yaml::Mapping;

use crate::coerce::is_unset;

/// Copies each key of `defaults` into `app` where the app leaves it unset.
///
/// A key counts as unset when it is absent or explicitly `null`. Values the
/// app sets are never overwritten, so applying the same defaults twice is a
/// no-op.
pub fn apply_defaults(app: &mut Mapping, defaults: &Mapping) {
    for (key, value) in defaults {
        if is_unset(app.get(key)) {
            app.insert(key.clone(), value.clone());
        }
    }
}
