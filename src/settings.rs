//! Analysis settings.

use serde::{Deserialize, Serialize};

/// Settings controlling how problems are analyzed and canonicalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Treat a scalar multiplier with no sign information (typically a
    /// Parameter) as nonnegative when scaling a convex or concave expression.
    pub assume_nonneg_scalar_parameters: bool,
    /// Accept alternative atom spellings such as `normInf` or `entr`.
    pub allow_aliases: bool,
    /// Use declared variables (and literal 1-D slices of them) directly as cone
    /// members instead of binding every member to a fresh auxiliary.
    pub reuse_variable_slices: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            assume_nonneg_scalar_parameters: true,
            allow_aliases: true,
            reuse_variable_slices: true,
        }
    }
}
