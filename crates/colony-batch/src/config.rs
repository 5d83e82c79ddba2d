//! Batch configuration parameters.

/// Configuration shared by every batch in a [`Batches`](crate::Batches)
/// registry.
///
/// Fixed for the lifetime of a simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Field-name prefixes that mark a field as hidden or private.
    ///
    /// Columns for these fields default to a shallow (lazy) decode since
    /// behavior code rarely reads them. Default: `_HIDDEN_`, `_PRIVATE_`.
    pub hidden_prefixes: Vec<String>,

    /// Schema metadata key listing the comma-separated any-type fields.
    ///
    /// Default: `any_type_fields`.
    pub any_type_key: String,
}

impl BatchConfig {
    /// Default schema metadata key for any-type fields.
    pub const DEFAULT_ANY_TYPE_KEY: &'static str = "any_type_fields";

    /// Default hidden/private field prefixes.
    pub const DEFAULT_HIDDEN_PREFIXES: [&'static str; 2] = ["_HIDDEN_", "_PRIVATE_"];

    /// Whether `name` carries one of the hidden/private prefixes.
    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            hidden_prefixes: Self::DEFAULT_HIDDEN_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            any_type_key: Self::DEFAULT_ANY_TYPE_KEY.to_string(),
        }
    }
}
