use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while turning declared payload specs into value lists.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// The payload refers to an external source (typically a file) that this loader
    /// cannot resolve on its own.
    #[error("Payload '{0}' refers to an external source this loader cannot resolve")]
    UnresolvedSource(String),
    /// A loader failed while resolving the named payload.
    #[error("Failed to load payload '{name}': {reason}")]
    Load { name: String, reason: String },
}

/// A declared payload source, as it appears in configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum PayloadSpec {
    /// Literal values, used as-is.
    Values(Vec<String>),
    /// Either a multi-line string of values or a reference to an external
    /// source such as a wordlist file.
    Source(String),
}

pub type PayloadSpecs = BTreeMap<String, PayloadSpec>;

/// Resolved payload value lists keyed by variable name.
///
/// Ordered by name so producers see the variables in a stable order.
pub type PayloadLists = BTreeMap<String, Vec<String>>;

/// Turns named payload specs into concrete value lists.
///
/// Called once when a coordinator is built with payloads. Implemented for
/// plain closures so callers can plug in their own file or wordlist readers.
pub trait PayloadLoader: Send + Sync {
    fn load(&self, specs: &PayloadSpecs) -> Result<PayloadLists, PayloadError>;
}

impl<F> PayloadLoader for F
where
    F: Fn(&PayloadSpecs) -> Result<PayloadLists, PayloadError> + Send + Sync,
{
    fn load(&self, specs: &PayloadSpecs) -> Result<PayloadLists, PayloadError> {
        self(specs)
    }
}

/// Loader for payloads declared inline.
///
/// Value lists pass through untouched. A source string containing a newline is
/// split into one value per non-empty line. A single-line source string is a
/// reference to something outside the config and is rejected with
/// [`PayloadError::UnresolvedSource`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InlinePayloadLoader;

impl InlinePayloadLoader {
    pub fn new() -> Self {
        InlinePayloadLoader
    }
}

impl PayloadLoader for InlinePayloadLoader {
    fn load(&self, specs: &PayloadSpecs) -> Result<PayloadLists, PayloadError> {
        let mut lists = PayloadLists::new();
        for (name, spec) in specs {
            let values = match spec {
                PayloadSpec::Values(values) => values.clone(),
                PayloadSpec::Source(text) if text.contains('\n') => text
                    .lines()
                    .map(|line| line.trim_end_matches('\r'))
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect(),
                PayloadSpec::Source(_) => {
                    return Err(PayloadError::UnresolvedSource(name.clone()));
                }
            };
            lists.insert(name.clone(), values);
        }
        Ok(lists)
    }
}
