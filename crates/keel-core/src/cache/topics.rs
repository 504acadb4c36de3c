use crate::{types::LogEntry, utils::hex::normalize_hash};
use serde_json::Value;

/// Positional topic filter of an `eth_getLogs` query.
///
/// Each position is either a wildcard or a set of accepted hashes (logical OR). Hashes are kept
/// normalized so matching is case- and prefix-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    slots: Vec<Option<Vec<String>>>,
}

/// The `topics` member of a filter is neither null nor an array of null, string or string array.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid topic filter: {0}")]
pub struct InvalidTopics(pub String);

impl TopicFilter {
    /// Filter that accepts every entry.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Parses the `topics` member of a log filter. Absent and `null` both accept everything.
    ///
    /// # Errors
    /// Returns [`InvalidTopics`] for any other shape than documented on the type.
    pub fn from_json(topics: Option<&Value>) -> Result<Self, InvalidTopics> {
        let slots = match topics {
            None | Some(Value::Null) => return Ok(Self::any()),
            Some(Value::Array(slots)) => slots,
            Some(other) => return Err(InvalidTopics(other.to_string())),
        };

        let slots = slots
            .iter()
            .map(|slot| match slot {
                Value::Null => Ok(None),
                Value::String(hash) => Ok(Some(vec![normalize_hash(hash)])),
                Value::Array(alternatives) => alternatives
                    .iter()
                    .map(|alt| {
                        alt.as_str()
                            .map(normalize_hash)
                            .ok_or_else(|| InvalidTopics(alt.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Some),
                other => Err(InvalidTopics(other.to_string())),
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { slots })
    }

    #[must_use]
    pub fn is_any(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Whether `entry` satisfies every non-wildcard position.
    ///
    /// An entry lacking a topic at a constrained position fails it, and an empty alternatives
    /// list accepts nothing.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.slots.iter().enumerate().all(|(position, slot)| match slot {
            None => true,
            Some(accepted) => entry
                .topics
                .get(position)
                .map(|topic| normalize_hash(topic))
                .is_some_and(|topic| accepted.contains(&topic)),
        })
    }
}
