use {
    super::error::MarketError,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    std::{collections::BTreeMap, fmt, hash::Hash},
};

/// A closed set of statuses with a fixed adjacency table.
///
/// Implementors list outgoing edges per status in `successors` with an
/// exhaustive `match`, so adding a status without deciding its edges does
/// not compile.
pub trait Lifecycle:
    Copy
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Family name used in error messages and logs.
    const FAMILY: &'static str;

    fn successors(self) -> &'static [Self];

    fn as_str(self) -> &'static str;

    fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    fn can_transition_to(self, next: Self) -> bool {
        self.successors().contains(&next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "S: Lifecycle")]
pub struct StatusEntry<S: Lifecycle> {
    pub status: S,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Current status plus its append-only history and per-status timestamps.
///
/// Every status is entered at most once, so the history and the timestamp
/// map always have the same length and the last history entry is the
/// current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "S: Lifecycle", rename_all = "camelCase")]
pub struct StatusLog<S: Lifecycle> {
    status: S,
    status_timestamps: BTreeMap<S, DateTime<Utc>>,
    status_history: Vec<StatusEntry<S>>,
}

impl<S: Lifecycle> StatusLog<S> {
    pub fn start(initial: S, reason: Option<String>, at: DateTime<Utc>) -> Self {
        let mut status_timestamps = BTreeMap::new();
        status_timestamps.insert(initial, at);
        Self {
            status: initial,
            status_timestamps,
            status_history: vec![StatusEntry {
                status: initial,
                reason,
                at,
            }],
        }
    }

    pub fn status(&self) -> S {
        self.status
    }

    pub fn history(&self) -> &[StatusEntry<S>] {
        &self.status_history
    }

    pub fn timestamps(&self) -> &BTreeMap<S, DateTime<Utc>> {
        &self.status_timestamps
    }

    pub fn stamped_at(&self, status: S) -> Option<DateTime<Utc>> {
        self.status_timestamps.get(&status).copied()
    }

    pub fn has_entered(&self, status: S) -> bool {
        self.status_timestamps.contains_key(&status)
    }

    /// Status guard only; does not mutate.
    pub fn check(&self, next: S) -> Result<(), MarketError> {
        if !self.status.can_transition_to(next) {
            return Err(MarketError::InvalidTransition(format!(
                "{}: {} → {} is not allowed",
                S::FAMILY,
                self.status,
                next
            )));
        }
        if self.has_entered(next) {
            return Err(MarketError::InvalidTransition(format!(
                "{}: status {} was already entered",
                S::FAMILY,
                next
            )));
        }
        Ok(())
    }

    pub fn advance(
        &mut self,
        next: S,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        self.check(next)?;
        self.status = next;
        self.status_timestamps.insert(next, at);
        self.status_history.push(StatusEntry {
            status: next,
            reason,
            at,
        });
        Ok(())
    }
}
