//! Slot-aligned errors for batch operations.

use std::error::Error;
use std::fmt;

/// One outcome per input item of a batch: `None` where the item succeeded,
/// `Some(error)` where it failed.
///
/// The length always equals the number of inputs, so `errors[i]` describes
/// input `i`. As an [`Error`], the aggregate's source is its first failure.
///
/// # Examples
///
/// ```
/// use sqlrepo_core::MultiError;
///
/// let multi = MultiError::new(vec![None, Some(std::fmt::Error), None]);
/// assert_eq!(multi.len(), 3);
/// assert_eq!(multi.first().map(|(index, _)| index), Some(1));
/// assert!(multi.get(0).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct MultiError<E> {
    slots: Vec<Option<E>>,
}

impl<E> MultiError<E> {
    pub fn new(slots: Vec<Option<E>>) -> Self {
        Self { slots }
    }

    /// Number of slots (equal to the batch's input count).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The error recorded for slot `index`, if that item failed.
    pub fn get(&self, index: usize) -> Option<&E> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// First failed slot and its error.
    pub fn first(&self) -> Option<(usize, &E)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(index, slot)| slot.as_ref().map(|err| (index, err)))
    }

    /// Number of failed slots.
    pub fn failures(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&E>> {
        self.slots.iter().map(Option::as_ref)
    }

    pub fn into_slots(self) -> Vec<Option<E>> {
        self.slots
    }

    /// `Some(self)` when at least one slot failed, otherwise `None`.
    pub fn into_option(self) -> Option<Self> {
        self.has_failures().then_some(self)
    }
}

impl<E: fmt::Display> fmt::Display for MultiError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first() {
            Some((index, err)) => write!(
                f,
                "{} of {} items failed; first at index {index}: {err}",
                self.failures(),
                self.len()
            ),
            None => write!(f, "0 of {} items failed", self.len()),
        }
    }
}

impl<E: Error + 'static> Error for MultiError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.first().map(|(_, err)| err as &(dyn Error + 'static))
    }
}
