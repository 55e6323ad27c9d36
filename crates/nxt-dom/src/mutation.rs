#![forbid(unsafe_code)]

//! Mutation observation: options, observer handles and the records the host
//! hands to the change notifier.
//!
//! Records follow the shape of a browser subtree observer. Removed nodes are
//! reported once per removed root and carry the ids of every element the
//! document purged with it, so consumers never have to walk a subtree that no
//! longer exists.

use crate::document::ElementId;

/// Handle for a registered observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

/// What an observer wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Report insertions and removals of children.
    pub child_list: bool,
    /// Report attribute changes.
    pub attributes: bool,
    /// Report text/html content changes.
    pub character_data: bool,
    /// Observe the whole subtree instead of only the root.
    pub subtree: bool,
    /// Include the previous attribute value in attribute records.
    pub attribute_old_value: bool,
    /// Restrict attribute records to these names. `None` means all.
    pub attribute_filter: Option<Vec<String>>,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            child_list: true,
            attributes: true,
            character_data: false,
            subtree: true,
            attribute_old_value: true,
            attribute_filter: None,
        }
    }
}

impl ObserveOptions {
    /// Builder: restrict attribute records to the given names.
    #[must_use]
    pub fn with_attribute_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: also report content changes.
    #[must_use]
    pub fn with_character_data(mut self) -> Self {
        self.character_data = true;
        self
    }

    pub(crate) fn wants_attribute(&self, name: &str) -> bool {
        self.attributes
            && self
                .attribute_filter
                .as_ref()
                .is_none_or(|filter| filter.iter().any(|f| f == name))
    }
}

/// A node removed from the tree, with everything purged alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedNode {
    /// The removed subtree root.
    pub id: ElementId,
    /// Every element id dropped from the arena, root first. Empty when the
    /// node was moved rather than destroyed.
    pub purged: Vec<ElementId>,
}

/// One observed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// Children were inserted into or removed from `target`.
    ChildList {
        target: ElementId,
        added: Vec<ElementId>,
        removed: Vec<RemovedNode>,
    },
    /// An attribute of `target` was set or removed.
    Attributes {
        target: ElementId,
        name: String,
        old_value: Option<String>,
    },
    /// Text or inner html of `target` changed.
    CharacterData { target: ElementId },
}

impl MutationRecord {
    /// The element the mutation happened on.
    #[must_use]
    pub fn target(&self) -> ElementId {
        match self {
            Self::ChildList { target, .. }
            | Self::Attributes { target, .. }
            | Self::CharacterData { target } => *target,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Observer {
    pub(crate) id: ObserverId,
    pub(crate) root: ElementId,
    pub(crate) options: ObserveOptions,
    pub(crate) records: Vec<MutationRecord>,
}
