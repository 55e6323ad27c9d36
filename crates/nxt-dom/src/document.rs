#![forbid(unsafe_code)]

//! Arena-backed document tree.
//!
//! Elements live in a map keyed by [`ElementId`]. Ids are allocated
//! monotonically and never reused, so a handle held after its element was
//! removed can only miss, never alias a newer element.
//!
//! # Invariants
//!
//! 1. The root element exists for the lifetime of the document and cannot be
//!    removed.
//! 2. `parent`/`children` links are symmetric for every element in the arena.
//! 3. Removing an element purges its whole subtree (and their listeners) from
//!    the arena; the mutation record lists every purged id.
//! 4. Detached elements (created but never appended) produce no records.
//!
//! # Complexity
//!
//! | Operation | Time |
//! |-----------|------|
//! | attribute get/set | O(A) attributes on the element |
//! | append_child | O(D + O) depth × observers |
//! | remove | O(S + O) subtree size + observers |
//! | query_all | O(S) |

use crate::event::{DomEvent, EventKind, HostEvent, Listener, ListenerFn, ListenerId};
use crate::mutation::{MutationRecord, ObserveOptions, Observer, ObserverId, RemovedNode};
use serde_json::Value;
use std::collections::HashMap;

/// Stable handle for an element in a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u64);

impl ElementId {
    /// Rebuild a handle from its raw value, for host bridges.
    ///
    /// A fabricated id that was never allocated simply misses every lookup.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value, for logging and host bridges.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Loading state of the page, set by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadyState {
    #[default]
    Loading,
    Interactive,
    Complete,
}

/// Errors from tree manipulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The id does not name an element in this document.
    UnknownElement(ElementId),
    /// The root element cannot be removed or re-parented.
    RootImmutable,
    /// Appending `child` under `parent` would create a cycle.
    HierarchyRequest { parent: ElementId, child: ElementId },
}

impl std::fmt::Display for DomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownElement(id) => write!(f, "unknown element {id}"),
            Self::RootImmutable => write!(f, "the root element cannot be moved or removed"),
            Self::HierarchyRequest { parent, child } => {
                write!(f, "cannot append {child} under its own descendant {parent}")
            }
        }
    }
}

impl std::error::Error for DomError {}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    text: String,
    html: Option<String>,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            text: String::new(),
            html: None,
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// The host document: element arena, observers, listeners and host events.
#[derive(Debug)]
pub struct Document {
    elements: HashMap<ElementId, ElementData>,
    root: ElementId,
    body: ElementId,
    next_id: u64,
    ready_state: ReadyState,
    observers: Vec<Observer>,
    next_observer: u64,
    listeners: HashMap<ElementId, Vec<Listener>>,
    next_listener: u64,
    host_events: Vec<HostEvent>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with an `html` root and a `body` child.
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            elements: HashMap::new(),
            root: ElementId(1),
            body: ElementId(2),
            next_id: 1,
            ready_state: ReadyState::Loading,
            observers: Vec::new(),
            next_observer: 1,
            listeners: HashMap::new(),
            next_listener: 1,
            host_events: Vec::new(),
        };
        let root = doc.create_element("html");
        let body = doc.create_element("body");
        if let Some(data) = doc.elements.get_mut(&root) {
            data.children.push(body);
        }
        if let Some(data) = doc.elements.get_mut(&body) {
            data.parent = Some(root);
        }
        doc.root = root;
        doc.body = body;
        doc
    }

    /// The document element.
    #[must_use]
    pub fn root(&self) -> ElementId {
        self.root
    }

    /// The `body` element.
    #[must_use]
    pub fn body(&self) -> ElementId {
        self.body
    }

    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    /// Number of elements in the arena (attached or detached).
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    // -- Construction -------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, ElementData::new(tag));
        id
    }

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), DomError> {
        self.require(parent)?;
        self.require(child)?;
        if child == self.root {
            return Err(DomError::RootImmutable);
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(old_parent) = self.parent(child) {
            self.detach(child);
            self.queue_child_list(
                old_parent,
                Vec::new(),
                vec![RemovedNode {
                    id: child,
                    purged: Vec::new(),
                }],
            );
        }
        if let Some(data) = self.elements.get_mut(&parent) {
            data.children.push(child);
        }
        if let Some(data) = self.elements.get_mut(&child) {
            data.parent = Some(parent);
        }
        self.queue_child_list(parent, vec![child], Vec::new());
        Ok(())
    }

    /// Remove `id` and its subtree from the tree and purge them from the arena.
    ///
    /// Returns the purged ids, root first.
    pub fn remove(&mut self, id: ElementId) -> Result<Vec<ElementId>, DomError> {
        self.require(id)?;
        if id == self.root {
            return Err(DomError::RootImmutable);
        }
        let purged = self.subtree(id);
        let parent = self.parent(id);
        if let Some(parent) = parent {
            self.queue_child_list(
                parent,
                Vec::new(),
                vec![RemovedNode {
                    id,
                    purged: purged.clone(),
                }],
            );
            self.detach(id);
        }
        for gone in &purged {
            self.elements.remove(gone);
            self.listeners.remove(gone);
        }
        Ok(purged)
    }

    /// Deep-copy `id` into a new detached subtree. Listeners are not copied.
    pub fn deep_clone(&mut self, id: ElementId) -> Result<ElementId, DomError> {
        let source = self.require(id)?.clone();
        let copy = self.create_element(&source.tag);
        if let Some(data) = self.elements.get_mut(&copy) {
            data.attributes = source.attributes.clone();
            data.text = source.text.clone();
            data.html = source.html.clone();
        }
        for child in source.children {
            let child_copy = self.deep_clone(child)?;
            if let Some(data) = self.elements.get_mut(&child_copy) {
                data.parent = Some(copy);
            }
            if let Some(data) = self.elements.get_mut(&copy) {
                data.children.push(child_copy);
            }
        }
        Ok(copy)
    }

    fn detach(&mut self, id: ElementId) {
        let parent = self.elements.get_mut(&id).and_then(|d| d.parent.take());
        if let Some(parent) = parent
            && let Some(data) = self.elements.get_mut(&parent)
        {
            data.children.retain(|c| *c != id);
        }
    }

    // -- Navigation ---------------------------------------------------------

    #[must_use]
    pub fn contains_element(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    #[must_use]
    pub fn tag(&self, id: ElementId) -> Option<&str> {
        self.elements.get(&id).map(|d| d.tag.as_str())
    }

    #[must_use]
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.elements.get(&id).and_then(|d| d.parent)
    }

    #[must_use]
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.elements
            .get(&id)
            .map(|d| d.children.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestors of `id`, nearest first, excluding `id`.
    #[must_use]
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(p) = cursor {
            out.push(p);
            cursor = self.parent(p);
        }
        out
    }

    /// `id` and all its descendants in document (pre-)order.
    #[must_use]
    pub fn subtree(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        if !self.elements.contains_key(&id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Descendants of `id` in document order, excluding `id`.
    #[must_use]
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut all = self.subtree(id);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_inclusive_ancestor(&self, ancestor: ElementId, id: ElementId) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// Whether `id` is `root` or lies inside it.
    #[must_use]
    pub fn contains(&self, root: ElementId, id: ElementId) -> bool {
        self.elements.contains_key(&id) && self.is_inclusive_ancestor(root, id)
    }

    /// Whether `id` is attached to the document root.
    #[must_use]
    pub fn is_connected(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id) && self.is_inclusive_ancestor(self.root, id)
    }

    /// Descendants of `root` (excluding `root`) matching `pred`, in order.
    pub fn query_all(&self, root: ElementId, pred: impl Fn(&Self, ElementId) -> bool) -> Vec<ElementId> {
        self.descendants(root)
            .into_iter()
            .filter(|id| pred(self, *id))
            .collect()
    }

    /// Nearest inclusive ancestor of `id` matching `pred`.
    pub fn closest(&self, id: ElementId, pred: impl Fn(&Self, ElementId) -> bool) -> Option<ElementId> {
        if !self.elements.contains_key(&id) {
            return None;
        }
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|candidate| pred(self, *candidate))
    }

    // -- Attributes ---------------------------------------------------------

    #[must_use]
    pub fn attribute(&self, id: ElementId, name: &str) -> Option<&str> {
        self.elements.get(&id).and_then(|d| d.attribute(name))
    }

    #[must_use]
    pub fn has_attribute(&self, id: ElementId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// All attributes of `id` in insertion order.
    #[must_use]
    pub fn attributes(&self, id: ElementId) -> &[(String, String)] {
        self.elements
            .get(&id)
            .map(|d| d.attributes.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) -> Result<(), DomError> {
        let data = self.require_mut(id)?;
        let old = match data.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => Some(std::mem::replace(&mut slot.1, value.to_string())),
            None => {
                data.attributes.push((name.to_string(), value.to_string()));
                None
            }
        };
        self.queue_attribute(id, name, old);
        Ok(())
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attribute(&mut self, id: ElementId, name: &str) -> Result<bool, DomError> {
        let data = self.require_mut(id)?;
        let Some(pos) = data.attributes.iter().position(|(n, _)| n == name) else {
            return Ok(false);
        };
        let (_, old) = data.attributes.remove(pos);
        self.queue_attribute(id, name, Some(old));
        Ok(true)
    }

    // -- Classes and visibility ---------------------------------------------

    #[must_use]
    pub fn has_class(&self, id: ElementId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    /// Add or remove `class`. Returns whether the class list changed.
    pub fn toggle_class(&mut self, id: ElementId, class: &str, on: bool) -> Result<bool, DomError> {
        let current = self.require(id)?.attribute("class").unwrap_or("").to_string();
        let mut classes: Vec<&str> = current.split_whitespace().collect();
        let present = classes.contains(&class);
        if present == on {
            return Ok(false);
        }
        if on {
            classes.push(class);
        } else {
            classes.retain(|c| *c != class);
        }
        let joined = classes.join(" ");
        self.set_attribute(id, "class", &joined)?;
        Ok(true)
    }

    #[must_use]
    pub fn is_hidden(&self, id: ElementId) -> bool {
        self.has_attribute(id, "hidden")
    }

    pub fn set_hidden(&mut self, id: ElementId, hidden: bool) -> Result<(), DomError> {
        match (hidden, self.is_hidden(id)) {
            (true, false) => self.set_attribute(id, "hidden", ""),
            (false, true) => self.remove_attribute(id, "hidden").map(|_| ()),
            _ => self.require(id).map(|_| ()),
        }
    }

    // -- Content ------------------------------------------------------------

    #[must_use]
    pub fn text(&self, id: ElementId) -> Option<&str> {
        self.elements.get(&id).map(|d| d.text.as_str())
    }

    pub fn set_text(&mut self, id: ElementId, text: &str) -> Result<(), DomError> {
        let data = self.require_mut(id)?;
        if data.text == text {
            return Ok(());
        }
        data.text = text.to_string();
        data.html = None;
        self.queue_character_data(id);
        Ok(())
    }

    #[must_use]
    pub fn html(&self, id: ElementId) -> Option<&str> {
        self.elements.get(&id).and_then(|d| d.html.as_deref())
    }

    /// Replace the raw markup payload of `id`. The arena does not parse it.
    pub fn set_html(&mut self, id: ElementId, html: &str) -> Result<(), DomError> {
        let data = self.require_mut(id)?;
        data.html = Some(html.to_string());
        data.text.clear();
        self.queue_character_data(id);
        Ok(())
    }

    // -- Observation --------------------------------------------------------

    /// Start recording mutations under `root`.
    pub fn observe(&mut self, root: ElementId, options: ObserveOptions) -> Result<ObserverId, DomError> {
        self.require(root)?;
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(Observer {
            id,
            root,
            options,
            records: Vec::new(),
        });
        Ok(id)
    }

    /// Stop an observer, returning the records it had not delivered yet.
    pub fn disconnect(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        match self.observers.iter().position(|o| o.id == observer) {
            Some(pos) => self.observers.remove(pos).records,
            None => Vec::new(),
        }
    }

    /// Drain the queued records of `observer`.
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .iter_mut()
            .find(|o| o.id == observer)
            .map(|o| std::mem::take(&mut o.records))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn observing(&self, target: ElementId) -> Vec<usize> {
        if self.observers.is_empty() {
            return Vec::new();
        }
        self.observers
            .iter()
            .enumerate()
            .filter(|(_, o)| {
                target == o.root || (o.options.subtree && self.is_inclusive_ancestor(o.root, target))
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn queue_child_list(&mut self, target: ElementId, added: Vec<ElementId>, removed: Vec<RemovedNode>) {
        for idx in self.observing(target) {
            let observer = &mut self.observers[idx];
            if observer.options.child_list {
                observer.records.push(MutationRecord::ChildList {
                    target,
                    added: added.clone(),
                    removed: removed.clone(),
                });
            }
        }
    }

    fn queue_attribute(&mut self, target: ElementId, name: &str, old: Option<String>) {
        for idx in self.observing(target) {
            let observer = &mut self.observers[idx];
            if observer.options.wants_attribute(name) {
                let old_value = if observer.options.attribute_old_value {
                    old.clone()
                } else {
                    None
                };
                observer.records.push(MutationRecord::Attributes {
                    target,
                    name: name.to_string(),
                    old_value,
                });
            }
        }
    }

    fn queue_character_data(&mut self, target: ElementId) {
        for idx in self.observing(target) {
            let observer = &mut self.observers[idx];
            if observer.options.character_data {
                observer.records.push(MutationRecord::CharacterData { target });
            }
        }
    }

    // -- Listeners ----------------------------------------------------------

    /// Register a listener on `id`.
    pub fn add_listener(&mut self, id: ElementId, kind: EventKind, callback: ListenerFn) -> Result<ListenerId, DomError> {
        self.require(id)?;
        let listener_id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.entry(id).or_default().push(Listener {
            id: listener_id,
            kind,
            callback,
        });
        Ok(listener_id)
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(&mut self, id: ElementId, listener: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(&id) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != listener);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(&id);
        }
        removed
    }

    /// Number of listeners registered on `id`.
    #[must_use]
    pub fn listener_count(&self, id: ElementId) -> usize {
        self.listeners.get(&id).map_or(0, Vec::len)
    }

    /// Listeners that an event of `kind` on `target` reaches, in delivery
    /// order, paired with the event each one should receive.
    #[must_use]
    pub fn event_path(&self, target: ElementId, kind: EventKind, value: Option<&str>) -> Vec<(ListenerFn, DomEvent)> {
        let path: Vec<ElementId> = if kind.bubbles() {
            std::iter::once(target).chain(self.ancestors(target)).collect()
        } else {
            vec![target]
        };
        let mut out = Vec::new();
        for current in path {
            let Some(list) = self.listeners.get(&current) else {
                continue;
            };
            for listener in list.iter().filter(|l| l.kind == kind) {
                out.push((
                    listener.callback.clone(),
                    DomEvent {
                        kind,
                        target,
                        current_target: current,
                        value: value.map(str::to_string),
                    },
                ));
            }
        }
        out
    }

    // -- Host events --------------------------------------------------------

    /// Queue a document-level event for the host.
    pub fn dispatch_host_event(&mut self, name: &str, detail: Value) {
        self.host_events.push(HostEvent {
            name: name.to_string(),
            detail,
        });
    }

    /// Drain queued host events.
    pub fn take_host_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.host_events)
    }

    // -- Internals ----------------------------------------------------------

    fn require(&self, id: ElementId) -> Result<&ElementData, DomError> {
        self.elements.get(&id).ok_or(DomError::UnknownElement(id))
    }

    fn require_mut(&mut self, id: ElementId) -> Result<&mut ElementData, DomError> {
        self.elements.get_mut(&id).ok_or(DomError::UnknownElement(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc_with_tree() -> (Document, ElementId, ElementId, ElementId) {
        let mut doc = Document::new();
        let body = doc.body();
        let section = doc.create_element("section");
        let a = doc.create_element("div");
        let b = doc.create_element("span");
        doc.append_child(body, section).unwrap();
        doc.append_child(section, a).unwrap();
        doc.append_child(a, b).unwrap();
        (doc, section, a, b)
    }

    #[test]
    fn new_document_has_root_and_body() {
        let doc = Document::new();
        assert_eq!(doc.tag(doc.root()), Some("html"));
        assert_eq!(doc.tag(doc.body()), Some("body"));
        assert_eq!(doc.parent(doc.body()), Some(doc.root()));
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        doc.append_child(doc.body(), a).unwrap();
        doc.remove(a).unwrap();
        let b = doc.create_element("div");
        assert_ne!(a, b);
        assert!(!doc.contains_element(a));
        assert_eq!(doc.attribute(a, "x"), None);
    }

    #[test]
    fn subtree_is_preorder() {
        let (doc, section, a, b) = doc_with_tree();
        assert_eq!(doc.subtree(section), vec![section, a, b]);
        assert_eq!(doc.descendants(section), vec![a, b]);
        assert_eq!(doc.ancestors(b), vec![a, section, doc.body(), doc.root()]);
    }

    #[test]
    fn remove_purges_subtree() {
        let (mut doc, section, a, b) = doc_with_tree();
        let purged = doc.remove(a).unwrap();
        assert_eq!(purged, vec![a, b]);
        assert!(!doc.contains_element(b));
        assert_eq!(doc.children(section), &[] as &[ElementId]);
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut doc = Document::new();
        let root = doc.root();
        assert_eq!(doc.remove(root), Err(DomError::RootImmutable));
    }

    #[test]
    fn cycles_are_rejected() {
        let (mut doc, section, _a, b) = doc_with_tree();
        assert_eq!(
            doc.append_child(b, section),
            Err(DomError::HierarchyRequest {
                parent: b,
                child: section
            })
        );
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let (mut doc, _, a, _) = doc_with_tree();
        doc.set_attribute(a, "data-x", "1").unwrap();
        doc.set_attribute(a, "data-y", "2").unwrap();
        doc.set_attribute(a, "data-x", "3").unwrap();
        assert_eq!(
            doc.attributes(a),
            &[
                ("data-x".to_string(), "3".to_string()),
                ("data-y".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn toggle_class_reports_changes() {
        let (mut doc, _, a, _) = doc_with_tree();
        assert!(doc.toggle_class(a, "open", true).unwrap());
        assert!(!doc.toggle_class(a, "open", true).unwrap());
        assert!(doc.has_class(a, "open"));
        assert!(doc.toggle_class(a, "open", false).unwrap());
        assert!(!doc.has_class(a, "open"));
    }

    #[test]
    fn observer_records_attribute_with_old_value() {
        let (mut doc, section, a, _) = doc_with_tree();
        let obs = doc.observe(section, ObserveOptions::default()).unwrap();
        doc.set_attribute(a, "data-next-show", "cart.hasItems").unwrap();
        doc.set_attribute(a, "data-next-show", "cart.isEmpty").unwrap();
        let records = doc.take_records(obs);
        assert_eq!(
            records,
            vec![
                MutationRecord::Attributes {
                    target: a,
                    name: "data-next-show".into(),
                    old_value: None,
                },
                MutationRecord::Attributes {
                    target: a,
                    name: "data-next-show".into(),
                    old_value: Some("cart.hasItems".into()),
                },
            ]
        );
        assert!(doc.take_records(obs).is_empty());
    }

    #[test]
    fn observer_ignores_mutations_outside_root() {
        let (mut doc, section, _, _) = doc_with_tree();
        let obs = doc.observe(section, ObserveOptions::default()).unwrap();
        let outside = doc.create_element("p");
        doc.append_child(doc.body(), outside).unwrap();
        doc.set_attribute(outside, "data-next-display", "cart.total").unwrap();
        assert!(doc.take_records(obs).is_empty());
    }

    #[test]
    fn detached_mutations_are_not_recorded() {
        let mut doc = Document::new();
        let obs = doc.observe(doc.root(), ObserveOptions::default()).unwrap();
        let loose = doc.create_element("div");
        doc.set_attribute(loose, "data-next-display", "cart.total").unwrap();
        assert!(doc.take_records(obs).is_empty());
    }

    #[test]
    fn removal_record_lists_purged_ids() {
        let (mut doc, section, a, b) = doc_with_tree();
        let obs = doc.observe(doc.root(), ObserveOptions::default()).unwrap();
        doc.remove(a).unwrap();
        assert_eq!(
            doc.take_records(obs),
            vec![MutationRecord::ChildList {
                target: section,
                added: vec![],
                removed: vec![RemovedNode {
                    id: a,
                    purged: vec![a, b]
                }],
            }]
        );
    }

    #[test]
    fn moving_reports_removal_without_purge() {
        let (mut doc, section, a, _) = doc_with_tree();
        let obs = doc.observe(doc.root(), ObserveOptions::default()).unwrap();
        let body = doc.body();
        doc.append_child(body, a).unwrap();
        let records = doc.take_records(obs);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            MutationRecord::ChildList {
                target: section,
                added: vec![],
                removed: vec![RemovedNode {
                    id: a,
                    purged: vec![]
                }],
            }
        );
        assert!(doc.is_connected(a));
    }

    #[test]
    fn deep_clone_copies_structure_detached() {
        let (mut doc, section, a, _) = doc_with_tree();
        doc.set_attribute(a, "data-k", "v").unwrap();
        doc.set_text(a, "hello").unwrap();
        let copy = doc.deep_clone(section).unwrap();
        assert!(!doc.is_connected(copy));
        let copy_children = doc.children(copy).to_vec();
        assert_eq!(copy_children.len(), 1);
        assert_eq!(doc.attribute(copy_children[0], "data-k"), Some("v"));
        assert_eq!(doc.text(copy_children[0]), Some("hello"));
        assert_eq!(doc.children(copy_children[0]).len(), 1);
    }

    #[test]
    fn closest_includes_self() {
        let (mut doc, section, a, b) = doc_with_tree();
        doc.set_attribute(section, "data-next-package-id", "7").unwrap();
        let hit = doc.closest(b, |d, id| d.has_attribute(id, "data-next-package-id"));
        assert_eq!(hit, Some(section));
        doc.set_attribute(a, "data-next-package-id", "9").unwrap();
        let hit = doc.closest(a, |d, id| d.has_attribute(id, "data-next-package-id"));
        assert_eq!(hit, Some(a));
    }

    #[test]
    fn event_path_bubbles_to_ancestors() {
        use std::rc::Rc;
        let (mut doc, section, a, b) = doc_with_tree();
        doc.add_listener(section, EventKind::Click, Rc::new(|_| {})).unwrap();
        doc.add_listener(b, EventKind::Click, Rc::new(|_| {})).unwrap();
        doc.add_listener(a, EventKind::Scroll, Rc::new(|_| {})).unwrap();
        let path = doc.event_path(b, EventKind::Click, None);
        let currents: Vec<ElementId> = path.iter().map(|(_, e)| e.current_target).collect();
        assert_eq!(currents, vec![b, section]);
        assert!(path.iter().all(|(_, e)| e.target == b));
    }

    #[test]
    fn remove_drops_listeners() {
        use std::rc::Rc;
        let (mut doc, _, a, b) = doc_with_tree();
        doc.add_listener(b, EventKind::Click, Rc::new(|_| {})).unwrap();
        assert_eq!(doc.listener_count(b), 1);
        doc.remove(a).unwrap();
        assert_eq!(doc.listener_count(b), 0);
    }

    #[test]
    fn set_hidden_is_idempotent() {
        let (mut doc, section, _, _) = doc_with_tree();
        let obs = doc.observe(section, ObserveOptions::default()).unwrap();
        doc.set_hidden(section, true).unwrap();
        doc.set_hidden(section, true).unwrap();
        assert!(doc.is_hidden(section));
        assert_eq!(doc.take_records(obs).len(), 1);
        doc.set_hidden(section, false).unwrap();
        assert!(!doc.is_hidden(section));
    }
}
