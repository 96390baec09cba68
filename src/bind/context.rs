use crate::config::{ConfigurationProperty, PropertySources, PropertyName};

/// Owner reported for elements of a sequence.
pub const SEQUENCE: &str = "sequence";
/// Owner reported for entries of a map.
pub const MAP: &str = "map";

/// The member of its owner that a node is bound into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// The top-level target of a bind call.
    Root,
    /// A named field of a struct.
    Field(&'static str),
    /// An element of a sequence.
    Element(usize),
    /// An entry of a map.
    Entry(String),
}

/// Describes the node about to be bound.
///
/// Handlers receive this alongside the property name. `owner` is the type
/// being populated: the target type itself for the root, the struct name for
/// fields, or [`SEQUENCE`] / [`MAP`] for collection members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindable {
    owner: &'static str,
    member: Member,
    existing: bool,
}

impl Bindable {
    pub fn root<T: ?Sized>() -> Self {
        Self {
            owner: std::any::type_name::<T>(),
            member: Member::Root,
            existing: false,
        }
    }

    /// A root that already has a value to fall back on.
    pub fn root_with_existing<T: ?Sized>() -> Self {
        Self {
            existing: true,
            ..Self::root::<T>()
        }
    }

    pub fn field(owner: &'static str, field: &'static str) -> Self {
        Self {
            owner,
            member: Member::Field(field),
            existing: false,
        }
    }

    pub fn element(index: usize) -> Self {
        Self {
            owner: SEQUENCE,
            member: Member::Element(index),
            existing: false,
        }
    }

    pub fn entry(key: impl Into<String>) -> Self {
        Self {
            owner: MAP,
            member: Member::Entry(key.into()),
            existing: false,
        }
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    /// Whether the caller supplied a fallback for the root. The fallback is
    /// used only when nothing is bound under the name.
    pub fn has_existing_value(&self) -> bool {
        self.existing
    }
}

/// State of a single top-level bind call.
///
/// `depth` is 0 while the root is being considered and grows by one each
/// time the binder enters the members of a struct, sequence or map.
#[derive(Debug)]
pub struct BindContext<'a> {
    sources: &'a PropertySources,
    root_type: &'static str,
    depth: usize,
    names: Vec<PropertyName>,
    bound: Vec<ConfigurationProperty>,
}

impl<'a> BindContext<'a> {
    pub(crate) fn new(sources: &'a PropertySources, root_type: &'static str) -> Self {
        Self {
            sources,
            root_type,
            depth: 0,
            names: Vec::new(),
            bound: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root_type(&self) -> &'static str {
        self.root_type
    }

    pub fn sources(&self) -> &'a PropertySources {
        self.sources
    }

    /// Name of the node currently being bound.
    pub fn name(&self) -> Option<&PropertyName> {
        self.names.last()
    }

    /// Names of every node on the way from the root to the current one.
    pub fn names(&self) -> &[PropertyName] {
        &self.names
    }

    /// Properties whose values have been consumed so far.
    pub fn bound_properties(&self) -> &[ConfigurationProperty] {
        &self.bound
    }

    pub(crate) fn increase_depth(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn decrease_depth(&mut self) {
        debug_assert!(self.depth > 0, "depth decreased below zero");
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn push_name(&mut self, name: PropertyName) {
        self.names.push(name);
    }

    pub(crate) fn pop_name(&mut self) {
        self.names.pop();
    }

    pub(crate) fn record_bound(&mut self, property: ConfigurationProperty) {
        if !self.bound.iter().any(|bound| bound.name == property.name) {
            self.bound.push(property);
        }
    }

    pub(crate) fn into_bound(self) -> Vec<ConfigurationProperty> {
        self.bound
    }

    /// Creates a context at the given depth, for exercising handlers.
    #[cfg(test)]
    pub(crate) fn at_depth(sources: &'a PropertySources, depth: usize) -> Self {
        Self {
            depth,
            ..Self::new(sources, "test")
        }
    }
}
