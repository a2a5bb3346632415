//! Top-level declarations.
//!
//! 依存集合（references）は宣言時に一度だけ決まり、その後変わらない。

use std::collections::BTreeSet;
use std::fmt;

use super::errors::InitError;
use crate::resolve::Globals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    /// Hoisted; references inside its body never create edges.
    Function,
    Variable,
}

/// Name, kind and references of one declaration. This is all the resolver sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclHeader {
    name: String,
    kind: DeclKind,
    references: BTreeSet<String>,
}

impl DeclHeader {
    pub fn new<I, S>(name: impl Into<String>, kind: DeclKind, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind,
            references: references.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeclKind {
        self.kind
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(String::as_str)
    }
}

pub type Initializer<V> = Box<dyn FnOnce(&Globals<V>) -> Result<V, InitError> + Send>;

/// One top-level binding: header plus (for variables) the initializer.
pub struct Declaration<V> {
    header: DeclHeader,
    init: Option<Initializer<V>>,
}

impl<V> Declaration<V> {
    /// `var name = <init>` where `init` reads the names listed in `references`.
    pub fn variable<I, S, F>(name: impl Into<String>, references: I, init: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(&Globals<V>) -> Result<V, InitError> + Send + 'static,
    {
        Self {
            header: DeclHeader::new(name, DeclKind::Variable, references),
            init: Some(Box::new(init)),
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self {
            header: DeclHeader::new(name, DeclKind::Function, Vec::<String>::new()),
            init: None,
        }
    }

    pub fn name(&self) -> &str {
        self.header.name()
    }

    pub(crate) fn into_parts(self) -> (DeclHeader, Option<Initializer<V>>) {
        (self.header, self.init)
    }
}

impl<V> fmt::Debug for Declaration<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("header", &self.header)
            .field("has_init", &self.init.is_some())
            .finish()
    }
}
