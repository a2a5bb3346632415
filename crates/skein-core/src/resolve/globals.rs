//! Materialized global state.

use std::collections::HashMap;

use tracing::debug;

use super::order::{InitOrder, resolve};
use crate::domain::{DeclHeader, DeclKind, Declaration, InitError};

/// Global values, filled strictly in resolved order.
///
/// While initializers run, `get` fails for any name that is not yet
/// materialized instead of handing out a default value.
#[derive(Debug)]
pub struct Globals<V> {
    values: HashMap<String, V>,
    order: Vec<String>,
    initializing: Option<String>,
}

impl<V> Globals<V> {
    fn empty() -> Self {
        Self {
            values: HashMap::new(),
            order: Vec::new(),
            initializing: None,
        }
    }

    pub fn get(&self, name: &str) -> Result<&V, InitError> {
        self.values.get(name).ok_or_else(|| InitError::Uninitialized {
            name: name.to_string(),
            requested_by: self
                .initializing
                .clone()
                .unwrap_or_else(|| "<program>".to_string()),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Variable names in the order they were initialized.
    pub fn initialization_order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<V: Clone> Globals<V> {
    pub fn get_cloned(&self, name: &str) -> Result<V, InitError> {
        self.get(name).cloned()
    }
}

/// Resolve `decls` and run each variable initializer exactly once, in order.
pub fn initialize<V>(decls: Vec<Declaration<V>>) -> Result<Globals<V>, InitError> {
    let (headers, inits): (Vec<DeclHeader>, Vec<_>) =
        decls.into_iter().map(Declaration::into_parts).unzip();
    let order = resolve(&headers)?;
    run_initializers(&headers, inits, &order)
}

pub(crate) fn run_initializers<V>(
    headers: &[DeclHeader],
    mut inits: Vec<Option<crate::domain::Initializer<V>>>,
    order: &InitOrder,
) -> Result<Globals<V>, InitError> {
    let mut globals = Globals::empty();
    for &pos in order.positions() {
        let header = &headers[pos];
        if header.kind() == DeclKind::Function {
            continue;
        }
        let init = inits[pos]
            .take()
            .ok_or_else(|| InitError::MissingInitializer(header.name().to_string()))?;

        globals.initializing = Some(header.name().to_string());
        let value = init(&globals)?;
        globals.initializing = None;

        debug!(name = header.name(), "initialized global");
        globals.values.insert(header.name().to_string(), value);
        globals.order.push(header.name().to_string());
    }
    Ok(globals)
}
