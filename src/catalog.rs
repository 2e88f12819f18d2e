use std::fmt;
use std::sync::Arc;

use crate::unit::{Unit, UnitKind, UnitResult};

/// Constructor of one unit instance.
pub type UnitFactory = Arc<dyn Fn() -> UnitResult<Arc<dyn Unit>> + Send + Sync>;

/// One implementing type known to the runtime.
#[derive(Clone)]
pub struct CatalogEntry {
    kind: UnitKind,
    type_name: String,
    factory: UnitFactory,
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl CatalogEntry {
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn instantiate(&self) -> UnitResult<Arc<dyn Unit>> {
        (self.factory)()
    }
}

/// Registration table mapping type names to constructors.
///
/// The same type name may be registered more than once; the loader treats
/// every entry matching an artifact as a candidate and refuses to guess when
/// there is more than one.
#[derive(Clone, Default, Debug)]
pub struct UnitCatalog {
    entries: Vec<CatalogEntry>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register<F>(&mut self, kind: UnitKind, type_name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> UnitResult<Arc<dyn Unit>> + Send + Sync + 'static,
    {
        self.entries.push(CatalogEntry {
            kind,
            type_name: type_name.to_string(),
            factory: Arc::new(factory),
        });
        self
    }

    pub fn with_agent<U, F>(mut self, type_name: &str, factory: F) -> Self
    where
        U: Unit + 'static,
        F: Fn() -> U + Send + Sync + 'static,
    {
        self.register(UnitKind::Agent, type_name, move || {
            Ok(Arc::new(factory()) as Arc<dyn Unit>)
        });
        self
    }

    pub fn with_module<U, F>(mut self, type_name: &str, factory: F) -> Self
    where
        U: Unit + 'static,
        F: Fn() -> U + Send + Sync + 'static,
    {
        self.register(UnitKind::Module, type_name, move || {
            Ok(Arc::new(factory()) as Arc<dyn Unit>)
        });
        self
    }

    /// Appends every entry of `other`.
    pub fn extend(mut self, other: UnitCatalog) -> Self {
        self.entries.extend(other.entries);
        self
    }

    /// Entries of `kind` whose type name matches the artifact `stem`.
    pub fn candidates(&self, kind: UnitKind, stem: &str) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind && matches_stem(kind, &entry.type_name, stem))
            .collect()
    }

    pub fn type_names(&self, kind: UnitKind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.type_name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Naming rule linking an artifact stem to an implementing type.
///
/// Agents: the type name equals the stem ignoring ASCII case.
/// Modules: the type name equals the stem transliterated by [`pascal_case`].
pub fn matches_stem(kind: UnitKind, type_name: &str, stem: &str) -> bool {
    match kind {
        UnitKind::Agent => type_name.eq_ignore_ascii_case(stem),
        UnitKind::Module => type_name == pascal_case(stem),
    }
}

/// `quantum_computing` → `QuantumComputing`.
///
/// Each `_`-separated word gets its first character upper-cased and the rest
/// lower-cased; empty words vanish.
pub fn pascal_case(stem: &str) -> String {
    stem.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
