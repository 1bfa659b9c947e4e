//! Schema manager
//!
//! Loads a schema set starting from one document, chooses the root of the
//! definition graph and runs the resolver over it.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info};

use super::builder::BuildState;
use super::document::SchemaDocument;
use super::resolver::Resolver;
use super::schema::ResolvedSchema;
use crate::documents::Document;
use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::names::validate_ncname;
use crate::namespaces::NamespaceBinding;

/// Options for one resolution run
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Top-level element to use as root (`prefix:local` or `local`)
    pub root_element: Option<String>,
    /// Directory relative entry locations are resolved against
    pub base_path: Option<PathBuf>,
    /// Prefix bindings registered before any document is read
    pub extra_namespaces: Vec<NamespaceBinding>,
    /// Resource limits
    pub limits: Limits,
}

impl ResolveOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the named top-level element as root
    pub fn with_root_element(mut self, name: impl Into<String>) -> Self {
        self.root_element = Some(name.into());
        self
    }

    /// Resolve relative entry locations against `path`
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Bind `prefix` to `uri` ahead of the documents' own bindings
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.extra_namespaces.push(NamespaceBinding {
            prefix: prefix.into(),
            uri: uri.into(),
        });
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// Entry point of a resolution run
#[derive(Debug, Clone)]
pub struct SchemaManager {
    options: ResolveOptions,
    loader: Loader,
}

impl Default for SchemaManager {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

impl SchemaManager {
    /// Create a manager reading documents from the file system
    pub fn new(options: ResolveOptions) -> Self {
        let loader = Loader::new().with_limits(options.limits.clone());
        Self { options, loader }
    }

    /// Replace the loader
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// The options of this manager
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Load the schema set at `location` and resolve it
    pub fn resolve(&self, location: &str) -> Result<ResolvedSchema> {
        let entry = self.entry_location(location)?;
        info!(location = %entry, "resolving schema set");

        let mut state = BuildState::new(self.options.limits.clone());
        for binding in &self.options.extra_namespaces {
            if !binding.prefix.is_empty() {
                validate_ncname(&binding.prefix)?;
            }
            state.registry.register(&binding.uri, Some(&binding.prefix));
        }

        let mut session = LoadSession::new(&self.loader, &mut state);
        session.load(entry, None)?;
        let mut documents = session.into_documents();
        state.limits.check_namespaces(state.registry.len())?;
        debug!(
            documents = documents.len(),
            namespaces = state.registry.len(),
            "schema set loaded"
        );

        let order = {
            let mut resolver = Resolver::new(&mut documents, &mut state);
            let root = match &self.options.root_element {
                Some(name) => resolver.named_root(name)?,
                None => resolver.synthetic_root()?,
            };
            resolver.run(root)?
        };

        let locations = documents.iter().map(|doc| doc.location.to_string()).collect();
        let schema = ResolvedSchema::from_graph(&state.graph, &order, state.registry.table())
            .with_documents(locations);
        info!(definitions = schema.len(), "schema set resolved");
        Ok(schema)
    }

    /// Run [`resolve`](Self::resolve) on a dedicated thread with a large stack
    ///
    /// Deeply nested schema sets recurse deeply; the worker gets 32MB of
    /// stack. The graph is handed back once complete.
    pub fn resolve_in_worker(&self, location: &str) -> Result<ResolvedSchema> {
        const STACK_SIZE: usize = 32 * 1024 * 1024;

        let manager = self.clone();
        let location = location.to_string();
        let handle = std::thread::Builder::new()
            .stack_size(STACK_SIZE)
            .name("xsd-resolver".to_string())
            .spawn(move || manager.resolve(&location))
            .map_err(|e| Error::Worker(format!("Failed to spawn resolver thread: {}", e)))?;

        handle
            .join()
            .map_err(|_| Error::Worker("Resolver thread panicked (possible stack overflow)".to_string()))?
    }

    fn entry_location(&self, location: &str) -> Result<Location> {
        match &self.options.base_path {
            Some(base) => Location::Path(base.clone()).resolve_in_directory(location),
            None => Location::parse(location),
        }
    }
}

/// Documents loaded so far in one run
struct LoadSession<'a> {
    loader: &'a Loader,
    state: &'a mut BuildState,
    documents: Vec<SchemaDocument>,
    /// Namespaces that already have a document
    namespaces: HashSet<usize>,
    /// (namespace index, location key) of every loaded document
    loaded: HashMap<(usize, String), usize>,
}

impl<'a> LoadSession<'a> {
    fn new(loader: &'a Loader, state: &'a mut BuildState) -> Self {
        Self {
            loader,
            state,
            documents: Vec::new(),
            namespaces: HashSet::new(),
            loaded: HashMap::new(),
        }
    }

    fn into_documents(self) -> Vec<SchemaDocument> {
        self.documents
    }

    /// Load one document, then its imports, then its includes
    fn load(&mut self, location: Location, includer_namespace: Option<&str>) -> Result<usize> {
        self.state.limits.check_documents(self.documents.len() + 1)?;

        let text = self.loader.load(&location)?;
        let parsed = Document::parse(text.as_bytes(), &self.state.limits)?;
        let root = parsed.root.ok_or_else(|| {
            Error::Parse(
                ParseError::new("Schema document has no root element")
                    .with_location(location.to_string()),
            )
        })?;
        let doc =
            SchemaDocument::new(location, root, includer_namespace, &mut self.state.registry)?;

        let index = self.documents.len();
        let namespace = doc.target_namespace;
        let target_uri = doc.target_uri.clone();
        let base = doc.location.clone();
        let imports = doc.imports();
        let includes = doc.includes();
        self.loaded.insert((namespace, base.key()), index);
        self.namespaces.insert(namespace);
        debug!(location = %base, namespace = %target_uri, chameleon = doc.chameleon, "loaded schema document");
        self.documents.push(doc);

        for import in imports {
            let imported = self.state.registry.register(&import.namespace, None);
            let Some(href) = import.location else {
                debug!(namespace = %import.namespace, "import without schemaLocation");
                continue;
            };
            if !self.namespaces.insert(imported) {
                debug!(namespace = %import.namespace, "namespace already loaded, import skipped");
                continue;
            }
            self.load(base.resolve(&href)?, None)?;
        }

        let chameleon_namespace = (!target_uri.is_empty()).then_some(target_uri.as_str());
        for href in includes {
            let location = base.resolve(&href)?;
            if self.loaded.contains_key(&(namespace, location.key())) {
                debug!(%location, "document already included");
                continue;
            }
            self.load(location, chameleon_namespace)?;
        }

        Ok(index)
    }
}
