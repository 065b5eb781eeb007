//! Vendor type name to definition lookup.

// self
use crate::{_prelude::*, module::ModuleDefinition};

/// Registered module definitions keyed by vendor type name.
#[derive(Clone, Default)]
pub struct ModuleRegistry(HashMap<String, Arc<dyn ModuleDefinition>>);
impl ModuleRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a definition, replacing any previous one with the same name.
	pub fn with_definition(mut self, definition: impl ModuleDefinition) -> Self {
		self.insert(Arc::new(definition));

		self
	}

	/// Registers a shared definition.
	pub fn insert(&mut self, definition: Arc<dyn ModuleDefinition>) {
		self.0.insert(definition.module_name().to_owned(), definition);
	}

	/// Resolves the definition for `name`.
	pub fn get(&self, name: &str) -> Result<Arc<dyn ModuleDefinition>> {
		self.0.get(name).cloned().ok_or_else(|| Error::UnknownModule { name: name.to_owned() })
	}

	/// Registered names, sorted.
	pub fn names(&self) -> Vec<&str> {
		let mut names = self.0.keys().map(String::as_str).collect::<Vec<_>>();

		names.sort_unstable();

		names
	}
}
impl Debug for ModuleRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ModuleRegistry").field(&self.names()).finish()
	}
}
