use std::sync::Arc;

use super::Module;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub policies: Vec<String>,
}

/// Read-only list of the modules the host loaded, in load order.
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    modules: Arc<[ModuleInfo]>,
}

impl ModuleCatalog {
    pub fn from_modules(modules: &[Box<dyn Module>]) -> Self {
        Self {
            modules: modules
                .iter()
                .map(|module| ModuleInfo {
                    name: module.name().to_string(),
                    policies: module.policies(),
                })
                .collect(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|info| info.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|info| info.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|info| info.name == name)
    }

    pub fn policies(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(|info| info.policies.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
