use std::sync::Arc;

use super::{Converter, Parser};

struct Slot<T: ?Sized> {
    plugin: Arc<T>,
    enabled: bool,
}

/// Parsers and converters in registration order, each with an enabled flag.
#[derive(Default)]
pub struct PluginRegistry {
    parsers: Vec<Slot<dyn Parser>>,
    converters: Vec<Slot<dyn Converter>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("parsers", &self.parser_names())
            .field("converters", &self.converter_names())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enabled parser. A second plugin with the same name is ignored.
    pub fn register_parser(&mut self, parser: Arc<dyn Parser>) -> bool {
        if self.parsers.iter().any(|s| s.plugin.name() == parser.name()) {
            tracing::warn!(name = parser.name(), "duplicate parser ignored");
            return false;
        }
        tracing::debug!(name = parser.name(), "parser registered");
        self.parsers.push(Slot {
            plugin: parser,
            enabled: true,
        });
        true
    }

    /// Register an enabled converter. A second plugin with the same name is ignored.
    pub fn register_converter(&mut self, converter: Arc<dyn Converter>) -> bool {
        if self
            .converters
            .iter()
            .any(|s| s.plugin.name() == converter.name())
        {
            tracing::warn!(name = converter.name(), "duplicate converter ignored");
            return false;
        }
        tracing::debug!(name = converter.name(), "converter registered");
        self.converters.push(Slot {
            plugin: converter,
            enabled: true,
        });
        true
    }

    /// Enable or disable every plugin called `name`. Returns false if none matched.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let mut found = false;
        for slot in self.parsers.iter_mut().filter(|s| s.plugin.name() == name) {
            slot.enabled = enabled;
            found = true;
        }
        for slot in self
            .converters
            .iter_mut()
            .filter(|s| s.plugin.name() == name)
        {
            slot.enabled = enabled;
            found = true;
        }
        found
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.parsers
            .iter()
            .map(|s| (s.plugin.name(), s.enabled))
            .chain(self.converters.iter().map(|s| (s.plugin.name(), s.enabled)))
            .any(|(n, enabled)| n == name && enabled)
    }

    pub fn enabled_parsers(&self) -> Vec<Arc<dyn Parser>> {
        self.parsers
            .iter()
            .filter(|s| s.enabled)
            .map(|s| Arc::clone(&s.plugin))
            .collect()
    }

    pub fn enabled_converters(&self) -> Vec<Arc<dyn Converter>> {
        self.converters
            .iter()
            .filter(|s| s.enabled)
            .map(|s| Arc::clone(&s.plugin))
            .collect()
    }

    pub fn parser_names(&self) -> Vec<String> {
        self.parsers
            .iter()
            .map(|s| s.plugin.name().to_string())
            .collect()
    }

    pub fn converter_names(&self) -> Vec<String> {
        self.converters
            .iter()
            .map(|s| s.plugin.name().to_string())
            .collect()
    }
}
