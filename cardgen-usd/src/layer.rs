//! In-memory model of a single USDA layer

use crate::value::{Metadata, Value};
use cardgen_core::{Error, Result};

/// Prim specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

/// Attribute variability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
    Config,
}

/// An attribute spec
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub type_name: String,
    pub is_array: bool,
    pub custom: bool,
    pub variability: Variability,
    pub default: Option<Value>,
    pub time_samples: Option<Vec<(f64, Value)>>,
    pub connections: Option<Value>,
    pub metadata: Metadata,
}

impl Attribute {
    /// Create an attribute with a default value
    pub fn new(type_name: &str, name: &str, value: Value) -> Self {
        let (type_name, is_array) = match type_name.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (type_name, false),
        };
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            is_array,
            custom: false,
            variability: Variability::Varying,
            default: Some(value),
            time_samples: None,
            connections: None,
            metadata: Metadata::new(),
        }
    }

    pub fn uniform(mut self) -> Self {
        self.variability = Variability::Uniform;
        self
    }

    /// Value at the default time.
    ///
    /// Falls back to the earliest time sample when no default is authored.
    /// A blocked default (`None`) resolves to nothing.
    pub fn resolved_value(&self) -> Option<&Value> {
        match &self.default {
            Some(value) if value.is_blocked() => None,
            Some(value) => Some(value),
            None => self
                .time_samples
                .as_ref()
                .and_then(|samples| {
                    samples
                        .iter()
                        .min_by(|a, b| a.0.total_cmp(&b.0))
                })
                .map(|(_, value)| value)
                .filter(|value| !value.is_blocked()),
        }
    }
}

/// A relationship spec
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub custom: bool,
    pub varying: bool,
    pub targets: Option<Value>,
    pub metadata: Metadata,
}

/// A property spec
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Attribute(Attribute),
    Relationship(Relationship),
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Attribute(attribute) => &attribute.name,
            Property::Relationship(relationship) => &relationship.name,
        }
    }
}

/// A `variantSet "name" = { ... }` block
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSet {
    pub name: String,
    /// Each variant body is held as an `over` prim named after the variant
    pub variants: Vec<PrimSpec>,
}

impl VariantSet {
    pub fn variant(&self, name: &str) -> Option<&PrimSpec> {
        self.variants.iter().find(|variant| variant.name == name)
    }
}

/// A prim spec
#[derive(Debug, Clone, PartialEq)]
pub struct PrimSpec {
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub name: String,
    pub metadata: Metadata,
    pub properties: Vec<Property>,
    pub children: Vec<PrimSpec>,
    pub variant_sets: Vec<VariantSet>,
    /// `reorder nameChildren/properties = [...]` statements, kept verbatim
    pub reorders: Vec<(String, Value)>,
}

impl PrimSpec {
    pub fn new(specifier: Specifier, type_name: Option<&str>, name: &str) -> Self {
        Self {
            specifier,
            type_name: type_name.map(str::to_string),
            name: name.to_string(),
            metadata: Metadata::new(),
            properties: Vec::new(),
            children: Vec::new(),
            variant_sets: Vec::new(),
            reorders: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.properties.iter().find_map(|property| match property {
            Property::Attribute(attribute) if attribute.name == name => Some(attribute),
            _ => None,
        })
    }

    /// Author `attribute`, replacing any property of the same name
    pub fn set_attribute(&mut self, attribute: Attribute) {
        match self
            .properties
            .iter_mut()
            .find(|property| property.name() == attribute.name)
        {
            Some(existing) => *existing = Property::Attribute(attribute),
            None => self.properties.push(Property::Attribute(attribute)),
        }
    }

    /// Merge a property parsed from a separate statement (`x.timeSamples`)
    /// into an existing attribute of the same name
    pub(crate) fn merge_property(&mut self, property: Property) {
        if let Property::Attribute(incoming) = &property {
            if let Some(Property::Attribute(existing)) = self
                .properties
                .iter_mut()
                .find(|p| p.name() == incoming.name)
            {
                if incoming.default.is_some() {
                    existing.default = incoming.default.clone();
                }
                if incoming.time_samples.is_some() {
                    existing.time_samples = incoming.time_samples.clone();
                }
                if incoming.connections.is_some() {
                    existing.connections = incoming.connections.clone();
                }
                existing
                    .metadata
                    .entries
                    .extend(incoming.metadata.entries.iter().cloned());
                return;
            }
        }
        self.properties.push(property);
    }

    pub fn child(&self, name: &str) -> Option<&PrimSpec> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut PrimSpec> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    pub fn variant_set(&self, name: &str) -> Option<&VariantSet> {
        self.variant_sets.iter().find(|set| set.name == name)
    }
}

/// A parsed USDA layer
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Where the layer came from, for messages
    pub identifier: String,
    pub version: String,
    pub metadata: Metadata,
    pub prims: Vec<PrimSpec>,
}

impl Layer {
    /// Create an empty layer
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            version: "1.0".to_string(),
            metadata: Metadata::new(),
            prims: Vec::new(),
        }
    }

    pub fn default_prim(&self) -> Option<&str> {
        self.metadata.get("defaultPrim").and_then(Value::as_str)
    }

    pub fn set_default_prim(&mut self, name: &str) {
        self.metadata.set("defaultPrim", Value::string(name));
    }

    /// Sublayer asset paths, strongest first
    pub fn sub_layers(&self) -> Vec<&str> {
        self.metadata
            .get("subLayers")
            .map(|value| value.items().into_iter().filter_map(Value::as_asset).collect())
            .unwrap_or_default()
    }

    pub fn set_sub_layers<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let assets = paths.into_iter().map(|p| Value::Asset(p.into())).collect();
        self.metadata.set("subLayers", Value::List(assets));
    }

    pub fn root_prim(&self, name: &str) -> Option<&PrimSpec> {
        self.prims.iter().find(|prim| prim.name == name)
    }

    /// Find a prim spec by absolute path (`/Root/Child`)
    pub fn prim_at_path(&self, path: &str) -> Option<&PrimSpec> {
        let mut names = split_prim_path(path)?.into_iter();
        let mut prim = self.root_prim(names.next()?)?;
        for name in names {
            prim = prim.child(name)?;
        }
        Some(prim)
    }

    /// The spec of the default prim in this layer, created as an `over` when
    /// the prim is only defined in a weaker layer.
    pub fn default_prim_spec_mut(&mut self) -> Result<&mut PrimSpec> {
        let name = self
            .default_prim()
            .map(str::to_string)
            .ok_or_else(|| Error::MissingDefaultPrim(self.identifier.clone()))?;
        if self.root_prim(&name).is_none() {
            self.prims.push(PrimSpec::new(Specifier::Over, None, &name));
        }
        self.prims
            .iter_mut()
            .find(|prim| prim.name == name)
            .ok_or(Error::MissingDefaultPrim(name))
    }
}

/// Split an absolute prim path into its element names
pub fn split_prim_path(path: &str) -> Option<Vec<&str>> {
    let trimmed = path.strip_prefix('/')?;
    let names: Vec<&str> = trimmed.split('/').filter(|n| !n.is_empty()).collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}
