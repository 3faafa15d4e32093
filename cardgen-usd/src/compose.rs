//! Scene composition
//!
//! Flattens a root layer and everything it reaches into a tree of composed
//! prims. Opinions are ordered strongest first: the root layer stack
//! (sublayers in authored order), then variant selections, then references
//! and payloads. This is enough to answer "which geometry is on stage and
//! where", not a full implementation of every composition arc.

use crate::layer::{PrimSpec, Property, Specifier};
use crate::resolve::{AssetLocation, LayerLoader, LoadedLayer};
use crate::value::Value;
use cardgen_core::{Error, Result};
use log::{debug, warn};
use std::collections::HashMap;

/// Deepest chain of sublayers or referenced layers followed
pub const MAX_LAYER_DEPTH: usize = 64;

/// Deepest prim namespace composed
pub const MAX_NAMESPACE_DEPTH: usize = 256;

/// A prim after composition
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrim {
    pub name: String,
    pub path: String,
    pub type_name: Option<String>,
    /// Strongest non-`over` specifier, `Over` when the prim is never defined
    pub specifier: Specifier,
    pub active: bool,
    /// Resolved attribute values; `None` marks a blocked attribute
    pub attributes: HashMap<String, Option<Value>>,
    pub children: Vec<ComposedPrim>,
}

impl ComposedPrim {
    /// Resolved value of an attribute
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).and_then(Option::as_ref)
    }

    pub fn is_defined(&self) -> bool {
        self.specifier != Specifier::Over
    }

    pub fn is_abstract(&self) -> bool {
        self.specifier == Specifier::Class
    }

    pub fn child(&self, name: &str) -> Option<&ComposedPrim> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// The composed stage
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedScene {
    pub default_prim: Option<String>,
    pub roots: Vec<ComposedPrim>,
}

impl ComposedScene {
    pub fn prim_at_path(&self, path: &str) -> Option<&ComposedPrim> {
        let mut names = crate::layer::split_prim_path(path)?.into_iter();
        let first = names.next()?;
        let mut prim = self.roots.iter().find(|prim| prim.name == first)?;
        for name in names {
            prim = prim.child(name)?;
        }
        Some(prim)
    }
}

/// Compose `root` with every layer it reaches through sublayers,
/// references and payloads
pub fn compose_scene(loader: &LayerLoader<'_>, root: &LoadedLayer) -> Result<ComposedScene> {
    let mut layers = LayerSet::new(loader);
    let root_index = layers.add(root.clone(), 0)?;
    let stacks = (0..layers.layers.len())
        .map(|index| layers.layer_stack(index))
        .collect::<Result<Vec<_>>>()?;
    debug!(
        "Composing {} with {} layer(s)",
        root.location,
        layers.layers.len()
    );

    let composer = Composer {
        layers: &layers,
        stacks,
    };
    let roots = composer.compose_roots(root_index)?;
    Ok(ComposedScene {
        default_prim: root.layer.default_prim().map(str::to_string),
        roots,
    })
}

/// Every layer reachable from the root, loaded once
struct LayerSet<'l> {
    loader: &'l LayerLoader<'l>,
    layers: Vec<LoadedLayer>,
    index: HashMap<AssetLocation, usize>,
    sublayers: Vec<Vec<usize>>,
}

impl<'l> LayerSet<'l> {
    fn new(loader: &'l LayerLoader<'l>) -> Self {
        Self {
            loader,
            layers: Vec::new(),
            index: HashMap::new(),
            sublayers: Vec::new(),
        }
    }

    fn add(&mut self, loaded: LoadedLayer, depth: usize) -> Result<usize> {
        let index = self.layers.len();
        self.index.insert(loaded.location.clone(), index);
        let location = loaded.location.clone();
        let sublayer_assets: Vec<String> = loaded
            .layer
            .sub_layers()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut arc_assets = Vec::new();
        for prim in &loaded.layer.prims {
            collect_arc_assets(prim, &mut arc_assets);
        }
        self.layers.push(loaded);
        self.sublayers.push(Vec::new());

        let mut sublayers = Vec::new();
        for asset in sublayer_assets {
            if let Some(sublayer) = self.ensure(&location.resolve(&asset), depth + 1)? {
                sublayers.push(sublayer);
            }
        }
        self.sublayers[index] = sublayers;

        for asset in arc_assets {
            self.ensure(&location.resolve(&asset), depth + 1)?;
        }
        Ok(index)
    }

    fn ensure(&mut self, location: &AssetLocation, depth: usize) -> Result<Option<usize>> {
        if let Some(&index) = self.index.get(location) {
            return Ok(Some(index));
        }
        if depth > MAX_LAYER_DEPTH {
            return Err(Error::InvalidData(format!(
                "layers nested deeper than {} at {}",
                MAX_LAYER_DEPTH, location
            )));
        }
        let loaded = match self.loader.load(location) {
            Ok(loaded) => loaded,
            Err(e @ Error::Parse { .. }) => return Err(e),
            Err(e) => {
                warn!("Skipping unresolved layer {}: {}", location, e);
                return Ok(None);
            }
        };
        // packages load as their root entry, which may already be known
        if let Some(&index) = self.index.get(&loaded.location) {
            self.index.insert(location.clone(), index);
            return Ok(Some(index));
        }
        let index = self.add(loaded, depth)?;
        self.index.insert(location.clone(), index);
        Ok(Some(index))
    }

    /// The layer stack rooted at `index`, strongest first
    fn layer_stack(&self, index: usize) -> Result<Vec<usize>> {
        let mut stack = Vec::new();
        let mut path = Vec::new();
        self.collect_stack(index, &mut path, &mut stack)?;
        Ok(stack)
    }

    fn collect_stack(&self, index: usize, path: &mut Vec<usize>, out: &mut Vec<usize>) -> Result<()> {
        if path.contains(&index) {
            return Err(Error::InvalidData(format!(
                "sublayer cycle through {}",
                self.layers[index].location
            )));
        }
        if out.contains(&index) {
            return Ok(());
        }
        out.push(index);
        path.push(index);
        for &sublayer in &self.sublayers[index] {
            self.collect_stack(sublayer, path, out)?;
        }
        path.pop();
        Ok(())
    }
}

fn collect_arc_assets(prim: &PrimSpec, out: &mut Vec<String>) {
    for key in ["references", "payload"] {
        for item in prim.metadata.list_items(key) {
            if let Some((Some(asset), _)) = item.as_reference() {
                out.push(asset.to_string());
            }
        }
    }
    for child in &prim.children {
        collect_arc_assets(child, out);
    }
    for set in &prim.variant_sets {
        for variant in &set.variants {
            collect_arc_assets(variant, out);
        }
    }
}

/// One contributing prim spec
#[derive(Debug, Clone, Copy)]
struct SpecRef<'s> {
    spec: &'s PrimSpec,
    /// Layer the spec was authored in; its assets resolve against it
    layer: usize,
    /// Root of the layer stack the spec belongs to, for internal references
    stack: usize,
    /// Spec whose arc brought this one in
    origin: Option<usize>,
}

struct Composer<'s> {
    layers: &'s LayerSet<'s>,
    stacks: Vec<Vec<usize>>,
}

impl<'s> Composer<'s> {
    fn compose_roots(&self, root: usize) -> Result<Vec<ComposedPrim>> {
        let mut names: Vec<&str> = Vec::new();
        for &layer in &self.stacks[root] {
            for prim in &self.layers.layers[layer].layer.prims {
                if !names.contains(&prim.name.as_str()) {
                    names.push(&prim.name);
                }
            }
        }

        names
            .into_iter()
            .map(|name| {
                let specs = self.stacks[root]
                    .iter()
                    .filter_map(|&layer| {
                        self.layers.layers[layer]
                            .layer
                            .root_prim(name)
                            .map(|spec| SpecRef {
                                spec,
                                layer,
                                stack: root,
                                origin: None,
                            })
                    })
                    .collect();
                self.compose_prim("", name, specs, 1)
            })
            .collect()
    }

    fn compose_prim(
        &self,
        parent_path: &str,
        name: &str,
        specs: Vec<SpecRef<'s>>,
        depth: usize,
    ) -> Result<ComposedPrim> {
        let path = format!("{}/{}", parent_path, name);
        if depth > MAX_NAMESPACE_DEPTH {
            return Err(Error::InvalidData(format!(
                "prim namespace deeper than {} at {}",
                MAX_NAMESPACE_DEPTH, path
            )));
        }
        let specs = self.expand(specs, &path)?;

        let type_name = specs.iter().find_map(|s| s.spec.type_name.clone());
        let specifier = specs
            .iter()
            .map(|s| s.spec.specifier)
            .find(|specifier| *specifier != Specifier::Over)
            .unwrap_or(Specifier::Over);
        let active = specs
            .iter()
            .find_map(|s| s.spec.metadata.get("active").and_then(Value::as_bool))
            .unwrap_or(true);

        let mut attributes = HashMap::new();
        for s in &specs {
            for property in &s.spec.properties {
                if let Property::Attribute(attribute) = property {
                    if attribute.default.is_none() && attribute.time_samples.is_none() {
                        continue;
                    }
                    attributes
                        .entry(attribute.name.clone())
                        .or_insert_with(|| attribute.resolved_value().cloned());
                }
            }
        }

        let mut children = Vec::new();
        // inactive prims contribute no descendants
        if active {
            let mut child_names: Vec<&str> = Vec::new();
            for s in &specs {
                for child in &s.spec.children {
                    if !child_names.contains(&child.name.as_str()) {
                        child_names.push(&child.name);
                    }
                }
            }
            for child_name in child_names {
                let child_specs = specs
                    .iter()
                    .filter_map(|s| {
                        s.spec.child(child_name).map(|spec| SpecRef {
                            spec,
                            origin: None,
                            ..*s
                        })
                    })
                    .collect();
                children.push(self.compose_prim(&path, child_name, child_specs, depth + 1)?);
            }
        }

        Ok(ComposedPrim {
            name: name.to_string(),
            path,
            type_name,
            specifier,
            active,
            attributes,
            children,
        })
    }

    /// Append the specs brought in by variant selections, references and
    /// payloads, following arcs transitively
    fn expand(&self, mut specs: Vec<SpecRef<'s>>, path: &str) -> Result<Vec<SpecRef<'s>>> {
        let mut i = 0;
        while i < specs.len() {
            let current = specs[i];

            for set in &current.spec.variant_sets {
                let selected = variant_selection(&specs, &set.name)
                    .and_then(|selection| set.variant(&selection));
                if let Some(variant) = selected {
                    self.push_arc_spec(&mut specs, i, variant, current.layer, current.stack, path)?;
                }
            }

            for key in ["references", "payload"] {
                for item in current.spec.metadata.list_items(key) {
                    let Some((asset, prim_path)) = item.as_reference() else {
                        continue;
                    };
                    let stack = match asset {
                        Some(asset) => {
                            let location = self.layers.layers[current.layer].location.resolve(asset);
                            match self.layers.index.get(&location) {
                                Some(&index) => index,
                                None => continue,
                            }
                        }
                        None => current.stack,
                    };
                    let target = match prim_path {
                        Some(target) => target.to_string(),
                        None => match self.layers.layers[stack].layer.default_prim() {
                            Some(name) => format!("/{}", name),
                            None => {
                                warn!(
                                    "{} targets {} which has no default prim",
                                    path, self.layers.layers[stack].location
                                );
                                continue;
                            }
                        },
                    };
                    for &layer in &self.stacks[stack] {
                        if let Some(spec) = self.layers.layers[layer].layer.prim_at_path(&target) {
                            self.push_arc_spec(&mut specs, i, spec, layer, stack, path)?;
                        }
                    }
                }
            }
            i += 1;
        }
        Ok(specs)
    }

    fn push_arc_spec(
        &self,
        specs: &mut Vec<SpecRef<'s>>,
        origin: usize,
        spec: &'s PrimSpec,
        layer: usize,
        stack: usize,
        path: &str,
    ) -> Result<()> {
        let mut at = Some(origin);
        while let Some(index) = at {
            if std::ptr::eq(specs[index].spec, spec) {
                return Err(Error::InvalidData(format!(
                    "composition cycle at {} through {}",
                    path, self.layers.layers[layer].location
                )));
            }
            at = specs[index].origin;
        }
        if specs.iter().any(|s| std::ptr::eq(s.spec, spec)) {
            return Ok(());
        }
        specs.push(SpecRef {
            spec,
            layer,
            stack,
            origin: Some(origin),
        });
        Ok(())
    }
}

fn variant_selection(specs: &[SpecRef<'_>], set: &str) -> Option<String> {
    specs.iter().find_map(|s| {
        s.spec
            .metadata
            .get("variants")
            .and_then(|variants| variants.dict_get(set))
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}
