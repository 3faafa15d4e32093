//! Recursive-descent parser for USDA layers

use crate::layer::{Attribute, Layer, PrimSpec, Property, Relationship, Specifier, Variability, VariantSet};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::value::{DictEntry, ListOp, Metadata, MetadataEntry, Value};
use cardgen_core::{Error, Result};

/// Parse USDA source text into a layer
pub fn parse_layer(source: &str, identifier: &str) -> Result<Layer> {
    let (version, tokens) = tokenize(source, identifier)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        file: identifier,
    };

    let mut layer = Layer::new(identifier);
    layer.version = version;

    if parser.at_punct('(') {
        layer.metadata = parser.metadata_block()?;
    }
    while !parser.at_end() {
        layer.prims.push(parser.prim()?);
    }
    Ok(layer)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a str,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let (line, column) = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1));
        Error::Parse {
            file: self.file.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Result<TokenKind> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|t| t.kind.clone())
            .ok_or_else(|| self.error("unexpected end of file"))?;
        self.pos += 1;
        Ok(token)
    }

    fn at_punct(&self, c: char) -> bool {
        self.peek() == Some(&TokenKind::Punct(c))
    }

    fn at_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Ident(ident)) if ident == word)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.at_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.next()? {
            TokenKind::Ident(ident) => Ok(ident),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected identifier, found {:?}", other)))
            }
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.next()? {
            TokenKind::String(s) => Ok(s),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected string, found {:?}", other)))
            }
        }
    }

    /// `( entry* )` where an entry is a bare doc string or
    /// `[listop] key = value`, optionally separated by `;`
    fn metadata_block(&mut self) -> Result<Metadata> {
        self.expect_punct('(')?;
        let mut metadata = Metadata::new();
        loop {
            if self.eat_punct(')') {
                return Ok(metadata);
            }
            if self.eat_punct(';') {
                continue;
            }
            if let Some(TokenKind::String(doc)) = self.peek() {
                let doc = doc.clone();
                self.pos += 1;
                metadata.entries.push(MetadataEntry {
                    list_op: None,
                    key: "doc".to_string(),
                    value: Value::String(doc),
                });
                continue;
            }

            let mut key = self.expect_ident()?;
            let mut list_op = None;
            if let Some(op) = ListOp::from_keyword(&key) {
                if !self.at_punct('=') {
                    list_op = Some(op);
                    key = self.expect_ident()?;
                }
            }
            self.expect_punct('=')?;
            let value = self.value()?;
            metadata.entries.push(MetadataEntry {
                list_op,
                key,
                value,
            });
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.value_with(true)
    }

    /// Parse a value. `arguments` allows a reference to carry a trailing
    /// `(offset = ...)` block; it is off for attribute defaults, where a
    /// following block is the attribute's own metadata.
    fn value_with(&mut self, arguments: bool) -> Result<Value> {
        let value = match self.next()? {
            TokenKind::Integer(n) => Value::Int(n),
            TokenKind::Number(n) => Value::Number(n),
            TokenKind::String(s) => Value::String(s),
            TokenKind::Ident(ident) => match ident.as_str() {
                "inf" => Value::Number(f64::INFINITY),
                "nan" => Value::Number(f64::NAN),
                _ => Value::Ident(ident),
            },
            TokenKind::Asset(asset) => {
                let prim_path = match self.peek() {
                    Some(TokenKind::Path(path)) => {
                        let path = path.clone();
                        self.pos += 1;
                        Some(path)
                    }
                    _ => None,
                };
                self.reference(Some(asset), prim_path, arguments)?
            }
            TokenKind::Path(path) => self.reference(None, Some(path), arguments)?,
            TokenKind::Punct('(') => Value::Tuple(self.sequence(')')?),
            TokenKind::Punct('[') => Value::List(self.sequence(']')?),
            TokenKind::Punct('{') => self.braced()?,
            other => {
                self.pos -= 1;
                return Err(self.error(format!("expected value, found {:?}", other)));
            }
        };
        Ok(value)
    }

    /// Asset and/or path, with an optional trailing argument block
    fn reference(
        &mut self,
        asset: Option<String>,
        prim_path: Option<String>,
        arguments: bool,
    ) -> Result<Value> {
        let has_arguments = arguments
            && self.at_punct('(')
            && (self.peek_at(1) == Some(&TokenKind::Punct(')'))
                || (matches!(self.peek_at(1), Some(TokenKind::Ident(_)))
                    && self.peek_at(2) == Some(&TokenKind::Punct('='))));
        if has_arguments {
            let arguments = self.metadata_block()?;
            return Ok(Value::Reference {
                asset,
                prim_path,
                arguments,
            });
        }
        Ok(match (asset, prim_path) {
            (Some(asset), None) => Value::Asset(asset),
            (None, Some(path)) => Value::Path(path),
            (asset, prim_path) => Value::Reference {
                asset,
                prim_path,
                arguments: Metadata::new(),
            },
        })
    }

    fn sequence(&mut self, close: char) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct(close) {
                return Ok(items);
            }
            items.push(self.value()?);
            if !self.eat_punct(',') {
                self.expect_punct(close)?;
                return Ok(items);
            }
        }
    }

    /// `{ ... }`: time samples (`0: value,`) or a typed dictionary
    fn braced(&mut self) -> Result<Value> {
        let is_samples =
            matches!(self.peek(), Some(TokenKind::Number(_) | TokenKind::Integer(_)))
                && self.peek_at(1) == Some(&TokenKind::Punct(':'));
        if is_samples {
            let mut samples = Vec::new();
            loop {
                if self.eat_punct('}') {
                    return Ok(Value::TimeSamples(samples));
                }
                let time = match self.next()? {
                    TokenKind::Number(n) => n,
                    TokenKind::Integer(n) => n as f64,
                    _ => {
                        self.pos -= 1;
                        return Err(self.error("expected sample time"));
                    }
                };
                self.expect_punct(':')?;
                samples.push((time, self.value()?));
                if !self.eat_punct(',') {
                    self.expect_punct('}')?;
                    return Ok(Value::TimeSamples(samples));
                }
            }
        }

        let mut entries = Vec::new();
        loop {
            if self.eat_punct('}') {
                return Ok(Value::Dictionary(entries));
            }
            if self.eat_punct(';') {
                continue;
            }
            let mut type_name = self.expect_ident()?;
            if self.at_punct('[') && self.peek_at(1) == Some(&TokenKind::Punct(']')) {
                self.pos += 2;
                type_name.push_str("[]");
            }
            let key = match self.next()? {
                TokenKind::Ident(ident) => ident,
                TokenKind::String(s) => s,
                other => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected dictionary key, found {:?}", other)));
                }
            };
            self.expect_punct('=')?;
            let value = self.value()?;
            entries.push(DictEntry {
                type_name,
                key,
                value,
            });
        }
    }

    fn prim(&mut self) -> Result<PrimSpec> {
        let specifier = match self.expect_ident()?.as_str() {
            "def" => Specifier::Def,
            "over" => Specifier::Over,
            "class" => Specifier::Class,
            other => {
                self.pos -= 1;
                return Err(self.error(format!("expected def, over or class, found '{}'", other)));
            }
        };
        let type_name = match self.peek() {
            Some(TokenKind::Ident(_)) => Some(self.expect_ident()?),
            _ => None,
        };
        let name = self.expect_string()?;

        let mut prim = PrimSpec::new(specifier, type_name.as_deref(), &name);
        if self.at_punct('(') {
            prim.metadata = self.metadata_block()?;
        }
        self.prim_body(&mut prim)?;
        Ok(prim)
    }

    fn prim_body(&mut self, prim: &mut PrimSpec) -> Result<()> {
        self.expect_punct('{')?;
        loop {
            if self.eat_punct('}') {
                return Ok(());
            }
            if self.eat_punct(';') {
                continue;
            }
            let keyword = match self.peek() {
                Some(TokenKind::Ident(ident)) => ident.clone(),
                _ => return Err(self.error("expected prim, property or '}'")),
            };
            match keyword.as_str() {
                "def" | "over" | "class" => {
                    let child = self.prim()?;
                    prim.children.push(child);
                }
                "variantSet" => {
                    let set = self.variant_set()?;
                    prim.variant_sets.push(set);
                }
                "reorder" => {
                    self.pos += 1;
                    let target = self.expect_ident()?;
                    self.expect_punct('=')?;
                    let value = self.value()?;
                    prim.reorders.push((target, value));
                }
                _ => {
                    let property = self.property()?;
                    prim.merge_property(property);
                }
            }
        }
    }

    fn variant_set(&mut self) -> Result<VariantSet> {
        self.expect_ident()?;
        let name = self.expect_string()?;
        self.expect_punct('=')?;
        self.expect_punct('{')?;
        let mut variants = Vec::new();
        while !self.eat_punct('}') {
            let variant_name = self.expect_string()?;
            let mut variant = PrimSpec::new(Specifier::Over, None, &variant_name);
            if self.at_punct('(') {
                variant.metadata = self.metadata_block()?;
            }
            self.prim_body(&mut variant)?;
            variants.push(variant);
        }
        Ok(VariantSet { name, variants })
    }

    fn property(&mut self) -> Result<Property> {
        let mut custom = false;
        let mut variability = Variability::Varying;
        let mut explicit_varying = false;
        loop {
            if self.at_ident("custom") {
                custom = true;
            } else if self.at_ident("uniform") {
                variability = Variability::Uniform;
            } else if self.at_ident("config") {
                variability = Variability::Config;
            } else if self.at_ident("varying") {
                explicit_varying = true;
            } else if ListOp::from_keyword(self.peek_ident().unwrap_or_default()).is_some()
                && matches!(self.peek_at(1), Some(TokenKind::Ident(_)))
                && matches!(self.peek_at(2), Some(TokenKind::Ident(_)))
            {
                // list-edited connections or targets; the op itself is not kept
            } else {
                break;
            }
            self.pos += 1;
        }

        if self.at_ident("rel") {
            self.pos += 1;
            let name = self.expect_ident()?;
            let name = name.strip_suffix(".default").unwrap_or(&name).to_string();
            let targets = if self.eat_punct('=') {
                Some(self.value_with(false)?)
            } else {
                None
            };
            let metadata = if self.at_punct('(') {
                self.metadata_block()?
            } else {
                Metadata::new()
            };
            return Ok(Property::Relationship(Relationship {
                name,
                custom,
                varying: explicit_varying,
                targets,
                metadata,
            }));
        }

        let type_name = self.expect_ident()?;
        let is_array = if self.at_punct('[') && self.peek_at(1) == Some(&TokenKind::Punct(']')) {
            self.pos += 2;
            true
        } else {
            false
        };
        let full_name = self.expect_ident()?;

        let (name, suffix) = split_property_suffix(&full_name);
        let mut attribute = Attribute {
            name: name.to_string(),
            type_name,
            is_array,
            custom,
            variability,
            default: None,
            time_samples: None,
            connections: None,
            metadata: Metadata::new(),
        };

        if self.eat_punct('=') {
            let value = self.value_with(false)?;
            match suffix {
                Some("timeSamples") => match value {
                    Value::TimeSamples(samples) => attribute.time_samples = Some(samples),
                    Value::Dictionary(entries) if entries.is_empty() => {
                        attribute.time_samples = Some(Vec::new())
                    }
                    _ => return Err(self.error("expected time samples")),
                },
                Some("connect") => attribute.connections = Some(value),
                Some(other) => {
                    return Err(self.error(format!("unsupported property suffix '.{}'", other)))
                }
                None => attribute.default = Some(value),
            }
        }
        if self.at_punct('(') {
            attribute.metadata = self.metadata_block()?;
        }
        Ok(Property::Attribute(attribute))
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(TokenKind::Ident(ident)) => Some(ident),
            _ => None,
        }
    }
}

fn split_property_suffix(full_name: &str) -> (&str, Option<&str>) {
    for suffix in ["timeSamples", "connect", "spline", "default"] {
        if let Some(name) = full_name
            .strip_suffix(suffix)
            .and_then(|rest| rest.strip_suffix('.'))
        {
            if suffix == "default" {
                return (name, None);
            }
            return (name, Some(suffix));
        }
    }
    (full_name, None)
}
