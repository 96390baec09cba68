//! The recursive descent behind [`Binder`](super::Binder).
//!
//! Binding is a [`serde::Deserializer`] over [`PropertySources`]: every node
//! is addressed by a [`PropertyName`], and the target type's `Deserialize`
//! impl drives which names are visited. Struct fields, sequence elements and
//! map entries are nodes; each is offered to the [`BindHandler`] before it is
//! bound.

use std::any::type_name;
use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use tracing::trace;

use super::context::{BindContext, Bindable};
use super::error::{BindError, BindFailure, ConversionError, UnboundElements};
use super::handler::BindHandler;
use crate::config::name::Element;
use crate::config::{
    ConfigurationProperty, PlaceholderResolver, PropertyName, PropertySources, SourceScope,
};

/// State shared by every node of one bind call.
pub(crate) struct Binding<'b, 'a> {
    handler: &'b dyn BindHandler,
    resolver: PlaceholderResolver<'a>,
    context: BindContext<'a>,
    scope: SourceScope<'a>,
}

impl<'b, 'a> Binding<'b, 'a> {
    pub(crate) fn new(
        handler: &'b dyn BindHandler,
        sources: &'a PropertySources,
        root_type: &'static str,
    ) -> Self {
        Self {
            handler,
            resolver: PlaceholderResolver::new(sources),
            context: BindContext::new(sources, root_type),
            scope: sources.scope(),
        }
    }

    /// The sources values are currently read from.
    pub(crate) fn sources(&self) -> SourceScope<'a> {
        self.scope
    }

    pub(crate) fn into_bound(self) -> Vec<ConfigurationProperty> {
        self.context.into_bound()
    }

    /// Offers a node to the handler. `false` means the node is skipped.
    pub(crate) fn start(&self, name: &PropertyName, target: &Bindable) -> bool {
        let proceed = self.handler.on_start(name, target, &self.context);
        if !proceed {
            trace!(name = %name, depth = self.context.depth(), "bind vetoed");
        }
        proceed
    }

    /// Binds a started node with `bind`, then reports the outcome.
    pub(crate) fn descend<T>(
        &mut self,
        name: PropertyName,
        target: &Bindable,
        bind: impl FnOnce(&mut Self, &PropertyName) -> Result<T, BindError>,
    ) -> Result<T, BindError> {
        self.context.push_name(name.clone());
        let result = match bind(self, &name) {
            Ok(value) => self.complete(&name, target, true).map(|()| value),
            Err(error) => Err(error),
        };
        let result = result.map_err(|error| self.fail(&name, target, error));
        self.context.pop_name();
        result
    }

    pub(crate) fn complete(
        &self,
        name: &PropertyName,
        target: &Bindable,
        bound: bool,
    ) -> Result<(), BindError> {
        if bound {
            self.handler.on_success(name, target, &self.context);
        }
        self.handler.on_finish(name, target, &self.context)
    }

    pub(crate) fn fail(&self, name: &PropertyName, target: &Bindable, error: BindError) -> BindError {
        self.handler
            .on_failure(name, target, &self.context, error.located(name))
    }

    /// Runs `enter` reading only from `scope`.
    fn scoped<T>(
        &mut self,
        scope: SourceScope<'a>,
        enter: impl FnOnce(&mut Self) -> Result<T, BindError>,
    ) -> Result<T, BindError> {
        let outer = std::mem::replace(&mut self.scope, scope);
        let result = enter(self);
        self.scope = outer;
        result
    }

    /// Runs `enter` one level deeper. The depth is restored on every path out.
    fn nested<T>(&mut self, enter: impl FnOnce(&mut Self) -> Result<T, BindError>) -> Result<T, BindError> {
        self.context.increase_depth();
        let result = enter(self);
        self.context.decrease_depth();
        result
    }
}

/// A value already taken from a comma-separated list.
struct Preset {
    value: String,
    property: ConfigurationProperty,
}

/// A resolved scalar value and the property it came from.
struct Scalar {
    value: String,
    property: ConfigurationProperty,
}

pub(crate) struct PropertyDeserializer<'r, 'b, 'a> {
    binding: &'r mut Binding<'b, 'a>,
    name: PropertyName,
    preset: Option<Preset>,
}

impl<'r, 'b, 'a> PropertyDeserializer<'r, 'b, 'a> {
    pub(crate) fn new(binding: &'r mut Binding<'b, 'a>, name: PropertyName) -> Self {
        Self {
            binding,
            name,
            preset: None,
        }
    }

    fn has_value(&self) -> bool {
        self.preset.is_some() || self.binding.sources().get(&self.name).is_some()
    }

    /// Takes the text at this name, resolving placeholders and marking the
    /// property as bound.
    fn scalar(&mut self, target: &'static str) -> Result<Scalar, BindError> {
        if let Some(Preset { value, property }) = self.preset.take() {
            return Ok(Scalar { value, property });
        }
        let Some(property) = self.binding.sources().get(&self.name) else {
            return Err(BindError::new(
                self.name.clone(),
                target,
                None,
                BindFailure::Message(format!(
                    "expected a value at '{}' but found nested properties",
                    self.name
                )),
            ));
        };
        let property = property.clone();
        self.binding.context.record_bound(property.clone());
        match self.binding.resolver.resolve(&property.value) {
            Ok(value) => Ok(Scalar { value, property }),
            Err(error) => Err(BindError::new(self.name.clone(), target, Some(property), error)),
        }
    }

    fn conversion_error(
        &self,
        scalar: Scalar,
        target: &'static str,
        message: impl fmt::Display,
    ) -> BindError {
        BindError::new(
            self.name.clone(),
            target,
            Some(scalar.property),
            ConversionError {
                value: scalar.value,
                target,
                message: message.to_string(),
            },
        )
    }

    /// Binds a sequence from the highest-precedence source holding anything
    /// at or below the name. Within that source a value at the name itself
    /// is split on commas; otherwise its indexed children are bound.
    fn bind_sequence<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if self.preset.is_some() {
            return self.bind_delimited(visitor);
        }
        match self.binding.sources().source_of(&self.name) {
            Some(scope) if scope.get(&self.name).is_none() => {
                trace!(name = %self.name, source = ?scope.names().next(), "binding indexed elements");
                let name = self.name;
                self.binding.scoped(scope, |binding| {
                    PropertyDeserializer::new(binding, name).bind_indexed(visitor)
                })
            }
            _ => self.bind_delimited(visitor),
        }
    }

    fn bind_indexed<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let target = type_name::<V::Value>();
        let name = self.name;
        self.binding.nested(|binding| {
            let mut access = IndexedAccess {
                binding,
                name,
                count: 0,
                vetoed: false,
            };
            let value = visitor.visit_seq(&mut access)?;
            access.check_unbound(target)?;
            Ok(value)
        })
    }

    fn bind_delimited<'de, V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value, BindError> {
        let scalar = self.scalar(type_name::<V::Value>())?;
        let values: Vec<String> = if scalar.value.trim().is_empty() {
            Vec::new()
        } else {
            scalar.value.split(',').map(|value| value.trim().to_string()).collect()
        };
        visitor.visit_seq(DelimitedAccess {
            binding: self.binding,
            name: self.name,
            property: scalar.property,
            values: values.into_iter(),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn is_indexed_child(name: &PropertyName) -> bool {
    name.last_element().and_then(Element::index).is_some()
}

macro_rules! deserialize_number {
    ($($method:ident => $visit:ident($ty:ty),)*) => {
        $(
            fn $method<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value, BindError> {
                let target = stringify!($ty);
                let scalar = self.scalar(target)?;
                match scalar.value.trim().parse::<$ty>() {
                    Ok(parsed) => visitor.$visit(parsed),
                    Err(error) => Err(self.conversion_error(scalar, target, error)),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for PropertyDeserializer<'_, '_, '_> {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value, BindError> {
        if self.has_value() {
            let scalar = self.scalar("string")?;
            return visitor.visit_string(scalar.value);
        }
        let children = self.binding.sources().children(&self.name);
        if children.is_empty() {
            visitor.visit_unit()
        } else if children.iter().all(is_indexed_child) {
            self.bind_sequence(visitor)
        } else {
            self.deserialize_map(visitor)
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value, BindError> {
        let scalar = self.scalar("bool")?;
        match parse_bool(&scalar.value) {
            Some(value) => visitor.visit_bool(value),
            None => Err(self.conversion_error(
                scalar,
                "bool",
                "expected one of true, false, yes, no, on, off, 1, 0",
            )),
        }
    }

    deserialize_number! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_i128 => visit_i128(i128),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_u128 => visit_u128(u128),
        deserialize_f32 => visit_f32(f32),
        deserialize_f64 => visit_f64(f64),
    }

    fn deserialize_char<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value, BindError> {
        let scalar = self.scalar("char")?;
        let mut chars = scalar.value.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => visitor.visit_char(ch),
            _ => Err(self.conversion_error(scalar, "char", "expected a single character")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value, BindError> {
        let scalar = self.scalar("String")?;
        visitor.visit_string(scalar.value)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(mut self, visitor: V) -> Result<V::Value, BindError> {
        let scalar = self.scalar("bytes")?;
        visitor.visit_byte_buf(scalar.value.into_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        if self.preset.is_some() || self.binding.sources().contains(&self.name) {
            visitor.visit_some(self)
        } else {
            visitor.visit_none()
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.bind_sequence(visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let target = type_name::<V::Value>();
        let children = self.binding.sources().children(&self.name);
        self.binding
            .nested(|binding| {
                visitor.visit_map(EntryAccess {
                    binding,
                    children: children.into_iter(),
                    pending: None,
                })
            })
            .map_err(|error| error.with_target(target))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        let target = type_name::<V::Value>();
        let parent = self.name;
        self.binding
            .nested(|binding| {
                visitor.visit_map(StructAccess {
                    binding,
                    name: parent,
                    owner: name,
                    fields: fields.iter(),
                    pending: None,
                })
            })
            .map_err(|error| error.with_target(target))
    }

    /// Unit variants bind from text, matched in relaxed form.
    fn deserialize_enum<V: Visitor<'de>>(
        mut self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        let target = type_name::<V::Value>();
        let scalar = self.scalar(target)?;
        let wanted = Element::dashed(scalar.value.trim());
        match variants
            .iter()
            .find(|variant| Element::dashed(variant) == wanted)
        {
            Some(variant) => visitor.visit_enum((*variant).into_deserializer()),
            None => {
                let message = format!("expected one of {}", variants.join(", "));
                Err(self.conversion_error(scalar, target, message))
            }
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }
}

/// Binds the fields of a struct that have properties beneath them.
struct StructAccess<'r, 'b, 'a> {
    binding: &'r mut Binding<'b, 'a>,
    name: PropertyName,
    owner: &'static str,
    fields: std::slice::Iter<'static, &'static str>,
    pending: Option<(PropertyName, Bindable)>,
}

impl<'de> MapAccess<'de> for StructAccess<'_, '_, '_> {
    type Error = BindError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, BindError> {
        for &field in self.fields.by_ref() {
            let child = self.name.append(field);
            if !self.binding.sources().contains(&child) {
                continue;
            }
            let target = Bindable::field(self.owner, field);
            if !self.binding.start(&child, &target) {
                continue;
            }
            self.pending = Some((child, target));
            return seed.deserialize(field.into_deserializer()).map(Some);
        }
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, BindError> {
        let (child, target) = self
            .pending
            .take()
            .ok_or_else(|| <BindError as de::Error>::custom("value requested before its field"))?;
        self.binding.descend(child, &target, |binding, name| {
            seed.deserialize(PropertyDeserializer::new(binding, name.clone()))
        })
    }
}

/// Binds the immediate children of a name as map entries.
struct EntryAccess<'r, 'b, 'a> {
    binding: &'r mut Binding<'b, 'a>,
    children: std::vec::IntoIter<PropertyName>,
    pending: Option<(PropertyName, Bindable)>,
}

impl<'de> MapAccess<'de> for EntryAccess<'_, '_, '_> {
    type Error = BindError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, BindError> {
        for child in self.children.by_ref() {
            let Some(key) = child.last_element().map(|element| element.as_str().to_string()) else {
                continue;
            };
            let target = Bindable::entry(key.clone());
            if !self.binding.start(&child, &target) {
                continue;
            }
            self.pending = Some((child, target));
            return seed.deserialize(key.into_deserializer()).map(Some);
        }
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, BindError> {
        let (child, target) = self
            .pending
            .take()
            .ok_or_else(|| <BindError as de::Error>::custom("value requested before its key"))?;
        self.binding.descend(child, &target, |binding, name| {
            seed.deserialize(PropertyDeserializer::new(binding, name.clone()))
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.children.len())
    }
}

/// Binds `name[0]`, `name[1]`, ... until the first missing index.
struct IndexedAccess<'r, 'b, 'a> {
    binding: &'r mut Binding<'b, 'a>,
    name: PropertyName,
    count: usize,
    vetoed: bool,
}

impl IndexedAccess<'_, '_, '_> {
    /// Fails when indexed children remain past the last contiguous index.
    fn check_unbound(&self, target: &'static str) -> Result<(), BindError> {
        if self.vetoed {
            return Ok(());
        }
        let sources = self.binding.sources();
        let mut unbound: Vec<ConfigurationProperty> = Vec::new();
        for child in sources.children(&self.name) {
            let beyond = child
                .last_element()
                .and_then(Element::index)
                .is_some_and(|index| index >= self.count);
            if !beyond {
                continue;
            }
            unbound.extend(sources.get(&child).cloned());
            unbound.extend(sources.descendants(&child).into_iter().cloned());
        }
        if unbound.is_empty() {
            return Ok(());
        }
        unbound.sort_by(|a, b| a.name.cmp(&b.name));
        Err(BindError::new(
            self.name.clone(),
            target,
            None,
            UnboundElements::new(unbound),
        ))
    }
}

impl<'de> SeqAccess<'de> for &mut IndexedAccess<'_, '_, '_> {
    type Error = BindError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, BindError> {
        if self.vetoed {
            return Ok(None);
        }
        let child = self.name.append_index(self.count);
        if !self.binding.sources().contains(&child) {
            return Ok(None);
        }
        let target = Bindable::element(self.count);
        if !self.binding.start(&child, &target) {
            self.vetoed = true;
            return Ok(None);
        }
        self.count += 1;
        self.binding
            .descend(child, &target, |binding, name| {
                seed.deserialize(PropertyDeserializer::new(binding, name.clone()))
            })
            .map(Some)
    }
}

/// Yields the parts of a comma-separated value.
struct DelimitedAccess<'r, 'b, 'a> {
    binding: &'r mut Binding<'b, 'a>,
    name: PropertyName,
    property: ConfigurationProperty,
    values: std::vec::IntoIter<String>,
}

impl<'de> SeqAccess<'de> for DelimitedAccess<'_, '_, '_> {
    type Error = BindError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, BindError> {
        let Some(value) = self.values.next() else {
            return Ok(None);
        };
        seed.deserialize(PropertyDeserializer {
            binding: &mut *self.binding,
            name: self.name.clone(),
            preset: Some(Preset {
                value,
                property: self.property.clone(),
            }),
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.values.len())
    }
}
