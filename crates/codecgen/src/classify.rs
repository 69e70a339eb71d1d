//! Leaf classification of concrete types.
//!
//! Decides, from the type expression alone, whether a type is a primitive, one of
//! the runtime's known adapters, a collection, an array, a map, or a declared type
//! whose strategy depends on the universe.

use crate::types::ConcreteType;
use serde::{Deserialize, Serialize};

/// Non-nullable scalar kinds, always written as literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
}

impl PrimitiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => PrimitiveKind::Boolean,
            "byte" => PrimitiveKind::Byte,
            "short" => PrimitiveKind::Short,
            "int" => PrimitiveKind::Int,
            "long" => PrimitiveKind::Long,
            "float" => PrimitiveKind::Float,
            "double" => PrimitiveKind::Double,
            "char" => PrimitiveKind::Char,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Char => "char",
        }
    }

    /// Rust type used for the kind in generated code.
    pub fn rust_type(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "bool",
            PrimitiveKind::Byte => "i8",
            PrimitiveKind::Short => "i16",
            PrimitiveKind::Int => "i32",
            PrimitiveKind::Long => "i64",
            PrimitiveKind::Float => "f32",
            PrimitiveKind::Double => "f64",
            PrimitiveKind::Char => "char",
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Int | PrimitiveKind::Long
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }
}

/// Nullable types served by the runtime's fixed adapter library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownAdapter {
    String,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    Character,
    Number,
    /// Arbitrary JSON tree (`JsonElement`, `Object`).
    JsonTree,
}

impl KnownAdapter {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match strip_platform_package(name) {
            "String" | "CharSequence" => KnownAdapter::String,
            "Boolean" => KnownAdapter::Boolean,
            "Byte" => KnownAdapter::Byte,
            "Short" => KnownAdapter::Short,
            "Integer" => KnownAdapter::Integer,
            "Long" => KnownAdapter::Long,
            "Float" => KnownAdapter::Float,
            "Double" => KnownAdapter::Double,
            "Character" => KnownAdapter::Character,
            "Number" => KnownAdapter::Number,
            "Object" | "JsonElement" => KnownAdapter::JsonTree,
            _ => return None,
        })
    }

    /// Primitive kind a boxed type wraps.
    pub fn unboxed(&self) -> Option<PrimitiveKind> {
        Some(match self {
            KnownAdapter::Boolean => PrimitiveKind::Boolean,
            KnownAdapter::Byte => PrimitiveKind::Byte,
            KnownAdapter::Short => PrimitiveKind::Short,
            KnownAdapter::Integer => PrimitiveKind::Int,
            KnownAdapter::Long => PrimitiveKind::Long,
            KnownAdapter::Float => PrimitiveKind::Float,
            KnownAdapter::Double => PrimitiveKind::Double,
            KnownAdapter::Character => PrimitiveKind::Char,
            _ => return None,
        })
    }
}

/// Sequence types rendered as JSON arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    List,
    ArrayList,
    Collection,
}

impl CollectionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match strip_platform_package(name) {
            "List" => CollectionKind::List,
            "ArrayList" => CollectionKind::ArrayList,
            "Collection" => CollectionKind::Collection,
            _ => return None,
        })
    }
}

/// Map types rendered as JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    Map,
    HashMap,
    LinkedHashMap,
    ConcurrentHashMap,
    TreeMap,
}

impl MapKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match strip_platform_package(name) {
            "Map" => MapKind::Map,
            "HashMap" => MapKind::HashMap,
            "LinkedHashMap" => MapKind::LinkedHashMap,
            "ConcurrentHashMap" => MapKind::ConcurrentHashMap,
            "TreeMap" => MapKind::TreeMap,
            _ => return None,
        })
    }
}

/// Structural classification of a concrete type.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Primitive(PrimitiveKind),
    Known(KnownAdapter),
    List(CollectionKind, ConcreteType),
    Array(ConcreteType),
    Map(MapKind, ConcreteType, ConcreteType),
    /// Anything else; its strategy is decided against the universe.
    Declared(ConcreteType),
}

/// Classify `ty`, rejecting collection and map types of the wrong arity.
pub fn shape(ty: &ConcreteType) -> Result<Shape, String> {
    if let Some(elem) = ty.element() {
        return Ok(Shape::Array(elem));
    }
    let Some(name) = ty.base_name() else {
        return Ok(Shape::Declared(ty.clone()));
    };
    let args = ty.args();
    if let Some(kind) = PrimitiveKind::from_name(name) {
        return Ok(Shape::Primitive(kind));
    }
    if let Some(known) = KnownAdapter::from_name(name) {
        if !args.is_empty() {
            return Err(format!("`{}` takes no type arguments", name));
        }
        return Ok(Shape::Known(known));
    }
    if let Some(kind) = CollectionKind::from_name(name) {
        return match <[ConcreteType; 1]>::try_from(args) {
            Ok([elem]) => Ok(Shape::List(kind, elem)),
            Err(args) if args.is_empty() => Err(format!("raw collection `{}`", name)),
            Err(args) => Err(format!(
                "collection `{}` needs one type argument, found {}",
                name,
                args.len()
            )),
        };
    }
    if let Some(kind) = MapKind::from_name(name) {
        return match <[ConcreteType; 2]>::try_from(args) {
            Ok([key, value]) => Ok(Shape::Map(kind, key, value)),
            Err(args) if args.is_empty() => Err(format!("raw map `{}`", name)),
            Err(args) => Err(format!(
                "map `{}` needs two type arguments, found {}",
                name,
                args.len()
            )),
        };
    }
    Ok(Shape::Declared(ty.clone()))
}

/// Whether `shape` can be used as a map key without a declared enum.
pub fn is_string_like_key(shape: &Shape) -> bool {
    match shape {
        Shape::Primitive(_) => true,
        Shape::Known(known) => *known == KnownAdapter::String || known.unboxed().is_some(),
        _ => false,
    }
}

fn strip_platform_package(name: &str) -> &str {
    for prefix in [
        "java.lang.",
        "java.util.concurrent.",
        "java.util.",
        "com.google.gson.",
    ] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return rest;
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRef;

    fn concrete(text: &str) -> ConcreteType {
        ConcreteType::try_from(TypeRef::parse(text).unwrap()).unwrap()
    }

    #[test]
    fn test_shape_of_leaves() {
        assert_eq!(
            shape(&concrete("int")).unwrap(),
            Shape::Primitive(PrimitiveKind::Int)
        );
        assert_eq!(
            shape(&concrete("java.lang.String")).unwrap(),
            Shape::Known(KnownAdapter::String)
        );
        assert_eq!(
            shape(&concrete("JsonElement")).unwrap(),
            Shape::Known(KnownAdapter::JsonTree)
        );
        assert!(matches!(
            shape(&concrete("com.example.Video")).unwrap(),
            Shape::Declared(_)
        ));
    }

    #[test]
    fn test_shape_of_containers() {
        match shape(&concrete("java.util.ArrayList<Video>")).unwrap() {
            Shape::List(CollectionKind::ArrayList, elem) => assert_eq!(elem.to_string(), "Video"),
            other => panic!("unexpected {:?}", other),
        }
        match shape(&concrete("Map<String, List<Video>>")).unwrap() {
            Shape::Map(MapKind::Map, key, value) => {
                assert_eq!(key.to_string(), "String");
                assert_eq!(value.to_string(), "List<Video>");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            shape(&concrete("int[]")).unwrap(),
            Shape::Array(_)
        ));
    }

    #[test]
    fn test_shape_rejects_wrong_arity() {
        assert!(shape(&concrete("List")).unwrap_err().contains("raw collection"));
        assert!(shape(&concrete("Map<String>")).unwrap_err().contains("two type arguments"));
        assert!(shape(&concrete("String<Integer>")).is_err());
    }

    #[test]
    fn test_string_like_keys() {
        assert!(is_string_like_key(&Shape::Known(KnownAdapter::Integer)));
        assert!(is_string_like_key(&Shape::Primitive(PrimitiveKind::Long)));
        assert!(!is_string_like_key(&Shape::Known(KnownAdapter::JsonTree)));
    }
}
