//! Rust writer for codec IR.
//!
//! Each unit becomes a unit struct implementing the runtime's `TypeAdapter<T>`.
//! The index declares every unit module and a `lookup` chain over type keys.
//! Generated code names the runtime crate through the `rt` alias.

use super::{RenderContext, Writer};
use crate::classify::{shape, KnownAdapter, MapKind, PrimitiveKind, Shape};
use crate::decl::AdapterKind;
use crate::ir::*;
use crate::registry::AdapterRegistry;
use crate::types::ConcreteType;
use std::fmt::Write;

/// Static instance of the Rust writer.
pub static RUST_WRITER: RustWriter = RustWriter;

/// Rust writer implementing the Writer trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustWriter;

impl Writer for RustWriter {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extension(&self) -> &'static str {
        "rs"
    }

    fn file_stem(&self, unit: &CodecUnit) -> String {
        snake_case(&unit.ident)
    }

    fn is_generated_unit(&self, contents: &str) -> bool {
        contents.lines().next().is_some_and(|first| {
            first.starts_with("//! Codec for `") && first.contains("generated by codecgen")
        })
    }

    fn index_file(&self) -> &'static str {
        "mod.rs"
    }

    fn write_unit(
        &self,
        unit: &CodecUnit,
        registry: &AdapterRegistry,
        ctx: &RenderContext,
    ) -> String {
        UnitEmitter::emit(unit, registry, ctx)
    }

    fn write_index(
        &self,
        units: &[CodecUnit],
        registry: &AdapterRegistry,
        ctx: &RenderContext,
    ) -> String {
        let mut out = String::new();
        writeln!(
            out,
            "//! Codecs generated by codecgen for module `{}`. Do not edit.",
            ctx.module
        )
        .unwrap();
        out.push('\n');
        writeln!(out, "use {} as rt;", ctx.runtime_crate).unwrap();
        out.push('\n');
        for unit in units {
            writeln!(out, "pub mod {};", self.file_stem(unit)).unwrap();
        }
        if !units.is_empty() {
            out.push('\n');
        }
        for unit in units {
            writeln!(out, "pub use {}::{};", self.file_stem(unit), unit.ident).unwrap();
        }
        if !units.is_empty() {
            out.push('\n');
        }
        out.push_str("/// Codec generated for `descriptor` by this module, if any.\n");
        out.push_str(
            "pub fn lookup(descriptor: &str) -> Option<&'static dyn rt::ErasedAdapter> {\n",
        );
        for (key, ident) in registry.generated() {
            writeln!(out, "    if descriptor == {:?} {{", key.as_str()).unwrap();
            writeln!(out, "        return Some(&{});", ident).unwrap();
            out.push_str("    }\n");
        }
        out.push_str("    None\n}\n");
        out
    }
}

/// Which half of the adapter a signature opens.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Proc {
    Write,
    Read,
}

/// Emits one codec unit as a Rust source file.
struct UnitEmitter<'a> {
    output: String,
    indent: usize,
    unit: &'a CodecUnit,
    registry: &'a AdapterRegistry,
    ctx: &'a RenderContext,
    target: String,
}

impl<'a> UnitEmitter<'a> {
    fn emit(unit: &'a CodecUnit, registry: &'a AdapterRegistry, ctx: &'a RenderContext) -> String {
        let mut emitter = Self {
            output: String::new(),
            indent: 0,
            unit,
            registry,
            ctx,
            target: rust_type(&unit.target, ctx),
        };
        emitter.write_header();
        match &unit.body {
            CodecBody::Object(codec) => emitter.write_object(codec),
            CodecBody::Enum(codec) => emitter.write_enum(codec),
        }
        emitter.output
    }

    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("    ");
            }
            self.output.push_str(text);
        }
        self.output.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    fn write_header(&mut self) {
        let key = self.unit.key.as_str();
        writeln!(
            self.output,
            "//! Codec for `{}`, generated by codecgen for module `{}`. Do not edit.",
            key, self.ctx.module
        )
        .unwrap();
        self.output
            .push_str("\n#![allow(non_snake_case, unused_mut, unused_variables)]\n\n");
        writeln!(self.output, "use {} as rt;", self.ctx.runtime_crate).unwrap();
        self.output
            .push_str("use rt::{CodecError, JsonReader, JsonWriter, Token, TypeAdapter};\n\n");
        writeln!(self.output, "/// Reads and writes `{}`.", key).unwrap();
        self.output
            .push_str("#[derive(Debug, Clone, Copy, Default)]\n");
        writeln!(self.output, "pub struct {};\n", self.unit.ident).unwrap();
    }

    fn write_signatures(&mut self, proc: Proc) {
        let target = self.target.clone();
        match proc {
            Proc::Write => self.open(&format!(
                "fn write(&self, writer: &mut dyn JsonWriter, value: Option<&{}>) -> Result<(), CodecError> {{",
                target
            )),
            Proc::Read => self.open(&format!(
                "fn read(&self, reader: &mut dyn JsonReader) -> Result<Option<{}>, CodecError> {{",
                target
            )),
        }
    }

    fn write_object(&mut self, codec: &ObjectCodec) {
        self.open(&format!(
            "impl TypeAdapter<{}> for {} {{",
            self.target, self.unit.ident
        ));

        self.write_signatures(Proc::Write);
        self.write_slots(codec);
        self.write_block(codec, &codec.write, true);
        if !matches!(codec.write.last(), Some(Stmt::Return { .. })) {
            self.line("Ok(())");
        }
        self.close("}");
        self.line("");

        self.write_signatures(Proc::Read);
        self.write_slots(codec);
        self.write_block(codec, &codec.read, true);
        self.close("}");
        self.close("}");
    }

    fn write_slots(&mut self, codec: &ObjectCodec) {
        for slot in &codec.adapters {
            let expr = self.adapter_expr(&slot.spec, Some(&slot.ty));
            self.line(&format!("let slot{} = {};", slot.id.0, expr));
        }
    }

    fn write_block(&mut self, codec: &ObjectCodec, block: &Block, top: bool) {
        for (i, stmt) in block.iter().enumerate() {
            let tail = top && i + 1 == block.len();
            self.write_stmt(codec, stmt, tail);
        }
    }

    fn write_stmt(&mut self, codec: &ObjectCodec, stmt: &Stmt, tail: bool) {
        match stmt {
            Stmt::BindValue { absent } => {
                self.open("let Some(value) = value else {");
                self.write_block(codec, absent, false);
                self.close("};");
            }
            Stmt::Emit { emit } => {
                let text = match emit {
                    Emit::BeginObject => "writer.begin_object()?;".to_string(),
                    Emit::EndObject => "writer.end_object()?;".to_string(),
                    Emit::Name(name) => format!("writer.name({:?})?;", name),
                    Emit::Null => "writer.null_value()?;".to_string(),
                };
                self.line(&text);
            }
            Stmt::Consume { consume } => self.line(match consume {
                Consume::BeginObject => "reader.begin_object()?;",
                Consume::EndObject => "reader.end_object()?;",
                Consume::Null => "reader.next_null()?;",
                Consume::Skip => "reader.skip_value()?;",
            }),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.open(&format!("if {} {{", cond_expr(codec, cond)));
                self.write_block(codec, then, false);
                if otherwise.is_empty() {
                    self.close("}");
                } else {
                    self.close("} else {");
                    self.indent += 1;
                    self.write_block(codec, otherwise, false);
                    self.close("}");
                }
            }
            Stmt::Instantiate => {
                let text = format!("let mut object = <{}>::default();", self.target);
                self.line(&text);
            }
            Stmt::EachMember { body } => {
                self.open("while reader.has_next()? {");
                if body.iter().any(dispatches) {
                    self.line("let name = reader.next_name()?;");
                } else {
                    self.line("reader.next_name()?;");
                }
                self.write_block(codec, body, false);
                self.close("}");
            }
            Stmt::Dispatch { arms, fallback } => {
                self.open("match name.as_str() {");
                for arm in arms {
                    let names: Vec<String> = arm.names.iter().map(|n| format!("{:?}", n)).collect();
                    self.open(&format!("{} => {{", names.join(" | ")));
                    self.write_block(codec, &arm.body, false);
                    self.close("}");
                }
                self.open("_ => {");
                self.write_block(codec, fallback, false);
                self.close("}");
                self.close("}");
            }
            Stmt::WriteField { field } => {
                let slot = codec.field(*field);
                let getter = slot.accessor.getter_expr("value");
                let text = match slot.value {
                    FieldValue::Literal { .. } => format!("writer.value({}.into())?;", getter),
                    FieldValue::Adapter { slot: id } if slot.primitive().is_some() => {
                        format!("slot{}.write(writer, Some(&{}))?;", id.0, getter)
                    }
                    FieldValue::Adapter { slot: id } => {
                        format!("slot{}.write(writer, {}.as_ref())?;", id.0, getter)
                    }
                };
                self.line(&text);
            }
            Stmt::ReadField { field } => {
                let slot = codec.field(*field);
                let value = match slot.value {
                    FieldValue::Literal { primitive } => {
                        format!("reader.next_{}()?", primitive.rust_type())
                    }
                    FieldValue::Adapter { slot: id } if slot.primitive().is_some() => {
                        format!("slot{}.read(reader)?.unwrap_or_default()", id.0)
                    }
                    FieldValue::Adapter { slot: id } => format!("slot{}.read(reader)?", id.0),
                };
                let text = slot.accessor.setter_stmt("object", &value);
                self.line(&text);
            }
            Stmt::Fail { failure } => {
                let (ctor, field) = match *failure {
                    Failure::NullField { field } => ("null_field", field),
                    Failure::MissingField { field } => ("missing_field", field),
                };
                let text = format!(
                    "return Err(CodecError::{}({:?}, {:?}));",
                    ctor,
                    self.unit.key.as_str(),
                    codec.field(field).name
                );
                self.line(&text);
            }
            Stmt::Return { returned } => {
                let value = match returned {
                    Returned::Done => "Ok(())",
                    Returned::Absent => "Ok(None)",
                    Returned::Object => "Ok(Some(object))",
                };
                if tail {
                    self.line(value);
                } else {
                    self.line(&format!("return {};", value));
                }
            }
        }
    }

    fn write_enum(&mut self, codec: &EnumCodec) {
        let target = self.target.clone();
        self.open(&format!("impl TypeAdapter<{}> for {} {{", target, self.unit.ident));

        self.write_signatures(Proc::Write);
        self.open("let Some(value) = value else {");
        self.line("return writer.null_value();");
        self.close("};");
        if codec.constants.is_empty() {
            self.line("match *value {}");
        } else {
            self.open("let name = match value {");
            for entry in &codec.constants {
                let text = format!(
                    "{}::{} => {:?},",
                    target,
                    escape(&entry.constant),
                    entry.wire_name
                );
                self.line(&text);
            }
            self.close("};");
            self.line("writer.string_value(name)");
        }
        self.close("}");
        self.line("");

        self.write_signatures(Proc::Read);
        self.open("if reader.peek()? == Token::Null {");
        self.line("reader.next_null()?;");
        self.line("return Ok(None);");
        self.close("}");
        self.line("let name = reader.next_string()?;");
        self.open("match name.as_str() {");
        let mut table = codec.name_to_constant();
        for entry in &codec.constants {
            // First constant to claim a name owns it.
            let names: Vec<String> = std::iter::once(&entry.wire_name)
                .chain(&entry.alternates)
                .filter(|name| {
                    table.get(name.as_str()) == Some(&entry.constant.as_str())
                        && table.remove(name.as_str()).is_some()
                })
                .map(|name| format!("{:?}", name))
                .collect();
            if names.is_empty() {
                continue;
            }
            let text = format!(
                "{} => Ok(Some({}::{})),",
                names.join(" | "),
                target,
                escape(&entry.constant)
            );
            self.line(&text);
        }
        let text = format!(
            "other => Err(CodecError::unknown_constant({:?}, other)),",
            self.unit.key.as_str()
        );
        self.line(&text);
        self.close("}");
        self.close("}");
        self.close("}");
    }

    /// Expression constructing the adapter for `spec`; `ty` is the value type
    /// when known.
    fn adapter_expr(&self, spec: &AdapterSpec, ty: Option<&ConcreteType>) -> String {
        let args = ty.map(ConcreteType::args).unwrap_or_default();
        match spec {
            AdapterSpec::Primitive { primitive } => {
                format!("rt::known::{}", primitive_const(*primitive))
            }
            AdapterSpec::Known { known } => format!("rt::known::{}", known_const(*known)),
            AdapterSpec::List { element, .. } => format!(
                "rt::known::ListAdapter::new({})",
                self.adapter_expr(element, args.first())
            ),
            AdapterSpec::Array { element } => {
                let elem = ty.and_then(ConcreteType::element);
                format!(
                    "rt::known::ArrayAdapter::new({})",
                    self.adapter_expr(element, elem.as_ref())
                )
            }
            AdapterSpec::Map { map, key, value } => {
                let ctor = match map {
                    MapKind::LinkedHashMap => "linked",
                    MapKind::TreeMap => "tree",
                    MapKind::Map | MapKind::HashMap | MapKind::ConcurrentHashMap => "hash",
                };
                format!(
                    "rt::known::MapAdapter::{}({}, {})",
                    ctor,
                    self.adapter_expr(key, args.first()),
                    self.adapter_expr(value, args.get(1))
                )
            }
            AdapterSpec::Generated { key } => match self.registry.ident(key) {
                Some(ident) => format!("super::{}", ident),
                None => self.delegate(key.as_str(), ty),
            },
            AdapterSpec::External { key } | AdapterSpec::Dynamic { key } => {
                self.delegate(key.as_str(), ty)
            }
            AdapterSpec::Custom {
                path,
                adapter,
                null_safe,
            } => {
                let base = match adapter {
                    AdapterKind::TypeAdapter => format!("{}::default()", path),
                    AdapterKind::Factory => format!(
                        "{}::default().create::<{}>()",
                        path,
                        self.type_or_infer(ty)
                    ),
                    AdapterKind::Tree => {
                        format!("rt::known::TreeAdapter::new({}::default())", path)
                    }
                };
                if *null_safe {
                    format!("rt::known::NullSafe::new({})", base)
                } else {
                    base
                }
            }
        }
    }

    fn delegate(&self, key: &str, ty: Option<&ConcreteType>) -> String {
        format!("rt::delegate::<{}>({:?})", self.type_or_infer(ty), key)
    }

    fn type_or_infer(&self, ty: Option<&ConcreteType>) -> String {
        ty.map(|t| rust_type(t, self.ctx))
            .unwrap_or_else(|| "_".to_string())
    }
}

fn dispatches(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Dispatch { .. } => true,
        Stmt::If {
            then, otherwise, ..
        } => then.iter().chain(otherwise).any(dispatches),
        _ => false,
    }
}

fn cond_expr(codec: &ObjectCodec, cond: &Cond) -> String {
    let subject = |subject: Subject| match subject {
        Subject::Value => "value",
        Subject::Object => "object",
    };
    match *cond {
        Cond::Peek { kind } => format!("reader.peek()? == Token::{}", kind.as_str()),
        Cond::NotPeek { kind } => format!("reader.peek()? != Token::{}", kind.as_str()),
        Cond::Present { subject: s, field } => format!(
            "{}.is_some()",
            codec.field(field).accessor.getter_expr(subject(s))
        ),
        Cond::Absent { subject: s, field } => format!(
            "{}.is_none()",
            codec.field(field).accessor.getter_expr(subject(s))
        ),
    }
}

fn primitive_const(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::Boolean => "BOOL",
        PrimitiveKind::Byte => "I8",
        PrimitiveKind::Short => "I16",
        PrimitiveKind::Int => "I32",
        PrimitiveKind::Long => "I64",
        PrimitiveKind::Float => "F32",
        PrimitiveKind::Double => "F64",
        PrimitiveKind::Char => "CHAR",
    }
}

fn known_const(known: KnownAdapter) -> &'static str {
    match known {
        KnownAdapter::String => "STRING",
        KnownAdapter::Number => "NUMBER",
        KnownAdapter::JsonTree => "JSON",
        boxed => boxed.unboxed().map(primitive_const).unwrap_or("JSON"),
    }
}

/// Rust type used for values of `ty`; references are not wrapped in `Option`.
pub fn rust_type(ty: &ConcreteType, ctx: &RenderContext) -> String {
    let nullable = |t: &ConcreteType| format!("Option<{}>", rust_type(t, ctx));
    match shape(ty) {
        Ok(Shape::Primitive(kind)) => kind.rust_type().to_string(),
        Ok(Shape::Known(KnownAdapter::String)) => "String".to_string(),
        Ok(Shape::Known(KnownAdapter::Number)) => "rt::Number".to_string(),
        Ok(Shape::Known(known)) => match known.unboxed() {
            Some(kind) => kind.rust_type().to_string(),
            None => "rt::JsonValue".to_string(),
        },
        Ok(Shape::List(_, elem)) => format!("Vec<{}>", nullable(&elem)),
        Ok(Shape::Array(elem)) => match shape(&elem) {
            Ok(Shape::Primitive(kind)) => format!("Vec<{}>", kind.rust_type()),
            _ => format!("Vec<{}>", nullable(&elem)),
        },
        Ok(Shape::Map(kind, key, value)) => {
            let map = match kind {
                MapKind::LinkedHashMap => "rt::LinkedMap",
                MapKind::TreeMap => "std::collections::BTreeMap",
                MapKind::Map | MapKind::HashMap | MapKind::ConcurrentHashMap => {
                    "std::collections::HashMap"
                }
            };
            format!("{}<{}, {}>", map, rust_type(&key, ctx), nullable(&value))
        }
        Ok(Shape::Declared(declared)) => declared_path(&declared, ctx),
        Err(_) => "rt::JsonValue".to_string(),
    }
}

/// `a.b.Outer.Inner<T>` becomes `<model_root>::a::b::OuterInner<T>`: lowercase
/// segments are modules, the capitalized tail is flattened into one name.
fn declared_path(ty: &ConcreteType, ctx: &RenderContext) -> String {
    let name = ty.base_name().unwrap_or_default();
    let segments: Vec<&str> = name.split(['.', '$']).filter(|s| !s.is_empty()).collect();
    let split = segments
        .iter()
        .position(|s| s.starts_with(|c: char| c.is_uppercase()))
        .unwrap_or(segments.len().saturating_sub(1));
    let mut path = ctx.model_root.clone();
    for module in &segments[..split] {
        path.push_str("::");
        path.push_str(&escape(module));
    }
    path.push_str("::");
    path.push_str(&segments[split..].concat());
    let args = ty.args();
    if !args.is_empty() {
        let args: Vec<String> = args.iter().map(|a| rust_type(a, ctx)).collect();
        write!(path, "<{}>", args.join(", ")).unwrap();
    }
    path
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Raw-escape identifiers that collide with Rust keywords.
pub(crate) fn escape(ident: &str) -> String {
    if KEYWORDS.contains(&ident) {
        format!("r#{}", ident)
    } else {
        ident.to_string()
    }
}

/// `DataVideoCodec` → `data_video_codec`.
pub fn snake_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
                || (prev.is_some_and(char::is_uppercase) && next.is_some_and(|n| n.is_lowercase()));
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Notation;
    use crate::decl::{DeclarationSet, InputFormat};
    use crate::discovery::DiscoveryContext;
    use crate::registry::KnownTypes;
    use crate::synth::{synthesize, SynthOptions};
    use crate::types::TypeRef;

    fn concrete(text: &str) -> ConcreteType {
        ConcreteType::try_from(TypeRef::parse(text).unwrap()).unwrap()
    }

    fn render(json: &str, key: &str) -> String {
        let set = DeclarationSet::parse(json, InputFormat::Json).unwrap();
        let universe = DiscoveryContext::new(&set, Notation::Standard)
            .discover()
            .unwrap();
        let known = KnownTypes::default();
        let units = synthesize(&universe, &known, SynthOptions::default()).unwrap();
        let registry = AdapterRegistry::build(&units, &known);
        let unit = units.iter().find(|u| u.key.as_str() == key).unwrap();
        RUST_WRITER.write_unit(unit, &registry, &RenderContext::default())
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("DataVideoCodec"), "data_video_codec");
        assert_eq!(snake_case("UserCodec2"), "user_codec2");
        assert_eq!(snake_case("HTTPRequestCodec"), "http_request_codec");
    }

    #[test]
    fn test_rust_types() {
        let ctx = RenderContext::default();
        assert_eq!(rust_type(&concrete("int"), &ctx), "i32");
        assert_eq!(rust_type(&concrete("Integer"), &ctx), "i32");
        assert_eq!(
            rust_type(&concrete("List<com.example.Video>"), &ctx),
            "Vec<Option<crate::com::example::Video>>"
        );
        assert_eq!(rust_type(&concrete("long[]"), &ctx), "Vec<i64>");
        assert_eq!(
            rust_type(&concrete("java.util.TreeMap<String, a.Outer.Inner>"), &ctx),
            "std::collections::BTreeMap<String, Option<crate::a::OuterInner>>"
        );
        assert_eq!(
            rust_type(&concrete("a.type.Data<a.User>"), &ctx),
            "crate::a::r#type::Data<crate::a::User>"
        );
    }

    #[test]
    fn test_enum_unit() {
        let out = render(
            r#"{"declarations": [{"name": "a.Status", "kind": "enum", "marker": {},
                "constants": [
                    {"name": "ACTIVE", "serialized_name": {"value": "active", "alternate": ["on"]}},
                    {"name": "IDLE"}
                ]}]}"#,
            "a.Status",
        );
        insta::assert_snapshot!(out, @r#"
        //! Codec for `a.Status`, generated by codecgen for module `codecs`. Do not edit.

        #![allow(non_snake_case, unused_mut, unused_variables)]

        use codec_runtime as rt;
        use rt::{CodecError, JsonReader, JsonWriter, Token, TypeAdapter};

        /// Reads and writes `a.Status`.
        #[derive(Debug, Clone, Copy, Default)]
        pub struct StatusCodec;

        impl TypeAdapter<crate::a::Status> for StatusCodec {
            fn write(&self, writer: &mut dyn JsonWriter, value: Option<&crate::a::Status>) -> Result<(), CodecError> {
                let Some(value) = value else {
                    return writer.null_value();
                };
                let name = match value {
                    crate::a::Status::ACTIVE => "active",
                    crate::a::Status::IDLE => "IDLE",
                };
                writer.string_value(name)
            }

            fn read(&self, reader: &mut dyn JsonReader) -> Result<Option<crate::a::Status>, CodecError> {
                if reader.peek()? == Token::Null {
                    reader.next_null()?;
                    return Ok(None);
                }
                let name = reader.next_string()?;
                match name.as_str() {
                    "active" | "on" => Ok(Some(crate::a::Status::ACTIVE)),
                    "IDLE" => Ok(Some(crate::a::Status::IDLE)),
                    other => Err(CodecError::unknown_constant("a.Status", other)),
                }
            }
        }
        "#);
    }

    #[test]
    fn test_object_unit_uses_accessors_and_slots() {
        let out = render(
            r#"{"declarations": [
                {"name": "a.Video", "marker": {}},
                {"name": "a.Clip", "marker": {}, "fields": [
                    {"name": "title", "type": "String", "visibility": "private", "not_null": true},
                    {"name": "length", "type": "long"},
                    {"name": "video", "type": "a.Video"}
                ], "methods": [
                    {"name": "getTitle", "returns": "String"},
                    {"name": "setTitle", "params": ["String"]}
                ]}
            ]}"#,
            "a.Clip",
        );
        assert!(out.contains("let slot0 = rt::known::STRING;"));
        assert!(out.contains("let slot1 = super::VideoCodec;"));
        assert!(out.contains("if value.getTitle().is_some() {"));
        assert!(out.contains("return Err(CodecError::null_field(\"a.Clip\", \"title\"));"));
        assert!(out.contains("writer.value(value.length.into())?;"));
        assert!(out.contains("\"title\" => {"));
        assert!(out.contains("object.setTitle(slot0.read(reader)?);"));
        assert!(out.contains("object.length = reader.next_i64()?;"));
        assert!(out.contains("if object.getTitle().is_none() {"));
        assert!(out.contains("return Err(CodecError::missing_field(\"a.Clip\", \"title\"));"));
        assert!(out.trim_end().ends_with("Ok(Some(object))\n    }\n}"));
    }
    #[test]
    fn test_primitive_with_custom_adapter_is_always_written() {
        let out = render(
            r#"{"declarations": [{"name": "a.Counter", "marker": {}, "fields": [
                {"name": "count", "type": "int", "adapter": {"path": "crate::Hex"}}
            ]}]}"#,
            "a.Counter",
        );
        assert!(out.contains("let slot0 = rt::known::NullSafe::new(crate::Hex::default());"));
        assert!(!out.contains("is_some()"));
        assert!(
            out.contains("writer.name(\"count\")?;\n        slot0.write(writer, Some(&value.count))?;"),
            "{}",
            out
        );
        assert!(out.contains("object.count = slot0.read(reader)?.unwrap_or_default();"));
    }
}
