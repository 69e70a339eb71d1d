use crate::decl::EnumConstant;
use crate::ir::{EnumCodec, EnumEntry};

/// Constant/name tables for an enum, in declaration order.
pub(super) fn enum_codec(constants: &[EnumConstant]) -> EnumCodec {
    EnumCodec {
        constants: constants
            .iter()
            .map(|c| EnumEntry {
                constant: c.name.clone(),
                wire_name: c.wire_name().to_string(),
                alternates: c
                    .alternates()
                    .iter()
                    .filter(|alt| alt.as_str() != c.wire_name())
                    .cloned()
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::SerializedName;

    #[test]
    fn test_tables_include_alternates() {
        let codec = enum_codec(&[
            EnumConstant {
                name: "ACTIVE".into(),
                serialized_name: Some(SerializedName {
                    value: "active".into(),
                    alternate: vec!["on".into(), "active".into()],
                }),
            },
            EnumConstant {
                name: "IDLE".into(),
                serialized_name: None,
            },
        ]);
        assert_eq!(codec.constant_to_name().get("ACTIVE"), Some(&"active"));
        let names: Vec<_> = codec.name_to_constant().into_iter().collect();
        assert_eq!(
            names,
            [("IDLE", "IDLE"), ("active", "ACTIVE"), ("on", "ACTIVE")]
        );
    }
}
