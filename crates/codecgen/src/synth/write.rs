//! The write procedure of an object codec.

use super::field_ids;
use crate::ir::{Block, Cond, Emit, FieldSlot, Failure, Returned, Stmt, Subject};

fn emit(emit: Emit) -> Stmt {
    Stmt::Emit { emit }
}

/// Null-safe object write. Primitive fields are always written; reference
/// fields are skipped when absent (or written as null with `serialize_nulls`),
/// and an absent not-null field fails.
pub(super) fn write_block(fields: &[FieldSlot], serialize_nulls: bool) -> Block {
    let mut block = vec![
        Stmt::BindValue {
            absent: vec![
                emit(Emit::Null),
                Stmt::Return {
                    returned: Returned::Done,
                },
            ],
        },
        emit(Emit::BeginObject),
    ];

    for (id, field) in field_ids(fields) {
        let name = emit(Emit::Name(field.wire_name.clone()));
        let write = Stmt::WriteField { field: id };
        if field.primitive().is_some() {
            block.push(name);
            block.push(write);
            continue;
        }

        let on_absent = if field.not_null {
            vec![Stmt::Fail {
                failure: Failure::NullField { field: id },
            }]
        } else if serialize_nulls {
            vec![emit(Emit::Null)]
        } else {
            Vec::new()
        };
        let present = Cond::Present {
            subject: Subject::Value,
            field: id,
        };
        if serialize_nulls {
            block.push(name);
            block.push(Stmt::If {
                cond: present,
                then: vec![write],
                otherwise: on_absent,
            });
        } else {
            block.push(Stmt::If {
                cond: present,
                then: vec![name, write],
                otherwise: on_absent,
            });
        }
    }

    block.push(emit(Emit::EndObject));
    block
}
