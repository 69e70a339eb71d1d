//! The read procedure of an object codec.

use super::field_ids;
use crate::ir::{Arm, Block, Cond, Consume, FieldSlot, Failure, Returned, Stmt, Subject, TokenKind};

fn consume(consume: Consume) -> Stmt {
    Stmt::Consume { consume }
}

fn ret(returned: Returned) -> Stmt {
    Stmt::Return { returned }
}

/// Tolerant object read.
///
/// A null yields no value and any other non-object is skipped. Unknown members
/// and null member values are skipped, the canonical name and every alternate
/// fill the same field, and not-null fields are checked once the object ends.
pub(super) fn read_block(fields: &[FieldSlot]) -> Block {
    let arms: Vec<Arm> = field_ids(fields)
        .map(|(id, field)| Arm {
            names: field.read_names().into_iter().map(String::from).collect(),
            body: vec![Stmt::ReadField { field: id }],
        })
        .collect();
    let skip = vec![consume(Consume::Skip)];
    let member = if arms.is_empty() {
        skip
    } else {
        vec![Stmt::Dispatch {
            arms,
            fallback: skip,
        }]
    };

    let mut block = vec![
        Stmt::If {
            cond: Cond::Peek {
                kind: TokenKind::Null,
            },
            then: vec![consume(Consume::Null), ret(Returned::Absent)],
            otherwise: Vec::new(),
        },
        Stmt::If {
            cond: Cond::NotPeek {
                kind: TokenKind::BeginObject,
            },
            then: vec![consume(Consume::Skip), ret(Returned::Absent)],
            otherwise: Vec::new(),
        },
        consume(Consume::BeginObject),
        Stmt::Instantiate,
        Stmt::EachMember {
            body: vec![Stmt::If {
                cond: Cond::Peek {
                    kind: TokenKind::Null,
                },
                then: vec![consume(Consume::Null)],
                otherwise: member,
            }],
        },
        consume(Consume::EndObject),
    ];

    for (id, field) in field_ids(fields) {
        if field.not_null && field.primitive().is_none() {
            block.push(Stmt::If {
                cond: Cond::Absent {
                    subject: Subject::Object,
                    field: id,
                },
                then: vec![Stmt::Fail {
                    failure: Failure::MissingField { field: id },
                }],
                otherwise: Vec::new(),
            });
        }
    }
    block.push(ret(Returned::Object));
    block
}
