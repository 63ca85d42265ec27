//! Declarative descriptors for bit-packed records.
//!
//! A record type is an ordered list of [`FieldSpec`]s. Three forms exist:
//!
//! - fixed width: `(name, codec, Width::Bits(n))`
//! - variable width: `(name, codec, Width::Field(width_field))`, where `width_field` is an
//!   earlier field of the same record holding the bit count
//! - conditional group: `When { flag, equals, fields }`, decoded only when the already
//!   decoded `flag` equals `equals`
//!
//! The widths and flags always physically precede the data they govern.

use crate::value::ValueCodec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Bits(u32),
    Field(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub enum FieldSpec {
    Value {
        name: &'static str,
        codec: ValueCodec,
        width: Width,
    },
    When {
        flag: &'static str,
        equals: bool,
        fields: &'static [FieldSpec],
    },
}

#[derive(Debug)]
pub struct RecordSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    /// Value fields flattened in declaration order; this is the slot layout of a record.
    pub slots: &'static [&'static str],
}

impl RecordSchema {
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| *s == name)
    }

    pub fn codec_of(&self, name: &str) -> Option<ValueCodec> {
        fn find(fields: &[FieldSpec], name: &str) -> Option<ValueCodec> {
            fields.iter().find_map(|f| match f {
                FieldSpec::Value { name: n, codec, .. } if *n == name => Some(*codec),
                FieldSpec::When { fields, .. } => find(fields, name),
                _ => None,
            })
        }
        find(self.fields, name)
    }
}

/// The record types known to this crate; serializable stand-in for a schema reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Rect,
    Matrix,
    ColorTransform,
    ColorTransformWithAlpha,
}

impl RecordKind {
    pub fn schema(self) -> &'static RecordSchema {
        match self {
            RecordKind::Rect => &RECT,
            RecordKind::Matrix => &MATRIX,
            RecordKind::ColorTransform => &CXFORM,
            RecordKind::ColorTransformWithAlpha => &CXFORM_WITH_ALPHA,
        }
    }
}

const fn ub(name: &'static str, bits: u32) -> FieldSpec {
    FieldSpec::Value { name, codec: ValueCodec::Unsigned, width: Width::Bits(bits) }
}

const fn sb(name: &'static str, width_field: &'static str) -> FieldSpec {
    FieldSpec::Value { name, codec: ValueCodec::Signed, width: Width::Field(width_field) }
}

const fn fb(name: &'static str, width_field: &'static str) -> FieldSpec {
    FieldSpec::Value { name, codec: ValueCodec::Fixed, width: Width::Field(width_field) }
}

pub static RECT: RecordSchema = RecordSchema {
    name: "RECT",
    fields: &[
        ub("nbits", 5),
        sb("x_min", "nbits"),
        sb("x_max", "nbits"),
        sb("y_min", "nbits"),
        sb("y_max", "nbits"),
    ],
    slots: &["nbits", "x_min", "x_max", "y_min", "y_max"],
};

pub static MATRIX: RecordSchema = RecordSchema {
    name: "MATRIX",
    fields: &[
        ub("has_scale", 1),
        FieldSpec::When {
            flag: "has_scale",
            equals: true,
            fields: &[ub("n_scale_bits", 5), fb("scale_x", "n_scale_bits"), fb("scale_y", "n_scale_bits")],
        },
        ub("has_rotate", 1),
        FieldSpec::When {
            flag: "has_rotate",
            equals: true,
            fields: &[
                ub("n_rotate_bits", 5),
                fb("rotate_skew0", "n_rotate_bits"),
                fb("rotate_skew1", "n_rotate_bits"),
            ],
        },
        ub("n_translate_bits", 5),
        sb("translate_x", "n_translate_bits"),
        sb("translate_y", "n_translate_bits"),
    ],
    slots: &[
        "has_scale",
        "n_scale_bits",
        "scale_x",
        "scale_y",
        "has_rotate",
        "n_rotate_bits",
        "rotate_skew0",
        "rotate_skew1",
        "n_translate_bits",
        "translate_x",
        "translate_y",
    ],
};

pub static CXFORM: RecordSchema = RecordSchema {
    name: "CXFORM",
    fields: &[
        ub("has_add_terms", 1),
        ub("has_mult_terms", 1),
        ub("nbits", 4),
        FieldSpec::When {
            flag: "has_mult_terms",
            equals: true,
            fields: &[sb("red_mult_term", "nbits"), sb("green_mult_term", "nbits"), sb("blue_mult_term", "nbits")],
        },
        FieldSpec::When {
            flag: "has_add_terms",
            equals: true,
            fields: &[sb("red_add_term", "nbits"), sb("green_add_term", "nbits"), sb("blue_add_term", "nbits")],
        },
    ],
    slots: &[
        "has_add_terms",
        "has_mult_terms",
        "nbits",
        "red_mult_term",
        "green_mult_term",
        "blue_mult_term",
        "red_add_term",
        "green_add_term",
        "blue_add_term",
    ],
};

pub static CXFORM_WITH_ALPHA: RecordSchema = RecordSchema {
    name: "CXFORMWITHALPHA",
    fields: &[
        ub("has_add_terms", 1),
        ub("has_mult_terms", 1),
        ub("nbits", 4),
        FieldSpec::When {
            flag: "has_mult_terms",
            equals: true,
            fields: &[
                sb("red_mult_term", "nbits"),
                sb("green_mult_term", "nbits"),
                sb("blue_mult_term", "nbits"),
                sb("alpha_mult_term", "nbits"),
            ],
        },
        FieldSpec::When {
            flag: "has_add_terms",
            equals: true,
            fields: &[
                sb("red_add_term", "nbits"),
                sb("green_add_term", "nbits"),
                sb("blue_add_term", "nbits"),
                sb("alpha_add_term", "nbits"),
            ],
        },
    ],
    slots: &[
        "has_add_terms",
        "has_mult_terms",
        "nbits",
        "red_mult_term",
        "green_mult_term",
        "blue_mult_term",
        "alpha_mult_term",
        "red_add_term",
        "green_add_term",
        "blue_add_term",
        "alpha_add_term",
    ],
};
