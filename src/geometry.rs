//! Typed views over the RECT and MATRIX records, plus twip/pixel conversion.

use crate::codec::Record;
use crate::error::MovieError;
use crate::schema::RecordKind;

/// Twips per pixel.
pub const TWIPS_PER_PIXEL: f64 = 20.0;

pub fn twip2pixel(twips: i64) -> f64 {
    twips as f64 / TWIPS_PER_PIXEL
}

/// Truncates toward zero.
pub fn pixel2twip(pixels: f64) -> i64 {
    (pixels * TWIPS_PER_PIXEL) as i64
}

/// Bounding box in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl Rect {
    pub fn new(x_min: i64, x_max: i64, y_min: i64, y_max: i64) -> Self {
        Rect { x_min, x_max, y_min, y_max }
    }

    pub fn from_record(r: &Record) -> Result<Self, MovieError> {
        if r.kind() != RecordKind::Rect {
            return Err(MovieError::Format(format!("expected RECT, got {}", r.schema().name)));
        }
        Ok(Rect {
            x_min: r.get("x_min").unwrap_or(0),
            x_max: r.get("x_max").unwrap_or(0),
            y_min: r.get("y_min").unwrap_or(0),
            y_max: r.get("y_max").unwrap_or(0),
        })
    }

    pub fn to_record(&self) -> Record {
        let mut r = Record::new(RecordKind::Rect);
        r.set("x_min", Some(self.x_min));
        r.set("x_max", Some(self.x_max));
        r.set("y_min", Some(self.y_min));
        r.set("y_max", Some(self.y_max));
        r
    }
}

/// Affine placement transform. Scale and rotate are 16.16 fixed point, translate in twips.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Matrix {
    pub scale: Option<(f64, f64)>,
    pub rotate: Option<(f64, f64)>,
    pub translate: (i64, i64),
}

impl Matrix {
    pub fn from_record(r: &Record) -> Result<Self, MovieError> {
        if r.kind() != RecordKind::Matrix {
            return Err(MovieError::Format(format!("expected MATRIX, got {}", r.schema().name)));
        }
        let pair = |a: &str, b: &str| match (r.get_fixed(a), r.get_fixed(b)) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        };
        Ok(Matrix {
            scale: pair("scale_x", "scale_y"),
            rotate: pair("rotate_skew0", "rotate_skew1"),
            translate: (r.get("translate_x").unwrap_or(0), r.get("translate_y").unwrap_or(0)),
        })
    }

    /// Build a MATRIX record; absent scale/rotate leave their groups (and flags) off.
    pub fn generate(scale: Option<(f64, f64)>, rotate: Option<(f64, f64)>, translate: (i64, i64)) -> Record {
        let mut r = Record::new(RecordKind::Matrix);
        if let Some((x, y)) = scale {
            r.set_fixed("scale_x", Some(x));
            r.set_fixed("scale_y", Some(y));
        }
        if let Some((s0, s1)) = rotate {
            r.set_fixed("rotate_skew0", Some(s0));
            r.set_fixed("rotate_skew1", Some(s1));
        }
        r.set("translate_x", Some(translate.0));
        r.set("translate_y", Some(translate.1));
        r
    }

    pub fn to_record(&self) -> Record {
        Matrix::generate(self.scale, self.rotate, self.translate)
    }
}
