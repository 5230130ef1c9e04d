use crate::deserialize::FromObject;
use crate::error::{PdfError, PdfErrorKind, PdfResult};
use crate::object::PdfObject;
use crate::reader::OptResolver;

// ── Vectors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    pub fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }

    pub fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }

    pub fn scale(self, factor: f64) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn dot(self, rhs: Vec2) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// z-component of the 3D cross product; the sign gives turn direction.
    pub fn cross(self, rhs: Vec2) -> f64 {
        self.x * rhs.y - self.y * rhs.x
    }

    pub fn len_sq(self) -> f64 {
        self.dot(self)
    }

    pub fn len(self) -> f64 {
        self.len_sq().sqrt()
    }

    pub fn normalize(self) -> Vec2 {
        let len = self.len();
        if len == 0.0 {
            Vec2::default()
        } else {
            self.scale(1.0 / len)
        }
    }

    /// Counter-clockwise perpendicular.
    pub fn perp(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    pub fn lerp(self, rhs: Vec2, t: f64) -> Vec2 {
        Vec2::new(
            self.x + (rhs.x - self.x) * t,
            self.y + (rhs.y - self.y) * t,
        )
    }

    pub fn approx_eq(self, rhs: Vec2, eps: f64) -> bool {
        (self.x - rhs.x).abs() <= eps && (self.y - rhs.y).abs() <= eps
    }
}

// ── Matrices ──────────────────────────────────────────────────────────────────

/// Row-major 3x3 matrix. Points are row vectors transformed as `p * M`,
/// which is the PDF convention: the `a b c d e f` operands of `cm` map to
/// `[[a,b,0],[c,d,0],[e,f,1]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [[f64; 3]; 3],
}

impl Mat3 {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        m00: f64,
        m01: f64,
        m02: f64,
        m10: f64,
        m11: f64,
        m12: f64,
        m20: f64,
        m21: f64,
        m22: f64,
    ) -> Self {
        Mat3 {
            m: [[m00, m01, m02], [m10, m11, m12], [m20, m21, m22]],
        }
    }

    pub fn identity() -> Self {
        Mat3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0)
    }

    /// Build from the six PDF matrix operands.
    pub fn from_pdf(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Mat3::new(a, b, 0.0, c, d, 0.0, e, f, 1.0)
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Mat3::from_pdf(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Mat3::from_pdf(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn mul(self, rhs: Mat3) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for (row, out_row) in out.iter_mut().enumerate() {
            for (col, cell) in out_row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[row][k] * rhs.m[k][col]).sum();
            }
        }
        Mat3 { m: out }
    }

    /// Transform a point (row vector times matrix).
    pub fn transform(self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x * self.m[0][0] + p.y * self.m[1][0] + self.m[2][0],
            p.x * self.m[0][1] + p.y * self.m[1][1] + self.m[2][1],
        )
    }
}

impl FromObject for Mat3 {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let values = Vec::<f64>::from_object(object, resolver)?;
        if values.len() != 6 {
            return Err(PdfError::with_message(
                PdfErrorKind::IncorrectType,
                format!("matrix array has {} elements, expected 6", values.len()),
            ));
        }
        Ok(Mat3::from_pdf(
            values[0], values[1], values[2], values[3], values[4], values[5],
        ))
    }
}

// ── Rectangles ────────────────────────────────────────────────────────────────

/// A PDF rectangle `[llx lly urx ury]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Rect {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

impl FromObject for Rect {
    fn from_object(object: &PdfObject, resolver: &mut OptResolver<'_>) -> PdfResult<Self> {
        let values = Vec::<f64>::from_object(object, resolver)?;
        if values.len() != 4 {
            return Err(PdfError::with_message(
                PdfErrorKind::IncorrectType,
                format!("rectangle array has {} elements, expected 4", values.len()),
            ));
        }
        Ok(Rect {
            llx: values[0],
            lly: values[1],
            urx: values[2],
            ury: values[3],
        })
    }
}
