//! Affine transforms: the 2×3 matrix model and named transform lists.

use std::fmt;

use glam::{DAffine2, dvec2};
use miette::NamedSource;
use pest::Parser;

use crate::errors::GrammarError;
use crate::{Rule, SvgDataParser};

/// A 2×3 affine matrix `[[a c e][b d f][0 0 1]]`.
///
/// Points transform as `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(DAffine2);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix(DAffine2::IDENTITY);

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Matrix {
        Matrix(DAffine2::from_cols_array(&[a, b, c, d, e, f]))
    }

    pub fn translation(tx: f64, ty: f64) -> Matrix {
        Matrix(DAffine2::from_translation(dvec2(tx, ty)))
    }

    pub fn scaling(sx: f64, sy: f64) -> Matrix {
        Matrix(DAffine2::from_scale(dvec2(sx, sy)))
    }

    /// Rotation by `degrees`, counter-clockwise about the origin.
    pub fn rotation(degrees: f64) -> Matrix {
        Matrix(DAffine2::from_angle(degrees.to_radians()))
    }

    /// Parent pre-multiplies child: the composed matrix applies `child`
    /// first when transforming a point. Ancestor chains therefore compose
    /// root-to-leaf by folding each element's own matrix in as the child.
    pub fn compose(parent: Matrix, child: Matrix) -> Matrix {
        Matrix(parent.0 * child.0)
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.0.transform_point2(dvec2(x, y));
        (p.x, p.y)
    }

    pub fn a(&self) -> f64 {
        self.0.matrix2.x_axis.x
    }

    pub fn b(&self) -> f64 {
        self.0.matrix2.x_axis.y
    }

    pub fn c(&self) -> f64 {
        self.0.matrix2.y_axis.x
    }

    pub fn d(&self) -> f64 {
        self.0.matrix2.y_axis.y
    }

    pub fn e(&self) -> f64 {
        self.0.translation.x
    }

    pub fn f(&self) -> f64 {
        self.0.translation.y
    }

    pub fn is_identity(&self) -> bool {
        self.0.abs_diff_eq(DAffine2::IDENTITY, 1e-12)
    }
}

impl fmt::Display for Matrix {
    /// The `transform` attribute spelling: `matrix(a b c d e f)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "matrix({} {} {} {} {} {})",
            self.a(),
            self.b(),
            self.c(),
            self.d(),
            self.e(),
            self.f()
        )
    }
}

/// One named operation in a transform attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    Matrix([f64; 6]),
    Translate { tx: f64, ty: f64 },
    Scale { sx: f64, sy: f64 },
    Rotate { angle: f64, cx: f64, cy: f64 },
    SkewX(f64),
    SkewY(f64),
}

impl TransformOp {
    /// The operation as a matrix; `None` for skews, which parse and stay
    /// in the list but are not folded into point transforms.
    pub fn to_matrix(&self) -> Option<Matrix> {
        match *self {
            TransformOp::Matrix([a, b, c, d, e, f]) => Some(Matrix::new(a, b, c, d, e, f)),
            TransformOp::Translate { tx, ty } => Some(Matrix::translation(tx, ty)),
            TransformOp::Scale { sx, sy } => Some(Matrix::scaling(sx, sy)),
            TransformOp::Rotate { angle, cx, cy } => {
                // rotate(a, cx, cy) = translate(cx,cy) rotate(a) translate(-cx,-cy)
                let about = Matrix::compose(
                    Matrix::translation(cx, cy),
                    Matrix::rotation(angle),
                );
                Some(Matrix::compose(about, Matrix::translation(-cx, -cy)))
            }
            TransformOp::SkewX(_) | TransformOp::SkewY(_) => None,
        }
    }

    pub fn is_skew(&self) -> bool {
        matches!(self, TransformOp::SkewX(_) | TransformOp::SkewY(_))
    }
}

/// An ordered transform list, as written in a `transform` attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformList {
    ops: Vec<TransformOp>,
}

const SOURCE_NAME: &str = "transform list";

impl TransformList {
    /// Parse a `transform` attribute value.
    pub fn parse(text: &str) -> Result<TransformList, GrammarError> {
        let pairs = SvgDataParser::parse(Rule::transform_list, text)
            .map_err(|e| GrammarError::syntax(SOURCE_NAME, text, e))?;

        let mut ops = Vec::new();
        for pair in pairs.flatten() {
            if pair.as_rule() != Rule::transform_op {
                continue;
            }
            let span = pair.as_span();
            let mut inner = pair.into_inner();
            let kind = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            let args: Vec<f64> = inner
                .filter(|p| p.as_rule() == Rule::number)
                .filter_map(|p| p.as_str().parse().ok())
                .collect();

            let arity_error = |expected: &'static str| GrammarError::TransformArity {
                kind: kind.clone(),
                expected,
                found: args.len(),
                src: NamedSource::new(SOURCE_NAME, text.to_string()),
                span: (span.start()..span.end()).into(),
            };

            let op = match (kind.as_str(), args.as_slice()) {
                ("matrix", &[a, b, c, d, e, f]) => TransformOp::Matrix([a, b, c, d, e, f]),
                ("matrix", _) => return Err(arity_error("6")),
                ("translate", &[tx]) => TransformOp::Translate { tx, ty: 0.0 },
                ("translate", &[tx, ty]) => TransformOp::Translate { tx, ty },
                ("translate", _) => return Err(arity_error("1 or 2")),
                // scale with one parameter is uniform
                ("scale", &[sx]) => TransformOp::Scale { sx, sy: sx },
                ("scale", &[sx, sy]) => TransformOp::Scale { sx, sy },
                ("scale", _) => return Err(arity_error("1 or 2")),
                ("rotate", &[angle]) => TransformOp::Rotate {
                    angle,
                    cx: 0.0,
                    cy: 0.0,
                },
                ("rotate", &[angle, cx, cy]) => TransformOp::Rotate { angle, cx, cy },
                ("rotate", _) => return Err(arity_error("1 or 3")),
                ("skewX", &[a]) => TransformOp::SkewX(a),
                ("skewX", _) => return Err(arity_error("1")),
                ("skewY", &[a]) => TransformOp::SkewY(a),
                ("skewY", _) => return Err(arity_error("1")),
                // the grammar admits no other kind
                _ => unreachable!("unknown transform kind {kind}"),
            };
            ops.push(op);
        }
        Ok(TransformList { ops })
    }

    /// Reduce the list to one matrix, left to right: the leftmost (outer)
    /// operation pre-multiplies, so its effect frames everything after it.
    /// Skews contribute identity.
    pub fn to_matrix(&self) -> Matrix {
        self.ops
            .iter()
            .filter_map(TransformOp::to_matrix)
            .fold(Matrix::IDENTITY, Matrix::compose)
    }

    pub fn has_skew(&self) -> bool {
        self.ops.iter().any(TransformOp::is_skew)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }
}
