//! The path mini-language: parsing, serialization, absolute conversion,
//! and matrix application.
//!
//! Path data is a flat stream of opcode letters and numbers. The grammar
//! in `svgdata.pest` tokenizes; the state machine here deals with the
//! stream's quirks: implicit command repetition, the `M`-becomes-`L` rule,
//! and the relative/absolute case toggle.

use glam::DVec2;
use miette::NamedSource;
use pest::Parser;

use crate::errors::GrammarError;
use crate::transform::Matrix;
use crate::{Rule, SvgDataParser};

/// Path command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    MoveTo,
    LineTo,
    HLineTo,
    VLineTo,
    CubicTo,
    SmoothCubicTo,
    QuadTo,
    SmoothQuadTo,
    ArcTo,
    Close,
}

impl Opcode {
    /// Map a command letter to its opcode; lowercase means relative.
    pub fn from_letter(letter: char) -> Option<(Opcode, bool)> {
        let relative = letter.is_ascii_lowercase();
        let opcode = match letter.to_ascii_uppercase() {
            'M' => Opcode::MoveTo,
            'L' => Opcode::LineTo,
            'H' => Opcode::HLineTo,
            'V' => Opcode::VLineTo,
            'C' => Opcode::CubicTo,
            'S' => Opcode::SmoothCubicTo,
            'Q' => Opcode::QuadTo,
            'T' => Opcode::SmoothQuadTo,
            'A' => Opcode::ArcTo,
            'Z' => Opcode::Close,
            _ => return None,
        };
        Some((opcode, relative))
    }

    /// The command letter, lowercased when `relative`.
    pub fn letter(self, relative: bool) -> char {
        let upper = match self {
            Opcode::MoveTo => 'M',
            Opcode::LineTo => 'L',
            Opcode::HLineTo => 'H',
            Opcode::VLineTo => 'V',
            Opcode::CubicTo => 'C',
            Opcode::SmoothCubicTo => 'S',
            Opcode::QuadTo => 'Q',
            Opcode::SmoothQuadTo => 'T',
            Opcode::ArcTo => 'A',
            Opcode::Close => 'Z',
        };
        if relative {
            upper.to_ascii_lowercase()
        } else {
            upper
        }
    }

    /// Fixed operand count.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Close => 0,
            Opcode::HLineTo | Opcode::VLineTo => 1,
            Opcode::MoveTo | Opcode::LineTo | Opcode::SmoothQuadTo => 2,
            Opcode::QuadTo | Opcode::SmoothCubicTo => 4,
            Opcode::CubicTo => 6,
            Opcode::ArcTo => 7,
        }
    }

    /// Operand indices holding the command's endpoint.
    ///
    /// Control points, arc radii, rotation and flags are absent on
    /// purpose: they are never rebased or transformed. In particular,
    /// elliptical-arc radii and rotation are not re-derived under a
    /// matrix.
    pub fn endpoints(self) -> &'static [usize] {
        match self {
            Opcode::MoveTo | Opcode::LineTo | Opcode::SmoothQuadTo => &[0, 1],
            Opcode::HLineTo | Opcode::VLineTo => &[0],
            Opcode::CubicTo => &[4, 5],
            Opcode::SmoothCubicTo | Opcode::QuadTo => &[2, 3],
            Opcode::ArcTo => &[5, 6],
            Opcode::Close => &[],
        }
    }
}

/// One command with its operands. The operand count always equals the
/// opcode's arity.
#[derive(Debug, Clone, PartialEq)]
pub struct PathCommand {
    pub opcode: Opcode,
    pub relative: bool,
    pub operands: Vec<f64>,
}

impl PathCommand {
    pub fn new(opcode: Opcode, relative: bool, operands: Vec<f64>) -> PathCommand {
        debug_assert_eq!(operands.len(), opcode.arity());
        PathCommand {
            opcode,
            relative,
            operands,
        }
    }
}

/// Name used for error snippets; the caller knows which element the
/// attribute came from.
const SOURCE_NAME: &str = "path data";

enum Token {
    Op(char, usize),
    Num(f64, usize),
}

/// Parse path data into a command sequence.
///
/// A number with no fresh opcode repeats the current one, except that
/// coordinate pairs after the first pair of an `M`/`m` continue as
/// `L`/`l`. A path starting with a bare number gets an implicit relative
/// MoveTo.
pub fn parse(text: &str) -> Result<Vec<PathCommand>, GrammarError> {
    let pairs = SvgDataParser::parse(Rule::path_data, text)
        .map_err(|e| GrammarError::syntax(SOURCE_NAME, text, e))?;

    let mut tokens = Vec::new();
    for pair in pairs.flatten() {
        match pair.as_rule() {
            Rule::opcode => {
                let start = pair.as_span().start();
                let letter = pair.as_str().chars().next().unwrap_or('?');
                tokens.push(Token::Op(letter, start));
            }
            Rule::number => {
                let start = pair.as_span().start();
                let value: f64 = pair.as_str().parse().map_err(|_| GrammarError::InvalidNumber {
                    src: NamedSource::new(SOURCE_NAME, text.to_string()),
                    span: (start..pair.as_span().end()).into(),
                })?;
                tokens.push(Token::Num(value, start));
            }
            _ => {}
        }
    }

    let mut commands = Vec::new();
    let mut current: Option<(Opcode, bool)> = None;
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        let (opcode, relative, first, span_start) = match token {
            Token::Op(letter, start) => {
                let (opcode, relative) =
                    Opcode::from_letter(letter).ok_or_else(|| GrammarError::UnknownOpcode {
                        letter,
                        src: NamedSource::new(SOURCE_NAME, text.to_string()),
                        span: (start..start + 1).into(),
                    })?;
                (opcode, relative, None, start)
            }
            Token::Num(value, start) => {
                // Implicit repetition; a leading bare number opens a
                // relative MoveTo.
                let (opcode, relative) = current.unwrap_or((Opcode::MoveTo, true));
                if opcode == Opcode::Close {
                    return Err(GrammarError::OperandAfterClose {
                        src: NamedSource::new(SOURCE_NAME, text.to_string()),
                        span: (start..start + 1).into(),
                    });
                }
                (opcode, relative, Some(value), start)
            }
        };

        let mut operands = Vec::with_capacity(opcode.arity());
        if let Some(value) = first {
            operands.push(value);
        }
        while operands.len() < opcode.arity() {
            match iter.peek() {
                Some(Token::Num(value, _)) => {
                    operands.push(*value);
                    iter.next();
                }
                _ => {
                    return Err(GrammarError::OperandCount {
                        opcode: opcode.letter(relative),
                        expected: opcode.arity(),
                        found: operands.len(),
                        src: NamedSource::new(SOURCE_NAME, text.to_string()),
                        span: (span_start..span_start + 1).into(),
                    });
                }
            }
        }

        commands.push(PathCommand::new(opcode, relative, operands));
        current = Some(match opcode {
            Opcode::MoveTo => (Opcode::LineTo, relative),
            opcode => (opcode, relative),
        });
    }

    Ok(commands)
}

/// Serialize a command sequence: opcode then operands, space-separated.
pub fn serialize(commands: &[PathCommand]) -> String {
    let mut out = String::new();
    for (index, command) in commands.iter().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        out.push(command.opcode.letter(command.relative));
        for operand in &command.operands {
            out.push(' ');
            out.push_str(&fmt_coord(*operand));
        }
    }
    out
}

/// Convert every relative command to absolute. Idempotent.
///
/// The current point is threaded explicitly through this one function;
/// each relative endpoint gains the current point and the opcode flips to
/// uppercase. `z` only normalizes case; `M` resets the subpath start that
/// `Z` returns to.
pub fn to_absolute(commands: &[PathCommand]) -> Vec<PathCommand> {
    let mut out = Vec::with_capacity(commands.len());
    let mut current = DVec2::ZERO;
    let mut subpath_start = DVec2::ZERO;

    for command in commands {
        let mut command = command.clone();
        if command.relative {
            match command.opcode {
                Opcode::HLineTo => command.operands[0] += current.x,
                Opcode::VLineTo => command.operands[0] += current.y,
                _ => {
                    for pair in command.opcode.endpoints().chunks(2) {
                        if let [ix, iy] = *pair {
                            command.operands[ix] += current.x;
                            command.operands[iy] += current.y;
                        }
                    }
                }
            }
            command.relative = false;
        }

        match command.opcode {
            Opcode::Close => current = subpath_start,
            Opcode::HLineTo => current.x = command.operands[0],
            Opcode::VLineTo => current.y = command.operands[0],
            opcode => {
                let endpoints = opcode.endpoints();
                current = DVec2::new(
                    command.operands[endpoints[endpoints.len() - 2]],
                    command.operands[endpoints[endpoints.len() - 1]],
                );
                if opcode == Opcode::MoveTo {
                    subpath_start = current;
                }
            }
        }
        out.push(command);
    }
    out
}

/// Apply an affine matrix to an absolute command sequence.
///
/// Only endpoint operands are transformed. `H` sees the x axis only
/// (`x' = a·x + e`) and `V` the y axis only (`y' = d·y + f`); arc radii,
/// rotation and flags pass through unchanged.
pub fn apply_matrix(commands: &[PathCommand], matrix: &Matrix) -> Vec<PathCommand> {
    debug_assert!(
        commands.iter().all(|c| !c.relative),
        "apply_matrix requires absolute commands"
    );
    commands
        .iter()
        .map(|command| {
            let mut command = command.clone();
            match command.opcode {
                Opcode::HLineTo => {
                    command.operands[0] = matrix.a() * command.operands[0] + matrix.e();
                }
                Opcode::VLineTo => {
                    command.operands[0] = matrix.d() * command.operands[0] + matrix.f();
                }
                _ => {
                    for pair in command.opcode.endpoints().chunks(2) {
                        if let [ix, iy] = *pair {
                            let (x, y) =
                                matrix.transform_point(command.operands[ix], command.operands[iy]);
                            command.operands[ix] = x;
                            command.operands[iy] = y;
                        }
                    }
                }
            }
            command
        })
        .collect()
}

/// Shortest representation that round-trips through `parse`.
fn fmt_coord(value: f64) -> String {
    let mut s = format!("{}", value);
    if s == "-0" {
        s.truncate(0);
        s.push('0');
    }
    s
}
