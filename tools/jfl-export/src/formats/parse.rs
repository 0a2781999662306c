//! JFL reader
//!
//! Parses a JFL document back into plain data, mainly to inspect exported
//! files and to check writer output. Blank lines and `\r\n` endings are
//! tolerated; anything else that deviates from the layout is an error carrying
//! its 1-based line number.

use std::str::FromStr;

use super::{JFL_BEGIN, JFL_END, JFL_MAGIC, JFL_VERSION};
use crate::model::{Bone, Matrix4, Mesh, Polygon, PolygonLoop, Skeleton, Vertex, VertexGroupWeight};

const VERT: &str = "  Vert ";
const COORDS: &str = "    Coords: ";
const NORMALS: &str = "    Normals: ";
const GROUPS: &str = "    Vertex Groups:";
const GROUP: &str = "      \"";
const POLYGON: &str = "  Polygon index: ";
const POLYGON_VERTEX: &str = "    Vertex: ";
const POLYGON_UV: &str = "    UV: ";
const SKELETON: &str = "Skeleton";
const BONE: &str = "  Bone: ";
const BONE_MATRIX: &str = "    Matrix: ";
const BONE_PARENT: &str = "    Parent: \"";
const ACTION: &str = "Action: ";
const FRAME: &str = "  Frame: ";
const FRAME_BONE: &str = "    Bone: ";
const FRAME_BONE_MATRIX: &str = "      Matrix: ";

/// A parse failure and where it happened
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("invalid header")]
    InvalidHeader,
    #[error("unsupported version '{0}'")]
    UnsupportedVersion(String),
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("too many values (expected {0})")]
    TooManyValues(usize),
    #[error("too few values (expected {expected}, found {found})")]
    TooFewValues { expected: usize, found: usize },
    #[error("polygons must have at least three sides")]
    DegeneratePolygon,
    #[error("{what} index {found} out of order (expected {expected})")]
    IndexOutOfOrder {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("unexpected end of file")]
    UnexpectedEof,
}

/// One `Frame:` block of an action
#[derive(Debug, Clone, PartialEq)]
pub struct JflFrame {
    pub frame: i32,
    pub bones: Vec<(String, Matrix4)>,
}

/// One `Action:` block
#[derive(Debug, Clone, PartialEq)]
pub struct JflAction {
    pub name: String,
    pub frames: Vec<JflFrame>,
}

/// Contents of a JFL file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JflDocument {
    pub mesh: Mesh,
    /// Present when the file has a `Skeleton` block
    pub skeleton: Option<Skeleton>,
    pub actions: Vec<JflAction>,
}

impl JflDocument {
    pub fn frame_count(&self) -> usize {
        self.actions.iter().map(|a| a.frames.len()).sum()
    }
}

/// Parse a complete JFL document
pub fn parse_jfl(text: &str) -> Result<JflDocument, ParseError> {
    let mut cursor = LineCursor::new(text);

    if cursor.next_line()? != JFL_MAGIC {
        return Err(cursor.error(ParseErrorKind::InvalidHeader));
    }
    let version = cursor.expect_prefix("Version ", "'Version <n>'")?;
    if version.trim().parse::<u32>().ok() != Some(JFL_VERSION) {
        return Err(cursor.error(ParseErrorKind::UnsupportedVersion(version.to_string())));
    }
    cursor.expect_exact(JFL_BEGIN, "'--BEGIN--'")?;
    cursor.expect_exact("Mesh", "'Mesh'")?;

    let mut doc = JflDocument::default();

    while cursor.peek_starts_with(VERT) {
        let vertex = parse_vertex(&mut cursor, doc.mesh.vertices.len())?;
        doc.mesh.vertices.push(vertex);
    }

    while cursor.peek_starts_with(POLYGON) {
        let polygon = parse_polygon(&mut cursor, doc.mesh.polygons.len())?;
        doc.mesh.polygons.push(polygon);
    }

    if cursor.peek() == Some(SKELETON) {
        cursor.next_line()?;
        let mut skeleton = Skeleton::default();
        while cursor.peek_starts_with(BONE) {
            skeleton.bones.push(parse_bone(&mut cursor)?);
        }
        doc.skeleton = Some(skeleton);
    }

    while cursor.peek_starts_with(ACTION) {
        doc.actions.push(parse_action(&mut cursor)?);
    }

    cursor.expect_exact(JFL_END, "'--END--'")?;
    Ok(doc)
}

fn parse_vertex(cursor: &mut LineCursor, expected: usize) -> Result<Vertex, ParseError> {
    let text = cursor.expect_prefix(VERT, "'Vert'")?;
    let index: usize = cursor.parse_value(text)?;
    if index != expected {
        return Err(cursor.error(ParseErrorKind::IndexOutOfOrder {
            what: "vertex",
            expected,
            found: index,
        }));
    }

    let text = cursor.expect_prefix(COORDS, "'Coords:'")?;
    let position = cursor.parse_floats::<3>(text)?;
    let text = cursor.expect_prefix(NORMALS, "'Normals:'")?;
    let normal = cursor.parse_floats::<3>(text)?;
    cursor.expect_exact(GROUPS, "'Vertex Groups:'")?;

    let mut groups = Vec::new();
    while cursor.peek_starts_with(GROUP) {
        let rest = cursor.expect_prefix(GROUP, "vertex group")?;
        let (bone, weight) = rest
            .rsplit_once("\", ")
            .ok_or_else(|| cursor.error(ParseErrorKind::Expected("'\"<bone>\", <weight>'")))?;
        groups.push(VertexGroupWeight {
            bone: bone.to_string(),
            weight: cursor.parse_value(weight)?,
        });
    }

    Ok(Vertex {
        position,
        normal,
        groups,
    })
}

fn parse_polygon(cursor: &mut LineCursor, expected: usize) -> Result<Polygon, ParseError> {
    let header = cursor.expect_prefix(POLYGON, "'Polygon index:'")?;
    let (index, length) = header
        .split_once(", length: ")
        .ok_or_else(|| cursor.error(ParseErrorKind::Expected("', length: <n>'")))?;
    let index: usize = cursor.parse_value(index)?;
    let length: usize = cursor.parse_value(length)?;

    if index != expected {
        return Err(cursor.error(ParseErrorKind::IndexOutOfOrder {
            what: "polygon",
            expected,
            found: index,
        }));
    }
    if length < 3 {
        return Err(cursor.error(ParseErrorKind::DegeneratePolygon));
    }

    let mut loops = Vec::with_capacity(length);
    for _ in 0..length {
        let text = cursor.expect_prefix(POLYGON_VERTEX, "'Vertex:'")?;
        let vertex: u32 = cursor.parse_value(text)?;
        let text = cursor.expect_prefix(POLYGON_UV, "'UV:'")?;
        let uv = cursor.parse_floats::<2>(text)?;
        loops.push(PolygonLoop { vertex, uv });
    }

    Ok(Polygon { loops })
}

fn parse_bone(cursor: &mut LineCursor) -> Result<Bone, ParseError> {
    let name = cursor.expect_prefix(BONE, "'Bone:'")?.to_string();
    let text = cursor.expect_prefix(BONE_MATRIX, "'Matrix:'")?;
    let matrix = cursor.parse_floats::<16>(text)?;
    let parent = cursor
        .expect_prefix(BONE_PARENT, "'Parent: \"'")?
        .strip_suffix('"')
        .ok_or_else(|| cursor.error(ParseErrorKind::Expected("closing quote")))?;

    Ok(Bone {
        name,
        matrix,
        parent: (!parent.is_empty()).then(|| parent.to_string()),
    })
}

fn parse_action(cursor: &mut LineCursor) -> Result<JflAction, ParseError> {
    let name = cursor.expect_prefix(ACTION, "'Action:'")?.to_string();
    let mut frames = Vec::new();

    while cursor.peek_starts_with(FRAME) {
        let text = cursor.expect_prefix(FRAME, "'Frame:'")?;
        let frame: i32 = cursor.parse_value(text)?;
        let mut bones = Vec::new();
        while cursor.peek_starts_with(FRAME_BONE) {
            let bone = cursor.expect_prefix(FRAME_BONE, "'Bone:'")?.to_string();
            let text = cursor.expect_prefix(FRAME_BONE_MATRIX, "'Matrix:'")?;
            let matrix = cursor.parse_floats::<16>(text)?;
            bones.push((bone, matrix));
        }
        frames.push(JflFrame { frame, bones });
    }

    Ok(JflAction { name, frames })
}

/// Non-blank lines with their 1-based line numbers
struct LineCursor<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
    /// Line number of the most recently consumed line
    line: usize,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text
            .split('\n')
            .enumerate()
            .map(|(i, l)| (i + 1, l.strip_suffix('\r').unwrap_or(l)))
            .filter(|(_, l)| !l.is_empty())
            .collect();
        Self {
            lines,
            pos: 0,
            line: 0,
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            line: self.line,
            kind,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).map(|(_, l)| *l)
    }

    fn peek_starts_with(&self, prefix: &str) -> bool {
        self.peek().is_some_and(|l| l.starts_with(prefix))
    }

    fn next_line(&mut self) -> Result<&'a str, ParseError> {
        match self.lines.get(self.pos) {
            Some(&(number, line)) => {
                self.pos += 1;
                self.line = number;
                Ok(line)
            }
            None => {
                self.line += 1;
                Err(self.error(ParseErrorKind::UnexpectedEof))
            }
        }
    }

    fn expect_exact(&mut self, expected: &str, what: &'static str) -> Result<(), ParseError> {
        if self.next_line()? == expected {
            Ok(())
        } else {
            Err(self.error(ParseErrorKind::Expected(what)))
        }
    }

    /// Consume the next line and return what follows `prefix`
    fn expect_prefix(&mut self, prefix: &str, what: &'static str) -> Result<&'a str, ParseError> {
        self.next_line()?
            .strip_prefix(prefix)
            .ok_or_else(|| self.error(ParseErrorKind::Expected(what)))
    }

    fn parse_value<T: FromStr>(&self, text: &str) -> Result<T, ParseError> {
        text.trim()
            .parse()
            .map_err(|_| self.error(ParseErrorKind::InvalidNumber(text.to_string())))
    }

    /// Parse `(a, b, ...)` holding exactly `N` floats
    fn parse_floats<const N: usize>(&self, text: &str) -> Result<[f32; N], ParseError> {
        let inner = text
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .ok_or_else(|| self.error(ParseErrorKind::Expected("parenthesized list")))?;

        let mut values = [0.0f32; N];
        let mut found = 0;
        for part in inner.split(',') {
            if found == N {
                return Err(self.error(ParseErrorKind::TooManyValues(N)));
            }
            values[found] = self.parse_value(part)?;
            found += 1;
        }
        if found < N {
            return Err(self.error(ParseErrorKind::TooFewValues { expected: N, found }));
        }
        Ok(values)
    }
}
