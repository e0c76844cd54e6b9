//! Keyword `.object` file reader
//!
//! The format nests `begin_<tag> [name]` / `end_<tag>` blocks. Only the
//! geometry hierarchy is kept; `reference`, `Material` and any other block
//! is walked over.
//!
//! ```text
//! begin_<structure_group> car1
//! begin_<structure> car1
//! begin_<sub_structure>
//! begin_<face>
//! Material 1
//! nVertices 4
//! 0.0 0.0 0.0
//! ...
//! end_<face>
//! end_<sub_structure>
//! end_<structure>
//! end_<structure_group>
//! ```

use crate::{parse_point, read_to_string, ParseError, Point3, Result};
use std::path::Path;
use tracing::debug;

const STRUCTURE_GROUP: &str = "structure_group";
const STRUCTURE: &str = "structure";
const SUB_STRUCTURE: &str = "sub_structure";
const FACE: &str = "face";

/// Leaf of the hierarchy: a set of faces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubStructure {
    pub name: String,
    pub faces: Vec<Vec<Point3>>,
}

impl SubStructure {
    /// All face vertices, in file order
    pub fn as_vertex_array(&self) -> Vec<Point3> {
        self.faces.iter().flatten().copied().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    pub name: String,
    pub sub_structures: Vec<SubStructure>,
}

impl Structure {
    pub fn iter(&self) -> std::slice::Iter<'_, SubStructure> {
        self.sub_structures.iter()
    }
}

impl<'a> IntoIterator for &'a Structure {
    type Item = &'a SubStructure;
    type IntoIter = std::slice::Iter<'a, SubStructure>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureGroup {
    pub name: String,
    pub structures: Vec<Structure>,
}

impl StructureGroup {
    pub fn iter(&self) -> std::slice::Iter<'_, Structure> {
        self.structures.iter()
    }
}

impl<'a> IntoIterator for &'a StructureGroup {
    type Item = &'a Structure;
    type IntoIter = std::slice::Iter<'a, Structure>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Parsed `.object` file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectFile {
    pub name: String,
    pub groups: Vec<StructureGroup>,
}

impl<'a> IntoIterator for &'a ObjectFile {
    type Item = &'a StructureGroup;
    type IntoIter = std::slice::Iter<'a, StructureGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

impl ObjectFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading object file {:?}", path);
        Self::parse(&read_to_string(path)?)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StructureGroup> {
        self.groups.iter()
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut file = ObjectFile::default();
        let mut open_tags: Vec<String> = Vec::new();
        let mut lines = content.lines().enumerate();

        while let Some((idx, raw)) = lines.next() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("begin_<") {
                let (tag, name) = split_tag(rest, line_no)?;
                let parent = open_tags.last().map(String::as_str);
                match tag {
                    STRUCTURE_GROUP => file.groups.push(StructureGroup {
                        name: name.to_string(),
                        structures: Vec::new(),
                    }),
                    STRUCTURE => {
                        expect_parent(parent, STRUCTURE_GROUP, tag, line_no)?;
                        current_group(&mut file, line_no)?.structures.push(Structure {
                            name: name.to_string(),
                            sub_structures: Vec::new(),
                        });
                    }
                    SUB_STRUCTURE => {
                        expect_parent(parent, STRUCTURE, tag, line_no)?;
                        current_structure(&mut file, line_no)?.sub_structures.push(SubStructure {
                            name: name.to_string(),
                            faces: Vec::new(),
                        });
                    }
                    FACE => {
                        expect_parent(parent, SUB_STRUCTURE, tag, line_no)?;
                        current_sub_structure(&mut file, line_no)?.faces.push(Vec::new());
                    }
                    "object" if open_tags.is_empty() => file.name = name.to_string(),
                    _ => {}
                }
                open_tags.push(tag.to_string());
            } else if let Some(rest) = line.strip_prefix("end_<") {
                let (tag, _) = split_tag(rest, line_no)?;
                match open_tags.pop() {
                    Some(open) if open == tag => {}
                    Some(open) => {
                        return Err(ParseError::syntax(
                            line_no,
                            format!("end_<{}> closes begin_<{}>", tag, open),
                        ))
                    }
                    None => {
                        return Err(ParseError::syntax(
                            line_no,
                            format!("end_<{}> without matching begin", tag),
                        ))
                    }
                }
            } else if let Some(rest) = line.strip_prefix("nVertices") {
                if open_tags.last().map(String::as_str) != Some(FACE) {
                    continue;
                }
                let count: usize = rest.trim().parse().map_err(|_| {
                    ParseError::syntax(line_no, format!("invalid vertex count {:?}", rest.trim()))
                })?;
                let face = current_face(&mut file, line_no)?;
                for _ in 0..count {
                    let (vidx, vline) = lines
                        .next()
                        .ok_or_else(|| ParseError::UnexpectedEof("face vertices".to_string()))?;
                    face.push(parse_point(vline.trim(), vidx + 1)?);
                }
            }
        }

        if let Some(open) = open_tags.pop() {
            return Err(ParseError::UnexpectedEof(format!("block <{}>", open)));
        }

        Ok(file)
    }
}

fn split_tag(rest: &str, line_no: usize) -> Result<(&str, &str)> {
    let (tag, name) = rest
        .split_once('>')
        .ok_or_else(|| ParseError::syntax(line_no, "unterminated block tag"))?;
    Ok((tag.trim(), name.trim()))
}

fn expect_parent(parent: Option<&str>, expected: &str, tag: &str, line_no: usize) -> Result<()> {
    if parent == Some(expected) {
        Ok(())
    } else {
        Err(ParseError::syntax(
            line_no,
            format!("<{}> must be nested in <{}>", tag, expected),
        ))
    }
}

fn current_group(file: &mut ObjectFile, line_no: usize) -> Result<&mut StructureGroup> {
    file.groups
        .last_mut()
        .ok_or_else(|| ParseError::syntax(line_no, "no open structure group"))
}

fn current_structure(file: &mut ObjectFile, line_no: usize) -> Result<&mut Structure> {
    current_group(file, line_no)?
        .structures
        .last_mut()
        .ok_or_else(|| ParseError::syntax(line_no, "no open structure"))
}

fn current_sub_structure(file: &mut ObjectFile, line_no: usize) -> Result<&mut SubStructure> {
    current_structure(file, line_no)?
        .sub_structures
        .last_mut()
        .ok_or_else(|| ParseError::syntax(line_no, "no open sub-structure"))
}

fn current_face(file: &mut ObjectFile, line_no: usize) -> Result<&mut Vec<Point3>> {
    current_sub_structure(file, line_no)?
        .faces
        .last_mut()
        .ok_or_else(|| ParseError::syntax(line_no, "no open face"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CARS: &str = "Format type:keyword version: 1.1.0
begin_<object> random-line
begin_<reference>
cartesian
longitude 0.000000000000000
end_<reference>
begin_<Material> Metal
Material 0
begin_<DielectricLayer>
conductivity 1.000000000000000e+07
end_<DielectricLayer>
end_<Material>
begin_<structure_group> car1
begin_<structure> car1
begin_<sub_structure>
begin_<face>
Material 0
nVertices 4
0.0 0.0 0.0
4.0 0.0 0.0
4.0 2.0 0.0
0.0 2.0 0.0
end_<face>
begin_<face>
Material 0
nVertices 3
0.0 0.0 1.5
4.0 0.0 1.5
4.0 2.0 1.5
end_<face>
end_<sub_structure>
end_<structure>
end_<structure_group>
begin_<structure_group> building
begin_<structure> building
begin_<sub_structure> north
begin_<face>
nVertices 3
10.0 10.0 0.0
20.0 10.0 0.0
20.0 10.0 30.0
end_<face>
end_<sub_structure>
begin_<sub_structure> south
begin_<face>
nVertices 3
10.0 -10.0 0.0
20.0 -10.0 0.0
20.0 -10.0 30.0
end_<face>
end_<sub_structure>
end_<structure>
end_<structure_group>
end_<object>
";

    #[test]
    fn test_parse_hierarchy() {
        let file = ObjectFile::parse(TWO_CARS).unwrap();
        assert_eq!(file.name, "random-line");
        assert_eq!(file.groups.len(), 2);

        let car = &file.groups[0].structures[0];
        assert_eq!(car.name, "car1");
        assert_eq!(car.sub_structures.len(), 1);
        assert_eq!(car.sub_structures[0].as_vertex_array().len(), 7);

        let building = &file.groups[1].structures[0];
        let names: Vec<&str> = building.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["north", "south"]);
    }

    #[test]
    fn test_nested_iteration_visits_every_leaf() {
        let file = ObjectFile::parse(TWO_CARS).unwrap();
        let mut leaves = 0;
        for group in &file {
            for structure in group {
                for _sub in structure {
                    leaves += 1;
                }
            }
        }
        assert_eq!(leaves, 3);
    }

    #[test]
    fn test_mismatched_end_tag() {
        let text = "begin_<structure_group> g\nbegin_<structure> s\nend_<structure_group>\n";
        let err = ObjectFile::parse(text).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_structure_outside_group() {
        let err = ObjectFile::parse("begin_<structure> s\nend_<structure>\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_truncated_face() {
        let text = "begin_<structure_group> g
begin_<structure> s
begin_<sub_structure>
begin_<face>
nVertices 3
0 0 0
";
        assert!(matches!(
            ObjectFile::parse(text),
            Err(ParseError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_unclosed_block() {
        let text = "begin_<structure_group> g\n";
        assert!(matches!(
            ObjectFile::parse(text),
            Err(ParseError::UnexpectedEof(_))
        ));
    }
}
