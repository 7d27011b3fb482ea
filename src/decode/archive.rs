//! Zip archives holding vector datasets.

use std::io::{Cursor, Read};

use bytes::Bytes;
use globset::{Glob, GlobMatcher};
use tracing::{debug, warn};
use zip::ZipArchive;

use super::Driver;
use crate::error::DecodeError;
use crate::resolve::extension;

/// Extensions of the files making up one shapefile dataset.
const SHAPEFILE_PARTS: [&str; 3] = ["shp", "dbf", "prj"];

/// In-memory zip archive.
pub struct VectorArchive {
    name: String,
    archive: ZipArchive<Cursor<Bytes>>,
}

/// The parts of a shapefile read out of an archive.
#[derive(Debug, Clone)]
pub struct ShapefileParts {
    pub shp: Vec<u8>,
    pub dbf: Option<Vec<u8>>,
    pub prj: Option<String>,
    pub member: String,
}

impl VectorArchive {
    /// Open archive `bytes`; `name` is used in error messages.
    pub fn new(name: impl Into<String>, bytes: Bytes) -> Result<Self, DecodeError> {
        let name = name.into();
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DecodeError::Archive(format!("{}: {}", name, e)))?;
        Ok(Self { name, archive })
    }

    /// File members, directories excluded.
    pub fn members(&self) -> Vec<String> {
        self.archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect()
    }

    /// Members matching `pattern` (everything when `None`).
    ///
    /// The pattern matches either the full member path or its file name.
    pub fn select(&self, pattern: Option<&str>) -> Result<Vec<String>, DecodeError> {
        let Some(pattern) = pattern else {
            return Ok(self.members());
        };
        let matcher = member_matcher(pattern)?;
        Ok(self
            .members()
            .into_iter()
            .filter(|member| matcher.is_match(member) || matcher.is_match(base_name(member)))
            .collect())
    }

    /// Guess the driver from the members' extensions.
    pub fn infer_driver(&self, pattern: Option<&str>) -> Result<Driver, DecodeError> {
        let members = self.select(pattern)?;
        members
            .iter()
            .find_map(|member| extension(member).and_then(|ext| Driver::from_extension(&ext)))
            .ok_or_else(|| {
                DecodeError::Driver(format!(
                    "'{}' does not contain a recognised vector dataset",
                    self.name
                ))
            })
    }

    pub fn read_member(&mut self, member: &str) -> Result<Vec<u8>, DecodeError> {
        let mut file = self
            .archive
            .by_name(member)
            .map_err(|e| DecodeError::Archive(format!("{}: {}: {}", self.name, member, e)))?;
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| DecodeError::Archive(format!("{}: {}: {}", self.name, member, e)))?;
        debug!(archive = %self.name, member = %member, size_bytes = buf.len(), "Read archive member");
        Ok(buf)
    }

    /// The first member, in sorted order, matching `pattern` with one of
    /// `extensions`.
    ///
    /// Archives often bundle several layers (`gadm36_ALA_0.shp`,
    /// `gadm36_ALA_1.shp`); the first one is read, as GDAL does, and the
    /// others are reported in a warning.
    pub fn first_member(
        &self,
        pattern: Option<&str>,
        extensions: &[&str],
    ) -> Result<Option<String>, DecodeError> {
        let mut candidates: Vec<String> = self
            .select(pattern)?
            .into_iter()
            .filter(|m| {
                extension(m).is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            })
            .collect();
        candidates.sort();
        if candidates.len() > 1 {
            warn!(
                archive = %self.name,
                selected = %candidates[0],
                ignored = %candidates[1..].join(", "),
                "Archive holds several datasets, reading the first; select another with a member pattern"
            );
        }
        Ok(candidates.into_iter().next())
    }

    /// Read the `.shp` member plus its `.dbf`/`.prj` siblings.
    pub fn shapefile(&mut self, pattern: Option<&str>) -> Result<ShapefileParts, DecodeError> {
        let shp_member = self.first_member(pattern, &SHAPEFILE_PARTS[..1])?.ok_or_else(|| {
            DecodeError::Driver(format!(
                "No shapefile found in {}, if you are using fsspec caching consider using same_names=True",
                self.name
            ))
        })?;

        let stem = shp_member
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| shp_member.clone());
        let sibling = |ext: &str, members: &[String]| {
            members
                .iter()
                .find(|m| {
                    m.rsplit_once('.')
                        .is_some_and(|(s, e)| s == stem && e.eq_ignore_ascii_case(ext))
                })
                .cloned()
        };

        let members = self.members();
        let dbf_member = sibling(SHAPEFILE_PARTS[1], &members);
        let prj_member = sibling(SHAPEFILE_PARTS[2], &members);

        let shp = self.read_member(&shp_member)?;
        let dbf = dbf_member.map(|m| self.read_member(&m)).transpose()?;
        let prj = prj_member
            .map(|m| self.read_member(&m))
            .transpose()?
            .map(|b| String::from_utf8_lossy(&b).trim().to_string());

        Ok(ShapefileParts {
            shp,
            dbf,
            prj,
            member: shp_member,
        })
    }
}

impl std::fmt::Debug for VectorArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorArchive")
            .field("name", &self.name)
            .field("members", &self.archive.len())
            .finish()
    }
}

fn member_matcher(pattern: &str) -> Result<GlobMatcher, DecodeError> {
    // A bare stem such as `gadm36_ALA_0` selects every file of that dataset
    let pattern = if pattern.contains(['*', '?', '[', '.']) {
        pattern.to_string()
    } else {
        format!("{}.*", pattern)
    };
    Glob::new(&pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| DecodeError::Archive(format!("Invalid member pattern '{}': {}", pattern, e)))
}

fn base_name(member: &str) -> &str {
    member.rsplit('/').next().unwrap_or(member)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive(members: &[(&str, &[u8])]) -> VectorArchive {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        VectorArchive::new("test.zip", Bytes::from(bytes)).unwrap()
    }

    #[test]
    fn test_select_members() {
        let archive = archive(&[
            ("gadm_0.shp", b"a"),
            ("gadm_0.dbf", b"b"),
            ("gadm_1.shp", b"c"),
            ("license.txt", b"d"),
        ]);
        assert_eq!(archive.members().len(), 4);
        assert_eq!(archive.select(Some("gadm_0*")).unwrap().len(), 2);
        assert_eq!(archive.select(Some("gadm_1")).unwrap(), vec!["gadm_1.shp"]);
        assert_eq!(archive.select(None).unwrap().len(), 4);
    }

    #[test]
    fn test_shapefile_parts_with_siblings() {
        let mut archive = archive(&[
            ("data/meow.shp", b"shp"),
            ("data/meow.DBF", b"dbf"),
            ("data/meow.prj", b"  GEOGCS[\"WGS 84\"]\n"),
        ]);
        let parts = archive.shapefile(None).unwrap();
        assert_eq!(parts.member, "data/meow.shp");
        assert_eq!(parts.shp, b"shp");
        assert_eq!(parts.dbf.as_deref(), Some(&b"dbf"[..]));
        assert_eq!(parts.prj.as_deref(), Some("GEOGCS[\"WGS 84\"]"));
    }

    #[test]
    fn test_no_shapefile_advises_same_names() {
        let mut archive = archive(&[("readme.txt", b"x")]);
        let err = archive.shapefile(None).unwrap_err();
        assert!(err.to_string().contains("same_names=True"));
    }

    #[test]
    fn test_multiple_shapefiles_read_first() {
        let mut archive = archive(&[
            ("gadm36_ALA_1.shp", b"level1"),
            ("gadm36_ALA_1.dbf", b"dbf1"),
            ("gadm36_ALA_0.shp", b"level0"),
            ("gadm36_ALA_0.dbf", b"dbf0"),
        ]);
        let parts = archive.shapefile(None).unwrap();
        assert_eq!(parts.member, "gadm36_ALA_0.shp");
        assert_eq!(parts.shp, b"level0");
        assert_eq!(parts.dbf.as_deref(), Some(&b"dbf0"[..]));

        let parts = archive.shapefile(Some("gadm36_ALA_1")).unwrap();
        assert_eq!(parts.shp, b"level1");
        assert_eq!(parts.dbf.as_deref(), Some(&b"dbf1"[..]));
    }

    #[test]
    fn test_first_member_sorted_and_case_insensitive() {
        let archive = archive(&[("b.GEOJSON", b"{}"), ("a.geojson", b"{}"), ("c.txt", b"")]);
        assert_eq!(
            archive.first_member(None, &["geojson"]).unwrap().as_deref(),
            Some("a.geojson")
        );
        assert_eq!(
            archive.first_member(Some("b*"), &["geojson"]).unwrap().as_deref(),
            Some("b.GEOJSON")
        );
        assert_eq!(archive.first_member(None, &["shp"]).unwrap(), None);
    }

    #[test]
    fn test_infer_driver() {
        let archive = archive(&[("x.geojson", b"{}"), ("notes.txt", b"")]);
        assert_eq!(archive.infer_driver(None).unwrap(), Driver::GeoJson);
        assert!(archive.infer_driver(Some("notes*")).is_err());
    }

    #[test]
    fn test_corrupt_archive() {
        assert!(VectorArchive::new("bad.zip", Bytes::from_static(b"not a zip")).is_err());
    }
}
