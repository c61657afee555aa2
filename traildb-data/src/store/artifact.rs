//! JSON artifacts: relation snapshots and POI tiles.
//!
//! Both artifact kinds are objects with one or two timestamps and an
//! `elements` array. Readers stream the array one element at a time so a
//! large relation or a dense tile never has to be held in memory at once.

use std::{
    fmt,
    io::{BufReader, BufWriter, Write},
};

use camino::Utf8Path;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{DeserializeOwned, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor},
};
use traildb_core::{Element, Timestamp};

use super::StoreError;

/// Raw relation download kept under `data/trails/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Point in time the snapshot represents.
    #[serde(rename = "captureTimestamp")]
    pub capture_timestamp: Timestamp,
    /// Relation, sub-relations, ways and nodes as downloaded.
    pub elements: Vec<Element>,
}

impl Snapshot {
    /// Wrap downloaded elements.
    #[must_use]
    pub const fn new(capture_timestamp: Timestamp, elements: Vec<Element>) -> Self {
        Self {
            capture_timestamp,
            elements,
        }
    }
}

/// Cached candidate elements of one POI tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiTile {
    /// Run cutoff the tile was fetched for.
    #[serde(rename = "captureTimestamp")]
    pub capture_timestamp: Timestamp,
    /// Data freshness reported by the service.
    #[serde(rename = "baseTimestamp", default, skip_serializing_if = "Option::is_none")]
    pub base_timestamp: Option<Timestamp>,
    /// Candidate elements.
    pub elements: Vec<Element>,
}

/// Timestamps found next to a streamed `elements` array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactHeader {
    /// `captureTimestamp`, when present.
    pub capture_timestamp: Option<Timestamp>,
    /// `baseTimestamp`, when present.
    pub base_timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum JsonStyle {
    Compact,
    Pretty,
}

/// Serialise `value` to `path`, creating parent directories.
pub(crate) fn write_json<T: Serialize + ?Sized>(
    path: &Utf8Path,
    value: &T,
    style: JsonStyle,
) -> Result<(), StoreError> {
    let file = traildb_fs::create_file(path).map_err(|source| StoreError::Create {
        path: path.to_owned(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    let written = match style {
        JsonStyle::Compact => serde_json::to_writer(&mut writer, value),
        JsonStyle::Pretty => serde_json::to_writer_pretty(&mut writer, value),
    };
    written.map_err(|source| StoreError::Write {
        path: path.to_owned(),
        source,
    })?;
    writer.flush().map_err(|source| StoreError::Flush {
        path: path.to_owned(),
        source,
    })
}

/// Deserialise a whole JSON document from `path`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, StoreError> {
    let file = traildb_fs::open_file(path).map_err(|source| StoreError::Open {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Stream the `elements` of the artifact at `path` into `on_element`.
///
/// Returns the timestamps found alongside the array. Unknown fields are
/// skipped.
pub fn stream_elements<F>(path: &Utf8Path, mut on_element: F) -> Result<ArtifactHeader, StoreError>
where
    F: FnMut(Element),
{
    let parse_error = |source| StoreError::Parse {
        path: path.to_owned(),
        source,
    };
    let file = traildb_fs::open_file(path).map_err(|source| StoreError::Open {
        path: path.to_owned(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
    let header = ArtifactSeed {
        on_element: &mut on_element,
    }
    .deserialize(&mut deserializer)
    .map_err(parse_error)?;
    deserializer.end().map_err(parse_error)?;
    Ok(header)
}

struct ArtifactSeed<'a, F> {
    on_element: &'a mut F,
}

impl<'de, F: FnMut(Element)> DeserializeSeed<'de> for ArtifactSeed<'_, F> {
    type Value = ArtifactHeader;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F: FnMut(Element)> Visitor<'de> for ArtifactSeed<'_, F> {
    type Value = ArtifactHeader;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object with an `elements` array")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut header = ArtifactHeader::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "captureTimestamp" => header.capture_timestamp = map.next_value()?,
                "baseTimestamp" => header.base_timestamp = map.next_value()?,
                "elements" => map.next_value_seed(ElementsSeed {
                    on_element: &mut *self.on_element,
                })?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(header)
    }
}

struct ElementsSeed<'a, F> {
    on_element: &'a mut F,
}

impl<'de, F: FnMut(Element)> DeserializeSeed<'de> for ElementsSeed<'_, F> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F: FnMut(Element)> Visitor<'de> for ElementsSeed<'_, F> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an array of map elements")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(element) = seq.next_element::<Element>()? {
            (self.on_element)(element);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;
    use traildb_core::test_support::{node, way};

    #[fixture]
    fn workspace() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        (dir, root)
    }

    fn day(raw: &str) -> Timestamp {
        raw.parse().expect("valid timestamp")
    }

    #[rstest]
    fn streams_snapshot_elements_in_order(workspace: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workspace;
        let path = root.join("trails/gr5.json");
        let snapshot = Snapshot::new(
            day("2024-03-01"),
            vec![
                way(100, &[(7.0, 46.0), (7.1, 46.0)], &[("highway", "path")]),
                node(5, (7.0, 46.0), &[]),
            ],
        );
        write_json(&path, &snapshot, JsonStyle::Compact).expect("write snapshot");

        let mut seen = Vec::new();
        let header =
            stream_elements(&path, |element| seen.push(element.element_id().to_string()))
                .expect("stream snapshot");

        assert_eq!(seen, ["w100", "n5"]);
        assert_eq!(header.capture_timestamp, Some(day("2024-03-01")));
        assert_eq!(header.base_timestamp, None);
    }

    #[rstest]
    fn header_fields_may_follow_the_elements(workspace: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workspace;
        let path = root.join("poi/9/265/180.json");
        traildb_fs::create_file(&path)
            .and_then(|mut file| {
                file.write_all(
                    br#"{"elements":[{"type":"node","id":1,"lat":46.0,"lon":7.0}],
                        "generator":"overpass","baseTimestamp":"2024-03-02T04:05:06Z",
                        "captureTimestamp":"2024-03-01T00:00:00Z"}"#,
                )
            })
            .expect("write tile");

        let mut count = 0;
        let header = stream_elements(&path, |_| count += 1).expect("stream tile");

        assert_eq!(count, 1);
        assert_eq!(header.base_timestamp, Some(day("2024-03-02T04:05:06Z")));
        assert_eq!(header.capture_timestamp, Some(day("2024-03-01")));
    }

    #[rstest]
    fn truncated_artifacts_are_parse_errors(workspace: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workspace;
        let path = root.join("broken.json");
        traildb_fs::create_file(&path)
            .and_then(|mut file| file.write_all(br#"{"elements":[{"type":"node","id":1}"#))
            .expect("write artifact");

        let err = stream_elements(&path, |_| {}).expect_err("truncated input");
        assert!(matches!(err, StoreError::Parse { .. }), "unexpected error: {err}");
    }

    #[rstest]
    fn missing_artifacts_are_open_errors(workspace: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workspace;
        let err = stream_elements(&root.join("absent.json"), |_| {}).expect_err("missing file");
        assert!(matches!(err, StoreError::Open { .. }), "unexpected error: {err}");
    }
}
