//! Web Mercator tile addressing and the corridor indexer.
//!
//! POI data is fetched and stored per tile at a single fixed zoom level. A
//! trail needs every tile touched by the corridor buffered around its line;
//! [`corridor_tiles`] computes that set and [`TileSet`] unions the sets of
//! many trails for the download job.

use std::{collections::BTreeSet, f64::consts::PI, fmt, str::FromStr};

use geo::{Coord, LineString, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::GeometryOps;

/// Deepest zoom level a quadkey can encode.
pub const MAX_ZOOM: u8 = 23;

/// Zoom level POI tiles are stored at.
pub const POI_ZOOM: u8 = 9;

/// Latitude limit of the Web Mercator projection.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A map tile at a given zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    /// Column, growing eastwards.
    pub x: u32,
    /// Row, growing southwards.
    pub y: u32,
    /// Zoom level.
    pub zoom: u8,
}

impl Tile {
    /// Build a tile from its address.
    #[must_use]
    pub const fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Tile containing `coord` at `zoom`. Longitudes wrap around the
    /// antimeridian; latitudes are clamped to the projection limit.
    #[must_use]
    pub fn containing(coord: Coord, zoom: u8) -> Self {
        let zoom = zoom.min(MAX_ZOOM);
        let scale = f64::from(1_u32 << zoom);
        let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let fx = scale * (coord.x / 360.0 + 0.5);
        let fy = scale * (0.5 - 0.25 * ((1.0 + lat.sin()) / (1.0 - lat.sin())).ln() / PI);
        let max_index = scale - 1.0;
        let x = fx.floor().rem_euclid(scale);
        let y = fy.floor().clamp(0.0, max_index);
        Self::new(x as u32, y as u32, zoom)
    }

    /// Canonical quadkey of this tile.
    #[must_use]
    pub fn quadkey(self) -> Quadkey {
        let digits = (1..=self.zoom)
            .rev()
            .map(|level| {
                let mask = 1_u32 << (level - 1);
                let mut digit = b'0';
                if self.x & mask != 0 {
                    digit += 1;
                }
                if self.y & mask != 0 {
                    digit += 2;
                }
                char::from(digit)
            })
            .collect();
        Quadkey(digits)
    }

    /// Geographic bounds of the tile (`min` = south-west corner).
    #[must_use]
    pub fn bounds(self) -> Rect {
        let scale = f64::from(1_u32 << self.zoom);
        let lon = |x: u32| f64::from(x) / scale * 360.0 - 180.0;
        let lat = |y: u32| {
            let n = PI - 2.0 * PI * f64::from(y) / scale;
            n.sinh().atan().to_degrees()
        };
        Rect::new(
            Coord {
                x: lon(self.x),
                y: lat(self.y + 1),
            },
            Coord {
                x: lon(self.x + 1),
                y: lat(self.y),
            },
        )
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Canonical string key of a tile; one digit `0`-`3` per zoom level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quadkey(String);

/// Errors raised when decoding a quadkey.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuadkeyError {
    /// A character other than `0`-`3` was found.
    #[error("quadkey {key:?} contains invalid digit {digit:?}")]
    InvalidDigit { key: String, digit: char },
    /// The key encodes a zoom deeper than [`MAX_ZOOM`].
    #[error("quadkey {key:?} is longer than {MAX_ZOOM} digits")]
    TooLong { key: String },
}

impl Quadkey {
    /// Decode the tile this key addresses.
    pub fn to_tile(&self) -> Result<Tile, QuadkeyError> {
        let zoom = u8::try_from(self.0.len())
            .ok()
            .filter(|zoom| *zoom <= MAX_ZOOM)
            .ok_or_else(|| QuadkeyError::TooLong {
                key: self.0.clone(),
            })?;
        let mut x = 0_u32;
        let mut y = 0_u32;
        for digit in self.0.chars() {
            x <<= 1;
            y <<= 1;
            match digit {
                '0' => {}
                '1' => x |= 1,
                '2' => y |= 1,
                '3' => {
                    x |= 1;
                    y |= 1;
                }
                other => {
                    return Err(QuadkeyError::InvalidDigit {
                        key: self.0.clone(),
                        digit: other,
                    });
                }
            }
        }
        Ok(Tile::new(x, y, zoom))
    }
}

impl FromStr for Quadkey {
    type Err = QuadkeyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let key = Self(input.to_owned());
        key.to_tile()?;
        Ok(key)
    }
}

impl AsRef<str> for Quadkey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Quadkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Buffer parameters for corridor indexing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorridorOptions {
    /// Corridor half-width in metres.
    pub radius_m: f64,
    /// Segments per quarter circle on rounded joins and caps.
    pub steps: u32,
    /// Zoom level of the produced tiles.
    pub zoom: u8,
}

impl Default for CorridorOptions {
    fn default() -> Self {
        Self {
            radius_m: 10_000.0,
            steps: 8,
            zoom: POI_ZOOM,
        }
    }
}

impl CorridorOptions {
    /// Override the corridor radius.
    #[must_use]
    pub const fn with_radius_m(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// Override the zoom level.
    #[must_use]
    pub const fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }
}

/// Deduplicated set of tiles keyed by quadkey.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSet {
    keys: BTreeSet<Quadkey>,
}

impl TileSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tile; returns `false` when it was already present.
    pub fn insert(&mut self, tile: Tile) -> bool {
        self.keys.insert(tile.quadkey())
    }

    /// Add every tile touched by the corridor around `line`.
    pub fn insert_corridor(
        &mut self,
        geometry: &dyn GeometryOps,
        line: &LineString,
        options: CorridorOptions,
    ) {
        if line.0.is_empty() {
            return;
        }
        let corridor = geometry.buffer(line, options.radius_m, options.steps);
        for vertex in &corridor.exterior().0 {
            self.insert(Tile::containing(*vertex, options.zoom));
        }
    }

    /// Number of distinct tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Tiles sorted ascending by `x`, then `y`.
    #[must_use]
    pub fn into_sorted(self) -> Vec<Tile> {
        let mut tiles: Vec<Tile> = self
            .keys
            .iter()
            .filter_map(|key| key.to_tile().ok())
            .collect();
        tiles.sort_by_key(|tile| (tile.x, tile.y));
        tiles
    }
}

impl FromIterator<Tile> for TileSet {
    fn from_iter<I: IntoIterator<Item = Tile>>(iter: I) -> Self {
        let mut set = Self::new();
        for tile in iter {
            set.insert(tile);
        }
        set
    }
}

/// Tiles covering the corridor of `line`, sorted by `x` then `y`.
///
/// An empty line produces no tiles.
///
/// # Examples
/// ```
/// use geo::LineString;
/// use traildb_core::{CorridorOptions, Spherical, corridor_tiles};
///
/// let line = LineString::from(vec![(7.44, 46.94), (7.50, 46.98)]);
/// let tiles = corridor_tiles(&Spherical, &line, CorridorOptions::default());
/// assert!(!tiles.is_empty());
/// assert!(corridor_tiles(&Spherical, &LineString::new(vec![]), CorridorOptions::default()).is_empty());
/// ```
#[must_use]
pub fn corridor_tiles(
    geometry: &dyn GeometryOps,
    line: &LineString,
    options: CorridorOptions,
) -> Vec<Tile> {
    let mut set = TileSet::new();
    set.insert_corridor(geometry, line, options);
    set.into_sorted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Spherical;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(Coord { x: 0.0, y: 0.0 }, 1, Tile::new(1, 1, 1))]
    #[case(Coord { x: -74.006, y: 40.7128 }, 16, Tile::new(19295, 24640, 16))]
    #[case(Coord { x: 7.4474, y: 46.948 }, 9, Tile::new(266, 180, 9))]
    #[case(Coord { x: 180.0, y: 0.0 }, 2, Tile::new(0, 2, 2))]
    #[case(Coord { x: 10.0, y: 89.9 }, 3, Tile::new(4, 0, 3))]
    fn locates_containing_tile(#[case] coord: Coord, #[case] zoom: u8, #[case] expected: Tile) {
        assert_eq!(Tile::containing(coord, zoom), expected);
    }

    #[rstest]
    #[case(Tile::new(3, 5, 3), "213")]
    #[case(Tile::new(0, 0, 0), "")]
    #[case(Tile::new(35_210, 21_493, 16), "1202102332221212")]
    fn encodes_quadkeys(#[case] tile: Tile, #[case] expected: &str) {
        assert_eq!(tile.quadkey().as_ref(), expected);
        assert_eq!(tile.quadkey().to_tile(), Ok(tile));
    }

    #[rstest]
    fn rejects_invalid_quadkeys() {
        assert!(matches!(
            "0124".parse::<Quadkey>(),
            Err(QuadkeyError::InvalidDigit { digit: '4', .. })
        ));
        assert!(matches!(
            "0".repeat(24).parse::<Quadkey>(),
            Err(QuadkeyError::TooLong { .. })
        ));
    }

    #[rstest]
    fn bounds_contain_the_source_point() {
        let point = Coord { x: 7.4474, y: 46.948 };
        let bounds = Tile::containing(point, 9).bounds();
        assert!(bounds.min().x <= point.x && point.x < bounds.max().x);
        assert!(bounds.min().y <= point.y && point.y < bounds.max().y);
    }

    #[rstest]
    fn empty_line_has_no_tiles() {
        let tiles = corridor_tiles(
            &Spherical,
            &LineString::new(Vec::new()),
            CorridorOptions::default(),
        );
        assert!(tiles.is_empty());
    }

    #[rstest]
    fn corridor_spans_neighbouring_tiles() {
        // About 1.4 km east of the boundary between columns 265 and 266.
        let line = LineString::from(vec![(7.05, 46.90), (7.06, 46.91)]);
        let tiles = corridor_tiles(&Spherical, &line, CorridorOptions::default());
        assert_eq!(tiles, vec![Tile::new(265, 180, 9), Tile::new(266, 180, 9)]);
        assert!(tiles.windows(2).all(|pair| match pair {
            [a, b] => (a.x, a.y) < (b.x, b.y),
            _ => true,
        }));
    }

    #[rstest]
    fn overlapping_corridors_deduplicate() {
        let first = LineString::from(vec![(7.44, 46.94), (7.60, 46.90)]);
        let second = LineString::from(vec![(7.45, 46.95), (7.55, 46.92)]);
        let mut set = TileSet::new();
        set.insert_corridor(&Spherical, &first, CorridorOptions::default());
        let after_first = set.len();
        set.insert_corridor(&Spherical, &second, CorridorOptions::default());
        assert_eq!(set.len(), after_first);
    }

    proptest! {
        #[test]
        fn corridor_tiles_are_deterministic_and_unique(
            lon in -170.0_f64..170.0,
            lat in -70.0_f64..70.0,
            dlon in -0.5_f64..0.5,
            dlat in -0.5_f64..0.5,
        ) {
            let line = LineString::from(vec![(lon, lat), (lon + dlon, lat + dlat)]);
            let first = corridor_tiles(&Spherical, &line, CorridorOptions::default());
            let second = corridor_tiles(&Spherical, &line, CorridorOptions::default());
            prop_assert_eq!(&first, &second);
            let unique: BTreeSet<(u32, u32)> = first.iter().map(|tile| (tile.x, tile.y)).collect();
            prop_assert_eq!(unique.len(), first.len());
            prop_assert!(!first.is_empty());
        }
    }
}
