//! Spatial operations: H3-based indexing and great-circle distances.
//!
//! Orders and couriers live on H3 cells at [`CELL_RESOLUTION`]. A coarser
//! parent cell ([`GROUPING_RESOLUTION`]) acts as the geohash-style grouping
//! key that the bundling heuristic clusters pick-ups by.

use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use h3o::{CellIndex, Resolution};
use lru::LruCache;

/// Resolution for courier/order positions (~240 m cells).
pub const CELL_RESOLUTION: Resolution = Resolution::Nine;

/// Coarse resolution used as the spatial grouping key (~1.2 km cells),
/// a stand-in for geohash truncation of pick-up coordinates.
pub const GROUPING_RESOLUTION: Resolution = Resolution::Seven;

/// Uncached haversine distance (internal use).
fn distance_km_between_cells_uncached(a: CellIndex, b: CellIndex) -> f64 {
    let a: h3o::LatLng = a.into();
    let b: h3o::LatLng = b.into();
    let (lat1, lon1) = (a.lat().to_radians(), a.lng().to_radians());
    let (lat2, lon2) = (b.lat().to_radians(), b.lng().to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    6371.0 * c
}

fn get_distance_cache() -> &'static Mutex<LruCache<(CellIndex, CellIndex), f64>> {
    static CACHE: OnceLock<Mutex<LruCache<(CellIndex, CellIndex), f64>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(50_000).expect("cache size must be non-zero"),
        ))
    })
}

/// Haversine distance between two H3 cells with LRU caching.
pub fn distance_km_between_cells(a: CellIndex, b: CellIndex) -> f64 {
    // Symmetric key (smaller cell first) to maximize cache hits.
    let key = if a < b { (a, b) } else { (b, a) };

    let mut cache = match get_distance_cache().lock() {
        Ok(guard) => guard,
        Err(_) => return distance_km_between_cells_uncached(key.0, key.1),
    };
    *cache.get_or_insert(key, || distance_km_between_cells_uncached(key.0, key.1))
}

/// Path cache for courier movement.
/// Only successful paths are cached; failures retry on the next query.
struct PathCache {
    cache: Mutex<LruCache<(CellIndex, CellIndex), Vec<CellIndex>>>,
}

impl PathCache {
    fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(5_000).expect("cache size must be non-zero"),
            )),
        }
    }

    fn get_or_compute(&self, from: CellIndex, to: CellIndex) -> Option<Vec<CellIndex>> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(_) => return Self::compute_path(from, to),
        };
        if let Some(cached) = cache.get(&(from, to)) {
            return Some(cached.clone());
        }

        let path = Self::compute_path(from, to);
        if let Some(cells) = &path {
            cache.put((from, to), cells.clone());
        }
        path
    }

    fn compute_path(from: CellIndex, to: CellIndex) -> Option<Vec<CellIndex>> {
        from.grid_path_cells(to).ok().and_then(|path| {
            let cells: Vec<CellIndex> = path.filter_map(|cell| cell.ok()).collect();
            if cells.is_empty() {
                None
            } else {
                Some(cells)
            }
        })
    }
}

static PATH_CACHE: OnceLock<PathCache> = OnceLock::new();

/// Grid path between two cells with caching.
pub fn grid_path_cells_cached(from: CellIndex, to: CellIndex) -> Option<Vec<CellIndex>> {
    PATH_CACHE
        .get_or_init(PathCache::new)
        .get_or_compute(from, to)
}

/// The coarse grouping cell for a position cell.
pub fn grouping_cell(cell: CellIndex) -> CellIndex {
    cell.parent(GROUPING_RESOLUTION).unwrap_or(cell)
}

/// Neighboring grouping cells of a position, excluding its own group.
/// Used by the relocation policy to pick a nearby destination.
pub fn neighbor_grouping_cells(cell: CellIndex) -> Vec<CellIndex> {
    let group = grouping_cell(cell);
    group
        .grid_disk::<Vec<_>>(1)
        .into_iter()
        .filter(|c| *c != group)
        .collect()
}

/// Center position cell of a grouping cell.
pub fn grouping_cell_center(group: CellIndex) -> CellIndex {
    let center: h3o::LatLng = group.into();
    center.to_cell(CELL_RESOLUTION)
}
