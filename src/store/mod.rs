//! SQLite backed storage of the preparation results. Every phase opens the
//! same file; writes of the partition phase are grouped per region so a crash
//! never leaves a half processed region behind.

use std::path::Path;

use ahash::{HashMap, HashMapExt, HashSet};
use itertools::Itertools;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use self::{
    geometry::{pack_coordinates, pack_indexes, unpack_coordinates, unpack_indexes},
    region::RoutingRegion,
};
use crate::{
    error::{PrepError, Result, StructuralError},
    graphs::{
        edge::NetworkEdge,
        network_graph::NetworkGraph,
        network_point::NetworkPoint,
        segment::{NetworkSegment, ShortcutInfo},
        ClusterIndex, PointId, PointIndex,
    },
    source::{RegionInfo, RoadSegment},
};

pub mod geometry;
pub mod region;

/// File extension of preparation stores.
pub const STORE_EXTENSION: &str = ".hhdb";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Drops every table.
    FullRecreate,
    /// Drops segments, geometry and contraction results, keeps points.
    RecreateSegments,
    Read,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS points(idPoint INTEGER PRIMARY KEY, ind INTEGER, roadId INTEGER,
    start INTEGER, "end" INTEGER, sx31 INTEGER, sy31 INTEGER, ex31 INTEGER, ey31 INTEGER,
    indexes TEXT, chInd INTEGER);
CREATE UNIQUE INDEX IF NOT EXISTS pointsInd ON points(ind);
CREATE TABLE IF NOT EXISTS clusters(idPoint INTEGER, indPoint INTEGER, clusterInd INTEGER,
    PRIMARY KEY(indPoint, clusterInd));
CREATE TABLE IF NOT EXISTS segments(idPoint INTEGER, idConnPoint INTEGER, dist REAL,
    shortcut INTEGER DEFAULT 0, PRIMARY KEY(idPoint, idConnPoint, shortcut));
CREATE TABLE IF NOT EXISTS geometry(idPoint INTEGER, idConnPoint INTEGER,
    shortcut INTEGER DEFAULT 0, geometry BLOB, PRIMARY KEY(idPoint, idConnPoint, shortcut));
CREATE TABLE IF NOT EXISTS shortcuts(idPoint INTEGER, idConnPoint INTEGER, chain BLOB,
    witnesses INTEGER, PRIMARY KEY(idPoint, idConnPoint));
CREATE TABLE IF NOT EXISTS routeRegions(id INTEGER PRIMARY KEY, name TEXT, filePointer INTEGER,
    size INTEGER, filename TEXT, "left" REAL, "right" REAL, top REAL, bottom REAL,
    processed INTEGER DEFAULT 0);
CREATE TABLE IF NOT EXISTS routeRegionPoints(id INTEGER, pntId INTEGER);
CREATE INDEX IF NOT EXISTS routeRegionPointsIndex ON routeRegionPoints(id);
CREATE TABLE IF NOT EXISTS midpoints(ind INTEGER PRIMARY KEY, cnt INTEGER);
"#;

const DROP_ALL: &str = r#"
DROP TABLE IF EXISTS points;
DROP TABLE IF EXISTS clusters;
DROP TABLE IF EXISTS segments;
DROP TABLE IF EXISTS geometry;
DROP TABLE IF EXISTS shortcuts;
DROP TABLE IF EXISTS routeRegions;
DROP TABLE IF EXISTS routeRegionPoints;
DROP TABLE IF EXISTS midpoints;
"#;

const DROP_SEGMENTS: &str = r#"
DELETE FROM segments;
DELETE FROM geometry;
DELETE FROM shortcuts;
UPDATE points SET chInd = NULL;
"#;

struct Membership {
    point: PointId,
    index: PointIndex,
    cluster: ClusterIndex,
}

pub struct GraphStore {
    conn: Connection,
    batch_size: usize,
    pending_points: Vec<NetworkPoint>,
    pending_memberships: Vec<Membership>,
}

impl GraphStore {
    pub fn open(path: &Path, mode: OpenMode, batch_size: usize) -> Result<GraphStore> {
        let conn = Connection::open(path)?;
        info!("Opened store {} ({:?})", path.display(), mode);
        GraphStore::init(conn, mode, batch_size)
    }

    pub fn open_in_memory(batch_size: usize) -> Result<GraphStore> {
        GraphStore::init(Connection::open_in_memory()?, OpenMode::FullRecreate, batch_size)
    }

    fn init(conn: Connection, mode: OpenMode, batch_size: usize) -> Result<GraphStore> {
        if mode == OpenMode::FullRecreate {
            conn.execute_batch(DROP_ALL)?;
        }
        conn.execute_batch(SCHEMA)?;
        if mode == OpenMode::RecreateSegments {
            conn.execute_batch(DROP_SEGMENTS)?;
        }
        Ok(GraphStore {
            conn,
            batch_size: batch_size.max(1),
            pending_points: Vec::new(),
            pending_memberships: Vec::new(),
        })
    }

    /// Runs `f` inside a transaction unless one is already open.
    fn in_transaction<T>(&mut self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return f(&self.conn);
        }
        self.conn.execute_batch("BEGIN")?;
        match f(&self.conn) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    debug!("Rollback failed: {}", rollback);
                }
                Err(error)
            }
        }
    }

    // regions

    /// Persists regions not yet known by name and returns all requested
    /// regions with their store ids.
    pub fn insert_regions(&mut self, regions: &[RegionInfo]) -> Result<Vec<RoutingRegion>> {
        let existing = self.load_regions()?;
        let mut next_id = existing.iter().map(|region| region.id + 1).max().unwrap_or(0);
        self.in_transaction(|conn| {
            let mut result = Vec::with_capacity(regions.len());
            let mut insert = conn.prepare_cached(
                r#"INSERT INTO routeRegions(id, name, filePointer, size, filename, "left", "right", top, bottom)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for info in regions {
                if let Some(region) = existing.iter().find(|region| region.info.name == info.name) {
                    result.push(region.clone());
                    continue;
                }
                insert.execute(params![
                    next_id,
                    info.name,
                    info.file_pointer,
                    info.size,
                    info.filename,
                    info.left,
                    info.right,
                    info.top,
                    info.bottom
                ])?;
                result.push(RoutingRegion::new(next_id, info.clone(), false));
                next_id += 1;
            }
            Ok(result)
        })
    }

    pub fn load_regions(&self) -> Result<Vec<RoutingRegion>> {
        let mut statement = self.conn.prepare(
            r#"SELECT id, name, filePointer, size, filename, "left", "right", top, bottom, processed
               FROM routeRegions ORDER BY id"#,
        )?;
        let regions = statement
            .query_map([], |row| {
                let info = RegionInfo {
                    name: row.get(1)?,
                    file_pointer: row.get(2)?,
                    size: row.get(3)?,
                    filename: row.get(4)?,
                    left: row.get(5)?,
                    right: row.get(6)?,
                    top: row.get(7)?,
                    bottom: row.get(8)?,
                };
                Ok(RoutingRegion::new(row.get(0)?, info, row.get::<_, i64>(9)? != 0))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(regions)
    }

    pub fn load_region_points(&self, region_id: i64) -> Result<Vec<PointId>> {
        let mut statement = self
            .conn
            .prepare_cached("SELECT pntId FROM routeRegionPoints WHERE id = ?")?;
        let points = statement
            .query_map([region_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<PointId>>>()?;
        Ok(points)
    }

    /// Opens the transaction holding every write of one region.
    pub fn begin_region(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// Flushes pending clusters, stores the visited set of the region and
    /// commits everything written since `begin_region`. Only a `complete`
    /// region is marked processed.
    pub fn commit_region(&mut self, region: &RoutingRegion, complete: bool) -> Result<()> {
        self.flush()?;
        {
            self.conn
                .execute("DELETE FROM routeRegionPoints WHERE id = ?", [region.id])?;
            let mut insert = self
                .conn
                .prepare_cached("INSERT INTO routeRegionPoints(id, pntId) VALUES (?, ?)")?;
            if let Some(visited) = region.visited() {
                let mut points: Vec<&PointId> = visited.iter().collect();
                points.sort_unstable();
                for point in points {
                    insert.execute(params![region.id, point])?;
                }
            }
            self.conn.execute(
                "UPDATE routeRegions SET processed = ? WHERE id = ?",
                params![complete, region.id],
            )?;
        }
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    /// Drops everything written since `begin_region`.
    pub fn rollback_region(&mut self) -> Result<()> {
        self.pending_points.clear();
        self.pending_memberships.clear();
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    // clusters and points

    /// Registers the border of a cluster. Border points seen for the first
    /// time get the next sequential index.
    pub fn insert_cluster(
        &mut self,
        cluster: ClusterIndex,
        border: &[RoadSegment],
        network_points: &mut HashMap<PointId, PointIndex>,
    ) -> Result<()> {
        for segment in border {
            let segment = segment.canonical();
            let id = segment.point_id();
            let next_index = network_points.len() as PointIndex;
            let index = *network_points.entry(id).or_insert(next_index);
            if index == next_index {
                self.pending_points.push(NetworkPoint {
                    id,
                    index,
                    road_id: segment.identity.road_id(),
                    start: segment.identity.start(),
                    end: segment.identity.end(),
                    start_x: segment.start_x,
                    start_y: segment.start_y,
                    end_x: segment.end_x,
                    end_y: segment.end_y,
                    clusters: vec![cluster],
                    ch_index: None,
                });
            }
            self.pending_memberships.push(Membership {
                point: id,
                index,
                cluster,
            });
        }
        if self.pending_memberships.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        let points = std::mem::take(&mut self.pending_points);
        let memberships = std::mem::take(&mut self.pending_memberships);
        if points.is_empty() && memberships.is_empty() {
            return Ok(());
        }
        self.in_transaction(|conn| {
            let mut insert_point = conn.prepare_cached(
                r#"INSERT INTO points(idPoint, ind, roadId, start, "end", sx31, sy31, ex31, ey31, indexes)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for point in &points {
                let indexes = point.clusters.iter().join(",");
                insert_point.execute(params![
                    point.id,
                    point.index,
                    point.road_id,
                    point.start,
                    point.end,
                    point.start_x,
                    point.start_y,
                    point.end_x,
                    point.end_y,
                    indexes
                ])?;
            }
            let mut insert_cluster = conn.prepare_cached(
                "INSERT OR IGNORE INTO clusters(idPoint, indPoint, clusterInd) VALUES (?, ?, ?)",
            )?;
            for membership in &memberships {
                insert_cluster.execute(params![
                    membership.point,
                    membership.index,
                    membership.cluster
                ])?;
            }
            Ok(())
        })
    }

    pub fn load_network_point_indexes(&self) -> Result<HashMap<PointId, PointIndex>> {
        let mut statement = self.conn.prepare("SELECT idPoint, ind FROM points")?;
        let mut indexes = HashMap::new();
        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            indexes.insert(row.get(0)?, row.get(1)?);
        }
        Ok(indexes)
    }

    pub fn next_cluster_index(&self) -> Result<ClusterIndex> {
        let max: Option<ClusterIndex> =
            self.conn
                .query_row("SELECT MAX(clusterInd) FROM clusters", [], |row| row.get(0))?;
        Ok(max.map_or(0, |max| max + 1))
    }

    /// Mirrors cluster membership into `points.indexes`.
    pub fn finalize_point_clusters(&mut self) -> Result<()> {
        self.flush()?;
        self.conn.execute(
            "UPDATE points SET indexes = (SELECT group_concat(clusterInd, ',') FROM
                (SELECT clusterInd FROM clusters WHERE clusters.indPoint = points.ind ORDER BY clusterInd))",
            [],
        )?;
        Ok(())
    }

    pub fn point_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM points", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All points ordered by index, so `points[i].index == i`.
    pub fn load_points(&self) -> Result<Vec<NetworkPoint>> {
        let mut statement = self.conn.prepare(
            r#"SELECT idPoint, ind, roadId, start, "end", sx31, sy31, ex31, ey31, chInd
               FROM points ORDER BY ind"#,
        )?;
        let mut points = statement
            .query_map([], read_point)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (position, point) in points.iter().enumerate() {
            if point.index as usize != position {
                return Err(StructuralError::MissingPoint {
                    point: position as PointId,
                }
                .into());
            }
        }

        let mut statement = self
            .conn
            .prepare("SELECT indPoint, clusterInd FROM clusters ORDER BY indPoint, clusterInd")?;
        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            let index: PointIndex = row.get(0)?;
            let cluster: ClusterIndex = row.get(1)?;
            match points.get_mut(index as usize) {
                Some(point) => point.clusters.push(cluster),
                None => {
                    return Err(StructuralError::MissingPoint {
                        point: index as PointId,
                    }
                    .into())
                }
            }
        }
        Ok(points)
    }

    pub fn load_point_by_id(&self, id: PointId) -> Result<Option<NetworkPoint>> {
        self.load_point("idPoint", id)
    }

    pub fn load_point_by_index(&self, index: PointIndex) -> Result<Option<NetworkPoint>> {
        self.load_point("ind", index as i64)
    }

    fn load_point(&self, column: &str, key: i64) -> Result<Option<NetworkPoint>> {
        let sql = format!(
            r#"SELECT idPoint, ind, roadId, start, "end", sx31, sy31, ex31, ey31, chInd
               FROM points WHERE {} = ?"#,
            column
        );
        let Some(mut point) = self
            .conn
            .query_row(&sql, [key], read_point)
            .optional()?
        else {
            return Ok(None);
        };
        let mut statement = self
            .conn
            .prepare_cached("SELECT clusterInd FROM clusters WHERE indPoint = ? ORDER BY clusterInd")?;
        point.clusters = statement
            .query_map([point.index], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(point))
    }

    pub fn update_ch_indexes(&mut self, ranks: &[Option<u32>]) -> Result<()> {
        self.in_transaction(|conn| write_ch_indexes(conn, ranks))
    }

    // segments

    pub fn insert_segments(&mut self, segments: &[NetworkSegment]) -> Result<()> {
        self.in_transaction(|conn| write_segments(conn, segments))
    }

    /// Origins of computed border segments.
    pub fn points_with_segments(&self) -> Result<HashSet<PointIndex>> {
        let mut statement = self
            .conn
            .prepare("SELECT DISTINCT idPoint FROM segments WHERE shortcut = 0")?;
        let points = statement
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<PointIndex>>>()?;
        Ok(points)
    }

    pub fn segment_count(&self, shortcuts: bool) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM segments WHERE shortcut = ?",
            [shortcuts as i64],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// All segments in one pass, ordered by endpoints. A shortcut may share its
    /// endpoints with a longer direct segment. Geometry is not loaded.
    pub fn load_segments(&self, include_shortcuts: bool) -> Result<Vec<NetworkSegment>> {
        let mut statement = self.conn.prepare(
            "SELECT s.idPoint, s.idConnPoint, s.dist, s.shortcut, c.chain, c.witnesses
             FROM segments s LEFT JOIN shortcuts c
                ON s.idPoint = c.idPoint AND s.idConnPoint = c.idConnPoint
             WHERE s.shortcut = 0 OR ?
             ORDER BY s.idPoint, s.idConnPoint, s.shortcut",
        )?;
        let mut rows = statement.query([include_shortcuts])?;
        let mut segments = Vec::new();
        while let Some(row) = rows.next()? {
            let mut segment = NetworkSegment::direct(row.get(0)?, row.get(1)?, row.get(2)?);
            if row.get::<_, i64>(3)? != 0 {
                let chain: Option<Vec<u8>> = row.get(4)?;
                let witnesses: Option<u32> = row.get(5)?;
                segment.shortcut = Some(ShortcutInfo {
                    chain: match chain {
                        Some(chain) => unpack_indexes(&chain)?,
                        None => vec![segment.start, segment.end],
                    },
                    witnesses: witnesses.unwrap_or(0),
                });
            }
            segments.push(segment);
        }
        Ok(segments)
    }

    /// Point graph of the persisted segments, one node per point index. The
    /// cheaper of a direct segment and a shortcut between the same points wins.
    pub fn load_network_graph(&self, include_shortcuts: bool) -> Result<NetworkGraph> {
        let segments = self.load_segments(include_shortcuts)?;
        let edges: Vec<NetworkEdge> = segments.iter().filter_map(NetworkSegment::edge).collect();
        if edges.len() < segments.len() {
            debug!("Ignored {} unusable segments", segments.len() - edges.len());
        }
        Ok(NetworkGraph::from_edges(self.point_count()?, &edges))
    }

    pub fn load_geometry(
        &self,
        start: PointIndex,
        end: PointIndex,
        shortcut: bool,
    ) -> Result<Option<Vec<(i32, i32)>>> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT geometry FROM geometry
                 WHERE idPoint = ? AND idConnPoint = ? AND shortcut = ?",
                params![start, end, shortcut],
                |row| row.get(0),
            )
            .optional()?;
        match blob {
            Some(blob) => Ok(Some(unpack_coordinates(&blob)?)),
            None => Ok(None),
        }
    }

    /// Replaces all shortcut segments and contraction ranks in one
    /// transaction. Direct segments stay untouched.
    pub fn replace_shortcuts(
        &mut self,
        shortcuts: &[NetworkSegment],
        ranks: &[Option<u32>],
    ) -> Result<()> {
        if let Some(direct) = shortcuts.iter().find(|segment| !segment.is_shortcut()) {
            return Err(PrepError::Config(format!(
                "segment {} -> {} is not a shortcut",
                direct.start, direct.end
            )));
        }
        self.in_transaction(|conn| {
            conn.execute_batch(
                "DELETE FROM geometry WHERE shortcut = 1;
                 DELETE FROM segments WHERE shortcut = 1;
                 DELETE FROM shortcuts;
                 UPDATE points SET chInd = NULL;",
            )?;
            write_ch_indexes(conn, ranks)?;
            write_segments(conn, shortcuts)
        })
    }

    // diagnostics

    pub fn save_midpoints(&mut self, counts: &[(PointIndex, u32)]) -> Result<()> {
        self.in_transaction(|conn| {
            let mut insert =
                conn.prepare_cached("INSERT OR REPLACE INTO midpoints(ind, cnt) VALUES (?, ?)")?;
            for (index, count) in counts {
                insert.execute(params![index, count])?;
            }
            Ok(())
        })
    }

    pub fn load_midpoints(&self) -> Result<Vec<(PointIndex, u32)>> {
        let mut statement = self.conn.prepare("SELECT ind, cnt FROM midpoints ORDER BY ind")?;
        let counts = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }
}

fn read_point(row: &rusqlite::Row<'_>) -> rusqlite::Result<NetworkPoint> {
    Ok(NetworkPoint {
        id: row.get(0)?,
        index: row.get(1)?,
        road_id: row.get(2)?,
        start: row.get(3)?,
        end: row.get(4)?,
        start_x: row.get(5)?,
        start_y: row.get(6)?,
        end_x: row.get(7)?,
        end_y: row.get(8)?,
        clusters: Vec::new(),
        ch_index: row.get(9)?,
    })
}

fn write_ch_indexes(conn: &Connection, ranks: &[Option<u32>]) -> Result<()> {
    let mut update = conn.prepare_cached("UPDATE points SET chInd = ? WHERE ind = ?")?;
    for (index, rank) in ranks.iter().enumerate() {
        if rank.is_some() {
            update.execute(params![rank, index as PointIndex])?;
        }
    }
    Ok(())
}

fn write_segments(conn: &Connection, segments: &[NetworkSegment]) -> Result<()> {
    let mut insert_segment = conn.prepare_cached(
        "INSERT INTO segments(idPoint, idConnPoint, dist, shortcut) VALUES (?, ?, ?, ?)",
    )?;
    let mut insert_geometry = conn.prepare_cached(
        "INSERT INTO geometry(idPoint, idConnPoint, shortcut, geometry) VALUES (?, ?, ?, ?)",
    )?;
    let mut insert_shortcut = conn.prepare_cached(
        "INSERT INTO shortcuts(idPoint, idConnPoint, chain, witnesses) VALUES (?, ?, ?, ?)",
    )?;
    for segment in segments {
        insert_segment.execute(params![
            segment.start,
            segment.end,
            segment.distance,
            segment.is_shortcut()
        ])?;
        insert_geometry.execute(params![
            segment.start,
            segment.end,
            segment.is_shortcut(),
            pack_coordinates(&segment.geometry)
        ])?;
        if let Some(shortcut) = &segment.shortcut {
            insert_shortcut.execute(params![
                segment.start,
                segment.end,
                pack_indexes(&shortcut.chain),
                shortcut.witnesses
            ])?;
        }
    }
    Ok(())
}
