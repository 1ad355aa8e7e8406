//! Conversions between WGS84 coordinates and the 31-bit tile grid used by the
//! road graph, plus metric distances on that grid.

use std::f64::consts::PI;

use geo::{HaversineDistance, Point};

use crate::graphs::Distance;

const TILES_31: f64 = (1u64 << 31) as f64;

pub fn get_31_tile_number_x(longitude: f64) -> i32 {
    let longitude = longitude.clamp(-180.0, 179.999_999);
    ((longitude + 180.0) / 360.0 * TILES_31) as i32
}

pub fn get_31_tile_number_y(latitude: f64) -> i32 {
    let latitude = latitude.clamp(-85.051_1, 85.051_1).to_radians();
    let eval = (latitude.tan() + 1.0 / latitude.cos()).ln().min(PI);
    ((1.0 - eval / PI) / 2.0 * TILES_31) as i32
}

pub fn get_31_longitude_x(x: i32) -> f64 {
    x as f64 / TILES_31 * 360.0 - 180.0
}

pub fn get_31_latitude_y(y: i32) -> f64 {
    let n = PI * (1.0 - 2.0 * y as f64 / TILES_31);
    n.sinh().atan().to_degrees()
}

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Distance {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

/// Distance in meters between two points of the 31-bit grid.
pub fn distance_31(x1: i32, y1: i32, x2: i32, y2: i32) -> Distance {
    if x1 == x2 && y1 == y2 {
        return 0.0;
    }
    haversine_distance(
        get_31_latitude_y(y1),
        get_31_longitude_x(x1),
        get_31_latitude_y(y2),
        get_31_longitude_x(x2),
    )
}

pub fn midpoint_31(x1: i32, y1: i32, x2: i32, y2: i32) -> (i32, i32) {
    (
        ((x1 as i64 + x2 as i64) / 2) as i32,
        ((y1 as i64 + y2 as i64) / 2) as i32,
    )
}
