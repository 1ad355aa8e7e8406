use crate::{error::StructuralError, graphs::PointIndex};

/// Packs coordinate pairs as big-endian 32-bit `x, y` values.
pub fn pack_coordinates(coordinates: &[(i32, i32)]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(coordinates.len() * 8);
    for (x, y) in coordinates {
        bytes.extend_from_slice(&x.to_be_bytes());
        bytes.extend_from_slice(&y.to_be_bytes());
    }
    bytes
}

pub fn unpack_coordinates(bytes: &[u8]) -> Result<Vec<(i32, i32)>, StructuralError> {
    if bytes.len() % 8 != 0 {
        return Err(StructuralError::InvalidGeometry { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let x = i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let y = i32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            (x, y)
        })
        .collect())
}

pub fn pack_indexes(indexes: &[PointIndex]) -> Vec<u8> {
    indexes.iter().flat_map(|index| index.to_be_bytes()).collect()
}

pub fn unpack_indexes(bytes: &[u8]) -> Result<Vec<PointIndex>, StructuralError> {
    if bytes.len() % 4 != 0 {
        return Err(StructuralError::InvalidGeometry { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| PointIndex::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_keep_order_and_sign() {
        let coordinates = vec![(i32::MAX, 0), (-5, 1 << 30), (7, -7)];
        let bytes = pack_coordinates(&coordinates);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[8..12], &(-5i32).to_be_bytes());
        assert_eq!(unpack_coordinates(&bytes).unwrap(), coordinates);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert_eq!(
            unpack_coordinates(&[0; 12]),
            Err(StructuralError::InvalidGeometry { len: 12 })
        );
    }
}
