use std::sync::{Arc, RwLock};

use hashbrown::HashMap;

/// Region offset from an observer's own region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Offset {
    pub dx: i32,
    pub dz: i32,
    /// Chebyshev distance.
    pub dist: i32,
    /// `1 / |(dx, dz)|`, or 0 for the centre.
    pub inv_len: f64,
}

/// Square rings of offsets, built once per radius.
#[derive(Default)]
pub struct OffsetCache {
    rings: RwLock<HashMap<i32, Arc<[Offset]>>>,
}

impl OffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every offset within `radius`, nearest ring first. The centre comes
    /// first; order inside a ring is stable.
    pub fn ring(&self, radius: i32) -> Arc<[Offset]> {
        let radius = radius.max(0);
        if let Some(r) = self.rings.read().unwrap().get(&radius) {
            return Arc::clone(r);
        }
        let mut v = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let len = f64::from(dx * dx + dz * dz).sqrt();
                v.push(Offset {
                    dx,
                    dz,
                    dist: dx.abs().max(dz.abs()),
                    inv_len: if len > 0.0 { 1.0 / len } else { 0.0 },
                });
            }
        }
        v.sort_by_key(|o| o.dist);
        let ring: Arc<[Offset]> = v.into();
        self.rings
            .write()
            .unwrap()
            .entry(radius)
            .or_insert_with(|| Arc::clone(&ring))
            .clone()
    }

    /// Ring order, with ties inside each distance broken by alignment with
    /// `facing` when given. A near-zero facing reads as +z.
    pub fn ordered(&self, radius: i32, facing: Option<(f64, f64)>) -> Vec<Offset> {
        let mut v = self.ring(radius).to_vec();
        let Some((fx, fz)) = facing else {
            return v;
        };
        let len2 = fx * fx + fz * fz;
        let (fx, fz) = if len2 < 1e-4 {
            (0.0, 1.0)
        } else {
            let inv = 1.0 / len2.sqrt();
            (fx * inv, fz * inv)
        };
        let align = |o: &Offset| (f64::from(o.dx) * fx + f64::from(o.dz) * fz) * o.inv_len;
        v.sort_by(|a, b| a.dist.cmp(&b.dist).then(align(b).total_cmp(&align(a))));
        v
    }
}
