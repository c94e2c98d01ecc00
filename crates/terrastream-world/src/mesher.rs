use bytemuck::{Pod, Zeroable};
use glam::{IVec2, IVec3};
use terrastream_core::constants::*;
use terrastream_core::math::{local_in_bounds, local_index};
use terrastream_core::types::{Block, BlockId};

/// Packed vertex, 8 bytes.
///
/// data1: x (5 bits) | y (9 bits) << 5 | z (5 bits) << 14 | face (3 bits) << 19 | corner (2 bits) << 22
/// data2: block id (16 bits) | light (4 bits) << 16
///
/// Positions are chunk-local corner positions, so x and z span 0..=16 and y
/// spans 0..=256.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Vertex {
    pub data1: u32,
    pub data2: u32,
}

impl Vertex {
    pub fn new(position: IVec3, face: u8, corner: u8, block: BlockId, light: u8) -> Self {
        let data1 = (position.x as u32 & 0x1F)
            | (position.y as u32 & 0x1FF) << 5
            | (position.z as u32 & 0x1F) << 14
            | (face as u32 & 0x7) << 19
            | (corner as u32 & 0x3) << 22;
        let data2 = block.0 as u32 | (light.min(MAX_LIGHT_LEVEL) as u32) << 16;
        Self { data1, data2 }
    }

    pub fn position(&self) -> IVec3 {
        IVec3::new(
            (self.data1 & 0x1F) as i32,
            ((self.data1 >> 5) & 0x1FF) as i32,
            ((self.data1 >> 14) & 0x1F) as i32,
        )
    }

    pub fn face(&self) -> u8 {
        ((self.data1 >> 19) & 0x7) as u8
    }

    pub fn block_id(&self) -> BlockId {
        BlockId((self.data2 & 0xFFFF) as u16)
    }

    pub fn light(&self) -> u8 {
        ((self.data2 >> 16) & 0xF) as u8
    }
}

/// Outward normal of each face index.
pub const FACE_NORMALS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

/// Quad corners of each face, counter-clockwise seen from outside.
const FACE_CORNERS: [[IVec3; 4]; 6] = [
    [IVec3::new(1, 0, 1), IVec3::new(1, 0, 0), IVec3::new(1, 1, 0), IVec3::new(1, 1, 1)],
    [IVec3::new(0, 0, 0), IVec3::new(0, 0, 1), IVec3::new(0, 1, 1), IVec3::new(0, 1, 0)],
    [IVec3::new(0, 1, 1), IVec3::new(1, 1, 1), IVec3::new(1, 1, 0), IVec3::new(0, 1, 0)],
    [IVec3::new(0, 0, 0), IVec3::new(1, 0, 0), IVec3::new(1, 0, 1), IVec3::new(0, 0, 1)],
    [IVec3::new(0, 0, 1), IVec3::new(1, 0, 1), IVec3::new(1, 1, 1), IVec3::new(0, 1, 1)],
    [IVec3::new(1, 0, 0), IVec3::new(0, 0, 0), IVec3::new(0, 1, 0), IVec3::new(1, 1, 0)],
];

/// Two triangles per quad.
const QUAD_ORDER: [u8; 6] = [0, 1, 2, 2, 3, 0];

pub const VERTICES_PER_FACE: usize = QUAD_ORDER.len();

/// Column offset of each horizontal neighbour, in [`NeighborBorders`] edge order.
pub const EDGE_OFFSETS: [IVec2; 4] = [
    IVec2::new(1, 0),
    IVec2::new(-1, 0),
    IVec2::new(0, 1),
    IVec2::new(0, -1),
];

const EDGE_LEN: usize = (CHUNK_HEIGHT * CHUNK_WIDTH) as usize;

/// The block planes of the four horizontal neighbours that touch a column.
///
/// Edge 0 holds the +x neighbour's `x = 0` plane, edge 1 the -x neighbour's
/// `x = 15` plane, edge 2 the +z neighbour's `z = 0` plane and edge 3 the -z
/// neighbour's `z = 15` plane. Each plane is indexed `y * 16 + t`, where `t`
/// runs along the shared border. A missing edge means the neighbour was not
/// readable when the mesh was built.
#[derive(Debug, Clone, Default)]
pub struct NeighborBorders {
    edges: [Option<Vec<Block>>; 4],
}

impl NeighborBorders {
    /// Copy the plane facing us out of the neighbour in direction `edge`.
    pub fn capture(&mut self, edge: usize, neighbor: &[Block]) {
        let mut plane = Vec::with_capacity(EDGE_LEN);
        for y in 0..CHUNK_HEIGHT {
            for t in 0..CHUNK_WIDTH {
                let local = match edge {
                    0 => IVec3::new(0, y, t),
                    1 => IVec3::new(CHUNK_WIDTH - 1, y, t),
                    2 => IVec3::new(t, y, 0),
                    _ => IVec3::new(t, y, CHUNK_DEPTH - 1),
                };
                plane.push(neighbor[local_index(local)]);
            }
        }
        self.edges[edge] = Some(plane);
    }

    pub fn has_edge(&self, edge: usize) -> bool {
        self.edges.get(edge).is_some_and(Option::is_some)
    }

    /// The block just outside the column at chunk-local `next`, if known.
    fn block_at(&self, next: IVec3) -> Option<Block> {
        if next.y < 0 || next.y >= CHUNK_HEIGHT {
            return None;
        }
        let (edge, t) = if next.x >= CHUNK_WIDTH {
            (0, next.z)
        } else if next.x < 0 {
            (1, next.z)
        } else if next.z >= CHUNK_DEPTH {
            (2, next.x)
        } else {
            (3, next.x)
        };
        let plane = self.edges[edge].as_ref()?;
        plane.get((next.y * CHUNK_WIDTH + t) as usize).copied()
    }
}

/// Whether `block` shows a face towards `neighbor`.
fn face_visible(block: BlockId, neighbor: BlockId) -> bool {
    !neighbor.is_opaque() && neighbor != block
}

/// Build the vertices of one 16-block-tall sub-chunk.
///
/// Faces on the column's horizontal edges are culled against `borders`.
/// Where a border is missing the face is emitted at full light.
pub fn mesh_sub_chunk(
    blocks: &[Block],
    borders: &NeighborBorders,
    sub_chunk: usize,
) -> Vec<Vertex> {
    let mut vertices = Vec::new();
    let y_start = sub_chunk as i32 * SUB_CHUNK_HEIGHT;

    for y in y_start..y_start + SUB_CHUNK_HEIGHT {
        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                let local = IVec3::new(x, y, z);
                let id = blocks[local_index(local)].block_id();
                if !id.is_visible() {
                    continue;
                }

                for (face, normal) in FACE_NORMALS.iter().enumerate() {
                    let next = local + *normal;
                    let light = if local_in_bounds(next) {
                        let neighbor = blocks[local_index(next)];
                        if !face_visible(id, neighbor.block_id()) {
                            continue;
                        }
                        neighbor.combined_light()
                    } else if next.y < 0 {
                        continue;
                    } else if let Some(neighbor) = borders.block_at(next) {
                        if !face_visible(id, neighbor.block_id()) {
                            continue;
                        }
                        neighbor.combined_light()
                    } else {
                        MAX_LIGHT_LEVEL
                    };

                    let corners = &FACE_CORNERS[face];
                    for &corner in &QUAD_ORDER {
                        vertices.push(Vertex::new(
                            local + corners[corner as usize],
                            face as u8,
                            corner,
                            id,
                            light,
                        ));
                    }
                }
            }
        }
    }

    vertices
}

/// Mesh every sub-chunk of a column. Sub-chunks without geometry are `None`.
pub fn mesh_chunk(blocks: &[Block], borders: &NeighborBorders) -> Vec<Option<Vec<Vertex>>> {
    (0..SUB_CHUNKS_PER_CHUNK)
        .map(|sub| {
            let vertices = mesh_sub_chunk(blocks, borders, sub);
            (!vertices.is_empty()).then_some(vertices)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_with(blocks: &[(IVec3, BlockId)]) -> Vec<Block> {
        let mut column = vec![Block::AIR; BLOCKS_PER_CHUNK];
        for (pos, id) in blocks {
            column[local_index(*pos)] = Block::new(*id);
        }
        column
    }

    #[test]
    fn test_vertex_packing() {
        let v = Vertex::new(IVec3::new(16, 256, 7), 5, 3, BlockId::GRASS, 12);
        assert_eq!(v.position(), IVec3::new(16, 256, 7));
        assert_eq!(v.face(), 5);
        assert_eq!(v.block_id(), BlockId::GRASS);
        assert_eq!(v.light(), 12);
        assert_eq!(std::mem::size_of::<Vertex>(), 8);
    }

    #[test]
    fn test_single_block_six_faces() {
        let column = column_with(&[(IVec3::new(5, 40, 5), BlockId::STONE)]);
        let vertices = mesh_sub_chunk(&column, &NeighborBorders::default(), 2);
        assert_eq!(vertices.len(), 6 * VERTICES_PER_FACE);
        let faces: std::collections::HashSet<u8> = vertices.iter().map(Vertex::face).collect();
        assert_eq!(faces.len(), 6);
    }

    #[test]
    fn test_shared_face_culled() {
        let column = column_with(&[
            (IVec3::new(5, 40, 5), BlockId::STONE),
            (IVec3::new(6, 40, 5), BlockId::STONE),
        ]);
        let vertices = mesh_sub_chunk(&column, &NeighborBorders::default(), 2);
        assert_eq!(vertices.len(), 10 * VERTICES_PER_FACE);
    }

    #[test]
    fn test_edge_faces_emitted_without_neighbors() {
        let column = column_with(&[(IVec3::new(0, 40, 0), BlockId::STONE)]);
        let vertices = mesh_sub_chunk(&column, &NeighborBorders::default(), 2);
        assert_eq!(vertices.len(), 6 * VERTICES_PER_FACE);
    }

    #[test]
    fn test_edge_face_culled_by_neighbor_border() {
        let column = column_with(&[(IVec3::new(0, 40, 3), BlockId::STONE)]);
        // -x neighbour has stone at its x = 15 plane, right next to ours.
        let west = column_with(&[(IVec3::new(15, 40, 3), BlockId::STONE)]);
        let mut borders = NeighborBorders::default();
        borders.capture(1, &west);
        assert!(borders.has_edge(1));
        assert!(!borders.has_edge(0));

        let vertices = mesh_sub_chunk(&column, &borders, 2);
        assert_eq!(vertices.len(), 5 * VERTICES_PER_FACE);
        assert!(vertices.iter().all(|v| v.face() != 1));
    }

    #[test]
    fn test_edge_face_lit_from_neighbor() {
        let column = column_with(&[(IVec3::new(5, 40, 15), BlockId::STONE)]);
        let mut north = vec![Block::AIR; BLOCKS_PER_CHUNK];
        let mut lit = Block::AIR;
        lit.set_sky_light(3);
        north[local_index(IVec3::new(5, 40, 0))] = lit;
        let mut borders = NeighborBorders::default();
        borders.capture(2, &north);

        let vertices = mesh_sub_chunk(&column, &borders, 2);
        assert_eq!(vertices.len(), 6 * VERTICES_PER_FACE);
        let plus_z: Vec<_> = vertices.iter().filter(|v| v.face() == 4).collect();
        assert_eq!(plus_z.len(), VERTICES_PER_FACE);
        assert!(plus_z.iter().all(|v| v.light() == 3));
    }

    #[test]
    fn test_adjacent_water_culled() {
        let column = column_with(&[
            (IVec3::new(5, 40, 5), BlockId::WATER),
            (IVec3::new(5, 41, 5), BlockId::WATER),
        ]);
        let vertices = mesh_sub_chunk(&column, &NeighborBorders::default(), 2);
        assert_eq!(vertices.len(), 10 * VERTICES_PER_FACE);
    }

    #[test]
    fn test_mesh_chunk_marks_empty_sub_chunks() {
        let column = column_with(&[(IVec3::new(1, 17, 1), BlockId::DIRT)]);
        let meshes = mesh_chunk(&column, &NeighborBorders::default());
        assert_eq!(meshes.len(), SUB_CHUNKS_PER_CHUNK);
        assert!(meshes[1].is_some());
        assert_eq!(meshes.iter().filter(|m| m.is_some()).count(), 1);
    }

    #[test]
    fn test_vertices_are_pod() {
        let column = column_with(&[(IVec3::new(1, 1, 1), BlockId::DIRT)]);
        let vertices = mesh_sub_chunk(&column, &NeighborBorders::default(), 0);
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), vertices.len() * 8);
    }
}
