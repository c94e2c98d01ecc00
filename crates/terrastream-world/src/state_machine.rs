use crate::chunk::ChunkPhase;

/// Which thread drives a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Main,
    Worker,
}

/// Legal chunk phase transitions and the thread that performs each.
///
/// Initial residency:
///   Unloaded -> LoadBlockData                (main, slot assigned)
///   LoadBlockData -> LoadingBlockData        (worker, generate or deserialize)
///   LoadingBlockData -> TesselateVertices    (worker, blocks ready)
///   TesselateVertices -> TesselatingVertices (worker)
///   TesselatingVertices -> UploadVerticesToGpu (worker, vertices ready)
///   UploadVerticesToGpu -> Uploaded          (main, GPU upload)
///
/// Re-meshing after an edit:
///   Uploaded -> RetesselateVertices          (main, edit queued)
///   RetesselateVertices -> DoneRetesselating (worker)
///   DoneRetesselating -> Uploaded            (main, GPU mesh replaced)
///   RetesselateVertices -> Uploaded          (worker, rebuild abandoned; old mesh stays)
///
/// Failure and teardown:
///   LoadBlockData | LoadingBlockData -> Unloaded (worker, corrupt data)
///   any -> Unloaded                          (main, slot recycled)
pub fn transition_driver(from: ChunkPhase, to: ChunkPhase) -> Option<Driver> {
    use ChunkPhase::*;
    match (from, to) {
        (Unloaded, LoadBlockData) => Some(Driver::Main),
        (LoadBlockData, LoadingBlockData) => Some(Driver::Worker),
        (LoadingBlockData, TesselateVertices) => Some(Driver::Worker),
        (TesselateVertices, TesselatingVertices) => Some(Driver::Worker),
        (TesselatingVertices, UploadVerticesToGpu) => Some(Driver::Worker),
        (UploadVerticesToGpu, Uploaded) => Some(Driver::Main),
        (Uploaded, RetesselateVertices) => Some(Driver::Main),
        (RetesselateVertices, DoneRetesselating) => Some(Driver::Worker),
        (RetesselateVertices, Uploaded) => Some(Driver::Worker),
        (DoneRetesselating, Uploaded) => Some(Driver::Main),
        (LoadBlockData | LoadingBlockData, Unloaded) => Some(Driver::Worker),
        (_, Unloaded) => Some(Driver::Main),
        _ => None,
    }
}

pub fn is_legal(from: ChunkPhase, to: ChunkPhase) -> bool {
    from == to || transition_driver(from, to).is_some()
}

/// Phase a chunk moves to once a worker has finished building its vertices.
pub fn meshed_phase(from: ChunkPhase) -> ChunkPhase {
    match from {
        ChunkPhase::RetesselateVertices => ChunkPhase::DoneRetesselating,
        _ => ChunkPhase::UploadVerticesToGpu,
    }
}

/// Whether the chunk holds valid block data in this phase.
pub fn has_block_data(phase: ChunkPhase) -> bool {
    !matches!(
        phase,
        ChunkPhase::Unloaded | ChunkPhase::LoadBlockData | ChunkPhase::LoadingBlockData
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChunkPhase::*;

    #[test]
    fn test_initial_residency_path_is_legal() {
        let path = [
            Unloaded,
            LoadBlockData,
            LoadingBlockData,
            TesselateVertices,
            TesselatingVertices,
            UploadVerticesToGpu,
            Uploaded,
        ];
        for pair in path.windows(2) {
            assert!(is_legal(pair[0], pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_only_main_thread_uploads() {
        assert_eq!(
            transition_driver(UploadVerticesToGpu, Uploaded),
            Some(Driver::Main)
        );
        assert_eq!(
            transition_driver(DoneRetesselating, Uploaded),
            Some(Driver::Main)
        );
    }

    #[test]
    fn test_illegal_shortcuts_rejected() {
        assert!(!is_legal(Unloaded, Uploaded));
        assert!(!is_legal(LoadBlockData, UploadVerticesToGpu));
        assert!(!is_legal(Uploaded, LoadBlockData));
        assert!(!is_legal(TesselatingVertices, DoneRetesselating));
    }

    #[test]
    fn test_meshed_phase() {
        assert_eq!(meshed_phase(TesselatingVertices), UploadVerticesToGpu);
        assert_eq!(meshed_phase(RetesselateVertices), DoneRetesselating);
    }

    #[test]
    fn test_block_data_phases() {
        assert!(!has_block_data(LoadingBlockData));
        assert!(has_block_data(TesselateVertices));
        assert!(has_block_data(Uploaded));
        assert!(has_block_data(RetesselateVertices));
    }
}
