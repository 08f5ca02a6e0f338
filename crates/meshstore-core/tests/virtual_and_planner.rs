use meshstore_core::{plan_selection, ChunkGeometry, MatrixEngine, SelectionPlan, VirtualMatrix};

fn small_geometry() -> ChunkGeometry {
    ChunkGeometry {
        chunk_t: 6,
        chunk_m: 8,
    }
}

/// S4: a virtual store composed of a frozen historical slab and an
/// appended new slab behaves exactly like one contiguous matrix, and the
/// historical bytes are never copied into the new slab file.
#[test]
fn virtual_composition_is_seamless_and_copy_free() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("historical.bin");
    let slab_path = dir.path().join("new.bin");
    let manifest_path = dir.path().join("manifest.bin");

    let universe: Vec<u32> = (0..16).map(|i| 100_000_001 + i).collect();
    {
        let mut base = MatrixEngine::create(
            &base_path,
            16,
            small_geometry(),
            "2016-01-01 00:00:00".to_string(),
            0,
            universe.clone(),
            vec![],
        )
        .unwrap();
        base.extend_time(6).unwrap();
        for m in 0..16u32 {
            base.write_cell(3, m, m as i32 + 1).unwrap();
        }
        base.flush().unwrap();
    }
    let historical_len = std::fs::metadata(&base_path).unwrap().len();

    let mut vm = VirtualMatrix::create(&manifest_path, &base_path, &slab_path, 6).unwrap();
    vm.extend_time(12).unwrap();
    for m in 0..16u32 {
        vm.write_cell(9, m, 100 + m as i32).unwrap();
    }
    vm.flush().unwrap();

    // The historical file was never touched after the virtual store was
    // created: "append without copy" holds.
    assert_eq!(
        std::fs::metadata(&base_path).unwrap().len(),
        historical_len
    );

    assert_eq!(vm.get_dimensions(), (12, 16));
    for m in 0..16u32 {
        assert_eq!(vm.read_cell(3, m).unwrap(), m as i32 + 1);
        assert_eq!(vm.read_cell(9, m).unwrap(), 100 + m as i32);
    }
}

/// S5: every selection-plan strategy returns values identical to a naive
/// cell-by-cell oracle over the same engine.
#[test]
fn selection_plan_strategies_match_naive_oracle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.bin");
    let n = 200u32;
    let universe: Vec<u32> = (0..n).map(|i| 100_000_001 + i).collect();
    let mut engine = MatrixEngine::create(
        &path,
        n,
        small_geometry(),
        "2016-01-01 00:00:00".to_string(),
        0,
        universe,
        vec![],
    )
    .unwrap();
    engine.extend_time(2).unwrap();
    for m in 0..n {
        engine.write_cell(1, m, (m * 7 + 3) as i32).unwrap();
    }
    engine.flush().unwrap();

    let cases: Vec<Vec<u32>> = vec![
        vec![42],                                   // single-cell
        (10..40).collect(),                         // contiguous hyperslab
        vec![1, 2, 3, 50, 51, 90, 91, 92, 93],       // block-union (few blocks)
        (0..n).step_by(2).collect(),                // element-list (many blocks)
    ];

    for meshes in cases {
        let plan = plan_selection(&meshes);
        let got = engine.read_row_selection(1, &meshes).unwrap();
        let oracle: Vec<i32> = meshes
            .iter()
            .map(|&m| engine.read_cell(1, m).unwrap())
            .collect();
        assert_eq!(got, oracle, "plan {plan:?} diverged from the oracle");
    }
}

#[test]
fn many_blocks_select_element_list_few_blocks_select_block_union() {
    let many: Vec<u32> = (0..400).step_by(2).collect();
    assert!(matches!(
        plan_selection(&many),
        SelectionPlan::ElementList { .. }
    ));

    let few: Vec<u32> = (0..10).chain(1000..1010).collect();
    assert!(matches!(
        plan_selection(&few),
        SelectionPlan::BlockUnion { .. }
    ));
}
