//! Export cache: memoization, invalidation, failure handling, export_all.

use std::sync::Arc;
use std::thread;

use viewer_core::stl;
use viewer_core::{Viewer, ViewerConfig, ViewerError, STL_MIMETYPE};
use viewer_kernel::MockKernel;

fn viewer() -> (Arc<MockKernel>, Viewer) {
    let kernel = Arc::new(MockKernel::new());
    let viewer = Viewer::new(kernel.clone(), ViewerConfig::responsive());
    (kernel, viewer)
}

#[test]
fn each_revision_is_tessellated_once() {
    let (kernel, viewer) = viewer();
    viewer
        .show(&[kernel.make_box(1.0, 2.0, 3.0)], &["part"])
        .unwrap();
    assert_eq!(kernel.tessellation_count(), 1);

    let first = viewer.export("part").unwrap();
    let second = viewer.export("part").unwrap();

    assert_eq!(kernel.tessellation_count(), 1);
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(first.payload, second.payload);

    let stats = viewer.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
}

#[test]
fn exported_hash_matches_registry_hash() {
    let (kernel, viewer) = viewer();
    let events = viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["part"])
        .unwrap();
    let mesh = viewer.export("part").unwrap();

    assert_eq!(mesh.content_hash, events[0].content_hash);
    assert_eq!(mesh.mimetype(), STL_MIMETYPE);
    assert_eq!(mesh.filename(), "part.stl");
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.face_ranges.len(), 6);
}

#[test]
fn replacement_invalidates_cached_export() {
    let (kernel, viewer) = viewer();
    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["part"])
        .unwrap();
    let old = viewer.export("part").unwrap();

    viewer
        .show(&[kernel.make_box(5.0, 1.0, 1.0)], &["part"])
        .unwrap();
    assert_eq!(viewer.exports().cached_hash("part"), None);

    let new = viewer.export("part").unwrap();
    assert_ne!(new.content_hash, old.content_hash);
    assert_ne!(new.payload, old.payload);
}

#[test]
fn reshowing_identical_geometry_keeps_cache_entry() {
    let (kernel, viewer) = viewer();
    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["part"])
        .unwrap();
    let first = viewer.export("part").unwrap();

    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["part"])
        .unwrap();
    assert_eq!(viewer.exports().cached_hash("part"), Some(first.content_hash));
}

#[test]
fn removal_evicts_and_export_reports_not_found() {
    let (kernel, viewer) = viewer();
    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["part"])
        .unwrap();
    viewer.export("part").unwrap();
    viewer.remove(&["part"]);

    assert_eq!(viewer.cache_stats().entries, 0);
    assert!(matches!(
        viewer.export("part"),
        Err(ViewerError::NotFound { .. })
    ));
}

#[test]
fn failed_replacement_keeps_previous_export() {
    let (kernel, viewer) = viewer();
    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["part"])
        .unwrap();
    let before = viewer.export("part").unwrap();

    let err = viewer
        .show(&[kernel.make_degenerate()], &["part"])
        .unwrap_err();
    assert!(matches!(err, ViewerError::ExportFailure { .. }));
    assert_eq!(viewer.list_names(), vec!["part"]);

    let after = viewer.export("part").unwrap();
    assert_eq!(after.content_hash, before.content_hash);
    assert_eq!(viewer.cache_stats().hits, 1);
}

#[test]
fn export_outlives_the_kernel_solid() {
    let (kernel, viewer) = viewer();
    let h = kernel.make_box(1.0, 1.0, 1.0);
    let shown = viewer.show(&[h.clone()], &["part"]).unwrap();
    kernel.release(&h);

    let mesh = viewer.export("part").unwrap();
    assert_eq!(mesh.content_hash, shown[0].content_hash);
    assert_eq!(mesh.triangle_count(), 12);
}

#[test]
fn stl_attribute_words_match_face_ranges() {
    let (kernel, viewer) = viewer();
    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["part"])
        .unwrap();
    let mesh = viewer.export("part").unwrap();

    for (face, range) in mesh.face_ranges.iter().enumerate() {
        for t in (range.start_index / 3)..(range.end_index / 3) {
            assert_eq!(
                stl::triangle_attribute(&mesh.payload, t as usize),
                Some(face as u16)
            );
        }
    }
}

#[test]
fn parallel_exports_of_different_names() {
    let kernel = Arc::new(MockKernel::new());
    let viewer = Arc::new(Viewer::new(kernel.clone(), ViewerConfig::responsive()));
    let names: Vec<String> = (0..8).map(|i| format!("part{i}")).collect();
    for (i, name) in names.iter().enumerate() {
        viewer
            .show(&[kernel.make_box(1.0 + i as f64, 1.0, 1.0)], &[name.as_str()])
            .unwrap();
    }

    let workers: Vec<_> = names
        .iter()
        .cloned()
        .map(|name| {
            let viewer = Arc::clone(&viewer);
            thread::spawn(move || viewer.export(&name).map(|m| m.content_hash))
        })
        .collect();

    for (worker, name) in workers.into_iter().zip(&names) {
        let hash = worker.join().unwrap().unwrap();
        assert_eq!(Some(hash), viewer.get(name).map(|o| o.content_hash));
    }
    assert_eq!(viewer.cache_stats().entries, 8);
}

#[test]
fn export_all_writes_one_file_per_object() {
    let (kernel, viewer) = viewer();
    let h = kernel.make_box(1.0, 1.0, 1.0);
    viewer.show(&[h.clone(), h], &["a", "b"]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = viewer.export_all(dir.path().join("out")).unwrap();

    assert_eq!(written.len(), 2);
    assert!(written[0].ends_with("a.stl"));
    assert!(written[1].ends_with("b.stl"));
    let bytes = std::fs::read(&written[0]).unwrap();
    assert_eq!(stl::triangle_count(&bytes), Some(12));
}

#[test]
fn export_all_reports_io_failure() {
    let (kernel, viewer) = viewer();
    viewer
        .show(&[kernel.make_box(1.0, 1.0, 1.0)], &["a"])
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"x").unwrap();

    let err = viewer.export_all(&blocker).unwrap_err();
    assert!(matches!(err, ViewerError::Io { .. }));
}
