//! End-to-end conversion tests against on-disk slides.

use std::path::Path;
use std::sync::Mutex;

use wsi_dzi::convert::{convert, ConvertObserver, TracingObserver};
use wsi_dzi::error::{ConvertError, FormatError};
use wsi_dzi::slide::{RegionSource, Slide, SlideOptions};
use wsi_dzi::SlideFormat;

use image::Rgb;

use super::test_utils::{expected_dz_levels, expected_grid, list_tree, LevelLayout, SlideBuilder};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ConvertObserver for Recorder {
    fn opening(&self, _input: &Path) {
        self.events.lock().unwrap().push("opening".to_string());
    }

    fn opened(&self, dimensions: (u32, u32), native_levels: usize) {
        self.events.lock().unwrap().push(format!(
            "opened {}x{} {}",
            dimensions.0, dimensions.1, native_levels
        ));
    }

    fn generating(&self, level_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("generating {}", level_count));
    }

    fn level_written(&self, level: usize, columns: u32, rows: u32) {
        self.events
            .lock()
            .unwrap()
            .push(format!("level {} {}x{}", level, columns, rows));
    }

    fn finished(&self, _dzi_path: &Path) {
        self.events.lock().unwrap().push("finished".to_string());
    }
}

fn assert_tree_matches(out: &Path, name: &str, width: u32, height: u32) {
    let files_dir = out.join(format!("{}_files", name));
    let levels = expected_dz_levels(width, height);

    let level_dirs = std::fs::read_dir(&files_dir).unwrap().count();
    assert_eq!(level_dirs, levels.len());

    for (level, size) in levels.iter().enumerate() {
        let (cols, rows) = expected_grid(*size);
        let level_dir = files_dir.join(level.to_string());
        let count = std::fs::read_dir(&level_dir).unwrap().count() as u32;
        assert_eq!(count, cols * rows, "level {}", level);

        for col in 0..cols {
            for row in 0..rows {
                let tile = level_dir.join(format!("{}_{}.jpeg", col, row));
                assert!(tile.is_file(), "missing {}", tile.display());
            }
        }
    }

    let xml = std::fs::read_to_string(out.join(format!("{}.dzi", name))).unwrap();
    assert!(xml.contains(&format!(
        "<Size Height=\"{}\"\n    Width=\"{}\" />",
        height, width
    )));
    assert!(xml.contains("TileSize=\"254\""));
    assert!(xml.contains("Overlap=\"1\""));
    assert!(xml.contains("Format=\"jpeg\""));
}

#[tokio::test]
async fn test_convert_aperio_slide() {
    let dir = tempfile::tempdir().unwrap();
    let input = SlideBuilder::aperio().write_to(dir.path(), "CMU-1.svs");
    let out = dir.path().join("out");
    let recorder = Recorder::default();

    let summary = convert(&input, &out, "cmu", &SlideOptions::default(), &recorder)
        .await
        .unwrap();

    assert_eq!(summary.dzi_path, out.join("cmu.dzi"));
    assert_eq!((summary.width, summary.height), (1000, 800));
    assert_eq!(summary.level_count, 11);
    assert_tree_matches(&out, "cmu", 1000, 800);

    let events = recorder.events();
    assert_eq!(events[0], "opening");
    assert_eq!(events[1], "opened 1000x800 2");
    assert_eq!(events[2], "generating 11");
    assert_eq!(events[3], "level 0 1x1");
    assert_eq!(events[13], "level 10 4x4");
    assert_eq!(events.last().unwrap(), "finished");
}

#[tokio::test]
async fn test_convert_generic_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let input = SlideBuilder::generic().write_to(dir.path(), "scan.tif");
    let out = dir.path().join("out");

    let summary = convert(&input, &out, "scan", &SlideOptions::default(), &TracingObserver)
        .await
        .unwrap();

    assert_eq!(summary.level_count, expected_dz_levels(600, 400).len());
    assert_tree_matches(&out, "scan", 600, 400);
}

#[tokio::test]
async fn test_tile_pixels_follow_source() {
    let dir = tempfile::tempdir().unwrap();
    let input = SlideBuilder::aperio().write_to(dir.path(), "red.svs");
    let out = dir.path().join("out");

    convert(&input, &out, "red", &SlideOptions::default(), &TracingObserver)
        .await
        .unwrap();

    // Interior tile of the full-resolution level: 256x256 (1px overlap both sides)
    let tile = image::open(out.join("red_files/10/1_1.jpeg")).unwrap().to_rgb8();
    assert_eq!(tile.dimensions(), (256, 256));
    let Rgb([r, g, b]) = *tile.get_pixel(128, 128);
    assert!(r > 150 && g < 90 && b < 90, "got {:?}", (r, g, b));

    // Edge tile: 1000 - 3*254 = 238 wide plus left overlap
    let edge = image::open(out.join("red_files/10/3_3.jpeg")).unwrap();
    assert_eq!((edge.width(), edge.height()), (239, 39));
}

#[tokio::test]
async fn test_idempotent_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let input = SlideBuilder::generic().write_to(dir.path(), "scan.tiff");
    let out = dir.path().join("out");

    convert(&input, &out, "scan", &SlideOptions::default(), &TracingObserver)
        .await
        .unwrap();
    let first_tree = list_tree(&out);
    let first_xml = std::fs::read(out.join("scan.dzi")).unwrap();
    let first_tile = std::fs::read(out.join("scan_files/10/1_1.jpeg")).unwrap();

    convert(&input, &out, "scan", &SlideOptions::default(), &TracingObserver)
        .await
        .unwrap();

    assert_eq!(list_tree(&out), first_tree);
    assert_eq!(std::fs::read(out.join("scan.dzi")).unwrap(), first_xml);
    assert_eq!(
        std::fs::read(out.join("scan_files/10/1_1.jpeg")).unwrap(),
        first_tile
    );
}

#[tokio::test]
async fn test_missing_input_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let err = convert(
        &dir.path().join("nope.svs"),
        &out,
        "nope",
        &SlideOptions::default(),
        &TracingObserver,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ConvertError::SlideOpen { .. }));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_stripped_tiff_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("strips.tif");

    // 64x64 image stored as one strip
    let mut data = b"II\x2A\x00\x08\x00\x00\x00".to_vec();
    let entries: [(u16, u16, u32); 5] = [
        (256, 3, 64),
        (257, 3, 64),
        (259, 3, 1),
        (273, 4, 100),
        (279, 4, 16),
    ];
    data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, field_type, value) in entries {
        data.extend_from_slice(&tag.to_le_bytes());
        data.extend_from_slice(&field_type.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&value.to_le_bytes());
    }
    data.extend_from_slice(&0u32.to_le_bytes());
    data.resize(200, 0);
    std::fs::write(&input, data).unwrap();

    let err = convert(
        &input,
        &dir.path().join("out"),
        "strips",
        &SlideOptions::default(),
        &TracingObserver,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::SlideOpen {
            source: FormatError::Tiff(_),
            ..
        }
    ));
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn test_slide_open_detects_format() {
    let dir = tempfile::tempdir().unwrap();
    let svs = SlideBuilder::aperio().write_to(dir.path(), "a.svs");
    let tif = SlideBuilder::generic().write_to(dir.path(), "b.tif");

    let slide = Slide::open(&svs, &SlideOptions::default()).await.unwrap();
    assert_eq!(slide.format(), SlideFormat::AperioSvs);
    assert_eq!(slide.dimensions(), (1000, 800));
    assert_eq!(slide.level_count(), 2);
    assert_eq!(slide.level_downsample(1), Some(4.0));
    assert_eq!(slide.properties()["openslide.vendor"], "aperio");
    assert_eq!(slide.properties()["aperio.AppMag"], "20");

    let slide = Slide::open(&tif, &SlideOptions::default()).await.unwrap();
    assert_eq!(slide.format(), SlideFormat::GenericTiff);
    assert_eq!(slide.level_dimensions(1), Some((150, 100)));
    assert_eq!(slide.best_level_for_downsample(8.0), 1);
    assert_eq!(slide.best_level_for_downsample(2.0), 0);
}

#[tokio::test]
async fn test_read_region_outside_is_background() {
    let dir = tempfile::tempdir().unwrap();
    let input = SlideBuilder::new()
        .level(LevelLayout::new(300, 200, 128, Rgb([0, 0, 0])))
        .write_to(dir.path(), "dark.tif");
    let slide = Slide::open(&input, &SlideOptions::default()).await.unwrap();

    let region = slide.read_region((250, 150), 0, (100, 100)).await.unwrap();
    assert_eq!(region.dimensions(), (100, 100));

    // Inside the slide: dark
    let Rgb([r, _, _]) = *region.get_pixel(10, 10);
    assert!(r < 40);
    // Past the right and bottom edges: white
    assert_eq!(*region.get_pixel(90, 90), Rgb([255, 255, 255]));
    assert_eq!(*region.get_pixel(60, 10), Rgb([255, 255, 255]));
}

#[tokio::test]
async fn test_rgb_photometric_tiles_decode() {
    let dir = tempfile::tempdir().unwrap();
    let input = SlideBuilder::new()
        .photometric(2)
        .with_jpeg_tables()
        .level(LevelLayout::new(256, 256, 256, Rgb([40, 160, 40])))
        .write_to(dir.path(), "rgb.tif");
    let out = dir.path().join("out");

    convert(&input, &out, "rgb", &SlideOptions::default(), &TracingObserver)
        .await
        .unwrap();

    let tile = image::open(out.join("rgb_files/8/0_0.jpeg")).unwrap().to_rgb8();
    assert_eq!(tile.dimensions(), (255, 255));
    let Rgb([r, g, b]) = *tile.get_pixel(100, 100);
    assert!(g > 120 && r < 90 && b < 90, "got {:?}", (r, g, b));
}
