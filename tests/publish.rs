mod common;

use std::fs;

use common::init_logging;
use overlay_geotag::{
    geotag::{write_exif, GeoTag},
    publish::{run_publish, Product, PublishConfig},
    timestamp::capture_time,
    Dms, Hemisphere,
};

#[test]
fn publishes_tagged_images_and_lists_every_url() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("images");
    let export = dir.path().join("export");
    fs::create_dir_all(&input).unwrap();
    fs::create_dir_all(&export).unwrap();

    let tagged = input.join("a.jpg");
    let untagged = input.join("b.jpg");
    image::RgbImage::new(1280, 720).save(&tagged).unwrap();
    image::RgbImage::new(720, 1280).save(&untagged).unwrap();
    write_exif(
        &tagged,
        &GeoTag {
            captured_at: capture_time("i240630_122337-0.png").unwrap(),
            latitude: Some(Dms::new(46.0, 30.0, 36.0, Hemisphere::N)),
            longitude: Some(Dms::new(7.0, 30.0, 0.0, Hemisphere::E)),
        },
    )
    .unwrap();

    let config = PublishConfig {
        input_root: input.clone(),
        export_root: export.clone(),
        product: Product::Oblique,
        item_name: "2024-001-WALLIS".to_string(),
    };
    let summary = run_publish(&config).expect("Publish failed");

    assert_eq!(summary.thumbnails, 2);
    assert_eq!(summary.placemarks, 1);
    assert_eq!(summary.untagged, vec![untagged]);
    assert_eq!(
        image::image_dimensions(input.join("thumbs/a.jpg")).unwrap(),
        (640, 360)
    );
    assert_eq!(
        image::image_dimensions(input.join("thumbs/b.jpg")).unwrap(),
        (270, 480)
    );

    assert_eq!(
        summary.kml_path,
        export.join("2024-001-WALLIS-SCHRAEGAUFNAHMEN.kml")
    );
    let kml = fs::read_to_string(&summary.kml_path).unwrap();
    assert_eq!(kml.matches("<Placemark>").count(), 1);
    assert!(kml.contains("<coordinates>7.5,46.51,0</coordinates>"));
    assert!(kml.contains("<name>2024-001-WALLIS-SCHRAEGAUFNAHMEN</name>"));
    let base_url = config.base_url();
    assert!(kml.contains(&format!("{base_url}thumbs/a.jpg")));
    assert!(kml.contains("2024:06:30 12:23:37"));

    assert_eq!(
        summary.txt_path,
        export.join("2024-001-WALLIS-SCHRAEGAUFNAHMEN.txt")
    );
    let urls = fs::read_to_string(&summary.txt_path).unwrap();
    assert_eq!(
        urls.lines().collect::<Vec<_>>(),
        vec![format!("{base_url}a.jpg"), format!("{base_url}b.jpg")]
    );
}

#[test]
fn rejects_malformed_item_names_before_writing() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = PublishConfig {
        input_root: dir.path().to_path_buf(),
        export_root: dir.path().to_path_buf(),
        product: Product::Vertical,
        item_name: "2024-1-wallis".to_string(),
    };
    assert!(run_publish(&config).is_err());
    assert!(!dir.path().join("thumbs").exists());
}
