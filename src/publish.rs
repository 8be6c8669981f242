use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;
use tracing::{error, info, instrument};

use crate::{
    coords::Precision,
    error::{Error, Result},
    geotag::read_geotag,
    kml::{linked_preview, IconStyle, KmlDocument, Placemark},
    thumbnail::{generate_thumbnails, JPEG_EXTENSIONS},
    util::files_with_extension,
};

pub const COLLECTION_URL: &str = "https://data.geo.admin.ch/ch.swisstopo.rapidmapping/data/";

/// Kind of single-image product being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Product {
    /// Nadir images.
    Vertical,
    /// Oblique images.
    Oblique,
}

impl Product {
    pub fn label(self) -> &'static str {
        match self {
            Product::Vertical => "SENKRECHT",
            Product::Oblique => "SCHRAEGAUFNAHMEN",
        }
    }

    pub fn icon(self) -> IconStyle {
        match self {
            Product::Vertical => IconStyle {
                href: "https://map.geo.admin.ch/api/icons/sets/default/icons/008-circle-stroked@1x-255,0,0.png".to_string(),
                scale: 0.25,
            },
            Product::Oblique => IconStyle {
                href: "https://map.geo.admin.ch/api/icons/sets/default/icons/100-camera@1x-127,0,255.png".to_string(),
                scale: 0.75,
            },
        }
    }
}

/// Item names look like `2024-001-WALLIS`.
pub fn is_valid_item_name(name: &str) -> bool {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(r"^\d{4}-\d{3}-[A-Z]+$").expect("item name pattern is valid"))
        .is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub input_root: PathBuf,
    pub export_root: PathBuf,
    pub product: Product,
    pub item_name: String,
}

impl PublishConfig {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if !self.input_root.is_dir() {
            problems.push(format!(
                "input directory {} does not exist",
                self.input_root.display()
            ));
        }
        if !self.export_root.is_dir() {
            problems.push(format!(
                "export directory {} does not exist",
                self.export_root.display()
            ));
        }
        if !is_valid_item_name(&self.item_name) {
            problems.push(format!(
                "item name {:?} is not in the format YYYY-###-CAPITALLETTERS, e.g. 2024-001-WALLIS",
                self.item_name
            ));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems.join("; ")))
        }
    }

    pub fn base_url(&self) -> String {
        format!("{COLLECTION_URL}{}/", self.item_name)
    }

    fn export_stem(&self) -> String {
        format!("{}-{}", self.item_name, self.product.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub thumbnails: usize,
    pub placemarks: usize,
    /// Images without a position, left out of the KML.
    pub untagged: Vec<PathBuf>,
    pub kml_path: PathBuf,
    pub txt_path: PathBuf,
}

/// Thumbnails, a KML preview and a URL list for a folder of geotagged JPEGs.
#[instrument(skip_all, fields(item = %config.item_name))]
pub fn run_publish(config: &PublishConfig) -> Result<PublishSummary> {
    config.validate()?;
    let images = files_with_extension(&config.input_root, JPEG_EXTENSIONS)?;
    let total = images.len();
    let base_url = config.base_url();

    let thumbnails = generate_thumbnails(&config.input_root, &config.input_root.join("thumbs"))?;

    let mut document = KmlDocument::new(config.export_stem(), config.product.icon());
    let mut untagged = Vec::new();
    let mut urls = String::new();
    for (i, path) in images.iter().enumerate() {
        let file_name = file_name(path);
        info!("Generating KML info for image {} of {total}: {file_name}", i + 1);
        urls.push_str(&format!("{base_url}{file_name}\n"));

        let tag = read_geotag(path)?;
        match tag.as_ref().and_then(|tag| Some((tag, tag.position(Precision::Full)?))) {
            Some((tag, (lon, lat))) => document.push(Placemark {
                description: linked_preview(
                    &base_url,
                    &file_name,
                    &tag.captured_at.format("%Y:%m:%d %H:%M:%S").to_string(),
                ),
                lon,
                lat,
            }),
            None => {
                error!("No GPS tag for image {} of {total}: {file_name}", i + 1);
                untagged.push(path.clone());
            }
        }
    }

    let stem = config.export_stem();
    let kml_path = config.export_root.join(format!("{stem}.kml"));
    let txt_path = config.export_root.join(format!("{stem}.txt"));
    document.save(&kml_path)?;
    std::fs::write(&txt_path, urls).map_err(|err| Error::io(&txt_path, err))?;
    info!("KML file created: {}", kml_path.display());
    info!("TXT file created: {}", txt_path.display());

    Ok(PublishSummary {
        thumbnails: thumbnails.len(),
        placemarks: document.placemarks.len(),
        untagged,
        kml_path,
        txt_path,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|it| it.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_names() {
        assert!(is_valid_item_name("2024-001-WALLIS"));
        assert!(!is_valid_item_name("2024-01-WALLIS"));
        assert!(!is_valid_item_name("2024-001-wallis"));
        assert!(!is_valid_item_name("2024-001-"));
    }

    #[test]
    fn product_labels_and_icons() {
        assert_eq!(Product::Vertical.label(), "SENKRECHT");
        assert_eq!(Product::Oblique.icon().scale, 0.75);
    }

    #[test]
    fn validation_reports_bad_item_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = PublishConfig {
            input_root: dir.path().to_path_buf(),
            export_root: dir.path().to_path_buf(),
            product: Product::Oblique,
            item_name: "wallis".into(),
        };
        let Err(Error::Validation(message)) = config.validate() else {
            panic!("expected validation error");
        };
        assert!(message.contains("item name"));
        assert!(!message.contains("directory"));
    }
}
