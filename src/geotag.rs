use std::{
    fs::File,
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use exif::{experimental::Writer, Field, In, Rational, Tag, Value};
use img_parts::{jpeg::Jpeg, ImageEXIF};
use serde::{Deserialize, Serialize};

use crate::{
    coords::{Dms, Hemisphere, Precision},
    error::{Error, Result},
};

const EXIF_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Capture time and position attached to an output JPEG.
///
/// Written into the JPEG's EXIF (`DateTimeOriginal`, GPS DMS) and mirrored in
/// a `<image>.geotag.json` sidecar. The sidecar keeps the DMS at full
/// precision; rounding only happens when a report asks for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTag {
    pub captured_at: NaiveDateTime,
    pub latitude: Option<Dms>,
    pub longitude: Option<Dms>,
}

impl GeoTag {
    /// `(lon, lat)` in decimal degrees when both axes are known.
    pub fn position(&self, precision: Precision) -> Option<(f64, f64)> {
        Some((
            self.longitude?.to_decimal(precision),
            self.latitude?.to_decimal(precision),
        ))
    }
}

/// Replaces the EXIF block of the JPEG at `path` with the capture time and
/// whichever axes are known.
pub fn write_exif(path: &Path, tag: &GeoTag) -> Result<()> {
    let time = Value::Ascii(vec![tag
        .captured_at
        .format(EXIF_TIME_FORMAT)
        .to_string()
        .into_bytes()]);
    let mut fields = vec![
        field(Tag::DateTime, time.clone()),
        field(Tag::DateTimeOriginal, time.clone()),
        field(Tag::DateTimeDigitized, time),
    ];
    if tag.latitude.is_some() || tag.longitude.is_some() {
        fields.push(field(Tag::GPSVersionID, Value::Byte(vec![2, 2, 0, 0])));
    }
    for (dms, value_tag, ref_tag) in [
        (tag.latitude, Tag::GPSLatitude, Tag::GPSLatitudeRef),
        (tag.longitude, Tag::GPSLongitude, Tag::GPSLongitudeRef),
    ] {
        if let Some(dms) = dms {
            fields.push(field(value_tag, dms_value(&dms)));
            fields.push(field(
                ref_tag,
                Value::Ascii(vec![dms.hemisphere.to_string().into_bytes()]),
            ));
        }
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut block = Cursor::new(Vec::new());
    writer
        .write(&mut block, false)
        .map_err(|source| Error::Exif {
            path: path.to_path_buf(),
            source,
        })?;

    let bytes = std::fs::read(path).map_err(|err| Error::io(path, err))?;
    let mut jpeg = Jpeg::from_bytes(bytes.into()).map_err(|source| Error::Jpeg {
        path: path.to_path_buf(),
        source,
    })?;
    jpeg.set_exif(Some(block.into_inner().into()));
    let file = File::create(path).map_err(|err| Error::io(path, err))?;
    jpeg.encoder()
        .write_to(file)
        .map_err(|err| Error::io(path, err))?;
    Ok(())
}

/// Geotag from the EXIF of the JPEG at `path`.
///
/// `None` when the image has no EXIF or no capture time; axes without GPS
/// tags stay `None`.
pub fn read_exif(path: &Path) -> Result<Option<GeoTag>> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(source) => {
            return Err(Error::Exif {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let ascii = |tag: Tag| match exif.get_field(tag, In::PRIMARY).map(|it| &it.value) {
        Some(Value::Ascii(values)) => values
            .first()
            .map(|it| String::from_utf8_lossy(it).trim().to_string()),
        _ => None,
    };
    let axis = |value_tag: Tag, ref_tag: Tag| {
        let Some(Value::Rational(parts)) = exif.get_field(value_tag, In::PRIMARY).map(|it| &it.value)
        else {
            return None;
        };
        let [degrees, minutes, seconds] = parts.get(..3)? else {
            return None;
        };
        let hemisphere = ascii(ref_tag)?.chars().next().and_then(Hemisphere::from_char)?;
        Some(Dms::new(
            degrees.to_f64(),
            minutes.to_f64(),
            seconds.to_f64(),
            hemisphere,
        ))
    };

    let Some(captured_at) = ascii(Tag::DateTimeOriginal)
        .or_else(|| ascii(Tag::DateTime))
        .and_then(|text| NaiveDateTime::parse_from_str(&text, EXIF_TIME_FORMAT).ok())
    else {
        return Ok(None);
    };
    Ok(Some(GeoTag {
        captured_at,
        latitude: axis(Tag::GPSLatitude, Tag::GPSLatitudeRef),
        longitude: axis(Tag::GPSLongitude, Tag::GPSLongitudeRef),
    }))
}

/// EXIF tag of the image, falling back to its sidecar.
pub fn read_geotag(path: &Path) -> Result<Option<GeoTag>> {
    match read_exif(path)? {
        Some(tag) if tag.position(Precision::Full).is_some() => Ok(Some(tag)),
        exif_tag => Ok(read_sidecar(path)?.or(exif_tag)),
    }
}

fn field(tag: Tag, value: Value) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    }
}

/// Degrees and minutes as whole numbers, seconds in hundredths.
fn dms_value(dms: &Dms) -> Value {
    let rational = |value: f64, denom: u32| Rational {
        num: (value * denom as f64).round().max(0.0) as u32,
        denom,
    };
    Value::Rational(vec![
        rational(dms.degrees, 1),
        rational(dms.minutes, 1),
        rational(dms.seconds, 100),
    ])
}

pub fn sidecar_path(image_path: &Path) -> PathBuf {
    let mut name = image_path.file_name().unwrap_or_default().to_os_string();
    name.push(".geotag.json");
    image_path.with_file_name(name)
}

pub fn write_sidecar(image_path: &Path, tag: &GeoTag) -> Result<PathBuf> {
    let path = sidecar_path(image_path);
    let json = serde_json::to_vec_pretty(tag).map_err(|source| Error::Sidecar {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, json).map_err(|err| Error::io(&path, err))?;
    Ok(path)
}

/// Reads the sidecar of `image_path`, `None` when there is none.
pub fn read_sidecar(image_path: &Path) -> Result<Option<GeoTag>> {
    let path = sidecar_path(image_path);
    let raw = match std::fs::read(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::io(&path, err)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| Error::Sidecar { path, source })
}

#[cfg(test)]
mod tests {
    use crate::coords::Hemisphere;

    use super::*;

    #[test]
    fn sidecar_keeps_full_precision() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("i240630_122337-0.jpg");
        let tag = GeoTag {
            captured_at: crate::timestamp::capture_time("i240630_122337-0.png").unwrap(),
            latitude: Some(Dms::new(46.0, 57.0, 13.0, Hemisphere::N)),
            longitude: Some(Dms::new(7.0, 26.0, 41.0, Hemisphere::E)),
        };
        let written = write_sidecar(&image, &tag).unwrap();
        assert_eq!(
            written.file_name().unwrap(),
            "i240630_122337-0.jpg.geotag.json"
        );
        let read = read_sidecar(&image).unwrap().unwrap();
        assert_eq!(read, tag);
        let (lon, lat) = read.position(Precision::Full).unwrap();
        assert_eq!(lat, 46.0 + 57.0 / 60.0 + 13.0 / 3600.0);
        assert_eq!(lon, 7.0 + 26.0 / 60.0 + 41.0 / 3600.0);
    }

    #[test]
    fn exif_carries_time_and_position() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("i240630_122337-0.jpg");
        image::RgbImage::new(32, 16).save(&image).unwrap();
        assert_eq!(read_exif(&image).unwrap(), None);

        let tag = GeoTag {
            captured_at: crate::timestamp::capture_time("i240630_122337-0.png").unwrap(),
            latitude: Some(Dms::new(46.0, 30.0, 36.0, Hemisphere::N)),
            longitude: Some(Dms::new(7.0, 30.0, 0.0, Hemisphere::W)),
        };
        write_exif(&image, &tag).unwrap();

        assert_eq!(read_exif(&image).unwrap(), Some(tag));
        assert_eq!(image::image_dimensions(&image).unwrap(), (32, 16));
    }

    #[test]
    fn exif_without_gps_falls_back_to_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("i240630_122337-0.jpg");
        image::RgbImage::new(8, 8).save(&image).unwrap();
        let mut tag = GeoTag {
            captured_at: crate::timestamp::capture_time("i240630_122337-0.png").unwrap(),
            latitude: None,
            longitude: None,
        };
        write_exif(&image, &tag).unwrap();
        assert_eq!(read_geotag(&image).unwrap(), Some(tag.clone()));

        tag.latitude = Some(Dms::new(46.0, 0.0, 0.0, Hemisphere::N));
        tag.longitude = Some(Dms::new(7.0, 0.0, 0.0, Hemisphere::E));
        write_sidecar(&image, &tag).unwrap();
        assert_eq!(read_geotag(&image).unwrap(), Some(tag));
    }

    #[test]
    fn position_needs_both_axes() {
        let tag = GeoTag {
            captured_at: chrono::NaiveDate::from_ymd_opt(2024, 6, 30)
                .and_then(|date| date.and_hms_opt(12, 0, 0))
                .unwrap(),
            latitude: Some(Dms::new(46.0, 0.0, 0.0, Hemisphere::N)),
            longitude: None,
        };
        assert_eq!(tag.position(Precision::REPORT), None);
        assert!(read_sidecar(Path::new("/nonexistent/x.jpg")).unwrap().is_none());
    }
}
