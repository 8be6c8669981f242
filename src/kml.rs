use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    coords::Precision,
    error::{Error, Result},
};

pub const CAMERA_ICON: &str =
    "https://map.geo.admin.ch/api/icons/sets/default/icons/100-camera@1x-0,0,225.png";

#[derive(Debug, Clone, PartialEq)]
pub struct IconStyle {
    pub href: String,
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    /// HTML shown in the balloon, written as CDATA.
    pub description: String,
    pub lon: f64,
    pub lat: f64,
}

/// Point placemarks sharing one icon style.
#[derive(Debug, Clone, PartialEq)]
pub struct KmlDocument {
    pub name: String,
    pub icon: IconStyle,
    pub placemarks: Vec<Placemark>,
}

impl KmlDocument {
    pub fn new(name: impl Into<String>, icon: IconStyle) -> Self {
        Self {
            name: name.into(),
            icon,
            placemarks: Vec::new(),
        }
    }

    pub fn push(&mut self, placemark: Placemark) {
        self.placemarks.push(placemark);
    }

    pub fn write_to(&self, mut out: impl Write) -> std::io::Result<()> {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            out,
            r#"<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:gx="http://www.google.com/kml/ext/2.2">"#
        )?;
        writeln!(out, "<Document><name>{}</name>", escape(&self.name))?;
        writeln!(out, r#"<Style id="image_style">"#)?;
        writeln!(out, "<IconStyle>")?;
        writeln!(out, "<scale>{}</scale>", self.icon.scale)?;
        writeln!(
            out,
            "<Icon><href>{}</href><gx:w>48</gx:w><gx:h>48</gx:h></Icon>",
            escape(&self.icon.href)
        )?;
        writeln!(out, "</IconStyle>")?;
        writeln!(out, "<LabelStyle><color>ff0000ff</color><scale>1.5</scale></LabelStyle>")?;
        writeln!(out, "</Style>")?;
        for placemark in &self.placemarks {
            let lon = Precision::REPORT.apply(placemark.lon);
            let lat = Precision::REPORT.apply(placemark.lat);
            writeln!(out, "<Placemark>")?;
            writeln!(out, "<name></name>")?;
            writeln!(
                out,
                "<description><![CDATA[{}]]></description>",
                placemark.description.replace("]]>", "]]]]><![CDATA[>")
            )?;
            writeln!(out, "<styleUrl>#image_style</styleUrl>")?;
            writeln!(out, "<Point><coordinates>{lon},{lat},0</coordinates></Point>")?;
            writeln!(out, "</Placemark>")?;
        }
        writeln!(out, "</Document>")?;
        writeln!(out, "</kml>")?;
        out.flush()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|err| Error::io(path, err))?;
        self.write_to(BufWriter::new(file))
            .map_err(|err| Error::io(path, err))
    }
}

/// Balloon with the JPEG embedded as a data URL.
pub fn embedded_preview(file_name: &str, time: &str, jpeg: &[u8]) -> String {
    format!(
        r#"File: {file_name} Time: {time}<br /><img src="data:image/jpeg;base64,{}" width="400px" />"#,
        STANDARD.encode(jpeg)
    )
}

/// Balloon linking the full-resolution image and its published thumbnail.
pub fn linked_preview(base_url: &str, file_name: &str, time: &str) -> String {
    format!(
        r#"<a href="{base_url}{file_name}">Download-View Fullresolution</a> {time}<br><img style="max-width:400px;" src="{base_url}thumbs/{file_name}">"#
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
