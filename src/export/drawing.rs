//! DrawingML for pictures, regenerated from the image model.

use std::fmt::Write as _;
use std::io::Cursor;

use base64::Engine;

use crate::error::Error;
use crate::model::{AnchorData, AnchorPosition, Image, Passthrough, Sides, Size, Wrap};
use crate::units::{degrees_to_rot, pixels_to_emu};

use super::xml::{attr, escape_text};

const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

/// A translated element: its qualified name and serialized markup.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub xml: String,
}

impl XmlElement {
    pub fn is_drawing(&self) -> bool {
        matches!(self.name.as_str(), "wp:inline" | "wp:anchor")
    }
}

/// Decoded `data:` URI payload with the format detected from its bytes.
/// Anything that does not decode to a recognizable image is `None`.
pub fn decode_data_uri(src: &str) -> Option<(Vec<u8>, image::ImageFormat)> {
    let rest = src.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    let data = match base64::engine::general_purpose::STANDARD.decode(payload.trim()) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Image data URI is not valid base64: {e}");
            return None;
        }
    };
    match image::guess_format(&data) {
        Ok(format) => Some((data, format)),
        Err(e) => {
            log::warn!("Unrecognized image payload in data URI: {e}");
            None
        }
    }
}

/// Pixel size of encoded image bytes, when the decoder supports the format.
pub fn image_size(data: &[u8]) -> Option<Size> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    let (w, h) = reader.into_dimensions().ok()?;
    Some(Size {
        width: w as f64,
        height: h as f64,
    })
}

fn push_all(out: &mut String, fragments: &[Passthrough]) {
    for f in fragments {
        out.push_str(&f.xml);
    }
}

fn emu(px: f64) -> String {
    pixels_to_emu(px).to_string()
}

fn write_dist(out: &mut String, padding: &Sides) -> Result<(), Error> {
    write!(
        out,
        " distT=\"{}\" distB=\"{}\" distL=\"{}\" distR=\"{}\"",
        emu(padding.top),
        emu(padding.bottom),
        emu(padding.left),
        emu(padding.right)
    )?;
    Ok(())
}

fn write_position(out: &mut String, tag: &str, relative_from: &str, pos: &AnchorPosition) -> Result<(), Error> {
    write!(out, "<wp:{tag}{}>", attr("relativeFrom", relative_from))?;
    match pos {
        AnchorPosition::Offset { value } => write!(out, "<wp:posOffset>{}</wp:posOffset>", emu(*value))?,
        AnchorPosition::Align { value } => write!(out, "<wp:align>{}</wp:align>", escape_text(value))?,
    }
    write!(out, "</wp:{tag}>")?;
    Ok(())
}

fn write_wrap(out: &mut String, wrap: &Wrap) -> Result<(), Error> {
    match wrap {
        Wrap::None => out.push_str("<wp:wrapNone/>"),
        Wrap::Square { wrap_text } => {
            let text = wrap_text.as_deref().unwrap_or("bothSides");
            write!(out, "<wp:wrapSquare{}/>", attr("wrapText", text))?;
        }
        Wrap::TopAndBottom => out.push_str("<wp:wrapTopAndBottom/>"),
        Wrap::Raw(raw) => out.push_str(&raw.xml),
    }
    Ok(())
}

fn write_anchor_open(out: &mut String, image: &Image, anchor: &AnchorData) -> Result<(), Error> {
    out.push_str("<wp:anchor");
    write_dist(out, &image.padding)?;
    let flag = |b: bool| if b { "1" } else { "0" };
    write!(
        out,
        " simplePos=\"0\" relativeHeight=\"{}\" behindDoc=\"{}\" locked=\"{}\" layoutInCell=\"{}\" allowOverlap=\"{}\">",
        anchor.relative_height,
        flag(anchor.behind_doc),
        flag(anchor.locked),
        flag(anchor.layout_in_cell),
        flag(anchor.allow_overlap)
    )?;
    out.push_str("<wp:simplePos x=\"0\" y=\"0\"/>");
    write_position(out, "positionH", &anchor.h_relative_from, &anchor.horizontal)?;
    write_position(out, "positionV", &anchor.v_relative_from, &anchor.vertical)?;
    Ok(())
}

/// `wp:inline` or `wp:anchor` for a picture whose media is reachable
/// through relationship `rel_id`. `doc_pr_id` is the already allocated
/// `wp:docPr/@id`.
///
/// Rotation and flips are written only when set; zero rotation produces no
/// `rot` attribute at all.
pub fn translate_image(image: &Image, rel_id: &str, doc_pr_id: u32) -> Result<XmlElement, Error> {
    let mut out = String::new();
    let name = match &image.anchor {
        Some(anchor) => {
            write_anchor_open(&mut out, image, anchor)?;
            "wp:anchor"
        }
        None => {
            out.push_str("<wp:inline");
            write_dist(&mut out, &image.padding)?;
            out.push('>');
            "wp:inline"
        }
    };

    let (cx, cy) = (emu(image.size.width), emu(image.size.height));
    write!(out, "<wp:extent cx=\"{cx}\" cy=\"{cy}\"/>")?;
    let ext = image.transform_data.size_extension.unwrap_or_default();
    write!(
        out,
        "<wp:effectExtent l=\"{}\" t=\"{}\" r=\"{}\" b=\"{}\"/>",
        emu(ext.left),
        emu(ext.top),
        emu(ext.right),
        emu(ext.bottom)
    )?;
    if let Some(anchor) = &image.anchor {
        write_wrap(&mut out, &anchor.wrap)?;
    }

    let pic_name = image
        .name
        .clone()
        .unwrap_or_else(|| format!("Picture {doc_pr_id}"));
    write!(out, "<wp:docPr id=\"{doc_pr_id}\"{}", attr("name", &pic_name))?;
    if let Some(descr) = &image.description {
        out.push_str(&attr("descr", descr));
    }
    let extras = &image.extras;
    if extras.doc_properties.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        push_all(&mut out, &extras.doc_properties);
        out.push_str("</wp:docPr>");
    }
    match &extras.frame_properties {
        Some(frame) => out.push_str(&frame.xml),
        None => write!(
            out,
            "<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a=\"{DML_NS}\" noChangeAspect=\"1\"/></wp:cNvGraphicFramePr>"
        )?,
    }
    write!(
        out,
        "<a:graphic xmlns:a=\"{DML_NS}\"><a:graphicData uri=\"{PIC_NS}\"><pic:pic xmlns:pic=\"{PIC_NS}\">"
    )?;
    write!(
        out,
        "<pic:nvPicPr><pic:cNvPr id=\"{doc_pr_id}\"{}/>",
        attr("name", &pic_name)
    )?;
    match &extras.picture_properties {
        Some(props) => out.push_str(&props.xml),
        None => out.push_str("<pic:cNvPicPr/>"),
    }
    out.push_str("</pic:nvPicPr>");

    write!(out, "<pic:blipFill><a:blip r:embed=\"{rel_id}\"")?;
    if extras.blip.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        push_all(&mut out, &extras.blip);
        out.push_str("</a:blip>");
    }
    if extras.blip_fill.is_empty() {
        out.push_str("<a:stretch><a:fillRect/></a:stretch>");
    } else {
        push_all(&mut out, &extras.blip_fill);
    }
    out.push_str("</pic:blipFill>");

    out.push_str("<pic:spPr><a:xfrm");
    let t = &image.transform_data;
    let rot = degrees_to_rot(t.rotation);
    if rot != 0 {
        write!(out, " rot=\"{rot}\"")?;
    }
    if t.horizontal_flip {
        out.push_str(" flipH=\"1\"");
    }
    if t.vertical_flip {
        out.push_str(" flipV=\"1\"");
    }
    write!(
        out,
        "><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>"
    )?;
    if extras.shape.is_empty() {
        out.push_str("<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom>");
    } else {
        push_all(&mut out, &extras.shape);
    }
    out.push_str("</pic:spPr>");
    out.push_str("</pic:pic></a:graphicData></a:graphic>");
    write!(out, "</{name}>")?;

    Ok(XmlElement {
        name: name.to_string(),
        xml: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_1x1() -> Vec<u8> {
        let img = image::RgbaImage::new(1, 1);
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn data_uri_requires_real_image_bytes() {
        assert!(decode_data_uri("data:,").is_none());
        assert!(decode_data_uri("data:image/png;base64,bm90IGFuIGltYWdl").is_none());
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_1x1());
        let (data, format) = decode_data_uri(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!(format, image::ImageFormat::Png);
        assert_eq!(image_size(&data), Some(Size { width: 1.0, height: 1.0 }));
    }

    #[test]
    fn untransformed_image_has_no_transform_attributes() {
        let image = Image {
            src: "word/media/image1.png".into(),
            size: Size {
                width: 96.0,
                height: 48.0,
            },
            ..Image::default()
        };
        let el = translate_image(&image, "rId5", 3).unwrap();
        assert!(el.is_drawing());
        assert!(el.xml.contains("<a:xfrm><a:off"));
        assert!(!el.xml.contains("rot="));
        assert!(!el.xml.contains("flipV"));
        assert!(!el.xml.contains("flipH"));
        assert!(el.xml.contains("cx=\"914400\" cy=\"457200\""));
        assert!(el.xml.contains("<wp:docPr id=\"3\""));
        assert!(el.xml.contains("<pic:cNvPr id=\"3\""));
    }

    #[test]
    fn rotation_and_flip_are_written_when_set() {
        let mut image = Image::default();
        image.transform_data.rotation = 90.0;
        image.transform_data.vertical_flip = true;
        let el = translate_image(&image, "rId1", 1).unwrap();
        assert!(el.xml.contains("<a:xfrm rot=\"5400000\" flipV=\"1\">"));
    }
}
