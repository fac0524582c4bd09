use std::collections::HashMap;

use roxmltree::Node;

use crate::model::{AnchorData, AnchorPosition, DrawingExtras, Image, Passthrough, Sides, Size, TransformData, Wrap};
use crate::package::{Relationship, resolve_target};
use crate::units::{emu_to_pixels, rot_to_degrees};

use super::{DML_NS, PIC_NS, REL_NS, WPD_NS, passthrough};

fn wpd<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WPD_NS))
}

fn child_ns<'a>(node: Node<'a, 'a>, ns: &str, name: &str) -> Option<Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(ns))
}

fn emu_attr(node: Node, name: &str) -> Option<f64> {
    node.attribute(name)
        .and_then(|v| v.parse::<f64>().ok())
        .map(emu_to_pixels)
}

fn flag(node: Node, name: &str) -> bool {
    node.attribute(name).is_some_and(|v| v == "1" || v == "true")
}

fn find_blip_embed<'a>(container: Node<'a, 'a>) -> Option<&'a str> {
    container
        .descendants()
        .find(|n| n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS))
        .and_then(|n| n.attribute((REL_NS, "embed")))
}

fn parse_transform(container: Node) -> TransformData {
    let xfrm = container.descendants().find(|n| {
        n.tag_name().name() == "xfrm"
            && n.tag_name().namespace() == Some(DML_NS)
            && n.parent().is_some_and(|p| p.tag_name().name() == "spPr")
    });
    let size_extension = wpd(container, "effectExtent").map(|n| Sides {
        top: emu_attr(n, "t").unwrap_or(0.0),
        bottom: emu_attr(n, "b").unwrap_or(0.0),
        left: emu_attr(n, "l").unwrap_or(0.0),
        right: emu_attr(n, "r").unwrap_or(0.0),
    });
    TransformData {
        rotation: xfrm
            .and_then(|n| n.attribute("rot"))
            .and_then(|v| v.parse::<f64>().ok())
            .map(rot_to_degrees)
            .unwrap_or(0.0),
        vertical_flip: xfrm.is_some_and(|n| flag(n, "flipV")),
        horizontal_flip: xfrm.is_some_and(|n| flag(n, "flipH")),
        size_extension: size_extension.filter(|s| !s.is_zero()),
    }
}

fn parse_position(node: Option<Node>) -> AnchorPosition {
    let child = |name: &str| {
        node.and_then(|n| {
            n.children()
                .find(|c| c.tag_name().name() == name && c.tag_name().namespace() == Some(WPD_NS))
        })
    };
    if let Some(align) = child("align") {
        return AnchorPosition::Align {
            value: align.text().unwrap_or("left").trim().to_string(),
        };
    }
    let emu = child("posOffset")
        .and_then(|n| n.text())
        .and_then(|t| t.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    AnchorPosition::Offset {
        value: emu_to_pixels(emu),
    }
}

fn parse_wrap(container: Node, src: &str) -> Wrap {
    for child in container.children().filter(|n| n.tag_name().namespace() == Some(WPD_NS)) {
        match child.tag_name().name() {
            "wrapNone" => return Wrap::None,
            "wrapSquare" => {
                return Wrap::Square {
                    wrap_text: child.attribute("wrapText").map(str::to_string),
                };
            }
            "wrapTopAndBottom" => return Wrap::TopAndBottom,
            "wrapTight" | "wrapThrough" => return Wrap::Raw(passthrough(src, child)),
            _ => {}
        }
    }
    Wrap::None
}

fn parse_anchor(container: Node, src: &str) -> AnchorData {
    let pos_h = wpd(container, "positionH");
    let pos_v = wpd(container, "positionV");
    AnchorData {
        h_relative_from: pos_h
            .and_then(|n| n.attribute("relativeFrom"))
            .unwrap_or("column")
            .to_string(),
        v_relative_from: pos_v
            .and_then(|n| n.attribute("relativeFrom"))
            .unwrap_or("paragraph")
            .to_string(),
        horizontal: parse_position(pos_h),
        vertical: parse_position(pos_v),
        wrap: parse_wrap(container, src),
        behind_doc: flag(container, "behindDoc"),
        allow_overlap: flag(container, "allowOverlap"),
        layout_in_cell: flag(container, "layoutInCell"),
        locked: flag(container, "locked"),
        relative_height: container
            .attribute("relativeHeight")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0),
    }
}

/// Element children of `node` after skipping those named in `modelled`.
fn unmodelled(node: Option<Node>, src: &str, modelled: &[&str]) -> Vec<Passthrough> {
    node.into_iter()
        .flat_map(|n| n.children())
        .filter(|n| n.is_element() && !modelled.contains(&n.tag_name().name()))
        .map(|n| passthrough(src, n))
        .collect()
}

fn parse_extras(container: Node, src: &str) -> DrawingExtras {
    let pic = container
        .descendants()
        .find(|n| n.tag_name().name() == "pic" && n.tag_name().namespace() == Some(PIC_NS));
    let blip_fill = pic.and_then(|n| child_ns(n, PIC_NS, "blipFill"));
    let picture_properties = pic
        .and_then(|n| child_ns(n, PIC_NS, "nvPicPr"))
        .and_then(|n| child_ns(n, PIC_NS, "cNvPicPr"))
        .filter(|n| n.has_children() || n.attributes().len() > 0);
    DrawingExtras {
        doc_properties: unmodelled(wpd(container, "docPr"), src, &[]),
        frame_properties: wpd(container, "cNvGraphicFramePr").map(|n| passthrough(src, n)),
        picture_properties: picture_properties.map(|n| passthrough(src, n)),
        blip: unmodelled(blip_fill.and_then(|n| child_ns(n, DML_NS, "blip")), src, &[]),
        blip_fill: unmodelled(blip_fill, src, &["blip"]),
        shape: unmodelled(pic.and_then(|n| child_ns(n, PIC_NS, "spPr")), src, &["xfrm"]),
    }
}

/// A picture inside `w:drawing`. Charts, shapes, linked images and
/// anything else without an embedded blip return `None` and stay passthrough.
pub(crate) fn parse_drawing(
    drawing: Node,
    src: &str,
    part: &str,
    rels: &HashMap<String, Relationship>,
) -> Option<Image> {
    let container = drawing.children().find(|n| {
        n.tag_name().namespace() == Some(WPD_NS) && matches!(n.tag_name().name(), "inline" | "anchor")
    })?;
    let embed = find_blip_embed(container)?;
    let Some(rel) = rels.get(embed).filter(|r| !r.is_external()) else {
        log::warn!("Image relationship {embed} not found in {part}");
        return None;
    };

    let extent = wpd(container, "extent");
    let doc_pr = wpd(container, "docPr");
    let image = Image {
        src: resolve_target(part, &rel.target),
        id: doc_pr
            .and_then(|n| n.attribute("id"))
            .and_then(|v| v.parse::<u32>().ok()),
        name: doc_pr.and_then(|n| n.attribute("name")).map(str::to_string),
        description: doc_pr.and_then(|n| n.attribute("descr")).map(str::to_string),
        size: Size {
            width: extent.and_then(|n| emu_attr(n, "cx")).unwrap_or(0.0),
            height: extent.and_then(|n| emu_attr(n, "cy")).unwrap_or(0.0),
        },
        padding: Sides {
            top: emu_attr(container, "distT").unwrap_or(0.0),
            bottom: emu_attr(container, "distB").unwrap_or(0.0),
            left: emu_attr(container, "distL").unwrap_or(0.0),
            right: emu_attr(container, "distR").unwrap_or(0.0),
        },
        transform_data: parse_transform(container),
        anchor: (container.tag_name().name() == "anchor").then(|| parse_anchor(container, src)),
        extras: parse_extras(container, src),
    };
    Some(image)
}
