//! Draws a layout onto the source image and encodes the result as PNG.
//!
//! The canvas is a fresh RGBA buffer per request, sized exactly to the source
//! image. Items paint in array order. Each item is rasterized as a glyph
//! coverage mask; stroke is a dilation of that mask, shadow is a blurred copy
//! of the widest mask, fill goes on top. Rotated items render to their own
//! transparent layer which is then resampled onto the canvas around the
//! item's anchor point.

use image::{DynamicImage, ImageEncoder, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

use super::{fonts, RenderError};
use crate::layout::{Align, LayoutData, LayoutItem};
use crate::util;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Shadow {
    color: Rgba<u8>,
    blur: f32,
    dx: i32,
    dy: i32,
}

// rgba(0,0,0,0.8), blur 10, offset 4/4
const STRONG_SHADOW: Shadow = Shadow { color: Rgba([0, 0, 0, 204]), blur: 10.0, dx: 4, dy: 4 };
// rgba(0,0,0,0.5), blur 5, no offset
const DEFAULT_SHADOW: Shadow = Shadow { color: Rgba([0, 0, 0, 128]), blur: 5.0, dx: 0, dy: 0 };

/// Inclusive pixel bounds, possibly extending past the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Bounds {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl Bounds {
    fn expand(self, r: i32) -> Self {
        Bounds { x0: self.x0 - r, y0: self.y0 - r, x1: self.x1 + r, y1: self.y1 + r }
    }

    fn shift(self, dx: i32, dy: i32) -> Self {
        Bounds { x0: self.x0 + dx, y0: self.y0 + dy, x1: self.x1 + dx, y1: self.y1 + dy }
    }

    fn union(self, o: Bounds) -> Self {
        Bounds {
            x0: self.x0.min(o.x0),
            y0: self.y0.min(o.y0),
            x1: self.x1.max(o.x1),
            y1: self.y1.max(o.y1),
        }
    }

    /// Intersect with the canvas; None when nothing is left.
    fn clamped(self, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x0.max(0);
        let y0 = self.y0.max(0);
        let x1 = self.x1.min(w as i32 - 1);
        let y1 = self.y1.min(h as i32 - 1);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

fn union_opt(a: Option<Bounds>, b: Bounds) -> Option<Bounds> {
    Some(match a {
        Some(a) => a.union(b),
        None => b,
    })
}

/// Decode the uploaded image. Rejecting bad input here keeps the handler from
/// ever making a layout request for an image that cannot be drawn on.
pub fn decode_image(image_b64: &str) -> Result<DynamicImage, RenderError> {
    if image_b64.trim().is_empty() {
        return Err(RenderError::BadRequest("an image is required".into()));
    }
    let bytes = util::b64_decode(image_b64)
        .ok_or_else(|| RenderError::BadRequest("imageBase64 is not valid base64".into()))?;
    image::load_from_memory(&bytes).map_err(|e| RenderError::Image(e.to_string()))
}

pub fn compose(img: &DynamicImage, data: &LayoutData) -> Result<Vec<u8>, RenderError> {
    let _t = crate::perf_scope!("compose");
    let mut canvas = img.to_rgba8();
    for item in &data.layout {
        draw_item(&mut canvas, item)?;
    }
    encode_png(&canvas)
}

pub fn percent_to_px(percent: f32, dimension: u32) -> f32 {
    percent / 100.0 * dimension as f32
}

/// Left edge of the text run for a given alignment anchor.
pub fn text_left(align: Align, anchor_x: f32, text_w: f32) -> f32 {
    match align {
        Align::Left => anchor_x,
        Align::Center => anchor_x - text_w / 2.0,
        Align::Right => anchor_x - text_w,
    }
}

/// Left edge of the background box: the text edge pushed out by the padding.
pub fn background_left(align: Align, anchor_x: f32, text_w: f32, padding: f32) -> f32 {
    text_left(align, anchor_x, text_w) - padding
}

pub fn text_width(font: &Font<'_>, px: f32, text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let scale = Scale::uniform(px);
    let vm = font.v_metrics(scale);
    let mut width = 0.0f32;
    for g in font.layout(text, scale, point(0.0, vm.ascent)) {
        if let Some(bb) = g.pixel_bounding_box() {
            width = width.max(bb.max.x as f32);
        }
    }
    width
}

fn draw_item(canvas: &mut RgbaImage, item: &LayoutItem) -> Result<(), RenderError> {
    let text = item.text.trim();
    if text.is_empty() {
        return Ok(());
    }

    let (w, h) = canvas.dimensions();
    let ax = percent_to_px(item.x, w);
    let ay = percent_to_px(item.y, h);
    let font_px = item.font_size.unwrap_or(40.0).max(1.0);
    let font = fonts::resolve(
        item.font_family.as_deref().unwrap_or("Arial"),
        item.font_weight.as_deref().unwrap_or("bold"),
    )?;

    let rotation = item.rotation.unwrap_or(0.0);
    if rotation.rem_euclid(360.0) == 0.0 {
        draw_item_flat(canvas, item, &font, font_px, ax, ay, text)?;
    } else {
        // render on a clean layer, then pivot it around the anchor
        let mut layer = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
        if let Some(bounds) = draw_item_flat(&mut layer, item, &font, font_px, ax, ay, text)? {
            rotate_overlay(canvas, &layer, bounds, ax, ay, rotation);
        }
    }
    Ok(())
}

/// Draw one item without rotation. Returns the painted bounds (unclamped).
fn draw_item_flat(
    target: &mut RgbaImage,
    item: &LayoutItem,
    font: &Font<'static>,
    font_px: f32,
    anchor_x: f32,
    anchor_y: f32,
    text: &str,
) -> Result<Option<Bounds>, RenderError> {
    let (w, h) = target.dimensions();
    let align = item.align.unwrap_or(Align::Left);
    let tw = text_width(font, font_px, text);
    let left = text_left(align, anchor_x, tw);
    // middle baseline: the box height is approximated by the font size
    let top = anchor_y - font_px / 2.0;

    let mut painted: Option<Bounds> = None;

    if let Some(bg) = &item.background_color {
        let pad = item.padding.unwrap_or(0.0).max(0.0);
        let color = parse_color(bg)?;
        if let Some(b) = fill_rect(
            target,
            background_left(align, anchor_x, tw, pad),
            top - pad,
            tw + 2.0 * pad,
            font_px + 2.0 * pad,
            color,
        ) {
            painted = union_opt(painted, b);
        }
    }

    let (mask, mask_bounds) = rasterize_mask(w, h, font, font_px, left, top, text);
    let Some(mask_bounds) = mask_bounds else {
        return Ok(painted);
    };

    let stroke = match &item.stroke_color {
        Some(c) => {
            let width = item.stroke_width.unwrap_or(3.0).max(0.0);
            (width > 0.0).then(|| parse_color(c).map(|col| (col, width))).transpose()?
        }
        None => None,
    };

    let dilated = stroke.map(|(_, sw)| dilate_mask(&mask, w, h, mask_bounds, sw));

    // shadow goes under stroke and fill; it follows the widest mask
    let shadow = resolve_shadow(item)?;
    {
        let (src, src_bounds): (&[u8], Bounds) = match &dilated {
            Some((m, b)) => (m.as_slice(), *b),
            None => (mask.as_slice(), mask_bounds),
        };
        let (blurred, blurred_bounds) = blur_mask(src, w, h, src_bounds, shadow.blur);
        blend_mask(target, &blurred, blurred_bounds, shadow.dx, shadow.dy, shadow.color);
        painted = union_opt(painted, blurred_bounds.shift(shadow.dx, shadow.dy));
    }

    if let (Some((stroke_color, _)), Some((dmask, dbounds))) = (stroke, &dilated) {
        blend_mask(target, dmask, *dbounds, 0, 0, stroke_color);
        painted = union_opt(painted, *dbounds);
    }

    let fill = parse_color(item.color.as_deref().unwrap_or("#FFFFFF"))?;
    blend_mask(target, &mask, mask_bounds, 0, 0, fill);
    painted = union_opt(painted, mask_bounds);

    Ok(painted)
}

/// Explicit shadow fields win; the textShadow flag only picks the preset.
fn resolve_shadow(item: &LayoutItem) -> Result<Shadow, RenderError> {
    let mut shadow = if item.text_shadow == Some(true) {
        STRONG_SHADOW
    } else {
        DEFAULT_SHADOW
    };
    if let Some(c) = &item.shadow_color {
        shadow.color = parse_color(c)?;
    }
    if let Some(b) = item.shadow_blur {
        shadow.blur = b.max(0.0);
    }
    Ok(shadow)
}

/// Glyph coverage in a canvas-sized byte mask.
fn rasterize_mask(
    w: u32,
    h: u32,
    font: &Font<'_>,
    px_size: f32,
    left: f32,
    top: f32,
    text: &str,
) -> (Vec<u8>, Option<Bounds>) {
    let scale = Scale::uniform(px_size);
    let vm = font.v_metrics(scale);
    let baseline = top + vm.ascent;

    let mut mask = vec![0u8; (w as usize) * (h as usize)];
    let mut bounds: Option<Bounds> = None;

    for g in font.layout(text, scale, point(left, baseline)) {
        if let Some(bb) = g.pixel_bounding_box() {
            bounds = union_opt(
                bounds,
                Bounds { x0: bb.min.x, y0: bb.min.y, x1: bb.max.x - 1, y1: bb.max.y - 1 },
            );
            g.draw(|gx, gy, v| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                if px < 0 || py < 0 || px >= w as i32 || py >= h as i32 {
                    return;
                }
                let idx = py as usize * w as usize + px as usize;
                let a = (v * 255.0) as u8;
                if a > mask[idx] {
                    mask[idx] = a;
                }
            });
        }
    }

    (mask, bounds)
}

/// Disc max-filter; turns a glyph mask into a stroke body.
fn dilate_mask(mask: &[u8], w: u32, h: u32, bounds: Bounds, radius: f32) -> (Vec<u8>, Bounds) {
    let r = radius.ceil() as i32;
    let grown = bounds.expand(r);
    let mut out = vec![0u8; mask.len()];

    let r2 = radius * radius + 0.5;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if (dx * dx + dy * dy) as f32 <= r2 {
                offsets.push((dx, dy));
            }
        }
    }

    if let Some((x0, y0, x1, y1)) = grown.clamped(w, h) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                let mut m = 0u8;
                for &(dx, dy) in &offsets {
                    let sx = x as i32 + dx;
                    let sy = y as i32 + dy;
                    if sx < 0 || sy < 0 || sx >= w as i32 || sy >= h as i32 {
                        continue;
                    }
                    let v = mask[sy as usize * w as usize + sx as usize];
                    if v > m {
                        m = v;
                        if m == 255 {
                            break;
                        }
                    }
                }
                out[y as usize * w as usize + x as usize] = m;
            }
        }
    }

    (out, grown)
}

/// Separable box blur approximating the canvas shadowBlur semantics
/// (blur value ~ 2 sigma).
fn blur_mask(mask: &[u8], w: u32, h: u32, bounds: Bounds, blur: f32) -> (Vec<u8>, Bounds) {
    let r = (blur / 2.0).round() as i32;
    if r <= 0 {
        return (mask.to_vec(), bounds);
    }

    // two composed passes spread coverage up to 2r from the source
    let grown = bounds.expand(2 * r);
    let Some((x0, y0, x1, y1)) = grown.clamped(w, h) else {
        return (mask.to_vec(), bounds);
    };
    let win = (2 * r + 1) as u32;

    let mut tmp = vec![0u8; mask.len()];
    for y in y0..=y1 {
        for x in x0..=x1 {
            let mut sum = 0u32;
            for dx in -r..=r {
                let sx = x as i32 + dx;
                if sx < 0 || sx >= w as i32 {
                    continue;
                }
                sum += mask[y as usize * w as usize + sx as usize] as u32;
            }
            tmp[y as usize * w as usize + x as usize] = (sum / win) as u8;
        }
    }

    let mut out = vec![0u8; mask.len()];
    for y in y0..=y1 {
        for x in x0..=x1 {
            let mut sum = 0u32;
            for dy in -r..=r {
                let sy = y as i32 + dy;
                if sy < 0 || sy >= h as i32 {
                    continue;
                }
                sum += tmp[sy as usize * w as usize + x as usize] as u32;
            }
            out[y as usize * w as usize + x as usize] = (sum / win) as u8;
        }
    }

    (out, grown)
}

/// Composite `color` through the mask, offset by (dx, dy).
fn blend_mask(target: &mut RgbaImage, mask: &[u8], bounds: Bounds, dx: i32, dy: i32, color: Rgba<u8>) {
    let (w, h) = target.dimensions();
    let Some((x0, y0, x1, y1)) = bounds.shift(dx, dy).clamped(w, h) else {
        return;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let sx = x as i32 - dx;
            let sy = y as i32 - dy;
            if sx < 0 || sy < 0 || sx >= w as i32 || sy >= h as i32 {
                continue;
            }
            let coverage = mask[sy as usize * w as usize + sx as usize];
            if coverage == 0 {
                continue;
            }
            blend_px(target, x, y, color, coverage as f32 / 255.0);
        }
    }
}

fn fill_rect(
    target: &mut RgbaImage,
    x: f32,
    y: f32,
    rect_w: f32,
    rect_h: f32,
    color: Rgba<u8>,
) -> Option<Bounds> {
    if rect_w <= 0.0 || rect_h <= 0.0 {
        return None;
    }
    let (w, h) = target.dimensions();
    let b = Bounds {
        x0: x.floor() as i32,
        y0: y.floor() as i32,
        x1: (x + rect_w).ceil() as i32 - 1,
        y1: (y + rect_h).ceil() as i32 - 1,
    };
    if let Some((x0, y0, x1, y1)) = b.clamped(w, h) {
        for yy in y0..=y1 {
            for xx in x0..=x1 {
                blend_px(target, xx, yy, color, 1.0);
            }
        }
    }
    Some(b)
}

/// src-over with a straight-alpha destination; layers used for rotation are
/// transparent, so the general form is required.
fn blend_px(img: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>, coverage: f32) {
    let sa = coverage * (color.0[3] as f32 / 255.0);
    if sa <= 0.0 {
        return;
    }
    let dst = img.get_pixel_mut(x, y);
    let da = dst.0[3] as f32 / 255.0;
    let oa = sa + da * (1.0 - sa);
    if oa <= 0.0 {
        return;
    }
    for i in 0..3 {
        let sc = color.0[i] as f32;
        let dc = dst.0[i] as f32;
        dst.0[i] = ((sc * sa + dc * da * (1.0 - sa)) / oa).round().min(255.0) as u8;
    }
    dst.0[3] = (oa * 255.0).round().min(255.0) as u8;
}

fn rotate_point(x: f32, y: f32, cx: f32, cy: f32, sin: f32, cos: f32) -> (f32, f32) {
    let dx = x - cx;
    let dy = y - cy;
    (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
}

/// Resample `layer` rotated by `degrees` around (cx, cy) onto `base`.
fn rotate_overlay(
    base: &mut RgbaImage,
    layer: &RgbaImage,
    src_bounds: Bounds,
    cx: f32,
    cy: f32,
    degrees: f32,
) {
    let (w, h) = base.dimensions();
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    // forward-rotate the source corners to bound the destination area
    let corners = [
        (src_bounds.x0 as f32, src_bounds.y0 as f32),
        (src_bounds.x1 as f32, src_bounds.y0 as f32),
        (src_bounds.x0 as f32, src_bounds.y1 as f32),
        (src_bounds.x1 as f32, src_bounds.y1 as f32),
    ];
    let mut dest = Bounds { x0: i32::MAX, y0: i32::MAX, x1: i32::MIN, y1: i32::MIN };
    for (x, y) in corners {
        let (rx, ry) = rotate_point(x, y, cx, cy, sin, cos);
        dest.x0 = dest.x0.min(rx.floor() as i32);
        dest.y0 = dest.y0.min(ry.floor() as i32);
        dest.x1 = dest.x1.max(rx.ceil() as i32);
        dest.y1 = dest.y1.max(ry.ceil() as i32);
    }

    let Some((x0, y0, x1, y1)) = dest.expand(1).clamped(w, h) else {
        return;
    };

    for y in y0..=y1 {
        for x in x0..=x1 {
            // inverse-rotate the destination pixel into layer space
            let (sx, sy) = rotate_point(x as f32, y as f32, cx, cy, -sin, cos);
            if let Some((color, coverage)) = sample_bilinear(layer, sx, sy) {
                blend_px(base, x, y, color, coverage);
            }
        }
    }
}

/// Bilinear sample with premultiplied accumulation; None when fully
/// transparent or out of range.
fn sample_bilinear(layer: &RgbaImage, x: f32, y: f32) -> Option<(Rgba<u8>, f32)> {
    let (w, h) = layer.dimensions();
    let fx = x.floor();
    let fy = y.floor();
    let tx = x - fx;
    let ty = y - fy;

    let taps = [
        (fx as i64, fy as i64, (1.0 - tx) * (1.0 - ty)),
        (fx as i64 + 1, fy as i64, tx * (1.0 - ty)),
        (fx as i64, fy as i64 + 1, (1.0 - tx) * ty),
        (fx as i64 + 1, fy as i64 + 1, tx * ty),
    ];

    let (mut pr, mut pg, mut pb, mut pa) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
    for (ix, iy, weight) in taps {
        if weight <= 0.0 || ix < 0 || iy < 0 || ix >= w as i64 || iy >= h as i64 {
            continue;
        }
        let p = layer.get_pixel(ix as u32, iy as u32);
        let a = (p.0[3] as f32 / 255.0) * weight;
        pr += p.0[0] as f32 * a;
        pg += p.0[1] as f32 * a;
        pb += p.0[2] as f32 * a;
        pa += a;
    }

    if pa <= 0.0 {
        return None;
    }
    let color = Rgba([
        (pr / pa).round().min(255.0) as u8,
        (pg / pa).round().min(255.0) as u8,
        (pb / pa).round().min(255.0) as u8,
        255,
    ]);
    Some((color, pa.min(1.0)))
}

pub fn parse_color(s: &str) -> Result<Rgba<u8>, RenderError> {
    let t = s.trim();
    if let Some(hex_part) = t.strip_prefix('#') {
        return parse_hex(hex_part).ok_or_else(|| RenderError::InvalidColor(t.to_string()));
    }
    let lower = t.to_ascii_lowercase();
    if let Some(inner) = lower.strip_prefix("rgba(").and_then(|r| r.strip_suffix(')')) {
        return parse_rgb_parts(inner, true).ok_or_else(|| RenderError::InvalidColor(t.to_string()));
    }
    if let Some(inner) = lower.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
        return parse_rgb_parts(inner, false).ok_or_else(|| RenderError::InvalidColor(t.to_string()));
    }
    match lower.as_str() {
        "white" => Ok(Rgba([255, 255, 255, 255])),
        "black" => Ok(Rgba([0, 0, 0, 255])),
        _ => Err(RenderError::InvalidColor(t.to_string())),
    }
}

fn parse_hex(hex_part: &str) -> Option<Rgba<u8>> {
    match hex_part.len() {
        3 => {
            let mut c = [0u8; 4];
            for (i, ch) in hex_part.chars().enumerate() {
                let d = ch.to_digit(16)? as u8;
                c[i] = d * 17;
            }
            c[3] = 255;
            Some(Rgba(c))
        }
        6 => {
            let b = hex::decode(hex_part).ok()?;
            Some(Rgba([b[0], b[1], b[2], 255]))
        }
        8 => {
            let b = hex::decode(hex_part).ok()?;
            Some(Rgba([b[0], b[1], b[2], b[3]]))
        }
        _ => None,
    }
}

fn parse_rgb_parts(inner: &str, has_alpha: bool) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != if has_alpha { 4 } else { 3 } {
        return None;
    }
    let chan = |p: &str| -> Option<u8> {
        let v: f32 = p.parse().ok()?;
        (0.0..=255.0).contains(&v).then(|| v.round() as u8)
    };
    let r = chan(parts[0])?;
    let g = chan(parts[1])?;
    let b = chan(parts[2])?;
    let a = if has_alpha {
        let v: f32 = parts[3].parse().ok()?;
        if !(0.0..=1.0).contains(&v) {
            return None;
        }
        (v * 255.0).round() as u8
    } else {
        255
    };
    Some(Rgba([r, g, b, a]))
}

pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    let enc = image::codecs::png::PngEncoder::new(&mut buf);
    enc.write_image(canvas, canvas.width(), canvas.height(), image::ExtendedColorType::Rgba8)
        .map_err(|e| RenderError::Internal(e.to_string()))?;

    // Lossless recompression is off by default: the request path is
    // speed-first. Opt in with FLYER_PNG_OPTIMIZE=1.
    if png_optimize_enabled() {
        let level = std::env::var("FLYER_OXIPNG_LEVEL")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(2)
            .min(6);
        let mut opts = oxipng::Options::from_preset(level);
        opts.fix_errors = true;
        if let Ok(out) = oxipng::optimize_from_memory(&buf, &opts) {
            return Ok(out);
        }
    }

    Ok(buf)
}

fn png_optimize_enabled() -> bool {
    let v = std::env::var("FLYER_PNG_OPTIMIZE").unwrap_or_else(|_| "0".to_string());
    v == "1" || v.eq_ignore_ascii_case("true")
}
