use crate::{BBox, Detection};

/// Decode the common ultralytics export layout `[cx, cy, w, h, obj, cls0..]`
/// (normalized 0..1) into pixel boxes for a `frame_w` x `frame_h` input.
pub fn postprocess_ultralytics(
    raw: &[f32],
    num_preds: usize,
    num_classes: usize,
    conf_th: f32,
    frame_w: u32,
    frame_h: u32,
) -> Vec<Detection> {
    let stride = 5 + num_classes;
    let (fw, fh) = (frame_w as f32, frame_h as f32);
    let mut out = Vec::new();

    for i in 0..num_preds {
        let base = i * stride;
        if base + stride > raw.len() { break; }
        let cx = raw[base];
        let cy = raw[base + 1];
        let w = raw[base + 2];
        let h = raw[base + 3];
        let obj = raw[base + 4];

        let mut best_c = 0usize;
        let mut best_p = 0.0f32;
        for c in 0..num_classes {
            let p = raw[base + 5 + c];
            if p > best_p { best_p = p; best_c = c; }
        }
        let conf = obj * best_p;
        if conf >= conf_th {
            let b = BBox::from_cxcywh(cx * fw, cy * fh, w * fw, h * fh);
            // keep boxes inside the frame
            let b = BBox::new(b.x1.clamp(0.0, fw), b.y1.clamp(0.0, fh), b.x2.clamp(0.0, fw), b.y2.clamp(0.0, fh));
            out.push(Detection { class_id: best_c as i32, confidence: conf.clamp(0.0, 1.0), bbox: b });
        }
    }
    out
}
