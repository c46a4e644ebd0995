use crate::Detection;

/// Class-aware non-maximum suppression within one detector call.
pub fn nms_filter(mut dets: Vec<Detection>, iou_th: f64, max_det: usize) -> Vec<Detection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::new();

    'outer: for d in dets {
        for k in &kept {
            if k.class_id == d.class_id && k.bbox.iou(&d.bbox) >= iou_th {
                continue 'outer;
            }
        }
        kept.push(d);
        if kept.len() >= max_det { break; }
    }
    kept
}
